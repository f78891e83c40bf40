//! pt-formats: translate between plaintext note bytes and on-disk bytes
//!
//! Each format is a [`NoteHandler`] bound to a key. The [`HandlerRegistry`]
//! maps filename extensions to handler factories:
//!
//! | Extension | Handler | Encrypted |
//! |---|---|---|
//! | `.txt`, `.md` | [`Raw`] | no |
//! | `.chi` | [`TomboChi`] | yes |
//! | `.aes.zip`, `.aes256.zip` | [`ZipAes`] | yes |

pub mod chi;
pub mod handler;
pub mod raw;
pub mod registry;
pub mod zipaes;

pub use chi::TomboChi;
pub use handler::NoteHandler;
pub use raw::Raw;
pub use registry::{canonical_extension, HandlerInfo, HandlerRegistry};
pub use zipaes::{AeVersion, KeyStrength, ZipAes, ZipAesOptions, ZipMethod};

/// Fixed inner filename of the single ZIP entry
pub const ZIP_INNER_FILENAME: &str = "encrypted.md";
