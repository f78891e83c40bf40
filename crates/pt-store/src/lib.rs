//! pt-store: a directory tree of notes
//!
//! Every path handed to a [`NoteStore`] is relative to its root and is
//! checked against it before use. Reads and writes go through the
//! [`pt_formats::HandlerRegistry`], so encrypted and plain notes look the
//! same to callers apart from the key.

pub mod codec;
pub mod filename;
pub mod sandbox;
pub mod search;
pub mod store;

pub use codec::TextCodec;
pub use filename::{default_filename, unique_path};
pub use search::{PasswordProvider, Search, SearchHit, SearchOptions};
pub use store::{DirContents, NoteStore, SaveOptions};
