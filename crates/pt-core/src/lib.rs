pub mod config;
pub mod error;
pub mod types;

pub use error::{PtError, PtResult};
pub use types::IncludeEncrypted;
