pub mod config;
pub mod error;
pub mod types;

pub use config::ArkvConfig;
pub use error::{ArkvError, ArkvResult};
pub use types::DocumentMetadata;
