pub mod dedup;
pub mod entity;
pub mod error;

pub use dedup::{DedupConfig, DedupGate, MessageIdentity};
pub use error::{FirewatchError, Result};
