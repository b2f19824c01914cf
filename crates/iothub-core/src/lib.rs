pub mod cache;
pub mod client;
pub mod error;
pub mod fanout;
pub mod merge;
pub mod rules;
pub mod storage;
pub mod subjects;
pub mod types;

pub use cache::Mutator;
pub use client::{ClientConfig, ClientState};
pub use error::{ErrorKind, HubError, Result};
pub use storage::{NodeFilter, RedbStorage, Storage, StorageStats, CURRENT_SCHEMA_VERSION};
pub use types::*;
