//! SeqDB is the storage core of a small relational engine: slotted-page heap
//! files for rows, plus an on-disk sequential-file index (sorted main region
//! and auxiliary insert region with periodic reorganization).

pub mod config;
pub mod error;
pub mod executor;
pub mod index;
pub mod storage;

// re export for convenience.
pub use config::Config;
pub use error::{Result, StorageError};
