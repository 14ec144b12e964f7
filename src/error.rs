//! Typed errors for the storage engine.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("row of {0} bytes does not fit in a page")]
    RowTooLarge(usize),

    #[error("slot ({page}, {slot}) out of range")]
    SlotOutOfRange { page: u16, slot: u16 },

    #[error("slot ({page}, {slot}) is deleted")]
    SlotDeleted { page: u16, slot: u16 },

    #[error("schema mismatch: row has {found} columns, schema has {expected}")]
    SchemaMismatch { expected: usize, found: usize },

    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    #[error("DATE value of {0} bytes exceeds 255")]
    DateTooLong(usize),

    #[error("missing indexed column: {0}")]
    MissingIndexedColumn(String),

    #[error("corrupt file: {0}")]
    Corrupt(String),

    #[error("invalid utf8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
