//! The narrow index interface the executor consumes, and the sequential-file
//! adaptor behind it.

use std::path::Path;

use crate::error::{Result, StorageError};
use crate::storage::{Rid, SeqFile, Value};

/// Key -> RID multi-map over one column.
pub trait Index {
    /// Column this index covers.
    fn key_col(&self) -> &str;

    fn insert(&self, key: &Value, rid: Rid) -> Result<()>;

    /// RIDs stored under `key`, duplicates most-recent-first.
    fn search(&self, key: &Value) -> Result<Vec<Rid>>;

    /// RIDs with key in `[lo, hi]`, ascending.
    fn range_search(&self, lo: &Value, hi: &Value) -> Result<Vec<Rid>>;

    /// Remove entries for `key` (all, or one matching `rid`); returns count.
    fn delete(&self, key: &Value, rid: Option<Rid>) -> Result<usize>;
}

/// Coerce an incoming key to the index's native signed 32-bit form.
fn as_i32(v: &Value) -> Result<i32> {
    match v {
        Value::Int(k) => Ok(*k),
        Value::Float(f) => Ok(*f as i32),
        other => Err(StorageError::UnsupportedType(format!(
            "index key {other:?} is not an integer"
        ))),
    }
}

/// Integer-key index backed by a sequential file.
pub struct SequentialFileIndex {
    key_col: String,
    sf: SeqFile,
}

impl SequentialFileIndex {
    pub fn open<P: AsRef<Path>>(path: P, key_col: impl Into<String>) -> Result<Self> {
        Ok(Self {
            key_col: key_col.into(),
            sf: SeqFile::open(path)?,
        })
    }

    pub fn seqfile(&self) -> &SeqFile {
        &self.sf
    }
}

impl Index for SequentialFileIndex {
    fn key_col(&self) -> &str {
        &self.key_col
    }

    fn insert(&self, key: &Value, rid: Rid) -> Result<()> {
        self.sf.insert(as_i32(key)?, rid)
    }

    fn search(&self, key: &Value) -> Result<Vec<Rid>> {
        self.sf.search(as_i32(key)?)
    }

    fn range_search(&self, lo: &Value, hi: &Value) -> Result<Vec<Rid>> {
        let entries = self.sf.range_search(as_i32(lo)?, as_i32(hi)?)?;
        Ok(entries.into_iter().map(|e| e.rid).collect())
    }

    fn delete(&self, key: &Value, rid: Option<Rid>) -> Result<usize> {
        self.sf.delete_key(as_i32(key)?, rid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn coerces_keys_to_i32() {
        let tmp = NamedTempFile::new().unwrap();
        let idx = SequentialFileIndex::open(tmp.path(), "id").unwrap();
        idx.insert(&Value::Int(10), Rid::new(0, 0)).unwrap();
        // float keys are truncated toward zero
        assert_eq!(idx.search(&Value::Float(10.7)).unwrap(), vec![Rid::new(0, 0)]);
        assert!(matches!(
            idx.search(&Value::Text("10".into())),
            Err(StorageError::UnsupportedType(_))
        ));
    }

    #[test]
    fn range_maps_entries_to_rids() {
        let tmp = NamedTempFile::new().unwrap();
        let idx = SequentialFileIndex::open(tmp.path(), "id").unwrap();
        for i in 0..5 {
            idx.insert(&Value::Int(i), Rid::new(0, i as u16)).unwrap();
        }
        let rids = idx
            .range_search(&Value::Int(1), &Value::Int(3))
            .unwrap();
        assert_eq!(
            rids,
            vec![Rid::new(0, 1), Rid::new(0, 2), Rid::new(0, 3)]
        );
    }
}
