//! Insert/select/delete dispatch over a heap file and its registered
//! indexes. Queries use the first index covering the requested column and
//! fall back to a full heap scan otherwise.

use std::path::Path;

use crate::error::{Result, StorageError};
use crate::index::{Index, SequentialFileIndex};
use crate::storage::{HeapFile, Rid, Row, Schema, Value};

pub struct Executor {
    heap: HeapFile,
    indexes: Vec<Box<dyn Index>>,
}

impl Executor {
    pub fn new(heap: HeapFile, indexes: Vec<Box<dyn Index>>) -> Self {
        Self { heap, indexes }
    }

    /// Open a table's files under `dir`: `<name>.heap` for rows plus one
    /// `<name>_<col>.sf` sequential index per listed column. Missing files
    /// are created empty.
    pub fn open_table(
        dir: &Path,
        name: &str,
        schema: Schema,
        indexed_cols: &[&str],
    ) -> Result<Self> {
        let heap = HeapFile::open(dir.join(format!("{name}.heap")), schema)?;
        let mut indexes: Vec<Box<dyn Index>> = Vec::new();
        for col in indexed_cols {
            let idx =
                SequentialFileIndex::open(dir.join(format!("{name}_{col}.sf")), *col)?;
            indexes.push(Box::new(idx));
        }
        Ok(Self::new(heap, indexes))
    }

    pub fn heap(&self) -> &HeapFile {
        &self.heap
    }

    fn index_for(&self, col: &str) -> Option<&dyn Index> {
        self.indexes
            .iter()
            .find(|i| i.key_col() == col)
            .map(|b| b.as_ref())
    }

    /// Write the row to the heap, then to every registered index. A row
    /// missing an indexed column fails after the heap write; there is no
    /// rollback.
    pub fn insert(&self, row: &Row) -> Result<Rid> {
        let rid = self.heap.insert(row)?;
        for idx in &self.indexes {
            let key = row
                .get(idx.key_col())
                .ok_or_else(|| StorageError::MissingIndexedColumn(idx.key_col().to_string()))?;
            idx.insert(key, rid)?;
        }
        Ok(rid)
    }

    pub fn select_eq(&self, col: &str, key: &Value) -> Result<Vec<Row>> {
        match self.index_for(col) {
            Some(idx) => idx
                .search(key)?
                .into_iter()
                .map(|rid| self.heap.read(rid))
                .collect(),
            None => self.heap.scan_eq(col, key)?.collect(),
        }
    }

    pub fn select_between(&self, col: &str, lo: &Value, hi: &Value) -> Result<Vec<Row>> {
        match self.index_for(col) {
            Some(idx) => idx
                .range_search(lo, hi)?
                .into_iter()
                .map(|rid| self.heap.read(rid))
                .collect(),
            None => self.heap.scan_range(col, lo, hi)?.collect(),
        }
    }

    /// Delete all rows whose `col` equals `key`. Rows are located via the
    /// covering index (or a scan), removed from the heap, and unlinked from
    /// the index. Returns the number of heap rows actually deleted.
    pub fn delete(&self, col: &str, key: &Value) -> Result<usize> {
        let idx = self.index_for(col);
        let rows: Vec<Row> = match idx {
            Some(i) => i
                .search(key)?
                .into_iter()
                .map(|rid| self.heap.read(rid))
                .collect::<Result<_>>()?,
            None => self.heap.scan_eq(col, key)?.collect::<Result<_>>()?,
        };

        let mut count = 0;
        for row in rows {
            let rid = row
                .rid()
                .ok_or_else(|| StorageError::Corrupt("located row carries no rid".into()))?;
            if self.heap.delete(rid)? {
                if let Some(i) = idx {
                    i.delete(key, Some(rid))?;
                }
                count += 1;
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Column, ColumnType};
    use tempfile::tempdir;

    fn schema() -> Schema {
        vec![
            Column::new("id", ColumnType::Int),
            Column::new("name", ColumnType::Varchar(50)),
        ]
    }

    fn row(id: i32, name: &str) -> Row {
        Row::new()
            .with("id", Value::Int(id))
            .with("name", Value::Text(name.into()))
    }

    #[test]
    fn insert_requires_indexed_column() {
        let dir = tempdir().unwrap();
        let exec = Executor::open_table(dir.path(), "t", schema(), &["id"]).unwrap();
        exec.insert(&row(1, "a")).unwrap();
        let r = exec.insert(&Row::new().with("name", Value::Text("b".into())));
        assert!(matches!(r, Err(StorageError::MissingIndexedColumn(c)) if c == "id"));
    }

    #[test]
    fn select_falls_back_to_scan_without_index() {
        let dir = tempdir().unwrap();
        let exec = Executor::open_table(dir.path(), "t", schema(), &[]).unwrap();
        exec.insert(&row(1, "a")).unwrap();
        exec.insert(&row(2, "b")).unwrap();
        exec.insert(&row(2, "c")).unwrap();

        let hits = exec.select_eq("id", &Value::Int(2)).unwrap();
        assert_eq!(hits.len(), 2);
        let between = exec
            .select_between("id", &Value::Int(1), &Value::Int(1))
            .unwrap();
        assert_eq!(between.len(), 1);
        assert_eq!(exec.delete("id", &Value::Int(2)).unwrap(), 2);
        assert_eq!(exec.select_eq("id", &Value::Int(2)).unwrap().len(), 0);
    }

    #[test]
    fn delete_removes_from_heap_and_index() {
        let dir = tempdir().unwrap();
        let exec = Executor::open_table(dir.path(), "t", schema(), &["id"]).unwrap();
        exec.insert(&row(10, "a")).unwrap();
        exec.insert(&row(20, "b")).unwrap();
        exec.insert(&row(20, "c")).unwrap();

        assert_eq!(exec.delete("id", &Value::Int(20)).unwrap(), 2);
        assert_eq!(exec.select_eq("id", &Value::Int(20)).unwrap().len(), 0);
        assert_eq!(exec.select_eq("id", &Value::Int(10)).unwrap().len(), 1);
        // deleting again finds nothing
        assert_eq!(exec.delete("id", &Value::Int(20)).unwrap(), 0);
    }

    #[test]
    fn table_files_persist_across_reopen() {
        let dir = tempdir().unwrap();
        {
            let exec = Executor::open_table(dir.path(), "t", schema(), &["id"]).unwrap();
            exec.insert(&row(7, "keep")).unwrap();
        }
        let exec = Executor::open_table(dir.path(), "t", schema(), &["id"]).unwrap();
        let rows = exec.select_eq("id", &Value::Int(7)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&Value::Text("keep".into())));
    }
}
