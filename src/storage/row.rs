//! Row format: [ncols:u16][nullmap: ceil(ncols/8)] + binary-encoded columns.
//! Types: INT (4 bytes LE), FLOAT (8 bytes LE), VARCHAR(N) and DATE (2-byte length + UTF-8).

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::error::{Result, StorageError};

use super::heap::Rid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int,
    Float,
    /// Max byte length of the encoded text; longer values are truncated.
    Varchar(u16),
    /// Text in the literal form `YYYY-MM-DD`; at most 255 bytes.
    Date,
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

pub type Schema = Vec<Column>;

#[derive(Debug, Clone)]
pub enum Value {
    Int(i32),
    Float(f64),
    Text(String),
    Date(String),
    Null,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// Numeric variants compare across Int/Float; Text and Date compare as strings.
/// Everything else is unordered.
impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        use Value::*;
        match (self, other) {
            (Int(a), Int(b)) => Some(a.cmp(b)),
            (Int(a), Float(b)) => (*a as f64).partial_cmp(b),
            (Float(a), Int(b)) => a.partial_cmp(&(*b as f64)),
            (Float(a), Float(b)) => a.partial_cmp(b),
            (Text(a) | Date(a), Text(b) | Date(b)) => Some(a.cmp(b)),
            (Null, Null) => Some(Ordering::Equal),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.partial_cmp(other) == Some(Ordering::Equal)
    }
}

/// A row is a mapping from column name to value. Rows read back from a heap
/// file carry the RID they were read from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: BTreeMap<String, Value>,
    rid: Option<Rid>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style set, for literal rows.
    pub fn with(mut self, col: impl Into<String>, v: Value) -> Self {
        self.values.insert(col.into(), v);
        self
    }

    pub fn set(&mut self, col: impl Into<String>, v: Value) {
        self.values.insert(col.into(), v);
    }

    pub fn get(&self, col: &str) -> Option<&Value> {
        self.values.get(col)
    }

    pub fn rid(&self) -> Option<Rid> {
        self.rid
    }

    pub(crate) fn set_rid(&mut self, rid: Rid) {
        self.rid = Some(rid);
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }
}

fn nullmap_len(ncols: usize) -> usize {
    (ncols + 7) / 8
}

/// Encode a row per schema. Missing or null columns get a null bit and no
/// payload. VARCHAR values longer than their declared max are truncated
/// byte-wise (a multi-byte codepoint may be split; readers of such a value
/// will see a utf8 error).
pub fn pack_row(row: &Row, schema: &Schema) -> Result<Vec<u8>> {
    let n = schema.len();
    let mut nullmap = vec![0u8; nullmap_len(n)];
    let mut fields: Vec<u8> = Vec::new();

    for (i, col) in schema.iter().enumerate() {
        let val = row.get(&col.name).unwrap_or(&Value::Null);
        if val.is_null() {
            nullmap[i / 8] |= 1 << (i % 8);
            continue;
        }
        match (col.ty, val) {
            (ColumnType::Int, Value::Int(v)) => fields.extend_from_slice(&v.to_le_bytes()),
            (ColumnType::Float, Value::Float(v)) => fields.extend_from_slice(&v.to_le_bytes()),
            // INT literals are accepted in FLOAT columns
            (ColumnType::Float, Value::Int(v)) => {
                fields.extend_from_slice(&(*v as f64).to_le_bytes())
            }
            (ColumnType::Varchar(max), Value::Text(s) | Value::Date(s)) => {
                let b = s.as_bytes();
                let b = &b[..b.len().min(max as usize)];
                fields.extend_from_slice(&(b.len() as u16).to_le_bytes());
                fields.extend_from_slice(b);
            }
            (ColumnType::Date, Value::Date(s) | Value::Text(s)) => {
                let b = s.as_bytes();
                if b.len() > 255 {
                    return Err(StorageError::DateTooLong(b.len()));
                }
                fields.extend_from_slice(&(b.len() as u16).to_le_bytes());
                fields.extend_from_slice(b);
            }
            (ty, v) => {
                return Err(StorageError::UnsupportedType(format!(
                    "value {v:?} in {ty:?} column {}",
                    col.name
                )))
            }
        }
    }

    let mut buf = Vec::with_capacity(2 + nullmap.len() + fields.len());
    buf.extend_from_slice(&(n as u16).to_le_bytes());
    buf.extend_from_slice(&nullmap);
    buf.extend_from_slice(&fields);
    Ok(buf)
}

fn take(buf: &[u8], off: usize, len: usize) -> Result<&[u8]> {
    buf.get(off..off + len)
        .ok_or_else(|| StorageError::Corrupt("truncated row".into()))
}

/// Decode a row per schema. Fails if the stored column count does not match.
pub fn unpack_row(buf: &[u8], schema: &Schema) -> Result<Row> {
    let n = u16::from_le_bytes(take(buf, 0, 2)?.try_into().unwrap()) as usize;
    if n != schema.len() {
        return Err(StorageError::SchemaMismatch {
            expected: schema.len(),
            found: n,
        });
    }
    let mut off = 2;
    let bm = take(buf, off, nullmap_len(n))?.to_vec();
    off += bm.len();

    let mut row = Row::new();
    for (i, col) in schema.iter().enumerate() {
        if (bm[i / 8] >> (i % 8)) & 1 == 1 {
            row.set(&col.name, Value::Null);
            continue;
        }
        let v = match col.ty {
            ColumnType::Int => {
                let b = take(buf, off, 4)?;
                off += 4;
                Value::Int(i32::from_le_bytes(b.try_into().unwrap()))
            }
            ColumnType::Float => {
                let b = take(buf, off, 8)?;
                off += 8;
                Value::Float(f64::from_le_bytes(b.try_into().unwrap()))
            }
            ColumnType::Varchar(_) | ColumnType::Date => {
                let len = u16::from_le_bytes(take(buf, off, 2)?.try_into().unwrap()) as usize;
                off += 2;
                let s = String::from_utf8(take(buf, off, len)?.to_vec())?;
                off += len;
                if col.ty == ColumnType::Date {
                    Value::Date(s)
                } else {
                    Value::Text(s)
                }
            }
        };
        row.set(&col.name, v);
    }
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        vec![
            Column::new("id", ColumnType::Int),
            Column::new("name", ColumnType::Varchar(10)),
            Column::new("salary", ColumnType::Float),
            Column::new("hired", ColumnType::Date),
        ]
    }

    #[test]
    fn pack_unpack_roundtrip() {
        let row = Row::new()
            .with("id", Value::Int(42))
            .with("name", Value::Text("Ana".into()))
            .with("salary", Value::Float(1200.5))
            .with("hired", Value::Date("2024-01-01".into()));
        let buf = pack_row(&row, &schema()).unwrap();
        let back = unpack_row(&buf, &schema()).unwrap();
        assert_eq!(back, row);
    }

    #[test]
    fn missing_column_reads_back_null() {
        let row = Row::new().with("id", Value::Int(1));
        let buf = pack_row(&row, &schema()).unwrap();
        let back = unpack_row(&buf, &schema()).unwrap();
        assert_eq!(back.get("name"), Some(&Value::Null));
        assert_eq!(back.get("salary"), Some(&Value::Null));
        assert_eq!(back.get("id"), Some(&Value::Int(1)));
    }

    #[test]
    fn varchar_truncated_to_declared_max() {
        let row = Row::new()
            .with("id", Value::Int(1))
            .with("name", Value::Text("abcdefghijklmnop".into()));
        let buf = pack_row(&row, &schema()).unwrap();
        let back = unpack_row(&buf, &schema()).unwrap();
        assert_eq!(back.get("name"), Some(&Value::Text("abcdefghij".into())));
    }

    #[test]
    fn varchar_truncation_is_byte_wise() {
        let schema = vec![Column::new("s", ColumnType::Varchar(3))];
        let row = Row::new().with("s", Value::Text("ññ".into())); // 4 bytes encoded
        let buf = pack_row(&row, &schema).unwrap();
        // [ncols:2][nullmap:1][len:2][bytes:3]
        assert_eq!(buf.len(), 2 + 1 + 2 + 3);
        assert!(matches!(
            unpack_row(&buf, &schema),
            Err(StorageError::Utf8(_))
        ));
    }

    #[test]
    fn date_too_long_fails() {
        let row = Row::new().with("hired", Value::Date("x".repeat(256)));
        assert!(matches!(
            pack_row(&row, &schema()),
            Err(StorageError::DateTooLong(256))
        ));
    }

    #[test]
    fn type_mismatch_fails() {
        let row = Row::new().with("id", Value::Text("not an int".into()));
        assert!(matches!(
            pack_row(&row, &schema()),
            Err(StorageError::UnsupportedType(_))
        ));
    }

    #[test]
    fn schema_mismatch_on_unpack() {
        let row = Row::new().with("id", Value::Int(1));
        let buf = pack_row(&row, &schema()).unwrap();
        let other = vec![Column::new("id", ColumnType::Int)];
        assert!(matches!(
            unpack_row(&buf, &other),
            Err(StorageError::SchemaMismatch {
                expected: 1,
                found: 4
            })
        ));
    }

    #[test]
    fn truncated_buffer_fails() {
        let row = Row::new().with("id", Value::Int(7));
        let buf = pack_row(&row, &schema()).unwrap();
        assert!(matches!(
            unpack_row(&buf[..buf.len() - 1], &schema()),
            Err(StorageError::Corrupt(_))
        ));
    }

    #[test]
    fn int_widens_into_float_column() {
        let schema = vec![Column::new("x", ColumnType::Float)];
        let row = Row::new().with("x", Value::Int(3));
        let buf = pack_row(&row, &schema).unwrap();
        let back = unpack_row(&buf, &schema).unwrap();
        assert_eq!(back.get("x"), Some(&Value::Float(3.0)));
    }

    #[test]
    fn value_ordering_crosses_numeric_variants() {
        assert!(Value::Int(3) < Value::Float(3.5));
        assert!(Value::Float(2.0) < Value::Int(3));
        assert_eq!(Value::Int(3), Value::Float(3.0));
        assert!(Value::Text("a".into()) < Value::Date("b".into()));
        assert!(Value::Int(1).partial_cmp(&Value::Text("1".into())).is_none());
    }
}
