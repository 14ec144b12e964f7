//! Heap file: slotted pages holding encoded rows. One file per table.
//! Page N lives at offset N * PAGE_SIZE; rows are addressed by stable RIDs.
//!
//! File handles are not cached: every operation opens the file, does its
//! reads/writes, and closes it. Single-writer only.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::{Result, StorageError};

use super::page::{Page, HDR_SIZE, PAGE_SIZE, SLOT_SIZE};
use super::row::{pack_row, unpack_row, Row, Schema, Value};

pub type PageId = u32;

/// Pointer to a row in the heap: page + slot index. Stable across deletes;
/// a freed slot keeps its index and is only reused by later inserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rid {
    pub page: u16,
    pub slot: u16,
}

impl Rid {
    pub fn new(page: u16, slot: u16) -> Self {
        Self { page, slot }
    }
}

/// A heap file stores pages sequentially. The schema must match the one the
/// file was written under; the file itself does not record it.
pub struct HeapFile {
    path: PathBuf,
    schema: Schema,
}

impl HeapFile {
    /// Open a heap file, creating it empty (zero pages) if it does not exist.
    pub fn open<P: AsRef<Path>>(path: P, schema: Schema) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            File::create(&path)?;
        }
        let len = std::fs::metadata(&path)?.len();
        if len % (PAGE_SIZE as u64) != 0 {
            return Err(StorageError::Corrupt(
                "heap file size not a multiple of page size".into(),
            ));
        }
        Ok(Self { path, schema })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of pages in the file.
    pub fn num_pages(&self) -> Result<PageId> {
        let len = std::fs::metadata(&self.path)?.len();
        Ok((len / (PAGE_SIZE as u64)) as PageId)
    }

    fn read_page(&self, page_id: PageId) -> Result<Page> {
        let mut f = File::open(&self.path)?;
        Page::read_at(&mut f, page_id)
    }

    fn write_page(&self, page_id: PageId, page: &Page) -> Result<()> {
        let mut f = OpenOptions::new().write(true).open(&self.path)?;
        page.write_at(&mut f, page_id)
    }

    /// Insert a row. Tries the last page first (reusing a freed slot when one
    /// exists), then a fresh page. Rows are never split across pages.
    pub fn insert(&self, row: &Row) -> Result<Rid> {
        let blob = pack_row(row, &self.schema)?;
        if blob.len() + HDR_SIZE + SLOT_SIZE > PAGE_SIZE {
            return Err(StorageError::RowTooLarge(blob.len()));
        }

        let num_pages = self.num_pages()?;
        let mut p = if num_pages == 0 {
            tracing::debug!(page = 0, "allocating first heap page");
            self.write_page(0, &Page::new())?;
            0
        } else {
            num_pages - 1
        };

        for _ in 0..2 {
            let mut page = self.read_page(p)?;
            if let Some(slot) = page.insert(&blob) {
                self.write_page(p, &page)?;
                return Ok(Rid::new(p as u16, slot));
            }
            p = self.num_pages()?;
            tracing::debug!(page = p, "allocating heap page");
            self.write_page(p, &Page::new())?;
        }
        // a fresh page fits any row that passed the size check above
        Err(StorageError::Corrupt(
            "fresh page rejected a row that fits a page".into(),
        ))
    }

    /// Read the row at `rid` and attach the RID to it.
    pub fn read(&self, rid: Rid) -> Result<Row> {
        if PageId::from(rid.page) >= self.num_pages()? {
            return Err(StorageError::SlotOutOfRange {
                page: rid.page,
                slot: rid.slot,
            });
        }
        let page = self.read_page(rid.page.into())?;
        let (off, len) = page.slot(rid.slot).ok_or(StorageError::SlotOutOfRange {
            page: rid.page,
            slot: rid.slot,
        })?;
        if len == 0 {
            return Err(StorageError::SlotDeleted {
                page: rid.page,
                slot: rid.slot,
            });
        }
        let bytes = &page.as_bytes()[off as usize..off as usize + len as usize];
        let mut row = unpack_row(bytes, &self.schema)?;
        row.set_rid(rid);
        Ok(row)
    }

    /// Mark the slot at `rid` free. Returns false if the RID is out of range
    /// or already freed. Payload bytes are not compacted.
    pub fn delete(&self, rid: Rid) -> Result<bool> {
        if PageId::from(rid.page) >= self.num_pages()? {
            return Ok(false);
        }
        let mut page = self.read_page(rid.page.into())?;
        if !page.free_slot(rid.slot) {
            return Ok(false);
        }
        self.write_page(rid.page.into(), &page)?;
        Ok(true)
    }

    /// Lazy walk over live RIDs, in page order then slot order.
    pub fn iter_rids(&self) -> Result<RidIter<'_>> {
        Ok(RidIter {
            heap: self,
            num_pages: self.num_pages()?,
            page_no: 0,
            page: None,
            slot: 0,
        })
    }

    /// Lazy walk over live rows.
    pub fn iter_rows(&self) -> Result<RowIter<'_>> {
        Ok(RowIter {
            inner: self.iter_rids()?,
        })
    }

    /// Full scan for rows whose `col` equals `key`. Null or absent columns
    /// never match.
    pub fn scan_eq<'a>(
        &'a self,
        col: &'a str,
        key: &'a Value,
    ) -> Result<impl Iterator<Item = Result<Row>> + 'a> {
        Ok(self.iter_rows()?.filter(move |res| match res {
            Ok(row) => row
                .get(col)
                .map_or(false, |v| !v.is_null() && v == key),
            Err(_) => true,
        }))
    }

    /// Full scan for rows whose `col` is non-null and within `[lo, hi]`.
    /// Bounds are normalized if given in reverse.
    pub fn scan_range<'a>(
        &'a self,
        col: &'a str,
        lo: &'a Value,
        hi: &'a Value,
    ) -> Result<impl Iterator<Item = Result<Row>> + 'a> {
        let (lo, hi) = if lo.partial_cmp(hi) == Some(std::cmp::Ordering::Greater) {
            (hi, lo)
        } else {
            (lo, hi)
        };
        Ok(self.iter_rows()?.filter(move |res| match res {
            Ok(row) => row
                .get(col)
                .map_or(false, |v| !v.is_null() && lo <= v && v <= hi),
            Err(_) => true,
        }))
    }
}

pub struct RidIter<'a> {
    heap: &'a HeapFile,
    num_pages: PageId,
    page_no: PageId,
    page: Option<Page>,
    slot: u16,
}

impl Iterator for RidIter<'_> {
    type Item = Result<Rid>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.page_no >= self.num_pages {
                return None;
            }
            if self.page.is_none() {
                match self.heap.read_page(self.page_no) {
                    Ok(p) => self.page = Some(p),
                    Err(e) => {
                        self.num_pages = 0;
                        return Some(Err(e));
                    }
                }
            }
            if let Some(page) = &self.page {
                while self.slot < page.n_slots() {
                    let s = self.slot;
                    self.slot += 1;
                    if matches!(page.slot(s), Some((_, len)) if len != 0) {
                        return Some(Ok(Rid::new(self.page_no as u16, s)));
                    }
                }
            }
            self.page = None;
            self.slot = 0;
            self.page_no += 1;
        }
    }
}

pub struct RowIter<'a> {
    inner: RidIter<'a>,
}

impl Iterator for RowIter<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.inner.next()? {
            Ok(rid) => Some(self.inner.heap.read(rid)),
            Err(e) => Some(Err(e)),
        }
    }
}
