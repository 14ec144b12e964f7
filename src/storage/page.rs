//! Page format: 4 KB slotted page. Header + slot directory + row area.
//! Row area grows downward from end of page; slot directory grows upward from
//! the header. A slot with len == 0 is free and may be reused in place.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::Result;

pub const PAGE_SIZE: usize = 4096;

pub const HDR_SIZE: usize = 4;
const OFFSET_N_SLOTS: usize = 0;
const OFFSET_DATA_END: usize = 2;
pub const SLOT_SIZE: usize = 4; // offset u16, length u16
const SLOT_DIR_START: usize = HDR_SIZE;

/// Slotted page. Slot directory at [HDR_SIZE..); row area [data_end..PAGE_SIZE).
/// Rows grow downward from PAGE_SIZE; data_end is the low end of the row area.
#[derive(Clone)]
pub struct Page {
    data: [u8; PAGE_SIZE],
}

impl Page {
    pub fn new() -> Self {
        let mut p = Self {
            data: [0u8; PAGE_SIZE],
        };
        p.set_n_slots(0);
        p.set_data_end(PAGE_SIZE as u16);
        p
    }

    pub fn n_slots(&self) -> u16 {
        u16::from_le_bytes(
            self.data[OFFSET_N_SLOTS..OFFSET_N_SLOTS + 2]
                .try_into()
                .unwrap(),
        )
    }
    fn set_n_slots(&mut self, v: u16) {
        self.data[OFFSET_N_SLOTS..OFFSET_N_SLOTS + 2].copy_from_slice(&v.to_le_bytes());
    }
    pub fn data_end(&self) -> u16 {
        u16::from_le_bytes(
            self.data[OFFSET_DATA_END..OFFSET_DATA_END + 2]
                .try_into()
                .unwrap(),
        )
    }
    fn set_data_end(&mut self, v: u16) {
        self.data[OFFSET_DATA_END..OFFSET_DATA_END + 2].copy_from_slice(&v.to_le_bytes());
    }

    /// Slot (offset, length). `None` if the slot index is out of range.
    pub fn slot(&self, slot_id: u16) -> Option<(u16, u16)> {
        if slot_id >= self.n_slots() {
            return None;
        }
        let pos = SLOT_DIR_START + slot_id as usize * SLOT_SIZE;
        let off = u16::from_le_bytes(self.data[pos..pos + 2].try_into().unwrap());
        let len = u16::from_le_bytes(self.data[pos + 2..pos + 4].try_into().unwrap());
        Some((off, len))
    }

    fn set_slot(&mut self, slot_id: u16, off: u16, len: u16) {
        let pos = SLOT_DIR_START + slot_id as usize * SLOT_SIZE;
        self.data[pos..pos + 2].copy_from_slice(&off.to_le_bytes());
        self.data[pos + 2..pos + 4].copy_from_slice(&len.to_le_bytes());
    }

    /// First-fit search of the slot directory for a freed slot.
    pub fn find_free_slot(&self) -> Option<u16> {
        (0..self.n_slots()).find(|&s| matches!(self.slot(s), Some((_, 0))))
    }

    /// Bytes available for a new row, given whether a freed slot is reused
    /// (reuse needs no directory growth).
    pub fn free_space(&self, reuse: bool) -> usize {
        let extra = if reuse { 0 } else { 1 };
        let dir_end = SLOT_DIR_START + (self.n_slots() as usize + extra) * SLOT_SIZE;
        (self.data_end() as usize).saturating_sub(dir_end)
    }

    /// Insert row bytes, reusing a freed slot if one exists.
    /// Returns `Some(slot_id)` on success, `None` if no space.
    pub fn insert(&mut self, row: &[u8]) -> Option<u16> {
        let free_slot = self.find_free_slot();
        if self.free_space(free_slot.is_some()) < row.len() {
            return None;
        }
        let n = self.n_slots();
        let slot_id = free_slot.unwrap_or(n);
        if free_slot.is_none() {
            self.set_n_slots(n + 1);
        }
        let new_end = self.data_end() as usize - row.len();
        self.data[new_end..new_end + row.len()].copy_from_slice(row);
        self.set_data_end(new_end as u16);
        self.set_slot(slot_id, new_end as u16, row.len() as u16);
        Some(slot_id)
    }

    /// Row bytes at slot. `None` if the slot is out of range or freed.
    pub fn payload(&self, slot_id: u16) -> Option<&[u8]> {
        match self.slot(slot_id) {
            Some((off, len)) if len != 0 => {
                Some(&self.data[off as usize..off as usize + len as usize])
            }
            _ => None,
        }
    }

    /// Mark a slot free (len = 0). The offset and the payload bytes stay put,
    /// and slot indices are never renumbered. Returns false if already free
    /// or out of range.
    pub fn free_slot(&mut self, slot_id: u16) -> bool {
        match self.slot(slot_id) {
            Some((off, len)) if len != 0 => {
                self.set_slot(slot_id, off, 0);
                true
            }
            _ => false,
        }
    }

    pub fn as_bytes(&self) -> &[u8; PAGE_SIZE] {
        &self.data
    }

    /// Read page from a Seek + Read (e.g. `File`).
    pub fn read<R: Read + Seek>(r: &mut R) -> Result<Self> {
        let mut data = [0u8; PAGE_SIZE];
        r.read_exact(&mut data)?;
        Ok(Self { data })
    }

    /// Read page at offset `page_id * PAGE_SIZE` in file.
    pub fn read_at<R: Read + Seek>(r: &mut R, page_id: u32) -> Result<Self> {
        r.seek(SeekFrom::Start((page_id as u64) * (PAGE_SIZE as u64)))?;
        Self::read(r)
    }

    /// Write entire page to Write + Seek.
    pub fn write<W: Write + Seek>(&self, w: &mut W) -> Result<()> {
        w.write_all(&self.data)?;
        Ok(())
    }

    /// Write page at offset `page_id * PAGE_SIZE`.
    pub fn write_at<W: Write + Seek>(&self, w: &mut W, page_id: u32) -> Result<()> {
        w.seek(SeekFrom::Start((page_id as u64) * (PAGE_SIZE as u64)))?;
        self.write(w)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}
