//! Sequential index file: a sorted main region D plus an auxiliary region A
//! for fresh inserts, chained into one logical list by integer pointers.
//!
//! Layout: header [main_count:i32][aux_count:i32][head_ptr:i32], then
//! main_count entries, then aux_count entries. Entry:
//! [key:i32][rid.page:u16][rid.slot:u16][next:i32].
//!
//! Pointers are 1-based tagged integers: 0 is end-of-list, -1 marks a
//! tombstone, p > 0 addresses D[p-1], p < -1 addresses A[-p-2]. Traversals
//! follow `next` from the head and skip tombstones; the chain enumerates all
//! live entries in ascending key order. When A outgrows log2 of the main
//! region, the chain is rewritten into D and A is emptied.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, StorageError};

use super::heap::Rid;

pub const ENTRY_SIZE: usize = 12;
const SF_HDR_SIZE: usize = 12;

/// Tagged pointer into the index file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ptr(i32);

/// Resolved pointer target: 0-based position in the main or aux region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Loc {
    Main(usize),
    Aux(usize),
}

impl Ptr {
    pub const END: Ptr = Ptr(0);
    pub const TOMBSTONE: Ptr = Ptr(-1);

    fn main(i: usize) -> Ptr {
        Ptr(i as i32 + 1)
    }

    fn aux(i: usize) -> Ptr {
        Ptr(-(i as i32) - 2)
    }

    pub fn is_end(self) -> bool {
        self.0 == 0
    }

    pub fn is_tombstone(self) -> bool {
        self.0 == -1
    }

    fn loc(self) -> Result<Loc> {
        match self.0 {
            0 | -1 => Err(StorageError::Corrupt(
                "end or tombstone pointer has no location".into(),
            )),
            p if p > 0 => Ok(Loc::Main(p as usize - 1)),
            p => Ok(Loc::Aux((-p) as usize - 2)),
        }
    }
}

/// Index entry: key, RID and pointer to the next entry in the logical list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SfEntry {
    pub key: i32,
    pub rid: Rid,
    next: Ptr,
}

impl SfEntry {
    fn new(key: i32, rid: Rid) -> Self {
        Self {
            key,
            rid,
            next: Ptr::END,
        }
    }

    pub fn deleted(&self) -> bool {
        self.next.is_tombstone()
    }

    fn pack(&self) -> [u8; ENTRY_SIZE] {
        let mut b = [0u8; ENTRY_SIZE];
        b[0..4].copy_from_slice(&self.key.to_le_bytes());
        b[4..6].copy_from_slice(&self.rid.page.to_le_bytes());
        b[6..8].copy_from_slice(&self.rid.slot.to_le_bytes());
        b[8..12].copy_from_slice(&self.next.0.to_le_bytes());
        b
    }

    fn unpack(b: &[u8; ENTRY_SIZE]) -> Self {
        Self {
            key: i32::from_le_bytes(b[0..4].try_into().unwrap()),
            rid: Rid::new(
                u16::from_le_bytes(b[4..6].try_into().unwrap()),
                u16::from_le_bytes(b[6..8].try_into().unwrap()),
            ),
            next: Ptr(i32::from_le_bytes(b[8..12].try_into().unwrap())),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Header {
    main: i32,
    aux: i32,
    head: Ptr,
}

/// On-disk integer-key index. Every operation reads and writes through a
/// freshly opened file handle; nothing is cached in memory.
pub struct SeqFile {
    path: PathBuf,
}

impl SeqFile {
    /// Open an index file, writing a well-formed empty header if the file is
    /// absent or zero-length.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() || std::fs::metadata(&path)?.len() == 0 {
            let mut f = File::create(&path)?;
            f.write_all(&[0u8; SF_HDR_SIZE])?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn header(&self) -> Result<Header> {
        let mut f = File::open(&self.path)?;
        let mut b = [0u8; SF_HDR_SIZE];
        f.read_exact(&mut b)?;
        let main = i32::from_le_bytes(b[0..4].try_into().unwrap());
        let aux = i32::from_le_bytes(b[4..8].try_into().unwrap());
        let head = Ptr(i32::from_le_bytes(b[8..12].try_into().unwrap()));
        if main < 0 || aux < 0 {
            return Err(StorageError::Corrupt("negative region count".into()));
        }
        Ok(Header { main, aux, head })
    }

    fn write_header(&self, h: &Header) -> Result<()> {
        let mut f = OpenOptions::new().write(true).open(&self.path)?;
        f.seek(SeekFrom::Start(0))?;
        f.write_all(&h.main.to_le_bytes())?;
        f.write_all(&h.aux.to_le_bytes())?;
        f.write_all(&h.head.0.to_le_bytes())?;
        Ok(())
    }

    pub fn main_count(&self) -> Result<usize> {
        Ok(self.header()?.main as usize)
    }

    pub fn aux_count(&self) -> Result<usize> {
        Ok(self.header()?.aux as usize)
    }

    /// Byte offset of an entry. A offsets are computed against the main
    /// count captured at the start of the operation, so header updates made
    /// mid-operation cannot shift them.
    fn entry_offset(loc: Loc, base: i32) -> u64 {
        let idx = match loc {
            Loc::Main(i) => i,
            Loc::Aux(i) => base as usize + i,
        };
        (SF_HDR_SIZE + idx * ENTRY_SIZE) as u64
    }

    fn read_entry(&self, loc: Loc, base: i32) -> Result<SfEntry> {
        let mut f = File::open(&self.path)?;
        f.seek(SeekFrom::Start(Self::entry_offset(loc, base)))?;
        let mut b = [0u8; ENTRY_SIZE];
        f.read_exact(&mut b)?;
        Ok(SfEntry::unpack(&b))
    }

    fn write_entry(&self, loc: Loc, base: i32, e: &SfEntry) -> Result<()> {
        let mut f = OpenOptions::new().write(true).open(&self.path)?;
        f.seek(SeekFrom::Start(Self::entry_offset(loc, base)))?;
        f.write_all(&e.pack())?;
        Ok(())
    }

    /// Binary search over D: smallest 0-based position whose key is >= `key`,
    /// or `m` if none. Tombstones are compared like live entries; callers
    /// scan backward from the result to find a live predecessor.
    fn lower_bound(&self, key: i32, m: i32) -> Result<usize> {
        let (mut lo, mut hi) = (0usize, m as usize);
        while lo < hi {
            let mid = (lo + hi) / 2;
            let e = self.read_entry(Loc::Main(mid), m)?;
            if e.key >= key {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        Ok(lo)
    }

    /// Largest live D entry with key < the lower-bound position `lb`.
    fn live_pred(&self, lb: usize, m: i32) -> Result<Option<(usize, SfEntry)>> {
        let mut j = lb.min(m as usize);
        while j > 0 {
            j -= 1;
            let e = self.read_entry(Loc::Main(j), m)?;
            if !e.deleted() {
                return Ok(Some((j, e)));
            }
        }
        Ok(None)
    }

    /// Insert (key, rid): append the entry to A, then splice it into the
    /// logical list. A key equal to an existing one is inserted before it,
    /// so lookups see duplicates most-recent-first.
    pub fn insert(&self, key: i32, rid: Rid) -> Result<()> {
        let Header { main: m, aux, head } = self.header()?;
        let idx = aux as usize;
        let mut e = SfEntry::new(key, rid);
        self.write_entry(Loc::Aux(idx), m, &e)?;
        let newp = Ptr::aux(idx);
        let aux = aux + 1;

        // empty list: the new entry becomes the head
        if head.is_end() {
            self.write_header(&Header {
                main: m,
                aux,
                head: newp,
            })?;
            return self.maybe_reorg();
        }

        let lb = self.lower_bound(key, m)?;
        let (mut prev, mut cur) = match self.live_pred(lb, m)? {
            Some((j, dj)) => (Ptr::main(j), dj.next),
            None => {
                let head_entry = self.read_entry(head.loc()?, m)?;
                if key <= head_entry.key {
                    // insert at the front
                    e.next = head;
                    self.write_entry(Loc::Aux(idx), m, &e)?;
                    self.write_header(&Header {
                        main: m,
                        aux,
                        head: newp,
                    })?;
                    return self.maybe_reorg();
                }
                (Ptr::END, head)
            }
        };

        // walk to the splice point, skipping tombstones without moving prev
        while !cur.is_end() {
            let node = self.read_entry(cur.loc()?, m)?;
            if node.deleted() {
                cur = node.next;
                continue;
            }
            if node.key < key {
                prev = cur;
                cur = node.next;
            } else {
                break;
            }
        }

        // link prev -> new -> cur
        e.next = cur;
        self.write_entry(Loc::Aux(idx), m, &e)?;
        let head = if prev.is_end() {
            newp
        } else {
            let ploc = prev.loc()?;
            let mut p = self.read_entry(ploc, m)?;
            p.next = newp;
            self.write_entry(ploc, m, &p)?;
            head
        };
        self.write_header(&Header {
            main: m,
            aux,
            head,
        })?;
        self.maybe_reorg()
    }

    /// All RIDs stored under `key`, duplicates most-recent-first. The D
    /// binary search only locates the walk's starting point; collection
    /// always follows the logical list so that equal keys split across the
    /// two regions are all found.
    pub fn search(&self, key: i32) -> Result<Vec<Rid>> {
        let Header { main: m, head, .. } = self.header()?;
        if head.is_end() {
            return Ok(Vec::new());
        }
        let lb = self.lower_bound(key, m)?;
        let start = match self.live_pred(lb, m)? {
            Some((_, dj)) => dj.next,
            None => head,
        };

        let mut out = Vec::new();
        let mut cur = start;
        while !cur.is_end() {
            let node = self.read_entry(cur.loc()?, m)?;
            if node.deleted() {
                cur = node.next;
                continue;
            }
            if node.key > key {
                break;
            }
            if node.key == key {
                out.push(node.rid);
            }
            cur = node.next;
        }
        Ok(out)
    }

    /// All live entries with key in `[lo, hi]`, in logical (ascending key)
    /// order. Bounds are normalized if given in reverse.
    pub fn range_search(&self, lo: i32, hi: i32) -> Result<Vec<SfEntry>> {
        let (lo, hi) = if lo > hi { (hi, lo) } else { (lo, hi) };
        let Header { main: m, head, .. } = self.header()?;
        if head.is_end() {
            return Ok(Vec::new());
        }
        let lb = self.lower_bound(lo, m)?;
        let start = match self.live_pred(lb, m)? {
            Some((_, dj)) => dj.next,
            None => head,
        };

        let mut out = Vec::new();
        let mut cur = start;
        while !cur.is_end() {
            let node = self.read_entry(cur.loc()?, m)?;
            if node.deleted() {
                cur = node.next;
                continue;
            }
            if node.key > hi {
                break;
            }
            if node.key >= lo {
                out.push(node);
            }
            cur = node.next;
        }
        Ok(out)
    }

    /// Unlink live entries matching `key` (all of them, or just the one with
    /// a matching RID) and mark them tombstones in place. Returns the number
    /// removed; 0 when the key is absent or the index is empty.
    pub fn delete_key(&self, key: i32, rid: Option<Rid>) -> Result<usize> {
        let Header { main: m, aux, head } = self.header()?;
        if head.is_end() {
            return Ok(0);
        }
        let lb = self.lower_bound(key, m)?;
        let (mut prev, mut cur) = match self.live_pred(lb, m)? {
            Some((j, dj)) => (Ptr::main(j), dj.next),
            None => (Ptr::END, head),
        };

        let mut head = head;
        let mut removed = 0;
        while !cur.is_end() {
            let cloc = cur.loc()?;
            let mut node = self.read_entry(cloc, m)?;
            if node.key > key {
                break;
            }
            if !node.deleted() && node.key == key && rid.map_or(true, |r| r == node.rid) {
                let nxt = node.next;
                if prev.is_end() {
                    head = nxt;
                } else {
                    let ploc = prev.loc()?;
                    let mut p = self.read_entry(ploc, m)?;
                    p.next = nxt;
                    self.write_entry(ploc, m, &p)?;
                }
                node.next = Ptr::TOMBSTONE;
                self.write_entry(cloc, m, &node)?;
                removed += 1;
                // prev stays put across the removed node
                cur = nxt;
                if rid.is_some() {
                    break;
                }
                continue;
            }
            prev = cur;
            cur = node.next;
        }
        self.write_header(&Header {
            main: m,
            aux,
            head,
        })?;
        Ok(removed)
    }

    /// Reorganize when A outgrows the log2 threshold.
    fn maybe_reorg(&self) -> Result<()> {
        let Header { main, aux, .. } = self.header()?;
        let k = (main as u32 + 1).ilog2() as i32;
        if aux > k {
            self.reorganize()?;
        }
        Ok(())
    }

    /// Rewrite D from the live logical list and empty A. The walk is bounded
    /// by main + aux + 8 steps; running into the bound means the chain has a
    /// cycle. A's bytes are left in place; aux_count = 0 is authoritative.
    pub fn reorganize(&self) -> Result<()> {
        let Header { main, aux, head } = self.header()?;
        if head.is_end() {
            return self.write_header(&Header {
                main: 0,
                aux: 0,
                head: Ptr::END,
            });
        }

        let cap = (main + aux + 8) as usize;
        let mut live = Vec::new();
        let mut cur = head;
        let mut seen = 0usize;
        while !cur.is_end() && seen < cap {
            let e = self.read_entry(cur.loc()?, main)?;
            if !e.deleted() {
                live.push(e);
            }
            cur = e.next;
            seen += 1;
        }
        if !cur.is_end() {
            return Err(StorageError::Corrupt("pointer cycle in index chain".into()));
        }

        let newm = live.len();
        for (i, e) in live.iter_mut().enumerate() {
            e.next = if i + 1 < newm {
                Ptr::main(i + 1)
            } else {
                Ptr::END
            };
            self.write_entry(Loc::Main(i), main, e)?;
        }
        tracing::debug!(main = newm, "reorganized index into main region");
        let head = if newm >= 1 { Ptr::main(0) } else { Ptr::END };
        self.write_header(&Header {
            main: newm as i32,
            aux: 0,
            head,
        })
    }
}
