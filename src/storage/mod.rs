//! Storage engine: row codec, slotted pages, heap files, sequential index.

mod heap;
mod page;
mod row;
mod seqfile;

pub use heap::{HeapFile, PageId, Rid, RidIter, RowIter};
pub use page::{Page, HDR_SIZE, PAGE_SIZE, SLOT_SIZE};
pub use row::{pack_row, unpack_row, Column, ColumnType, Row, Schema, Value};
pub use seqfile::{SeqFile, SfEntry, ENTRY_SIZE};
