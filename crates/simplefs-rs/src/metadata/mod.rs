//! On-disk metadata: superblock, file records and their placement in the
//! metadata region.

#[cfg(test)]
mod metadata_tests;

use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{FsError, FsResult};
use crate::layout::bits::Bitmap;
use crate::layout::constants::{NO_START_BLOCK, RECORD_HEADER_SIZE, SUPERBLOCK_SIZE};
use crate::retention::volume::Volume;

/// Superblock holds the number of in-use file records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Superblock {
    pub active_file_count: i32,
}

impl Superblock {
    #[must_use]
    pub const fn from_bytes(buf: [u8; SUPERBLOCK_SIZE]) -> Self {
        Self {
            active_file_count: i32::from_le_bytes(buf),
        }
    }

    #[must_use]
    pub const fn to_bytes(self) -> [u8; SUPERBLOCK_SIZE] {
        self.active_file_count.to_le_bytes()
    }

    /// Active file count, or `None` when the stored value is negative.
    #[must_use]
    pub fn file_count(self) -> Option<usize> {
        usize::try_from(self.active_file_count).ok()
    }

    pub fn increment(&mut self) {
        self.active_file_count = self.active_file_count.saturating_add(1);
    }

    pub fn decrement(&mut self) {
        self.active_file_count = self.active_file_count.saturating_sub(1).max(0);
    }
}

/// A contiguous run of data blocks owned by one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRun {
    pub start: u32,
    pub count: u32,
}

impl BlockRun {
    /// One past the last block of the run.
    #[must_use]
    pub const fn end(self) -> u64 {
        self.start as u64 + self.count as u64
    }

    pub fn blocks(self) -> impl Iterator<Item = u32> {
        (0..self.count).map(move |i| self.start.saturating_add(i))
    }
}

/// FileRecord is one slot of the file table, decoded as stored.
///
/// `start_block` and `block_count` keep their raw on-disk values so that a
/// damaged record can still be inspected; use [`FileRecord::run`] for the
/// usable block range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub name: String,
    pub size: u64,
    pub created_at: i64,
    pub in_use: bool,
    pub start_block: i64,
    pub block_count: u64,
}

impl Default for FileRecord {
    fn default() -> Self {
        Self::empty()
    }
}

impl FileRecord {
    /// A free slot.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            name: String::new(),
            size: 0,
            created_at: 0,
            in_use: false,
            start_block: NO_START_BLOCK,
            block_count: 0,
        }
    }

    /// A freshly created, empty file stamped with the current time.
    #[must_use]
    pub fn new_file(name: &str) -> Self {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
            .unwrap_or_default();
        Self {
            name: name.to_owned(),
            created_at,
            in_use: true,
            ..Self::empty()
        }
    }

    /// `run` returns the owned block range, if the record has a representable one.
    #[must_use]
    pub fn run(&self) -> Option<BlockRun> {
        if self.block_count == 0 {
            return None;
        }
        let start = u32::try_from(self.start_block).ok()?;
        let count = u32::try_from(self.block_count).ok()?;
        Some(BlockRun { start, count })
    }

    /// `set_contents` points the record at `run` holding `size` bytes.
    pub fn set_contents(&mut self, size: u64, run: BlockRun) {
        self.size = size;
        self.start_block = i64::from(run.start);
        self.block_count = u64::from(run.count);
    }

    /// `set_empty` drops the record's blocks and sets its size to zero.
    pub fn set_empty(&mut self) {
        self.size = 0;
        self.start_block = NO_START_BLOCK;
        self.block_count = 0;
    }

    /// `to_bytes` encodes the record into a `record_size`-byte slot.
    ///
    /// # Arguments
    /// * `max_name_len` - Longest name the slot can hold; longer names are cut.
    #[must_use]
    pub fn to_bytes(&self, max_name_len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; RECORD_HEADER_SIZE + max_name_len + 1];
        buf[0] = u8::from(self.in_use);
        buf[8..16].copy_from_slice(&self.size.to_le_bytes());
        buf[16..24].copy_from_slice(&self.created_at.to_le_bytes());
        buf[24..32].copy_from_slice(&self.start_block.to_le_bytes());
        buf[32..40].copy_from_slice(&self.block_count.to_le_bytes());
        let name_bytes = self.name.as_bytes();
        let max = name_bytes.len().min(max_name_len);
        buf[RECORD_HEADER_SIZE..RECORD_HEADER_SIZE + max].copy_from_slice(&name_bytes[..max]);
        buf
    }

    /// `from_bytes` decodes one record slot.
    ///
    /// # Errors
    /// Returns an error if `buf` is shorter than a record.
    pub fn from_bytes(buf: &[u8], max_name_len: usize) -> FsResult<Self> {
        let record_len = RECORD_HEADER_SIZE + max_name_len + 1;
        if buf.len() < record_len {
            return Err(FsError::MetadataUnreadable(format!(
                "record slot is {} bytes, expected {record_len}",
                buf.len()
            )));
        }
        let field = |at: usize| -> [u8; 8] {
            let mut out = [0u8; 8];
            out.copy_from_slice(&buf[at..at + 8]);
            out
        };
        let name_bytes = &buf[RECORD_HEADER_SIZE..record_len];
        let end = name_bytes
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(name_bytes.len());
        Ok(Self {
            name: String::from_utf8_lossy(&name_bytes[..end]).into_owned(),
            size: u64::from_le_bytes(field(8)),
            created_at: i64::from_le_bytes(field(16)),
            in_use: buf[0] == 1,
            start_block: i64::from_le_bytes(field(24)),
            block_count: u64::from_le_bytes(field(32)),
        })
    }
}

impl Volume {
    /// `format` clears the metadata region and writes an empty superblock.
    ///
    /// # Errors
    /// Returns an error if the metadata region cannot be written.
    pub fn format(&mut self) -> FsResult<()> {
        self.zero_metadata()?;
        self.write_superblock(Superblock::default())
    }

    /// # Errors
    /// Returns an error if the superblock cannot be read.
    pub fn read_superblock(&self) -> FsResult<Superblock> {
        let mut buf = [0u8; SUPERBLOCK_SIZE];
        self.read_bytes(0, &mut buf)?;
        Ok(Superblock::from_bytes(buf))
    }

    /// # Errors
    /// Returns an error if the superblock cannot be written.
    pub fn write_superblock(&mut self, superblock: Superblock) -> FsResult<()> {
        self.write_bytes(0, &superblock.to_bytes())
    }

    /// # Errors
    /// Returns an error if the bitmap cannot be read.
    pub fn read_bitmap(&self) -> FsResult<Bitmap> {
        let g = *self.geometry();
        let mut buf = vec![0u8; g.bitmap_size()];
        self.read_bytes(g.bitmap_offset(), &mut buf)?;
        Ok(Bitmap::from_bytes(buf, g.num_blocks()))
    }

    /// # Errors
    /// Returns an error if the bitmap cannot be written.
    pub fn write_bitmap(&mut self, bitmap: &Bitmap) -> FsResult<()> {
        let offset = self.geometry().bitmap_offset();
        self.write_bytes(offset, bitmap.as_bytes())
    }

    /// `read_record` decodes the record in slot `index`.
    ///
    /// # Errors
    /// Returns an error if `index` is not a table slot or the slot cannot be read.
    pub fn read_record(&self, index: usize) -> FsResult<FileRecord> {
        let g = *self.geometry();
        check_slot(index, g.max_files())?;
        let mut buf = vec![0u8; g.record_size()];
        self.read_bytes(g.record_offset(index), &mut buf)?;
        FileRecord::from_bytes(&buf, g.max_name_len())
    }

    /// `write_record` encodes `record` into slot `index`.
    ///
    /// # Errors
    /// Returns an error if `index` is not a table slot or the slot cannot be written.
    pub fn write_record(&mut self, index: usize, record: &FileRecord) -> FsResult<()> {
        let g = *self.geometry();
        check_slot(index, g.max_files())?;
        self.write_bytes(g.record_offset(index), &record.to_bytes(g.max_name_len()))
    }

    /// `read_table` decodes every record slot in slot order.
    ///
    /// # Errors
    /// Returns an error if the table cannot be read.
    pub fn read_table(&self) -> FsResult<Vec<FileRecord>> {
        let g = *self.geometry();
        let mut buf = vec![0u8; g.record_size() * g.max_files()];
        self.read_bytes(g.table_offset(), &mut buf)?;
        buf.chunks_exact(g.record_size())
            .map(|slot| FileRecord::from_bytes(slot, g.max_name_len()))
            .collect()
    }

    /// `write_table` encodes all records back to back from the first slot.
    ///
    /// # Errors
    /// Returns an error if more records than slots are given or the table
    /// cannot be written.
    pub fn write_table(&mut self, records: &[FileRecord]) -> FsResult<()> {
        let g = *self.geometry();
        if records.len() > g.max_files() {
            return Err(FsError::InvalidArgument("more records than table slots"));
        }
        let mut buf = Vec::with_capacity(g.record_size() * records.len());
        for record in records {
            buf.extend_from_slice(&record.to_bytes(g.max_name_len()));
        }
        self.write_bytes(g.table_offset(), &buf)
    }

    /// `read_superblock_and_table` loads the superblock followed by every record.
    ///
    /// # Errors
    /// Returns an error if either cannot be read.
    pub fn read_superblock_and_table(&self) -> FsResult<(Superblock, Vec<FileRecord>)> {
        let superblock = self.read_superblock()?;
        let records = self.read_table()?;
        Ok((superblock, records))
    }

    /// `write_record_and_superblock` persists one record and then the superblock.
    ///
    /// A failure after the record write leaves the stored count stale.
    ///
    /// # Errors
    /// Returns an error if either write fails.
    pub fn write_record_and_superblock(
        &mut self,
        index: usize,
        record: &FileRecord,
        superblock: Superblock,
    ) -> FsResult<()> {
        self.write_record(index, record)?;
        self.write_superblock(superblock)
    }
}

fn check_slot(index: usize, max_files: usize) -> FsResult<()> {
    if index >= max_files {
        return Err(FsError::InvalidArgument("record index out of range"));
    }
    Ok(())
}
