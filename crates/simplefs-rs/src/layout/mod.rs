//! Byte layout of a simplefs disk image.
//!
//! ```text
//! [0, 4)                         superblock: active file count (i32 LE)
//! [4, 4 + bitmap)                free-space bitmap, one bit per data block
//! [table, table + n * record)    flat file table
//! [metadata_size, disk_size)     data blocks
//! ```

pub mod bits;
pub mod constants;


use anyhow::bail;

use constants::{
    BLOCK_SIZE, DISK_SIZE, MAX_NAME_LEN, METADATA_SIZE, RECORD_HEADER_SIZE, SUPERBLOCK_SIZE,
};

/// Geometry holds the four base sizes of an image and every offset derived from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    block_size: usize,
    disk_size: u64,
    metadata_size: usize,
    max_name_len: usize,
    num_blocks: u32,
    bitmap_size: usize,
    record_size: usize,
    max_files: usize,
}

impl Default for Geometry {
    fn default() -> Self {
        Self::derive(BLOCK_SIZE, DISK_SIZE, METADATA_SIZE, MAX_NAME_LEN)
    }
}

impl Geometry {
    /// `new` validates the base sizes and computes the derived layout.
    ///
    /// # Arguments
    /// * `block_size` - Size of a data block in bytes.
    /// * `disk_size` - Total size of the image in bytes.
    /// * `metadata_size` - Size of the metadata region at the start of the image.
    /// * `max_name_len` - Longest file name a record can hold, in bytes.
    ///
    /// # Errors
    /// Returns an error if the sizes cannot describe a usable image.
    pub fn new(
        block_size: usize,
        disk_size: u64,
        metadata_size: usize,
        max_name_len: usize,
    ) -> anyhow::Result<Self> {
        if block_size == 0 {
            bail!("block size must be non-zero");
        }
        if max_name_len == 0 {
            bail!("maximum name length must be non-zero");
        }
        match (RECORD_HEADER_SIZE + 1).checked_add(max_name_len) {
            Some(record_size) if record_size <= metadata_size => {}
            _ => bail!(
                "maximum name length {max_name_len} leaves no room for a file record in \
                 {metadata_size} bytes of metadata"
            ),
        }
        let Ok(metadata_len) = u64::try_from(metadata_size) else {
            bail!("metadata size {metadata_size} is not addressable");
        };
        if metadata_len >= disk_size {
            bail!("metadata size {metadata_size} must be smaller than disk size {disk_size}");
        }
        if usize::try_from(disk_size).is_err() {
            bail!("disk size {disk_size} exceeds addressable size");
        }
        let blocks = (disk_size - metadata_len) / block_size as u64;
        if blocks == 0 {
            bail!("disk size {disk_size} leaves no room for a {block_size}-byte data block");
        }
        if u32::try_from(blocks).is_err() {
            bail!("{blocks} data blocks exceed the addressable block count");
        }

        let geometry = Self::derive(block_size, disk_size, metadata_size, max_name_len);
        if SUPERBLOCK_SIZE + geometry.bitmap_size > metadata_size {
            bail!(
                "bitmap of {} bytes does not fit in {metadata_size} bytes of metadata",
                geometry.bitmap_size
            );
        }
        if geometry.max_files == 0 {
            bail!(
                "metadata region of {metadata_size} bytes has no room for a {}-byte file record",
                geometry.record_size
            );
        }
        Ok(geometry)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn derive(block_size: usize, disk_size: u64, metadata_size: usize, max_name_len: usize) -> Self {
        let num_blocks = ((disk_size - metadata_size as u64) / block_size as u64) as u32;
        let bitmap_size = (num_blocks as usize).div_ceil(8);
        let record_size = RECORD_HEADER_SIZE + max_name_len + 1;
        let max_files = metadata_size.saturating_sub(SUPERBLOCK_SIZE + bitmap_size) / record_size;
        Self {
            block_size,
            disk_size,
            metadata_size,
            max_name_len,
            num_blocks,
            bitmap_size,
            record_size,
            max_files,
        }
    }

    #[must_use]
    pub const fn block_size(&self) -> usize {
        self.block_size
    }

    #[must_use]
    pub const fn disk_size(&self) -> u64 {
        self.disk_size
    }

    #[must_use]
    pub const fn metadata_size(&self) -> usize {
        self.metadata_size
    }

    #[must_use]
    pub const fn max_name_len(&self) -> usize {
        self.max_name_len
    }

    /// Number of data blocks following the metadata region.
    #[must_use]
    pub const fn num_blocks(&self) -> u32 {
        self.num_blocks
    }

    #[must_use]
    pub const fn bitmap_size(&self) -> usize {
        self.bitmap_size
    }

    #[must_use]
    pub const fn superblock_size(&self) -> usize {
        SUPERBLOCK_SIZE
    }

    #[must_use]
    pub const fn bitmap_offset(&self) -> u64 {
        SUPERBLOCK_SIZE as u64
    }

    /// Byte offset of the first file record.
    #[must_use]
    pub const fn table_offset(&self) -> u64 {
        (SUPERBLOCK_SIZE + self.bitmap_size) as u64
    }

    #[must_use]
    pub const fn record_size(&self) -> usize {
        self.record_size
    }

    /// Number of records that fit after the superblock and bitmap.
    #[must_use]
    pub const fn max_files(&self) -> usize {
        self.max_files
    }

    /// `record_offset` returns the byte offset of the record in slot `index`.
    #[must_use]
    pub const fn record_offset(&self, index: usize) -> u64 {
        self.table_offset() + (index * self.record_size) as u64
    }

    /// `block_offset` returns the byte offset of data block `block`.
    #[must_use]
    pub const fn block_offset(&self, block: u32) -> u64 {
        self.metadata_size as u64 + block as u64 * self.block_size as u64
    }

    /// `blocks_for` returns how many blocks are needed to hold `len` bytes.
    ///
    /// # Returns
    /// `ceil(len / block_size)`, saturated to `u32::MAX`.
    #[must_use]
    pub fn blocks_for(&self, len: u64) -> u32 {
        u32::try_from(len.div_ceil(self.block_size as u64)).unwrap_or(u32::MAX)
    }

    /// Bytes available to file contents.
    #[must_use]
    pub const fn data_capacity(&self) -> u64 {
        self.num_blocks as u64 * self.block_size as u64
    }
}
