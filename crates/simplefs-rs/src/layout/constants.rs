//! Default layout constants for a simplefs disk image.

/// BLOCK_SIZE is the size of one data block in bytes.
pub const BLOCK_SIZE: usize = 512;
/// DISK_SIZE is the total size of the disk image in bytes.
pub const DISK_SIZE: u64 = 1024 * 1024;
/// METADATA_SIZE is the size of the metadata region at the start of the image.
pub const METADATA_SIZE: usize = 4096;
/// MAX_NAME_LEN is the longest file name, in bytes, a record can hold.
pub const MAX_NAME_LEN: usize = 255;
/// SUPERBLOCK_SIZE is the byte size of the superblock (active file count).
pub const SUPERBLOCK_SIZE: usize = 4;
/// RECORD_HEADER_SIZE is the fixed-width part of a file record preceding the name.
pub const RECORD_HEADER_SIZE: usize = 40;
/// NO_START_BLOCK marks a record that owns no data blocks.
pub const NO_START_BLOCK: i64 = -1;
/// DEFAULT_IMAGE_NAME is the file name used for the disk image when none is given.
pub const DEFAULT_IMAGE_NAME: &str = "disk.sim";
/// COPY_CHUNK_SIZE is the chunk size used when streaming whole images.
pub const COPY_CHUNK_SIZE: usize = 1024;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_region_is_block_aligned() {
        assert_eq!((DISK_SIZE - METADATA_SIZE as u64) % BLOCK_SIZE as u64, 0);
    }

    #[test]
    fn superblock_fits_count() {
        assert_eq!(SUPERBLOCK_SIZE, std::mem::size_of::<i32>());
    }
}
