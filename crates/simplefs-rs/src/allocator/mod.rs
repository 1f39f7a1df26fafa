//! Free-space management over the on-disk bitmap.
//!
//! Allocation failures are reported as `None` and logged rather than raised;
//! callers turn a missing allocation into their own error.


use tracing::{debug, error, warn};

use crate::layout::bits::Bitmap;
use crate::metadata::BlockRun;
use crate::retention::volume::Volume;

/// `find_run` returns the first start index of `count` consecutive clear bits.
///
/// When a candidate window contains a set bit at `j`, the next candidate
/// starts at `j + 1`.
#[must_use]
pub fn find_run(bitmap: &Bitmap, count: u32) -> Option<u32> {
    if count == 0 {
        return None;
    }
    let total = u64::from(bitmap.len());
    let mut start = 0u32;
    while u64::from(start) + u64::from(count) <= total {
        match (start..start + count).find(|&i| bitmap.get(i)) {
            Some(used) => start = used + 1,
            None => return Some(start),
        }
    }
    None
}

impl Volume {
    fn load_bitmap_for(&self, op: &'static str) -> Option<Bitmap> {
        match self.read_bitmap() {
            Ok(bitmap) => Some(bitmap),
            Err(err) => {
                error!(op, %err, "failed to read block bitmap");
                None
            }
        }
    }

    fn store_bitmap_for(&mut self, op: &'static str, bitmap: &Bitmap) -> bool {
        match self.write_bitmap(bitmap) {
            Ok(()) => true,
            Err(err) => {
                error!(op, %err, "failed to write block bitmap");
                false
            }
        }
    }

    /// `allocate_one` claims the lowest free block.
    pub fn allocate_one(&mut self) -> Option<u32> {
        let mut bitmap = self.load_bitmap_for("allocate_one")?;
        let Some(block) = (0..bitmap.len()).find(|&i| !bitmap.get(i)) else {
            warn!("no free block available");
            return None;
        };
        bitmap.set(block, true);
        if !self.store_bitmap_for("allocate_one", &bitmap) {
            return None;
        }
        debug!(block, "allocated block");
        Some(block)
    }

    /// `allocate_contiguous` claims the first run of `count` free blocks.
    ///
    /// All bits of the run are set in a single bitmap write; nothing is
    /// claimed when no run fits.
    pub fn allocate_contiguous(&mut self, count: u32) -> Option<BlockRun> {
        let total = self.geometry().num_blocks();
        if count == 0 || count > total {
            warn!(count, total, "invalid contiguous allocation request");
            return None;
        }
        let mut bitmap = self.load_bitmap_for("allocate_contiguous")?;
        let Some(start) = find_run(&bitmap, count) else {
            warn!(count, "no run of contiguous free blocks");
            return None;
        };
        bitmap.set_range(start, count, true);
        if !self.store_bitmap_for("allocate_contiguous", &bitmap) {
            return None;
        }
        debug!(start, count, "allocated contiguous blocks");
        Some(BlockRun { start, count })
    }

    /// `free_block` releases one block. Freeing a free block only logs a warning.
    pub fn free_block(&mut self, block: u32) {
        self.free_blocks(block, 1);
    }

    /// `free_run` releases every block of `run` with one bitmap write.
    pub fn free_run(&mut self, run: BlockRun) {
        self.free_blocks(run.start, run.count);
    }

    fn free_blocks(&mut self, start: u32, count: u32) {
        let total = self.geometry().num_blocks();
        let end = u64::from(start) + u64::from(count);
        if end > u64::from(total) {
            warn!(start, count, total, "ignoring blocks past the end of the data region");
        }
        let Some(mut bitmap) = self.load_bitmap_for("free") else {
            return;
        };
        let mut changed = false;
        for block in start..start.saturating_add(count).min(total) {
            if bitmap.get(block) {
                bitmap.set(block, false);
                changed = true;
            } else {
                warn!(block, "block is already free");
            }
        }
        if changed && self.store_bitmap_for("free", &bitmap) {
            debug!(start, count, "freed blocks");
        }
    }
}
