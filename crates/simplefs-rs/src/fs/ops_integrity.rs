use tracing::{info, warn};

use super::SimpleFs;
use super::types::{IntegrityIssue, IntegrityReport};
use crate::error::FsResult;
use crate::layout::Geometry;
use crate::layout::bits::Bitmap;
use crate::layout::constants::NO_START_BLOCK;
use crate::metadata::{FileRecord, Superblock};

impl SimpleFs {
    /// `check_integrity` cross-checks the superblock, the file records and the
    /// bitmap. It never modifies the image.
    ///
    /// # Errors
    /// Returns an error only if the metadata cannot be read; inconsistencies
    /// are reported in the returned [`IntegrityReport`].
    pub fn check_integrity(&self) -> FsResult<IntegrityReport> {
        let volume = self.open_volume()?;
        let (superblock, records) = volume.read_superblock_and_table()?;
        let bitmap = volume.read_bitmap()?;

        let report = inspect(volume.geometry(), superblock, &records, &bitmap);
        for issue in &report.issues {
            warn!(%issue, "integrity violation");
        }
        if report.is_consistent() {
            info!("integrity check passed");
        } else {
            warn!(issues = report.issue_count(), "integrity check failed");
        }
        Ok(report)
    }
}

/// `inspect` collects every inconsistency between the given metadata parts.
pub(crate) fn inspect(
    geometry: &Geometry,
    superblock: Superblock,
    records: &[FileRecord],
    bitmap: &Bitmap,
) -> IntegrityReport {
    let mut issues = Vec::new();
    let num_blocks = geometry.num_blocks();

    let counted = records.iter().filter(|r| r.in_use).count();
    if superblock.file_count() != Some(counted) {
        issues.push(IntegrityIssue::CountMismatch {
            stored: superblock.active_file_count,
            counted,
        });
    }

    let mut owner: Vec<Option<usize>> = vec![None; num_blocks as usize];
    for (slot, record) in records.iter().enumerate().filter(|(_, r)| r.in_use) {
        let name = || record.name.clone();
        let has_blocks = record.block_count > 0 || record.start_block != NO_START_BLOCK;

        if record.size == 0 {
            if has_blocks {
                issues.push(IntegrityIssue::BlocksWithoutSize {
                    slot,
                    name: name(),
                    start_block: record.start_block,
                    block_count: record.block_count,
                });
            }
            continue;
        }
        if record.block_count == 0 {
            issues.push(IntegrityIssue::SizeWithoutBlocks {
                slot,
                name: name(),
                size: record.size,
            });
            continue;
        }
        let expected = geometry.blocks_for(record.size);
        if record.block_count != u64::from(expected) {
            issues.push(IntegrityIssue::BlockCountMismatch {
                slot,
                name: name(),
                size: record.size,
                block_count: record.block_count,
                expected,
            });
        }

        let Some(run) = record
            .run()
            .filter(|run| run.end() <= u64::from(num_blocks))
        else {
            issues.push(IntegrityIssue::RangeOutOfBounds {
                slot,
                name: name(),
                start_block: record.start_block,
                block_count: record.block_count,
            });
            continue;
        };
        for block in run.blocks() {
            if !bitmap.get(block) {
                issues.push(IntegrityIssue::UnmarkedBlock {
                    slot,
                    name: name(),
                    block,
                });
            }
            match owner[block as usize] {
                Some(first) => issues.push(IntegrityIssue::SharedBlock {
                    slot,
                    name: name(),
                    block,
                    owner: first,
                }),
                None => owner[block as usize] = Some(slot),
            }
        }
    }

    for block in bitmap.iter_set() {
        if owner[block as usize].is_none() {
            issues.push(IntegrityIssue::LostBlock { block });
        }
    }

    IntegrityReport { issues }
}
