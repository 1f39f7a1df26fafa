use std::fmt;

use crate::metadata::FileRecord;

/// FileInfo describes one in-use file table slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub slot: usize,
    pub name: String,
    pub size: u64,
    /// Creation time in seconds since the Unix epoch.
    pub created_at: i64,
    pub start_block: Option<u32>,
    pub block_count: u32,
}

impl FileInfo {
    pub(crate) fn from_record(slot: usize, record: &FileRecord) -> Self {
        let run = record.run();
        Self {
            slot,
            name: record.name.clone(),
            size: record.size,
            created_at: record.created_at,
            start_block: run.map(|r| r.start),
            block_count: run.map_or(0, |r| r.count),
        }
    }
}

/// DiskUsage summarizes block and file table occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskUsage {
    pub block_size: usize,
    pub total_blocks: u32,
    pub used_blocks: u32,
    pub free_blocks: u32,
    pub active_files: usize,
    pub max_files: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffOutcome {
    Same,
    Different,
}

/// DefragReport summarizes one compaction pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DefragReport {
    /// In-use records visited.
    pub files_examined: usize,
    /// Files whose data was copied to a new start block.
    pub files_moved: usize,
    /// Blocks allocated after compaction; they form the prefix `[0, blocks_in_use)`.
    pub blocks_in_use: u32,
}

/// IntegrityIssue is one inconsistency between the superblock, the file
/// records and the bitmap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityIssue {
    CountMismatch {
        stored: i32,
        counted: usize,
    },
    SizeWithoutBlocks {
        slot: usize,
        name: String,
        size: u64,
    },
    BlocksWithoutSize {
        slot: usize,
        name: String,
        start_block: i64,
        block_count: u64,
    },
    BlockCountMismatch {
        slot: usize,
        name: String,
        size: u64,
        block_count: u64,
        expected: u32,
    },
    RangeOutOfBounds {
        slot: usize,
        name: String,
        start_block: i64,
        block_count: u64,
    },
    UnmarkedBlock {
        slot: usize,
        name: String,
        block: u32,
    },
    SharedBlock {
        slot: usize,
        name: String,
        block: u32,
        owner: usize,
    },
    LostBlock {
        block: u32,
    },
}

impl fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CountMismatch { stored, counted } => write!(
                f,
                "superblock counts {stored} active files but {counted} records are in use"
            ),
            Self::SizeWithoutBlocks { slot, name, size } => write!(
                f,
                "file '{name}' (slot {slot}) has size {size} but owns no blocks"
            ),
            Self::BlocksWithoutSize {
                slot,
                name,
                start_block,
                block_count,
            } => write!(
                f,
                "file '{name}' (slot {slot}) is empty but claims {block_count} blocks from {start_block}"
            ),
            Self::BlockCountMismatch {
                slot,
                name,
                size,
                block_count,
                expected,
            } => write!(
                f,
                "file '{name}' (slot {slot}) of {size} bytes owns {block_count} blocks, expected {expected}"
            ),
            Self::RangeOutOfBounds {
                slot,
                name,
                start_block,
                block_count,
            } => write!(
                f,
                "file '{name}' (slot {slot}) claims blocks {start_block}..+{block_count} outside the data region"
            ),
            Self::UnmarkedBlock { slot, name, block } => write!(
                f,
                "block {block} of file '{name}' (slot {slot}) is free in the bitmap"
            ),
            Self::SharedBlock {
                slot,
                name,
                block,
                owner,
            } => write!(
                f,
                "block {block} of file '{name}' (slot {slot}) is also claimed by slot {owner}"
            ),
            Self::LostBlock { block } => {
                write!(f, "block {block} is allocated but no file claims it")
            }
        }
    }
}

/// IntegrityReport lists every issue found by one check.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IntegrityReport {
    pub issues: Vec<IntegrityIssue>,
}

impl IntegrityReport {
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.issues.is_empty()
    }

    #[must_use]
    pub fn issue_count(&self) -> usize {
        self.issues.len()
    }
}

/// BackupSummary describes a completed image backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackupSummary {
    pub bytes: u64,
    /// SHA-256 of the copied bytes.
    pub checksum: [u8; 32],
}

/// RestoreSummary describes a completed restore and the integrity check run
/// on the restored image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreSummary {
    pub bytes: u64,
    pub checksum: [u8; 32],
    /// `None` when the restored image could not be checked.
    pub integrity: Option<IntegrityReport>,
}

fn checksum_hex(checksum: &[u8; 32]) -> String {
    checksum.iter().fold(String::with_capacity(64), |mut out, b| {
        use fmt::Write as _;
        let _ = write!(out, "{b:02x}");
        out
    })
}

impl BackupSummary {
    #[must_use]
    pub fn checksum_hex(&self) -> String {
        checksum_hex(&self.checksum)
    }
}

impl RestoreSummary {
    #[must_use]
    pub fn checksum_hex(&self) -> String {
        checksum_hex(&self.checksum)
    }
}
