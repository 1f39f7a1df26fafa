//! Error types returned by filesystem operations.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Broad category of an [`FsError`], used by callers that only care about the
/// kind of failure (for example to choose a process exit code).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    InvalidArgument,
    NotFound,
    Conflict,
    CapacityExhausted,
    Io,
}

/// Stage of an image copy that failed during backup or restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStep {
    OpenSource,
    CreateTarget,
    Read,
    Write,
}

impl fmt::Display for TransferStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let step = match self {
            Self::OpenSource => "open source",
            Self::CreateTarget => "create target",
            Self::Read => "read",
            Self::Write => "write",
        };
        f.write_str(step)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("file name is empty")]
    EmptyName,

    #[error("file name is {len} bytes long, limit is {max}")]
    NameTooLong { len: usize, max: usize },

    #[error("file name contains a NUL byte")]
    InvalidName,

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("file '{0}' not found")]
    NotFound(String),

    #[error("file '{0}' already exists")]
    AlreadyExists(String),

    #[error("file table is full ({max_files} files)")]
    TableFull { max_files: usize },

    #[error("no run of {blocks} contiguous free blocks")]
    NoSpace { blocks: u32 },

    #[error("offset {offset} is beyond the end of the file ({size} bytes)")]
    OffsetOutOfBounds { offset: u64, size: u64 },

    #[error("file '{0}' has a size but owns no blocks")]
    MissingBlocks(String),

    #[error("metadata is unreadable: {0}")]
    MetadataUnreadable(String),

    #[error("disk image is {actual} bytes, expected {expected}")]
    ImageSize { expected: u64, actual: u64 },

    #[error("access of {len} bytes at offset {offset} falls outside the disk image")]
    OutOfRange { offset: u64, len: usize },

    #[error("failed to {step} '{}': {source}", .path.display())]
    Transfer {
        step: TransferStep,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type FsResult<T> = Result<T, FsError>;

impl FsError {
    /// `class` groups the error into its broad failure category.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::EmptyName
            | Self::NameTooLong { .. }
            | Self::InvalidName
            | Self::InvalidArgument(_)
            | Self::OffsetOutOfBounds { .. } => ErrorClass::InvalidArgument,
            Self::NotFound(_) => ErrorClass::NotFound,
            Self::AlreadyExists(_) => ErrorClass::Conflict,
            Self::TableFull { .. } | Self::NoSpace { .. } => ErrorClass::CapacityExhausted,
            Self::MissingBlocks(_)
            | Self::MetadataUnreadable(_)
            | Self::ImageSize { .. }
            | Self::OutOfRange { .. }
            | Self::Transfer { .. }
            | Self::Io(_) => ErrorClass::Io,
        }
    }

    pub(crate) fn transfer(step: TransferStep, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Transfer {
            step,
            path: path.into(),
            source,
        }
    }
}
