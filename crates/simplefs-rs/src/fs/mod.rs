//! The filesystem service: every public operation on a simplefs image.

mod ops_backup;
mod ops_defrag;
mod ops_integrity;
mod ops_io;
mod ops_table;
mod types;

pub use types::{
    BackupSummary, DefragReport, DiffOutcome, DiskUsage, FileInfo, IntegrityIssue,
    IntegrityReport, RestoreSummary,
};

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::FsResult;
use crate::layout::Geometry;
use crate::layout::constants::DEFAULT_IMAGE_NAME;
use crate::retention::volume::Volume;

/// SimpleFs operates on one disk image file.
///
/// The image is opened at the start of each call and closed before it returns,
/// so a `SimpleFs` holds no metadata between calls. A missing image is created
/// and formatted on first use.
#[derive(Debug, Clone)]
pub struct SimpleFs {
    path: PathBuf,
    geometry: Geometry,
}

impl Default for SimpleFs {
    fn default() -> Self {
        Self::with_defaults(DEFAULT_IMAGE_NAME)
    }
}

impl SimpleFs {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, geometry: Geometry) -> Self {
        Self {
            path: path.into(),
            geometry,
        }
    }

    /// `with_defaults` uses the default 1 MiB geometry.
    #[must_use]
    pub fn with_defaults(path: impl Into<PathBuf>) -> Self {
        Self::new(path, Geometry::default())
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// `init` makes sure the image exists, creating and formatting it if not.
    ///
    /// # Errors
    /// Returns an error if the image cannot be created, or exists with the
    /// wrong size.
    pub fn init(&self) -> FsResult<()> {
        self.open_volume().map(drop)?;
        info!(path = %self.path.display(), "filesystem initialized");
        Ok(())
    }

    /// `format` resets the metadata region to an empty filesystem. Data blocks
    /// keep their bytes but are no longer referenced.
    ///
    /// # Errors
    /// Returns an error if the image cannot be opened or written.
    pub fn format(&self) -> FsResult<()> {
        let mut volume = self.open_volume()?;
        volume.format()?;
        let g = self.geometry;
        info!(
            path = %self.path.display(),
            max_files = g.max_files(),
            blocks = g.num_blocks(),
            bitmap_bytes = g.bitmap_size(),
            record_bytes = g.record_size(),
            table_offset = g.table_offset(),
            "disk formatted"
        );
        Ok(())
    }

    pub(crate) fn open_volume(&self) -> FsResult<Volume> {
        if self.path.exists() {
            return Volume::open(&self.path, self.geometry);
        }
        info!(
            path = %self.path.display(),
            bytes = self.geometry.disk_size(),
            "disk image not found, creating"
        );
        let mut volume = Volume::create(&self.path, self.geometry)?;
        volume.format()?;
        Ok(volume)
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    use tempfile::TempDir;

    use super::SimpleFs;

    /// `temp_fs` returns a filesystem whose image lives in a fresh temp dir.
    ///
    /// The image is not created until the first operation.
    pub fn temp_fs() -> (TempDir, SimpleFs) {
        let dir = TempDir::new().expect("tmp dir");
        let fs = SimpleFs::with_defaults(dir.path().join("disk.sim"));
        (dir, fs)
    }

    /// `file_with` creates `name` holding `data`.
    pub fn file_with(fs: &SimpleFs, name: &str, data: &[u8]) {
        fs.create(name).expect("create");
        fs.write(name, data).expect("write");
    }

    /// `assert_consistent` fails the test if the integrity check finds issues.
    pub fn assert_consistent(fs: &SimpleFs) {
        let report = fs.check_integrity().expect("integrity check");
        assert!(report.is_consistent(), "unexpected issues: {:?}", report.issues);
    }
}
