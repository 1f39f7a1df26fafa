use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::{info, warn};

use super::SimpleFs;
use super::types::{BackupSummary, RestoreSummary};
use crate::error::{FsError, FsResult, TransferStep};
use crate::layout::constants::COPY_CHUNK_SIZE;

impl SimpleFs {
    /// `backup` copies the whole image byte for byte to `path`.
    ///
    /// # Errors
    /// Returns an error if `path` is empty or names the live image, or if the
    /// image cannot be read or the backup cannot be created or written.
    pub fn backup(&self, path: impl AsRef<Path>) -> FsResult<BackupSummary> {
        let path = path.as_ref();
        self.backup_inner(path)
            .inspect(|s| {
                info!(
                    path = %path.display(),
                    bytes = s.bytes,
                    sha256 = %s.checksum_hex(),
                    "backup written"
                );
            })
            .inspect_err(|err| warn!(path = %path.display(), %err, "backup failed"))
    }

    fn backup_inner(&self, path: &Path) -> FsResult<BackupSummary> {
        if path.as_os_str().is_empty() {
            return Err(FsError::InvalidArgument("backup path is empty"));
        }
        if path == self.path() {
            return Err(FsError::InvalidArgument("backup path is the live image"));
        }
        drop(self.open_volume()?);
        let (bytes, checksum) = stream_copy(self.path(), path)?;
        Ok(BackupSummary { bytes, checksum })
    }

    /// `restore` overwrites the live image with the backup at `path` and then
    /// runs the integrity check on the result. The check's outcome is
    /// reported but never fails the restore.
    ///
    /// # Errors
    /// Returns an error if `path` is empty, the backup has the wrong size, or
    /// the copy fails.
    pub fn restore(&self, path: impl AsRef<Path>) -> FsResult<RestoreSummary> {
        let path = path.as_ref();
        self.restore_inner(path)
            .inspect(|s| {
                info!(
                    path = %path.display(),
                    bytes = s.bytes,
                    sha256 = %s.checksum_hex(),
                    "image restored"
                );
            })
            .inspect_err(|err| warn!(path = %path.display(), %err, "restore failed"))
    }

    fn restore_inner(&self, path: &Path) -> FsResult<RestoreSummary> {
        if path.as_os_str().is_empty() {
            return Err(FsError::InvalidArgument("restore path is empty"));
        }
        if path == self.path() {
            return Err(FsError::InvalidArgument("restore path is the live image"));
        }
        let actual = std::fs::metadata(path)
            .map_err(|err| FsError::transfer(TransferStep::OpenSource, path, err))?
            .len();
        let expected = self.geometry().disk_size();
        if actual != expected {
            return Err(FsError::ImageSize { expected, actual });
        }

        let (bytes, checksum) = stream_copy(path, self.path())?;
        let integrity = match self.check_integrity() {
            Ok(report) => Some(report),
            Err(err) => {
                warn!(%err, "restored image could not be checked");
                None
            }
        };
        Ok(RestoreSummary {
            bytes,
            checksum,
            integrity,
        })
    }
}

/// `stream_copy` copies `src` to `dst` (created or truncated) in fixed-size
/// chunks and returns the byte count and SHA-256 of what was copied.
fn stream_copy(src: &Path, dst: &Path) -> FsResult<(u64, [u8; 32])> {
    let mut input =
        File::open(src).map_err(|err| FsError::transfer(TransferStep::OpenSource, src, err))?;
    let mut output = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(dst)
        .map_err(|err| FsError::transfer(TransferStep::CreateTarget, dst, err))?;

    let mut hasher = Sha256::new();
    let mut chunk = [0u8; COPY_CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let n = match input.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(FsError::transfer(TransferStep::Read, src, err)),
        };
        output
            .write_all(&chunk[..n])
            .map_err(|err| FsError::transfer(TransferStep::Write, dst, err))?;
        hasher.update(&chunk[..n]);
        total += n as u64;
    }
    output
        .flush()
        .map_err(|err| FsError::transfer(TransferStep::Write, dst, err))?;
    Ok((total, hasher.finalize().into()))
}
