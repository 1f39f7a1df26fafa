#[cfg(test)]
mod image_tests;

use memmap2::{MmapMut, MmapOptions};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{FsError, FsResult};

/// Image is a fixed-length disk image file mapped into memory for the duration
/// of one filesystem call.
pub struct Image {
    path: PathBuf,
    map: MmapMut,
    len: u64,
    _file: File,
}

impl Image {
    /// `create_zeroed` creates (or truncates) the image at `path` and sizes it to
    /// `len` zero bytes.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created, sized or mapped.
    pub fn create_zeroed(path: &Path, len: u64) -> FsResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(len)?;
        Self::map(path, file, len)
    }

    /// `open` maps an existing image whose length must be exactly `len`.
    ///
    /// # Errors
    /// Returns an error if the file is missing, has a different length, or
    /// cannot be mapped.
    pub fn open(path: &Path, len: u64) -> FsResult<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let actual = file.metadata()?.len();
        if actual != len {
            return Err(FsError::ImageSize {
                expected: len,
                actual,
            });
        }
        Self::map(path, file, len)
    }

    fn map(path: &Path, file: File, len: u64) -> FsResult<Self> {
        let map_len = usize::try_from(len).map_err(|_| {
            io::Error::other(format!("image length {len} exceeds addressable size"))
        })?;
        let map = unsafe { MmapOptions::new().len(map_len).map_mut(&file)? };
        Ok(Self {
            path: path.to_path_buf(),
            map,
            len,
            _file: file,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn len(&self) -> u64 {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whole image contents.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.map
    }

    /// `read_at` fills `buf` from byte offset `off`.
    ///
    /// # Errors
    /// Returns [`FsError::OutOfRange`] if any part of the range lies past the end
    /// of the image; nothing is read in that case.
    pub fn read_at(&self, off: u64, buf: &mut [u8]) -> FsResult<()> {
        let range = self.range(off, buf.len())?;
        buf.copy_from_slice(&self.map[range]);
        Ok(())
    }

    /// `write_at` copies `data` into the image at byte offset `off`.
    ///
    /// # Errors
    /// Returns [`FsError::OutOfRange`] if any part of the range lies past the end
    /// of the image; nothing is written in that case.
    pub fn write_at(&mut self, off: u64, data: &[u8]) -> FsResult<()> {
        let range = self.range(off, data.len())?;
        self.map[range].copy_from_slice(data);
        Ok(())
    }

    /// `zero_range` clears `len` bytes starting at `off`.
    ///
    /// # Errors
    /// Returns [`FsError::OutOfRange`] if the range lies past the end of the image.
    pub fn zero_range(&mut self, off: u64, len: usize) -> FsResult<()> {
        let range = self.range(off, len)?;
        self.map[range].fill(0);
        Ok(())
    }

    fn range(&self, off: u64, len: usize) -> FsResult<std::ops::Range<usize>> {
        let out_of_range = || FsError::OutOfRange { offset: off, len };
        let start = usize::try_from(off).map_err(|_| out_of_range())?;
        let end = start.checked_add(len).ok_or_else(out_of_range)?;
        if end > self.map.len() {
            return Err(out_of_range());
        }
        Ok(start..end)
    }
}
