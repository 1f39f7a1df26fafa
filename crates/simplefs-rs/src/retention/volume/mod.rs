
use std::path::Path;

use crate::error::{FsError, FsResult};
use crate::layout::Geometry;
use crate::retention::image::Image;

/// Volume pairs a mapped image with its geometry and addresses it by region:
/// raw metadata bytes or data blocks.
pub struct Volume {
    image: Image,
    geometry: Geometry,
}

impl Volume {
    /// `create` lays down a fresh zero-filled image, which is also a formatted
    /// empty filesystem (zero active files, empty bitmap and table).
    ///
    /// # Errors
    /// Returns an error if the image cannot be created or mapped.
    pub fn create(path: &Path, geometry: Geometry) -> FsResult<Self> {
        let image = Image::create_zeroed(path, geometry.disk_size())?;
        Ok(Self { image, geometry })
    }

    /// `open` maps an existing image laid out with `geometry`.
    ///
    /// # Errors
    /// Returns an error if the image is missing, mis-sized or cannot be mapped.
    pub fn open(path: &Path, geometry: Geometry) -> FsResult<Self> {
        let image = Image::open(path, geometry.disk_size())?;
        Ok(Self { image, geometry })
    }

    #[must_use]
    pub const fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// # Errors
    /// Returns an error if the range lies outside the image.
    pub fn read_bytes(&self, offset: u64, buf: &mut [u8]) -> FsResult<()> {
        self.image.read_at(offset, buf)
    }

    /// # Errors
    /// Returns an error if the range lies outside the image.
    pub fn write_bytes(&mut self, offset: u64, data: &[u8]) -> FsResult<()> {
        self.image.write_at(offset, data)
    }

    /// `zero_metadata` clears the whole metadata region.
    ///
    /// # Errors
    /// Returns an error if the metadata region lies outside the image.
    pub fn zero_metadata(&mut self) -> FsResult<()> {
        self.image.zero_range(0, self.geometry.metadata_size())
    }

    /// `read_run` reads `buf.len()` bytes from a contiguous run of blocks that
    /// starts at block `start`, beginning `offset` bytes into the run.
    ///
    /// The first block is read from `offset % block_size`, every following block
    /// from its first byte.
    ///
    /// # Errors
    /// Returns an error if any touched block is outside the data region.
    pub fn read_run(&self, start: u32, offset: u64, buf: &mut [u8]) -> FsResult<()> {
        let block_size = self.geometry.block_size();
        let mut block = self.run_block(start, offset / block_size as u64)?;
        let mut in_block = (offset % block_size as u64) as usize;
        let mut done = 0usize;
        while done < buf.len() {
            self.check_block(block)?;
            let n = (block_size - in_block).min(buf.len() - done);
            let at = self.geometry.block_offset(block) + in_block as u64;
            self.image.read_at(at, &mut buf[done..done + n])?;
            done += n;
            in_block = 0;
            block = block.saturating_add(1);
        }
        Ok(())
    }

    /// `write_run` writes `data` block by block starting at the first byte of
    /// block `start`.
    ///
    /// # Errors
    /// Returns an error if any touched block is outside the data region.
    pub fn write_run(&mut self, start: u32, data: &[u8]) -> FsResult<()> {
        let mut block = start;
        for chunk in data.chunks(self.geometry.block_size()) {
            self.check_block(block)?;
            let at = self.geometry.block_offset(block);
            self.image.write_at(at, chunk)?;
            block = block.saturating_add(1);
        }
        Ok(())
    }

    fn run_block(&self, start: u32, skip: u64) -> FsResult<u32> {
        u32::try_from(u64::from(start) + skip).map_err(|_| FsError::OutOfRange {
            offset: self.geometry.block_offset(start),
            len: 0,
        })
    }

    fn check_block(&self, block: u32) -> FsResult<()> {
        if block >= self.geometry.num_blocks() {
            return Err(FsError::OutOfRange {
                offset: self.geometry.block_offset(block),
                len: self.geometry.block_size(),
            });
        }
        Ok(())
    }
}
