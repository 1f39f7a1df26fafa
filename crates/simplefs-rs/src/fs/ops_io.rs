use std::io::Write;

use tracing::{error, info, warn};

use super::SimpleFs;
use super::types::DiffOutcome;
use crate::error::{FsError, FsResult};
use crate::metadata::FileRecord;
use crate::retention::volume::Volume;
use crate::table::{FileTable, validate_name};

impl SimpleFs {
    /// `write` replaces the whole content of an existing file with `data`.
    ///
    /// The old blocks are released before the new run is allocated. If no run
    /// of the needed length is free, or the data cannot be written, the file is
    /// left empty and its previous content is lost.
    ///
    /// # Returns
    /// The number of bytes written.
    ///
    /// # Errors
    /// Returns an error if the name is invalid, no such file exists, there is
    /// no contiguous space for the data, or the image cannot be read or written.
    pub fn write(&self, name: &str, data: &[u8]) -> FsResult<usize> {
        self.with_file(name, |volume, table, slot| {
            store(volume, table, slot, data)
        })
        .inspect(|n| info!(name, bytes = *n, "file written"))
        .inspect_err(|err| warn!(name, %err, "write failed"))
    }

    /// `read` returns up to `size` bytes starting at `offset`.
    ///
    /// Reading an empty file yields no bytes for any offset. On a non-empty
    /// file the result is cut at the end of the file.
    ///
    /// # Errors
    /// Returns an error if the name is invalid, no such file exists, `offset`
    /// is at or past the end of a non-empty file, or the data cannot be read.
    pub fn read(&self, name: &str, offset: u64, size: usize) -> FsResult<Vec<u8>> {
        self.with_file(name, |volume, table, slot| {
            read_range(volume, table.record(slot), offset, size)
        })
        .inspect(|buf| info!(name, offset, bytes = buf.len(), "file read"))
        .inspect_err(|err| warn!(name, offset, size, %err, "read failed"))
    }

    /// `cat` streams the whole file into `sink`.
    ///
    /// # Returns
    /// The number of bytes written to `sink`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or `sink` fails.
    pub fn cat(&self, name: &str, sink: &mut impl Write) -> FsResult<u64> {
        let content = self.with_file(name, |volume, table, slot| {
            read_all(volume, table.record(slot))
        })?;
        sink.write_all(&content)?;
        Ok(content.len() as u64)
    }

    /// `append` adds `data` to the end of the file by rewriting it whole.
    ///
    /// # Returns
    /// The new file size.
    ///
    /// # Errors
    /// Same as [`SimpleFs::write`]; on a failed rewrite the file is left empty.
    pub fn append(&self, name: &str, data: &[u8]) -> FsResult<u64> {
        self.with_file(name, |volume, table, slot| {
            if data.is_empty() {
                info!(name, "nothing to append");
                return Ok(table.record(slot).size);
            }
            let mut content = read_all(volume, table.record(slot))?;
            content.extend_from_slice(data);
            store(volume, table, slot, &content)?;
            Ok(content.len() as u64)
        })
        .inspect(|size| info!(name, appended = data.len(), size = *size, "file appended"))
        .inspect_err(|err| warn!(name, %err, "append failed"))
    }

    /// `truncate` shrinks the file to `new_size` bytes, or grows it with zero
    /// bytes up to `new_size`.
    ///
    /// # Errors
    /// Same as [`SimpleFs::write`]; on a failed rewrite the file is left empty.
    pub fn truncate(&self, name: &str, new_size: u64) -> FsResult<()> {
        self.with_file(name, |volume, table, slot| {
            let current = table.record(slot).size;
            if new_size == current {
                info!(name, size = current, "size unchanged, nothing to truncate");
                return Ok(());
            }
            if new_size == 0 {
                return store(volume, table, slot, &[]).map(drop);
            }
            let content = if new_size < current {
                let keep = usize::try_from(new_size)
                    .map_err(|_| FsError::InvalidArgument("size is not addressable"))?;
                read_range(volume, table.record(slot), 0, keep)?
            } else {
                let capacity = volume.geometry().data_capacity();
                if new_size > capacity {
                    let blocks = volume.geometry().blocks_for(new_size);
                    store(volume, table, slot, &[])?;
                    return Err(FsError::NoSpace { blocks });
                }
                let mut content = read_all(volume, table.record(slot))?;
                content.resize(usize::try_from(new_size).unwrap_or(usize::MAX), 0);
                content
            };
            store(volume, table, slot, &content).map(drop)
        })
        .inspect(|_| info!(name, new_size, "file truncated"))
        .inspect_err(|err| warn!(name, new_size, %err, "truncate failed"))
    }

    /// `copy` creates `dst` with the content of `src`.
    ///
    /// If the content cannot be written to `dst`, `dst` is removed again.
    ///
    /// # Returns
    /// The number of bytes copied.
    ///
    /// # Errors
    /// Returns an error if either name is invalid, they are equal, `src` is
    /// missing, `dst` exists, the table is full, or there is no space.
    pub fn copy(&self, src: &str, dst: &str) -> FsResult<u64> {
        self.copy_inner(src, dst)
            .inspect(|n| info!(src, dst, bytes = *n, "file copied"))
            .inspect_err(|err| warn!(src, dst, %err, "copy failed"))
    }

    fn copy_inner(&self, src: &str, dst: &str) -> FsResult<u64> {
        let max = self.geometry().max_name_len();
        validate_name(src, max)?;
        validate_name(dst, max)?;
        if src == dst {
            return Err(FsError::InvalidArgument(
                "source and destination are the same file",
            ));
        }
        let mut volume = self.open_volume()?;
        let mut table = FileTable::load(&volume)?;
        let src_slot = table.find(src)?;
        if table.lookup(dst).is_some() {
            return Err(FsError::AlreadyExists(dst.to_owned()));
        }
        let content = read_all(&volume, table.record(src_slot))?;

        let dst_slot = table.claim(dst)?;
        table.persist(&mut volume, dst_slot)?;
        if content.is_empty() {
            return Ok(0);
        }
        if let Err(err) = store(&mut volume, &mut table, dst_slot, &content) {
            warn!(dst, %err, "removing partially created copy");
            table.release(dst_slot);
            table.persist(&mut volume, dst_slot)?;
            return Err(err);
        }
        Ok(content.len() as u64)
    }

    /// `diff` compares two files byte by byte. A name compared with itself is
    /// always the same.
    ///
    /// # Errors
    /// Returns an error if either name is invalid, either file is missing, or
    /// the content cannot be read.
    pub fn diff(&self, a: &str, b: &str) -> FsResult<DiffOutcome> {
        self.diff_inner(a, b)
            .inspect(|outcome| info!(a, b, ?outcome, "files compared"))
            .inspect_err(|err| warn!(a, b, %err, "diff failed"))
    }

    fn diff_inner(&self, a: &str, b: &str) -> FsResult<DiffOutcome> {
        let max = self.geometry().max_name_len();
        validate_name(a, max)?;
        validate_name(b, max)?;
        if a == b {
            return Ok(DiffOutcome::Same);
        }
        let volume = self.open_volume()?;
        let table = FileTable::load(&volume)?;
        let (ra, rb) = (table.record(table.find(a)?), table.record(table.find(b)?));
        if ra.size != rb.size {
            return Ok(DiffOutcome::Different);
        }
        if read_all(&volume, ra)? == read_all(&volume, rb)? {
            Ok(DiffOutcome::Same)
        } else {
            Ok(DiffOutcome::Different)
        }
    }

    /// `with_file` opens the image, loads the table, resolves `name` and runs
    /// `op` on the slot.
    fn with_file<T>(
        &self,
        name: &str,
        op: impl FnOnce(&mut Volume, &mut FileTable, usize) -> FsResult<T>,
    ) -> FsResult<T> {
        validate_name(name, self.geometry().max_name_len())?;
        let mut volume = self.open_volume()?;
        let mut table = FileTable::load(&volume)?;
        let slot = table.find(name)?;
        op(&mut volume, &mut table, slot)
    }
}

/// `store` replaces the content of `slot` with `data` and persists the record.
///
/// On allocation or write failure the record is persisted empty before the
/// error is returned.
fn store(volume: &mut Volume, table: &mut FileTable, slot: usize, data: &[u8]) -> FsResult<usize> {
    if let Some(run) = table.record(slot).run() {
        volume.free_run(run);
    }
    table.record_mut(slot).set_empty();
    if data.is_empty() {
        table.persist(volume, slot)?;
        return Ok(0);
    }

    let needed = volume.geometry().blocks_for(data.len() as u64);
    let Some(run) = volume.allocate_contiguous(needed) else {
        table.persist(volume, slot)?;
        return Err(FsError::NoSpace { blocks: needed });
    };
    if let Err(err) = volume.write_run(run.start, data) {
        error!(start = run.start, count = run.count, %err, "data write failed");
        volume.free_run(run);
        table.persist(volume, slot)?;
        return Err(err);
    }
    table
        .record_mut(slot)
        .set_contents(data.len() as u64, run);
    table.persist(volume, slot)?;
    Ok(data.len())
}

fn read_all(volume: &Volume, record: &FileRecord) -> FsResult<Vec<u8>> {
    let len = usize::try_from(record.size)
        .map_err(|_| FsError::MetadataUnreadable(format!("file '{}' is too large", record.name)))?;
    read_range(volume, record, 0, len)
}

fn read_range(volume: &Volume, record: &FileRecord, offset: u64, size: usize) -> FsResult<Vec<u8>> {
    if record.size == 0 {
        return Ok(Vec::new());
    }
    if offset >= record.size {
        return Err(FsError::OffsetOutOfBounds {
            offset,
            size: record.size,
        });
    }
    if size == 0 {
        return Ok(Vec::new());
    }
    let run = record
        .run()
        .ok_or_else(|| FsError::MissingBlocks(record.name.clone()))?;
    let len = (size as u64).min(record.size - offset);
    let owned = u64::from(run.count) * volume.geometry().block_size() as u64;
    if offset + len > owned {
        return Err(FsError::MetadataUnreadable(format!(
            "file '{}' of {} bytes owns only {} blocks",
            record.name, record.size, run.count
        )));
    }
    let mut buf = vec![0u8; usize::try_from(len).unwrap_or(size)];
    volume.read_run(run.start, offset, &mut buf)?;
    Ok(buf)
}
