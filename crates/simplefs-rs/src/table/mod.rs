//! In-memory view of the flat file table with a name index.
//!
//! A table is loaded from the volume at the start of each operation and
//! dropped at the end of it; nothing is cached between calls.


use std::collections::HashMap;

use tracing::warn;

use crate::error::{FsError, FsResult};
use crate::metadata::{FileRecord, Superblock};
use crate::retention::volume::Volume;

/// `validate_name` checks that `name` can be stored in a record slot.
///
/// # Errors
/// Returns an error if the name is empty, longer than `max_len` bytes, or
/// contains a NUL byte.
pub fn validate_name(name: &str, max_len: usize) -> FsResult<()> {
    if name.is_empty() {
        return Err(FsError::EmptyName);
    }
    if name.len() > max_len {
        return Err(FsError::NameTooLong {
            len: name.len(),
            max: max_len,
        });
    }
    if name.as_bytes().contains(&0) {
        return Err(FsError::InvalidName);
    }
    Ok(())
}

pub struct FileTable {
    superblock: Superblock,
    records: Vec<FileRecord>,
    index: HashMap<String, usize>,
    max_name_len: usize,
}

impl FileTable {
    /// `load` reads the superblock and every record from `volume`.
    ///
    /// # Errors
    /// Returns an error if the metadata cannot be read or the stored file
    /// count is negative.
    pub fn load(volume: &Volume) -> FsResult<Self> {
        let (superblock, records) = volume.read_superblock_and_table()?;
        if superblock.file_count().is_none() {
            return Err(FsError::MetadataUnreadable(format!(
                "negative active file count {}",
                superblock.active_file_count
            )));
        }
        Ok(Self::from_parts(
            superblock,
            records,
            volume.geometry().max_name_len(),
        ))
    }

    /// `from_parts` builds a table over decoded records.
    ///
    /// When two in-use records share a name, the lower slot is the one found
    /// by name.
    #[must_use]
    pub fn from_parts(superblock: Superblock, records: Vec<FileRecord>, max_name_len: usize) -> Self {
        let mut index = HashMap::with_capacity(records.len());
        for (slot, record) in records.iter().enumerate().filter(|(_, r)| r.in_use) {
            if index.contains_key(&record.name) {
                warn!(name = %record.name, slot, "duplicate file name in table");
                continue;
            }
            index.insert(record.name.clone(), slot);
        }
        Self {
            superblock,
            records,
            index,
            max_name_len,
        }
    }

    #[must_use]
    pub const fn superblock(&self) -> Superblock {
        self.superblock
    }

    #[must_use]
    pub fn into_records(self) -> Vec<FileRecord> {
        self.records
    }

    /// Number of slots in the table.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.superblock.file_count().unwrap_or(0)
    }

    /// `lookup` returns the slot holding `name`, if any.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// `find` validates `name` and returns its slot.
    ///
    /// # Errors
    /// Returns an error if the name is invalid or no file has it.
    pub fn find(&self, name: &str) -> FsResult<usize> {
        validate_name(name, self.max_name_len)?;
        self.lookup(name)
            .ok_or_else(|| FsError::NotFound(name.to_owned()))
    }

    #[must_use]
    pub fn record(&self, slot: usize) -> &FileRecord {
        &self.records[slot]
    }

    pub fn record_mut(&mut self, slot: usize) -> &mut FileRecord {
        &mut self.records[slot]
    }

    /// `free_slot` returns the lowest slot not in use.
    #[must_use]
    pub fn free_slot(&self) -> Option<usize> {
        self.records.iter().position(|r| !r.in_use)
    }

    /// `claim` places a new empty file called `name` in the lowest free slot
    /// and bumps the active count.
    ///
    /// # Errors
    /// Returns an error if the name is invalid or taken, or the table is full.
    pub fn claim(&mut self, name: &str) -> FsResult<usize> {
        validate_name(name, self.max_name_len)?;
        if self.index.contains_key(name) {
            return Err(FsError::AlreadyExists(name.to_owned()));
        }
        let full = FsError::TableFull {
            max_files: self.capacity(),
        };
        if self.active_count() >= self.capacity() {
            return Err(full);
        }
        let slot = self.free_slot().ok_or(full)?;
        self.records[slot] = FileRecord::new_file(name);
        self.index.insert(name.to_owned(), slot);
        self.superblock.increment();
        Ok(slot)
    }

    /// `release` clears `slot`, drops it from the index and decrements the
    /// active count. The previous record is returned so its blocks can be freed.
    pub fn release(&mut self, slot: usize) -> FileRecord {
        let old = std::mem::take(&mut self.records[slot]);
        if self.index.get(&old.name) == Some(&slot) {
            self.index.remove(&old.name);
        }
        self.superblock.decrement();
        old
    }

    /// `rename` changes the name stored in `slot`.
    ///
    /// # Errors
    /// Returns an error if `new_name` is invalid or held by another slot.
    pub fn rename(&mut self, slot: usize, new_name: &str) -> FsResult<()> {
        validate_name(new_name, self.max_name_len)?;
        if let Some(other) = self.lookup(new_name)
            && other != slot
        {
            return Err(FsError::AlreadyExists(new_name.to_owned()));
        }
        let old_name = std::mem::replace(&mut self.records[slot].name, new_name.to_owned());
        if self.index.get(&old_name) == Some(&slot) {
            self.index.remove(&old_name);
        }
        self.index.insert(new_name.to_owned(), slot);
        Ok(())
    }

    /// `persist` writes `slot` and then the superblock.
    ///
    /// # Errors
    /// Returns an error if either write fails.
    pub fn persist(&self, volume: &mut Volume, slot: usize) -> FsResult<()> {
        volume.write_record_and_superblock(slot, &self.records[slot], self.superblock)
    }

    /// In-use records with their slots, in slot order.
    pub fn iter_active(&self) -> impl Iterator<Item = (usize, &FileRecord)> {
        self.records.iter().enumerate().filter(|(_, r)| r.in_use)
    }
}
