use tracing::{info, warn};

use super::SimpleFs;
use super::types::{DiskUsage, FileInfo};
use crate::error::FsResult;
use crate::table::{FileTable, validate_name};

impl SimpleFs {
    /// `create` adds an empty file in the lowest free table slot.
    ///
    /// # Returns
    /// The slot the file was placed in.
    ///
    /// # Errors
    /// Returns an error if the name is invalid or taken, the table is full, or
    /// the metadata cannot be read or written.
    pub fn create(&self, name: &str) -> FsResult<usize> {
        self.create_inner(name)
            .inspect(|slot| info!(name, slot = *slot, "file created"))
            .inspect_err(|err| warn!(name, %err, "create failed"))
    }

    fn create_inner(&self, name: &str) -> FsResult<usize> {
        let mut volume = self.open_volume()?;
        let mut table = FileTable::load(&volume)?;
        let slot = table.claim(name)?;
        table.persist(&mut volume, slot)?;
        Ok(slot)
    }

    /// `delete` frees the file's blocks and clears its slot.
    ///
    /// # Errors
    /// Returns an error if the name is invalid, no such file exists, or the
    /// metadata cannot be read or written.
    pub fn delete(&self, name: &str) -> FsResult<()> {
        self.delete_inner(name)
            .inspect_err(|err| warn!(name, %err, "delete failed"))
    }

    fn delete_inner(&self, name: &str) -> FsResult<()> {
        let mut volume = self.open_volume()?;
        let mut table = FileTable::load(&volume)?;
        let slot = table.find(name)?;
        let old = table.release(slot);
        let freed = old.run().map_or(0, |run| run.count);
        if let Some(run) = old.run() {
            volume.free_run(run);
        }
        table.persist(&mut volume, slot)?;
        info!(name, slot, freed_blocks = freed, "file deleted");
        Ok(())
    }

    /// `rename` gives a file a new name. Renaming a file to its own name does
    /// nothing.
    ///
    /// # Errors
    /// Returns an error if either name is invalid, `old` does not exist,
    /// `new` already exists, or the metadata cannot be read or written.
    pub fn rename(&self, old: &str, new: &str) -> FsResult<()> {
        self.rename_inner(old, new)
            .inspect_err(|err| warn!(old, new, %err, "rename failed"))
    }

    fn rename_inner(&self, old: &str, new: &str) -> FsResult<()> {
        let max = self.geometry().max_name_len();
        validate_name(old, max)?;
        validate_name(new, max)?;
        if old == new {
            info!(name = old, "old and new names are identical, nothing to rename");
            return Ok(());
        }
        let mut volume = self.open_volume()?;
        let mut table = FileTable::load(&volume)?;
        let slot = table.find(old)?;
        table.rename(slot, new)?;
        table.persist(&mut volume, slot)?;
        info!(old, new, slot, "file renamed");
        Ok(())
    }

    /// `move_file` is [`SimpleFs::rename`]; the namespace has no directories.
    ///
    /// # Errors
    /// See [`SimpleFs::rename`].
    pub fn move_file(&self, old: &str, new: &str) -> FsResult<()> {
        self.rename(old, new)
    }

    /// `exists` reports whether a file called `name` is present. Invalid names
    /// and unreadable metadata both report `false`.
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        let found = validate_name(name, self.geometry().max_name_len())
            .and_then(|()| self.open_volume())
            .and_then(|volume| FileTable::load(&volume))
            .map(|table| table.lookup(name).is_some());
        match found {
            Ok(found) => found,
            Err(err) => {
                warn!(name, %err, "exists check failed");
                false
            }
        }
    }

    /// `size` returns the file's length in bytes.
    ///
    /// # Errors
    /// Returns an error if the name is invalid, no such file exists, or the
    /// metadata cannot be read.
    pub fn size(&self, name: &str) -> FsResult<u64> {
        self.stat(name).map(|info| info.size)
    }

    /// `stat` returns the table entry for `name`.
    ///
    /// # Errors
    /// Returns an error if the name is invalid, no such file exists, or the
    /// metadata cannot be read.
    pub fn stat(&self, name: &str) -> FsResult<FileInfo> {
        let volume = self.open_volume()?;
        let table = FileTable::load(&volume)?;
        let slot = table.find(name)?;
        Ok(FileInfo::from_record(slot, table.record(slot)))
    }

    /// `list` returns every file in slot order.
    ///
    /// # Errors
    /// Returns an error if the metadata cannot be read.
    pub fn list(&self) -> FsResult<Vec<FileInfo>> {
        let volume = self.open_volume()?;
        let table = FileTable::load(&volume)?;
        Ok(table
            .iter_active()
            .map(|(slot, record)| FileInfo::from_record(slot, record))
            .collect())
    }

    /// `usage` reports block and file table occupancy.
    ///
    /// # Errors
    /// Returns an error if the metadata cannot be read.
    pub fn usage(&self) -> FsResult<DiskUsage> {
        let volume = self.open_volume()?;
        let table = FileTable::load(&volume)?;
        let bitmap = volume.read_bitmap()?;
        let g = self.geometry();
        let used_blocks = bitmap.count_set();
        Ok(DiskUsage {
            block_size: g.block_size(),
            total_blocks: g.num_blocks(),
            used_blocks,
            free_blocks: g.num_blocks() - used_blocks,
            active_files: table.active_count(),
            max_files: table.capacity(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorClass, FsError};
    use crate::fs::test_utils::{assert_consistent, file_with, temp_fs};

    #[test]
    fn create_then_list_in_slot_order() {
        let (_dir, fs) = temp_fs();
        assert_eq!(fs.create("b").expect("b"), 0);
        assert_eq!(fs.create("a").expect("a"), 1);

        let names: Vec<_> = fs.list().expect("list").into_iter().map(|f| f.name).collect();
        assert_eq!(names, ["b", "a"]);
        let info = fs.stat("a").expect("stat");
        assert_eq!(info.size, 0);
        assert_eq!(info.start_block, None);
        assert!(info.created_at > 0);
        assert_consistent(&fs);
    }

    #[test]
    fn create_rejects_bad_names() {
        let (_dir, fs) = temp_fs();
        assert!(matches!(fs.create(""), Err(FsError::EmptyName)));
        assert!(matches!(
            fs.create(&"x".repeat(256)),
            Err(FsError::NameTooLong { .. })
        ));
        fs.create(&"x".repeat(255)).expect("longest name");
        assert!(matches!(
            fs.create(&"x".repeat(255)),
            Err(FsError::AlreadyExists(_))
        ));
    }

    #[test]
    fn table_capacity_is_enforced() {
        let (_dir, fs) = temp_fs();
        let max = fs.geometry().max_files();
        for i in 0..max {
            fs.create(&format!("file{i}")).expect("create within capacity");
        }
        let before = fs.list().expect("list");

        let err = fs.create("overflow").unwrap_err();
        assert_eq!(err.class(), ErrorClass::CapacityExhausted);
        assert_eq!(fs.list().expect("list"), before, "table must be unchanged");
        assert_consistent(&fs);
    }

    #[test]
    fn delete_frees_slot_and_blocks() {
        let (_dir, fs) = temp_fs();
        file_with(&fs, "big", &vec![7u8; 3000]);
        fs.create("other").expect("other");
        assert_eq!(fs.usage().expect("usage").used_blocks, 6);

        fs.delete("big").expect("delete");
        assert!(!fs.exists("big"));
        let usage = fs.usage().expect("usage");
        assert_eq!(usage.used_blocks, 0);
        assert_eq!(usage.active_files, 1);
        assert_eq!(fs.create("reuse").expect("reuse"), 0);
        assert_consistent(&fs);

        assert!(matches!(fs.delete("big"), Err(FsError::NotFound(_))));
    }

    #[test]
    fn rename_rules() {
        let (_dir, fs) = temp_fs();
        file_with(&fs, "a", b"alpha");
        fs.create("b").expect("b");

        fs.rename("a", "a").expect("same name is a no-op");
        assert!(matches!(fs.rename("a", "b"), Err(FsError::AlreadyExists(_))));
        assert!(matches!(fs.rename("zz", "c"), Err(FsError::NotFound(_))));
        assert!(matches!(fs.rename("a", ""), Err(FsError::EmptyName)));

        fs.rename("a", "c").expect("rename");
        assert!(!fs.exists("a"));
        assert_eq!(fs.read("c", 0, 5).expect("read"), b"alpha");

        fs.move_file("c", "d").expect("move");
        assert!(fs.exists("d"));
        assert_eq!(fs.stat("d").expect("stat").slot, 0);
        assert_consistent(&fs);
    }

    #[test]
    fn exists_and_size() {
        let (_dir, fs) = temp_fs();
        file_with(&fs, "f", &[1u8; 700]);
        assert!(fs.exists("f"));
        assert!(!fs.exists("g"));
        assert!(!fs.exists(""));
        assert_eq!(fs.size("f").expect("size"), 700);
        assert!(matches!(fs.size("g"), Err(FsError::NotFound(_))));
    }

    #[test]
    fn usage_reports_capacity() {
        let (_dir, fs) = temp_fs();
        let usage = fs.usage().expect("usage");
        assert_eq!(usage.total_blocks, 2040);
        assert_eq!(usage.free_blocks, 2040);
        assert_eq!(usage.max_files, 12);
        assert_eq!(usage.block_size, 512);
    }
}
