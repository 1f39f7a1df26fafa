use tracing::{debug, info, warn};

use super::SimpleFs;
use super::types::DefragReport;
use crate::error::{FsError, FsResult};
use crate::layout::bits::Bitmap;
use crate::metadata::BlockRun;
use crate::table::FileTable;

impl SimpleFs {
    /// `defragment` packs every file's blocks into one run at the start of the
    /// data region, in table slot order, and rebuilds the bitmap to match.
    ///
    /// All file contents are read before any block is rewritten, so a file
    /// moved down onto blocks still held by a later slot cannot clobber it.
    /// The table, the bitmap and the superblock are written back together at
    /// the end; an error before that point leaves the image untouched.
    ///
    /// # Errors
    /// Returns an error if the metadata or any file's data cannot be read or
    /// written.
    pub fn defragment(&self) -> FsResult<DefragReport> {
        self.defragment_inner()
            .inspect(|r| {
                info!(
                    examined = r.files_examined,
                    moved = r.files_moved,
                    blocks = r.blocks_in_use,
                    "defragmentation finished"
                );
            })
            .inspect_err(|err| warn!(%err, "defragmentation failed"))
    }

    fn defragment_inner(&self) -> FsResult<DefragReport> {
        let mut volume = self.open_volume()?;
        let table = FileTable::load(&volume)?;
        let superblock = table.superblock();
        if table.iter_active().next().is_none() {
            info!("no active files to defragment");
            return Ok(DefragReport::default());
        }
        let mut records = table.into_records();

        let mut report = DefragReport::default();
        let mut contents = Vec::new();
        for (slot, record) in records.iter_mut().enumerate().filter(|(_, r)| r.in_use) {
            report.files_examined += 1;
            if record.size == 0 || record.block_count == 0 {
                record.set_empty();
                continue;
            }
            let Some(run) = record.run() else {
                return Err(FsError::MetadataUnreadable(format!(
                    "file '{}' has an unusable block range (start {}, count {})",
                    record.name, record.start_block, record.block_count
                )));
            };
            let len = usize::try_from(record.size).map_err(|_| {
                FsError::MetadataUnreadable(format!("file '{}' is too large", record.name))
            })?;
            if run.end() > u64::from(volume.geometry().num_blocks())
                || record.size > u64::from(run.count) * volume.geometry().block_size() as u64
            {
                return Err(FsError::MetadataUnreadable(format!(
                    "file '{}' claims blocks {}..+{} that cannot hold {} bytes",
                    record.name, run.start, run.count, record.size
                )));
            }
            let mut buf = vec![0u8; len];
            volume.read_run(run.start, 0, &mut buf)?;
            contents.push((slot, run, buf));
        }

        let mut bitmap = Bitmap::zeroed(volume.geometry().num_blocks());
        let mut cursor = 0u32;
        for (slot, run, data) in contents {
            let record = &mut records[slot];
            if run.start != cursor {
                debug!(name = %record.name, from = run.start, to = cursor, "moving file data");
                volume.write_run(cursor, &data)?;
                report.files_moved += 1;
            }
            bitmap.set_range(cursor, run.count, true);
            record.set_contents(
                record.size,
                BlockRun {
                    start: cursor,
                    count: run.count,
                },
            );
            cursor += run.count;
        }
        report.blocks_in_use = cursor;

        volume.write_table(&records)?;
        volume.write_bitmap(&bitmap)?;
        volume.write_superblock(superblock)?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::test_utils::{assert_consistent, file_with, temp_fs};
    use rand::RngCore;

    fn random_bytes(len: usize) -> Vec<u8> {
        let mut data = vec![0u8; len];
        rand::rng().fill_bytes(&mut data);
        data
    }

    #[test]
    fn compacts_gaps_and_preserves_content() {
        let (_dir, fs) = temp_fs();
        let files: Vec<(String, Vec<u8>)> = (0..6)
            .map(|i| (format!("f{i}"), random_bytes(300 + i * 400)))
            .collect();
        for (name, data) in &files {
            file_with(&fs, name, data);
        }
        fs.delete("f1").expect("delete");
        fs.delete("f4").expect("delete");

        let report = fs.defragment().expect("defragment");
        assert_eq!(report.files_examined, 4);

        let mut expected_start = 0;
        for (name, data) in files.iter().filter(|(n, _)| n != "f1" && n != "f4") {
            let info = fs.stat(name).expect("stat");
            assert_eq!(info.start_block, Some(expected_start), "{name} start");
            expected_start += info.block_count;
            assert_eq!(&fs.read(name, 0, data.len()).expect("read"), data);
        }
        assert_eq!(report.blocks_in_use, expected_start);
        let usage = fs.usage().expect("usage");
        assert_eq!(usage.used_blocks, expected_start);
        assert_consistent(&fs);
    }

    #[test]
    fn slot_order_differs_from_physical_order() {
        let (_dir, fs) = temp_fs();
        let a = random_bytes(1024);
        let b = random_bytes(512);
        let a_grown = random_bytes(1536);
        file_with(&fs, "a", &a);
        file_with(&fs, "b", &b);
        fs.write("a", &a_grown).expect("grow a");
        assert_eq!(fs.stat("a").expect("a").start_block, Some(3));
        assert_eq!(fs.stat("b").expect("b").start_block, Some(2));

        let report = fs.defragment().expect("defragment");
        assert_eq!(report.files_moved, 2);
        assert_eq!(fs.stat("a").expect("a").start_block, Some(0));
        assert_eq!(fs.stat("b").expect("b").start_block, Some(3));
        assert_eq!(fs.read("a", 0, 2048).expect("read a"), a_grown);
        assert_eq!(fs.read("b", 0, 2048).expect("read b"), b);
        assert_consistent(&fs);
    }

    #[test]
    fn already_compact_layout_moves_nothing() {
        let (_dir, fs) = temp_fs();
        file_with(&fs, "x", &[1u8; 700]);
        file_with(&fs, "y", &[2u8; 10]);
        fs.create("empty").expect("create");

        let report = fs.defragment().expect("defragment");
        assert_eq!(report.files_examined, 3);
        assert_eq!(report.files_moved, 0);
        assert_eq!(report.blocks_in_use, 3);
        assert_eq!(fs.stat("empty").expect("stat").start_block, None);
        assert_consistent(&fs);
    }

    #[test]
    fn empty_table_is_a_no_op() {
        let (_dir, fs) = temp_fs();
        fs.init().expect("init");
        assert_eq!(fs.defragment().expect("defragment"), DefragReport::default());
    }

    #[test]
    fn unusable_range_aborts_without_writing() {
        let (_dir, fs) = temp_fs();
        file_with(&fs, "damaged", b"8 bytes!");
        file_with(&fs, "healthy", &[3u8; 700]);
        {
            let mut volume = fs.open_volume().expect("open");
            let mut record = volume.read_record(0).expect("record");
            record.start_block = -3;
            volume.write_record(0, &record).expect("damage");
        }
        let before = std::fs::read(fs.path()).expect("image before");

        assert!(matches!(
            fs.defragment(),
            Err(FsError::MetadataUnreadable(_))
        ));
        assert_eq!(std::fs::read(fs.path()).expect("image after"), before);
        assert_eq!(fs.size("damaged").expect("size"), 8);
    }

    #[test]
    fn lost_blocks_are_reclaimed() {
        let (_dir, fs) = temp_fs();
        file_with(&fs, "keep", b"data");
        {
            let mut volume = fs.open_volume().expect("open");
            let mut bitmap = volume.read_bitmap().expect("bitmap");
            bitmap.set(500, true);
            volume.write_bitmap(&bitmap).expect("write");
        }
        assert!(!fs.check_integrity().expect("check").is_consistent());

        fs.defragment().expect("defragment");
        assert_eq!(fs.usage().expect("usage").used_blocks, 1);
        assert_consistent(&fs);
    }
}
