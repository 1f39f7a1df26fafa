use crate::layout::Geometry;
use crate::layout::bits::Bitmap;
use crate::metadata::{BlockRun, FileRecord, Superblock};
use crate::retention::volume::Volume;
use tempfile::TempDir;

fn fresh_volume(dir: &TempDir) -> Volume {
    Volume::create(&dir.path().join("disk.sim"), Geometry::default()).expect("create volume")
}

#[test]
fn record_layout_matches_documented_offsets() {
    let mut record = FileRecord::new_file("alpha");
    record.set_contents(700, BlockRun { start: 9, count: 2 });
    record.created_at = 0x0102_0304;

    let bytes = record.to_bytes(255);
    assert_eq!(bytes.len(), 296);
    assert_eq!(bytes[0], 1);
    assert_eq!(&bytes[8..16], &700u64.to_le_bytes());
    assert_eq!(&bytes[16..24], &0x0102_0304i64.to_le_bytes());
    assert_eq!(&bytes[24..32], &9i64.to_le_bytes());
    assert_eq!(&bytes[32..40], &2u64.to_le_bytes());
    assert_eq!(&bytes[40..45], b"alpha");
    assert!(bytes[45..].iter().all(|&b| b == 0));
}

#[test]
fn empty_record_has_no_run() {
    let bytes = FileRecord::empty().to_bytes(255);
    assert_eq!(&bytes[24..32], &(-1i64).to_le_bytes());

    let decoded = FileRecord::from_bytes(&bytes, 255).expect("decode");
    assert!(!decoded.in_use);
    assert_eq!(decoded.run(), None);
    assert_eq!(decoded, FileRecord::empty());
}

#[test]
fn run_rejects_unrepresentable_ranges() {
    let mut record = FileRecord::new_file("x");
    record.start_block = -5;
    record.block_count = 2;
    assert_eq!(record.run(), None);

    record.start_block = 4;
    record.block_count = 0;
    assert_eq!(record.run(), None);

    record.block_count = 3;
    assert_eq!(record.run(), Some(BlockRun { start: 4, count: 3 }));
    assert_eq!(record.run().map(BlockRun::end), Some(7));
}

#[test]
fn full_length_name_keeps_terminator() {
    let name = "n".repeat(255);
    let record = FileRecord::new_file(&name);
    let bytes = record.to_bytes(255);
    assert_eq!(bytes[bytes.len() - 1], 0);
    assert_eq!(FileRecord::from_bytes(&bytes, 255).expect("decode").name, name);
}

#[test]
fn short_slot_is_rejected() {
    assert!(FileRecord::from_bytes(&[0u8; 40], 255).is_err());
}

#[test]
fn superblock_count_helpers() {
    let mut sb = Superblock::default();
    sb.decrement();
    assert_eq!(sb.active_file_count, 0, "count never goes negative");
    sb.increment();
    sb.increment();
    assert_eq!(sb.file_count(), Some(2));
    assert_eq!(Superblock::from_bytes((-1i32).to_le_bytes()).file_count(), None);
}

#[test]
fn record_and_superblock_persist_at_fixed_offsets() {
    let dir = TempDir::new().expect("tmp dir");
    let mut vol = fresh_volume(&dir);

    let record = FileRecord::new_file("report.txt");
    let sb = Superblock {
        active_file_count: 1,
    };
    vol.write_record_and_superblock(3, &record, sb)
        .expect("persist");

    let mut raw = [0u8; 4];
    vol.read_bytes(0, &mut raw).expect("raw superblock");
    assert_eq!(i32::from_le_bytes(raw), 1);

    let mut name = [0u8; 10];
    vol.read_bytes(259 + 3 * 296 + 40, &mut name).expect("raw name");
    assert_eq!(&name, b"report.txt");

    let (loaded_sb, records) = vol.read_superblock_and_table().expect("load");
    assert_eq!(loaded_sb, sb);
    assert_eq!(records.len(), 12);
    assert_eq!(records[3], record);
    assert!(records.iter().enumerate().all(|(i, r)| i == 3 || !r.in_use));
}

#[test]
fn record_index_past_table_is_rejected() {
    let dir = TempDir::new().expect("tmp dir");
    let mut vol = fresh_volume(&dir);
    assert!(vol.write_record(12, &FileRecord::empty()).is_err());
    assert!(vol.read_record(12).is_err());
    assert!(vol.read_record(11).is_ok());
}

#[test]
fn bitmap_roundtrip_and_format() {
    let dir = TempDir::new().expect("tmp dir");
    let mut vol = fresh_volume(&dir);

    let mut bitmap = Bitmap::zeroed(vol.geometry().num_blocks());
    bitmap.set_range(100, 20, true);
    vol.write_bitmap(&bitmap).expect("write bitmap");
    vol.write_superblock(Superblock {
        active_file_count: 4,
    })
    .expect("write superblock");
    assert_eq!(vol.read_bitmap().expect("read bitmap"), bitmap);

    vol.format().expect("format");
    assert_eq!(vol.read_bitmap().expect("read bitmap").count_set(), 0);
    assert_eq!(vol.read_superblock().expect("sb").active_file_count, 0);
}

#[test]
fn write_table_replaces_all_slots() {
    let dir = TempDir::new().expect("tmp dir");
    let mut vol = fresh_volume(&dir);

    let mut records = vec![FileRecord::empty(); 12];
    records[0] = FileRecord::new_file("a");
    records[11] = FileRecord::new_file("b");
    vol.write_table(&records).expect("write table");
    assert_eq!(vol.read_table().expect("read table"), records);

    assert!(vol.write_table(&vec![FileRecord::empty(); 13]).is_err());
}
