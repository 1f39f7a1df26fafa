use crate::error::FsError;
use crate::retention::image::Image;
use rand::RngCore;
use tempfile::TempDir;

const IMAGE_LEN: u64 = 1 << 20;

#[test]
fn create_zeroed_sizes_file() {
    let dir = TempDir::new().expect("tmp dir");
    let path = dir.path().join("disk.sim");

    let img = Image::create_zeroed(&path, IMAGE_LEN).expect("create");
    assert_eq!(img.len(), IMAGE_LEN);
    assert_eq!(img.path(), path.as_path());
    let meta = std::fs::metadata(&path).expect("metadata");
    assert_eq!(meta.len(), IMAGE_LEN, "backing file must be pre-sized");
    assert!(img.as_bytes().iter().all(|&b| b == 0));
}

#[test]
fn create_zeroed_truncates_existing_contents() {
    let dir = TempDir::new().expect("tmp dir");
    let path = dir.path().join("disk.sim");
    std::fs::write(&path, vec![0xAAu8; 4096]).expect("seed file");

    let img = Image::create_zeroed(&path, 8192).expect("create");
    assert!(img.as_bytes().iter().all(|&b| b == 0));
}

#[test]
fn write_then_read_roundtrip_across_reopen() {
    let dir = TempDir::new().expect("tmp dir");
    let path = dir.path().join("disk.sim");

    let off = 64 * 1024 + 123;
    let mut data = vec![0u8; 8192];
    rand::rng().fill_bytes(&mut data);

    {
        let mut img = Image::create_zeroed(&path, IMAGE_LEN).expect("create");
        img.write_at(off, &data).expect("write");
    }

    let img = Image::open(&path, IMAGE_LEN).expect("reopen");
    let mut back = vec![0u8; data.len()];
    img.read_at(off, &mut back).expect("read");
    assert_eq!(back, data, "contents must survive reopen");
}

#[test]
fn open_rejects_wrong_length() {
    let dir = TempDir::new().expect("tmp dir");
    let path = dir.path().join("disk.sim");
    std::fs::write(&path, vec![0u8; 1000]).expect("seed file");

    match Image::open(&path, IMAGE_LEN) {
        Err(FsError::ImageSize { expected, actual }) => {
            assert_eq!(expected, IMAGE_LEN);
            assert_eq!(actual, 1000);
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("open must reject a short image"),
    }
}

#[test]
fn open_missing_file_is_io_error() {
    let dir = TempDir::new().expect("tmp dir");
    let err = Image::open(&dir.path().join("absent.sim"), IMAGE_LEN)
        .err()
        .expect("missing image");
    assert!(matches!(err, FsError::Io(_)));
}

#[test]
fn accesses_past_end_fail_without_side_effects() {
    let dir = TempDir::new().expect("tmp dir");
    let path = dir.path().join("disk.sim");
    let mut img = Image::create_zeroed(&path, 4096).expect("create");

    let err = img.write_at(4090, &[1u8; 10]).unwrap_err();
    assert!(matches!(err, FsError::OutOfRange { offset: 4090, len: 10 }));
    assert!(img.as_bytes().iter().all(|&b| b == 0), "nothing may be written");

    let mut buf = [0u8; 1];
    assert!(img.read_at(4096, &mut buf).is_err());
    assert!(img.read_at(u64::MAX, &mut buf).is_err());
    assert!(img.read_at(4095, &mut buf).is_ok());
}

#[test]
fn zero_range_clears_bytes() {
    let dir = TempDir::new().expect("tmp dir");
    let path = dir.path().join("disk.sim");
    let mut img = Image::create_zeroed(&path, 4096).expect("create");

    img.write_at(100, &[0xFFu8; 50]).expect("write");
    img.zero_range(110, 20).expect("zero");

    let mut buf = [0u8; 50];
    img.read_at(100, &mut buf).expect("read");
    assert!(buf[..10].iter().all(|&b| b == 0xFF));
    assert!(buf[10..30].iter().all(|&b| b == 0));
    assert!(buf[30..].iter().all(|&b| b == 0xFF));
}
