use super::Bitmap;

#[test]
fn zeroed_has_no_set_bits() {
    let b = Bitmap::zeroed(2040);
    assert_eq!(b.as_bytes().len(), 255);
    assert_eq!(b.count_set(), 0);
    assert!(!b.get(0));
    assert!(!b.get(2039));
}

#[test]
fn bits_are_lsb_first() {
    let mut b = Bitmap::zeroed(16);
    b.set(0, true);
    b.set(9, true);
    assert_eq!(b.as_bytes(), &[0b0000_0001, 0b0000_0010]);

    b.set(0, false);
    assert_eq!(b.as_bytes()[0], 0);
    assert!(b.get(9));
}

#[test]
fn out_of_range_bits_are_ignored() {
    let mut b = Bitmap::zeroed(10);
    b.set(10, true);
    b.set(15, true);
    assert_eq!(b.count_set(), 0);
    assert!(!b.get(15));
    assert!(!b.get(1_000));
}

#[test]
fn set_range_marks_contiguous_run() {
    let mut b = Bitmap::zeroed(32);
    b.set_range(5, 10, true);
    assert_eq!(b.count_set(), 10);
    assert_eq!(b.iter_set().collect::<Vec<_>>(), (5..15).collect::<Vec<_>>());

    b.set_range(30, 10, true);
    assert_eq!(b.count_set(), 12, "range is clipped to the bitmap length");

    b.set_range(0, 32, false);
    assert_eq!(b.count_set(), 0);
}

#[test]
fn from_bytes_pads_short_input() {
    let b = Bitmap::from_bytes(vec![0xFF], 20);
    assert_eq!(b.as_bytes().len(), 3);
    assert_eq!(b.count_set(), 8);
    assert!(b.get(7));
    assert!(!b.get(8));
}
