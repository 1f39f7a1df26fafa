//! Runtime-sized bit buffer backing the free-space bitmap.

#[cfg(test)]
mod bits_tests;

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
/// Bitmap stores one bit per data block, LSB first within each byte.
pub struct Bitmap {
    bytes: Vec<u8>,
    len: u32,
}

impl Bitmap {
    #[must_use]
    /// `zeroed` returns a bitmap with `len` clear bits.
    pub fn zeroed(len: u32) -> Self {
        Self {
            bytes: vec![0u8; (len as usize).div_ceil(8)],
            len,
        }
    }

    #[must_use]
    /// `from_bytes` wraps raw bitmap bytes covering `len` bits.
    ///
    /// # Arguments
    /// * `bytes` - Raw bitmap bytes; padded or trimmed to `ceil(len / 8)`.
    /// * `len` - Number of meaningful bits.
    pub fn from_bytes(mut bytes: Vec<u8>, len: u32) -> Self {
        bytes.resize((len as usize).div_ceil(8), 0);
        Self { bytes, len }
    }

    #[inline]
    #[must_use]
    /// `as_bytes` returns the underlying bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.len
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    #[must_use]
    /// `get` returns the bit value at the provided index.
    ///
    /// # Arguments
    /// * `i` - The bit index; indices past `len` read as clear.
    pub fn get(&self, i: u32) -> bool {
        if i >= self.len {
            return false;
        }
        let (byte, bit) = ((i >> 3) as usize, i & 7);
        (self.bytes[byte] >> bit) & 1 == 1
    }

    #[inline]
    /// `set` updates the bit at the provided index.
    ///
    /// # Arguments
    /// * `i` - The bit index; indices past `len` are ignored.
    /// * `val` - Whether the bit should be set.
    pub fn set(&mut self, i: u32, val: bool) {
        if i >= self.len {
            return;
        }
        let (byte, bit) = ((i >> 3) as usize, i & 7);
        let m = 1u8 << bit;
        if val {
            self.bytes[byte] |= m;
        } else {
            self.bytes[byte] &= !m;
        }
    }

    /// `set_range` sets or clears `count` bits starting at `start`.
    pub fn set_range(&mut self, start: u32, count: u32, val: bool) {
        let end = start.saturating_add(count).min(self.len);
        for i in start..end {
            self.set(i, val);
        }
    }

    #[must_use]
    /// `count_set` returns the number of set bits.
    pub fn count_set(&self) -> u32 {
        (0..self.len).filter(|&i| self.get(i)).count() as u32
    }

    /// `iter_set` yields the indices of set bits in ascending order.
    pub fn iter_set(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.len).filter(|&i| self.get(i))
    }
}
