//! Fixed-width GF(2) bit vectors packed into 64-bit chunks.
//!
//! [`BitRow`] is the row type of the linear-system solver and the weight type
//! of trained predictors. Bits are numbered LSB-first: bit `i` lives in chunk
//! `i / 64` at position `i % 64`. Packing a sequence of 32-bit words places
//! word `k` at bits `32k..32k + 32`.

/// A fixed-width bit vector over GF(2).
///
/// Addition is XOR and the inner product is the parity of the AND. All
/// binary operations require both operands to have the same width.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BitRow {
    width: usize,
    chunks: Vec<u64>,
}

impl BitRow {
    /// Creates an all-zero row of `width` bits.
    pub fn zeros(width: usize) -> Self {
        BitRow {
            width,
            chunks: vec![0u64; width.div_ceil(64)],
        }
    }

    /// Packs 32-bit words into a row of `32 * words.len()` bits.
    ///
    /// Word `k` occupies bits `32k..32k + 32`, bit 0 of the word first.
    pub fn from_words(words: &[u32]) -> Self {
        let mut row = BitRow::zeros(32 * words.len());
        for (k, &word) in words.iter().enumerate() {
            row.chunks[k / 2] |= (word as u64) << (32 * (k % 2));
        }
        row
    }

    /// Builds a row from individual bits, index 0 first.
    pub fn from_bits(bits: &[bool]) -> Self {
        let mut row = BitRow::zeros(bits.len());
        for (i, &bit) in bits.iter().enumerate() {
            if bit {
                row.set(i, true);
            }
        }
        row
    }

    /// Number of bits in the row.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Backing 64-bit chunks, least significant first.
    pub fn chunks(&self) -> &[u64] {
        &self.chunks
    }

    /// Returns bit `index`.
    ///
    /// # Panics
    /// Panics if `index >= self.width()`.
    #[inline]
    pub fn get(&self, index: usize) -> bool {
        assert!(index < self.width, "bit {} out of width {}", index, self.width);
        (self.chunks[index / 64] >> (index % 64)) & 1 == 1
    }

    /// Sets bit `index` to `value`.
    ///
    /// # Panics
    /// Panics if `index >= self.width()`.
    #[inline]
    pub fn set(&mut self, index: usize, value: bool) {
        assert!(index < self.width, "bit {} out of width {}", index, self.width);
        let mask = 1u64 << (index % 64);
        if value {
            self.chunks[index / 64] |= mask;
        } else {
            self.chunks[index / 64] &= !mask;
        }
    }

    /// Adds `other` into `self` (block XOR over every chunk).
    #[inline]
    pub fn xor_assign(&mut self, other: &BitRow) {
        self.xor_from_chunk(other, 0);
    }

    /// Adds `other` into `self`, skipping chunks below `first_chunk`.
    ///
    /// Elimination uses this once every column left of the pivot is known to
    /// be zero in `other`.
    #[inline]
    pub fn xor_from_chunk(&mut self, other: &BitRow, first_chunk: usize) {
        debug_assert_eq!(self.width, other.width);
        for (dst, src) in self.chunks[first_chunk..]
            .iter_mut()
            .zip(&other.chunks[first_chunk..])
        {
            *dst ^= *src;
        }
    }

    /// Adds `other` shifted up by `shift` bit positions into `self`.
    ///
    /// Bits pushed past `self.width()` are dropped.
    pub fn xor_shifted(&mut self, other: &BitRow, shift: usize) {
        let (whole, part) = (shift / 64, shift % 64);
        for (i, &chunk) in other.chunks.iter().enumerate() {
            if chunk == 0 {
                continue;
            }
            let lo = i + whole;
            if lo < self.chunks.len() {
                self.chunks[lo] ^= chunk << part;
            }
            if part != 0 && lo + 1 < self.chunks.len() {
                self.chunks[lo + 1] ^= chunk >> (64 - part);
            }
        }
        self.clear_tail();
    }

    /// 64 bits starting at bit `start`; bits at or past the width read as 0.
    #[inline]
    pub fn word_at(&self, start: usize) -> u64 {
        let (i, part) = (start / 64, start % 64);
        let lo = self.chunks.get(i).copied().unwrap_or(0);
        if part == 0 {
            return lo;
        }
        let hi = self.chunks.get(i + 1).copied().unwrap_or(0);
        (lo >> part) | (hi << (64 - part))
    }

    fn clear_tail(&mut self) {
        let used = self.width % 64;
        if used != 0 {
            if let Some(last) = self.chunks.last_mut() {
                *last &= (1u64 << used) - 1;
            }
        }
    }

    /// Inner product over GF(2): parity of `popcount(self & other)`.
    #[inline]
    pub fn dot(&self, other: &BitRow) -> bool {
        debug_assert_eq!(self.width, other.width);
        let ones: u32 = self
            .chunks
            .iter()
            .zip(&other.chunks)
            .map(|(a, b)| (a & b).count_ones())
            .sum();
        ones & 1 == 1
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> usize {
        self.chunks.iter().map(|c| c.count_ones() as usize).sum()
    }

    /// True when no bit is set.
    pub fn is_zero(&self) -> bool {
        self.chunks.iter().all(|&c| c == 0)
    }

    /// Index of the lowest set bit, if any.
    pub fn first_one(&self) -> Option<usize> {
        self.chunks
            .iter()
            .enumerate()
            .find(|(_, c)| **c != 0)
            .map(|(i, c)| i * 64 + c.trailing_zeros() as usize)
    }

    /// Iterates over the indices of set bits in increasing order.
    pub fn ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.chunks.iter().enumerate().flat_map(|(i, &chunk)| {
            let mut rest = chunk;
            std::iter::from_fn(move || {
                if rest == 0 {
                    return None;
                }
                let bit = rest.trailing_zeros() as usize;
                rest &= rest - 1;
                Some(i * 64 + bit)
            })
        })
    }
}
