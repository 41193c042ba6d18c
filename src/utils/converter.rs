//! Conversions between words, bytes and bit planes.

use crate::utils::bits::BitRow;

/// XORs two byte slices position by position.
///
/// The result is as long as the shorter input.
pub fn xor_bytes(a: &[u8], b: &[u8]) -> Vec<u8> {
    a.iter().zip(b).map(|(x, y)| x ^ y).collect()
}

/// Extracts bit `plane` of every word as a bit sequence, first word first.
///
/// # Panics
/// Panics if `plane >= 32`.
pub fn bit_plane(words: &[u32], plane: usize) -> BitRow {
    assert!(plane < 32, "bit plane {} out of range", plane);
    let mut row = BitRow::zeros(words.len());
    for (i, &w) in words.iter().enumerate() {
        if (w >> plane) & 1 == 1 {
            row.set(i, true);
        }
    }
    row
}

/// Reassembles words from 32 equally long bit planes.
///
/// Plane `p` supplies bit `p` of each word. Missing planes read as zero.
pub fn from_bit_planes(planes: &[BitRow]) -> Vec<u32> {
    let len = planes.first().map(|p| p.width()).unwrap_or(0);
    let mut words = vec![0u32; len];
    for (p, plane) in planes.iter().enumerate().take(32) {
        for i in plane.ones() {
            words[i] |= 1 << p;
        }
    }
    words
}
