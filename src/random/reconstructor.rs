//! Bit-plane linear-recurrence reconstruction of an observed word stream.
//!
//! Each of the 32 bit positions of the stream is an independent binary
//! sequence. For a GF(2)-linear generator every such sequence satisfies a
//! linear recurrence whose degree is bounded by the generator's state
//! dimension. The Berlekamp–Massey procedure finds the shortest one, which
//! can then be run forwards, or backwards when its constant term is set, to
//! synthesise words that were never observed.

use tracing::debug;

use crate::error::RecoveryError;
use crate::utils::bits::BitRow;
use crate::utils::converter::{bit_plane, from_bit_planes};

/// Shortest recurrence of one bit plane, `s[n] = XOR s[n - i]` for `i` in
/// `taps`.
#[derive(Debug, Clone)]
struct PlaneRecurrence {
    /// Nonzero coefficients `c_1..=c_L`, by index, increasing.
    taps: Vec<usize>,
    degree: usize,
    bits: BitRow,
}

impl PlaneRecurrence {
    /// Berlekamp–Massey over GF(2).
    ///
    /// The discrepancy at step `n` is `C · (s[n], s[n-1], .., s[n-L])`, read
    /// as 64-bit words from the reversed sequence.
    fn fit(bits: BitRow) -> Self {
        let len = bits.width();
        let mut reversed = BitRow::zeros(len);
        for i in bits.ones() {
            reversed.set(len - 1 - i, true);
        }

        let mut c = BitRow::zeros(len + 1);
        let mut b = BitRow::zeros(len + 1);
        c.set(0, true);
        b.set(0, true);
        let mut degree = 0usize;
        let mut gap = 1usize;

        for n in 0..len {
            let start = len - 1 - n;
            let ones: u32 = c
                .chunks()
                .iter()
                .take(degree / 64 + 1)
                .enumerate()
                .map(|(j, &chunk)| (chunk & reversed.word_at(start + 64 * j)).count_ones())
                .sum();
            if ones & 1 == 0 {
                gap += 1;
            } else if 2 * degree <= n {
                let previous = c.clone();
                c.xor_shifted(&b, gap);
                degree = n + 1 - degree;
                b = previous;
                gap = 1;
            } else {
                c.xor_shifted(&b, gap);
                gap += 1;
            }
        }

        let taps = c.ones().filter(|i| (1..=degree).contains(i)).collect();
        PlaneRecurrence { taps, degree, bits }
    }

    fn is_invertible(&self) -> bool {
        self.degree == 0 || self.taps.last() == Some(&self.degree)
    }

    /// The `count` bits following the observed ones.
    fn forward(&self, count: usize) -> BitRow {
        let len = self.bits.width();
        let mut seq: Vec<bool> = (0..len).map(|i| self.bits.get(i)).collect();
        for n in len..len + count {
            let bit = self.taps.iter().fold(false, |acc, &i| acc ^ seq[n - i]);
            seq.push(bit);
        }
        BitRow::from_bits(&seq[len..])
    }

    /// The `count` bits preceding the observed ones, oldest first.
    ///
    /// Solves the recurrence for its oldest term:
    /// `s[k] = s[k + L] ^ XOR s[k + L - i]` over the taps `i < L`.
    fn backward(&self, count: usize) -> BitRow {
        let len = self.bits.width();
        let mut seq = vec![false; count + len];
        for i in self.bits.ones() {
            seq[count + i] = true;
        }
        if self.degree > 0 {
            let inner = &self.taps[..self.taps.len() - 1];
            for k in (0..count).rev() {
                let top = k + self.degree;
                seq[k] = inner.iter().fold(seq[top], |acc, &i| acc ^ seq[top - i]);
            }
        }
        BitRow::from_bits(&seq[..count])
    }
}

/// Per-plane recurrences fitted to an observed word stream.
#[derive(Debug, Clone)]
pub struct SequenceReconstructor {
    planes: Vec<PlaneRecurrence>,
}

impl SequenceReconstructor {
    /// Fits the shortest recurrence to each of the 32 bit planes of `words`.
    ///
    /// # Errors
    /// [`RecoveryError::RecurrenceFitFailure`] if a plane needs a recurrence
    /// longer than `max_degree`, or longer than half the observed length (the
    /// fit is then not pinned down by the data).
    pub fn fit(words: &[u32], max_degree: usize) -> Result<Self, RecoveryError> {
        let mut planes = Vec::with_capacity(32);
        for plane in 0..32 {
            let recurrence = PlaneRecurrence::fit(bit_plane(words, plane));
            debug!(plane, degree = recurrence.degree, "bit-plane recurrence fitted");
            if recurrence.degree > max_degree {
                return Err(RecoveryError::RecurrenceFitFailure {
                    plane,
                    reason: format!(
                        "degree {} exceeds bound {}",
                        recurrence.degree, max_degree
                    ),
                });
            }
            if 2 * recurrence.degree > words.len() {
                return Err(RecoveryError::RecurrenceFitFailure {
                    plane,
                    reason: format!(
                        "degree {} needs at least {} words, {} observed",
                        recurrence.degree,
                        2 * recurrence.degree,
                        words.len()
                    ),
                });
            }
            planes.push(recurrence);
        }
        Ok(SequenceReconstructor { planes })
    }

    /// Degree of the recurrence fitted to bit `plane`.
    ///
    /// # Panics
    /// Panics if `plane >= 32`.
    pub fn linear_complexity(&self, plane: usize) -> usize {
        self.planes[plane].degree
    }

    /// Number of words the recurrences were fitted on.
    pub fn observed_len(&self) -> usize {
        self.planes.first().map(|p| p.bits.width()).unwrap_or(0)
    }

    /// Synthesises the `count` words following the observed stream.
    pub fn extend_forward(&self, count: usize) -> Vec<u32> {
        let planes: Vec<BitRow> = self.planes.iter().map(|p| p.forward(count)).collect();
        from_bit_planes(&planes)
    }

    /// Synthesises the `count` words preceding the observed stream, oldest
    /// first.
    ///
    /// # Errors
    /// [`RecoveryError::RecurrenceFitFailure`] if some plane's recurrence has
    /// a zero constant term and cannot be run backwards.
    pub fn extend_backward(&self, count: usize) -> Result<Vec<u32>, RecoveryError> {
        if let Some(plane) = self.planes.iter().position(|p| !p.is_invertible()) {
            return Err(RecoveryError::RecurrenceFitFailure {
                plane,
                reason: format!(
                    "recurrence of degree {} has no constant term",
                    self.planes[plane].degree
                ),
            });
        }
        let planes: Vec<BitRow> = self.planes.iter().map(|p| p.backward(count)).collect();
        Ok(from_bit_planes(&planes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::mersenne_twister::{MersenneTwister, TwisterParams};

    /// Leaked raw words of `blocks` records, three per 72-word stride.
    fn leaked_stream(seed: u32, blocks: usize) -> Vec<u32> {
        let params = TwisterParams::with_sizes(3, 1).unwrap();
        let mut mt = MersenneTwister::with_seed(params, seed).unwrap();
        let raw = mt.raw_words(72 * blocks);
        (0..blocks)
            .flat_map(|b| raw[72 * b..72 * b + 3].to_vec())
            .collect()
    }

    #[test]
    fn test_fibonacci_like_plane() {
        // s[n] = s[n-1] ^ s[n-3] on plane 0, everything else zero.
        let mut bits = vec![true, false, false];
        for n in 3..40 {
            let next = bits[n - 1] ^ bits[n - 3];
            bits.push(next);
        }
        let words: Vec<u32> = bits.iter().map(|&b| b as u32).collect();
        let rec = SequenceReconstructor::fit(&words[5..], 10).unwrap();
        assert_eq!(rec.linear_complexity(0), 3);
        assert_eq!(rec.linear_complexity(7), 0);
        assert_eq!(rec.extend_backward(5).unwrap(), words[..5].to_vec());
        let ahead = rec.extend_forward(4);
        let expected: Vec<u32> = {
            let mut b = bits.clone();
            for n in 40..44 {
                let next = b[n - 1] ^ b[n - 3];
                b.push(next);
            }
            b[40..].iter().map(|&x| x as u32).collect()
        };
        assert_eq!(ahead, expected);
    }

    #[test]
    fn test_small_twister_stream_extends_both_ways() {
        let stream = leaked_stream(777, 200);
        // Fit on blocks 20.. and rebuild what came before and after.
        let rec = SequenceReconstructor::fit(&stream[60..540], 3 * 65).unwrap();
        for plane in 0..32 {
            assert!(rec.linear_complexity(plane) <= 3 * 65);
        }
        assert_eq!(rec.observed_len(), 480);
        assert_eq!(rec.extend_backward(60).unwrap(), stream[..60].to_vec());
        assert_eq!(rec.extend_forward(60), stream[540..].to_vec());
    }

    #[test]
    fn test_degree_bound_is_enforced() {
        let stream = leaked_stream(1, 200);
        let err = SequenceReconstructor::fit(&stream, 8).unwrap_err();
        assert!(matches!(err, RecoveryError::RecurrenceFitFailure { .. }));
    }

    #[test]
    fn test_too_short_stream_is_rejected() {
        let stream = leaked_stream(5, 40);
        assert!(matches!(
            SequenceReconstructor::fit(&stream, 1000),
            Err(RecoveryError::RecurrenceFitFailure { .. })
        ));
    }

    #[test]
    fn test_non_invertible_recurrence() {
        // 1, 0, 0, 0, ... satisfies s[n] = 0 with a transient: no constant term.
        let mut words = vec![1u32];
        words.extend_from_slice(&[0; 20]);
        let rec = SequenceReconstructor::fit(&words, 20).unwrap();
        assert!(matches!(
            rec.extend_backward(2),
            Err(RecoveryError::RecurrenceFitFailure { plane: 0, .. })
        ));
    }
}
