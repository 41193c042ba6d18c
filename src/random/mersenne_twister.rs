//! 32-bit twisted GFSR generator (MT19937 and reduced-degree relatives).
//!
//! Serves as the deterministic oracle for training: the engine can be driven
//! from an installed state array and cursor, bypassing seeding, so that any
//! number of independent instances of the same algorithm can be synthesised.
//!
//! The twist is expressed as a function from one [`GeneratorState`] to the
//! next; an engine owns exactly one state and never shares it.

use serde::{Deserialize, Serialize};

use super::temper::TemperParams;
use crate::error::RecoveryError;

/// Upper bit kept from the current slot during the twist.
const UPPER_MASK: u32 = 0x8000_0000;

/// Lower 31 bits taken from the next slot during the twist.
const LOWER_MASK: u32 = 0x7FFF_FFFF;

/// Multiplier of the standard seeding recurrence.
const SEED_MULTIPLIER: u32 = 1_812_433_253;

/// Parameters of a twisted GFSR generator with 32-bit words.
///
/// `state_size` is N (array length), `shift_size` is M (the slot combined
/// with the twisted pair), `matrix_a` is the constant XORed in when the
/// combined word is odd.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwisterParams {
    pub state_size: usize,
    pub shift_size: usize,
    pub matrix_a: u32,
    pub temper: TemperParams,
}

impl TwisterParams {
    /// MT19937: N = 624, M = 397.
    pub const MT19937: TwisterParams = TwisterParams {
        state_size: 624,
        shift_size: 397,
        matrix_a: 0x9908_B0DF,
        temper: TemperParams::MT19937,
    };

    /// Builds a generator of the MT19937 family with a different array size.
    ///
    /// The twist constant and tempering stay those of MT19937.
    ///
    /// # Errors
    /// Returns [`RecoveryError::InvalidTwisterParams`] if `state_size < 2`
    /// or `shift_size` is not in `1..state_size`.
    pub fn with_sizes(state_size: usize, shift_size: usize) -> Result<Self, RecoveryError> {
        let params = TwisterParams {
            state_size,
            shift_size,
            ..TwisterParams::MT19937
        };
        params.validate()?;
        Ok(params)
    }

    /// Checks array sizes and tempering shifts.
    pub fn validate(&self) -> Result<(), RecoveryError> {
        if self.state_size < 2 {
            return Err(RecoveryError::InvalidTwisterParams {
                reason: format!("state size {} is below 2", self.state_size),
            });
        }
        if !(1..self.state_size).contains(&self.shift_size) {
            return Err(RecoveryError::InvalidTwisterParams {
                reason: format!(
                    "shift size {} outside 1..{}",
                    self.shift_size, self.state_size
                ),
            });
        }
        self.temper.validate()
    }

    /// Dimension over GF(2) of the space of output sequences: `32N - 31`.
    ///
    /// Only the top bit of the first slot ever feeds the recurrence.
    pub fn state_dimension(&self) -> usize {
        self.state_size.saturating_mul(32).saturating_sub(31)
    }
}

impl Default for TwisterParams {
    fn default() -> Self {
        TwisterParams::MT19937
    }
}

/// State array plus extraction cursor.
///
/// A full twist happens exactly when the cursor reaches the array length,
/// after which the cursor restarts at 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratorState {
    words: Vec<u32>,
    cursor: usize,
}

impl GeneratorState {
    /// Wraps an explicit array and cursor.
    ///
    /// A cursor equal to the array length means the next draw twists first.
    ///
    /// # Errors
    /// Returns [`RecoveryError::InvalidGeneratorState`] if the array length is
    /// not `params.state_size` or the cursor exceeds it.
    pub fn new(
        params: &TwisterParams,
        words: Vec<u32>,
        cursor: usize,
    ) -> Result<Self, RecoveryError> {
        if words.len() != params.state_size {
            return Err(RecoveryError::InvalidGeneratorState {
                reason: format!(
                    "state array has {} words, expected {}",
                    words.len(),
                    params.state_size
                ),
            });
        }
        if cursor > params.state_size {
            return Err(RecoveryError::InvalidGeneratorState {
                reason: format!("cursor {} exceeds {}", cursor, params.state_size),
            });
        }
        Ok(GeneratorState { words, cursor })
    }

    /// State array.
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Extraction cursor.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Recomputes every slot and resets the cursor to 0.
    ///
    /// Slots are rewritten in order, so slots near the end read already
    /// rewritten neighbours through the cyclic indices.
    fn twisted(mut self, params: &TwisterParams) -> Self {
        let n = params.state_size;
        let m = params.shift_size;
        let mt = &mut self.words;
        for i in 0..n {
            let x = (mt[i] & UPPER_MASK) | (mt[(i + 1) % n] & LOWER_MASK);
            let mut xa = x >> 1;
            if x & 1 == 1 {
                xa ^= params.matrix_a;
            }
            mt[i] = mt[(i + m) % n] ^ xa;
        }
        self.cursor = 0;
        self
    }
}

/// Twisted GFSR engine owning one [`GeneratorState`].
///
/// Two engines with the same parameters, array and cursor produce the same
/// output sequence for any length.
#[derive(Debug, Clone)]
pub struct MersenneTwister {
    params: TwisterParams,
    state: GeneratorState,
}

impl MersenneTwister {
    /// Installs an explicit state array and cursor.
    ///
    /// # Errors
    /// Propagates parameter and state validation failures.
    pub fn from_state(
        params: TwisterParams,
        words: Vec<u32>,
        cursor: usize,
    ) -> Result<Self, RecoveryError> {
        params.validate()?;
        let state = GeneratorState::new(&params, words, cursor)?;
        Ok(MersenneTwister { params, state })
    }

    /// Seeds with the standard initialisation recurrence.
    ///
    /// `mt[i] = 1812433253 * (mt[i-1] ^ (mt[i-1] >> 30)) + i`; the first draw
    /// twists.
    pub fn with_seed(params: TwisterParams, seed: u32) -> Result<Self, RecoveryError> {
        let mut words = Vec::with_capacity(params.state_size);
        words.push(seed);
        for i in 1..params.state_size {
            let prev = words[i - 1];
            words.push(
                SEED_MULTIPLIER
                    .wrapping_mul(prev ^ (prev >> 30))
                    .wrapping_add(i as u32),
            );
        }
        let cursor = params.state_size;
        Self::from_state(params, words, cursor)
    }

    /// Deterministic synthetic instance distinguished by `salt`.
    ///
    /// Slot `i` holds `0x6a09e667 ^ (i * 0x9e3779b1) ^ salt` and the cursor
    /// starts at 0.
    pub fn synthetic(params: TwisterParams, salt: u32) -> Result<Self, RecoveryError> {
        let words = (0..params.state_size)
            .map(|i| 0x6a09_e667 ^ (i as u32).wrapping_mul(0x9e37_79b1) ^ salt)
            .collect();
        Self::from_state(params, words, 0)
    }

    /// Generator parameters.
    pub fn params(&self) -> &TwisterParams {
        &self.params
    }

    /// Current state array and cursor.
    pub fn state(&self) -> &GeneratorState {
        &self.state
    }

    /// Returns the next untempered word.
    pub fn next_raw(&mut self) -> u32 {
        if self.state.cursor >= self.params.state_size {
            self.state = std::mem::take(&mut self.state).twisted(&self.params);
        }
        let y = self.state.words[self.state.cursor];
        self.state.cursor += 1;
        y
    }

    /// Returns the next tempered word.
    pub fn next_tempered(&mut self) -> u32 {
        let raw = self.next_raw();
        self.params.temper.temper(raw)
    }

    /// Draws `count` untempered words.
    pub fn raw_words(&mut self, count: usize) -> Vec<u32> {
        (0..count).map(|_| self.next_raw()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mt19937_reference_outputs() {
        let mut mt = MersenneTwister::with_seed(TwisterParams::MT19937, 5489).unwrap();
        let expected = [3_499_211_612u32, 581_869_302, 3_890_346_734, 3_586_334_585, 545_404_204];
        for (i, &exp) in expected.iter().enumerate() {
            assert_eq!(mt.next_tempered(), exp, "output {} mismatch", i);
        }
    }

    #[test]
    fn test_mt19937_ten_thousandth_output() {
        let mut mt = MersenneTwister::with_seed(TwisterParams::MT19937, 5489).unwrap();
        for _ in 0..9_999 {
            mt.next_tempered();
        }
        assert_eq!(mt.next_tempered(), 4_123_659_995);
    }

    #[test]
    fn test_identical_state_identical_output() {
        let words: Vec<u32> = (0..624u32).map(|i| i.wrapping_mul(0x0101_0101)).collect();
        let mut a = MersenneTwister::from_state(TwisterParams::MT19937, words.clone(), 100).unwrap();
        let mut b = MersenneTwister::from_state(TwisterParams::MT19937, words, 100).unwrap();
        for _ in 0..3_000 {
            assert_eq!(a.next_raw(), b.next_raw());
        }
        assert_eq!(a.state(), b.state());
    }

    #[test]
    fn test_cursor_zero_emits_installed_words_first() {
        let words: Vec<u32> = (0..624u32).collect();
        let mut mt = MersenneTwister::from_state(TwisterParams::MT19937, words, 0).unwrap();
        for i in 0..624u32 {
            assert_eq!(mt.next_raw(), i);
        }
        assert_eq!(mt.state().cursor(), 624);
        mt.next_raw();
        assert_eq!(mt.state().cursor(), 1);
    }

    #[test]
    fn test_tempered_is_temper_of_raw() {
        let mut raw = MersenneTwister::synthetic(TwisterParams::MT19937, 7).unwrap();
        let mut tempered = MersenneTwister::synthetic(TwisterParams::MT19937, 7).unwrap();
        for _ in 0..1_000 {
            assert_eq!(
                TemperParams::MT19937.temper(raw.next_raw()),
                tempered.next_tempered()
            );
        }
    }

    #[test]
    fn test_output_satisfies_recurrence() {
        let params = TwisterParams::MT19937;
        let mut mt = MersenneTwister::with_seed(params, 42).unwrap();
        let y = mt.raw_words(2_000);
        for k in 0..(2_000 - 624) {
            let x = (y[k] & UPPER_MASK) | (y[k + 1] & LOWER_MASK);
            let mut xa = x >> 1;
            if x & 1 == 1 {
                xa ^= params.matrix_a;
            }
            assert_eq!(y[k + 624], y[k + 397] ^ xa, "recurrence broken at {}", k);
        }
    }

    #[test]
    fn test_rejects_bad_state() {
        assert!(matches!(
            MersenneTwister::from_state(TwisterParams::MT19937, vec![0; 10], 0),
            Err(RecoveryError::InvalidGeneratorState { .. })
        ));
        assert!(matches!(
            MersenneTwister::from_state(TwisterParams::MT19937, vec![0; 624], 625),
            Err(RecoveryError::InvalidGeneratorState { .. })
        ));
    }

    #[test]
    fn test_rejects_bad_sizes() {
        assert!(TwisterParams::with_sizes(1, 0).is_err());
        assert!(TwisterParams::with_sizes(17, 17).is_err());
        assert!(TwisterParams::with_sizes(17, 0).is_err());
        let reduced = TwisterParams::with_sizes(17, 3).unwrap();
        assert_eq!(reduced.state_dimension(), 513);
        assert_eq!(TwisterParams::MT19937.state_dimension(), 19_937);
    }

    #[test]
    fn test_different_seeds_different_output() {
        let mut a = MersenneTwister::with_seed(TwisterParams::MT19937, 1).unwrap();
        let mut b = MersenneTwister::with_seed(TwisterParams::MT19937, 2).unwrap();
        assert_ne!(a.next_raw(), b.next_raw());
    }
}
