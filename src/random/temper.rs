//! Output whitening ("tempering") and its exact inverse.
//!
//! Tempering is four xorshift stages applied to every word the generator
//! emits. Each stage is a GF(2)-linear bijection, so the whole transform is
//! invertible: [`untemper`] undoes the stages in reverse order, iterating the
//! partial-cancellation rounds `ceil(32 / shift)` times per stage.

use serde::{Deserialize, Serialize};

use crate::error::RecoveryError;

/// Shift amounts and masks of the four tempering stages.
///
/// Stage order when tempering:
/// 1. `y ^= (y >> u) & d`
/// 2. `y ^= (y << s) & b`
/// 3. `y ^= (y << t) & c`
/// 4. `y ^= y >> l`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemperParams {
    pub u: u32,
    pub d: u32,
    pub s: u32,
    pub b: u32,
    pub t: u32,
    pub c: u32,
    pub l: u32,
}

impl TemperParams {
    /// Tempering constants of MT19937.
    pub const MT19937: TemperParams = TemperParams {
        u: 11,
        d: 0xFFFF_FFFF,
        s: 7,
        b: 0x9D2C_5680,
        t: 15,
        c: 0xEFC6_0000,
        l: 18,
    };

    /// Checks every shift amount lies in `1..32`.
    ///
    /// # Errors
    /// Returns [`RecoveryError::InvalidTwisterParams`] naming the first bad shift.
    pub fn validate(&self) -> Result<(), RecoveryError> {
        for (name, shift) in [("u", self.u), ("s", self.s), ("t", self.t), ("l", self.l)] {
            if !(1..32).contains(&shift) {
                return Err(RecoveryError::InvalidTwisterParams {
                    reason: format!("tempering shift {} = {} outside 1..32", name, shift),
                });
            }
        }
        Ok(())
    }

    /// Applies the forward whitening bijection.
    #[inline]
    pub fn temper(&self, word: u32) -> u32 {
        let mut y = word;
        y ^= (y >> self.u) & self.d;
        y ^= (y << self.s) & self.b;
        y ^= (y << self.t) & self.c;
        y ^= y >> self.l;
        y
    }

    /// Inverts [`temper`](Self::temper) exactly.
    #[inline]
    pub fn untemper(&self, word: u32) -> u32 {
        let mut y = word;
        y = undo_right_shift(y, self.l, 0xFFFF_FFFF);
        y = undo_left_shift(y, self.t, self.c);
        y = undo_left_shift(y, self.s, self.b);
        y = undo_right_shift(y, self.u, self.d);
        y
    }
}

impl Default for TemperParams {
    fn default() -> Self {
        TemperParams::MT19937
    }
}

/// Inverts `y = x ^ ((x >> shift) & mask)`.
///
/// Each round fixes `shift` more high-order bits of `x`.
fn undo_right_shift(y: u32, shift: u32, mask: u32) -> u32 {
    let mut x = y;
    for _ in 0..32u32.div_ceil(shift) {
        x = y ^ ((x >> shift) & mask);
    }
    x
}

/// Inverts `y = x ^ ((x << shift) & mask)`.
fn undo_left_shift(y: u32, shift: u32, mask: u32) -> u32 {
    let mut x = y;
    for _ in 0..32u32.div_ceil(shift) {
        x = y ^ ((x << shift) & mask);
    }
    x
}

/// MT19937 tempering.
#[inline]
pub fn temper(word: u32) -> u32 {
    TemperParams::MT19937.temper(word)
}

/// Inverse of MT19937 tempering.
#[inline]
pub fn untemper(word: u32) -> u32 {
    TemperParams::MT19937.untemper(word)
}
