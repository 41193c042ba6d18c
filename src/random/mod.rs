//! Generator modeling.
//!
//! The twisted GFSR engine used as a synthetic oracle, its invertible output
//! tempering, and the bit-plane recurrence fallback that synthesises
//! unobserved words.

pub mod mersenne_twister;
pub mod reconstructor;
pub mod temper;
