//! Bit-level helpers shared by the solver, trainer and reconstructor.

pub mod bits;
pub mod converter;
