//! Keystream recovery for twisted GFSR generators from sparse leaked outputs.
//!
//! A server encrypts fixed-format messages by XOR with bytes of a Mersenne
//! Twister style generator and leaks a few tempered outputs next to each
//! ciphertext. Because the twist recurrence and the tempering are both
//! linear over GF(2), every unobserved output bit is a fixed linear function
//! of a window of observed outputs, the same function for every instance of
//! the algorithm. This crate learns those functions once from a synthetic
//! reference run and applies them to real observations.
//!
//! # Architecture
//!
//! ```text
//! SampleIngester   (hex ciphertext + tempered leaks -> untempered word stream)
//!     |
//! PredictorTrainer (synthetic MersenneTwister run -> one GF(2) system per byte)
//!     |                 solved by gf2::solve_many on packed BitRows
//! Predictor        (window of W observed words -> keystream block)
//!     |
//! BlockDecryptor   (XOR, wrapper check, neighbour retry)
//! ```
//!
//! Blocks too early in the stream for a direct window go through the
//! [`random::reconstructor::SequenceReconstructor`] fallback.
//!
//! # Examples
//!
//! Train on a reduced twister and predict another instance's keystream:
//!
//! ```
//! use twistcrack::random::mersenne_twister::{MersenneTwister, TwisterParams};
//! use twistcrack::{PredictorTrainer, SolverConfig};
//!
//! let config = SolverConfig {
//!     window: 4,
//!     samples: 128,
//!     twister: TwisterParams::with_sizes(3, 1).unwrap(),
//!     ..SolverConfig::default()
//! };
//! let predictor = PredictorTrainer::new(config.clone()).unwrap().train().unwrap();
//!
//! let mut victim = MersenneTwister::with_seed(config.twister, 7).unwrap();
//! let raw = victim.raw_words(72 * 3);
//! // Observed words: the three leaks of blocks 0 and 1, the last four of them.
//! let window = [raw[2], raw[72], raw[73], raw[74]];
//! let keystream = predictor.predict_block(&window).unwrap();
//! assert_eq!(keystream[0], raw[72 * 2 + 3] as u8);
//! ```

#![deny(clippy::all)]

pub mod config;
pub mod decryptor;
pub mod error;
pub mod gf2;
pub mod ingest;
pub mod predictor;
pub mod random;
pub mod recovery;
pub mod trainer;
pub mod utils;

pub use config::{BlockLayout, KeystreamTap, SolverConfig};
pub use decryptor::{BlockDecryptor, KeystreamSource, PlaintextWrapper, RecoveredPlaintext};
pub use error::RecoveryError;
pub use ingest::{ObservedSamples, SampleIngester, SampleRecord};
pub use predictor::{PredictedKeystream, Predictor};
pub use recovery::KeystreamRecovery;
pub use trainer::PredictorTrainer;
