//! Solver configuration.
//!
//! [`SolverConfig`] gathers the externally agreed protocol constants (stride,
//! leak words, block length), the predictor shape (window, sample count,
//! reference length) and the knobs of the surrounding machinery. It loads
//! from JSON with every field optional.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::decryptor::PlaintextWrapper;
use crate::error::RecoveryError;
use crate::random::mersenne_twister::TwisterParams;

/// Placement of leaked words and keystream words inside one stride.
///
/// Record `i` leaks raw words `stride*i .. stride*i + leak_words` and encrypts
/// its block with the raw words that follow, `block_len` of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockLayout {
    pub stride: usize,
    pub leak_words: usize,
    pub block_len: usize,
}

impl BlockLayout {
    /// Raw index of the first leaked word of block `block`.
    pub fn leak_position(&self, block: usize) -> usize {
        block * self.stride
    }

    /// Raw index of the keystream word for byte `offset` of block `block`.
    pub fn keystream_position(&self, block: usize, offset: usize) -> usize {
        block * self.stride + self.leak_words + offset
    }

    /// Observed words preceding block `block`'s own leaks.
    pub fn history_before(&self, block: usize) -> usize {
        block * self.leak_words
    }

    /// First block with at least `window` observed words before it.
    pub fn first_block_with_history(&self, window: usize) -> usize {
        window.div_ceil(self.leak_words)
    }
}

impl Default for BlockLayout {
    fn default() -> Self {
        BlockLayout {
            stride: 72,
            leak_words: 3,
            block_len: 69,
        }
    }
}

/// Which byte of a keystream word is XORed into the plaintext.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeystreamTap {
    /// Bits 0..8 of the untempered word.
    #[default]
    RawLowByte,
    /// Bits 24..32 of the tempered word.
    TemperedHighByte,
}

impl KeystreamTap {
    /// Keystream byte for a raw generator word.
    pub fn byte(&self, raw: u32, params: &TwisterParams) -> u8 {
        match self {
            KeystreamTap::RawLowByte => raw as u8,
            KeystreamTap::TemperedHighByte => (params.temper.temper(raw) >> 24) as u8,
        }
    }
}

/// Complete solver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub layout: BlockLayout,
    /// W: observed words per predictor window.
    pub window: usize,
    /// S: training rows.
    pub samples: usize,
    /// R: raw words drawn from the reference generator; `K * (W + S)` if unset.
    pub reference_len: Option<usize>,
    pub tap: KeystreamTap,
    pub twister: TwisterParams,
    /// Salt of the synthetic reference state used for training.
    pub reference_salt: u32,
    pub worker_threads: Option<usize>,
    pub time_budget_secs: Option<u64>,
    pub wrapper: PlaintextWrapper,
    pub neighbor_radius: usize,
    /// Largest recurrence degree the reconstructor accepts;
    /// `leak_words * (32N - 31)` if unset.
    pub max_recurrence_degree: Option<usize>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            layout: BlockLayout::default(),
            window: 32,
            samples: 1300,
            reference_len: None,
            tap: KeystreamTap::default(),
            twister: TwisterParams::MT19937,
            reference_salt: 0,
            worker_threads: None,
            time_budget_secs: None,
            wrapper: PlaintextWrapper::default(),
            neighbor_radius: 2,
            max_recurrence_degree: None,
        }
    }
}

impl SolverConfig {
    /// Parses a JSON document; absent fields keep their defaults.
    ///
    /// # Errors
    /// [`RecoveryError::InvalidConfiguration`] on malformed JSON or when
    /// [`validate`](Self::validate) fails.
    pub fn from_json_str(json: &str) -> Result<Self, RecoveryError> {
        let config: SolverConfig =
            serde_json::from_str(json).map_err(|e| RecoveryError::InvalidConfiguration {
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Number of feature columns, `32 * W`, saturating at `usize::MAX`.
    pub fn feature_width(&self) -> usize {
        self.window.saturating_mul(32)
    }

    /// Effective reference-run length R, saturating at `usize::MAX`.
    pub fn reference_len(&self) -> usize {
        self.reference_len
            .unwrap_or_else(|| self.minimum_reference_len().unwrap_or(usize::MAX))
    }

    /// Effective recurrence degree bound for the reconstructor.
    pub fn max_recurrence_degree(&self) -> usize {
        self.max_recurrence_degree.unwrap_or_else(|| {
            self.layout
                .leak_words
                .saturating_mul(self.twister.state_dimension())
        })
    }

    /// `K * (W + S)`, or `None` if it does not fit in a `usize`.
    fn minimum_reference_len(&self) -> Option<usize> {
        self.window
            .checked_add(self.samples)
            .and_then(|rows| rows.checked_mul(self.layout.stride))
    }

    /// Soft wall-clock guard for training, if any.
    pub fn time_budget(&self) -> Option<Duration> {
        self.time_budget_secs.map(Duration::from_secs)
    }

    /// Checks every precondition before any work is done.
    ///
    /// # Errors
    /// [`RecoveryError::InvalidConfiguration`] naming the first violated
    /// precondition, or the generator's own parameter error.
    pub fn validate(&self) -> Result<(), RecoveryError> {
        let invalid = |reason: String| Err(RecoveryError::InvalidConfiguration { reason });
        let layout = &self.layout;
        self.twister.validate()?;
        if layout.stride == 0 || layout.leak_words == 0 || layout.block_len == 0 {
            return invalid(format!(
                "stride, leak words and block length must be positive ({:?})",
                layout
            ));
        }
        let occupied = layout.leak_words.checked_add(layout.block_len);
        if occupied.map_or(true, |used| used > layout.stride) {
            return invalid(format!(
                "{} leak words + {} block bytes exceed stride {}",
                layout.leak_words, layout.block_len, layout.stride
            ));
        }
        if self.window == 0 {
            return invalid("window must be positive".to_string());
        }
        let Some(columns) = self.window.checked_mul(32) else {
            return invalid(format!("window {} overflows the feature width", self.window));
        };
        if self.samples < columns {
            return invalid(format!(
                "samples {} below 32 * window = {}",
                self.samples, columns
            ));
        }
        let Some(minimum) = self.minimum_reference_len() else {
            return invalid(format!(
                "stride {} * (window {} + samples {}) overflows",
                layout.stride, self.window, self.samples
            ));
        };
        if self.reference_len() < minimum {
            return invalid(format!(
                "reference length {} below stride * (window + samples) = {}",
                self.reference_len(),
                minimum
            ));
        }
        if self.worker_threads == Some(0) {
            return invalid("worker thread count must be positive".to_string());
        }
        if self.wrapper.total_len() != layout.block_len {
            return invalid(format!(
                "plaintext wrapper spans {} bytes but blocks are {} bytes",
                self.wrapper.total_len(),
                layout.block_len
            ));
        }
        Ok(())
    }
}
