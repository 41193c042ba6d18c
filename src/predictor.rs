//! Trained keystream predictors and their application to observed windows.
//!
//! A predictor holds, for every byte offset of a block and every bit of that
//! byte, one GF(2) weight row over the packed window. Predicting a bit is an
//! inner product; predicting a byte is eight of them.

use std::borrow::Cow;

use crate::config::BlockLayout;
use crate::decryptor::KeystreamSource;
use crate::error::RecoveryError;
use crate::utils::bits::BitRow;

/// Evaluates one byte predictor against a window of observed words.
///
/// The window is packed oldest word first, bit 0 of each word first, exactly
/// as during training. Bit `k` of the result is `weights[k] · window`.
///
/// # Panics
/// Panics if the packed window width differs from the weight width.
pub fn apply(weights: &[BitRow; 8], window: &[u32]) -> u8 {
    apply_packed(weights, &BitRow::from_words(window))
}

fn apply_packed(weights: &[BitRow; 8], features: &BitRow) -> u8 {
    assert_eq!(
        weights[0].width(),
        features.width(),
        "window width does not match predictor"
    );
    weights
        .iter()
        .enumerate()
        .fold(0u8, |byte, (bit, w)| byte | ((w.dot(features) as u8) << bit))
}

/// Linear predictor for every keystream byte of a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predictor {
    layout: BlockLayout,
    window: usize,
    weights: Vec<[BitRow; 8]>,
}

impl Predictor {
    pub(crate) fn new(layout: BlockLayout, window: usize, weights: Vec<[BitRow; 8]>) -> Self {
        Predictor {
            layout,
            window,
            weights,
        }
    }

    /// Block layout the predictor was trained for.
    pub fn layout(&self) -> &BlockLayout {
        &self.layout
    }

    /// Observed words per window (W).
    pub fn window(&self) -> usize {
        self.window
    }

    /// Number of byte offsets covered.
    pub fn block_len(&self) -> usize {
        self.weights.len()
    }

    /// Weight rows of byte `offset`, bit 0 first.
    pub fn weights(&self, offset: usize) -> Option<&[BitRow; 8]> {
        self.weights.get(offset)
    }

    /// Predicts keystream byte `offset` from a window of W observed words.
    ///
    /// # Errors
    /// [`RecoveryError::InvalidConfiguration`] if the window length is not W
    /// or the offset is outside the block.
    pub fn predict_byte(&self, offset: usize, window: &[u32]) -> Result<u8, RecoveryError> {
        self.check_window(window)?;
        let weights = self
            .weights
            .get(offset)
            .ok_or_else(|| RecoveryError::InvalidConfiguration {
                reason: format!("offset {} outside block of {}", offset, self.block_len()),
            })?;
        Ok(apply(weights, window))
    }

    /// Predicts every keystream byte of a block from one window.
    pub fn predict_block(&self, window: &[u32]) -> Result<Vec<u8>, RecoveryError> {
        self.check_window(window)?;
        let features = BitRow::from_words(window);
        Ok(self
            .weights
            .iter()
            .map(|w| apply_packed(w, &features))
            .collect())
    }

    fn check_window(&self, window: &[u32]) -> Result<(), RecoveryError> {
        if window.len() != self.window {
            return Err(RecoveryError::InvalidConfiguration {
                reason: format!(
                    "window has {} words, predictor expects {}",
                    window.len(),
                    self.window
                ),
            });
        }
        Ok(())
    }
}

/// Keystream predicted from an observed word stream.
///
/// Block `j`'s window ends right before its own leaked words, at stream index
/// `origin + leak_words * j`. `origin` counts synthetic words prepended in
/// front of the observations.
#[derive(Debug, Clone)]
pub struct PredictedKeystream<'a> {
    predictor: &'a Predictor,
    words: Cow<'a, [u32]>,
    origin: usize,
}

impl<'a> PredictedKeystream<'a> {
    /// Predicts directly from observed words.
    pub fn new(predictor: &'a Predictor, observed: &'a [u32]) -> Self {
        PredictedKeystream {
            predictor,
            words: Cow::Borrowed(observed),
            origin: 0,
        }
    }

    /// Predicts from observed words preceded by a synthesised history.
    pub fn with_prefix(predictor: &'a Predictor, prefix: Vec<u32>, observed: &[u32]) -> Self {
        let origin = prefix.len();
        let mut words = prefix;
        words.extend_from_slice(observed);
        PredictedKeystream {
            predictor,
            words: Cow::Owned(words),
            origin,
        }
    }
}

impl KeystreamSource for PredictedKeystream<'_> {
    fn keystream(&self, block: usize) -> Result<Vec<u8>, RecoveryError> {
        let window = self.predictor.window();
        let leak_words = self.predictor.layout().leak_words;
        let end = self.origin + leak_words * block;
        if end < window {
            return Err(RecoveryError::InsufficientSamples {
                block,
                required: window,
                available: end,
            });
        }
        if end > self.words.len() {
            return Err(RecoveryError::BlockOutOfRange {
                block,
                available: (self.words.len() - self.origin) / leak_words,
            });
        }
        self.predictor.predict_block(&self.words[end - window..end])
    }
}
