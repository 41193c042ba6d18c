//! End-to-end keystream recovery.
//!
//! [`KeystreamRecovery`] trains (or adopts) a predictor once and then
//! decrypts any ingested block whose window of observed words is available.
//! Blocks too early in the stream for a direct window can go through
//! [`KeystreamRecovery::recover_with_fallback`], which synthesises the
//! missing history with the bit-plane reconstructor.

use tracing::info;

use crate::config::SolverConfig;
use crate::decryptor::{BlockDecryptor, RecoveredPlaintext};
use crate::error::RecoveryError;
use crate::ingest::{ObservedSamples, SampleIngester};
use crate::predictor::{PredictedKeystream, Predictor};
use crate::random::reconstructor::SequenceReconstructor;
use crate::trainer::PredictorTrainer;

/// A trained predictor bound to its configuration.
#[derive(Debug, Clone)]
pub struct KeystreamRecovery {
    config: SolverConfig,
    predictor: Predictor,
    decryptor: BlockDecryptor,
}

impl KeystreamRecovery {
    /// Trains a predictor for `config`.
    ///
    /// # Errors
    /// Configuration and training errors from [`PredictorTrainer`].
    pub fn train(config: SolverConfig) -> Result<Self, RecoveryError> {
        let predictor = PredictorTrainer::new(config.clone())?.train()?;
        Self::from_predictor(config, predictor)
    }

    /// Reuses a predictor trained earlier.
    ///
    /// # Errors
    /// [`RecoveryError::InvalidConfiguration`] if the predictor was trained
    /// for another layout or window.
    pub fn from_predictor(config: SolverConfig, predictor: Predictor) -> Result<Self, RecoveryError> {
        config.validate()?;
        if *predictor.layout() != config.layout || predictor.window() != config.window {
            return Err(RecoveryError::InvalidConfiguration {
                reason: format!(
                    "predictor trained for {:?} with window {}, configuration has {:?} with window {}",
                    predictor.layout(),
                    predictor.window(),
                    config.layout,
                    config.window
                ),
            });
        }
        let decryptor = BlockDecryptor::new(config.wrapper.clone(), config.neighbor_radius);
        Ok(KeystreamRecovery {
            config,
            predictor,
            decryptor,
        })
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn predictor(&self) -> &Predictor {
        &self.predictor
    }

    /// Ingester matching this configuration's layout and tempering.
    pub fn ingester(&self) -> SampleIngester {
        SampleIngester::new(self.config.layout, self.config.twister.temper)
    }

    /// Decrypts block `block` from its direct window of observed words.
    ///
    /// # Errors
    /// [`RecoveryError::InsufficientSamples`] when fewer than W observed
    /// words precede the block, plus the errors of
    /// [`BlockDecryptor::recover`].
    pub fn recover(
        &self,
        samples: &ObservedSamples,
        block: usize,
    ) -> Result<RecoveredPlaintext, RecoveryError> {
        let source = PredictedKeystream::new(&self.predictor, samples.words());
        self.decryptor.recover(&source, samples.blocks(), block)
    }

    /// Like [`recover`](Self::recover), but synthesises missing history.
    ///
    /// When block `block` or a neighbour within the retry radius lacks W
    /// observed words, bit-plane recurrences are fitted on the whole
    /// observed stream and run backwards to fill the gap.
    ///
    /// # Errors
    /// [`RecoveryError::RecurrenceFitFailure`] if the stream does not admit
    /// a usable recurrence, plus the errors of [`recover`](Self::recover).
    pub fn recover_with_fallback(
        &self,
        samples: &ObservedSamples,
        block: usize,
    ) -> Result<RecoveredPlaintext, RecoveryError> {
        let layout = &self.config.layout;
        let earliest = block.saturating_sub(self.config.neighbor_radius);
        let missing = self
            .config
            .window
            .saturating_sub(layout.history_before(earliest));
        if missing == 0 {
            return self.recover(samples, block);
        }

        info!(block, missing, "synthesising history before the first record");
        let reconstructor =
            SequenceReconstructor::fit(samples.words(), self.config.max_recurrence_degree())?;
        let prefix = reconstructor.extend_backward(missing)?;
        let source = PredictedKeystream::with_prefix(&self.predictor, prefix, samples.words());
        self.decryptor.recover(&source, samples.blocks(), block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BlockLayout;
    use crate::ingest::SampleRecord;
    use crate::random::mersenne_twister::{MersenneTwister, TwisterParams};
    use crate::utils::converter::xor_bytes;

    const FLAG: &str = "CTF{00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff}";

    fn small_config() -> SolverConfig {
        SolverConfig {
            window: 4,
            samples: 128,
            twister: TwisterParams::with_sizes(3, 1).unwrap(),
            ..SolverConfig::default()
        }
    }

    /// Records of a victim run that encrypts `FLAG` in every block.
    fn victim_samples(config: &SolverConfig, seed: u32, blocks: usize) -> ObservedSamples {
        let layout = config.layout;
        let mut victim = MersenneTwister::with_seed(config.twister, seed).unwrap();
        let raw = victim.raw_words(layout.stride * blocks);
        let records: Vec<SampleRecord> = (0..blocks)
            .map(|b| {
                let start = layout.leak_position(b);
                let leak = raw[start..start + layout.leak_words]
                    .iter()
                    .map(|&w| config.twister.temper.temper(w))
                    .collect();
                let keystream: Vec<u8> = (0..layout.block_len)
                    .map(|off| raw[layout.keystream_position(b, off)] as u8)
                    .collect();
                SampleRecord::new(&xor_bytes(FLAG.as_bytes(), &keystream), leak)
            })
            .collect();
        SampleIngester::new(layout, config.twister.temper)
            .ingest(&records)
            .unwrap()
    }

    #[test]
    fn test_recover_direct_window() {
        let config = small_config();
        let recovery = KeystreamRecovery::train(config.clone()).unwrap();
        let samples = victim_samples(&config, 31337, 20);
        for block in 2..20 {
            let got = recovery.recover(&samples, block).unwrap();
            assert_eq!(got.plaintext, FLAG);
            assert_eq!(got.shift, 0);
        }
    }

    #[test]
    fn test_early_block_needs_fallback() {
        let config = small_config();
        let recovery = KeystreamRecovery::train(config.clone()).unwrap();
        let samples = victim_samples(&config, 2024, 200);
        assert!(matches!(
            recovery.recover(&samples, 0),
            Err(RecoveryError::InsufficientSamples { block: 0, .. })
        ));
        for block in 0..3 {
            let got = recovery.recover_with_fallback(&samples, block).unwrap();
            assert_eq!(got.plaintext, FLAG);
            assert_eq!(got.block, block);
        }
    }

    #[test]
    fn test_predictor_must_match_configuration() {
        let config = small_config();
        let predictor = PredictorTrainer::new(config.clone())
            .unwrap()
            .train()
            .unwrap();
        let other = SolverConfig {
            layout: BlockLayout {
                stride: 80,
                ..config.layout
            },
            ..config
        };
        assert!(matches!(
            KeystreamRecovery::from_predictor(other, predictor),
            Err(RecoveryError::InvalidConfiguration { .. })
        ));
    }
}
