//! Predictor training against a synthetic reference generator.
//!
//! Every output bit of a twisted GFSR generator is a fixed GF(2)-linear
//! function of its state, and so is every observed (untempered) word. When
//! the window bits determine the state, each keystream bit is a fixed linear
//! combination of window bits, the same combination for every instance of
//! the algorithm whatever its seed. Training recovers those combinations
//! from one reference run by solving, per byte offset, an overdetermined
//! linear system whose rows are packed windows and whose right-hand sides
//! are the eight keystream bits.

use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::SolverConfig;
use crate::error::RecoveryError;
use crate::gf2::{self, SolveError};
use crate::predictor::Predictor;
use crate::random::mersenne_twister::MersenneTwister;
use crate::utils::bits::BitRow;

/// Feature rows and keystream targets drawn from one reference run.
///
/// Built once per training, consumed by the per-offset solves, then dropped.
struct TrainingSystem {
    rows: Vec<BitRow>,
    /// Keystream bytes of each row's block, one entry per byte offset.
    keystream: Vec<Vec<u8>>,
}

impl TrainingSystem {
    /// Lays the reference run out the way records are harvested.
    ///
    /// Block `b` leaks raw words `b*K .. b*K + leak_words`; its keystream
    /// starts right after. Row `i` is block `first + i`, where `first` is the
    /// first block with a full window of observed words before it.
    fn build(config: &SolverConfig, raw: &[u32]) -> Self {
        let layout = &config.layout;
        let first = layout.first_block_with_history(config.window);
        let last = first + config.samples;

        let observed: Vec<u32> = (0..last)
            .flat_map(|b| {
                let start = layout.leak_position(b);
                raw[start..start + layout.leak_words].iter().copied()
            })
            .collect();

        let mut rows = Vec::with_capacity(config.samples);
        let mut keystream = Vec::with_capacity(config.samples);
        for b in first..last {
            let end = layout.history_before(b);
            rows.push(BitRow::from_words(&observed[end - config.window..end]));
            keystream.push(
                (0..layout.block_len)
                    .map(|off| {
                        config
                            .tap
                            .byte(raw[layout.keystream_position(b, off)], &config.twister)
                    })
                    .collect(),
            );
        }
        TrainingSystem { rows, keystream }
    }

    /// Rank of the feature rows over `columns` window bits.
    fn rank(&self, columns: usize) -> usize {
        gf2::rank(&self.rows, columns)
    }

    /// The eight target bits of byte `offset`, one label row per feature row.
    fn labels(&self, offset: usize) -> Vec<BitRow> {
        self.keystream
            .iter()
            .map(|bytes| {
                let bits: Vec<bool> = (0..8).map(|bit| (bytes[offset] >> bit) & 1 == 1).collect();
                BitRow::from_bits(&bits)
            })
            .collect()
    }
}

/// Learns a [`Predictor`] for one solver configuration.
#[derive(Debug, Clone)]
pub struct PredictorTrainer {
    config: SolverConfig,
}

impl PredictorTrainer {
    /// Validates the configuration up front.
    ///
    /// # Errors
    /// [`RecoveryError::InvalidConfiguration`] if `S < 32W`, `R < K(W+S)` or
    /// any other precondition fails.
    pub fn new(config: SolverConfig) -> Result<Self, RecoveryError> {
        config.validate()?;
        Ok(PredictorTrainer { config })
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Runs the reference generator and solves one system per byte offset.
    ///
    /// Offsets are solved in parallel on a rayon pool of `worker_threads`
    /// threads (the global pool if unset).
    ///
    /// # Errors
    /// - [`RecoveryError::InconsistentTrainingSystem`] if some target bit is
    ///   not a linear function of the window; the window is too small for
    ///   the generator or the layout does not match it.
    /// - [`RecoveryError::TrainingBudgetExceeded`] if the time budget runs out.
    pub fn train(&self) -> Result<Predictor, RecoveryError> {
        let config = &self.config;
        let started = Instant::now();
        let deadline = config.time_budget().map(|budget| started + budget);
        info!(
            stride = config.layout.stride,
            window = config.window,
            samples = config.samples,
            offsets = config.layout.block_len,
            "training predictors"
        );

        let mut reference = MersenneTwister::synthetic(config.twister, config.reference_salt)?;
        let raw = reference.raw_words(config.reference_len());
        let system = TrainingSystem::build(config, &raw);

        let solve_all = || {
            (0..config.layout.block_len)
                .into_par_iter()
                .map(|offset| self.solve_offset(&system, offset, deadline, started))
                .collect::<Result<Vec<_>, _>>()
        };
        let weights = match config.worker_threads {
            Some(threads) => rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| RecoveryError::InvalidConfiguration {
                    reason: format!("cannot build worker pool: {}", e),
                })?
                .install(solve_all),
            None => solve_all(),
        };
        if let Err(RecoveryError::InconsistentTrainingSystem { offset, bit, .. }) = &weights {
            let columns = config.feature_width();
            warn!(
                offset,
                bit,
                rank = system.rank(columns),
                columns,
                "training rows do not determine the keystream"
            );
        }
        let weights = weights?;

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "predictors trained"
        );
        Ok(Predictor::new(config.layout, config.window, weights))
    }

    fn solve_offset(
        &self,
        system: &TrainingSystem,
        offset: usize,
        deadline: Option<Instant>,
        started: Instant,
    ) -> Result<[BitRow; 8], RecoveryError> {
        let config = &self.config;
        let columns = config.feature_width();
        let solved = gf2::solve_many(system.rows.clone(), system.labels(offset), columns, 8, deadline)
            .map_err(|e| match e {
                SolveError::Inconsistent { label, row } => RecoveryError::InconsistentTrainingSystem {
                    offset,
                    bit: label,
                    row,
                    stride: config.layout.stride,
                    window: config.window,
                    samples: config.samples,
                },
                SolveError::DeadlineExceeded { .. } => RecoveryError::TrainingBudgetExceeded {
                    elapsed_ms: started.elapsed().as_millis(),
                    budget_ms: config.time_budget().map(|b| b.as_millis()).unwrap_or(0),
                },
                SolveError::ShapeMismatch { reason } => {
                    RecoveryError::InvalidConfiguration { reason }
                }
            })?;
        debug!(offset, weight = solved[0].count_ones(), "offset solved");
        solved
            .try_into()
            .map_err(|_| RecoveryError::InvalidConfiguration {
                reason: "solver returned the wrong number of bit predictors".to_string(),
            })
    }
}
