//! Error types for the twistcrack library.

use std::fmt;

/// Errors produced by the twistcrack library.
///
/// Every variant carries enough context (block index, offset, bit,
/// configuration values) to re-parameterise and retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryError {
    /// The requested block needs more observed history than is available.
    InsufficientSamples {
        block: usize,
        required: usize,
        available: usize,
    },
    /// No ciphertext exists for the requested block.
    BlockOutOfRange { block: usize, available: usize },
    /// The predicted plaintext failed the wrapper check for the block and
    /// every neighbour tried.
    DecodeValidationFailure {
        block: usize,
        reason: String,
        tried: Vec<isize>,
    },
    /// A synthetic training system had no solution for one target bit.
    InconsistentTrainingSystem {
        offset: usize,
        bit: usize,
        row: usize,
        stride: usize,
        window: usize,
        samples: usize,
    },
    /// Configuration preconditions do not hold.
    InvalidConfiguration { reason: String },
    /// Generator parameters are malformed.
    InvalidTwisterParams { reason: String },
    /// An installed generator state is malformed.
    InvalidGeneratorState { reason: String },
    /// A sample record could not be turned into observations.
    InvalidSampleRecord { index: usize, reason: String },
    /// Training ran past its soft wall-clock budget.
    TrainingBudgetExceeded { elapsed_ms: u128, budget_ms: u128 },
    /// A bit-plane recurrence could not be fitted or run.
    RecurrenceFitFailure { plane: usize, reason: String },
}

impl fmt::Display for RecoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryError::InsufficientSamples {
                block,
                required,
                available,
            } => {
                write!(
                    f,
                    "Block {} needs {} words of history, only {} available",
                    block, required, available
                )
            }
            RecoveryError::BlockOutOfRange { block, available } => {
                write!(
                    f,
                    "Block {} is out of range ({} blocks ingested)",
                    block, available
                )
            }
            RecoveryError::DecodeValidationFailure {
                block,
                reason,
                tried,
            } => {
                write!(
                    f,
                    "Block {} failed validation ({}); shifts tried: {:?}",
                    block, reason, tried
                )
            }
            RecoveryError::InconsistentTrainingSystem {
                offset,
                bit,
                row,
                stride,
                window,
                samples,
            } => {
                write!(
                    f,
                    "Training system for offset {} bit {} is inconsistent at row {} \
                     (stride {}, window {}, samples {})",
                    offset, bit, row, stride, window, samples
                )
            }
            RecoveryError::InvalidConfiguration { reason } => {
                write!(f, "Invalid configuration: {}", reason)
            }
            RecoveryError::InvalidTwisterParams { reason } => {
                write!(f, "Invalid generator parameters: {}", reason)
            }
            RecoveryError::InvalidGeneratorState { reason } => {
                write!(f, "Invalid generator state: {}", reason)
            }
            RecoveryError::InvalidSampleRecord { index, reason } => {
                write!(f, "Sample record {} is invalid: {}", index, reason)
            }
            RecoveryError::TrainingBudgetExceeded {
                elapsed_ms,
                budget_ms,
            } => {
                write!(
                    f,
                    "Training exceeded its time budget ({} ms > {} ms)",
                    elapsed_ms, budget_ms
                )
            }
            RecoveryError::RecurrenceFitFailure { plane, reason } => {
                write!(f, "Bit plane {} recurrence failed: {}", plane, reason)
            }
        }
    }
}

impl std::error::Error for RecoveryError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_insufficient_samples() {
        let err = RecoveryError::InsufficientSamples {
            block: 4,
            required: 32,
            available: 12,
        };
        assert_eq!(
            format!("{}", err),
            "Block 4 needs 32 words of history, only 12 available"
        );
    }

    #[test]
    fn test_display_inconsistent_system() {
        let err = RecoveryError::InconsistentTrainingSystem {
            offset: 3,
            bit: 7,
            row: 1100,
            stride: 72,
            window: 32,
            samples: 1300,
        };
        assert_eq!(
            format!("{}", err),
            "Training system for offset 3 bit 7 is inconsistent at row 1100 \
             (stride 72, window 32, samples 1300)"
        );
    }

    #[test]
    fn test_display_validation_failure_lists_shifts() {
        let err = RecoveryError::DecodeValidationFailure {
            block: 50,
            reason: "missing prefix".to_string(),
            tried: vec![0, -1, 1],
        };
        assert_eq!(
            format!("{}", err),
            "Block 50 failed validation (missing prefix); shifts tried: [0, -1, 1]"
        );
    }

    #[test]
    fn test_error_equality() {
        assert_eq!(
            RecoveryError::BlockOutOfRange {
                block: 1,
                available: 0
            },
            RecoveryError::BlockOutOfRange {
                block: 1,
                available: 0
            }
        );
        assert_ne!(
            RecoveryError::InvalidConfiguration {
                reason: "a".into()
            },
            RecoveryError::InvalidTwisterParams {
                reason: "a".into()
            }
        );
    }
}
