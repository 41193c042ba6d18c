//! Block decryption, plaintext validation and neighbour retry.
//!
//! A block is decrypted by XORing it with the predicted keystream. The
//! result is accepted only if it matches the plaintext wrapper: a literal
//! prefix, a fixed-length lowercase hexadecimal payload and a literal suffix.
//! Ingestion order can misalign sample and generator block indices by a
//! little, so a failed block is retried at the neighbouring indices before
//! giving up.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::RecoveryError;
use crate::utils::converter::xor_bytes;

/// Neighbour shifts in the order they are tried.
const NEIGHBOR_ORDER: [isize; 4] = [-1, 1, 2, -2];

/// Produces keystream bytes for a block index.
pub trait KeystreamSource {
    /// Returns the keystream of block `block`.
    ///
    /// # Errors
    /// [`RecoveryError::InsufficientSamples`] if the source lacks history for
    /// the block; other errors are passed through unchanged.
    fn keystream(&self, block: usize) -> Result<Vec<u8>, RecoveryError>;
}

/// Literal prefix, lowercase-hex payload, literal suffix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaintextWrapper {
    pub prefix: String,
    pub payload_len: usize,
    pub suffix: String,
}

impl Default for PlaintextWrapper {
    fn default() -> Self {
        PlaintextWrapper {
            prefix: "CTF{".to_string(),
            payload_len: 64,
            suffix: "}".to_string(),
        }
    }
}

impl PlaintextWrapper {
    /// Total wrapped length in bytes.
    pub fn total_len(&self) -> usize {
        self.prefix
            .len()
            .saturating_add(self.payload_len)
            .saturating_add(self.suffix.len())
    }

    /// Checks a candidate plaintext and returns it as a string.
    ///
    /// # Errors
    /// A short description of the first check that failed.
    pub fn validate(&self, candidate: &[u8]) -> Result<String, String> {
        if candidate.len() != self.total_len() {
            return Err(format!(
                "length {} instead of {}",
                candidate.len(),
                self.total_len()
            ));
        }
        let text = std::str::from_utf8(candidate).map_err(|_| "not UTF-8".to_string())?;
        let payload = text
            .strip_prefix(self.prefix.as_str())
            .ok_or_else(|| "missing prefix".to_string())?
            .strip_suffix(self.suffix.as_str())
            .ok_or_else(|| "missing suffix".to_string())?;
        if payload.len() != self.payload_len {
            return Err(format!("payload length {}", payload.len()));
        }
        if !payload
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            return Err("payload is not lowercase hex".to_string());
        }
        Ok(text.to_string())
    }
}

/// A validated plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredPlaintext {
    pub plaintext: String,
    /// Block index whose ciphertext and window produced the plaintext.
    pub block: usize,
    /// Shift applied to the requested index; 0 when no retry was needed.
    pub shift: isize,
}

/// Decrypts ciphertext blocks with predicted keystream.
#[derive(Debug, Clone)]
pub struct BlockDecryptor {
    wrapper: PlaintextWrapper,
    neighbor_radius: usize,
}

impl BlockDecryptor {
    pub fn new(wrapper: PlaintextWrapper, neighbor_radius: usize) -> Self {
        BlockDecryptor {
            wrapper,
            neighbor_radius,
        }
    }

    /// XORs a ciphertext block with its keystream.
    pub fn decrypt(&self, block: &[u8], keystream: &[u8]) -> Vec<u8> {
        xor_bytes(block, keystream)
    }

    /// Validates a candidate plaintext against the wrapper.
    pub fn validate(&self, candidate: &[u8]) -> Result<String, String> {
        self.wrapper.validate(candidate)
    }

    /// Decrypts block `block`, retrying neighbours on validation failure.
    ///
    /// Neighbours are tried in the order -1, +1, +2, -2, limited to the
    /// configured radius, to indices with a ciphertext, and to indices the
    /// source has history for.
    ///
    /// # Errors
    /// - [`RecoveryError::BlockOutOfRange`] if `block` has no ciphertext.
    /// - Any keystream error for `block` itself, notably
    ///   [`RecoveryError::InsufficientSamples`]; no neighbour is tried then.
    /// - [`RecoveryError::DecodeValidationFailure`] if no candidate validates.
    pub fn recover<S: KeystreamSource + ?Sized>(
        &self,
        source: &S,
        ciphertexts: &[Vec<u8>],
        block: usize,
    ) -> Result<RecoveredPlaintext, RecoveryError> {
        let ciphertext = ciphertexts
            .get(block)
            .ok_or(RecoveryError::BlockOutOfRange {
                block,
                available: ciphertexts.len(),
            })?;
        let keystream = source.keystream(block)?;
        let reason = match self.validate(&self.decrypt(ciphertext, &keystream)) {
            Ok(plaintext) => {
                return Ok(RecoveredPlaintext {
                    plaintext,
                    block,
                    shift: 0,
                })
            }
            Err(reason) => reason,
        };
        warn!(block, reason = %reason, "block failed validation, trying neighbours");

        let mut tried = vec![0isize];
        for shift in NEIGHBOR_ORDER {
            if shift.unsigned_abs() > self.neighbor_radius {
                continue;
            }
            let Some(neighbor) = block.checked_add_signed(shift) else {
                continue;
            };
            let Some(ciphertext) = ciphertexts.get(neighbor) else {
                continue;
            };
            let keystream = match source.keystream(neighbor) {
                Ok(ks) => ks,
                Err(RecoveryError::InsufficientSamples { .. })
                | Err(RecoveryError::BlockOutOfRange { .. }) => continue,
                Err(e) => return Err(e),
            };
            tried.push(shift);
            if let Ok(plaintext) = self.validate(&self.decrypt(ciphertext, &keystream)) {
                info!(block, neighbor, shift, "neighbour block validated");
                return Ok(RecoveredPlaintext {
                    plaintext,
                    block: neighbor,
                    shift,
                });
            }
        }
        Err(RecoveryError::DecodeValidationFailure {
            block,
            reason,
            tried,
        })
    }
}
