//! Sample ingestion.
//!
//! Each harvested record carries one hex-encoded ciphertext block and the
//! tempered words leaked alongside it. Ingestion untempers the leaks and
//! keeps arrival order, producing one flat observed-word stream and the
//! parallel list of ciphertext blocks.

use serde::{Deserialize, Serialize};

use crate::config::BlockLayout;
use crate::error::RecoveryError;
use crate::random::temper::TemperParams;

/// One harvested observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleRecord {
    #[serde(alias = "ciphertext")]
    pub ciphertext_hex: String,
    #[serde(rename = "leak32", alias = "leak")]
    pub leak: Vec<u32>,
}

impl SampleRecord {
    /// Builds a record from raw ciphertext bytes and tempered leak words.
    pub fn new(ciphertext: &[u8], leak: Vec<u32>) -> Self {
        SampleRecord {
            ciphertext_hex: hex::encode(ciphertext),
            leak,
        }
    }
}

/// Observed words and ciphertext blocks, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservedSamples {
    words: Vec<u32>,
    blocks: Vec<Vec<u8>>,
}

impl ObservedSamples {
    /// Untempered leaked words, `leak_words` per record.
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Ciphertext blocks, one per record.
    pub fn blocks(&self) -> &[Vec<u8>] {
        &self.blocks
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Turns sample records into observations for a fixed layout.
#[derive(Debug, Clone)]
pub struct SampleIngester {
    layout: BlockLayout,
    temper: TemperParams,
}

impl SampleIngester {
    pub fn new(layout: BlockLayout, temper: TemperParams) -> Self {
        SampleIngester { layout, temper }
    }

    /// Parses one JSON record per line.
    ///
    /// Blank lines are skipped. Anything before the first `{` on a line (such
    /// as a counter) and anything after the record's closing brace is ignored.
    ///
    /// # Errors
    /// [`RecoveryError::InvalidSampleRecord`] with the zero-based line number.
    pub fn parse_lines(input: &str) -> Result<Vec<SampleRecord>, RecoveryError> {
        let mut records = Vec::new();
        for (index, line) in input.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let start = line
                .find('{')
                .ok_or_else(|| RecoveryError::InvalidSampleRecord {
                    index,
                    reason: "no JSON object on line".to_string(),
                })?;
            let record = serde_json::Deserializer::from_str(&line[start..])
                .into_iter::<SampleRecord>()
                .next()
                .ok_or_else(|| RecoveryError::InvalidSampleRecord {
                    index,
                    reason: "no JSON object on line".to_string(),
                })?
                .map_err(|e| RecoveryError::InvalidSampleRecord {
                    index,
                    reason: e.to_string(),
                })?;
            records.push(record);
        }
        Ok(records)
    }

    /// Untempers every leak and decodes every ciphertext, keeping order.
    ///
    /// # Errors
    /// [`RecoveryError::InvalidSampleRecord`] if a ciphertext is not hex or
    /// not `block_len` bytes long, or a record leaks the wrong number of words.
    pub fn ingest(&self, records: &[SampleRecord]) -> Result<ObservedSamples, RecoveryError> {
        let mut samples = ObservedSamples {
            words: Vec::with_capacity(records.len() * self.layout.leak_words),
            blocks: Vec::with_capacity(records.len()),
        };
        for (index, record) in records.iter().enumerate() {
            if record.leak.len() != self.layout.leak_words {
                return Err(RecoveryError::InvalidSampleRecord {
                    index,
                    reason: format!(
                        "{} leaked words, expected {}",
                        record.leak.len(),
                        self.layout.leak_words
                    ),
                });
            }
            let block = hex::decode(record.ciphertext_hex.trim()).map_err(|e| {
                RecoveryError::InvalidSampleRecord {
                    index,
                    reason: format!("ciphertext is not hex: {}", e),
                }
            })?;
            if block.len() != self.layout.block_len {
                return Err(RecoveryError::InvalidSampleRecord {
                    index,
                    reason: format!(
                        "ciphertext has {} bytes, expected {}",
                        block.len(),
                        self.layout.block_len
                    ),
                });
            }
            samples
                .words
                .extend(record.leak.iter().map(|&w| self.temper.untemper(w)));
            samples.blocks.push(block);
        }
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::temper::temper;

    fn small_layout() -> BlockLayout {
        BlockLayout {
            stride: 8,
            leak_words: 3,
            block_len: 4,
        }
    }

    #[test]
    fn test_parse_lines_with_counters() {
        let input = "0 {\"ciphertext_hex\": \"00ff10aa\", \"leak32\": [1, 2, 3], \"pid\": 7}\n\
                     \n\
                     {\"ciphertext\": \"deadbeef\", \"leak\": [4, 5, 6]}\n";
        let records = SampleIngester::parse_lines(input).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].ciphertext_hex, "00ff10aa");
        assert_eq!(records[0].leak, vec![1, 2, 3]);
        assert_eq!(records[1].ciphertext_hex, "deadbeef");
    }

    #[test]
    fn test_parse_lines_reports_line() {
        let input = "{\"ciphertext_hex\": \"00\", \"leak32\": [1, 2, 3]}\nnot a record\n";
        assert_eq!(
            SampleIngester::parse_lines(input),
            Err(RecoveryError::InvalidSampleRecord {
                index: 1,
                reason: "no JSON object on line".to_string()
            })
        );
    }

    #[test]
    fn test_parse_lines_ignores_trailing_text() {
        let input = "3 {\"ciphertext_hex\": \"00\", \"leak32\": [1,2,3]} ok\n\
                     4 {\"ciphertext_hex\": \"ff\", \"leak32\": [4,5,6]} {}\n";
        let records = SampleIngester::parse_lines(input).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].leak, vec![1, 2, 3]);
        assert_eq!(records[1].ciphertext_hex, "ff");
    }

    #[test]
    fn test_ingest_untempers_in_order() {
        let raw = [0x1111_1111u32, 0x2222_2222, 0x3333_3333, 0x4444_4444, 0x5555_5555, 0x6666_6666];
        let records = vec![
            SampleRecord::new(&[1, 2, 3, 4], raw[..3].iter().map(|&w| temper(w)).collect()),
            SampleRecord::new(&[5, 6, 7, 8], raw[3..].iter().map(|&w| temper(w)).collect()),
        ];
        let ingester = SampleIngester::new(small_layout(), TemperParams::MT19937);
        let samples = ingester.ingest(&records).unwrap();
        assert_eq!(samples.words(), &raw);
        assert_eq!(samples.blocks(), &[vec![1u8, 2, 3, 4], vec![5u8, 6, 7, 8]]);
        assert_eq!(samples.len(), 2);
    }

    #[test]
    fn test_ingest_rejects_bad_records() {
        let ingester = SampleIngester::new(small_layout(), TemperParams::MT19937);
        let wrong_len = vec![SampleRecord::new(&[1, 2, 3], vec![0, 0, 0])];
        assert!(matches!(
            ingester.ingest(&wrong_len),
            Err(RecoveryError::InvalidSampleRecord { index: 0, .. })
        ));
        let two_leaks = vec![
            SampleRecord::new(&[1, 2, 3, 4], vec![0, 0, 0]),
            SampleRecord::new(&[1, 2, 3, 4], vec![0, 0]),
        ];
        assert!(matches!(
            ingester.ingest(&two_leaks),
            Err(RecoveryError::InvalidSampleRecord { index: 1, .. })
        ));
        let not_hex = vec![SampleRecord {
            ciphertext_hex: "zz00aabb".to_string(),
            leak: vec![0, 0, 0],
        }];
        assert!(ingester.ingest(&not_hex).is_err());
    }
}
