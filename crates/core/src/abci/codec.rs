//! Vote-extension commit-info codec.
//!
//! A base value codec composed with a compressor. The zstd layer maps empty
//! input to empty output in both directions and wraps frame errors so the
//! caller can tell a corrupt payload from a malformed one.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::metrics::{record_message_size, MessageType};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("encode extended commit info: {0}")]
    Encode(String),

    #[error("decode extended commit info: {0}")]
    Decode(String),

    #[error("compress extended commit info: {0}")]
    Compress(String),

    #[error("decompress extended commit info: {0}")]
    Decompress(String),
}

/// Commit info exchanged between proposers in vote-extension payloads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedCommitInfo {
    pub height: u64,
    #[serde(default)]
    pub votes: Vec<ExtendedVoteInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedVoteInfo {
    pub validator_address: String,
    pub extension: Vec<u8>,
}

pub trait ExtendedCommitCodec {
    fn encode(&self, info: &ExtendedCommitInfo) -> Result<Vec<u8>, CodecError>;
    fn decode(&self, bz: &[u8]) -> Result<ExtendedCommitInfo, CodecError>;
}

pub trait Compressor {
    fn compress(&self, bz: &[u8]) -> Result<Vec<u8>, CodecError>;
    fn decompress(&self, bz: &[u8]) -> Result<Vec<u8>, CodecError>;
}

/// JSON base codec. The zero value encodes to empty bytes so an absent
/// payload round-trips through the compression layer untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCommitCodec;

impl ExtendedCommitCodec for JsonCommitCodec {
    fn encode(&self, info: &ExtendedCommitInfo) -> Result<Vec<u8>, CodecError> {
        if *info == ExtendedCommitInfo::default() {
            return Ok(Vec::new());
        }
        serde_json::to_vec(info).map_err(|err| CodecError::Encode(err.to_string()))
    }

    fn decode(&self, bz: &[u8]) -> Result<ExtendedCommitInfo, CodecError> {
        if bz.is_empty() {
            return Ok(ExtendedCommitInfo::default());
        }
        serde_json::from_slice(bz).map_err(|err| CodecError::Decode(err.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ZstdCompressor;

impl Compressor for ZstdCompressor {
    fn compress(&self, bz: &[u8]) -> Result<Vec<u8>, CodecError> {
        if bz.is_empty() {
            return Ok(Vec::new());
        }
        zstd::stream::encode_all(bz, 0).map_err(|err| CodecError::Compress(err.to_string()))
    }

    fn decompress(&self, bz: &[u8]) -> Result<Vec<u8>, CodecError> {
        if bz.is_empty() {
            return Ok(Vec::new());
        }
        zstd::stream::decode_all(bz).map_err(|err| CodecError::Decompress(err.to_string()))
    }
}

/// Base codec wrapped with a compressor.
#[derive(Debug, Clone, Default)]
pub struct CompressionCommitCodec<C, Z> {
    base: C,
    compressor: Z,
}

impl<C: ExtendedCommitCodec, Z: Compressor> CompressionCommitCodec<C, Z> {
    pub fn new(base: C, compressor: Z) -> Self {
        Self { base, compressor }
    }
}

impl<C: ExtendedCommitCodec, Z: Compressor> ExtendedCommitCodec for CompressionCommitCodec<C, Z> {
    fn encode(&self, info: &ExtendedCommitInfo) -> Result<Vec<u8>, CodecError> {
        let raw = self.base.encode(info)?;
        let bz = self.compressor.compress(&raw)?;
        record_message_size(MessageType::ExtendedCommit, bz.len());
        Ok(bz)
    }

    fn decode(&self, bz: &[u8]) -> Result<ExtendedCommitInfo, CodecError> {
        record_message_size(MessageType::ExtendedCommit, bz.len());
        let raw = self.compressor.decompress(bz)?;
        self.base.decode(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> CompressionCommitCodec<JsonCommitCodec, ZstdCompressor> {
        CompressionCommitCodec::new(JsonCommitCodec, ZstdCompressor)
    }

    fn sample() -> ExtendedCommitInfo {
        ExtendedCommitInfo {
            height: 42,
            votes: vec![
                ExtendedVoteInfo {
                    validator_address: "val-a".into(),
                    extension: vec![1, 2, 3],
                },
                ExtendedVoteInfo {
                    validator_address: "val-b".into(),
                    extension: Vec::new(),
                },
            ],
        }
    }

    #[test]
    fn roundtrip() {
        let codec = codec();
        let encoded = codec.encode(&sample()).unwrap();
        assert!(!encoded.is_empty());
        assert_eq!(codec.decode(&encoded).unwrap(), sample());
    }

    #[test]
    fn empty_input_encodes_to_empty_output() {
        let codec = codec();
        let encoded = codec.encode(&ExtendedCommitInfo::default()).unwrap();
        assert!(encoded.is_empty());
        assert_eq!(codec.decode(&[]).unwrap(), ExtendedCommitInfo::default());
    }

    #[test]
    fn corrupt_frame_is_a_decompress_error() {
        let codec = codec();
        let mut encoded = codec.encode(&sample()).unwrap();
        // stomp the zstd magic
        encoded[0] ^= 0xff;

        match codec.decode(&encoded) {
            Err(CodecError::Decompress(_)) => {}
            other => panic!("expected decompress error, got {other:?}"),
        }
    }

    #[test]
    fn truncated_frame_is_a_decompress_error() {
        let codec = codec();
        let encoded = codec.encode(&sample()).unwrap();
        let truncated = &encoded[..encoded.len() / 2];
        assert!(matches!(
            codec.decode(truncated),
            Err(CodecError::Decompress(_))
        ));
    }
}
