use thiserror::Error;

/// Errors produced by the on-chain VRF logic.
///
/// Variants are `Clone + PartialEq` so the emergency-disable check can be
/// compared across the admission and pre-block paths in tests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VrfError {
    #[error("vrf is disabled")]
    Disabled,

    #[error("no beacon installed")]
    NoBeacon,

    #[error("word count {0} out of range [1, {max}]", max = crate::random::MAX_RANDOM_WORDS)]
    InvalidCount(u32),

    #[error("invalid address {addr}: {reason}")]
    InvalidAddress { addr: String, reason: String },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("invalid transaction: {0}")]
    InvalidTx(String),

    #[error("signature verification failed: {0}")]
    SignatureVerification(String),

    #[error("unknown signer account {0}")]
    UnknownSigner(String),

    #[error("beacon randomness does not match sha256(signature)")]
    RandomnessMismatch,

    #[error("insufficient funds for fee")]
    InsufficientFee,

    #[error("state codec error: {0}")]
    Codec(String),
}

impl VrfError {
    pub(crate) fn invalid_address(addr: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidAddress {
            addr: addr.into(),
            reason: reason.to_string(),
        }
    }
}
