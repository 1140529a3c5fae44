use serde::{Deserialize, Serialize};

/// A verified drand beacon as installed on-chain.
///
/// `randomness` is always `sha256(signature)`; the fetcher enforces this
/// before the beacon ever reaches the chain and [`crate::abci::preblock`]
/// re-checks it at install time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VrfBeacon {
    pub drand_round: u64,
    pub randomness: Vec<u8>,
    pub signature: Vec<u8>,
    pub previous_signature: Vec<u8>,
}

/// A member of the emergency/reshare committee allowlist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitteeMember {
    pub address: String,
    pub label: String,
}

/// A validator's registered drand identity.
///
/// `signal_unix_sec` and `signal_reshare_epoch` record the first time the
/// validator signalled; re-registrations refresh the key and chain hash but
/// never these two fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VrfIdentity {
    pub validator_address: String,
    pub drand_bls_public_key: Vec<u8>,
    pub chain_hash: Vec<u8>,
    pub signal_unix_sec: i64,
    pub signal_reshare_epoch: u64,
}

/// Per-block execution context handed to message handlers and hooks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockCtx {
    pub height: u64,
    pub time_unix: i64,
    pub chain_id: String,
}

/// A typed event emitted by a state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: &'static str,
    pub attributes: Vec<(String, String)>,
}

impl Event {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            attributes: Vec::new(),
        }
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }
}
