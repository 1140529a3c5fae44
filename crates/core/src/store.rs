//! State storage seam.
//!
//! The VRF module reads and writes a keyed byte store; the node wires in its
//! KV store, tests use [`MemStore`]. Values use a JSON codec throughout so
//! the persisted layout stays inspectable.

use std::collections::BTreeMap;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::VrfError;

/// Keyed sub-spaces of the VRF module store.
pub mod keys {
    pub const PARAMS: &[u8] = b"params";
    pub const LATEST_BEACON: &[u8] = b"latest_beacon";
    pub const COMMITTEE_PREFIX: &[u8] = b"committee/";
    pub const IDENTITY_PREFIX: &[u8] = b"identity/";

    pub fn committee(address: &str) -> Vec<u8> {
        let mut key = COMMITTEE_PREFIX.to_vec();
        key.extend_from_slice(address.as_bytes());
        key
    }

    pub fn identity(validator_address: &str) -> Vec<u8> {
        let mut key = IDENTITY_PREFIX.to_vec();
        key.extend_from_slice(validator_address.as_bytes());
        key
    }
}

/// Byte-level access to the module's keyed store.
pub trait StateStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;
    fn set(&mut self, key: &[u8], value: Vec<u8>);
    fn delete(&mut self, key: &[u8]);
    /// All `(key, value)` pairs under a prefix, in key order.
    fn scan_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)>;
}

/// In-memory store for tests and genesis tooling.
#[derive(Debug, Clone, Default)]
pub struct MemStore {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &[u8], value: Vec<u8>) {
        self.entries.insert(key.to_vec(), value);
    }

    fn delete(&mut self, key: &[u8]) {
        self.entries.remove(key);
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.entries
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

pub(crate) fn get_json<S: StateStore, T: DeserializeOwned>(
    store: &S,
    key: &[u8],
) -> Result<Option<T>, VrfError> {
    match store.get(key) {
        None => Ok(None),
        Some(raw) => serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|err| VrfError::Codec(err.to_string())),
    }
}

pub(crate) fn set_json<S: StateStore, T: Serialize>(
    store: &mut S,
    key: &[u8],
    value: &T,
) -> Result<(), VrfError> {
    let raw = serde_json::to_vec(value).map_err(|err| VrfError::Codec(err.to_string()))?;
    store.set(key, raw);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_prefix_is_bounded() {
        let mut store = MemStore::new();
        store.set(b"committee/a", b"1".to_vec());
        store.set(b"committee/b", b"2".to_vec());
        store.set(b"identity/a", b"3".to_vec());

        let committee = store.scan_prefix(keys::COMMITTEE_PREFIX);
        assert_eq!(committee.len(), 2);
        assert_eq!(committee[0].0, b"committee/a");

        let identities = store.scan_prefix(keys::IDENTITY_PREFIX);
        assert_eq!(identities.len(), 1);
    }

    #[test]
    fn json_roundtrip() {
        let mut store = MemStore::new();
        set_json(&mut store, b"k", &vec![1u64, 2, 3]).unwrap();
        let out: Option<Vec<u64>> = get_json(&store, b"k").unwrap();
        assert_eq!(out, Some(vec![1, 2, 3]));

        let missing: Option<Vec<u64>> = get_json(&store, b"missing").unwrap();
        assert!(missing.is_none());
    }
}
