//! Read-only query surface.
//!
//! Mirrors the precompile's bounds and error taxonomy so off-chain callers
//! and contracts observe the same behavior.

use serde::{Deserialize, Serialize};

use crate::{
    error::VrfError, keeper::VrfState, params::VrfParams, random, store::StateStore,
    types::VrfBeacon,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomWordsResponse {
    pub drand_round: u64,
    /// The beacon randomness the words were derived from.
    pub seed: Vec<u8>,
    pub words: Vec<[u8; 32]>,
}

pub fn query_params<S: StateStore>(vrf: &VrfState<S>) -> Result<VrfParams, VrfError> {
    vrf.params()
}

pub fn query_beacon<S: StateStore>(vrf: &VrfState<S>) -> Result<VrfBeacon, VrfError> {
    vrf.get_beacon()
}

pub fn query_random_words<S: StateStore>(
    vrf: &VrfState<S>,
    count: u32,
    user_seed: &[u8],
) -> Result<RandomWordsResponse, VrfError> {
    if count == 0 || count > random::MAX_RANDOM_WORDS {
        return Err(VrfError::InvalidCount(count));
    }

    let (beacon, words) = vrf.expand_randomness(count, user_seed)?;
    Ok(RandomWordsResponse {
        drand_round: beacon.drand_round,
        seed: beacon.randomness,
        words,
    })
}

#[cfg(test)]
mod tests {
    use sha2::Digest;

    use super::*;
    use crate::{address, store::MemStore};

    fn ready_state() -> VrfState<MemStore> {
        let authority = address::address_from_pubkey("chain", &[0u8; 32]).unwrap();
        let mut state = VrfState::new(MemStore::new(), authority);
        state
            .set_params(&VrfParams {
                enabled: true,
                public_key: vec![1; 48],
                chain_hash: vec![2; 32],
                period_seconds: 30,
                safety_margin_seconds: 30,
                genesis_unix_sec: 1_700_000_000,
                reshare_epoch: 0,
            })
            .unwrap();

        let signature = vec![5u8; 96];
        state
            .set_latest_beacon(&VrfBeacon {
                drand_round: 11,
                randomness: sha2::Sha256::digest(&signature).to_vec(),
                signature,
                previous_signature: Vec::new(),
            })
            .unwrap();
        state
    }

    #[test]
    fn random_words_query_matches_expansion() {
        let state = ready_state();
        let response = query_random_words(&state, 4, &[7u8; 32]).unwrap();
        assert_eq!(response.drand_round, 11);
        assert_eq!(response.words.len(), 4);

        let (beacon, words) = state.expand_randomness(4, &[7u8; 32]).unwrap();
        assert_eq!(response.seed, beacon.randomness);
        assert_eq!(response.words, words);
    }

    #[test]
    fn random_words_query_bounds() {
        let state = ready_state();
        assert_eq!(
            query_random_words(&state, 0, &[]),
            Err(VrfError::InvalidCount(0))
        );
        assert_eq!(
            query_random_words(&state, 257, &[]),
            Err(VrfError::InvalidCount(257))
        );
        assert!(query_random_words(&state, 256, &[]).is_ok());
    }

    #[test]
    fn beacon_query_fails_when_disabled() {
        let authority = address::address_from_pubkey("chain", &[0u8; 32]).unwrap();
        let state = VrfState::new(MemStore::new(), authority);
        assert_eq!(query_beacon(&state), Err(VrfError::Disabled));
    }
}
