//! Random-word derivation.
//!
//! Words are derived exactly as a Solidity caller would compute them:
//!
//! ```text
//! word_i = keccak256(abi.encode(
//!     bytes   chain_hash,
//!     uint64  drand_round,
//!     bytes32 randomness,
//!     bytes32 user_seed,
//!     uint256 i,
//! ))
//! ```

use alloy_primitives::{keccak256, Bytes, B256, U256};
use alloy_sol_types::SolValue;

use crate::{error::VrfError, params::VrfParams, types::VrfBeacon};

/// Upper bound on the number of words a single expansion may produce.
pub const MAX_RANDOM_WORDS: u32 = 256;

/// Normalize arbitrary-length bytes into a `bytes32`: inputs longer than 32
/// bytes keep the rightmost 32, shorter inputs are left-copied into a zeroed
/// array (right-zero-padded).
pub fn to_bytes32(bz: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    if bz.is_empty() {
        return out;
    }

    let src = if bz.len() > 32 {
        &bz[bz.len() - 32..]
    } else {
        bz
    };
    out[..src.len()].copy_from_slice(src);
    out
}

/// Derive `count` 32-byte words from a beacon and a user seed.
pub fn derive_random_words(
    params: &VrfParams,
    beacon: &VrfBeacon,
    count: u32,
    user_seed: &[u8],
) -> Result<Vec<[u8; 32]>, VrfError> {
    if count == 0 || count > MAX_RANDOM_WORDS {
        return Err(VrfError::InvalidCount(count));
    }

    let chain_hash = Bytes::copy_from_slice(&params.chain_hash);
    let randomness = B256::from(to_bytes32(&beacon.randomness));
    let seed = B256::from(to_bytes32(user_seed));

    let mut words = Vec::with_capacity(count as usize);
    for i in 0..count {
        let encoded = (
            chain_hash.clone(),
            beacon.drand_round,
            randomness,
            seed,
            U256::from(i),
        )
            .abi_encode_params();
        words.push(keccak256(&encoded).0);
    }

    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params_with_hash(chain_hash: Vec<u8>) -> VrfParams {
        VrfParams {
            chain_hash,
            ..VrfParams::default()
        }
    }

    fn beacon(round: u64, randomness: Vec<u8>) -> VrfBeacon {
        VrfBeacon {
            drand_round: round,
            randomness,
            ..VrfBeacon::default()
        }
    }

    #[test]
    fn bytes32_normalization() {
        assert_eq!(to_bytes32(&[]), [0u8; 32]);

        // shorter inputs are left-copied, right-zero-padded
        let mut expected = [0u8; 32];
        expected[0] = 0xaa;
        expected[1] = 0xbb;
        assert_eq!(to_bytes32(&[0xaa, 0xbb]), expected);

        // longer inputs keep the rightmost 32 bytes
        let mut long = vec![0xffu8; 8];
        long.extend_from_slice(&[0x11u8; 32]);
        assert_eq!(to_bytes32(&long), [0x11u8; 32]);
    }

    #[test]
    fn count_bounds() {
        let params = params_with_hash(vec![2; 32]);
        let beacon = beacon(1, vec![1; 32]);

        assert_eq!(
            derive_random_words(&params, &beacon, 0, &[]),
            Err(VrfError::InvalidCount(0))
        );
        assert_eq!(
            derive_random_words(&params, &beacon, 257, &[]),
            Err(VrfError::InvalidCount(257))
        );
        assert_eq!(
            derive_random_words(&params, &beacon, 1, &[]).unwrap().len(),
            1
        );
        assert_eq!(
            derive_random_words(&params, &beacon, 256, &[])
                .unwrap()
                .len(),
            256
        );
    }

    #[test]
    fn derivation_is_deterministic() {
        let params = params_with_hash(vec![2; 32]);
        let beacon = beacon(42, vec![7; 32]);
        let seed = [9u8; 32];

        let a = derive_random_words(&params, &beacon, 16, &seed).unwrap();
        let b = derive_random_words(&params, &beacon, 16, &seed).unwrap();
        assert_eq!(a, b);

        // every word distinct, and sensitive to the seed
        let c = derive_random_words(&params, &beacon, 16, &[8u8; 32]).unwrap();
        assert_ne!(a, c);
        for window in a.windows(2) {
            assert_ne!(window[0], window[1]);
        }
    }

    /// Freezes the exact ABI layout for the first word with an empty chain
    /// hash: head slots for (bytes offset, uint64, bytes32, bytes32, uint256)
    /// followed by the zero-length bytes tail.
    #[test]
    fn first_word_encoding_is_frozen() {
        let params = params_with_hash(Vec::new());
        let mut randomness = [0u8; 32];
        randomness[31] = 0x01;
        let beacon = beacon(1, randomness.to_vec());
        let mut seed = [0u8; 32];
        seed[31] = 0x02;

        let mut expected_encoding = Vec::with_capacity(192);
        // slot 0: offset of the dynamic `bytes` head = 5 * 32 = 160
        let mut offset = [0u8; 32];
        offset[31] = 160;
        expected_encoding.extend_from_slice(&offset);
        // slot 1: uint64 round = 1
        let mut round = [0u8; 32];
        round[31] = 1;
        expected_encoding.extend_from_slice(&round);
        // slot 2: randomness, slot 3: user seed
        expected_encoding.extend_from_slice(&randomness);
        expected_encoding.extend_from_slice(&seed);
        // slot 4: uint256 i = 0
        expected_encoding.extend_from_slice(&[0u8; 32]);
        // tail: bytes length 0
        expected_encoding.extend_from_slice(&[0u8; 32]);

        let words = derive_random_words(&params, &beacon, 1, &seed).unwrap();
        assert_eq!(words[0], keccak256(&expected_encoding).0);
    }
}
