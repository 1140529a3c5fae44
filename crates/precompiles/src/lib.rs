//! VRF precompile.
//!
//! Exposes the latest installed beacon and deterministic random-word
//! expansion to EVM callers at a fixed address. The precompile charges its
//! own gas schedule and reverts with standard `Error(string)` payloads.

use alloy_primitives::{address, Address};
use alloy_sol_types::sol;

pub mod revert;
pub mod vrf;

pub use vrf::VrfPrecompile;

sol! {
    /// VRF randomness interface.
    #[derive(Debug, PartialEq, Eq)]
    interface IVrf {
        /// The latest installed drand beacon.
        /// @return round The drand round number
        /// @return randomness sha256 of the round's BLS signature
        function latestRandomness() external view returns (uint64 round, bytes32 randomness);

        /// Expand the current beacon into `count` words mixed with a caller
        /// seed. Reverts unless 1 <= count <= 256.
        function randomWords(uint256 count, bytes32 userSeed) external view returns (bytes32[] memory words);
    }
}

/// Canonical address of the VRF precompile.
pub const VRF_PRECOMPILE_ADDRESS: Address = address!("0x0000000000000000000000000000000000000807");

/// Base gas for `latestRandomness()`.
pub const GAS_LATEST_RANDOMNESS: u64 = 2_000;

/// Base gas for `randomWords()`; covers the first word.
pub const GAS_RANDOM_WORDS: u64 = 2_000;

/// Additional gas per word beyond the first.
pub const GAS_PER_RANDOM_WORD: u64 = 500;
