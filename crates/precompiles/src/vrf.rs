//! Precompile dispatch and method implementations.

use alloy_primitives::{B256, U256};
use alloy_sol_types::{SolCall, SolValue};
use revm::precompile::{PrecompileError, PrecompileOutput, PrecompileResult};
use vrf_core::{random, store::StateStore, VrfState};

use crate::{
    revert::revert_with, IVrf, GAS_LATEST_RANDOMNESS, GAS_PER_RANDOM_WORD, GAS_RANDOM_WORDS,
};

/// The VRF precompile over the module state.
///
/// Both methods are view-only; the precompile charges its own gas schedule
/// and never the underlying KV gas.
pub struct VrfPrecompile<'a, S> {
    vrf: &'a VrfState<S>,
}

impl<'a, S: StateStore> VrfPrecompile<'a, S> {
    pub fn new(vrf: &'a VrfState<S>) -> Self {
        Self { vrf }
    }

    /// Gas charged up-front for a call with the given input. Unknown or
    /// truncated selectors price at zero and fail in [`Self::call`].
    pub fn required_gas(input: &[u8]) -> u64 {
        let Ok(selector) = <[u8; 4]>::try_from(&input[..input.len().min(4)]) else {
            return 0;
        };

        match selector {
            IVrf::latestRandomnessCall::SELECTOR => GAS_LATEST_RANDOMNESS,
            IVrf::randomWordsCall::SELECTOR => GAS_RANDOM_WORDS,
            _ => 0,
        }
    }

    pub fn call(&self, calldata: &[u8], gas_limit: u64) -> PrecompileResult {
        let selector: [u8; 4] = calldata
            .get(..4)
            .and_then(|sel| sel.try_into().ok())
            .ok_or_else(|| {
                PrecompileError::Other("vrf precompile: missing function selector".to_string())
            })?;

        match selector {
            IVrf::latestRandomnessCall::SELECTOR => self.latest_randomness(gas_limit),
            IVrf::randomWordsCall::SELECTOR => self.random_words(calldata, gas_limit),
            _ => Err(PrecompileError::Other(
                "vrf precompile: unknown function selector".to_string(),
            )),
        }
    }

    fn latest_randomness(&self, gas_limit: u64) -> PrecompileResult {
        if GAS_LATEST_RANDOMNESS > gas_limit {
            return Err(PrecompileError::OutOfGas);
        }

        let beacon = match self.vrf.get_beacon() {
            Ok(beacon) => beacon,
            Err(err) => return revert_with(GAS_LATEST_RANDOMNESS, &err.to_string()),
        };

        let randomness = B256::from(random::to_bytes32(&beacon.randomness));
        let out = (beacon.drand_round, randomness).abi_encode_params();
        Ok(PrecompileOutput::new(GAS_LATEST_RANDOMNESS, out.into()))
    }

    fn random_words(&self, calldata: &[u8], gas_limit: u64) -> PrecompileResult {
        if GAS_RANDOM_WORDS > gas_limit {
            return Err(PrecompileError::OutOfGas);
        }

        let call = match IVrf::randomWordsCall::abi_decode(calldata) {
            Ok(call) => call,
            Err(err) => {
                return revert_with(
                    GAS_RANDOM_WORDS,
                    &format!("vrf precompile: invalid calldata: {err}"),
                );
            }
        };

        if call.count.is_zero() || call.count > U256::from(random::MAX_RANDOM_WORDS) {
            return revert_with(
                GAS_RANDOM_WORDS,
                &format!(
                    "vrf precompile: count must be in [1, {}]",
                    random::MAX_RANDOM_WORDS
                ),
            );
        }
        let count = call.count.to::<u32>();

        // Base covers the first word; charge for the rest before doing the
        // work.
        let gas_used = GAS_RANDOM_WORDS + GAS_PER_RANDOM_WORD * u64::from(count - 1);
        if gas_used > gas_limit {
            return Err(PrecompileError::OutOfGas);
        }

        let words = match self.vrf.expand_randomness(count, call.userSeed.as_slice()) {
            Ok((_, words)) => words,
            Err(err) => return revert_with(gas_used, &err.to_string()),
        };

        let words: Vec<B256> = words.into_iter().map(B256::from).collect();
        Ok(PrecompileOutput::new(gas_used, words.abi_encode().into()))
    }
}
