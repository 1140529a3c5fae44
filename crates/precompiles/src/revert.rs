//! Standard `Error(string)` revert encoding.

use alloy_sol_types::{Revert, SolError};
use revm::precompile::{PrecompileOutput, PrecompileResult};

/// ABI-encode a Solidity `Error(string)` revert reason
/// (`0x08c379a0` followed by the encoded string).
pub fn revert_reason_bytes(reason: &str) -> Vec<u8> {
    Revert::from(reason).abi_encode()
}

/// Build a reverted precompile result carrying the encoded reason as return
/// data, with `gas_used` charged.
pub fn revert_with(gas_used: u64, reason: &str) -> PrecompileResult {
    Ok(PrecompileOutput::new_reverted(
        gas_used,
        revert_reason_bytes(reason).into(),
    ))
}

#[cfg(test)]
mod tests {
    use alloy_sol_types::{Revert, SolError};

    use super::*;

    #[test]
    fn reason_bytes_use_the_error_selector() {
        let bytes = revert_reason_bytes("boom");
        assert_eq!(&bytes[..4], &[0x08, 0xc3, 0x79, 0xa0]);

        let decoded = Revert::abi_decode(&bytes).unwrap();
        assert_eq!(decoded.reason, "boom");
    }

    #[test]
    fn empty_reason_roundtrips() {
        let bytes = revert_reason_bytes("");
        let decoded = Revert::abi_decode(&bytes).unwrap();
        assert_eq!(decoded.reason, "");
    }

    #[test]
    fn revert_result_is_marked_reverted() {
        let result = revert_with(2_000, "boom").unwrap();
        assert!(result.reverted);
        assert_eq!(result.gas_used, 2_000);
        assert!(!result.bytes.is_empty());
    }
}
