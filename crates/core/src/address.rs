//! Bech32 account and validator addresses.
//!
//! The module does not pin a chain prefix; addresses are validated
//! structurally and validator addresses are derived from account addresses by
//! re-encoding the same bytes under the `<hrp>valoper` prefix, so any chain
//! prefix wired in at the application layer round-trips.

use bech32::{Bech32, Hrp};
use sha2::{Digest, Sha256};

use crate::error::VrfError;

/// Suffix appended to the account HRP to form the validator HRP.
pub const VALIDATOR_HRP_SUFFIX: &str = "valoper";

/// Decode a bech32 address into its prefix and payload bytes.
pub fn decode(addr: &str) -> Result<(Hrp, Vec<u8>), VrfError> {
    bech32::decode(addr).map_err(|err| VrfError::invalid_address(addr, err))
}

/// Check that an address is well-formed bech32 with a non-empty payload.
pub fn validate(addr: &str) -> Result<(), VrfError> {
    let (_, data) = decode(addr)?;
    if data.is_empty() {
        return Err(VrfError::invalid_address(addr, "empty address payload"));
    }
    Ok(())
}

/// Derive the validator address for an operator account address: the same
/// payload bytes re-encoded under the validator prefix.
pub fn validator_address_from_account(account: &str) -> Result<String, VrfError> {
    let (hrp, data) = decode(account)?;
    let val_hrp = Hrp::parse(&format!("{hrp}{VALIDATOR_HRP_SUFFIX}"))
        .map_err(|err| VrfError::invalid_address(account, err))?;
    bech32::encode::<Bech32>(val_hrp, &data).map_err(|err| VrfError::invalid_address(account, err))
}

/// The account payload bound to an ed25519 public key: `sha256(pubkey)[..20]`.
pub fn payload_from_pubkey(pubkey: &[u8]) -> [u8; 20] {
    let digest = Sha256::digest(pubkey);
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest[..20]);
    out
}

/// Encode an account address for a public key under the given prefix.
pub fn address_from_pubkey(hrp: &str, pubkey: &[u8]) -> Result<String, VrfError> {
    let hrp = Hrp::parse(hrp).map_err(|err| VrfError::invalid_address(hrp, err))?;
    bech32::encode::<Bech32>(hrp, &payload_from_pubkey(pubkey))
        .map_err(|err| VrfError::invalid_address("<pubkey>", err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_well_formed_addresses() {
        let addr = address_from_pubkey("chain", &[7u8; 32]).unwrap();
        validate(&addr).unwrap();
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(validate("not-an-address").is_err());
        assert!(validate("").is_err());
        // valid charset but corrupted checksum
        assert!(validate("chain1qqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqq").is_err());
    }

    #[test]
    fn validator_address_shares_payload() {
        let account = address_from_pubkey("chain", &[9u8; 32]).unwrap();
        let validator = validator_address_from_account(&account).unwrap();

        let (account_hrp, account_data) = decode(&account).unwrap();
        let (validator_hrp, validator_data) = decode(&validator).unwrap();

        assert_eq!(account_data, validator_data);
        assert_eq!(
            format!("{validator_hrp}"),
            format!("{account_hrp}{VALIDATOR_HRP_SUFFIX}")
        );
    }

    #[test]
    fn derivation_is_stable() {
        let a = address_from_pubkey("chain", &[1u8; 32]).unwrap();
        let b = address_from_pubkey("chain", &[1u8; 32]).unwrap();
        assert_eq!(a, b);

        let c = address_from_pubkey("chain", &[2u8; 32]).unwrap();
        assert_ne!(a, c);
    }
}
