//! Genesis state for the VRF module.

use serde::{Deserialize, Serialize};

use crate::{
    address,
    error::VrfError,
    keeper::VrfState,
    params::VrfParams,
    store::StateStore,
    types::{CommitteeMember, VrfIdentity},
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisState {
    pub params: VrfParams,
    #[serde(default)]
    pub committee: Vec<CommitteeMember>,
    #[serde(default)]
    pub identities: Vec<VrfIdentity>,
}

impl GenesisState {
    pub fn validate(&self) -> Result<(), VrfError> {
        self.params.validate()?;

        let mut seen = std::collections::BTreeSet::new();
        for member in &self.committee {
            address::validate(&member.address)?;
            if !seen.insert(&member.address) {
                return Err(VrfError::InvalidParams(format!(
                    "duplicate committee member {}",
                    member.address
                )));
            }
        }

        let mut seen = std::collections::BTreeSet::new();
        for identity in &self.identities {
            address::validate(&identity.validator_address)?;
            if !seen.insert(&identity.validator_address) {
                return Err(VrfError::InvalidParams(format!(
                    "duplicate identity for {}",
                    identity.validator_address
                )));
            }

            // identities tagged with a chain hash must agree with params
            if !identity.chain_hash.is_empty()
                && !self.params.chain_hash.is_empty()
                && identity.chain_hash != self.params.chain_hash
            {
                return Err(VrfError::InvalidParams(format!(
                    "identity {} chain hash disagrees with params",
                    identity.validator_address
                )));
            }
        }

        Ok(())
    }
}

pub fn init_genesis<S: StateStore>(
    vrf: &mut VrfState<S>,
    genesis: &GenesisState,
) -> Result<(), VrfError> {
    genesis.validate()?;

    vrf.set_params(&genesis.params)?;
    for member in &genesis.committee {
        vrf.set_committee_member(&member.address, &member.label)?;
    }
    for identity in &genesis.identities {
        vrf.set_identity(identity)?;
    }
    Ok(())
}

pub fn export_genesis<S: StateStore>(vrf: &VrfState<S>) -> Result<GenesisState, VrfError> {
    Ok(GenesisState {
        params: vrf.params()?,
        committee: vrf.committee_members()?,
        identities: vrf.identities()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;

    fn addr(seed: u8) -> String {
        address::address_from_pubkey("chain", &[seed; 32]).unwrap()
    }

    fn genesis_fixture() -> GenesisState {
        GenesisState {
            params: VrfParams {
                enabled: true,
                public_key: vec![1; 48],
                chain_hash: vec![2; 32],
                period_seconds: 30,
                safety_margin_seconds: 60,
                genesis_unix_sec: 1_700_000_000,
                reshare_epoch: 1,
            },
            committee: vec![CommitteeMember {
                address: addr(1),
                label: "guardian".into(),
            }],
            identities: vec![VrfIdentity {
                validator_address: addr(2),
                drand_bls_public_key: vec![3; 48],
                chain_hash: vec![2; 32],
                signal_unix_sec: 1_700_000_050,
                signal_reshare_epoch: 1,
            }],
        }
    }

    #[test]
    fn init_then_export_roundtrips() {
        let genesis = genesis_fixture();
        let mut state = VrfState::new(MemStore::new(), addr(0));
        init_genesis(&mut state, &genesis).unwrap();

        let exported = export_genesis(&state).unwrap();
        assert_eq!(exported, genesis);
    }

    #[test]
    fn mismatched_identity_chain_hash_is_rejected() {
        let mut genesis = genesis_fixture();
        genesis.identities[0].chain_hash = vec![9; 32];
        assert!(genesis.validate().is_err());
    }

    #[test]
    fn duplicate_committee_member_is_rejected() {
        let mut genesis = genesis_fixture();
        genesis.committee.push(genesis.committee[0].clone());
        assert!(genesis.validate().is_err());
    }

    #[test]
    fn default_genesis_is_valid() {
        GenesisState::default().validate().unwrap();
    }
}
