//! Staking hook points.
//!
//! The surrounding staking module drives these; the VRF module only cares
//! about validator removal, where it drops the validator's drand identity.

use tracing::debug;

use crate::{error::VrfError, keeper::VrfState, store::StateStore};

/// Hook points reported by the staking module. Everything defaults to a
/// no-op; implementors override what they care about.
pub trait StakingHooks {
    fn after_validator_created(&mut self, _validator_address: &str) -> Result<(), VrfError> {
        Ok(())
    }

    fn before_validator_modified(&mut self, _validator_address: &str) -> Result<(), VrfError> {
        Ok(())
    }

    fn after_validator_bonded(&mut self, _validator_address: &str) -> Result<(), VrfError> {
        Ok(())
    }

    fn after_validator_begin_unbonding(&mut self, _validator_address: &str) -> Result<(), VrfError> {
        Ok(())
    }

    fn after_validator_removed(&mut self, _validator_address: &str) -> Result<(), VrfError> {
        Ok(())
    }
}

/// VRF module hooks over the shared state.
pub struct VrfHooks<'a, S> {
    vrf: &'a mut VrfState<S>,
}

impl<'a, S: StateStore> VrfHooks<'a, S> {
    pub fn new(vrf: &'a mut VrfState<S>) -> Self {
        Self { vrf }
    }
}

impl<S: StateStore> StakingHooks for VrfHooks<'_, S> {
    fn after_validator_removed(&mut self, validator_address: &str) -> Result<(), VrfError> {
        // Best-effort cleanup; a missing identity is not an error.
        self.vrf.remove_identity(validator_address)?;
        debug!(validator = %validator_address, "removed vrf identity");
        Ok(())
    }
}
