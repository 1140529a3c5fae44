//! VRF module state and message handlers.

use tracing::debug;

use crate::{
    address,
    error::VrfError,
    params::VrfParams,
    random,
    store::{self, keys, StateStore},
    tx::{
        MsgAddCommitteeMember, MsgEmergencyDisable, MsgRegisterIdentity, MsgRemoveCommitteeMember,
        MsgScheduleReshare, MsgUpdateParams,
    },
    types::{BlockCtx, CommitteeMember, Event, VrfBeacon, VrfIdentity},
};

/// The VRF module state, addressed through a [`StateStore`].
///
/// `authority` is the governance account allowed to mutate params and the
/// committee allowlist.
#[derive(Debug, Clone)]
pub struct VrfState<S> {
    store: S,
    authority: String,
}

impl<S: StateStore> VrfState<S> {
    pub fn new(store: S, authority: impl Into<String>) -> Self {
        Self {
            store,
            authority: authority.into(),
        }
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ---- params ----

    pub fn params(&self) -> Result<VrfParams, VrfError> {
        Ok(store::get_json(&self.store, keys::PARAMS)?.unwrap_or_default())
    }

    pub fn set_params(&mut self, params: &VrfParams) -> Result<(), VrfError> {
        params.validate()?;
        store::set_json(&mut self.store, keys::PARAMS, params)
    }

    // ---- beacon ----

    /// The latest installed beacon, regardless of the enabled flag.
    pub fn latest_beacon(&self) -> Result<Option<VrfBeacon>, VrfError> {
        store::get_json(&self.store, keys::LATEST_BEACON)
    }

    pub fn set_latest_beacon(&mut self, beacon: &VrfBeacon) -> Result<(), VrfError> {
        store::set_json(&mut self.store, keys::LATEST_BEACON, beacon)
    }

    /// The latest beacon for consumers: fails while VRF is disabled or before
    /// any beacon has been installed.
    pub fn get_beacon(&self) -> Result<VrfBeacon, VrfError> {
        let params = self.params()?;
        if !params.enabled {
            return Err(VrfError::Disabled);
        }

        self.latest_beacon()?.ok_or(VrfError::NoBeacon)
    }

    /// Expand the current beacon into `count` random words.
    pub fn expand_randomness(
        &self,
        count: u32,
        user_seed: &[u8],
    ) -> Result<(VrfBeacon, Vec<[u8; 32]>), VrfError> {
        let beacon = self.get_beacon()?;
        let params = self.params()?;
        let words = random::derive_random_words(&params, &beacon, count, user_seed)?;
        Ok((beacon, words))
    }

    // ---- committee ----

    pub fn is_committee_member(&self, addr: &str) -> Result<bool, VrfError> {
        address::validate(addr)?;
        Ok(self.store.get(&keys::committee(addr)).is_some())
    }

    pub fn set_committee_member(&mut self, addr: &str, label: &str) -> Result<(), VrfError> {
        address::validate(addr)?;
        let member = CommitteeMember {
            address: addr.to_string(),
            label: label.to_string(),
        };
        store::set_json(&mut self.store, &keys::committee(addr), &member)
    }

    pub fn remove_committee_member(&mut self, addr: &str) -> Result<(), VrfError> {
        address::validate(addr)?;
        self.store.delete(&keys::committee(addr));
        Ok(())
    }

    pub fn committee_members(&self) -> Result<Vec<CommitteeMember>, VrfError> {
        self.store
            .scan_prefix(keys::COMMITTEE_PREFIX)
            .into_iter()
            .map(|(_, raw)| {
                serde_json::from_slice(&raw).map_err(|err| VrfError::Codec(err.to_string()))
            })
            .collect()
    }

    // ---- identities ----

    pub fn identity(&self, validator_address: &str) -> Result<Option<VrfIdentity>, VrfError> {
        store::get_json(&self.store, &keys::identity(validator_address))
    }

    pub fn set_identity(&mut self, identity: &VrfIdentity) -> Result<(), VrfError> {
        store::set_json(
            &mut self.store,
            &keys::identity(&identity.validator_address),
            identity,
        )
    }

    pub fn remove_identity(&mut self, validator_address: &str) -> Result<(), VrfError> {
        self.store.delete(&keys::identity(validator_address));
        Ok(())
    }

    pub fn identities(&self) -> Result<Vec<VrfIdentity>, VrfError> {
        self.store
            .scan_prefix(keys::IDENTITY_PREFIX)
            .into_iter()
            .map(|(_, raw)| {
                serde_json::from_slice(&raw).map_err(|err| VrfError::Codec(err.to_string()))
            })
            .collect()
    }

    fn require_authority(&self, authority: &str) -> Result<(), VrfError> {
        if authority != self.authority {
            return Err(VrfError::Unauthorized(format!(
                "invalid authority; expected {}, got {authority}",
                self.authority
            )));
        }
        Ok(())
    }

    // ---- message handlers ----

    /// Emergency disable carries no state transition of its own; the gate
    /// lives in admission and pre-block. Handling it only surfaces the event.
    pub fn handle_emergency_disable(
        &mut self,
        msg: &MsgEmergencyDisable,
    ) -> Result<Event, VrfError> {
        address::validate(&msg.authority)?;

        Ok(Event::new("vrf_emergency_disable")
            .attr("authority", &msg.authority)
            .attr("reason", &msg.reason))
    }

    pub fn handle_update_params(&mut self, msg: &MsgUpdateParams) -> Result<Event, VrfError> {
        address::validate(&msg.authority)?;
        self.require_authority(&msg.authority)?;
        self.set_params(&msg.params)?;

        Ok(Event::new("vrf_update_params").attr("authority", &msg.authority))
    }

    pub fn handle_add_committee_member(
        &mut self,
        msg: &MsgAddCommitteeMember,
    ) -> Result<Event, VrfError> {
        address::validate(&msg.authority)?;
        self.require_authority(&msg.authority)?;
        self.set_committee_member(&msg.address, &msg.label)?;

        Ok(Event::new("vrf_add_committee_member")
            .attr("authority", &msg.authority)
            .attr("address", &msg.address)
            .attr("label", &msg.label))
    }

    pub fn handle_remove_committee_member(
        &mut self,
        msg: &MsgRemoveCommitteeMember,
    ) -> Result<Event, VrfError> {
        address::validate(&msg.authority)?;
        self.require_authority(&msg.authority)?;
        self.remove_committee_member(&msg.address)?;

        Ok(Event::new("vrf_remove_committee_member")
            .attr("authority", &msg.authority)
            .attr("address", &msg.address))
    }

    /// Bind a drand BLS key to the operator's validator address. First
    /// registration records the block time and current reshare epoch; later
    /// registrations refresh only the key and chain hash.
    pub fn handle_register_identity(
        &mut self,
        ctx: &BlockCtx,
        msg: &MsgRegisterIdentity,
    ) -> Result<Event, VrfError> {
        if msg.drand_bls_public_key.is_empty() {
            return Err(VrfError::InvalidMessage(
                "drand_bls_public_key must not be empty".into(),
            ));
        }

        let validator_address = address::validator_address_from_account(&msg.operator)?;
        let params = self.params()?;

        let mut identity = VrfIdentity {
            validator_address: validator_address.clone(),
            drand_bls_public_key: msg.drand_bls_public_key.clone(),
            chain_hash: params.chain_hash.clone(),
            signal_unix_sec: ctx.time_unix,
            signal_reshare_epoch: params.reshare_epoch,
        };

        if let Some(existing) = self.identity(&validator_address)? {
            identity.signal_unix_sec = existing.signal_unix_sec;
            identity.signal_reshare_epoch = existing.signal_reshare_epoch;
        }

        self.set_identity(&identity)?;
        debug!(validator = %validator_address, "registered vrf identity");

        Ok(Event::new("vrf_register_identity")
            .attr("operator", &msg.operator)
            .attr("validator_address", validator_address))
    }

    /// Advance the reshare epoch. Requires a committee member and a strictly
    /// increasing epoch.
    pub fn handle_schedule_reshare(&mut self, msg: &MsgScheduleReshare) -> Result<Event, VrfError> {
        if !self.is_committee_member(&msg.scheduler)? {
            return Err(VrfError::Unauthorized(format!(
                "scheduler {} is not in committee",
                msg.scheduler
            )));
        }

        let mut params = self.params()?;
        if msg.reshare_epoch <= params.reshare_epoch {
            return Err(VrfError::Unauthorized(format!(
                "reshare_epoch must be > current ({})",
                params.reshare_epoch
            )));
        }

        let old_epoch = params.reshare_epoch;
        params.reshare_epoch = msg.reshare_epoch;
        self.set_params(&params)?;

        Ok(Event::new("vrf_schedule_reshare")
            .attr("scheduler", &msg.scheduler)
            .attr("old_reshare_epoch", old_epoch.to_string())
            .attr("new_reshare_epoch", msg.reshare_epoch.to_string())
            .attr("reason", &msg.reason))
    }
}
