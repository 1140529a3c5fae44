//! Deterministic authorization check for emergency-disable transactions.
//!
//! The same check backs two call sites: transaction admission (where it makes
//! the transaction gasless) and the pre-block hook (where it bypasses VRF for
//! the block). Both must observe identical results for identical `(tx, state)`
//! inputs, so everything here is a pure function of its arguments.

use crate::{
    account::AccountStore,
    error::VrfError,
    keeper::VrfState,
    store::StateStore,
    tx::{verify_tx_signatures, Msg, MsgEmergencyDisable, SequenceSource, Tx},
    types::BlockCtx,
};

/// Outcome of scanning one transaction for emergency-disable messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmergencyCheck {
    /// The tx contained at least one emergency-disable message.
    pub found: bool,
    /// At least one such message was signed by a committee member.
    pub authorized: bool,
    /// Free-form reason from the first authorized message.
    pub reason: String,
}

/// Check whether a transaction is an authorized emergency disable.
///
/// Signature verification uses the standard primitives with one deliberate
/// divergence: the sequence fed into the sign-doc is taken from the signature
/// itself, so emergency transactions bypass nonce monotonicity.
pub fn verify_emergency_tx<S: StateStore, A: AccountStore>(
    ctx: &BlockCtx,
    tx: &Tx,
    accounts: &A,
    vrf: &VrfState<S>,
) -> Result<EmergencyCheck, VrfError> {
    let emergency_msgs: Vec<&MsgEmergencyDisable> = tx
        .body
        .messages
        .iter()
        .filter_map(|msg| match msg {
            Msg::EmergencyDisable(m) => Some(m),
            _ => None,
        })
        .collect();

    if emergency_msgs.is_empty() {
        return Ok(EmergencyCheck::default());
    }

    // An emergency disable must be a dedicated transaction so that bypassing
    // fees and sequence checks cannot apply to non-emergency messages.
    if emergency_msgs.len() != tx.body.messages.len() {
        return Err(VrfError::InvalidTx(
            "emergency disable tx must contain only emergency-disable messages".into(),
        ));
    }

    verify_tx_signatures(ctx, tx, accounts, SequenceSource::Signature)?;

    for msg in &emergency_msgs {
        // well-formed authority; the reason is free-form (empty allowed)
        crate::address::validate(&msg.authority)?;

        if vrf.is_committee_member(&msg.authority)? {
            return Ok(EmergencyCheck {
                found: true,
                authorized: true,
                reason: msg.reason.clone(),
            });
        }
    }

    Ok(EmergencyCheck {
        found: true,
        authorized: false,
        reason: String::new(),
    })
}
