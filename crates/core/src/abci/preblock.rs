//! Pre-block handling: beacon installation and the emergency bypass.
//!
//! The handler is the single writer of the latest beacon; it runs once per
//! height before transaction execution, so readers observe at most one
//! transition per block.

use std::time::Instant;

use sha2::{Digest, Sha256};
use tracing::{info, warn};

use super::metrics::{record_latency_and_status, AbciMethod};
use crate::{
    account::AccountStore,
    emergency::verify_emergency_tx,
    error::VrfError,
    keeper::VrfState,
    store::StateStore,
    tx::Tx,
    types::{BlockCtx, VrfBeacon},
};

/// What the pre-block pass did for this height.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreBlockOutcome {
    /// Round of the beacon installed at this height, if any.
    pub installed_round: Option<u64>,
    /// An authorized emergency-disable tx suspended VRF for this block.
    pub vrf_bypassed: bool,
    pub emergency_reason: Option<String>,
}

/// Run the pre-block pass: scan the block's transactions for an authorized
/// emergency disable, then install the fetched beacon if it is fresh enough.
pub fn pre_block<S, A>(
    vrf: &mut VrfState<S>,
    accounts: &A,
    ctx: &BlockCtx,
    fetched: Option<&VrfBeacon>,
    txs: &[Tx],
) -> Result<PreBlockOutcome, VrfError>
where
    S: StateStore,
    A: AccountStore,
{
    let started = Instant::now();
    let result = pre_block_inner(vrf, accounts, ctx, fetched, txs);
    record_latency_and_status(started.elapsed(), result.is_ok(), AbciMethod::PreBlock);
    result
}

fn pre_block_inner<S, A>(
    vrf: &mut VrfState<S>,
    accounts: &A,
    ctx: &BlockCtx,
    fetched: Option<&VrfBeacon>,
    txs: &[Tx],
) -> Result<PreBlockOutcome, VrfError>
where
    S: StateStore,
    A: AccountStore,
{
    let params = vrf.params()?;
    if !params.enabled {
        return Ok(PreBlockOutcome::default());
    }

    // Emergency scan first: an authorized disable suspends VRF for the whole
    // block, including the install below. Invalid transactions are skipped;
    // only a verified, committee-signed message counts.
    for tx in txs {
        match verify_emergency_tx(ctx, tx, accounts, vrf) {
            Ok(check) if check.found && check.authorized => {
                info!(
                    height = ctx.height,
                    reason = %check.reason,
                    "vrf bypassed by emergency disable"
                );
                return Ok(PreBlockOutcome {
                    installed_round: None,
                    vrf_bypassed: true,
                    emergency_reason: Some(check.reason),
                });
            }
            Ok(_) => {}
            Err(err) => {
                warn!(height = ctx.height, %err, "skipping invalid tx in emergency scan");
            }
        }
    }

    let Some(beacon) = fetched else {
        return Ok(PreBlockOutcome::default());
    };

    if Sha256::digest(&beacon.signature).as_slice() != beacon.randomness.as_slice() {
        return Err(VrfError::RandomnessMismatch);
    }

    // Freshness gate: a round may lag block time by at most the safety
    // margin.
    let expected = params.round_at(ctx.time_unix);
    let min_round = expected.saturating_sub(params.safety_margin_rounds());
    if beacon.drand_round < min_round {
        warn!(
            height = ctx.height,
            round = beacon.drand_round,
            min_round,
            "fetched beacon too stale; not installing"
        );
        return Ok(PreBlockOutcome::default());
    }

    vrf.set_latest_beacon(beacon)?;
    info!(height = ctx.height, round = beacon.drand_round, "installed beacon");

    Ok(PreBlockOutcome {
        installed_round: Some(beacon.drand_round),
        vrf_bypassed: false,
        emergency_reason: None,
    })
}
