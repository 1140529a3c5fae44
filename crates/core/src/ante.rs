//! Transaction admission.
//!
//! A reduced decorator chain in the order that makes emergency transactions
//! gasless: basic validation, then the emergency gate, then fee deduction,
//! pub-key persistence, signature verification and sequence increment. When
//! the emergency gate authorizes a transaction it short-circuits everything
//! after itself, so no fee is charged and no sequence is consumed.

use crate::{
    account::{AccountStore, Bank},
    address,
    emergency::{verify_emergency_tx, EmergencyCheck},
    error::VrfError,
    keeper::VrfState,
    store::StateStore,
    tx::{tx_signers, verify_tx_signatures, SequenceSource, Tx},
    types::BlockCtx,
};

/// How a transaction cleared admission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdmissionOutcome {
    /// Fee deduction and sequence increment were skipped.
    pub gasless: bool,
    /// Reason from the authorizing emergency message, if any.
    pub emergency_reason: Option<String>,
}

/// Admit a transaction, mutating accounts and balances on the standard path.
pub fn admit_tx<S, A, B>(
    ctx: &BlockCtx,
    tx: &Tx,
    vrf: &VrfState<S>,
    accounts: &mut A,
    bank: &mut B,
) -> Result<AdmissionOutcome, VrfError>
where
    S: StateStore,
    A: AccountStore,
    B: Bank,
{
    if tx.body.messages.is_empty() {
        return Err(VrfError::InvalidTx("transaction has no messages".into()));
    }

    for msg in &tx.body.messages {
        msg.validate_basic()?;
    }

    // Emergency gate. Runs before fee deduction and sequence handling; no
    // other ordering keeps authorized emergency transactions gasless.
    match verify_emergency_tx(ctx, tx, accounts, vrf)? {
        EmergencyCheck {
            found: true,
            authorized: true,
            reason,
        } => {
            return Ok(AdmissionOutcome {
                gasless: true,
                emergency_reason: Some(reason),
            });
        }
        EmergencyCheck {
            found: true,
            authorized: false,
            ..
        } => {
            return Err(VrfError::Unauthorized(
                "emergency disable not signed by a committee member".into(),
            ));
        }
        _ => {}
    }

    let signers = tx_signers(&tx.body);
    let fee_payer = signers
        .first()
        .ok_or_else(|| VrfError::InvalidTx("transaction has no signers".into()))?;

    bank.deduct_fee(fee_payer, tx.fee.amount)?;

    set_missing_pub_keys(tx, accounts)?;
    verify_tx_signatures(ctx, tx, accounts, SequenceSource::Account)?;
    increment_sequences(tx, accounts)?;

    Ok(AdmissionOutcome::default())
}

/// Persist public keys seen for the first time, after checking they bind to
/// the signer address.
fn set_missing_pub_keys<A: AccountStore>(tx: &Tx, accounts: &mut A) -> Result<(), VrfError> {
    for (signer, sig) in tx_signers(&tx.body).iter().zip(&tx.signatures) {
        if sig.pub_key.is_empty() {
            continue;
        }

        let mut account = accounts
            .account(signer)
            .ok_or_else(|| VrfError::UnknownSigner(signer.to_string()))?;
        if account.pub_key.is_some() {
            continue;
        }

        let (_, payload) = address::decode(signer)?;
        if payload != address::payload_from_pubkey(&sig.pub_key) {
            return Err(VrfError::SignatureVerification(format!(
                "public key does not match signer {signer}"
            )));
        }

        account.pub_key = Some(sig.pub_key.clone());
        accounts.set_account(account);
    }
    Ok(())
}

fn increment_sequences<A: AccountStore>(tx: &Tx, accounts: &mut A) -> Result<(), VrfError> {
    for signer in tx_signers(&tx.body) {
        let mut account = accounts
            .account(signer)
            .ok_or_else(|| VrfError::UnknownSigner(signer.to_string()))?;
        account.sequence += 1;
        accounts.set_account(account);
    }
    Ok(())
}
