//! Transaction and message model.
//!
//! Messages are signed over a canonical JSON sign-doc carrying the chain id,
//! the signer's account number and a sequence. Standard admission takes the
//! sequence from the on-chain account (and requires the signature to agree);
//! the emergency path takes it from the signature itself so emergency
//! transactions bypass nonce monotonicity.

use ed25519_dalek::{Signature, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::{
    account::AccountStore,
    address,
    error::VrfError,
    params::VrfParams,
    types::BlockCtx,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgEmergencyDisable {
    pub authority: String,
    /// Free-form operator note; empty is allowed.
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgUpdateParams {
    pub authority: String,
    pub params: VrfParams,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgAddCommitteeMember {
    pub authority: String,
    pub address: String,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgRemoveCommitteeMember {
    pub authority: String,
    pub address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgRegisterIdentity {
    pub operator: String,
    pub drand_bls_public_key: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgScheduleReshare {
    pub scheduler: String,
    pub reshare_epoch: u64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Msg {
    EmergencyDisable(MsgEmergencyDisable),
    UpdateParams(MsgUpdateParams),
    AddCommitteeMember(MsgAddCommitteeMember),
    RemoveCommitteeMember(MsgRemoveCommitteeMember),
    RegisterIdentity(MsgRegisterIdentity),
    ScheduleReshare(MsgScheduleReshare),
}

impl Msg {
    /// Stateless well-formedness checks.
    pub fn validate_basic(&self) -> Result<(), VrfError> {
        match self {
            Msg::EmergencyDisable(m) => address::validate(&m.authority),
            Msg::UpdateParams(m) => {
                address::validate(&m.authority)?;
                m.params.validate()
            }
            Msg::AddCommitteeMember(m) => {
                address::validate(&m.authority)?;
                address::validate(&m.address)
            }
            Msg::RemoveCommitteeMember(m) => {
                address::validate(&m.authority)?;
                address::validate(&m.address)
            }
            Msg::RegisterIdentity(m) => {
                address::validate(&m.operator)?;
                if m.drand_bls_public_key.is_empty() {
                    return Err(VrfError::InvalidMessage(
                        "drand_bls_public_key must not be empty".into(),
                    ));
                }
                Ok(())
            }
            Msg::ScheduleReshare(m) => {
                address::validate(&m.scheduler)?;
                if m.reshare_epoch == 0 {
                    return Err(VrfError::InvalidMessage("reshare_epoch must be > 0".into()));
                }
                Ok(())
            }
        }
    }

    /// The account expected to sign this message.
    pub fn signer(&self) -> &str {
        match self {
            Msg::EmergencyDisable(m) => &m.authority,
            Msg::UpdateParams(m) => &m.authority,
            Msg::AddCommitteeMember(m) => &m.authority,
            Msg::RemoveCommitteeMember(m) => &m.authority,
            Msg::RegisterIdentity(m) => &m.operator,
            Msg::ScheduleReshare(m) => &m.scheduler,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
    pub amount: u128,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxBody {
    pub messages: Vec<Msg>,
    pub memo: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxSignature {
    /// ed25519 public key; may be empty when the account already has one.
    pub pub_key: Vec<u8>,
    /// Sequence the signer committed to in the sign-doc.
    pub sequence: u64,
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tx {
    pub body: TxBody,
    pub fee: Fee,
    pub signatures: Vec<TxSignature>,
}

/// Canonical signing payload. Field order is fixed by this struct.
#[derive(Serialize)]
struct SignDoc<'a> {
    chain_id: &'a str,
    account_number: u64,
    sequence: u64,
    body: &'a TxBody,
}

pub fn sign_doc_bytes(
    chain_id: &str,
    account_number: u64,
    sequence: u64,
    body: &TxBody,
) -> Result<Vec<u8>, VrfError> {
    serde_json::to_vec(&SignDoc {
        chain_id,
        account_number,
        sequence,
        body,
    })
    .map_err(|err| VrfError::Codec(err.to_string()))
}

/// The distinct signers of a transaction body, in first-appearance order.
pub fn tx_signers(body: &TxBody) -> Vec<&str> {
    let mut signers: Vec<&str> = Vec::new();
    for msg in &body.messages {
        let signer = msg.signer();
        if !signers.contains(&signer) {
            signers.push(signer);
        }
    }
    signers
}

/// Where the sequence fed into the sign-doc comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceSource {
    /// The on-chain account sequence; the signature must agree with it.
    Account,
    /// The sequence carried in the signature itself (emergency path).
    Signature,
}

/// Verify every signature on the transaction.
///
/// Uses the same primitives in both admission modes; the only divergence is
/// the [`SequenceSource`].
pub fn verify_tx_signatures<A: AccountStore>(
    ctx: &BlockCtx,
    tx: &Tx,
    accounts: &A,
    source: SequenceSource,
) -> Result<(), VrfError> {
    let signers = tx_signers(&tx.body);
    if tx.signatures.len() != signers.len() {
        return Err(VrfError::InvalidTx(format!(
            "invalid number of signatures; expected {}, got {}",
            signers.len(),
            tx.signatures.len()
        )));
    }

    for (signer, sig) in signers.iter().zip(&tx.signatures) {
        let account = accounts
            .account(signer)
            .ok_or_else(|| VrfError::UnknownSigner(signer.to_string()))?;

        let pub_key = if !sig.pub_key.is_empty() {
            sig.pub_key.clone()
        } else {
            account.pub_key.clone().ok_or_else(|| {
                VrfError::SignatureVerification(format!("missing public key for signer {signer}"))
            })?
        };

        // The key must actually belong to the signing address.
        let (_, payload) = address::decode(signer)?;
        if payload != address::payload_from_pubkey(&pub_key) {
            return Err(VrfError::SignatureVerification(format!(
                "public key does not match signer {signer}"
            )));
        }

        let sequence = match source {
            SequenceSource::Account => {
                if sig.sequence != account.sequence {
                    return Err(VrfError::SignatureVerification(format!(
                        "sequence mismatch for {signer}: signature has {}, account has {}",
                        sig.sequence, account.sequence
                    )));
                }
                account.sequence
            }
            SequenceSource::Signature => sig.sequence,
        };

        let doc = sign_doc_bytes(&ctx.chain_id, account.account_number, sequence, &tx.body)?;

        let key_bytes: [u8; 32] = pub_key.as_slice().try_into().map_err(|_| {
            VrfError::SignatureVerification("public key must be 32 bytes".into())
        })?;
        let key = VerifyingKey::from_bytes(&key_bytes)
            .map_err(|err| VrfError::SignatureVerification(err.to_string()))?;
        let signature = Signature::from_slice(&sig.signature)
            .map_err(|err| VrfError::SignatureVerification(err.to_string()))?;

        key.verify_strict(&doc, &signature)
            .map_err(|err| VrfError::SignatureVerification(err.to_string()))?;
    }

    Ok(())
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::account::MemAccountStore;

    fn ctx() -> BlockCtx {
        BlockCtx {
            height: 10,
            time_unix: 1_700_000_000,
            chain_id: "vrf-test-1".into(),
        }
    }

    fn emergency_body(authority: &str) -> TxBody {
        TxBody {
            messages: vec![Msg::EmergencyDisable(MsgEmergencyDisable {
                authority: authority.into(),
                reason: "halt".into(),
            })],
            memo: String::new(),
        }
    }

    #[test]
    fn valid_signature_passes_both_modes() {
        let ctx = ctx();
        let signer = signer(1);
        let mut accounts = MemAccountStore::new();
        fund_account(&mut accounts, &signer, 5);

        let tx = sign_tx(&ctx, emergency_body(&signer.address), &[(&signer, 1, 5)]);
        verify_tx_signatures(&ctx, &tx, &accounts, SequenceSource::Account).unwrap();
        verify_tx_signatures(&ctx, &tx, &accounts, SequenceSource::Signature).unwrap();
    }

    #[test]
    fn stale_sequence_fails_account_mode_but_not_signature_mode() {
        let ctx = ctx();
        let signer = signer(1);
        let mut accounts = MemAccountStore::new();
        fund_account(&mut accounts, &signer, 5);

        // signed with an old sequence
        let tx = sign_tx(&ctx, emergency_body(&signer.address), &[(&signer, 1, 3)]);

        assert!(matches!(
            verify_tx_signatures(&ctx, &tx, &accounts, SequenceSource::Account),
            Err(VrfError::SignatureVerification(_))
        ));
        verify_tx_signatures(&ctx, &tx, &accounts, SequenceSource::Signature).unwrap();
    }

    #[test]
    fn tampered_body_fails() {
        let ctx = ctx();
        let signer = signer(1);
        let mut accounts = MemAccountStore::new();
        fund_account(&mut accounts, &signer, 0);

        let mut tx = sign_tx(&ctx, emergency_body(&signer.address), &[(&signer, 1, 0)]);
        if let Msg::EmergencyDisable(m) = &mut tx.body.messages[0] {
            m.reason = "changed".into();
        }

        assert!(matches!(
            verify_tx_signatures(&ctx, &tx, &accounts, SequenceSource::Signature),
            Err(VrfError::SignatureVerification(_))
        ));
    }

    #[test]
    fn foreign_pubkey_is_rejected() {
        let ctx = ctx();
        let signer = signer(1);
        let other = signer_with_other_key();
        let mut accounts = MemAccountStore::new();
        fund_account(&mut accounts, &signer, 0);

        let mut tx = sign_tx(&ctx, emergency_body(&signer.address), &[(&signer, 1, 0)]);
        tx.signatures[0].pub_key = other;

        assert!(matches!(
            verify_tx_signatures(&ctx, &tx, &accounts, SequenceSource::Signature),
            Err(VrfError::SignatureVerification(_))
        ));
    }

    fn signer_with_other_key() -> Vec<u8> {
        signer(9).key.verifying_key().as_bytes().to_vec()
    }

    #[test]
    fn unknown_signer_is_rejected() {
        let ctx = ctx();
        let signer = signer(1);
        let accounts = MemAccountStore::new();

        let tx = sign_tx(&ctx, emergency_body(&signer.address), &[(&signer, 1, 0)]);
        assert_eq!(
            verify_tx_signatures(&ctx, &tx, &accounts, SequenceSource::Signature),
            Err(VrfError::UnknownSigner(signer.address.clone()))
        );
    }

    #[test]
    fn signature_count_must_match_signers() {
        let ctx = ctx();
        let signer = signer(1);
        let mut accounts = MemAccountStore::new();
        fund_account(&mut accounts, &signer, 0);

        let mut tx = sign_tx(&ctx, emergency_body(&signer.address), &[(&signer, 1, 0)]);
        tx.signatures.clear();

        assert!(matches!(
            verify_tx_signatures(&ctx, &tx, &accounts, SequenceSource::Account),
            Err(VrfError::InvalidTx(_))
        ));
    }

    #[test]
    fn validate_basic_rejects_malformed_authority() {
        let msg = Msg::EmergencyDisable(MsgEmergencyDisable {
            authority: "garbage".into(),
            reason: String::new(),
        });
        assert!(msg.validate_basic().is_err());

        // empty reason is fine with a well-formed authority
        let signer = signer(3);
        let msg = Msg::EmergencyDisable(MsgEmergencyDisable {
            authority: signer.address,
            reason: String::new(),
        });
        msg.validate_basic().unwrap();
    }
}
