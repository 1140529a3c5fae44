//! Account and fee seams used by transaction admission.
//!
//! The surrounding application owns real account state; admission only needs
//! lookups, pub-key persistence, sequence bumps and fee deduction, so those
//! capabilities are traits with in-memory implementations for tests.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::VrfError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub address: String,
    /// ed25519 public key, set on first signed transaction.
    pub pub_key: Option<Vec<u8>>,
    pub account_number: u64,
    pub sequence: u64,
}

pub trait AccountStore {
    fn account(&self, address: &str) -> Option<Account>;
    fn set_account(&mut self, account: Account);
}

pub trait Bank {
    fn deduct_fee(&mut self, payer: &str, amount: u128) -> Result<(), VrfError>;
}

#[derive(Debug, Clone, Default)]
pub struct MemAccountStore {
    accounts: BTreeMap<String, Account>,
}

impl MemAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AccountStore for MemAccountStore {
    fn account(&self, address: &str) -> Option<Account> {
        self.accounts.get(address).cloned()
    }

    fn set_account(&mut self, account: Account) {
        self.accounts.insert(account.address.clone(), account);
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemBank {
    balances: BTreeMap<String, u128>,
}

impl MemBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_balance(&mut self, address: &str, amount: u128) {
        self.balances.insert(address.to_string(), amount);
    }

    pub fn balance(&self, address: &str) -> u128 {
        self.balances.get(address).copied().unwrap_or(0)
    }
}

impl Bank for MemBank {
    fn deduct_fee(&mut self, payer: &str, amount: u128) -> Result<(), VrfError> {
        let balance = self.balances.entry(payer.to_string()).or_insert(0);
        if *balance < amount {
            return Err(VrfError::InsufficientFee);
        }
        *balance -= amount;
        Ok(())
    }
}
