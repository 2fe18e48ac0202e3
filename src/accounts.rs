//! Account store
//!
//! Accounts are persisted as one JSON object keyed by normalized email,
//! so there can never be two records for the same address.

use std::collections::BTreeMap;

use crate::error::{PortalError, Result};
use crate::storage::{ACCOUNTS_KEY, KeyValueStore, read_json, write_json};
use crate::types::{Account, AccountStats, AccountStatus};

/// Normalized map key for an email address
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// In-memory snapshot of the account map
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountTable {
    accounts: BTreeMap<String, Account>,
}

impl AccountTable {
    /// Load the table, empty when nothing is stored yet
    pub async fn load<S: KeyValueStore + ?Sized>(store: &S) -> Result<Self> {
        let accounts = read_json(store, ACCOUNTS_KEY).await?.unwrap_or_default();
        Ok(Self { accounts })
    }

    /// Persist the whole table
    pub async fn save<S: KeyValueStore + ?Sized>(&self, store: &S) -> Result<()> {
        write_json(store, ACCOUNTS_KEY, &self.accounts).await
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Get account by email
    pub fn get(&self, email: &str) -> Option<&Account> {
        self.accounts.get(&normalize_email(email))
    }

    /// Get account by id
    pub fn get_by_id(&self, id: &str) -> Option<&Account> {
        self.accounts.values().find(|a| a.id == id)
    }

    /// Insert or replace the record for this account's email
    pub fn upsert(&mut self, account: Account) {
        self.accounts.insert(normalize_email(&account.email), account);
    }

    /// Set the status of the account with this email
    pub fn set_status(&mut self, email: &str, status: AccountStatus) -> Result<&Account> {
        let account = self
            .accounts
            .get_mut(&normalize_email(email))
            .ok_or_else(|| PortalError::NotFound(email.to_string()))?;
        account.status = status;
        Ok(account)
    }

    /// Remove an account by id
    pub fn remove_by_id(&mut self, id: &str) -> Option<Account> {
        let key = self
            .accounts
            .iter()
            .find(|(_, a)| a.id == id)
            .map(|(k, _)| k.clone())?;
        self.accounts.remove(&key)
    }

    /// Whether a request code is already handed out
    pub fn request_code_taken(&self, code: &str) -> bool {
        self.accounts
            .values()
            .any(|a| a.request_code.as_deref() == Some(code))
    }

    /// Accounts matching a search term, oldest first
    pub fn search(&self, term: &str) -> Vec<&Account> {
        let mut found: Vec<&Account> = self
            .accounts
            .values()
            .filter(|a| a.matches_search(term))
            .collect();
        found.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then_with(|| a.email.cmp(&b.email)));
        found
    }

    /// Counts per status
    pub fn stats(&self) -> AccountStats {
        self.accounts
            .values()
            .fold(AccountStats::default(), |mut stats, account| {
                stats.total += 1;
                match account.status {
                    AccountStatus::Pending => stats.pending += 1,
                    AccountStatus::Approved => stats.approved += 1,
                    AccountStatus::Admin => stats.admin += 1,
                }
                stats
            })
    }
}
