//! Account lifecycle - register, check status, activate, logout
//!
//! Owns the key-value store and coordinates the account table, the
//! session table and the license. Every answer about an account is read
//! from the account table, so a session can never report a stale status.

use chrono::Utc;

use crate::accounts::{AccountTable, normalize_email};
use crate::admin::AdminConsole;
use crate::config::Config;
use crate::credentials::{hash_password, new_request_code, secrets_match, verify_password};
use crate::error::{PortalError, Result};
use crate::license::LicenseStore;
use crate::session::SessionStore;
use crate::storage::KeyValueStore;
use crate::types::{Account, AccountStatus, SessionResponse};

/// Attempts at drawing a request code no other account holds
const REQUEST_CODE_ATTEMPTS: usize = 32;

/// Lifecycle settings taken from [`Config`]
#[derive(Debug, Clone)]
pub struct PortalSettings {
    pub default_license: String,
    pub request_code_prefix: String,
    pub admin_bootstrap_secret: Option<String>,
    pub session_ttl_hours: u64,
}

impl From<&Config> for PortalSettings {
    fn from(config: &Config) -> Self {
        Self {
            default_license: config.default_license.clone(),
            request_code_prefix: config.request_code_prefix.clone(),
            admin_bootstrap_secret: config.admin_bootstrap_secret.clone(),
            session_ttl_hours: config.session_ttl_hours,
        }
    }
}

/// Successful register/login
#[derive(Debug, Clone)]
pub struct Login {
    pub token: String,
    pub account: Account,
}

impl Login {
    pub fn response(&self) -> SessionResponse {
        SessionResponse {
            token: Some(self.token.clone()),
            account: self.account.profile(),
            view: self.account.status.view(),
        }
    }
}

/// Outcome of reconciling a session against the account table
#[derive(Debug, Clone, PartialEq)]
pub enum StatusCheck {
    SignedIn(Account),
    LoggedOut,
}

/// Outcome of redeeming a license
#[derive(Debug, Clone, PartialEq)]
pub enum Activation {
    /// Pending account is now approved
    Activated(Account),
    /// Account was already approved or admin; nothing changed
    AlreadyActive(Account),
    /// Code did not match; nothing changed
    InvalidCode,
}

impl Activation {
    pub fn is_success(&self) -> bool {
        !matches!(self, Activation::InvalidCode)
    }
}

/// Lifecycle controller over one key-value store
pub struct Portal<S: KeyValueStore> {
    store: S,
    settings: PortalSettings,
}

impl<S: KeyValueStore> Portal<S> {
    pub fn new(store: S, settings: PortalSettings) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &PortalSettings {
        &self.settings
    }

    pub(crate) fn sessions(&self) -> SessionStore<'_, S> {
        SessionStore::new(&self.store, self.settings.session_ttl_hours)
    }

    pub(crate) fn license(&self) -> LicenseStore<'_, S> {
        LicenseStore::new(&self.store, &self.settings.default_license)
    }

    fn is_bootstrap_secret(&self, password: &str) -> bool {
        self.settings
            .admin_bootstrap_secret
            .as_deref()
            .is_some_and(|secret| secrets_match(password, secret))
    }

    /// Register a new account, or log in when the email is already known
    ///
    /// The bootstrap secret, when configured, creates (or overwrites) an
    /// admin account for the email instead.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<Login> {
        let email = normalize_email(email);
        if email.is_empty() || !email.contains('@') {
            return Err(PortalError::Validation("a valid email is required".into()));
        }
        if password.is_empty() {
            return Err(PortalError::Validation("password is required".into()));
        }

        let mut table = AccountTable::load(&self.store).await?;
        let name = name.trim();

        if self.is_bootstrap_secret(password) {
            let previous = table.get(&email);
            let account = Account {
                id: previous.map_or_else(|| uuid::Uuid::new_v4().to_string(), |a| a.id.clone()),
                name: if name.is_empty() { "AXQ Creator".to_string() } else { name.to_string() },
                email: email.clone(),
                status: AccountStatus::Admin,
                joined_at: previous.map_or_else(|| Utc::now().to_rfc3339(), |a| a.joined_at.clone()),
                request_code: Some("MASTER".to_string()),
                password_hash: hash_password(password)?,
            };
            table.upsert(account.clone());
            table.save(&self.store).await?;
            let token = self.sessions().open(&email).await?;
            return Ok(Login { token, account });
        }

        if let Some(existing) = table.get(&email) {
            if !verify_password(password, &existing.password_hash) {
                return Err(PortalError::InvalidCredentials);
            }
            let account = existing.clone();
            let token = self.sessions().open(&email).await?;
            return Ok(Login { token, account });
        }

        if name.is_empty() {
            return Err(PortalError::Validation("name is required".into()));
        }

        let account = Account {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: email.clone(),
            status: AccountStatus::Pending,
            joined_at: Utc::now().to_rfc3339(),
            request_code: Some(self.unused_request_code(&table)?),
            password_hash: hash_password(password)?,
        };
        table.upsert(account.clone());
        table.save(&self.store).await?;

        let token = self.sessions().open(&email).await?;
        Ok(Login { token, account })
    }

    fn unused_request_code(&self, table: &AccountTable) -> Result<String> {
        for _ in 0..REQUEST_CODE_ATTEMPTS {
            let code = new_request_code(&self.settings.request_code_prefix)?;
            if !table.request_code_taken(&code) {
                return Ok(code);
            }
        }
        // Code space nearly exhausted; duplicates are tolerable for a support reference
        new_request_code(&self.settings.request_code_prefix)
    }

    /// Re-read the session's account from the account table
    ///
    /// Missing, expired or corrupt sessions, and sessions whose account
    /// was deleted, are cleared and reported as logged out. Store failures
    /// propagate and leave every session in place.
    pub async fn check_status(&self, token: &str) -> Result<StatusCheck> {
        let sessions = self.sessions();
        let Some(email) = sessions.resolve(token).await? else {
            sessions.close(token).await?;
            return Ok(StatusCheck::LoggedOut);
        };

        let table = match AccountTable::load(&self.store).await {
            Ok(table) => table,
            Err(PortalError::Json(_)) => return Ok(StatusCheck::LoggedOut),
            Err(e) => return Err(e),
        };

        match table.get(&email) {
            Some(account) => Ok(StatusCheck::SignedIn(account.clone())),
            None => {
                sessions.close(token).await?;
                Ok(StatusCheck::LoggedOut)
            }
        }
    }

    /// Account behind a token, or `Unauthenticated`
    pub async fn current_account(&self, token: &str) -> Result<Account> {
        match self.check_status(token).await? {
            StatusCheck::SignedIn(account) => Ok(account),
            StatusCheck::LoggedOut => Err(PortalError::Unauthenticated),
        }
    }

    /// Account behind a token that may use the market endpoints
    pub async fn require_active(&self, token: &str) -> Result<Account> {
        let account = self.current_account(token).await?;
        if !account.status.is_active() {
            return Err(PortalError::Forbidden("account is pending approval".into()));
        }
        Ok(account)
    }

    /// Redeem the shared license for the caller's account
    pub async fn activate_with_license(&self, token: &str, code: &str) -> Result<Activation> {
        let account = self.current_account(token).await?;

        if !self.license().matches(code).await? {
            return Ok(Activation::InvalidCode);
        }
        if account.status != AccountStatus::Pending {
            return Ok(Activation::AlreadyActive(account));
        }

        let mut table = AccountTable::load(&self.store).await?;
        let updated = table
            .set_status(&account.email, AccountStatus::Approved)?
            .clone();
        table.save(&self.store).await?;
        Ok(Activation::Activated(updated))
    }

    /// End the session; accounts are untouched
    pub async fn logout(&self, token: &str) -> Result<()> {
        self.sessions().close(token).await
    }

    /// Admin console for the caller, `Forbidden` unless they are admin
    pub async fn admin(&self, token: &str) -> Result<AdminConsole<'_, S>> {
        let caller = self.current_account(token).await?;
        AdminConsole::for_caller(self, caller)
    }
}
