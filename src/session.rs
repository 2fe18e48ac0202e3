//! Session table
//!
//! Maps the digest of a bearer token to the email that owns it. The
//! account itself is always read from the account store.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use crate::accounts::normalize_email;
use crate::credentials::{new_session_token, token_digest};
use crate::error::{PortalError, Result};
use crate::storage::{KeyValueStore, SESSIONS_KEY, read_json, write_json};
use crate::types::SessionRecord;

/// Live sessions kept per email; the oldest is dropped past this
pub const MAX_SESSIONS_PER_EMAIL: usize = 5;

type SessionMap = BTreeMap<String, SessionRecord>;

/// Typed view over the stored session map
pub struct SessionStore<'a, S: KeyValueStore + ?Sized> {
    store: &'a S,
    ttl_hours: u64,
}

impl<'a, S: KeyValueStore + ?Sized> SessionStore<'a, S> {
    /// `ttl_hours` of 0 disables expiry
    pub fn new(store: &'a S, ttl_hours: u64) -> Self {
        Self { store, ttl_hours }
    }

    /// Stored map, `None` when the value is corrupt; store failures propagate
    async fn load(&self) -> Result<Option<SessionMap>> {
        match read_json(self.store, SESSIONS_KEY).await {
            Ok(sessions) => Ok(Some(sessions.unwrap_or_default())),
            Err(PortalError::Json(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn save(&self, sessions: &SessionMap) -> Result<()> {
        write_json(self.store, SESSIONS_KEY, sessions).await
    }

    fn expired(&self, record: &SessionRecord, now: DateTime<Utc>) -> bool {
        if self.ttl_hours == 0 {
            return false;
        }
        let Ok(hours) = i64::try_from(self.ttl_hours) else {
            return false;
        };
        Duration::try_hours(hours).is_some_and(|ttl| now - record.issued_at >= ttl)
    }

    /// Open a session for this email and return the raw token
    ///
    /// Expired sessions are pruned and the email keeps at most
    /// [`MAX_SESSIONS_PER_EMAIL`] by dropping its oldest. A corrupt table is
    /// replaced.
    pub async fn open(&self, email: &str) -> Result<String> {
        let token = new_session_token()?;
        let mut sessions = self.load().await?.unwrap_or_default();
        let email = normalize_email(email);
        let now = Utc::now();
        sessions.retain(|_, record| !self.expired(record, now));

        let mut owned: Vec<(DateTime<Utc>, String)> = sessions
            .iter()
            .filter(|(_, record)| record.email == email)
            .map(|(digest, record)| (record.issued_at, digest.clone()))
            .collect();
        if owned.len() >= MAX_SESSIONS_PER_EMAIL {
            owned.sort();
            let excess = owned.len() + 1 - MAX_SESSIONS_PER_EMAIL;
            for (_, digest) in owned.into_iter().take(excess) {
                sessions.remove(&digest);
            }
        }

        sessions.insert(
            token_digest(&token),
            SessionRecord {
                email,
                issued_at: now,
            },
        );
        self.save(&sessions).await?;
        Ok(token)
    }

    /// Email owning this token, `None` when unknown, expired or the table
    /// is corrupt
    pub async fn resolve(&self, token: &str) -> Result<Option<String>> {
        let Some(sessions) = self.load().await? else {
            return Ok(None);
        };
        Ok(sessions
            .get(&token_digest(token))
            .filter(|record| !self.expired(record, Utc::now()))
            .map(|record| record.email.clone()))
    }

    /// Drop one session; unknown tokens are fine
    pub async fn close(&self, token: &str) -> Result<()> {
        let Some(mut sessions) = self.load().await? else {
            // Corrupt table: nothing trustworthy to keep
            return self.store.delete(SESSIONS_KEY).await;
        };
        if sessions.remove(&token_digest(token)).is_some() {
            self.save(&sessions).await?;
        }
        Ok(())
    }

    /// Drop every session belonging to an email, returns how many
    pub async fn revoke_email(&self, email: &str) -> Result<usize> {
        let Some(mut sessions) = self.load().await? else {
            return Ok(0);
        };
        let email = normalize_email(email);
        let before = sessions.len();
        sessions.retain(|_, record| record.email != email);
        let removed = before - sessions.len();
        if removed > 0 {
            self.save(&sessions).await?;
        }
        Ok(removed)
    }
}
