//! Admin console - approve, delete, license management
//!
//! Only constructible for a caller whose stored status is admin, so every
//! mutation below is authorized at the data boundary.

use crate::accounts::AccountTable;
use crate::error::{PortalError, Result};
use crate::portal::Portal;
use crate::storage::KeyValueStore;
use crate::types::{Account, AccountProfile, AccountStats, AccountStatus};

/// Admin operations bound to an authorized caller
pub struct AdminConsole<'a, S: KeyValueStore> {
    portal: &'a Portal<S>,
    caller: Account,
}

impl<'a, S: KeyValueStore> AdminConsole<'a, S> {
    /// Authorize `caller`; anything but an admin is `Forbidden`
    pub fn for_caller(portal: &'a Portal<S>, caller: Account) -> Result<Self> {
        if caller.status != AccountStatus::Admin {
            return Err(PortalError::Forbidden("admin access required".into()));
        }
        Ok(Self { portal, caller })
    }

    pub fn caller(&self) -> &Account {
        &self.caller
    }

    async fn table(&self) -> Result<AccountTable> {
        AccountTable::load(self.portal.store()).await
    }

    /// Accounts matching `search` (name, email or request code)
    pub async fn list_accounts(&self, search: &str) -> Result<Vec<AccountProfile>> {
        let table = self.table().await?;
        Ok(table.search(search).into_iter().map(Account::profile).collect())
    }

    /// Counts per status
    pub async fn stats(&self) -> Result<AccountStats> {
        Ok(self.table().await?.stats())
    }

    /// Approve a pending account; admins are never demoted
    pub async fn approve_account(&self, id: &str) -> Result<Account> {
        let mut table = self.table().await?;
        let account = table
            .get_by_id(id)
            .cloned()
            .ok_or_else(|| PortalError::NotFound(id.to_string()))?;

        match account.status {
            AccountStatus::Admin => Err(PortalError::Rejected(
                "admin accounts cannot be approved".into(),
            )),
            AccountStatus::Approved => Ok(account),
            AccountStatus::Pending => {
                let updated = table
                    .set_status(&account.email, AccountStatus::Approved)?
                    .clone();
                table.save(self.portal.store()).await?;
                Ok(updated)
            }
        }
    }

    /// Delete a non-admin account and revoke its sessions
    pub async fn delete_account(&self, id: &str) -> Result<Account> {
        let mut table = self.table().await?;
        match table.get_by_id(id) {
            None => return Err(PortalError::NotFound(id.to_string())),
            Some(account) if account.status == AccountStatus::Admin => {
                return Err(PortalError::Rejected("admin accounts cannot be deleted".into()));
            }
            Some(_) => {}
        }

        let removed = table
            .remove_by_id(id)
            .ok_or_else(|| PortalError::NotFound(id.to_string()))?;
        table.save(self.portal.store()).await?;
        self.portal.sessions().revoke_email(&removed.email).await?;
        Ok(removed)
    }

    /// Current license value
    pub async fn license(&self) -> Result<String> {
        self.portal.license().current().await
    }

    /// Overwrite the license, stored uppercase
    pub async fn set_license(&self, value: &str) -> Result<String> {
        self.portal.license().set(value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portal::StatusCheck;
    use crate::portal::tests::{BOOTSTRAP, portal};
    use crate::storage::ACCOUNTS_KEY;

    #[tokio::test]
    async fn test_non_admin_is_forbidden() {
        let portal = portal();
        let login = portal.register("A", "a@x.com", "pw").await.unwrap();
        assert!(matches!(
            portal.admin(&login.token).await,
            Err(PortalError::Forbidden(_))
        ));
        assert!(matches!(
            portal.admin("no-session").await,
            Err(PortalError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_demoted_admin_loses_console() {
        let portal = portal();
        let root = portal.register("Root", "root@x.com", BOOTSTRAP).await.unwrap();
        assert!(portal.admin(&root.token).await.is_ok());

        let mut table = AccountTable::load(portal.store()).await.unwrap();
        table.set_status("root@x.com", AccountStatus::Approved).unwrap();
        table.save(portal.store()).await.unwrap();

        assert!(matches!(
            portal.admin(&root.token).await,
            Err(PortalError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_approve_account() {
        let portal = portal();
        let user = portal.register("A", "a@x.com", "pw").await.unwrap();
        let root = portal.register("Root", "root@x.com", BOOTSTRAP).await.unwrap();
        let console = portal.admin(&root.token).await.unwrap();
        assert_eq!(console.caller().email, "root@x.com");

        let approved = console.approve_account(&user.account.id).await.unwrap();
        assert_eq!(approved.status, AccountStatus::Approved);

        // The user's own session sees the change on the next check
        match portal.check_status(&user.token).await.unwrap() {
            StatusCheck::SignedIn(account) => assert_eq!(account.status, AccountStatus::Approved),
            StatusCheck::LoggedOut => panic!("session should be live"),
        }

        // Idempotent
        assert!(console.approve_account(&user.account.id).await.is_ok());
        assert!(matches!(
            console.approve_account("missing").await,
            Err(PortalError::NotFound(_))
        ));
        assert!(matches!(
            console.approve_account(&root.account.id).await,
            Err(PortalError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_account_revokes_sessions() {
        let portal = portal();
        let user = portal.register("A", "a@x.com", "pw").await.unwrap();
        let root = portal.register("Root", "root@x.com", BOOTSTRAP).await.unwrap();
        let console = portal.admin(&root.token).await.unwrap();

        let removed = console.delete_account(&user.account.id).await.unwrap();
        assert_eq!(removed.email, "a@x.com");
        assert_eq!(portal.check_status(&user.token).await.unwrap(), StatusCheck::LoggedOut);
        assert_eq!(console.stats().await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_delete_admin_is_rejected() {
        let portal = portal();
        let root = portal.register("Root", "root@x.com", BOOTSTRAP).await.unwrap();
        let console = portal.admin(&root.token).await.unwrap();
        let before = portal.store().raw(ACCOUNTS_KEY);

        assert!(matches!(
            console.delete_account(&root.account.id).await,
            Err(PortalError::Rejected(_))
        ));
        assert_eq!(portal.store().raw(ACCOUNTS_KEY), before);
        assert!(matches!(
            console.delete_account("missing").await,
            Err(PortalError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_and_stats() {
        let portal = portal();
        portal.register("Ana", "ana@x.com", "pw").await.unwrap();
        portal.register("Bob", "bob@y.org", "pw").await.unwrap();
        let root = portal.register("Root", "root@x.com", BOOTSTRAP).await.unwrap();
        let console = portal.admin(&root.token).await.unwrap();

        assert_eq!(console.list_accounts("").await.unwrap().len(), 3);
        let found = console.list_accounts("Y.ORG").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Bob");

        let stats = console.stats().await.unwrap();
        assert_eq!((stats.total, stats.pending, stats.approved, stats.admin), (3, 2, 0, 1));
    }

    #[tokio::test]
    async fn test_set_license_feeds_activation() {
        let portal = portal();
        let user = portal.register("A", "a@x.com", "pw").await.unwrap();
        let root = portal.register("Root", "root@x.com", BOOTSTRAP).await.unwrap();
        let console = portal.admin(&root.token).await.unwrap();

        assert_eq!(console.license().await.unwrap(), "AXQ-GOLD-2025");
        assert_eq!(console.set_license("axq-pro-2026").await.unwrap(), "AXQ-PRO-2026");

        let stale = portal.activate_with_license(&user.token, "AXQ-GOLD-2025").await.unwrap();
        assert!(!stale.is_success());
        let fresh = portal.activate_with_license(&user.token, "axq-pro-2026").await.unwrap();
        assert!(fresh.is_success());
    }
}
