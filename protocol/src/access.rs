//! # Roles and Capability Grants
//!
//! Every privileged operation in the engine names the [`Role`] it needs and
//! asks an [`AccessControl`] table whether the caller holds it. Grants are
//! explicit records made at setup or by an admin, never an identity
//! comparison buried in contract logic. The desk's treasury capability for
//! the vault is just a `Withdrawer` grant in the desk's table.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::ledger::AccountId;

/// Errors raised by access checks and role administration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccessError {
    /// The caller lacks the role the operation requires.
    #[error("unauthorized: {account} lacks the {role} role")]
    Unauthorized {
        /// The caller.
        account: AccountId,
        /// The role that was required.
        role: Role,
    },

    /// An admin tried to revoke its own admin role.
    #[error("{0} cannot revoke its own admin role")]
    SelfLockout(AccountId),
}

/// Capabilities recognised by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Owner of a component: grants and revokes roles, emergency drain.
    Admin,
    /// May change the price table.
    PriceSetter,
    /// May withdraw surplus (vault) or pull the treasury (desk).
    Withdrawer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::PriceSetter => write!(f, "price-setter"),
            Role::Withdrawer => write!(f, "withdrawer"),
        }
    }
}

/// Role membership for one component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControl {
    grants: BTreeMap<Role, BTreeSet<AccountId>>,
}

impl AccessControl {
    /// Creates a table whose only grant is `Admin` to `admin`.
    pub fn new(admin: AccountId) -> Self {
        let mut table = Self::default();
        table.insert(Role::Admin, admin);
        table
    }

    /// Returns `true` if `account` holds `role`.
    pub fn has_role(&self, role: Role, account: &AccountId) -> bool {
        self.grants
            .get(&role)
            .map(|members| members.contains(account))
            .unwrap_or(false)
    }

    /// Fails with [`AccessError::Unauthorized`] unless `account` holds `role`.
    pub fn require(&self, role: Role, account: &AccountId) -> Result<(), AccessError> {
        if self.has_role(role, account) {
            Ok(())
        } else {
            Err(AccessError::Unauthorized {
                account: account.clone(),
                role,
            })
        }
    }

    /// Grants `role` to `account`. Admin only.
    ///
    /// Returns `false` if the account already held the role.
    pub fn grant(
        &mut self,
        caller: &AccountId,
        role: Role,
        account: AccountId,
    ) -> Result<bool, AccessError> {
        self.require(Role::Admin, caller)?;
        info!(%caller, %role, %account, "role granted");
        Ok(self.insert(role, account))
    }

    /// Revokes `role` from `account`. Admin only.
    ///
    /// Returns `false` if the account did not hold the role.
    pub fn revoke(
        &mut self,
        caller: &AccountId,
        role: Role,
        account: &AccountId,
    ) -> Result<bool, AccessError> {
        self.require(Role::Admin, caller)?;
        if role == Role::Admin && caller == account {
            return Err(AccessError::SelfLockout(caller.clone()));
        }
        let removed = self
            .grants
            .get_mut(&role)
            .map(|members| members.remove(account))
            .unwrap_or(false);
        if removed {
            info!(%caller, %role, %account, "role revoked");
        }
        Ok(removed)
    }

    /// Accounts currently holding `role`, in label order.
    pub fn members(&self, role: Role) -> Vec<AccountId> {
        self.grants
            .get(&role)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn insert(&mut self, role: Role, account: AccountId) -> bool {
        self.grants.entry(role).or_default().insert(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acct(label: &str) -> AccountId {
        AccountId::from(label)
    }

    #[test]
    fn new_table_has_only_admin() {
        let table = AccessControl::new(acct("owner"));
        assert!(table.has_role(Role::Admin, &acct("owner")));
        assert!(!table.has_role(Role::Withdrawer, &acct("owner")));
        assert_eq!(table.members(Role::Admin), vec![acct("owner")]);
    }

    #[test]
    fn admin_can_grant_and_revoke() {
        let mut table = AccessControl::new(acct("owner"));
        assert!(table.grant(&acct("owner"), Role::Withdrawer, acct("ops")).unwrap());
        assert!(!table.grant(&acct("owner"), Role::Withdrawer, acct("ops")).unwrap());
        assert!(table.has_role(Role::Withdrawer, &acct("ops")));

        assert!(table.revoke(&acct("owner"), Role::Withdrawer, &acct("ops")).unwrap());
        assert!(!table.has_role(Role::Withdrawer, &acct("ops")));
        assert!(!table.revoke(&acct("owner"), Role::Withdrawer, &acct("ops")).unwrap());
    }

    #[test]
    fn non_admin_cannot_grant() {
        let mut table = AccessControl::new(acct("owner"));
        let err = table
            .grant(&acct("mallory"), Role::PriceSetter, acct("mallory"))
            .unwrap_err();
        assert_eq!(
            err,
            AccessError::Unauthorized {
                account: acct("mallory"),
                role: Role::Admin,
            }
        );
    }

    #[test]
    fn withdrawer_is_not_admin() {
        let mut table = AccessControl::new(acct("owner"));
        table.grant(&acct("owner"), Role::Withdrawer, acct("ops")).unwrap();
        assert!(table.require(Role::Admin, &acct("ops")).is_err());
    }

    #[test]
    fn admin_cannot_lock_itself_out() {
        let mut table = AccessControl::new(acct("owner"));
        let err = table
            .revoke(&acct("owner"), Role::Admin, &acct("owner"))
            .unwrap_err();
        assert_eq!(err, AccessError::SelfLockout(acct("owner")));
        assert!(table.has_role(Role::Admin, &acct("owner")));
    }

    #[test]
    fn role_display_names() {
        assert_eq!(Role::PriceSetter.to_string(), "price-setter");
        assert_eq!(Role::Withdrawer.to_string(), "withdrawer");
    }

    #[test]
    fn table_serialization_roundtrip() {
        let mut table = AccessControl::new(acct("owner"));
        table.grant(&acct("owner"), Role::PriceSetter, acct("pricer")).unwrap();
        let json = serde_json::to_string(&table).unwrap();
        let back: AccessControl = serde_json::from_str(&json).unwrap();
        assert_eq!(back, table);
    }
}
