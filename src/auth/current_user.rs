//! The logged in user, as seen by request handlers.

use crate::{
    Error,
    role::{Permission, has_permission},
    transaction::TransactionScope,
    user::{User, UserID},
};

/// The user that sent the current request.
///
/// The auth middleware loads this from the database on every request and adds
/// it to the request extensions, so handlers can take `Extension<CurrentUser>`.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentUser {
    pub id: UserID,
    pub username: String,
    /// The name of the user's role, e.g. "Viewer".
    pub role: String,
}

impl CurrentUser {
    /// Whether the user's role grants `permission`.
    pub fn can(&self, permission: Permission) -> bool {
        has_permission(&self.role, permission)
    }

    /// Check that the user's role grants `permission`.
    ///
    /// # Errors
    ///
    /// Returns [Error::Forbidden] if it does not.
    pub fn require(&self, permission: Permission) -> Result<(), Error> {
        if self.can(permission) {
            return Ok(());
        }

        tracing::warn!(
            "User {} ({}) was denied the {} permission",
            self.username,
            self.role,
            permission.as_str()
        );

        Err(Error::Forbidden)
    }

    /// Whether the user may see or change something owned by `owner_id`.
    ///
    /// Users that manage users can access everything, everyone else only their own records.
    pub fn can_access(&self, owner_id: UserID) -> bool {
        self.id == owner_id || self.can(Permission::ManageUsers)
    }

    /// The transactions this user is allowed to see.
    pub fn transaction_scope(&self) -> TransactionScope {
        if self.can(Permission::ManageUsers) {
            TransactionScope::AllUsers
        } else {
            TransactionScope::OwnedBy(self.id)
        }
    }
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            role: user.role_name.clone(),
        }
    }
}

#[cfg(test)]
mod current_user_tests {
    use crate::{Error, role::Permission, transaction::TransactionScope, user::UserID};

    use super::CurrentUser;

    fn user(id: i64, role: &str) -> CurrentUser {
        CurrentUser {
            id: UserID::new(id),
            username: format!("user{id}"),
            role: role.to_owned(),
        }
    }

    #[test]
    fn viewer_cannot_change_transactions() {
        let viewer = user(1, "Viewer");

        for permission in [Permission::Create, Permission::Update, Permission::Delete] {
            assert_eq!(viewer.require(permission), Err(Error::Forbidden));
        }

        assert_eq!(viewer.require(Permission::Read), Ok(()));
    }

    #[test]
    fn unknown_role_is_denied_everything() {
        let user = user(1, "Intern");

        assert_eq!(user.require(Permission::Read), Err(Error::Forbidden));
    }

    #[test]
    fn only_admins_see_everything() {
        assert_eq!(user(1, "Admin").transaction_scope(), TransactionScope::AllUsers);
        assert_eq!(
            user(2, "Manager").transaction_scope(),
            TransactionScope::OwnedBy(UserID::new(2))
        );
        assert_eq!(
            user(3, "Viewer").transaction_scope(),
            TransactionScope::OwnedBy(UserID::new(3))
        );
    }

    #[test]
    fn managers_can_only_access_their_own_records() {
        let manager = user(2, "Manager");

        assert!(manager.can_access(UserID::new(2)));
        assert!(!manager.can_access(UserID::new(1)));
        assert!(user(1, "Admin").can_access(UserID::new(2)));
    }
}
