//! Session-related types.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};

use marketplace_core::model::User;
use marketplace_core::{Role, UserId, UserType};

/// Session-stored user identity.
///
/// Minimal data stored in the session to identify the logged-in user and
/// decide what they may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    pub role: Role,
    pub user_type: UserType,
}

impl CurrentUser {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    #[must_use]
    pub fn is_customer(&self) -> bool {
        self.user_type == UserType::Customer
    }

    #[must_use]
    pub fn is_store_owner(&self) -> bool {
        self.user_type == UserType::StoreOwner
    }

    /// Whether this user may act on records owned by `owner`.
    #[must_use]
    pub fn can_act_for(&self, owner: UserId) -> bool {
        self.id == owner || self.is_admin()
    }
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.profile.id,
            role: user.profile.role,
            user_type: user.user_type(),
        }
    }
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, role: Role, user_type: UserType) -> CurrentUser {
        CurrentUser {
            id: UserId::new(id),
            role,
            user_type,
        }
    }

    #[test]
    fn test_can_act_for() {
        let owner = user(1, Role::Customer, UserType::StoreOwner);
        assert!(owner.can_act_for(UserId::new(1)));
        assert!(!owner.can_act_for(UserId::new(2)));

        let admin = user(9, Role::Admin, UserType::Customer);
        assert!(admin.can_act_for(UserId::new(2)));
    }

    #[test]
    fn test_session_shape() {
        let json = serde_json::to_value(user(3, Role::Customer, UserType::Customer))
            .unwrap_or_default();
        assert_eq!(json["id"], 3);
        assert_eq!(json["user_type"], "customer");
    }
}
