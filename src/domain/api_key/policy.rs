//! Role policy table
//!
//! A single static table maps each role to its capability set and default
//! rate tier. Adding a role means adding one row here; nothing else in the
//! crate switches on roles.

use serde::{Deserialize, Serialize};

use super::entity::Role;
use crate::domain::rate_limit::RoleLimits;

/// Operations a role can be granted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Fetch cached package documentation
    ReadDocs,
    /// Search across the documentation index
    SearchDocs,
    /// Trigger a re-scrape of a package's documentation
    Rescrape,
    /// View own usage statistics
    ViewUsage,
    /// Issue, inspect, and revoke API keys
    ManageKeys,
}

/// One row of the policy table
#[derive(Debug, Clone, Copy)]
pub struct RolePolicy {
    pub role: Role,
    pub capabilities: &'static [Capability],
    pub default_limits: RoleLimits,
}

const ANONYMOUS_CAPS: &[Capability] = &[Capability::ReadDocs, Capability::SearchDocs];
const BASIC_CAPS: &[Capability] = &[
    Capability::ReadDocs,
    Capability::SearchDocs,
    Capability::ViewUsage,
];
const PREMIUM_CAPS: &[Capability] = &[
    Capability::ReadDocs,
    Capability::SearchDocs,
    Capability::ViewUsage,
];
const DEVELOPER_CAPS: &[Capability] = &[
    Capability::ReadDocs,
    Capability::SearchDocs,
    Capability::ViewUsage,
    Capability::Rescrape,
];
const ADMIN_CAPS: &[Capability] = &[
    Capability::ReadDocs,
    Capability::SearchDocs,
    Capability::ViewUsage,
    Capability::Rescrape,
    Capability::ManageKeys,
];

const fn limits(per_second: u32, per_minute: u32, per_hour: u32) -> RoleLimits {
    RoleLimits {
        per_second: Some(per_second),
        per_minute: Some(per_minute),
        per_hour: Some(per_hour),
    }
}

/// The policy table. Order matches the `Role` privilege ordering.
pub const ROLE_POLICIES: [RolePolicy; 5] = [
    RolePolicy {
        role: Role::Anonymous,
        capabilities: ANONYMOUS_CAPS,
        default_limits: limits(5, 30, 100),
    },
    RolePolicy {
        role: Role::Basic,
        capabilities: BASIC_CAPS,
        default_limits: limits(10, 100, 1000),
    },
    RolePolicy {
        role: Role::Premium,
        capabilities: PREMIUM_CAPS,
        default_limits: limits(20, 300, 5000),
    },
    RolePolicy {
        role: Role::Developer,
        capabilities: DEVELOPER_CAPS,
        default_limits: limits(50, 600, 10000),
    },
    RolePolicy {
        role: Role::Admin,
        capabilities: ADMIN_CAPS,
        default_limits: RoleLimits {
            per_second: None,
            per_minute: None,
            per_hour: None,
        },
    },
];

/// Look up the policy row for a role
pub fn policy_for(role: Role) -> &'static RolePolicy {
    // The table covers every Role variant
    ROLE_POLICIES
        .iter()
        .find(|p| p.role == role)
        .expect("policy table covers all roles")
}

/// Pure capability check: does `role` carry `capability`?
pub fn has_capability(role: Role, capability: Capability) -> bool {
    policy_for(role).capabilities.contains(&capability)
}

/// Default rate tier for a role
pub fn default_limits(role: Role) -> RoleLimits {
    policy_for(role).default_limits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_covers_all_roles() {
        for role in [
            Role::Anonymous,
            Role::Basic,
            Role::Premium,
            Role::Developer,
            Role::Admin,
        ] {
            assert_eq!(policy_for(role).role, role);
        }
    }

    #[test]
    fn test_anonymous_capabilities() {
        assert!(has_capability(Role::Anonymous, Capability::ReadDocs));
        assert!(!has_capability(Role::Anonymous, Capability::Rescrape));
        assert!(!has_capability(Role::Anonymous, Capability::ManageKeys));
    }

    #[test]
    fn test_developer_can_rescrape() {
        assert!(has_capability(Role::Developer, Capability::Rescrape));
        assert!(!has_capability(Role::Developer, Capability::ManageKeys));
    }

    #[test]
    fn test_only_admin_manages_keys() {
        for role in [Role::Anonymous, Role::Basic, Role::Premium, Role::Developer] {
            assert!(!has_capability(role, Capability::ManageKeys));
        }
        assert!(has_capability(Role::Admin, Capability::ManageKeys));
    }

    #[test]
    fn test_admin_is_unlimited() {
        assert!(default_limits(Role::Admin).is_unlimited());
    }

    #[test]
    fn test_tiers_widen_with_privilege() {
        let basic = default_limits(Role::Basic);
        let premium = default_limits(Role::Premium);
        assert!(premium.per_hour.unwrap() > basic.per_hour.unwrap());
    }
}
