//! Platform roles and the two role-check mechanisms.
//!
//! Access rules test membership in a role set (`is_role_allowed`): under that
//! model `Moderator` and `Developer` are siblings, neither implies the other.
//! UI-level permission checks use the numeric order (`role_at_least`), which
//! ranks `Developer` above `Moderator`. The two operations are intentionally
//! separate; merging them would change which role unlocks what.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Player,
    Moderator,
    Developer,
    Admin,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Player => "PLAYER",
            Self::Moderator => "MODERATOR",
            Self::Developer => "DEVELOPER",
            Self::Admin => "ADMIN",
        }
    }

    #[must_use]
    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PLAYER" => Some(Self::Player),
            "MODERATOR" => Some(Self::Moderator),
            "DEVELOPER" => Some(Self::Developer),
            "ADMIN" => Some(Self::Admin),
            _ => None,
        }
    }

    /// Numeric rank used only by [`role_at_least`].
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Player => 1,
            Self::Moderator => 2,
            Self::Developer => 3,
            Self::Admin => 4,
        }
    }
}

/// A fixed set of roles attached to an access rule.
///
/// Small enough that a slice beats a `HashSet`; rule tables are `const`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RoleSet(&'static [Role]);

impl RoleSet {
    #[must_use]
    pub const fn new(roles: &'static [Role]) -> Self {
        Self(roles)
    }

    #[must_use]
    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    /// Lowest-ranked member, used as the representative role in 403 bodies.
    #[must_use]
    pub fn representative(&self) -> Option<Role> {
        self.0.iter().copied().min_by_key(|role| role.rank())
    }

    #[must_use]
    pub fn roles(&self) -> &'static [Role] {
        self.0
    }
}

/// Membership check used by the path-rule tables.
#[must_use]
pub fn is_role_allowed(role: Role, allowed: &RoleSet) -> bool {
    allowed.contains(role)
}

/// Numeric "at least" check used by UI-level permission call sites.
///
/// Note the divergence from the rule-set model: `Developer` passes a
/// `Moderator` threshold here even though developer accounts do not get
/// moderation routes.
#[must_use]
pub fn role_at_least(role: Role, threshold: Role) -> bool {
    role.rank() >= threshold.rank()
}

pub const ANY_AUTHENTICATED: RoleSet = RoleSet::new(&[
    Role::Player,
    Role::Moderator,
    Role::Developer,
    Role::Admin,
]);

pub const ADMIN_ONLY: RoleSet = RoleSet::new(&[Role::Admin]);
pub const DEVELOPER_OR_ADMIN: RoleSet = RoleSet::new(&[Role::Developer, Role::Admin]);
pub const MODERATOR_OR_ADMIN: RoleSet = RoleSet::new(&[Role::Moderator, Role::Admin]);
