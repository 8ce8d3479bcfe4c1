//! Path-rule access control: roles, patterns, rule tables and the evaluator.

mod evaluator;
mod pattern;
mod roles;
mod rules;

pub use evaluator::{Decision, evaluate};
pub use pattern::PathPattern;
pub use roles::{
    ADMIN_ONLY, ANY_AUTHENTICATED, DEVELOPER_OR_ADMIN, MODERATOR_OR_ADMIN, Role, RoleSet,
    is_role_allowed, role_at_least,
};
pub use rules::{PolicyTable, RuleSet};
