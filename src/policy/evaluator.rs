//! Pure access decision over the policy table.

use super::roles::{Role, is_role_allowed};
use super::rules::PolicyTable;
use crate::principal::Principal;
use axum::http::Method;
use tracing::debug;

/// Outcome of an access evaluation. Denials distinguish missing credentials
/// from insufficient ones so the boundary can pick 401-vs-403 or
/// signin-vs-unauthorized.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Decision {
    Allow,
    DenyUnauthenticated,
    DenyForbidden {
        /// Role named in the response body, when the matched rule set
        /// advertises one.
        required_role: Option<Role>,
    },
}

/// Evaluate a request against the table. Stateless: the decision is a pure
/// function of `(path, method, principal)`.
#[must_use]
pub fn evaluate(
    table: &PolicyTable,
    path: &str,
    method: &Method,
    principal: Option<&Principal>,
) -> Decision {
    if table.is_bypassed(path) {
        return Decision::Allow;
    }
    if table.is_public(path) {
        return Decision::Allow;
    }

    if let Some(rule) = table.classify(path) {
        let Some(principal) = principal else {
            debug!(%method, path, rule = rule.name(), "anonymous request to protected path");
            return Decision::DenyUnauthenticated;
        };
        if is_role_allowed(principal.role, rule.required_roles()) {
            return Decision::Allow;
        }
        debug!(
            %method,
            path,
            rule = rule.name(),
            role = principal.role.as_str(),
            "role not in rule set"
        );
        return Decision::DenyForbidden {
            required_role: rule
                .advertise_role()
                .then(|| rule.required_roles().representative())
                .flatten(),
        };
    }

    // Default policy: anything not declared public requires a principal.
    if principal.is_some() {
        Decision::Allow
    } else {
        Decision::DenyUnauthenticated
    }
}
