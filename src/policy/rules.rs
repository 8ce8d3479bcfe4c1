//! Declarative access rules for the platform's path space.
//!
//! Flow Overview:
//! 1) Static-asset namespaces and image/document extensions bypass every check.
//! 2) Public paths short-circuit to allow, exact or on a `/` boundary.
//! 3) Otherwise the API or page rule tables are scanned in precedence order
//!    (admin before developer before moderator before generic-authenticated),
//!    first pattern match wins.
//!
//! The page table additionally carries a legacy list of protected prefixes
//! consulted only when no structured rule matched.

use super::pattern::PathPattern;
use super::roles::{
    ADMIN_ONLY, ANY_AUTHENTICATED, DEVELOPER_OR_ADMIN, MODERATOR_OR_ADMIN, RoleSet,
};

const API_PREFIX: &str = "/api";

/// A named group of required roles and the path patterns they protect.
#[derive(Clone, Debug)]
pub struct RuleSet {
    name: &'static str,
    required: RoleSet,
    patterns: Vec<PathPattern>,
    /// Whether 403 bodies should name the missing role. Off for the
    /// generic-authenticated group where the field carries no information.
    advertise_role: bool,
}

impl RuleSet {
    fn new(name: &'static str, required: RoleSet, patterns: &[&'static str]) -> Self {
        Self {
            name,
            required,
            patterns: patterns.iter().copied().map(PathPattern::compile).collect(),
            advertise_role: true,
        }
    }

    fn generic(name: &'static str, patterns: &[&'static str]) -> Self {
        Self {
            advertise_role: false,
            ..Self::new(name, ANY_AUTHENTICATED, patterns)
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn required_roles(&self) -> &RoleSet {
        &self.required
    }

    #[must_use]
    pub fn advertise_role(&self) -> bool {
        self.advertise_role
    }

    fn matches(&self, path: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.matches(path))
    }
}

/// The full policy table: bypass lists, public paths and both rule tables.
#[derive(Clone, Debug)]
pub struct PolicyTable {
    bypass_namespaces: Vec<&'static str>,
    bypass_extensions: Vec<&'static str>,
    public_paths: Vec<&'static str>,
    api_rules: Vec<RuleSet>,
    page_rules: Vec<RuleSet>,
    legacy_protected: RuleSet,
}

impl PolicyTable {
    /// Rule tables for the gaming platform's path space.
    #[must_use]
    pub fn platform_defaults() -> Self {
        Self {
            bypass_namespaces: vec!["/_assets", "/static"],
            bypass_extensions: vec![
                "png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "pdf",
            ],
            public_paths: vec![
                "/",
                "/browse",
                "/search",
                "/signin",
                "/signup",
                "/about",
                "/support",
                "/unauthorized",
                "/api/auth",
                "/api/games/browse",
            ],
            api_rules: vec![
                RuleSet::new("api-admin", ADMIN_ONLY, &["/api/admin"]),
                RuleSet::new(
                    "api-developer",
                    DEVELOPER_OR_ADMIN,
                    &["/api/developer", "/api/games/[id]/manage"],
                ),
                RuleSet::generic(
                    "api-authenticated",
                    &[
                        "/api/account",
                        "/api/payments",
                        "/api/library",
                        "/api/notifications",
                        "/api/csrf",
                    ],
                ),
            ],
            page_rules: vec![
                RuleSet::new("page-admin", ADMIN_ONLY, &["/admin"]),
                RuleSet::new("page-developer", DEVELOPER_OR_ADMIN, &["/dashboard", "/dev"]),
                RuleSet::new("page-moderator", MODERATOR_OR_ADMIN, &["/moderate"]),
                RuleSet::generic(
                    "page-authenticated",
                    &[
                        "/account",
                        "/settings",
                        "/library",
                        "/checkout",
                        "/game/[id]/play",
                    ],
                ),
            ],
            legacy_protected: RuleSet::generic("page-legacy", &["/profile", "/purchases"]),
        }
    }

    /// Static assets and image/document files are never classified.
    #[must_use]
    pub fn is_bypassed(&self, path: &str) -> bool {
        let path = path.split('?').next().unwrap_or(path);
        if self
            .bypass_namespaces
            .iter()
            .any(|ns| path == *ns || path.starts_with(&format!("{ns}/")))
        {
            return true;
        }
        path.rsplit_once('.').is_some_and(|(_, ext)| {
            self.bypass_extensions
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
    }

    /// Public paths allow anonymous access, exact or on a `/` boundary.
    #[must_use]
    pub fn is_public(&self, path: &str) -> bool {
        let path = path.split('?').next().unwrap_or(path);
        self.public_paths
            .iter()
            .any(|public| path == *public || path.starts_with(&format!("{public}/")))
    }

    #[must_use]
    pub fn is_api(&self, path: &str) -> bool {
        path == API_PREFIX || path.starts_with("/api/")
    }

    /// First-match-wins classification against the namespace's rule table.
    ///
    /// Returns `None` when no structured rule (nor, for pages, the legacy
    /// protected list) covers the path; the evaluator then applies the
    /// default policy.
    #[must_use]
    pub fn classify(&self, path: &str) -> Option<&RuleSet> {
        if self.is_api(path) {
            return self.api_rules.iter().find(|rule| rule.matches(path));
        }
        if let Some(rule) = self.page_rules.iter().find(|rule| rule.matches(path)) {
            return Some(rule);
        }
        // Legacy fallback list, consulted only after the structured table.
        self.legacy_protected
            .matches(path)
            .then_some(&self.legacy_protected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::roles::Role;

    #[test]
    fn bypass_covers_namespaces_and_extensions() {
        let table = PolicyTable::platform_defaults();
        assert!(table.is_bypassed("/_assets/app.js"));
        assert!(table.is_bypassed("/static/fonts/inter.woff.pdf"));
        assert!(table.is_bypassed("/covers/halo.PNG"));
        assert!(table.is_bypassed("/favicon.ico"));
        assert!(!table.is_bypassed("/staticfiles/app"));
        assert!(!table.is_bypassed("/admin"));
    }

    #[test]
    fn public_paths_match_exact_or_boundary() {
        let table = PolicyTable::platform_defaults();
        assert!(table.is_public("/signin"));
        assert!(table.is_public("/browse/featured"));
        assert!(table.is_public("/api/auth/callback"));
        assert!(!table.is_public("/signing"));
        assert!(!table.is_public("/account"));
    }

    #[test]
    fn root_is_public_only_exactly() {
        let table = PolicyTable::platform_defaults();
        assert!(table.is_public("/"));
        assert!(!table.is_public("/admin"));
    }

    #[test]
    fn admin_rules_win_over_generic() {
        let table = PolicyTable::platform_defaults();
        let rule = table.classify("/api/admin/stats").expect("rule");
        assert_eq!(rule.name(), "api-admin");
        assert!(rule.required_roles().contains(Role::Admin));
        assert!(!rule.required_roles().contains(Role::Developer));
    }

    #[test]
    fn developer_manage_pattern_uses_dynamic_segment() {
        let table = PolicyTable::platform_defaults();
        let rule = table.classify("/api/games/g-42/manage").expect("rule");
        assert_eq!(rule.name(), "api-developer");
        assert!(table.classify("/api/games//manage").is_none());
    }

    #[test]
    fn page_table_keeps_moderator_and_developer_separate() {
        let table = PolicyTable::platform_defaults();
        let moderate = table.classify("/moderate/reports").expect("rule");
        assert!(moderate.required_roles().contains(Role::Moderator));
        assert!(!moderate.required_roles().contains(Role::Developer));

        let dashboard = table.classify("/dashboard").expect("rule");
        assert!(dashboard.required_roles().contains(Role::Developer));
        assert!(!dashboard.required_roles().contains(Role::Moderator));
    }

    #[test]
    fn legacy_prefixes_only_after_structured_rules() {
        let table = PolicyTable::platform_defaults();
        let rule = table.classify("/profile/badges").expect("rule");
        assert_eq!(rule.name(), "page-legacy");
        assert!(table.classify("/press").is_none());
    }
}
