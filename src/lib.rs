//! # Pordisto (Gaming Platform Access Gateway)
//!
//! `pordisto` is the request-gating core of a multi-tenant gaming platform.
//! Every inbound request passes through one middleware that resolves the
//! caller, applies rate limits and decides allow/redirect/deny from a
//! declarative policy table.
//!
//! ## Access Model
//!
//! Roles are `PLAYER`, `MODERATOR`, `DEVELOPER` and `ADMIN`. Path rules test
//! role-set membership, so moderators and developers are siblings: neither
//! reaches the other's surfaces. A separate numeric order exists for
//! "at least this role" checks used by UI-level permissions.
//!
//! Rule tables are scanned in fixed precedence (admin, developer, moderator,
//! then generic-authenticated), first pattern match wins. Public paths allow
//! anonymous access; static assets bypass the gate entirely; everything else
//! defaults to requiring a signed-in principal.
//!
//! ## Rate Limiting & Two-Factor
//!
//! Counters and two-factor records live behind injected stores. The rate
//! limiter **fails open** when its store degrades; availability wins over
//! strict enforcement there. Two-factor verification **fails closed**: a store
//! fault is a 500, never "invalid code". Lockout engages for 15 minutes
//! after 5 failed code attempts; backup codes are single-use.
//!
//! ## Collaborators
//!
//! Credential exchange, page rendering, payments and persistence are
//! external. The gate sees them only through the `PrincipalResolver`,
//! `CounterStore` and `TwoFactorStore` traits.

pub mod api;
pub mod cli;
pub mod clock;
pub mod gate;
pub mod policy;
pub mod principal;
pub mod ratelimit;
pub mod security;
pub mod twofactor;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
