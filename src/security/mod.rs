//! Request-security helpers shared by the gate and the handlers.

pub mod csrf;

pub use csrf::CsrfGuard;
