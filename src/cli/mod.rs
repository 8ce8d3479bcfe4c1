//! Command-line interface: argument parsing, telemetry bootstrap and
//! dispatch into the server action.

pub mod actions;
pub mod commands;
pub mod dispatch;
pub mod start;
pub mod telemetry;

pub use start::start;
