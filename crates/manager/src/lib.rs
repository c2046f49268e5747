//! Argonaut controller manager.
//!
//! Runs one controller per registered kind and scope. Each controller drives
//! the kind's external reconciler through observe, create, update and delete,
//! and records the outcome in conditions.

#![forbid(unsafe_code)]

pub mod config;
pub mod controller;
pub mod error;
pub mod telemetry;

pub use config::{Cli, Commands, RunArgs};
pub use controller::{build_controllers, Context, Outcome, Settings};
pub use error::ManagerError;
