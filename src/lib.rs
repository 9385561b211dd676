//! Encontro
//!
//! Event lifecycle and participation rule engine for social gatherings.
//! This library provides the status state machine, participation and waiting
//! list rules, cancellation policy, entry gate and trust ledger, on top of a
//! pluggable event store.

#![allow(non_snake_case)]

pub mod config;
pub mod services;
pub mod models;
pub mod database;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use utils::errors::{EncontroError, Outcome, Rejection, Result};

// Re-export main components for easy access
pub use database::{DatabaseService, EventStore, InMemoryStore};
pub use services::ServiceFactory;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!("{} v{}", NAME, VERSION)
}
