//! Utility modules
//!
//! This module contains common utilities used throughout the application,
//! including error handling, logging setup, retry and time helpers.

pub mod errors;
pub mod logging;
pub mod helpers;
pub mod retry;

pub use errors::{EncontroError, Rejection, Result, Outcome};
pub use retry::{RetryPolicy, with_retry};
