//! Utilities Module
//!
//! Common utilities used across the crate.

pub mod crypto;
pub mod logging;

pub use crypto::*;
pub use logging::init_logging;
