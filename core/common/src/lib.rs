//! Common utilities and types shared across the Trouprive vault crates.
//!
//! This module provides the error taxonomy every layer reports through and
//! the in-memory wrapper used for the master password.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::Password;
