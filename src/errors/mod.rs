//! # Error Handling
//!
//! Error types for certificate sources, installers and identity state stores.

pub mod types;

pub use types::{CertforgotError, Result};
