//! # Observability
//!
//! Structured logging for certforgot via the `tracing` ecosystem.

pub mod logging;

pub use logging::init_logging;
