//! Tracing and logging setup shared by the binaries and black-box tests.

/// Tracing configuration (filters, layers).
pub mod tracing;

pub use self::tracing::{init, init_with, LogFormat};
