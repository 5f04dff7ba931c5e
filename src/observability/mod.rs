//! Structured logging for the service.
//!
//! One event per log line, deterministic field ordering, explicit
//! severity. Synchronous and unbuffered so a crash never loses the
//! last line written.

mod logger;

pub use logger::{Logger, Severity};
