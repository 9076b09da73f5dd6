//! Logging utilities.
//!
//! Centralizes logger initialization; the rest of the crate only uses the
//! `log` facade.

#[cfg(test)]
pub(crate) mod capture;
mod init;

pub use init::{LoggingConfig, init_logging};
