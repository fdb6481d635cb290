//! Subcommand implementations.

pub mod backoff;
pub mod breaker;
pub mod config;
pub mod gaps;
pub mod quorum;
pub mod replay;
