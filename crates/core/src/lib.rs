//! Shared building blocks for the sourcegate coordination services.
//!
//! Holds the domain error type, INI configuration access, host identity
//! detection and the role vocabulary used by every other crate.

pub mod config;
pub mod error;
pub mod host;
pub mod roles;
pub mod types;
