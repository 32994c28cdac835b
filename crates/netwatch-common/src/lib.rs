//! Common types and utilities for Netwatch
//!
//! This crate provides shared functionality across all Netwatch components:
//! - Status levels and descriptors
//! - Configuration management
//! - Logging infrastructure
//! - Error types

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use error::*;
pub use types::*;

/// Version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
