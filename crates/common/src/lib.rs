//! Relayscan Common - Shared types and traits
//!
//! This crate provides the error type, the probe and sink traits, and the
//! small value types used across the relayscan workspace.

pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use error::{ScanError, ScanResult};
pub use traits::{settle, Probe, ResultSink};
pub use types::{is_ipv4_literal, ProbeOutcome, Target};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
