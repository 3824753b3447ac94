//! Error types for relayscan
//!
//! Probe-local failures and fatal startup errors share one enum. Probe
//! failures never leave the probe; startup errors abort the run.

use std::io;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("no IPv4 address found for {0}")]
    DnsNotFound(String),

    #[error("DNS lookup for {0} timed out")]
    DnsTimeout(String),

    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("connect to {0} timed out")]
    ConnectTimeout(String),

    #[error("TLS handshake with {addr} failed: {reason}")]
    Handshake { addr: String, reason: String },

    #[error("TLS handshake with {0} timed out")]
    HandshakeTimeout(String),

    #[error("no response within {0:?}")]
    ReadTimeout(Duration),

    #[error("empty response")]
    EmptyResponse,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid port: {0}")]
    InvalidPort(String),

    #[error("invalid CIDR {cidr}: {reason}")]
    InvalidCidr { cidr: String, reason: String },

    #[error("input error: {0}")]
    Input(String),
}

/// Result type alias for relayscan operations
pub type ScanResult<T> = Result<T, ScanError>;
