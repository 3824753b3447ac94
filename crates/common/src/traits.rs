//! Core traits for relayscan components
//!
//! A probe is a strategy object invoked once per target. It reports success
//! only through the [`ResultSink`] it is handed; the engine never inspects a
//! return value.

use crate::error::ScanError;
use crate::types::ProbeOutcome;
use async_trait::async_trait;

/// Capability handed to every probe call.
pub trait ResultSink: Send + Sync {
    /// Record a successful probe line (counted, displayed, persisted).
    fn record_success(&self, line: String);

    /// Show a line in the live panel without counting it.
    fn log(&self, line: String);
}

/// Core probe trait - every scanning strategy implements this
#[async_trait]
pub trait Probe: Send + Sync {
    /// Probe one target. Every blocking step must be bounded by a timeout.
    async fn probe(&self, target: &str, sink: &dyn ResultSink);

    /// Probe name/identifier
    fn name(&self) -> &str;
}

/// Route the result of one exchange to the sink.
///
/// Failures and errors are swallowed here; the returned error (if any) is
/// only for the caller's debug logging.
pub fn settle(
    result: Result<ProbeOutcome, ScanError>,
    sink: &dyn ResultSink,
) -> Option<ScanError> {
    match result {
        Ok(ProbeOutcome::Success(line)) => {
            sink.record_success(line);
            None
        }
        Ok(ProbeOutcome::Rejected(Some(line))) => {
            sink.log(line);
            None
        }
        Ok(ProbeOutcome::Rejected(None)) | Ok(ProbeOutcome::Failure) => None,
        Err(e) => Some(e),
    }
}
