//! Core data types shared by probes and the scan engine.

/// One scan candidate: a literal IPv4 address or a hostname.
pub type Target = String;

/// Outcome of a single probe exchange.
///
/// Lives only inside one probe invocation; it decides which sink call to make
/// and is never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The exchange qualified; the line is recorded as a result.
    Success(String),
    /// Nothing usable came back.
    Failure,
    /// A response was parsed but classified as unusable. The optional line is
    /// shown in the live panel without counting as a success.
    Rejected(Option<String>),
}

impl ProbeOutcome {
    #[inline]
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, ProbeOutcome::Success(_))
    }
}

/// Returns true when `host` is a dotted IPv4 literal.
#[inline]
#[must_use]
pub fn is_ipv4_literal(host: &str) -> bool {
    host.parse::<std::net::Ipv4Addr>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_predicates() {
        assert!(ProbeOutcome::Success("x".into()).is_success());
        assert!(!ProbeOutcome::Failure.is_success());
        assert!(!ProbeOutcome::Rejected(None).is_success());
    }

    #[test]
    fn ipv4_literal_detection() {
        assert!(is_ipv4_literal("104.16.0.1"));
        assert!(!is_ipv4_literal("example.com"));
        assert!(!is_ipv4_literal("cdn1.example.com"));
        assert!(!is_ipv4_literal("::1"));
    }
}
