//! TCP reachability probe

use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use relayscan_common::{settle, Probe, ProbeOutcome, ResultSink, ScanResult};
use relayscan_target_resolver::DnsCache;

use crate::net::connect;

/// Succeeds when a TCP connection to `target:port` is established.
pub struct PingProbe {
    dns: Arc<DnsCache>,
    port: u16,
    timeout: Duration,
    dns_timeout: Duration,
}

impl PingProbe {
    pub fn new(dns: Arc<DnsCache>) -> Self {
        Self {
            dns,
            port: 443,
            timeout: Duration::from_secs(2),
            dns_timeout: Duration::from_secs(2),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the connect timeout (also used for the DNS lookup).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.dns_timeout = timeout;
        self
    }

    #[instrument(level = "debug", skip(self))]
    async fn attempt(&self, host: &str) -> ScanResult<ProbeOutcome> {
        let ip = self.dns.resolve(host, self.dns_timeout).await?;
        let stream = connect(SocketAddr::from((ip, self.port)), self.timeout).await?;
        let peer = stream
            .peer_addr()
            .map(|a| a.ip().to_string())
            .unwrap_or_else(|_| ip.to_string());
        Ok(ProbeOutcome::Success(format!("{:<16} {:<20}", peer, host)))
    }
}

#[async_trait]
impl Probe for PingProbe {
    async fn probe(&self, target: &str, sink: &dyn ResultSink) {
        if let Some(e) = settle(self.attempt(target).await, sink) {
            debug!("ping {} failed: {}", target, e);
        }
    }

    fn name(&self) -> &str {
        "ping"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{literal_only_dns, RecordingSink};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn open_port_is_recorded() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let probe = PingProbe::new(literal_only_dns())
            .with_port(port)
            .with_timeout(Duration::from_secs(1));

        let sink = RecordingSink::default();
        probe.probe("127.0.0.1", &sink).await;

        let lines = sink.successes();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("127.0.0.1"));
        assert!(lines[0].trim_end().ends_with("127.0.0.1"));
    }

    #[tokio::test]
    async fn closed_port_records_nothing() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let probe = PingProbe::new(literal_only_dns()).with_port(port);
        let sink = RecordingSink::default();
        probe.probe("127.0.0.1", &sink).await;
        assert!(sink.successes().is_empty());
        assert!(sink.logs().is_empty());
    }

    #[tokio::test]
    async fn unresolvable_host_records_nothing() {
        let probe = PingProbe::new(literal_only_dns());
        let sink = RecordingSink::default();
        probe.probe("does-not-resolve.example", &sink).await;
        assert!(sink.successes().is_empty());
    }
}
