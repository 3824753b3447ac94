//! TLS / SNI handshake probe

use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use relayscan_common::{settle, Probe, ProbeOutcome, ResultSink, ScanResult};
use relayscan_target_resolver::DnsCache;

use crate::net::connect;
use crate::tls::handshake;

/// Connects to the resolved address and completes a TLS handshake that
/// presents the queried hostname as the server name.
pub struct SniProbe {
    dns: Arc<DnsCache>,
    port: u16,
    connect_timeout: Duration,
    handshake_timeout: Duration,
}

impl SniProbe {
    pub fn new(dns: Arc<DnsCache>) -> Self {
        Self {
            dns,
            port: 443,
            connect_timeout: Duration::from_secs(3),
            handshake_timeout: Duration::from_secs(3),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Bounds both the DNS lookup and the handshake.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    #[instrument(level = "debug", skip(self))]
    async fn attempt(&self, host: &str) -> ScanResult<ProbeOutcome> {
        let ip = self.dns.resolve(host, self.handshake_timeout).await?;
        let addr = SocketAddr::from((ip, self.port));
        let stream = connect(addr, self.connect_timeout).await?;
        let peer = stream
            .peer_addr()
            .map(|a| a.ip().to_string())
            .unwrap_or_else(|_| ip.to_string());

        let _tls = handshake(stream, host, self.handshake_timeout, &addr.to_string()).await?;
        Ok(ProbeOutcome::Success(format!("{:<16} {:<20}", peer, host)))
    }
}

#[async_trait]
impl Probe for SniProbe {
    async fn probe(&self, target: &str, sink: &dyn ResultSink) {
        if let Some(e) = settle(self.attempt(target).await, sink) {
            debug!("sni {} failed: {}", target, e);
        }
    }

    fn name(&self) -> &str {
        "sni"
    }
}
