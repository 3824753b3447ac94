//! Direct HTTP fingerprinting probe

use async_trait::async_trait;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, instrument};

use relayscan_common::{settle, Probe, ProbeOutcome, ResultSink, ScanError, ScanResult, VERSION};
use relayscan_target_resolver::DnsCache;

use crate::http::parse_head;
use crate::net::connect;
use crate::tls::handshake;

/// Ports spoken to over TLS instead of plain TCP, unless overridden.
pub const HTTPS_PORTS: [u16; 4] = [443, 8443, 9443, 10443];

const RESPONSE_BUF: usize = 4096;

/// Sends one HTTP request per configured port and records the status line,
/// `Server` and `Location` of each answer.
pub struct DirectProbe {
    dns: Arc<DnsCache>,
    ports: Vec<u16>,
    tls_ports: Vec<u16>,
    method: String,
    skip_location: Option<String>,
    connect_timeout: Duration,
    request_timeout: Duration,
    dns_timeout: Duration,
}

impl DirectProbe {
    pub fn new(dns: Arc<DnsCache>, ports: Vec<u16>) -> Self {
        Self {
            dns,
            ports,
            tls_ports: HTTPS_PORTS.to_vec(),
            method: "HEAD".to_string(),
            skip_location: None,
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            dns_timeout: Duration::from_secs(5),
        }
    }

    /// HTTP method for the request line; empty keeps `HEAD`.
    pub fn with_method(mut self, method: &str) -> Self {
        if !method.trim().is_empty() {
            self.method = method.trim().to_uppercase();
        }
        self
    }

    /// Suppress answers whose `Location` equals `location` exactly.
    pub fn with_skip_location(mut self, location: Option<String>) -> Self {
        self.skip_location = location.filter(|l| !l.is_empty());
        self
    }

    /// Ports that get a TLS handshake before the request.
    pub fn with_tls_ports(mut self, ports: Vec<u16>) -> Self {
        self.tls_ports = ports;
        self
    }

    /// Bounds the TCP connect and, on TLS ports, the handshake.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Bounds the request write plus the response read.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_dns_timeout(mut self, timeout: Duration) -> Self {
        self.dns_timeout = timeout;
        self
    }

    fn request(&self, host: &str) -> String {
        format!(
            "{} / HTTP/1.1\r\nHost: {}\r\nUser-Agent: relayscan/{}\r\nConnection: close\r\n\r\n",
            self.method, host, VERSION
        )
    }

    #[instrument(level = "debug", skip(self))]
    async fn attempt_port(&self, host: &str, ip: Ipv4Addr, port: u16) -> ScanResult<ProbeOutcome> {
        let addr = SocketAddr::from((ip, port));
        let stream = connect(addr, self.connect_timeout).await?;
        let request = self.request(host);

        let response = if self.tls_ports.contains(&port) {
            let mut tls = handshake(stream, host, self.connect_timeout, &addr.to_string()).await?;
            self.exchange(&mut tls, &request).await?
        } else {
            let mut stream = stream;
            self.exchange(&mut stream, &request).await?
        };

        let head = parse_head(&response);
        if let Some(skip) = &self.skip_location {
            if head.location == *skip {
                return Ok(ProbeOutcome::Rejected(None));
            }
        }

        Ok(ProbeOutcome::Success(format!(
            "{:<15}  {:<3}   {:<16}    {}:{}",
            ip, head.status, head.server, host, port
        )))
    }

    /// Write the request and take whatever arrives in a single read.
    async fn exchange<S>(&self, stream: &mut S, request: &str) -> ScanResult<String>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let io = async {
            stream.write_all(request.as_bytes()).await?;
            let mut buf = vec![0u8; RESPONSE_BUF];
            let n = stream.read(&mut buf).await?;
            Ok::<_, std::io::Error>(String::from_utf8_lossy(&buf[..n]).into_owned())
        };

        match timeout(self.request_timeout, io).await {
            Ok(Ok(response)) if response.is_empty() => Err(ScanError::EmptyResponse),
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(ScanError::Io(e)),
            Err(_) => Err(ScanError::ReadTimeout(self.request_timeout)),
        }
    }
}

#[async_trait]
impl Probe for DirectProbe {
    async fn probe(&self, target: &str, sink: &dyn ResultSink) {
        let ip = match self.dns.resolve(target, self.dns_timeout).await {
            Ok(ip) => ip,
            Err(e) => {
                debug!("direct {} failed: {}", target, e);
                return;
            }
        };

        for &port in &self.ports {
            if let Some(e) = settle(self.attempt_port(target, ip, port).await, sink) {
                debug!("direct {}:{} failed: {}", target, port, e);
            }
        }
    }

    fn name(&self) -> &str {
        "direct"
    }
}
