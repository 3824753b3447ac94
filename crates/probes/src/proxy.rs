//! Payload-injecting proxy / CDN probe
//!
//! Targets here are proxy addresses. The probe connects (and for
//! [`ProxyMode::CdnSsl`] handshakes), sends a templated request and
//! classifies the first response line:
//!
//! - plain: a ` 302 ` in the first line stops the probe without success;
//!   any other non-empty first line is a success. The line is not checked
//!   for being a well-formed status line.
//! - CDN-SSL: only a protocol upgrade (` 101 `) is a success; anything else
//!   is shown in the live panel but not counted.
//!
//! The write and read are bounded by one overall deadline. When it fires the
//! exchange future is dropped, which closes the connection.

use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::timeout;
use tracing::{debug, instrument};

use relayscan_common::{
    is_ipv4_literal, settle, Probe, ProbeOutcome, ResultSink, ScanError, ScanResult,
};
use relayscan_target_resolver::DnsCache;

use crate::http::read_head_lines;
use crate::net::connect;
use crate::payload::PayloadTemplate;
use crate::tls::handshake;

/// Overall deadline for payload write plus response read.
const EXCHANGE_DEADLINE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyMode {
    /// Plain TCP to the proxy.
    Plain,
    /// TLS to the proxy with the bug as server name; success requires 101.
    CdnSsl,
}

pub struct ProxyProbe {
    dns: Arc<DnsCache>,
    mode: ProxyMode,
    port: u16,
    bug: Option<String>,
    target_host: String,
    template: PayloadTemplate,
    dns_timeout: Duration,
    connect_timeout: Duration,
    handshake_timeout: Duration,
    deadline: Duration,
}

impl ProxyProbe {
    pub fn new(dns: Arc<DnsCache>, mode: ProxyMode, template: PayloadTemplate) -> Self {
        let port = match mode {
            ProxyMode::Plain => 80,
            ProxyMode::CdnSsl => 443,
        };
        Self {
            dns,
            mode,
            port,
            bug: None,
            target_host: String::new(),
            template,
            dns_timeout: Duration::from_secs(3),
            connect_timeout: Duration::from_secs(3),
            handshake_timeout: Duration::from_secs(3),
            deadline: EXCHANGE_DEADLINE,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Fixed bug host; when unset it is derived per proxy.
    pub fn with_bug(mut self, bug: Option<String>) -> Self {
        self.bug = bug.filter(|b| !b.is_empty());
        self
    }

    /// Host substituted for `[host]`, and the bug fallback for IP proxies.
    pub fn with_target_host(mut self, host: impl Into<String>) -> Self {
        self.target_host = host.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self.dns_timeout = timeout;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Bug host used for one proxy.
    fn bug_for(&self, proxy: &str) -> String {
        if self.template.path() == "/" {
            return self.target_host.clone();
        }
        match &self.bug {
            Some(bug) => bug.clone(),
            None if is_ipv4_literal(proxy) => self.target_host.clone(),
            None => proxy.to_string(),
        }
    }

    #[instrument(level = "debug", skip(self))]
    async fn attempt(&self, proxy: &str) -> ScanResult<ProbeOutcome> {
        let bug = self.bug_for(proxy);
        let ip = self.dns.resolve(proxy, self.dns_timeout).await?;
        let addr = SocketAddr::from((ip, self.port));
        let address = addr.to_string();
        let stream = connect(addr, self.connect_timeout).await?;
        let payload = self.template.render(&bug, &self.target_host);

        match self.mode {
            ProxyMode::Plain => self.exchange_within_deadline(stream, &payload, &address).await,
            ProxyMode::CdnSsl => {
                // An IP server name is sent without SNI.
                let server_name = if bug.is_empty() { ip.to_string() } else { bug };
                let tls = handshake(stream, &server_name, self.handshake_timeout, &address).await?;
                self.exchange_within_deadline(tls, &payload, &address).await
            }
        }
    }

    async fn exchange_within_deadline<S>(
        &self,
        stream: S,
        payload: &str,
        address: &str,
    ) -> ScanResult<ProbeOutcome>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        match timeout(self.deadline, exchange(stream, payload, self.mode, address)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ScanError::ReadTimeout(self.deadline)),
        }
    }
}

/// Send the payload, read the response head and classify it.
async fn exchange<S>(stream: S, payload: &str, mode: ProxyMode, address: &str) -> ScanResult<ProbeOutcome>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(stream);
    reader.get_mut().write_all(payload.as_bytes()).await?;
    reader.get_mut().flush().await?;

    let lines = read_head_lines(&mut reader).await?;
    classify(mode, address, &lines)
}

fn classify(mode: ProxyMode, address: &str, lines: &[String]) -> ScanResult<ProbeOutcome> {
    let first = lines.first().ok_or(ScanError::EmptyResponse)?;
    let line = format!("{:<32}  {}", address, lines.join(" -- "));

    let outcome = match mode {
        ProxyMode::Plain if first.contains(" 302 ") => ProbeOutcome::Rejected(None),
        ProxyMode::Plain => ProbeOutcome::Success(line),
        ProxyMode::CdnSsl if first.contains(" 101 ") => ProbeOutcome::Success(line),
        ProxyMode::CdnSsl => ProbeOutcome::Rejected(Some(line)),
    };
    Ok(outcome)
}

#[async_trait]
impl Probe for ProxyProbe {
    async fn probe(&self, target: &str, sink: &dyn ResultSink) {
        if let Some(e) = settle(self.attempt(target).await, sink) {
            debug!("proxy {} failed: {}", target, e);
        }
    }

    fn name(&self) -> &str {
        match self.mode {
            ProxyMode::Plain => "proxy",
            ProxyMode::CdnSsl => "cdn-ssl",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{literal_only_dns, RecordingSink};
    use crate::tls::tests::spawn_tls_server_replying;
    use tokio::io::{duplex, AsyncReadExt};
    use tokio::net::TcpListener;

    const TEMPLATE: &str =
        "[method] [path] [protocol][crlf]Host: [host][crlf]Upgrade: websocket[crlf][crlf]";

    /// Run `exchange` against an in-memory peer that answers with `response`
    /// and hands back what the probe sent.
    async fn exchange_with(mode: ProxyMode, response: &'static str) -> (ScanResult<ProbeOutcome>, String) {
        let (client, mut server) = duplex(4096);
        let peer = tokio::spawn(async move {
            let mut buf = vec![0u8; 1024];
            let n = server.read(&mut buf).await.unwrap();
            server.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&buf[..n]).into_owned()
        });

        let payload = PayloadTemplate::new(TEMPLATE).render("bug.example", "origin.example");
        let outcome = exchange(client, &payload, mode, "10.0.0.1:443").await;
        (outcome, peer.await.unwrap())
    }

    #[tokio::test]
    async fn cdn_upgrade_is_success() {
        let (outcome, sent) = exchange_with(
            ProxyMode::CdnSsl,
            "HTTP/1.1 101 Switching Protocols\r\nServer: nginx\r\n\r\n",
        )
        .await;

        assert!(sent.starts_with("GET / HTTP/1.1\r\nHost: origin.example\r\n"));
        let sink = RecordingSink::default();
        settle(outcome, &sink);
        let lines = sink.successes();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("101"));
        assert!(lines[0].contains("nginx"));
        assert!(lines[0].contains(" -- "));
    }

    #[tokio::test]
    async fn cdn_non_upgrade_is_logged_only() {
        let (outcome, _) = exchange_with(ProxyMode::CdnSsl, "HTTP/1.1 403 Forbidden\r\n\r\n").await;

        let sink = RecordingSink::default();
        settle(outcome, &sink);
        assert!(sink.successes().is_empty());
        assert_eq!(sink.logs().len(), 1);
        assert!(sink.logs()[0].contains("403"));
    }

    #[tokio::test]
    async fn plain_redirect_is_rejected() {
        let (outcome, _) = exchange_with(ProxyMode::Plain, "HTTP/1.1 302 Found\r\n\r\n").await;
        assert_eq!(outcome.unwrap(), ProbeOutcome::Rejected(None));
    }

    #[test]
    fn plain_accepts_any_first_line() {
        let lines = vec!["garbage that is not a status line".to_string()];
        let outcome = classify(ProxyMode::Plain, "10.0.0.1:80", &lines).unwrap();
        assert!(outcome.is_success());
    }

    #[test]
    fn empty_response_is_failure() {
        assert!(matches!(
            classify(ProxyMode::Plain, "10.0.0.1:80", &[]),
            Err(ScanError::EmptyResponse)
        ));
    }

    /// Proxy that replies with a fixed response to each connection.
    async fn spawn_proxy(response: &'static str) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let _ = stream.read(&mut buf).await;
                    let _ = stream.write_all(response.as_bytes()).await;
                });
            }
        });
        port
    }

    fn plain_probe(port: u16) -> ProxyProbe {
        ProxyProbe::new(literal_only_dns(), ProxyMode::Plain, PayloadTemplate::new(TEMPLATE))
            .with_port(port)
            .with_target_host("origin.example")
    }

    #[tokio::test]
    async fn plain_proxy_302_records_nothing() {
        let port = spawn_proxy("HTTP/1.1 302 Found\r\n\r\n").await;
        let sink = RecordingSink::default();
        plain_probe(port).probe("127.0.0.1", &sink).await;
        assert!(sink.successes().is_empty());
        assert!(sink.logs().is_empty());
    }

    #[tokio::test]
    async fn plain_proxy_200_is_recorded() {
        let port = spawn_proxy("HTTP/1.1 200 OK\r\nServer: squid\r\nVia: 1.1\r\n\r\n").await;
        let sink = RecordingSink::default();
        plain_probe(port).probe("127.0.0.1", &sink).await;
        let lines = sink.successes();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with(&format!("127.0.0.1:{port}")));
        assert!(lines[0].ends_with("HTTP/1.1 200 OK -- Server: squid"));
    }

    #[tokio::test]
    async fn silent_proxy_hits_deadline() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let probe = plain_probe(port).with_deadline(Duration::from_millis(100));
        let outcome = probe.attempt("127.0.0.1").await;
        assert!(matches!(outcome, Err(ScanError::ReadTimeout(_))));
    }

    #[tokio::test]
    async fn cdn_without_bug_or_target_handshakes_without_sni() {
        let addr = spawn_tls_server_replying("HTTP/1.1 101 Switching Protocols\r\n\r\n").await;
        let template = PayloadTemplate::new(TEMPLATE).with_path("[scheme][bug]");
        let probe = ProxyProbe::new(literal_only_dns(), ProxyMode::CdnSsl, template)
            .with_port(addr.port());

        let sink = RecordingSink::default();
        probe.probe("127.0.0.1", &sink).await;
        let lines = sink.successes();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("101"));
    }

    #[test]
    fn bug_selection() {
        let template = PayloadTemplate::new(TEMPLATE).with_path("[scheme][bug]");
        let probe = ProxyProbe::new(literal_only_dns(), ProxyMode::CdnSsl, template.clone())
            .with_target_host("origin.example");
        assert_eq!(probe.bug_for("104.16.0.1"), "origin.example");
        assert_eq!(probe.bug_for("cdn.example"), "cdn.example");

        let fixed = ProxyProbe::new(literal_only_dns(), ProxyMode::CdnSsl, template)
            .with_bug(Some("bug.example".into()))
            .with_target_host("origin.example");
        assert_eq!(fixed.bug_for("cdn.example"), "bug.example");

        let root_path = ProxyProbe::new(literal_only_dns(), ProxyMode::Plain, PayloadTemplate::new(TEMPLATE))
            .with_bug(Some("bug.example".into()))
            .with_target_host("origin.example");
        assert_eq!(root_path.bug_for("cdn.example"), "origin.example");
    }
}
