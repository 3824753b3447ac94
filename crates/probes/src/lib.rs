//! Probes - the four scanning strategies
//!
//! Each probe resolves its target through the run's [`DnsCache`] first, then
//! performs one bounded network exchange and reports success only through
//! the [`ResultSink`] passed in by the engine.
//!
//! [`DnsCache`]: relayscan_target_resolver::DnsCache
//! [`ResultSink`]: relayscan_common::ResultSink

mod direct;
mod http;
mod net;
mod payload;
mod ping;
mod proxy;
mod sni;
mod tls;

pub use direct::{DirectProbe, HTTPS_PORTS};
pub use http::{parse_head, read_head_lines, HttpHead};
pub use payload::PayloadTemplate;
pub use ping::PingProbe;
pub use proxy::{ProxyMode, ProxyProbe};
pub use sni::SniProbe;
pub use tls::insecure_connector;
