//! DNS resolution cache
//!
//! Literal IPv4 addresses short-circuit with no I/O. Hostnames are looked up
//! once and kept for the lifetime of the cache; there is no TTL and no
//! eviction. Failed lookups are not cached so a later probe may retry.
//! Concurrent misses on one name may both hit the backend; the last insert
//! wins and both values are equally valid.

use async_trait::async_trait;
use dashmap::DashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, trace};
use trust_dns_resolver::TokioAsyncResolver;

use relayscan_common::{ScanError, ScanResult};

/// Backend performing a single A-record style lookup.
#[async_trait]
pub trait HostLookup: Send + Sync {
    /// Return every IPv4 address for `host`, in resolver order.
    async fn lookup_ipv4(&self, host: &str) -> ScanResult<Vec<Ipv4Addr>>;
}

/// [`HostLookup`] backed by the system resolver configuration.
pub struct SystemResolver {
    resolver: TokioAsyncResolver,
}

impl SystemResolver {
    /// Build a resolver from `/etc/resolv.conf` (or the platform equivalent).
    pub fn from_system_conf() -> ScanResult<Self> {
        let resolver = TokioAsyncResolver::tokio_from_system_conf()
            .map_err(|e| ScanError::Input(format!("cannot load resolver config: {e}")))?;
        Ok(Self { resolver })
    }
}

#[async_trait]
impl HostLookup for SystemResolver {
    async fn lookup_ipv4(&self, host: &str) -> ScanResult<Vec<Ipv4Addr>> {
        let lookup = self.resolver.lookup_ip(host).await.map_err(|e| {
            debug!("lookup {} failed: {}", host, e);
            ScanError::DnsNotFound(host.to_string())
        })?;

        Ok(lookup
            .iter()
            .filter_map(|ip| match ip {
                IpAddr::V4(v4) => Some(v4),
                IpAddr::V6(_) => None,
            })
            .collect())
    }
}

/// Hostname → IPv4 cache scoped to one scan run.
pub struct DnsCache {
    backend: Arc<dyn HostLookup>,
    entries: DashMap<String, Ipv4Addr>,
}

impl DnsCache {
    pub fn new(backend: Arc<dyn HostLookup>) -> Self {
        Self {
            backend,
            entries: DashMap::new(),
        }
    }

    /// Resolve `host` to an IPv4 address, bounding the lookup by `limit`.
    pub async fn resolve(&self, host: &str, limit: Duration) -> ScanResult<Ipv4Addr> {
        if let Ok(ip) = host.parse::<Ipv4Addr>() {
            return Ok(ip);
        }

        if let Some(hit) = self.entries.get(host) {
            trace!("dns cache hit for {}", host);
            return Ok(*hit);
        }

        let addrs = match timeout(limit, self.backend.lookup_ipv4(host)).await {
            Ok(result) => result?,
            Err(_) => return Err(ScanError::DnsTimeout(host.to_string())),
        };

        let first = addrs
            .first()
            .copied()
            .ok_or_else(|| ScanError::DnsNotFound(host.to_string()))?;
        self.entries.insert(host.to_string(), first);
        Ok(first)
    }

    /// Number of cached hostnames.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
