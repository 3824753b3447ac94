//! Target Resolver - host sources, DNS caching and port lists
//!
//! - [`DnsCache`]: run-scoped hostname → IPv4 memoization in front of a
//!   [`HostLookup`] backend (the system resolver in production).
//! - [`expand_cidr`], [`read_host_lines`], [`trim_to_depth`]: turn the
//!   command-line host sources into an ordered target list.
//! - [`parse_ports`]: comma separated port lists with optional ranges.

mod dns;
mod hosts;
mod ports;

pub use dns::{DnsCache, HostLookup, SystemResolver};
pub use hosts::{expand_cidr, read_host_lines, read_lines_from, trim_to_depth};
pub use ports::parse_ports;
