//! Column headers printed above plain (non-live) result output

/// Line layouts produced by the probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Peer IP and host: ping and SNI.
    Host,
    /// IP, status code, server header and host:port.
    Direct,
    /// Proxy address and the kept response lines.
    Proxy,
}

pub fn header(layout: Layout) -> String {
    let columns = match layout {
        Layout::Host => format!("{:<16} {:<20}", "IP", "HOST"),
        Layout::Direct => format!(
            "{:<15}  {:<3}   {:<16}    {}",
            "IP", "CODE", "SERVER", "HOST:PORT"
        ),
        Layout::Proxy => format!("{:<32}  {}", "PROXY", "RESPONSE"),
    };
    let rule = "-".repeat(columns.trim_end().len());
    format!("{}\n{}", columns.trim_end(), rule)
}
