//! Port list parsing

use relayscan_common::{ScanError, ScanResult};

/// Parses a port string like "80,443, 8080" or "8000-8002" into ports.
///
/// Every entry must lie in 1..=65535; order is preserved and duplicates are
/// kept as given.
pub fn parse_ports(ports_str: &str) -> ScanResult<Vec<u16>> {
    let mut ports = Vec::new();

    for part in ports_str.split(',') {
        let part = part.trim();

        if let Some((start, end)) = part.split_once('-') {
            let start = parse_port(start.trim())?;
            let end = parse_port(end.trim())?;
            if start > end {
                return Err(ScanError::InvalidPort(format!("{part} (start > end)")));
            }
            ports.extend(start..=end);
        } else {
            ports.push(parse_port(part)?);
        }
    }

    Ok(ports)
}

fn parse_port(raw: &str) -> ScanResult<u16> {
    let value: u32 = raw
        .parse()
        .map_err(|_| ScanError::InvalidPort(raw.to_string()))?;
    match u16::try_from(value) {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(ScanError::InvalidPort(format!(
            "{raw} (must be between 1 and 65535)"
        ))),
    }
}
