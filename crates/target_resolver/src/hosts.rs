//! Host sources: CIDR blocks, host-list files, and stdin.

use ipnet::Ipv4Net;
use std::fs::File;
use std::io::{self, BufRead, BufReader, IsTerminal};
use std::net::Ipv4Addr;

use relayscan_common::{ScanError, ScanResult};

/// Expand an IPv4 CIDR block into host addresses.
///
/// Network and broadcast addresses are dropped whenever the block holds more
/// than one address, so `/31` yields nothing and `/32` yields its address.
pub fn expand_cidr(cidr: &str) -> ScanResult<Vec<String>> {
    let net: Ipv4Net = cidr.trim().parse().map_err(|e: ipnet::AddrParseError| {
        ScanError::InvalidCidr {
            cidr: cidr.to_string(),
            reason: e.to_string(),
        }
    })?;

    let first = u32::from(net.network());
    let last = u32::from(net.broadcast());
    if first == last {
        return Ok(vec![net.network().to_string()]);
    }

    Ok((first + 1..last)
        .map(|v| Ipv4Addr::from(v).to_string())
        .collect())
}

/// Read non-empty lines from `path`, or from piped stdin when `path` is empty or `-`.
pub fn read_host_lines(path: &str) -> ScanResult<Vec<String>> {
    if path.is_empty() || path == "-" {
        let stdin = io::stdin();
        if stdin.is_terminal() {
            return Err(ScanError::Input(
                "no input provided: use -f or pipe hosts via stdin".to_string(),
            ));
        }
        return read_lines_from(stdin.lock());
    }

    let file = File::open(path).map_err(|e| ScanError::Input(format!("{path}: {e}")))?;
    read_lines_from(BufReader::new(file))
}

/// Collect the non-blank lines of `reader`, trailing whitespace removed.
pub fn read_lines_from<R: BufRead>(reader: R) -> ScanResult<Vec<String>> {
    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|e| ScanError::Input(e.to_string()))?;
        let line = line.trim_end();
        if !line.is_empty() {
            lines.push(line.to_string());
        }
    }
    Ok(lines)
}

/// Keep the last `depth` labels of `domain`. A depth of 0, or a domain with
/// fewer labels than `depth`, returns the domain unchanged.
pub fn trim_to_depth(domain: &str, depth: usize) -> String {
    if depth == 0 {
        return domain.to_string();
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < depth {
        return domain.to_string();
    }
    labels[labels.len() - depth..].join(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn cidr_30_excludes_network_and_broadcast() {
        let ips = expand_cidr("192.168.1.0/30").unwrap();
        assert_eq!(ips, vec!["192.168.1.1", "192.168.1.2"]);
    }

    #[test]
    fn cidr_with_host_bits_is_masked() {
        let ips = expand_cidr("10.0.0.77/29").unwrap();
        assert_eq!(ips.len(), 6);
        assert_eq!(ips.first().map(String::as_str), Some("10.0.0.73"));
        assert_eq!(ips.last().map(String::as_str), Some("10.0.0.78"));
    }

    #[test]
    fn cidr_single_and_pair() {
        assert_eq!(expand_cidr("1.2.3.4/32").unwrap(), vec!["1.2.3.4"]);
        assert!(expand_cidr("1.2.3.4/31").unwrap().is_empty());
    }

    #[test]
    fn cidr_24_has_254_hosts() {
        assert_eq!(expand_cidr("104.16.0.0/24").unwrap().len(), 254);
    }

    #[test]
    fn malformed_cidr_is_fatal() {
        for bad in ["104.16.0.0", "104.16.0.0/33", "not-a-cidr", "300.1.1.1/24"] {
            let err = expand_cidr(bad).unwrap_err();
            assert!(matches!(err, ScanError::InvalidCidr { .. }), "{bad}");
        }
    }

    #[test]
    fn blank_lines_are_dropped() {
        let input = Cursor::new("a.example\n\n b.example\r\n   \n10.0.0.1\n");
        let lines = read_lines_from(input).unwrap();
        assert_eq!(lines, vec!["a.example", " b.example", "10.0.0.1"]);
    }

    #[test]
    fn missing_file_is_input_error() {
        let err = read_host_lines("/definitely/not/here.txt").unwrap_err();
        assert!(matches!(err, ScanError::Input(_)));
    }

    #[test]
    fn depth_trimming() {
        assert_eq!(trim_to_depth("a.b.cdn.example.com", 2), "example.com");
        assert_eq!(trim_to_depth("a.b.cdn.example.com", 3), "cdn.example.com");
        assert_eq!(trim_to_depth("example.com", 3), "example.com");
        assert_eq!(trim_to_depth("a.b.example.com", 0), "a.b.example.com");
    }
}
