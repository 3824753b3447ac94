//! Minimal HTTP response head handling.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Fields pulled out of a response head.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpHead {
    /// Status code from the first line, 0 when it could not be parsed.
    pub status: u16,
    pub server: String,
    pub location: String,
}

/// Parse the status line plus `Server:` and `Location:` headers.
///
/// Header names match case-insensitively; scanning stops at the first blank
/// line.
pub fn parse_head(response: &str) -> HttpHead {
    let mut head = HttpHead::default();
    let mut lines = response.split('\n');

    if let Some(status_line) = lines.next() {
        head.status = status_line
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse().ok())
            .unwrap_or(0);
    }

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if let Some(value) = header_value(line, "server:") {
            head.server = value.to_string();
        } else if let Some(value) = header_value(line, "location:") {
            head.location = value.to_string();
        }
    }

    head
}

fn header_value<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let prefix = line.get(..name.len())?;
    if prefix.eq_ignore_ascii_case(name) {
        Some(line[name.len()..].trim())
    } else {
        None
    }
}

/// Read lines up to the first blank one, keeping the first line plus any
/// `Location` or `Server` lines. Line terminators are stripped.
pub async fn read_head_lines<R>(reader: &mut R) -> std::io::Result<Vec<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut kept = Vec::new();
    let mut buf = String::new();

    loop {
        buf.clear();
        if reader.read_line(&mut buf).await? == 0 {
            break;
        }
        let line = buf.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            break;
        }
        if kept.is_empty() || line.starts_with("Location") || line.starts_with("Server") {
            kept.push(line.to_string());
        }
    }

    Ok(kept)
}
