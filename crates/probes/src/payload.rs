//! Payload templates for proxy probes.

/// Request template with `[method] [path] [scheme] [protocol] [bug] [host] [crlf]`
/// placeholders.
#[derive(Debug, Clone)]
pub struct PayloadTemplate {
    template: String,
    method: String,
    path: String,
    scheme: String,
    protocol: String,
}

impl PayloadTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            method: "GET".to_string(),
            path: "/".to_string(),
            scheme: String::new(),
            protocol: "HTTP/1.1".to_string(),
        }
    }

    pub fn with_method(mut self, method: &str) -> Self {
        self.method = method.to_uppercase();
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Template with method, path, scheme and protocol filled in; `[bug]`,
    /// `[host]` and `[crlf]` are left as written.
    pub fn preview(&self) -> String {
        self.template
            .replace("[method]", &self.method)
            .replace("[path]", &self.path)
            .replace("[scheme]", &self.scheme)
            .replace("[protocol]", &self.protocol)
    }

    /// Final bytes to send for one target.
    ///
    /// `[path]` is expanded before `[bug]` so a path such as `[scheme][bug]`
    /// picks up the per-target bug too.
    pub fn render(&self, bug: &str, host: &str) -> String {
        self.preview()
            .replace("[bug]", bug)
            .replace("[host]", host)
            .replace("[crlf]", "\r\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT: &str =
        "[method] [path] [protocol][crlf]Host: [host][crlf]Upgrade: websocket[crlf][crlf]";

    #[test]
    fn renders_plain_proxy_payload() {
        let payload = PayloadTemplate::new(DEFAULT).with_method("get").render("bug.example", "ws.example");
        assert_eq!(
            payload,
            "GET / HTTP/1.1\r\nHost: ws.example\r\nUpgrade: websocket\r\n\r\n"
        );
    }

    #[test]
    fn path_placeholders_expand_per_target() {
        let template = PayloadTemplate::new(DEFAULT)
            .with_method("head")
            .with_path("[scheme][bug]")
            .with_scheme("ws://");
        assert_eq!(template.preview(), "HEAD ws://[bug] HTTP/1.1[crlf]Host: [host][crlf]Upgrade: websocket[crlf][crlf]");

        let payload = template.render("cdn.example", "origin.example");
        assert!(payload.starts_with("HEAD ws://cdn.example HTTP/1.1\r\n"));
        assert!(payload.contains("Host: origin.example\r\n"));
    }
}
