use clap::{Args, Parser, Subcommand};

pub const DEFAULT_PAYLOAD: &str =
    "[method] [path] [protocol][crlf]Host: [host][crlf]Upgrade: websocket[crlf][crlf]";

#[derive(Parser, Debug)]
#[command(name = "relayscan")]
#[command(version)]
#[command(about = "Concurrent scanner for hosts usable as tunneling relays", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Number of parallel workers
    #[arg(short = 't', long, default_value_t = 64, global = true)]
    pub threads: usize,

    /// Seconds between panel refreshes (0 = refresh on every completed host)
    #[arg(long, default_value_t = 1.0, global = true)]
    pub stat_interval: f64,

    /// Print the final summary as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan hosts using TCP ping
    Ping(PingArgs),
    /// Scan using a direct HTTP request to each host
    Direct(DirectArgs),
    /// Scan a server name indication (SNI) list
    Sni(SniArgs),
    /// Scan proxies by sending a payload through them
    Proxy(ProxyArgs),
    /// Scan CDN proxies over TLS with payload injection
    #[command(name = "cdn-ssl")]
    CdnSsl(CdnSslArgs),
}

#[derive(Args, Debug)]
pub struct PingArgs {
    /// Host list file (omit or "-" to read stdin)
    #[arg(short, long, default_value = "")]
    pub filename: String,

    /// Port to connect to
    #[arg(long, default_value_t = 443)]
    pub port: u16,

    /// Connect timeout in seconds
    #[arg(long, default_value_t = 2)]
    pub timeout: u64,

    /// Append results to this file
    #[arg(short, long)]
    pub output: Option<String>,
}

#[derive(Args, Debug)]
pub struct DirectArgs {
    /// Host list file (omit or "-" to read stdin)
    #[arg(short, long, default_value = "")]
    pub filename: String,

    /// Ports to scan. Examples: 80 or 80,443,8080 or 8000-8010
    #[arg(short, long, default_value = "80")]
    pub port: String,

    /// HTTP method
    #[arg(short, long, default_value = "HEAD")]
    pub method: String,

    /// Skip results whose Location header equals this value
    #[arg(long)]
    pub skip: Option<String>,

    /// TCP connect timeout in seconds
    #[arg(long, default_value_t = 5)]
    pub timeout_connect: u64,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 10)]
    pub timeout_request: u64,

    /// DNS lookup timeout in seconds
    #[arg(long, default_value_t = 5)]
    pub timeout_dns: u64,

    /// Append results to this file
    #[arg(short, long)]
    pub output: Option<String>,
}

#[derive(Args, Debug)]
pub struct SniArgs {
    /// Domain list file (omit or "-" to read stdin)
    #[arg(short, long, default_value = "")]
    pub filename: String,

    /// Keep only the last N labels of each domain (0 = unchanged)
    #[arg(short, long, default_value_t = 0)]
    pub deep: usize,

    /// Handshake timeout in seconds
    #[arg(long, default_value_t = 3)]
    pub timeout: u64,

    /// Append results to this file
    #[arg(short, long)]
    pub output: Option<String>,
}

/// Where proxy addresses come from. Sources are concatenated in this order.
#[derive(Args, Debug)]
pub struct ProxySources {
    /// Single proxy host, without port
    #[arg(long)]
    pub proxy: Option<String>,

    /// Proxy list file, without ports
    #[arg(short, long)]
    pub filename: Option<String>,

    /// Proxy CIDR range, e.g. 104.16.0.0/24
    #[arg(short, long)]
    pub cidr: Option<String>,
}

/// Options shared by the payload probes.
#[derive(Args, Debug)]
pub struct PayloadArgs {
    /// Bug host to use when the proxy is an IP instead of a domain
    #[arg(short = 'B', long)]
    pub bug: Option<String>,

    /// Target server substituted for [host]
    #[arg(long, default_value = "")]
    pub target: String,

    /// Request protocol
    #[arg(long, default_value = "HTTP/1.1")]
    pub protocol: String,

    /// Request payload template
    #[arg(long, default_value = DEFAULT_PAYLOAD)]
    pub payload: String,

    /// Connect and handshake timeout in seconds
    #[arg(long, default_value_t = 3)]
    pub timeout: u64,

    /// Append results to this file
    #[arg(short, long)]
    pub output: Option<String>,
}

#[derive(Args, Debug)]
pub struct ProxyArgs {
    #[command(flatten)]
    pub sources: ProxySources,

    #[command(flatten)]
    pub payload: PayloadArgs,

    /// Proxy port
    #[arg(short, long, default_value_t = 80)]
    pub port: u16,

    /// Request method
    #[arg(short = 'M', long, default_value = "GET")]
    pub method: String,

    /// Request path
    #[arg(long, default_value = "/")]
    pub path: String,
}

#[derive(Args, Debug)]
pub struct CdnSslArgs {
    #[command(flatten)]
    pub sources: ProxySources,

    #[command(flatten)]
    pub payload: PayloadArgs,

    /// Proxy port
    #[arg(short, long, default_value_t = 443)]
    pub port: u16,

    /// Request method
    #[arg(short = 'M', long, default_value = "HEAD")]
    pub method: String,

    /// Request path
    #[arg(long, default_value = "[scheme][bug]")]
    pub path: String,

    /// Request scheme substituted for [scheme]
    #[arg(long, default_value = "ws://")]
    pub scheme: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn proxy_defaults() {
        let cli = Cli::parse_from(["relayscan", "proxy", "--cidr", "104.16.0.0/30", "--target", "t.example"]);
        let Commands::Proxy(args) = cli.command else {
            panic!("expected proxy");
        };
        assert_eq!(args.port, 80);
        assert_eq!(args.method, "GET");
        assert_eq!(args.path, "/");
        assert_eq!(args.payload.payload, DEFAULT_PAYLOAD);
        assert_eq!(args.sources.cidr.as_deref(), Some("104.16.0.0/30"));
        assert_eq!(cli.threads, 64);
    }

    #[test]
    fn cdn_ssl_defaults_and_globals() {
        let cli = Cli::parse_from(["relayscan", "cdn-ssl", "--proxy", "cdn.example", "-t", "8", "--stat-interval", "0", "-vv"]);
        let Commands::CdnSsl(args) = cli.command else {
            panic!("expected cdn-ssl");
        };
        assert_eq!(args.port, 443);
        assert_eq!(args.method, "HEAD");
        assert_eq!(args.path, "[scheme][bug]");
        assert_eq!(args.scheme, "ws://");
        assert_eq!(cli.threads, 8);
        assert_eq!(cli.stat_interval, 0.0);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn direct_flags() {
        let cli = Cli::parse_from(["relayscan", "direct", "-f", "hosts.txt", "-p", "80,443", "--skip", "https://x/"]);
        let Commands::Direct(args) = cli.command else {
            panic!("expected direct");
        };
        assert_eq!(args.filename, "hosts.txt");
        assert_eq!(args.port, "80,443");
        assert_eq!(args.skip.as_deref(), Some("https://x/"));
        assert_eq!(args.timeout_request, 10);
    }
}
