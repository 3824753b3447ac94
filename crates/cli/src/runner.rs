//! Turns parsed arguments into a probe, a target list and a scan run

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use relayscan_common::{Probe, Target};
use relayscan_orchestrator::{ScanEngine, ScanOptions, ScanSummary, SummaryFormat};
use relayscan_probes::{
    DirectProbe, PayloadTemplate, PingProbe, ProxyMode, ProxyProbe, SniProbe,
};
use relayscan_target_resolver::{
    expand_cidr, parse_ports, read_host_lines, trim_to_depth, DnsCache, SystemResolver,
};

use crate::args::{CdnSslArgs, Cli, Commands, PayloadArgs, ProxyArgs, ProxySources};
use crate::output::{header, Layout};

/// Everything the engine needs for one run.
struct Plan {
    probe: Arc<dyn Probe>,
    targets: Vec<Target>,
    output: Option<String>,
    layout: Layout,
    /// Decoded payload template, shown before the scan starts.
    payload: Option<String>,
}

pub async fn run(cli: Cli) -> Result<ScanSummary> {
    let resolver = SystemResolver::from_system_conf().context("Failed to load resolver config")?;
    let dns = Arc::new(DnsCache::new(Arc::new(resolver)));

    let plan = match cli.command {
        Commands::Ping(args) => {
            let targets = read_host_lines(&args.filename)?;
            let probe = PingProbe::new(dns)
                .with_port(args.port)
                .with_timeout(Duration::from_secs(args.timeout));
            Plan {
                probe: Arc::new(probe),
                targets,
                output: args.output,
                layout: Layout::Host,
                payload: None,
            }
        }
        Commands::Direct(args) => {
            let ports = parse_ports(&args.port)?;
            let targets = read_host_lines(&args.filename)?;
            info!("Ports: {:?}", ports);
            let probe = DirectProbe::new(dns, ports)
                .with_method(&args.method)
                .with_skip_location(args.skip)
                .with_connect_timeout(Duration::from_secs(args.timeout_connect))
                .with_request_timeout(Duration::from_secs(args.timeout_request))
                .with_dns_timeout(Duration::from_secs(args.timeout_dns));
            Plan {
                probe: Arc::new(probe),
                targets,
                output: args.output,
                layout: Layout::Direct,
                payload: None,
            }
        }
        Commands::Sni(args) => {
            let targets = read_host_lines(&args.filename)?
                .iter()
                .map(|domain| trim_to_depth(domain, args.deep))
                .collect();
            let probe = SniProbe::new(dns)
                .with_connect_timeout(Duration::from_secs(args.timeout))
                .with_handshake_timeout(Duration::from_secs(args.timeout));
            Plan {
                probe: Arc::new(probe),
                targets,
                output: args.output,
                layout: Layout::Host,
                payload: None,
            }
        }
        Commands::Proxy(args) => plain_proxy_plan(dns, args)?,
        Commands::CdnSsl(args) => cdn_ssl_plan(dns, args)?,
    };

    info!("Probe: {}", plan.probe.name());
    info!("Targets: {}", plan.targets.len());
    info!("Workers: {}", cli.threads);

    let options = ScanOptions {
        output: plan.output.filter(|o| !o.is_empty()).map(PathBuf::from),
        stat_interval: stat_interval(cli.stat_interval),
        summary_format: if cli.json {
            SummaryFormat::Json
        } else {
            SummaryFormat::Text
        },
        ..ScanOptions::default()
    };
    let header_layout = (!options.live && !plan.targets.is_empty()).then_some(plan.layout);
    for line in preamble(plan.payload.as_deref(), header_layout, cli.json) {
        println!("{line}");
    }

    let engine = ScanEngine::new(cli.threads, plan.probe).with_options(options);
    engine.run(plan.targets).await
}

fn plain_proxy_plan(dns: Arc<DnsCache>, args: ProxyArgs) -> Result<Plan> {
    let targets = collect_proxies(&args.sources)?;
    let template = PayloadTemplate::new(&args.payload.payload)
        .with_method(&args.method)
        .with_path(args.path)
        .with_protocol(&args.payload.protocol);
    let preview = template.preview();
    let probe = payload_probe(dns, ProxyMode::Plain, template, args.port, &args.payload);
    Ok(Plan {
        probe: Arc::new(probe),
        targets,
        output: args.payload.output,
        layout: Layout::Proxy,
        payload: Some(preview),
    })
}

fn cdn_ssl_plan(dns: Arc<DnsCache>, args: CdnSslArgs) -> Result<Plan> {
    let targets = collect_proxies(&args.sources)?;
    let template = PayloadTemplate::new(&args.payload.payload)
        .with_method(&args.method)
        .with_path(args.path)
        .with_scheme(&args.scheme)
        .with_protocol(&args.payload.protocol);
    let preview = template.preview();
    let probe = payload_probe(dns, ProxyMode::CdnSsl, template, args.port, &args.payload);
    Ok(Plan {
        probe: Arc::new(probe),
        targets,
        output: args.payload.output,
        layout: Layout::Proxy,
        payload: Some(preview),
    })
}

fn payload_probe(
    dns: Arc<DnsCache>,
    mode: ProxyMode,
    template: PayloadTemplate,
    port: u16,
    payload: &PayloadArgs,
) -> ProxyProbe {
    let timeout = Duration::from_secs(payload.timeout);
    ProxyProbe::new(dns, mode, template)
        .with_port(port)
        .with_bug(payload.bug.clone())
        .with_target_host(&payload.target)
        .with_connect_timeout(timeout)
        .with_handshake_timeout(timeout)
}

/// Proxy list in source order: single proxy, then file, then CIDR.
fn collect_proxies(sources: &ProxySources) -> Result<Vec<Target>> {
    let mut proxies = Vec::new();
    if let Some(proxy) = sources.proxy.as_deref().filter(|p| !p.is_empty()) {
        proxies.push(proxy.to_string());
    }
    if let Some(file) = sources.filename.as_deref().filter(|f| !f.is_empty()) {
        proxies.extend(read_host_lines(file)?);
    }
    if let Some(cidr) = sources.cidr.as_deref().filter(|c| !c.is_empty()) {
        let hosts = expand_cidr(cidr)?;
        debug!("CIDR {} expanded to {} hosts", cidr, hosts.len());
        proxies.extend(hosts);
    }
    if proxies.is_empty() {
        bail!("No proxies given: use --proxy, --filename or --cidr");
    }
    Ok(proxies)
}

/// Lines printed to stdout before probing: the decoded payload and, for
/// plain output, the column header. JSON runs keep stdout for the summary.
fn preamble(payload: Option<&str>, header_layout: Option<Layout>, json: bool) -> Vec<String> {
    if json {
        if let Some(payload) = payload {
            info!("Payload: {}", payload);
        }
        return Vec::new();
    }
    let mut lines = Vec::new();
    if let Some(payload) = payload {
        lines.push(format!("Payload: {payload}"));
    }
    if let Some(layout) = header_layout {
        lines.push(header(layout));
    }
    lines
}

fn stat_interval(seconds: f64) -> Duration {
    Duration::try_from_secs_f64(seconds).unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sources(proxy: Option<&str>, filename: Option<&str>, cidr: Option<&str>) -> ProxySources {
        ProxySources {
            proxy: proxy.map(String::from),
            filename: filename.map(String::from),
            cidr: cidr.map(String::from),
        }
    }

    #[test]
    fn proxies_keep_source_order() {
        let path = std::env::temp_dir().join(format!("relayscan-proxies-{}.txt", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "a.example\n\n  b.example  ").unwrap();
        drop(file);

        let list = collect_proxies(&sources(
            Some("single.example"),
            Some(path.to_str().unwrap()),
            Some("10.0.0.0/30"),
        ))
        .unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(
            list,
            vec!["single.example", "a.example", "b.example", "10.0.0.1", "10.0.0.2"]
        );
    }

    #[test]
    fn no_proxy_source_is_an_error() {
        assert!(collect_proxies(&sources(None, None, None)).is_err());
    }

    #[test]
    fn bad_cidr_is_fatal() {
        assert!(collect_proxies(&sources(None, None, Some("10.0.0.0/33"))).is_err());
    }

    #[test]
    fn payload_is_shown_before_the_scan() {
        let lines = preamble(Some("GET / HTTP/1.1[crlf]"), None, false);
        assert_eq!(lines, vec!["Payload: GET / HTTP/1.1[crlf]".to_string()]);

        let with_header = preamble(Some("GET /"), Some(Layout::Proxy), false);
        assert_eq!(with_header.len(), 2);
        assert!(with_header[1].starts_with("PROXY"));
    }

    #[test]
    fn json_runs_keep_stdout_clean() {
        assert!(preamble(Some("GET /"), Some(Layout::Proxy), true).is_empty());
    }

    #[test]
    fn stat_interval_rejects_negative_values() {
        assert_eq!(stat_interval(-1.0), Duration::ZERO);
        assert_eq!(stat_interval(0.5), Duration::from_millis(500));
    }
}
