use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use portpulse::enrich::{EnrichClient, HostIntel};
use portpulse::report::ScanReport;
use portpulse::types::{ProbeResult, ProgressEvent};
use portpulse::{ports, scanner, server};

/// portpulse — Async TCP connect port scanner with risk classification and a tiny embedded web UI.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "portpulse",
    version,
    about = "Async TCP connect port scanner with risk classification and a tiny embedded web UI.",
    long_about = None
)]
struct Cli {
    /// Target host: IP address or hostname.
    target: Option<String>,

    /// Ports to scan: comma-separated singles and inclusive ranges (e.g. "22,80,8000-8100").
    #[arg(long, default_value = "1-1024")]
    ports: String,

    /// Max concurrent TCP connect attempts.
    #[arg(long, default_value_t = scanner::DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Socket connect timeout in milliseconds.
    #[arg(long = "timeout-ms", default_value_t = scanner::DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,

    /// Write the scan report as pretty JSON to this path (optional).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Write the open ports as CSV to this path (optional).
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Start the embedded HTTP UI server instead of a one-shot scan.
    #[arg(long = "serve-ui", default_value_t = false)]
    serve_ui: bool,

    /// Bind address for the UI server.
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let enrich = enrich_client_from_env()?;

    if cli.serve_ui {
        println!("UI starting at http://{} (Ctrl+C to stop)", cli.bind);
        return server::spawn_server(&cli.bind, enrich).await;
    }

    let Some(target) = cli.target.clone() else {
        bail!("no target given (pass a host, or --serve-ui for the web UI)");
    };
    let port_list = ports::parse_port_spec(&cli.ports)?;

    println!("portpulse configuration:");
    println!("  target       : {target}");
    println!("  ports        : {} ({} total)", cli.ports, port_list.len());
    println!("  concurrency  : {}", cli.concurrency);
    println!("  timeout_ms   : {}", cli.timeout_ms);

    // Ctrl-C requests cancellation; in-flight probes drain and we keep the
    // partial results.
    let cancel = CancellationToken::new();
    let cancel_ctrlc = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        cancel_ctrlc.cancel();
    });

    let progress: scanner::ProgressFn = Arc::new(|ev: ProgressEvent| {
        eprint!(
            "\rscanning port {:<5} ({}/{})",
            ev.current_port, ev.completed, ev.total
        );
        if ev.completed == ev.total {
            eprintln!();
        }
    });

    let started_at = OffsetDateTime::now_utc();
    let results = scanner::scan_with_progress(
        &target,
        &port_list,
        cli.concurrency,
        Duration::from_millis(cli.timeout_ms),
        cancel.clone(),
        progress,
    )
    .await?;
    let finished_at = OffsetDateTime::now_utc();

    let attempted: Vec<u16> = results.iter().map(|r| r.port).collect();
    if attempted.is_empty() {
        println!("\nscan cancelled before any port was probed");
        return Ok(());
    }
    if cancel.is_cancelled() {
        eprintln!();
        println!(
            "scan cancelled after {} of {} ports",
            attempted.len(),
            port_list.len()
        );
    }

    let report = ScanReport::build(&target, attempted, &results, started_at, finished_at)?;
    print_report(&report, &results);

    if let Some(path) = cli.output.as_deref() {
        let file = File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        match report.write_json(file) {
            Ok(()) => println!("Wrote JSON report to {}", path.display()),
            Err(e) => warn!("failed to write JSON to {}: {e}", path.display()),
        }
    }
    if let Some(path) = cli.csv.as_deref() {
        let file = File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        match report.write_csv(file) {
            Ok(()) => println!("Wrote CSV report to {}", path.display()),
            Err(e) => warn!("failed to write CSV to {}: {e}", path.display()),
        }
    }

    // Optional intelligence lookup; a failure here is a warning, the report
    // above stands either way.
    if let Some(client) = enrich {
        match scanner::resolve_target(&target).await {
            Ok(ip) => match client.lookup(ip).await {
                Ok(intel) => print_intel(&intel),
                Err(e) => warn!("enrichment lookup for {ip} failed: {e}"),
            },
            Err(e) => warn!("enrichment skipped: {e}"),
        }
    }

    Ok(())
}

/// Build an enrichment client from CENSYS_API_ID / CENSYS_API_SECRET, if both
/// are set.
fn enrich_client_from_env() -> Result<Option<EnrichClient>> {
    match (
        std::env::var("CENSYS_API_ID"),
        std::env::var("CENSYS_API_SECRET"),
    ) {
        (Ok(id), Ok(secret)) if !id.is_empty() && !secret.is_empty() => {
            Ok(Some(EnrichClient::new(id, secret)?))
        }
        _ => Ok(None),
    }
}

fn print_report(report: &ScanReport, results: &[ProbeResult]) {
    let port_w = 5usize.max("port".len());
    let state_w = 6usize.max("state".len());
    let lat_w = 10usize.max("elapsed_ms".len());

    println!(
        "\nOpen ports: {} (scanned: {})",
        report.open_ports.len(),
        report.ports_scanned.len()
    );
    println!(
        "{:>port_w$}  {:<state_w$}  {:>lat_w$}",
        "port",
        "state",
        "elapsed_ms",
        port_w = port_w,
        state_w = state_w,
        lat_w = lat_w
    );
    println!(
        "{:-<port_w$}  {:-<state_w$}  {:-<lat_w$}",
        "",
        "",
        "",
        port_w = port_w,
        state_w = state_w,
        lat_w = lat_w
    );
    for r in results.iter().filter(|r| r.open) {
        println!(
            "{:>port_w$}  {:<state_w$}  {:>lat_w$}",
            r.port,
            "open",
            r.elapsed_ms,
            port_w = port_w,
            state_w = state_w,
            lat_w = lat_w
        );
    }

    println!(
        "\nScan of {} finished in {} ms, overall risk: {}",
        report.target,
        report.duration_ms,
        report.risk_tier.label()
    );
}

fn print_intel(intel: &HostIntel) {
    println!("\nHost intelligence for {}:", intel.ip);
    if let (Some(city), Some(country)) = (&intel.location.city, &intel.location.country) {
        println!("  location : {city} ({country})");
    }
    println!("  services : {}", intel.services.len());
    for svc in &intel.services {
        println!(
            "  port {:<5} {} | {}",
            svc.port,
            svc.service_name.as_deref().unwrap_or("unknown"),
            svc.transport_protocol.as_deref().unwrap_or("")
        );
    }
}
