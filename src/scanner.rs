use crate::types::{ProbeResult, ProgressEvent};
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Default cap on concurrent connect attempts.
pub const DEFAULT_CONCURRENCY: usize = 50;
/// Default per-probe connect timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 500;

const MAX_CONCURRENCY: usize = 5_000;

/// Fatal scan failures. Per-port connect failures are never errors; they are
/// the normal "closed" outcome folded into the result sequence.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to resolve target {target:?}: {reason}")]
    Resolution { target: String, reason: String },
}

/// Callback invoked on the scanning path once per completed probe. Must be
/// cheap; it runs inside worker tasks.
pub type ProgressFn = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Live counters shared with a caller that polls progress (e.g. the web UI).
#[derive(Clone, Debug, Default)]
pub struct SharedProgress {
    pub completed: Arc<AtomicU64>,
    pub open_count: Arc<AtomicU64>,
}

impl SharedProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Resolve a target string to an IP address. IP literals short-circuit;
/// hostnames go through one DNS lookup up front, before any probing.
pub async fn resolve_target(target: &str) -> Result<IpAddr, ScanError> {
    if let Ok(ip) = target.parse::<IpAddr>() {
        return Ok(ip);
    }
    let mut addrs = tokio::net::lookup_host((target, 0u16))
        .await
        .map_err(|e| ScanError::Resolution {
            target: target.to_string(),
            reason: e.to_string(),
        })?;
    addrs
        .next()
        .map(|sa| sa.ip())
        .ok_or_else(|| ScanError::Resolution {
            target: target.to_string(),
            reason: "lookup returned no addresses".to_string(),
        })
}

/// Probe `ports` on `target` with asynchronous TCP connects and a concurrency
/// limit.
///
/// - Limits concurrent socket attempts with a `Semaphore`; each worker owns
///   one socket for the lifetime of one probe and drops it before taking the
///   next port.
/// - Bounds connect time per socket with `tokio::time::timeout`; no retries.
/// - Returns results in original port order regardless of completion order.
pub async fn scan(
    target: &str,
    ports: &[u16],
    concurrency: usize,
    timeout: Duration,
) -> Result<Vec<ProbeResult>, ScanError> {
    scan_internal(target, ports, concurrency, timeout, None, None, None).await
}

/// Variant that accepts a `CancellationToken`. After cancellation no new
/// probes are scheduled; in-flight probes finish or hit their timeout, and the
/// partial (still ordered) result sequence is returned without error.
pub async fn scan_with_cancel(
    target: &str,
    ports: &[u16],
    concurrency: usize,
    timeout: Duration,
    cancel: CancellationToken,
) -> Result<Vec<ProbeResult>, ScanError> {
    scan_internal(target, ports, concurrency, timeout, Some(cancel), None, None).await
}

/// Variant that reports each completed probe through `on_progress`.
pub async fn scan_with_progress(
    target: &str,
    ports: &[u16],
    concurrency: usize,
    timeout: Duration,
    cancel: CancellationToken,
    on_progress: ProgressFn,
) -> Result<Vec<ProbeResult>, ScanError> {
    scan_internal(
        target,
        ports,
        concurrency,
        timeout,
        Some(cancel),
        Some(on_progress),
        None,
    )
    .await
}

/// Variant that additionally updates `SharedProgress` counters, for callers
/// that poll instead of subscribing.
pub async fn scan_with_shared(
    target: &str,
    ports: &[u16],
    concurrency: usize,
    timeout: Duration,
    cancel: CancellationToken,
    shared: SharedProgress,
) -> Result<Vec<ProbeResult>, ScanError> {
    scan_internal(
        target,
        ports,
        concurrency,
        timeout,
        Some(cancel),
        None,
        Some(shared),
    )
    .await
}

async fn scan_internal(
    target: &str,
    ports: &[u16],
    concurrency: usize,
    timeout: Duration,
    cancel_opt: Option<CancellationToken>,
    progress_opt: Option<ProgressFn>,
    shared_opt: Option<SharedProgress>,
) -> Result<Vec<ProbeResult>, ScanError> {
    if ports.is_empty() {
        return Ok(Vec::new());
    }

    let ip = resolve_target(target).await?;
    let total = ports.len() as u64;
    let shared = shared_opt.unwrap_or_default();
    let cancel = cancel_opt.unwrap_or_default();

    let sem = Arc::new(Semaphore::new(concurrency.clamp(1, MAX_CONCURRENCY)));
    let mut set: JoinSet<Option<(usize, ProbeResult)>> = JoinSet::new();

    for (idx, &port) in ports.iter().enumerate() {
        if cancel.is_cancelled() {
            debug!("cancellation requested, {} of {} ports scheduled", idx, total);
            break;
        }
        let permit = sem
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore in scope");
        let shared = shared.clone();
        let on_progress = progress_opt.clone();
        let cancel = cancel.clone();

        set.spawn(async move {
            let _permit = permit; // keep permit until the probe completes

            if cancel.is_cancelled() {
                return None;
            }

            let addr = SocketAddr::new(ip, port);
            let start = Instant::now();
            // Refused, unreachable, or timed out all mean "closed" here; only
            // a completed connect within the timeout counts as open.
            let open = matches!(
                time::timeout(timeout, TcpStream::connect(addr)).await,
                Ok(Ok(_))
            );
            let elapsed_ms = start.elapsed().as_millis() as u64;

            let completed = shared.completed.fetch_add(1, Ordering::Relaxed) + 1;
            if open {
                shared.open_count.fetch_add(1, Ordering::Relaxed);
            }
            if let Some(cb) = &on_progress {
                cb(ProgressEvent {
                    completed,
                    total,
                    current_port: port,
                });
            }

            Some((idx, ProbeResult { port, open, elapsed_ms }))
        });
    }

    let mut tagged: Vec<(usize, ProbeResult)> = Vec::with_capacity(ports.len());
    while let Some(joined) = set.join_next().await {
        if let Ok(Some(pair)) = joined {
            tagged.push(pair);
        }
    }
    // Workers complete in arbitrary order; reassemble the original sequence.
    tagged.sort_unstable_by_key(|(idx, _)| *idx);
    Ok(tagged.into_iter().map(|(_, result)| result).collect())
}
