use std::{sync::Arc, time::Duration};

use anyhow::Result;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{info, warn};

use crate::{
    enrich::{EnrichClient, HostIntel},
    netmap::NetworkMap,
    ports,
    report::ScanReport,
    scanner::{self, SharedProgress},
};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<RwLock<ServerState>>, // shared mutable state for progress/results
    enrich: Option<EnrichClient>,
}

#[derive(Debug)]
struct ServerState {
    status: Status,
    report: Option<ScanReport>,
    intel: Option<HostIntel>,
    progress: Option<SharedProgress>,
    cancel: Option<CancellationToken>,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct Status {
    pub total: u64,
    pub scanned: u64,
    pub open: u64,
    pub state: String, // "idle" | "running" | "done"
}

/// Inbound scan request from the UI. `ports` is the textual port spec
/// ("22,80,8000-8100").
#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub target: String,
    #[serde(default)]
    pub ports: Option<String>,
    #[serde(default)]
    pub concurrency: Option<usize>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

pub async fn spawn_server(bind: &str, enrich: Option<EnrichClient>) -> Result<()> {
    let state = AppState {
        inner: Arc::new(RwLock::new(ServerState {
            status: Status {
                total: 0,
                scanned: 0,
                open: 0,
                state: "idle".into(),
            },
            report: None,
            intel: None,
            progress: None,
            cancel: None,
        })),
        enrich,
    };

    let api = Router::new()
        .route("/status", get(get_status))
        .route("/scan", post(post_scan))
        .route("/cancel", post(post_cancel))
        .route("/report", get(get_report))
        .route("/report/csv", get(get_report_csv))
        .route("/netmap", get(get_netmap))
        .route("/intel", get(get_intel))
        .with_state(state.clone());

    let static_svc = ServeDir::new("ui").append_index_html_on_directories(true);

    let app = Router::new()
        .nest("/api", api)
        .fallback_service(static_svc)
        .layer(TraceLayer::new_for_http());

    info!("serving UI on http://{bind}");
    axum::serve(tokio::net::TcpListener::bind(bind).await?, app).await?;
    Ok(())
}

async fn get_status(State(app): State<AppState>) -> impl IntoResponse {
    let s = app.inner.read().await;
    let (scanned, open) = if let Some(p) = s.progress.as_ref() {
        (
            p.completed.load(std::sync::atomic::Ordering::Relaxed),
            p.open_count.load(std::sync::atomic::Ordering::Relaxed),
        )
    } else {
        (s.status.scanned, s.status.open)
    };
    let out = Status {
        total: s.status.total,
        scanned,
        open,
        state: s.status.state.clone(),
    };
    (StatusCode::OK, Json(out))
}

async fn get_report(State(app): State<AppState>) -> impl IntoResponse {
    let s = app.inner.read().await;
    if let Some(report) = s.report.as_ref() {
        (StatusCode::OK, Json(report.clone())).into_response()
    } else {
        StatusCode::NO_CONTENT.into_response()
    }
}

async fn get_report_csv(State(app): State<AppState>) -> impl IntoResponse {
    let s = app.inner.read().await;
    let Some(report) = s.report.as_ref() else {
        return StatusCode::NO_CONTENT.into_response();
    };
    let mut buf = Vec::new();
    match report.write_csv(&mut buf) {
        Ok(()) => ([(header::CONTENT_TYPE, "text/csv")], buf).into_response(),
        Err(e) => {
            warn!("csv export failed: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn get_netmap(State(app): State<AppState>) -> impl IntoResponse {
    let s = app.inner.read().await;
    if let Some(report) = s.report.as_ref() {
        let map = NetworkMap::layout(&report.target, &report.open_ports, report.risk_tier);
        (StatusCode::OK, Json(map)).into_response()
    } else {
        StatusCode::NO_CONTENT.into_response()
    }
}

async fn get_intel(State(app): State<AppState>) -> impl IntoResponse {
    let s = app.inner.read().await;
    if let Some(intel) = s.intel.as_ref() {
        (StatusCode::OK, Json(intel.clone())).into_response()
    } else {
        StatusCode::NO_CONTENT.into_response()
    }
}

async fn post_cancel(State(app): State<AppState>) -> impl IntoResponse {
    let s = app.inner.read().await;
    if let Some(cancel) = s.cancel.as_ref() {
        cancel.cancel();
        StatusCode::ACCEPTED
    } else {
        StatusCode::CONFLICT
    }
}

async fn post_scan(State(app): State<AppState>, Json(req): Json<ScanRequest>) -> impl IntoResponse {
    let spec = req.ports.as_deref().unwrap_or("1-1024");
    let port_list = match ports::parse_port_spec(spec) {
        Ok(v) => v,
        Err(e) => return (StatusCode::BAD_REQUEST, format!("invalid ports: {e}")).into_response(),
    };

    let total = port_list.len() as u64;
    let concurrency = req.concurrency.unwrap_or(scanner::DEFAULT_CONCURRENCY);
    let timeout = Duration::from_millis(req.timeout_ms.unwrap_or(scanner::DEFAULT_TIMEOUT_MS));
    let target = req.target;

    // Prepare shared progress and cancel token
    let progress = SharedProgress::new();
    let cancel = CancellationToken::new();

    // Update state
    {
        let mut s = app.inner.write().await;
        // Cancel any existing scan
        if let Some(c) = s.cancel.take() {
            c.cancel();
        }
        s.status = Status {
            total,
            scanned: 0,
            open: 0,
            state: "running".into(),
        };
        s.report = None;
        s.intel = None;
        s.progress = Some(progress.clone());
        s.cancel = Some(cancel.clone());
    }

    // Spawn scan task
    let app2 = app.clone();
    tokio::spawn(async move {
        let started_at = OffsetDateTime::now_utc();
        let res = scanner::scan_with_shared(
            &target,
            &port_list,
            concurrency,
            timeout,
            cancel.clone(),
            progress.clone(),
        )
        .await;
        let finished_at = OffsetDateTime::now_utc();

        let report = match res {
            Ok(results) => {
                // Cancellation can leave a partial sequence; the report covers
                // only the ports actually attempted.
                let attempted: Vec<u16> = results.iter().map(|r| r.port).collect();
                if attempted.is_empty() {
                    None
                } else {
                    match ScanReport::build(&target, attempted, &results, started_at, finished_at) {
                        Ok(report) => Some(report),
                        Err(e) => {
                            warn!("report build failed: {e}");
                            None
                        }
                    }
                }
            }
            Err(e) => {
                warn!("scan of {target} failed: {e}");
                None
            }
        };

        {
            let mut s = app2.inner.write().await;
            match report.as_ref() {
                Some(r) => {
                    s.status.scanned = r.ports_scanned.len() as u64;
                    s.status.open = r.open_ports.len() as u64;
                    s.status.state = "done".into();
                }
                None => {
                    s.status.state = "idle".into();
                }
            }
            s.report = report.clone();
            s.progress = None;
            s.cancel = None;
        }

        // Post-scan enrichment; failures stay local and never touch the report.
        if let (Some(client), Some(report)) = (app2.enrich.as_ref(), report) {
            match scanner::resolve_target(&report.target).await {
                Ok(ip) => match client.lookup(ip).await {
                    Ok(intel) => {
                        app2.inner.write().await.intel = Some(intel);
                    }
                    Err(e) => warn!("enrichment lookup for {ip} failed: {e}"),
                },
                Err(e) => warn!("enrichment skipped: {e}"),
            }
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(Status {
            total,
            scanned: 0,
            open: 0,
            state: "running".into(),
        }),
    )
        .into_response()
}
