use axum::{extract::State, Json};
use serde::Serialize;

use crate::http::server::AppState;
use crate::lifecycle::{run_scheduled, JobReport, ScheduledJob};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub upstreams: UpstreamSummary,
}

#[derive(Serialize)]
pub struct UpstreamSummary {
    pub source_control: String,
    pub registry: String,
    pub directory: Option<String>,
}

#[derive(Serialize)]
pub struct RateLimitSummary {
    pub tracked_clients: usize,
    pub max_entries: usize,
    pub limit: u32,
    pub window_secs: u64,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let gateway = &state.gateway;
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: gateway.started_at.elapsed().as_secs(),
        upstreams: UpstreamSummary {
            source_control: gateway.source_control.upstream().to_string(),
            registry: gateway.registry.upstream().to_string(),
            directory: gateway.config.directory.api_base.clone(),
        },
    })
}

pub async fn get_rate_limits(State(state): State<AppState>) -> Json<RateLimitSummary> {
    let limiter = &state.gateway.limiter;
    Json(RateLimitSummary {
        tracked_clients: limiter.tracked_clients(),
        max_entries: limiter.max_entries(),
        limit: limiter.limit(),
        window_secs: limiter.window().as_secs(),
    })
}

pub async fn sweep_rate_limits(State(state): State<AppState>) -> Json<JobReport> {
    let report = run_scheduled(ScheduledJob::SweepRateLimits, &state.gateway);
    tracing::info!(evicted = report.affected, "Rate-limit sweep requested via admin API");
    Json(report)
}
