// mcpscope-server/src/health.rs
use axum::{extract::State, Json};
use mcpscope_common::{ApiResponse, HealthStatus, MCPSCOPE_VERSION};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::AppState;

// Format uptime in a human-readable way
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    format!(
        "{}d {}h {}m {}s",
        secs / 86400,
        (secs % 86400) / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}

pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthStatus>> {
    let request_count = state.request_count.fetch_add(1, Ordering::SeqCst) + 1;
    let uptime = state.startup_time.elapsed();

    Json(ApiResponse::ok(HealthStatus {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        environment: state.config.mode.as_str().to_string(),
        version: MCPSCOPE_VERSION.to_string(),
        uptime_secs: uptime.as_secs(),
        uptime: format_uptime(uptime),
        request_count,
    }))
}
