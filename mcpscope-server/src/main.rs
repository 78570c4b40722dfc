// mcpscope-server/src/main.rs

// --- Standard Imports ---
use axum::{
    extract::{rejection::JsonRejection, State},
    http::Uri,
    routing::{get, post},
    Json, Router,
};
use mcpscope_common::{AnalysisRequest, AnalysisResponse, ApiResponse, DeploymentMode, ValidationError};
use std::{
    error::Error,
    net::SocketAddr,
    sync::{atomic::{AtomicUsize, Ordering}, Arc},
    time::Instant,
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, Instrument};
use tracing_subscriber::EnvFilter;

// --- Local Modules ---
mod analyzer;
mod catalog;
mod completion;
mod config;
mod error;
mod health;
mod traits;

use analyzer::Analyzer;
use config::Config;
use error::ServiceError;

// --- Shared Application State ---
pub struct AppState {
    config: Config,
    analyzer: Analyzer,
    request_count: AtomicUsize,
    startup_time: Instant,
}

impl AppState {
    pub fn new(config: Config, analyzer: Analyzer) -> Self {
        AppState {
            config,
            analyzer,
            request_count: AtomicUsize::new(0),
            startup_time: Instant::now(),
        }
    }
}

// --- Main Function ---
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = Config::from_env()?;
    init_tracing(config.mode);

    let analyzer = Analyzer::from_settings(&config.completion)?;
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(
        "Starting mcpscope server v{} ({} mode, public URL {})",
        mcpscope_common::MCPSCOPE_VERSION,
        config.mode.as_str(),
        config.public_url
    );

    let app_state = Arc::new(AppState::new(config, analyzer));
    let listener = TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app(app_state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down successfully");
    Ok(())
}

fn init_tracing(mode: DeploymentMode) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(mode.default_log_filter()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

// --- Router ---
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/analyze", post(analyze_handler))
        .route("/health", get(health::get_health))
        .route("/servers", get(catalog::list_servers))
        .route("/tools", get(catalog::list_tools))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn not_found(uri: Uri) -> ServiceError {
    ServiceError::NotFound(format!("No route for {}", uri.path()))
}

// --- Graceful Shutdown Signal Handler ---
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received...");
}

// --- Analysis Handler ---
async fn analyze_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AnalysisRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<AnalysisResponse>>, ServiceError> {
    state.request_count.fetch_add(1, Ordering::SeqCst);
    // Configuration problems take precedence over anything in the request.
    state.analyzer.ensure_configured()?;

    let Json(request) =
        payload.map_err(|rejection| ValidationError::new(format!("Invalid request body: {}", rejection.body_text())))?;

    let span = tracing::info_span!("analyze", request_id = %uuid::Uuid::new_v4(), url = %request.url);
    let response = state.analyzer.analyze(&request).instrument(span).await?;
    Ok(Json(ApiResponse::ok(response)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::tests::CannedBackend;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn state_with(analyzer: Analyzer) -> Arc<AppState> {
        let config = Config::from_lookup(|_| None).unwrap();
        Arc::new(AppState::new(config, analyzer))
    }

    async fn call(state: Arc<AppState>, request: Request<Body>) -> (StatusCode, Value) {
        let response = app(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_analyze(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/analyze")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn analyze_returns_parsed_tools() {
        let backend = CannedBackend::replying(r#"Sure! {"analysis":"a shop","tools":[{"id":"buy","name":"Buy"}]}"#);
        let state = state_with(Analyzer::new(Some(backend)));
        let (status, body) = call(state, post_analyze(r#"{"url":"https://shop.example.com"}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["tools"][0]["id"], "buy");
        assert_eq!(body["data"]["tools"][0]["category"], "utility");
        assert!(body["data"].get("degraded").is_none());
    }

    #[tokio::test]
    async fn analyze_without_key_is_500_even_for_bad_input() {
        let state = state_with(Analyzer::new(None));
        let (status, body) = call(state, post_analyze("{not json")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "CONFIGURATION_ERROR");
    }

    #[tokio::test]
    async fn analyze_rejects_invalid_url() {
        let state = state_with(Analyzer::new(Some(CannedBackend::replying("{}"))));
        let (status, body) = call(state, post_analyze(r#"{"url":"   "}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "VALIDATION_ERROR");
        assert_eq!(body["details"], json!(["URL is required"]));
    }

    #[tokio::test]
    async fn analyze_rejects_malformed_body() {
        let state = state_with(Analyzer::new(Some(CannedBackend::replying("{}"))));
        let (status, body) = call(state, post_analyze(r#"{"prompt":"no url"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn analyze_maps_upstream_errors() {
        let cases: [(fn() -> ServiceError, StatusCode, &str); 4] = [
            (|| ServiceError::Authentication("x".into()), StatusCode::UNAUTHORIZED, "AUTHENTICATION_ERROR"),
            (|| ServiceError::RateLimit("x".into()), StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT_ERROR"),
            (|| ServiceError::Transport("x".into()), StatusCode::SERVICE_UNAVAILABLE, "TRANSPORT_ERROR"),
            (|| ServiceError::Model("x".into()), StatusCode::BAD_REQUEST, "MODEL_ERROR"),
        ];
        for (make, expected_status, expected_code) in cases {
            let state = state_with(Analyzer::new(Some(CannedBackend::failing(make))));
            let (status, body) = call(state, post_analyze(r#"{"url":"https://example.com"}"#)).await;
            assert_eq!(status, expected_status);
            assert_eq!(body["error"], expected_code);
            assert_eq!(body["success"], false);
        }
    }

    #[tokio::test]
    async fn health_reports_environment_and_version() {
        let state = state_with(Analyzer::new(None));
        let (status, body) = call(state.clone(), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "healthy");
        assert_eq!(body["data"]["environment"], "development");
        assert_eq!(body["data"]["version"], mcpscope_common::MCPSCOPE_VERSION);
        assert_eq!(body["data"]["requestCount"], 1);
        assert_eq!(state.request_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn servers_lists_directory() {
        let (status, body) = call(state_with(Analyzer::new(None)), get("/servers")).await;
        assert_eq!(status, StatusCode::OK);
        let servers = body["data"].as_array().unwrap();
        assert!(servers.iter().any(|s| s["id"] == "github" && s["status"] == "connected"));
    }

    #[tokio::test]
    async fn tools_filters_by_server_id() {
        let (status, body) = call(state_with(Analyzer::new(None)), get("/tools?serverId=github")).await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<&str> = body["data"].as_array().unwrap().iter().filter_map(|t| t["id"].as_str()).collect();
        assert!(ids.contains(&"search-code"));
        assert!(!ids.contains(&"send-message"));

        let (status, body) = call(state_with(Analyzer::new(None)), get("/tools?serverId=nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn malformed_tools_query_uses_envelope() {
        let (status, body) = call(state_with(Analyzer::new(None)), get("/tools?serverId=a&serverId=b")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "VALIDATION_ERROR");
        assert!(body["details"][0].as_str().unwrap().starts_with("Invalid query"));
    }

    #[tokio::test]
    async fn unknown_route_uses_envelope() {
        let (status, body) = call(state_with(Analyzer::new(None)), get("/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "NOT_FOUND");
        assert_eq!(body["message"], "No route for /nope");
    }
}
