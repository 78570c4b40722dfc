// mcpscope-client/src/api.rs
//
// Thin client for the mcpscope HTTP service. Every call unwraps the
// `{success, data, error, message, details}` envelope.

use mcpscope_common::{AnalysisRequest, AnalysisResponse, ApiResponse, HealthStatus, McpServer, Tool};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

// Analysis may wait on the completion API, which has its own 60s budget.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid base URL '{0}'")]
    InvalidBaseUrl(String),
    #[error("could not reach mcpscope server: {0}")]
    Transport(String),
    #[error("{message} ({code}, HTTP {status}){}", details_suffix(.details))]
    Server {
        status: u16,
        code: String,
        message: String,
        details: Vec<String>,
    },
    #[error("unexpected response from server: {0}")]
    Malformed(String),
}

fn details_suffix(details: &[String]) -> String {
    if details.is_empty() {
        String::new()
    } else {
        format!(": {}", details.join("; "))
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let parsed = Url::parse(base_url).map_err(|_| ApiError::InvalidBaseUrl(base_url.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::InvalidBaseUrl(base_url.to_string()));
        }
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(ApiClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn analyze(&self, url: &str, prompt: Option<&str>) -> Result<AnalysisResponse, ApiError> {
        let request = AnalysisRequest {
            url: url.to_string(),
            prompt: prompt.map(str::to_string),
        };
        debug!("POST /analyze {}", url);
        let response = self
            .http
            .post(self.endpoint("/analyze"))
            .json(&request)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        read_envelope(response).await
    }

    pub async fn servers(&self) -> Result<Vec<McpServer>, ApiError> {
        let response = self
            .http
            .get(self.endpoint("/servers"))
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        read_envelope(response).await
    }

    pub async fn tools(&self, server_id: Option<&str>) -> Result<Vec<Tool>, ApiError> {
        let mut request = self.http.get(self.endpoint("/tools"));
        if let Some(id) = server_id {
            request = request.query(&[("serverId", id)]);
        }
        let response = request.send().await.map_err(|e| ApiError::Transport(e.to_string()))?;
        read_envelope(response).await
    }

    pub async fn health(&self) -> Result<HealthStatus, ApiError> {
        let response = self
            .http
            .get(self.endpoint("/health"))
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        read_envelope(response).await
    }
}

async fn read_envelope<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    let body = response.text().await.map_err(|e| ApiError::Transport(e.to_string()))?;

    let envelope: ApiResponse<T> = match serde_json::from_str(&body) {
        Ok(envelope) => envelope,
        Err(e) if status.is_success() => return Err(ApiError::Malformed(e.to_string())),
        Err(_) => {
            return Err(ApiError::Server {
                status: status.as_u16(),
                code: "HTTP_ERROR".to_string(),
                message: body.chars().take(200).collect(),
                details: Vec::new(),
            })
        }
    };

    match envelope {
        ApiResponse {
            success: true,
            data: Some(data),
            ..
        } => Ok(data),
        ApiResponse {
            error, message, details, ..
        } => Err(ApiError::Server {
            status: status.as_u16(),
            code: error.unwrap_or_else(|| "UNKNOWN_ERROR".to_string()),
            message: message.unwrap_or_else(|| "request failed".to_string()),
            details: details.unwrap_or_default(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn rejects_non_http_base_url() {
        assert!(matches!(ApiClient::new("ftp://x"), Err(ApiError::InvalidBaseUrl(_))));
        assert!(matches!(ApiClient::new("localhost"), Err(ApiError::InvalidBaseUrl(_))));
        assert_eq!(ApiClient::new("http://localhost:3001/").unwrap().base_url(), "http://localhost:3001");
    }

    #[tokio::test]
    async fn analyze_unwraps_success_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .and(body_json(json!({"url": "https://example.com", "prompt": "focus on search"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {"analysis": "ok", "suggestions": [], "tools": [{"id": "find", "name": "Find",
                    "description": "d", "category": "search", "action": "execute"}]}
            })))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri()).unwrap();
        let response = client.analyze("https://example.com", Some("focus on search")).await.unwrap();
        assert_eq!(response.tools[0].id, "find");
        assert!(!response.degraded);
    }

    #[tokio::test]
    async fn error_envelope_becomes_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "success": false,
                "error": "VALIDATION_ERROR",
                "message": "Invalid request",
                "details": ["URL is required"]
            })))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri()).unwrap();
        match client.analyze("", None).await {
            Err(ApiError::Server { status, code, details, .. }) => {
                assert_eq!(status, 400);
                assert_eq!(code, "VALIDATION_ERROR");
                assert_eq!(details, vec!["URL is required".to_string()]);
            }
            other => panic!("expected server error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn tools_passes_server_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tools"))
            .and(query_param("serverId", "slack"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": [{"id": "send-message", "name": "Send Message"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri()).unwrap();
        let tools = client.tools(Some("slack")).await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "Send Message");
    }

    #[tokio::test]
    async fn non_envelope_error_keeps_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri()).unwrap();
        match client.health().await {
            Err(ApiError::Server { status, message, .. }) => {
                assert_eq!(status, 502);
                assert_eq!(message, "bad gateway");
            }
            other => panic!("expected server error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unreachable_server_is_transport_error() {
        let client = ApiClient::new("http://127.0.0.1:1").unwrap();
        assert!(matches!(client.servers().await, Err(ApiError::Transport(_))));
    }
}
