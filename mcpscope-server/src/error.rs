// mcpscope-server/src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mcpscope_common::{ApiResponse, ValidationError};
use tracing::{error, warn};

/// Every failure a handler can report, from most to least severe.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Completion credential missing or server misconfigured. Never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The completion API rejected our credential.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The completion API is throttling us.
    #[error("rate limit exceeded: {0}")]
    RateLimit(String),

    /// Network failure, timeout or an unavailable upstream.
    #[error("transport error: {0}")]
    Transport(String),

    /// The completion API rejected the request shape or model.
    #[error("model error: {0}")]
    Model(String),

    /// Malformed input; no network call was made.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("not found: {0}")]
    NotFound(String),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ServiceError::RateLimit(_) => StatusCode::TOO_MANY_REQUESTS,
            ServiceError::Transport(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Model(_) | ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    /// Stable code placed in the envelope's `error` field.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Configuration(_) => "CONFIGURATION_ERROR",
            ServiceError::Authentication(_) => "AUTHENTICATION_ERROR",
            ServiceError::RateLimit(_) => "RATE_LIMIT_ERROR",
            ServiceError::Transport(_) => "TRANSPORT_ERROR",
            ServiceError::Model(_) => "MODEL_ERROR",
            ServiceError::Validation(_) => "VALIDATION_ERROR",
            ServiceError::NotFound(_) => "NOT_FOUND",
        }
    }

    /// Message shown to the end user.
    pub fn user_message(&self) -> String {
        match self {
            ServiceError::Configuration(_) => {
                "The analysis service is not configured. Contact the administrator.".to_string()
            }
            ServiceError::Authentication(_) => {
                "The analysis service could not authenticate with the AI provider.".to_string()
            }
            ServiceError::RateLimit(_) => {
                "Too many analysis requests. Please slow down and try again shortly.".to_string()
            }
            ServiceError::Transport(_) => {
                "The AI provider could not be reached. Please try again.".to_string()
            }
            ServiceError::Model(detail) => format!("The AI provider rejected the request: {}", detail),
            ServiceError::Validation(_) => "The request is not valid.".to_string(),
            ServiceError::NotFound(detail) => detail.clone(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed ({}): {}", status, self);
        } else {
            warn!("Request rejected ({}): {}", status, self);
        }

        let details = match &self {
            ServiceError::Validation(e) => e.messages.clone(),
            _ => Vec::new(),
        };
        let body: ApiResponse<()> = ApiResponse::failure(self.code(), self.user_message()).with_details(details);
        (status, Json(body)).into_response()
    }
}
