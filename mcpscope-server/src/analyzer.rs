// mcpscope-server/src/analyzer.rs
use crate::completion::AnthropicBackend;
use crate::config::CompletionSettings;
use crate::error::ServiceError;
use crate::traits::CompletionBackend;
use mcpscope_common::{
    build_analysis_prompt, parse_analysis, validate_url, AnalysisRequest, AnalysisResponse, ServerSource,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Runs one analysis: configuration check, URL validation, directory
/// short-circuit, then prompt → completion → parse.
pub struct Analyzer {
    backend: Option<Arc<dyn CompletionBackend>>,
}

impl Analyzer {
    pub fn new(backend: Option<Arc<dyn CompletionBackend>>) -> Self {
        Analyzer { backend }
    }

    /// A missing API key is not fatal at startup; it surfaces per request.
    pub fn from_settings(settings: &CompletionSettings) -> Result<Self, ServiceError> {
        match settings.api_key {
            Some(_) => {
                let backend: Arc<dyn CompletionBackend> = Arc::new(AnthropicBackend::new(settings)?);
                Ok(Analyzer::new(Some(backend)))
            }
            None => {
                warn!("No completion API key configured; /analyze will answer with a configuration error");
                Ok(Analyzer::new(None))
            }
        }
    }

    pub fn ensure_configured(&self) -> Result<&Arc<dyn CompletionBackend>, ServiceError> {
        self.backend
            .as_ref()
            .ok_or_else(|| ServiceError::Configuration("completion API key is not set".to_string()))
    }

    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResponse, ServiceError> {
        let backend = self.ensure_configured()?;
        let url = validate_url(&request.url)?;

        if let Some(ServerSource::Predefined(entry)) = ServerSource::predefined_for(&url) {
            info!("{} is in the predefined directory ({}); skipping completion", url, entry.id);
            return Ok(entry.to_analysis());
        }

        let prompt = build_analysis_prompt(request.url.trim(), request.prompt.as_deref());
        info!("Requesting analysis of {} from model {}", url, backend.model());
        let completion = backend.complete(&prompt).await?;

        let mut response = parse_analysis(&completion);
        if response.degraded {
            warn!("Analysis of {} fell back to generic tools", url);
        }
        if response.domain.is_none() {
            response.domain = url.host_str().map(str::to_string);
        }
        Ok(response)
    }
}
