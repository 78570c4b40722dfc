// mcpscope-server/src/config.rs
use crate::error::ServiceError;
use mcpscope_common::DeploymentMode;
use std::time::Duration;

pub const API_KEY_VAR: &str = "ANTHROPIC_API_KEY";
pub const API_BASE_VAR: &str = "ANTHROPIC_API_BASE";
pub const MODEL_VAR: &str = "MCPSCOPE_MODEL";
pub const PORT_VAR: &str = "MCPSCOPE_PORT";
pub const PUBLIC_URL_VAR: &str = "MCPSCOPE_PUBLIC_URL";

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_API_BASE: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
const DEFAULT_MAX_TOKENS: u32 = 2000;
const DEFAULT_TEMPERATURE: f64 = 0.3;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Settings for the outbound completion client.
#[derive(Debug, Clone)]
pub struct CompletionSettings {
    /// `None` leaves the server running but every analysis fails with a configuration error.
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub timeout: Duration,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        CompletionSettings {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub mode: DeploymentMode,
    pub port: u16,
    pub public_url: String,
    pub completion: CompletionSettings,
}

impl Config {
    pub fn from_env() -> Result<Self, ServiceError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ServiceError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mode = get(DeploymentMode::ENV_VAR)
            .map(|v| DeploymentMode::parse(&v))
            .unwrap_or_default();

        let port = match get(PORT_VAR) {
            Some(raw) => raw.parse::<u16>().map_err(|_| {
                ServiceError::Configuration(format!("{} must be a port number, got '{}'", PORT_VAR, raw))
            })?,
            None => DEFAULT_PORT,
        };

        let public_url = get(PUBLIC_URL_VAR)
            .unwrap_or_else(|| mode.default_public_url().to_string())
            .trim_end_matches('/')
            .to_string();

        let completion = CompletionSettings {
            api_key: get(API_KEY_VAR),
            api_base: get(API_BASE_VAR)
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: get(MODEL_VAR).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            ..CompletionSettings::default()
        };

        Ok(Config {
            mode,
            port,
            public_url,
            completion,
        })
    }
}
