// mcpscope-common/src/lib.rs
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// Define modules
pub mod analysis;
pub mod directory;
pub mod validation;

// Re-export for convenience
pub use analysis::{build_analysis_prompt, fallback_response, normalize_tools, parse_analysis};
pub use directory::{all_entries, lookup_domain, ServerSource, StaticEntry};
pub use validation::{sanitize_url, validate_url, ValidationError};

pub const MCPSCOPE_VERSION: &str = env!("CARGO_PKG_VERSION");

// --- Deployment Mode ---

/// Deployment mode shared by server and client. Only log verbosity and the
/// client's default base URL depend on it.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    #[default]
    Development,
    Production,
}

impl DeploymentMode {
    pub const ENV_VAR: &'static str = "MCPSCOPE_ENV";

    /// Unknown values fall back to development.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => DeploymentMode::Production,
            _ => DeploymentMode::Development,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentMode::Development => "development",
            DeploymentMode::Production => "production",
        }
    }

    /// Default `tracing` filter when `RUST_LOG` is not set.
    pub fn default_log_filter(&self) -> &'static str {
        match self {
            DeploymentMode::Development => "debug",
            DeploymentMode::Production => "info",
        }
    }

    pub fn default_public_url(&self) -> &'static str {
        match self {
            DeploymentMode::Development => "http://localhost:3001",
            DeploymentMode::Production => "https://api.mcpscope.dev",
        }
    }
}

// --- Analysis ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Normalized result of analysing one URL.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    #[serde(default)]
    pub analysis: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub tools: Vec<Tool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Set when the completion could not be parsed and canned tools were substituted.
    #[serde(default, skip_serializing_if = "is_false")]
    pub degraded: bool,
}

// --- Tools ---

/// Form values for one tool, keyed by parameter name.
pub type FormValues = BTreeMap<String, Value>;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub action: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, ParamSpec>,
}

impl Tool {
    /// Names of required parameters that have no value (or an empty string) in `values`.
    pub fn missing_required(&self, values: &FormValues) -> Vec<String> {
        self.parameters
            .iter()
            .filter(|(_, spec)| spec.required)
            .filter(|(name, _)| match values.get(name.as_str()) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.trim().is_empty(),
                Some(_) => false,
            })
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// Unknown spellings deserialize as `String` through [`ParamType::parse`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum ParamType {
    #[default]
    String,
    Text,
    Boolean,
    Number,
    Enum,
}

impl From<String> for ParamType {
    fn from(value: String) -> Self {
        ParamType::parse(&value)
    }
}

impl ParamType {
    /// Lenient parse used on model output; JSON-schema spellings map onto the fixed set.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" | "textarea" => ParamType::Text,
            "boolean" | "bool" => ParamType::Boolean,
            "number" | "integer" | "float" => ParamType::Number,
            "enum" | "select" => ParamType::Enum,
            _ => ParamType::String,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ParamSpec {
    #[serde(rename = "type", default)]
    pub param_type: ParamType,
    #[serde(default)]
    pub required: bool,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(default)]
    pub description: String,
}

impl ParamSpec {
    pub fn new(param_type: ParamType, required: bool, description: &str) -> Self {
        ParamSpec {
            param_type,
            required,
            enum_values: None,
            description: description.to_string(),
        }
    }

    pub fn one_of(values: &[&str], required: bool, description: &str) -> Self {
        ParamSpec {
            param_type: ParamType::Enum,
            required,
            enum_values: Some(values.iter().map(|v| v.to_string()).collect()),
            description: description.to_string(),
        }
    }

    /// Turn raw form input into a typed JSON value.
    pub fn coerce(&self, raw: &str) -> Result<Value, String> {
        let trimmed = raw.trim();
        match self.param_type {
            ParamType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(Value::Bool(true)),
                "false" | "no" | "off" | "0" => Ok(Value::Bool(false)),
                other => Err(format!("'{}' is not a boolean (use true/false)", other)),
            },
            ParamType::Number => match trimmed.parse::<i64>() {
                Ok(integer) => Ok(Value::from(integer)),
                Err(_) => trimmed
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| format!("'{}' is not a number", trimmed)),
            },
            ParamType::Enum => {
                let allowed = self.enum_values.as_deref().unwrap_or_default();
                if allowed.is_empty() || allowed.iter().any(|v| v == trimmed) {
                    Ok(Value::String(trimmed.to_string()))
                } else {
                    Err(format!("'{}' must be one of: {}", trimmed, allowed.join(", ")))
                }
            }
            ParamType::String | ParamType::Text => Ok(Value::String(raw.to_string())),
        }
    }
}

// --- Mock Server Listing ---

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Connected,
    Disconnected,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct McpServer {
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: ServerStatus,
    /// Ids of the tools this server exposes.
    pub tools: Vec<String>,
}

// --- Health ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: String,
    pub environment: String,
    pub version: String,
    #[serde(default)]
    pub uptime_secs: u64,
    #[serde(default)]
    pub uptime: String,
    #[serde(default)]
    pub request_count: usize,
}

// --- Response Envelope ---

/// Wrapper for every HTTP response body: `{success, data?, error?, message?, details?}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
            message: None,
            details: None,
        }
    }

    pub fn failure(error: impl Into<String>, message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(error.into()),
            message: Some(message.into()),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        if !details.is_empty() {
            self.details = Some(details);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn param_type_accepts_schema_spellings() {
        assert_eq!(ParamType::parse("integer"), ParamType::Number);
        assert_eq!(ParamType::parse("BOOL"), ParamType::Boolean);
        assert_eq!(ParamType::parse("select"), ParamType::Enum);
        assert_eq!(ParamType::parse("object"), ParamType::String);
    }

    #[test]
    fn unknown_param_type_deserializes_as_string() {
        let spec: ParamSpec = serde_json::from_value(json!({"type": "object", "required": true})).unwrap();
        assert_eq!(spec.param_type, ParamType::String);
        assert!(spec.required);
    }

    #[test]
    fn coerce_checks_type() {
        let flag = ParamSpec::new(ParamType::Boolean, false, "");
        assert_eq!(flag.coerce("yes").unwrap(), json!(true));
        assert!(flag.coerce("maybe").is_err());

        let count = ParamSpec::new(ParamType::Number, false, "");
        assert!(count.coerce("forty").is_err());

        let visibility = ParamSpec::one_of(&["public", "private"], true, "");
        assert_eq!(visibility.coerce("private").unwrap(), json!("private"));
        assert!(visibility.coerce("internal").unwrap_err().contains("public, private"));
    }

    #[test]
    fn integers_stay_integers() {
        let count = ParamSpec::new(ParamType::Number, false, "");
        assert_eq!(count.coerce(" 42 ").unwrap(), json!(42));
        assert_eq!(count.coerce("-7").unwrap().to_string(), "-7");
        assert_eq!(count.coerce("2.5").unwrap(), json!(2.5));
        assert!(count.coerce("NaN").is_err());
    }

    #[test]
    fn known_param_types_round_trip() {
        for kind in [ParamType::String, ParamType::Text, ParamType::Boolean, ParamType::Number, ParamType::Enum] {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(serde_json::from_value::<ParamType>(json).unwrap(), kind);
        }
        assert_eq!(serde_json::from_value::<ParamType>(json!("integer")).unwrap(), ParamType::Number);
    }

    #[test]
    fn missing_required_ignores_optional_and_filled() {
        let mut tool = Tool {
            id: "create-repo".into(),
            ..Default::default()
        };
        tool.parameters.insert("name".into(), ParamSpec::new(ParamType::String, true, ""));
        tool.parameters.insert("private".into(), ParamSpec::new(ParamType::Boolean, false, ""));

        let mut values = FormValues::new();
        assert_eq!(tool.missing_required(&values), vec!["name".to_string()]);
        values.insert("name".into(), json!("   "));
        assert_eq!(tool.missing_required(&values), vec!["name".to_string()]);
        values.insert("name".into(), json!("demo"));
        assert!(tool.missing_required(&values).is_empty());
    }

    #[test]
    fn envelope_omits_absent_fields() {
        let ok = serde_json::to_value(ApiResponse::ok(json!({"a": 1}))).unwrap();
        assert_eq!(ok, json!({"success": true, "data": {"a": 1}}));

        let err: ApiResponse<()> =
            ApiResponse::failure("VALIDATION_ERROR", "bad url").with_details(vec!["URL is required".into()]);
        let err = serde_json::to_value(err).unwrap();
        assert_eq!(err["success"], json!(false));
        assert_eq!(err["details"], json!(["URL is required"]));
        assert!(err.get("data").is_none());
    }

    #[test]
    fn degraded_flag_only_serialized_when_set() {
        let normal = serde_json::to_value(AnalysisResponse::default()).unwrap();
        assert!(normal.get("degraded").is_none());
        let degraded = AnalysisResponse {
            degraded: true,
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(degraded).unwrap()["degraded"], json!(true));
    }

    #[test]
    fn deployment_mode_defaults_to_development() {
        assert_eq!(DeploymentMode::parse("PRODUCTION"), DeploymentMode::Production);
        assert_eq!(DeploymentMode::parse("staging"), DeploymentMode::Development);
        assert_eq!(DeploymentMode::Production.default_log_filter(), "info");
    }
}
