// mcpscope-common/src/analysis.rs
//
// Prompt construction for the completion API and the tolerant parser that
// turns whatever the model answers into a renderable `AnalysisResponse`.

use crate::{AnalysisResponse, ParamSpec, ParamType, Tool};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

pub const DEFAULT_DESCRIPTION: &str = "No description available";
pub const DEFAULT_CATEGORY: &str = "utility";
pub const DEFAULT_ACTION: &str = "execute";

lazy_static! {
    static ref FENCED_BLOCK: Regex =
        Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)```").expect("static fence pattern");
}

// --- Prompt ---

/// Build the single prompt sent to the completion API for `url`.
pub fn build_analysis_prompt(url: &str, extra: Option<&str>) -> String {
    let mut prompt = format!(
        r#"Analyze the web service at {url} and describe the tools (operations) an MCP server for it would most plausibly expose.

1. Classify the domain and the kind of service it is.
2. Propose the authentication method a client would need (for example "OAuth 2.0", "API key", "none").
3. Propose 3 to 8 SPECIFIC tools. Use concrete kebab-case identifiers such as "create-repo" or "send-message", never generic categories such as "api" or "data". Give every tool a name, a one-sentence description, a category, an action verb and its input parameters.
4. Respond with exactly one JSON object and nothing else, matching this schema:

{{
  "analysis": "short description of the service",
  "serviceName": "string",
  "serviceType": "string",
  "authMethod": "string",
  "baseUrl": "string",
  "suggestions": ["string"],
  "tools": [
    {{
      "id": "kebab-case-id",
      "name": "Human Name",
      "description": "what the tool does",
      "category": "string",
      "action": "create | read | update | delete | search | execute",
      "parameters": {{
        "paramName": {{ "type": "string | text | boolean | number | enum", "required": true, "enum": ["only for enum"], "description": "string" }}
      }}
    }}
  ]
}}"#
    );

    if let Some(extra) = extra.map(str::trim).filter(|e| !e.is_empty()) {
        prompt.push_str("\n\nAdditional context from the user:\n");
        prompt.push_str(extra);
    }
    prompt
}

// --- Parsing ---

/// Parse a completion into an `AnalysisResponse`. Never fails: output that
/// yields no usable object is replaced by [`fallback_response`].
pub fn parse_analysis(completion: &str) -> AnalysisResponse {
    match extract_analysis_object(completion) {
        Some(object) => {
            let mut response = response_from_object(&object);
            response.tools = normalize_tools(response.tools);
            response
        }
        None => {
            warn!(
                "Completion did not contain a usable analysis object ({} chars); substituting fallback tools",
                completion.len()
            );
            fallback_response()
        }
    }
}

/// Try whole-string, fenced-block, then first-`{`-to-last-`}` extraction.
pub fn extract_analysis_object(text: &str) -> Option<Map<String, Value>> {
    let trimmed = text.trim();

    let mut candidates: Vec<(&str, &str)> = vec![("whole", trimmed)];
    if let Some(body) = FENCED_BLOCK.captures(trimmed).and_then(|c| c.get(1)) {
        candidates.push(("fenced", body.as_str()));
    }
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            candidates.push(("brace-span", &trimmed[start..=end]));
        }
    }

    candidates.into_iter().find_map(|(strategy, candidate)| {
        let object = parse_candidate(candidate)?;
        debug!("Extracted analysis object using {} strategy", strategy);
        Some(object)
    })
}

// An object only counts if it carries at least one tool.
fn parse_candidate(candidate: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(candidate.trim()) {
        Ok(Value::Object(object)) => {
            let has_tools = object
                .get("tools")
                .and_then(Value::as_array)
                .map_or(false, |tools| !tools.is_empty());
            has_tools.then_some(object)
        }
        _ => None,
    }
}

fn response_from_object(object: &Map<String, Value>) -> AnalysisResponse {
    let tools = object
        .get("tools")
        .and_then(Value::as_array)
        .map(|tools| tools.iter().map(tool_from_value).collect())
        .unwrap_or_default();

    let suggestions = object
        .get("suggestions")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(scalar_string).collect())
        .unwrap_or_default();

    AnalysisResponse {
        analysis: field(object, &["analysis", "summary"]).unwrap_or_default(),
        suggestions,
        tools,
        service_name: field(object, &["serviceName", "service_name"]),
        service_type: field(object, &["serviceType", "service_type"]),
        auth_method: field(object, &["authMethod", "auth_method"]),
        base_url: field(object, &["baseUrl", "base_url"]),
        domain: field(object, &["domain"]),
        degraded: false,
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn field(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| object.get(*key).and_then(scalar_string))
}

fn tool_from_value(value: &Value) -> Tool {
    let empty = Map::new();
    let object = value.as_object().unwrap_or(&empty);
    Tool {
        id: field(object, &["id"]).unwrap_or_default(),
        name: field(object, &["name", "title"]).unwrap_or_default(),
        description: field(object, &["description"]).unwrap_or_default(),
        category: field(object, &["category"]).unwrap_or_default(),
        action: field(object, &["action"]).unwrap_or_default(),
        parameters: object.get("parameters").map(parameters_from_value).unwrap_or_default(),
    }
}

// Accepts either `{name: spec}` or a JSON-schema object with `properties`/`required`.
fn parameters_from_value(value: &Value) -> BTreeMap<String, ParamSpec> {
    let Some(object) = value.as_object() else {
        return BTreeMap::new();
    };

    let (properties, required_list) = match object.get("properties").and_then(Value::as_object) {
        Some(properties) => {
            let required: HashSet<&str> = object
                .get("required")
                .and_then(Value::as_array)
                .map(|r| r.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            (properties, required)
        }
        None => (object, HashSet::new()),
    };

    properties
        .iter()
        .map(|(name, spec)| {
            let mut param = param_from_value(spec);
            param.required |= required_list.contains(name.as_str());
            (name.clone(), param)
        })
        .collect()
}

fn param_from_value(value: &Value) -> ParamSpec {
    match value {
        Value::String(kind) => ParamSpec::new(ParamType::parse(kind), false, ""),
        Value::Object(spec) => {
            let enum_values: Option<Vec<String>> = spec
                .get("enum")
                .and_then(Value::as_array)
                .map(|values| values.iter().filter_map(scalar_string).collect())
                .filter(|values: &Vec<String>| !values.is_empty());
            let param_type = match spec.get("type").and_then(Value::as_str) {
                Some(kind) => ParamType::parse(kind),
                None if enum_values.is_some() => ParamType::Enum,
                None => ParamType::String,
            };
            ParamSpec {
                param_type,
                required: spec.get("required").and_then(Value::as_bool).unwrap_or(false),
                enum_values,
                description: field(spec, &["description"]).unwrap_or_default(),
            }
        }
        _ => ParamSpec::default(),
    }
}

// --- Normalization ---

/// Fill every missing tool field with its default and make ids unique.
/// Idempotent: a normalized list is returned unchanged.
pub fn normalize_tools(tools: Vec<Tool>) -> Vec<Tool> {
    let mut seen: HashSet<String> = HashSet::new();

    tools
        .into_iter()
        .enumerate()
        .map(|(index, mut tool)| {
            if tool.id.trim().is_empty() {
                tool.id = format!("tool-{}", index);
            }
            while seen.contains(&tool.id) {
                tool.id = format!("{}-{}", tool.id, index);
            }
            seen.insert(tool.id.clone());

            if tool.name.trim().is_empty() {
                tool.name = format!("Tool {}", index + 1);
            }
            if tool.description.trim().is_empty() {
                tool.description = DEFAULT_DESCRIPTION.to_string();
            }
            if tool.category.trim().is_empty() {
                tool.category = DEFAULT_CATEGORY.to_string();
            }
            if tool.action.trim().is_empty() {
                tool.action = DEFAULT_ACTION.to_string();
            }
            tool
        })
        .collect()
}

// --- Fallback ---

/// Canned response substituted when the completion cannot be parsed.
pub fn fallback_response() -> AnalysisResponse {
    let tools = vec![
        Tool {
            id: "navigate".into(),
            name: "Navigate".into(),
            description: "Open a page on the target site".into(),
            category: "navigation".into(),
            action: "navigate".into(),
            parameters: BTreeMap::from([(
                "url".to_string(),
                ParamSpec::new(ParamType::String, true, "Page URL to open"),
            )]),
        },
        Tool {
            id: "extract-text".into(),
            name: "Extract Text".into(),
            description: "Extract the readable text content of the current page".into(),
            category: "content".into(),
            action: "read".into(),
            parameters: BTreeMap::from([(
                "selector".to_string(),
                ParamSpec::new(ParamType::String, false, "CSS selector to limit extraction"),
            )]),
        },
        Tool {
            id: "analyze-structure".into(),
            name: "Analyze Structure".into(),
            description: "Summarize the page layout, forms and links".into(),
            category: "analysis".into(),
            action: "analyze".into(),
            parameters: BTreeMap::from([(
                "depth".to_string(),
                ParamSpec::one_of(&["shallow", "full"], false, "How deep to inspect the DOM"),
            )]),
        },
    ];

    AnalysisResponse {
        analysis: "The service could not be analyzed automatically. Generic browsing tools are shown instead.".into(),
        suggestions: vec![
            "Try again with a more specific URL".into(),
            "Add a prompt describing what the service does".into(),
        ],
        tools,
        service_name: None,
        service_type: Some("website".into()),
        auth_method: Some("none".into()),
        base_url: None,
        domain: None,
        degraded: true,
    }
}
