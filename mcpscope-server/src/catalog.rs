// mcpscope-server/src/catalog.rs
//
// Static server/tool listings backed by the predefined directory.

use crate::error::ServiceError;
use crate::AppState;
use axum::extract::{rejection::QueryRejection, Query, State};
use axum::Json;
use mcpscope_common::{all_entries, ApiResponse, McpServer, Tool, ValidationError};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsQuery {
    pub server_id: Option<String>,
}

pub async fn list_servers(State(state): State<Arc<AppState>>) -> Json<ApiResponse<Vec<McpServer>>> {
    state.request_count.fetch_add(1, Ordering::SeqCst);
    let servers: Vec<McpServer> = all_entries().iter().map(|e| e.to_server()).collect();
    info!("Listing {} servers", servers.len());
    Json(ApiResponse::ok(servers))
}

pub async fn list_tools(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ToolsQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<Tool>>>, ServiceError> {
    state.request_count.fetch_add(1, Ordering::SeqCst);
    let Query(query) =
        query.map_err(|rejection| ValidationError::new(format!("Invalid query: {}", rejection.body_text())))?;
    let tools = tools_for(query.server_id.as_deref())?;
    info!("Listing {} tools (server: {})", tools.len(), query.server_id.as_deref().unwrap_or("all"));
    Ok(Json(ApiResponse::ok(tools)))
}

/// Tools allowed for `server_id`, or every directory tool (first occurrence of each id) when `None`.
pub fn tools_for(server_id: Option<&str>) -> Result<Vec<Tool>, ServiceError> {
    let entries = all_entries();
    match server_id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => entries
            .into_iter()
            .find(|entry| entry.id == id)
            .map(|entry| entry.tools)
            .ok_or_else(|| ServiceError::NotFound(format!("Unknown server '{}'", id))),
        None => {
            let mut seen = HashSet::new();
            Ok(entries
                .into_iter()
                .flat_map(|entry| entry.tools)
                .filter(|tool| seen.insert(tool.id.clone()))
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_filter_uses_allowlist() {
        let ids: Vec<String> = tools_for(Some("slack")).unwrap().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["send-message", "list-channels", "search-messages"]);
    }

    #[test]
    fn unknown_server_is_not_found() {
        assert!(matches!(tools_for(Some("myspace")), Err(ServiceError::NotFound(_))));
    }

    #[test]
    fn unfiltered_listing_is_deduplicated() {
        let tools = tools_for(None).unwrap();
        let unique: HashSet<&str> = tools.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(unique.len(), tools.len());
        assert!(unique.contains("create-repo"));
        assert!(unique.contains("create-page"));
        // blank filter behaves like no filter
        assert_eq!(tools_for(Some("  ")).unwrap().len(), tools.len());
    }
}
