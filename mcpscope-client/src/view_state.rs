// mcpscope-client/src/view_state.rs
//
// Session-local UI state: tabs, the selected tool, per-tool form data and
// execution results. Every transition is a method on `ViewState`, so the whole
// machine can be driven (and tested) without a renderer.

use mcpscope_common::{sanitize_url, validate_url, FormValues, ServerSource, Tool, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};
use url::Url;

const NEW_TAB_TITLE: &str = "New Tab";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ViewError {
    #[error(transparent)]
    InvalidUrl(#[from] ValidationError),
    #[error("no server is connected in this tab")]
    NoServer,
    #[error("unknown tool '{0}'")]
    UnknownTool(String),
    #[error("no tool is selected")]
    NoToolSelected,
    #[error("tool '{tool}' has no parameter '{param}'")]
    UnknownParameter { tool: String, param: String },
    #[error("invalid value for '{param}': {reason}")]
    InvalidValue { param: String, reason: String },
    #[error("missing required parameters: {}", .0.join(", "))]
    MissingParameters(Vec<String>),
    #[error("'{0}' is already executing in this tab")]
    ExecutionPending(String),
    #[error("unknown tab '{0}'")]
    UnknownTab(String),
}

/// Which UI the active tab should render. Derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ViewPhase {
    NoServerConnected,
    ServerConnected,
    ToolSelected,
    Executing,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub id: String,
    pub title: String,
    pub url: String,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<ServerSource>,
    #[serde(default)]
    pub loading: bool,
    /// Tool id of the execution in flight, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executing: Option<String>,
    // Bumped on every navigation so late analysis results can be recognized.
    #[serde(default)]
    navigation: u64,
}

impl Tab {
    fn blank(id: String) -> Self {
        Tab {
            id,
            title: NEW_TAB_TITLE.to_string(),
            url: String::new(),
            is_active: true,
            analysis: None,
            loading: false,
            executing: None,
            navigation: 0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "status", content = "output", rename_all = "camelCase")]
pub enum ExecutionOutcome {
    Success(String),
    Failure(String),
}

/// Handle for an analysis started by [`ViewState::begin_navigation`].
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationTicket {
    pub tab_id: String,
    pub url: Url,
    navigation: u64,
}

/// Handle for an execution started by [`ViewState::begin_execution`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionTicket {
    pub tab_id: String,
    pub tool_id: String,
    pub values: FormValues,
    navigation: u64,
}

/// Deserializing checks the tab invariants: at least one tab, exactly one
/// active, unique ids.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", try_from = "ViewStateData")]
pub struct ViewState {
    tabs: Vec<Tab>,
    next_tab: u64,
    selected_tool: Option<String>,
    form_data: BTreeMap<String, FormValues>,
    results: BTreeMap<String, ExecutionOutcome>,
    last_error: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ViewStateData {
    tabs: Vec<Tab>,
    #[serde(default)]
    next_tab: u64,
    #[serde(default)]
    selected_tool: Option<String>,
    #[serde(default)]
    form_data: BTreeMap<String, FormValues>,
    #[serde(default)]
    results: BTreeMap<String, ExecutionOutcome>,
    #[serde(default)]
    last_error: Option<String>,
}

impl TryFrom<ViewStateData> for ViewState {
    type Error = String;

    fn try_from(data: ViewStateData) -> Result<Self, Self::Error> {
        if data.tabs.is_empty() {
            return Err("view state has no tabs".to_string());
        }
        let active = data.tabs.iter().filter(|t| t.is_active).count();
        if active != 1 {
            return Err(format!("view state has {} active tabs, expected 1", active));
        }
        let mut ids = HashSet::new();
        if let Some(dup) = data.tabs.iter().find(|t| !ids.insert(t.id.as_str())) {
            return Err(format!("duplicate tab id '{}'", dup.id));
        }

        // New tab ids must not collide with restored ones.
        let highest = data
            .tabs
            .iter()
            .filter_map(|t| t.id.strip_prefix("tab-")?.parse::<u64>().ok())
            .max()
            .unwrap_or(0);

        Ok(ViewState {
            next_tab: data.next_tab.max(highest.saturating_add(1)),
            tabs: data.tabs,
            selected_tool: data.selected_tool,
            form_data: data.form_data,
            results: data.results,
            last_error: data.last_error,
        })
    }
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewState {
    pub fn new() -> Self {
        ViewState {
            tabs: vec![Tab::blank("tab-1".to_string())],
            next_tab: 2,
            selected_tool: None,
            form_data: BTreeMap::new(),
            results: BTreeMap::new(),
            last_error: None,
        }
    }

    // --- Queries ---

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn active_tab(&self) -> &Tab {
        self.tabs
            .iter()
            .find(|t| t.is_active)
            .or_else(|| self.tabs.first())
            .expect("view state always holds a tab")
    }

    pub fn active_tab_id(&self) -> &str {
        &self.active_tab().id
    }

    fn active_index(&self) -> usize {
        self.tabs.iter().position(|t| t.is_active).unwrap_or(0)
    }

    pub fn server(&self) -> Option<&ServerSource> {
        self.active_tab().analysis.as_ref()
    }

    pub fn phase(&self) -> ViewPhase {
        let tab = self.active_tab();
        match (&tab.analysis, &tab.executing, &self.selected_tool) {
            (None, _, _) => ViewPhase::NoServerConnected,
            (Some(_), Some(_), _) => ViewPhase::Executing,
            (Some(_), None, Some(_)) => ViewPhase::ToolSelected,
            (Some(_), None, None) => ViewPhase::ServerConnected,
        }
    }

    pub fn selected_tool(&self) -> Option<&Tool> {
        let id = self.selected_tool.as_deref()?;
        self.server()?.find_tool(id)
    }

    pub fn form_values(&self, tool_id: &str) -> Option<&FormValues> {
        self.form_data.get(tool_id)
    }

    pub fn result(&self, tool_id: &str) -> Option<&ExecutionOutcome> {
        self.results.get(tool_id)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    // --- Tabs ---

    fn clear_transient(&mut self) {
        self.selected_tool = None;
        self.form_data.clear();
        self.results.clear();
        self.last_error = None;
    }

    fn activate(&mut self, index: usize) {
        for (i, tab) in self.tabs.iter_mut().enumerate() {
            tab.is_active = i == index;
        }
    }

    /// Open a blank tab and make it active. Returns its id.
    pub fn new_tab(&mut self) -> String {
        let id = format!("tab-{}", self.next_tab);
        self.next_tab += 1;
        self.tabs.push(Tab::blank(id.clone()));
        let index = self.tabs.len() - 1;
        self.activate(index);
        self.clear_transient();
        debug!("Opened {}", id);
        id
    }

    pub fn select_tab(&mut self, id: &str) -> Result<(), ViewError> {
        let index = self
            .tabs
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| ViewError::UnknownTab(id.to_string()))?;
        if index != self.active_index() {
            self.activate(index);
            self.clear_transient();
        }
        Ok(())
    }

    /// Close a tab. Closing the last remaining tab does nothing; closing the
    /// active tab activates its left neighbour (or the new first tab).
    pub fn close_tab(&mut self, id: &str) -> Result<(), ViewError> {
        let index = self
            .tabs
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| ViewError::UnknownTab(id.to_string()))?;
        if self.tabs.len() == 1 {
            return Ok(());
        }

        let removed = self.tabs.remove(index);
        if removed.is_active {
            self.activate(index.saturating_sub(1));
            self.clear_transient();
        }
        debug!("Closed {}", removed.id);
        Ok(())
    }

    // --- Navigation ---

    /// Sanitize and validate `raw`, point the active tab at it and mark it
    /// loading. The caller runs the analysis and reports back through
    /// [`ViewState::complete_navigation`].
    pub fn begin_navigation(&mut self, raw: &str) -> Result<NavigationTicket, ViewError> {
        let sanitized = sanitize_url(raw);
        let url = match validate_url(&sanitized) {
            Ok(url) => url,
            Err(e) => {
                self.last_error = Some(e.to_string());
                return Err(e.into());
            }
        };

        self.clear_transient();
        let index = self.active_index();
        let tab = &mut self.tabs[index];
        tab.url = sanitized;
        tab.title = url.host_str().unwrap_or(NEW_TAB_TITLE).to_string();
        tab.analysis = None;
        tab.loading = true;
        // An execution against the previous server no longer has a slot here.
        tab.executing = None;
        tab.navigation += 1;
        info!("{} navigating to {}", tab.id, tab.url);

        Ok(NavigationTicket {
            tab_id: tab.id.clone(),
            url,
            navigation: tab.navigation,
        })
    }

    /// Apply an analysis result. Returns false when the tab was closed or has
    /// navigated elsewhere in the meantime, in which case nothing changes.
    pub fn complete_navigation(&mut self, ticket: &NavigationTicket, result: Result<ServerSource, String>) -> bool {
        let Some(index) = self
            .tabs
            .iter()
            .position(|t| t.id == ticket.tab_id && t.navigation == ticket.navigation)
        else {
            debug!("Discarding stale analysis for {}", ticket.tab_id);
            return false;
        };

        let is_active = self.tabs[index].is_active;
        let tab = &mut self.tabs[index];
        tab.loading = false;
        match result {
            Ok(source) => {
                tab.analysis = Some(source);
                if is_active {
                    self.last_error = None;
                }
            }
            Err(message) => {
                if is_active {
                    self.last_error = Some(message);
                }
            }
        }
        true
    }

    // --- Tools ---

    pub fn select_tool(&mut self, id: &str) -> Result<(), ViewError> {
        let server = self.server().ok_or(ViewError::NoServer)?;
        if server.find_tool(id).is_none() {
            return Err(ViewError::UnknownTool(id.to_string()));
        }
        self.selected_tool = Some(id.to_string());
        Ok(())
    }

    pub fn close_tool(&mut self) {
        self.selected_tool = None;
    }

    /// Store a form value for the selected tool, coerced by its parameter spec.
    /// Tools without declared parameters accept any field as a string.
    pub fn set_form_value(&mut self, param: &str, raw: &str) -> Result<Value, ViewError> {
        let tool = self.selected_tool().ok_or(ViewError::NoToolSelected)?;
        let value = match tool.parameters.get(param) {
            Some(spec) => spec.coerce(raw).map_err(|reason| ViewError::InvalidValue {
                param: param.to_string(),
                reason,
            })?,
            None if tool.parameters.is_empty() => Value::String(raw.to_string()),
            None => {
                return Err(ViewError::UnknownParameter {
                    tool: tool.id.clone(),
                    param: param.to_string(),
                })
            }
        };

        let tool_id = tool.id.clone();
        self.form_data
            .entry(tool_id)
            .or_default()
            .insert(param.to_string(), value.clone());
        Ok(value)
    }

    // --- Execution ---

    /// Claim the active tab's execution slot for `tool_id`. Only one execution
    /// may be in flight per tab.
    pub fn begin_execution(&mut self, tool_id: &str) -> Result<ExecutionTicket, ViewError> {
        let server = self.server().ok_or(ViewError::NoServer)?;
        let tool = server
            .find_tool(tool_id)
            .ok_or_else(|| ViewError::UnknownTool(tool_id.to_string()))?;

        if let Some(pending) = &self.active_tab().executing {
            return Err(ViewError::ExecutionPending(pending.clone()));
        }

        let values = self.form_data.get(tool_id).cloned().unwrap_or_default();
        let missing = tool.missing_required(&values);
        if !missing.is_empty() {
            return Err(ViewError::MissingParameters(missing));
        }

        let index = self.active_index();
        let tab = &mut self.tabs[index];
        tab.executing = Some(tool_id.to_string());
        info!("{} executing {}", tab.id, tool_id);

        Ok(ExecutionTicket {
            tab_id: tab.id.clone(),
            tool_id: tool_id.to_string(),
            values,
            navigation: tab.navigation,
        })
    }

    /// Release the execution slot and record the outcome under the tool's key.
    /// The outcome is dropped if the tab is gone, no longer active, or has
    /// navigated since the execution began.
    pub fn finish_execution(&mut self, ticket: &ExecutionTicket, result: Result<String, String>) -> bool {
        let Some(tab) = self
            .tabs
            .iter_mut()
            .find(|t| t.id == ticket.tab_id && t.navigation == ticket.navigation)
        else {
            debug!("Discarding stale result of {} for {}", ticket.tool_id, ticket.tab_id);
            return false;
        };
        if tab.executing.as_deref() == Some(ticket.tool_id.as_str()) {
            tab.executing = None;
        }
        if !tab.is_active {
            return false;
        }

        let outcome = match result {
            Ok(output) => ExecutionOutcome::Success(output),
            Err(error) => ExecutionOutcome::Failure(error),
        };
        self.results.insert(ticket.tool_id.clone(), outcome);
        true
    }
}
