// mcpscope-client/src/session.rs
//
// Interactive terminal session. User commands become `ViewState` transitions;
// analysis and execution run as spawned tasks whose results come back over an
// mpsc channel and are applied in the same loop that reads stdin.

use crate::api::{ApiClient, ApiError};
use crate::executor::ToolExecutor;
use crate::view_state::{ExecutionOutcome, ExecutionTicket, NavigationTicket, ViewPhase, ViewState};
use crate::BoxedError;
use mcpscope_common::{ServerSource, Tool};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Go { url: String, prompt: Option<String> },
    Show,
    Tools,
    Select(String),
    CloseTool,
    Set { param: String, value: String },
    Run(Option<String>),
    Tabs,
    NewTab,
    CloseTab(Option<String>),
    SwitchTab(String),
    Servers,
    Health,
    State,
    Help,
    Quit,
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<SessionCommand>, String> {
    let line = line.trim();
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };
    let arg = |usage: &str| {
        if rest.is_empty() {
            Err(format!("usage: {}", usage))
        } else {
            Ok(rest.to_string())
        }
    };

    let command = match head.to_ascii_lowercase().as_str() {
        "" => return Ok(None),
        "go" | "open" => {
            let target = arg("go <url> [extra prompt]")?;
            let (url, prompt) = match target.split_once(char::is_whitespace) {
                Some((url, prompt)) => (url.to_string(), Some(prompt.trim().to_string())),
                None => (target, None),
            };
            SessionCommand::Go { url, prompt }
        }
        "show" | "ls" => SessionCommand::Show,
        "tools" => SessionCommand::Tools,
        "select" | "use" => SessionCommand::Select(arg("select <tool-id>")?),
        "close" => SessionCommand::CloseTool,
        "set" => {
            let usage = "set <param> <value>";
            let (param, value) = rest
                .split_once(char::is_whitespace)
                .map(|(p, v)| (p.to_string(), v.trim().to_string()))
                .ok_or_else(|| format!("usage: {}", usage))?;
            SessionCommand::Set { param, value }
        }
        "run" | "exec" => SessionCommand::Run((!rest.is_empty()).then(|| rest.to_string())),
        "tabs" => SessionCommand::Tabs,
        "tab" => {
            let (sub, target) = match rest.split_once(char::is_whitespace) {
                Some((sub, target)) => (sub, Some(target.trim().to_string())),
                None => (rest, None),
            };
            match (sub, target) {
                ("new", _) => SessionCommand::NewTab,
                ("close", target) => SessionCommand::CloseTab(target),
                ("switch", Some(id)) => SessionCommand::SwitchTab(id),
                (id, None) if !id.is_empty() && id != "switch" => SessionCommand::SwitchTab(id.to_string()),
                _ => return Err("usage: tab new | tab close [id] | tab switch <id>".to_string()),
            }
        }
        "servers" => SessionCommand::Servers,
        "health" => SessionCommand::Health,
        "state" => SessionCommand::State,
        "help" | "?" => SessionCommand::Help,
        "quit" | "exit" | "q" => SessionCommand::Quit,
        other => return Err(format!("unknown command '{}' (try 'help')", other)),
    };
    Ok(Some(command))
}

/// Directory entry for well-known hosts, otherwise the server's analysis.
pub async fn resolve_source(api: &ApiClient, url: &Url, prompt: Option<&str>) -> Result<ServerSource, ApiError> {
    if let Some(source) = ServerSource::predefined_for(url) {
        debug!("{} answered from the directory", url);
        return Ok(source);
    }
    api.analyze(url.as_str(), prompt).await.map(ServerSource::Generated)
}

#[derive(Debug)]
pub enum SessionEvent {
    Analyzed {
        ticket: NavigationTicket,
        result: Result<ServerSource, String>,
    },
    Executed {
        ticket: ExecutionTicket,
        result: Result<String, String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub struct Session {
    view: ViewState,
    api: ApiClient,
    executor: Arc<dyn ToolExecutor>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl Session {
    pub fn new(api: ApiClient, executor: Arc<dyn ToolExecutor>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Session {
            view: ViewState::new(),
            api,
            executor,
            events_tx,
            events_rx,
        }
    }

    pub async fn run(mut self) -> Result<(), BoxedError> {
        println!("mcpscope interactive session (server {})", self.api.base_url());
        println!("Type 'help' for commands.\n");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    match parse_command(&line) {
                        Ok(Some(command)) => {
                            if self.handle(command).await == Flow::Quit {
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => println!("{}", e),
                    }
                }
                Some(event) = self.events_rx.recv() => self.apply(event),
            }
        }

        println!("Bye.");
        Ok(())
    }

    async fn handle(&mut self, command: SessionCommand) -> Flow {
        match command {
            SessionCommand::Go { url, prompt } => self.navigate(&url, prompt),
            SessionCommand::Show => print_view(&self.view),
            SessionCommand::Tools => match self.view.server() {
                Some(server) => print_tools(server.tools(), self.view.selected_tool().map(|t| t.id.as_str())),
                None => println!("No server connected. Use 'go <url>' first."),
            },
            SessionCommand::Select(id) => match self.view.select_tool(&id) {
                Ok(()) => {
                    if let Some(tool) = self.view.selected_tool() {
                        print_tool(tool, &self.view);
                    }
                }
                Err(e) => println!("Error: {}", e),
            },
            SessionCommand::CloseTool => self.view.close_tool(),
            SessionCommand::Set { param, value } => match self.view.set_form_value(&param, &value) {
                Ok(value) => println!("  {} = {}", param, value),
                Err(e) => println!("Error: {}", e),
            },
            SessionCommand::Run(tool_id) => self.execute(tool_id),
            SessionCommand::Tabs => print_tabs(&self.view),
            SessionCommand::NewTab => {
                let id = self.view.new_tab();
                println!("Opened {}", id);
            }
            SessionCommand::CloseTab(id) => {
                let id = id.unwrap_or_else(|| self.view.active_tab_id().to_string());
                match self.view.close_tab(&id) {
                    Ok(()) => print_tabs(&self.view),
                    Err(e) => println!("Error: {}", e),
                }
            }
            SessionCommand::SwitchTab(id) => match self.view.select_tab(&id) {
                Ok(()) => print_view(&self.view),
                Err(e) => println!("Error: {}", e),
            },
            SessionCommand::Servers => match self.api.servers().await {
                Ok(servers) => {
                    for server in servers {
                        println!("  - {} ({:?}): {}", server.name, server.status, server.description);
                        println!("    Tools: {}", server.tools.join(", "));
                    }
                }
                Err(e) => println!("Error: {}", e),
            },
            SessionCommand::Health => match self.api.health().await {
                Ok(health) => println!(
                    "  {} ({} v{}, up {}, {} requests)",
                    health.status, health.environment, health.version, health.uptime, health.request_count
                ),
                Err(e) => println!("Error: {}", e),
            },
            SessionCommand::State => match serde_json::to_string_pretty(&self.view) {
                Ok(json) => println!("{}", json),
                Err(e) => println!("Error: {}", e),
            },
            SessionCommand::Help => print_help(),
            SessionCommand::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    fn navigate(&mut self, raw: &str, prompt: Option<String>) {
        let ticket = match self.view.begin_navigation(raw) {
            Ok(ticket) => ticket,
            Err(e) => {
                println!("Error: {}", e);
                return;
            }
        };
        println!("Analyzing {} ...", ticket.url);

        let api = self.api.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = resolve_source(&api, &ticket.url, prompt.as_deref())
                .await
                .map_err(|e| e.to_string());
            let _ = tx.send(SessionEvent::Analyzed { ticket, result });
        });
    }

    fn execute(&mut self, tool_id: Option<String>) {
        let Some(tool_id) = tool_id.or_else(|| self.view.selected_tool().map(|t| t.id.clone())) else {
            println!("Error: no tool selected (use 'run <tool-id>' or 'select' first)");
            return;
        };
        let ticket = match self.view.begin_execution(&tool_id) {
            Ok(ticket) => ticket,
            Err(e) => {
                println!("Error: {}", e);
                return;
            }
        };
        println!("Executing {} ...", tool_id);

        let executor = Arc::clone(&self.executor);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = executor.execute(&ticket.tool_id, &ticket.values).await;
            let _ = tx.send(SessionEvent::Executed { ticket, result });
        });
    }

    fn apply(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Analyzed { ticket, result } => {
                let failed = result.as_ref().err().cloned();
                if !self.view.complete_navigation(&ticket, result) {
                    return;
                }
                if ticket.tab_id != self.view.active_tab_id() {
                    println!("\n[{}] analysis finished in background", ticket.tab_id);
                    return;
                }
                match failed {
                    Some(message) => println!("\nAnalysis failed: {}", message),
                    None => print_view(&self.view),
                }
            }
            SessionEvent::Executed { ticket, result } => {
                if !self.view.finish_execution(&ticket, result) {
                    debug!("Dropping result of {} from inactive {}", ticket.tool_id, ticket.tab_id);
                    return;
                }
                if let Some(outcome) = self.view.result(&ticket.tool_id) {
                    print_outcome(&ticket.tool_id, outcome);
                }
            }
        }
    }
}

// --- Rendering ---

fn print_help() {
    println!("Commands:");
    println!("  go <url> [prompt]       analyze a URL in the active tab");
    println!("  show                    current tab, server and selection");
    println!("  tools                   list the server's tools");
    println!("  select <tool-id>        open a tool form");
    println!("  set <param> <value>     fill a form field of the selected tool");
    println!("  run [tool-id]           execute (simulated) the selected or named tool");
    println!("  close                   close the tool form");
    println!("  tabs | tab new | tab close [id] | tab switch <id>");
    println!("  servers | health        query the mcpscope server");
    println!("  state                   dump the view state as JSON");
    println!("  quit");
}

fn print_view(view: &ViewState) {
    let tab = view.active_tab();
    println!("\n[{}] {}", tab.id, if tab.url.is_empty() { "(no URL)" } else { &tab.url });
    if tab.loading {
        println!("  Analyzing...");
    }
    if let Some(error) = view.last_error() {
        println!("  Last error: {}", error);
    }
    match view.server() {
        None => println!("  No server connected."),
        Some(server) => {
            println!("  Server: {}", server.display_name());
            if !server.summary().is_empty() {
                println!("  {}", server.summary());
            }
            if server.is_degraded() {
                warn!("Analysis for {} could not be parsed; showing generic tools", tab.url);
                println!("  (analysis unavailable, showing generic tools)");
            }
            print_tools(server.tools(), view.selected_tool().map(|t| t.id.as_str()));
        }
    }
    if view.phase() == ViewPhase::Executing {
        if let Some(tool_id) = &tab.executing {
            println!("  Executing {}...", tool_id);
        }
    }
    if let Some(tool) = view.selected_tool() {
        print_tool(tool, view);
    }
}

fn print_tools(tools: &[Tool], selected: Option<&str>) {
    println!("  Tools:");
    for tool in tools {
        let marker = if Some(tool.id.as_str()) == selected { "*" } else { "-" };
        println!("  {} {} [{}]: {} ({})", marker, tool.id, tool.category, tool.name, tool.description);
    }
}

fn print_tool(tool: &Tool, view: &ViewState) {
    println!("\n  {} ({}, action {})", tool.name, tool.id, tool.action);
    println!("  {}", tool.description);
    let values = view.form_values(&tool.id);
    for (name, spec) in &tool.parameters {
        let current = values
            .and_then(|v| v.get(name))
            .map(|v| v.to_string())
            .unwrap_or_else(|| "-".to_string());
        let options = spec
            .enum_values
            .as_ref()
            .map(|v| format!(" one of [{}]", v.join(", ")))
            .unwrap_or_default();
        println!(
            "    {}{} ({:?}{}): {} = {}",
            name,
            if spec.required { "*" } else { "" },
            spec.param_type,
            options,
            spec.description,
            current
        );
    }
    if let Some(outcome) = view.result(&tool.id) {
        print_outcome(&tool.id, outcome);
    }
}

fn print_outcome(tool_id: &str, outcome: &ExecutionOutcome) {
    match outcome {
        ExecutionOutcome::Success(output) => println!("\n  Result ({}): {}", tool_id, output),
        ExecutionOutcome::Failure(error) => println!("\n  Result ({}) (ERROR): {}", tool_id, error),
    }
}

fn print_tabs(view: &ViewState) {
    for tab in view.tabs() {
        let marker = if tab.is_active { "*" } else { " " };
        let state = match (&tab.analysis, tab.loading) {
            (_, true) => "loading".to_string(),
            (Some(source), false) => source.display_name(),
            (None, false) => "empty".to_string(),
        };
        println!("  {} {} {} ({})", marker, tab.id, tab.title, state);
    }
}
