// mcpscope-client/src/main.rs
use clap::{Parser, Subcommand};
use mcpscope_common::{sanitize_url, validate_url, DeploymentMode, ServerSource};
use std::error::Error;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod api;
mod executor;
mod session;
mod view_state;

use api::ApiClient;
use executor::SimulatedExecutor;
use session::{resolve_source, Session};

const PUBLIC_URL_VAR: &str = "MCPSCOPE_PUBLIC_URL";

type BoxedError = Box<dyn Error + Send + Sync>;

#[derive(Parser)]
#[command(author, version, about = "Explore the tools a URL might expose", long_about = None)]
struct Cli {
    /// mcpscope server base URL (defaults to MCPSCOPE_PUBLIC_URL, then the deployment default)
    #[arg(short = 'u', long)]
    base_url: Option<String>,
    /// Log at the deployment mode's level instead of warnings only
    #[arg(short, long)]
    verbose: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a URL once and print its tools
    Analyze {
        url: String,
        /// Extra context appended to the analysis prompt
        #[arg(short, long)]
        prompt: Option<String>,
        /// Print the raw JSON result
        #[arg(long)]
        json: bool,
    },
    /// List the mock servers
    Servers,
    /// List directory tools, optionally for one server
    Tools {
        #[arg(short, long)]
        server_id: Option<String>,
    },
    /// Check server health
    Health,
    /// Interactive session with tabs (default)
    Interactive,
}

fn resolve_base_url(flag: Option<String>, env_value: Option<String>, mode: DeploymentMode) -> String {
    let clean = |value: Option<String>| value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    clean(flag)
        .or_else(|| clean(env_value))
        .unwrap_or_else(|| mode.default_public_url().to_string())
}

fn init_tracing(mode: DeploymentMode, verbose: bool) {
    let fallback = if verbose { mode.default_log_filter() } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), BoxedError> {
    let cli = Cli::parse();
    let mode = std::env::var(DeploymentMode::ENV_VAR)
        .map(|v| DeploymentMode::parse(&v))
        .unwrap_or_default();
    init_tracing(mode, cli.verbose);

    let base_url = resolve_base_url(cli.base_url, std::env::var(PUBLIC_URL_VAR).ok(), mode);
    let api = ApiClient::new(&base_url)?;

    match cli.command.unwrap_or(Commands::Interactive) {
        Commands::Analyze { url, prompt, json } => {
            let url = validate_url(&sanitize_url(&url))?;
            let source = resolve_source(&api, &url, prompt.as_deref()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&source)?);
            } else {
                print_source(&url, &source);
            }
        }
        Commands::Servers => {
            for server in api.servers().await? {
                println!("{} ({:?})", server.id, server.status);
                println!("  {}: {}", server.name, server.description);
                println!("  Tools: {}", server.tools.join(", "));
            }
        }
        Commands::Tools { server_id } => {
            for tool in api.tools(server_id.as_deref()).await? {
                println!("  - {} [{}]: {}", tool.id, tool.category, tool.description);
            }
        }
        Commands::Health => {
            let health = api.health().await?;
            println!("Status: {}", health.status);
            println!("Environment: {}", health.environment);
            println!("Version: {}", health.version);
            println!("Uptime: {}", health.uptime);
            println!("Requests: {}", health.request_count);
        }
        Commands::Interactive => {
            Session::new(api, Arc::new(SimulatedExecutor::default())).run().await?;
        }
    }
    Ok(())
}

fn print_source(url: &url::Url, source: &ServerSource) {
    let origin = match source {
        ServerSource::Predefined(_) => "directory",
        ServerSource::Generated(_) => "analysis",
    };
    println!("{} ({}, from {})", source.display_name(), url, origin);
    if !source.summary().is_empty() {
        println!("{}", source.summary());
    }
    if source.is_degraded() {
        println!("Warning: analysis could not be parsed; showing generic tools.");
    }
    if let ServerSource::Generated(response) = source {
        for suggestion in &response.suggestions {
            println!("  * {}", suggestion);
        }
    }
    println!("\nTools:");
    for tool in source.tools() {
        println!("  - {} [{}]: {}", tool.id, tool.category, tool.description);
        for (name, spec) in &tool.parameters {
            println!("      {}{}: {}", name, if spec.required { "*" } else { "" }, spec.description);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_prefers_flag_then_env_then_mode() {
        let prod = DeploymentMode::Production;
        assert_eq!(
            resolve_base_url(Some("http://a:1".into()), Some("http://b:2".into()), prod),
            "http://a:1"
        );
        assert_eq!(resolve_base_url(None, Some("http://b:2".into()), prod), "http://b:2");
        assert_eq!(resolve_base_url(None, Some("  ".into()), prod), "https://api.mcpscope.dev");
        assert_eq!(resolve_base_url(Some(" ".into()), Some("http://b:2".into()), prod), "http://b:2");
        assert_eq!(resolve_base_url(Some("".into()), None, prod), "https://api.mcpscope.dev");
        assert_eq!(
            resolve_base_url(None, None, DeploymentMode::Development),
            "http://localhost:3001"
        );
    }

    #[test]
    fn cli_defaults_to_interactive() {
        let cli = Cli::try_parse_from(["mcpscope-client"]).unwrap();
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from(["mcpscope-client", "-u", "http://x:1", "tools", "--server-id", "slack"]).unwrap();
        assert_eq!(cli.base_url.as_deref(), Some("http://x:1"));
        assert!(matches!(cli.command, Some(Commands::Tools { server_id: Some(ref id) }) if id == "slack"));
    }
}
