// mcpscope-common/src/directory.rs
use crate::{AnalysisResponse, McpServer, ParamSpec, ParamType, ServerStatus, Tool};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// A well-known service whose tools are fixed and never need the completion API.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StaticEntry {
    pub id: String,
    pub name: String,
    pub domain: String,
    pub description: String,
    pub service_type: String,
    pub auth_method: String,
    pub base_url: String,
    pub tools: Vec<Tool>,
}

impl StaticEntry {
    /// `host` matches the entry's domain itself or any of its subdomains.
    pub fn matches_host(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        host == self.domain || host.ends_with(&format!(".{}", self.domain))
    }

    pub fn tool_ids(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.id.clone()).collect()
    }

    pub fn to_server(&self) -> McpServer {
        McpServer {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            status: ServerStatus::Connected,
            tools: self.tool_ids(),
        }
    }

    pub fn to_analysis(&self) -> AnalysisResponse {
        AnalysisResponse {
            analysis: self.description.clone(),
            suggestions: vec![format!("Authenticate with {} before running write operations", self.auth_method)],
            tools: self.tools.clone(),
            service_name: Some(self.name.clone()),
            service_type: Some(self.service_type.clone()),
            auth_method: Some(self.auth_method.clone()),
            base_url: Some(self.base_url.clone()),
            domain: Some(self.domain.clone()),
            degraded: false,
        }
    }
}

/// Where a tab's tool list came from.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "source", content = "data", rename_all = "camelCase")]
pub enum ServerSource {
    Predefined(StaticEntry),
    Generated(AnalysisResponse),
}

impl ServerSource {
    /// Directory entry for the URL's host, if it has one.
    pub fn predefined_for(url: &Url) -> Option<ServerSource> {
        url.host_str().and_then(lookup_domain).map(ServerSource::Predefined)
    }

    pub fn tools(&self) -> &[Tool] {
        match self {
            ServerSource::Predefined(entry) => &entry.tools,
            ServerSource::Generated(response) => &response.tools,
        }
    }

    pub fn find_tool(&self, id: &str) -> Option<&Tool> {
        self.tools().iter().find(|t| t.id == id)
    }

    pub fn display_name(&self) -> String {
        match self {
            ServerSource::Predefined(entry) => entry.name.clone(),
            ServerSource::Generated(response) => response
                .service_name
                .clone()
                .or_else(|| response.domain.clone())
                .unwrap_or_else(|| "Generated server".to_string()),
        }
    }

    pub fn summary(&self) -> &str {
        match self {
            ServerSource::Predefined(entry) => &entry.description,
            ServerSource::Generated(response) => &response.analysis,
        }
    }

    pub fn is_degraded(&self) -> bool {
        match self {
            ServerSource::Predefined(_) => false,
            ServerSource::Generated(response) => response.degraded,
        }
    }
}

/// Find the directory entry whose domain covers `host`.
pub fn lookup_domain(host: &str) -> Option<StaticEntry> {
    all_entries().into_iter().find(|entry| entry.matches_host(host))
}

fn param(param_type: ParamType, required: bool, description: &str) -> ParamSpec {
    ParamSpec::new(param_type, required, description)
}

fn tool(
    id: &str,
    name: &str,
    description: &str,
    category: &str,
    action: &str,
    parameters: Vec<(&str, ParamSpec)>,
) -> Tool {
    Tool {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        category: category.to_string(),
        action: action.to_string(),
        parameters: parameters
            .into_iter()
            .map(|(n, p)| (n.to_string(), p))
            .collect::<BTreeMap<_, _>>(),
    }
}

/// Every built-in directory entry, in listing order.
pub fn all_entries() -> Vec<StaticEntry> {
    vec![github(), slack(), stripe(), notion()]
}

fn github() -> StaticEntry {
    StaticEntry {
        id: "github".into(),
        name: "GitHub".into(),
        domain: "github.com".into(),
        description: "Code hosting platform for version control and collaboration".into(),
        service_type: "developer-platform".into(),
        auth_method: "OAuth 2.0 / personal access token".into(),
        base_url: "https://api.github.com".into(),
        tools: vec![
            tool("create-repo", "Create Repository", "Create a new repository for the authenticated user", "repositories", "create", vec![
                ("name", param(ParamType::String, true, "Repository name")),
                ("description", param(ParamType::Text, false, "Short description")),
                ("private", param(ParamType::Boolean, false, "Create as a private repository")),
            ]),
            tool("list-repos", "List Repositories", "List repositories for a user or organization", "repositories", "read", vec![
                ("owner", param(ParamType::String, true, "User or organization login")),
                ("sort", ParamSpec::one_of(&["created", "updated", "pushed", "full_name"], false, "Sort field")),
            ]),
            tool("search-code", "Search Code", "Search source code across public repositories", "search", "search", vec![
                ("query", param(ParamType::String, true, "Search terms and qualifiers")),
                ("language", param(ParamType::String, false, "Restrict to a language")),
            ]),
            tool("create-issue", "Create Issue", "Open an issue in a repository", "issues", "create", vec![
                ("repo", param(ParamType::String, true, "owner/name of the repository")),
                ("title", param(ParamType::String, true, "Issue title")),
                ("body", param(ParamType::Text, false, "Issue body in Markdown")),
            ]),
            tool("list-pull-requests", "List Pull Requests", "List pull requests of a repository", "pull-requests", "read", vec![
                ("repo", param(ParamType::String, true, "owner/name of the repository")),
                ("state", ParamSpec::one_of(&["open", "closed", "all"], false, "Filter by state")),
            ]),
        ],
    }
}

fn slack() -> StaticEntry {
    StaticEntry {
        id: "slack".into(),
        name: "Slack".into(),
        domain: "slack.com".into(),
        description: "Team messaging workspace with channels and direct messages".into(),
        service_type: "communication".into(),
        auth_method: "OAuth 2.0 bot token".into(),
        base_url: "https://slack.com/api".into(),
        tools: vec![
            tool("send-message", "Send Message", "Post a message to a channel", "messaging", "create", vec![
                ("channel", param(ParamType::String, true, "Channel id or name")),
                ("text", param(ParamType::Text, true, "Message text")),
            ]),
            tool("list-channels", "List Channels", "List channels in the workspace", "channels", "read", vec![
                ("include_archived", param(ParamType::Boolean, false, "Include archived channels")),
            ]),
            tool("search-messages", "Search Messages", "Search messages across channels", "search", "search", vec![
                ("query", param(ParamType::String, true, "Search terms")),
                ("count", param(ParamType::Number, false, "Maximum results")),
            ]),
        ],
    }
}

fn stripe() -> StaticEntry {
    StaticEntry {
        id: "stripe".into(),
        name: "Stripe".into(),
        domain: "stripe.com".into(),
        description: "Online payment processing for internet businesses".into(),
        service_type: "payments".into(),
        auth_method: "API key (secret key)".into(),
        base_url: "https://api.stripe.com/v1".into(),
        tools: vec![
            tool("create-payment-intent", "Create Payment Intent", "Start collecting a payment from a customer", "payments", "create", vec![
                ("amount", param(ParamType::Number, true, "Amount in the smallest currency unit")),
                ("currency", ParamSpec::one_of(&["usd", "eur", "gbp"], true, "Three-letter currency code")),
            ]),
            tool("list-customers", "List Customers", "List customers, newest first", "customers", "read", vec![
                ("email", param(ParamType::String, false, "Filter by email address")),
                ("limit", param(ParamType::Number, false, "Page size")),
            ]),
            tool("create-refund", "Create Refund", "Refund a charge in full or in part", "payments", "create", vec![
                ("charge", param(ParamType::String, true, "Charge id")),
                ("amount", param(ParamType::Number, false, "Partial amount to refund")),
            ]),
        ],
    }
}

fn notion() -> StaticEntry {
    StaticEntry {
        id: "notion".into(),
        name: "Notion".into(),
        domain: "notion.so".into(),
        description: "Workspace for notes, documents and databases".into(),
        service_type: "productivity".into(),
        auth_method: "OAuth 2.0 / integration token".into(),
        base_url: "https://api.notion.com/v1".into(),
        tools: vec![
            tool("create-page", "Create Page", "Create a page under a parent page or database", "pages", "create", vec![
                ("parent_id", param(ParamType::String, true, "Parent page or database id")),
                ("title", param(ParamType::String, true, "Page title")),
                ("content", param(ParamType::Text, false, "Initial page content")),
            ]),
            tool("query-database", "Query Database", "Query rows of a database with an optional filter", "databases", "read", vec![
                ("database_id", param(ParamType::String, true, "Database id")),
                ("filter", param(ParamType::Text, false, "Filter expression as JSON")),
            ]),
            tool("search-pages", "Search Pages", "Search pages and databases by title", "search", "search", vec![
                ("query", param(ParamType::String, true, "Search terms")),
            ]),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{normalize_tools, sanitize_url, validate_url};
    use std::collections::HashSet;

    #[test]
    fn github_is_predefined_with_repo_tools() {
        let url = validate_url(&sanitize_url("github.com")).unwrap();
        let source = ServerSource::predefined_for(&url).expect("github is in the directory");
        let ids: Vec<&str> = source.tools().iter().map(|t| t.id.as_str()).collect();
        for expected in ["create-repo", "list-repos", "search-code"] {
            assert!(ids.contains(&expected), "missing {}", expected);
        }
        assert_eq!(source.display_name(), "GitHub");
        assert!(!source.is_degraded());
    }

    #[test]
    fn subdomains_and_www_match() {
        assert_eq!(lookup_domain("www.github.com").unwrap().id, "github");
        assert_eq!(lookup_domain("API.Stripe.com").unwrap().id, "stripe");
        assert_eq!(lookup_domain("myteam.slack.com.").unwrap().id, "slack");
    }

    #[test]
    fn lookalike_domains_do_not_match() {
        assert!(lookup_domain("notgithub.com").is_none());
        assert!(lookup_domain("github.com.evil.io").is_none());
        assert!(lookup_domain("example.com").is_none());
    }

    #[test]
    fn entries_are_already_normalized_with_unique_ids() {
        let mut server_ids = HashSet::new();
        for entry in all_entries() {
            assert!(server_ids.insert(entry.id.clone()));
            assert_eq!(normalize_tools(entry.tools.clone()), entry.tools);
            let unique: HashSet<_> = entry.tool_ids().into_iter().collect();
            assert_eq!(unique.len(), entry.tools.len());
        }
    }

    #[test]
    fn server_listing_mirrors_tools() {
        let server = lookup_domain("notion.so").unwrap().to_server();
        assert_eq!(server.status, ServerStatus::Connected);
        assert_eq!(server.tools, vec!["create-page", "query-database", "search-pages"]);
    }

    #[test]
    fn server_source_serializes_with_tag() {
        let source = ServerSource::Generated(AnalysisResponse::default());
        let value = serde_json::to_value(&source).unwrap();
        assert_eq!(value["source"], "generated");
        let back: ServerSource = serde_json::from_value(value).unwrap();
        assert_eq!(back, source);
    }
}
