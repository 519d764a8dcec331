//! External tools the agents may invoke.
//!
//! Tools form a closed, tagged set: the model names a tool, the registry resolves the
//! name to a [`ToolKind`] variant, and dispatch is an exhaustive match. The registry
//! verifies at startup that every advertised tool resolves, so a catalog entry can
//! never name a tool the dispatcher does not know.

use crate::llm::ToolSpec;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

const DEFAULT_TAVILY_BASE_URL: &str = "https://api.tavily.com";
const MAX_SEARCH_RESULTS: usize = 3;

/// Errors raised while resolving or executing tools.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Model requested a tool the registry does not know.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    /// Tool arguments did not match the declared schema.
    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
    /// Tool is not configured for this process.
    #[error("Tool '{0}' is not enabled")]
    Disabled(&'static str),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Tool endpoint responded with an unexpected status code.
    #[error("Unexpected tool response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the tool endpoint.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// Closed set of tools available to the agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    /// Web search for current ingredient prices.
    PriceSearch,
}

impl ToolKind {
    /// Every tool variant, used for catalog construction and the startup check.
    pub const ALL: [ToolKind; 1] = [ToolKind::PriceSearch];

    /// Name the model uses to request this tool.
    pub const fn name(self) -> &'static str {
        match self {
            Self::PriceSearch => "price_search",
        }
    }

    /// Declaration advertised to the model.
    pub fn spec(self) -> ToolSpec {
        match self {
            Self::PriceSearch => ToolSpec {
                name: self.name(),
                description: "Search the web for current market prices of ingredients.",
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "Free-text search query, e.g. 'butter price per kg'."
                        }
                    },
                    "required": ["query"]
                }),
            },
        }
    }
}

/// Web search client for the Tavily API, limited to a small fixed result count.
pub struct TavilyClient {
    pub(crate) client: reqwest::Client,
    pub(crate) base_url: String,
    pub(crate) api_key: String,
}

#[derive(Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

impl TavilyClient {
    /// Construct a client against the given base URL.
    pub fn new(base_url: Option<String>, api_key: String) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .user_agent("fournil/0.1")
            .build()?;
        Ok(Self {
            client,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_TAVILY_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
        })
    }

    /// Run one basic search and return the raw result snippets as text.
    pub async fn search(&self, query: &str) -> Result<String, ToolError> {
        tracing::debug!(query, "Tavily search");
        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .json(&serde_json::json!({
                "api_key": self.api_key,
                "query": query,
                "max_results": MAX_SEARCH_RESULTS,
                "search_depth": "basic",
                "topic": "general",
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = ToolError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Tavily search failed");
            return Err(error);
        }

        let payload: TavilyResponse = response.json().await?;
        let mut lines = Vec::with_capacity(payload.results.len());
        for result in payload.results.into_iter().take(MAX_SEARCH_RESULTS) {
            lines.push(format!("{} ({}): {}", result.title, result.url, result.content));
        }
        Ok(lines.join("\n"))
    }
}

/// Dispatch table over the closed tool set.
///
/// Construction runs the completeness check: every tool the catalog advertises must
/// resolve back to a dispatchable variant.
pub struct ToolRegistry {
    tavily: Option<TavilyClient>,
}

impl ToolRegistry {
    /// Build the registry. Pass `None` to run without the price-lookup tool.
    pub fn new(tavily: Option<TavilyClient>) -> Result<Self, ToolError> {
        let registry = Self { tavily };
        registry.verify_catalog()?;
        Ok(registry)
    }

    /// Tool declarations to advertise to the model. Empty when no tool is configured.
    pub fn catalog(&self) -> Vec<ToolSpec> {
        if self.tavily.is_none() {
            return Vec::new();
        }
        ToolKind::ALL.iter().map(|kind| kind.spec()).collect()
    }

    /// Resolve a model-declared tool name to its variant.
    pub fn resolve(&self, name: &str) -> Result<ToolKind, ToolError> {
        ToolKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
    }

    /// Execute a tool with the model-supplied JSON arguments string.
    pub async fn invoke(&self, kind: ToolKind, arguments: &str) -> Result<String, ToolError> {
        match kind {
            ToolKind::PriceSearch => {
                let tavily = self
                    .tavily
                    .as_ref()
                    .ok_or(ToolError::Disabled(ToolKind::PriceSearch.name()))?;
                let args: PriceSearchArgs = serde_json::from_str(arguments)
                    .map_err(|error| ToolError::InvalidArguments(error.to_string()))?;
                tavily.search(&args.query).await
            }
        }
    }

    fn verify_catalog(&self) -> Result<(), ToolError> {
        for spec in self.catalog() {
            self.resolve(spec.name)?;
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct PriceSearchArgs {
    query: String,
}
