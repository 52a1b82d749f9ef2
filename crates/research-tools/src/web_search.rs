use crate::wikipedia::LookupBackend;
use research_core::config::SearchConfig;
use research_core::error::AgentError;
use research_core::tool_registry::Tool;
use async_trait::async_trait;
use tracing::warn;
use url::Url;

/// One web search hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub title: String,
    pub snippet: String,
    pub link: String,
}

/// A web search backend: query in, ordered hits out. Zero hits is a valid
/// outcome, not an error.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, AgentError>;
}

/// Web search against the DuckDuckGo HTML endpoint (no API key needed).
#[derive(Clone)]
pub struct SearchClient {
    client: reqwest::Client,
    api_base: String,
    max_results: usize,
}

impl SearchClient {
    pub fn new(config: &SearchConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .user_agent("Mozilla/5.0 (compatible; research-shell/0.1)")
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_base: config.api_base.clone(),
            max_results: config.max_results,
        }
    }

    /// Run a search. Zero hits is `Ok(vec![])`, not an error.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>, AgentError> {
        let response = self
            .client
            .get(&self.api_base)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| AgentError::ToolExecution {
                tool_name: "web_search".into(),
                message: format!("Request failed: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::ToolExecution {
                tool_name: "web_search".into(),
                message: format!("Search backend returned HTTP {}", status.as_u16()),
            });
        }

        let html = response.text().await.map_err(|e| AgentError::ToolExecution {
            tool_name: "web_search".into(),
            message: format!("Failed to read response body: {}", e),
        })?;

        Ok(extract_ddg_results(&html, self.max_results))
    }
}

#[async_trait]
impl SearchBackend for SearchClient {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, AgentError> {
        SearchClient::search(self, query).await
    }
}

/// Extract search results from DuckDuckGo's HTML, split-based, no parser.
fn extract_ddg_results(html: &str, max_results: usize) -> Vec<SearchResult> {
    let mut results = Vec::new();

    for chunk in html.split("class=\"result__body\"").skip(1) {
        if results.len() == max_results {
            break;
        }

        let Some(anchor) = chunk.split("class=\"result__a\"").nth(1) else {
            continue;
        };

        let title = anchor
            .split('>')
            .nth(1)
            .and_then(|s| s.split('<').next())
            .map(html_decode)
            .unwrap_or_default();
        if title.is_empty() {
            continue;
        }

        let href = anchor
            .split("href=\"")
            .nth(1)
            .and_then(|s| s.split('"').next())
            .unwrap_or("");

        let snippet = chunk
            .split("class=\"result__snippet\"")
            .nth(1)
            .and_then(|s| s.split('>').nth(1))
            .and_then(|s| s.split('<').next())
            .map(html_decode)
            .unwrap_or_default();

        results.push(SearchResult {
            title,
            snippet,
            link: resolve_ddg_link(href),
        });
    }

    results
}

/// DuckDuckGo wraps result links in a redirect
/// (`//duckduckgo.com/l/?uddg=<target>`); unwrap to the target URL.
fn resolve_ddg_link(href: &str) -> String {
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href.to_string()
    };

    if let Ok(parsed) = Url::parse(&absolute) {
        if let Some((_, target)) = parsed.query_pairs().find(|(k, _)| k == "uddg") {
            return target.into_owned();
        }
    }
    absolute
}

/// Basic HTML entity decoding.
fn html_decode(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
}

/// Render results as numbered blocks; an empty set renders as an explicit
/// "no results" message, never an empty string.
pub fn format_results(query: &str, results: &[SearchResult]) -> String {
    if results.is_empty() {
        return format!("No results found for '{}'.", query);
    }

    results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!(
                "{}. {}\n{}\nSource: {}\n",
                i + 1,
                r.title,
                r.snippet,
                r.link
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The `web_search` tool: primary search with a single fallback to the
/// encyclopedic lookup when the primary backend fails. No retries beyond
/// the one fallback attempt.
pub struct WebSearchTool {
    search: Box<dyn SearchBackend>,
    fallback: Box<dyn LookupBackend>,
}

impl WebSearchTool {
    pub fn new(
        search: impl SearchBackend + 'static,
        fallback: impl LookupBackend + 'static,
    ) -> Self {
        Self {
            search: Box::new(search),
            fallback: Box::new(fallback),
        }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for current information. Input should be a search query string. \
         Use this for recent events, statistics, and up-to-date information."
    }

    async fn invoke(&self, input: &str) -> Result<String, AgentError> {
        let primary_err = match self.search.search(input).await {
            Ok(results) => return Ok(format_results(input, &results)),
            Err(e) => e,
        };

        warn!("Web search failed ({}), falling back to Wikipedia", primary_err);
        match self.fallback.lookup(input).await {
            Ok(text) => Ok(format!(
                "[web search unavailable; showing Wikipedia results instead]\n\n{}",
                text
            )),
            Err(_) => Ok(format!(
                "Search error: {}. Try rephrasing your query or checking connectivity.",
                primary_err
            )),
        }
    }
}
