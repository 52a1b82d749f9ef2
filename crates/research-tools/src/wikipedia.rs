use research_core::config::WikipediaConfig;
use research_core::error::AgentError;
use research_core::tool_registry::Tool;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

/// An encyclopedic lookup backend: query in, bounded excerpt out.
#[async_trait]
pub trait LookupBackend: Send + Sync {
    async fn lookup(&self, query: &str) -> Result<String, AgentError>;
}

/// Encyclopedic lookup against a MediaWiki `api.php` endpoint.
///
/// Output is bounded to `max_results` entries and `max_chars` characters per
/// excerpt so model-context growth stays predictable across iterations.
#[derive(Clone)]
pub struct WikipediaClient {
    client: reqwest::Client,
    api_base: String,
    max_results: usize,
    max_chars: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    query: Option<SearchQuery>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    query: Option<ExtractQuery>,
}

#[derive(Debug, Deserialize)]
struct ExtractQuery {
    #[serde(default)]
    pages: HashMap<String, ExtractPage>,
}

#[derive(Debug, Deserialize)]
struct ExtractPage {
    title: String,
    #[serde(default)]
    extract: String,
}

impl WikipediaClient {
    pub fn new(config: &WikipediaConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .user_agent("research-shell/0.1 (https://github.com/research-shell)")
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_base: config.api_base.clone(),
            max_results: config.max_results,
            max_chars: config.max_chars,
        }
    }

    fn err(message: String) -> AgentError {
        AgentError::ToolExecution {
            tool_name: "wikipedia".into(),
            message,
        }
    }

    /// Look up a query and return a bounded plain-text excerpt.
    pub async fn lookup(&self, query: &str) -> Result<String, AgentError> {
        let titles = self.search_titles(query).await?;
        if titles.is_empty() {
            return Ok(format!("No Wikipedia pages found for '{}'.", query));
        }

        let pages = self.fetch_extracts(&titles).await?;
        if pages.is_empty() {
            return Ok(format!("No Wikipedia pages found for '{}'.", query));
        }

        // Preserve search ranking order; the extract API returns pages keyed
        // by page id. Redirect resolution can rename a page, so anything that
        // no longer matches a search title is appended afterwards.
        let mut sections = Vec::with_capacity(pages.len());
        for title in &titles {
            if let Some(page) = pages.iter().find(|p| &p.title == title) {
                sections.push(self.format_page(page));
            }
        }
        for page in &pages {
            if !titles.contains(&page.title) {
                sections.push(self.format_page(page));
            }
        }
        Ok(sections.join("\n\n"))
    }

    fn format_page(&self, page: &ExtractPage) -> String {
        format!(
            "Page: {}\nSummary: {}",
            page.title,
            truncate_chars(&page.extract, self.max_chars)
        )
    }

    async fn search_titles(&self, query: &str) -> Result<Vec<String>, AgentError> {
        let limit = self.max_results.to_string();
        let response = self
            .client
            .get(&self.api_base)
            .query(&[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", query),
                ("srlimit", limit.as_str()),
                ("format", "json"),
            ])
            .send()
            .await
            .map_err(|e| Self::err(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::err(format!(
                "Wikipedia returned HTTP {}",
                status.as_u16()
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| Self::err(format!("Malformed search response: {}", e)))?;

        Ok(parsed
            .query
            .map(|q| q.search.into_iter().map(|h| h.title).collect())
            .unwrap_or_default())
    }

    async fn fetch_extracts(&self, titles: &[String]) -> Result<Vec<ExtractPage>, AgentError> {
        let joined = titles.join("|");
        let response = self
            .client
            .get(&self.api_base)
            .query(&[
                ("action", "query"),
                ("prop", "extracts"),
                ("explaintext", "1"),
                ("exintro", "1"),
                ("redirects", "1"),
                ("titles", joined.as_str()),
                ("format", "json"),
            ])
            .send()
            .await
            .map_err(|e| Self::err(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::err(format!(
                "Wikipedia returned HTTP {}",
                status.as_u16()
            )));
        }

        let parsed: ExtractResponse = response
            .json()
            .await
            .map_err(|e| Self::err(format!("Malformed extract response: {}", e)))?;

        Ok(parsed
            .query
            .map(|q| q.pages.into_values().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl LookupBackend for WikipediaClient {
    async fn lookup(&self, query: &str) -> Result<String, AgentError> {
        WikipediaClient::lookup(self, query).await
    }
}

/// Truncate to at most `max` characters on a char boundary, marking the cut.
fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

/// The `wikipedia` tool exposed to the agent.
pub struct WikipediaTool {
    client: WikipediaClient,
}

impl WikipediaTool {
    pub fn new(client: WikipediaClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for WikipediaTool {
    fn name(&self) -> &str {
        "wikipedia"
    }

    fn description(&self) -> &str {
        "Search Wikipedia for encyclopedic information. Input should be a search query \
         string. Use this for historical facts, scientific concepts, and general knowledge."
    }

    async fn invoke(&self, input: &str) -> Result<String, AgentError> {
        self.client.lookup(input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_string_untouched() {
        assert_eq!(truncate_chars("short", 1000), "short");
    }

    #[test]
    fn test_truncate_long_string_marked() {
        let long = "a".repeat(1200);
        let cut = truncate_chars(&long, 1000);
        assert_eq!(cut.len(), 1003);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let s = "héllo wörld";
        let cut = truncate_chars(s, 3);
        assert_eq!(cut, "hél...");
    }

    #[test]
    fn test_search_response_decodes() {
        let json = r#"{"query":{"search":[{"title":"Paris","pageid":22989,"size":10}]}}"#;
        let parsed: SearchResponse = serde_json::from_str(json).unwrap();
        let titles: Vec<String> = parsed
            .query
            .map(|q| q.search.into_iter().map(|h| h.title).collect())
            .unwrap_or_default();
        assert_eq!(titles, vec!["Paris"]);
    }

    #[test]
    fn test_extract_response_decodes() {
        let json = r#"{"query":{"pages":{"22989":{"pageid":22989,"title":"Paris","extract":"Paris is the capital of France."}}}}"#;
        let parsed: ExtractResponse = serde_json::from_str(json).unwrap();
        let pages: Vec<ExtractPage> = parsed
            .query
            .map(|q| q.pages.into_values().collect())
            .unwrap_or_default();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].extract, "Paris is the capital of France.");
    }

    #[test]
    fn test_missing_query_block_is_empty() {
        let parsed: SearchResponse = serde_json::from_str(r#"{"batchcomplete":""}"#).unwrap();
        assert!(parsed.query.is_none());
    }
}
