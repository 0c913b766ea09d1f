//! DuckDuckGo web search

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

use lmpipe_core::{Error, Result};

use super::{Tool, ToolParameter, string_arg};

const DEFAULT_ENDPOINT: &str = "https://html.duckduckgo.com/html/";
const DEFAULT_MAX_RESULTS: usize = 3;
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) lmpipe";

/// One search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub href: Option<String>,
    pub body: Option<String>,
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::Tool(format!("Invalid selector {}: {:?}", css, e)))
}

/// Result links are wrapped in a redirect: `//duckduckgo.com/l/?uddg=<target>`
fn resolve_href(raw: &str) -> String {
    let absolute = if raw.starts_with("//") {
        format!("https:{}", raw)
    } else {
        raw.to_string()
    };

    Url::parse(&absolute)
        .ok()
        .and_then(|url| {
            url.query_pairs()
                .find(|(key, _)| key == "uddg")
                .map(|(_, target)| target.into_owned())
        })
        .unwrap_or(absolute)
}

/// Parse the organic results out of a DuckDuckGo HTML page
pub fn parse_results(html: &str, max_results: usize) -> Result<Vec<SearchHit>> {
    let result_sel = selector(".result")?;
    let link_sel = selector("a.result__a")?;
    let snippet_sel = selector(".result__snippet")?;

    let document = Html::parse_document(html);
    let hits = document
        .select(&result_sel)
        .filter(|result| !result.value().classes().any(|c| c == "result--ad"))
        .map(|result| {
            let href = result
                .select(&link_sel)
                .next()
                .and_then(|a| a.value().attr("href"))
                .map(resolve_href);
            let body = result
                .select(&snippet_sel)
                .next()
                .map(|s| s.text().collect::<String>())
                .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
                .filter(|text| !text.is_empty());
            SearchHit { href, body }
        })
        .take(max_results)
        .collect();

    Ok(hits)
}

/// Render hits as `\n- *(href)*: body` lines
pub fn format_results(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| {
            format!(
                "\n- *({})*: {}",
                hit.href.as_deref().unwrap_or("N.A."),
                hit.body.as_deref().unwrap_or("No text was available.")
            )
        })
        .collect()
}

/// Web search tool backed by DuckDuckGo's HTML endpoint
pub struct WebSearchTool {
    client: Client,
    endpoint: String,
    max_results: usize,
}

impl WebSearchTool {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    /// Point the tool at another search endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let url = Url::parse_with_params(&self.endpoint, &[("q", query)])
            .map_err(|e| Error::Configuration(format!("Invalid search endpoint {}: {}", self.endpoint, e)))?;
        debug!(%url, "web search");

        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| Error::Network(format!("Search request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Tool(format!("Search failed with status {}", status)));
        }

        let html = response
            .text()
            .await
            .map_err(|e| Error::Network(format!("Failed to read search results: {}", e)))?;

        parse_results(&html, self.max_results)
    }
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "WebSearchTool"
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![ToolParameter::new(
            "query",
            "string",
            "Query to be used in a web search engine. Web searches might contain old and new data. \
            Example: Who is current president of U.S.A.?",
        )]
    }

    async fn call(&self, args: &Value) -> Result<String> {
        let query = string_arg(args, "query")?;
        let hits = self.search(query).await?;
        if hits.is_empty() {
            return Ok("No results found.".to_string());
        }
        Ok(format_results(&hits))
    }
}
