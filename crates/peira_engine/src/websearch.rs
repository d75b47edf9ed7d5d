//! Web-search collaborator: the DuckDuckGo HTML endpoint, no API key
//! required. Result anchors are pulled out with pre-compiled regexes; a
//! non-success status degrades to an empty result list.

use anyhow::{Context, Result};
use async_trait::async_trait;
use peira_core::{SearchApi, SearchSnippet};
use regex::Regex;
use reqwest::Client;
use std::sync::LazyLock;

static RE_RESULT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<a[^>]*class="result__a"[^>]*href="([^"]+)"[^>]*>(.*?)</a>"#).unwrap()
});
static RE_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

const MAX_RESULTS: usize = 10;

pub struct DuckDuckGo {
    client: Client,
    base_url: String,
}

impl DuckDuckGo {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.to_string(),
        }
    }

    fn parse_results(html: &str) -> Vec<SearchSnippet> {
        RE_RESULT
            .captures_iter(html)
            .take(MAX_RESULTS)
            .map(|cap| SearchSnippet {
                url: cap[1].to_string(),
                title: RE_TAG.replace_all(&cap[2], "").trim().to_string(),
            })
            .filter(|s| !s.title.is_empty())
            .collect()
    }
}

impl Default for DuckDuckGo {
    fn default() -> Self {
        Self::new("https://duckduckgo.com/html/")
    }
}

#[async_trait]
impl SearchApi for DuckDuckGo {
    async fn search(&self, query: &str) -> Result<Vec<SearchSnippet>> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("q", query)])
            .send()
            .await
            .context("Web search request failed")?;

        if !response.status().is_success() {
            tracing::debug!("Web search returned {}", response.status());
            return Ok(Vec::new());
        }

        let html = response.text().await.context("Failed to read search body")?;
        Ok(Self::parse_results(&html))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_result_anchors() {
        let html = r#"
            <div class="result">
              <a rel="nofollow" class="result__a" href="https://example.com/rust">The <b>Rust</b> Book</a>
            </div>
            <a class="result__a" href="https://example.com/tokio">Tokio docs</a>
            <a class="other" href="https://example.com/skip">skip me</a>
        "#;
        let snippets = DuckDuckGo::parse_results(html);
        assert_eq!(snippets.len(), 2);
        assert_eq!(snippets[0].title, "The Rust Book");
        assert_eq!(snippets[0].url, "https://example.com/rust");
        assert_eq!(snippets[1].title, "Tokio docs");
    }

    #[test]
    fn empty_html_parses_to_nothing() {
        assert!(DuckDuckGo::parse_results("<html></html>").is_empty());
    }
}
