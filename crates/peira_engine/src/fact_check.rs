//! Fact-checking stage: validate a generated response against web search
//! before delivery. The verdict is recorded in the turn's explanation.
//!
//! Failure posture: a search outage must not abort the turn, so a failed
//! search passes the response through unchanged. Empty results, on the
//! other hand, mean the response found no support and is replaced.

use peira_core::SearchApi;
use serde::{Deserialize, Serialize};

pub const NEEDS_VERIFICATION: &str = "Response needs verification.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FactCheckVerdict {
    /// A search result overlapped with the response.
    Confirmed,
    /// Search ran but nothing supported the response.
    Unverified,
    /// Search was disabled or unavailable; response passed through.
    Skipped,
}

impl FactCheckVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            FactCheckVerdict::Confirmed => "confirmed",
            FactCheckVerdict::Unverified => "unverified",
            FactCheckVerdict::Skipped => "skipped",
        }
    }
}

/// Check a response against search results. Returns the text to deliver
/// and the verdict.
pub async fn fact_check(response: &str, search: &dyn SearchApi) -> (String, FactCheckVerdict) {
    let snippets = match search.search(response).await {
        Ok(snippets) => snippets,
        Err(e) => {
            tracing::warn!("Fact-check search unavailable, passing response through: {}", e);
            return (response.to_string(), FactCheckVerdict::Skipped);
        }
    };

    let response_lower = response.to_lowercase();
    let supported = snippets.iter().any(|snippet| {
        let title = snippet.title.to_lowercase();
        title.contains(&response_lower) || response_lower.contains(&title)
    });

    if supported {
        (response.to_string(), FactCheckVerdict::Confirmed)
    } else {
        (NEEDS_VERIFICATION.to_string(), FactCheckVerdict::Unverified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use peira_core::SearchSnippet;

    struct FixedSearch(Vec<SearchSnippet>);

    #[async_trait]
    impl SearchApi for FixedSearch {
        async fn search(&self, _query: &str) -> Result<Vec<SearchSnippet>> {
            Ok(self.0.clone())
        }
    }

    struct BrokenSearch;

    #[async_trait]
    impl SearchApi for BrokenSearch {
        async fn search(&self, _query: &str) -> Result<Vec<SearchSnippet>> {
            anyhow::bail!("dns failure")
        }
    }

    fn snippet(title: &str) -> SearchSnippet {
        SearchSnippet {
            title: title.to_string(),
            url: "https://example.com".to_string(),
        }
    }

    #[tokio::test]
    async fn overlapping_result_confirms() {
        let search = FixedSearch(vec![snippet("Rust is a systems language, an overview")]);
        let (text, verdict) = fact_check("Rust is a systems language", &search).await;
        assert_eq!(verdict, FactCheckVerdict::Confirmed);
        assert_eq!(text, "Rust is a systems language");
    }

    #[tokio::test]
    async fn unsupported_response_is_replaced() {
        let search = FixedSearch(vec![snippet("gardening tips")]);
        let (text, verdict) = fact_check("Rust invented in 1850", &search).await;
        assert_eq!(verdict, FactCheckVerdict::Unverified);
        assert_eq!(text, NEEDS_VERIFICATION);
    }

    #[tokio::test]
    async fn empty_results_are_unverified() {
        let search = FixedSearch(vec![]);
        let (_, verdict) = fact_check("anything", &search).await;
        assert_eq!(verdict, FactCheckVerdict::Unverified);
    }

    #[tokio::test]
    async fn search_outage_passes_response_through() {
        let (text, verdict) = fact_check("original response", &BrokenSearch).await;
        assert_eq!(verdict, FactCheckVerdict::Skipped);
        assert_eq!(text, "original response");
    }
}
