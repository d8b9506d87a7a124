//! Optional web-context fetcher (Tavily).
//!
//! Best-effort by contract: missing credential or any failure yields
//! `None`, which callers treat as "no context available".

use std::time::Duration;

use serde::Deserialize;

use crate::domain::SearchHit;

const SEARCH_ENDPOINT: &str = "https://api.tavily.com/search";
const SEARCH_TIMEOUT: Duration = Duration::from_secs(15);
const MAX_RESULTS: u32 = 5;

#[derive(Clone)]
pub struct WebSearch {
    http: reqwest::Client,
    api_key: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<RawHit>,
}

#[derive(Deserialize)]
struct RawHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    url: String,
}

impl WebSearch {
    pub fn new(api_key: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(SEARCH_TIMEOUT)
            .build()
            .expect("reqwest client build");
        Self {
            http,
            api_key: api_key.into(),
        }
    }

    pub async fn search(&self, query: &str) -> Option<Vec<SearchHit>> {
        let body = serde_json::json!({
            "api_key": self.api_key,
            "query": query,
            "search_depth": "basic",
            "max_results": MAX_RESULTS,
        });

        let resp = match self.http.post(SEARCH_ENDPOINT).json(&body).send().await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(error = %e, "web search request failed");
                return None;
            }
        };

        if !resp.status().is_success() {
            tracing::warn!(status = %resp.status(), "web search returned non-success");
            return None;
        }

        let parsed: SearchResponse = match resp.json().await {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, "web search response not decodable");
                return None;
            }
        };

        let hits: Vec<SearchHit> = parsed
            .results
            .into_iter()
            .map(|r| SearchHit {
                title: r.title,
                content: r.content,
                url: r.url,
            })
            .collect();

        tracing::info!(results = hits.len(), "web search succeeded");
        Some(hits)
    }
}
