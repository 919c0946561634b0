use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use researchmind_core::config::WebSettings;
use researchmind_core::traits::WebSearch;
use researchmind_core::{Error, Result, SourceType, WebDocument};

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'a str,
    max_results: usize,
    include_answer: bool,
    include_raw_content: bool,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: Option<f32>,
}

/// Tavily web search.
pub struct TavilySearch {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl TavilySearch {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("http client: {e}")))?;
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Ok(Self { client, endpoint, api_key: api_key.into() })
    }

    pub fn from_settings(settings: &WebSettings) -> Result<Self> {
        let api_key = std::env::var(&settings.api_key_env)
            .map_err(|_| Error::InvalidConfig(format!("API key not found. Set {} environment variable", settings.api_key_env)))?;
        Self::new(&settings.endpoint, api_key, Duration::from_secs(settings.timeout_secs))
    }
}

/// The provider's own answer comes first as a summary document, followed by
/// the individual hits.
pub(crate) fn into_documents(response: SearchResponse) -> Vec<WebDocument> {
    let mut docs = Vec::with_capacity(response.results.len() + 1);
    if let Some(answer) = response.answer.filter(|a| !a.trim().is_empty()) {
        docs.push(WebDocument {
            source: "Tavily Summary".to_string(),
            url: String::new(),
            title: "Quick Answer".to_string(),
            content: answer,
            score: None,
            source_type: SourceType::Summary,
        });
    }
    docs.extend(response.results.into_iter().map(|hit| WebDocument {
        source: hit.url.clone(),
        url: hit.url,
        title: hit.title,
        content: hit.content,
        score: Some(hit.score.unwrap_or(0.0)),
        source_type: SourceType::Web,
    }));
    docs
}

#[async_trait]
impl WebSearch for TavilySearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<WebDocument>> {
        let request = SearchRequest {
            api_key: &self.api_key,
            query,
            search_depth: "advanced",
            max_results,
            include_answer: true,
            include_raw_content: false,
        };
        let response = self
            .client
            .post(format!("{}/search", self.endpoint))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::WebSearch(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::WebSearch(format!("API error ({}): {body}", status.as_u16())));
        }
        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| Error::WebSearch(format!("unreadable response: {e}")))?;
        let docs = into_documents(parsed);
        debug!(results = docs.len(), "web search finished");
        Ok(docs)
    }
}
