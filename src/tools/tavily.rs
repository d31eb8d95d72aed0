//! Tavily web search client

use crate::config::{keys, SearchConfig, SettingsProvider};
use crate::tools::types::{SearchHit, SearchOutcome, SearchRequest};
use crate::{Error, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Web search capability exposed to the search action
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<SearchOutcome>;
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    search_depth: &'a str,
    include_answer: bool,
    max_results: usize,
    topic: &'a str,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<SearchHit>,
}

pub struct TavilyClient {
    http: reqwest::Client,
    api_key: SecretString,
    config: SearchConfig,
}

impl TavilyClient {
    /// Bind from settings; requires `TAVILY_API_KEY`
    pub fn bind(settings: &dyn SettingsProvider, config: &SearchConfig) -> Result<Self> {
        let api_key = settings
            .get(keys::TAVILY_API_KEY)
            .ok_or_else(|| Error::MissingSetting(keys::TAVILY_API_KEY.to_string()))?;
        url::Url::parse(&config.api_url)
            .map_err(|e| Error::Config(format!("Invalid search api_url: {}", e)))?;

        Ok(Self {
            http: reqwest::Client::new(),
            api_key: SecretString::from(api_key),
            config: config.clone(),
        })
    }
}

#[async_trait]
impl WebSearch for TavilyClient {
    async fn search(&self, request: &SearchRequest) -> Result<SearchOutcome> {
        let body = TavilyRequest {
            query: &request.query,
            search_depth: &self.config.search_depth,
            include_answer: self.config.include_answer,
            max_results: self.config.max_results,
            topic: &self.config.topic,
        };

        tracing::info!(query = %request.query, depth = %self.config.search_depth, "Searching the web");

        let response = self
            .http
            .post(&self.config.api_url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::ToolInvocation(format!("Search request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let preview: String = text.chars().take(300).collect();
            return Err(Error::ToolInvocation(format!(
                "Search API returned {}: {}",
                status, preview
            )));
        }

        let parsed: TavilyResponse = response
            .json()
            .await
            .map_err(|e| Error::ToolInvocation(format!("Unexpected search response: {}", e)))?;

        tracing::debug!(results = parsed.results.len(), "Search completed");

        Ok(SearchOutcome {
            query: request.query.clone(),
            answer: parsed.answer,
            results: parsed.results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapSettings;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> TavilyClient {
        let settings = MapSettings::new().with(keys::TAVILY_API_KEY, "tvly-test");
        let config = SearchConfig {
            api_url: format!("{}/search", server.uri()),
            ..Default::default()
        };
        TavilyClient::bind(&settings, &config).unwrap()
    }

    #[test]
    fn test_bind_requires_api_key() {
        let err = TavilyClient::bind(&MapSettings::new(), &SearchConfig::default())
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "TAVILY_API_KEY not configured");
    }

    #[tokio::test]
    async fn test_search_sends_configured_options() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("authorization", "Bearer tvly-test"))
            .and(body_partial_json(json!({
                "query": "the latest developments in AI",
                "search_depth": "advanced",
                "include_answer": true,
                "max_results": 5,
                "topic": "general"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": "the latest developments in AI",
                "answer": "Progress continues.",
                "results": [
                    { "title": "AI news", "url": "https://example.com/ai", "content": "Models got better.", "score": 0.91 }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = client_for(&server)
            .search(&SearchRequest {
                query: "the latest developments in AI".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(outcome.answer.as_deref(), Some("Progress continues."));
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].url, "https://example.com/ai");
    }

    #[tokio::test]
    async fn test_search_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(429).set_body_string("plan limit exceeded"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .search(&SearchRequest {
                query: "rust".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ToolInvocation(ref m) if m.contains("plan limit exceeded")));
    }
}
