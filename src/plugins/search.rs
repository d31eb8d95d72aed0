//! Web search through Tavily

use crate::actions::{
    extract, ActionDescriptor, ActionExample, ActionHandler, ExtractionContext,
};
use crate::config::{SearchConfig, SettingsProvider};
use crate::plugins::{unexpected_call, BoundTools, PluginFactory};
use crate::tools::{ActionContent, SearchRequest, TavilyClient, ToolCall, WebSearch};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub const SEARCH_WEB: &str = "SEARCH_WEB";

pub struct SearchPlugin {
    config: SearchConfig,
}

impl SearchPlugin {
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }

    pub fn tools(search: Arc<dyn WebSearch>) -> BoundTools {
        BoundTools::new().with_handler(SEARCH_WEB, Arc::new(SearchWebHandler { search }))
    }
}

#[async_trait]
impl PluginFactory for SearchPlugin {
    fn name(&self) -> &str {
        "Web Search"
    }

    fn description(&self) -> &str {
        "Search the internet for up-to-date information"
    }

    fn descriptors(&self) -> Vec<ActionDescriptor> {
        vec![ActionDescriptor::new(
            SEARCH_WEB,
            "Search the internet for information about a topic and structure the results",
        )
        .with_similes(&["SEARCH", "LOOKUP", "FIND_INFO", "WEB_SEARCH"])
        .with_examples(vec![
            ActionExample::new(
                "Can you search about the latest developments in AI?",
                "",
                Some(SEARCH_WEB),
            ),
            ActionExample::new(
                "Look up recent news about blockchain technology",
                "",
                Some(SEARCH_WEB),
            ),
        ])]
    }

    async fn bind(&self, settings: &dyn SettingsProvider) -> Result<BoundTools> {
        let client = TavilyClient::bind(settings, &self.config)?;
        Ok(Self::tools(Arc::new(client)))
    }
}

struct SearchWebHandler {
    search: Arc<dyn WebSearch>,
}

#[async_trait]
impl ActionHandler for SearchWebHandler {
    async fn extract(&self, ctx: &ExtractionContext<'_>) -> Result<ToolCall> {
        let query = extract::search_query(ctx.message.text())?;
        Ok(ToolCall::Search(SearchRequest { query }))
    }

    async fn invoke(&self, call: &ToolCall) -> Result<ActionContent> {
        match call {
            ToolCall::Search(request) => Ok(ActionContent::Search(self.search.search(request).await?)),
            other => Err(unexpected_call(SEARCH_WEB, other)),
        }
    }
}
