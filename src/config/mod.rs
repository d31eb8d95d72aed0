//! Configuration for the action plugins
//!
//! Two layers:
//! - [`SettingsProvider`]: key/string lookup for credentials and endpoints,
//!   passed explicitly to every tool binding
//! - [`Config`]: the optional JSON config file with tunables for each plugin

pub mod rpc;

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub use rpc::Network;

/// Setting key names
pub mod keys {
    pub const EVM_PRIVATE_KEY: &str = "EVM_PRIVATE_KEY";
    pub const EVM_PROVIDER_URL: &str = "EVM_PROVIDER_URL";
    pub const POLYMARKET_API_KEY: &str = "POLYMARKET_API_KEY";
    pub const POLYMARKET_SECRET: &str = "POLYMARKET_SECRET";
    pub const POLYMARKET_PASSPHRASE: &str = "POLYMARKET_PASSPHRASE";
    pub const TAVILY_API_KEY: &str = "TAVILY_API_KEY";
    pub const OPENROUTER_API_KEY: &str = "OPENROUTER_API_KEY";
}

/// Read-only key/value settings source.
///
/// Values are returned verbatim; parsing and validation belong to the caller.
/// Blank values are treated as absent.
pub trait SettingsProvider: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// Settings backed by the process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSettings;

impl SettingsProvider for EnvSettings {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }
}

/// In-memory settings
#[derive(Debug, Clone, Default)]
pub struct MapSettings {
    values: HashMap<String, String>,
}

impl MapSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }
}

impl SettingsProvider for MapSettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .get(key)
            .filter(|v| !v.trim().is_empty())
            .cloned()
    }
}

/// Fetch every key in `required`, reporting all absent keys in one error.
pub fn require_all(settings: &dyn SettingsProvider, required: &[&str]) -> Result<Vec<String>> {
    let mut values = Vec::with_capacity(required.len());
    let mut missing = Vec::new();

    for key in required {
        match settings.get(key) {
            Some(value) => values.push(value),
            None => missing.push(*key),
        }
    }

    if missing.is_empty() {
        Ok(values)
    } else {
        Err(Error::MissingSetting(missing.join(", ")))
    }
}

/// Exercise reward plugin settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardsConfig {
    /// Network the reward token lives on
    pub network: Network,
    /// Reward token symbol, resolved through the token registry
    pub token_symbol: String,
    /// Optional contract address override for the reward token
    pub token_address: Option<String>,
    /// Reward per completed exercise, in token base units
    pub reward_amount: String,
    /// Run the transfer through eth_call before broadcasting
    pub simulate_before_send: bool,
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self {
            network: Network::ArbitrumSepolia,
            token_symbol: "ACC".to_string(),
            token_address: None,
            reward_amount: crate::tokens::EXERCISE_REWARD_AMOUNT.to_string(),
            simulate_before_send: true,
        }
    }
}

/// Polymarket plugin settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolymarketConfig {
    /// Gamma (market data) API base URL
    pub gamma_url: String,
    /// CLOB (order book) API base URL
    pub clob_url: String,
    /// Chain the exchange contract lives on
    pub chain_id: u64,
    /// Number of events returned by GET_POLYMARKET_EVENTS
    pub events_limit: usize,
}

impl Default for PolymarketConfig {
    fn default() -> Self {
        Self {
            gamma_url: "https://gamma-api.polymarket.com".to_string(),
            clob_url: "https://clob.polymarket.com".to_string(),
            chain_id: rpc::chains::POLYGON,
            events_limit: 10,
        }
    }
}

/// Web search plugin settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub api_url: String,
    pub max_results: usize,
    /// "basic" or "advanced"
    pub search_depth: String,
    /// "general" or "news"
    pub topic: String,
    pub include_answer: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.tavily.com/search".to_string(),
            max_results: 5,
            search_depth: "advanced".to_string(),
            topic: "general".to_string(),
            include_answer: true,
        }
    }
}

/// Text generation settings for the bundled runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// OpenAI-compatible API base URL
    pub base_url: String,
    /// Model for conversational replies
    pub small_model: String,
    /// Model for tool-using reasoning
    pub large_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Number of recent messages rendered into `{{recentMessages}}`
    pub recent_message_window: usize,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            small_model: "openai/gpt-4o-mini".to_string(),
            large_model: "openai/gpt-4o".to_string(),
            temperature: 0.7,
            max_tokens: 1024,
            recent_message_window: 32,
        }
    }
}

/// Invocation guard settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Largest single transfer, in token base units
    pub max_transfer_amount: Option<String>,
    /// Transfer budget per UTC day, in token base units
    pub daily_transfer_budget: Option<String>,
    /// Minimum seconds between two rewards to the same recipient (0 disables)
    pub recipient_cooldown_seconds: u64,
    /// Path to a policy.json with per-action allow/deny rules
    pub policy_path: Option<String>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            max_transfer_amount: Some("1000000000000000000".to_string()), // 1 token at 18 decimals
            daily_transfer_budget: Some("10000000000000000000".to_string()), // 10 tokens
            recipient_cooldown_seconds: 3600,
            policy_path: None,
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub rewards: RewardsConfig,
    pub polymarket: PolymarketConfig,
    pub search: SearchConfig,
    pub llm: LlmSettings,
    pub guards: GuardConfig,
    /// Upper bound on a single tool invocation (none by default)
    pub tool_timeout_secs: Option<u64>,
    /// Path to the JSONL audit log
    pub audit_log_path: Option<String>,
}

impl Config {
    /// Load a JSON config file; absent sections take their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }
}
