//! Chat-completions backed runtime
//!
//! A small [`AgentRuntime`] for the CLI: persona from a character file, an
//! in-memory recent-message window and text generation through any
//! OpenAI-compatible endpoint (OpenRouter by default).

use crate::config::{keys, LlmSettings, SettingsProvider};
use crate::runtime::{AgentRuntime, Memory, ModelClass};
use crate::state::{keys as state_keys, State};
use crate::{Error, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::path::Path;
use tokio::sync::RwLock;

/// Agent persona rendered into `bio`, `lore` and `knowledge`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Character {
    pub name: String,
    pub bio: Vec<String>,
    pub lore: Vec<String>,
    pub knowledge: Vec<String>,
}

impl Default for Character {
    fn default() -> Self {
        Self {
            name: "Coach".to_string(),
            bio: vec![
                "An accountability coach who rewards completed workouts with ACC tokens.".to_string(),
                "Keeps an eye on Polymarket and can search the web for fresh information.".to_string(),
            ],
            lore: vec![
                "Believes small daily habits beat heroic one-off efforts.".to_string(),
            ],
            knowledge: vec![
                "ACC rewards are paid on Arbitrum Sepolia.".to_string(),
                "Polymarket prices are probabilities between 0 and 1.".to_string(),
            ],
        }
    }
}

impl Character {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }
}

pub struct LlmRuntime {
    http: reqwest::Client,
    api_key: SecretString,
    settings: LlmSettings,
    character: Character,
    history: RwLock<VecDeque<Memory>>,
}

impl LlmRuntime {
    /// Requires `OPENROUTER_API_KEY`
    pub fn from_settings(
        settings: &dyn SettingsProvider,
        llm: LlmSettings,
        character: Character,
    ) -> Result<Self> {
        let api_key = settings
            .get(keys::OPENROUTER_API_KEY)
            .ok_or_else(|| Error::MissingSetting(keys::OPENROUTER_API_KEY.to_string()))?;

        Ok(Self {
            http: reqwest::Client::new(),
            api_key: SecretString::from(api_key),
            settings: llm,
            character,
            history: RwLock::new(VecDeque::new()),
        })
    }

    pub fn character(&self) -> &Character {
        &self.character
    }

    /// Append a message to the recent-message window
    pub async fn remember(&self, memory: Memory) {
        let mut history = self.history.write().await;
        history.push_back(memory);
        while history.len() > self.settings.recent_message_window.max(1) {
            history.pop_front();
        }
    }

    async fn render_recent(&self, current: Option<&Memory>) -> String {
        let history = self.history.read().await;
        let mut lines: Vec<String> = history
            .iter()
            .map(|m| format!("{}: {}", m.user_id, m.text()))
            .collect();
        if let Some(message) = current {
            if !history.iter().any(|m| m.id == message.id) {
                lines.push(format!("{}: {}", message.user_id, message.text()));
            }
        }
        lines.join("\n")
    }

    fn model_for(&self, class: ModelClass) -> &str {
        match class {
            ModelClass::Small => &self.settings.small_model,
            ModelClass::Large => &self.settings.large_model,
        }
    }
}

#[async_trait]
impl AgentRuntime for LlmRuntime {
    fn agent_name(&self) -> &str {
        &self.character.name
    }

    async fn compose_state(&self, message: &Memory) -> Result<State> {
        let mut state = State::new();
        state.set(state_keys::AGENT_NAME, self.character.name.clone());
        state.set(state_keys::BIO, self.character.bio.join("\n"));
        state.set(state_keys::LORE, self.character.lore.join("\n"));
        state.set(state_keys::KNOWLEDGE, self.character.knowledge.join("\n"));
        state.set(state_keys::ATTACHMENTS, "");
        state.set(
            state_keys::RECENT_MESSAGES,
            self.render_recent(Some(message)).await,
        );
        Ok(state)
    }

    async fn update_recent_message_state(
        &self,
        message: &Memory,
        mut state: State,
    ) -> Result<State> {
        state.set(
            state_keys::RECENT_MESSAGES,
            self.render_recent(Some(message)).await,
        );
        Ok(state)
    }

    async fn generate_text(&self, context: &str, model: ModelClass) -> Result<String> {
        let url = format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        );
        let body = json!({
            "model": self.model_for(model),
            "messages": [{ "role": "user", "content": context }],
            "temperature": self.settings.temperature,
            "max_tokens": self.settings.max_tokens,
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Generation(e.to_string()))?;

        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| Error::Generation(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::Generation(format!(
                "Chat completions error {}: {}",
                status, payload
            )));
        }

        let text = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| Error::Generation("Response carried no message content".to_string()))?;

        tracing::debug!(model = self.model_for(model), chars = text.len(), "Generated text");
        Ok(text.trim().to_string())
    }
}
