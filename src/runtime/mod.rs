//! Runtime collaborator seam
//!
//! The agent runtime owns conversation memory, state composition and text
//! generation. Actions only see it through [`AgentRuntime`].

pub mod llm;

use crate::state::{keys, State};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use llm::{Character, LlmRuntime};

/// Model tier used for a generation call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelClass {
    /// Cheap tier for conversational replies
    Small,
    /// Capable tier for tool-using reasoning
    Large,
}

/// Message body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub text: String,
    /// Action name the agent chose for this turn, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

/// An inbound or outbound conversation message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    pub id: Uuid,
    pub user_id: String,
    pub agent_id: String,
    pub room_id: String,
    pub content: Content,
    pub created_at: DateTime<Utc>,
}

impl Memory {
    /// A new message from `user_id` in `room_id`
    pub fn new(user_id: &str, agent_id: &str, room_id: &str, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            agent_id: agent_id.to_string(),
            room_id: room_id.to_string(),
            content: Content {
                text: text.into(),
                action: None,
            },
            created_at: Utc::now(),
        }
    }

    pub fn text(&self) -> &str {
        &self.content.text
    }
}

/// Minimal state derived from a message alone, used when the runtime cannot
/// compose one.
pub fn fallback_state(message: &Memory) -> State {
    let mut state = State::new();
    state.set(keys::AGENT_NAME, message.agent_id.clone());
    state.set(
        keys::RECENT_MESSAGES,
        format!("{}: {}", message.user_id, message.text()),
    );
    state
}

#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// Name of the agent, used in prompts and as `agentName`
    fn agent_name(&self) -> &str;

    /// Build conversation state for an inbound message
    async fn compose_state(&self, message: &Memory) -> Result<State>;

    /// Refresh the recent-message window of an existing state. The window
    /// always ends with `message`, remembered or not.
    async fn update_recent_message_state(&self, message: &Memory, state: State) -> Result<State>;

    /// Generate text for a rendered context
    async fn generate_text(&self, context: &str, model: ModelClass) -> Result<String>;
}
