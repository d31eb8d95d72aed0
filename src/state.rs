//! Conversation state
//!
//! An ordered key/value map supplied by the runtime (agent bio, recent
//! messages, provider output, attachments). The action pipeline only reads it
//! or extends it with new keys; it never replaces a value the runtime set.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Well-known state keys rendered by the templates
pub mod keys {
    pub const AGENT_NAME: &str = "agentName";
    pub const BIO: &str = "bio";
    pub const LORE: &str = "lore";
    pub const KNOWLEDGE: &str = "knowledge";
    pub const PROVIDERS: &str = "providers";
    pub const ATTACHMENTS: &str = "attachments";
    pub const RECENT_MESSAGES: &str = "recentMessages";
    pub const ACTIONS: &str = "actions";
    pub const ACTION_EXAMPLES: &str = "actionExamples";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State(BTreeMap<String, Value>);

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Render a value as template text. Strings are inserted raw, null as
    /// empty, everything else as compact JSON.
    pub fn render(&self, key: &str) -> Option<String> {
        self.0.get(key).map(|value| match value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        })
    }

    /// Set a value, replacing any previous one. Reserved for the owner of the
    /// state (the runtime); the pipeline uses [`State::extend`].
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Additive merge: keys already present keep their value.
    /// Returns the number of keys added.
    pub fn extend<I, K>(&mut self, entries: I) -> usize
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut added = 0;
        for (key, value) in entries {
            let key = key.into();
            if self.0.contains_key(&key) {
                tracing::debug!(key = %key, "State key already set, keeping existing value");
                continue;
            }
            self.0.insert(key, value);
            added += 1;
        }
        added
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
