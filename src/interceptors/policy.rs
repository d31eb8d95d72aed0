//! Per-action allow/deny policy

use crate::interceptors::{InterceptorDecision, ToolCallContext, ToolInterceptor};
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PolicyMode {
    AllowAll,
    DefaultDeny,
}

#[derive(Debug, Clone)]
struct PolicyDecision {
    allowed: bool,
    rule_id: Option<String>,
    reason: String,
}

#[derive(Debug, Clone)]
pub struct PolicyConfig {
    mode: PolicyMode,
    rules: HashMap<String, PolicyDecision>,
}

impl PolicyConfig {
    pub fn allow_all() -> Self {
        Self {
            mode: PolicyMode::AllowAll,
            rules: HashMap::new(),
        }
    }

    /// Load a policy file. A missing file means allow-all.
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::allow_all());
        }

        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let parsed: PolicyFile = serde_json::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
        Ok(Self::from_file(parsed))
    }

    fn from_file(parsed: PolicyFile) -> Self {
        let mode = match parsed.mode.as_str() {
            "default-deny" => PolicyMode::DefaultDeny,
            "allow-all" => PolicyMode::AllowAll,
            other => {
                warn!(mode = other, "Unknown policy mode, defaulting to allow-all");
                PolicyMode::AllowAll
            }
        };

        let mut rules = HashMap::new();
        for rule in parsed.rules {
            if !is_valid_action_name(&rule.action) {
                warn!(action = %rule.action, "Invalid action name in policy; skipping rule");
                continue;
            }
            rules.insert(
                rule.action,
                PolicyDecision {
                    allowed: rule.allowed,
                    rule_id: rule.rule_id,
                    reason: rule.reason.unwrap_or_else(|| "policy rule".to_string()),
                },
            );
        }

        Self { mode, rules }
    }

    fn decision_for(&self, action: &str) -> PolicyDecision {
        if let Some(decision) = self.rules.get(action) {
            return decision.clone();
        }

        match self.mode {
            PolicyMode::AllowAll => PolicyDecision {
                allowed: true,
                rule_id: None,
                reason: "allowed by default policy".to_string(),
            },
            PolicyMode::DefaultDeny => PolicyDecision {
                allowed: false,
                rule_id: None,
                reason: "denied by default policy".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct PolicyInterceptor {
    policy: PolicyConfig,
}

impl PolicyInterceptor {
    pub fn new(policy: PolicyConfig) -> Self {
        Self { policy }
    }
}

#[async_trait::async_trait]
impl ToolInterceptor for PolicyInterceptor {
    async fn intercept_tool_call(&self, context: &ToolCallContext) -> Result<InterceptorDecision> {
        let decision = self.policy.decision_for(&context.action);
        if decision.allowed {
            return Ok(InterceptorDecision::Allow);
        }

        let rule_id = decision
            .rule_id
            .as_ref()
            .map(|id| format!(" (rule {})", id))
            .unwrap_or_default();
        Ok(InterceptorDecision::Block(format!(
            "Policy denied {}: {}{}",
            context.action, decision.reason, rule_id
        )))
    }
}

#[derive(Debug, Deserialize)]
struct PolicyFile {
    mode: String,
    #[serde(default)]
    rules: Vec<PolicyRule>,
}

#[derive(Debug, Deserialize)]
struct PolicyRule {
    action: String,
    allowed: bool,
    #[serde(default)]
    rule_id: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

/// UPPER_SNAKE action names only
fn is_valid_action_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name.starts_with(|c: char| c.is_ascii_uppercase())
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}
