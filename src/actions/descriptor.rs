//! Action descriptors and the handler seam

use crate::actions::composer::Templates;
use crate::runtime::{AgentRuntime, Memory};
use crate::state::State;
use crate::tools::{ActionContent, ToolCall};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One (user turn, agent turn) usage example
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionExample {
    pub user: String,
    pub agent: String,
    /// Action the agent turn triggers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl ActionExample {
    pub fn new(user: &str, agent: &str, action: Option<&str>) -> Self {
        Self {
            user: user.to_string(),
            agent: agent.to_string(),
            action: action.map(str::to_string),
        }
    }
}

/// Admissibility predicate. Must not perform the action or touch anything
/// beyond its arguments.
pub type Validator = Arc<dyn Fn(&dyn AgentRuntime, &Memory, &State) -> bool + Send + Sync>;

/// Wrap a predicate as a [`Validator`]
pub fn validator<F>(predicate: F) -> Validator
where
    F: Fn(&dyn AgentRuntime, &Memory, &State) -> bool + Send + Sync + 'static,
{
    Arc::new(predicate)
}

/// Validator for unconditionally available actions
pub fn always() -> Validator {
    validator(|_, _, _| true)
}

/// Static metadata for an action, immutable after plugin init
#[derive(Clone)]
pub struct ActionDescriptor {
    pub name: String,
    pub description: String,
    /// Paraphrase hints
    pub similes: Vec<String>,
    pub examples: Vec<ActionExample>,
    pub validator: Validator,
}

impl ActionDescriptor {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            similes: Vec::new(),
            examples: Vec::new(),
            validator: always(),
        }
    }

    pub fn with_similes(mut self, similes: &[&str]) -> Self {
        self.similes = similes.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_examples(mut self, examples: Vec<ActionExample>) -> Self {
        self.examples = examples;
        self
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    pub fn validate(&self, runtime: &dyn AgentRuntime, message: &Memory, state: &State) -> bool {
        (self.validator)(runtime, message, state)
    }
}

impl std::fmt::Debug for ActionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("similes", &self.similes)
            .field("examples", &self.examples.len())
            .finish_non_exhaustive()
    }
}

/// Render examples as dialogue lines for `{{actionExamples}}`
pub fn render_examples(examples: &[ActionExample], agent_name: &str) -> String {
    examples
        .iter()
        .map(|example| {
            let mut reply = example.agent.clone();
            if let Some(action) = &example.action {
                if !reply.is_empty() {
                    reply.push(' ');
                }
                reply.push_str(&format!("({})", action));
            }
            format!("User: {}\n{}: {}", example.user, agent_name, reply)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Inputs available to parameter extraction
pub struct ExtractionContext<'a> {
    pub runtime: &'a dyn AgentRuntime,
    pub message: &'a Memory,
    pub state: &'a State,
    /// The composed invocation template
    pub invocation_context: &'a str,
}

/// Per-action behaviour bound to a live tool handle
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Derive a fully parameterised call from the message. Errors here must
    /// never reach the tool.
    async fn extract(&self, ctx: &ExtractionContext<'_>) -> Result<ToolCall>;

    /// Perform the single side-effecting call
    async fn invoke(&self, call: &ToolCall) -> Result<ActionContent>;
}

/// A descriptor paired with its bound handler and its plugin's templates
#[derive(Clone)]
pub struct Action {
    pub descriptor: Arc<ActionDescriptor>,
    pub handler: Arc<dyn ActionHandler>,
    pub templates: Arc<Templates>,
}

impl Action {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.descriptor.name)
            .finish_non_exhaustive()
    }
}
