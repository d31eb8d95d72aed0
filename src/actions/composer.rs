//! Context composer
//!
//! Templates are plain text with `{{name}}` placeholders. Values come from the
//! per-call variables first, then the conversation state. Anything unresolved
//! renders as an empty string, so composition cannot fail.

use crate::state::State;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*(\w+)\s*\}\}").expect("valid placeholder regex"));

/// Variable holding the action name in the invocation template
pub const ACTION_NAME: &str = "actionName";
/// Variable holding the action description in the invocation template
pub const ACTION_DESCRIPTION: &str = "actionDescription";
/// Variable holding the serialized tool result in the success template
pub const ACTION_RESULT: &str = "actionResult";
/// Variable holding the failure message in the error template
pub const ACTION_ERROR: &str = "actionError";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    Invocation,
    Success,
    Error,
}

pub const INVOCATION_TEMPLATE: &str = "# Knowledge
{{knowledge}}

About {{agentName}}:
{{bio}}
{{lore}}

{{providers}}

{{attachments}}

# Action: {{actionName}}
{{actionDescription}}

{{recentMessages}}

Based on the action chosen and the previous messages, execute the action and respond to the user using the tools you were given.";

pub const SUCCESS_TEMPLATE: &str = "# Action Examples
{{actionExamples}}
(Action examples are for reference only. Do not use the information from them in your response.)

# Knowledge
{{knowledge}}

# Task: Generate dialog and actions for the character {{agentName}}.
About {{agentName}}:
{{bio}}
{{lore}}

{{providers}}

{{attachments}}

# Capabilities
Note that {{agentName}} is capable of reading/seeing/hearing various forms of media, including images, videos, audio, plaintext and PDFs. Recent attachments have been included above under the \"Attachments\" section.

Here is the result:
{{actionResult}}

{{actions}}

Respond to the message knowing that the action was successful and these were the previous messages:
{{recentMessages}}";

pub const ERROR_TEMPLATE: &str = "# Knowledge
{{knowledge}}

# Task: Generate dialog and actions for the character {{agentName}}.
About {{agentName}}:
{{bio}}
{{lore}}

{{providers}}

{{attachments}}

# Capabilities
Note that {{agentName}} is capable of reading/seeing/hearing various forms of media, including images, videos, audio, plaintext and PDFs. Recent attachments have been included above under the \"Attachments\" section.

{{actions}}

Respond to the message knowing that the action failed.
The error was:
{{actionError}}

These were the previous messages:
{{recentMessages}}";

/// The three template classes a plugin supplies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Templates {
    pub invocation: String,
    pub success: String,
    pub error: String,
}

impl Default for Templates {
    fn default() -> Self {
        Self {
            invocation: INVOCATION_TEMPLATE.to_string(),
            success: SUCCESS_TEMPLATE.to_string(),
            error: ERROR_TEMPLATE.to_string(),
        }
    }
}

impl Templates {
    pub fn with_invocation(mut self, template: impl Into<String>) -> Self {
        self.invocation = template.into();
        self
    }

    pub fn get(&self, kind: TemplateKind) -> &str {
        match kind {
            TemplateKind::Invocation => &self.invocation,
            TemplateKind::Success => &self.success,
            TemplateKind::Error => &self.error,
        }
    }

    pub fn compose(&self, kind: TemplateKind, state: &State, vars: &[(&str, &str)]) -> String {
        compose_context(self.get(kind), state, vars)
    }
}

/// Single-pass placeholder substitution. Substituted text is never rescanned.
pub fn compose_context(template: &str, state: &State, vars: &[(&str, &str)]) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let name = &caps[1];
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.to_string())
                .or_else(|| state.render(name))
                .unwrap_or_default()
        })
        .into_owned()
}
