//! Result relay

use crate::tools::ActionContent;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Callback payload observed by the runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse {
    pub text: String,
    pub content: ResponseContent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseContent {
    Success(ActionContent),
    Failure { error: String },
    /// Plain conversational reply, no action ran
    Reply {},
}

impl ActionResponse {
    pub fn error(&self) -> Option<&str> {
        match &self.content {
            ResponseContent::Failure { error } => Some(error),
            _ => None,
        }
    }
}

pub type HandlerCallback = Arc<dyn Fn(ActionResponse) + Send + Sync>;

/// Forward a response to the callback, if there is one
pub fn emit(callback: Option<&HandlerCallback>, response: ActionResponse) {
    if let Some(callback) = callback {
        callback(response);
    }
}

/// Outcome of one dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct ActionResult {
    pub success: bool,
    pub text: String,
    pub content: Option<ActionContent>,
    pub error_message: Option<String>,
}

impl ActionResult {
    pub fn succeeded(text: String, content: ActionContent) -> Self {
        Self {
            success: true,
            text,
            content: Some(content),
            error_message: None,
        }
    }

    pub fn failed(text: String, error: String) -> Self {
        Self {
            success: false,
            text,
            content: None,
            error_message: Some(error),
        }
    }

    pub fn response(&self) -> ActionResponse {
        let content = match (&self.content, &self.error_message) {
            (Some(content), None) => ResponseContent::Success(content.clone()),
            (_, Some(error)) => ResponseContent::Failure {
                error: error.clone(),
            },
            (None, None) => ResponseContent::Reply {},
        };
        ActionResponse {
            text: self.text.clone(),
            content,
        }
    }
}
