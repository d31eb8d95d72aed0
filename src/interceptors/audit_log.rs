//! Audit log interceptor
//!
//! Appends one JSON line per tool call start and completion.

use crate::interceptors::{InterceptorDecision, ToolCallContext, ToolInterceptor};
use crate::tools::{ActionContent, ToolCall};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Longest serialized result kept in a completion entry
const MAX_RESULT_CHARS: usize = 2_000;

#[derive(Debug, Serialize)]
struct AuditEntry<'a> {
    timestamp: DateTime<Utc>,
    entry_type: &'static str,
    action: &'a str,
    message_id: Uuid,
    call: &'a ToolCall,
    result: Option<String>,
    error: Option<String>,
    duration_ms: u64,
    status: &'static str,
}

pub struct AuditLogInterceptor {
    path: PathBuf,
    // Serializes appends from concurrent dispatches
    lock: Mutex<()>,
}

impl AuditLogInterceptor {
    /// Log to `log_path` (JSONL, created on first write)
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            path: log_path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn write(&self, entry: &AuditEntry<'_>) {
        let _guard = self.lock.lock().await;
        let outcome = serde_json::to_string(entry)
            .map_err(std::io::Error::from)
            .and_then(|line| {
                let mut file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)?;
                writeln!(file, "{}", line)
            });
        if let Err(e) = outcome {
            tracing::warn!(
                error = %e,
                path = %self.path.display(),
                "Failed to write audit log entry"
            );
        }
    }
}

#[async_trait]
impl ToolInterceptor for AuditLogInterceptor {
    async fn intercept_tool_call(&self, context: &ToolCallContext) -> Result<InterceptorDecision> {
        self.write(&AuditEntry {
            timestamp: Utc::now(),
            entry_type: "tool_call_start",
            action: &context.action,
            message_id: context.message_id,
            call: &context.call,
            result: None,
            error: None,
            duration_ms: 0,
            status: "pending",
        })
        .await;

        Ok(InterceptorDecision::Allow)
    }

    async fn on_tool_call_complete(
        &self,
        context: &ToolCallContext,
        result: &Result<ActionContent>,
        duration_ms: u64,
    ) {
        let (result, error, status) = match result {
            Ok(content) => (
                serde_json::to_string(content)
                    .ok()
                    .map(|s| truncate(&s, MAX_RESULT_CHARS)),
                None,
                "success",
            ),
            Err(e) => (None, Some(e.to_string()), "error"),
        };

        self.write(&AuditEntry {
            timestamp: Utc::now(),
            entry_type: "tool_call_complete",
            action: &context.action,
            message_id: context.message_id,
            call: &context.call,
            result,
            error,
            duration_ms,
            status,
        })
        .await;
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
