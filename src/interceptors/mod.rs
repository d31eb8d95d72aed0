//! Invocation guards
//!
//! Every tool call passes through the dispatcher's interceptor chain after
//! parameter extraction and before the tool runs. Any interceptor may block
//! the call; all of them observe the outcome. Guards that hold state reserve
//! their share in `intercept_tool_call` and settle it once the outcome is
//! known, so concurrent dispatches cannot both pass the same check.

mod audit_log;
mod cooldown;
mod policy;
mod spend_limit;

pub use audit_log::AuditLogInterceptor;
pub use cooldown::RecipientCooldownInterceptor;
pub use policy::{PolicyConfig, PolicyInterceptor};
pub use spend_limit::SpendLimitInterceptor;

use crate::tools::{ActionContent, ToolCall};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

/// The call about to run
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallContext {
    /// Action name, e.g. `SEND_TOKEN`
    pub action: String,
    pub call: ToolCall,
    /// Inbound message that triggered the call
    pub message_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterceptorDecision {
    Allow,
    /// Refuse the call with a user-facing reason
    Block(String),
}

#[async_trait]
pub trait ToolInterceptor: Send + Sync {
    async fn intercept_tool_call(&self, context: &ToolCallContext) -> Result<InterceptorDecision>;

    async fn on_tool_call_complete(
        &self,
        _context: &ToolCallContext,
        _result: &Result<ActionContent>,
        _duration_ms: u64,
    ) {
    }

    /// A later interceptor refused a call this one allowed
    async fn on_tool_call_blocked(&self, _context: &ToolCallContext) {}
}

/// Whether the tool may have changed external state.
///
/// True for successes and for calls whose outcome was never observed.
pub(crate) fn may_have_executed(result: &Result<ActionContent>) -> bool {
    match result {
        Ok(_) => true,
        Err(e) => e.is_outcome_unknown(),
    }
}
