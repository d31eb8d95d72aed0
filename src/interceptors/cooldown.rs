//! Recipient cooldown
//!
//! Enforces a minimum time between two rewards to the same address. A
//! recipient is reserved as soon as a transfer is allowed, so a second
//! transfer to the same address is refused while the first is in flight.

use crate::interceptors::{
    may_have_executed, InterceptorDecision, ToolCallContext, ToolInterceptor,
};
use crate::tools::{ActionContent, ToolCall};
use crate::Result;
use alloy::primitives::Address;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
enum Window {
    /// Transfer allowed for this message, outcome not known yet
    Pending(Uuid),
    /// Last reward that may have been sent
    Since(Instant),
}

pub struct RecipientCooldownInterceptor {
    cooldown: Duration,
    windows: RwLock<HashMap<Address, Window>>,
}

impl RecipientCooldownInterceptor {
    pub fn new(cooldown_seconds: u64) -> Self {
        Self {
            cooldown: Duration::from_secs(cooldown_seconds),
            windows: RwLock::new(HashMap::new()),
        }
    }

    fn recipient(context: &ToolCallContext) -> Option<Address> {
        match &context.call {
            ToolCall::Transfer(request) => Some(request.to),
            _ => None,
        }
    }

    /// Drop the reservation `context` holds, if any
    async fn release(&self, context: &ToolCallContext) {
        let Some(recipient) = Self::recipient(context) else {
            return;
        };
        let mut windows = self.windows.write().await;
        let owned = matches!(
            windows.get(&recipient),
            Some(Window::Pending(id)) if *id == context.message_id
        );
        if owned {
            windows.remove(&recipient);
        }
    }
}

#[async_trait]
impl ToolInterceptor for RecipientCooldownInterceptor {
    async fn intercept_tool_call(&self, context: &ToolCallContext) -> Result<InterceptorDecision> {
        let Some(recipient) = Self::recipient(context) else {
            return Ok(InterceptorDecision::Allow);
        };
        if self.cooldown.is_zero() {
            return Ok(InterceptorDecision::Allow);
        }

        let mut windows = self.windows.write().await;
        match windows.get(&recipient) {
            Some(Window::Pending(_)) => {
                return Ok(InterceptorDecision::Block(format!(
                    "A reward to {} is already in progress.",
                    recipient
                )));
            }
            Some(Window::Since(last)) if last.elapsed() < self.cooldown => {
                let remaining = self.cooldown.saturating_sub(last.elapsed());
                return Ok(InterceptorDecision::Block(format!(
                    "{} was rewarded recently. Please wait {} more seconds.",
                    recipient,
                    remaining.as_secs()
                )));
            }
            _ => {}
        }

        windows.insert(recipient, Window::Pending(context.message_id));
        Ok(InterceptorDecision::Allow)
    }

    async fn on_tool_call_complete(
        &self,
        context: &ToolCallContext,
        result: &Result<ActionContent>,
        _duration_ms: u64,
    ) {
        if !may_have_executed(result) {
            self.release(context).await;
            return;
        }
        if self.cooldown.is_zero() {
            return;
        }
        if let Some(recipient) = Self::recipient(context) {
            self.windows
                .write()
                .await
                .insert(recipient, Window::Since(Instant::now()));
            tracing::info!(
                recipient = %recipient,
                confirmed = result.is_ok(),
                "Recipient cooldown started"
            );
        }
    }

    async fn on_tool_call_blocked(&self, context: &ToolCallContext) {
        self.release(context).await;
    }
}
