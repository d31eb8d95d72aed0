//! Test doubles shared by the unit tests

use crate::actions::{ActionResponse, HandlerCallback};
use crate::config::Network;
use crate::runtime::{fallback_state, AgentRuntime, Memory, ModelClass};
use crate::state::{keys, State};
use crate::tools::{TokenTransfer, TransferReceipt, TransferRequest};
use crate::{Error, Result};
use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Runtime that replays queued generations and records every prompt
#[derive(Default)]
pub struct ScriptedRuntime {
    replies: Mutex<VecDeque<std::result::Result<String, String>>>,
    prompts: Mutex<Vec<(String, ModelClass)>>,
    compose_calls: AtomicUsize,
    fail_compose: bool,
}

impl ScriptedRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        self.replies.lock().unwrap().push_back(Ok(reply.into()));
        self
    }

    pub fn with_failure(self, reason: impl Into<String>) -> Self {
        self.replies.lock().unwrap().push_back(Err(reason.into()));
        self
    }

    pub fn failing_compose(mut self) -> Self {
        self.fail_compose = true;
        self
    }

    pub fn prompts(&self) -> Vec<(String, ModelClass)> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn compose_calls(&self) -> usize {
        self.compose_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentRuntime for ScriptedRuntime {
    fn agent_name(&self) -> &str {
        "Coach"
    }

    async fn compose_state(&self, message: &Memory) -> Result<State> {
        self.compose_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_compose {
            return Err(Error::Generation("state store unavailable".into()));
        }
        let mut state = fallback_state(message);
        state.set(keys::AGENT_NAME, "Coach");
        Ok(state)
    }

    async fn update_recent_message_state(
        &self,
        _message: &Memory,
        state: State,
    ) -> Result<State> {
        Ok(state)
    }

    async fn generate_text(&self, context: &str, model: ModelClass) -> Result<String> {
        self.prompts
            .lock()
            .unwrap()
            .push((context.to_string(), model));
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(reason)) => Err(Error::Generation(reason)),
            None => Err(Error::Generation("no scripted reply left".into())),
        }
    }
}

/// Transfer capability that records requests instead of signing
pub struct SpyTransfer {
    calls: Mutex<Vec<TransferRequest>>,
    failure: Option<String>,
    delay: Option<Duration>,
}

impl SpyTransfer {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failure: None,
            delay: None,
        }
    }

    /// Records the request, then waits `delay` before confirming
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new()
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failure: Some(reason.to_string()),
            delay: None,
        }
    }

    pub fn calls(&self) -> Vec<TransferRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenTransfer for SpyTransfer {
    fn address(&self) -> Address {
        Address::repeat_byte(0x22)
    }

    fn network(&self) -> Network {
        Network::ArbitrumSepolia
    }

    async fn native_balance(&self) -> Result<U256> {
        Ok(U256::from(1_500_000_000_000_000_000u64))
    }

    async fn transfer(&self, request: &TransferRequest) -> Result<TransferReceipt> {
        self.calls.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = &self.failure {
            return Err(Error::ToolInvocation(reason.clone()));
        }
        Ok(TransferReceipt {
            tx_hash: B256::repeat_byte(0xab),
            from: self.address(),
            to: request.to,
            token: request.token.symbol.clone(),
            amount: request.amount.clone(),
            decimals: request.token.decimals,
            chain_id: request.token.chain_id,
            block_number: Some(1),
        })
    }
}

/// Callback that collects every response it receives
pub fn capture() -> (HandlerCallback, Arc<Mutex<Vec<ActionResponse>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let callback: HandlerCallback = Arc::new(move |response| {
        sink.lock().unwrap().push(response);
    });
    (callback, seen)
}
