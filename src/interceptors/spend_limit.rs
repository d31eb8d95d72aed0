//! Spend limit interceptor
//!
//! Caps each transfer and the total sent per token per UTC day. Amounts are
//! compared in base units; nothing is converted to floating point. An allowed
//! transfer reserves its amount until the outcome is known, so concurrent
//! transfers cannot overrun the budget together.

use crate::interceptors::{
    may_have_executed, InterceptorDecision, ToolCallContext, ToolInterceptor,
};
use crate::tokens::{format_units, parse_base_units};
use crate::tools::{ActionContent, ToolCall, TransferRequest};
use crate::Result;
use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Spent today and in flight, per token contract
struct DailySpending {
    date: NaiveDate,
    totals: HashMap<Address, U256>,
    /// Allowed but not yet settled; survives the day boundary
    reserved: HashMap<Address, U256>,
}

impl DailySpending {
    fn new() -> Self {
        Self {
            date: Utc::now().date_naive(),
            totals: HashMap::new(),
            reserved: HashMap::new(),
        }
    }

    fn roll_over(&mut self) {
        let today = Utc::now().date_naive();
        if today != self.date {
            self.totals.clear();
            self.date = today;
        }
    }

    /// Sent today plus everything still in flight
    fn committed(&mut self, token: Address) -> U256 {
        self.roll_over();
        let spent = self.totals.get(&token).copied().unwrap_or(U256::ZERO);
        let reserved = self.reserved.get(&token).copied().unwrap_or(U256::ZERO);
        spent.saturating_add(reserved)
    }

    fn reserve(&mut self, token: Address, amount: U256) {
        let reserved = self.reserved.entry(token).or_insert(U256::ZERO);
        *reserved = reserved.saturating_add(amount);
    }

    fn release(&mut self, token: Address, amount: U256) {
        if let Some(reserved) = self.reserved.get_mut(&token) {
            *reserved = reserved.saturating_sub(amount);
            if reserved.is_zero() {
                self.reserved.remove(&token);
            }
        }
    }

    fn add(&mut self, token: Address, amount: U256) {
        self.roll_over();
        let total = self.totals.entry(token).or_insert(U256::ZERO);
        *total = total.saturating_add(amount);
    }
}

pub struct SpendLimitInterceptor {
    max_per_transfer: Option<U256>,
    daily_budget: Option<U256>,
    daily_spent: RwLock<DailySpending>,
}

impl SpendLimitInterceptor {
    /// Limits in token base units; `None` disables a limit
    pub fn new(max_per_transfer: Option<U256>, daily_budget: Option<U256>) -> Self {
        Self {
            max_per_transfer,
            daily_budget,
            daily_spent: RwLock::new(DailySpending::new()),
        }
    }

    fn transfer(context: &ToolCallContext) -> Option<(&TransferRequest, U256)> {
        match &context.call {
            ToolCall::Transfer(request) => {
                parse_base_units(&request.amount).map(|amount| (request, amount))
            }
            _ => None,
        }
    }
}

#[async_trait]
impl ToolInterceptor for SpendLimitInterceptor {
    async fn intercept_tool_call(&self, context: &ToolCallContext) -> Result<InterceptorDecision> {
        let ToolCall::Transfer(request) = &context.call else {
            return Ok(InterceptorDecision::Allow);
        };
        let Some(amount) = parse_base_units(&request.amount) else {
            return Ok(InterceptorDecision::Block(format!(
                "Transfer amount '{}' is not a base-unit integer",
                request.amount
            )));
        };
        let decimals = request.token.decimals as u32;

        if let Some(max) = self.max_per_transfer {
            if amount > max {
                return Ok(InterceptorDecision::Block(format!(
                    "Transfer of {} {} exceeds per-transfer limit of {} {}",
                    format_units(amount, decimals),
                    request.token.symbol,
                    format_units(max, decimals),
                    request.token.symbol
                )));
            }
        }

        // Check and reserve under one write lock
        let mut daily = self.daily_spent.write().await;
        if let Some(budget) = self.daily_budget {
            let committed = daily.committed(request.token.address);
            if committed.saturating_add(amount) > budget {
                return Ok(InterceptorDecision::Block(format!(
                    "Daily {} budget exhausted: {} of {} already sent or pending today",
                    request.token.symbol,
                    format_units(committed, decimals),
                    format_units(budget, decimals)
                )));
            }
        }
        daily.reserve(request.token.address, amount);

        tracing::debug!(
            token = %request.token.symbol,
            amount = %request.amount,
            "Spend limit check passed"
        );
        Ok(InterceptorDecision::Allow)
    }

    async fn on_tool_call_complete(
        &self,
        context: &ToolCallContext,
        result: &Result<ActionContent>,
        _duration_ms: u64,
    ) {
        let Some((request, amount)) = Self::transfer(context) else {
            return;
        };
        let mut daily = self.daily_spent.write().await;
        daily.release(request.token.address, amount);
        if may_have_executed(result) {
            daily.add(request.token.address, amount);
        }
    }

    async fn on_tool_call_blocked(&self, context: &ToolCallContext) {
        if let Some((request, amount)) = Self::transfer(context) {
            self.daily_spent
                .write()
                .await
                .release(request.token.address, amount);
        }
    }
}
