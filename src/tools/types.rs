//! Closed request and result shapes for every bound tool.
//!
//! `ToolCall` is what an action's extraction step produces and what the
//! interceptors inspect; `ActionContent` is the structured payload handed back
//! to the runtime on success.

use crate::tokens::{format_units, parse_base_units, TokenSpec};
use crate::tools::polymarket::{
    Cancellation, MarketEvent, MarketSummary, OpenOrder, OrderRequest, PlacedOrder,
};
use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A fully parameterised tool invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum ToolCall {
    Transfer(TransferRequest),
    Search(SearchRequest),
    Market(MarketRequest),
}

/// ERC-20 transfer of `amount` base units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub token: TokenSpec,
    pub to: Address,
    /// Decimal-integer base units, never a float
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
}

/// Prediction-market operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MarketRequest {
    ListEvents { keyword: Option<String> },
    MarketInfo { market_id: String },
    CreateOrder(OrderRequest),
    ActiveOrders { market_id: Option<String> },
    CancelOrder { order_id: String },
    CancelAll,
}

/// Receipt of a mined transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub tx_hash: B256,
    pub from: Address,
    pub to: Address,
    pub token: String,
    pub amount: String,
    pub decimals: u8,
    pub chain_id: u64,
    pub block_number: Option<u64>,
}

impl TransferReceipt {
    /// Amount in whole tokens, e.g. "0.1"
    pub fn formatted_amount(&self) -> String {
        parse_base_units(&self.amount)
            .map(|units| format_units(units, self.decimals as u32))
            .unwrap_or_else(|| self.amount.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub content: String,
    #[serde(default)]
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub query: String,
    pub answer: Option<String>,
    pub results: Vec<SearchHit>,
}

impl SearchOutcome {
    /// Title / URL / summary blocks, one per hit
    pub fn results_text(&self) -> String {
        self.results
            .iter()
            .map(|hit| {
                format!(
                    "Title: {}\nURL: {}\nSummary: {}\n",
                    hit.title, hit.url, hit.content
                )
            })
            .collect::<Vec<_>>()
            .join("\n---\n\n")
    }

    /// Bullet-point digest: up to two substantial sentences per hit plus the
    /// provider's answer.
    pub fn digest(&self) -> String {
        let mut lines = vec![format!("Here are the latest updates about {}:", self.query)];
        for hit in &self.results {
            lines.push(String::new());
            lines.push(format!("From {}:", hit.title));
            lines.extend(
                hit.content
                    .split(['.', '!', '?'])
                    .map(str::trim)
                    .filter(|point| point.len() > 30)
                    .take(2)
                    .map(|point| format!("  • {}", point)),
            );
            lines.push(format!("   Source: {}", hit.url));
        }
        if let Some(answer) = self.answer.as_deref().filter(|a| !a.is_empty()) {
            lines.push(String::new());
            lines.push("Summary:".to_string());
            lines.push(answer.to_string());
        }
        lines.join("\n")
    }
}

/// Result of a prediction-market operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MarketOutcome {
    Events { events: Vec<MarketEvent> },
    MarketInfo { market: MarketSummary },
    OrderPlaced { order: PlacedOrder },
    ActiveOrders { orders: Vec<OpenOrder> },
    OrderCancelled { cancellation: Cancellation },
    AllCancelled { cancellation: Cancellation },
}

/// Structured success payload, one variant per tool family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionContent {
    Transfer(TransferReceipt),
    Search(SearchOutcome),
    Market(MarketOutcome),
}

impl ActionContent {
    /// Deterministic plain-text rendering, used when no generated reply is
    /// available.
    pub fn summary(&self) -> String {
        match self {
            ActionContent::Transfer(receipt) => format!(
                "Sent {} {} to {}. Transaction: {}",
                receipt.formatted_amount(),
                receipt.token,
                receipt.to,
                receipt.tx_hash
            ),
            ActionContent::Search(outcome) => outcome.digest(),
            ActionContent::Market(outcome) => market_summary(outcome),
        }
    }

    /// Entries merged into conversation state after a successful call
    pub fn state_entries(&self) -> Vec<(&'static str, Value)> {
        match self {
            ActionContent::Transfer(receipt) => vec![
                ("transactionHash", json!(receipt.tx_hash.to_string())),
                ("recipientAddress", json!(receipt.to.to_string())),
            ],
            ActionContent::Search(outcome) => vec![
                ("searchQuery", json!(outcome.query)),
                ("searchResults", json!(outcome.results_text())),
            ],
            ActionContent::Market(_) => Vec::new(),
        }
    }
}

fn market_summary(outcome: &MarketOutcome) -> String {
    match outcome {
        MarketOutcome::Events { events } if events.is_empty() => {
            "No active Polymarket events found.".to_string()
        }
        MarketOutcome::Events { events } => {
            let mut lines = vec![format!("Found {} active Polymarket events:", events.len())];
            lines.extend(events.iter().map(|event| match event.volume {
                Some(volume) => format!("- {} (volume ${:.0})", event.title, volume),
                None => format!("- {}", event.title),
            }));
            lines.join("\n")
        }
        MarketOutcome::MarketInfo { market } => {
            let outcomes = market
                .outcomes
                .iter()
                .map(|o| match &o.price {
                    Some(price) => format!("{} {}", o.outcome, price),
                    None => o.outcome.clone(),
                })
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "{}\nOutcomes: {}\nStatus: {}",
                market.question,
                outcomes,
                if market.closed { "closed" } else { "open" }
            )
        }
        MarketOutcome::OrderPlaced { order } => format!(
            "Placed {} order for {} shares at {} ({}). Order ID: {}, status: {}",
            order.side, order.size, order.price, order.order_type, order.order_id, order.status
        ),
        MarketOutcome::ActiveOrders { orders } if orders.is_empty() => {
            "You have no active orders.".to_string()
        }
        MarketOutcome::ActiveOrders { orders } => {
            let mut lines = vec![format!("You have {} active orders:", orders.len())];
            lines.extend(orders.iter().map(|o| {
                format!("- {}: {} {} @ {}", o.id, o.side, o.original_size, o.price)
            }));
            lines.join("\n")
        }
        MarketOutcome::OrderCancelled { cancellation }
        | MarketOutcome::AllCancelled { cancellation } => cancellation.summary(),
    }
}
