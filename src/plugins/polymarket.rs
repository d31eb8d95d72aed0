//! Polymarket actions
//!
//! Six actions over one [`PredictionMarket`] handle: browse events, inspect a
//! market, place an order, list open orders, cancel one or all orders.

use crate::actions::{
    extract, ActionDescriptor, ActionExample, ActionHandler, ExtractionContext,
};
use crate::config::{PolymarketConfig, SettingsProvider};
use crate::plugins::{unexpected_call, BoundTools, PluginFactory};
use crate::tools::polymarket;
use crate::tools::{ActionContent, MarketRequest, PolymarketClient, PredictionMarket, ToolCall};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub const GET_POLYMARKET_EVENTS: &str = "GET_POLYMARKET_EVENTS";
pub const CREATE_POLYMARKET_ORDER: &str = "CREATE_POLYMARKET_ORDER";
pub const GET_POLYMARKET_MARKET_INFO: &str = "GET_POLYMARKET_MARKET_INFO";
pub const GET_ACTIVE_POLYMARKET_ORDERS: &str = "GET_ACTIVE_POLYMARKET_ORDERS";
pub const CANCEL_POLYMARKET_ORDER: &str = "CANCEL_POLYMARKET_ORDER";
pub const CANCEL_ALL_POLYMARKET_ORDERS: &str = "CANCEL_ALL_POLYMARKET_ORDERS";

/// Which market operation a handler extracts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarketOp {
    ListEvents,
    CreateOrder,
    MarketInfo,
    ActiveOrders,
    CancelOrder,
    CancelAll,
}

impl MarketOp {
    const ALL: [MarketOp; 6] = [
        MarketOp::ListEvents,
        MarketOp::CreateOrder,
        MarketOp::MarketInfo,
        MarketOp::ActiveOrders,
        MarketOp::CancelOrder,
        MarketOp::CancelAll,
    ];

    fn action(self) -> &'static str {
        match self {
            MarketOp::ListEvents => GET_POLYMARKET_EVENTS,
            MarketOp::CreateOrder => CREATE_POLYMARKET_ORDER,
            MarketOp::MarketInfo => GET_POLYMARKET_MARKET_INFO,
            MarketOp::ActiveOrders => GET_ACTIVE_POLYMARKET_ORDERS,
            MarketOp::CancelOrder => CANCEL_POLYMARKET_ORDER,
            MarketOp::CancelAll => CANCEL_ALL_POLYMARKET_ORDERS,
        }
    }
}

pub struct PolymarketPlugin {
    config: PolymarketConfig,
}

impl PolymarketPlugin {
    pub fn new(config: PolymarketConfig) -> Self {
        Self { config }
    }

    /// One handler per action, all sharing `market`
    pub fn tools(market: Arc<dyn PredictionMarket>) -> BoundTools {
        MarketOp::ALL.iter().fold(BoundTools::new(), |tools, &op| {
            tools.with_handler(
                op.action(),
                Arc::new(MarketActionHandler {
                    op,
                    market: market.clone(),
                }),
            )
        })
    }
}

fn examples(action: &str, prompts: &[&str]) -> Vec<ActionExample> {
    prompts
        .iter()
        .map(|p| ActionExample::new(p, "", Some(action)))
        .collect()
}

#[async_trait]
impl PluginFactory for PolymarketPlugin {
    fn name(&self) -> &str {
        "[GOAT] Onchain Actions"
    }

    fn description(&self) -> &str {
        "Polygon integration plugin"
    }

    fn descriptors(&self) -> Vec<ActionDescriptor> {
        vec![
            ActionDescriptor::new(
                GET_POLYMARKET_EVENTS,
                "Get the list of events and markets on Polymarket",
            )
            .with_similes(&[
                "Like browsing a sports betting website to see all upcoming games",
                "Similar to checking a TV guide for upcoming shows",
                "Like viewing an events calendar with filters",
            ])
            .with_examples(examples(
                GET_POLYMARKET_EVENTS,
                &[
                    "Show me active events on Polymarket",
                    "What events are happening in 2024?",
                    "Show me political events",
                ],
            )),
            ActionDescriptor::new(
                CREATE_POLYMARKET_ORDER,
                "Create a new order on a Polymarket market",
            )
            .with_similes(&[
                "Like placing a bet on a sports game",
                "Similar to submitting a stock market order",
                "Like making a prediction with real stakes",
            ])
            .with_examples(examples(
                CREATE_POLYMARKET_ORDER,
                &[
                    "I want to buy 100 shares at 0.75",
                    "Sell 50 shares immediately at 0.60 or cancel",
                    "Buy 200 shares at 0.80, valid for 24 hours",
                ],
            )),
            ActionDescriptor::new(
                GET_POLYMARKET_MARKET_INFO,
                "Get detailed information about a specific market on Polymarket",
            )
            .with_similes(&[
                "Like looking up detailed stats for a specific sports game",
                "Similar to viewing a company's stock profile",
                "Like reading the full description of an event",
            ])
            .with_examples(examples(
                GET_POLYMARKET_MARKET_INFO,
                &[
                    "Tell me about market 123",
                    "What are the possible outcomes for market 456?",
                ],
            )),
            ActionDescriptor::new(
                GET_ACTIVE_POLYMARKET_ORDERS,
                "Get all active orders on Polymarket",
            )
            .with_similes(&[
                "Like checking your open bets at a sportsbook",
                "Similar to viewing your pending trades on an exchange",
                "Like reviewing your active predictions",
            ])
            .with_examples(examples(
                GET_ACTIVE_POLYMARKET_ORDERS,
                &[
                    "Show me my active orders",
                    "What orders do I have in market 123?",
                ],
            )),
            ActionDescriptor::new(CANCEL_POLYMARKET_ORDER, "Cancel a specific order on Polymarket")
                .with_similes(&[
                    "Like canceling a pending bet before it's matched",
                    "Similar to canceling a limit order on a trading platform",
                    "Like taking back a prediction before it's confirmed",
                ])
                .with_examples(examples(
                    CANCEL_POLYMARKET_ORDER,
                    &["Cancel my order with ID 123", "Remove my pending order 456"],
                )),
            ActionDescriptor::new(
                CANCEL_ALL_POLYMARKET_ORDERS,
                "Cancel all active orders on Polymarket",
            )
            .with_similes(&[
                "Like clearing all your pending bets at once",
                "Similar to closing all open positions on an exchange",
                "Like resetting your prediction slate",
            ])
            .with_examples(examples(
                CANCEL_ALL_POLYMARKET_ORDERS,
                &["Cancel all my orders", "Clear all my pending bets"],
            )),
        ]
    }

    async fn bind(&self, settings: &dyn SettingsProvider) -> Result<BoundTools> {
        let client = PolymarketClient::bind(settings, &self.config)?;
        Ok(Self::tools(Arc::new(client)))
    }
}

struct MarketActionHandler {
    op: MarketOp,
    market: Arc<dyn PredictionMarket>,
}

#[async_trait]
impl ActionHandler for MarketActionHandler {
    async fn extract(&self, ctx: &ExtractionContext<'_>) -> Result<ToolCall> {
        let text = ctx.message.text();
        let request = match self.op {
            MarketOp::ListEvents => MarketRequest::ListEvents {
                keyword: extract::events_keyword(text),
            },
            MarketOp::CreateOrder => MarketRequest::CreateOrder(extract::order_request(ctx).await?),
            MarketOp::MarketInfo => MarketRequest::MarketInfo {
                market_id: extract::market_id(text).ok_or_else(|| {
                    crate::Error::ParameterExtraction(
                        "No market ID found in the message".to_string(),
                    )
                })?,
            },
            MarketOp::ActiveOrders => MarketRequest::ActiveOrders {
                market_id: extract::market_id(text),
            },
            MarketOp::CancelOrder => MarketRequest::CancelOrder {
                order_id: extract::order_id(text)?,
            },
            MarketOp::CancelAll => MarketRequest::CancelAll,
        };
        Ok(ToolCall::Market(request))
    }

    async fn invoke(&self, call: &ToolCall) -> Result<ActionContent> {
        match call {
            ToolCall::Market(request) => {
                let outcome = polymarket::execute(self.market.as_ref(), request).await?;
                Ok(ActionContent::Market(outcome))
            }
            other => Err(unexpected_call(self.op.action(), other)),
        }
    }
}
