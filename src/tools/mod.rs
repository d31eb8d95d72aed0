//! Tool binding layer
//!
//! Each tool is a narrow capability trait plus one network client behind it.
//! Bindings read their settings through [`crate::config::SettingsProvider`]
//! and never perform I/O while binding.

pub mod erc20;
pub mod polymarket;
pub mod tavily;
pub mod types;

pub use erc20::TokenTransfer;
pub use polymarket::{PolymarketClient, PredictionMarket};
pub use tavily::{TavilyClient, WebSearch};
pub use types::{
    ActionContent, MarketOutcome, MarketRequest, SearchHit, SearchOutcome, SearchRequest,
    ToolCall, TransferReceipt, TransferRequest,
};
