//! Agent Action Plugins
//!
//! Plugins that let a conversational agent act on external services:
//! - reward exercise completion with an ERC-20 transfer on Arbitrum Sepolia
//! - browse and trade Polymarket prediction markets
//! - search the web through Tavily
//!
//! # Pipeline
//!
//! Every action runs through one [`actions::Dispatcher`]: validate, extract
//! parameters from the message, pass the interceptor chain, invoke the bound
//! tool once, then generate a reply from the success or error template and
//! relay it through the caller's callback exactly once.
//!
//! # Security Model
//!
//! - Private keys never leave the wallet module
//! - Missing or malformed settings disable a plugin instead of aborting the host
//! - Transfers pass spend-limit, cooldown and policy interceptors
//! - Optional JSONL audit trail of every tool call

pub mod actions;
pub mod config;
pub mod interceptors;
pub mod plugins;
pub mod runner;
pub mod runtime;
pub mod state;
pub mod tokens;
pub mod tools;
pub mod wallet;

mod error;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use config::{Config, EnvSettings, MapSettings, SettingsProvider};
pub use error::{Error, Result};
pub use runner::AgentRunner;
