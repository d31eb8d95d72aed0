//! EVM network catalogue and provider URL handling
//!
//! The wallet binding resolves its chain from [`Network`] and its RPC endpoint
//! from the `EVM_PROVIDER_URL` setting:
//!
//! ```bash
//! export EVM_PROVIDER_URL="https://arb-sepolia.g.alchemy.com/v2/YOUR_KEY"
//! ```

use crate::config::{keys, SettingsProvider};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Chain ID constants
pub mod chains {
    pub const ETHEREUM: u64 = 1;
    pub const POLYGON: u64 = 137;
    pub const BASE: u64 = 8453;
    pub const ARBITRUM: u64 = 42161;
    pub const ARBITRUM_SEPOLIA: u64 = 421614;
}

/// Supported EVM networks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Network {
    Ethereum,
    Polygon,
    Base,
    Arbitrum,
    ArbitrumSepolia,
}

impl Network {
    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Ethereum => chains::ETHEREUM,
            Network::Polygon => chains::POLYGON,
            Network::Base => chains::BASE,
            Network::Arbitrum => chains::ARBITRUM,
            Network::ArbitrumSepolia => chains::ARBITRUM_SEPOLIA,
        }
    }

    /// Human readable name, used in provider output
    pub fn display_name(&self) -> &'static str {
        match self {
            Network::Ethereum => "Ethereum",
            Network::Polygon => "Polygon",
            Network::Base => "Base",
            Network::Arbitrum => "Arbitrum One",
            Network::ArbitrumSepolia => "Arbitrum Sepolia",
        }
    }

    pub fn native_symbol(&self) -> &'static str {
        match self {
            Network::Polygon => "POL",
            _ => "ETH",
        }
    }

    pub fn from_chain_id(chain_id: u64) -> Option<Self> {
        match chain_id {
            chains::ETHEREUM => Some(Network::Ethereum),
            chains::POLYGON => Some(Network::Polygon),
            chains::BASE => Some(Network::Base),
            chains::ARBITRUM => Some(Network::Arbitrum),
            chains::ARBITRUM_SEPOLIA => Some(Network::ArbitrumSepolia),
            _ => None,
        }
    }
}

/// Read and validate `EVM_PROVIDER_URL`.
///
/// The URL is only parsed here; no connection is attempted.
pub fn provider_url(settings: &dyn SettingsProvider) -> Result<Url> {
    let raw = settings
        .get(keys::EVM_PROVIDER_URL)
        .ok_or_else(|| Error::MissingSetting(keys::EVM_PROVIDER_URL.to_string()))?;
    parse_provider_url(&raw)
}

fn parse_provider_url(raw: &str) -> Result<Url> {
    let url: Url = raw
        .trim()
        .parse()
        .map_err(|e| Error::invalid_setting(keys::EVM_PROVIDER_URL, format!("{}", e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(Error::invalid_setting(
            keys::EVM_PROVIDER_URL,
            format!("unsupported scheme '{}', expected http or https", other),
        )),
    }
}
