//! Shared token registry
//!
//! Single source of truth for token metadata (addresses, decimals, symbols)
//! used by the reward transfer binding, the spend limit guard and the
//! Polymarket order builder.

use alloy::primitives::{address, Address, U256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use crate::config::rpc::chains;

/// Reward per completed exercise: 0.1 ACC (18 decimals)
pub const EXERCISE_REWARD_AMOUNT: &str = "100000000000000000";

/// Decimals used by Polymarket for both collateral and outcome shares
pub const POLYMARKET_DECIMALS: u8 = 6;

/// Well-known token addresses
pub mod addresses {
    use super::*;

    /// AIccountabilityToken on Arbitrum Sepolia
    pub const ACC_ARB_SEPOLIA: Address = address!("4c0b83dba97884f81930721afdb68c3dee62c94c");
    /// USDC.e on Polygon (Polymarket collateral)
    pub const USDC_POLYGON: Address = address!("2791bca1f2de4661ed88a30c99a7a9449aa84174");
}

/// Token metadata bound to one chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSpec {
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    pub chain_id: u64,
    pub address: Address,
}

impl TokenSpec {
    pub fn new(symbol: &str, name: &str, decimals: u8, chain_id: u64, address: Address) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            decimals,
            chain_id,
            address,
        }
    }

    /// Same token metadata at a different contract address
    pub fn at(&self, address: Address) -> Self {
        Self {
            address,
            ..self.clone()
        }
    }
}

/// Token registry keyed by (chain id, upper-case symbol)
pub struct TokenRegistry {
    tokens: HashMap<(u64, String), TokenSpec>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        let mut tokens = HashMap::new();

        let acc = TokenSpec::new(
            "ACC",
            "AIccountabilityToken",
            18,
            chains::ARBITRUM_SEPOLIA,
            addresses::ACC_ARB_SEPOLIA,
        );
        tokens.insert((acc.chain_id, acc.symbol.clone()), acc);

        let usdc = TokenSpec::new(
            "USDC",
            "USD Coin (PoS)",
            POLYMARKET_DECIMALS,
            chains::POLYGON,
            addresses::USDC_POLYGON,
        );
        tokens.insert((usdc.chain_id, usdc.symbol.clone()), usdc);

        Self { tokens }
    }

    pub fn get(&self, chain_id: u64, symbol: &str) -> Option<&TokenSpec> {
        self.tokens.get(&(chain_id, symbol.to_uppercase()))
    }

    /// Look up a token by contract address on a chain
    pub fn by_address(&self, chain_id: u64, address: &Address) -> Option<&TokenSpec> {
        self.tokens
            .values()
            .find(|t| t.chain_id == chain_id && &t.address == address)
    }
}

impl Default for TokenRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Global token registry instance
pub fn registry() -> &'static TokenRegistry {
    use once_cell::sync::Lazy;
    static REGISTRY: Lazy<TokenRegistry> = Lazy::new(TokenRegistry::new);
    &REGISTRY
}

/// Parse a decimal-integer base-unit string (e.g. "100000000000000000")
pub fn parse_base_units(amount: &str) -> Option<U256> {
    let amount = amount.trim();
    if amount.is_empty() || !amount.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    U256::from_str_radix(amount, 10).ok()
}

/// Convert a human decimal (e.g. "0.75") into integer units with `decimals`
/// places. Rejects more fractional digits than `decimals` rather than rounding.
pub fn parse_decimal_units(value: &str, decimals: u8) -> Option<U256> {
    let value = value.trim();
    let (whole, fraction) = match value.split_once('.') {
        Some((w, f)) => (w, f),
        None => (value, ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    if fraction.len() > decimals as usize {
        return None;
    }

    let padded = format!(
        "{}{:0<width$}",
        if whole.is_empty() { "0" } else { whole },
        fraction,
        width = decimals as usize
    );
    U256::from_str(&padded).ok()
}

/// Format a U256 value with decimals
pub fn format_units(value: U256, decimals: u32) -> String {
    if value.is_zero() {
        return "0".to_string();
    }

    let divisor = U256::from(10).pow(U256::from(decimals));
    let whole = value / divisor;
    let remainder = value % divisor;

    if remainder.is_zero() {
        whole.to_string()
    } else {
        let remainder_str = format!("{:0>width$}", remainder, width = decimals as usize);
        let trimmed = remainder_str.trim_end_matches('0');
        if trimmed.is_empty() {
            whole.to_string()
        } else {
            format!("{}.{}", whole, trimmed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup() {
        let acc = registry().get(chains::ARBITRUM_SEPOLIA, "acc").unwrap();
        assert_eq!(acc.decimals, 18);
        assert_eq!(acc.address, addresses::ACC_ARB_SEPOLIA);

        assert!(registry().get(chains::ETHEREUM, "ACC").is_none());

        let usdc = registry()
            .by_address(chains::POLYGON, &addresses::USDC_POLYGON)
            .unwrap();
        assert_eq!(usdc.symbol, "USDC");
    }

    #[test]
    fn test_format_units() {
        let reward = parse_base_units(EXERCISE_REWARD_AMOUNT).unwrap();
        assert_eq!(format_units(reward, 18), "0.1");

        let one_point_five = U256::from(1_500_000_000_000_000_000u128);
        assert_eq!(format_units(one_point_five, 18), "1.5");

        assert_eq!(format_units(U256::from(1_000_000_000u64), 6), "1000");
        assert_eq!(format_units(U256::ZERO, 18), "0");
    }

    #[test]
    fn test_parse_base_units_rejects_non_integers() {
        assert_eq!(parse_base_units("42"), Some(U256::from(42)));
        assert_eq!(parse_base_units("0.1"), None);
        assert_eq!(parse_base_units("-1"), None);
        assert_eq!(parse_base_units("1e18"), None);
        assert_eq!(parse_base_units(""), None);
    }

    #[test]
    fn test_parse_decimal_units() {
        assert_eq!(parse_decimal_units("0.75", 6), Some(U256::from(750_000)));
        assert_eq!(parse_decimal_units(".6", 6), Some(U256::from(600_000)));
        assert_eq!(parse_decimal_units("100", 6), Some(U256::from(100_000_000)));
        assert_eq!(parse_decimal_units("0.1234567", 6), None);
        assert_eq!(parse_decimal_units("abc", 6), None);
        assert_eq!(parse_decimal_units(".", 6), None);
    }
}
