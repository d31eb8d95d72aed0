//! Pre-send simulation via `eth_call`
//!
//! Runs the exact transfer calldata against the latest block before the wallet
//! signs anything, so a revert (insufficient balance, paused token) surfaces as
//! an error instead of a failed on-chain transaction.
//!
//! SECURITY NOTE:
//! - Read-only: never signs or submits
//! - Uses the wallet's public address only

use crate::{Error, Result};
use alloy::hex;
use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use serde::{Deserialize, Serialize};
use url::Url;

/// Result of simulating a transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub success: bool,
    /// Estimated gas (if successful)
    pub gas_used: Option<u64>,
    /// Revert reason (if failed)
    pub revert_reason: Option<String>,
}

impl SimulationResult {
    pub fn success(gas_used: u64) -> Self {
        Self {
            success: true,
            gas_used: Some(gas_used),
            revert_reason: None,
        }
    }

    pub fn failed(reason: String) -> Self {
        Self {
            success: false,
            gas_used: None,
            revert_reason: Some(reason),
        }
    }
}

/// Transaction simulator bound to one RPC endpoint
#[derive(Debug, Clone)]
pub struct TransactionSimulator {
    rpc_url: Url,
}

impl TransactionSimulator {
    pub fn new(rpc_url: Url) -> Self {
        Self { rpc_url }
    }

    /// Simulate a call; RPC transport failures are errors, reverts are a
    /// failed [`SimulationResult`].
    pub async fn simulate(
        &self,
        from: Address,
        to: Address,
        data: Bytes,
        value: U256,
    ) -> Result<SimulationResult> {
        let provider = ProviderBuilder::new().connect_http(self.rpc_url.clone());

        let tx = TransactionRequest::default()
            .from(from)
            .to(to)
            .input(data.into())
            .value(value);

        match provider.call(tx.clone()).await {
            Ok(_) => {
                let gas_estimate = provider.estimate_gas(tx).await.unwrap_or(0);
                tracing::debug!(gas = gas_estimate, to = %to, "Simulation succeeded");
                Ok(SimulationResult::success(gas_estimate))
            }
            Err(e) => {
                let message = e.to_string();
                if is_transport_error(&message) {
                    return Err(Error::ToolInvocation(format!(
                        "Simulation RPC failed: {}",
                        message
                    )));
                }
                Ok(SimulationResult::failed(parse_revert_reason(&message)))
            }
        }
    }
}

fn is_transport_error(error: &str) -> bool {
    let lowered = error.to_lowercase();
    !lowered.contains("revert")
        && (lowered.contains("error sending request")
            || lowered.contains("connection")
            || lowered.contains("timed out"))
}

/// Extract a human-readable revert reason from an RPC error message
fn parse_revert_reason(error: &str) -> String {
    if error.contains("execution reverted") {
        if let Some(start) = error.find("revert: ") {
            let reason = &error[start + 8..];
            if let Some(end) = reason.find('"') {
                return reason[..end].to_string();
            }
            return reason.to_string();
        }
        if let Some(start) = error.find("0x") {
            let hex_data = &error[start..];
            let end = hex_data
                .find(|c: char| !c.is_ascii_hexdigit() && c != 'x')
                .unwrap_or(hex_data.len());
            let data = &hex_data[..end];
            // Error(string) selector
            if data.starts_with("0x08c379a0") && data.len() > 138 {
                if let Ok(decoded) = hex::decode(&data[138..]) {
                    let filtered: Vec<u8> = decoded.into_iter().filter(|&b| b != 0).collect();
                    if let Ok(s) = String::from_utf8(filtered) {
                        return s;
                    }
                }
            }
            return format!("Reverted with data: {}", data);
        }
        return "execution reverted".to_string();
    }

    error.to_string()
}
