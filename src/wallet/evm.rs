//! EVM wallet client
//!
//! Binds a [`SecureWallet`] to one network and RPC endpoint and exposes only
//! the operations the reward action needs: address, balances, ERC-20 transfer.
//! Transfers are serialized per wallet so concurrent dispatches never race on
//! the account nonce.

use crate::config::rpc::{self, Network};
use crate::config::{keys, require_all, SettingsProvider};
use crate::tokens::{format_units, parse_base_units, TokenSpec};
use crate::tools::types::{TransferReceipt, TransferRequest};
use crate::wallet::{SecureWallet, TransactionSimulator};
use crate::{Error, Result};
use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolCall;
use tokio::sync::Mutex;
use tracing::{info, warn};
use url::Url;

alloy::sol! {
    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256);
        function transfer(address to, uint256 amount) external returns (bool);
    }
}

pub struct EvmWallet {
    signer: SecureWallet,
    network: Network,
    rpc_url: Url,
    simulator: Option<TransactionSimulator>,
    send_lock: Mutex<()>,
}

impl EvmWallet {
    /// Bind from `EVM_PRIVATE_KEY` and `EVM_PROVIDER_URL`.
    ///
    /// Validates both settings (naming every absent one) without touching the
    /// network.
    pub fn bind(
        settings: &dyn SettingsProvider,
        network: Network,
        simulate_before_send: bool,
    ) -> Result<Self> {
        require_all(settings, &[keys::EVM_PRIVATE_KEY, keys::EVM_PROVIDER_URL])?;
        let signer = SecureWallet::from_settings(settings)?;
        let rpc_url = rpc::provider_url(settings)?;

        let simulator = simulate_before_send.then(|| TransactionSimulator::new(rpc_url.clone()));

        info!(
            address = %signer.address(),
            network = network.display_name(),
            simulate = simulate_before_send,
            "Bound EVM wallet"
        );

        Ok(Self {
            signer,
            network,
            rpc_url,
            simulator,
            send_lock: Mutex::new(()),
        })
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Native currency balance in wei
    pub async fn native_balance(&self) -> Result<U256> {
        let provider = ProviderBuilder::new().connect_http(self.rpc_url.clone());
        provider
            .get_balance(self.address())
            .await
            .map_err(|e| Error::ToolInvocation(format!("Failed to get balance: {}", e)))
    }

    /// ERC-20 balance in base units
    pub async fn token_balance(&self, token: &TokenSpec) -> Result<U256> {
        let provider = ProviderBuilder::new().connect_http(self.rpc_url.clone());
        let calldata = IERC20::balanceOfCall {
            owner: self.address(),
        }
        .abi_encode();

        let tx = TransactionRequest::default()
            .to(token.address)
            .input(Bytes::from(calldata).into());

        let result = provider.call(tx).await.map_err(|e| {
            Error::ToolInvocation(format!("Failed to get {} balance: {}", token.symbol, e))
        })?;

        Ok(if result.len() >= 32 {
            U256::from_be_slice(&result[..32])
        } else {
            U256::ZERO
        })
    }

    /// Send `request.amount` base units of `request.token` to `request.to`.
    ///
    /// Holds the per-wallet send lock from the balance check until the receipt
    /// is in.
    pub async fn transfer(&self, request: &TransferRequest) -> Result<TransferReceipt> {
        let token = &request.token;
        let amount = parse_base_units(&request.amount).ok_or_else(|| {
            Error::ToolInvocation(format!(
                "Invalid amount '{}': expected integer base units",
                request.amount
            ))
        })?;
        if token.chain_id != self.network.chain_id() {
            return Err(Error::ToolInvocation(format!(
                "{} is configured for chain {} but the wallet is on {}",
                token.symbol,
                token.chain_id,
                self.network.display_name()
            )));
        }

        let from = self.address();
        let calldata = Bytes::from(
            IERC20::transferCall {
                to: request.to,
                amount,
            }
            .abi_encode(),
        );

        let _guard = self.send_lock.lock().await;

        let balance = self.token_balance(token).await?;
        if balance < amount {
            return Err(Error::ToolInvocation(format!(
                "Insufficient {} balance: have {}, need {}",
                token.symbol,
                format_units(balance, token.decimals as u32),
                format_units(amount, token.decimals as u32)
            )));
        }

        if let Some(simulator) = &self.simulator {
            let simulation = simulator
                .simulate(from, token.address, calldata.clone(), U256::ZERO)
                .await?;
            if !simulation.success {
                let reason = simulation
                    .revert_reason
                    .unwrap_or_else(|| "execution reverted".to_string());
                warn!(token = %token.symbol, to = %request.to, reason = %reason, "Transfer simulation reverted");
                return Err(Error::ToolInvocation(format!(
                    "Transfer simulation reverted: {}",
                    reason
                )));
            }
        }

        let provider = ProviderBuilder::new()
            .wallet(self.signer.wallet().clone())
            .connect_http(self.rpc_url.clone());

        let tx = TransactionRequest::default()
            .from(from)
            .to(token.address)
            .input(calldata.into());

        let pending = provider
            .send_transaction(tx)
            .await
            .map_err(|e| Error::ToolInvocation(format!("Failed to send transfer: {}", e)))?;
        let tx_hash = *pending.tx_hash();
        info!(tx_hash = %tx_hash, token = %token.symbol, to = %request.to, "Transfer broadcast");
        // Broadcast already happened; a lost receipt is not a failed transfer
        let receipt = pending.get_receipt().await.map_err(|e| {
            Error::OutcomeUnknown(format!(
                "Transfer {} was sent but not confirmed: {}",
                tx_hash, e
            ))
        })?;

        if !receipt.status() {
            return Err(Error::ToolInvocation(format!(
                "Transfer reverted in transaction {}",
                receipt.transaction_hash
            )));
        }

        info!(
            tx_hash = %receipt.transaction_hash,
            token = %token.symbol,
            to = %request.to,
            amount = %request.amount,
            "Transfer confirmed"
        );

        Ok(TransferReceipt {
            tx_hash: receipt.transaction_hash,
            from,
            to: request.to,
            token: token.symbol.clone(),
            amount: request.amount.clone(),
            decimals: token.decimals,
            chain_id: token.chain_id,
            block_number: receipt.block_number,
        })
    }
}

impl std::fmt::Debug for EvmWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvmWallet")
            .field("address", &self.address())
            .field("network", &self.network)
            .field("simulate", &self.simulator.is_some())
            .finish()
    }
}
