//! Token transfer capability

use crate::config::Network;
use crate::tools::types::{TransferReceipt, TransferRequest};
use crate::wallet::EvmWallet;
use crate::Result;
use alloy::primitives::{Address, U256};
use async_trait::async_trait;

/// Transfer-capable wallet handle shared by the reward action and the wallet
/// provider
#[async_trait]
pub trait TokenTransfer: Send + Sync {
    fn address(&self) -> Address;

    fn network(&self) -> Network;

    /// Native currency balance in wei
    async fn native_balance(&self) -> Result<U256>;

    async fn transfer(&self, request: &TransferRequest) -> Result<TransferReceipt>;
}

#[async_trait]
impl TokenTransfer for EvmWallet {
    fn address(&self) -> Address {
        EvmWallet::address(self)
    }

    fn network(&self) -> Network {
        EvmWallet::network(self)
    }

    async fn native_balance(&self) -> Result<U256> {
        EvmWallet::native_balance(self).await
    }

    async fn transfer(&self, request: &TransferRequest) -> Result<TransferReceipt> {
        EvmWallet::transfer(self, request).await
    }
}
