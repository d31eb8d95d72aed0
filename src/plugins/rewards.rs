//! Exercise rewards
//!
//! `SEND_TOKEN` pays a fixed ACC reward on Arbitrum Sepolia to the address
//! found in the user's message.

use crate::actions::{
    extract, ActionDescriptor, ActionExample, ActionHandler, ExtractionContext, Templates,
};
use crate::config::{RewardsConfig, SettingsProvider};
use crate::plugins::{unexpected_call, BoundTools, PluginFactory, Provider};
use crate::runtime::{AgentRuntime, Memory};
use crate::tokens::{format_units, parse_base_units, registry, TokenSpec};
use crate::tools::{ActionContent, TokenTransfer, ToolCall, TransferRequest};
use crate::wallet::EvmWallet;
use crate::{Error, Result};
use alloy::primitives::Address;
use async_trait::async_trait;
use std::str::FromStr;
use std::sync::Arc;

pub const SEND_TOKEN: &str = "SEND_TOKEN";

const REWARDS_INVOCATION_TEMPLATE: &str = "# Knowledge
{{knowledge}}

About {{agentName}}:
{{bio}}
{{lore}}

{{providers}}

{{attachments}}

# Action: {{actionName}}
{{actionDescription}}

# Exercise Reward Context
- AIccountabilityToken (ACC) is awarded for completing exercises
- Rewards are sent on Arbitrum Sepolia network
- This encourages healthy habits through blockchain rewards

{{recentMessages}}

Based on the action chosen and the previous messages, execute the action and respond to the user using the tools you were given. For exercise completion, send ACC tokens as a reward.";

pub struct RewardsPlugin {
    config: RewardsConfig,
}

impl RewardsPlugin {
    pub fn new(config: RewardsConfig) -> Self {
        Self { config }
    }

    /// Resolve the reward token and amount from config
    fn reward(&self) -> Result<(TokenSpec, String)> {
        let network = self.config.network;
        let mut token = registry()
            .get(network.chain_id(), &self.config.token_symbol)
            .cloned()
            .ok_or_else(|| {
                Error::Config(format!(
                    "Unknown reward token {} on {}",
                    self.config.token_symbol,
                    network.display_name()
                ))
            })?;

        if let Some(raw) = &self.config.token_address {
            let address = Address::from_str(raw)
                .map_err(|e| Error::Config(format!("Invalid reward token address {}: {}", raw, e)))?;
            token = token.at(address);
        }

        let amount = self.config.reward_amount.trim();
        if parse_base_units(amount).is_none() {
            return Err(Error::Config(format!(
                "Reward amount '{}' must be an integer in base units",
                self.config.reward_amount
            )));
        }

        Ok((token, amount.to_string()))
    }

    /// Handlers and providers around an already bound wallet
    pub fn tools(&self, wallet: Arc<dyn TokenTransfer>) -> Result<BoundTools> {
        let (token, amount) = self.reward()?;
        Ok(BoundTools::new()
            .with_handler(
                SEND_TOKEN,
                Arc::new(SendTokenHandler {
                    wallet: wallet.clone(),
                    token,
                    amount,
                }),
            )
            .with_provider(Arc::new(WalletProvider { wallet })))
    }
}

#[async_trait]
impl PluginFactory for RewardsPlugin {
    fn name(&self) -> &str {
        "[GOAT] Exercise Rewards"
    }

    fn description(&self) -> &str {
        "AIccountabilityToken rewards for exercise completion on Arbitrum Sepolia"
    }

    fn disabled_label(&self) -> &str {
        "AIccountabilityToken rewards plugin"
    }

    fn descriptors(&self) -> Vec<ActionDescriptor> {
        vec![ActionDescriptor::new(
            SEND_TOKEN,
            "Send AIccountabilityToken (ACC) as a reward for exercise completion",
        )
        .with_similes(&[
            "Like giving a fitness achievement medal",
            "Similar to earning rewards for workout completion",
            "Like getting tokens for staying healthy",
        ])
        .with_examples(vec![
            ActionExample::new(
                "I just completed a 30-minute workout!",
                "Great work! Let me send you some ACC tokens as a reward. What's your wallet address?",
                None,
            ),
            ActionExample::new(
                "Here's my address: 0x123... I did my exercises today!",
                "Excellent! Sending your ACC reward now.",
                Some(SEND_TOKEN),
            ),
        ])]
    }

    fn templates(&self) -> Templates {
        Templates::default().with_invocation(REWARDS_INVOCATION_TEMPLATE)
    }

    async fn bind(&self, settings: &dyn SettingsProvider) -> Result<BoundTools> {
        // Validate token config before touching key material
        self.reward()?;
        let wallet = EvmWallet::bind(
            settings,
            self.config.network,
            self.config.simulate_before_send,
        )?;
        self.tools(Arc::new(wallet))
    }
}

struct SendTokenHandler {
    wallet: Arc<dyn TokenTransfer>,
    token: TokenSpec,
    /// Base units
    amount: String,
}

#[async_trait]
impl ActionHandler for SendTokenHandler {
    async fn extract(&self, ctx: &ExtractionContext<'_>) -> Result<ToolCall> {
        let to = extract::wallet_address(ctx.message.text())?;
        Ok(ToolCall::Transfer(TransferRequest {
            token: self.token.clone(),
            to,
            amount: self.amount.clone(),
        }))
    }

    async fn invoke(&self, call: &ToolCall) -> Result<ActionContent> {
        match call {
            ToolCall::Transfer(request) => {
                let receipt = self.wallet.transfer(request).await?;
                Ok(ActionContent::Transfer(receipt))
            }
            other => Err(unexpected_call(SEND_TOKEN, other)),
        }
    }
}

/// Renders the reward wallet's address and native balance
struct WalletProvider {
    wallet: Arc<dyn TokenTransfer>,
}

#[async_trait]
impl Provider for WalletProvider {
    fn name(&self) -> &str {
        "evm_wallet"
    }

    async fn get(&self, _runtime: &dyn AgentRuntime, _message: &Memory) -> Result<String> {
        let network = self.wallet.network();
        let balance = self.wallet.native_balance().await?;
        Ok(format!(
            "EVM Wallet Address ({}): {}\nBalance: {} {}",
            network.display_name(),
            self.wallet.address(),
            format_units(balance, 18),
            network.native_symbol()
        ))
    }
}
