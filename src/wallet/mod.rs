//! Wallet management
//!
//! Private key storage, the EVM wallet client used for reward transfers and
//! pre-send simulation. The private key never leaves this module.

mod evm;
mod signer;
mod simulator;

pub use evm::EvmWallet;
pub use signer::SecureWallet;
pub use simulator::{SimulationResult, TransactionSimulator};
