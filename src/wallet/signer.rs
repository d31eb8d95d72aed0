//! Secure key holder
//!
//! SECURITY: This is the ONLY place where the private key exists.
//! - Held in alloy's PrivateKeySigner
//! - Never serialized, never logged (manual Debug)
//! - Only reachable through signing operations

use crate::config::{keys, SettingsProvider};
use crate::{Error, Result};
use alloy::network::EthereumWallet;
use alloy::primitives::{Address, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::{Signature, SignerSync};

pub struct SecureWallet {
    signer: PrivateKeySigner,
    address: Address,
    wallet: EthereumWallet,
}

impl SecureWallet {
    /// Load the key from `EVM_PRIVATE_KEY`.
    ///
    /// Absent → `MissingSetting`; malformed → `InvalidSetting` naming the key.
    pub fn from_settings(settings: &dyn SettingsProvider) -> Result<Self> {
        let key = settings
            .get(keys::EVM_PRIVATE_KEY)
            .ok_or_else(|| Error::MissingSetting(keys::EVM_PRIVATE_KEY.to_string()))?;
        Self::from_hex(&key)
    }

    /// Create a wallet from a `0x`-prefixed 32-byte hex key
    pub fn from_hex(key: &str) -> Result<Self> {
        let key = validate_private_key(key.trim())?;

        let signer: PrivateKeySigner = key
            .parse()
            .map_err(|e| Error::invalid_setting(keys::EVM_PRIVATE_KEY, format!("{}", e)))?;

        let address = signer.address();
        let wallet = EthereumWallet::from(signer.clone());

        Ok(Self {
            signer,
            address,
            wallet,
        })
    }

    /// Public address (safe to share)
    pub fn address(&self) -> Address {
        self.address
    }

    /// Signing wallet for alloy providers; exposes signing only
    pub fn wallet(&self) -> &EthereumWallet {
        &self.wallet
    }

    /// Sign a 32-byte digest (e.g. an EIP-712 signing hash)
    pub async fn sign_hash(&self, hash: &B256) -> Result<Signature> {
        self.signer
            .sign_hash_sync(hash)
            .map_err(|e| Error::Wallet(format!("Signing failed: {}", e)))
    }
}

/// Shape check: `0x` prefix, 66 characters, hex body
fn validate_private_key(key: &str) -> Result<&str> {
    let body = key.strip_prefix("0x").ok_or_else(|| {
        Error::invalid_setting(keys::EVM_PRIVATE_KEY, "must start with '0x'")
    })?;
    if key.len() != 66 {
        return Err(Error::invalid_setting(
            keys::EVM_PRIVATE_KEY,
            "must be 32 bytes (64 characters) plus '0x' prefix",
        ));
    }
    if !body.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::invalid_setting(
            keys::EVM_PRIVATE_KEY,
            "must be hex encoded",
        ));
    }
    Ok(body)
}

impl std::fmt::Debug for SecureWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureWallet")
            .field("address", &self.address)
            .field("signer", &"[REDACTED]")
            .finish()
    }
}
