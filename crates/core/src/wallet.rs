//! Wallet list loading.
//!
//! The wallet file is a JSON array of `{ "address": "0x..", "pk": "0x.." }`
//! records. Keys are turned into signers immediately and the raw strings are
//! dropped.

use alloy::primitives::Address;
use looper_chain::Wallet;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

use crate::error::{LooperError, Result};

/// One record of the wallet file.
#[derive(Deserialize)]
pub struct WalletRecord {
    pub address: String,
    #[serde(alias = "private_key")]
    pub pk: String,
}

impl WalletRecord {
    /// Build the signer and check it controls the recorded address.
    pub fn into_wallet(self) -> Result<Wallet> {
        let address: Address = self
            .address
            .trim()
            .parse()
            .map_err(|e| LooperError::config(format!("invalid wallet address '{}': {e}", self.address)))?;

        let wallet = Wallet::from_private_key(&self.pk)
            .map_err(|e| LooperError::config(format!("wallet {address}: {e}")))?;

        if wallet.address() != address {
            return Err(LooperError::config(format!(
                "wallet {address}: private key controls {} instead",
                wallet.address()
            )));
        }
        Ok(wallet)
    }
}

/// Parse wallet records from JSON text.
pub fn parse_wallets(json: &str) -> Result<Vec<Wallet>> {
    let records: Vec<WalletRecord> = serde_json::from_str(json)
        .map_err(|e| LooperError::config(format!("malformed wallet list: {e}")))?;

    let mut seen = HashSet::with_capacity(records.len());
    let mut wallets = Vec::with_capacity(records.len());
    for record in records {
        let wallet = record.into_wallet()?;
        if !seen.insert(wallet.address()) {
            return Err(LooperError::config(format!(
                "wallet {} listed more than once",
                wallet.address()
            )));
        }
        wallets.push(wallet);
    }
    Ok(wallets)
}

/// Load the wallet file.
pub fn load_wallets(path: impl AsRef<Path>) -> Result<Vec<Wallet>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| LooperError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let wallets = parse_wallets(&content)?;
    info!(path = %path.display(), count = wallets.len(), "Wallets loaded");
    Ok(wallets)
}
