//! Wallet signing capability.
//!
//! A [`Wallet`] pairs a public address with the local private-key signer
//! that controls it. The key never leaves this type: `Debug` prints only the
//! address.

use alloy::network::EthereumWallet;
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use std::fmt;
use thiserror::Error;

/// Failure to turn a credential into a signer.
#[derive(Debug, Clone, Error)]
pub enum WalletError {
    #[error("private key is not valid hex: {0}")]
    InvalidHex(String),

    #[error("private key must be 32 bytes, got {0}")]
    InvalidLength(usize),

    #[error("private key rejected: {0}")]
    InvalidKey(String),
}

/// Identity plus signing capability of one scheduled wallet.
#[derive(Clone)]
pub struct Wallet {
    address: Address,
    signer: PrivateKeySigner,
}

impl Wallet {
    /// Parse a hex private key (with or without `0x` prefix).
    pub fn from_private_key(private_key: &str) -> Result<Self, WalletError> {
        let key_str = private_key.trim().trim_start_matches("0x");
        let bytes = hex::decode(key_str).map_err(|e| WalletError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(WalletError::InvalidLength(bytes.len()));
        }

        let signer = PrivateKeySigner::from_slice(&bytes)
            .map_err(|e| WalletError::InvalidKey(e.to_string()))?;

        Ok(Self {
            address: signer.address(),
            signer,
        })
    }

    /// Wallet backed by a freshly generated key.
    pub fn random() -> Self {
        let signer = PrivateKeySigner::random();
        Self {
            address: signer.address(),
            signer,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Network wallet used to fill signatures on outgoing transactions.
    pub fn network_wallet(&self) -> EthereumWallet {
        EthereumWallet::from(self.signer.clone())
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
