//! The chain collaborator seen by the looper.
//!
//! [`ChainGateway`] is the narrow surface the controller drives: balance
//! reads, two pool views, and submit/confirm for transactions. The
//! production implementation is [`crate::AlloyGateway`]; tests substitute
//! an in-memory chain.

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::contracts::TxIntent;
use crate::signer::Wallet;

/// Errors surfaced by the gateway.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Transport or node-side failure of a call.
    #[error("rpc error: {0}")]
    Rpc(String),

    /// The configured endpoint could not be parsed.
    #[error("invalid rpc url: {0}")]
    InvalidUrl(String),

    /// No receipt appeared within the confirmation window.
    #[error("transaction {tx_hash} not confirmed within {timeout:?}")]
    ConfirmationTimeout { tx_hash: B256, timeout: Duration },
}

impl GatewayError {
    pub fn rpc(err: impl std::fmt::Display) -> Self {
        Self::Rpc(err.to_string())
    }
}

/// Raw `getUserAccountData` result. Base amounts are in the oracle's base
/// currency, `health_factor` is WAD-scaled (1e18).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UserAccountData {
    pub total_collateral_base: U256,
    pub total_debt_base: U256,
    pub available_borrows_base: U256,
    pub current_liquidation_threshold: U256,
    pub ltv: U256,
    pub health_factor: U256,
}

/// Inclusion result of a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    pub tx_hash: B256,
    /// Receipt status (false = reverted)
    pub success: bool,
    pub block_number: Option<u64>,
    pub gas_used: u64,
}

/// Read and submit operations against the lending deployment.
#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// Native asset balance of `account`.
    async fn native_balance(&self, account: Address) -> Result<U256, GatewayError>;

    /// ERC20 balance of `account` in `token`.
    async fn token_balance(&self, token: Address, account: Address) -> Result<U256, GatewayError>;

    /// Current eMode category of `account`.
    async fn user_emode(&self, account: Address) -> Result<u8, GatewayError>;

    /// Pool account data of `account`.
    async fn user_account_data(&self, account: Address) -> Result<UserAccountData, GatewayError>;

    /// Sign and broadcast `intent` from `wallet`. Returns the transaction hash
    /// without waiting for inclusion.
    async fn submit(&self, wallet: &Wallet, intent: &TxIntent) -> Result<B256, GatewayError>;

    /// Block until `tx_hash` is included and report its status.
    async fn await_confirmation(&self, tx_hash: B256) -> Result<Confirmation, GatewayError>;
}
