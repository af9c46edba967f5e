//! Error taxonomy of the looper.

use alloy::primitives::{Address, B256, U256};
use looper_chain::{GatewayError, TxKind};
use std::fmt;
use thiserror::Error;

/// Which half of an approve-then-act pair failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxPhase {
    /// The ERC20 approval itself failed; the action was never submitted.
    Approval,
    /// The action failed (after its approval, if any, succeeded).
    Action,
}

impl fmt::Display for TxPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxPhase::Approval => f.write_str("approval"),
            TxPhase::Action => f.write_str("action"),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum LooperError {
    /// Bad or missing policy/deployment parameter. Fatal at startup.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// Schedule references a wallet that was not loaded. Fatal at startup.
    #[error("schedule references unknown wallet {0}")]
    ScheduleInconsistent(Address),

    /// A balance or account read failed; the wallet's loop is aborted.
    #[error("metrics unavailable for {wallet}: {source}")]
    MetricsUnavailable {
        wallet: Address,
        #[source]
        source: GatewayError,
    },

    /// A transaction could not be submitted or was included with failure status.
    #[error("{action} {phase} failed (tx {}): {reason}", display_hash(.tx_hash))]
    TransactionFailed {
        action: TxKind,
        phase: TxPhase,
        tx_hash: Option<B256>,
        reason: String,
    },

    /// The leverage loop stopped making progress or hit its cycle cap.
    #[error("leverage loop did not converge after {cycles} cycles (last borrow {last_amount})")]
    NonConvergence { cycles: u32, last_amount: U256 },

    /// Shutdown was requested between steps.
    #[error("run cancelled")]
    Cancelled,

    /// Wallet or schedule file could not be read or parsed.
    #[error("{path}: {reason}")]
    Io { path: String, reason: String },

    /// Remaining schedule could not be written back.
    #[error("failed to persist schedule to {path}: {reason}")]
    Persistence { path: String, reason: String },
}

fn display_hash(tx_hash: &Option<B256>) -> String {
    match tx_hash {
        Some(hash) => hash.to_string(),
        None => "not submitted".to_string(),
    }
}

impl LooperError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigInvalid(msg.into())
    }
}

pub type Result<T, E = LooperError> = std::result::Result<T, E>;
