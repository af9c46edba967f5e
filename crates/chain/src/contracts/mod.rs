//! Contract bindings and the transaction vocabulary of the looper.
//!
//! Every state-changing step a wallet takes is a [`TxIntent`]. An intent is
//! protocol-agnostic until it is encoded against a [`ProtocolContracts`]
//! set, which yields the `(to, calldata, value)` triple the sender signs.

pub mod aave_v3;
pub mod common;

pub use aave_v3::IPool;
pub use common::{IWrappedNative, IERC20};

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolCall;
use std::fmt;

/// Addresses of the lending deployment a run operates on.
///
/// A run uses a single collateral/debt asset pair: the wrapped native
/// token, its collateral-receipt (aToken) and its variable-debt token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolContracts {
    /// Lending pool
    pub pool: Address,
    /// Wrapped native token (supplied and borrowed asset)
    pub wrapped_native: Address,
    /// aToken minted for supplied wrapped native
    pub collateral_token: Address,
    /// Variable-debt token for borrowed wrapped native
    pub debt_token: Address,
}

/// Kind of transaction, used for logging and error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxKind {
    Wrap,
    Approve,
    Supply,
    Borrow,
    Repay,
    Withdraw,
    SetEMode,
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TxKind::Wrap => "wrap",
            TxKind::Approve => "approve",
            TxKind::Supply => "supply",
            TxKind::Borrow => "borrow",
            TxKind::Repay => "repay",
            TxKind::Withdraw => "withdraw",
            TxKind::SetEMode => "set-emode",
        };
        f.write_str(name)
    }
}

/// A single state-changing transaction a wallet submits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxIntent {
    /// Convert native asset into the wrapped token.
    Wrap { amount: U256 },
    /// Allow the pool to pull `amount` of `token`.
    Approve { token: Address, amount: U256 },
    /// Supply `amount` of `asset` as collateral.
    Supply { asset: Address, amount: U256 },
    /// Borrow `amount` of `asset` at variable rate.
    Borrow { asset: Address, amount: U256 },
    /// Repay `amount` of variable-rate `asset` debt.
    Repay { asset: Address, amount: U256 },
    /// Withdraw `amount` of supplied `asset`.
    Withdraw { asset: Address, amount: U256 },
    /// Select the user's eMode category.
    SetEMode { category: u8 },
}

/// Encoded transaction ready to be signed.
#[derive(Debug, Clone)]
pub struct EncodedTx {
    pub to: Address,
    pub calldata: Bytes,
    pub value: U256,
    pub gas_limit: u64,
}

impl TxIntent {
    pub fn kind(&self) -> TxKind {
        match self {
            TxIntent::Wrap { .. } => TxKind::Wrap,
            TxIntent::Approve { .. } => TxKind::Approve,
            TxIntent::Supply { .. } => TxKind::Supply,
            TxIntent::Borrow { .. } => TxKind::Borrow,
            TxIntent::Repay { .. } => TxKind::Repay,
            TxIntent::Withdraw { .. } => TxKind::Withdraw,
            TxIntent::SetEMode { .. } => TxKind::SetEMode,
        }
    }

    /// Amount moved by this transaction (zero for eMode selection).
    pub fn amount(&self) -> U256 {
        match self {
            TxIntent::Wrap { amount }
            | TxIntent::Approve { amount, .. }
            | TxIntent::Supply { amount, .. }
            | TxIntent::Borrow { amount, .. }
            | TxIntent::Repay { amount, .. }
            | TxIntent::Withdraw { amount, .. } => *amount,
            TxIntent::SetEMode { .. } => U256::ZERO,
        }
    }

    /// Fixed gas limit per transaction kind.
    pub fn gas_limit(&self) -> u64 {
        match self.kind() {
            TxKind::Wrap => 300_000,
            TxKind::Approve => 100_000,
            TxKind::Supply => 300_000,
            TxKind::Borrow => 400_000,
            TxKind::Repay => 300_000,
            TxKind::Withdraw => 300_000,
            TxKind::SetEMode => 150_000,
        }
    }

    /// Encode against a deployment on behalf of `account`.
    pub fn encode(&self, contracts: &ProtocolContracts, account: Address) -> EncodedTx {
        let (to, calldata, value) = match *self {
            TxIntent::Wrap { amount } => (
                contracts.wrapped_native,
                IWrappedNative::depositCall { amount }.abi_encode(),
                amount,
            ),
            TxIntent::Approve { token, amount } => (
                token,
                IERC20::approveCall {
                    spender: contracts.pool,
                    amount,
                }
                .abi_encode(),
                U256::ZERO,
            ),
            TxIntent::Supply { asset, amount } => (
                contracts.pool,
                IPool::supplyCall {
                    asset,
                    amount,
                    onBehalfOf: account,
                    referralCode: aave_v3::REFERRAL_CODE,
                }
                .abi_encode(),
                U256::ZERO,
            ),
            TxIntent::Borrow { asset, amount } => (
                contracts.pool,
                IPool::borrowCall {
                    asset,
                    amount,
                    interestRateMode: U256::from(aave_v3::VARIABLE_RATE_MODE),
                    referralCode: aave_v3::REFERRAL_CODE,
                    onBehalfOf: account,
                }
                .abi_encode(),
                U256::ZERO,
            ),
            TxIntent::Repay { asset, amount } => (
                contracts.pool,
                IPool::repayCall {
                    asset,
                    amount,
                    interestRateMode: U256::from(aave_v3::VARIABLE_RATE_MODE),
                    onBehalfOf: account,
                }
                .abi_encode(),
                U256::ZERO,
            ),
            TxIntent::Withdraw { asset, amount } => (
                contracts.pool,
                IPool::withdrawCall {
                    asset,
                    amount,
                    to: account,
                }
                .abi_encode(),
                U256::ZERO,
            ),
            TxIntent::SetEMode { category } => (
                contracts.pool,
                IPool::setUserEModeCall {
                    categoryId: category,
                }
                .abi_encode(),
                U256::ZERO,
            ),
        };

        EncodedTx {
            to,
            calldata: Bytes::from(calldata),
            value,
            gas_limit: self.gas_limit(),
        }
    }
}
