//! Looper chain interaction layer.
//!
//! This crate provides:
//! - The [`ChainGateway`] trait the looper drives (reads, submit, confirm)
//! - An alloy-backed HTTP implementation ([`AlloyGateway`])
//! - Contract bindings for the AAVE V3 pool, ERC20 and the native wrapper
//! - The [`TxIntent`] transaction vocabulary and its calldata encoding
//! - Wallet signing capability

pub mod contracts;
mod gateway;
mod provider;
mod signer;

pub use contracts::{EncodedTx, ProtocolContracts, TxIntent, TxKind};
pub use gateway::{ChainGateway, Confirmation, GatewayError, UserAccountData};
pub use provider::AlloyGateway;
pub use signer::{Wallet, WalletError};
