//! Looper core logic.
//!
//! This crate provides the leverage looper:
//! - Policy, chain and runner configuration
//! - Account metrics derived from live chain reads
//! - The leverage loop controller (eMode, funding, borrow/resupply cycles,
//!   fixed sequence strategy)
//! - Wallet loading and the persisted activation schedule
//! - The polling run loop with cooperative shutdown
//!
//! Targets AAVE V3 style pools on EVM chains.

pub mod config;
mod controller;
mod error;
mod events;
mod metrics;
mod runner;
mod scheduler;
mod shutdown;
pub mod u256_math;
mod wallet;

#[cfg(test)]
mod testing;

pub use config::{
    AppConfig, ChainSettings, EnvLookup, FixedSequence, PolicyParameters, ProcessEnv,
    RunnerSettings, Strategy,
};
pub use controller::{LeverageLoopController, LoopOutcome, Termination};
pub use error::{LooperError, Result, TxPhase};
pub use events::{EventSink, LoopEvent, TracingSink};
pub use metrics::{AccountMetrics, AccountSnapshot};
pub use runner::RunLoop;
pub use scheduler::{SchedulePlan, WalletScheduler};
pub use shutdown::{Shutdown, ShutdownTrigger};
pub use wallet::{load_wallets, parse_wallets, WalletRecord};
