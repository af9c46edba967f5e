//! Structured run events.
//!
//! The controller and run loop report progress as [`LoopEvent`]s through an
//! [`EventSink`]. The default sink renders them as `tracing` records; other
//! sinks can forward them to metrics or alerting.

use alloy::primitives::{Address, B256, U256};
use looper_chain::TxKind;

use crate::error::LooperError;

#[derive(Debug, Clone)]
pub enum LoopEvent {
    LoopStarted {
        wallet: Address,
        strategy: &'static str,
    },
    EModeSet {
        wallet: Address,
        from: u8,
        to: u8,
    },
    TransactionConfirmed {
        wallet: Address,
        kind: TxKind,
        amount: U256,
        tx_hash: B256,
        block: Option<u64>,
        gas_used: u64,
    },
    CycleCompleted {
        wallet: Address,
        cycle: u32,
        borrowed: U256,
    },
    ThresholdReached {
        wallet: Address,
        cycles: u32,
        health_factor: f64,
    },
    HeadroomExhausted {
        wallet: Address,
        cycles: u32,
        health_factor: f64,
    },
    SequenceCompleted {
        wallet: Address,
    },
    WalletFailed {
        wallet: Address,
        cycles: u32,
        error: LooperError,
    },
    WalletCancelled {
        wallet: Address,
        cycles: u32,
    },
}

/// Consumer of run events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: LoopEvent);
}

/// Renders events as structured log records.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: LoopEvent) {
        match event {
            LoopEvent::LoopStarted { wallet, strategy } => {
                tracing::info!(wallet = %wallet, strategy = strategy, "Loop started");
            }
            LoopEvent::EModeSet { wallet, from, to } => {
                tracing::info!(wallet = %wallet, from = from, to = to, "eMode set");
            }
            LoopEvent::TransactionConfirmed {
                wallet,
                kind,
                amount,
                tx_hash,
                block,
                gas_used,
            } => {
                tracing::info!(
                    wallet = %wallet,
                    kind = %kind,
                    amount = %amount,
                    tx_hash = %tx_hash,
                    block = block.unwrap_or(0),
                    gas_used = gas_used,
                    "Transaction confirmed"
                );
            }
            LoopEvent::CycleCompleted {
                wallet,
                cycle,
                borrowed,
            } => {
                tracing::info!(wallet = %wallet, cycle = cycle, borrowed = %borrowed, "Cycle completed");
            }
            LoopEvent::ThresholdReached {
                wallet,
                cycles,
                health_factor,
            } => {
                tracing::info!(
                    wallet = %wallet,
                    cycles = cycles,
                    health_factor = health_factor,
                    "Health factor threshold reached"
                );
            }
            LoopEvent::HeadroomExhausted {
                wallet,
                cycles,
                health_factor,
            } => {
                tracing::info!(
                    wallet = %wallet,
                    cycles = cycles,
                    health_factor = health_factor,
                    "No borrow headroom left"
                );
            }
            LoopEvent::SequenceCompleted { wallet } => {
                tracing::info!(wallet = %wallet, "Fixed sequence completed");
            }
            LoopEvent::WalletFailed {
                wallet,
                cycles,
                error,
            } => {
                tracing::error!(wallet = %wallet, cycles = cycles, error = %error, "Wallet run failed");
            }
            LoopEvent::WalletCancelled { wallet, cycles } => {
                tracing::warn!(wallet = %wallet, cycles = cycles, "Wallet run cancelled");
            }
        }
    }
}

/// Keeps every event in memory.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: parking_lot::Mutex<Vec<LoopEvent>>,
}

#[cfg(test)]
impl RecordingSink {
    pub fn events(&self) -> Vec<LoopEvent> {
        self.events.lock().clone()
    }
}

#[cfg(test)]
impl EventSink for RecordingSink {
    fn emit(&self, event: LoopEvent) {
        self.events.lock().push(event);
    }
}
