//! Leverage loop controller.
//!
//! Drives one wallet through a strategy: normalize eMode, fund the position
//! by wrapping and supplying native, then either borrow-and-resupply until
//! the health factor reaches the policy threshold, or run the fixed
//! supply/borrow/repay/withdraw sequence.
//!
//! Every step waits for inclusion before the next one starts, and every
//! decision is taken on a fresh snapshot.

use alloy::primitives::{Address, U256};
use looper_chain::{ChainGateway, Confirmation, ProtocolContracts, TxIntent, TxKind, Wallet};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::config::{FixedSequence, PolicyParameters, Strategy};
use crate::error::{LooperError, Result, TxPhase};
use crate::events::{EventSink, LoopEvent};
use crate::metrics::{AccountMetrics, AccountSnapshot};
use crate::shutdown::Shutdown;

/// Why a wallet's run ended.
#[derive(Debug, Clone)]
pub enum Termination {
    /// Health factor at or below the policy minimum
    ThresholdReached,
    /// Computed borrow amount was zero
    HeadroomExhausted,
    /// Fixed sequence ran to the end
    SequenceCompleted,
    /// Shutdown requested between steps
    Cancelled,
    Failed(LooperError),
}

impl Termination {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Termination::ThresholdReached
                | Termination::HeadroomExhausted
                | Termination::SequenceCompleted
        )
    }
}

/// Result of one wallet's run.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    pub wallet: Address,
    pub strategy: &'static str,
    /// Completed borrow/supply cycles (1 for a finished fixed sequence)
    pub cycles: u32,
    /// Position after the run, if it could be read
    pub final_snapshot: Option<AccountSnapshot>,
    pub termination: Termination,
}

impl LoopOutcome {
    pub fn final_health_factor(&self) -> Option<f64> {
        self.final_snapshot.map(|s| s.health_factor)
    }
}

/// Runs strategies against a [`ChainGateway`].
pub struct LeverageLoopController<G> {
    gateway: Arc<G>,
    metrics: AccountMetrics<G>,
    contracts: ProtocolContracts,
    sink: Arc<dyn EventSink>,
}

impl<G: ChainGateway> LeverageLoopController<G> {
    pub fn new(gateway: Arc<G>, contracts: ProtocolContracts, sink: Arc<dyn EventSink>) -> Self {
        Self {
            metrics: AccountMetrics::new(gateway.clone(), contracts),
            gateway,
            contracts,
            sink,
        }
    }

    /// Run the policy's strategy for one wallet.
    ///
    /// Never returns an error: failures end the run and are reported in the
    /// outcome together with the progress made so far.
    #[instrument(skip_all, fields(wallet = %wallet.address()))]
    pub async fn run(
        &self,
        wallet: &Wallet,
        policy: &PolicyParameters,
        shutdown: &Shutdown,
    ) -> LoopOutcome {
        let account = wallet.address();
        self.sink.emit(LoopEvent::LoopStarted {
            wallet: account,
            strategy: policy.strategy.name(),
        });

        let mut run = WalletRun {
            controller: self,
            wallet,
            shutdown,
            cycles: 0,
            snapshot: None,
            snapshot_fresh: false,
        };

        let result = match run.normalize_emode(policy.emode).await {
            Ok(()) => match &policy.strategy {
                Strategy::LeverageUntilThreshold => run.leverage(policy).await,
                Strategy::FixedSequence(sequence) => run.fixed_sequence(sequence).await,
            },
            Err(e) => Err(e),
        };

        let termination = match result {
            Ok(termination) => termination,
            Err(LooperError::Cancelled) => Termination::Cancelled,
            Err(e) => Termination::Failed(e),
        };

        let skip_refresh = matches!(
            termination,
            Termination::Failed(LooperError::MetricsUnavailable { .. })
        );
        if !run.snapshot_fresh && !skip_refresh {
            match self.metrics.snapshot(account).await {
                Ok(snapshot) => run.snapshot = Some(snapshot),
                Err(e) => warn!(error = %e, "Final snapshot unavailable"),
            }
        }

        let cycles = run.cycles;
        match &termination {
            Termination::Failed(error) => self.sink.emit(LoopEvent::WalletFailed {
                wallet: account,
                cycles,
                error: error.clone(),
            }),
            Termination::Cancelled => self.sink.emit(LoopEvent::WalletCancelled {
                wallet: account,
                cycles,
            }),
            _ => {}
        }

        LoopOutcome {
            wallet: account,
            strategy: policy.strategy.name(),
            cycles,
            final_snapshot: run.snapshot,
            termination,
        }
    }
}

/// Per-wallet run state.
struct WalletRun<'a, G> {
    controller: &'a LeverageLoopController<G>,
    wallet: &'a Wallet,
    shutdown: &'a Shutdown,
    cycles: u32,
    snapshot: Option<AccountSnapshot>,
    /// No transaction confirmed since `snapshot` was taken
    snapshot_fresh: bool,
}

impl<G: ChainGateway> WalletRun<'_, G> {
    fn account(&self) -> Address {
        self.wallet.address()
    }

    fn contracts(&self) -> &ProtocolContracts {
        &self.controller.contracts
    }

    fn check_shutdown(&self) -> Result<()> {
        if self.shutdown.is_requested() {
            return Err(LooperError::Cancelled);
        }
        Ok(())
    }

    async fn observe(&mut self) -> Result<AccountSnapshot> {
        let snapshot = self.controller.metrics.snapshot(self.account()).await?;
        self.snapshot = Some(snapshot);
        self.snapshot_fresh = true;
        Ok(snapshot)
    }

    /// Set the eMode category unless it already matches.
    async fn normalize_emode(&mut self, target: u8) -> Result<()> {
        let current = self.controller.metrics.emode(self.account()).await?;
        if current == target {
            debug!(emode = current, "eMode already set");
            return Ok(());
        }

        self.check_shutdown()?;
        self.send(TxIntent::SetEMode { category: target }, TxKind::SetEMode, TxPhase::Action)
            .await?;
        self.controller.sink.emit(LoopEvent::EModeSet {
            wallet: self.account(),
            from: current,
            to: target,
        });
        Ok(())
    }

    /// Wrap native above the reserve, then supply all wrapped balance.
    async fn fund(&mut self, policy: &PolicyParameters) -> Result<()> {
        let account = self.account();
        let (native, mut wrapped) = self.controller.metrics.funding_balances(account).await?;
        let reserve = policy.reserve_native_units();

        if native > reserve {
            self.check_shutdown()?;
            let amount = native - reserve;
            self.send(TxIntent::Wrap { amount }, TxKind::Wrap, TxPhase::Action)
                .await?;
            (_, wrapped) = self.controller.metrics.funding_balances(account).await?;
        } else {
            debug!(native = %native, reserve = %reserve, "Native balance within reserve, nothing to wrap");
        }

        if wrapped.is_zero() {
            debug!("No wrapped balance to supply");
            return Ok(());
        }

        self.check_shutdown()?;
        let asset = self.contracts().wrapped_native;
        self.approve_then(TxIntent::Supply { asset, amount: wrapped })
            .await?;
        Ok(())
    }

    /// Borrow and re-supply until the threshold is reached.
    async fn leverage(&mut self, policy: &PolicyParameters) -> Result<Termination> {
        self.fund(policy).await?;

        let ltv_bps = policy.max_ltv_bps();
        let asset = self.contracts().wrapped_native;
        let mut previous: Option<U256> = None;

        loop {
            self.check_shutdown()?;
            let snapshot = self.observe().await?;

            if snapshot.health_factor <= policy.min_health_factor {
                info!(
                    cycles = self.cycles,
                    health_factor = snapshot.health_factor,
                    "Stopping: health factor at threshold"
                );
                self.controller.sink.emit(LoopEvent::ThresholdReached {
                    wallet: self.account(),
                    cycles: self.cycles,
                    health_factor: snapshot.health_factor,
                });
                return Ok(Termination::ThresholdReached);
            }

            let amount = snapshot.safe_borrow_amount(ltv_bps);
            if amount.is_zero() {
                info!(
                    cycles = self.cycles,
                    health_factor = snapshot.health_factor,
                    "Stopping: no borrow headroom"
                );
                self.controller.sink.emit(LoopEvent::HeadroomExhausted {
                    wallet: self.account(),
                    cycles: self.cycles,
                    health_factor: snapshot.health_factor,
                });
                return Ok(Termination::HeadroomExhausted);
            }

            let stalled = previous.is_some_and(|last| amount >= last);
            if self.cycles >= policy.max_cycles || stalled {
                return Err(LooperError::NonConvergence {
                    cycles: self.cycles,
                    last_amount: amount,
                });
            }

            debug!(
                cycle = self.cycles + 1,
                amount = %amount,
                health_factor = snapshot.health_factor,
                "Borrowing"
            );
            self.send(TxIntent::Borrow { asset, amount }, TxKind::Borrow, TxPhase::Action)
                .await?;
            self.approve_then(TxIntent::Supply { asset, amount }).await?;

            self.cycles += 1;
            previous = Some(amount);
            self.controller.sink.emit(LoopEvent::CycleCompleted {
                wallet: self.account(),
                cycle: self.cycles,
                borrowed: amount,
            });
        }
    }

    /// Wrap, supply, borrow, repay and withdraw the configured amounts once.
    async fn fixed_sequence(&mut self, sequence: &FixedSequence) -> Result<Termination> {
        let wrapped = self.contracts().wrapped_native;
        let supply = sequence.supply_units();
        let borrow = sequence.borrow_units();
        let repay = sequence.repay_units();
        let withdraw = sequence.withdraw_units();

        if !supply.is_zero() {
            self.check_shutdown()?;
            self.send(TxIntent::Wrap { amount: supply }, TxKind::Wrap, TxPhase::Action)
                .await?;
            self.check_shutdown()?;
            self.approve_then(TxIntent::Supply {
                asset: wrapped,
                amount: supply,
            })
            .await?;
        }
        if !borrow.is_zero() {
            self.check_shutdown()?;
            let intent = TxIntent::Borrow {
                asset: sequence.borrow_asset,
                amount: borrow,
            };
            self.send(intent, TxKind::Borrow, TxPhase::Action).await?;
        }
        if !repay.is_zero() {
            self.check_shutdown()?;
            self.approve_then(TxIntent::Repay {
                asset: sequence.borrow_asset,
                amount: repay,
            })
            .await?;
        }
        if !withdraw.is_zero() {
            self.check_shutdown()?;
            let intent = TxIntent::Withdraw {
                asset: wrapped,
                amount: withdraw,
            };
            self.send(intent, TxKind::Withdraw, TxPhase::Action).await?;
        }

        self.cycles = 1;
        self.controller.sink.emit(LoopEvent::SequenceCompleted {
            wallet: self.account(),
        });
        Ok(Termination::SequenceCompleted)
    }

    /// Approve the pool for exactly the action's amount, then submit the
    /// action. Runs as one step: shutdown is not checked in between.
    async fn approve_then(&mut self, intent: TxIntent) -> Result<Confirmation> {
        let token = match intent {
            TxIntent::Supply { asset, .. } | TxIntent::Repay { asset, .. } => asset,
            _ => return self.send(intent.clone(), intent.kind(), TxPhase::Action).await,
        };
        let action = intent.kind();
        let approve = TxIntent::Approve {
            token,
            amount: intent.amount(),
        };
        self.send(approve, action, TxPhase::Approval).await?;
        self.send(intent, action, TxPhase::Action).await
    }

    /// Submit one transaction and wait for it. Failures are attributed to
    /// `action`/`phase`.
    async fn send(
        &mut self,
        intent: TxIntent,
        action: TxKind,
        phase: TxPhase,
    ) -> Result<Confirmation> {
        let gateway = &self.controller.gateway;
        let failed = |tx_hash, reason: String| LooperError::TransactionFailed {
            action,
            phase,
            tx_hash,
            reason,
        };

        let tx_hash = gateway
            .submit(self.wallet, &intent)
            .await
            .map_err(|e| failed(None, e.to_string()))?;
        self.snapshot_fresh = false;
        debug!(kind = %intent.kind(), tx_hash = %tx_hash, "Transaction submitted");

        let confirmation = gateway
            .await_confirmation(tx_hash)
            .await
            .map_err(|e| failed(Some(tx_hash), e.to_string()))?;
        if !confirmation.success {
            return Err(failed(Some(tx_hash), "reverted".to_string()));
        }

        self.controller.sink.emit(LoopEvent::TransactionConfirmed {
            wallet: self.account(),
            kind: intent.kind(),
            amount: intent.amount(),
            tx_hash,
            block: confirmation.block_number,
            gas_used: confirmation.gas_used,
        });
        Ok(confirmation)
    }
}
