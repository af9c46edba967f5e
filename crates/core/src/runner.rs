//! Process-wide run loop.
//!
//! Polls the scheduler with a jittered interval and runs due wallets one at
//! a time. A wallet is marked done once its run ends, whatever the outcome.

use chrono::Utc;
use looper_chain::ChainGateway;
use rand::Rng;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::{PolicyParameters, RunnerSettings, NATIVE_DECIMALS};
use crate::controller::{LeverageLoopController, LoopOutcome, Termination};
use crate::scheduler::WalletScheduler;
use crate::shutdown::Shutdown;
use crate::u256_math::from_base_units;

pub struct RunLoop<G> {
    controller: LeverageLoopController<G>,
    scheduler: WalletScheduler,
    policy: PolicyParameters,
    poll_min: Duration,
    poll_max: Duration,
}

impl<G: ChainGateway> RunLoop<G> {
    pub fn new(
        controller: LeverageLoopController<G>,
        scheduler: WalletScheduler,
        policy: PolicyParameters,
        settings: &RunnerSettings,
    ) -> Self {
        Self {
            controller,
            scheduler,
            policy,
            poll_min: settings.poll_min(),
            poll_max: settings.poll_max(),
        }
    }

    pub fn scheduler(&self) -> &WalletScheduler {
        &self.scheduler
    }

    /// Run every wallet due at `now`, in scheduler order.
    pub async fn tick(&mut self, now: i64, shutdown: &Shutdown) -> Vec<LoopOutcome> {
        let due = self.scheduler.due_wallets(now);
        let mut outcomes = Vec::with_capacity(due.len());

        for wallet in due {
            if shutdown.is_requested() {
                break;
            }

            let outcome = self.controller.run(&wallet, &self.policy, shutdown).await;
            log_outcome(&outcome);

            if let Err(e) = self.scheduler.mark_done(wallet.address()) {
                error!(wallet = %wallet.address(), error = %e, "Failed to persist schedule");
            }
            outcomes.push(outcome);
        }

        if !outcomes.is_empty() {
            let succeeded = outcomes.iter().filter(|o| o.termination.is_success()).count();
            info!(
                ran = outcomes.len(),
                succeeded = succeeded,
                pending = self.scheduler.pending_len(),
                "Tick complete"
            );
        }
        outcomes
    }

    /// Poll until shutdown. Keeps polling when nothing is pending.
    pub async fn run(&mut self, mut shutdown: Shutdown) {
        info!(
            pending = self.scheduler.pending_len(),
            next_activation = ?self.scheduler.next_activation(),
            "Run loop started"
        );

        let mut idle_logged = false;
        while !shutdown.is_requested() {
            self.tick(Utc::now().timestamp(), &shutdown).await;

            if self.scheduler.is_idle() && !idle_logged {
                info!("All scheduled wallets have run, idling");
                idle_logged = true;
            }

            let pause = self.jitter();
            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = shutdown.requested() => break,
            }
        }

        info!(pending = self.scheduler.pending_len(), "Run loop stopped");
    }

    fn jitter(&self) -> Duration {
        if self.poll_min >= self.poll_max {
            return self.poll_min;
        }
        rand::thread_rng().gen_range(self.poll_min..=self.poll_max)
    }
}

fn log_outcome(outcome: &LoopOutcome) {
    let health_factor = outcome.final_health_factor().unwrap_or(f64::NAN);
    let (collateral, debt) = outcome
        .final_snapshot
        .map(|s| {
            (
                from_base_units(s.collateral_balance, NATIVE_DECIMALS),
                from_base_units(s.debt_balance, NATIVE_DECIMALS),
            )
        })
        .unwrap_or((f64::NAN, f64::NAN));
    match &outcome.termination {
        Termination::Failed(e) => warn!(
            wallet = %outcome.wallet,
            strategy = outcome.strategy,
            cycles = outcome.cycles,
            health_factor = health_factor,
            error = %e,
            "Wallet run failed, not retrying"
        ),
        termination => info!(
            wallet = %outcome.wallet,
            strategy = outcome.strategy,
            cycles = outcome.cycles,
            health_factor = health_factor,
            collateral = collateral,
            debt = debt,
            termination = ?termination,
            "Wallet run finished"
        ),
    }
}
