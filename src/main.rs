//! Yei Finance Leverage Looper
//!
//! Runs a leverage loop (wrap, supply, borrow, resupply) for a list of
//! wallets, each at its own scheduled time, against an AAVE V3 style pool on
//! Sei EVM. Features:
//! - Health-factor driven stop with a non-convergence guard
//! - Fixed supply/borrow/repay/withdraw sequence strategy
//! - Persisted one-shot schedule, resumable after restart
//! - Graceful shutdown on Ctrl-C between transaction steps

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use looper_chain::AlloyGateway;
use looper_core::{
    load_wallets, AppConfig, LeverageLoopController, RunLoop, SchedulePlan, Shutdown,
    TracingSink, WalletScheduler,
};

#[tokio::main]
async fn main() -> Result<()> {
    print_banner();

    dotenvy::dotenv().ok();
    init_tracing();

    // Configuration and startup files are fatal on error
    let config = AppConfig::load().context("loading configuration")?;
    config.log_config();

    let wallets = load_wallets(&config.runner.wallets_file).context("loading wallets")?;
    let plan = SchedulePlan::load(&config.runner.schedule_file).context("loading schedule")?;
    let scheduler = WalletScheduler::load(
        wallets,
        plan,
        Some(PathBuf::from(&config.runner.schedule_file)),
    )
    .context("building schedule")?;

    let contracts = config.chain.contracts();
    let gateway = Arc::new(
        AlloyGateway::connect(&config.chain.rpc_url, config.chain.chain_id, contracts)
            .await
            .context("connecting to RPC")?
            .with_confirmation_timeout(config.chain.confirmation_timeout()),
    );

    let controller = LeverageLoopController::new(gateway, contracts, Arc::new(TracingSink));
    let mut run_loop = RunLoop::new(controller, scheduler, config.policy, &config.runner);

    let (trigger, shutdown) = Shutdown::channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, stopping after the current step");
                let _ = trigger.send(true);
            }
            Err(e) => error!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });

    info!("Starting run loop...");
    run_loop.run(shutdown).await;
    info!("Shutdown complete");

    Ok(())
}

/// Human-readable logs by default, JSON with `LOG_FORMAT=json`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,looper_core=debug,looper_chain=debug"));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }
}

/// Print startup banner.
fn print_banner() {
    println!(
        r#"
    Yei Leverage Looper v{}
    "#,
        env!("CARGO_PKG_VERSION")
    );
}
