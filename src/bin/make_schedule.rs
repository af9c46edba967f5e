//! Schedule generator.
//!
//! Assigns every wallet in `WALLETS_FILE` a random activation time between
//! `SCHEDULE_START` and `SCHEDULE_END` (Unix seconds) and writes the plan to
//! `SCHEDULE_FILE`. Set `SCHEDULE_SEED` for a reproducible plan.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use looper_core::{load_wallets, EnvLookup, ProcessEnv, RunnerSettings, SchedulePlan};

/// Entries echoed to the log after generation.
const PREVIEW_ENTRIES: usize = 3;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let env = ProcessEnv;
    let runner = RunnerSettings::from_lookup(&env)?;
    let start: i64 = env.require("SCHEDULE_START")?;
    let end: i64 = env.require("SCHEDULE_END")?;
    let seed: Option<u64> = env
        .get("SCHEDULE_SEED")
        .map(|_| env.parse("SCHEDULE_SEED"))
        .transpose()?;

    let wallets = load_wallets(&runner.wallets_file).context("loading wallets")?;
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let plan = SchedulePlan::randomized(wallets.iter().map(|w| w.address()), start, end, &mut rng)?;
    plan.save(&runner.schedule_file)
        .with_context(|| format!("writing {}", runner.schedule_file))?;

    info!(
        path = %runner.schedule_file,
        entries = plan.len(),
        start = %format_ts(start),
        end = %format_ts(end),
        "Schedule written"
    );
    for (wallet, activation) in plan.iter().take(PREVIEW_ENTRIES) {
        info!(wallet = %wallet, at = %format_ts(activation), "Scheduled");
    }

    Ok(())
}

fn format_ts(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ts.to_string())
}
