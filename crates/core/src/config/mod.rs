//! Configuration for the looper.
//!
//! This module provides:
//! - Policy parameters (thresholds, LTV, reserve, eMode, strategy)
//! - Chain settings (RPC endpoint, contract addresses)
//! - Runner settings (wallet/schedule files, poll cadence)
//!
//! Everything is loaded once at startup, either from environment variables
//! (after `.env`) or from a TOML file named by `LOOPER_CONFIG`.

mod policy;
mod settings;

pub use policy::{FixedSequence, PolicyParameters, Strategy, NATIVE_DECIMALS, SEI_USDC};
pub use settings::{ChainSettings, RunnerSettings};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use crate::error::{LooperError, Result};

/// Environment variable naming the TOML config file.
pub const CONFIG_PATH_VAR: &str = "LOOPER_CONFIG";

/// Source of string-valued settings, keyed by variable name.
pub trait EnvLookup {
    fn get(&self, key: &str) -> Option<String>;

    /// Parse a required variable.
    fn require<T>(&self, key: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            Some(_) => self.parse(key),
            None => Err(LooperError::config(format!("missing required variable {key}"))),
        }
    }

    /// Parse a variable that is known to be present.
    fn parse<T>(&self, key: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.get(key).unwrap_or_default();
        raw.trim()
            .parse()
            .map_err(|e| LooperError::config(format!("invalid {key} '{raw}': {e}")))
    }

    /// Parse an optional variable, falling back to `default`.
    fn parse_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            Some(_) => self.parse(key),
            None => Ok(default),
        }
    }
}

/// Process environment.
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }
}

impl EnvLookup for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Complete startup configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub policy: PolicyParameters,

    #[serde(default)]
    pub chain: ChainSettings,

    #[serde(default)]
    pub runner: RunnerSettings,
}

impl AppConfig {
    /// Load from `LOOPER_CONFIG` if set, otherwise from the environment.
    pub fn load() -> Result<Self> {
        match ProcessEnv.get(CONFIG_PATH_VAR) {
            Some(path) => Self::from_file(&path),
            None => Self::from_lookup(&ProcessEnv),
        }
    }

    pub fn from_lookup(env: &impl EnvLookup) -> Result<Self> {
        Ok(Self {
            policy: PolicyParameters::from_lookup(env)?,
            chain: ChainSettings::from_lookup(env)?,
            runner: RunnerSettings::from_lookup(env)?,
        })
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| LooperError::Io {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| LooperError::config(format!("{path}: {e}")))?;
        config.policy.validate()?;
        config.runner.validate()?;
        Ok(config)
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        self.policy.log_policy();
        tracing::info!(
            rpc = %self.chain.rpc_url,
            chain_id = self.chain.chain_id,
            pool = %self.chain.pool,
            wrapped_native = %self.chain.wrapped_native,
            "Chain settings"
        );
        tracing::info!(
            wallets = %self.runner.wallets_file,
            schedule = %self.runner.schedule_file,
            poll_min_ms = self.runner.poll_min_ms,
            poll_max_ms = self.runner.poll_max_ms,
            "Runner settings"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [policy]
            min_health_factor = 1.5
            max_ltv = 0.8
            reserve_native = 1.0
            emode = 1

            [runner]
            schedule_file = "plan.json"
            "#
        )
        .unwrap();

        let config = AppConfig::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.policy.emode, 1);
        assert_eq!(config.runner.schedule_file, "plan.json");
        assert_eq!(config.runner.wallets_file, "wallets.json");
        assert_eq!(config.chain, ChainSettings::default());
    }

    #[test]
    fn test_file_policy_is_validated() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[policy]\nmin_health_factor = 0.5\nmax_ltv = 0.8\nemode = 0"
        )
        .unwrap();

        let err = AppConfig::from_file(file.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, LooperError::ConfigInvalid(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = AppConfig::from_file("/nonexistent/looper.toml").unwrap_err();
        assert!(matches!(err, LooperError::Io { .. }));
    }

    #[test]
    fn test_serialization_roundtrip() {
        let env: HashMap<String, String> = [
            ("MIN_HEALTH_FACTOR", "1.5"),
            ("MAX_LTV", "0.8"),
            ("RESERVE_NATIVE", "0"),
            ("EMODE", "0"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let config = AppConfig::from_lookup(&env).unwrap();

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("kind = \"leverage_until_threshold\""));
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }
}
