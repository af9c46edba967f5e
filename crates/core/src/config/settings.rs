//! Deployment and runner settings.
//!
//! Defaults target the Yei Finance deployment on Sei EVM; every value can be
//! overridden from the environment or the `[chain]` / `[runner]` tables of
//! the config file.

use alloy::primitives::{address, Address};
use looper_chain::ProtocolContracts;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::EnvLookup;
use crate::error::{LooperError, Result};

/// Chain endpoint and contract addresses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainSettings {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    #[serde(default = "default_chain_id")]
    pub chain_id: u64,

    #[serde(default = "default_pool")]
    pub pool: Address,

    #[serde(default = "default_wrapped_native")]
    pub wrapped_native: Address,

    /// aToken of the wrapped native reserve
    #[serde(default = "default_collateral_token")]
    pub collateral_token: Address,

    /// Variable-debt token of the wrapped native reserve
    #[serde(default = "default_debt_token")]
    pub debt_token: Address,

    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_secs: u64,
}

fn default_rpc_url() -> String {
    "https://evm-rpc.sei-apis.com".to_string()
}
fn default_chain_id() -> u64 {
    1329
}
fn default_pool() -> Address {
    address!("0x4a4d9abD36F923cBA0Af62A39C01dEC2944fb638")
}
fn default_wrapped_native() -> Address {
    address!("0xE30feDd158A2e3b13e9badaeABaFc5516e95e8C7")
}
fn default_collateral_token() -> Address {
    address!("0x809FF4801aA5bDb33045d1fEC810D082490D63a4")
}
fn default_debt_token() -> Address {
    address!("0x648e683aaE7C18132564F8B48C625aE5038A9607")
}
fn default_confirmation_timeout() -> u64 {
    120
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            chain_id: default_chain_id(),
            pool: default_pool(),
            wrapped_native: default_wrapped_native(),
            collateral_token: default_collateral_token(),
            debt_token: default_debt_token(),
            confirmation_timeout_secs: default_confirmation_timeout(),
        }
    }
}

impl ChainSettings {
    pub fn from_lookup(env: &impl EnvLookup) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            rpc_url: env.get("RPC_URL").unwrap_or(defaults.rpc_url),
            chain_id: env.parse_or("CHAIN_ID", defaults.chain_id)?,
            pool: env.parse_or("POOL", defaults.pool)?,
            wrapped_native: env.parse_or("WRAPPED_NATIVE", defaults.wrapped_native)?,
            collateral_token: env.parse_or("COLLATERAL_TOKEN", defaults.collateral_token)?,
            debt_token: env.parse_or("DEBT_TOKEN", defaults.debt_token)?,
            confirmation_timeout_secs: env
                .parse_or("CONFIRMATION_TIMEOUT_SECS", defaults.confirmation_timeout_secs)?,
        })
    }

    pub fn contracts(&self) -> ProtocolContracts {
        ProtocolContracts {
            pool: self.pool,
            wrapped_native: self.wrapped_native,
            collateral_token: self.collateral_token,
            debt_token: self.debt_token,
        }
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }
}

/// File locations and polling cadence of the run loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerSettings {
    #[serde(default = "default_wallets_file")]
    pub wallets_file: String,

    #[serde(default = "default_schedule_file")]
    pub schedule_file: String,

    /// Lower bound of the jittered poll interval (milliseconds)
    #[serde(default = "default_poll_min")]
    pub poll_min_ms: u64,

    /// Upper bound of the jittered poll interval (milliseconds)
    #[serde(default = "default_poll_max")]
    pub poll_max_ms: u64,
}

fn default_wallets_file() -> String {
    "wallets.json".to_string()
}
fn default_schedule_file() -> String {
    "schedule.json".to_string()
}
fn default_poll_min() -> u64 {
    1000
}
fn default_poll_max() -> u64 {
    3000
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            wallets_file: default_wallets_file(),
            schedule_file: default_schedule_file(),
            poll_min_ms: default_poll_min(),
            poll_max_ms: default_poll_max(),
        }
    }
}

impl RunnerSettings {
    pub fn from_lookup(env: &impl EnvLookup) -> Result<Self> {
        let defaults = Self::default();
        let settings = Self {
            wallets_file: env.get("WALLETS_FILE").unwrap_or(defaults.wallets_file),
            schedule_file: env.get("SCHEDULE_FILE").unwrap_or(defaults.schedule_file),
            poll_min_ms: env.parse_or("POLL_MIN_MS", defaults.poll_min_ms)?,
            poll_max_ms: env.parse_or("POLL_MAX_MS", defaults.poll_max_ms)?,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_min_ms > self.poll_max_ms {
            return Err(LooperError::config(format!(
                "poll_min_ms ({}) exceeds poll_max_ms ({})",
                self.poll_min_ms, self.poll_max_ms
            )));
        }
        Ok(())
    }

    pub fn poll_min(&self) -> Duration {
        Duration::from_millis(self.poll_min_ms)
    }

    pub fn poll_max(&self) -> Duration {
        Duration::from_millis(self.poll_max_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_target_sei() {
        let chain = ChainSettings::from_lookup(&HashMap::new()).unwrap();
        assert_eq!(chain.chain_id, 1329);
        assert_eq!(chain.contracts().pool, default_pool());
        assert_eq!(chain.confirmation_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<String, String> = [
            ("POOL", "0x0000000000000000000000000000000000000001"),
            ("CHAIN_ID", "31337"),
            ("POLL_MIN_MS", "10"),
            ("POLL_MAX_MS", "20"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let chain = ChainSettings::from_lookup(&env).unwrap();
        assert_eq!(chain.pool, Address::with_last_byte(1));
        assert_eq!(chain.chain_id, 31337);

        let runner = RunnerSettings::from_lookup(&env).unwrap();
        assert_eq!(runner.poll_min(), Duration::from_millis(10));
        assert_eq!(runner.wallets_file, "wallets.json");
    }

    #[test]
    fn test_bad_address_is_config_invalid() {
        let env: HashMap<String, String> =
            [("POOL".to_string(), "0x1234".to_string())].into_iter().collect();
        assert!(matches!(
            ChainSettings::from_lookup(&env),
            Err(LooperError::ConfigInvalid(_))
        ));
    }

    #[test]
    fn test_inverted_poll_bounds() {
        let runner = RunnerSettings {
            poll_min_ms: 5000,
            poll_max_ms: 1000,
            ..Default::default()
        };
        assert!(runner.validate().is_err());
    }
}
