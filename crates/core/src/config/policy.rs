//! Policy parameters that drive every wallet's run.
//!
//! Constructed once at startup, validated, then passed by reference into the
//! controller. Nothing in the controller reads the environment.

use alloy::primitives::{address, Address, U256};
use serde::{Deserialize, Serialize};

use super::EnvLookup;
use crate::error::{LooperError, Result};
use crate::u256_math;

/// Native asset decimals (SEI).
pub const NATIVE_DECIMALS: u8 = 18;

/// USDC on Sei EVM, the default fixed-sequence borrow asset.
pub const SEI_USDC: Address = address!("0x9cc91646ab84efa26469db98592f28B8b729C1c3");

/// Process-wide leverage policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyParameters {
    /// Stop threshold: the loop ends once health factor is at or below this
    pub min_health_factor: f64,

    /// Fraction of collateral that may be borrowed against (0 < x <= 1)
    pub max_ltv: f64,

    /// Native units kept unwrapped for gas
    #[serde(default)]
    pub reserve_native: f64,

    /// eMode category to enforce before looping
    #[serde(default)]
    pub emode: u8,

    /// Hard cap on borrow/supply cycles per wallet
    #[serde(default = "default_max_cycles")]
    pub max_cycles: u32,

    /// What each wallet run does
    #[serde(default)]
    pub strategy: Strategy,
}

fn default_max_cycles() -> u32 {
    50
}

/// Strategy variant dispatched by the controller.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Strategy {
    /// Borrow and re-supply until the health-factor threshold is reached.
    #[default]
    LeverageUntilThreshold,
    /// One fixed supply/borrow/repay/withdraw pass.
    FixedSequence(FixedSequence),
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::LeverageUntilThreshold => "leverage_until_threshold",
            Strategy::FixedSequence(_) => "fixed_sequence",
        }
    }
}

/// Amounts for the fixed-sequence strategy, in decimal units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedSequence {
    /// Native amount wrapped and supplied
    #[serde(default = "default_supply_amount")]
    pub supply_amount: f64,

    /// Asset borrowed against the supplied collateral
    #[serde(default = "default_borrow_asset")]
    pub borrow_asset: Address,

    /// Decimals of `borrow_asset`
    #[serde(default = "default_borrow_decimals")]
    pub borrow_decimals: u8,

    #[serde(default = "default_borrow_amount")]
    pub borrow_amount: f64,

    #[serde(default = "default_repay_amount")]
    pub repay_amount: f64,

    /// Wrapped native withdrawn at the end
    #[serde(default = "default_withdraw_amount")]
    pub withdraw_amount: f64,
}

fn default_supply_amount() -> f64 {
    0.5
}
fn default_borrow_asset() -> Address {
    SEI_USDC
}
fn default_borrow_decimals() -> u8 {
    6
}
fn default_borrow_amount() -> f64 {
    0.1
}
fn default_repay_amount() -> f64 {
    0.05
}
fn default_withdraw_amount() -> f64 {
    0.1
}

impl Default for FixedSequence {
    fn default() -> Self {
        Self {
            supply_amount: default_supply_amount(),
            borrow_asset: default_borrow_asset(),
            borrow_decimals: default_borrow_decimals(),
            borrow_amount: default_borrow_amount(),
            repay_amount: default_repay_amount(),
            withdraw_amount: default_withdraw_amount(),
        }
    }
}

impl FixedSequence {
    pub fn supply_units(&self) -> U256 {
        u256_math::to_base_units(self.supply_amount, NATIVE_DECIMALS)
    }

    pub fn borrow_units(&self) -> U256 {
        u256_math::to_base_units(self.borrow_amount, self.borrow_decimals)
    }

    pub fn repay_units(&self) -> U256 {
        u256_math::to_base_units(self.repay_amount, self.borrow_decimals)
    }

    pub fn withdraw_units(&self) -> U256 {
        u256_math::to_base_units(self.withdraw_amount, NATIVE_DECIMALS)
    }

    fn validate(&self) -> Result<()> {
        let amounts = [
            ("supply_amount", self.supply_amount),
            ("borrow_amount", self.borrow_amount),
            ("repay_amount", self.repay_amount),
            ("withdraw_amount", self.withdraw_amount),
        ];
        for (name, value) in amounts {
            if !value.is_finite() || value < 0.0 {
                return Err(LooperError::config(format!(
                    "fixed sequence {name} must be a non-negative number, got {value}"
                )));
            }
        }
        if self.repay_amount > self.borrow_amount {
            return Err(LooperError::config(format!(
                "fixed sequence repays {} but only borrows {}",
                self.repay_amount, self.borrow_amount
            )));
        }
        Ok(())
    }
}

impl PolicyParameters {
    /// Check every invariant the controller relies on.
    pub fn validate(&self) -> Result<()> {
        if !self.min_health_factor.is_finite() || self.min_health_factor <= 1.0 {
            return Err(LooperError::config(format!(
                "min_health_factor must be > 1.0, got {}",
                self.min_health_factor
            )));
        }
        if !self.max_ltv.is_finite() || self.max_ltv <= 0.0 || self.max_ltv > 1.0 {
            return Err(LooperError::config(format!(
                "max_ltv must be in (0, 1], got {}",
                self.max_ltv
            )));
        }
        if self.max_ltv_bps() == 0 {
            return Err(LooperError::config(format!(
                "max_ltv {} is below one basis point",
                self.max_ltv
            )));
        }
        if !self.reserve_native.is_finite() || self.reserve_native < 0.0 {
            return Err(LooperError::config(format!(
                "reserve_native must be >= 0, got {}",
                self.reserve_native
            )));
        }
        if self.max_cycles == 0 {
            return Err(LooperError::config("max_cycles must be > 0"));
        }
        if let Strategy::FixedSequence(seq) = &self.strategy {
            seq.validate()?;
        }
        Ok(())
    }

    /// `max_ltv` in basis points.
    pub fn max_ltv_bps(&self) -> u16 {
        u256_math::fraction_to_bps(self.max_ltv)
    }

    /// Native reserve in wei.
    pub fn reserve_native_units(&self) -> U256 {
        u256_math::to_base_units(self.reserve_native, NATIVE_DECIMALS)
    }

    /// Load from environment-style variables.
    ///
    /// Required: `MIN_HEALTH_FACTOR`, `MAX_LTV`, `EMODE` and
    /// `REMAINING_SEI_AMOUNT` (or `RESERVE_NATIVE`).
    pub fn from_lookup(env: &impl EnvLookup) -> Result<Self> {
        let reserve_native = match env.get("REMAINING_SEI_AMOUNT") {
            Some(_) => env.parse("REMAINING_SEI_AMOUNT")?,
            None => env.require("RESERVE_NATIVE")?,
        };

        let strategy = match env.get("STRATEGY").as_deref().map(str::to_lowercase).as_deref() {
            None | Some("leverage") | Some("leverage_until_threshold") => {
                Strategy::LeverageUntilThreshold
            }
            Some("fixed") | Some("fixed_sequence") => {
                let defaults = FixedSequence::default();
                Strategy::FixedSequence(FixedSequence {
                    supply_amount: env.parse_or("FIXED_SUPPLY_AMOUNT", defaults.supply_amount)?,
                    borrow_asset: env.parse_or("FIXED_BORROW_ASSET", defaults.borrow_asset)?,
                    borrow_decimals: env
                        .parse_or("FIXED_BORROW_DECIMALS", defaults.borrow_decimals)?,
                    borrow_amount: env.parse_or("FIXED_BORROW_AMOUNT", defaults.borrow_amount)?,
                    repay_amount: env.parse_or("FIXED_REPAY_AMOUNT", defaults.repay_amount)?,
                    withdraw_amount: env
                        .parse_or("FIXED_WITHDRAW_AMOUNT", defaults.withdraw_amount)?,
                })
            }
            Some(other) => {
                return Err(LooperError::config(format!("unknown STRATEGY '{other}'")));
            }
        };

        let policy = Self {
            min_health_factor: env.require("MIN_HEALTH_FACTOR")?,
            max_ltv: env.require("MAX_LTV")?,
            reserve_native,
            emode: env.require("EMODE")?,
            max_cycles: env.parse_or("MAX_CYCLES", default_max_cycles())?,
            strategy,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Log the policy.
    pub fn log_policy(&self) {
        tracing::info!(
            strategy = self.strategy.name(),
            min_health_factor = self.min_health_factor,
            max_ltv = self.max_ltv,
            reserve_native = self.reserve_native,
            emode = self.emode,
            max_cycles = self.max_cycles,
            "Policy loaded"
        );
        if let Strategy::FixedSequence(seq) = &self.strategy {
            tracing::info!(
                supply = seq.supply_amount,
                borrow_asset = %seq.borrow_asset,
                borrow = seq.borrow_amount,
                repay = seq.repay_amount,
                withdraw = seq.withdraw_amount,
                "Fixed sequence amounts"
            );
        }
    }
}
