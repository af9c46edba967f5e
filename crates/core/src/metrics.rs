//! Account metrics: the normalized view the controller decides on.
//!
//! Every call reads the chain afresh. Nothing is cached between calls
//! because each decision depends on balances mutated by the previous
//! transaction.

use alloy::primitives::{Address, U256};
use looper_chain::{ChainGateway, GatewayError, ProtocolContracts};
use std::sync::Arc;
use tracing::debug;

use crate::error::{LooperError, Result};
use crate::u256_math;

/// Point-in-time read of one wallet's position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccountSnapshot {
    pub account: Address,
    /// Unwrapped native balance
    pub native_balance: U256,
    /// Wrapped native held in the wallet
    pub wrapped_balance: U256,
    /// aToken balance (supplied collateral)
    pub collateral_balance: U256,
    /// Variable-debt token balance
    pub debt_balance: U256,
    /// Health factor as reported by the pool (WAD)
    pub health_factor_wad: U256,
    /// Health factor descaled for threshold comparison
    pub health_factor: f64,
    /// Current eMode category
    pub emode: u8,
}

impl AccountSnapshot {
    /// Headroom before the haircut:
    /// `floor(collateral * ltv_bps / 10000) - debt`, saturating at zero.
    pub fn borrowable(&self, max_ltv_bps: u16) -> U256 {
        u256_math::bps_of(self.collateral_balance, max_ltv_bps).saturating_sub(self.debt_balance)
    }

    /// Amount the controller will actually borrow (1% haircut applied).
    pub fn safe_borrow_amount(&self, max_ltv_bps: u16) -> U256 {
        u256_math::apply_basis_points(self.borrowable(max_ltv_bps), u256_math::BORROW_HAIRCUT_BPS)
    }
}

/// Derives [`AccountSnapshot`]s from gateway reads.
pub struct AccountMetrics<G> {
    gateway: Arc<G>,
    contracts: ProtocolContracts,
}

impl<G: ChainGateway> AccountMetrics<G> {
    pub fn new(gateway: Arc<G>, contracts: ProtocolContracts) -> Self {
        Self { gateway, contracts }
    }

    /// Read a fresh snapshot. Any failed read aborts the whole snapshot.
    pub async fn snapshot(&self, account: Address) -> Result<AccountSnapshot> {
        let gateway = &self.gateway;
        let reads = tokio::try_join!(
            gateway.native_balance(account),
            gateway.token_balance(self.contracts.wrapped_native, account),
            gateway.token_balance(self.contracts.collateral_token, account),
            gateway.token_balance(self.contracts.debt_token, account),
            gateway.user_account_data(account),
            gateway.user_emode(account),
        );

        let (native, wrapped, collateral, debt, account_data, emode) =
            reads.map_err(|source| unavailable(account, source))?;

        let snapshot = AccountSnapshot {
            account,
            native_balance: native,
            wrapped_balance: wrapped,
            collateral_balance: collateral,
            debt_balance: debt,
            health_factor_wad: account_data.health_factor,
            health_factor: u256_math::wad_to_f64(account_data.health_factor),
            emode,
        };

        debug!(
            wallet = %account,
            native = %native,
            wrapped = %wrapped,
            collateral = %collateral,
            debt = %debt,
            health_factor = snapshot.health_factor,
            emode = emode,
            "Account snapshot"
        );

        Ok(snapshot)
    }

    /// Current eMode category only.
    pub async fn emode(&self, account: Address) -> Result<u8> {
        self.gateway
            .user_emode(account)
            .await
            .map_err(|source| unavailable(account, source))
    }

    /// Native and wrapped balances only.
    pub async fn funding_balances(&self, account: Address) -> Result<(U256, U256)> {
        tokio::try_join!(
            self.gateway.native_balance(account),
            self.gateway
                .token_balance(self.contracts.wrapped_native, account),
        )
        .map_err(|source| unavailable(account, source))
    }
}

fn unavailable(wallet: Address, source: GatewayError) -> LooperError {
    LooperError::MetricsUnavailable { wallet, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockChain;

    #[tokio::test]
    async fn test_snapshot_reads_fresh_state() {
        let chain = Arc::new(MockChain::new());
        let account = Address::repeat_byte(0xAA);
        chain.fund_native(account, U256::from(100u64));

        let metrics = AccountMetrics::new(chain.clone(), chain.contracts());
        let first = metrics.snapshot(account).await.unwrap();
        assert_eq!(first.native_balance, U256::from(100u64));
        assert!(first.collateral_balance.is_zero());
        assert_eq!(first.health_factor, f64::INFINITY);

        chain.set_position(account, U256::from(200u64), U256::from(100u64));
        let second = metrics.snapshot(account).await.unwrap();
        assert_eq!(second.collateral_balance, U256::from(200u64));
        assert_eq!(second.debt_balance, U256::from(100u64));
        // 200 * 0.85 / 100
        assert!((second.health_factor - 1.7).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_read_failure_is_metrics_unavailable() {
        let chain = Arc::new(MockChain::new());
        chain.fail_reads(true);

        let metrics = AccountMetrics::new(chain.clone(), chain.contracts());
        let err = metrics.snapshot(Address::repeat_byte(0xAA)).await.unwrap_err();
        assert!(matches!(err, LooperError::MetricsUnavailable { .. }));
    }

    #[test]
    fn test_borrowable_saturates() {
        let snapshot = AccountSnapshot {
            account: Address::ZERO,
            native_balance: U256::ZERO,
            wrapped_balance: U256::ZERO,
            collateral_balance: U256::from(100u64),
            debt_balance: U256::from(80u64),
            health_factor_wad: U256::ZERO,
            health_factor: 1.06,
            emode: 0,
        };
        assert!(snapshot.borrowable(8000).is_zero());
        assert!(snapshot.safe_borrow_amount(8000).is_zero());

        let fresh = AccountSnapshot {
            debt_balance: U256::ZERO,
            ..snapshot
        };
        assert_eq!(fresh.borrowable(8000), U256::from(80u64));
        assert_eq!(fresh.safe_borrow_amount(8000), U256::from(79u64));
    }
}
