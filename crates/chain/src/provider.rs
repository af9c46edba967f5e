//! Alloy-backed [`ChainGateway`] for HTTP RPC endpoints.
//!
//! Reads go through typed `sol!` contract calls; writes build a legacy
//! transaction, sign it with the wallet's local signer and broadcast it.
//! Confirmation polls for the receipt until the configured timeout.

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, B256, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::contracts::{ProtocolContracts, TxIntent, IERC20, IPool};
use crate::gateway::{ChainGateway, Confirmation, GatewayError, UserAccountData};
use crate::signer::Wallet;

/// Default time to wait for a receipt.
const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Receipt polling interval.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Gateway over an HTTP JSON-RPC endpoint.
#[derive(Debug, Clone)]
pub struct AlloyGateway {
    /// RPC URL for reads and sends
    rpc_url: alloy::transports::http::reqwest::Url,
    /// Chain ID
    chain_id: u64,
    /// Lending deployment
    contracts: ProtocolContracts,
    /// Maximum wait for a receipt
    confirmation_timeout: Duration,
}

impl AlloyGateway {
    /// Create a gateway and verify the endpoint answers.
    pub async fn connect(
        rpc_url: &str,
        chain_id: u64,
        contracts: ProtocolContracts,
    ) -> Result<Self, GatewayError> {
        let url = rpc_url
            .parse()
            .map_err(|e| GatewayError::InvalidUrl(format!("{rpc_url}: {e}")))?;

        let gateway = Self {
            rpc_url: url,
            chain_id,
            contracts,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
        };

        let provider = ProviderBuilder::new().on_http(gateway.rpc_url.clone());
        let remote_chain_id = provider.get_chain_id().await.map_err(GatewayError::rpc)?;
        let block = provider.get_block_number().await.map_err(GatewayError::rpc)?;
        if remote_chain_id != chain_id {
            warn!(
                configured = chain_id,
                remote = remote_chain_id,
                "Endpoint reports a different chain id"
            );
        }

        info!(
            chain_id = chain_id,
            block = block,
            pool = %contracts.pool,
            wrapped_native = %contracts.wrapped_native,
            "Gateway connected"
        );

        Ok(gateway)
    }

    /// Override the confirmation timeout.
    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }
}

#[async_trait]
impl ChainGateway for AlloyGateway {
    async fn native_balance(&self, account: Address) -> Result<U256, GatewayError> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        provider.get_balance(account).await.map_err(GatewayError::rpc)
    }

    async fn token_balance(&self, token: Address, account: Address) -> Result<U256, GatewayError> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        let erc20 = IERC20::new(token, &provider);
        let balance = erc20
            .balanceOf(account)
            .call()
            .await
            .map_err(GatewayError::rpc)?;
        Ok(balance._0)
    }

    async fn user_emode(&self, account: Address) -> Result<u8, GatewayError> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        let pool = IPool::new(self.contracts.pool, &provider);
        let category = pool
            .getUserEMode(account)
            .call()
            .await
            .map_err(GatewayError::rpc)?
            ._0;
        u8::try_from(category)
            .map_err(|_| GatewayError::Rpc(format!("eMode category out of range: {category}")))
    }

    async fn user_account_data(&self, account: Address) -> Result<UserAccountData, GatewayError> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        let pool = IPool::new(self.contracts.pool, &provider);
        let data = pool
            .getUserAccountData(account)
            .call()
            .await
            .map_err(GatewayError::rpc)?;

        Ok(UserAccountData {
            total_collateral_base: data.totalCollateralBase,
            total_debt_base: data.totalDebtBase,
            available_borrows_base: data.availableBorrowsBase,
            current_liquidation_threshold: data.currentLiquidationThreshold,
            ltv: data.ltv,
            health_factor: data.healthFactor,
        })
    }

    async fn submit(&self, wallet: &Wallet, intent: &TxIntent) -> Result<B256, GatewayError> {
        let from = wallet.address();
        let encoded = intent.encode(&self.contracts, from);

        let provider = ProviderBuilder::new()
            .wallet(wallet.network_wallet())
            .on_http(self.rpc_url.clone());

        // Previous step is always confirmed before the next submit, so the
        // chain's count is the next nonce.
        let nonce = provider
            .get_transaction_count(from)
            .await
            .map_err(GatewayError::rpc)?;
        let gas_price = provider.get_gas_price().await.map_err(GatewayError::rpc)?;

        let tx = TransactionRequest::default()
            .with_from(from)
            .with_to(encoded.to)
            .with_input(encoded.calldata)
            .with_value(encoded.value)
            .with_nonce(nonce)
            .with_gas_limit(encoded.gas_limit)
            .with_gas_price(gas_price)
            .with_chain_id(self.chain_id);

        debug!(
            wallet = %from,
            kind = %intent.kind(),
            to = %encoded.to,
            nonce = nonce,
            gas_limit = encoded.gas_limit,
            gas_price_gwei = gas_price / 1_000_000_000,
            "Sending transaction"
        );

        let pending = provider
            .send_transaction(tx)
            .await
            .map_err(GatewayError::rpc)?;
        let tx_hash = *pending.tx_hash();

        info!(wallet = %from, kind = %intent.kind(), tx_hash = %tx_hash, "Transaction submitted");
        Ok(tx_hash)
    }

    async fn await_confirmation(&self, tx_hash: B256) -> Result<Confirmation, GatewayError> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        let started = Instant::now();

        loop {
            match provider.get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => {
                    let confirmation = Confirmation {
                        tx_hash,
                        success: receipt.status(),
                        block_number: receipt.block_number,
                        gas_used: receipt.gas_used,
                    };
                    debug!(
                        tx_hash = %tx_hash,
                        success = confirmation.success,
                        block = confirmation.block_number.unwrap_or(0),
                        confirm_ms = started.elapsed().as_millis(),
                        "Receipt received"
                    );
                    return Ok(confirmation);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(tx_hash = %tx_hash, error = %e, "Receipt lookup failed, retrying");
                }
            }

            if started.elapsed() >= self.confirmation_timeout {
                return Err(GatewayError::ConfirmationTimeout {
                    tx_hash,
                    timeout: self.confirmation_timeout,
                });
            }
            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }
    }
}
