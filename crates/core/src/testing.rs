//! In-memory lending chain for tests.
//!
//! Models one AAVE-style reserve (wrapped native) plus arbitrary borrowable
//! tokens valued 1:1. Transactions mutate state only when they succeed, and
//! every submission is recorded so tests can assert ordering.

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use looper_chain::{
    ChainGateway, Confirmation, GatewayError, ProtocolContracts, TxIntent, TxKind,
    UserAccountData, Wallet,
};
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::u256_math::{BPS_DENOMINATOR, WAD};

/// Liquidation threshold used for the simulated health factor (85%).
pub const LIQUIDATION_THRESHOLD_BPS: u64 = 8500;

#[derive(Default)]
struct State {
    native: HashMap<Address, U256>,
    /// (token, account) -> balance
    tokens: HashMap<(Address, Address), U256>,
    /// (token, owner) -> allowance granted to the pool
    allowances: HashMap<(Address, Address), U256>,
    /// (asset, account) -> debt in assets other than wrapped native
    other_debt: HashMap<(Address, Address), U256>,
    emode: HashMap<Address, u8>,
    receipts: HashMap<B256, bool>,
    submitted: Vec<(Address, TxIntent)>,
    submissions_by_kind: HashMap<TxKind, u32>,
    /// Revert the nth (1-based) submission of a kind
    revert_rules: Vec<(TxKind, u32)>,
    /// Refuse to broadcast this kind at all
    reject_kind: Option<TxKind>,
    fail_reads: bool,
    next_hash: u64,
}

pub struct MockChain {
    contracts: ProtocolContracts,
    state: Mutex<State>,
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            contracts: ProtocolContracts {
                pool: Address::repeat_byte(0x01),
                wrapped_native: Address::repeat_byte(0x02),
                collateral_token: Address::repeat_byte(0x03),
                debt_token: Address::repeat_byte(0x04),
            },
            state: Mutex::new(State::default()),
        }
    }

    pub fn contracts(&self) -> ProtocolContracts {
        self.contracts
    }

    pub fn fund_native(&self, account: Address, amount: U256) {
        self.state.lock().native.insert(account, amount);
    }

    pub fn fund_token(&self, token: Address, account: Address, amount: U256) {
        self.state.lock().tokens.insert((token, account), amount);
    }

    /// Set supplied collateral and wrapped-native debt directly.
    pub fn set_position(&self, account: Address, collateral: U256, debt: U256) {
        let mut state = self.state.lock();
        state
            .tokens
            .insert((self.contracts.collateral_token, account), collateral);
        state.tokens.insert((self.contracts.debt_token, account), debt);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.state.lock().fail_reads = fail;
    }

    /// Make the nth (1-based) submission of `kind` revert on inclusion.
    pub fn revert_on(&self, kind: TxKind, nth: u32) {
        self.state.lock().revert_rules.push((kind, nth));
    }

    /// Make every submission of `kind` fail before broadcast.
    pub fn reject_submit(&self, kind: TxKind) {
        self.state.lock().reject_kind = Some(kind);
    }

    pub fn submitted(&self, account: Address) -> Vec<TxIntent> {
        self.state
            .lock()
            .submitted
            .iter()
            .filter(|(from, _)| *from == account)
            .map(|(_, intent)| intent.clone())
            .collect()
    }

    pub fn submitted_kinds(&self, account: Address) -> Vec<TxKind> {
        self.submitted(account).iter().map(TxIntent::kind).collect()
    }

    pub fn token(&self, token: Address, account: Address) -> U256 {
        token_of(&self.state.lock(), token, account)
    }

    pub fn native(&self, account: Address) -> U256 {
        self.state.lock().native.get(&account).copied().unwrap_or_default()
    }

    fn total_debt(&self, state: &State, account: Address) -> U256 {
        let other: U256 = state
            .other_debt
            .iter()
            .filter(|((_, owner), _)| *owner == account)
            .map(|(_, amount)| *amount)
            .fold(U256::ZERO, |acc, v| acc + v);
        token_of(state, self.contracts.debt_token, account) + other
    }

    fn health_factor(&self, state: &State, account: Address) -> U256 {
        let debt = self.total_debt(state, account);
        if debt.is_zero() {
            return U256::MAX;
        }
        let collateral = token_of(state, self.contracts.collateral_token, account);
        collateral * U256::from(LIQUIDATION_THRESHOLD_BPS) * WAD / (BPS_DENOMINATOR * debt)
    }

    /// Apply `intent`; false means the transaction reverts.
    fn apply(&self, state: &mut State, account: Address, intent: &TxIntent) -> bool {
        let wrapped = self.contracts.wrapped_native;
        match *intent {
            TxIntent::Wrap { amount } => {
                let native = state.native.entry(account).or_default();
                if *native < amount {
                    return false;
                }
                *native -= amount;
                credit(state, wrapped, account, amount);
                true
            }
            TxIntent::Approve { token, amount } => {
                state.allowances.insert((token, account), amount);
                true
            }
            TxIntent::Supply { asset, amount } => {
                if asset != wrapped || !pull(state, asset, account, amount) {
                    return false;
                }
                credit(state, self.contracts.collateral_token, account, amount);
                true
            }
            TxIntent::Borrow { asset, amount } => {
                let collateral = token_of(state, self.contracts.collateral_token, account);
                if self.total_debt(state, account) + amount > collateral {
                    return false;
                }
                if asset == wrapped {
                    credit(state, self.contracts.debt_token, account, amount);
                } else {
                    *state.other_debt.entry((asset, account)).or_default() += amount;
                }
                credit(state, asset, account, amount);
                true
            }
            TxIntent::Repay { asset, amount } => {
                if !pull(state, asset, account, amount) {
                    return false;
                }
                let debt = if asset == wrapped {
                    state
                        .tokens
                        .entry((self.contracts.debt_token, account))
                        .or_default()
                } else {
                    state.other_debt.entry((asset, account)).or_default()
                };
                *debt = debt.saturating_sub(amount);
                true
            }
            TxIntent::Withdraw { asset, amount } => {
                let collateral = state
                    .tokens
                    .entry((self.contracts.collateral_token, account))
                    .or_default();
                if asset != wrapped || *collateral < amount {
                    return false;
                }
                *collateral -= amount;
                credit(state, wrapped, account, amount);
                true
            }
            TxIntent::SetEMode { category } => {
                state.emode.insert(account, category);
                true
            }
        }
    }

    fn check_reads(&self) -> Result<(), GatewayError> {
        if self.state.lock().fail_reads {
            return Err(GatewayError::Rpc("connection refused".to_string()));
        }
        Ok(())
    }
}

fn token_of(state: &State, token: Address, account: Address) -> U256 {
    state.tokens.get(&(token, account)).copied().unwrap_or_default()
}

fn credit(state: &mut State, token: Address, account: Address, amount: U256) {
    *state.tokens.entry((token, account)).or_default() += amount;
}

/// Pool pulls `amount` of `token` using the owner's allowance.
fn pull(state: &mut State, token: Address, account: Address, amount: U256) -> bool {
    let allowance = state.allowances.get(&(token, account)).copied().unwrap_or_default();
    let balance = token_of(state, token, account);
    if allowance < amount || balance < amount {
        return false;
    }
    state.allowances.insert((token, account), allowance - amount);
    state.tokens.insert((token, account), balance - amount);
    true
}

#[async_trait]
impl ChainGateway for MockChain {
    async fn native_balance(&self, account: Address) -> Result<U256, GatewayError> {
        self.check_reads()?;
        Ok(self.native(account))
    }

    async fn token_balance(&self, token: Address, account: Address) -> Result<U256, GatewayError> {
        self.check_reads()?;
        Ok(self.token(token, account))
    }

    async fn user_emode(&self, account: Address) -> Result<u8, GatewayError> {
        self.check_reads()?;
        Ok(self.state.lock().emode.get(&account).copied().unwrap_or(0))
    }

    async fn user_account_data(&self, account: Address) -> Result<UserAccountData, GatewayError> {
        self.check_reads()?;
        let state = self.state.lock();
        Ok(UserAccountData {
            total_collateral_base: token_of(&state, self.contracts.collateral_token, account),
            total_debt_base: self.total_debt(&state, account),
            health_factor: self.health_factor(&state, account),
            ..Default::default()
        })
    }

    async fn submit(&self, wallet: &Wallet, intent: &TxIntent) -> Result<B256, GatewayError> {
        let account = wallet.address();
        let mut state = self.state.lock();
        if state.reject_kind == Some(intent.kind()) {
            return Err(GatewayError::Rpc("insufficient funds for gas".to_string()));
        }

        state.submitted.push((account, intent.clone()));
        let count = state.submissions_by_kind.entry(intent.kind()).or_default();
        *count += 1;
        let nth = *count;

        let forced_revert = state
            .revert_rules
            .iter()
            .any(|(kind, n)| *kind == intent.kind() && *n == nth);
        let success = !forced_revert && self.apply(&mut state, account, intent);

        state.next_hash += 1;
        let tx_hash = B256::left_padding_from(&state.next_hash.to_be_bytes());
        state.receipts.insert(tx_hash, success);
        Ok(tx_hash)
    }

    async fn await_confirmation(&self, tx_hash: B256) -> Result<Confirmation, GatewayError> {
        let state = self.state.lock();
        let success = *state
            .receipts
            .get(&tx_hash)
            .ok_or_else(|| GatewayError::Rpc(format!("unknown transaction {tx_hash}")))?;
        Ok(Confirmation {
            tx_hash,
            success,
            block_number: Some(state.next_hash),
            gas_used: 21_000,
        })
    }
}
