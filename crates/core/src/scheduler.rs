//! Wallet activation schedule.
//!
//! A [`SchedulePlan`] maps each wallet address to one Unix activation time.
//! [`WalletScheduler`] holds the pending part of that plan, hands out due
//! wallets in (time, address) order and writes the remainder back to disk
//! whenever a wallet is consumed, so a restarted process resumes only the
//! wallets that have not run yet.

use alloy::primitives::Address;
use looper_chain::Wallet;
use rand::Rng;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{LooperError, Result};

/// Address -> activation timestamp (Unix seconds).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulePlan {
    entries: BTreeMap<Address, i64>,
}

impl SchedulePlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, wallet: Address, activation: i64) {
        self.entries.insert(wallet, activation);
    }

    pub fn remove(&mut self, wallet: &Address) -> Option<i64> {
        self.entries.remove(wallet)
    }

    pub fn get(&self, wallet: &Address) -> Option<i64> {
        self.entries.get(wallet).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Address, i64)> + '_ {
        self.entries.iter().map(|(addr, ts)| (*addr, *ts))
    }

    /// Give every address a uniformly random activation in `[start, end]`.
    pub fn randomized<R: Rng>(
        addresses: impl IntoIterator<Item = Address>,
        start: i64,
        end: i64,
        rng: &mut R,
    ) -> Result<Self> {
        if start >= end {
            return Err(LooperError::config(format!(
                "schedule window is empty: start {start} >= end {end}"
            )));
        }
        let entries = addresses
            .into_iter()
            .map(|addr| (addr, rng.gen_range(start..=end)))
            .collect();
        Ok(Self { entries })
    }

    /// Parse a JSON object of `"0xaddress": timestamp`.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, i64> = serde_json::from_str(json)
            .map_err(|e| LooperError::config(format!("malformed schedule: {e}")))?;

        let mut entries = BTreeMap::new();
        for (key, activation) in raw {
            let addr: Address = key
                .trim()
                .parse()
                .map_err(|e| LooperError::config(format!("invalid schedule address '{key}': {e}")))?;
            if entries.insert(addr, activation).is_some() {
                return Err(LooperError::config(format!(
                    "schedule lists {addr} more than once"
                )));
            }
        }
        Ok(Self { entries })
    }

    /// Serialize with checksummed address keys.
    pub fn to_json(&self) -> Result<String> {
        let raw: BTreeMap<String, i64> = self
            .entries
            .iter()
            .map(|(addr, ts)| (addr.to_string(), *ts))
            .collect();
        serde_json::to_string_pretty(&raw).map_err(|e| LooperError::Persistence {
            path: "<schedule>".to_string(),
            reason: e.to_string(),
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| LooperError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let plan = Self::from_json(&content)?;
        info!(path = %path.display(), entries = plan.len(), "Schedule loaded");
        Ok(plan)
    }

    /// Atomically replace the file at `path`: write a sibling temp file,
    /// then rename over the target.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let persistence = |e: std::io::Error| LooperError::Persistence {
            path: path.display().to_string(),
            reason: e.to_string(),
        };

        let mut tmp: OsString = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let json = self.to_json().map_err(|e| match e {
            LooperError::Persistence { reason, .. } => LooperError::Persistence {
                path: path.display().to_string(),
                reason,
            },
            other => other,
        })?;
        std::fs::write(&tmp, json).map_err(persistence)?;
        std::fs::rename(&tmp, path).map_err(persistence)?;
        debug!(path = %path.display(), remaining = self.len(), "Schedule persisted");
        Ok(())
    }
}

/// Pending activations for the loaded wallets.
pub struct WalletScheduler {
    wallets: HashMap<Address, Wallet>,
    /// Ordered by (activation, address)
    pending: BTreeSet<(i64, Address)>,
    remaining: SchedulePlan,
    store: Option<PathBuf>,
}

impl WalletScheduler {
    /// Build the pending set. Every planned address must belong to a loaded
    /// wallet. With `store` set, the remaining plan is written there after
    /// each [`mark_done`](Self::mark_done).
    pub fn load(wallets: Vec<Wallet>, plan: SchedulePlan, store: Option<PathBuf>) -> Result<Self> {
        let wallets: HashMap<Address, Wallet> =
            wallets.into_iter().map(|w| (w.address(), w)).collect();

        if let Some((unknown, _)) = plan.iter().find(|(addr, _)| !wallets.contains_key(addr)) {
            return Err(LooperError::ScheduleInconsistent(unknown));
        }

        let unscheduled = wallets
            .keys()
            .filter(|addr| plan.get(addr).is_none())
            .count();
        if unscheduled > 0 {
            warn!(count = unscheduled, "Wallets without a schedule entry will not run");
        }

        let pending = plan.iter().map(|(addr, ts)| (ts, addr)).collect();
        info!(pending = plan.len(), "Scheduler loaded");

        Ok(Self {
            wallets,
            pending,
            remaining: plan,
            store,
        })
    }

    /// Pending wallets with activation `<= now`, earliest first, ties by address.
    pub fn due_wallets(&self, now: i64) -> Vec<Wallet> {
        self.pending
            .iter()
            .take_while(|(activation, _)| *activation <= now)
            .filter_map(|(_, addr)| self.wallets.get(addr).cloned())
            .collect()
    }

    /// Remove `wallet` from the pending set for good and persist the rest.
    ///
    /// Returns `Ok(false)` if it was not pending. A persistence error leaves
    /// the wallet removed in memory.
    pub fn mark_done(&mut self, wallet: Address) -> Result<bool> {
        let Some(activation) = self.remaining.remove(&wallet) else {
            return Ok(false);
        };
        self.pending.remove(&(activation, wallet));
        debug!(wallet = %wallet, remaining = self.pending.len(), "Wallet marked done");

        if let Some(path) = &self.store {
            self.remaining.save(path)?;
        }
        Ok(true)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }

    /// Earliest pending activation.
    pub fn next_activation(&self) -> Option<i64> {
        self.pending.first().map(|(activation, _)| *activation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn wallets(n: usize) -> Vec<Wallet> {
        let mut wallets: Vec<Wallet> = (0..n).map(|_| Wallet::random()).collect();
        wallets.sort_by_key(|w| w.address());
        wallets
    }

    #[test]
    fn test_unknown_wallet_is_inconsistent() {
        let known = wallets(1);
        let stranger = Address::repeat_byte(0x99);
        let mut plan = SchedulePlan::new();
        plan.insert(known[0].address(), 10);
        plan.insert(stranger, 20);

        match WalletScheduler::load(known, plan, None) {
            Err(LooperError::ScheduleInconsistent(addr)) => assert_eq!(addr, stranger),
            other => panic!("expected ScheduleInconsistent, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_due_order_and_idempotence() {
        let ws = wallets(3);
        let mut plan = SchedulePlan::new();
        plan.insert(ws[0].address(), 300);
        plan.insert(ws[1].address(), 100);
        plan.insert(ws[2].address(), 100);
        let scheduler = WalletScheduler::load(ws.clone(), plan, None).unwrap();

        assert!(scheduler.due_wallets(99).is_empty());

        let due: Vec<Address> = scheduler.due_wallets(200).iter().map(|w| w.address()).collect();
        // Same time: address order
        assert_eq!(due, vec![ws[1].address(), ws[2].address()]);
        // No side effects
        let again: Vec<Address> = scheduler.due_wallets(200).iter().map(|w| w.address()).collect();
        assert_eq!(again, due);

        assert_eq!(scheduler.due_wallets(300).len(), 3);
        assert_eq!(scheduler.next_activation(), Some(100));
    }

    #[test]
    fn test_mark_done_is_permanent() {
        let ws = wallets(2);
        let mut plan = SchedulePlan::new();
        plan.insert(ws[0].address(), 10);
        plan.insert(ws[1].address(), 20);
        let mut scheduler = WalletScheduler::load(ws.clone(), plan, None).unwrap();

        assert!(scheduler.mark_done(ws[0].address()).unwrap());
        assert!(!scheduler.mark_done(ws[0].address()).unwrap());

        let due: Vec<Address> = scheduler.due_wallets(i64::MAX).iter().map(|w| w.address()).collect();
        assert_eq!(due, vec![ws[1].address()]);
        assert_eq!(scheduler.pending_len(), 1);
    }

    #[test]
    fn test_consumed_wallet_absent_after_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schedule.json");
        let ws = wallets(2);
        let mut plan = SchedulePlan::new();
        plan.insert(ws[0].address(), 1_000);
        plan.insert(ws[1].address(), 5_000);
        plan.save(&path).unwrap();

        let loaded = SchedulePlan::load(&path).unwrap();
        assert_eq!(loaded, plan);

        let mut scheduler = WalletScheduler::load(ws.clone(), loaded, Some(path.clone())).unwrap();
        for wallet in scheduler.due_wallets(1_001) {
            scheduler.mark_done(wallet.address()).unwrap();
        }

        let reloaded = SchedulePlan::load(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.get(&ws[0].address()), None);
        assert_eq!(reloaded.get(&ws[1].address()), Some(5_000));
        assert!(!dir.path().join("schedule.json.tmp").exists());
    }

    #[test]
    fn test_persistence_failure_still_removes() {
        let ws = wallets(1);
        let mut plan = SchedulePlan::new();
        plan.insert(ws[0].address(), 10);
        let store = PathBuf::from("/nonexistent/dir/schedule.json");
        let mut scheduler = WalletScheduler::load(ws.clone(), plan, Some(store)).unwrap();

        let err = scheduler.mark_done(ws[0].address()).unwrap_err();
        assert!(matches!(err, LooperError::Persistence { .. }));
        assert!(scheduler.is_idle());
        assert!(scheduler.due_wallets(i64::MAX).is_empty());
    }

    #[test]
    fn test_json_uses_checksummed_keys() {
        let addr: Address = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse().unwrap();
        let mut plan = SchedulePlan::new();
        plan.insert(addr, 1_700_000_000);

        let json = plan.to_json().unwrap();
        assert!(json.contains("\"0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266\": 1700000000"));

        let lowercase = r#"{"0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266": 1700000000}"#;
        assert_eq!(SchedulePlan::from_json(lowercase).unwrap(), plan);
    }

    #[test]
    fn test_malformed_schedule() {
        assert!(matches!(
            SchedulePlan::from_json(r#"{"not-an-address": 1}"#),
            Err(LooperError::ConfigInvalid(_))
        ));
        assert!(matches!(
            SchedulePlan::from_json("[1, 2]"),
            Err(LooperError::ConfigInvalid(_))
        ));
    }

    #[test]
    fn test_randomized_within_window() {
        let addresses: Vec<Address> = (1..=20u8).map(Address::repeat_byte).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let plan = SchedulePlan::randomized(addresses.clone(), 1_000, 2_000, &mut rng).unwrap();

        assert_eq!(plan.len(), 20);
        assert!(plan.iter().all(|(_, ts)| (1_000..=2_000).contains(&ts)));

        let mut rng = StdRng::seed_from_u64(7);
        let same = SchedulePlan::randomized(addresses, 1_000, 2_000, &mut rng).unwrap();
        assert_eq!(same, plan);
    }

    #[test]
    fn test_randomized_rejects_empty_window() {
        let mut rng = StdRng::seed_from_u64(1);
        let err = SchedulePlan::randomized([Address::ZERO], 10, 10, &mut rng).unwrap_err();
        assert!(matches!(err, LooperError::ConfigInvalid(_)));
    }
}
