//! In-memory transactional store mirroring the relational schema.
//!
//! Intended for tests/dev and single-process deployments; the row structs
//! are the schema. Not optimized for performance.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use chrono::NaiveDate;

use kontera_audit::VoucherAnnotation;
use kontera_core::{UserId, VoucherId};
use kontera_ledger::{
    Account, AccountingPeriod, JournalEntry, Voucher, standard_chart,
};
use kontera_security::{TotpSecret, VerificationLogEntry};

/// All persisted rows. One instance per store; cloned per transaction.
#[derive(Debug, Clone, Default)]
pub struct State {
    pub accounts: BTreeMap<String, Account>,
    pub vouchers: HashMap<VoucherId, Voucher>,
    pub entries: Vec<JournalEntry>,
    pub periods: Vec<AccountingPeriod>,
    pub annotations: Vec<VoucherAnnotation>,
    pub totp_secrets: HashMap<UserId, TotpSecret>,
    pub verification_log: Vec<VerificationLogEntry>,
    next_sequence: u64,
}

impl State {
    fn with_chart(chart: Vec<Account>) -> Self {
        Self {
            accounts: chart.into_iter().map(|a| (a.number.clone(), a)).collect(),
            next_sequence: 1,
            ..Default::default()
        }
    }

    /// Hand out the next voucher sequence number. The counter only moves
    /// forward; numbers are never reused, so gaps are tolerated.
    pub fn allocate_sequence(&mut self) -> u64 {
        let seq = self.next_sequence;
        self.next_sequence += 1;
        seq
    }

    pub fn voucher(&self, id: VoucherId) -> Option<&Voucher> {
        self.vouchers.get(&id)
    }

    pub fn voucher_mut(&mut self, id: VoucherId) -> Option<&mut Voucher> {
        self.vouchers.get_mut(&id)
    }

    pub fn voucher_by_sequence(&self, sequence: u64) -> Option<&Voucher> {
        self.vouchers.values().find(|v| v.sequence == sequence)
    }

    pub fn entries_for(&self, voucher: VoucherId) -> Vec<&JournalEntry> {
        self.entries.iter().filter(|e| e.voucher == voucher).collect()
    }

    pub fn annotations_for(&self, voucher: VoucherId) -> Vec<&VoucherAnnotation> {
        self.annotations
            .iter()
            .filter(|a| a.voucher == voucher)
            .collect()
    }

    pub fn closed_period_containing(&self, date: NaiveDate) -> Option<&AccountingPeriod> {
        self.periods.iter().find(|p| p.closed && p.contains(date))
    }
}

/// Shared store with a single serialized transactional boundary.
///
/// `transaction` runs the mutation against a clone of the state and swaps it
/// in only on success, so a failing operation leaves every row untouched and
/// concurrent read-modify-writes of the same row serialize on the write
/// lock.
#[derive(Debug)]
pub struct Store {
    state: RwLock<State>,
}

impl Store {
    /// Store loaded with the standard Swedish BAS chart subset.
    pub fn new() -> Self {
        Self::with_chart(standard_chart())
    }

    pub fn with_chart(chart: Vec<Account>) -> Self {
        Self {
            state: RwLock::new(State::with_chart(chart)),
        }
    }

    pub fn read<T>(&self, f: impl FnOnce(&State) -> T) -> T {
        // Clone-commit means a poisoned lock still guards a consistent state.
        let guard = match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&guard)
    }

    pub fn transaction<T, E>(&self, f: impl FnOnce(&mut State) -> Result<T, E>) -> Result<T, E> {
        let mut guard = match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut working = guard.clone();
        let value = f(&mut working)?;
        *guard = working;
        Ok(value)
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
