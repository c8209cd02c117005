//! Read-only projections over posted vouchers.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use kontera_core::VoucherId;
use kontera_ledger::{AccountType, LedgerError, Voucher, VoucherStatus, VoucherType};

use crate::error::ServiceError;
use crate::store::Store;

/// One trial-balance row, shown on the account's natural side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialBalanceRow {
    pub account_number: String,
    pub account_name: String,
    pub debit_balance: Decimal,
    pub credit_balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialBalance {
    pub rows: Vec<TrialBalanceRow>,
    pub total_debit: Decimal,
    pub total_credit: Decimal,
    pub balanced: bool,
    pub total_vouchers: usize,
    pub superseded_vouchers: usize,
    pub include_superseded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountBalanceReport {
    pub account_number: String,
    pub account_name: String,
    pub account_type: AccountType,
    /// Typed balance over posted, non-superseded entries.
    pub balance: Decimal,
    pub total_debits: Decimal,
    pub total_credits: Decimal,
    pub transaction_count: usize,
    pub last_transaction: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoucherSummary {
    pub id: VoucherId,
    pub number: String,
    pub date: NaiveDate,
    pub description: String,
    pub voucher_type: VoucherType,
    pub total_amount: Decimal,
    pub status: VoucherStatus,
    pub posted: bool,
    pub entry_count: usize,
    pub superseded_by: Option<VoucherId>,
    pub source_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodListing {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub vouchers: Vec<VoucherSummary>,
    pub total_amount: Decimal,
    pub posted: usize,
    pub pending: usize,
    pub superseded: usize,
}

#[derive(Debug, Clone)]
pub struct Reporting {
    store: Arc<Store>,
}

impl Reporting {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Trial balance over posted entries. By default superseded and void
    /// vouchers are excluded; `include_superseded` adds them back for
    /// full-audit views.
    pub fn trial_balance(&self, include_superseded: bool) -> TrialBalance {
        self.store.read(|state| {
            let mut sums: BTreeMap<&str, (Decimal, Decimal)> = BTreeMap::new();
            for entry in &state.entries {
                let Some(voucher) = state.voucher(entry.voucher) else {
                    continue;
                };
                if !counts_toward_reports(voucher, include_superseded) {
                    continue;
                }
                let slot = sums.entry(entry.line.account.as_str()).or_default();
                slot.0 += entry.line.debit_amount();
                slot.1 += entry.line.credit_amount();
            }

            let mut rows = Vec::new();
            let mut total_debit = Decimal::ZERO;
            let mut total_credit = Decimal::ZERO;
            for account in state.accounts.values().filter(|a| a.active) {
                let Some((debits, credits)) = sums.get(account.number.as_str()) else {
                    continue;
                };
                let net = debits - credits;
                // Accounts show on their natural side; a contrary balance
                // flips to the other column.
                let (debit_balance, credit_balance) = if account.account_type.debit_normal() {
                    if net >= Decimal::ZERO {
                        (net, Decimal::ZERO)
                    } else {
                        (Decimal::ZERO, -net)
                    }
                } else if net <= Decimal::ZERO {
                    (Decimal::ZERO, -net)
                } else {
                    (net, Decimal::ZERO)
                };

                if debit_balance.is_zero() && credit_balance.is_zero() {
                    continue;
                }
                total_debit += debit_balance;
                total_credit += credit_balance;
                rows.push(TrialBalanceRow {
                    account_number: account.number.clone(),
                    account_name: account.name.clone(),
                    debit_balance,
                    credit_balance,
                });
            }

            let superseded_vouchers = state
                .vouchers
                .values()
                .filter(|v| {
                    matches!(v.status, VoucherStatus::Superseded | VoucherStatus::Void)
                })
                .count();

            TrialBalance {
                rows,
                total_debit,
                total_credit,
                balanced: (total_debit - total_credit).abs() < Decimal::new(1, 2),
                total_vouchers: state.vouchers.len(),
                superseded_vouchers,
                include_superseded,
            }
        })
    }

    /// Typed balance for one account over posted, non-superseded entries.
    pub fn account_balance(&self, number: &str) -> Result<AccountBalanceReport, ServiceError> {
        self.store.read(|state| {
            let account = state
                .accounts
                .get(number)
                .ok_or_else(|| LedgerError::UnknownAccount(number.to_string()))?;

            let mut total_debits = Decimal::ZERO;
            let mut total_credits = Decimal::ZERO;
            let mut transaction_count = 0;
            let mut last_transaction = None;
            for entry in state.entries.iter().filter(|e| e.line.account == *number) {
                let Some(voucher) = state.voucher(entry.voucher) else {
                    continue;
                };
                if !counts_toward_reports(voucher, false) {
                    continue;
                }
                total_debits += entry.line.debit_amount();
                total_credits += entry.line.credit_amount();
                transaction_count += 1;
                last_transaction = last_transaction.max(Some(entry.created_at));
            }

            Ok(AccountBalanceReport {
                account_number: account.number.clone(),
                account_name: account.name.clone(),
                account_type: account.account_type,
                balance: account
                    .account_type
                    .balance_delta(total_debits, total_credits),
                total_debits,
                total_credits,
                transaction_count,
                last_transaction,
            })
        })
    }

    /// Voucher summaries for a date range, with period statistics.
    pub fn vouchers_in_period(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        include_superseded: bool,
        voucher_type: Option<VoucherType>,
    ) -> PeriodListing {
        self.store.read(|state| {
            let mut selected: Vec<&Voucher> = state
                .vouchers
                .values()
                .filter(|v| start <= v.date && v.date <= end)
                .filter(|v| {
                    include_superseded
                        || !matches!(v.status, VoucherStatus::Superseded | VoucherStatus::Void)
                })
                .filter(|v| voucher_type.is_none_or(|t| v.voucher_type == t))
                .collect();
            selected.sort_by_key(|v| v.sequence);

            let vouchers: Vec<VoucherSummary> = selected
                .into_iter()
                .map(|v| VoucherSummary {
                    id: v.id,
                    number: v.number(),
                    date: v.date,
                    description: v.description.clone(),
                    voucher_type: v.voucher_type,
                    total_amount: v.total_amount.value(),
                    status: v.status,
                    posted: v.posted,
                    entry_count: state.entries_for(v.id).len(),
                    superseded_by: v.superseded_by,
                    source_ref: v.source_ref.clone(),
                })
                .collect();

            let total_amount = vouchers.iter().map(|v| v.total_amount).sum();
            let posted = vouchers.iter().filter(|v| v.posted).count();
            let superseded = vouchers
                .iter()
                .filter(|v| matches!(v.status, VoucherStatus::Superseded | VoucherStatus::Void))
                .count();
            let pending = vouchers
                .iter()
                .filter(|v| !v.posted && v.status == VoucherStatus::Active)
                .count();

            PeriodListing {
                start,
                end,
                vouchers,
                total_amount,
                posted,
                pending,
                superseded,
            }
        })
    }
}

fn counts_toward_reports(voucher: &Voucher, include_superseded: bool) -> bool {
    if !voucher.posted {
        return false;
    }
    include_superseded
        || !matches!(
            voucher.status,
            VoucherStatus::Superseded | VoucherStatus::Void
        )
}
