//! Voucher & journal posting engine.
//!
//! Posting applies every line of a voucher to its account balance in one
//! transaction; a version re-check per touched account catches lost updates
//! and the whole posting is retried once before a conflict is surfaced.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use kontera_core::{DomainError, VoucherId};
use kontera_ledger::{
    AccountingPeriod, JournalEntry, JournalLine, LedgerError, VatBreakdown, VatComponent,
    VatDirection, Voucher, VoucherType, validate_balance, vat, voucher as voucher_rules,
};

use crate::error::ServiceError;
use crate::store::{State, Store};

/// Input for [`PostingService::create_voucher`].
#[derive(Debug, Clone)]
pub struct NewVoucher {
    pub description: String,
    pub voucher_type: VoucherType,
    pub date: NaiveDate,
    pub source_ref: Option<String>,
    pub lines: Vec<JournalLine>,
}

/// Input for [`PostingService::create_vat_voucher`]: subtotal+rate components
/// expanded through the VAT rounding module.
#[derive(Debug, Clone)]
pub struct NewVatVoucher {
    pub description: String,
    pub voucher_type: VoucherType,
    pub date: NaiveDate,
    pub source_ref: Option<String>,
    pub direction: VatDirection,
    pub components: Vec<VatComponent>,
    pub counter_account: String,
}

#[derive(Debug, Clone)]
pub struct PostingService {
    store: Arc<Store>,
}

impl PostingService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Validate and register a voucher. No balances are touched; the voucher
    /// comes back Active with the next sequence number.
    pub fn create_voucher(&self, request: NewVoucher) -> Result<Voucher, ServiceError> {
        let created_at = Utc::now();
        self.store.transaction(|state| {
            validate_balance(&request.lines)?;
            check_accounts(state, &request.lines)?;

            let sequence = state.allocate_sequence();
            let mut voucher = Voucher::new(
                VoucherId::new(),
                sequence,
                request.date,
                request.description.clone(),
                request.voucher_type,
                request.source_ref.clone(),
                created_at,
            );
            let (debits, _) = voucher_rules::totals(&request.lines);
            voucher.activate(kontera_core::Amount::new(debits).map_err(LedgerError::from)?);

            for line in &request.lines {
                state.entries.push(JournalEntry {
                    voucher: voucher.id,
                    line: line.clone(),
                    created_at,
                });
            }
            state.vouchers.insert(voucher.id, voucher.clone());
            tracing::info!(voucher = %voucher.number(), lines = request.lines.len(), "voucher created");
            Ok(voucher)
        })
    }

    /// Expand subtotal+rate components into whole-krona VAT lines plus a
    /// gross counter line, then create the voucher as usual.
    pub fn create_vat_voucher(
        &self,
        request: NewVatVoucher,
    ) -> Result<(Voucher, Vec<VatBreakdown>), ServiceError> {
        let (lines, breakdowns) = vat::expand_components(
            &request.components,
            request.direction,
            &request.counter_account,
            &request.description,
        )?;
        let voucher = self.create_voucher(NewVoucher {
            description: request.description,
            voucher_type: request.voucher_type,
            date: request.date,
            source_ref: request.source_ref,
            lines,
        })?;
        Ok((voucher, breakdowns))
    }

    /// Post a voucher: re-validate, then apply every line to its account in
    /// one atomic transaction. Conflicting balance updates are retried once.
    pub fn post_voucher(&self, id: VoucherId, now: DateTime<Utc>) -> Result<Voucher, ServiceError> {
        match self.try_post(id, now) {
            Err(ref err) if err.is_conflict() => {
                tracing::warn!(voucher = %id, "balance version conflict, retrying posting");
                self.try_post(id, now)
            }
            other => other,
        }
    }

    fn try_post(&self, id: VoucherId, now: DateTime<Utc>) -> Result<Voucher, ServiceError> {
        // Snapshot account versions outside the transaction; the re-check
        // inside detects a concurrent balance update on the same rows.
        let expected: HashMap<String, u64> = self.store.read(|state| {
            state
                .entries_for(id)
                .iter()
                .filter_map(|e| {
                    state
                        .accounts
                        .get(&e.line.account)
                        .map(|a| (a.number.clone(), a.version))
                })
                .collect()
        });

        self.store.transaction(|state| {
            let voucher = state.voucher(id).ok_or_else(ServiceError::voucher_not_found)?;
            if voucher.posted {
                return Err(LedgerError::AlreadyPosted(voucher.sequence).into());
            }
            if let Some(period) = state.closed_period_containing(voucher.date) {
                return Err(LedgerError::PeriodClosed {
                    year: period.year,
                    period: period.period,
                }
                .into());
            }

            let lines: Vec<JournalLine> = state
                .entries_for(id)
                .into_iter()
                .map(|e| e.line.clone())
                .collect();
            validate_balance(&lines)?;

            for line in &lines {
                let account = state
                    .accounts
                    .get(&line.account)
                    .ok_or_else(|| LedgerError::UnknownAccount(line.account.clone()))?;
                match expected.get(&account.number) {
                    Some(version) if *version == account.version => {}
                    _ => {
                        return Err(ServiceError::conflict(format!(
                            "account {} balance changed concurrently",
                            account.number
                        )));
                    }
                }
            }

            for line in &lines {
                if let Some(account) = state.accounts.get_mut(&line.account) {
                    account.apply(line.debit_amount(), line.credit_amount());
                }
            }

            let voucher = state
                .voucher_mut(id)
                .ok_or_else(ServiceError::voucher_not_found)?;
            voucher.mark_posted(now)?;
            tracing::info!(voucher = %voucher.number(), "voucher posted");
            Ok(voucher.clone())
        })
    }

    /// Register an accounting period.
    pub fn add_period(&self, period: AccountingPeriod) -> Result<(), ServiceError> {
        self.store.transaction(|state| {
            if state
                .periods
                .iter()
                .any(|p| p.year == period.year && p.period == period.period)
            {
                return Err(ServiceError::Domain(DomainError::state(format!(
                    "period {}-{:02} already exists",
                    period.year, period.period
                ))));
            }
            state.periods.push(period);
            Ok(())
        })
    }

    /// Close a period; postings dated inside it are rejected from then on.
    pub fn close_period(&self, year: i32, period: u32, now: DateTime<Utc>) -> Result<(), ServiceError> {
        self.store.transaction(|state| {
            let row = state
                .periods
                .iter_mut()
                .find(|p| p.year == year && p.period == period)
                .ok_or(ServiceError::Domain(DomainError::NotFound))?;
            row.close(now)?;
            tracing::info!(year, period, "accounting period closed");
            Ok(())
        })
    }
}

fn check_accounts(state: &State, lines: &[JournalLine]) -> Result<(), ServiceError> {
    for line in lines {
        let account = state
            .accounts
            .get(&line.account)
            .ok_or_else(|| LedgerError::UnknownAccount(line.account.clone()))?;
        if !account.active {
            return Err(LedgerError::InactiveAccount(line.account.clone()).into());
        }
        if account.whole_unit_only && !line.amount.is_whole() {
            return Err(LedgerError::WholeUnitRequired {
                account: line.account.clone(),
                amount: line.amount.value(),
            }
            .into());
        }
    }
    Ok(())
}
