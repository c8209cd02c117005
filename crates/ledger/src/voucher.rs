//! Vouchers and journal lines.
//!
//! A voucher groups one balanced set of journal lines. Lifecycle:
//! constructed as `Draft`, activated once its lines validate, posted exactly
//! once, and thereafter only annotated (superseded/voided), never edited.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use kontera_core::{Amount, VoucherId};

use crate::error::LedgerError;

/// Balance tolerance: one öre.
pub fn balance_tolerance() -> Decimal {
    Decimal::new(1, 2)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoucherStatus {
    Draft,
    Active,
    Superseded,
    Void,
}

impl core::fmt::Display for VoucherStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            VoucherStatus::Draft => "DRAFT",
            VoucherStatus::Active => "ACTIVE",
            VoucherStatus::Superseded => "SUPERSEDED",
            VoucherStatus::Void => "VOID",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityLevel {
    #[default]
    Standard,
    TotpRequired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoucherType {
    SalesInvoice,
    Purchase,
    Payment,
    PaymentReminder,
    Adjustment,
    OpeningBalance,
    ClosingEntry,
}

/// Which side of the ledger a journal line touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Debit,
    Credit,
}

/// A single debit or credit against one account within a voucher.
///
/// The debit-xor-credit rule is structural: a line carries one `Side` and one
/// amount. Immutable once the parent voucher is posted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalLine {
    pub account: String,
    pub side: Side,
    pub amount: Amount,
    pub description: String,
    pub reference: Option<String>,
}

impl JournalLine {
    pub fn debit(account: impl Into<String>, amount: Amount, description: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            side: Side::Debit,
            amount,
            description: description.into(),
            reference: None,
        }
    }

    pub fn credit(
        account: impl Into<String>,
        amount: Amount,
        description: impl Into<String>,
    ) -> Self {
        Self {
            account: account.into(),
            side: Side::Credit,
            amount,
            description: description.into(),
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn debit_amount(&self) -> Decimal {
        match self.side {
            Side::Debit => self.amount.value(),
            Side::Credit => Decimal::ZERO,
        }
    }

    pub fn credit_amount(&self) -> Decimal {
        match self.side {
            Side::Debit => Decimal::ZERO,
            Side::Credit => self.amount.value(),
        }
    }
}

/// Total debits and credits over a set of lines.
pub fn totals(lines: &[JournalLine]) -> (Decimal, Decimal) {
    let mut debits = Decimal::ZERO;
    let mut credits = Decimal::ZERO;
    for line in lines {
        debits += line.debit_amount();
        credits += line.credit_amount();
    }
    (debits, credits)
}

/// Validate the pre-posting invariant: non-empty, every amount positive,
/// Σdebit = Σcredit within one öre.
pub fn validate_balance(lines: &[JournalLine]) -> Result<(), LedgerError> {
    if lines.is_empty() {
        return Err(LedgerError::NoEntries);
    }
    for line in lines {
        if line.amount.is_zero() {
            return Err(LedgerError::ZeroAmount {
                account: line.account.clone(),
            });
        }
    }
    let (debits, credits) = totals(lines);
    if (debits - credits).abs() > balance_tolerance() {
        return Err(LedgerError::UnbalancedEntries { debits, credits });
    }
    Ok(())
}

/// Persisted journal-entry row: one line bound to its voucher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub voucher: VoucherId,
    pub line: JournalLine,
    pub created_at: DateTime<Utc>,
}

/// The audit-trail container grouping one balanced set of journal lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voucher {
    pub id: VoucherId,
    /// Strictly increasing, unique, gaps tolerated. Never renumbered.
    pub sequence: u64,
    pub date: NaiveDate,
    pub description: String,
    pub voucher_type: VoucherType,
    pub source_ref: Option<String>,
    pub total_amount: Amount,
    pub status: VoucherStatus,
    pub superseded_by: Option<VoucherId>,
    pub security_level: SecurityLevel,
    pub posted: bool,
    pub posted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Voucher {
    pub fn new(
        id: VoucherId,
        sequence: u64,
        date: NaiveDate,
        description: impl Into<String>,
        voucher_type: VoucherType,
        source_ref: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            sequence,
            date,
            description: description.into(),
            voucher_type,
            source_ref,
            total_amount: Amount::ZERO,
            status: VoucherStatus::Draft,
            superseded_by: None,
            security_level: SecurityLevel::Standard,
            posted: false,
            posted_at: None,
            created_at,
        }
    }

    /// Human-facing voucher number ("V007").
    pub fn number(&self) -> String {
        format!("V{:03}", self.sequence)
    }

    /// Transition Draft → Active once the line set has validated.
    pub fn activate(&mut self, total_amount: Amount) {
        self.total_amount = total_amount;
        self.status = VoucherStatus::Active;
    }

    pub fn mark_posted(&mut self, at: DateTime<Utc>) -> Result<(), LedgerError> {
        if self.posted {
            return Err(LedgerError::AlreadyPosted(self.sequence));
        }
        self.posted = true;
        self.posted_at = Some(at);
        Ok(())
    }

    pub fn mark_superseded(&mut self, by: VoucherId) -> Result<(), LedgerError> {
        if self.id == by {
            return Err(LedgerError::SelfSupersession);
        }
        if self.status != VoucherStatus::Active {
            return Err(LedgerError::NotActive {
                number: self.sequence,
                status: self.status,
            });
        }
        self.status = VoucherStatus::Superseded;
        self.superseded_by = Some(by);
        self.security_level = SecurityLevel::TotpRequired;
        Ok(())
    }

    /// Voiding is for unposted vouchers only; a posted voucher is corrected
    /// by a reversing voucher plus supersession.
    pub fn mark_void(&mut self) -> Result<(), LedgerError> {
        if self.posted {
            return Err(LedgerError::VoidPosted(self.sequence));
        }
        if self.status != VoucherStatus::Active {
            return Err(LedgerError::NotActive {
                number: self.sequence,
                status: self.status,
            });
        }
        self.status = VoucherStatus::Void;
        self.security_level = SecurityLevel::TotpRequired;
        Ok(())
    }

    pub fn require_totp(&mut self) {
        self.security_level = SecurityLevel::TotpRequired;
    }
}
