//! Ledger error model.
//!
//! Variants carry the payloads the API layer needs for stable error codes and
//! remediation hints; nothing here is stringly-typed beyond free-form detail.

use rust_decimal::Decimal;
use thiserror::Error;

use kontera_core::AmountError;

use crate::voucher::VoucherStatus;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    #[error("voucher must have at least one journal entry")]
    NoEntries,

    #[error("journal entry amount must be greater than zero (account {account})")]
    ZeroAmount { account: String },

    #[error("unbalanced entries: debits {debits} != credits {credits}")]
    UnbalancedEntries { debits: Decimal, credits: Decimal },

    #[error("unknown account {0}")]
    UnknownAccount(String),

    #[error("account {0} is inactive")]
    InactiveAccount(String),

    #[error("account {account} accepts whole-krona amounts only, got {amount}")]
    WholeUnitRequired { account: String, amount: Decimal },

    #[error("invalid VAT rate {0}; expected 0.25, 0.12, 0.06 or 0")]
    InvalidVatRate(Decimal),

    #[error("accounting period {year}-{period:02} is closed")]
    PeriodClosed { year: i32, period: u32 },

    #[error("voucher V{0:03} is already posted")]
    AlreadyPosted(u64),

    #[error("voucher V{number:03} is not active (status {status})")]
    NotActive { number: u64, status: VoucherStatus },

    #[error("a voucher cannot supersede itself")]
    SelfSupersession,

    #[error("replacement voucher V{number:03} is not active (status {status})")]
    ReplacementNotActive { number: u64, status: VoucherStatus },

    #[error("supersession of voucher V{0:03} would form a loop")]
    SupersessionLoop(u64),

    #[error("voucher V{0:03} is posted and cannot be voided; supersede it with a reversing voucher")]
    VoidPosted(u64),

    #[error(transparent)]
    Amount(#[from] AmountError),
}
