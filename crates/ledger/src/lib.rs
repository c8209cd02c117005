//! `kontera-ledger` — chart of accounts, vouchers, journal entries,
//! accounting periods and the Swedish VAT rounding rules.
//!
//! Pure domain logic only; persistence and transactional orchestration live
//! in `kontera-infra`.

pub mod account;
pub mod error;
pub mod period;
pub mod vat;
pub mod voucher;

pub use account::{Account, AccountType, ROUNDING_ACCOUNT, standard_chart};
pub use error::LedgerError;
pub use period::AccountingPeriod;
pub use vat::{VatBreakdown, VatComponent, VatDirection, VatRate};
pub use voucher::{
    JournalEntry, JournalLine, SecurityLevel, Side, Voucher, VoucherStatus, VoucherType,
    validate_balance,
};
