//! Chart-of-accounts definitions and balance arithmetic.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Account absorbing sub-krona VAT rounding differences
/// (BAS 3740, Öres- och kronutjämning).
pub const ROUNDING_ACCOUNT: &str = "3740";

/// High-level account kind (determines normal balance side).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Income,
    Expense,
}

impl AccountType {
    /// Asset and expense accounts grow on the debit side; the rest grow on
    /// the credit side.
    pub fn debit_normal(&self) -> bool {
        matches!(self, AccountType::Asset | AccountType::Expense)
    }

    /// Signed balance delta contributed by one journal line.
    pub fn balance_delta(&self, debit: Decimal, credit: Decimal) -> Decimal {
        if self.debit_normal() {
            debit - credit
        } else {
            credit - debit
        }
    }
}

impl core::fmt::Display for AccountType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            AccountType::Asset => "asset",
            AccountType::Liability => "liability",
            AccountType::Equity => "equity",
            AccountType::Income => "income",
            AccountType::Expense => "expense",
        };
        write!(f, "{s}")
    }
}

/// One row of the chart of accounts.
///
/// # Invariants
/// - `number` is the unique key (BAS account number).
/// - `balance` is mutated only by the posting engine and always equals the
///   signed sum of posted journal lines against this account.
/// - Accounts are never deleted, only deactivated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub number: String,
    pub name: String,
    pub account_type: AccountType,
    pub category: String,
    pub parent: Option<String>,
    pub active: bool,
    pub requires_vat: bool,
    /// Skatteverket whole-krona rule (22 kap. 1 § SFF): tax accounts reject
    /// fractional amounts; the fraction belongs on [`ROUNDING_ACCOUNT`].
    pub whole_unit_only: bool,
    pub balance: Decimal,
    /// Optimistic-concurrency counter, bumped on every balance update.
    pub version: u64,
}

impl Account {
    pub fn new(
        number: impl Into<String>,
        name: impl Into<String>,
        account_type: AccountType,
        category: impl Into<String>,
    ) -> Self {
        Self {
            number: number.into(),
            name: name.into(),
            account_type,
            category: category.into(),
            parent: None,
            active: true,
            requires_vat: false,
            whole_unit_only: false,
            balance: Decimal::ZERO,
            version: 0,
        }
    }

    pub fn with_vat(mut self) -> Self {
        self.requires_vat = true;
        self
    }

    pub fn whole_unit(mut self) -> Self {
        self.whole_unit_only = true;
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Apply one posted line to the running balance.
    pub fn apply(&mut self, debit: Decimal, credit: Decimal) {
        self.balance += self.account_type.balance_delta(debit, credit);
        self.version += 1;
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }
}

/// The fixed Swedish BAS subset this system posts against.
///
/// Loaded once at store construction; runtime code only reads and updates
/// balances.
pub fn standard_chart() -> Vec<Account> {
    use AccountType::*;
    vec![
        Account::new("1510", "Kundfordringar", Asset, "current_assets"),
        Account::new("1910", "Kassa", Asset, "cash_and_bank"),
        Account::new("1930", "Företagskonto", Asset, "cash_and_bank"),
        Account::new("2081", "Aktiekapital", Equity, "equity"),
        Account::new("2440", "Leverantörsskulder", Liability, "current_liabilities"),
        Account::new("2510", "Skatteskulder", Liability, "tax_liabilities").whole_unit(),
        Account::new("2610", "Utgående moms, 25%", Liability, "vat").with_vat(),
        Account::new(
            "2611",
            "Utgående moms på försäljning inom Sverige, 25%",
            Liability,
            "vat",
        )
        .with_vat()
        .with_parent("2610"),
        Account::new("2640", "Ingående moms", Liability, "vat").with_vat(),
        Account::new("2650", "Redovisningskonto för moms", Liability, "vat")
            .with_vat()
            .whole_unit(),
        Account::new("2710", "Personalskatt", Liability, "payroll").whole_unit(),
        Account::new(
            "2731",
            "Avräkning lagstadgade sociala avgifter",
            Liability,
            "payroll",
        )
        .whole_unit(),
        Account::new("3001", "Försäljning inom Sverige, 25% moms", Income, "sales").with_vat(),
        Account::new("3740", "Öres- och kronutjämning", Income, "adjustments"),
        Account::new("5420", "Programvaror", Expense, "operating_expenses").with_vat(),
        Account::new("6110", "Kontorsmateriel", Expense, "operating_expenses").with_vat(),
        Account::new("6212", "Mobiltelefon", Expense, "operating_expenses").with_vat(),
        Account::new("6540", "IT-tjänster", Expense, "operating_expenses").with_vat(),
    ]
}
