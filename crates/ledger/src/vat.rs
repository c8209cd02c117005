//! Swedish VAT rounding.
//!
//! Skatteverket requires VAT lines in whole kronor (22 kap. 1 § SFF) even
//! though `subtotal × rate` is fractional. The raw VAT is computed at full
//! precision, rounded half-up to a whole krona, and any difference of one öre
//! or more is booked against [`ROUNDING_ACCOUNT`] instead of the VAT account.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use kontera_core::Amount;

use crate::account::ROUNDING_ACCOUNT;
use crate::error::LedgerError;
use crate::voucher::{JournalLine, Side};

/// Swedish VAT rates. Anything else is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VatRate {
    Standard25,
    Reduced12,
    Low6,
    Exempt,
}

impl VatRate {
    pub fn as_decimal(&self) -> Decimal {
        match self {
            VatRate::Standard25 => Decimal::new(25, 2),
            VatRate::Reduced12 => Decimal::new(12, 2),
            VatRate::Low6 => Decimal::new(6, 2),
            VatRate::Exempt => Decimal::ZERO,
        }
    }

    pub fn from_decimal(value: Decimal) -> Result<Self, LedgerError> {
        if value == Decimal::new(25, 2) {
            Ok(VatRate::Standard25)
        } else if value == Decimal::new(12, 2) {
            Ok(VatRate::Reduced12)
        } else if value == Decimal::new(6, 2) {
            Ok(VatRate::Low6)
        } else if value == Decimal::ZERO {
            Ok(VatRate::Exempt)
        } else {
            Err(LedgerError::InvalidVatRate(value))
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            VatRate::Standard25 => "VAT 25%",
            VatRate::Reduced12 => "VAT 12%",
            VatRate::Low6 => "VAT 6%",
            VatRate::Exempt => "VAT 0%",
        }
    }
}

/// Whether the VAT-bearing side of the voucher is debit (expense) or credit
/// (revenue).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VatDirection {
    Expense,
    Revenue,
}

impl VatDirection {
    fn main_side(&self) -> Side {
        match self {
            VatDirection::Expense => Side::Debit,
            VatDirection::Revenue => Side::Credit,
        }
    }

    fn counter_side(&self) -> Side {
        match self {
            VatDirection::Expense => Side::Credit,
            VatDirection::Revenue => Side::Debit,
        }
    }
}

/// One net-amount + rate pair to be expanded into journal lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VatComponent {
    pub subtotal: Amount,
    pub rate: VatRate,
    pub net_account: String,
    pub vat_account: String,
    pub description: String,
}

/// Result of the whole-krona VAT computation for one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VatBreakdown {
    pub subtotal: Amount,
    /// `subtotal × rate` at full precision.
    pub vat_raw: Decimal,
    /// Raw VAT rounded half-up to whole kronor; what the VAT account gets.
    pub vat: Amount,
    /// `vat_raw − vat`; booked against the rounding account when ≥ one öre.
    pub rounding_diff: Decimal,
    /// `subtotal + vat_raw`, the economic total of the component.
    pub gross: Decimal,
}

impl VatBreakdown {
    pub fn compute(subtotal: Amount, rate: VatRate) -> Self {
        let vat_raw = subtotal.value() * rate.as_decimal();
        let vat = Amount::new_unchecked(vat_raw).round_whole();
        let rounding_diff = vat_raw - vat.value();
        Self {
            subtotal,
            vat_raw,
            vat,
            rounding_diff,
            gross: subtotal.value() + vat_raw,
        }
    }

    pub fn has_rounding(&self) -> bool {
        self.rounding_diff.abs() >= Decimal::new(1, 2)
    }
}

impl VatComponent {
    /// Expand into journal lines: net line, whole-krona VAT line, and a
    /// rounding line when the difference is at least one öre. The signed sum
    /// of the emitted lines equals `gross` on the direction's main side, so a
    /// counter line of `gross` on the opposite side balances the set exactly.
    pub fn expand(&self, direction: VatDirection) -> (Vec<JournalLine>, VatBreakdown) {
        let breakdown = VatBreakdown::compute(self.subtotal, self.rate);
        let side = direction.main_side();
        let mut lines = Vec::new();

        if self.rate == VatRate::Exempt {
            lines.push(line(
                &self.net_account,
                side,
                self.subtotal,
                format!("{} (VAT exempt)", self.description),
            ));
            return (lines, breakdown);
        }

        lines.push(line(&self.net_account, side, self.subtotal, self.description.clone()));

        if !breakdown.vat.is_zero() {
            lines.push(line(
                &self.vat_account,
                side,
                breakdown.vat,
                self.rate.label().to_string(),
            ));
        }

        if breakdown.has_rounding() {
            // Raw above rounded: the main side is short, pad it.
            // Raw below rounded: the main side overshot, offset it.
            let rounding_side = if breakdown.rounding_diff > Decimal::ZERO {
                side
            } else {
                direction.counter_side()
            };
            lines.push(line(
                ROUNDING_ACCOUNT,
                rounding_side,
                Amount::new_unchecked(breakdown.rounding_diff.abs()),
                format!(
                    "VAT rounding adjustment ({} -> {})",
                    breakdown.vat_raw, breakdown.vat
                ),
            ));
        }

        (lines, breakdown)
    }
}

fn line(account: &str, side: Side, amount: Amount, description: String) -> JournalLine {
    JournalLine {
        account: account.to_string(),
        side,
        amount,
        description,
        reference: None,
    }
}

/// Expand several components (one per rate present) plus the counter line for
/// the summed gross. Each component gets its own independent rounding line.
pub fn expand_components(
    components: &[VatComponent],
    direction: VatDirection,
    counter_account: &str,
    counter_description: &str,
) -> Result<(Vec<JournalLine>, Vec<VatBreakdown>), LedgerError> {
    if components.is_empty() {
        return Err(LedgerError::NoEntries);
    }

    let mut lines = Vec::new();
    let mut breakdowns = Vec::new();
    let mut gross_total = Decimal::ZERO;

    for component in components {
        let (component_lines, breakdown) = component.expand(direction);
        gross_total += breakdown.gross;
        lines.extend(component_lines);
        breakdowns.push(breakdown);
    }

    lines.push(line(
        counter_account,
        direction.counter_side(),
        Amount::new(gross_total)?,
        counter_description.to_string(),
    ));

    Ok((lines, breakdowns))
}
