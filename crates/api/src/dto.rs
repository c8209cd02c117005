//! Request and response shapes for the callable actions.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use kontera_core::{Amount, DomainError, UserId, VoucherId};
use kontera_infra::ServiceError;
use kontera_ledger::{
    JournalLine, LedgerError, VatBreakdown, VatComponent, VatDirection, VatRate, Voucher,
    VoucherType,
};
use kontera_security::CallerMeta;

use crate::error::ApiError;

/// Uniform action envelope: success flag plus payload, or an error.
#[derive(Debug, Serialize)]
pub struct ActionResult<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl<T> ActionResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: impl Into<ApiError>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn into_result(self) -> Result<T, ApiError> {
        match (self.data, self.error) {
            (Some(data), None) => Ok(data),
            (_, Some(error)) => Err(error),
            (None, None) => Err(ApiError::new("INTERNAL", "empty action result")),
        }
    }
}

impl<T> From<Result<T, ServiceError>> for ActionResult<T> {
    fn from(result: Result<T, ServiceError>) -> Self {
        match result {
            Ok(data) => ActionResult::ok(data),
            Err(err) => ActionResult::err(ApiError::from(err)),
        }
    }
}

/// One journal line as supplied by a caller: exactly one of `debit`/`credit`.
#[derive(Debug, Clone, Deserialize)]
pub struct EntryInput {
    pub account: String,
    pub debit: Option<Decimal>,
    pub credit: Option<Decimal>,
    pub description: String,
    #[serde(default)]
    pub reference: Option<String>,
}

impl EntryInput {
    pub fn into_line(self) -> Result<JournalLine, ServiceError> {
        let line = match (self.debit, self.credit) {
            (Some(debit), None) => JournalLine::debit(
                self.account,
                Amount::new(debit).map_err(LedgerError::from)?,
                self.description,
            ),
            (None, Some(credit)) => JournalLine::credit(
                self.account,
                Amount::new(credit).map_err(LedgerError::from)?,
                self.description,
            ),
            _ => {
                return Err(ServiceError::Domain(DomainError::validation(format!(
                    "entry for account {} must set exactly one of debit or credit",
                    self.account
                ))));
            }
        };
        Ok(match self.reference {
            Some(reference) => line.with_reference(reference),
            None => line,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateVoucherRequest {
    pub description: String,
    pub voucher_type: VoucherType,
    pub date: NaiveDate,
    #[serde(default)]
    pub source_ref: Option<String>,
    pub entries: Vec<EntryInput>,
}

/// One subtotal+rate component; the rate comes in as its decimal value
/// (0.25, 0.12, 0.06 or 0).
#[derive(Debug, Clone, Deserialize)]
pub struct VatComponentInput {
    pub subtotal: Decimal,
    pub rate: Decimal,
    pub net_account: String,
    pub vat_account: String,
    pub description: String,
}

impl VatComponentInput {
    pub fn into_component(self) -> Result<VatComponent, ServiceError> {
        Ok(VatComponent {
            subtotal: Amount::new(self.subtotal).map_err(LedgerError::from)?,
            rate: VatRate::from_decimal(self.rate)?,
            net_account: self.net_account,
            vat_account: self.vat_account,
            description: self.description,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateVatVoucherRequest {
    pub description: String,
    pub voucher_type: VoucherType,
    pub date: NaiveDate,
    #[serde(default)]
    pub source_ref: Option<String>,
    pub direction: VatDirection,
    pub counter_account: String,
    pub components: Vec<VatComponentInput>,
}

#[derive(Debug, Serialize)]
pub struct VatVoucherPayload {
    pub voucher: Voucher,
    pub breakdowns: Vec<VatBreakdown>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupersedeRequest {
    pub original: VoucherId,
    pub replacement: VoucherId,
    pub reason: String,
    pub actor: UserId,
    pub code: String,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoidRequest {
    pub voucher: VoucherId,
    pub reason: String,
    pub actor: UserId,
    pub code: String,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnnotateRequest {
    pub voucher: VoucherId,
    /// Flat annotation-type tag; restricted tags are rejected here.
    pub annotation_type: String,
    pub message: String,
    #[serde(default)]
    pub related_voucher: Option<VoucherId>,
    pub actor: UserId,
    pub code: String,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PeriodClosedPayload {
    pub year: i32,
    pub period: u32,
}

pub(crate) fn caller_meta(ip_address: Option<String>, user_agent: Option<String>) -> CallerMeta {
    CallerMeta {
        ip_address,
        user_agent,
    }
}
