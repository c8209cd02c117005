//! Mapping from service errors to stable API error codes and hints.

use chrono::{DateTime, Utc};
use serde::Serialize;

use kontera_audit::AuditError;
use kontera_core::DomainError;
use kontera_infra::ServiceError;
use kontera_ledger::LedgerError;
use kontera_security::SecurityError;

/// Structured error surfaced by every action: a stable code, a human-readable
/// message, and remediation hints where the failure has one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiError {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlock_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts_remaining: Option<u32>,
}

impl ApiError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retry_after: None,
            unlock_time: None,
            attempts_remaining: None,
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::Ledger(e) => ApiError::new(ledger_code(&e), message),
            ServiceError::Security(e) => {
                let mut api = ApiError::new(e.code(), message);
                match e {
                    SecurityError::RateLimited { retry_after } => {
                        api.retry_after = Some(retry_after);
                    }
                    SecurityError::AccountLocked { unlock_time } => {
                        api.unlock_time = Some(unlock_time);
                    }
                    SecurityError::InvalidTotp { attempts_remaining } => {
                        api.attempts_remaining = Some(attempts_remaining);
                    }
                    _ => {}
                }
                api
            }
            ServiceError::Audit(e) => ApiError::new(
                match e {
                    AuditError::MessageTooLong { .. } => "MESSAGE_TOO_LONG",
                    AuditError::ReasonTooLong { .. } => "REASON_TOO_LONG",
                },
                message,
            ),
            ServiceError::Domain(e) => ApiError::new(
                match e {
                    DomainError::Validation(_) => "VALIDATION_ERROR",
                    DomainError::State(_) => "STATE_ERROR",
                    DomainError::Concurrency(_) => "CONCURRENCY_CONFLICT",
                    DomainError::InvalidId(_) => "INVALID_ID",
                    DomainError::NotFound => "NOT_FOUND",
                },
                message,
            ),
        }
    }
}

fn ledger_code(err: &LedgerError) -> &'static str {
    match err {
        LedgerError::NoEntries => "NO_ENTRIES",
        LedgerError::ZeroAmount { .. } => "ZERO_AMOUNT",
        LedgerError::UnbalancedEntries { .. } => "UNBALANCED_ENTRIES",
        LedgerError::UnknownAccount(_) => "UNKNOWN_ACCOUNT",
        LedgerError::InactiveAccount(_) => "INACTIVE_ACCOUNT",
        LedgerError::WholeUnitRequired { .. } => "WHOLE_UNIT_REQUIRED",
        LedgerError::InvalidVatRate(_) => "INVALID_VAT_RATE",
        LedgerError::PeriodClosed { .. } => "PERIOD_CLOSED",
        LedgerError::AlreadyPosted(_) => "ALREADY_POSTED",
        LedgerError::NotActive { .. } => "NOT_ACTIVE",
        LedgerError::SelfSupersession => "SELF_SUPERSESSION",
        LedgerError::ReplacementNotActive { .. } => "REPLACEMENT_NOT_ACTIVE",
        LedgerError::SupersessionLoop(_) => "SUPERSESSION_LOOP",
        LedgerError::VoidPosted(_) => "VOID_POSTED",
        LedgerError::Amount(_) => "NEGATIVE_AMOUNT",
    }
}
