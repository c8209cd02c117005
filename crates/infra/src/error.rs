//! Service-level error: everything an operation can surface to the caller.

use thiserror::Error;

use kontera_audit::AuditError;
use kontera_core::DomainError;
use kontera_ledger::LedgerError;
use kontera_security::SecurityError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ServiceError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Security(#[from] SecurityError),

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl ServiceError {
    pub fn voucher_not_found() -> Self {
        Self::Domain(DomainError::NotFound)
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Domain(DomainError::conflict(msg))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ServiceError::Domain(DomainError::Concurrency(_)))
    }
}
