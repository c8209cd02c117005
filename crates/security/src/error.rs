//! Security error model.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Failures surfaced by the TOTP gate and the protected annotation paths.
///
/// Variants carry the remediation hints the caller gets back
/// (`retry_after`, `unlock_time`, `attempts_remaining`).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SecurityError {
    #[error("invalid TOTP code ({attempts_remaining} attempts remaining before lockout)")]
    InvalidTotp { attempts_remaining: u32 },

    #[error("too many verification attempts; retry in {retry_after}s")]
    RateLimited { retry_after: i64 },

    #[error("account locked until {unlock_time}")]
    AccountLocked { unlock_time: DateTime<Utc> },

    #[error("code must be 6 digits (TOTP) or 8 digits (backup code)")]
    InvalidFormat,

    #[error("TOTP is not configured for this user")]
    NotConfigured,

    #[error("annotation type {requested} is security-restricted and cannot be written directly")]
    RestrictedType { requested: String },

    #[error("this operation requires TOTP verification")]
    MissingVerification,
}

impl SecurityError {
    /// Stable machine-readable code, also used as the logged failure reason.
    pub fn code(&self) -> &'static str {
        match self {
            SecurityError::InvalidTotp { .. } => "INVALID_TOTP",
            SecurityError::RateLimited { .. } => "RATE_LIMITED",
            SecurityError::AccountLocked { .. } => "ACCOUNT_LOCKED",
            SecurityError::InvalidFormat => "INVALID_FORMAT",
            SecurityError::NotConfigured => "NO_TOTP_CONFIGURED",
            SecurityError::RestrictedType { .. } => "SECURITY_RESTRICTED_TYPE",
            SecurityError::MissingVerification => "MISSING_TOTP_VERIFICATION",
        }
    }
}
