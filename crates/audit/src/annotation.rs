//! Voucher annotation records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use kontera_core::{AnnotationId, UserId, VerificationId, VoucherId};
use kontera_security::VerificationToken;

/// Maximum annotation message length.
pub const MAX_MESSAGE_LEN: usize = 500;

/// Maximum business-justification length for supersede/void.
pub const MAX_REASON_LEN: usize = 200;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuditError {
    #[error("annotation message too long ({length} chars, max {MAX_MESSAGE_LEN})")]
    MessageTooLong { length: usize },

    #[error("reason too long ({length} chars, max {MAX_REASON_LEN})")]
    ReasonTooLong { length: usize },
}

/// Validate a supersede/void business justification.
pub fn validate_reason(reason: &str) -> Result<(), AuditError> {
    let length = reason.chars().count();
    if length > MAX_REASON_LEN {
        return Err(AuditError::ReasonTooLong { length });
    }
    Ok(())
}

/// Annotation types writable through the public secure-annotate path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OpenAnnotationType {
    Note,
    Correction,
    Reversal,
}

/// Annotation types writable only by internal TOTP-verified mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RestrictedAnnotationType {
    Superseded,
    Void,
    Created,
}

/// Full annotation type: the two permission classes under one closed tag set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnnotationType {
    Open(OpenAnnotationType),
    Restricted(RestrictedAnnotationType),
}

impl AnnotationType {
    pub fn is_restricted(&self) -> bool {
        matches!(self, AnnotationType::Restricted(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnnotationType::Open(OpenAnnotationType::Note) => "NOTE",
            AnnotationType::Open(OpenAnnotationType::Correction) => "CORRECTION",
            AnnotationType::Open(OpenAnnotationType::Reversal) => "REVERSAL",
            AnnotationType::Restricted(RestrictedAnnotationType::Superseded) => "SUPERSEDED",
            AnnotationType::Restricted(RestrictedAnnotationType::Void) => "VOID",
            AnnotationType::Restricted(RestrictedAnnotationType::Created) => "CREATED",
        }
    }
}

impl core::fmt::Display for AnnotationType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl core::str::FromStr for AnnotationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use AnnotationType::*;
        match s {
            "NOTE" => Ok(Open(OpenAnnotationType::Note)),
            "CORRECTION" => Ok(Open(OpenAnnotationType::Correction)),
            "REVERSAL" => Ok(Open(OpenAnnotationType::Reversal)),
            "SUPERSEDED" => Ok(Restricted(RestrictedAnnotationType::Superseded)),
            "VOID" => Ok(Restricted(RestrictedAnnotationType::Void)),
            "CREATED" => Ok(Restricted(RestrictedAnnotationType::Created)),
            other => Err(format!("unknown annotation type: {other}")),
        }
    }
}

/// One append-only audit-trail record on a voucher. Never edited or deleted.
///
/// # Invariant
/// Restricted annotations exist only with `security_verified = true`: both
/// constructors demand a verification token, and the restricted one is the
/// sole way to produce a restricted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoucherAnnotation {
    pub id: AnnotationId,
    pub voucher: VoucherId,
    pub annotation_type: AnnotationType,
    pub message: String,
    pub related_voucher: Option<VoucherId>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub security_verified: bool,
    /// The verification-log record that authorized this annotation.
    pub verification: Option<VerificationId>,
}

impl VoucherAnnotation {
    /// Public-class annotation (NOTE/CORRECTION/REVERSAL). Still requires a
    /// verification token; there is no unverified annotation path.
    pub fn open(
        voucher: VoucherId,
        annotation_type: OpenAnnotationType,
        message: impl Into<String>,
        related_voucher: Option<VoucherId>,
        token: &VerificationToken,
    ) -> Result<Self, AuditError> {
        Self::build(
            voucher,
            AnnotationType::Open(annotation_type),
            message.into(),
            related_voucher,
            token,
        )
    }

    /// Restricted-class annotation (SUPERSEDED/VOID/CREATED); called only
    /// from TOTP-verified internal mutations.
    pub fn restricted(
        voucher: VoucherId,
        annotation_type: RestrictedAnnotationType,
        message: impl Into<String>,
        related_voucher: Option<VoucherId>,
        token: &VerificationToken,
    ) -> Result<Self, AuditError> {
        Self::build(
            voucher,
            AnnotationType::Restricted(annotation_type),
            message.into(),
            related_voucher,
            token,
        )
    }

    fn build(
        voucher: VoucherId,
        annotation_type: AnnotationType,
        message: String,
        related_voucher: Option<VoucherId>,
        token: &VerificationToken,
    ) -> Result<Self, AuditError> {
        if message.chars().count() > MAX_MESSAGE_LEN {
            return Err(AuditError::MessageTooLong {
                length: message.chars().count(),
            });
        }
        Ok(Self {
            id: AnnotationId::new(),
            voucher,
            annotation_type,
            message,
            related_voucher,
            created_by: token.user(),
            created_at: token.verified_at(),
            security_verified: true,
            verification: Some(token.id()),
        })
    }
}
