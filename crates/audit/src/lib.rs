//! `kontera-audit` — append-only voucher annotations.
//!
//! Annotation types come in two permission classes. The restricted class
//! (SUPERSEDED, VOID, CREATED) can only be constructed from a TOTP
//! [`VerificationToken`](kontera_security::VerificationToken); the split is a
//! type-system fact, not a convention.

pub mod annotation;

pub use annotation::{
    AnnotationType, AuditError, MAX_MESSAGE_LEN, MAX_REASON_LEN, OpenAnnotationType,
    RestrictedAnnotationType, VoucherAnnotation, validate_reason,
};
