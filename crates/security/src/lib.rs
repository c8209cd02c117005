//! `kontera-security` — the TOTP gate protecting audit-trail mutations.
//!
//! Secret material and backup codes are provisioned externally; this crate
//! only consumes them. Every verification attempt, successful or not, is
//! recorded with a hash of the code, never the code itself.

pub mod error;
pub mod gate;
pub mod totp;

pub use error::SecurityError;
pub use gate::{
    CallerMeta, OperationKind, TotpSecret, VerificationAttempt, VerificationLogEntry,
    VerificationToken,
};
