//! Per-user TOTP gate state and the verification state machine.
//!
//! # Invariants
//! - A backup code is consumable at most once.
//! - A 6-digit code is single-use per time step, including the drift window.
//! - Every attempt appends a verification-log record carrying a SHA-256 hash
//!   of the code, never the raw code.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use kontera_core::{UserId, VerificationId, VoucherId};

use crate::error::SecurityError;
use crate::totp;

/// Code checks allowed per trailing 30-second window.
pub const MAX_ATTEMPTS_PER_WINDOW: usize = 3;

/// Window length for rate limiting, seconds.
pub const RATE_WINDOW_SECONDS: i64 = 30;

/// Failed attempts before lockout.
pub const LOCKOUT_THRESHOLD: u32 = 5;

/// Lockout duration, seconds.
pub const LOCKOUT_SECONDS: i64 = 900;

const BACKUP_CODE_LEN: usize = 8;
const TOTP_CODE_LEN: usize = 6;

/// Operation a verification authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationKind {
    SupersedeVoucher,
    VoidVoucher,
    AddAnnotation,
}

impl core::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            OperationKind::SupersedeVoucher => "SUPERSEDE_VOUCHER",
            OperationKind::VoidVoucher => "VOID_VOUCHER",
            OperationKind::AddAnnotation => "ADD_ANNOTATION",
        };
        write!(f, "{s}")
    }
}

/// Caller metadata recorded in the verification log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Proof of a successful verification, scoped to a single mutation.
///
/// Deliberately not `Clone`, and constructible only by the gate: the
/// operation that verified the code consumes the token by value, so it
/// cannot authorize a second mutation, and no code path can forge one.
#[derive(Debug, PartialEq, Eq)]
pub struct VerificationToken {
    id: VerificationId,
    user: UserId,
    operation: OperationKind,
    verified_at: DateTime<Utc>,
    backup_code_used: bool,
}

impl VerificationToken {
    pub fn id(&self) -> VerificationId {
        self.id
    }

    pub fn user(&self) -> UserId {
        self.user
    }

    pub fn operation(&self) -> OperationKind {
        self.operation
    }

    pub fn verified_at(&self) -> DateTime<Utc> {
        self.verified_at
    }

    pub fn backup_code_used(&self) -> bool {
        self.backup_code_used
    }
}

/// Append-only record of one verification attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationLogEntry {
    pub id: VerificationId,
    pub user: UserId,
    pub operation: OperationKind,
    pub voucher: Option<VoucherId>,
    /// SHA-256 hex digest of the submitted code.
    pub code_hash: String,
    pub success: bool,
    pub failure_reason: Option<String>,
    pub at: DateTime<Utc>,
    pub caller: CallerMeta,
}

/// Outcome of one gate invocation: the result plus the log record that must
/// be appended regardless of outcome.
#[derive(Debug)]
pub struct VerificationAttempt {
    pub result: Result<VerificationToken, SecurityError>,
    pub log: VerificationLogEntry,
}

/// Per-user TOTP state. Provisioned externally; mutated only under the
/// store's serialized read-modify-write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotpSecret {
    pub user: UserId,
    pub secret: Vec<u8>,
    pub backup_codes: BTreeSet<String>,
    pub total_failures: u32,
    pub locked_until: Option<DateTime<Utc>>,
    /// Timestamps of code checks in the trailing rate window.
    pub recent_attempts: Vec<DateTime<Utc>>,
    /// Highest time step already consumed by a successful 6-digit code.
    pub last_used_step: Option<u64>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub active: bool,
}

impl TotpSecret {
    pub fn new(user: UserId, secret: Vec<u8>, backup_codes: impl IntoIterator<Item = String>) -> Self {
        Self {
            user,
            secret,
            backup_codes: backup_codes.into_iter().collect(),
            total_failures: 0,
            locked_until: None,
            recent_attempts: Vec::new(),
            last_used_step: None,
            last_used_at: None,
            active: true,
        }
    }

    /// Run the full verification state machine at `now`.
    ///
    /// Order: lockout, rate limit, code format, backup/TOTP check, counter
    /// update. The returned log record covers every outcome.
    pub fn verify_at(
        &mut self,
        code: &str,
        operation: OperationKind,
        voucher: Option<VoucherId>,
        caller: CallerMeta,
        now: DateTime<Utc>,
    ) -> VerificationAttempt {
        let id = VerificationId::new();
        let user = self.user;
        let code_hash = hash_code(code);
        let log = move |success: bool, failure_reason: Option<String>| VerificationLogEntry {
            id,
            user,
            operation,
            voucher,
            code_hash: code_hash.clone(),
            success,
            failure_reason,
            at: now,
            caller: caller.clone(),
        };

        if let Some(locked_until) = self.locked_until {
            if now < locked_until {
                let err = SecurityError::AccountLocked {
                    unlock_time: locked_until,
                };
                return VerificationAttempt {
                    log: log(false, Some(err.code().to_string())),
                    result: Err(err),
                };
            }
        }

        self.recent_attempts
            .retain(|t| now.signed_duration_since(*t).num_seconds() < RATE_WINDOW_SECONDS);
        if self.recent_attempts.len() >= MAX_ATTEMPTS_PER_WINDOW {
            let oldest = self.recent_attempts[0];
            let retry_after = (RATE_WINDOW_SECONDS
                - now.signed_duration_since(oldest).num_seconds())
            .max(1);
            let err = SecurityError::RateLimited { retry_after };
            return VerificationAttempt {
                log: log(false, Some(err.code().to_string())),
                result: Err(err),
            };
        }
        self.recent_attempts.push(now);

        let outcome = self.check_code(code, now);

        match outcome {
            Ok(backup_code_used) => {
                self.total_failures = 0;
                self.locked_until = None;
                self.last_used_at = Some(now);
                tracing::info!(user = %self.user, %operation, backup_code_used, "totp verified");
                VerificationAttempt {
                    log: log(true, None),
                    result: Ok(VerificationToken {
                        id,
                        user: self.user,
                        operation,
                        verified_at: now,
                        backup_code_used,
                    }),
                }
            }
            Err(err) => {
                self.total_failures += 1;
                if self.total_failures >= LOCKOUT_THRESHOLD {
                    self.locked_until = Some(now + Duration::seconds(LOCKOUT_SECONDS));
                }
                let err = match err {
                    SecurityError::InvalidTotp { .. } => SecurityError::InvalidTotp {
                        attempts_remaining: LOCKOUT_THRESHOLD.saturating_sub(self.total_failures),
                    },
                    other => other,
                };
                tracing::warn!(
                    user = %self.user,
                    %operation,
                    reason = err.code(),
                    failures = self.total_failures,
                    "totp verification failed"
                );
                VerificationAttempt {
                    log: log(false, Some(err.code().to_string())),
                    result: Err(err),
                }
            }
        }
    }

    /// Step 3 of the state machine: backup code, TOTP code, or bad format.
    /// Returns whether a backup code was consumed.
    fn check_code(&mut self, code: &str, now: DateTime<Utc>) -> Result<bool, SecurityError> {
        if !self.active || self.secret.is_empty() {
            return Err(SecurityError::NotConfigured);
        }
        if !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(SecurityError::InvalidFormat);
        }

        match code.len() {
            BACKUP_CODE_LEN => {
                if self.backup_codes.remove(code) {
                    Ok(true)
                } else {
                    Err(SecurityError::InvalidTotp {
                        attempts_remaining: 0,
                    })
                }
            }
            TOTP_CODE_LEN => {
                let step = totp::step_at(now.timestamp());
                let matched = [step, step.saturating_sub(1)]
                    .into_iter()
                    .find(|s| totp::code_at(&self.secret, *s).as_deref() == Some(code));

                match matched {
                    Some(step) if self.last_used_step.is_none_or(|used| step > used) => {
                        self.last_used_step = Some(step);
                        Ok(false)
                    }
                    _ => Err(SecurityError::InvalidTotp {
                        attempts_remaining: 0,
                    }),
                }
            }
            _ => Err(SecurityError::InvalidFormat),
        }
    }
}

fn hash_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}
