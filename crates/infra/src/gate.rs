//! TOTP gate service: per-user serialized verification over the store.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use kontera_core::{UserId, VoucherId};
use kontera_security::{
    CallerMeta, OperationKind, SecurityError, TotpSecret, VerificationLogEntry, VerificationToken,
};

use crate::error::ServiceError;
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct TotpGate {
    store: Arc<Store>,
}

impl TotpGate {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Install externally-provisioned secret material for a user.
    pub fn provision(&self, secret: TotpSecret) -> Result<(), ServiceError> {
        self.store.transaction(|state| {
            state.totp_secrets.insert(secret.user, secret);
            Ok(())
        })
    }

    pub fn verify(
        &self,
        user: UserId,
        code: &str,
        operation: OperationKind,
        voucher: Option<VoucherId>,
        caller: CallerMeta,
    ) -> Result<VerificationToken, ServiceError> {
        self.verify_at(user, code, operation, voucher, caller, Utc::now())
    }

    /// Run one verification attempt at `now`.
    ///
    /// Counter updates and the log append commit together even when the
    /// verification itself fails; the per-user row is mutated under the
    /// store's serialized write, so concurrent attempts cannot both slip
    /// under the rate limit or both consume the same backup code.
    pub fn verify_at(
        &self,
        user: UserId,
        code: &str,
        operation: OperationKind,
        voucher: Option<VoucherId>,
        caller: CallerMeta,
        now: DateTime<Utc>,
    ) -> Result<VerificationToken, ServiceError> {
        if code.trim().is_empty() {
            return Err(SecurityError::MissingVerification.into());
        }

        let result = self.store.transaction(|state| {
            let Some(row) = state.totp_secrets.get_mut(&user) else {
                return Err(ServiceError::Security(SecurityError::NotConfigured));
            };
            let attempt = row.verify_at(code, operation, voucher, caller, now);
            state.verification_log.push(attempt.log);
            Ok(attempt.result)
        })?;

        result.map_err(ServiceError::from)
    }

    /// Verification-log slice for one user, newest first.
    pub fn security_audit(&self, user: UserId, since: DateTime<Utc>) -> Vec<VerificationLogEntry> {
        self.store.read(|state| {
            let mut entries: Vec<_> = state
                .verification_log
                .iter()
                .filter(|e| e.user == user && e.at >= since)
                .cloned()
                .collect();
            entries.sort_by_key(|e| std::cmp::Reverse(e.at));
            entries
        })
    }
}
