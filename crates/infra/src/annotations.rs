//! Annotation & audit-trail service.
//!
//! Every path through here passes the TOTP gate; there is no annotation
//! write that bypasses verification. Restricted annotation types are only
//! produced by the internal supersede/void mutations.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use kontera_audit::{
    AuditError, MAX_MESSAGE_LEN, OpenAnnotationType, RestrictedAnnotationType, VoucherAnnotation,
    validate_reason,
};
use kontera_core::{UserId, VerificationId, VoucherId};
use kontera_ledger::{LedgerError, Voucher, VoucherStatus};
use kontera_security::{CallerMeta, OperationKind, VerificationLogEntry};

use crate::error::ServiceError;
use crate::gate::TotpGate;
use crate::store::{State, Store};

/// Result payload of a successful supersession.
#[derive(Debug, Clone, Serialize)]
pub struct SupersedeOutcome {
    pub original: Voucher,
    pub replacement: Voucher,
    pub verification: VerificationId,
    pub annotations_created: usize,
}

/// Complete lifecycle view of one voucher.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoucherHistory {
    pub voucher: Voucher,
    /// Chronological (oldest first).
    pub annotations: Vec<VoucherAnnotation>,
    /// Verification-log records linked to this voucher, chronological.
    pub verifications: Vec<VerificationLogEntry>,
    /// Vouchers this one replaced.
    pub supersedes: Vec<VoucherId>,
    pub related: Vec<VoucherId>,
}

#[derive(Debug, Clone)]
pub struct AnnotationService {
    store: Arc<Store>,
    gate: TotpGate,
}

impl AnnotationService {
    pub fn new(store: Arc<Store>, gate: TotpGate) -> Self {
        Self { store, gate }
    }

    /// Replace `original` with `replacement`: status flip, back-reference,
    /// one SUPERSEDED and one CREATED annotation, all in one atomic unit,
    /// gated on a TOTP verification for the acting user.
    #[allow(clippy::too_many_arguments)]
    pub fn supersede(
        &self,
        original: VoucherId,
        replacement: VoucherId,
        reason: &str,
        actor: UserId,
        code: &str,
        caller: CallerMeta,
        now: DateTime<Utc>,
    ) -> Result<SupersedeOutcome, ServiceError> {
        validate_reason(reason)?;
        // Fail the request before a code is consumed on it.
        self.store
            .read(|state| preflight_supersede(state, original, replacement))?;

        let token = self.gate.verify_at(
            actor,
            code,
            OperationKind::SupersedeVoucher,
            Some(original),
            caller,
            now,
        )?;
        let verification = token.id();

        self.store.transaction(move |state| {
            preflight_supersede(state, original, replacement)?;

            let replacement_number = state
                .voucher(replacement)
                .map(Voucher::number)
                .ok_or_else(ServiceError::voucher_not_found)?;

            let original_row = state
                .voucher_mut(original)
                .ok_or_else(ServiceError::voucher_not_found)?;
            original_row.mark_superseded(replacement)?;
            let original_number = original_row.number();
            let original_voucher = original_row.clone();

            let replacement_row = state
                .voucher_mut(replacement)
                .ok_or_else(ServiceError::voucher_not_found)?;
            replacement_row.require_totp();
            let replacement_voucher = replacement_row.clone();

            let superseded = VoucherAnnotation::restricted(
                original,
                RestrictedAnnotationType::Superseded,
                format!("Superseded by {replacement_number}. Reason: {reason}"),
                Some(replacement),
                &token,
            )?;
            let created = VoucherAnnotation::restricted(
                replacement,
                RestrictedAnnotationType::Created,
                format!("Created to replace {original_number}. Reason: {reason}"),
                Some(original),
                &token,
            )?;
            state.annotations.push(superseded);
            state.annotations.push(created);

            tracing::info!(
                original = %original_number,
                replacement = %replacement_number,
                "voucher superseded"
            );
            Ok(SupersedeOutcome {
                original: original_voucher,
                replacement: replacement_voucher,
                verification,
                annotations_created: 2,
            })
        })
    }

    /// Void an unposted voucher. Balances are never touched; the correction
    /// path for posted vouchers is a reversing voucher plus supersession.
    pub fn void(
        &self,
        voucher: VoucherId,
        reason: &str,
        actor: UserId,
        code: &str,
        caller: CallerMeta,
        now: DateTime<Utc>,
    ) -> Result<Voucher, ServiceError> {
        validate_reason(reason)?;
        self.store.read(|state| preflight_void(state, voucher))?;

        let token = self.gate.verify_at(
            actor,
            code,
            OperationKind::VoidVoucher,
            Some(voucher),
            caller,
            now,
        )?;

        self.store.transaction(move |state| {
            let row = state
                .voucher_mut(voucher)
                .ok_or_else(ServiceError::voucher_not_found)?;
            row.mark_void()?;
            let number = row.number();
            let voided = row.clone();

            let annotation = VoucherAnnotation::restricted(
                voucher,
                RestrictedAnnotationType::Void,
                format!("Voucher voided. Reason: {reason}"),
                None,
                &token,
            )?;
            state.annotations.push(annotation);

            tracing::info!(voucher = %number, "voucher voided");
            Ok(voided)
        })
    }

    /// Public secure-annotate path: open annotation types only, TOTP
    /// verification on every call.
    #[allow(clippy::too_many_arguments)]
    pub fn annotate(
        &self,
        voucher: VoucherId,
        annotation_type: OpenAnnotationType,
        message: &str,
        related: Option<VoucherId>,
        actor: UserId,
        code: &str,
        caller: CallerMeta,
        now: DateTime<Utc>,
    ) -> Result<VoucherAnnotation, ServiceError> {
        if message.chars().count() > MAX_MESSAGE_LEN {
            return Err(AuditError::MessageTooLong {
                length: message.chars().count(),
            }
            .into());
        }
        self.store.read(|state| {
            state
                .voucher(voucher)
                .ok_or_else(ServiceError::voucher_not_found)?;
            if let Some(related) = related {
                state
                    .voucher(related)
                    .ok_or_else(ServiceError::voucher_not_found)?;
            }
            Ok::<_, ServiceError>(())
        })?;

        let token = self.gate.verify_at(
            actor,
            code,
            OperationKind::AddAnnotation,
            Some(voucher),
            caller,
            now,
        )?;

        let message = message.to_string();
        self.store.transaction(move |state| {
            state
                .voucher(voucher)
                .ok_or_else(ServiceError::voucher_not_found)?;
            let annotation =
                VoucherAnnotation::open(voucher, annotation_type, message, related, &token)?;
            state.annotations.push(annotation.clone());
            Ok(annotation)
        })
    }

    /// Read-only lifecycle view: voucher, chronological annotations, linked
    /// verification-log records and relationships.
    pub fn history(&self, voucher: VoucherId) -> Result<VoucherHistory, ServiceError> {
        self.store.read(|state| {
            let row = state
                .voucher(voucher)
                .ok_or_else(ServiceError::voucher_not_found)?
                .clone();

            let mut annotations: Vec<VoucherAnnotation> = state
                .annotations_for(voucher)
                .into_iter()
                .cloned()
                .collect();
            annotations.sort_by_key(|a| a.created_at);

            let linked: std::collections::HashSet<VerificationId> = annotations
                .iter()
                .filter_map(|a| a.verification)
                .collect();
            let mut verifications: Vec<VerificationLogEntry> = state
                .verification_log
                .iter()
                .filter(|e| e.voucher == Some(voucher) || linked.contains(&e.id))
                .cloned()
                .collect();
            verifications.sort_by_key(|e| e.at);
            verifications.dedup_by_key(|e| e.id);

            let supersedes: Vec<VoucherId> = state
                .vouchers
                .values()
                .filter(|v| v.superseded_by == Some(voucher))
                .map(|v| v.id)
                .collect();

            let mut related: Vec<VoucherId> = annotations
                .iter()
                .filter_map(|a| a.related_voucher)
                .chain(row.superseded_by)
                .collect();
            related.sort_by_key(|id| *id.as_uuid());
            related.dedup();

            Ok(VoucherHistory {
                voucher: row,
                annotations,
                verifications,
                supersedes,
                related,
            })
        })
    }
}

fn preflight_supersede(
    state: &State,
    original: VoucherId,
    replacement: VoucherId,
) -> Result<(), ServiceError> {
    let original_row = state
        .voucher(original)
        .ok_or_else(ServiceError::voucher_not_found)?;
    let replacement_row = state
        .voucher(replacement)
        .ok_or_else(ServiceError::voucher_not_found)?;

    if original == replacement {
        return Err(LedgerError::SelfSupersession.into());
    }
    if replacement_row.status != VoucherStatus::Active {
        return Err(LedgerError::ReplacementNotActive {
            number: replacement_row.sequence,
            status: replacement_row.status,
        }
        .into());
    }
    if original_row.status != VoucherStatus::Active {
        return Err(LedgerError::NotActive {
            number: original_row.sequence,
            status: original_row.status,
        }
        .into());
    }

    // Walk the supersession chain from the replacement; reaching the
    // original would close a loop.
    let mut cursor = replacement_row.superseded_by;
    while let Some(next) = cursor {
        if next == original {
            return Err(LedgerError::SupersessionLoop(original_row.sequence).into());
        }
        cursor = state.voucher(next).and_then(|v| v.superseded_by);
    }

    Ok(())
}

fn preflight_void(state: &State, voucher: VoucherId) -> Result<(), ServiceError> {
    let row = state
        .voucher(voucher)
        .ok_or_else(ServiceError::voucher_not_found)?;
    if row.posted {
        return Err(LedgerError::VoidPosted(row.sequence).into());
    }
    if row.status != VoucherStatus::Active {
        return Err(LedgerError::NotActive {
            number: row.sequence,
            status: row.status,
        }
        .into());
    }
    Ok(())
}
