//! The action facade wiring the services together.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};

use kontera_audit::{AnnotationType, VoucherAnnotation};
use kontera_core::{UserId, VoucherId};
use kontera_infra::{
    AccountBalanceReport, AnnotationService, NewVatVoucher, NewVoucher, PeriodListing,
    PostingService, Reporting, ServiceError, Store, SupersedeOutcome, TotpGate, TrialBalance,
    VoucherHistory,
};
use kontera_ledger::{AccountingPeriod, Voucher, VoucherType};
use kontera_security::{SecurityError, VerificationLogEntry};

use crate::dto::{
    ActionResult, AnnotateRequest, CreateVatVoucherRequest, CreateVoucherRequest,
    PeriodClosedPayload, SupersedeRequest, VatVoucherPayload, VoidRequest, caller_meta,
};

/// The bookkeeping engine behind one store: every core operation as a
/// callable action.
#[derive(Debug, Clone)]
pub struct Kontera {
    store: Arc<Store>,
    posting: PostingService,
    annotations: AnnotationService,
    gate: TotpGate,
    reporting: Reporting,
}

impl Kontera {
    /// Engine over a fresh store loaded with the standard chart.
    pub fn new() -> Self {
        Self::with_store(Arc::new(Store::new()))
    }

    pub fn with_store(store: Arc<Store>) -> Self {
        let gate = TotpGate::new(store.clone());
        Self {
            posting: PostingService::new(store.clone()),
            annotations: AnnotationService::new(store.clone(), gate.clone()),
            reporting: Reporting::new(store.clone()),
            gate,
            store,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Setup-time entry point for externally-provisioned TOTP material.
    pub fn gate(&self) -> &TotpGate {
        &self.gate
    }

    pub fn create_voucher(&self, request: CreateVoucherRequest) -> ActionResult<Voucher> {
        let lines: Result<Vec<_>, ServiceError> = request
            .entries
            .into_iter()
            .map(|entry| entry.into_line())
            .collect();
        let lines = match lines {
            Ok(lines) => lines,
            Err(err) => return ActionResult::err(err),
        };
        self.posting
            .create_voucher(NewVoucher {
                description: request.description,
                voucher_type: request.voucher_type,
                date: request.date,
                source_ref: request.source_ref,
                lines,
            })
            .into()
    }

    pub fn create_vat_voucher(
        &self,
        request: CreateVatVoucherRequest,
    ) -> ActionResult<VatVoucherPayload> {
        let components: Result<Vec<_>, ServiceError> = request
            .components
            .into_iter()
            .map(|component| component.into_component())
            .collect();
        let components = match components {
            Ok(components) => components,
            Err(err) => return ActionResult::err(err),
        };
        self.posting
            .create_vat_voucher(NewVatVoucher {
                description: request.description,
                voucher_type: request.voucher_type,
                date: request.date,
                source_ref: request.source_ref,
                direction: request.direction,
                components,
                counter_account: request.counter_account,
            })
            .map(|(voucher, breakdowns)| VatVoucherPayload {
                voucher,
                breakdowns,
            })
            .into()
    }

    pub fn post_voucher(&self, voucher: VoucherId) -> ActionResult<Voucher> {
        self.posting.post_voucher(voucher, Utc::now()).into()
    }

    pub fn supersede(&self, request: SupersedeRequest) -> ActionResult<SupersedeOutcome> {
        self.annotations
            .supersede(
                request.original,
                request.replacement,
                &request.reason,
                request.actor,
                &request.code,
                caller_meta(request.ip_address, request.user_agent),
                Utc::now(),
            )
            .into()
    }

    pub fn void_voucher(&self, request: VoidRequest) -> ActionResult<Voucher> {
        self.annotations
            .void(
                request.voucher,
                &request.reason,
                request.actor,
                &request.code,
                caller_meta(request.ip_address, request.user_agent),
                Utc::now(),
            )
            .into()
    }

    /// Public secure-annotate path. Restricted tags are refused before any
    /// code is consumed.
    pub fn annotate(&self, request: AnnotateRequest) -> ActionResult<VoucherAnnotation> {
        let open_type = match AnnotationType::from_str(&request.annotation_type) {
            Ok(AnnotationType::Open(open)) => open,
            Ok(AnnotationType::Restricted(_)) => {
                return ActionResult::err(ServiceError::Security(SecurityError::RestrictedType {
                    requested: request.annotation_type,
                }));
            }
            Err(message) => {
                return ActionResult::err(ServiceError::Domain(
                    kontera_core::DomainError::validation(message),
                ));
            }
        };
        self.annotations
            .annotate(
                request.voucher,
                open_type,
                &request.message,
                request.related_voucher,
                request.actor,
                &request.code,
                caller_meta(request.ip_address, request.user_agent),
                Utc::now(),
            )
            .into()
    }

    pub fn voucher_history(&self, voucher: VoucherId) -> ActionResult<VoucherHistory> {
        self.annotations.history(voucher).into()
    }

    /// Look a voucher up by its human-facing number ("V007" → sequence 7).
    pub fn voucher_by_number(&self, sequence: u64) -> ActionResult<Voucher> {
        self.store
            .read(|state| state.voucher_by_sequence(sequence).cloned())
            .ok_or(ServiceError::voucher_not_found())
            .into()
    }

    pub fn trial_balance(&self, include_superseded: bool) -> ActionResult<TrialBalance> {
        ActionResult::ok(self.reporting.trial_balance(include_superseded))
    }

    pub fn account_balance(&self, number: &str) -> ActionResult<AccountBalanceReport> {
        self.reporting.account_balance(number).into()
    }

    pub fn vouchers_in_period(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        include_superseded: bool,
        voucher_type: Option<VoucherType>,
    ) -> ActionResult<PeriodListing> {
        ActionResult::ok(self.reporting.vouchers_in_period(
            start,
            end,
            include_superseded,
            voucher_type,
        ))
    }

    pub fn add_period(&self, year: i32, period: u32) -> ActionResult<PeriodClosedPayload> {
        let Some(row) = AccountingPeriod::monthly(year, period) else {
            return ActionResult::err(ServiceError::Domain(
                kontera_core::DomainError::validation(format!(
                    "invalid period {year}-{period:02}"
                )),
            ));
        };
        self.posting
            .add_period(row)
            .map(|_| PeriodClosedPayload { year, period })
            .into()
    }

    pub fn close_period(&self, year: i32, period: u32) -> ActionResult<PeriodClosedPayload> {
        self.posting
            .close_period(year, period, Utc::now())
            .map(|_| PeriodClosedPayload { year, period })
            .into()
    }

    /// Verification log for one user over the trailing `days`.
    pub fn security_audit(&self, user: UserId, days: i64) -> ActionResult<Vec<VerificationLogEntry>> {
        ActionResult::ok(self.gate.security_audit(user, Utc::now() - Duration::days(days)))
    }
}

impl Default for Kontera {
    fn default() -> Self {
        Self::new()
    }
}
