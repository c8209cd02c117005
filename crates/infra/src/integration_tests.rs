//! Cross-crate scenarios: posting, VAT rounding, supersession, the TOTP
//! gate and reporting working against one store.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use kontera_core::{Amount, UserId};
use kontera_ledger::{
    AccountingPeriod, JournalLine, LedgerError, SecurityLevel, VatComponent, VatDirection,
    VatRate, Voucher, VoucherStatus, VoucherType,
};
use kontera_audit::{AnnotationType, OpenAnnotationType, RestrictedAnnotationType};
use kontera_security::{CallerMeta, SecurityError, TotpSecret, totp};

use crate::annotations::AnnotationService;
use crate::error::ServiceError;
use crate::gate::TotpGate;
use crate::posting::{NewVatVoucher, NewVoucher, PostingService};
use crate::reporting::Reporting;
use crate::store::Store;

const SECRET: &[u8] = b"12345678901234567890";
const BACKUP_CODES: [&str; 3] = ["11111111", "22222222", "33333333"];

struct Services {
    store: Arc<Store>,
    posting: PostingService,
    annotations: AnnotationService,
    gate: TotpGate,
    reporting: Reporting,
}

fn setup() -> Services {
    let store = Arc::new(Store::new());
    let gate = TotpGate::new(store.clone());
    Services {
        posting: PostingService::new(store.clone()),
        annotations: AnnotationService::new(store.clone(), gate.clone()),
        reporting: Reporting::new(store.clone()),
        gate,
        store,
    }
}

fn provision_user(gate: &TotpGate) -> UserId {
    let user = UserId::new();
    gate.provision(TotpSecret::new(
        user,
        SECRET.to_vec(),
        BACKUP_CODES.iter().map(|c| c.to_string()),
    ))
    .unwrap();
    user
}

fn t(offset: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + offset, 0).unwrap()
}

fn current_code(now: DateTime<Utc>) -> String {
    totp::code_at(SECRET, totp::step_at(now.timestamp())).unwrap()
}

fn wrong_code(now: DateTime<Utc>) -> String {
    let step = totp::step_at(now.timestamp());
    let current = totp::code_at(SECRET, step).unwrap();
    let previous = totp::code_at(SECRET, step.saturating_sub(1)).unwrap();
    ["000000", "111111", "222222"]
        .into_iter()
        .find(|c| *c != current && *c != previous)
        .unwrap()
        .to_string()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn amount(d: Decimal) -> Amount {
    Amount::new(d).unwrap()
}

fn sales_voucher(posting: &PostingService) -> Voucher {
    posting
        .create_voucher(NewVoucher {
            description: "Kontantförsäljning".into(),
            voucher_type: VoucherType::SalesInvoice,
            date: date(2025, 10, 6),
            source_ref: None,
            lines: vec![
                JournalLine::debit("1910", amount(dec!(1250.00)), "Kassa"),
                JournalLine::credit("3001", amount(dec!(1000.00)), "Försäljning"),
                JournalLine::credit("2611", amount(dec!(250.00)), "Utgående moms"),
            ],
        })
        .unwrap()
}

fn balance_of(store: &Store, account: &str) -> Decimal {
    store.read(|s| s.accounts.get(account).map(|a| a.balance).unwrap())
}

// ─── Posting engine ──────────────────────────────────────────────────────

#[test]
fn posting_applies_signed_deltas_to_balances() {
    let s = setup();
    let voucher = sales_voucher(&s.posting);
    assert_eq!(voucher.status, VoucherStatus::Active);
    assert!(!voucher.posted);
    assert_eq!(balance_of(&s.store, "1910"), Decimal::ZERO);

    let posted = s.posting.post_voucher(voucher.id, t(0)).unwrap();
    assert!(posted.posted);
    assert_eq!(posted.posted_at, Some(t(0)));

    assert_eq!(balance_of(&s.store, "1910"), dec!(1250.00));
    assert_eq!(balance_of(&s.store, "3001"), dec!(1000.00));
    assert_eq!(balance_of(&s.store, "2611"), dec!(250.00));
}

#[test]
fn unbalanced_voucher_is_rejected_without_side_effects() {
    let s = setup();
    let err = s
        .posting
        .create_voucher(NewVoucher {
            description: "Trasig".into(),
            voucher_type: VoucherType::Adjustment,
            date: date(2025, 10, 6),
            source_ref: None,
            lines: vec![
                JournalLine::debit("1910", amount(dec!(100.00)), "Kassa"),
                JournalLine::credit("3001", amount(dec!(90.00)), "Försäljning"),
            ],
        })
        .unwrap_err();

    assert!(matches!(
        err,
        ServiceError::Ledger(LedgerError::UnbalancedEntries { .. })
    ));
    assert_eq!(s.store.read(|state| state.vouchers.len()), 0);
    assert_eq!(s.store.read(|state| state.entries.len()), 0);
}

#[test]
fn unknown_and_whole_unit_accounts_are_rejected() {
    let s = setup();
    let err = s
        .posting
        .create_voucher(NewVoucher {
            description: "Okänt konto".into(),
            voucher_type: VoucherType::Adjustment,
            date: date(2025, 10, 6),
            source_ref: None,
            lines: vec![
                JournalLine::debit("9999", amount(dec!(100.00)), "saknas"),
                JournalLine::credit("3001", amount(dec!(100.00)), "Försäljning"),
            ],
        })
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Ledger(LedgerError::UnknownAccount(ref a)) if a == "9999"
    ));

    let err = s
        .posting
        .create_voucher(NewVoucher {
            description: "Öresbelopp på skattekonto".into(),
            voucher_type: VoucherType::Adjustment,
            date: date(2025, 10, 6),
            source_ref: None,
            lines: vec![
                JournalLine::debit("1930", amount(dec!(100.50)), "Bank"),
                JournalLine::credit("2510", amount(dec!(100.50)), "Skatteskuld"),
            ],
        })
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Ledger(LedgerError::WholeUnitRequired { .. })
    ));
}

#[test]
fn deactivated_accounts_reject_new_entries() {
    let s = setup();
    s.store
        .transaction(|state| {
            state
                .accounts
                .get_mut("6212")
                .map(|a| a.deactivate())
                .ok_or(ServiceError::voucher_not_found())
        })
        .unwrap();

    let err = s
        .posting
        .create_voucher(NewVoucher {
            description: "Telefonräkning".into(),
            voucher_type: VoucherType::Purchase,
            date: date(2025, 10, 6),
            source_ref: None,
            lines: vec![
                JournalLine::debit("6212", amount(dec!(299.00)), "Mobiltelefon"),
                JournalLine::credit("2440", amount(dec!(299.00)), "Leverantörsskuld"),
            ],
        })
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Ledger(LedgerError::InactiveAccount(ref a)) if a == "6212"
    ));
}

#[test]
fn posting_twice_fails_and_leaves_balances_alone() {
    let s = setup();
    let voucher = sales_voucher(&s.posting);
    s.posting.post_voucher(voucher.id, t(0)).unwrap();

    let err = s.posting.post_voucher(voucher.id, t(10)).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Ledger(LedgerError::AlreadyPosted(_))
    ));
    assert_eq!(balance_of(&s.store, "1910"), dec!(1250.00));
}

#[test]
fn closed_period_rejects_postings_dated_inside_it() {
    let s = setup();
    s.posting
        .add_period(AccountingPeriod::monthly(2025, 10).unwrap())
        .unwrap();
    s.posting.close_period(2025, 10, t(0)).unwrap();

    let voucher = sales_voucher(&s.posting);
    let err = s.posting.post_voucher(voucher.id, t(10)).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Ledger(LedgerError::PeriodClosed { year: 2025, period: 10 })
    ));
    assert_eq!(balance_of(&s.store, "1910"), Decimal::ZERO);

    // A voucher dated outside the closed range still posts.
    let later = s
        .posting
        .create_voucher(NewVoucher {
            description: "November".into(),
            voucher_type: VoucherType::SalesInvoice,
            date: date(2025, 11, 3),
            source_ref: None,
            lines: vec![
                JournalLine::debit("1910", amount(dec!(100.00)), "Kassa"),
                JournalLine::credit("3001", amount(dec!(100.00)), "Försäljning"),
            ],
        })
        .unwrap();
    s.posting.post_voucher(later.id, t(20)).unwrap();
}

#[test]
fn voucher_numbers_stay_monotonic_and_gapped() {
    let s = setup();
    let user = provision_user(&s.gate);
    let v1 = sales_voucher(&s.posting);
    let v2 = sales_voucher(&s.posting);
    assert!(v2.sequence > v1.sequence);

    // Voiding keeps the number; the next voucher does not reuse it.
    s.annotations
        .void(v2.id, "fel underlag", user, BACKUP_CODES[0], CallerMeta::default(), t(0))
        .unwrap();
    let v3 = sales_voucher(&s.posting);
    assert!(v3.sequence > v2.sequence);
    assert_eq!(
        s.store
            .read(|state| state.voucher(v2.id).map(|v| v.sequence))
            .unwrap(),
        v2.sequence
    );
}

// ─── VAT rounding ────────────────────────────────────────────────────────

#[test]
fn vat_voucher_books_whole_krona_vat_with_rounding_line() {
    let s = setup();
    let (voucher, breakdowns) = s
        .posting
        .create_vat_voucher(NewVatVoucher {
            description: "Programvarulicens oktober".into(),
            voucher_type: VoucherType::Purchase,
            date: date(2025, 10, 6),
            source_ref: Some("EXP-17".into()),
            direction: VatDirection::Expense,
            components: vec![VatComponent {
                subtotal: amount(dec!(1006.53)),
                rate: VatRate::Standard25,
                net_account: "5420".into(),
                vat_account: "2640".into(),
                description: "Programvaror".into(),
            }],
            counter_account: "2440".into(),
        })
        .unwrap();

    assert_eq!(breakdowns[0].vat_raw, dec!(251.6325));
    assert_eq!(breakdowns[0].vat.value(), dec!(252));

    let entries = s.store.read(|state| {
        state
            .entries_for(voucher.id)
            .into_iter()
            .cloned()
            .collect::<Vec<_>>()
    });
    assert_eq!(entries.len(), 4);
    let rounding = entries.iter().find(|e| e.line.account == "3740").unwrap();
    assert_eq!(rounding.line.amount.value(), dec!(0.3675));

    s.posting.post_voucher(voucher.id, t(0)).unwrap();
    let trial = s.reporting.trial_balance(false);
    assert!(trial.balanced);
}

// ─── Supersession and the audit trail ────────────────────────────────────

#[test]
fn supersede_flips_status_and_writes_two_verified_annotations() {
    let s = setup();
    let user = provision_user(&s.gate);
    let original = sales_voucher(&s.posting);
    s.posting.post_voucher(original.id, t(0)).unwrap();
    let replacement = sales_voucher(&s.posting);

    let outcome = s
        .annotations
        .supersede(
            original.id,
            replacement.id,
            "fel momskonto",
            user,
            BACKUP_CODES[0],
            CallerMeta::default(),
            t(31),
        )
        .unwrap();

    assert_eq!(outcome.original.status, VoucherStatus::Superseded);
    assert_eq!(outcome.original.superseded_by, Some(replacement.id));
    assert_eq!(outcome.replacement.status, VoucherStatus::Active);
    assert_eq!(outcome.replacement.security_level, SecurityLevel::TotpRequired);
    assert_eq!(outcome.annotations_created, 2);

    let history = s.annotations.history(original.id).unwrap();
    assert_eq!(history.annotations.len(), 1);
    let superseded = &history.annotations[0];
    assert_eq!(
        superseded.annotation_type,
        AnnotationType::Restricted(RestrictedAnnotationType::Superseded)
    );
    assert!(superseded.security_verified);
    assert_eq!(superseded.related_voucher, Some(replacement.id));
    assert_eq!(superseded.verification, Some(outcome.verification));
    assert_eq!(history.verifications.len(), 1);
    assert!(history.verifications[0].success);

    let replacement_history = s.annotations.history(replacement.id).unwrap();
    assert_eq!(replacement_history.annotations.len(), 1);
    assert_eq!(
        replacement_history.annotations[0].annotation_type,
        AnnotationType::Restricted(RestrictedAnnotationType::Created)
    );
    assert_eq!(replacement_history.supersedes, vec![original.id]);

    // Balances are untouched by supersession (annotation-only policy).
    assert_eq!(balance_of(&s.store, "1910"), dec!(1250.00));
}

#[test]
fn supersede_with_invalid_code_changes_nothing_but_the_counter() {
    let s = setup();
    let user = provision_user(&s.gate);
    let original = sales_voucher(&s.posting);
    let replacement = sales_voucher(&s.posting);

    let now = t(0);
    let err = s
        .annotations
        .supersede(
            original.id,
            replacement.id,
            "fel belopp",
            user,
            &wrong_code(now),
            CallerMeta::default(),
            now,
        )
        .unwrap_err();

    assert!(matches!(
        err,
        ServiceError::Security(SecurityError::InvalidTotp { attempts_remaining: 4 })
    ));
    let (status, failures, log_len) = s.store.read(|state| {
        (
            state.voucher(original.id).unwrap().status,
            state.totp_secrets.get(&user).unwrap().total_failures,
            state.verification_log.len(),
        )
    });
    assert_eq!(status, VoucherStatus::Active);
    assert_eq!(failures, 1);
    assert_eq!(log_len, 1);
    assert!(!s.store.read(|state| state.verification_log[0].success));
    assert_eq!(s.store.read(|state| state.annotations.len()), 0);
}

#[test]
fn invalid_supersede_requests_fail_before_a_code_is_consumed() {
    let s = setup();
    let user = provision_user(&s.gate);
    let voucher = sales_voucher(&s.posting);

    let err = s
        .annotations
        .supersede(
            voucher.id,
            voucher.id,
            "själv",
            user,
            BACKUP_CODES[0],
            CallerMeta::default(),
            t(0),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Ledger(LedgerError::SelfSupersession)
    ));

    // The backup code is still unused and nothing was logged.
    assert!(s.store.read(|state| {
        state
            .totp_secrets
            .get(&user)
            .unwrap()
            .backup_codes
            .contains(BACKUP_CODES[0])
    }));
    assert_eq!(s.store.read(|state| state.verification_log.len()), 0);

    // A superseded voucher cannot be chosen as replacement.
    let user2 = provision_user(&s.gate);
    let a = sales_voucher(&s.posting);
    let b = sales_voucher(&s.posting);
    s.annotations
        .supersede(a.id, b.id, "byt", user2, BACKUP_CODES[0], CallerMeta::default(), t(31))
        .unwrap();
    let c = sales_voucher(&s.posting);
    let err = s
        .annotations
        .supersede(c.id, a.id, "kedja", user2, BACKUP_CODES[1], CallerMeta::default(), t(62))
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Ledger(LedgerError::ReplacementNotActive { .. })
    ));
}

#[test]
fn void_is_for_unposted_vouchers_only() {
    let s = setup();
    let user = provision_user(&s.gate);

    let unposted = sales_voucher(&s.posting);
    let voided = s
        .annotations
        .void(unposted.id, "dubblett", user, BACKUP_CODES[0], CallerMeta::default(), t(0))
        .unwrap();
    assert_eq!(voided.status, VoucherStatus::Void);
    let history = s.annotations.history(unposted.id).unwrap();
    assert_eq!(
        history.annotations[0].annotation_type,
        AnnotationType::Restricted(RestrictedAnnotationType::Void)
    );

    let posted = sales_voucher(&s.posting);
    s.posting.post_voucher(posted.id, t(10)).unwrap();
    let err = s
        .annotations
        .void(posted.id, "ångrar", user, BACKUP_CODES[1], CallerMeta::default(), t(31))
        .unwrap_err();
    assert!(matches!(err, ServiceError::Ledger(LedgerError::VoidPosted(_))));
    assert_eq!(balance_of(&s.store, "1910"), dec!(1250.00));
}

#[test]
fn secure_annotate_requires_a_code_every_time() {
    let s = setup();
    let user = provision_user(&s.gate);
    let voucher = sales_voucher(&s.posting);

    let err = s
        .annotations
        .annotate(
            voucher.id,
            OpenAnnotationType::Note,
            "utan kod",
            None,
            user,
            "",
            CallerMeta::default(),
            t(0),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Security(SecurityError::MissingVerification)
    ));

    let annotation = s
        .annotations
        .annotate(
            voucher.id,
            OpenAnnotationType::Note,
            "Stämd mot kontoutdrag",
            None,
            user,
            BACKUP_CODES[0],
            CallerMeta::default(),
            t(0),
        )
        .unwrap();
    assert_eq!(
        annotation.annotation_type,
        AnnotationType::Open(OpenAnnotationType::Note)
    );
    assert!(annotation.security_verified);
    assert!(annotation.verification.is_some());
}

#[test]
fn history_is_idempotent() {
    let s = setup();
    let user = provision_user(&s.gate);
    let voucher = sales_voucher(&s.posting);
    s.annotations
        .annotate(
            voucher.id,
            OpenAnnotationType::Correction,
            "Rättelse av text",
            None,
            user,
            BACKUP_CODES[0],
            CallerMeta::default(),
            t(0),
        )
        .unwrap();

    let first = s.annotations.history(voucher.id).unwrap();
    let second = s.annotations.history(voucher.id).unwrap();
    assert_eq!(first, second);
}

// ─── TOTP gate over the store ────────────────────────────────────────────

#[test]
fn totp_codes_and_backup_codes_verify_through_the_gate() {
    let s = setup();
    let user = provision_user(&s.gate);

    let now = t(0);
    let token = s
        .gate
        .verify_at(
            user,
            &current_code(now),
            kontera_security::OperationKind::AddAnnotation,
            None,
            CallerMeta::default(),
            now,
        )
        .unwrap();
    assert!(!token.backup_code_used());

    let reuse = s.gate.verify_at(
        user,
        BACKUP_CODES[2],
        kontera_security::OperationKind::AddAnnotation,
        None,
        CallerMeta::default(),
        t(31),
    );
    assert!(reuse.unwrap().backup_code_used());

    let again = s.gate.verify_at(
        user,
        BACKUP_CODES[2],
        kontera_security::OperationKind::AddAnnotation,
        None,
        CallerMeta::default(),
        t(62),
    );
    assert!(matches!(
        again.unwrap_err(),
        ServiceError::Security(SecurityError::InvalidTotp { .. })
    ));
}

#[test]
fn five_failures_lock_the_account_even_for_correct_codes() {
    let s = setup();
    let user = provision_user(&s.gate);

    for i in 0..5 {
        let now = t(i * 31);
        let err = s
            .gate
            .verify_at(
                user,
                &wrong_code(now),
                kontera_security::OperationKind::SupersedeVoucher,
                None,
                CallerMeta::default(),
                now,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Security(SecurityError::InvalidTotp { .. })
        ));
    }

    let now = t(5 * 31);
    let err = s
        .gate
        .verify_at(
            user,
            &current_code(now),
            kontera_security::OperationKind::SupersedeVoucher,
            None,
            CallerMeta::default(),
            now,
        )
        .unwrap_err();
    match err {
        ServiceError::Security(SecurityError::AccountLocked { unlock_time }) => {
            assert!(unlock_time > now);
        }
        other => panic!("expected AccountLocked, got {other:?}"),
    }
}

#[test]
fn rate_limit_kicks_in_on_the_fourth_attempt_in_a_window() {
    let s = setup();
    let user = provision_user(&s.gate);

    for i in 0..3 {
        let _ = s.gate.verify_at(
            user,
            &wrong_code(t(i)),
            kontera_security::OperationKind::AddAnnotation,
            None,
            CallerMeta::default(),
            t(i),
        );
    }
    let err = s
        .gate
        .verify_at(
            user,
            BACKUP_CODES[0],
            kontera_security::OperationKind::AddAnnotation,
            None,
            CallerMeta::default(),
            t(5),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Security(SecurityError::RateLimited { .. })
    ));
    // The backup code survived the rejected attempt.
    assert!(s.store.read(|state| {
        state
            .totp_secrets
            .get(&user)
            .unwrap()
            .backup_codes
            .contains(BACKUP_CODES[0])
    }));
}

#[test]
fn security_audit_lists_a_users_attempts_newest_first() {
    let s = setup();
    let user = provision_user(&s.gate);
    let _ = s.gate.verify_at(
        user,
        &wrong_code(t(0)),
        kontera_security::OperationKind::AddAnnotation,
        None,
        CallerMeta::default(),
        t(0),
    );
    let _ = s.gate.verify_at(
        user,
        BACKUP_CODES[0],
        kontera_security::OperationKind::VoidVoucher,
        None,
        CallerMeta::default(),
        t(31),
    );

    let audit = s.gate.security_audit(user, t(-1));
    assert_eq!(audit.len(), 2);
    assert!(audit[0].at > audit[1].at);
    assert!(audit[0].success);
    assert!(!audit[1].success);
}

// ─── Reporting ───────────────────────────────────────────────────────────

#[test]
fn trial_balance_filters_superseded_vouchers() {
    let s = setup();
    let user = provision_user(&s.gate);

    let wrong = sales_voucher(&s.posting);
    s.posting.post_voucher(wrong.id, t(0)).unwrap();

    let corrected = s
        .posting
        .create_voucher(NewVoucher {
            description: "Rättad försäljning".into(),
            voucher_type: VoucherType::SalesInvoice,
            date: date(2025, 10, 7),
            source_ref: None,
            lines: vec![
                JournalLine::debit("1910", amount(dec!(1350.00)), "Kassa"),
                JournalLine::credit("3001", amount(dec!(1080.00)), "Försäljning"),
                JournalLine::credit("2611", amount(dec!(270.00)), "Utgående moms"),
            ],
        })
        .unwrap();
    s.posting.post_voucher(corrected.id, t(10)).unwrap();

    s.annotations
        .supersede(
            wrong.id,
            corrected.id,
            "fel belopp",
            user,
            BACKUP_CODES[0],
            CallerMeta::default(),
            t(31),
        )
        .unwrap();

    let active_only = s.reporting.trial_balance(false);
    assert!(active_only.balanced);
    assert_eq!(active_only.total_debit, dec!(1350.00));
    assert_eq!(active_only.superseded_vouchers, 1);

    let full_audit = s.reporting.trial_balance(true);
    assert!(full_audit.balanced);
    assert_eq!(full_audit.total_debit, dec!(2600.00));

    // The per-account report also excludes superseded entries...
    let report = s.reporting.account_balance("1910").unwrap();
    assert_eq!(report.balance, dec!(1350.00));
    assert_eq!(report.transaction_count, 1);

    // ...while the running balance keeps the full posted history
    // (invariant: balance equals the signed sum of posted entries).
    assert_eq!(balance_of(&s.store, "1910"), dec!(2600.00));
}

#[test]
fn period_listing_summarizes_vouchers() {
    let s = setup();
    let user = provision_user(&s.gate);
    let a = sales_voucher(&s.posting);
    s.posting.post_voucher(a.id, t(0)).unwrap();
    let b = sales_voucher(&s.posting);
    s.annotations
        .void(b.id, "dubblett", user, BACKUP_CODES[0], CallerMeta::default(), t(31))
        .unwrap();
    let _c = sales_voucher(&s.posting);

    let listing = s
        .reporting
        .vouchers_in_period(date(2025, 10, 1), date(2025, 10, 31), false, None);
    assert_eq!(listing.vouchers.len(), 2);
    assert_eq!(listing.posted, 1);
    assert_eq!(listing.pending, 1);
    assert_eq!(listing.superseded, 0);

    let with_voided = s
        .reporting
        .vouchers_in_period(date(2025, 10, 1), date(2025, 10, 31), true, None);
    assert_eq!(with_voided.vouchers.len(), 3);
    assert_eq!(with_voided.superseded, 1);
}

// ─── Concurrency ─────────────────────────────────────────────────────────

#[test]
fn concurrent_postings_against_one_account_serialize() {
    let s = setup();
    let mut handles = Vec::new();
    for _ in 0..8 {
        let posting = s.posting.clone();
        handles.push(std::thread::spawn(move || {
            let voucher = posting
                .create_voucher(NewVoucher {
                    description: "Parallell försäljning".into(),
                    voucher_type: VoucherType::Payment,
                    date: date(2025, 10, 6),
                    source_ref: None,
                    lines: vec![
                        JournalLine::debit("1910", amount(dec!(100.00)), "Kassa"),
                        JournalLine::credit("3001", amount(dec!(100.00)), "Försäljning"),
                    ],
                })
                .unwrap();
            // The engine retries a conflict once; under this much contention
            // the caller may still have to resubmit.
            loop {
                match posting.post_voucher(voucher.id, Utc::now()) {
                    Ok(_) => break,
                    Err(ref err) if err.is_conflict() => continue,
                    Err(err) => panic!("unexpected posting failure: {err}"),
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(balance_of(&s.store, "1910"), dec!(800.00));

    // Invariant: the running balance equals the signed sum of posted lines.
    let signed_sum = s.store.read(|state| {
        state
            .entries
            .iter()
            .filter(|e| e.line.account == "1910")
            .map(|e| e.line.debit_amount() - e.line.credit_amount())
            .sum::<Decimal>()
    });
    assert_eq!(signed_sum, dec!(800.00));

    let sequences = s.store.read(|state| {
        let mut seqs: Vec<u64> = state.vouchers.values().map(|v| v.sequence).collect();
        seqs.sort_unstable();
        seqs
    });
    assert_eq!(sequences.len(), 8);
    assert!(sequences.windows(2).all(|w| w[0] < w[1]));
}
