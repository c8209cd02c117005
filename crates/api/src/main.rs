//! Smoke binary: runs one bookkeeping flow end to end and prints the action
//! envelopes as JSON.

use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;

use kontera_api::{
    CreateVatVoucherRequest, CreateVoucherRequest, EntryInput, Kontera, SupersedeRequest,
    VatComponentInput,
};
use kontera_core::UserId;
use kontera_ledger::{VatDirection, VoucherType};
use kontera_security::{TotpSecret, totp};

fn main() {
    kontera_observability::init();

    let app = Kontera::new();
    let user = UserId::new();
    let secret = b"12345678901234567890".to_vec();
    app.gate()
        .provision(TotpSecret::new(user, secret.clone(), []))
        .expect("provisioning the demo user");

    let today = Utc::now().date_naive();

    let sale = app.create_voucher(CreateVoucherRequest {
        description: "Kontantförsäljning".into(),
        voucher_type: VoucherType::SalesInvoice,
        date: today,
        source_ref: None,
        entries: vec![
            EntryInput {
                account: "1910".into(),
                debit: Some(Decimal::new(125_000, 2)),
                credit: None,
                description: "Kassa".into(),
                reference: None,
            },
            EntryInput {
                account: "3001".into(),
                debit: None,
                credit: Some(Decimal::new(100_000, 2)),
                description: "Försäljning".into(),
                reference: None,
            },
            EntryInput {
                account: "2611".into(),
                debit: None,
                credit: Some(Decimal::new(25_000, 2)),
                description: "Utgående moms".into(),
                reference: None,
            },
        ],
    });
    print_json("create_voucher", &sale);
    let sale = sale.into_result().expect("balanced voucher");

    print_json("post_voucher", &app.post_voucher(sale.id));

    let purchase = app.create_vat_voucher(CreateVatVoucherRequest {
        description: "Programvarulicens oktober".into(),
        voucher_type: VoucherType::Purchase,
        date: today,
        source_ref: Some("EXP-17".into()),
        direction: VatDirection::Expense,
        counter_account: "2440".into(),
        components: vec![VatComponentInput {
            subtotal: Decimal::new(100_653, 2),
            rate: Decimal::new(25, 2),
            net_account: "5420".into(),
            vat_account: "2640".into(),
            description: "Programvaror".into(),
        }],
    });
    print_json("create_vat_voucher", &purchase);
    let purchase = purchase.into_result().expect("vat voucher").voucher;
    print_json("post_voucher", &app.post_voucher(purchase.id));

    let replacement = app.create_voucher(CreateVoucherRequest {
        description: "Rättad kontantförsäljning".into(),
        voucher_type: VoucherType::SalesInvoice,
        date: today,
        source_ref: None,
        entries: vec![
            EntryInput {
                account: "1910".into(),
                debit: Some(Decimal::new(125_000, 2)),
                credit: None,
                description: "Kassa".into(),
                reference: None,
            },
            EntryInput {
                account: "3001".into(),
                debit: None,
                credit: Some(Decimal::new(100_000, 2)),
                description: "Försäljning".into(),
                reference: None,
            },
            EntryInput {
                account: "2611".into(),
                debit: None,
                credit: Some(Decimal::new(25_000, 2)),
                description: "Utgående moms".into(),
                reference: None,
            },
        ],
    });
    let replacement = replacement.into_result().expect("balanced voucher");

    let code = totp::code_at(&secret, totp::step_at(Utc::now().timestamp()))
        .expect("demo secret yields codes");
    print_json(
        "supersede",
        &app.supersede(SupersedeRequest {
            original: sale.id,
            replacement: replacement.id,
            reason: "fel momskonto".into(),
            actor: user,
            code,
            ip_address: None,
            user_agent: Some("kontera-demo".into()),
        }),
    );

    print_json("voucher_history", &app.voucher_history(sale.id));
    print_json("trial_balance", &app.trial_balance(false));
    print_json(
        "vouchers_in_period",
        &app.vouchers_in_period(
            NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today),
            today,
            true,
            None,
        ),
    );
}

fn print_json<T: serde::Serialize>(action: &str, value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("== {action}\n{json}"),
        Err(err) => eprintln!("== {action}: serialization failed: {err}"),
    }
}
