use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;

use kontera_core::Amount;
use kontera_infra::{NewVatVoucher, NewVoucher, PostingService, Store};
use kontera_ledger::{JournalLine, VatComponent, VatDirection, VatRate, VoucherType};

fn amount(cents: i64) -> Amount {
    Amount::new_unchecked(Decimal::new(cents, 2))
}

fn bench_create_and_post(c: &mut Criterion) {
    let mut group = c.benchmark_group("posting");
    group.throughput(Throughput::Elements(1));

    let date = NaiveDate::from_ymd_opt(2025, 10, 6).expect("valid date");

    group.bench_function("create_and_post_three_line_voucher", |b| {
        let posting = PostingService::new(Arc::new(Store::new()));
        b.iter(|| {
            let voucher = posting
                .create_voucher(NewVoucher {
                    description: "Kontantförsäljning".into(),
                    voucher_type: VoucherType::SalesInvoice,
                    date,
                    source_ref: None,
                    lines: vec![
                        JournalLine::debit("1910", amount(125_000), "Kassa"),
                        JournalLine::credit("3001", amount(100_000), "Försäljning"),
                        JournalLine::credit("2611", amount(25_000), "Utgående moms"),
                    ],
                })
                .expect("balanced voucher");
            let posted = posting
                .post_voucher(voucher.id, Utc::now())
                .expect("posting succeeds");
            black_box(posted);
        });
    });

    group.bench_function("create_vat_voucher_with_rounding", |b| {
        let posting = PostingService::new(Arc::new(Store::new()));
        b.iter(|| {
            let created = posting
                .create_vat_voucher(NewVatVoucher {
                    description: "Programvarulicens".into(),
                    voucher_type: VoucherType::Purchase,
                    date,
                    source_ref: None,
                    direction: VatDirection::Expense,
                    components: vec![VatComponent {
                        subtotal: amount(100_653),
                        rate: VatRate::Standard25,
                        net_account: "5420".into(),
                        vat_account: "2640".into(),
                        description: "Programvaror".into(),
                    }],
                    counter_account: "2440".into(),
                })
                .expect("vat voucher");
            black_box(created);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_create_and_post);
criterion_main!(benches);
