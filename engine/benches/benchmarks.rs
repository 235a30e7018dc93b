//! Performance benchmarks for valise-engine

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use valise_engine::{merge_expenses, settle, Currency, Expense, Rates};

fn ledger(size: usize, roster: &[String]) -> Vec<Expense> {
    (0..size)
        .map(|i| Expense {
            id: format!("e-{i}"),
            item: format!("item {}", i % 37),
            amount: (i % 97) as f64 + 0.5,
            currency: match i % 3 {
                0 => Currency::Thb,
                1 => Currency::Usd,
                _ => Currency::Jpy,
            },
            category: "Food".into(),
            date: format!("2026-08-{:02}", (i % 28) + 1),
            timestamp: String::new(),
            bill_photo: None,
            paid_by: Some(roster[i % roster.len()].clone()),
            participants: None,
            settled_by: (i % 5 == 0).then(|| vec![roster[(i + 1) % roster.len()].clone()]),
        })
        .collect()
}

fn bench_settle(c: &mut Criterion) {
    let roster: Vec<String> = ["Alice", "Bob", "Cara", "Dan"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let rates = Rates::default();

    let mut group = c.benchmark_group("settle");
    for size in [10, 100, 1000] {
        let expenses = ledger(size, &roster);
        group.bench_with_input(BenchmarkId::from_parameter(size), &expenses, |b, e| {
            b.iter(|| settle(black_box(e), black_box(&roster), black_box(&rates)))
        });
    }
    group.finish();
}

fn bench_merge(c: &mut Criterion) {
    let roster: Vec<String> = ["Alice", "Bob", "Cara", "Dan"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let mut group = c.benchmark_group("merge_expenses");
    for size in [10, 100, 1000] {
        // remote rows lack settled_by, local rows carry it
        let mut remote = ledger(size, &roster);
        for e in &mut remote {
            e.settled_by = None;
        }
        let mut local = ledger(size, &roster);
        for (i, e) in local.iter_mut().enumerate() {
            e.id = format!("old-{i}");
            e.settled_by = Some(vec![roster[i % roster.len()].clone()]);
        }

        group.bench_with_input(
            BenchmarkId::from_parameter(size),
            &(remote, local),
            |b, (remote, local)| {
                b.iter(|| merge_expenses(black_box(remote.clone()), black_box(local)))
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_settle, bench_merge);
criterion_main!(benches);
