//! Benchmarks for SQL rendering across the three dialects.
//!
//! Benchmarks cover:
//! - condition formatting (typed and JSON positional forms)
//! - SELECT rendering, plain and paged
//! - bulk INSERT rendering
//!
//! Run with: `cargo bench`

use std::rc::Rc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use sqladapter::adapter::{MsSqlAdapter, MySqlAdapter, PgSqlAdapter};
use sqladapter::driver::Script;
use sqladapter::{
    Condition, Fields, InsertRequest, InstanceConfig, SelectRequest, Session, SqlAdapter, Value,
};

fn adapters() -> Vec<(&'static str, Rc<dyn SqlAdapter>)> {
    let session = |driver: &str| {
        Session::new("bench", InstanceConfig::new(driver), Script::new().connector())
    };
    vec![
        ("mysql", Rc::new(MySqlAdapter::new(session("mysql"))) as Rc<dyn SqlAdapter>),
        ("mssql", Rc::new(MsSqlAdapter::new(session("mssql"))) as Rc<dyn SqlAdapter>),
        ("pgsql", Rc::new(PgSqlAdapter::new(session("pgsql"))) as Rc<dyn SqlAdapter>),
    ]
}

fn bench_conditions(c: &mut Criterion) {
    let mut group = c.benchmark_group("conditions");
    let typed = Condition::or([
        Condition::and([Condition::eq("status", "active"), Condition::compare("age", ">", 18)]),
        Condition::eq("role", vec!["admin", "owner"]),
    ]);
    let positional = json!([[["status", "active"], ["age", ">", 18]], ["role", ["admin", "owner"]]]);

    for (name, adapter) in adapters() {
        group.bench_with_input(BenchmarkId::new("typed", name), &adapter, |b, adapter| {
            b.iter(|| black_box(&typed).format(&**adapter).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("json", name), &adapter, |b, adapter| {
            b.iter(|| {
                Condition::try_from(black_box(positional.clone()))
                    .unwrap()
                    .format(&**adapter)
                    .unwrap()
            });
        });
    }

    group.finish();
}

fn bench_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("select");

    for (name, adapter) in adapters() {
        group.bench_with_input(BenchmarkId::new("simple", name), &adapter, |b, adapter| {
            b.iter(|| {
                SelectRequest::from_table(adapter.clone(), black_box("users"))
                    .sql()
                    .unwrap()
            });
        });
        group.bench_with_input(BenchmarkId::new("paged_join", name), &adapter, |b, adapter| {
            b.iter(|| {
                SelectRequest::from_table(adapter.clone(), "users")
                    .join_smart("orders", None, None, "user_id", false)
                    .and_where(("users.active", true))
                    .and_where(("orders.total", ">", 100))
                    .order_by("users.name")
                    .number(50)
                    .from_offset(black_box(100))
                    .sql()
                    .unwrap()
            });
        });
    }

    group.finish();
}

fn bench_bulk_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");
    let rows: Vec<Vec<(String, Value)>> = (0..100)
        .map(|i| {
            vec![
                ("id".to_string(), Value::Int(i)),
                ("name".to_string(), Value::Text(format!("user {}", i))),
                ("score".to_string(), Value::Float(i as f64 / 3.0)),
            ]
        })
        .collect();

    for (name, adapter) in adapters() {
        group.bench_with_input(BenchmarkId::new("rows_100", name), &adapter, |b, adapter| {
            b.iter(|| {
                InsertRequest::new(adapter.clone(), "users")
                    .fields(Fields::Rows(black_box(rows.clone())))
                    .sql()
                    .unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_conditions, bench_select, bench_bulk_insert);
criterion_main!(benches);
