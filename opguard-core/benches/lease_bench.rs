use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use opguard_core::executor::{MutationExecutor, RedemptionPayload};
use opguard_core::manager::LeaseManager;
use opguard_core::registry::ResourceRegistry;
use opguard_core::types::*;

// ─── Helpers ────────────────────────────────────────────────────────────────

fn stock_item(id: &str, quantity: i64) -> ResourceRecord {
    ResourceRecord::StockItem(StockItemRecord {
        id: id.to_string(),
        status: StockStatus::Active,
        quantity,
    })
}

fn sale_details(quantity: i64) -> OperationDetails {
    OperationDetails {
        quantity: Some(quantity),
        ..Default::default()
    }
}

// ─── Benchmarks ─────────────────────────────────────────────────────────────

fn bench_applicability(c: &mut Criterion) {
    c.bench_function("registry_applies", |b| {
        b.iter(|| {
            ResourceRegistry::applies(
                black_box(ResourceType::StockItem),
                black_box(Operation::Sale),
            )
        })
    });
}

fn bench_precondition_check(c: &mut Criterion) {
    let record = stock_item("itm_1", 100);
    let details = sale_details(5);

    c.bench_function("registry_check_sale", |b| {
        b.iter(|| ResourceRegistry::check(black_box(&record), Operation::Sale, black_box(&details)))
    });
}

fn bench_executor_plan(c: &mut Criterion) {
    let lease = Lease::new(
        "tok_bench".to_string(),
        "actor_a".to_string(),
        ResourceRef::new(ResourceType::StockItem, "itm_1"),
        Operation::Sale,
        sale_details(5),
        300_000,
        1_000,
    );
    let record = stock_item("itm_1", 100);
    let payload = RedemptionPayload {
        operation: Operation::Sale,
        quantity: None,
        lines: Vec::new(),
    };

    c.bench_function("executor_plan_sale", |b| {
        b.iter(|| {
            MutationExecutor::plan(
                black_box(&lease),
                black_box(&record),
                &[],
                black_box(&payload),
                2_000,
            )
        })
    });
}

fn bench_request_with_varying_resources(c: &mut Criterion) {
    let mut group = c.benchmark_group("manager_request_release");

    for count in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let mut manager = LeaseManager::new();
            for i in 0..count {
                manager
                    .put_resource(stock_item(&format!("itm_{}", i), 1_000))
                    .expect("seed");
            }

            let mut now = 0_u64;
            b.iter(|| {
                now += 1;
                let resource = ResourceRef::new(ResourceType::StockItem, "itm_0");
                let lease = manager
                    .request(resource, "actor_a", Operation::Sale, sale_details(1), now)
                    .expect("lease");
                manager.release(&lease.token, "actor_a", now).expect("release");
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_applicability,
    bench_precondition_check,
    bench_executor_plan,
    bench_request_with_varying_resources,
);
criterion_main!(benches);
