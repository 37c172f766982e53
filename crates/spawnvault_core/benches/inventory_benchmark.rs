//! Benchmark for virtual inventory throughput.
//!
//! The store must absorb loot at generation rate without slot scans.
//!
//! Run with: cargo bench --package spawnvault_core --bench inventory_benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use spawnvault_core::{ItemKindRegistry, ItemSignature, ItemStack, VirtualInventory};

fn registry_with_kinds(n: u32) -> ItemKindRegistry {
    let mut registry = ItemKindRegistry::new();
    for i in 0..n {
        registry.register(&format!("kind_{i}"), 64, None, false);
    }
    registry
}

fn benchmark_add_items(c: &mut Criterion) {
    let mut group = c.benchmark_group("inventory");
    group.throughput(Throughput::Elements(100));

    group.bench_function("add_100_stacks", |b| {
        b.iter(|| {
            let mut inv = VirtualInventory::new();
            for i in 0..100u32 {
                let stacks = [ItemStack::new(ItemSignature::of(i % 8), 3)];
                black_box(inv.add_items(stacks));
            }
            inv
        });
    });

    group.finish();
}

fn benchmark_display_view(c: &mut Criterion) {
    let registry = registry_with_kinds(32);
    let mut inv = VirtualInventory::new();
    for i in 0..32u32 {
        inv.add_items([ItemStack::new(ItemSignature::of(i), 500)]);
    }

    c.bench_function("display_view_32_kinds", |b| {
        b.iter(|| black_box(inv.display_view(&registry)));
    });
}

fn benchmark_remove_items(c: &mut Criterion) {
    c.bench_function("remove_partial", |b| {
        b.iter_with_setup(
            || {
                let mut inv = VirtualInventory::new();
                inv.add_items([ItemStack::new(ItemSignature::of(1), 10_000)]);
                inv
            },
            |mut inv| {
                black_box(inv.remove_items(&[ItemStack::new(ItemSignature::of(1), 64)]));
                inv
            },
        );
    });
}

criterion_group!(
    benches,
    benchmark_add_items,
    benchmark_display_view,
    benchmark_remove_items
);
criterion_main!(benches);
