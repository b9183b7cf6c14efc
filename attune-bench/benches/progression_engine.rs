//! Attune Benchmark Suite
//!
//! CI-enforced performance targets:
//!   effect_scaling_fast_reject ....... < 50ns
//!   effect_scaling_tracked_item ...... < 1μs
//!   xp_award_sourced ................. < 2μs
//!   use_event_fanout_8_targets ....... < 20μs
//!   save_encode_500_records .......... < 500μs

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use std::sync::Arc;

use attune_core::config::AttuneConfig;
use attune_core::persistence::{self, SaveData};
use attune_core::{
    AppliedEffect, Category, EffectKind, ItemCatalog, ItemHost, ItemId, ProgressionEngine,
    SourceId, Tier, XpSource,
};
use attune_host::SimHost;

fn make_engine(item_count: u32) -> (Arc<SimHost>, Arc<ProgressionEngine>) {
    let host = Arc::new(SimHost::new());
    for i in 1..=item_count {
        host.register_simple(
            ItemId(i),
            Tier::Novice,
            &format!("school_{}", i % 8),
            &format!("Item {i}"),
        );
    }
    let engine = Arc::new(ProgressionEngine::new(
        AttuneConfig::default(),
        Arc::clone(&host) as Arc<dyn ItemCatalog>,
        Arc::clone(&host) as Arc<dyn ItemHost>,
    ));
    (host, engine)
}

fn make_effect(item: ItemId) -> AppliedEffect {
    AppliedEffect {
        item,
        magnitude: 25.0,
        duration: 4.0,
        kind: EffectKind::Gradable,
        cast_by_tracked_actor: true,
    }
}

/// Benchmark: per-effect hook with nothing tracked (target: < 50ns).
///
/// This is the path every effect application in the host pays, so it must
/// stay on the two-atomic rejection and never take a lock.
fn bench_scaling_fast_reject(c: &mut Criterion) {
    let (_host, engine) = make_engine(64);
    let hook = engine.scaling_hook();

    c.bench_function("effect_scaling_fast_reject", |b| {
        b.iter(|| {
            let mut effect = make_effect(black_box(ItemId(7)));
            black_box(hook.on_effect_applied(&mut effect));
        });
    });
}

/// Benchmark: per-effect hook for a tracked, early-granted item
/// (target: < 1μs).
fn bench_scaling_tracked(c: &mut Criterion) {
    let (_host, engine) = make_engine(64);
    let item = ItemId(7);
    engine.set_required_xp(item, 100.0);
    engine.add_sourced_xp(item, 40.0, &XpSource::SelfUse); // early-granted at 25%
    let hook = engine.scaling_hook();

    c.bench_function("effect_scaling_tracked_item", |b| {
        b.iter(|| {
            let mut effect = make_effect(black_box(item));
            black_box(hook.on_effect_applied(&mut effect));
        });
    });
}

/// Benchmark: a single sourced XP award (target: < 2μs).
fn bench_xp_award(c: &mut Criterion) {
    let (_host, engine) = make_engine(64);
    let item = ItemId(3);
    engine.set_required_xp(item, 1_000_000_000.0); // never masters during the run

    c.bench_function("xp_award_sourced", |b| {
        b.iter(|| {
            black_box(engine.add_sourced_xp(
                black_box(item),
                black_box(1.0),
                &XpSource::SelfUse,
            ));
        });
    });
}

/// Benchmark: one use event fanned out to 8 category targets
/// (target: < 20μs).
fn bench_use_event_fanout(c: &mut Criterion) {
    let (_host, engine) = make_engine(64);
    for i in 0..8u32 {
        let target = ItemId(40 + i);
        engine.set_required_xp(target, 1_000_000_000.0);
        engine.set_learning_target(Category::new(format!("school_{i}")), target, vec![ItemId(1)]);
    }
    let category = Category::new("school_0");

    c.bench_function("use_event_fanout_8_targets", |b| {
        b.iter(|| {
            engine.on_use(black_box(&category), black_box(ItemId(1)), black_box(2.0));
        });
    });
}

/// Benchmark: encoding a 500-record save payload (target: < 500μs).
fn bench_save_encode(c: &mut Criterion) {
    let data = SaveData {
        targets: (0..8)
            .map(|i| (Category::new(format!("school_{i}")), ItemId(40 + i)))
            .collect(),
        progress: (1..=500)
            .map(|i| {
                (
                    ItemId(i),
                    (i as f32 / 500.0).clamp(0.0, 1.0),
                    i % 10 == 0,
                    vec![(SourceId::new("quests"), i as f32)],
                )
            })
            .collect(),
        early: (1..=50).map(ItemId).collect(),
    };

    c.bench_function("save_encode_500_records", |b| {
        b.iter(|| {
            black_box(persistence::encode(black_box(&data)));
        });
    });
}

criterion_group!(
    benches,
    bench_scaling_fast_reject,
    bench_scaling_tracked,
    bench_xp_award,
    bench_use_event_fanout,
    bench_save_encode,
);
criterion_main!(benches);
