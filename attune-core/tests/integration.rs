//! End-to-end integration tests: a simulated host drives the whole engine
//! through the learning lifecycle, from target selection and grinding to
//! the early grant, power steps, effect scaling, mastery, and a save/load
//! round trip.

use std::sync::Arc;

use attune_core::config::{AttuneConfig, XpConfig};
use attune_core::store::SaveStore;
use attune_core::{
    AppliedEffect, Category, EffectKind, EngineEvent, EventSink, ItemCatalog, ItemHost, ItemId,
    PowerStep, PrereqRequirements, ProgressionEngine, ScalingOutcome, Tier, XpSource,
};
use attune_host::{HostBridge, HostEvent, SimHost};
use parking_lot::Mutex;

const FIREBOLT: ItemId = ItemId(0x0001_0001);
const FLAMES: ItemId = ItemId(0x0001_0002);
const FIREBALL: ItemId = ItemId(0x0001_0003);
const HEALING: ItemId = ItemId(0x0002_0001);
const PARALYZE: ItemId = ItemId(0x0003_0001);

#[derive(Default)]
struct CollectingSink {
    events: Mutex<Vec<EngineEvent>>,
}

impl EventSink for CollectingSink {
    fn on_event(&self, event: &EngineEvent) {
        self.events.lock().push(event.clone());
    }
}

fn world() -> (Arc<SimHost>, Arc<ProgressionEngine>, Arc<CollectingSink>) {
    // RUST_LOG=attune_core=trace surfaces engine tracing in test output.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let host = Arc::new(SimHost::new());
    host.register_simple(FIREBOLT, Tier::Novice, "destruction", "Firebolt");
    host.register_simple(FLAMES, Tier::Novice, "destruction", "Flames");
    host.register_simple(FIREBALL, Tier::Adept, "destruction", "Fireball");
    host.register_simple(HEALING, Tier::Novice, "restoration", "Healing");
    host.register_simple(PARALYZE, Tier::Expert, "alteration", "Paralyze");

    // Flat multipliers so XP arithmetic in assertions stays exact.
    let config = AttuneConfig {
        xp: XpConfig {
            multiplier_any: 1.0,
            multiplier_school: 1.0,
            multiplier_direct: 1.0,
            ..XpConfig::default()
        },
        ..AttuneConfig::default()
    };
    let engine = Arc::new(ProgressionEngine::new(
        config,
        Arc::clone(&host) as Arc<dyn ItemCatalog>,
        Arc::clone(&host) as Arc<dyn ItemHost>,
    ));
    let sink = Arc::new(CollectingSink::default());
    engine.add_event_sink(Arc::clone(&sink) as Arc<dyn EventSink>);
    (host, engine, sink)
}

#[test]
fn full_learning_lifecycle() {
    let (host, engine, sink) = world();
    let destruction = Category::new("destruction");
    engine.set_required_xp(FIREBALL, 100.0);
    engine.set_learning_target(destruction.clone(), FIREBALL, vec![FIREBOLT]);

    // Direct practice: capped at 75% of required.
    for _ in 0..10 {
        engine.on_use(&destruction, FIREBOLT, 10.0);
    }
    assert!((engine.percent(FIREBALL) - 0.75).abs() < 1e-4);
    // Early grant fired on the way: the actor can cast a weakened Fireball.
    assert!(host.actor_has_item(FIREBALL));
    assert!(host.display_name(FIREBALL).unwrap().contains('%'));
    assert!(engine.effectiveness(FIREBALL) < 1.0);

    // Past the 75% rail non-self use is ignored.
    engine.on_use(&destruction, FLAMES, 50.0);
    assert!((engine.percent(FIREBALL) - 0.75).abs() < 1e-4);

    // Self use carries it to mastery (1.5x early bonus applies).
    for _ in 0..10 {
        engine.on_use(&destruction, FIREBALL, 10.0);
    }
    assert_eq!(engine.percent(FIREBALL), 1.0);
    assert!(engine.is_mastered(FIREBALL));
    assert_eq!(engine.effectiveness(FIREBALL), 1.0);
    assert_eq!(host.display_name(FIREBALL).unwrap(), "Fireball");
    assert!(engine.learning_target(&destruction).is_none());

    let events = sink.events.lock();
    let masteries = events
        .iter()
        .filter(|e| matches!(e, EngineEvent::Mastered { .. }))
        .count();
    assert_eq!(masteries, 1);
    assert!(events.iter().any(|e| matches!(e, EngineEvent::EarlyGranted { item } if *item == FIREBALL)));
}

#[test]
fn power_steps_change_effectiveness_and_display() {
    let (host, engine, _) = world();
    engine.overlay().set_power_steps(vec![
        PowerStep::new(25.0, 0.2, "Budding"),
        PowerStep::new(55.0, 0.5, "Practicing"),
    ]);
    engine.set_required_xp(FIREBOLT, 100.0);

    engine.add_sourced_xp(FIREBOLT, 26.0, &XpSource::SelfUse);
    assert_eq!(engine.effectiveness(FIREBOLT), 0.2);
    assert!(host.display_name(FIREBOLT).unwrap().contains("Budding"));

    engine.add_sourced_xp(FIREBOLT, 30.0, &XpSource::SelfUse); // 56%
    assert_eq!(engine.effectiveness(FIREBOLT), 0.5);
    assert!(host.display_name(FIREBOLT).unwrap().contains("Practicing"));
}

#[test]
fn binary_effects_gate_and_gradables_scale() {
    let (host, engine, _) = world();
    let bridge = HostBridge::new(Arc::clone(&engine));
    engine.set_required_xp(PARALYZE, 100.0);
    engine.set_required_xp(FIREBOLT, 100.0);
    engine.add_sourced_xp(PARALYZE, 60.0, &XpSource::SelfUse);
    engine.add_sourced_xp(FIREBOLT, 60.0, &XpSource::SelfUse);
    assert!(host.actor_has_item(PARALYZE));

    // Binary at 60% < gate 80: suppressed outright.
    let mut paralyze = AppliedEffect {
        item: PARALYZE,
        magnitude: 1.0,
        duration: 10.0,
        kind: EffectKind::Binary,
        cast_by_tracked_actor: true,
    };
    assert_eq!(
        bridge.on_effect_applied(&mut paralyze),
        ScalingOutcome::Suppressed
    );
    assert_eq!(paralyze.magnitude, 0.0);
    assert_eq!(paralyze.duration, 10.0);

    // Gradable at 60%: scaled by the current step, duration untouched.
    let mut firebolt = AppliedEffect {
        item: FIREBOLT,
        magnitude: 40.0,
        duration: 2.0,
        kind: EffectKind::Gradable,
        cast_by_tracked_actor: true,
    };
    assert!(matches!(
        bridge.on_effect_applied(&mut firebolt),
        ScalingOutcome::Scaled { .. }
    ));
    assert!(firebolt.magnitude < 40.0);
    assert_eq!(firebolt.duration, 2.0);

    // Binary at 85% >= gate: passes through at full strength.
    engine.add_sourced_xp(PARALYZE, 25.0, &XpSource::SelfUse);
    let mut paralyze = AppliedEffect {
        item: PARALYZE,
        magnitude: 1.0,
        duration: 10.0,
        kind: EffectKind::Binary,
        cast_by_tracked_actor: true,
    };
    assert_eq!(
        bridge.on_effect_applied(&mut paralyze),
        ScalingOutcome::Untouched
    );
    assert_eq!(paralyze.magnitude, 1.0);

    // Foreign casters are never touched.
    let mut foreign = AppliedEffect {
        item: FIREBOLT,
        magnitude: 40.0,
        duration: 2.0,
        kind: EffectKind::Gradable,
        cast_by_tracked_actor: false,
    };
    assert_eq!(
        bridge.on_effect_applied(&mut foreign),
        ScalingOutcome::Untouched
    );
    assert_eq!(foreign.magnitude, 40.0);
}

#[test]
fn soft_prereqs_gate_the_privileged_unlock() {
    let (host, engine, _) = world();
    engine.set_required_xp(FIREBALL, 10.0);
    engine.set_prereq_requirements(
        FIREBALL,
        PrereqRequirements::n_of(vec![FIREBOLT, FLAMES, HEALING], 2),
    );
    engine.set_item_xp(FIREBALL, 10.0); // complete but locked

    host.grant_item(FIREBOLT);
    assert_eq!(engine.soft_prereq_status(FIREBALL), (1, 2));
    assert!(!engine.can_unlock(FIREBALL));

    host.grant_item(HEALING);
    assert_eq!(engine.soft_prereq_status(FIREBALL), (2, 2));
    assert!(engine.unlock(FIREBALL));
    assert!(host.actor_has_item(FIREBALL));
    assert!(engine.is_mastered(FIREBALL));
}

#[test]
fn study_material_boosts_use_xp() {
    let (host, engine, _) = world();
    let restoration = Category::new("restoration");
    host.register_item(
        HEALING,
        attune_host::SimItem {
            tier: Tier::Novice,
            category: restoration.clone(),
            name: "Healing".to_string(),
            description: "Heals.".to_string(),
            study_boost: 2.0,
        },
    );
    engine.set_required_xp(HEALING, 1000.0);
    engine.set_learning_target(restoration.clone(), HEALING, vec![]);

    engine.on_use(&restoration, HEALING, 10.0);
    let plain = engine.percent(HEALING);
    assert!((plain - 0.01).abs() < 1e-5);

    // Carrying the item's study material doubles the gain per use.
    host.set_carrying_study_material(HEALING, true);
    engine.on_use(&restoration, HEALING, 10.0);
    assert!((engine.percent(HEALING) - plain * 3.0).abs() < 1e-4);
}

#[test]
fn save_load_round_trip_with_remap() {
    let (_, engine, _) = world();
    let destruction = Category::new("destruction");
    engine.register_source(
        attune_core::SourceId::new("ancient_tomes"),
        "Ancient Tomes",
        1.0,
        25.0,
    );
    engine.set_required_xp(FIREBALL, 100.0);
    engine.set_learning_target(destruction.clone(), FIREBALL, vec![]);
    engine.add_sourced_xp(FIREBALL, 20.0, &XpSource::Custom(attune_core::SourceId::new("ancient_tomes")));
    engine.add_sourced_xp(FIREBALL, 20.0, &XpSource::SelfUse);
    assert!((engine.percent(FIREBALL) - 0.40).abs() < 1e-4);

    let store = SaveStore::open_in_memory(&Default::default()).expect("store");
    engine.save(&store, "quicksave").expect("save");

    // A new session where every destruction ID shifted up by 0x100.
    let (host2, engine2, _) = world();
    host2.register_simple(ItemId(FIREBALL.0 + 0x100), Tier::Adept, "destruction", "Fireball");
    let loaded = engine2
        .load(&store, "quicksave", |item| Some(ItemId(item.0 + 0x100)))
        .expect("load");
    assert!(loaded);

    let remapped = ItemId(FIREBALL.0 + 0x100);
    assert_eq!(engine2.learning_target(&destruction), Some(remapped));
    assert!((engine2.percent(remapped) - 0.40).abs() < 1e-4);
    assert!(engine2.overlay().is_tracked(remapped));
    assert!(host2.actor_has_item(remapped)); // re-granted on load

    // Loaded progress never regresses even though accumulators were not
    // persisted.
    engine2.add_sourced_xp(remapped, 1.0, &XpSource::Any);
    assert!(engine2.percent(remapped) >= 0.40);
}

#[test]
fn event_pump_drives_the_engine() {
    let (host, engine, _) = world();
    let bridge = HostBridge::new(engine);
    let destruction = Category::new("destruction");

    bridge.handle(HostEvent::TargetSelected {
        category: destruction.clone(),
        item: FIREBOLT,
        direct_prereqs: vec![FLAMES],
    });
    bridge.engine().set_required_xp(FIREBOLT, 100.0);

    for _ in 0..5 {
        bridge.handle(HostEvent::ItemUsed {
            category: destruction.clone(),
            item: FLAMES,
            base_xp: 10.0,
        });
    }
    assert!((bridge.engine().percent(FIREBOLT) - 0.5).abs() < 1e-4);
    assert!(host.actor_has_item(FIREBOLT)); // crossed the early threshold

    bridge.handle(HostEvent::TargetCleared {
        category: destruction,
    });
    assert!(!host.actor_has_item(FIREBOLT)); // grant unwound, progress kept
    assert!((bridge.engine().percent(FIREBOLT) - 0.5).abs() < 1e-4);
}
