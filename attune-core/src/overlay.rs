//! The effectiveness overlay: early-granted items operate at a stepped
//! fraction of full power until mastered.
//!
//! The per-effect path is latency-critical. `apply_scaling` rejects the
//! common case (nothing tracked) on two atomics before touching any lock;
//! only events for tracked items pay for the read lock and the step lookup.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use crate::config::EarlyLearningConfig;
use crate::host::{ItemDisplay, ItemHost};
use crate::ledger::ProgressLedger;
use crate::metrics::EngineCounters;
use crate::sync::CountedSet;
use crate::types::{AppliedEffect, EffectKind, ItemId, PowerStep, ScalingOutcome};

/// Cached display state for one early-granted item.
#[derive(Debug, Clone)]
struct DisplayEntry {
    original: ItemDisplay,
    step_index: usize,
}

/// Tracks early-granted items and scales their effects.
pub struct EffectivenessOverlay {
    settings: RwLock<EarlyLearningConfig>,
    /// Mirror of `settings.enabled` for the lock-free fast path.
    enabled: AtomicBool,
    steps: RwLock<Vec<PowerStep>>,
    display: RwLock<HashMap<ItemId, DisplayEntry>>,
    early: Arc<CountedSet<ItemId>>,
    ledger: Arc<ProgressLedger>,
    host: Arc<dyn ItemHost>,
    counters: Arc<EngineCounters>,
}

impl EffectivenessOverlay {
    /// Create an overlay sharing the given early set with the rest of the
    /// engine.
    #[must_use]
    pub fn new(
        settings: EarlyLearningConfig,
        steps: Vec<PowerStep>,
        early: Arc<CountedSet<ItemId>>,
        ledger: Arc<ProgressLedger>,
        host: Arc<dyn ItemHost>,
        counters: Arc<EngineCounters>,
    ) -> Self {
        let overlay = Self {
            enabled: AtomicBool::new(settings.enabled),
            settings: RwLock::new(settings),
            steps: RwLock::new(Vec::new()),
            display: RwLock::new(HashMap::new()),
            early,
            ledger,
            host,
            counters,
        };
        overlay.set_power_steps(steps);
        overlay
    }

    /// Replace the overlay settings, keeping the enabled mirror in sync.
    pub fn set_settings(&self, settings: EarlyLearningConfig) {
        self.enabled.store(settings.enabled, Ordering::Release);
        *self.settings.write() = settings;
    }

    /// Current settings, cloned.
    #[must_use]
    pub fn settings(&self) -> EarlyLearningConfig {
        self.settings.read().clone()
    }

    /// Install a power step table. Entries at or past 100% are dropped, the
    /// rest sorted ascending, and the terminal full-power step appended.
    pub fn set_power_steps(&self, steps: Vec<PowerStep>) {
        let mut kept: Vec<PowerStep> = steps
            .into_iter()
            .filter(|step| {
                if step.threshold >= 100.0 {
                    debug!(threshold = step.threshold, "dropping configured terminal step");
                    false
                } else {
                    true
                }
            })
            .collect();
        kept.sort_by(|a, b| {
            a.threshold
                .partial_cmp(&b.threshold)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        kept.push(PowerStep::new(100.0, 1.0, "Mastered"));
        *self.steps.write() = kept;
    }

    /// The active step table, cloned.
    #[must_use]
    pub fn power_steps(&self) -> Vec<PowerStep> {
        self.steps.read().clone()
    }

    // -----------------------------------------------------------------------
    // Tracking
    // -----------------------------------------------------------------------

    /// Whether the item is currently tracked as early-granted.
    #[must_use]
    pub fn is_tracked(&self, item: ItemId) -> bool {
        self.early.contains(&item)
    }

    /// The tracked set, cloned (persistence path).
    #[must_use]
    pub fn tracked_snapshot(&self) -> HashSet<ItemId> {
        self.early.snapshot()
    }

    /// Grant an item in weakened form. Idempotent: re-granting a tracked
    /// item does nothing. Returns `true` when the item was newly tracked.
    pub fn grant_early(&self, item: ItemId) -> bool {
        if item.is_none() || !self.early.insert(item) {
            return false;
        }
        debug!(%item, "early grant");
        self.counters.early_grants.fetch_add(1, Ordering::Relaxed);
        self.rebuild_display(item);
        if !self.host.actor_has_item(item) && !self.host.grant_item(item) {
            warn!(%item, "host could not grant early item");
        }
        true
    }

    /// Re-track an item whose progress sits in the early window but which
    /// lost its grant (target switched away and back, or a stale save).
    pub fn check_and_regrant(&self, item: ItemId) -> bool {
        if self.is_tracked(item) {
            return false;
        }
        let percent = self.ledger.percent(item) * 100.0;
        let unlock = self.settings.read().unlock_threshold;
        if percent >= unlock && percent < 100.0 {
            self.grant_early(item)
        } else {
            false
        }
    }

    /// Finish an item: restore its display, drop it from tracking.
    pub fn mark_mastered(&self, item: ItemId) {
        let entry = self.display.write().remove(&item);
        if let Some(entry) = entry {
            self.host.set_item_display(item, &entry.original);
        }
        if self.early.remove(&item) {
            debug!(%item, "mastered, tracking removed");
            self.counters.masteries.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Unwind an early grant without mastering: restore the display, take
    /// the item back from the actor, stop tracking. Progress is untouched.
    pub fn remove_early_from_actor(&self, item: ItemId) {
        if !self.early.remove(&item) {
            return;
        }
        let entry = self.display.write().remove(&item);
        if let Some(entry) = entry {
            self.host.set_item_display(item, &entry.original);
        }
        self.host.remove_item(item);
        debug!(%item, "early grant removed, progress kept");
    }

    // -----------------------------------------------------------------------
    // Steps & effectiveness
    // -----------------------------------------------------------------------

    /// Step index for a progress fraction: the highest step whose threshold
    /// has been reached, clamped to the first step below it.
    fn step_index_for(steps: &[PowerStep], percent: f32) -> usize {
        let pct = percent * 100.0;
        steps
            .iter()
            .rposition(|step| pct >= step.threshold)
            .unwrap_or(0)
    }

    /// Stepped effectiveness for an item: 1.0 when untracked or the overlay
    /// is disabled, otherwise the current step's value. Never interpolates.
    #[must_use]
    pub fn calculate_effectiveness(&self, item: ItemId) -> f32 {
        if !self.enabled.load(Ordering::Acquire) || !self.is_tracked(item) {
            return 1.0;
        }
        let steps = self.steps.read();
        let index = Self::step_index_for(&steps, self.ledger.percent(item));
        steps[index].effectiveness
    }

    /// Re-derive the item's power step from current progress. On a change
    /// the display cache is rebuilt and re-applied. Returns whether the step
    /// moved.
    pub fn check_and_update_step(&self, item: ItemId) -> bool {
        if !self.is_tracked(item) {
            return false;
        }
        let index = {
            let steps = self.steps.read();
            Self::step_index_for(&steps, self.ledger.percent(item))
        };
        let current = self.display.read().get(&item).map(|entry| entry.step_index);
        if current == Some(index) {
            return false;
        }
        trace!(%item, step = index, "power step changed");
        self.counters.step_changes.fetch_add(1, Ordering::Relaxed);
        self.rebuild_display(item);
        true
    }

    // -----------------------------------------------------------------------
    // Scaling
    // -----------------------------------------------------------------------

    /// Lock-free pre-check: is there any chance this item needs scaling?
    #[must_use]
    pub fn needs_scaling(&self, item: ItemId) -> bool {
        if !self.enabled.load(Ordering::Acquire) || self.early.is_empty_hint() {
            return false;
        }
        self.early.contains(&item)
    }

    /// Scale one effect application in place.
    ///
    /// Gradable effects get their magnitude multiplied by the stepped
    /// effectiveness. Binary effects are suppressed below the gate and
    /// passed through unscaled at or above it. Duration is never touched.
    pub fn apply_scaling(&self, effect: &mut AppliedEffect) -> ScalingOutcome {
        if !self.enabled.load(Ordering::Acquire) || self.early.is_empty_hint() {
            self.counters
                .scaling_fast_rejects
                .fetch_add(1, Ordering::Relaxed);
            return ScalingOutcome::Untouched;
        }
        if !self.early.contains(&effect.item) {
            return ScalingOutcome::Untouched;
        }

        let percent = self.ledger.percent(effect.item) * 100.0;
        match effect.kind {
            EffectKind::Binary => {
                let gate = self.settings.read().binary_effect_threshold;
                if percent < gate {
                    effect.magnitude = 0.0;
                    self.counters
                        .binary_suppressed
                        .fetch_add(1, Ordering::Relaxed);
                    trace!(item = %effect.item, percent, gate, "binary effect suppressed");
                    ScalingOutcome::Suppressed
                } else {
                    ScalingOutcome::Untouched
                }
            }
            EffectKind::Gradable => {
                let effectiveness = {
                    let steps = self.steps.read();
                    let index = Self::step_index_for(&steps, percent / 100.0);
                    steps[index].effectiveness
                };
                effect.magnitude *= effectiveness;
                self.counters
                    .scalings_applied
                    .fetch_add(1, Ordering::Relaxed);
                trace!(item = %effect.item, effectiveness, "effect scaled");
                ScalingOutcome::Scaled { effectiveness }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Display
    // -----------------------------------------------------------------------

    fn rebuild_display(&self, item: ItemId) {
        let settings = self.settings.read().clone();
        let (index, step) = {
            let steps = self.steps.read();
            let index = Self::step_index_for(&steps, self.ledger.percent(item));
            (index, steps[index].clone())
        };

        let mut cache = self.display.write();
        let original = match cache.get(&item) {
            Some(entry) => entry.original.clone(),
            None => match self.host.item_display(item) {
                Some(display) => display,
                None => {
                    warn!(%item, "no display text, skipping cache rebuild");
                    return;
                }
            },
        };
        cache.insert(
            item,
            DisplayEntry {
                original: original.clone(),
                step_index: index,
            },
        );
        drop(cache);

        if settings.modify_display {
            let modified = ItemDisplay {
                name: format!(
                    "{} ({} {:.0}%)",
                    original.name,
                    step.label,
                    step.effectiveness * 100.0
                ),
                description: format!(
                    "{} Currently {:.0}% effective.",
                    original.description,
                    step.effectiveness * 100.0
                ),
            };
            self.host.set_item_display(item, &modified);
        }
    }

    /// Post-load pass: rebuild every tracked item's cache and display and
    /// re-grant items the actor no longer possesses.
    pub fn refresh_all_displays(&self) {
        for item in self.early.snapshot() {
            self.rebuild_display(item);
            if !self.host.actor_has_item(item) && !self.host.grant_item(item) {
                warn!(%item, "could not re-grant tracked item after load");
            }
        }
    }

    /// Replace the tracked set wholesale (load path). Display caches are
    /// rebuilt by the subsequent [`Self::refresh_all_displays`].
    pub fn restore_tracked(&self, items: HashSet<ItemId>) {
        self.display.write().clear();
        self.early.replace(items);
    }

    /// Drop all tracking and cached display state.
    pub fn clear_all(&self) {
        self.display.write().clear();
        self.early.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
