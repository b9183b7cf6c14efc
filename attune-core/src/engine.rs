//! The engine facade.
//!
//! [`ProgressionEngine`] wires the ledger, the overlay and the host
//! together: award paths run through the ledger, and the facade turns the
//! resulting transitions into overlay actions (early grants, step updates,
//! mastery finalization) and notification events.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::config::AttuneConfig;
use crate::error::{AttuneError, Result};
use crate::host::{ItemCatalog, ItemHost};
use crate::ledger::{ProgressLedger, XpTransition};
use crate::metrics::{CounterSnapshot, EngineCounters};
use crate::overlay::EffectivenessOverlay;
use crate::persistence::{self, SaveData};
use crate::prereq::PrereqRequirements;
use crate::scaling::ScalingHook;
use crate::store::SaveStore;
use crate::sync::CountedSet;
use crate::types::{Category, ItemId, ProgressSnapshot, SourceId, XpSource};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Notification emitted by the engine for UI collaborators.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// XP landed on an item.
    XpGained {
        /// The item that progressed.
        item: ItemId,
        /// XP applied after multipliers and caps.
        applied: f32,
        /// New progress fraction.
        percent: f32,
    },
    /// An item crossed the early-unlock threshold.
    EarlyGranted {
        /// The granted item.
        item: ItemId,
    },
    /// An early-granted item moved to a different power step.
    StepChanged {
        /// The item whose step moved.
        item: ItemId,
    },
    /// An item reached full progress.
    Mastered {
        /// The mastered item.
        item: ItemId,
    },
    /// An item was unlocked through the privileged grant path.
    Unlocked {
        /// The unlocked item.
        item: ItemId,
    },
}

/// Receives engine events. Implementations must be cheap; they run inline
/// on the calling thread.
pub trait EventSink: Send + Sync {
    /// Handle one event.
    fn on_event(&self, event: &EngineEvent);
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Facade over the whole progression engine for one tracked actor.
pub struct ProgressionEngine {
    ledger: Arc<ProgressLedger>,
    overlay: Arc<EffectivenessOverlay>,
    host: Arc<dyn ItemHost>,
    counters: Arc<EngineCounters>,
    sinks: RwLock<Vec<Arc<dyn EventSink>>>,
    enabled: AtomicBool,
}

impl ProgressionEngine {
    /// Build an engine from configuration plus the host's catalog and
    /// live-object access.
    #[must_use]
    pub fn new(
        config: AttuneConfig,
        catalog: Arc<dyn ItemCatalog>,
        host: Arc<dyn ItemHost>,
    ) -> Self {
        let counters = Arc::new(EngineCounters::new());
        let ledger = Arc::new(ProgressLedger::new(
            config.xp.clone(),
            catalog,
            Arc::clone(&counters),
        ));
        let overlay = Arc::new(EffectivenessOverlay::new(
            config.early.clone(),
            config.power_steps(),
            Arc::new(CountedSet::new()),
            Arc::clone(&ledger),
            Arc::clone(&host),
            Arc::clone(&counters),
        ));
        Self {
            ledger,
            overlay,
            host,
            counters,
            sinks: RwLock::new(Vec::new()),
            enabled: AtomicBool::new(config.general.enabled),
        }
    }

    /// Apply a fresh configuration (config reload).
    pub fn set_config(&self, config: &AttuneConfig) {
        self.enabled.store(config.general.enabled, Ordering::Release);
        self.ledger.set_config(config.xp.clone());
        self.overlay.set_settings(config.early.clone());
        self.overlay.set_power_steps(config.power_steps());
    }

    /// The per-effect hook for the host's dispatch.
    #[must_use]
    pub fn scaling_hook(&self) -> ScalingHook {
        ScalingHook::new(Arc::clone(&self.overlay))
    }

    /// The overlay, for collaborators that query effectiveness directly.
    #[must_use]
    pub fn overlay(&self) -> &Arc<EffectivenessOverlay> {
        &self.overlay
    }

    /// Register an event sink.
    pub fn add_event_sink(&self, sink: Arc<dyn EventSink>) {
        self.sinks.write().push(sink);
    }

    fn emit(&self, event: &EngineEvent) {
        for sink in self.sinks.read().iter() {
            sink.on_event(event);
        }
    }

    /// Counter snapshot for diagnostics.
    #[must_use]
    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    // -----------------------------------------------------------------------
    // Transition dispatch
    // -----------------------------------------------------------------------

    fn process_transition(&self, transition: &XpTransition) {
        let item = transition.item;
        let settings = self.overlay.settings();
        let unlock = settings.unlock_threshold / 100.0;

        if transition.crossed_up(1.0) {
            // Complete progress with unmet prerequisites stays "ready" until
            // the privileged unlock path is taken.
            if self.are_prereqs_met(item) {
                self.finalize_mastery(item);
            } else {
                info!(%item, "progress complete, awaiting prerequisite unlock");
            }
        } else if settings.enabled && transition.crossed_up(unlock) {
            if self.overlay.grant_early(item) {
                self.emit(&EngineEvent::EarlyGranted { item });
            }
        }
        if self.overlay.check_and_update_step(item) {
            self.emit(&EngineEvent::StepChanged { item });
        }
        self.emit(&EngineEvent::XpGained {
            item,
            applied: transition.applied,
            percent: transition.new_percent,
        });
    }

    fn finalize_mastery(&self, item: ItemId) {
        info!(%item, "item mastered");
        self.overlay.mark_mastered(item);
        self.ledger.mark_unlocked(item);
        if !self.host.actor_has_item(item) && !self.host.grant_item(item) {
            warn!(%item, "host could not grant mastered item");
        }
        self.ledger.clear_target_for_item(item);
        self.emit(&EngineEvent::Mastered { item });
    }

    // -----------------------------------------------------------------------
    // Award paths
    // -----------------------------------------------------------------------

    /// Award XP from a source. Returns the XP actually applied.
    pub fn add_sourced_xp(&self, item: ItemId, amount: f32, source: &XpSource) -> f32 {
        if !self.enabled.load(Ordering::Acquire) {
            return 0.0;
        }
        match self.ledger.add_sourced_xp(item, amount, source) {
            Some(transition) => {
                self.process_transition(&transition);
                transition.applied
            }
            None => 0.0,
        }
    }

    /// Uncapped raw XP award (external API path).
    pub fn add_raw_xp(&self, item: ItemId, amount: f32) -> f32 {
        if !self.enabled.load(Ordering::Acquire) {
            return 0.0;
        }
        match self.ledger.add_raw_xp(item, amount) {
            Some(transition) => {
                self.process_transition(&transition);
                transition.applied
            }
            None => 0.0,
        }
    }

    /// Set an item's XP to an absolute value (console / dev path).
    pub fn set_item_xp(&self, item: ItemId, xp: f32) {
        if let Some(transition) = self.ledger.set_item_xp(item, xp) {
            self.process_transition(&transition);
        }
    }

    /// Route a use event: `category` and `used_item` describe what the
    /// tracked actor just did, `base_xp` the host's XP valuation of it.
    pub fn on_use(&self, category: &Category, used_item: ItemId, base_xp: f32) {
        if !self.enabled.load(Ordering::Acquire) {
            return;
        }
        let settings = self.overlay.settings();
        let transitions = self.ledger.on_use(
            category,
            used_item,
            base_xp,
            &settings,
            |item| self.overlay.is_tracked(item),
            |item| self.host.inventory_boost(item),
        );
        for transition in &transitions {
            self.process_transition(transition);
        }
    }

    // -----------------------------------------------------------------------
    // Targets
    // -----------------------------------------------------------------------

    /// Install a learning target. Displaced targets lose their early grant
    /// (progress stays); a new target whose progress already sits in the
    /// early window is re-granted immediately.
    pub fn set_learning_target(
        &self,
        category: Category,
        item: ItemId,
        direct_prereqs: Vec<ItemId>,
    ) -> bool {
        let Some(change) = self.ledger.set_learning_target(category, item, direct_prereqs)
        else {
            return false;
        };
        for displaced in change.displaced {
            self.overlay.remove_early_from_actor(displaced);
        }
        if self.overlay.check_and_regrant(change.new_target) {
            self.emit(&EngineEvent::EarlyGranted {
                item: change.new_target,
            });
        }
        true
    }

    /// The active target for a category.
    #[must_use]
    pub fn learning_target(&self, category: &Category) -> Option<ItemId> {
        self.ledger.learning_target(category)
    }

    /// Drop a category's target, unwinding its early grant.
    pub fn clear_learning_target(&self, category: &Category) {
        if let Some(item) = self.ledger.clear_learning_target(category) {
            self.overlay.remove_early_from_actor(item);
        }
    }

    /// All active targets, cloned.
    #[must_use]
    pub fn all_targets(&self) -> HashMap<Category, ItemId> {
        self.ledger.all_targets()
    }

    // -----------------------------------------------------------------------
    // Prerequisites & unlocking
    // -----------------------------------------------------------------------

    /// Store unlock requirements for an item.
    pub fn set_prereq_requirements(&self, item: ItemId, reqs: PrereqRequirements) {
        self.ledger.set_prereq_requirements(item, reqs);
    }

    /// Whether the item counts as mastered: finished in the ledger, or
    /// possessed by the actor outside the early-learning window (items
    /// acquired through other means count as known).
    #[must_use]
    pub fn is_mastered(&self, item: ItemId) -> bool {
        if self.ledger.is_progress_mastered(item) {
            return true;
        }
        self.host.actor_has_item(item) && !self.overlay.is_tracked(item)
    }

    /// Whether the item's unlock requirements are satisfied.
    #[must_use]
    pub fn are_prereqs_met(&self, item: ItemId) -> bool {
        self.ledger.are_prereqs_met(item, |i| self.is_mastered(i))
    }

    /// Hard prerequisites still missing.
    #[must_use]
    pub fn unmet_hard_prereqs(&self, item: ItemId) -> Vec<ItemId> {
        self.ledger.unmet_hard_prereqs(item, |i| self.is_mastered(i))
    }

    /// `(mastered, needed)` over the item's soft pool.
    #[must_use]
    pub fn soft_prereq_status(&self, item: ItemId) -> (usize, usize) {
        self.ledger.soft_prereq_status(item, |i| self.is_mastered(i))
    }

    /// Whether the privileged grant would succeed right now.
    #[must_use]
    pub fn can_unlock(&self, item: ItemId) -> bool {
        let Some(snapshot) = self.ledger.progress(item) else {
            return false;
        };
        snapshot.ready && self.are_prereqs_met(item)
    }

    /// Privileged grant: requires complete progress, not yet unlocked, and
    /// satisfied prerequisites. Grants through the host and finalizes all
    /// bookkeeping. Returns whether the unlock happened.
    pub fn unlock(&self, item: ItemId) -> bool {
        self.try_unlock(item).is_ok()
    }

    /// [`Self::unlock`] with diagnostic errors: reports why the unlock was
    /// refused instead of a bare `false`.
    ///
    /// # Errors
    /// `UnknownItem` when the ledger has no record for the item, `NotReady`
    /// while progress is incomplete (or the item is already unlocked),
    /// `PrerequisiteNotMet` naming the first blocking requirement, and
    /// `GrantRefused` when the host backend cannot add the item.
    pub fn try_unlock(&self, item: ItemId) -> Result<()> {
        let snapshot = self
            .ledger
            .progress(item)
            .ok_or(AttuneError::UnknownItem(item))?;
        if !snapshot.ready {
            return Err(AttuneError::NotReady { item });
        }
        if let Some(missing) = self
            .ledger
            .prereq_requirements(item)
            .and_then(|reqs| reqs.first_unmet(|i| self.is_mastered(i)))
        {
            return Err(AttuneError::PrerequisiteNotMet { item, missing });
        }
        if !self.host.actor_has_item(item) && !self.host.grant_item(item) {
            warn!(%item, "host refused unlock grant");
            return Err(AttuneError::GrantRefused(item));
        }
        self.overlay.mark_mastered(item);
        self.ledger.mark_unlocked(item);
        self.ledger.clear_target_for_item(item);
        info!(%item, "item unlocked");
        self.emit(&EngineEvent::Unlocked { item });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queries & tuning
    // -----------------------------------------------------------------------

    /// Snapshot of one item's progress.
    #[must_use]
    pub fn progress(&self, item: ItemId) -> Option<ProgressSnapshot> {
        self.ledger.progress(item)
    }

    /// Progress fraction, 0 for unknown items.
    #[must_use]
    pub fn percent(&self, item: ItemId) -> f32 {
        self.ledger.percent(item)
    }

    /// Every record, keyed by item.
    #[must_use]
    pub fn export_progress(&self) -> HashMap<ItemId, ProgressSnapshot> {
        self.ledger.export_progress()
    }

    /// JSON progress export for UI collaborators.
    ///
    /// # Errors
    /// Returns `AttuneError::Serialization` on encoding failure.
    pub fn export_progress_json(&self) -> Result<String> {
        self.ledger.export_progress_json()
    }

    /// Stepped effectiveness for an item (1.0 when untracked).
    #[must_use]
    pub fn effectiveness(&self, item: ItemId) -> f32 {
        self.overlay.calculate_effectiveness(item)
    }

    /// Override an item's XP requirement.
    pub fn set_required_xp(&self, item: ItemId, required: f32) {
        self.ledger.set_required_xp(item, required);
    }

    /// XP required for an item.
    #[must_use]
    pub fn required_xp_for(&self, item: ItemId) -> f32 {
        self.ledger.required_xp_for(item)
    }

    /// Register a custom XP source.
    pub fn register_source(
        &self,
        id: SourceId,
        display_name: impl Into<String>,
        multiplier: f32,
        cap: f32,
    ) -> bool {
        self.ledger.register_source(id, display_name, multiplier, cap)
    }

    /// Wipe all progression state (revert / explicit clear).
    pub fn clear_all(&self) {
        self.ledger.clear_all();
        self.overlay.clear_all();
    }

    // -----------------------------------------------------------------------
    // Text-facing wrappers
    // -----------------------------------------------------------------------

    /// Hex-string variant of [`Self::add_sourced_xp`] for script bridges.
    /// Malformed IDs log and apply nothing.
    pub fn add_sourced_xp_hex(&self, item_hex: &str, amount: f32, source_name: &str) -> f32 {
        match ItemId::parse_hex(item_hex) {
            Some(item) => self.add_sourced_xp(item, amount, &XpSource::from_name(source_name)),
            None => {
                warn!(item = item_hex, "malformed item ID, XP ignored");
                0.0
            }
        }
    }

    /// Hex-string variant of [`Self::set_learning_target`].
    pub fn set_learning_target_hex(&self, category: &str, item_hex: &str) -> bool {
        match ItemId::parse_hex(item_hex) {
            Some(item) => self.set_learning_target(Category::new(category), item, Vec::new()),
            None => {
                warn!(item = item_hex, "malformed item ID, target not set");
                false
            }
        }
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Serialize all state into `slot`.
    ///
    /// # Errors
    /// Returns database errors from the store.
    pub fn save(&self, store: &SaveStore, slot: &str) -> Result<()> {
        let (targets, progress) = self.ledger.save_state();
        let mut early: Vec<ItemId> = self.overlay.tracked_snapshot().into_iter().collect();
        early.sort();
        let bytes = persistence::encode(&SaveData {
            targets,
            progress,
            early,
        });
        store.put(slot, &bytes)?;
        self.counters.saves_completed.fetch_add(1, Ordering::Relaxed);
        info!(slot, bytes = bytes.len(), "state saved");
        Ok(())
    }

    /// Restore state from `slot`, translating persisted IDs through
    /// `remap`. Returns `false` if the slot does not exist. Existing
    /// progress state is cleared first; registered sources and prerequisite
    /// definitions survive (they belong to the session, not the save).
    ///
    /// # Errors
    /// Returns database errors from the store, or `CorruptSave` when the
    /// payload's frame structure is unreadable.
    pub fn load(
        &self,
        store: &SaveStore,
        slot: &str,
        remap: impl Fn(ItemId) -> Option<ItemId>,
    ) -> Result<bool> {
        let Some(bytes) = store.get(slot)? else {
            return Ok(false);
        };
        let data = persistence::decode(&bytes, remap)?;
        self.ledger.clear_progress_state();
        self.ledger.restore(data.targets, data.progress);
        self.overlay.restore_tracked(data.early.into_iter().collect());
        self.overlay.refresh_all_displays();
        self.counters.loads_completed.fetch_add(1, Ordering::Relaxed);
        info!(slot, "state loaded");
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
