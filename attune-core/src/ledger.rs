//! The progression ledger: per-item XP records, learning targets, custom
//! source registry, prerequisite storage.
//!
//! The ledger owns no display or grant behavior. Award paths return an
//! [`XpTransition`] describing what moved; the engine facade turns threshold
//! crossings into overlay and host actions.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use crate::config::{EarlyLearningConfig, XpConfig};
use crate::host::ItemCatalog;
use crate::metrics::EngineCounters;
use crate::prereq::PrereqRequirements;
use crate::progress::ProgressRecord;
use crate::types::{Category, ItemId, LearningMode, ProgressSnapshot, SourceId, Tier, XpSource};

// ---------------------------------------------------------------------------
// Transition
// ---------------------------------------------------------------------------

/// The observable result of one XP mutation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct XpTransition {
    /// The item that moved.
    pub item: ItemId,
    /// XP actually applied after multipliers and caps.
    pub applied: f32,
    /// Progress fraction before the mutation.
    pub old_percent: f32,
    /// Progress fraction after the mutation.
    pub new_percent: f32,
}

impl XpTransition {
    /// Whether this transition moved progress upward across `threshold`
    /// (a fraction in [0, 1]).
    #[must_use]
    pub fn crossed_up(&self, threshold: f32) -> bool {
        self.old_percent < threshold && self.new_percent >= threshold
    }
}

/// Result of changing a learning target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetChange {
    /// Targets displaced by this change (old target of the category, plus
    /// every other category's target in single mode).
    pub displaced: Vec<ItemId>,
    /// The newly installed target.
    pub new_target: ItemId,
}

/// A registered custom XP source.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomSource {
    /// Human-readable name for logs and UI.
    pub display_name: String,
    /// Multiplier applied to incoming XP from this source.
    pub multiplier: f32,
    /// Contribution cap, percent of the item's required XP.
    pub cap: f32,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct LedgerState {
    records: HashMap<ItemId, ProgressRecord>,
    targets: HashMap<Category, ItemId>,
    direct_prereqs: HashMap<ItemId, Vec<ItemId>>,
    prereqs: HashMap<ItemId, PrereqRequirements>,
    custom_sources: HashMap<SourceId, CustomSource>,
}

/// Thread-safe XP ledger. One per tracked actor.
pub struct ProgressLedger {
    state: RwLock<LedgerState>,
    config: RwLock<XpConfig>,
    catalog: Arc<dyn ItemCatalog>,
    counters: Arc<EngineCounters>,
}

impl ProgressLedger {
    /// Create a ledger over the given catalog.
    #[must_use]
    pub fn new(
        config: XpConfig,
        catalog: Arc<dyn ItemCatalog>,
        counters: Arc<EngineCounters>,
    ) -> Self {
        Self {
            state: RwLock::new(LedgerState::default()),
            config: RwLock::new(config),
            catalog,
            counters,
        }
    }

    /// Replace the XP tuning (config reload).
    pub fn set_config(&self, config: XpConfig) {
        *self.config.write() = config;
    }

    // -----------------------------------------------------------------------
    // Custom sources
    // -----------------------------------------------------------------------

    /// Register a custom XP source. Returns `false` if the ID was already
    /// registered; existing registrations are never overwritten.
    pub fn register_source(
        &self,
        id: SourceId,
        display_name: impl Into<String>,
        multiplier: f32,
        cap: f32,
    ) -> bool {
        let mut state = self.state.write();
        if state.custom_sources.contains_key(&id) {
            return false;
        }
        debug!(source = %id, multiplier, cap, "registered custom XP source");
        state.custom_sources.insert(
            id,
            CustomSource {
                display_name: display_name.into(),
                multiplier,
                cap,
            },
        );
        true
    }

    /// Registered custom sources, cloned.
    #[must_use]
    pub fn custom_sources(&self) -> HashMap<SourceId, CustomSource> {
        self.state.read().custom_sources.clone()
    }

    // -----------------------------------------------------------------------
    // XP award
    // -----------------------------------------------------------------------

    /// Award XP from a source. Applies the global and per-source multipliers,
    /// clamps capped sources to their remaining headroom, accumulates, and
    /// recomputes progress.
    ///
    /// Returns `None` when nothing happened (sentinel item, non-positive
    /// amount, fully mastered item).
    pub fn add_sourced_xp(
        &self,
        item: ItemId,
        amount: f32,
        source: &XpSource,
    ) -> Option<XpTransition> {
        if item.is_none() || amount <= 0.0 {
            return None;
        }
        let config = self.config.read().clone();
        let mut state = self.state.write();

        // Unknown custom sources self-register with defaults.
        if let XpSource::Custom(id) = source {
            if !state.custom_sources.contains_key(id) {
                warn!(source = %id, "XP from unregistered source, registering with defaults");
                state.custom_sources.insert(
                    id.clone(),
                    CustomSource {
                        display_name: id.as_str().to_string(),
                        multiplier: config.custom_default_multiplier,
                        cap: config.custom_default_cap,
                    },
                );
            }
        }

        let (multiplier, cap) = match source {
            XpSource::Any => (config.multiplier_any, Some(config.cap_any)),
            XpSource::School => (config.multiplier_school, Some(config.cap_school)),
            XpSource::Direct => (config.multiplier_direct, Some(config.cap_direct)),
            // Self use shares the direct multiplier and is never capped.
            XpSource::SelfUse => (config.multiplier_direct, None),
            XpSource::Custom(id) => {
                let custom = &state.custom_sources[id];
                (custom.multiplier, Some(custom.cap))
            }
        };

        let required = Self::required_for_locked(&state, &self.catalog, &config, item);
        let record = state
            .records
            .entry(item)
            .or_insert_with(|| ProgressRecord::new(required));
        if record.fully_mastered() {
            trace!(%item, "XP ignored, already mastered");
            return None;
        }
        if record.required_xp <= 0.0 {
            warn!(%item, "required XP is zero, holding progress");
            return None;
        }

        let adjusted = amount * config.global_multiplier * multiplier;
        let applied = match cap {
            Some(cap_percent) => {
                let ceiling = record.required_xp * cap_percent / 100.0;
                let headroom = (ceiling - record.source_total(source)).max(0.0);
                adjusted.min(headroom)
            }
            None => adjusted,
        };
        if applied <= 0.0 {
            trace!(%item, source = %source, "XP fully absorbed by source cap");
            return None;
        }

        record.add_to_source(source, applied);
        let (old_percent, new_percent) = record.recompute_percent();
        self.counters
            .xp_awards
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        trace!(
            %item,
            source = %source,
            amount,
            applied,
            old_percent,
            new_percent,
            "XP applied"
        );
        Some(XpTransition {
            item,
            applied,
            old_percent,
            new_percent,
        })
    }

    /// Uncapped, unsourced XP award (external API path). Clamped to the
    /// remaining XP so one call cannot overshoot the requirement, attributed
    /// to the self accumulator.
    pub fn add_raw_xp(&self, item: ItemId, amount: f32) -> Option<XpTransition> {
        if item.is_none() || amount <= 0.0 {
            return None;
        }
        let config = self.config.read().clone();
        let mut state = self.state.write();
        let required = Self::required_for_locked(&state, &self.catalog, &config, item);
        let record = state
            .records
            .entry(item)
            .or_insert_with(|| ProgressRecord::new(required));
        if record.fully_mastered() {
            return None;
        }
        let remaining = (record.required_xp * (1.0 - record.percent)).max(0.0);
        let applied = amount.min(remaining);
        if applied <= 0.0 {
            return None;
        }
        record.add_to_source(&XpSource::SelfUse, applied);
        let (old_percent, new_percent) = record.recompute_percent();
        self.counters
            .xp_awards
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Some(XpTransition {
            item,
            applied,
            old_percent,
            new_percent,
        })
    }

    /// Set an item's accumulated XP to an absolute value (console / dev
    /// path). Resets the accumulators, so progress may move backwards here
    /// and only here.
    pub fn set_item_xp(&self, item: ItemId, xp: f32) -> Option<XpTransition> {
        if item.is_none() || xp < 0.0 {
            return None;
        }
        let config = self.config.read().clone();
        let mut state = self.state.write();
        let required = Self::required_for_locked(&state, &self.catalog, &config, item);
        let record = state
            .records
            .entry(item)
            .or_insert_with(|| ProgressRecord::new(required));
        let old_percent = record.percent;
        record.xp_any = 0.0;
        record.xp_school = 0.0;
        record.xp_direct = 0.0;
        record.xp_self = xp;
        record.xp_custom.clear();
        record.percent = (xp / record.required_xp).clamp(0.0, 1.0);
        let new_percent = record.percent;
        debug!(%item, xp, old_percent, new_percent, "item XP set directly");
        Some(XpTransition {
            item,
            applied: xp,
            old_percent,
            new_percent,
        })
    }

    // -----------------------------------------------------------------------
    // Use events
    // -----------------------------------------------------------------------

    /// Route a use event to the active learning targets.
    ///
    /// For each target the used item is classified as self, direct, school or
    /// any; the self-use rail and the early-grant self bonus are applied;
    /// `boost` supplies the host's study-material multiplier per target.
    /// Single mode stops after the first target processed.
    pub fn on_use(
        &self,
        used_category: &Category,
        used_item: ItemId,
        base_xp: f32,
        early: &EarlyLearningConfig,
        is_early_tracked: impl Fn(ItemId) -> bool,
        boost: impl Fn(ItemId) -> f32,
    ) -> Vec<XpTransition> {
        if used_item.is_none() || base_xp <= 0.0 {
            return Vec::new();
        }
        let (mode, targets) = {
            let config = self.config.read();
            let state = self.state.read();
            let targets: Vec<(Category, ItemId, Vec<ItemId>)> = state
                .targets
                .iter()
                .map(|(category, &target)| {
                    let direct = state
                        .direct_prereqs
                        .get(&target)
                        .cloned()
                        .unwrap_or_default();
                    (category.clone(), target, direct)
                })
                .collect();
            (config.learning_mode, targets)
        };

        let mut transitions = Vec::new();
        for (target_category, target, direct) in targets {
            let source = if used_item == target {
                XpSource::SelfUse
            } else if direct.contains(&used_item) {
                XpSource::Direct
            } else if *used_category == target_category {
                XpSource::School
            } else {
                XpSource::Any
            };

            // Past the rail only self use counts.
            if source != XpSource::SelfUse {
                let percent = self
                    .state
                    .read()
                    .records
                    .get(&target)
                    .map_or(0.0, |r| r.percent);
                if percent >= early.self_use_required_at / 100.0 {
                    trace!(%target, "past self-use rail, non-self XP ignored");
                    if mode == LearningMode::Single {
                        break;
                    }
                    continue;
                }
            }

            let mut xp = base_xp * boost(target);
            if source == XpSource::SelfUse && is_early_tracked(target) {
                xp *= early.self_use_xp_multiplier;
            }

            if let Some(transition) = self.add_sourced_xp(target, xp, &source) {
                transitions.push(transition);
            }
            if mode == LearningMode::Single {
                break;
            }
        }
        transitions
    }

    // -----------------------------------------------------------------------
    // Learning targets
    // -----------------------------------------------------------------------

    /// Install a learning target for a category.
    ///
    /// `direct_prereqs` is the list used for direct-source classification of
    /// future use events. In single mode every other category's target is
    /// displaced. Returns the displaced targets so the caller can unwind
    /// their early grants.
    pub fn set_learning_target(
        &self,
        category: Category,
        item: ItemId,
        direct_prereqs: Vec<ItemId>,
    ) -> Option<TargetChange> {
        if item.is_none() {
            return None;
        }
        let mode = self.config.read().learning_mode;
        let mut state = self.state.write();
        let mut displaced = Vec::new();

        if mode == LearningMode::Single {
            for (other_category, &other) in &state.targets {
                if *other_category != category && other != item {
                    displaced.push(other);
                }
            }
            state.targets.retain(|key, _| *key == category);
        }
        if let Some(&old) = state.targets.get(&category) {
            if old != item {
                displaced.push(old);
            }
        }
        state.targets.insert(category.clone(), item);
        state.direct_prereqs.insert(item, direct_prereqs);
        debug!(%category, %item, ?displaced, "learning target set");
        Some(TargetChange {
            displaced,
            new_target: item,
        })
    }

    /// The active target for a category.
    #[must_use]
    pub fn learning_target(&self, category: &Category) -> Option<ItemId> {
        self.state.read().targets.get(category).copied()
    }

    /// Remove a category's target. Returns the removed item.
    pub fn clear_learning_target(&self, category: &Category) -> Option<ItemId> {
        let mut state = self.state.write();
        let removed = state.targets.remove(category);
        if let Some(item) = removed {
            state.direct_prereqs.remove(&item);
            debug!(%category, %item, "learning target cleared");
        }
        removed
    }

    /// Remove the target entry pointing at `item`, whichever category holds
    /// it. Used when an item masters out.
    pub fn clear_target_for_item(&self, item: ItemId) -> bool {
        let mut state = self.state.write();
        let owner = state
            .targets
            .iter()
            .find(|&(_, &target)| target == item)
            .map(|(category, _)| category.clone());
        if let Some(category) = owner {
            state.targets.remove(&category);
            state.direct_prereqs.remove(&item);
            debug!(%category, %item, "target cleared after completion");
            true
        } else {
            false
        }
    }

    /// All active targets, cloned.
    #[must_use]
    pub fn all_targets(&self) -> HashMap<Category, ItemId> {
        self.state.read().targets.clone()
    }

    // -----------------------------------------------------------------------
    // Prerequisites
    // -----------------------------------------------------------------------

    /// Store unlock requirements for an item.
    pub fn set_prereq_requirements(&self, item: ItemId, reqs: PrereqRequirements) {
        if item.is_none() {
            return;
        }
        self.state.write().prereqs.insert(item, reqs);
    }

    /// Stored requirements, if any. Absent means root item.
    #[must_use]
    pub fn prereq_requirements(&self, item: ItemId) -> Option<PrereqRequirements> {
        self.state.read().prereqs.get(&item).cloned()
    }

    /// Whether the item's requirements are met under the given mastery test.
    pub fn are_prereqs_met(&self, item: ItemId, is_mastered: impl Fn(ItemId) -> bool) -> bool {
        self.prereq_requirements(item)
            .is_none_or(|reqs| reqs.is_met(is_mastered))
    }

    /// Hard prerequisites still missing.
    pub fn unmet_hard_prereqs(
        &self,
        item: ItemId,
        is_mastered: impl Fn(ItemId) -> bool,
    ) -> Vec<ItemId> {
        self.prereq_requirements(item)
            .map(|reqs| reqs.unmet_hard(is_mastered))
            .unwrap_or_default()
    }

    /// `(mastered, needed)` over the item's soft pool.
    pub fn soft_prereq_status(
        &self,
        item: ItemId,
        is_mastered: impl Fn(ItemId) -> bool,
    ) -> (usize, usize) {
        self.prereq_requirements(item)
            .map_or((0, 0), |reqs| reqs.soft_status(is_mastered))
    }

    // -----------------------------------------------------------------------
    // Queries & tuning
    // -----------------------------------------------------------------------

    /// Snapshot of one item's progress.
    #[must_use]
    pub fn progress(&self, item: ItemId) -> Option<ProgressSnapshot> {
        self.state.read().records.get(&item).map(ProgressRecord::snapshot)
    }

    /// Progress fraction, 0 for unknown items.
    #[must_use]
    pub fn percent(&self, item: ItemId) -> f32 {
        self.state.read().records.get(&item).map_or(0.0, |r| r.percent)
    }

    /// Whether the record itself is finished (unlocked or at 100%). The
    /// engine widens this with host possession.
    #[must_use]
    pub fn is_progress_mastered(&self, item: ItemId) -> bool {
        self.state
            .read()
            .records
            .get(&item)
            .is_some_and(ProgressRecord::fully_mastered)
    }

    /// Mark an item unlocked. Returns `false` for unknown items.
    pub fn mark_unlocked(&self, item: ItemId) -> bool {
        let mut state = self.state.write();
        match state.records.get_mut(&item) {
            Some(record) => {
                record.unlocked = true;
                true
            }
            None => false,
        }
    }

    /// Snapshot every record, keyed by item.
    #[must_use]
    pub fn export_progress(&self) -> HashMap<ItemId, ProgressSnapshot> {
        self.state
            .read()
            .records
            .iter()
            .map(|(&item, record)| (item, record.snapshot()))
            .collect()
    }

    /// JSON export for UI collaborators, keyed by padded hex ID.
    ///
    /// # Errors
    /// Returns `AttuneError::Serialization` if encoding fails.
    pub fn export_progress_json(&self) -> crate::error::Result<String> {
        let by_hex: HashMap<String, ProgressSnapshot> = self
            .export_progress()
            .into_iter()
            .map(|(item, snapshot)| (item.to_string(), snapshot))
            .collect();
        serde_json::to_string(&by_hex)
            .map_err(|e| crate::AttuneError::Serialization(e.to_string()))
    }

    /// Override an item's XP requirement. Values below 1.0 are clamped with
    /// a warning.
    pub fn set_required_xp(&self, item: ItemId, required: f32) {
        if item.is_none() {
            return;
        }
        let clamped = if required < 1.0 {
            warn!(%item, required, "required XP below 1.0, clamping");
            1.0
        } else {
            required
        };
        let config = self.config.read().clone();
        let mut state = self.state.write();
        let seed = Self::required_for_locked(&state, &self.catalog, &config, item);
        let record = state
            .records
            .entry(item)
            .or_insert_with(|| ProgressRecord::new(seed));
        record.required_xp = clamped;
    }

    /// XP required for an item: its record, else the tier table, else the
    /// novice default.
    #[must_use]
    pub fn required_xp_for(&self, item: ItemId) -> f32 {
        let config = self.config.read().clone();
        let state = self.state.read();
        Self::required_for_locked(&state, &self.catalog, &config, item)
    }

    fn required_for_locked(
        state: &LedgerState,
        catalog: &Arc<dyn ItemCatalog>,
        config: &XpConfig,
        item: ItemId,
    ) -> f32 {
        if let Some(record) = state.records.get(&item) {
            return record.required_xp;
        }
        let tier = catalog.tier_of(item).unwrap_or(Tier::Novice);
        config.tier_xp.for_tier(tier).max(1.0)
    }

    /// Wholesale wipe: records, targets, prerequisites, custom sources.
    pub fn clear_all(&self) {
        let mut state = self.state.write();
        *state = LedgerState::default();
        debug!("ledger cleared");
    }

    /// Wipe progress records and targets but keep registered custom sources
    /// and prerequisite definitions (load path: collaborators register once
    /// per session, not per save).
    pub fn clear_progress_state(&self) {
        let mut state = self.state.write();
        state.records.clear();
        state.targets.clear();
        state.direct_prereqs.clear();
        debug!("progress state cleared");
    }

    // -----------------------------------------------------------------------
    // Persistence support
    // -----------------------------------------------------------------------

    /// Raw state for the save codec: targets plus per-record
    /// `(item, percent, unlocked, custom accumulators)`.
    #[must_use]
    #[allow(clippy::type_complexity)]
    pub fn save_state(
        &self,
    ) -> (
        Vec<(Category, ItemId)>,
        Vec<(ItemId, f32, bool, Vec<(SourceId, f32)>)>,
    ) {
        let state = self.state.read();
        let targets = state
            .targets
            .iter()
            .map(|(category, &item)| (category.clone(), item))
            .collect();
        let mut progress: Vec<_> = state
            .records
            .iter()
            .map(|(&item, record)| {
                let mut custom: Vec<_> = record
                    .xp_custom
                    .iter()
                    .map(|(id, &xp)| (id.clone(), xp))
                    .collect();
                custom.sort_by(|a, b| a.0.cmp(&b.0));
                (item, record.percent, record.unlocked, custom)
            })
            .collect();
        progress.sort_by_key(|entry| entry.0);
        (targets, progress)
    }

    /// Merge loaded state into the ledger. Existing entries for the same
    /// items are replaced; everything else is left alone.
    pub fn restore(
        &self,
        targets: Vec<(Category, ItemId)>,
        progress: Vec<(ItemId, f32, bool, Vec<(SourceId, f32)>)>,
    ) {
        let config = self.config.read().clone();
        let mut state = self.state.write();
        for (category, item) in targets {
            state.targets.insert(category, item);
        }
        for (item, percent, unlocked, custom) in progress {
            let required = Self::required_for_locked(&state, &self.catalog, &config, item);
            let mut record = ProgressRecord::from_saved(required, percent, unlocked);
            for (id, xp) in custom {
                record.xp_custom.insert(id, xp);
            }
            state.records.insert(item, record);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    struct MapCatalog {
        tiers: Map<ItemId, Tier>,
    }

    impl ItemCatalog for MapCatalog {
        fn tier_of(&self, item: ItemId) -> Option<Tier> {
            self.tiers.get(&item).copied()
        }
        fn category_of(&self, _item: ItemId) -> Option<Category> {
            None
        }
    }

    fn ledger_with(config: XpConfig) -> ProgressLedger {
        let catalog = Arc::new(MapCatalog { tiers: Map::new() });
        ProgressLedger::new(config, catalog, Arc::new(EngineCounters::new()))
    }

    fn flat_config() -> XpConfig {
        // All multipliers 1.0 so test arithmetic stays readable.
        XpConfig {
            multiplier_any: 1.0,
            multiplier_school: 1.0,
            multiplier_direct: 1.0,
            ..XpConfig::default()
        }
    }

    #[test]
    fn capped_source_stops_at_headroom() {
        let ledger = ledger_with(XpConfig {
            cap_direct: 50.0,
            ..flat_config()
        });
        let item = ItemId(1);
        ledger.set_required_xp(item, 100.0);

        let t = ledger.add_sourced_xp(item, 80.0, &XpSource::Direct).unwrap();
        assert!((t.applied - 50.0).abs() < 1e-5);
        assert!((t.new_percent - 0.5).abs() < 1e-5);

        // Further direct XP is fully absorbed.
        assert!(ledger.add_sourced_xp(item, 10.0, &XpSource::Direct).is_none());
    }

    #[test]
    fn self_source_is_uncapped_and_masters() {
        let ledger = ledger_with(XpConfig {
            cap_direct: 50.0,
            ..flat_config()
        });
        let item = ItemId(1);
        ledger.set_required_xp(item, 100.0);
        ledger.add_sourced_xp(item, 80.0, &XpSource::Direct);

        let t = ledger.add_sourced_xp(item, 80.0, &XpSource::SelfUse).unwrap();
        assert!(t.crossed_up(1.0));
        assert_eq!(t.new_percent, 1.0);

        // Mastered records reject further XP.
        assert!(ledger.add_sourced_xp(item, 1.0, &XpSource::SelfUse).is_none());
    }

    #[test]
    fn unknown_custom_source_registers_with_defaults() {
        let ledger = ledger_with(flat_config());
        let item = ItemId(2);
        ledger.set_required_xp(item, 100.0);

        let source = XpSource::Custom(SourceId::new("festival"));
        let t = ledger.add_sourced_xp(item, 10.0, &source).unwrap();
        assert!(t.applied > 0.0);

        let sources = ledger.custom_sources();
        let registered = &sources[&SourceId::new("festival")];
        assert_eq!(registered.multiplier, 1.0);
        assert_eq!(registered.cap, 25.0);

        // Explicit registration does not overwrite.
        assert!(!ledger.register_source(SourceId::new("festival"), "Festival", 2.0, 50.0));
    }

    #[test]
    fn rejects_sentinel_and_nonpositive() {
        let ledger = ledger_with(flat_config());
        assert!(ledger.add_sourced_xp(ItemId::NONE, 10.0, &XpSource::Any).is_none());
        assert!(ledger.add_sourced_xp(ItemId(1), 0.0, &XpSource::Any).is_none());
        assert!(ledger.add_sourced_xp(ItemId(1), -5.0, &XpSource::Any).is_none());
    }

    #[test]
    fn on_use_classifies_sources() {
        let ledger = ledger_with(flat_config());
        let target = ItemId(10);
        let prereq = ItemId(11);
        let cousin = ItemId(12);
        let stranger = ItemId(13);
        ledger.set_required_xp(target, 1000.0);
        ledger.set_learning_target(Category::new("destruction"), target, vec![prereq]);

        let early = EarlyLearningConfig::default();
        let no_track = |_: ItemId| false;
        let no_boost = |_: ItemId| 1.0;

        ledger.on_use(&Category::new("destruction"), target, 10.0, &early, no_track, no_boost);
        ledger.on_use(&Category::new("destruction"), prereq, 10.0, &early, no_track, no_boost);
        ledger.on_use(&Category::new("destruction"), cousin, 10.0, &early, no_track, no_boost);
        ledger.on_use(&Category::new("alteration"), stranger, 10.0, &early, no_track, no_boost);

        let state = ledger.state.read();
        let record = &state.records[&target];
        assert!((record.xp_self - 10.0).abs() < 1e-5);
        assert!((record.xp_direct - 10.0).abs() < 1e-5);
        assert!((record.xp_school - 10.0).abs() < 1e-5);
        assert!((record.xp_any - 10.0).abs() < 1e-5);
    }

    #[test]
    fn self_use_rail_blocks_other_sources() {
        let ledger = ledger_with(flat_config());
        let target = ItemId(10);
        ledger.set_required_xp(target, 100.0);
        ledger.set_learning_target(Category::new("conjuration"), target, vec![]);
        ledger.set_item_xp(target, 80.0); // past the 75% rail

        let early = EarlyLearningConfig::default();
        let transitions = ledger.on_use(
            &Category::new("conjuration"),
            ItemId(99),
            10.0,
            &early,
            |_| false,
            |_| 1.0,
        );
        assert!(transitions.is_empty());

        // Self use still lands.
        let transitions = ledger.on_use(
            &Category::new("conjuration"),
            target,
            10.0,
            &early,
            |_| false,
            |_| 1.0,
        );
        assert_eq!(transitions.len(), 1);
    }

    #[test]
    fn early_tracked_self_use_gets_bonus() {
        let ledger = ledger_with(flat_config());
        let target = ItemId(10);
        ledger.set_required_xp(target, 1000.0);
        ledger.set_learning_target(Category::new("illusion"), target, vec![]);

        let early = EarlyLearningConfig::default(); // 1.5x self bonus
        let transitions = ledger.on_use(
            &Category::new("illusion"),
            target,
            10.0,
            &early,
            |_| true,
            |_| 1.0,
        );
        assert!((transitions[0].applied - 15.0).abs() < 1e-5);
    }

    #[test]
    fn single_mode_displaces_other_categories() {
        let ledger = ledger_with(XpConfig {
            learning_mode: LearningMode::Single,
            ..flat_config()
        });
        ledger.set_learning_target(Category::new("a"), ItemId(1), vec![]);
        let change = ledger
            .set_learning_target(Category::new("b"), ItemId(2), vec![])
            .unwrap();
        assert_eq!(change.displaced, vec![ItemId(1)]);
        assert!(ledger.learning_target(&Category::new("a")).is_none());
        assert_eq!(ledger.learning_target(&Category::new("b")), Some(ItemId(2)));
    }

    #[test]
    fn per_category_targets_are_independent() {
        let ledger = ledger_with(flat_config());
        ledger.set_learning_target(Category::new("a"), ItemId(1), vec![]);
        ledger.set_learning_target(Category::new("b"), ItemId(2), vec![]);
        assert_eq!(ledger.all_targets().len(), 2);

        assert!(ledger.clear_target_for_item(ItemId(1)));
        assert!(ledger.learning_target(&Category::new("a")).is_none());
        assert_eq!(ledger.learning_target(&Category::new("b")), Some(ItemId(2)));
    }

    #[test]
    fn json_export_keys_by_padded_hex() {
        let ledger = ledger_with(flat_config());
        let item = ItemId(0xAB);
        ledger.set_required_xp(item, 100.0);
        ledger.add_sourced_xp(item, 40.0, &XpSource::SelfUse);

        let json = ledger.export_progress_json().unwrap();
        let parsed: Map<String, ProgressSnapshot> = serde_json::from_str(&json).unwrap();
        let snapshot = &parsed["000000AB"];
        assert!((snapshot.percent - 0.4).abs() < 1e-5);
        assert!((snapshot.required - 100.0).abs() < 1e-5);
        assert!(!snapshot.unlocked);
        assert!(!snapshot.ready);
    }

    #[test]
    fn required_xp_clamps_below_one() {
        let ledger = ledger_with(flat_config());
        ledger.set_required_xp(ItemId(5), 0.0);
        assert_eq!(ledger.required_xp_for(ItemId(5)), 1.0);
    }

    #[test]
    fn required_xp_falls_back_to_tier_table() {
        let mut tiers = Map::new();
        tiers.insert(ItemId(7), Tier::Expert);
        let catalog = Arc::new(MapCatalog { tiers });
        let ledger = ProgressLedger::new(
            XpConfig::default(),
            catalog,
            Arc::new(EngineCounters::new()),
        );
        assert_eq!(ledger.required_xp_for(ItemId(7)), 550.0);
        assert_eq!(ledger.required_xp_for(ItemId(8)), 100.0); // unknown -> novice
    }

    #[test]
    fn raw_xp_clamps_to_remaining() {
        let ledger = ledger_with(flat_config());
        let item = ItemId(3);
        ledger.set_required_xp(item, 100.0);
        ledger.set_item_xp(item, 90.0);

        let t = ledger.add_raw_xp(item, 50.0).unwrap();
        assert!((t.applied - 10.0).abs() < 1e-5);
        assert_eq!(t.new_percent, 1.0);
    }

    #[test]
    fn save_state_round_trips_through_restore() {
        let ledger = ledger_with(flat_config());
        let item = ItemId(4);
        ledger.set_required_xp(item, 100.0);
        ledger.add_sourced_xp(item, 30.0, &XpSource::Custom(SourceId::new("ruins")));
        ledger.set_learning_target(Category::new("restoration"), item, vec![]);

        let (targets, progress) = ledger.save_state();

        let fresh = ledger_with(flat_config());
        fresh.restore(targets, progress);
        assert_eq!(
            fresh.learning_target(&Category::new("restoration")),
            Some(item)
        );
        let snapshot = fresh.progress(item).unwrap();
        assert!((snapshot.percent - 0.25).abs() < 1e-5); // 30 capped at 25
    }

    #[test]
    fn prereq_ops_delegate_to_requirements() {
        let ledger = ledger_with(flat_config());
        let item = ItemId(20);
        ledger.set_prereq_requirements(
            item,
            PrereqRequirements::n_of(vec![ItemId(1), ItemId(2), ItemId(3)], 2),
        );
        assert!(!ledger.are_prereqs_met(item, |i| i == ItemId(1)));
        assert!(ledger.are_prereqs_met(item, |i| i == ItemId(1) || i == ItemId(3)));
        assert_eq!(ledger.soft_prereq_status(item, |i| i == ItemId(1)), (1, 2));
        // No stored requirements = root item.
        assert!(ledger.are_prereqs_met(ItemId(21), |_| false));
    }
}
