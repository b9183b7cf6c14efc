//! Host event pump.
//!
//! Real hosts produce a stream of gameplay events on their own threads.
//! [`HostBridge`] is the translation layer: it owns the engine handle and
//! the per-effect scaling hook and maps each [`HostEvent`] onto the right
//! engine call, so host code never touches engine internals.

use std::sync::Arc;

use tracing::debug;

use attune_core::{
    AppliedEffect, Category, ItemId, ProgressionEngine, ScalingHook, ScalingOutcome, XpSource,
};

/// A gameplay event the host reports to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// The tracked actor used an item.
    ItemUsed {
        /// Category of the used item.
        category: Category,
        /// The used item.
        item: ItemId,
        /// The host's XP valuation of the action.
        base_xp: f32,
    },
    /// The actor picked a new learning target.
    TargetSelected {
        /// Category the target belongs to.
        category: Category,
        /// The chosen target.
        item: ItemId,
        /// Items whose use counts as direct practice for this target.
        direct_prereqs: Vec<ItemId>,
    },
    /// The actor abandoned a category's learning target.
    TargetCleared {
        /// The category to clear.
        category: Category,
    },
    /// The actor asked to unlock a completed item.
    UnlockRequested {
        /// The item to unlock.
        item: ItemId,
    },
    /// A collaborator granted XP directly.
    XpGranted {
        /// The receiving item.
        item: ItemId,
        /// XP amount before multipliers.
        amount: f32,
        /// Source name, resolved through [`XpSource::from_name`].
        source: String,
    },
}

/// Owns the engine handle on the host side and routes events into it.
pub struct HostBridge {
    engine: Arc<ProgressionEngine>,
    hook: ScalingHook,
}

impl HostBridge {
    /// Wrap an engine.
    #[must_use]
    pub fn new(engine: Arc<ProgressionEngine>) -> Self {
        let hook = engine.scaling_hook();
        Self { engine, hook }
    }

    /// The wrapped engine.
    #[must_use]
    pub fn engine(&self) -> &Arc<ProgressionEngine> {
        &self.engine
    }

    /// Route one gameplay event.
    pub fn handle(&self, event: HostEvent) {
        debug!(?event, "host event");
        match event {
            HostEvent::ItemUsed {
                category,
                item,
                base_xp,
            } => self.engine.on_use(&category, item, base_xp),
            HostEvent::TargetSelected {
                category,
                item,
                direct_prereqs,
            } => {
                self.engine.set_learning_target(category, item, direct_prereqs);
            }
            HostEvent::TargetCleared { category } => {
                self.engine.clear_learning_target(&category);
            }
            HostEvent::UnlockRequested { item } => {
                self.engine.unlock(item);
            }
            HostEvent::XpGranted {
                item,
                amount,
                source,
            } => {
                self.engine
                    .add_sourced_xp(item, amount, &XpSource::from_name(&source));
            }
        }
    }

    /// Per-effect entry point for the host's effect dispatch. Called once
    /// per effect application, from any thread.
    pub fn on_effect_applied(&self, effect: &mut AppliedEffect) -> ScalingOutcome {
        self.hook.on_effect_applied(effect)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
