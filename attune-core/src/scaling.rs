//! The single per-effect entry point the host's dispatch calls.

use std::sync::Arc;

use crate::overlay::EffectivenessOverlay;
use crate::types::{AppliedEffect, ScalingOutcome};

/// Scales effect applications for the tracked actor.
///
/// The host calls [`ScalingHook::on_effect_applied`] once per effect
/// application, from whatever thread its dispatch runs on. The hook filters
/// out foreign casters, then hands the event to the overlay's fast path.
pub struct ScalingHook {
    overlay: Arc<EffectivenessOverlay>,
}

impl ScalingHook {
    /// Create a hook over the given overlay.
    #[must_use]
    pub fn new(overlay: Arc<EffectivenessOverlay>) -> Self {
        Self { overlay }
    }

    /// Scale one effect application in place.
    pub fn on_effect_applied(&self, effect: &mut AppliedEffect) -> ScalingOutcome {
        if !effect.cast_by_tracked_actor {
            return ScalingOutcome::Untouched;
        }
        self.overlay.apply_scaling(effect)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
