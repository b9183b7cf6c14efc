//! Core type definitions for the attune progression engine.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

/// Stable numeric identifier for a catalog item (a learnable ability, recipe,
/// technique — whatever the host tracks progress against).
///
/// `ItemId(0)` is reserved as "no item" and rejected by all award paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub u32);

impl ItemId {
    /// The reserved "no item" sentinel.
    pub const NONE: Self = Self(0);

    /// Whether this is the reserved sentinel.
    #[must_use]
    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Parse a hex item ID string (with or without a `0x` prefix).
    ///
    /// Returns `None` on malformed input — callers log and treat the
    /// operation as a no-op, they never panic.
    #[must_use]
    pub fn parse_hex(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        u32::from_str_radix(digits, 16).ok().map(Self)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}", self.0)
    }
}

/// A grouping of items used for per-category learning targets and
/// same-category XP classification (e.g. a school of magic).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Category(String);

impl Category {
    /// Create a category from any string-like value.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The category name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Category {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Registry key for a custom (externally registered) XP source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceId(String);

impl SourceId {
    /// Create a source ID from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The source identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// XP Sources
// ---------------------------------------------------------------------------

/// Why XP was awarded. The four built-ins carry their own multiplier/cap
/// settings; custom sources go through the runtime registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum XpSource {
    /// Unrelated action (different category from the target).
    Any,
    /// Same category as the target but not a listed direct prerequisite.
    School,
    /// Using an item listed as a direct prerequisite of the target.
    Direct,
    /// Using the learning target itself. Uncapped — this is the only source
    /// that can carry an item all the way to mastery.
    SelfUse,
    /// An externally registered source (another mod, a quest script, ...).
    Custom(SourceId),
}

impl XpSource {
    /// Stable label for logs and events.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Any => "any",
            Self::School => "school",
            Self::Direct => "direct",
            Self::SelfUse => "self",
            Self::Custom(id) => id.as_str(),
        }
    }

    /// Map a source name onto the closed built-in set, falling back to
    /// `Custom` for anything unrecognized.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "any" => Self::Any,
            "school" => Self::School,
            "direct" => Self::Direct,
            "self" => Self::SelfUse,
            other => Self::Custom(SourceId::new(other)),
        }
    }
}

impl fmt::Display for XpSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Tiers
// ---------------------------------------------------------------------------

/// Item tier, used to seed `required_xp` when no explicit value is supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Entry-level content.
    Novice,
    /// Second tier.
    Apprentice,
    /// Mid tier.
    Adept,
    /// High tier.
    Expert,
    /// Top tier.
    Master,
}

impl Tier {
    /// Case-insensitive tier lookup, defaulting to `Novice` for unknown
    /// names (mirrors the catalog scanner's fallback behavior).
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "apprentice" => Self::Apprentice,
            "adept" => Self::Adept,
            "expert" => Self::Expert,
            "master" => Self::Master,
            _ => Self::Novice,
        }
    }
}

// ---------------------------------------------------------------------------
// Learning Mode
// ---------------------------------------------------------------------------

/// How many learning targets may be active at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningMode {
    /// One target globally; setting a new target clears every other
    /// category's target.
    Single,
    /// One target per category, each progressing independently.
    PerCategory,
}

// ---------------------------------------------------------------------------
// Power Steps
// ---------------------------------------------------------------------------

/// One entry of the stepped power curve: once progress crosses
/// `threshold` percent, the item operates at `effectiveness`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerStep {
    /// Progress percent (0–100) at which this step is reached.
    pub threshold: f32,
    /// Effectiveness multiplier at this step (0.0–1.0).
    pub effectiveness: f32,
    /// Display label, e.g. "Budding".
    pub label: String,
}

impl PowerStep {
    /// Convenience constructor.
    #[must_use]
    pub fn new(threshold: f32, effectiveness: f32, label: impl Into<String>) -> Self {
        Self {
            threshold,
            effectiveness,
            label: label.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Effects
// ---------------------------------------------------------------------------

/// How an effect responds to partial effectiveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    /// Magnitude scales meaningfully (damage, healing, buffs).
    Gradable,
    /// All-or-nothing (paralysis-like, invisibility-like). A fractional
    /// magnitude is meaningless, so these are gated, never scaled.
    Binary,
}

/// A single effect application delivered by the host's dispatch, mutated in
/// place by the scaling hook.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedEffect {
    /// The item that owns this effect.
    pub item: ItemId,
    /// Effect strength. The only field scaling ever touches.
    pub magnitude: f32,
    /// Effect duration in host units. Never modified.
    pub duration: f32,
    /// Gradable or binary.
    pub kind: EffectKind,
    /// Whether the tracked actor cast this effect. Events from other actors
    /// are never scaled.
    pub cast_by_tracked_actor: bool,
}

/// What the scaling hook did to an [`AppliedEffect`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalingOutcome {
    /// Effect left untouched (untracked item, feature off, foreign caster,
    /// or a binary effect past its gate).
    Untouched,
    /// Magnitude multiplied by the stepped effectiveness.
    Scaled {
        /// The multiplier that was applied.
        effectiveness: f32,
    },
    /// Binary effect below its gate — magnitude forced to zero.
    Suppressed,
}

// ---------------------------------------------------------------------------
// Progress Snapshot
// ---------------------------------------------------------------------------

/// Read-only view of one item's progress, exported to UI collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Current accumulated XP.
    pub xp: f32,
    /// XP required for full progress.
    pub required: f32,
    /// Progress fraction in [0, 1].
    pub percent: f32,
    /// Whether the item has been fully unlocked.
    pub unlocked: bool,
    /// Progress complete but not yet unlocked (awaiting prerequisites or the
    /// privileged grant).
    pub ready: bool,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
