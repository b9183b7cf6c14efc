//! Per-item progress records.

use std::collections::HashMap;

use crate::types::{ProgressSnapshot, SourceId, XpSource};

/// Progress state for a single item.
///
/// XP lands in per-source accumulators; `percent` is derived from their sum
/// over `required_xp` and is monotone non-decreasing: a record loaded from a
/// save carries its percent but not the accumulators, so recomputation never
/// drops below the stored value.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressRecord {
    /// XP required for full progress. Held ≥ 1.0 by all write paths.
    pub required_xp: f32,
    /// XP from unrelated actions.
    pub xp_any: f32,
    /// XP from same-category actions.
    pub xp_school: f32,
    /// XP from direct-prerequisite use.
    pub xp_direct: f32,
    /// XP from using the item itself. Uncapped.
    pub xp_self: f32,
    /// XP from registered custom sources.
    pub xp_custom: HashMap<SourceId, f32>,
    /// Derived progress fraction in [0, 1].
    pub percent: f32,
    /// Whether the item has been fully unlocked.
    pub unlocked: bool,
}

impl ProgressRecord {
    /// Fresh record with the given XP requirement.
    #[must_use]
    pub fn new(required_xp: f32) -> Self {
        Self {
            required_xp: required_xp.max(1.0),
            xp_any: 0.0,
            xp_school: 0.0,
            xp_direct: 0.0,
            xp_self: 0.0,
            xp_custom: HashMap::new(),
            percent: 0.0,
            unlocked: false,
        }
    }

    /// Record rebuilt from persisted state (percent known, accumulators not).
    #[must_use]
    pub fn from_saved(required_xp: f32, percent: f32, unlocked: bool) -> Self {
        let mut record = Self::new(required_xp);
        record.percent = percent.clamp(0.0, 1.0);
        record.unlocked = unlocked;
        record
    }

    /// Total XP accumulated in this record for the given source.
    #[must_use]
    pub fn source_total(&self, source: &XpSource) -> f32 {
        match source {
            XpSource::Any => self.xp_any,
            XpSource::School => self.xp_school,
            XpSource::Direct => self.xp_direct,
            XpSource::SelfUse => self.xp_self,
            XpSource::Custom(id) => self.xp_custom.get(id).copied().unwrap_or(0.0),
        }
    }

    /// Add XP to a source accumulator.
    pub fn add_to_source(&mut self, source: &XpSource, amount: f32) {
        match source {
            XpSource::Any => self.xp_any += amount,
            XpSource::School => self.xp_school += amount,
            XpSource::Direct => self.xp_direct += amount,
            XpSource::SelfUse => self.xp_self += amount,
            XpSource::Custom(id) => {
                *self.xp_custom.entry(id.clone()).or_insert(0.0) += amount;
            }
        }
    }

    /// Sum of all source accumulators.
    #[must_use]
    pub fn total_xp(&self) -> f32 {
        self.xp_any
            + self.xp_school
            + self.xp_direct
            + self.xp_self
            + self.xp_custom.values().sum::<f32>()
    }

    /// Recompute `percent` from the accumulators.
    ///
    /// Returns `(old, new)`. A `required_xp` of zero (only reachable through
    /// a corrupt save) leaves the percent unchanged; the caller warns.
    pub fn recompute_percent(&mut self) -> (f32, f32) {
        let old = self.percent;
        if self.required_xp <= 0.0 {
            return (old, old);
        }
        let from_xp = (self.total_xp() / self.required_xp).clamp(0.0, 1.0);
        self.percent = old.max(from_xp);
        (old, self.percent)
    }

    /// Whether this item is finished: explicitly unlocked or at 100%.
    #[must_use]
    pub fn fully_mastered(&self) -> bool {
        self.unlocked || self.percent >= 1.0
    }

    /// Progress is complete but the item has not been unlocked yet.
    #[must_use]
    pub fn ready(&self) -> bool {
        !self.unlocked && self.percent >= 1.0
    }

    /// Read-only export of this record.
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            xp: self.percent * self.required_xp,
            required: self.required_xp,
            percent: self.percent,
            unlocked: self.unlocked,
            ready: self.ready(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
