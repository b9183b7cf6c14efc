//! Lightweight runtime counters.
//!
//! Lock-free `AtomicU64` counters incremented on the hot paths and read on
//! demand for diagnostics. No histograms; the per-effect path cannot afford
//! them.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters for high-frequency engine events.
pub struct EngineCounters {
    /// XP award calls that applied a nonzero amount.
    pub xp_awards: AtomicU64,
    /// Early grants issued (first threshold crossings plus re-grants).
    pub early_grants: AtomicU64,
    /// Power step changes observed.
    pub step_changes: AtomicU64,
    /// Items fully mastered.
    pub masteries: AtomicU64,
    /// Effect events rejected without taking a lock.
    pub scaling_fast_rejects: AtomicU64,
    /// Gradable effects whose magnitude was scaled.
    pub scalings_applied: AtomicU64,
    /// Binary effects suppressed below the gate.
    pub binary_suppressed: AtomicU64,
    /// Save operations completed.
    pub saves_completed: AtomicU64,
    /// Load operations completed.
    pub loads_completed: AtomicU64,
}

impl EngineCounters {
    /// Create a new set of zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            xp_awards: AtomicU64::new(0),
            early_grants: AtomicU64::new(0),
            step_changes: AtomicU64::new(0),
            masteries: AtomicU64::new(0),
            scaling_fast_rejects: AtomicU64::new(0),
            scalings_applied: AtomicU64::new(0),
            binary_suppressed: AtomicU64::new(0),
            saves_completed: AtomicU64::new(0),
            loads_completed: AtomicU64::new(0),
        }
    }

    /// Snapshot all counters for export.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            xp_awards: self.xp_awards.load(Ordering::Relaxed),
            early_grants: self.early_grants.load(Ordering::Relaxed),
            step_changes: self.step_changes.load(Ordering::Relaxed),
            masteries: self.masteries.load(Ordering::Relaxed),
            scaling_fast_rejects: self.scaling_fast_rejects.load(Ordering::Relaxed),
            scalings_applied: self.scalings_applied.load(Ordering::Relaxed),
            binary_suppressed: self.binary_suppressed.load(Ordering::Relaxed),
            saves_completed: self.saves_completed.load(Ordering::Relaxed),
            loads_completed: self.loads_completed.load(Ordering::Relaxed),
        }
    }
}

impl Default for EngineCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// A snapshot of counter values at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// XP award calls that applied a nonzero amount.
    pub xp_awards: u64,
    /// Early grants issued.
    pub early_grants: u64,
    /// Power step changes observed.
    pub step_changes: u64,
    /// Items fully mastered.
    pub masteries: u64,
    /// Effect events rejected without taking a lock.
    pub scaling_fast_rejects: u64,
    /// Gradable effects scaled.
    pub scalings_applied: u64,
    /// Binary effects suppressed.
    pub binary_suppressed: u64,
    /// Save operations completed.
    pub saves_completed: u64,
    /// Load operations completed.
    pub loads_completed: u64,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
