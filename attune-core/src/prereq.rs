//! Hard and soft prerequisite requirements.

use serde::{Deserialize, Serialize};

use crate::types::ItemId;

/// What must be mastered before an item becomes unlockable.
///
/// Hard prerequisites must all be mastered. Soft prerequisites need only
/// `soft_needed` of the listed items. An item with no stored requirements is
/// a root and always eligible; a single listed prerequisite is always hard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrereqRequirements {
    /// Every one of these must be mastered.
    pub hard: Vec<ItemId>,
    /// Pool from which `soft_needed` must be mastered.
    pub soft: Vec<ItemId>,
    /// How many of `soft` are required.
    pub soft_needed: usize,
}

impl PrereqRequirements {
    /// A single hard prerequisite.
    #[must_use]
    pub fn single(item: ItemId) -> Self {
        Self {
            hard: vec![item],
            soft: Vec::new(),
            soft_needed: 0,
        }
    }

    /// Hard-only requirements. A one-element list stays hard by definition.
    #[must_use]
    pub fn all_of(items: Vec<ItemId>) -> Self {
        Self {
            hard: items,
            soft: Vec::new(),
            soft_needed: 0,
        }
    }

    /// Soft requirements: `needed` of `pool` must be mastered.
    ///
    /// A pool of one collapses to a hard requirement.
    #[must_use]
    pub fn n_of(pool: Vec<ItemId>, needed: usize) -> Self {
        if pool.len() <= 1 {
            return Self::all_of(pool);
        }
        Self {
            hard: Vec::new(),
            soft: pool,
            soft_needed: needed,
        }
    }

    /// Whether every requirement is satisfied under the given mastery test.
    pub fn is_met(&self, is_mastered: impl Fn(ItemId) -> bool) -> bool {
        if self.hard.iter().any(|&item| !is_mastered(item)) {
            return false;
        }
        if self.soft_needed == 0 {
            return true;
        }
        let mastered = self.soft.iter().filter(|&&item| is_mastered(item)).count();
        mastered >= self.soft_needed
    }

    /// The first requirement still blocking, hard before soft. `None` when
    /// everything is satisfied.
    pub fn first_unmet(&self, is_mastered: impl Fn(ItemId) -> bool) -> Option<ItemId> {
        if let Some(&missing) = self.hard.iter().find(|&&item| !is_mastered(item)) {
            return Some(missing);
        }
        let mastered = self.soft.iter().filter(|&&item| is_mastered(item)).count();
        if mastered < self.soft_needed {
            return self.soft.iter().copied().find(|&item| !is_mastered(item));
        }
        None
    }

    /// Hard prerequisites that are still unmastered.
    pub fn unmet_hard(&self, is_mastered: impl Fn(ItemId) -> bool) -> Vec<ItemId> {
        self.hard
            .iter()
            .copied()
            .filter(|&item| !is_mastered(item))
            .collect()
    }

    /// `(mastered, needed)` across the soft pool.
    pub fn soft_status(&self, is_mastered: impl Fn(ItemId) -> bool) -> (usize, usize) {
        let mastered = self.soft.iter().filter(|&&item| is_mastered(item)).count();
        (mastered, self.soft_needed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
