//! In-memory host simulation.
//!
//! `SimHost` stands in for a real game: it owns an item catalog, the
//! tracked actor's possessions, and live display text. Integration tests
//! drive the engine against it; real integrations copy its shape.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;

use attune_core::{Category, ItemCatalog, ItemDisplay, ItemHost, ItemId, Tier};

/// Catalog definition of one simulated item.
#[derive(Debug, Clone)]
pub struct SimItem {
    /// Item tier.
    pub tier: Tier,
    /// Category the item belongs to.
    pub category: Category,
    /// Display name.
    pub name: String,
    /// Display description.
    pub description: String,
    /// Multiplier granted while the actor carries this item's study
    /// material.
    pub study_boost: f32,
}

#[derive(Default)]
struct SimState {
    catalog: HashMap<ItemId, SimItem>,
    displays: HashMap<ItemId, ItemDisplay>,
    possessed: HashSet<ItemId>,
    carrying_study_material: HashSet<ItemId>,
}

/// An in-memory world with one tracked actor.
#[derive(Default)]
pub struct SimHost {
    state: RwLock<SimState>,
}

impl SimHost {
    /// Empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item to the catalog.
    pub fn register_item(&self, item: ItemId, def: SimItem) {
        let mut state = self.state.write();
        state.displays.insert(
            item,
            ItemDisplay {
                name: def.name.clone(),
                description: def.description.clone(),
            },
        );
        state.catalog.insert(item, def);
    }

    /// Shorthand for registering a plain item.
    pub fn register_simple(&self, item: ItemId, tier: Tier, category: &str, name: &str) {
        self.register_item(
            item,
            SimItem {
                tier,
                category: Category::new(category),
                name: name.to_string(),
                description: format!("{name}."),
                study_boost: 1.0,
            },
        );
    }

    /// Put the item's study material in (or out of) the actor's inventory.
    pub fn set_carrying_study_material(&self, item: ItemId, carrying: bool) {
        let mut state = self.state.write();
        if carrying {
            state.carrying_study_material.insert(item);
        } else {
            state.carrying_study_material.remove(&item);
        }
    }

    /// Items the actor currently possesses.
    #[must_use]
    pub fn possessions(&self) -> HashSet<ItemId> {
        self.state.read().possessed.clone()
    }

    /// Current display text, unwrapped for test assertions.
    #[must_use]
    pub fn display_name(&self, item: ItemId) -> Option<String> {
        self.state
            .read()
            .displays
            .get(&item)
            .map(|display| display.name.clone())
    }
}

impl ItemCatalog for SimHost {
    fn tier_of(&self, item: ItemId) -> Option<Tier> {
        self.state.read().catalog.get(&item).map(|def| def.tier)
    }

    fn category_of(&self, item: ItemId) -> Option<Category> {
        self.state
            .read()
            .catalog
            .get(&item)
            .map(|def| def.category.clone())
    }
}

impl ItemHost for SimHost {
    fn actor_has_item(&self, item: ItemId) -> bool {
        self.state.read().possessed.contains(&item)
    }

    fn grant_item(&self, item: ItemId) -> bool {
        let mut state = self.state.write();
        if !state.catalog.contains_key(&item) {
            return false;
        }
        state.possessed.insert(item);
        true
    }

    fn remove_item(&self, item: ItemId) -> bool {
        self.state.write().possessed.remove(&item)
    }

    fn item_display(&self, item: ItemId) -> Option<ItemDisplay> {
        self.state.read().displays.get(&item).cloned()
    }

    fn set_item_display(&self, item: ItemId, display: &ItemDisplay) -> bool {
        let mut state = self.state.write();
        if !state.catalog.contains_key(&item) {
            return false;
        }
        state.displays.insert(item, display.clone());
        true
    }

    fn inventory_boost(&self, item: ItemId) -> f32 {
        let state = self.state.read();
        if state.carrying_study_material.contains(&item) {
            state
                .catalog
                .get(&item)
                .map_or(1.0, |def| def.study_boost)
        } else {
            1.0
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_lookup() {
        let host = SimHost::new();
        host.register_simple(ItemId(1), Tier::Adept, "destruction", "Fireball");
        assert_eq!(host.tier_of(ItemId(1)), Some(Tier::Adept));
        assert_eq!(host.category_of(ItemId(1)), Some(Category::new("destruction")));
        assert_eq!(host.tier_of(ItemId(2)), None);
    }

    #[test]
    fn grants_require_catalog_entries() {
        let host = SimHost::new();
        assert!(!host.grant_item(ItemId(1)));

        host.register_simple(ItemId(1), Tier::Novice, "alteration", "Oakflesh");
        assert!(host.grant_item(ItemId(1)));
        assert!(host.actor_has_item(ItemId(1)));
        assert!(host.remove_item(ItemId(1)));
        assert!(!host.actor_has_item(ItemId(1)));
    }

    #[test]
    fn study_material_boost_toggles() {
        let host = SimHost::new();
        host.register_item(
            ItemId(1),
            SimItem {
                tier: Tier::Novice,
                category: Category::new("restoration"),
                name: "Healing".to_string(),
                description: "Heals.".to_string(),
                study_boost: 1.5,
            },
        );
        assert_eq!(host.inventory_boost(ItemId(1)), 1.0);
        host.set_carrying_study_material(ItemId(1), true);
        assert_eq!(host.inventory_boost(ItemId(1)), 1.5);
        host.set_carrying_study_material(ItemId(1), false);
        assert_eq!(host.inventory_boost(ItemId(1)), 1.0);
    }

    #[test]
    fn display_overwrite_and_restore() {
        let host = SimHost::new();
        host.register_simple(ItemId(1), Tier::Novice, "illusion", "Candlelight");
        let original = host.item_display(ItemId(1)).unwrap();

        let modified = ItemDisplay {
            name: "Candlelight (Budding 20%)".to_string(),
            description: original.description.clone(),
        };
        assert!(host.set_item_display(ItemId(1), &modified));
        assert_eq!(host.display_name(ItemId(1)).unwrap(), modified.name);

        assert!(host.set_item_display(ItemId(1), &original));
        assert_eq!(host.display_name(ItemId(1)).unwrap(), "Candlelight");
    }
}
