//! Host-facing traits.
//!
//! The engine never touches live game objects directly. Everything it needs
//! from the host — catalog metadata, actor inventory, display text — comes
//! through these traits, and everything it does to the host goes back out
//! through them.

use crate::types::{Category, ItemId, Tier};

/// Display text for an item, as shown to the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDisplay {
    /// Item name.
    pub name: String,
    /// Item description.
    pub description: String,
}

/// Read-only catalog metadata. Callable from any thread.
pub trait ItemCatalog: Send + Sync {
    /// Tier of the item, used to seed its XP requirement. `None` for items
    /// the catalog does not know.
    fn tier_of(&self, item: ItemId) -> Option<Tier>;

    /// Category the item belongs to.
    fn category_of(&self, item: ItemId) -> Option<Category>;
}

/// Live-object access for the tracked actor.
///
/// Mutating methods (`grant_item`, `remove_item`, `set_item_display`) must
/// only be invoked from the host's owner thread; the engine upholds this by
/// driving them exclusively from host-event callbacks, which the host
/// delivers on that thread. Reads are safe from any thread.
pub trait ItemHost: Send + Sync {
    /// Whether the tracked actor currently possesses the item.
    fn actor_has_item(&self, item: ItemId) -> bool;

    /// Give the item to the tracked actor. Returns `false` if the host could
    /// not resolve the item.
    fn grant_item(&self, item: ItemId) -> bool;

    /// Take the item away from the tracked actor.
    fn remove_item(&self, item: ItemId) -> bool;

    /// Current display text of the item, or `None` if unresolvable.
    fn item_display(&self, item: ItemId) -> Option<ItemDisplay>;

    /// Overwrite the item's display text.
    fn set_item_display(&self, item: ItemId, display: &ItemDisplay) -> bool;

    /// XP multiplier from carried study material for this item's target
    /// (tome, manual, schematic). 1.0 means no boost.
    fn inventory_boost(&self, item: ItemId) -> f32 {
        let _ = item;
        1.0
    }
}
