//! # Attune Core Library
//!
//! Host-agnostic progression and graduated-effectiveness engine for
//! learnable game content. A catalog of items (spells, recipes, techniques)
//! is gated behind per-item progression:
//!
//! - **Ledger** — multi-source XP accumulation with per-source caps;
//!   only using the item itself can carry it all the way to mastery.
//! - **Overlay** — items become usable early, at a stepped fraction of
//!   full power, once progress crosses the unlock threshold.
//! - **Scaling hook** — a single per-effect entry point the host's
//!   dispatch calls; the common no-tracking case is rejected on two atomics
//!   without taking a lock.
//! - **Persistence** — a versioned binary record stream inside a SQLite
//!   save-slot store, resilient to unknown and corrupt records.
//!
//! [`ProgressionEngine`] is the facade that wires these together for one
//! tracked actor; hosts implement [`ItemCatalog`] and [`ItemHost`] to plug
//! the engine into their world.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod engine;
pub mod error;
pub mod host;
pub mod ledger;
pub mod metrics;
pub mod overlay;
pub mod persistence;
pub mod prereq;
pub mod progress;
pub mod scaling;
pub mod store;
pub mod sync;
pub mod types;

pub use config::AttuneConfig;
pub use engine::{EngineEvent, EventSink, ProgressionEngine};
pub use error::{AttuneError, Result};
pub use host::{ItemCatalog, ItemDisplay, ItemHost};
pub use ledger::ProgressLedger;
pub use overlay::EffectivenessOverlay;
pub use prereq::PrereqRequirements;
pub use scaling::ScalingHook;
pub use store::SaveStore;
pub use sync::CountedSet;
pub use types::*;
