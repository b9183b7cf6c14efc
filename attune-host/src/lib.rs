//! # Attune Host Integration
//!
//! Reference integration between a game host and `attune-core`:
//!
//! - [`SimHost`] — a fully in-memory implementation of the core's
//!   [`attune_core::ItemCatalog`] and [`attune_core::ItemHost`] traits,
//!   used by integration tests and as a template for real hosts.
//! - [`HostBridge`] — translates host-side events (item used, target
//!   selected, effect applied) into engine calls.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod events;
pub mod sim;

pub use events::{HostBridge, HostEvent};
pub use sim::{SimHost, SimItem};
