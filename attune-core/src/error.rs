//! Error types for the attune core library.

use thiserror::Error;

/// Top-level error type for all attune operations.
#[derive(Error, Debug)]
pub enum AttuneError {
    /// An item was referenced that the ledger has never seen.
    #[error("Unknown item: {0}")]
    UnknownItem(crate::ItemId),

    /// Unlock refused while progress is incomplete or the item is already
    /// unlocked.
    #[error("Item {item} is not ready to unlock")]
    NotReady {
        /// The item whose unlock was refused.
        item: crate::ItemId,
    },

    /// Unlock refused because a prerequisite is missing.
    #[error("Prerequisite not met for {item}: requires {missing}")]
    PrerequisiteNotMet {
        /// The item whose unlock was refused.
        item: crate::ItemId,
        /// The unmastered prerequisite that is still missing.
        missing: crate::ItemId,
    },

    /// The host backend declined to add an item to the actor.
    #[error("Host refused to grant item {0}")]
    GrantRefused(crate::ItemId),

    /// A save blob failed structural validation on load.
    #[error("Corrupt save data: {0}")]
    CorruptSave(String),

    /// Save record written in a format version outside the readable range.
    #[error("Unsupported save version {found} (readable: {min}..={max})")]
    UnsupportedVersion {
        /// Version found in the record header.
        found: u32,
        /// Oldest version this build can read.
        min: u32,
        /// Newest version this build can read.
        max: u32,
    },

    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// SQLite persistence error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, AttuneError>;
