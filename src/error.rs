//! Unified error handling for storage and validation failures.
//!
//! Parse failures never appear here: the codecs collapse them to empty
//! results at their API boundary (see [`crate::codecs`]). Not-found
//! conditions on scalar updates are no-ops, not errors.

use thiserror::Error;

/// Errors surfaced by the stores and the repository facade.
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying SQLite failure. A failed save must not look like success,
    /// so these propagate all the way to the caller.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Reparenting `folder_id` under `parent_id` would make the folder its
    /// own ancestor.
    #[error("moving folder '{folder_id}' under '{parent_id}' would create a cycle")]
    FolderCycle {
        folder_id: String,
        parent_id: String,
    },

    /// A folder id referenced as a parent does not exist.
    #[error("folder not found: {0}")]
    FolderNotFound(String),
}

/// Result type alias for store and facade operations.
pub type Result<T> = std::result::Result<T, Error>;
