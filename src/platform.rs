//! Collaborator seams for platform capabilities.
//!
//! The core never opens pickers or reads platform config paths itself; it
//! consumes content through these traits and the hosting application wires
//! in the platform implementations.

use crate::types::Config;

/// File access capability provided by the host platform.
pub trait FileAccess {
    /// Ask the user for a file limited to `extensions` and return its
    /// content. `None` means cancelled or unreadable.
    fn pick_file(&self, extensions: &[&str]) -> Option<String>;

    /// Write `content` under a suggested `filename`. Returns whether the
    /// write happened.
    fn save_file(&self, filename: &str, content: &str) -> bool;
}

/// Optional environment-provided startup override for the active config
/// profile. When present, the overlay fully replaces the stored value
/// (last-writer-wins, not a field-level merge).
pub trait ConfigOverlay {
    fn read_overlay(&self) -> Option<Config>;
}
