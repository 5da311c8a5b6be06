//! Interchange format codecs.
//!
//! Both codecs share one contract:
//!
//! - `try_decode` parses the full text and returns either the tracks found
//!   or a [`ParseDiagnostic`]. Per-item structural problems (a point with a
//!   bad coordinate, a track with no points) drop the item and keep the
//!   rest; a document that is not well-formed fails as a whole.
//! - `decode` is the API boundary: it collapses any diagnostic to an empty
//!   vec, logging it. The import path degrades to "nothing imported" on bad
//!   input, it never raises.
//! - `encode` is total for any well-formed [`crate::types::Track`] value.

pub mod geojson;
pub mod gpx;

use crate::types::TrackFormat;

/// Why a decode produced nothing. Carried by `try_decode` so tests and
/// debugging can see the cause; the `decode` boundary only logs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDiagnostic {
    format: TrackFormat,
    message: String,
}

impl ParseDiagnostic {
    pub(crate) fn new(format: TrackFormat, message: impl Into<String>) -> Self {
        Self {
            format,
            message: message.into(),
        }
    }

    pub fn format(&self) -> TrackFormat {
        self.format
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ParseDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} parse failed: {}", self.format, self.message)
    }
}
