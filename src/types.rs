//! Core value types shared by the codecs, the stores and the facade.
//!
//! These are plain data containers. Identity and ordering rules live with the
//! store: a point's position in its segment is its identity, a persisted
//! track always carries a non-empty id.

use serde::{Deserialize, Serialize};

// ============================================================================
// Tracks
// ============================================================================

/// A single recorded position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Elevation in meters, when the source carried one.
    #[serde(default)]
    pub elevation: Option<f64>,
    /// Timestamp in milliseconds since the Unix epoch (UTC).
    #[serde(default)]
    pub time: Option<i64>,
}

impl TrackPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            elevation: None,
            time: None,
        }
    }
}

/// A contiguous run of points. Segment boundaries mark recording gaps and
/// survive storage round-trips.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackSegment {
    #[serde(default)]
    pub points: Vec<TrackPoint>,
}

impl TrackSegment {
    pub fn new(points: Vec<TrackPoint>) -> Self {
        Self { points }
    }
}

/// Rendering style for a track's line.
///
/// Stored as uppercase text in the database; unknown stored values degrade
/// to `Solid` on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LineStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
}

impl LineStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineStyle::Solid => "SOLID",
            LineStyle::Dashed => "DASHED",
            LineStyle::Dotted => "DOTTED",
        }
    }

    pub fn parse(s: &str) -> Option<LineStyle> {
        match s {
            "SOLID" => Some(LineStyle::Solid),
            "DASHED" => Some(LineStyle::Dashed),
            "DOTTED" => Some(LineStyle::Dotted),
            _ => None,
        }
    }
}

pub const DEFAULT_TRACK_COLOR: &str = "#0000FF";

/// A named, styled, ordered collection of segments.
///
/// `id` is empty until the track is first saved; the store mints an opaque
/// unique token on first save and the id stays stable across edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub segments: Vec<TrackSegment>,
    /// Hex "#RRGGBB".
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub line_style: LineStyle,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_color() -> String {
    DEFAULT_TRACK_COLOR.to_string()
}

fn default_visible() -> bool {
    true
}

impl Track {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            segments: Vec::new(),
            color: default_color(),
            line_style: LineStyle::default(),
            visible: true,
        }
    }

    pub fn with_segments(mut self, segments: Vec<TrackSegment>) -> Self {
        self.segments = segments;
        self
    }

    /// Total number of points across all segments.
    pub fn point_count(&self) -> usize {
        self.segments.iter().map(|s| s.points.len()).sum()
    }
}

// ============================================================================
// Folders
// ============================================================================

/// A grouping node in the folder forest. Tracks may belong to any number of
/// folders; membership lives in a join table, not on the track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub sub_folders: Vec<Folder>,
    #[serde(default)]
    pub track_ids: Vec<String>,
}

// ============================================================================
// Config
// ============================================================================

/// UI color theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Theme {
    #[default]
    System,
    Light,
    Dark,
}

/// Application configuration, stored per profile name.
///
/// All fields default so that older stored blobs still deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub default_zoom: i32,
    pub initial_lat: f64,
    pub initial_lon: f64,
    pub active_base_map_id: String,
    pub active_overlay_ids: Vec<String>,
    pub offline_mode: bool,
    pub theme: Theme,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_zoom: 12,
            initial_lat: 45.5152,
            initial_lon: -122.6784,
            active_base_map_id: "osm".to_string(),
            active_overlay_ids: Vec::new(),
            offline_mode: false,
            theme: Theme::default(),
        }
    }
}

// ============================================================================
// Interchange formats
// ============================================================================

/// The closed set of supported interchange formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackFormat {
    Gpx,
    GeoJson,
}

impl TrackFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackFormat::Gpx => "gpx",
            TrackFormat::GeoJson => "geojson",
        }
    }

    /// Case-insensitive dispatch over the supported format names.
    /// Returns `None` for anything outside `{"gpx", "geojson"}`.
    pub fn parse(s: &str) -> Option<TrackFormat> {
        match s.to_ascii_lowercase().as_str() {
            "gpx" => Some(TrackFormat::Gpx),
            "geojson" => Some(TrackFormat::GeoJson),
            _ => None,
        }
    }
}

impl std::fmt::Display for TrackFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
