//! GeoJSON codec (RFC 7946 subset).
//!
//! Only `LineString` and `MultiLineString` features are track-like; every
//! other geometry type is ignored. Positions are `[lon, lat]` or
//! `[lon, lat, ele]` - the third element is optional per point.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ParseDiagnostic;
use crate::types::{Track, TrackFormat, TrackPoint, TrackSegment};

const DEFAULT_TRACK_NAME: &str = "Imported GeoJSON";

#[derive(Debug, Serialize, Deserialize)]
struct FeatureCollection {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Feature {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    geometry: Option<Geometry>,
    #[serde(default)]
    properties: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Geometry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    coordinates: Value,
}

/// Decode GeoJSON text, collapsing any diagnostic to an empty result.
pub fn decode(text: &str) -> Vec<Track> {
    match try_decode(text) {
        Ok(tracks) => tracks,
        Err(diag) => {
            log::warn!("{}", diag);
            Vec::new()
        }
    }
}

/// Decode a `FeatureCollection` into the tracks it contains.
///
/// Returns `Err` only when the text is not valid JSON for a feature
/// collection; features of other geometry types and malformed coordinate
/// entries are dropped individually.
pub fn try_decode(text: &str) -> Result<Vec<Track>, ParseDiagnostic> {
    let collection: FeatureCollection = serde_json::from_str(text)
        .map_err(|e| ParseDiagnostic::new(TrackFormat::GeoJson, e.to_string()))?;

    let mut tracks = Vec::new();
    for feature in &collection.features {
        let Some(geometry) = &feature.geometry else {
            continue;
        };

        let segments: Vec<TrackSegment> = match geometry.kind.as_str() {
            "LineString" => parse_line(&geometry.coordinates).into_iter().collect(),
            "MultiLineString" => geometry
                .coordinates
                .as_array()
                .map(|lines| lines.iter().filter_map(parse_line).collect())
                .unwrap_or_default(),
            _ => continue,
        };

        if segments.is_empty() {
            continue;
        }

        let name = feature
            .properties
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_TRACK_NAME);
        tracks.push(Track::new(name).with_segments(segments));
    }

    Ok(tracks)
}

/// Encode a track as a `FeatureCollection` holding a single feature.
///
/// Single-segment tracks become a `LineString`, multi-segment tracks a
/// `MultiLineString`.
pub fn encode(track: &Track) -> String {
    let (kind, coordinates) = if track.segments.len() == 1 {
        ("LineString", positions(&track.segments[0]))
    } else {
        (
            "MultiLineString",
            Value::Array(track.segments.iter().map(positions).collect()),
        )
    };

    let mut properties = Map::new();
    properties.insert("name".to_string(), Value::String(track.name.clone()));

    let collection = FeatureCollection {
        kind: "FeatureCollection".to_string(),
        features: vec![Feature {
            kind: "Feature".to_string(),
            geometry: Some(Geometry {
                kind: kind.to_string(),
                coordinates,
            }),
            properties,
        }],
    };

    serde_json::to_string(&collection).unwrap_or_else(|_| "{}".to_string())
}

/// One coordinate array -> one segment. `None` when the value is not an
/// array or contains no valid positions.
fn parse_line(coordinates: &Value) -> Option<TrackSegment> {
    let points: Vec<TrackPoint> = coordinates
        .as_array()?
        .iter()
        .filter_map(parse_position)
        .collect();
    if points.is_empty() {
        None
    } else {
        Some(TrackSegment::new(points))
    }
}

fn parse_position(value: &Value) -> Option<TrackPoint> {
    let arr = value.as_array()?;
    Some(TrackPoint {
        longitude: arr.first()?.as_f64()?,
        latitude: arr.get(1)?.as_f64()?,
        elevation: arr.get(2).and_then(Value::as_f64),
        time: None,
    })
}

fn positions(segment: &TrackSegment) -> Value {
    Value::Array(
        segment
            .points
            .iter()
            .map(|p| {
                let mut pos = vec![json_number(p.longitude), json_number(p.latitude)];
                if let Some(ele) = p.elevation {
                    pos.push(json_number(ele));
                }
                Value::Array(pos)
            })
            .collect(),
    )
}

fn json_number(v: f64) -> Value {
    serde_json::Number::from_f64(v)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}
