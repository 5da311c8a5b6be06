//! GPX 1.1 codec.
//!
//! Decoding matches elements by XML local name, so a document parses
//! identically whether it declares no namespace, the standard GPX namespace,
//! or a prefix on every element. Per-point tolerance: a `<trkpt>` with a
//! missing or unparsable coordinate is dropped, an unparsable `<time>`
//! becomes a null timestamp, and a `<trk>` that ends up with no points is
//! dropped without failing the document.

use chrono::{DateTime, NaiveDateTime, Utc};
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;

use super::ParseDiagnostic;
use crate::types::{Track, TrackFormat, TrackPoint, TrackSegment};

pub const GPX_NAMESPACE: &str = "http://www.topografix.com/GPX/1/1";
const DEFAULT_TRACK_NAME: &str = "Imported GPX";

/// Decode GPX text, collapsing any diagnostic to an empty result.
pub fn decode(text: &str) -> Vec<Track> {
    match try_decode(text) {
        Ok(tracks) => tracks,
        Err(diag) => {
            log::warn!("{}", diag);
            Vec::new()
        }
    }
}

/// Decode GPX text into the tracks it contains, in document order.
///
/// Returns `Err` only when the document itself is not well-formed XML;
/// structurally invalid tracks and points are dropped individually.
pub fn try_decode(text: &str) -> Result<Vec<Track>, ParseDiagnostic> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut tracks: Vec<Track> = Vec::new();

    // Parser state. `pending_*` accumulate the element currently open.
    let mut in_trk = false;
    let mut in_trkseg = false;
    let mut track_name: Option<String> = None;
    let mut segments: Vec<TrackSegment> = Vec::new();
    let mut seg_points: Vec<TrackPoint> = Vec::new();
    let mut pending_point: Option<PendingPoint> = None;
    // Which child element's text is being captured, if any.
    let mut capture: Option<Capture> = None;
    let mut text_buf = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"trk" => {
                    in_trk = true;
                    track_name = None;
                    segments.clear();
                }
                b"trkseg" if in_trk => {
                    in_trkseg = true;
                    seg_points.clear();
                }
                b"trkpt" if in_trkseg => {
                    pending_point = Some(PendingPoint::from_attributes(&e));
                }
                b"name" if in_trk && !in_trkseg => {
                    capture = Some(Capture::Name);
                    text_buf.clear();
                }
                b"ele" if pending_point.is_some() => {
                    capture = Some(Capture::Elevation);
                    text_buf.clear();
                }
                b"time" if pending_point.is_some() => {
                    capture = Some(Capture::Time);
                    text_buf.clear();
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                // Self-closing <trkpt lat=".." lon=".."/> carries no children.
                if in_trkseg && e.local_name().as_ref() == b"trkpt" {
                    if let Some(point) = PendingPoint::from_attributes(&e).finish() {
                        seg_points.push(point);
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if capture.is_some() {
                    if let Ok(s) = t.unescape() {
                        text_buf.push_str(&s);
                    }
                }
            }
            Ok(Event::CData(t)) => {
                if capture.is_some() {
                    text_buf.push_str(&String::from_utf8_lossy(t.as_ref()));
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"name" if matches!(capture, Some(Capture::Name)) => {
                    let name = text_buf.trim();
                    if !name.is_empty() {
                        track_name = Some(name.to_string());
                    }
                    capture = None;
                }
                b"ele" if matches!(capture, Some(Capture::Elevation)) => {
                    if let Some(p) = pending_point.as_mut() {
                        p.elevation = text_buf.trim().parse().ok();
                    }
                    capture = None;
                }
                b"time" if matches!(capture, Some(Capture::Time)) => {
                    if let Some(p) = pending_point.as_mut() {
                        // Unparsable time degrades to a null timestamp, the
                        // point itself is kept.
                        p.time = parse_time(text_buf.trim());
                    }
                    capture = None;
                }
                b"trkpt" => {
                    if let Some(point) = pending_point.take().and_then(PendingPoint::finish) {
                        seg_points.push(point);
                    }
                }
                b"trkseg" => {
                    in_trkseg = false;
                    if !seg_points.is_empty() {
                        segments.push(TrackSegment::new(std::mem::take(&mut seg_points)));
                    }
                }
                b"trk" => {
                    in_trk = false;
                    if !segments.is_empty() {
                        let name = track_name
                            .take()
                            .unwrap_or_else(|| DEFAULT_TRACK_NAME.to_string());
                        tracks.push(Track::new(name).with_segments(std::mem::take(&mut segments)));
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(ParseDiagnostic::new(
                    TrackFormat::Gpx,
                    format!("malformed XML at byte {}: {}", reader.buffer_position(), e),
                ));
            }
        }
    }

    Ok(tracks)
}

/// Encode a track as a GPX 1.1 document with the standard namespace.
///
/// Multi-segment tracks produce one `<trkseg>` per segment; times render as
/// ISO-8601 UTC seconds.
pub fn encode(track: &Track) -> String {
    let mut out = String::with_capacity(256 + track.point_count() * 96);
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str(&format!(
        "<gpx version=\"1.1\" creator=\"maptracks\" xmlns=\"{}\">\n",
        GPX_NAMESPACE
    ));
    out.push_str("  <trk>\n");
    out.push_str(&format!("    <name>{}</name>\n", escape(&track.name)));
    for segment in &track.segments {
        out.push_str("    <trkseg>\n");
        for point in &segment.points {
            out.push_str(&format!(
                "      <trkpt lat=\"{}\" lon=\"{}\">\n",
                point.latitude, point.longitude
            ));
            if let Some(ele) = point.elevation {
                out.push_str(&format!("        <ele>{}</ele>\n", ele));
            }
            if let Some(time) = point.time.and_then(format_time) {
                out.push_str(&format!("        <time>{}</time>\n", time));
            }
            out.push_str("      </trkpt>\n");
        }
        out.push_str("    </trkseg>\n");
    }
    out.push_str("  </trk>\n");
    out.push_str("</gpx>\n");
    out
}

/// Which text-bearing child element is currently open.
enum Capture {
    Name,
    Elevation,
    Time,
}

/// A `<trkpt>` whose children are still being read.
struct PendingPoint {
    latitude: Option<f64>,
    longitude: Option<f64>,
    elevation: Option<f64>,
    time: Option<i64>,
}

impl PendingPoint {
    fn from_attributes(e: &quick_xml::events::BytesStart<'_>) -> Self {
        let mut latitude = None;
        let mut longitude = None;
        for attr in e.attributes().with_checks(false).flatten() {
            let value = match attr.unescape_value() {
                Ok(v) => v,
                Err(_) => continue,
            };
            match attr.key.local_name().as_ref() {
                b"lat" => latitude = value.trim().parse().ok(),
                b"lon" => longitude = value.trim().parse().ok(),
                _ => {}
            }
        }
        Self {
            latitude,
            longitude,
            elevation: None,
            time: None,
        }
    }

    /// A point without both coordinates is structurally invalid and dropped.
    fn finish(self) -> Option<TrackPoint> {
        Some(TrackPoint {
            latitude: self.latitude?,
            longitude: self.longitude?,
            elevation: self.elevation,
            time: self.time,
        })
    }
}

/// Parse a GPX `<time>` value to epoch milliseconds. Accepts RFC 3339 and
/// the common zone-less `YYYY-MM-DDTHH:MM:SS[.fff]` form (treated as UTC).
fn parse_time(s: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc().timestamp_millis())
}

fn format_time(millis: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
}
