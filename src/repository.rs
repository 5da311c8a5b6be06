//! Import/export facade over the codecs and the track store.
//!
//! Parse failures never escape this layer: decoding bad content yields an
//! empty import. Storage failures do escape, since a failed save must not
//! be reported as success.

use crate::codecs::{geojson, gpx};
use crate::error::Result;
use crate::jobs::{self, JobHandle};
use crate::platform::FileAccess;
use crate::store::TrackStore;
use crate::types::{Track, TrackFormat};

/// Coordinates codecs and storage for the import/export flows exposed to
/// the UI.
#[derive(Clone)]
pub struct TrackRepository {
    store: TrackStore,
}

impl TrackRepository {
    pub fn new(store: TrackStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &TrackStore {
        &self.store
    }

    /// Decode `content` and persist every track that parsed, returning the
    /// tracks with their newly assigned ids. Unparsable content imports
    /// zero tracks; storage errors propagate.
    pub fn import_tracks(&self, content: &str, format: TrackFormat) -> Result<Vec<Track>> {
        let decoded = match format {
            TrackFormat::Gpx => gpx::decode(content),
            TrackFormat::GeoJson => geojson::decode(content),
        };

        let mut imported = Vec::with_capacity(decoded.len());
        for mut track in decoded {
            track.id = self.store.save_track(&track)?;
            imported.push(track);
        }
        log::info!("imported {} track(s) from {}", imported.len(), format);
        Ok(imported)
    }

    /// String-dispatch boundary for [`TrackRepository::import_tracks`]:
    /// an unrecognized format name imports nothing.
    pub fn import_tracks_as(&self, content: &str, format: &str) -> Result<Vec<Track>> {
        match TrackFormat::parse(format) {
            Some(format) => self.import_tracks(content, format),
            None => {
                log::warn!("unrecognized import format '{}'", format);
                Ok(Vec::new())
            }
        }
    }

    /// Encode a track in the requested format. Total for any well-formed
    /// track value.
    pub fn export_track(&self, track: &Track, format: TrackFormat) -> String {
        match format {
            TrackFormat::Gpx => gpx::encode(track),
            TrackFormat::GeoJson => geojson::encode(track),
        }
    }

    /// String-dispatch boundary for [`TrackRepository::export_track`]:
    /// `None` for an unrecognized format name.
    pub fn export_track_as(&self, track: &Track, format: &str) -> Option<String> {
        TrackFormat::parse(format).map(|format| self.export_track(track, format))
    }

    /// Run an import off the calling thread; the UI polls or joins the
    /// returned handle.
    pub fn import_tracks_background(
        &self,
        content: String,
        format: TrackFormat,
    ) -> JobHandle<Result<Vec<Track>>> {
        let repo = self.clone();
        jobs::spawn(move || repo.import_tracks(&content, format))
    }

    /// Pick a file through the platform seam and import it. `Ok(empty)`
    /// when the user cancels or the content does not parse.
    pub fn import_from_file(
        &self,
        files: &dyn FileAccess,
        format: TrackFormat,
    ) -> Result<Vec<Track>> {
        match files.pick_file(&[format.as_str()]) {
            Some(content) => self.import_tracks(&content, format),
            None => Ok(Vec::new()),
        }
    }

    /// Export a track and hand it to the platform seam for saving. Returns
    /// whether the platform reported a successful write.
    pub fn export_to_file(
        &self,
        files: &dyn FileAccess,
        track: &Track,
        format: TrackFormat,
    ) -> bool {
        let content = self.export_track(track, format);
        let filename = format!("{}.{}", sanitize_filename(&track.name), format.as_str());
        files.save_file(&filename, &content)
    }
}

/// Keep letters, digits, dashes and underscores; everything else becomes an
/// underscore so the suggested name is safe on every platform.
fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "track".to_string()
    } else {
        cleaned
    }
}
