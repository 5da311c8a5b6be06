//! Track and folder persistence.
//!
//! Tracks are stored flattened: one scalar row per track, one row per point
//! carrying `segment_index` and an explicit order column `seq`. Retrieval
//! groups points by ascending `segment_index` to rebuild segments, so
//! segment boundaries and point order survive the round trip.
//!
//! Saving is an idempotent replace: the track's point rows are deleted and
//! re-inserted inside one transaction, so re-importing a track never
//! duplicates points and a failure partway leaves the previous state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection, OptionalExtension};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::types::{Folder, LineStyle, Track, TrackPoint, TrackSegment};

/// Recursion cap for hierarchy reconstruction. The forest contract forbids
/// cycles, but row data is not trusted to honor it.
const MAX_FOLDER_DEPTH: u32 = 64;

/// SQLite-backed storage for tracks, points and the folder forest.
#[derive(Clone)]
pub struct TrackStore {
    db: Database,
}

impl TrackStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    // ========================================================================
    // Track queries
    // ========================================================================

    /// All tracks with their segments rebuilt, in insertion order.
    pub fn get_all_tracks(&self) -> Result<Vec<Track>> {
        self.db.with(|conn| load_tracks(conn, None))
    }

    /// Tracks currently marked visible.
    pub fn get_visible_tracks(&self) -> Result<Vec<Track>> {
        self.db.with(|conn| load_tracks(conn, Some("visible = 1")))
    }

    /// A single track by id, or `None` when unknown.
    pub fn get_track(&self, id: &str) -> Result<Option<Track>> {
        self.db.with(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, name, color, line_style, visible FROM tracks WHERE id = ?",
                    [id],
                    map_track_row,
                )
                .optional()?;
            match row {
                Some(mut track) => {
                    track.segments = load_segments(conn, &track.id)?;
                    Ok(Some(track))
                }
                None => Ok(None),
            }
        })
    }

    // ========================================================================
    // Track mutations
    // ========================================================================

    /// Upsert a track and all of its points. Mints an id when the track has
    /// none; returns the (possibly new) id.
    ///
    /// Runs as one transaction: scalar upsert, delete of every existing
    /// point row for the id, re-insert of every point with its
    /// `segment_index` and order.
    pub fn save_track(&self, track: &Track) -> Result<String> {
        let id = if track.id.trim().is_empty() {
            mint_id("track")
        } else {
            track.id.clone()
        };

        self.db.with(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO tracks (id, name, color, line_style, visible)
                 VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                     name = excluded.name,
                     color = excluded.color,
                     line_style = excluded.line_style,
                     visible = excluded.visible",
                params![
                    id,
                    track.name,
                    track.color,
                    track.line_style.as_str(),
                    track.visible as i64
                ],
            )?;
            tx.execute("DELETE FROM track_points WHERE track_id = ?", [&id])?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO track_points
                         (track_id, segment_index, seq, latitude, longitude, elevation, time)
                     VALUES (?, ?, ?, ?, ?, ?, ?)",
                )?;
                for (segment_index, segment) in track.segments.iter().enumerate() {
                    for (seq, point) in segment.points.iter().enumerate() {
                        stmt.execute(params![
                            id,
                            segment_index as i64,
                            seq as i64,
                            point.latitude,
                            point.longitude,
                            point.elevation,
                            point.time
                        ])?;
                    }
                }
            }
            tx.commit()?;
            log::debug!("saved track {} ({} points)", id, track.point_count());
            Ok(id)
        })
    }

    /// Scalar-only visibility update; a no-op for unknown ids.
    pub fn update_track_visibility(&self, id: &str, visible: bool) -> Result<()> {
        self.db.with(|conn| {
            conn.execute(
                "UPDATE tracks SET visible = ? WHERE id = ?",
                params![visible as i64, id],
            )?;
            Ok(())
        })
    }

    /// Scalar-only style update; a no-op for unknown ids.
    pub fn update_track_style(&self, id: &str, color: &str, line_style: LineStyle) -> Result<()> {
        self.db.with(|conn| {
            conn.execute(
                "UPDATE tracks SET color = ?, line_style = ? WHERE id = ?",
                params![color, line_style.as_str(), id],
            )?;
            Ok(())
        })
    }

    /// Remove a track, its points and its folder memberships atomically.
    pub fn delete_track(&self, id: &str) -> Result<()> {
        self.db.with(|conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM track_points WHERE track_id = ?", [id])?;
            tx.execute("DELETE FROM track_folders WHERE track_id = ?", [id])?;
            tx.execute("DELETE FROM tracks WHERE id = ?", [id])?;
            tx.commit()?;
            Ok(())
        })
    }

    // ========================================================================
    // Folders
    // ========================================================================

    /// Create a folder, optionally under a parent. Returns the new id.
    pub fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<String> {
        let id = mint_id("folder");
        self.db.with(|conn| {
            if let Some(parent) = parent_id {
                ensure_folder_exists(conn, parent)?;
            }
            conn.execute(
                "INSERT INTO folders (id, name, parent_id) VALUES (?, ?, ?)",
                params![id, name, parent_id],
            )?;
            Ok(id.clone())
        })
    }

    /// Delete a folder. Its direct children are reparented to the deleted
    /// folder's parent (so a deleted root's children become roots) and only
    /// the folder's own membership edges are removed; tracks are untouched.
    pub fn delete_folder(&self, id: &str) -> Result<()> {
        self.db.with(|conn| {
            let tx = conn.transaction()?;
            let parent: Option<Option<String>> = tx
                .query_row("SELECT parent_id FROM folders WHERE id = ?", [id], |row| {
                    row.get(0)
                })
                .optional()?;
            let Some(parent) = parent else {
                // Unknown folder: nothing to do.
                return Ok(());
            };
            tx.execute(
                "UPDATE folders SET parent_id = ? WHERE parent_id = ?",
                params![parent, id],
            )?;
            tx.execute("DELETE FROM track_folders WHERE folder_id = ?", [id])?;
            tx.execute("DELETE FROM folders WHERE id = ?", [id])?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Rename a folder; a no-op for unknown ids.
    pub fn update_folder_name(&self, id: &str, name: &str) -> Result<()> {
        self.db.with(|conn| {
            conn.execute(
                "UPDATE folders SET name = ? WHERE id = ?",
                params![name, id],
            )?;
            Ok(())
        })
    }

    /// Move a folder under a new parent (or to the root with `None`).
    ///
    /// Rejects a parent that is the folder itself or any of its
    /// descendants, since that would make the folder its own ancestor.
    pub fn update_folder_parent(&self, id: &str, parent_id: Option<&str>) -> Result<()> {
        self.db.with(|conn| {
            if let Some(parent) = parent_id {
                ensure_folder_exists(conn, parent)?;
                ensure_no_cycle(conn, id, parent)?;
            }
            conn.execute(
                "UPDATE folders SET parent_id = ? WHERE id = ?",
                params![parent_id, id],
            )?;
            Ok(())
        })
    }

    /// Add a batch of tracks to a folder in one transaction. Existing
    /// memberships are ignored.
    pub fn add_tracks_to_folder(&self, track_ids: &[String], folder_id: &str) -> Result<()> {
        self.db.with(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR IGNORE INTO track_folders (track_id, folder_id) VALUES (?, ?)",
                )?;
                for track_id in track_ids {
                    stmt.execute(params![track_id, folder_id])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    /// Remove a batch of tracks from a folder in one transaction.
    pub fn remove_tracks_from_folder(&self, track_ids: &[String], folder_id: &str) -> Result<()> {
        self.db.with(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx
                    .prepare("DELETE FROM track_folders WHERE track_id = ? AND folder_id = ?")?;
                for track_id in track_ids {
                    stmt.execute(params![track_id, folder_id])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    /// The folder forest: roots only, each with `sub_folders` nested
    /// recursively and `track_ids` filled from the join table.
    pub fn get_folder_hierarchy(&self) -> Result<Vec<Folder>> {
        self.db.with(|conn| {
            let rows = load_folder_rows(conn)?;
            let memberships = load_memberships(conn)?;
            Ok(build_level(&rows, &memberships, None, 0))
        })
    }

    /// Flat reverse lookup: every folder a track belongs to, without
    /// subfolder nesting.
    pub fn get_folders_for_track(&self, track_id: &str) -> Result<Vec<Folder>> {
        self.db.with(|conn| {
            let mut stmt = conn.prepare(
                "SELECT f.id, f.name, f.parent_id
                 FROM folders f
                 JOIN track_folders tf ON tf.folder_id = f.id
                 WHERE tf.track_id = ?
                 ORDER BY f.name",
            )?;
            let folders = stmt
                .query_map([track_id], |row| {
                    Ok(Folder {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        parent_id: row.get(2)?,
                        sub_folders: Vec::new(),
                        track_ids: Vec::new(),
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(folders)
        })
    }
}

// ============================================================================
// Row mapping
// ============================================================================

fn map_track_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Track> {
    let line_style_text: String = row.get(3)?;
    let line_style = LineStyle::parse(&line_style_text).unwrap_or_else(|| {
        log::warn!("unknown line style '{}', using SOLID", line_style_text);
        LineStyle::Solid
    });
    Ok(Track {
        id: row.get(0)?,
        name: row.get(1)?,
        segments: Vec::new(),
        color: row.get(2)?,
        line_style,
        visible: row.get::<_, i64>(4)? != 0,
    })
}

fn load_tracks(conn: &Connection, filter: Option<&str>) -> Result<Vec<Track>> {
    let sql = match filter {
        Some(clause) => format!(
            "SELECT id, name, color, line_style, visible FROM tracks WHERE {} ORDER BY rowid",
            clause
        ),
        None => "SELECT id, name, color, line_style, visible FROM tracks ORDER BY rowid"
            .to_string(),
    };
    let mut stmt = conn.prepare(&sql)?;
    let mut tracks = stmt
        .query_map([], map_track_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    for track in &mut tracks {
        track.segments = load_segments(conn, &track.id)?;
    }
    Ok(tracks)
}

/// Rebuild segments for one track: fetch points ordered by
/// `(segment_index, seq)` and start a new segment at each distinct index
/// value, ascending. The rowid tie-break keeps insertion order for rows
/// written before the `seq` column existed.
fn load_segments(conn: &Connection, track_id: &str) -> Result<Vec<TrackSegment>> {
    let mut stmt = conn.prepare(
        "SELECT segment_index, latitude, longitude, elevation, time
         FROM track_points
         WHERE track_id = ?
         ORDER BY segment_index, seq, rowid",
    )?;
    let rows = stmt.query_map([track_id], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            TrackPoint {
                latitude: row.get(1)?,
                longitude: row.get(2)?,
                elevation: row.get(3)?,
                time: row.get(4)?,
            },
        ))
    })?;

    let mut segments: Vec<TrackSegment> = Vec::new();
    let mut current_index: Option<i64> = None;
    for row in rows {
        let (segment_index, point) = row?;
        if current_index != Some(segment_index) {
            segments.push(TrackSegment::default());
            current_index = Some(segment_index);
        }
        if let Some(segment) = segments.last_mut() {
            segment.points.push(point);
        }
    }
    Ok(segments)
}

// ============================================================================
// Folder helpers
// ============================================================================

struct FolderRow {
    id: String,
    name: String,
    parent_id: Option<String>,
}

fn load_folder_rows(conn: &Connection) -> Result<Vec<FolderRow>> {
    let mut stmt = conn.prepare("SELECT id, name, parent_id FROM folders ORDER BY name")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(FolderRow {
                id: row.get(0)?,
                name: row.get(1)?,
                parent_id: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn load_memberships(conn: &Connection) -> Result<HashMap<String, Vec<String>>> {
    let mut stmt =
        conn.prepare("SELECT folder_id, track_id FROM track_folders ORDER BY rowid")?;
    let mut memberships: HashMap<String, Vec<String>> = HashMap::new();
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    for row in rows {
        let (folder_id, track_id) = row?;
        memberships.entry(folder_id).or_default().push(track_id);
    }
    Ok(memberships)
}

/// Attach every folder whose parent is `parent`, recursing into children.
/// Rows forming a cycle are unreachable from the roots and simply never
/// appear; the depth cap guards pathological chains.
fn build_level(
    rows: &[FolderRow],
    memberships: &HashMap<String, Vec<String>>,
    parent: Option<&str>,
    depth: u32,
) -> Vec<Folder> {
    if depth > MAX_FOLDER_DEPTH {
        log::warn!("folder hierarchy deeper than {}, truncating", MAX_FOLDER_DEPTH);
        return Vec::new();
    }
    rows.iter()
        .filter(|row| row.parent_id.as_deref() == parent)
        .map(|row| Folder {
            id: row.id.clone(),
            name: row.name.clone(),
            parent_id: row.parent_id.clone(),
            sub_folders: build_level(rows, memberships, Some(&row.id), depth + 1),
            track_ids: memberships.get(&row.id).cloned().unwrap_or_default(),
        })
        .collect()
}

fn ensure_folder_exists(conn: &Connection, id: &str) -> Result<()> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM folders WHERE id = ?", [id], |row| {
        row.get(0)
    })?;
    if count == 0 {
        return Err(Error::FolderNotFound(id.to_string()));
    }
    Ok(())
}

/// Walk the ancestor chain of `parent_id`; if `folder_id` appears, the
/// reparent would create a cycle.
fn ensure_no_cycle(conn: &Connection, folder_id: &str, parent_id: &str) -> Result<()> {
    let cycle_err = || Error::FolderCycle {
        folder_id: folder_id.to_string(),
        parent_id: parent_id.to_string(),
    };

    if folder_id == parent_id {
        return Err(cycle_err());
    }
    let mut current = Some(parent_id.to_string());
    let mut depth = 0;
    while let Some(ancestor) = current {
        if ancestor == folder_id {
            return Err(cycle_err());
        }
        depth += 1;
        if depth > MAX_FOLDER_DEPTH {
            log::warn!("ancestry walk exceeded {} levels, assuming cycle", MAX_FOLDER_DEPTH);
            return Err(cycle_err());
        }
        current = conn
            .query_row(
                "SELECT parent_id FROM folders WHERE id = ?",
                [&ancestor],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?
            .flatten();
    }
    Ok(())
}

// ============================================================================
// Id minting
// ============================================================================

/// Opaque unique id: prefix, epoch millis, process-unique counter.
fn mint_id(prefix: &str) -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}_{}__{:05}", prefix, ts, n % 100_000)
}
