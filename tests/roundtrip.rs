//! Storage round-trip tests.
//!
//! Covers the critical invariants: segment/point structure survives the
//! flat row store, re-saving is an idempotent replace, and the folder
//! forest reconstructs from rows.

use maptracks::{
    Database, Error, LineStyle, Track, TrackPoint, TrackSegment, TrackStore,
};

/// Helper: store over a fresh in-memory database.
fn setup_store() -> TrackStore {
    TrackStore::new(Database::in_memory().expect("failed to open in-memory db"))
}

fn two_segment_track() -> Track {
    Track::new("Ridge Loop").with_segments(vec![
        TrackSegment::new(vec![
            TrackPoint {
                latitude: 45.0,
                longitude: -122.0,
                elevation: Some(100.0),
                time: Some(1_000),
            },
            TrackPoint {
                latitude: 45.1,
                longitude: -122.1,
                elevation: Some(110.0),
                time: Some(2_000),
            },
        ]),
        TrackSegment::new(vec![TrackPoint::new(45.2, -122.2)]),
    ])
}

// ============================================================================
// Track round trip
// ============================================================================

#[test]
fn test_save_and_load_preserves_structure() {
    let store = setup_store();
    let track = two_segment_track();

    let id = store.save_track(&track).unwrap();
    assert!(!id.is_empty(), "save must mint a non-empty id");

    let all = store.get_all_tracks().unwrap();
    assert_eq!(all.len(), 1);
    let loaded = &all[0];
    assert_eq!(loaded.id, id);
    assert_eq!(loaded.name, track.name);
    assert_eq!(loaded.color, track.color);
    assert_eq!(loaded.line_style, track.line_style);
    assert_eq!(loaded.visible, track.visible);
    assert_eq!(loaded.segments, track.segments);
}

#[test]
fn test_save_preserves_point_order_within_segment() {
    let store = setup_store();
    let points: Vec<TrackPoint> = (0..50)
        .map(|i| TrackPoint::new(45.0 + i as f64 * 0.001, -122.0))
        .collect();
    let track = Track::new("Ordered").with_segments(vec![TrackSegment::new(points.clone())]);

    store.save_track(&track).unwrap();

    let loaded = &store.get_all_tracks().unwrap()[0];
    assert_eq!(loaded.segments[0].points, points);
}

#[test]
fn test_resave_replaces_points_without_duplication() {
    let store = setup_store();
    let id = store.save_track(&two_segment_track()).unwrap();

    let second = Track {
        id: id.clone(),
        ..Track::new("Ridge Loop v2").with_segments(vec![TrackSegment::new(vec![
            TrackPoint::new(50.0, 10.0),
            TrackPoint::new(50.1, 10.1),
            TrackPoint::new(50.2, 10.2),
        ])])
    };
    let second_id = store.save_track(&second).unwrap();
    assert_eq!(second_id, id, "id must be stable across re-saves");

    let all = store.get_all_tracks().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].name, "Ridge Loop v2");
    assert_eq!(all[0].segments.len(), 1);
    assert_eq!(all[0].segments[0].points.len(), 3);
    assert_eq!(all[0].segments[0].points[0].latitude, 50.0);
}

#[test]
fn test_visibility_filter_and_update() {
    let store = setup_store();
    let shown = store.save_track(&two_segment_track()).unwrap();
    let hidden = store
        .save_track(&two_segment_track().with_segments(vec![TrackSegment::new(vec![
            TrackPoint::new(1.0, 2.0),
        ])]))
        .unwrap();

    store.update_track_visibility(&hidden, false).unwrap();

    let visible = store.get_visible_tracks().unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, shown);

    // Unknown id is a no-op, not an error.
    store.update_track_visibility("missing", false).unwrap();
}

#[test]
fn test_style_update_leaves_points_alone() {
    let store = setup_store();
    let id = store.save_track(&two_segment_track()).unwrap();

    store
        .update_track_style(&id, "#FF0000", LineStyle::Dashed)
        .unwrap();

    let loaded = store.get_track(&id).unwrap().unwrap();
    assert_eq!(loaded.color, "#FF0000");
    assert_eq!(loaded.line_style, LineStyle::Dashed);
    assert_eq!(loaded.segments, two_segment_track().segments);
}

#[test]
fn test_delete_track_removes_points_and_memberships() {
    let store = setup_store();
    let id = store.save_track(&two_segment_track()).unwrap();
    let folder = store.create_folder("Rides", None).unwrap();
    store
        .add_tracks_to_folder(&[id.clone()], &folder)
        .unwrap();

    store.delete_track(&id).unwrap();

    assert!(store.get_all_tracks().unwrap().is_empty());
    assert!(store.get_track(&id).unwrap().is_none());
    let hierarchy = store.get_folder_hierarchy().unwrap();
    assert!(hierarchy[0].track_ids.is_empty());
}

// ============================================================================
// Folder forest
// ============================================================================

#[test]
fn test_folder_hierarchy_round_trip() {
    let store = setup_store();
    let a = store.create_folder("A", None).unwrap();
    let b = store.create_folder("B", Some(&a)).unwrap();
    let t1 = store.save_track(&two_segment_track()).unwrap();
    store.add_tracks_to_folder(&[t1.clone()], &b).unwrap();

    let roots = store.get_folder_hierarchy().unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].id, a);
    assert_eq!(roots[0].sub_folders.len(), 1);
    assert_eq!(roots[0].sub_folders[0].id, b);
    assert_eq!(roots[0].sub_folders[0].track_ids, vec![t1]);
}

#[test]
fn test_folders_for_track_is_flat() {
    let store = setup_store();
    let a = store.create_folder("Alpha", None).unwrap();
    let b = store.create_folder("Beta", Some(&a)).unwrap();
    let id = store.save_track(&two_segment_track()).unwrap();
    store
        .add_tracks_to_folder(&[id.clone()], &a)
        .unwrap();
    store
        .add_tracks_to_folder(&[id.clone()], &b)
        .unwrap();

    let folders = store.get_folders_for_track(&id).unwrap();
    assert_eq!(folders.len(), 2);
    assert!(folders.iter().all(|f| f.sub_folders.is_empty()));
}

#[test]
fn test_membership_add_is_idempotent() {
    let store = setup_store();
    let folder = store.create_folder("Rides", None).unwrap();
    let id = store.save_track(&two_segment_track()).unwrap();

    store
        .add_tracks_to_folder(&[id.clone()], &folder)
        .unwrap();
    store
        .add_tracks_to_folder(&[id.clone()], &folder)
        .unwrap();

    let hierarchy = store.get_folder_hierarchy().unwrap();
    assert_eq!(hierarchy[0].track_ids.len(), 1);

    store
        .remove_tracks_from_folder(&[id.clone()], &folder)
        .unwrap();
    let hierarchy = store.get_folder_hierarchy().unwrap();
    assert!(hierarchy[0].track_ids.is_empty());
}

#[test]
fn test_delete_folder_reparents_children_to_grandparent() {
    let store = setup_store();
    let a = store.create_folder("A", None).unwrap();
    let b = store.create_folder("B", Some(&a)).unwrap();
    let c = store.create_folder("C", Some(&b)).unwrap();

    store.delete_folder(&b).unwrap();

    let roots = store.get_folder_hierarchy().unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].id, a);
    assert_eq!(roots[0].sub_folders.len(), 1);
    assert_eq!(roots[0].sub_folders[0].id, c);
}

#[test]
fn test_delete_root_folder_promotes_children_to_roots() {
    let store = setup_store();
    let a = store.create_folder("A", None).unwrap();
    let b = store.create_folder("B", Some(&a)).unwrap();

    store.delete_folder(&a).unwrap();

    let roots = store.get_folder_hierarchy().unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].id, b);
    assert_eq!(roots[0].parent_id, None);
}

#[test]
fn test_reparent_rejects_cycles() {
    let store = setup_store();
    let a = store.create_folder("A", None).unwrap();
    let b = store.create_folder("B", Some(&a)).unwrap();
    let c = store.create_folder("C", Some(&b)).unwrap();

    // Moving A under its grandchild would make A its own ancestor.
    let result = store.update_folder_parent(&a, Some(&c));
    assert!(matches!(result, Err(Error::FolderCycle { .. })));

    // A folder can never be its own parent.
    let result = store.update_folder_parent(&a, Some(&a));
    assert!(matches!(result, Err(Error::FolderCycle { .. })));

    // The hierarchy is untouched after the rejections.
    let roots = store.get_folder_hierarchy().unwrap();
    assert_eq!(roots[0].id, a);
}

#[test]
fn test_reparent_to_unknown_folder_is_rejected() {
    let store = setup_store();
    let a = store.create_folder("A", None).unwrap();

    let result = store.update_folder_parent(&a, Some("missing"));
    assert!(matches!(result, Err(Error::FolderNotFound(_))));
}

#[test]
fn test_reparent_to_root_and_rename() {
    let store = setup_store();
    let a = store.create_folder("A", None).unwrap();
    let b = store.create_folder("B", Some(&a)).unwrap();

    store.update_folder_parent(&b, None).unwrap();
    store.update_folder_name(&b, "B renamed").unwrap();

    let roots = store.get_folder_hierarchy().unwrap();
    assert_eq!(roots.len(), 2);
    assert!(roots.iter().any(|f| f.name == "B renamed"));
}
