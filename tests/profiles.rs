//! Config profile tests: isolation between profiles, switching, the
//! protected active profile, and the environment overlay.

use maptracks::{Config, ConfigOverlay, ConfigStore, Database, ACTIVE_PROFILE};

fn setup_store() -> ConfigStore {
    ConfigStore::new(Database::in_memory().expect("failed to open in-memory db"))
        .expect("failed to create config store")
}

fn config_with_zoom(zoom: i32) -> Config {
    Config {
        default_zoom: zoom,
        ..Config::default()
    }
}

#[test]
fn test_profiles_are_isolated() {
    let store = setup_store();

    store
        .save_config(&config_with_zoom(15), "hiking")
        .unwrap();

    // The active profile keeps its own value.
    assert_eq!(store.load_config(ACTIVE_PROFILE).default_zoom, 12);
    assert_eq!(store.load_config("hiking").default_zoom, 15);
}

#[test]
fn test_switch_profile_copies_into_active() {
    let store = setup_store();
    store
        .save_config(&config_with_zoom(15), "hiking")
        .unwrap();

    store.switch_profile("hiking").unwrap();

    assert_eq!(store.load_config(ACTIVE_PROFILE).default_zoom, 15);
    assert_eq!(store.active().get().default_zoom, 15);
    // The source profile still exists unchanged.
    assert_eq!(store.load_config("hiking").default_zoom, 15);
    assert!(store
        .get_all_profiles()
        .unwrap()
        .contains(&"hiking".to_string()));
}

#[test]
fn test_active_profile_cannot_be_deleted() {
    let store = setup_store();

    store.delete_profile(ACTIVE_PROFILE).unwrap();

    let profiles = store.get_all_profiles().unwrap();
    assert!(profiles.contains(&ACTIVE_PROFILE.to_string()));
}

#[test]
fn test_delete_removes_other_profiles() {
    let store = setup_store();
    store
        .save_config(&config_with_zoom(9), "city")
        .unwrap();
    assert!(store.get_all_profiles().unwrap().contains(&"city".to_string()));

    store.delete_profile("city").unwrap();

    assert!(!store.get_all_profiles().unwrap().contains(&"city".to_string()));
    // Deleted profiles load as defaults again.
    assert_eq!(store.load_config("city"), Config::default());
}

#[test]
fn test_profiles_survive_reopen() {
    let tmp_dir = tempfile::TempDir::new().expect("failed to create temp dir");
    let db_path = tmp_dir.path().join("config.db");
    let path = db_path.to_str().unwrap();

    {
        let store = ConfigStore::new(Database::open(path).unwrap()).unwrap();
        store
            .save_config(&config_with_zoom(18), "detail")
            .unwrap();
    }

    let store = ConfigStore::new(Database::open(path).unwrap()).unwrap();
    assert_eq!(store.load_config("detail").default_zoom, 18);
}

// ============================================================================
// Overlay
// ============================================================================

struct FixedOverlay(Config);

impl ConfigOverlay for FixedOverlay {
    fn read_overlay(&self) -> Option<Config> {
        Some(self.0.clone())
    }
}

struct EmptyOverlay;

impl ConfigOverlay for EmptyOverlay {
    fn read_overlay(&self) -> Option<Config> {
        None
    }
}

#[test]
fn test_overlay_fully_replaces_active_profile() {
    let db = Database::in_memory().unwrap();
    // A stored active profile the overlay should shadow entirely.
    {
        let plain = ConfigStore::new(db.clone()).unwrap();
        plain
            .save_config(&config_with_zoom(15), ACTIVE_PROFILE)
            .unwrap();
    }

    let overlay = Config {
        default_zoom: 4,
        offline_mode: true,
        ..Config::default()
    };
    let store = ConfigStore::with_overlay(db, Box::new(FixedOverlay(overlay.clone()))).unwrap();

    // Last-writer-wins: every field comes from the overlay, including the
    // ones the stored profile had customized.
    assert_eq!(store.load_config(ACTIVE_PROFILE), overlay);
    assert_eq!(store.active().get(), overlay);
}

#[test]
fn test_overlay_does_not_touch_other_profiles() {
    let db = Database::in_memory().unwrap();
    let store = ConfigStore::with_overlay(
        db,
        Box::new(FixedOverlay(config_with_zoom(4))),
    )
    .unwrap();
    store
        .save_config(&config_with_zoom(15), "hiking")
        .unwrap();

    assert_eq!(store.load_config("hiking").default_zoom, 15);
}

#[test]
fn test_absent_overlay_falls_back_to_stored_value() {
    let db = Database::in_memory().unwrap();
    {
        let plain = ConfigStore::new(db.clone()).unwrap();
        plain
            .save_config(&config_with_zoom(15), ACTIVE_PROFILE)
            .unwrap();
    }

    let store = ConfigStore::with_overlay(db, Box::new(EmptyOverlay)).unwrap();
    assert_eq!(store.load_config(ACTIVE_PROFILE).default_zoom, 15);
}
