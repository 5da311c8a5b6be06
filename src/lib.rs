//! Maptracks - track ingestion and storage core for a map viewer
//!
//! This crate provides:
//! - GPX and GeoJSON codecs with a tolerant decode contract
//! - SQLite persistence for tracks, points and the folder hierarchy
//! - Named configuration profiles with an observable active config
//! - A thin repository facade tying codecs and storage together

pub mod codecs;
pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod platform;
pub mod repository;
pub mod store;
pub mod types;

pub use codecs::ParseDiagnostic;
pub use config::{ActiveConfig, ConfigStore, ACTIVE_PROFILE};
pub use db::Database;
pub use error::{Error, Result};
pub use jobs::JobHandle;
pub use platform::{ConfigOverlay, FileAccess};
pub use repository::TrackRepository;
pub use store::TrackStore;
pub use types::{
    Config, Folder, LineStyle, Theme, Track, TrackFormat, TrackPoint, TrackSegment,
};
