//! # Configuration Module
//!
//! This module provides the tiling configuration passed into every run and the
//! floor manifest consumed by batch runs.

pub mod config;
pub mod manifest;

pub use config::{TileFormat, TilingConfig};
pub use manifest::{FloorManifest, ManifestEntry};
