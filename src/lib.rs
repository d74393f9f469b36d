//! # Floor Plan Tiles
//!
//! Converts floor plan sources (single-page documents or large raster images)
//! into Deep Zoom tile pyramids, and manages the resulting tile cache.
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//! - `source`: Decode or rasterize a source into one RGBA base raster
//! - `processing`: Pyramid levels, tile slicing and the `.dzi` descriptor
//! - `core`: Working-set accounting and generation statistics
//! - `store`: On-disk tile trees, staged replacement and safe tile lookup
//! - `pipeline`: Single-floor generate / regenerate / clear
//! - `batch`: Sequential multi-floor runs with failure isolation
//! - `queue`: Keyed background jobs, at most one per floor
//! - `config`: Tiling configuration and floor manifests
//!
//! Resampling kernels and level geometry live in the [`tile_scale`] crate.
//!
//! ## Features
//!
//! - **Bounded memory**: one level bitmap and one tile buffer alive at a time
//! - **Atomic regeneration**: a new pyramid replaces the old one only once complete
//! - **Traversal-safe serving**: tile lookups cannot leave the floor's directory
//! - **PDF sources**: with the `pdf` feature, via PDFium
//!
//! ## Example
//!
//! ```rust,no_run
//! use floorplan_tiles::{FloorPlanSource, TilePipeline, TilingConfig};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = TilePipeline::new(TilingConfig::default().with_tiles_root("tiles"))?;
//! let source = FloorPlanSource::new(3, "plans/level-3.png", 300)?;
//!
//! let report = pipeline.generate(&source, false);
//! println!("{}", report.message);
//!
//! let tile = pipeline.store().resolve(3, "floor-3_files/0/0_0.png")?;
//! # let _ = tile;
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod processing;
pub mod queue;
pub mod source;
pub mod store;

pub use tile_scale;

/// Re-export error types for convenience
pub use error::{ErrorSeverity, Retryable, TileError, TileResult};

pub use batch::{BatchMode, BatchOrchestrator, BatchReport};
pub use config::{FloorManifest, TileFormat, TilingConfig};
pub use crate::core::{BatchSummary, GenerationStats};
pub use pipeline::{GenerationReport, TilePipeline};
pub use processing::PyramidDescriptor;
pub use queue::{ConflictPolicy, GenerationHandle, GenerationQueue, JobKind};
pub use source::{BaseRaster, DefaultLoader, FloorPlanSource, SourceKind, SourceLoader};
pub use store::{PyramidStatus, StoreStatistics, TileStore};
