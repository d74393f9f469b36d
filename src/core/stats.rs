//! # Generation Statistics
//!
//! Figures reported after a floor is tiled and after a batch finishes. Both
//! types serialize to JSON so the CLI can print machine-readable reports.

use std::time::Duration;

use serde::Serialize;

/// Measurements of a single floor's generation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerationStats {
    /// Native width of the base raster in pixels
    pub width: u32,
    /// Native height of the base raster in pixels
    pub height: u32,
    /// Number of pyramid levels (`max_level + 1`)
    pub levels: u32,
    /// Tiles written
    pub total_tiles: u64,
    /// Bytes of tile files written
    pub bytes_written: u64,
    /// Wall-clock time of the run
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
    /// Highest simultaneous bytes held in pixel buffers
    pub peak_working_set_bytes: u64,
}

impl GenerationStats {
    /// Tiles written per second of wall-clock time.
    pub fn tiles_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= f64::EPSILON {
            0.0
        } else {
            self.total_tiles as f64 / secs
        }
    }

    /// Megapixels of the native raster.
    pub fn megapixels(&self) -> f64 {
        f64::from(self.width) * f64::from(self.height) / 1_000_000.0
    }
}

/// Aggregate of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    /// Floors submitted to the batch
    pub total: usize,
    /// Floors whose pyramid was (re)built
    pub succeeded: usize,
    /// Floors that failed for a reason other than a missing source
    pub failed: usize,
    /// Floors skipped because their source was missing
    pub skipped: usize,
    /// Floors whose existing pyramid was reused
    pub cached: usize,
    /// Tiles written across the batch
    pub total_tiles: u64,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

impl BatchSummary {
    /// True when nothing failed. Skipped floors do not count as failures.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    /// One-line human-readable summary.
    pub fn describe(&self) -> String {
        format!(
            "{} floors: {} generated, {} cached, {} skipped, {} failed, {} tiles in {:.1}s",
            self.total,
            self.succeeded,
            self.cached,
            self.skipped,
            self.failed,
            self.total_tiles,
            self.elapsed.as_secs_f64()
        )
    }
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }
}
