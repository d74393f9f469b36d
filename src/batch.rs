//! # Batch Orchestrator
//!
//! Runs the pipeline over many floors, strictly one at a time. A floor's
//! failure is recorded and the batch moves on; floors whose source file is
//! missing are skipped with a warning. The batch always finishes with a
//! [`BatchSummary`].

use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use crate::core::stats::BatchSummary;
use crate::error::{TileError, TileResult};
use crate::pipeline::{GenerationReport, TilePipeline};
use crate::source::FloorPlanSource;

/// What a batch does with floors that already have a pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchMode {
    /// Reuse healthy pyramids unless `force`.
    Generate { force: bool },
    /// Rebuild every floor.
    #[default]
    Regenerate,
}

/// Per-floor reports plus the aggregate.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub reports: Vec<GenerationReport>,
    pub summary: BatchSummary,
}

impl BatchReport {
    /// Ids of floors that failed (skipped floors excluded).
    pub fn failed_floors(&self) -> Vec<u32> {
        self.reports
            .iter()
            .filter(|r| !r.success && !r.skipped)
            .map(|r| r.floor_id)
            .collect()
    }

    /// `Err(PartialGenerationFailure)` if any floor failed.
    pub fn ensure_clean(&self) -> TileResult<()> {
        let failed = self.failed_floors();
        if failed.is_empty() {
            Ok(())
        } else {
            Err(TileError::partial_generation(failed, self.summary.total))
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchOrchestrator {
    pipeline: TilePipeline,
    mode: BatchMode,
}

impl BatchOrchestrator {
    pub fn new(pipeline: TilePipeline, mode: BatchMode) -> Self {
        Self { pipeline, mode }
    }

    pub fn pipeline(&self) -> &TilePipeline {
        &self.pipeline
    }

    /// Process `sources` in order. Never aborts early.
    pub fn run(&self, sources: &[FloorPlanSource]) -> BatchReport {
        let started = Instant::now();
        let mut summary = BatchSummary {
            total: sources.len(),
            ..BatchSummary::default()
        };
        let mut reports = Vec::with_capacity(sources.len());

        info!(floors = sources.len(), mode = ?self.mode, "batch started");

        for (index, source) in sources.iter().enumerate() {
            info!(
                floor_id = source.floor_id,
                position = index + 1,
                total = sources.len(),
                "processing floor"
            );

            let report = if !source.path.is_file() {
                warn!(
                    floor_id = source.floor_id,
                    path = %source.path.display(),
                    "source not found, skipping"
                );
                GenerationReport::skipped(
                    source.floor_id,
                    format!("source file not found: {}", source.path.display()),
                )
            } else {
                match self.mode {
                    BatchMode::Generate { force } => self.pipeline.generate(source, force),
                    BatchMode::Regenerate => self.pipeline.regenerate(source),
                }
            };

            if report.skipped {
                summary.skipped += 1;
            } else if !report.success {
                summary.failed += 1;
            } else if report.cached {
                summary.cached += 1;
            } else {
                summary.succeeded += 1;
            }
            summary.total_tiles += report.tiles_written();
            reports.push(report);
        }

        summary.elapsed = started.elapsed();
        info!(
            succeeded = summary.succeeded,
            cached = summary.cached,
            skipped = summary.skipped,
            failed = summary.failed,
            total_tiles = summary.total_tiles,
            elapsed_s = summary.elapsed.as_secs_f64(),
            "batch finished"
        );

        BatchReport { reports, summary }
    }
}
