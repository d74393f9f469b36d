//! # Generation Queue
//!
//! Runs pipeline jobs on Tokio's blocking pool, keyed by floor id, so that at
//! most one writer exists per floor at any time.
//!
//! ```text
//! submit(floor 3) ──┐                        ┌──► handle A ─┐
//!                   ├──► in-flight map ──────┤               ├─► same report
//! submit(floor 3) ──┘    (floor → watch rx)  └──► handle B ─┘   (Coalesce)
//! ```
//!
//! A second submission for a floor that is still running is either rejected
//! with `ConcurrentGenerationConflict` ([`ConflictPolicy::Reject`]) or
//! attached to the running job ([`ConflictPolicy::Coalesce`]). Different
//! floors run independently.
//!
//! The in-flight entry is removed before the result is published, so a
//! caller that observes a finished handle can immediately submit again.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{Retryable, TileError, TileResult};
use crate::pipeline::{GenerationReport, TilePipeline};
use crate::source::FloorPlanSource;

/// What to do when a floor is submitted while already running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Fail the submission with `ConcurrentGenerationConflict`.
    #[default]
    Reject,
    /// Hand back a handle to the running job.
    Coalesce,
}

/// Kind of job to run for a floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Generate { force: bool },
    Regenerate,
}

/// Counters for monitoring the queue.
#[derive(Debug, Default)]
pub struct QueueStats {
    pub submitted: AtomicU64,
    pub started: AtomicU64,
    pub coalesced: AtomicU64,
    pub rejected: AtomicU64,
}

type InFlight = Arc<Mutex<HashMap<u32, watch::Receiver<Option<GenerationReport>>>>>;

fn lock(map: &InFlight) -> MutexGuard<'_, HashMap<u32, watch::Receiver<Option<GenerationReport>>>> {
    map.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Removes a floor's in-flight entry when the job ends, including by panic.
struct InFlightEntry {
    map: InFlight,
    floor_id: u32,
}

impl Drop for InFlightEntry {
    fn drop(&mut self) {
        lock(&self.map).remove(&self.floor_id);
    }
}

/// Keyed background runner for [`TilePipeline`] jobs.
#[derive(Debug, Clone)]
pub struct GenerationQueue {
    pipeline: TilePipeline,
    policy: ConflictPolicy,
    in_flight: InFlight,
    stats: Arc<QueueStats>,
}

impl GenerationQueue {
    pub fn new(pipeline: TilePipeline, policy: ConflictPolicy) -> Self {
        Self {
            pipeline,
            policy,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            stats: Arc::new(QueueStats::default()),
        }
    }

    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }

    /// Whether a job for `floor_id` is running.
    pub fn is_running(&self, floor_id: u32) -> bool {
        lock(&self.in_flight).contains_key(&floor_id)
    }

    /// Floors with a running job, ascending.
    pub fn running(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = lock(&self.in_flight).keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Start `job` for `source` in the background.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// `ConcurrentGenerationConflict` if the floor is already running and the
    /// policy is [`ConflictPolicy::Reject`].
    pub fn submit(&self, source: FloorPlanSource, job: JobKind) -> TileResult<GenerationHandle> {
        let floor_id = source.floor_id;
        self.stats.submitted.fetch_add(1, Ordering::Relaxed);

        let tx = {
            let mut map = lock(&self.in_flight);
            if let Some(rx) = map.get(&floor_id) {
                return match self.policy {
                    ConflictPolicy::Reject => {
                        self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                        let err = TileError::concurrent_generation(floor_id);
                        warn!(
                            floor_id,
                            retry_after_ms = err.retry_delay_ms(),
                            "generation already in progress, rejecting"
                        );
                        Err(err)
                    }
                    ConflictPolicy::Coalesce => {
                        self.stats.coalesced.fetch_add(1, Ordering::Relaxed);
                        debug!(floor_id, "generation already in progress, coalescing");
                        Ok(GenerationHandle {
                            floor_id,
                            rx: rx.clone(),
                            coalesced: true,
                        })
                    }
                };
            }
            let (tx, rx) = watch::channel(None);
            map.insert(floor_id, rx);
            tx
        };

        let rx = tx.subscribe();
        let entry = InFlightEntry {
            map: Arc::clone(&self.in_flight),
            floor_id,
        };
        let pipeline = self.pipeline.clone();
        self.stats.started.fetch_add(1, Ordering::Relaxed);
        debug!(floor_id, ?job, "generation job started");

        tokio::task::spawn_blocking(move || {
            let report = match job {
                JobKind::Generate { force } => pipeline.generate(&source, force),
                JobKind::Regenerate => pipeline.regenerate(&source),
            };
            drop(entry);
            // Receivers may all be gone; the report is still in the logs.
            let _ = tx.send(Some(report));
        });

        Ok(GenerationHandle {
            floor_id,
            rx,
            coalesced: false,
        })
    }
}

/// Caller's view of a queued job.
#[derive(Debug, Clone)]
pub struct GenerationHandle {
    floor_id: u32,
    rx: watch::Receiver<Option<GenerationReport>>,
    coalesced: bool,
}

impl GenerationHandle {
    pub fn floor_id(&self) -> u32 {
        self.floor_id
    }

    /// This handle was attached to a job another caller started.
    pub fn is_coalesced(&self) -> bool {
        self.coalesced
    }

    /// The job has produced a report or died without one.
    pub fn is_finished(&self) -> bool {
        self.rx.borrow().is_some() || self.rx.has_changed().is_err()
    }

    /// Wait for the job's report.
    pub async fn wait(&mut self) -> GenerationReport {
        let floor_id = self.floor_id;
        match self.rx.wait_for(Option::is_some).await {
            Ok(report) => report.clone().unwrap_or_else(|| aborted(floor_id)),
            Err(_) => aborted(floor_id),
        }
    }

    /// Wait at most `timeout`; `None` if the job is still running.
    pub async fn wait_timeout(&mut self, timeout: Duration) -> Option<GenerationReport> {
        tokio::time::timeout(timeout, self.wait()).await.ok()
    }
}

fn aborted(floor_id: u32) -> GenerationReport {
    let error = TileError::output_write(
        format!("floor-{}", floor_id),
        "generation task ended without a report",
    );
    GenerationReport::failed(floor_id, &error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{TileFormat, TilingConfig};
    use crate::source::{BaseRaster, SourceKind, SourceLoader};
    use std::path::PathBuf;
    use std::sync::Condvar;

    /// Blocks every load until the gate is opened.
    #[derive(Default)]
    struct GatedLoader {
        gate: Mutex<bool>,
        cv: Condvar,
    }

    impl GatedLoader {
        fn open(&self) {
            *self.gate.lock().unwrap() = true;
            self.cv.notify_all();
        }
    }

    impl SourceLoader for GatedLoader {
        fn load(&self, _source: &FloorPlanSource) -> TileResult<BaseRaster> {
            let mut open = self.gate.lock().unwrap();
            while !*open {
                open = self.cv.wait(open).unwrap();
            }
            BaseRaster::new(40, 40, vec![200; 40 * 40 * 4])
        }

        fn supports(&self, _kind: SourceKind) -> bool {
            true
        }
    }

    fn queue(root: &std::path::Path, policy: ConflictPolicy) -> (GenerationQueue, Arc<GatedLoader>) {
        let loader = Arc::new(GatedLoader::default());
        let config = TilingConfig::new(root, 16, 0, 300, TileFormat::Png);
        let pipeline = TilePipeline::with_loader(config, loader.clone()).unwrap();
        (GenerationQueue::new(pipeline, policy), loader)
    }

    fn source(id: u32) -> FloorPlanSource {
        FloorPlanSource {
            floor_id: id,
            path: PathBuf::from("gated.png"),
            kind: SourceKind::Raster,
            dpi: 300,
        }
    }

    #[tokio::test]
    async fn reject_policy_refuses_duplicate_floor() {
        let root = tempfile::tempdir().unwrap();
        let (queue, loader) = queue(root.path(), ConflictPolicy::Reject);

        let mut first = queue.submit(source(1), JobKind::Regenerate).unwrap();
        let err = queue.submit(source(1), JobKind::Regenerate).unwrap_err();
        assert_eq!(err.category(), "concurrent_generation");
        assert!(err.is_retryable());
        assert!(queue.is_running(1));

        // Other floors are independent.
        let mut other = queue.submit(source(2), JobKind::Regenerate).unwrap();
        assert_eq!(queue.running(), vec![1, 2]);

        assert!(first.wait_timeout(Duration::from_millis(50)).await.is_none());
        loader.open();
        let report = first.wait().await;
        assert!(report.success, "{:?}", report);
        assert!(other.wait().await.success);
        assert!(first.is_finished());

        assert!(!queue.is_running(1));
        let mut again = queue.submit(source(1), JobKind::Generate { force: false }).unwrap();
        assert!(again.wait().await.cached);
        assert_eq!(queue.stats().rejected.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn coalesce_policy_shares_one_run() {
        let root = tempfile::tempdir().unwrap();
        let (queue, loader) = queue(root.path(), ConflictPolicy::Coalesce);

        let mut first = queue.submit(source(5), JobKind::Regenerate).unwrap();
        let mut second = queue.submit(source(5), JobKind::Regenerate).unwrap();
        assert!(!first.is_coalesced());
        assert!(second.is_coalesced());
        assert_eq!(second.floor_id(), 5);

        loader.open();
        let a = first.wait().await;
        let b = second.wait().await;
        assert_eq!(a, b);
        assert_eq!(queue.stats().started.load(Ordering::Relaxed), 1);
        assert_eq!(queue.stats().coalesced.load(Ordering::Relaxed), 1);
    }
}
