//! Batch runs from a manifest, with per-floor failure isolation.

mod common;

use common::{Workspace, plans, source};
use floorplan_tiles::batch::{BatchMode, BatchOrchestrator};
use floorplan_tiles::config::FloorManifest;

#[test]
fn test_batch_isolates_failures() {
    let ws = Workspace::new();
    let dir = ws.sources_dir();
    plans::gradient_png(&dir, "ground.png", 160, 120);
    plans::corrupt_png(&dir, "broken.png");
    plans::grid_png(&dir, "roof.png", 90, 200, 10);

    let manifest_path = dir.join("floors.json");
    std::fs::write(
        &manifest_path,
        r#"{
            "floors": [
                { "floor_id": 1, "source": "ground.png" },
                { "floor_id": 2, "source": "missing.png" },
                { "floor_id": 3, "source": "broken.png" },
                { "floor_id": 4, "source": "roof.png" }
            ]
        }"#,
    )
    .unwrap();

    let manifest = FloorManifest::load(&manifest_path).unwrap();
    let pipeline = ws.pipeline(64, 1);
    let sources = manifest.sources(pipeline.config());
    let batch = BatchOrchestrator::new(pipeline.clone(), BatchMode::Regenerate);
    let report = batch.run(&sources);

    let summary = &report.summary;
    assert_eq!(summary.total, 4);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 1);
    assert!(!summary.is_clean());
    assert_eq!(report.failed_floors(), vec![3]);

    assert!(report.reports[1].skipped);
    assert_eq!(
        report.reports[2].error_category.as_deref(),
        Some("source_unreadable")
    );
    assert_eq!(
        summary.total_tiles,
        report.reports[0].tiles_written() + report.reports[3].tiles_written()
    );

    assert!(pipeline.status(1).healthy);
    assert!(!pipeline.status(2).exists);
    assert!(!pipeline.status(3).exists);
    assert!(pipeline.status(4).healthy);

    let err = report.ensure_clean().unwrap_err();
    assert_eq!(err.category(), "partial_generation");
}

#[test]
fn test_generate_mode_reuses_cached_floors() {
    let ws = Workspace::new();
    let dir = ws.sources_dir();
    let a = plans::gradient_png(&dir, "a.png", 100, 100);
    let b = plans::gradient_png(&dir, "b.png", 50, 80);
    let pipeline = ws.pipeline(32, 0);
    assert!(pipeline.generate(&source(1, &a), false).success);

    let sources = vec![source(1, &a), source(2, &b)];
    let report =
        BatchOrchestrator::new(pipeline.clone(), BatchMode::Generate { force: false }).run(&sources);
    assert_eq!(report.summary.cached, 1);
    assert_eq!(report.summary.succeeded, 1);
    assert!(report.summary.is_clean());
    assert!(report.ensure_clean().is_ok());

    let forced =
        BatchOrchestrator::new(pipeline, BatchMode::Generate { force: true }).run(&sources);
    assert_eq!(forced.summary.succeeded, 2);
    assert_eq!(forced.summary.cached, 0);
}
