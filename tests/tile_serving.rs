//! Resolving viewer requests against generated pyramids.

mod common;

use common::{Workspace, plans, source};
use floorplan_tiles::store::content_type;

fn generated() -> (Workspace, floorplan_tiles::TilePipeline) {
    let ws = Workspace::new();
    let plan = plans::gradient_png(&ws.sources_dir(), "serve.png", 256, 128);
    let pipeline = ws.pipeline(128, 1);
    assert!(pipeline.generate(&source(9, &plan), false).success);
    (ws, pipeline)
}

#[test]
fn test_resolves_descriptor_and_tiles() {
    let (_ws, pipeline) = generated();
    let store = pipeline.store();

    let dzi = store.resolve(9, "floor-9.dzi").unwrap();
    assert_eq!(content_type(&dzi), "application/xml");
    assert!(std::fs::read_to_string(&dzi).unwrap().contains("TileSize=\"128\""));

    let tile = store.resolve(9, "floor-9_files/8/1_0.png").unwrap();
    assert_eq!(content_type(&tile), "image/png");
    assert!(tile.ends_with("floor-9_files/8/1_0.png"));
}

#[test]
fn test_rejects_traversal() {
    let (_ws, pipeline) = generated();
    let store = pipeline.store();

    for bad in [
        "../floor-9/floor-9.dzi",
        "floor-9_files/../../secret",
        "/etc/passwd",
        "floor-9_files\\..\\..\\x",
        "",
    ] {
        let err = store.resolve(9, bad).unwrap_err();
        assert_eq!(err.category(), "invalid_tile_path", "{:?}", bad);
    }
}

#[test]
fn test_unknown_tiles_are_not_found() {
    let (_ws, pipeline) = generated();
    let store = pipeline.store();

    let err = store.resolve(9, "floor-9_files/8/7_7.png").unwrap_err();
    assert_eq!(err.category(), "tile_not_found");
    let err = store.resolve(42, "floor-42.dzi").unwrap_err();
    assert_eq!(err.category(), "tile_not_found");
    // Directories are not servable.
    let err = store.resolve(9, "floor-9_files/8").unwrap_err();
    assert_eq!(err.category(), "tile_not_found");
}

#[cfg(unix)]
#[test]
fn test_symlink_out_of_floor_is_rejected() {
    let (ws, pipeline) = generated();
    let outside = ws.dir.path().join("outside.txt");
    std::fs::write(&outside, "secret").unwrap();
    let link = pipeline.store().floor_dir(9).join("leak.png");
    std::os::unix::fs::symlink(&outside, &link).unwrap();

    let err = pipeline.store().resolve(9, "leak.png").unwrap_err();
    assert_eq!(err.category(), "invalid_tile_path");
}
