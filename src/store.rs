//! # Tile Store
//!
//! On-disk layout and housekeeping of every floor's tile tree:
//!
//! ```text
//! {tiles_root}/floor-{id}/floor-{id}.dzi
//! {tiles_root}/floor-{id}/floor-{id}_files/{level}/{col}_{row}.{ext}
//! ```
//!
//! ## Staged Replacement
//!
//! New pyramids are built in a hidden staging directory inside the tiles
//! root (same filesystem, so the final swap is a rename). [`TileStore::commit`]
//! validates the staged tree (tile count and descriptor), moves the live tree
//! aside, renames the staged tree into place and only then deletes the old
//! tree. Readers see either the complete old pyramid or the complete new one.
//! A staging directory that is never committed is removed when the
//! [`StagedPyramid`] is dropped.
//!
//! ## Serving
//!
//! [`TileStore::resolve`] maps a viewer request to a file inside the floor's
//! directory, rejecting absolute paths, `..` segments and anything whose
//! canonical path leaves the floor's canonical directory (symlinks included).

use std::fs;
use std::path::{Component, Path, PathBuf};

use chrono::Local;
use serde::Serialize;
use tempfile::TempDir;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{TileError, TileResult};
use crate::processing::descriptor::PyramidDescriptor;

const FLOOR_PREFIX: &str = "floor-";
const STAGING_PREFIX: &str = ".floor-";

/// Health report of one floor's pyramid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PyramidStatus {
    pub floor_id: u32,
    /// A descriptor file is present.
    pub exists: bool,
    pub descriptor: Option<PyramidDescriptor>,
    /// Level directories found on disk.
    pub levels: u32,
    /// Tile files found on disk.
    pub tile_count: u64,
    /// Tiles the descriptor's geometry calls for.
    pub expected_tiles: u64,
    /// Bytes used by the floor directory.
    pub disk_bytes: u64,
    /// Descriptor parses and every expected tile is present.
    pub healthy: bool,
}

impl PyramidStatus {
    fn absent(floor_id: u32) -> Self {
        Self {
            floor_id,
            exists: false,
            descriptor: None,
            levels: 0,
            tile_count: 0,
            expected_tiles: 0,
            disk_bytes: 0,
            healthy: false,
        }
    }
}

/// Aggregate figures for the whole tiles root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStatistics {
    pub total_floors: usize,
    pub healthy_floors: usize,
    pub total_tiles: u64,
    pub disk_bytes: u64,
}

/// A pyramid being built outside the live tree.
#[derive(Debug)]
pub struct StagedPyramid {
    floor_id: u32,
    dir: TempDir,
}

impl StagedPyramid {
    pub fn floor_id(&self) -> u32 {
        self.floor_id
    }

    /// Staging stand-in for the floor directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn descriptor_path(&self) -> PathBuf {
        self.dir.path().join(descriptor_name(self.floor_id))
    }

    pub fn files_dir(&self) -> PathBuf {
        self.dir.path().join(files_dir_name(self.floor_id))
    }
}

fn floor_dir_name(floor_id: u32) -> String {
    format!("{}{}", FLOOR_PREFIX, floor_id)
}

fn descriptor_name(floor_id: u32) -> String {
    format!("{}{}.dzi", FLOOR_PREFIX, floor_id)
}

fn files_dir_name(floor_id: u32) -> String {
    format!("{}{}_files", FLOOR_PREFIX, floor_id)
}

/// Parse `floor-{id}` into `id`; backups and other names yield `None`.
fn parse_floor_dir(name: &str) -> Option<u32> {
    let digits = name.strip_prefix(FLOOR_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// MIME type for a served file.
pub fn content_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("dzi") | Some("xml") => "application/xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// Tile files under a `_files` directory: `{level}/{col}_{row}.{ext}`.
fn count_tiles(files_dir: &Path) -> (u32, u64) {
    let mut levels = 0u32;
    let mut tiles = 0u64;
    for entry in WalkDir::new(files_dir)
        .min_depth(1)
        .max_depth(2)
        .into_iter()
        .filter_map(Result::ok)
    {
        let numeric_level = |p: &Path| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.parse::<u32>().is_ok())
        };
        if entry.depth() == 1 && entry.file_type().is_dir() && numeric_level(entry.path()) {
            levels += 1;
        } else if entry.depth() == 2
            && entry.file_type().is_file()
            && entry.path().parent().is_some_and(numeric_level)
        {
            tiles += 1;
        }
    }
    (levels, tiles)
}

fn dir_size(dir: &Path) -> u64 {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

/// Layout and lifecycle of the tile trees under one root.
#[derive(Debug, Clone)]
pub struct TileStore {
    root: PathBuf,
}

impl TileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn floor_dir(&self, floor_id: u32) -> PathBuf {
        self.root.join(floor_dir_name(floor_id))
    }

    pub fn descriptor_path(&self, floor_id: u32) -> PathBuf {
        self.floor_dir(floor_id).join(descriptor_name(floor_id))
    }

    pub fn files_dir(&self, floor_id: u32) -> PathBuf {
        self.floor_dir(floor_id).join(files_dir_name(floor_id))
    }

    /// Read the live descriptor, if one exists and parses.
    pub fn descriptor(&self, floor_id: u32) -> Option<PyramidDescriptor> {
        let path = self.descriptor_path(floor_id);
        if !path.is_file() {
            return None;
        }
        PyramidDescriptor::read(&path).ok()
    }

    /// Inspect one floor. A missing pyramid is reported, not an error.
    pub fn status(&self, floor_id: u32) -> PyramidStatus {
        let descriptor_path = self.descriptor_path(floor_id);
        if !descriptor_path.is_file() {
            return PyramidStatus::absent(floor_id);
        }

        let descriptor = match PyramidDescriptor::read(&descriptor_path) {
            Ok(d) => Some(d),
            Err(e) => {
                warn!(floor_id, error = %e, "descriptor unreadable");
                None
            }
        };
        let (levels, tile_count) = count_tiles(&self.files_dir(floor_id));
        let expected_tiles = descriptor
            .map(|d| d.geometry().total_tiles())
            .unwrap_or(0);

        PyramidStatus {
            floor_id,
            exists: true,
            descriptor,
            levels,
            tile_count,
            expected_tiles,
            disk_bytes: dir_size(&self.floor_dir(floor_id)),
            healthy: descriptor.is_some() && tile_count == expected_tiles,
        }
    }

    /// Map a viewer request to a file inside the floor's directory.
    ///
    /// # Errors
    /// `InvalidTilePath` for absolute paths, `..` segments and paths that
    /// resolve outside the floor directory; `TileNotFound` if no such file exists.
    pub fn resolve(&self, floor_id: u32, requested: &str) -> TileResult<PathBuf> {
        let relative = Path::new(requested);
        let malformed = requested.is_empty()
            || requested.contains('\0')
            || relative.is_absolute()
            || requested.starts_with(['/', '\\'])
            || requested.split(['/', '\\']).any(|segment| segment == "..")
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if malformed {
            warn!(floor_id, requested, "rejected tile path");
            return Err(TileError::invalid_tile_path(floor_id, requested));
        }

        let floor_dir = self.floor_dir(floor_id);
        let floor_canonical = floor_dir
            .canonicalize()
            .map_err(|_| TileError::tile_not_found(floor_id, requested))?;

        let candidate = match floor_dir.join(relative).canonicalize() {
            Ok(p) => p,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TileError::tile_not_found(floor_id, requested));
            }
            Err(e) => return Err(TileError::io_at("resolve tile", floor_dir.join(relative), e)),
        };

        if !candidate.starts_with(&floor_canonical) {
            warn!(floor_id, requested, "tile path escapes floor directory");
            return Err(TileError::invalid_tile_path(floor_id, requested));
        }
        if !candidate.is_file() {
            return Err(TileError::tile_not_found(floor_id, requested));
        }
        Ok(candidate)
    }

    /// Remove one floor's tile tree and any staging leftovers.
    /// Returns whether a live tree existed.
    pub fn clear(&self, floor_id: u32) -> TileResult<bool> {
        let dir = self.floor_dir(floor_id);
        let existed = dir.exists();
        if existed {
            fs::remove_dir_all(&dir).map_err(|e| TileError::io_at("clear floor", &dir, e))?;
            info!(floor_id, "cleared tile cache");
        }
        self.remove_leftovers(Some(floor_id))?;
        Ok(existed)
    }

    /// Remove every floor's tile tree. Returns how many were removed.
    pub fn clear_all(&self) -> TileResult<usize> {
        let mut removed = 0;
        for floor_id in self.floor_ids()? {
            if self.clear(floor_id)? {
                removed += 1;
            }
        }
        self.remove_leftovers(None)?;
        info!(removed, "cleared all tile caches");
        Ok(removed)
    }

    /// Floor ids with a `floor-{id}` directory, ascending.
    pub fn floor_ids(&self) -> TileResult<Vec<u32>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let entries =
            fs::read_dir(&self.root).map_err(|e| TileError::io_at("list tiles root", &self.root, e))?;
        let mut ids: Vec<u32> = entries
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
            .filter_map(|e| e.file_name().to_str().and_then(parse_floor_dir))
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    /// Status of every floor under the root.
    pub fn list(&self) -> TileResult<Vec<PyramidStatus>> {
        Ok(self
            .floor_ids()?
            .into_iter()
            .map(|id| self.status(id))
            .collect())
    }

    pub fn statistics(&self) -> TileResult<StoreStatistics> {
        let mut stats = StoreStatistics::default();
        for status in self.list()? {
            stats.total_floors += 1;
            if status.healthy {
                stats.healthy_floors += 1;
            }
            stats.total_tiles += status.tile_count;
            stats.disk_bytes += status.disk_bytes;
        }
        Ok(stats)
    }

    /// Delete every empty directory below the root, inside floor trees or not.
    /// Returns how many were removed.
    pub fn prune_empty_dirs(&self) -> TileResult<usize> {
        if !self.root.is_dir() {
            return Ok(0);
        }
        let mut removed = 0;
        for entry in WalkDir::new(&self.root)
            .min_depth(1)
            .contents_first(true)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_dir())
        {
            let empty = fs::read_dir(entry.path())
                .map(|mut it| it.next().is_none())
                .unwrap_or(false);
            if empty && fs::remove_dir(entry.path()).is_ok() {
                debug!(path = %entry.path().display(), "removed empty directory");
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Copy a floor's tree to `backup_dir/floor-{id}_backup_{YYYYmmdd_HHMMSS}`.
    ///
    /// Returns `None` when the floor has no pyramid.
    pub fn backup(&self, floor_id: u32, backup_dir: &Path) -> TileResult<Option<PathBuf>> {
        let source = self.floor_dir(floor_id);
        if !source.is_dir() {
            return Ok(None);
        }

        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let base = format!("{}_backup_{}", floor_dir_name(floor_id), stamp);
        let mut target = backup_dir.join(&base);
        let mut n = 1;
        while target.exists() {
            target = backup_dir.join(format!("{}_{}", base, n));
            n += 1;
        }

        for entry in WalkDir::new(&source) {
            let entry = entry.map_err(|e| {
                TileError::io_at(
                    "walk floor for backup",
                    &source,
                    e.into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("directory loop")),
                )
            })?;
            let relative = entry
                .path()
                .strip_prefix(&source)
                .map_err(|e| TileError::output_write(entry.path(), e.to_string()))?;
            let dest = target.join(relative);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&dest)
                    .map_err(|e| TileError::output_write(&dest, e.to_string()))?;
            } else {
                fs::copy(entry.path(), &dest)
                    .map_err(|e| TileError::output_write(&dest, e.to_string()))?;
            }
        }

        info!(floor_id, backup = %target.display(), "backed up tile tree");
        Ok(Some(target))
    }

    /// Create a hidden staging directory for `floor_id` inside the root.
    pub fn begin_staging(&self, floor_id: u32) -> TileResult<StagedPyramid> {
        fs::create_dir_all(&self.root)
            .map_err(|e| TileError::output_write(&self.root, e.to_string()))?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}{}.staging-", STAGING_PREFIX, floor_id))
            .tempdir_in(&self.root)
            .map_err(|e| TileError::output_write(&self.root, e.to_string()))?;
        debug!(floor_id, staging = %dir.path().display(), "staging directory created");
        Ok(StagedPyramid { floor_id, dir })
    }

    /// Validate a staged pyramid and swap it into place.
    ///
    /// # Errors
    /// `IncompletePyramid` or `InvalidDescriptor` if validation fails (the live
    /// tree is untouched); `Io` if a rename fails, in which case the previous
    /// live tree is restored when possible.
    pub fn commit(&self, staged: StagedPyramid, expected_tiles: u64) -> TileResult<()> {
        let floor_id = staged.floor_id;

        PyramidDescriptor::read(&staged.descriptor_path())?;
        let (_, found) = count_tiles(&staged.files_dir());
        if found != expected_tiles {
            return Err(TileError::incomplete_pyramid(expected_tiles, found)
                .with_metadata("floor_id", floor_id.to_string()));
        }

        let live = self.floor_dir(floor_id);
        let retired = if live.exists() {
            let aside = self.root.join(format!(
                "{}{}.old-{}",
                STAGING_PREFIX,
                floor_id,
                Local::now().format("%Y%m%d%H%M%S%f")
            ));
            fs::rename(&live, &aside).map_err(|e| TileError::io_at("retire live tree", &live, e))?;
            Some(aside)
        } else {
            None
        };

        if let Err(e) = fs::rename(staged.path(), &live) {
            if let Some(aside) = &retired {
                if let Err(restore) = fs::rename(aside, &live) {
                    warn!(floor_id, error = %restore, "failed to restore previous tile tree");
                }
            }
            return Err(TileError::io_at("promote staged tree", &live, e));
        }
        // The TempDir now points at a path that no longer exists; its drop is a no-op.
        drop(staged);

        if let Some(aside) = retired {
            if let Err(e) = fs::remove_dir_all(&aside) {
                warn!(floor_id, path = %aside.display(), error = %e, "failed to remove retired tree");
            }
        }
        debug!(floor_id, tiles = expected_tiles, "committed pyramid");
        Ok(())
    }

    /// Remove `.floor-*` staging and retired directories, for one floor or all.
    fn remove_leftovers(&self, floor_id: Option<u32>) -> TileResult<()> {
        if !self.root.is_dir() {
            return Ok(());
        }
        let prefix = match floor_id {
            Some(id) => format!("{}{}.", STAGING_PREFIX, id),
            None => STAGING_PREFIX.to_string(),
        };
        let entries =
            fs::read_dir(&self.root).map_err(|e| TileError::io_at("list tiles root", &self.root, e))?;
        for entry in entries.filter_map(Result::ok) {
            let name = entry.file_name();
            if name.to_str().is_some_and(|n| n.starts_with(&prefix)) {
                let path = entry.path();
                fs::remove_dir_all(&path).map_err(|e| TileError::io_at("remove leftover", &path, e))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TileFormat;
    use tile_scale::levels::PyramidGeometry;

    /// Fake a complete pyramid for a `w × h` raster without decoding anything.
    fn fake_pyramid(root: &Path, floor_id: u32, w: u32, h: u32, tile: u32) -> PyramidDescriptor {
        let store = TileStore::new(root);
        let geometry = PyramidGeometry::new(w, h, tile);
        let descriptor = PyramidDescriptor::from_geometry(&geometry, 0, TileFormat::Png);
        let files = store.files_dir(floor_id);
        for plan in geometry.levels() {
            let dir = files.join(plan.level.to_string());
            fs::create_dir_all(&dir).unwrap();
            for col in 0..plan.grid.cols {
                for row in 0..plan.grid.rows {
                    fs::write(dir.join(format!("{}_{}.png", col, row)), b"png").unwrap();
                }
            }
        }
        descriptor.write(&store.descriptor_path(floor_id)).unwrap();
        descriptor
    }

    #[test]
    fn layout_paths() {
        let store = TileStore::new("/srv/tiles");
        assert_eq!(store.floor_dir(7), PathBuf::from("/srv/tiles/floor-7"));
        assert_eq!(
            store.descriptor_path(7),
            PathBuf::from("/srv/tiles/floor-7/floor-7.dzi")
        );
        assert_eq!(
            store.files_dir(7),
            PathBuf::from("/srv/tiles/floor-7/floor-7_files")
        );
    }

    #[test]
    fn status_absent_then_healthy_then_broken() {
        let root = tempfile::tempdir().unwrap();
        let store = TileStore::new(root.path());
        assert!(!store.status(1).exists);

        fake_pyramid(root.path(), 1, 100, 50, 32);
        let status = store.status(1);
        assert!(status.exists && status.healthy);
        assert_eq!(status.levels, 8);
        assert_eq!(status.tile_count, status.expected_tiles);
        assert!(status.disk_bytes > 0);

        fs::remove_file(store.files_dir(1).join("7/0_0.png")).unwrap();
        let status = store.status(1);
        assert!(status.exists);
        assert!(!status.healthy);
    }

    #[test]
    fn resolve_accepts_tiles_and_descriptor() {
        let root = tempfile::tempdir().unwrap();
        fake_pyramid(root.path(), 2, 64, 64, 64);
        let store = TileStore::new(root.path());

        let tile = store.resolve(2, "floor-2_files/6/0_0.png").unwrap();
        assert!(tile.ends_with("floor-2_files/6/0_0.png"));
        assert!(store.resolve(2, "floor-2.dzi").is_ok());
        assert!(store.resolve(2, "./floor-2.dzi").is_ok());
    }

    #[test]
    fn resolve_rejects_traversal() {
        let root = tempfile::tempdir().unwrap();
        fake_pyramid(root.path(), 1, 64, 64, 64);
        fake_pyramid(root.path(), 2, 64, 64, 64);
        let store = TileStore::new(root.path());

        for bad in [
            "../floor-2/floor-2.dzi",
            "floor-1_files/../../floor-2/floor-2.dzi",
            "/etc/passwd",
            "..",
            "floor-1_files\\..\\..\\floor-2\\floor-2.dzi",
            "",
        ] {
            let err = store.resolve(1, bad).unwrap_err();
            assert_eq!(err.category(), "invalid_tile_path", "{:?}", bad);
        }

        assert_eq!(
            store.resolve(1, "floor-1_files/6/9_9.png").unwrap_err().category(),
            "tile_not_found"
        );
        assert_eq!(
            store.resolve(99, "floor-99.dzi").unwrap_err().category(),
            "tile_not_found"
        );
    }

    #[cfg(unix)]
    #[test]
    fn resolve_rejects_symlink_escape() {
        let root = tempfile::tempdir().unwrap();
        fake_pyramid(root.path(), 1, 64, 64, 64);
        let outside = root.path().join("secret.txt");
        fs::write(&outside, b"x").unwrap();
        let store = TileStore::new(root.path());
        std::os::unix::fs::symlink(&outside, store.floor_dir(1).join("link.png")).unwrap();

        let err = store.resolve(1, "link.png").unwrap_err();
        assert_eq!(err.category(), "invalid_tile_path");
    }

    #[test]
    fn list_statistics_and_clear_all() {
        let root = tempfile::tempdir().unwrap();
        fake_pyramid(root.path(), 3, 40, 40, 32);
        fake_pyramid(root.path(), 1, 40, 40, 32);
        fs::create_dir_all(root.path().join("floor-1_backup_20240101_000000")).unwrap();
        let store = TileStore::new(root.path());

        assert_eq!(store.floor_ids().unwrap(), vec![1, 3]);
        let stats = store.statistics().unwrap();
        assert_eq!(stats.total_floors, 2);
        assert_eq!(stats.healthy_floors, 2);

        assert_eq!(store.clear_all().unwrap(), 2);
        assert!(store.floor_ids().unwrap().is_empty());
        assert!(root.path().join("floor-1_backup_20240101_000000").exists());
        assert!(!store.clear(1).unwrap());
    }

    #[test]
    fn prune_removes_only_empty_dirs() {
        let root = tempfile::tempdir().unwrap();
        fake_pyramid(root.path(), 1, 16, 16, 16);
        fs::create_dir_all(root.path().join("floor-1/floor-1_files/99/empty")).unwrap();
        fs::create_dir_all(root.path().join("uploads")).unwrap();
        let store = TileStore::new(root.path());

        assert_eq!(store.prune_empty_dirs().unwrap(), 3);
        assert!(store.status(1).healthy);
        assert!(!root.path().join("uploads").exists());
    }

    #[test]
    fn backup_copies_tree() {
        let root = tempfile::tempdir().unwrap();
        let backups = tempfile::tempdir().unwrap();
        fake_pyramid(root.path(), 4, 32, 32, 16);
        let store = TileStore::new(root.path());

        let target = store.backup(4, backups.path()).unwrap().unwrap();
        let name = target.file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.starts_with("floor-4_backup_"));
        assert!(target.join("floor-4.dzi").is_file());
        assert_eq!(dir_size(&target), dir_size(&store.floor_dir(4)));

        assert!(store.backup(5, backups.path()).unwrap().is_none());
    }

    #[test]
    fn commit_swaps_and_validates() {
        let root = tempfile::tempdir().unwrap();
        let store = TileStore::new(root.path());
        fake_pyramid(root.path(), 1, 64, 64, 64);

        // A staged tree missing tiles is refused and the live tree survives.
        let staged = store.begin_staging(1).unwrap();
        let geometry = PyramidGeometry::new(32, 32, 16);
        PyramidDescriptor::from_geometry(&geometry, 0, TileFormat::Png)
            .write(&staged.descriptor_path())
            .unwrap();
        let staged_path = staged.path().to_path_buf();
        let err = store.commit(staged, geometry.total_tiles()).unwrap_err();
        assert_eq!(err.category(), "incomplete_pyramid");
        assert!(!staged_path.exists());
        assert_eq!(store.descriptor(1).unwrap().width, 64);

        // A complete staged tree replaces the live one.
        let staged = store.begin_staging(1).unwrap();
        for plan in geometry.levels() {
            let dir = staged.files_dir().join(plan.level.to_string());
            fs::create_dir_all(&dir).unwrap();
            for col in 0..plan.grid.cols {
                for row in 0..plan.grid.rows {
                    fs::write(dir.join(format!("{}_{}.png", col, row)), b"png").unwrap();
                }
            }
        }
        PyramidDescriptor::from_geometry(&geometry, 0, TileFormat::Png)
            .write(&staged.descriptor_path())
            .unwrap();
        store.commit(staged, geometry.total_tiles()).unwrap();

        assert_eq!(store.descriptor(1).unwrap().width, 32);
        assert!(store.status(1).healthy);
        let leftovers = fs::read_dir(root.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
            .count();
        assert_eq!(leftovers, 0);
    }
}
