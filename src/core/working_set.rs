//! # Working Set Governor
//!
//! Accounts for every large pixel buffer a generation run holds, so the
//! bounded-memory policy (one base raster, one level bitmap, one tile buffer)
//! is observable and testable rather than assumed.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  acquire()   ┌──────────────┐
//! │ PyramidBuilder│────────────▶│  WorkingSet  │◀──── snapshot()
//! │ TileSlicer    │◀────────────│  (counters)  │
//! └──────────────┘ Guard (RAII) └──────────────┘
//! ```
//!
//! Each buffer is registered with [`WorkingSet::acquire`] and returns a
//! [`WorkingSetGuard`]. Dropping the guard releases the bytes; resizing the
//! guard follows a buffer that grows or shrinks in place. The set keeps live
//! and peak figures per [`BufferKind`] and in total.
//!
//! ## Example
//!
//! ```rust
//! use floorplan_tiles::core::working_set::{BufferKind, WorkingSet};
//!
//! let set = WorkingSet::new();
//! {
//!     let _base = set.acquire(BufferKind::BaseRaster, 1024);
//!     let _level = set.acquire(BufferKind::LevelBitmap, 256);
//!     assert_eq!(set.snapshot().live_bytes, 1280);
//! }
//! let snap = set.snapshot();
//! assert_eq!(snap.live_bytes, 0);
//! assert_eq!(snap.peak_bytes, 1280);
//! assert_eq!(snap.peak_count(BufferKind::LevelBitmap), 1);
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Category of a tracked buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Decoded source bitmap
    BaseRaster,
    /// Resampled level bitmap
    LevelBitmap,
    /// Per-tile staging buffer
    TileStaging,
    /// Short-lived scratch (sharpening output, colour conversion)
    Scratch,
}

impl BufferKind {
    const ALL: [BufferKind; 4] = [
        BufferKind::BaseRaster,
        BufferKind::LevelBitmap,
        BufferKind::TileStaging,
        BufferKind::Scratch,
    ];

    fn index(self) -> usize {
        match self {
            BufferKind::BaseRaster => 0,
            BufferKind::LevelBitmap => 1,
            BufferKind::TileStaging => 2,
            BufferKind::Scratch => 3,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct KindCounters {
    live_bytes: u64,
    peak_bytes: u64,
    live_count: u32,
    peak_count: u32,
}

#[derive(Debug, Default)]
struct Counters {
    kinds: [KindCounters; 4],
    live_bytes: u64,
    peak_bytes: u64,
}

/// Point-in-time copy of the working set counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkingSetSnapshot {
    pub live_bytes: u64,
    pub peak_bytes: u64,
    kinds: [(u64, u64, u32, u32); 4],
}

impl WorkingSetSnapshot {
    /// Bytes currently held by buffers of `kind`.
    pub fn live_bytes_of(&self, kind: BufferKind) -> u64 {
        self.kinds[kind.index()].0
    }

    /// Highest simultaneous bytes held by buffers of `kind`.
    pub fn peak_bytes_of(&self, kind: BufferKind) -> u64 {
        self.kinds[kind.index()].1
    }

    /// Buffers of `kind` currently alive.
    pub fn live_count(&self, kind: BufferKind) -> u32 {
        self.kinds[kind.index()].2
    }

    /// Highest number of simultaneously alive buffers of `kind`.
    pub fn peak_count(&self, kind: BufferKind) -> u32 {
        self.kinds[kind.index()].3
    }
}

/// Shared accounting of live pixel buffers for one generation run.
///
/// Cloning is cheap; clones observe the same counters.
#[derive(Debug, Clone, Default)]
pub struct WorkingSet {
    inner: Arc<Mutex<Counters>>,
}

impl WorkingSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn counters(&self) -> MutexGuard<'_, Counters> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a buffer of `bytes` bytes. The bytes are released when the
    /// returned guard is dropped.
    pub fn acquire(&self, kind: BufferKind, bytes: usize) -> WorkingSetGuard {
        let bytes = bytes as u64;
        {
            let mut c = self.counters();
            let k = &mut c.kinds[kind.index()];
            k.live_count += 1;
            k.peak_count = k.peak_count.max(k.live_count);
            k.live_bytes += bytes;
            k.peak_bytes = k.peak_bytes.max(k.live_bytes);
            c.live_bytes += bytes;
            c.peak_bytes = c.peak_bytes.max(c.live_bytes);
        }
        WorkingSetGuard {
            set: self.clone(),
            kind,
            bytes,
        }
    }

    /// Current counters.
    pub fn snapshot(&self) -> WorkingSetSnapshot {
        let c = self.counters();
        let mut kinds = [(0, 0, 0, 0); 4];
        for kind in BufferKind::ALL {
            let k = c.kinds[kind.index()];
            kinds[kind.index()] = (k.live_bytes, k.peak_bytes, k.live_count, k.peak_count);
        }
        WorkingSetSnapshot {
            live_bytes: c.live_bytes,
            peak_bytes: c.peak_bytes,
            kinds,
        }
    }

    fn adjust(&self, kind: BufferKind, old: u64, new: u64) {
        let mut c = self.counters();
        let k = &mut c.kinds[kind.index()];
        k.live_bytes = k.live_bytes.saturating_sub(old) + new;
        k.peak_bytes = k.peak_bytes.max(k.live_bytes);
        c.live_bytes = c.live_bytes.saturating_sub(old) + new;
        c.peak_bytes = c.peak_bytes.max(c.live_bytes);
    }

    fn release(&self, kind: BufferKind, bytes: u64) {
        let mut c = self.counters();
        let k = &mut c.kinds[kind.index()];
        k.live_count = k.live_count.saturating_sub(1);
        k.live_bytes = k.live_bytes.saturating_sub(bytes);
        c.live_bytes = c.live_bytes.saturating_sub(bytes);
    }
}

/// RAII registration of one buffer in a [`WorkingSet`].
#[derive(Debug)]
pub struct WorkingSetGuard {
    set: WorkingSet,
    kind: BufferKind,
    bytes: u64,
}

impl WorkingSetGuard {
    /// Track a buffer that was resized in place.
    pub fn resize(&mut self, bytes: usize) {
        let bytes = bytes as u64;
        if bytes != self.bytes {
            self.set.adjust(self.kind, self.bytes, bytes);
            self.bytes = bytes;
        }
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn kind(&self) -> BufferKind {
        self.kind
    }
}

impl Drop for WorkingSetGuard {
    fn drop(&mut self) {
        self.set.release(self.kind, self.bytes);
    }
}
