//! Ordered-store contract and the in-memory test store.
//!
//! The iterator consumes the underlying LSM store through two narrow traits:
//! [`DocStore`] hands out pinned snapshot cursors, and [`RawCursor`] is a
//! forward cursor over the snapshot's ordered entries. A cursor owns its
//! snapshot pin; dropping the cursor releases the snapshot on every exit
//! path.
//!
//! [`MemStore`] is the in-memory double used by tests across crates, in the
//! same spirit as exporting a mock cursor from the storage crate itself: it
//! keeps entries in a sorted map, serves immutable snapshot copies, and
//! counts live pins so tests can assert scoped acquisition and release.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use vellum_error::Result;

/// Forward cursor over an ordered snapshot of the store.
///
/// Positioning methods may block on I/O. `key`/`value` are only meaningful
/// while `valid()` is true.
pub trait RawCursor {
    /// Position at the first entry with key `>= target`.
    fn seek(&mut self, target: &[u8]) -> Result<()>;

    /// Position at the first entry.
    fn seek_to_first(&mut self) -> Result<()>;

    /// Advance one entry.
    fn next(&mut self) -> Result<()>;

    /// Whether the cursor is positioned at an entry.
    fn valid(&self) -> bool;

    /// Key bytes of the current entry.
    fn key(&self) -> &[u8];

    /// Value bytes of the current entry.
    fn value(&self) -> &[u8];
}

/// A store that can serve consistent snapshot cursors.
///
/// The handle is shared read-only; each returned cursor holds its own
/// snapshot pin for its whole lifetime.
pub trait DocStore {
    fn snapshot(&self) -> Result<Box<dyn RawCursor + '_>>;
}

// ---------------------------------------------------------------------------
// In-memory store (exported test double)
// ---------------------------------------------------------------------------

/// In-memory ordered store with snapshot pin accounting.
#[derive(Default)]
pub struct MemStore {
    entries: RwLock<std::collections::BTreeMap<Vec<u8>, Vec<u8>>>,
    pins: Arc<AtomicUsize>,
}

impl MemStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one raw entry. Writes are outside the iterator's scope; this is
    /// the seeding hook for tests and tools.
    pub fn insert(&self, key: Vec<u8>, value: Vec<u8>) {
        self.entries.write().insert(key, value);
    }

    /// Number of currently pinned snapshots.
    #[must_use]
    pub fn live_snapshots(&self) -> usize {
        self.pins.load(Ordering::Acquire)
    }

    /// All entries of a fresh snapshot, in key order.
    #[must_use]
    pub fn snapshot_entries(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl DocStore for MemStore {
    fn snapshot(&self) -> Result<Box<dyn RawCursor + '_>> {
        self.pins.fetch_add(1, Ordering::AcqRel);
        Ok(Box::new(MemCursor {
            entries: Arc::new(self.snapshot_entries()),
            pos: 0,
            pins: Arc::clone(&self.pins),
        }))
    }
}

struct MemCursor {
    entries: Arc<Vec<(Vec<u8>, Vec<u8>)>>,
    pos: usize,
    pins: Arc<AtomicUsize>,
}

impl Drop for MemCursor {
    fn drop(&mut self) {
        self.pins.fetch_sub(1, Ordering::AcqRel);
    }
}

impl RawCursor for MemCursor {
    fn seek(&mut self, target: &[u8]) -> Result<()> {
        self.pos = self.entries.partition_point(|(k, _)| k.as_slice() < target);
        Ok(())
    }

    fn seek_to_first(&mut self) -> Result<()> {
        self.pos = 0;
        Ok(())
    }

    fn next(&mut self) -> Result<()> {
        debug_assert!(self.valid(), "next() past the end");
        self.pos += 1;
        Ok(())
    }

    fn valid(&self) -> bool {
        self.pos < self.entries.len()
    }

    fn key(&self) -> &[u8] {
        &self.entries[self.pos].0
    }

    fn value(&self) -> &[u8] {
        &self.entries[self.pos].1
    }
}
