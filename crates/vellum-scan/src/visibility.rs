//! Cell visibility.
//!
//! Given every version of one `(document, path)` cell in descending
//! effective-time order, pick the version a read at time `R` observes:
//! the newest version at or before `R` that is not shadowed by a tombstone
//! (inherited from the document level or local to the cell) and not expired.
//!
//! Intents have already been resolved by the walker at this point: a
//! committed intent appears here as a version at its commit time, an
//! invisible one does not appear at all.

use vellum_types::{HybridTime, WriteIndex};

use crate::values::ValueRecord;

/// One version of a cell, effective-time adjusted.
#[derive(Debug, Clone)]
pub struct CellVersion {
    pub ht: HybridTime,
    pub write_index: WriteIndex,
    /// Version order tie-break: an intent committed at the exact timestamp
    /// of a regular write was written later and wins.
    pub from_intent: bool,
    pub record: ValueRecord,
}

impl CellVersion {
    /// Descending `(timestamp, write_index)` order, intents first on ties.
    #[must_use]
    pub fn version_cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .ht
            .cmp(&self.ht)
            .then_with(|| other.write_index.cmp(&self.write_index))
            .then_with(|| other.from_intent.cmp(&self.from_intent))
    }
}

/// Sort versions into the order [`select_visible`] expects.
pub fn sort_versions(versions: &mut [CellVersion]) {
    versions.sort_unstable_by(CellVersion::version_cmp);
}

/// The version selected for one cell, or `None` when the cell reads as NULL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectedVersion<'v> {
    pub ht: HybridTime,
    pub record: &'v ValueRecord,
}

/// Select the visible version of one cell.
///
/// `versions` must be in descending `(timestamp, write_index)` order.
/// `tombstone_floor` is the inherited shadow threshold (the strongest
/// committed document tombstone at or before `read`); every version at or
/// below it is hidden.
pub fn select_visible<'v>(
    versions: &'v [CellVersion],
    read: HybridTime,
    tombstone_floor: HybridTime,
) -> Option<SelectedVersion<'v>> {
    debug_assert!(versions.windows(2).all(|w| {
        w[0].version_cmp(&w[1]) != std::cmp::Ordering::Greater
    }));

    for version in versions {
        if version.ht > read {
            continue;
        }
        if version.ht <= tombstone_floor {
            // Everything older is shadowed too.
            break;
        }
        if version.record.is_tombstone() {
            // Newest-first scan: a tombstone here finalizes NULL.
            break;
        }
        if let Some(ttl) = version.record.ttl {
            if ttl.expired(version.ht, read) {
                // An expired value behaves exactly like a tombstone at its
                // write time, shadowing everything older.
                break;
            }
        }
        return Some(SelectedVersion {
            ht: version.ht,
            record: &version.record,
        });
    }
    None
}
