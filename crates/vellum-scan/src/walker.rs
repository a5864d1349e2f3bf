//! Document walker.
//!
//! Drives the raw snapshot cursor across documents. For each document it
//! scans the root (document-level) entries to establish the tombstone floor,
//! then feeds every cell's versions through the visibility filter, resolving
//! strong intents on the way. Fully-hidden documents are skipped; shadowed
//! version ranges are skipped with a bounded number of `next()` calls before
//! falling back to a seek.
//!
//! The walker decodes a cell's payload only when its column is projected;
//! visibility itself needs just the payload kind and TTL.

use smallvec::SmallVec;
use vellum_error::{Result, VellumError};
use vellum_types::{ColumnId, Cx, DocValue, HybridTime, WriteIndex};

use crate::intents::{IntentResolver, Resolution};
use crate::keys::{self, EntryKind, IntentStrength, SubPath};
use crate::schema::{Projection, ScanBounds};
use crate::store::RawCursor;
use crate::values::{self, Payload};
use crate::visibility::{self, CellVersion};

/// Shadowed spans shorter than this are crossed with `next()`; longer ones
/// with a seek. Affects cost only, never results.
const SKIP_VIA_NEXT_LIMIT: usize = 8;

/// A document's worth of visible cells, before row assembly.
#[derive(Debug)]
pub struct WalkedDocument {
    pub doc_key: Vec<u8>,
    /// Visible values of projected columns, in storage (column id) order.
    pub cells: Vec<(ColumnId, DocValue)>,
}

/// Root-entry scan outcome for one document.
struct RootScan {
    /// Strongest committed document tombstone at or before the read time.
    floor: HybridTime,
    tombstoned: bool,
    saw_committed: bool,
}

/// Owned facts about the entry under the cursor.
struct ParsedEntry {
    column: Option<ColumnId>,
    kind: EntryKind,
    ht: HybridTime,
    write_index: WriteIndex,
    path_prefix_len: usize,
}

pub struct DocWalker<'a> {
    cursor: Box<dyn RawCursor + 'a>,
    read: HybridTime,
    resolver: IntentResolver<'a>,
    projection: &'a Projection,
    bounds: ScanBounds,
    cx: Cx,
}

impl<'a> DocWalker<'a> {
    pub fn new(
        mut cursor: Box<dyn RawCursor + 'a>,
        read: HybridTime,
        resolver: IntentResolver<'a>,
        projection: &'a Projection,
        bounds: ScanBounds,
        cx: Cx,
    ) -> Result<Self> {
        match &bounds.lower {
            Some(lower) => cursor.seek(lower)?,
            None => cursor.seek_to_first()?,
        }
        Ok(Self {
            cursor,
            read,
            resolver,
            projection,
            bounds,
            cx,
        })
    }

    fn checkpoint(&self) -> Result<()> {
        self.cx.checkpoint().map_err(|e| VellumError::Cancelled {
            reason: e.kind.reason(),
        })
    }

    fn parse_current(&self) -> Result<ParsedEntry> {
        let decoded = keys::decode(self.cursor.key())?;
        Ok(ParsedEntry {
            column: match decoded.path {
                SubPath::Root => None,
                SubPath::Column(id) => Some(id),
            },
            kind: decoded.kind,
            ht: decoded.ht,
            write_index: decoded.write_index,
            path_prefix_len: decoded.path_prefix.len(),
        })
    }

    fn in_prefix(&self, prefix: &[u8]) -> bool {
        self.cursor.valid() && self.cursor.key().starts_with(prefix)
    }

    fn skip_past_prefix(&mut self, prefix: &[u8]) -> Result<()> {
        for _ in 0..SKIP_VIA_NEXT_LIMIT {
            if !self.in_prefix(prefix) {
                return Ok(());
            }
            self.cursor.next()?;
        }
        if self.in_prefix(prefix) {
            match keys::prefix_successor(prefix) {
                Some(bound) => self.cursor.seek(&bound)?,
                None => {
                    while self.cursor.valid() {
                        self.cursor.next()?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Resolve the strong intent under the cursor into an effective-time
    /// version, or `None` when the read does not observe it.
    fn resolve_current_intent(&mut self, entry: &ParsedEntry) -> Result<Option<CellVersion>> {
        if !self.resolver.transactional() {
            return Ok(None);
        }
        // A transaction commits no earlier than its provisional writes, so a
        // provisional time past the read time cannot affect this read.
        if entry.ht > self.read {
            return Ok(None);
        }
        let intent = values::decode_intent_value(self.cursor.value())?;
        match self.resolver.resolve(&self.cx, intent.txn_id, self.read)? {
            Resolution::CommittedAt(commit_time) if commit_time <= self.read => {
                Ok(Some(CellVersion {
                    ht: commit_time,
                    write_index: entry.write_index,
                    from_intent: true,
                    record: intent.record,
                }))
            }
            _ => Ok(None),
        }
    }

    /// Scan the document-level entries at the root path. The cursor ends up
    /// on the first cell entry (or outside the document).
    fn scan_root(&mut self, doc_key: &[u8]) -> Result<RootScan> {
        let mut versions: SmallVec<[CellVersion; 4]> = SmallVec::new();
        while self.in_prefix(doc_key) {
            let entry = self.parse_current()?;
            if entry.column.is_some() {
                break;
            }
            match entry.kind {
                // Weak intents only flag that a descendant has provisional
                // writes; they never hide or reveal data.
                EntryKind::Intent(IntentStrength::Weak) => {}
                EntryKind::Intent(IntentStrength::Strong) => {
                    if let Some(version) = self.resolve_current_intent(&entry)? {
                        if !version.record.is_tombstone() {
                            return Err(VellumError::corruption(
                                "non-tombstone intent at document root",
                            ));
                        }
                        versions.push(version);
                    }
                }
                EntryKind::Regular => {
                    if entry.ht <= self.read {
                        let record = values::decode_value(self.cursor.value())?;
                        if !record.is_tombstone() {
                            return Err(VellumError::corruption(
                                "primitive value at document root",
                            ));
                        }
                        versions.push(CellVersion {
                            ht: entry.ht,
                            write_index: entry.write_index,
                            from_intent: false,
                            record,
                        });
                    }
                }
            }
            self.cursor.next()?;
        }

        let floor = versions
            .iter()
            .map(|v| v.ht)
            .max()
            .unwrap_or(HybridTime::MIN);
        Ok(RootScan {
            floor,
            tombstoned: !versions.is_empty(),
            saw_committed: !versions.is_empty(),
        })
    }

    /// Collect the versions of one cell that can affect the read, in
    /// descending effective-time order. The cursor ends up past the cell.
    fn gather_cell(&mut self, path_prefix: &[u8]) -> Result<SmallVec<[CellVersion; 4]>> {
        let mut versions: SmallVec<[CellVersion; 4]> = SmallVec::new();
        let mut have_regular = false;
        while self.in_prefix(path_prefix) {
            let entry = self.parse_current()?;
            match entry.kind {
                EntryKind::Intent(IntentStrength::Weak) => {}
                EntryKind::Intent(IntentStrength::Strong) => {
                    if let Some(version) = self.resolve_current_intent(&entry)? {
                        versions.push(version);
                    }
                }
                EntryKind::Regular => {
                    if have_regular {
                        // Only older versions of this cell remain, and the
                        // one already gathered shadows them all.
                        self.skip_past_prefix(path_prefix)?;
                        break;
                    }
                    if entry.ht <= self.read {
                        versions.push(CellVersion {
                            ht: entry.ht,
                            write_index: entry.write_index,
                            from_intent: false,
                            record: values::decode_value(self.cursor.value())?,
                        });
                        have_regular = true;
                    }
                }
            }
            self.cursor.next()?;
        }
        visibility::sort_versions(&mut versions);
        Ok(versions)
    }

    /// Process the document under the cursor. Returns `None` when the
    /// document yields no row at this read time; either way the cursor ends
    /// up at the next document (or the end).
    fn walk_document(&mut self, doc_key: &[u8]) -> Result<Option<WalkedDocument>> {
        let root = self.scan_root(doc_key)?;
        let mut saw_committed = root.saw_committed;
        let mut has_visible = false;
        let mut cells = Vec::new();
        let mut path_prefix = Vec::new();

        while self.in_prefix(doc_key) {
            let entry = self.parse_current()?;
            let Some(column) = entry.column else {
                return Err(VellumError::corruption(
                    "document root entry after column entries",
                ));
            };
            path_prefix.clear();
            path_prefix.extend_from_slice(&self.cursor.key()[..entry.path_prefix_len]);

            let versions = self.gather_cell(&path_prefix)?;
            saw_committed |= !versions.is_empty();

            if let Some(selected) = visibility::select_visible(&versions, self.read, root.floor) {
                has_visible = true;
                if self.projection.contains_value_column(column) {
                    let Payload::Primitive(primitive) = &selected.record.payload else {
                        return Err(VellumError::corruption(
                            "selected cell version has no primitive payload",
                        ));
                    };
                    cells.push((column, primitive.decode()?));
                }
            }
        }

        // A row exists at this read time iff some cell is visible, or the
        // document is untombstoned and has any committed entry at or before
        // the read time. Visibility is projection-independent: a row whose
        // only visible columns are unprojected still counts.
        if has_visible || (!root.tombstoned && saw_committed) {
            Ok(Some(WalkedDocument {
                doc_key: doc_key.to_vec(),
                cells,
            }))
        } else {
            tracing::debug!(
                tombstone_floor = %root.floor,
                read = %self.read,
                "document hidden at read time"
            );
            Ok(None)
        }
    }

    /// Advance to and process the next emittable document.
    pub fn next_document(&mut self) -> Result<Option<WalkedDocument>> {
        let mut doc_key = Vec::new();
        loop {
            self.checkpoint()?;
            if !self.cursor.valid() {
                return Ok(None);
            }
            {
                let key = self.cursor.key();
                let end = keys::doc_key_end(key)?;
                doc_key.clear();
                doc_key.extend_from_slice(&key[..end]);
            }
            if let Some(upper) = &self.bounds.upper {
                if doc_key.as_slice() >= upper.as_slice() {
                    return Ok(None);
                }
            }
            self.resolver.begin_row();
            if let Some(walked) = self.walk_document(&doc_key)? {
                return Ok(Some(walked));
            }
        }
    }
}
