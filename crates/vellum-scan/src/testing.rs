//! Test support: batched writes against [`MemStore`] and a deterministic
//! snapshot dump.
//!
//! The write path proper is outside this crate's scope; these helpers
//! produce exactly the entry layout the iterator consumes, so tests can
//! seed a store and pin its persisted form with [`dump_store`] assertions.

use std::fmt::Write as _;

use vellum_error::Result;
use vellum_types::{ColumnId, DocValue, HybridTime, Ttl, TxnId, WriteIndex};

use crate::keys::{self, EntryKind, IntentStrength, SubPath};
use crate::store::MemStore;
use crate::values::{self, Payload};

/// Target of one write: a document root or one column of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocPath {
    doc_key: Vec<u8>,
    column: Option<ColumnId>,
}

impl DocPath {
    #[must_use]
    pub fn root(doc_key: impl Into<Vec<u8>>) -> Self {
        Self {
            doc_key: doc_key.into(),
            column: None,
        }
    }

    #[must_use]
    pub fn column(doc_key: impl Into<Vec<u8>>, id: u32) -> Self {
        Self {
            doc_key: doc_key.into(),
            column: Some(ColumnId::new(id)),
        }
    }
}

#[derive(Debug, Clone)]
enum WriteOp {
    Put { value: DocValue, ttl: Option<Ttl> },
    Delete,
}

/// A batch of writes sharing one hybrid timestamp, distinguished by write
/// index in batch order.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<(DocPath, WriteOp)>,
}

impl WriteBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, path: DocPath, value: impl Into<DocValue>) -> &mut Self {
        self.ops.push((
            path,
            WriteOp::Put {
                value: value.into(),
                ttl: None,
            },
        ));
        self
    }

    pub fn put_with_ttl(
        &mut self,
        path: DocPath,
        value: impl Into<DocValue>,
        ttl: Ttl,
    ) -> &mut Self {
        self.ops.push((
            path,
            WriteOp::Put {
                value: value.into(),
                ttl: Some(ttl),
            },
        ));
        self
    }

    /// Write a tombstone at `path`, hiding it and everything below.
    pub fn delete(&mut self, path: DocPath) -> &mut Self {
        self.ops.push((path, WriteOp::Delete));
        self
    }

    fn payload_bytes(op: &WriteOp) -> Result<Vec<u8>> {
        match op {
            WriteOp::Put { value, ttl } => values::encode_value(value, *ttl),
            WriteOp::Delete => Ok(values::encode_tombstone()),
        }
    }

    /// Apply as committed regular writes at `ht`.
    pub fn apply(&self, store: &MemStore, ht: HybridTime) -> Result<()> {
        for (w, (path, op)) in self.ops.iter().enumerate() {
            let key = keys::encode_regular_key(
                &path.doc_key,
                path.column,
                ht,
                WriteIndex::new(w as u32),
            );
            store.insert(key, Self::payload_bytes(op)?);
        }
        Ok(())
    }

    /// Apply as provisional writes of `txn_id` at `provisional`: a strong
    /// intent per write, plus a weak intent at the root of every document
    /// receiving a column write.
    pub fn apply_as_intents(
        &self,
        store: &MemStore,
        txn_id: TxnId,
        provisional: HybridTime,
    ) -> Result<()> {
        let mut w = 0_u32;
        for (path, op) in &self.ops {
            let key = keys::encode_intent_key(
                &path.doc_key,
                path.column,
                IntentStrength::Strong,
                provisional,
                WriteIndex::new(w),
            );
            let payload = Self::payload_bytes(op)?;
            store.insert(key, values::encode_strong_intent_value(txn_id, &payload));
            w += 1;
        }
        let mut marked: Vec<&[u8]> = Vec::new();
        for (path, _) in &self.ops {
            if path.column.is_none() || marked.contains(&path.doc_key.as_slice()) {
                continue;
            }
            marked.push(&path.doc_key);
            let key = keys::encode_intent_key(
                &path.doc_key,
                None,
                IntentStrength::Weak,
                provisional,
                WriteIndex::new(w),
            );
            store.insert(key, values::encode_weak_intent_value(txn_id));
            w += 1;
        }
        Ok(())
    }
}

fn fmt_doc_key(doc_key: &[u8]) -> Result<String> {
    let components = keys::decode_doc_key(doc_key)?;
    let rendered: Vec<String> = components.iter().map(ToString::to_string).collect();
    Ok(format!("DocKey([{}])", rendered.join(", ")))
}

fn fmt_version(ht: HybridTime, w: WriteIndex) -> String {
    if w == WriteIndex::ZERO {
        ht.to_string()
    } else {
        format!("{ht} w: {}", w.get())
    }
}

/// Render every entry of a fresh snapshot, one line per entry, in store
/// order. The format is stable; tests assert against it to pin the codec.
pub fn dump_store(store: &MemStore) -> Result<String> {
    let mut out = String::new();
    for (key, value) in store.snapshot_entries() {
        let decoded = keys::decode(&key)?;
        let doc = fmt_doc_key(decoded.doc_key)?;
        let path = match decoded.path {
            SubPath::Root => String::new(),
            SubPath::Column(id) => id.to_string(),
        };
        match decoded.kind {
            EntryKind::Regular => {
                let record = values::decode_value(&value)?;
                let sep = if path.is_empty() { "" } else { "; " };
                let version = fmt_version(decoded.ht, decoded.write_index);
                let _ = write!(out, "SubDocKey({doc}, [{path}{sep}{version}]) -> ");
                match &record.payload {
                    Payload::Tombstone => out.push_str("DEL"),
                    Payload::Primitive(p) => {
                        let _ = write!(out, "{}", p.decode()?);
                    }
                    Payload::None => out.push_str("none"),
                }
                if let Some(ttl) = record.ttl {
                    let _ = write!(out, "; {ttl}");
                }
            }
            EntryKind::Intent(strength) => {
                let intent = values::decode_intent_value(&value)?;
                let strength = match strength {
                    IntentStrength::Weak => "weak",
                    IntentStrength::Strong => "strong",
                };
                let version = fmt_version(decoded.ht, decoded.write_index);
                let _ = write!(
                    out,
                    "SubDocKey({doc}, [{path}]) {strength} {version} -> {}",
                    intent.txn_id
                );
                match &intent.record.payload {
                    Payload::Tombstone => out.push_str(" DEL"),
                    Payload::None => out.push_str(" none"),
                    Payload::Primitive(p) => {
                        let _ = write!(out, " {}", p.decode()?);
                    }
                }
                if let Some(ttl) = intent.record.ttl {
                    let _ = write!(out, "; {ttl}");
                }
            }
        }
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_writes_share_timestamp_with_increasing_indices() {
        let store = MemStore::new();
        let dk = keys::encode_doc_key(&[DocValue::Text("row1".into()), DocValue::Int64(11111)])
            .unwrap();

        let mut batch = WriteBatch::new();
        batch
            .put(DocPath::column(dk.clone(), 40), 10000_i64)
            .put(DocPath::column(dk.clone(), 50), "row1_e");
        batch.apply(&store, HybridTime::from_micros(1000)).unwrap();

        let dump = dump_store(&store).unwrap();
        assert_eq!(
            dump,
            "SubDocKey(DocKey([\"row1\", 11111]), [col#40; HT{ physical: 1000 }]) -> 10000\n\
             SubDocKey(DocKey([\"row1\", 11111]), [col#50; HT{ physical: 1000 } w: 1]) -> \"row1_e\"\n"
        );
    }

    #[test]
    fn intent_writes_add_weak_markers_at_document_roots() {
        let store = MemStore::new();
        let dk = keys::encode_doc_key(&[DocValue::Text("row2".into()), DocValue::Int64(22222)])
            .unwrap();
        let txn = TxnId::new(2).unwrap();

        let mut batch = WriteBatch::new();
        batch.put(DocPath::column(dk.clone(), 50), "row2_e_t2");
        batch
            .apply_as_intents(&store, txn, HybridTime::from_micros(4000))
            .unwrap();

        let dump = dump_store(&store).unwrap();
        assert_eq!(
            dump,
            "SubDocKey(DocKey([\"row2\", 22222]), []) weak HT{ physical: 4000 } w: 1 -> txn#2 none\n\
             SubDocKey(DocKey([\"row2\", 22222]), [col#50]) strong HT{ physical: 4000 } -> txn#2 \"row2_e_t2\"\n"
        );
    }

    #[test]
    fn root_delete_writes_no_weak_marker() {
        let store = MemStore::new();
        let dk = keys::encode_doc_key(&[DocValue::Text("row1".into()), DocValue::Int64(11111)])
            .unwrap();
        let txn = TxnId::new(2).unwrap();

        let mut batch = WriteBatch::new();
        batch.delete(DocPath::root(dk));
        batch
            .apply_as_intents(&store, txn, HybridTime::from_micros(4000))
            .unwrap();

        let dump = dump_store(&store).unwrap();
        assert_eq!(
            dump,
            "SubDocKey(DocKey([\"row1\", 11111]), []) strong HT{ physical: 4000 } -> txn#2 DEL\n"
        );
    }
}
