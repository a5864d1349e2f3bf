//! Storage key codec.
//!
//! A stored key is the concatenation of an order-preserving document key, an
//! optional column component, and a version suffix. The codec guarantees that
//! byte order equals logical order:
//!
//! - documents sort by their primary-key values,
//! - within a document, root (document-level) entries sort before column
//!   entries, and intent entries sort before regular entries of the same path,
//! - within one `(document, path)`, newer versions sort before older ones
//!   (timestamps and write indices are stored complemented).
//!
//! Decoding is total: every malformed key is rejected with a corruption
//! error, and the hot-path accessors return views into the key buffer without
//! allocating.

use vellum_error::{Result, VellumError};
use vellum_types::{ColumnId, DocValue, HybridTime, WriteIndex};

// Document-key component tags.
const TAG_TEXT: u8 = 0x53;
const TAG_INT64: u8 = 0x49;
const TAG_GROUP_END: u8 = 0x21;

// Sub-path component tag.
const TAG_COLUMN: u8 = 0x4B;

// Version-suffix tags. Intent strengths sort below the regular marker so
// that intents partition before regular entries of the same path.
const TAG_WEAK_INTENT: u8 = 0x10;
const TAG_STRONG_INTENT: u8 = 0x14;
const TAG_HYBRID_TIME: u8 = 0x23;

// Trailing kind tags.
const KIND_REGULAR: u8 = 0x52;
const KIND_INTENT: u8 = 0x49;

const VERSION_SUFFIX_LEN: usize = 1 + 8 + 4 + 1;

/// Sub-key path within a document. Row tables store every non-key column at
/// a single-component path; the empty path denotes the document itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubPath {
    Root,
    Column(ColumnId),
}

/// Strength of an intent entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentStrength {
    /// Ancestor-path marker; carries no payload.
    Weak,
    /// Carries the provisional payload at the exact path.
    Strong,
}

/// Flavor of a stored entry, decided by key inspection alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Regular,
    Intent(IntentStrength),
}

/// A decoded storage key. Slices borrow from the input buffer.
#[derive(Debug, Clone, Copy)]
pub struct DecodedKey<'k> {
    /// The byte prefix shared by every entry of this document (terminator
    /// included).
    pub doc_key: &'k [u8],
    /// The byte prefix shared by every version of this `(document, path)`.
    pub path_prefix: &'k [u8],
    pub path: SubPath,
    pub kind: EntryKind,
    pub ht: HybridTime,
    pub write_index: WriteIndex,
}

fn corrupt_key(detail: &str) -> VellumError {
    VellumError::corruption(format!("key: {detail}"))
}

/// Byte length of the encoded document key at the start of `key`.
///
/// This is the "still inside document D" test of the walker: it never
/// allocates and touches only the document-key prefix.
pub fn doc_key_end(key: &[u8]) -> Result<usize> {
    let mut i = 0;
    loop {
        match key.get(i) {
            None => return Err(corrupt_key("unterminated document key")),
            Some(&TAG_GROUP_END) => return Ok(i + 1),
            Some(&TAG_TEXT) => {
                i += 1;
                loop {
                    match key.get(i) {
                        None => return Err(corrupt_key("unterminated text component")),
                        Some(0x00) => match key.get(i + 1) {
                            Some(0x00) => {
                                i += 2;
                                break;
                            }
                            Some(0x01) => i += 2,
                            _ => return Err(corrupt_key("bad zero escape in text component")),
                        },
                        Some(_) => i += 1,
                    }
                }
            }
            Some(&TAG_INT64) => {
                if key.len() < i + 9 {
                    return Err(corrupt_key("truncated int64 component"));
                }
                i += 9;
            }
            Some(&tag) => {
                return Err(corrupt_key(&format!(
                    "unknown document key component tag {tag:#04x}"
                )))
            }
        }
    }
}

/// The byte prefix shared by every entry of the key's document.
pub fn doc_key_bytes(key: &[u8]) -> Result<&[u8]> {
    Ok(&key[..doc_key_end(key)?])
}

/// The byte prefix shared by every version of the key's `(document, path)`.
pub fn path_prefix(key: &[u8]) -> Result<&[u8]> {
    Ok(decode(key)?.path_prefix)
}

/// Decode a full storage key.
pub fn decode(key: &[u8]) -> Result<DecodedKey<'_>> {
    let dk_end = doc_key_end(key)?;
    let mut i = dk_end;

    let path = match key.get(i) {
        Some(&TAG_COLUMN) => {
            let raw: [u8; 4] = key
                .get(i + 1..i + 5)
                .and_then(|b| b.try_into().ok())
                .ok_or_else(|| corrupt_key("truncated column component"))?;
            i += 5;
            SubPath::Column(ColumnId::new(u32::from_be_bytes(raw)))
        }
        _ => SubPath::Root,
    };
    let path_end = i;

    let (kind, expected_kind_tag) = match key.get(i) {
        Some(&TAG_HYBRID_TIME) => (EntryKind::Regular, KIND_REGULAR),
        Some(&TAG_WEAK_INTENT) => (EntryKind::Intent(IntentStrength::Weak), KIND_INTENT),
        Some(&TAG_STRONG_INTENT) => (EntryKind::Intent(IntentStrength::Strong), KIND_INTENT),
        Some(&tag) => {
            return Err(corrupt_key(&format!("unknown version tag {tag:#04x}")));
        }
        None => return Err(corrupt_key("missing version suffix")),
    };

    if key.len() != path_end + VERSION_SUFFIX_LEN {
        return Err(corrupt_key("bad version suffix length"));
    }
    i += 1;

    let ts_raw: [u8; 8] = key[i..i + 8].try_into().expect("length checked");
    let ht = HybridTime::from_packed(!u64::from_be_bytes(ts_raw));
    i += 8;

    let widx_raw: [u8; 4] = key[i..i + 4].try_into().expect("length checked");
    let write_index = WriteIndex::new(!u32::from_be_bytes(widx_raw));
    i += 4;

    if key[i] != expected_kind_tag {
        return Err(corrupt_key("kind tag does not match version tag"));
    }

    Ok(DecodedKey {
        doc_key: &key[..dk_end],
        path_prefix: &key[..path_end],
        path,
        kind,
        ht,
        write_index,
    })
}

// ---------------------------------------------------------------------------
// Document-key component codec
// ---------------------------------------------------------------------------

fn encode_text_component(out: &mut Vec<u8>, s: &str) {
    out.push(TAG_TEXT);
    for &b in s.as_bytes() {
        out.push(b);
        if b == 0x00 {
            out.push(0x01);
        }
    }
    out.extend_from_slice(&[0x00, 0x00]);
}

fn encode_int64_component(out: &mut Vec<u8>, v: i64) {
    out.push(TAG_INT64);
    // Flipping the sign bit makes two's-complement order equal byte order.
    out.extend_from_slice(&((v as u64) ^ (1 << 63)).to_be_bytes());
}

/// Encode primary-key values into a document key.
///
/// Only `Text` and `Int64` components are storable as key parts.
pub fn encode_doc_key(components: &[DocValue]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(16);
    for value in components {
        match value {
            DocValue::Text(s) => encode_text_component(&mut out, s),
            DocValue::Int64(v) => encode_int64_component(&mut out, *v),
            other => {
                return Err(VellumError::corruption(format!(
                    "unsupported document key component: {other:?}"
                )))
            }
        }
    }
    out.push(TAG_GROUP_END);
    Ok(out)
}

/// Decode a document key (or document-key prefix of a longer key) back into
/// its primary-key values.
pub fn decode_doc_key(key: &[u8]) -> Result<Vec<DocValue>> {
    let mut values = Vec::new();
    let mut i = 0;
    loop {
        match key.get(i) {
            None => return Err(corrupt_key("unterminated document key")),
            Some(&TAG_GROUP_END) => return Ok(values),
            Some(&TAG_TEXT) => {
                i += 1;
                let mut bytes = Vec::new();
                loop {
                    match key.get(i) {
                        None => return Err(corrupt_key("unterminated text component")),
                        Some(0x00) => match key.get(i + 1) {
                            Some(0x00) => {
                                i += 2;
                                break;
                            }
                            Some(0x01) => {
                                bytes.push(0x00);
                                i += 2;
                            }
                            _ => return Err(corrupt_key("bad zero escape in text component")),
                        },
                        Some(&b) => {
                            bytes.push(b);
                            i += 1;
                        }
                    }
                }
                let s = String::from_utf8(bytes)
                    .map_err(|_| corrupt_key("text component is not UTF-8"))?;
                values.push(DocValue::Text(s));
            }
            Some(&TAG_INT64) => {
                let raw: [u8; 8] = key
                    .get(i + 1..i + 9)
                    .and_then(|b| b.try_into().ok())
                    .ok_or_else(|| corrupt_key("truncated int64 component"))?;
                values.push(DocValue::Int64(
                    (u64::from_be_bytes(raw) ^ (1 << 63)) as i64,
                ));
                i += 9;
            }
            Some(&tag) => {
                return Err(corrupt_key(&format!(
                    "unknown document key component tag {tag:#04x}"
                )))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Full-key encoding
// ---------------------------------------------------------------------------

fn push_path(out: &mut Vec<u8>, column: Option<ColumnId>) {
    if let Some(id) = column {
        out.push(TAG_COLUMN);
        out.extend_from_slice(&id.get().to_be_bytes());
    }
}

fn push_version(out: &mut Vec<u8>, ht: HybridTime, w: WriteIndex, kind_tag: u8) {
    out.extend_from_slice(&(!ht.packed()).to_be_bytes());
    out.extend_from_slice(&(!w.get()).to_be_bytes());
    out.push(kind_tag);
}

/// Encode a regular entry key.
pub fn encode_regular_key(
    doc_key: &[u8],
    column: Option<ColumnId>,
    ht: HybridTime,
    w: WriteIndex,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(doc_key.len() + 5 + VERSION_SUFFIX_LEN);
    out.extend_from_slice(doc_key);
    push_path(&mut out, column);
    out.push(TAG_HYBRID_TIME);
    push_version(&mut out, ht, w, KIND_REGULAR);
    out
}

/// Encode an intent entry key.
pub fn encode_intent_key(
    doc_key: &[u8],
    column: Option<ColumnId>,
    strength: IntentStrength,
    ht: HybridTime,
    w: WriteIndex,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(doc_key.len() + 5 + VERSION_SUFFIX_LEN);
    out.extend_from_slice(doc_key);
    push_path(&mut out, column);
    out.push(match strength {
        IntentStrength::Weak => TAG_WEAK_INTENT,
        IntentStrength::Strong => TAG_STRONG_INTENT,
    });
    push_version(&mut out, ht, w, KIND_INTENT);
    out
}

/// Smallest byte string strictly greater than every key starting with
/// `prefix`, or `None` if no such string exists (all-`0xFF` prefix).
pub fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut out = prefix.to_vec();
    while let Some(&last) = out.last() {
        if last == 0xFF {
            out.pop();
        } else {
            *out.last_mut().expect("nonempty") = last + 1;
            return Some(out);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn doc_key(name: &str, num: i64) -> Vec<u8> {
        encode_doc_key(&[DocValue::Text(name.into()), DocValue::Int64(num)]).unwrap()
    }

    #[test]
    fn doc_key_round_trip() {
        let key = doc_key("row1", 11111);
        assert_eq!(doc_key_end(&key).unwrap(), key.len());
        assert_eq!(
            decode_doc_key(&key).unwrap(),
            vec![DocValue::Text("row1".into()), DocValue::Int64(11111)]
        );
    }

    #[test]
    fn doc_key_round_trip_with_embedded_zero_and_negatives() {
        let components = [DocValue::Text("a\0b".into()), DocValue::Int64(-42)];
        let key = encode_doc_key(&components).unwrap();
        assert_eq!(decode_doc_key(&key).unwrap(), components);
    }

    #[test]
    fn regular_key_round_trip() {
        let dk = doc_key("row2", 22222);
        let key = encode_regular_key(
            &dk,
            Some(ColumnId::new(40)),
            HybridTime::from_micros(2500),
            WriteIndex::new(1),
        );
        let decoded = decode(&key).unwrap();
        assert_eq!(decoded.doc_key, dk.as_slice());
        assert_eq!(decoded.path, SubPath::Column(ColumnId::new(40)));
        assert_eq!(decoded.kind, EntryKind::Regular);
        assert_eq!(decoded.ht, HybridTime::from_micros(2500));
        assert_eq!(decoded.write_index, WriteIndex::new(1));
        assert_eq!(decoded.path_prefix, &key[..dk.len() + 5]);
    }

    #[test]
    fn intent_key_round_trip() {
        let dk = doc_key("row1", 11111);
        let key = encode_intent_key(
            &dk,
            None,
            IntentStrength::Strong,
            HybridTime::from_micros(4000),
            WriteIndex::ZERO,
        );
        let decoded = decode(&key).unwrap();
        assert_eq!(decoded.path, SubPath::Root);
        assert_eq!(decoded.kind, EntryKind::Intent(IntentStrength::Strong));
        assert_eq!(decoded.ht, HybridTime::from_micros(4000));
    }

    #[test]
    fn newer_versions_sort_first_within_a_path() {
        let dk = doc_key("row2", 22222);
        let col = Some(ColumnId::new(40));
        let at_3000 = encode_regular_key(&dk, col, HybridTime::from_micros(3000), WriteIndex::ZERO);
        let at_2500 = encode_regular_key(&dk, col, HybridTime::from_micros(2500), WriteIndex::ZERO);
        let at_2000 = encode_regular_key(&dk, col, HybridTime::from_micros(2000), WriteIndex::ZERO);
        assert!(at_3000 < at_2500);
        assert!(at_2500 < at_2000);

        // Same timestamp: larger write index sorts first.
        let w0 = encode_regular_key(&dk, col, HybridTime::from_micros(2000), WriteIndex::ZERO);
        let w1 = encode_regular_key(&dk, col, HybridTime::from_micros(2000), WriteIndex::new(1));
        assert!(w1 < w0);
    }

    #[test]
    fn intents_partition_before_regular_entries() {
        let dk = doc_key("row1", 11111);
        let col = Some(ColumnId::new(30));
        let weak = encode_intent_key(
            &dk,
            col,
            IntentStrength::Weak,
            HybridTime::from_micros(1),
            WriteIndex::ZERO,
        );
        let strong = encode_intent_key(
            &dk,
            col,
            IntentStrength::Strong,
            HybridTime::from_micros(9000),
            WriteIndex::ZERO,
        );
        let regular = encode_regular_key(&dk, col, HybridTime::MAX, WriteIndex::ZERO);
        assert!(weak < strong);
        assert!(strong < regular);
    }

    #[test]
    fn root_entries_sort_before_column_entries() {
        let dk = doc_key("row1", 11111);
        let root = encode_regular_key(&dk, None, HybridTime::from_micros(2500), WriteIndex::ZERO);
        let root_intent = encode_intent_key(
            &dk,
            None,
            IntentStrength::Weak,
            HybridTime::from_micros(500),
            WriteIndex::ZERO,
        );
        let cell = encode_regular_key(
            &dk,
            Some(ColumnId::new(30)),
            HybridTime::MAX,
            WriteIndex::ZERO,
        );
        assert!(root_intent < root);
        assert!(root < cell);
    }

    #[test]
    fn malformed_keys_are_rejected() {
        assert!(decode(b"").is_err());
        assert!(decode(&[0x07]).is_err());
        // Document key without a version suffix.
        let dk = doc_key("row1", 11111);
        assert!(decode(&dk).is_err());
        // Truncated version suffix.
        let mut key = encode_regular_key(&dk, None, HybridTime::from_micros(1), WriteIndex::ZERO);
        key.pop();
        assert!(decode(&key).is_err());
        // Kind tag inconsistent with the version tag: a regular entry
        // carrying the intent kind tag.
        let mut key = encode_regular_key(&dk, None, HybridTime::from_micros(1), WriteIndex::ZERO);
        *key.last_mut().unwrap() = 0x49;
        assert!(decode(&key).is_err());
    }

    #[test]
    fn prefix_accessors_agree_with_decode() {
        let dk = doc_key("row2", 22222);
        let key = encode_regular_key(
            &dk,
            Some(ColumnId::new(50)),
            HybridTime::from_micros(4000),
            WriteIndex::ZERO,
        );
        assert_eq!(doc_key_bytes(&key).unwrap(), dk.as_slice());
        assert_eq!(path_prefix(&key).unwrap(), &key[..dk.len() + 5]);
    }

    #[test]
    fn prefix_successor_handles_trailing_ff() {
        assert_eq!(prefix_successor(&[0x01, 0x02]), Some(vec![0x01, 0x03]));
        assert_eq!(prefix_successor(&[0x01, 0xFF]), Some(vec![0x02]));
        assert_eq!(prefix_successor(&[0xFF, 0xFF]), None);
    }

    proptest! {
        #[test]
        fn prop_doc_key_order_matches_component_order(
            a_name in "[a-z]{0,6}", a_num in -1000_i64..1000,
            b_name in "[a-z]{0,6}", b_num in -1000_i64..1000,
        ) {
            let a = doc_key(&a_name, a_num);
            let b = doc_key(&b_name, b_num);
            let logical = (a_name.as_str(), a_num).cmp(&(b_name.as_str(), b_num));
            prop_assert_eq!(a.cmp(&b), logical);
        }

        #[test]
        fn prop_version_order_is_reverse_byte_order(
            a_ts in 0_u64..1 << 40, a_w in 0_u32..16,
            b_ts in 0_u64..1 << 40, b_w in 0_u32..16,
        ) {
            let dk = doc_key("k", 1);
            let col = Some(ColumnId::new(40));
            let a = encode_regular_key(&dk, col, HybridTime::from_micros(a_ts), WriteIndex::new(a_w));
            let b = encode_regular_key(&dk, col, HybridTime::from_micros(b_ts), WriteIndex::new(b_w));
            let logical = (b_ts, b_w).cmp(&(a_ts, a_w));
            prop_assert_eq!(a.cmp(&b), logical);
        }

        #[test]
        fn prop_decode_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            let _ = decode(&bytes);
            let _ = decode_doc_key(&bytes);
        }
    }
}
