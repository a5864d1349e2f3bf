//! Stored value codec.
//!
//! A regular value is an optional TTL prefix followed by either a tombstone
//! marker or a tagged primitive. An intent value carries the writing
//! transaction's id first; weak intents store an empty marker instead of a
//! payload.
//!
//! Structural validation is eager (unknown tags and bad lengths are
//! corruption), but primitive payloads are materialized into [`DocValue`]
//! only on demand so unprojected columns never pay for decoding.

use vellum_error::{Result, VellumError};
use vellum_types::{DocValue, TxnId, Ttl};

const TAG_TOMBSTONE: u8 = 0x58;
const TAG_TRUE: u8 = 0x54;
const TAG_FALSE: u8 = 0x46;
const TAG_INT64: u8 = 0x49;
const TAG_DOUBLE: u8 = 0x44;
const TAG_TEXT: u8 = 0x53;
const TAG_BINARY: u8 = 0x42;
const TAG_NONE: u8 = 0x4E;
const TAG_TTL: u8 = 0x74;
const TAG_TXN_ID: u8 = 0x26;

fn corrupt_value(detail: &str) -> VellumError {
    VellumError::corruption(format!("value: {detail}"))
}

/// A structurally-validated primitive, decoded into a [`DocValue`] on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimitiveBytes {
    tag: u8,
    body: Vec<u8>,
}

impl PrimitiveBytes {
    /// Materialize the primitive.
    pub fn decode(&self) -> Result<DocValue> {
        match self.tag {
            TAG_TRUE => Ok(DocValue::Bool(true)),
            TAG_FALSE => Ok(DocValue::Bool(false)),
            TAG_INT64 => {
                let raw: [u8; 8] = self.body.as_slice().try_into().expect("validated");
                Ok(DocValue::Int64(i64::from_le_bytes(raw)))
            }
            TAG_DOUBLE => {
                let raw: [u8; 8] = self.body.as_slice().try_into().expect("validated");
                Ok(DocValue::Double(f64::from_le_bytes(raw)))
            }
            TAG_TEXT => String::from_utf8(self.body.clone())
                .map(DocValue::Text)
                .map_err(|_| corrupt_value("text payload is not UTF-8")),
            TAG_BINARY => Ok(DocValue::Binary(self.body.clone())),
            _ => unreachable!("tag validated at parse"),
        }
    }
}

/// Payload of a stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Deletion marker shadowing older versions at and below its path.
    Tombstone,
    /// Placeholder payload of a weak intent.
    None,
    Primitive(PrimitiveBytes),
}

impl Payload {
    #[must_use]
    pub const fn is_tombstone(&self) -> bool {
        matches!(self, Self::Tombstone)
    }
}

/// A decoded regular value: payload plus optional per-version TTL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueRecord {
    pub ttl: Option<Ttl>,
    pub payload: Payload,
}

impl ValueRecord {
    #[must_use]
    pub const fn is_tombstone(&self) -> bool {
        self.payload.is_tombstone()
    }
}

/// A decoded intent value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentRecord {
    pub txn_id: TxnId,
    pub record: ValueRecord,
}

fn parse_ttl(bytes: &[u8]) -> Result<(Option<Ttl>, &[u8])> {
    match bytes.first() {
        Some(&TAG_TTL) => {
            let raw: [u8; 8] = bytes
                .get(1..9)
                .and_then(|b| b.try_into().ok())
                .ok_or_else(|| corrupt_value("truncated TTL"))?;
            let micros = u64::from_le_bytes(raw);
            let ttl = Ttl::from_micros(micros).ok_or_else(|| corrupt_value("zero TTL"))?;
            Ok((Some(ttl), &bytes[9..]))
        }
        _ => Ok((None, bytes)),
    }
}

fn parse_payload(bytes: &[u8]) -> Result<Payload> {
    let (&tag, body) = bytes
        .split_first()
        .ok_or_else(|| corrupt_value("empty payload"))?;
    match tag {
        TAG_TOMBSTONE | TAG_TRUE | TAG_FALSE | TAG_NONE if !body.is_empty() => {
            Err(corrupt_value("trailing bytes after fixed payload"))
        }
        TAG_TOMBSTONE => Ok(Payload::Tombstone),
        TAG_NONE => Ok(Payload::None),
        TAG_TRUE | TAG_FALSE => Ok(Payload::Primitive(PrimitiveBytes {
            tag,
            body: Vec::new(),
        })),
        TAG_INT64 | TAG_DOUBLE => {
            if body.len() != 8 {
                return Err(corrupt_value("numeric payload must be 8 bytes"));
            }
            Ok(Payload::Primitive(PrimitiveBytes {
                tag,
                body: body.to_vec(),
            }))
        }
        TAG_TEXT | TAG_BINARY => Ok(Payload::Primitive(PrimitiveBytes {
            tag,
            body: body.to_vec(),
        })),
        _ => Err(corrupt_value(&format!("unknown payload tag {tag:#04x}"))),
    }
}

/// Decode the value bytes of a regular entry.
pub fn decode_value(bytes: &[u8]) -> Result<ValueRecord> {
    if bytes.first() == Some(&TAG_TXN_ID) {
        return Err(corrupt_value("transaction id on a regular entry"));
    }
    let (ttl, rest) = parse_ttl(bytes)?;
    let payload = parse_payload(rest)?;
    if matches!(payload, Payload::None) {
        return Err(corrupt_value("empty marker on a regular entry"));
    }
    if ttl.is_some() && payload.is_tombstone() {
        return Err(corrupt_value("TTL on a tombstone"));
    }
    Ok(ValueRecord { ttl, payload })
}

/// Decode the value bytes of an intent entry.
pub fn decode_intent_value(bytes: &[u8]) -> Result<IntentRecord> {
    let rest = bytes
        .strip_prefix(&[TAG_TXN_ID])
        .ok_or_else(|| corrupt_value("intent entry without transaction id"))?;
    let raw: [u8; 8] = rest
        .get(..8)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| corrupt_value("truncated transaction id"))?;
    let txn_id = TxnId::new(u64::from_le_bytes(raw))
        .ok_or_else(|| corrupt_value("zero transaction id"))?;
    let (ttl, rest) = parse_ttl(&rest[8..])?;
    let payload = parse_payload(rest)?;
    if ttl.is_some() && payload.is_tombstone() {
        return Err(corrupt_value("TTL on a tombstone"));
    }
    Ok(IntentRecord {
        txn_id,
        record: ValueRecord { ttl, payload },
    })
}

// ---------------------------------------------------------------------------
// Encoding (write-side counterpart, used by stores and tests)
// ---------------------------------------------------------------------------

fn push_primitive(out: &mut Vec<u8>, value: &DocValue) -> Result<()> {
    match value {
        DocValue::Bool(true) => out.push(TAG_TRUE),
        DocValue::Bool(false) => out.push(TAG_FALSE),
        DocValue::Int64(v) => {
            out.push(TAG_INT64);
            out.extend_from_slice(&v.to_le_bytes());
        }
        DocValue::Double(v) => {
            out.push(TAG_DOUBLE);
            out.extend_from_slice(&v.to_le_bytes());
        }
        DocValue::Text(s) => {
            out.push(TAG_TEXT);
            out.extend_from_slice(s.as_bytes());
        }
        DocValue::Binary(b) => {
            out.push(TAG_BINARY);
            out.extend_from_slice(b);
        }
        DocValue::Null => {
            return Err(corrupt_value("NULL is not storable; delete the cell instead"))
        }
    }
    Ok(())
}

/// Encode a primitive write with an optional TTL.
pub fn encode_value(value: &DocValue, ttl: Option<Ttl>) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(9);
    if let Some(ttl) = ttl {
        out.push(TAG_TTL);
        out.extend_from_slice(&ttl.as_micros().to_le_bytes());
    }
    push_primitive(&mut out, value)?;
    Ok(out)
}

/// Encode a tombstone.
#[must_use]
pub fn encode_tombstone() -> Vec<u8> {
    vec![TAG_TOMBSTONE]
}

/// Encode a strong intent's value: transaction id plus the provisional
/// payload bytes (themselves produced by [`encode_value`] or
/// [`encode_tombstone`]).
#[must_use]
pub fn encode_strong_intent_value(txn_id: TxnId, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(9 + payload.len());
    out.push(TAG_TXN_ID);
    out.extend_from_slice(&txn_id.get().to_le_bytes());
    out.extend_from_slice(payload);
    out
}

/// Encode a weak intent's value: transaction id plus the empty marker.
#[must_use]
pub fn encode_weak_intent_value(txn_id: TxnId) -> Vec<u8> {
    let mut out = Vec::with_capacity(10);
    out.push(TAG_TXN_ID);
    out.extend_from_slice(&txn_id.get().to_le_bytes());
    out.push(TAG_NONE);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use vellum_types::HybridTime;

    #[test]
    fn primitive_round_trips() {
        for value in [
            DocValue::Bool(true),
            DocValue::Bool(false),
            DocValue::Int64(-10000),
            DocValue::Double(2.5),
            DocValue::Text("row1_c".into()),
            DocValue::Binary(vec![0, 1, 2]),
        ] {
            let bytes = encode_value(&value, None).unwrap();
            let record = decode_value(&bytes).unwrap();
            assert_eq!(record.ttl, None);
            match record.payload {
                Payload::Primitive(p) => assert_eq!(p.decode().unwrap(), value),
                other => panic!("expected primitive, got {other:?}"),
            }
        }
    }

    #[test]
    fn ttl_round_trips() {
        let ttl = Ttl::from_millis(3).unwrap();
        let bytes = encode_value(&DocValue::Text("row2_e".into()), Some(ttl)).unwrap();
        let record = decode_value(&bytes).unwrap();
        assert_eq!(record.ttl, Some(ttl));
        assert!(!record.is_tombstone());
        assert!(ttl.expired(
            HybridTime::from_micros(2800),
            HybridTime::from_micros(2800 + 3000)
        ));
    }

    #[test]
    fn tombstone_round_trips() {
        let record = decode_value(&encode_tombstone()).unwrap();
        assert!(record.is_tombstone());
        assert_eq!(record.ttl, None);
    }

    #[test]
    fn intent_value_round_trips() {
        let txn = TxnId::new(2).unwrap();
        let payload = encode_value(&DocValue::Text("row2_e_t2".into()), None).unwrap();
        let intent = decode_intent_value(&encode_strong_intent_value(txn, &payload)).unwrap();
        assert_eq!(intent.txn_id, txn);
        assert!(!intent.record.is_tombstone());

        let intent =
            decode_intent_value(&encode_strong_intent_value(txn, &encode_tombstone())).unwrap();
        assert!(intent.record.is_tombstone());

        let weak = decode_intent_value(&encode_weak_intent_value(txn)).unwrap();
        assert_eq!(weak.record.payload, Payload::None);
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(decode_value(&[]).is_err());
        assert!(decode_value(&[0x07]).is_err());
        // Int64 with a short body.
        assert!(decode_value(&[TAG_INT64, 1, 2, 3]).is_err());
        // Trailing garbage after a bool.
        assert!(decode_value(&[TAG_TRUE, 0x00]).is_err());
        // Regular entry carrying a transaction id.
        let txn = TxnId::new(1).unwrap();
        assert!(decode_value(&encode_weak_intent_value(txn)).is_err());
        // Intent entry without a transaction id.
        assert!(decode_intent_value(&encode_tombstone()).is_err());
        // Weak marker on a regular entry.
        assert!(decode_value(&[TAG_NONE]).is_err());
    }
}
