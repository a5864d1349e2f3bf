//! Transaction identifiers.

use std::fmt;
use std::num::NonZeroU64;

/// Identifier of a distributed transaction.
///
/// Assigned by the transaction coordinator; zero is reserved and never names
/// a transaction.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct TxnId(NonZeroU64);

impl TxnId {
    /// Construct a `TxnId` if `raw` is nonzero.
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Option<Self> {
        match NonZeroU64::new(raw) {
            Some(nz) => Some(Self(nz)),
            None => None,
        }
    }

    /// Get the raw u64 value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn#{}", self.get())
    }
}

impl TryFrom<u64> for TxnId {
    type Error = InvalidTxnId;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(InvalidTxnId)
    }
}

/// Error returned when attempting to construct a zero `TxnId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTxnId;

impl fmt::Display for InvalidTxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid TxnId 0 (transaction ids are nonzero)")
    }
}

impl std::error::Error for InvalidTxnId {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_rejected() {
        assert!(TxnId::new(0).is_none());
        assert!(TxnId::try_from(0).is_err());
    }

    #[test]
    fn display() {
        assert_eq!(TxnId::new(7).unwrap().to_string(), "txn#7");
    }
}
