//! Hybrid timestamps.
//!
//! A [`HybridTime`] is the MVCC version coordinate of the storage layer: a
//! physical microsecond clock reading combined with a logical counter that
//! disambiguates events within one microsecond. The two components are packed
//! into a single `u64` so that the integer ordering *is* the version ordering.

use std::fmt;
use std::num::NonZeroU64;

/// Bits reserved for the logical component in the packed representation.
pub const LOGICAL_BITS: u32 = 12;

const LOGICAL_MASK: u64 = (1 << LOGICAL_BITS) - 1;

/// A hybrid physical/logical timestamp, packed as
/// `(physical_micros << 12) | logical`.
///
/// Larger means later. Two sentinels live outside the normal domain:
/// [`HybridTime::MIN`] sorts strictly before every real timestamp and
/// [`HybridTime::INVALID`] denotes absence (it is not a point in time and
/// must never be compared as one).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct HybridTime(u64);

impl HybridTime {
    /// Sorts strictly before any real timestamp.
    pub const MIN: Self = Self(0);

    /// The largest real timestamp.
    pub const MAX: Self = Self(u64::MAX - 1);

    /// Absence of a timestamp.
    pub const INVALID: Self = Self(u64::MAX);

    /// Construct from a physical microsecond reading with logical component 0.
    #[inline]
    #[must_use]
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros << LOGICAL_BITS)
    }

    /// Construct from explicit physical and logical components.
    ///
    /// The logical component is truncated to [`LOGICAL_BITS`] bits.
    #[inline]
    #[must_use]
    pub const fn from_parts(micros: u64, logical: u16) -> Self {
        Self((micros << LOGICAL_BITS) | (logical as u64 & LOGICAL_MASK))
    }

    /// Reconstruct from a packed representation (e.g. decoded key bytes).
    #[inline]
    #[must_use]
    pub const fn from_packed(raw: u64) -> Self {
        Self(raw)
    }

    /// The packed `u64` representation.
    #[inline]
    #[must_use]
    pub const fn packed(self) -> u64 {
        self.0
    }

    /// Physical component in microseconds.
    #[inline]
    #[must_use]
    pub const fn physical_micros(self) -> u64 {
        self.0 >> LOGICAL_BITS
    }

    /// Logical component.
    #[inline]
    #[must_use]
    pub const fn logical(self) -> u16 {
        (self.0 & LOGICAL_MASK) as u16
    }

    /// Whether this is a real timestamp (not [`HybridTime::INVALID`]).
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != u64::MAX
    }

    /// The timestamp `micros` microseconds after this one, logical component
    /// preserved. Saturates at [`HybridTime::MAX`].
    #[must_use]
    pub const fn add_micros(self, micros: u64) -> Self {
        let physical = self.physical_micros().saturating_add(micros);
        if physical >= (u64::MAX >> LOGICAL_BITS) {
            return Self::MAX;
        }
        Self((physical << LOGICAL_BITS) | (self.0 & LOGICAL_MASK))
    }

    /// Physical distance `self − earlier` in microseconds, or 0 if `earlier`
    /// is not earlier.
    #[must_use]
    pub const fn physical_micros_since(self, earlier: Self) -> u64 {
        self.physical_micros()
            .saturating_sub(earlier.physical_micros())
    }
}

impl fmt::Display for HybridTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_valid() {
            return f.write_str("HT{ invalid }");
        }
        if self.logical() == 0 {
            write!(f, "HT{{ physical: {} }}", self.physical_micros())
        } else {
            write!(
                f,
                "HT{{ physical: {} logical: {} }}",
                self.physical_micros(),
                self.logical()
            )
        }
    }
}

/// A write's position within its batch.
///
/// Writes applied in one batch share a [`HybridTime`]; the write index makes
/// the full version order `(timestamp, write_index)` total.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[repr(transparent)]
pub struct WriteIndex(u32);

impl WriteIndex {
    pub const ZERO: Self = Self(0);

    #[inline]
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for WriteIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

/// A TTL attached to a single stored version.
///
/// Expiry is evaluated against physical time only: a value written at `T`
/// with TTL `d` is expired at read time `R` when `R - T >= d` (microseconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[repr(transparent)]
pub struct Ttl(NonZeroU64);

impl Ttl {
    /// Construct from a duration in microseconds. Zero is not a TTL.
    #[inline]
    #[must_use]
    pub const fn from_micros(micros: u64) -> Option<Self> {
        match NonZeroU64::new(micros) {
            Some(nz) => Some(Self(nz)),
            None => None,
        }
    }

    /// Construct from a duration in milliseconds. Zero is not a TTL.
    #[inline]
    #[must_use]
    pub const fn from_millis(millis: u32) -> Option<Self> {
        Self::from_micros(millis as u64 * 1000)
    }

    #[inline]
    #[must_use]
    pub const fn as_micros(self) -> u64 {
        self.0.get()
    }

    /// Whether a value written at `written` is expired at `read`.
    #[must_use]
    pub const fn expired(self, written: HybridTime, read: HybridTime) -> bool {
        read.physical_micros_since(written) >= self.as_micros()
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ttl: {}us", self.as_micros())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn packing_round_trips() {
        let ht = HybridTime::from_parts(1000, 7);
        assert_eq!(ht.physical_micros(), 1000);
        assert_eq!(ht.logical(), 7);
        assert_eq!(HybridTime::from_packed(ht.packed()), ht);
    }

    #[test]
    fn sentinels_order() {
        let real = HybridTime::from_micros(1);
        assert!(HybridTime::MIN < real);
        assert!(real < HybridTime::MAX);
        assert!(HybridTime::MAX < HybridTime::INVALID);
        assert!(!HybridTime::INVALID.is_valid());
        assert!(HybridTime::MIN.is_valid());
    }

    #[test]
    fn display_matches_dump_format() {
        assert_eq!(
            HybridTime::from_micros(2500).to_string(),
            "HT{ physical: 2500 }"
        );
        assert_eq!(
            HybridTime::from_parts(2500, 3).to_string(),
            "HT{ physical: 2500 logical: 3 }"
        );
    }

    #[test]
    fn ttl_expiry_boundary() {
        let ttl = Ttl::from_millis(1).unwrap();
        let written = HybridTime::from_micros(2800);
        // One microsecond short of the TTL: still live.
        assert!(!ttl.expired(written, HybridTime::from_micros(2800 + 999)));
        // Exactly at the TTL: expired.
        assert!(ttl.expired(written, HybridTime::from_micros(2800 + 1000)));
        assert!(ttl.expired(written, HybridTime::from_micros(2800 + 2000)));
    }

    #[test]
    fn add_micros_saturates() {
        assert_eq!(HybridTime::MAX.add_micros(10), HybridTime::MAX);
        let ht = HybridTime::from_parts(100, 5).add_micros(50);
        assert_eq!(ht.physical_micros(), 150);
        assert_eq!(ht.logical(), 5);
    }

    proptest! {
        #[test]
        fn prop_packed_order_is_component_order(
            a_us in 0_u64..1 << 40, a_log in 0_u16..1 << 12,
            b_us in 0_u64..1 << 40, b_log in 0_u16..1 << 12,
        ) {
            let a = HybridTime::from_parts(a_us, a_log);
            let b = HybridTime::from_parts(b_us, b_log);
            prop_assert_eq!(a.cmp(&b), (a_us, a_log).cmp(&(b_us, b_log)));
        }

        #[test]
        fn prop_parts_round_trip(us in 0_u64..1 << 40, log in 0_u16..1 << 12) {
            let ht = HybridTime::from_parts(us, log);
            prop_assert_eq!((ht.physical_micros(), ht.logical()), (us, log));
        }
    }
}
