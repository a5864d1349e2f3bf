//! Provisional-write resolution.
//!
//! Strong intents carry payloads of transactions that may or may not have
//! committed. The resolver consults the shared transaction-status oracle and
//! maps each intent to a committed version (at the transaction's commit time,
//! not the provisional write time), to nothing, or to a retry error.
//!
//! Resolution results are memoized per transaction id for the duration of one
//! row; nothing is cached across rows, because a transaction can commit
//! between rows and the caller expects each row to reflect the freshest
//! status the oracle will report.

use std::collections::HashMap;

use parking_lot::RwLock;
use vellum_error::{Result, VellumError};
use vellum_types::{Cx, HybridTime, TxnId};

/// Answer of the transaction-status oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnStatus {
    /// The transaction committed at the given time. Reported whenever the
    /// commit record exists, even if the commit time is after the asking
    /// read time; the visibility cut is the resolver's job.
    Committed(HybridTime),
    /// The transaction has not reached a decision yet.
    Pending,
    /// The transaction aborted, or terminated with its outcome discarded.
    Aborted,
    /// The oracle cannot answer for this transaction.
    Unknown,
}

/// Shared transaction-status oracle. Implementations must be thread-safe;
/// one oracle serves every iterator on the node.
pub trait TxnStatusOracle: Send + Sync {
    /// Status of `txn_id` as relevant to a read at `read_time`.
    ///
    /// May block on RPC to the transaction's coordinator.
    fn status(&self, txn_id: TxnId, read_time: HybridTime) -> TxnStatus;

    /// Commit time of `txn_id` if the commit record is local, else
    /// [`HybridTime::INVALID`]. Never blocks.
    fn local_commit_time(&self, txn_id: TxnId) -> HybridTime;
}

/// Transactional read configuration: present iff the read observes intents.
#[derive(Clone, Copy)]
pub struct TxnOpContext<'a> {
    pub oracle: &'a dyn TxnStatusOracle,
}

impl<'a> TxnOpContext<'a> {
    #[must_use]
    pub fn new(oracle: &'a dyn TxnStatusOracle) -> Self {
        Self { oracle }
    }
}

impl std::fmt::Debug for TxnOpContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxnOpContext").finish_non_exhaustive()
    }
}

/// Outcome of resolving one intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Treat the intent as a regular write at this commit time.
    CommittedAt(HybridTime),
    /// The intent does not exist for this read.
    Invisible,
}

/// Per-iterator intent resolver with per-row memoization.
pub struct IntentResolver<'a> {
    oracle: Option<&'a dyn TxnStatusOracle>,
    cache: HashMap<TxnId, Resolution>,
}

impl<'a> IntentResolver<'a> {
    #[must_use]
    pub fn new(txn: Option<TxnOpContext<'a>>) -> Self {
        Self {
            oracle: txn.map(|t| t.oracle),
            cache: HashMap::new(),
        }
    }

    /// Whether this read observes intents at all.
    #[must_use]
    pub fn transactional(&self) -> bool {
        self.oracle.is_some()
    }

    /// Drop memoized results; called at each document boundary.
    pub fn begin_row(&mut self) {
        self.cache.clear();
    }

    /// Resolve the transaction behind an intent.
    ///
    /// `Pending` and `Unknown` surface as [`VellumError::TryAgain`]: the
    /// intent's provisional time is at or before the read time, so the
    /// transaction's decision affects this row and the caller must retry.
    pub fn resolve(&mut self, cx: &Cx, txn_id: TxnId, read_time: HybridTime) -> Result<Resolution> {
        let oracle = self
            .oracle
            .expect("resolve() on a non-transactional read");

        if let Some(&cached) = self.cache.get(&txn_id) {
            return Ok(cached);
        }

        // The status lookup may block on RPC.
        cx.checkpoint()
            .map_err(|e| VellumError::Cancelled {
                reason: e.kind.reason(),
            })?;

        let local = oracle.local_commit_time(txn_id);
        let resolution = if local.is_valid() {
            Resolution::CommittedAt(local)
        } else {
            match oracle.status(txn_id, read_time) {
                TxnStatus::Committed(commit_time) => Resolution::CommittedAt(commit_time),
                TxnStatus::Aborted => Resolution::Invisible,
                TxnStatus::Pending | TxnStatus::Unknown => {
                    tracing::debug!(txn = %txn_id, read_time = %read_time, "intent unresolved");
                    return Err(VellumError::TryAgain {
                        txn_id: txn_id.get(),
                    });
                }
            }
        };

        tracing::debug!(txn = %txn_id, ?resolution, "intent resolved");
        self.cache.insert(txn_id, resolution);
        Ok(resolution)
    }
}

// ---------------------------------------------------------------------------
// Mock oracle (exported test double)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum TxnRecord {
    Committed { time: HybridTime, local: bool },
    Pending,
    Aborted,
}

/// In-memory oracle for tests. Unregistered transactions are `Unknown`.
#[derive(Default)]
pub struct MockOracle {
    txns: RwLock<HashMap<TxnId, TxnRecord>>,
    status_calls: RwLock<Vec<TxnId>>,
}

impl MockOracle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a commit served through the full status path.
    pub fn commit(&self, txn_id: TxnId, time: HybridTime) {
        self.txns
            .write()
            .insert(txn_id, TxnRecord::Committed { time, local: false });
    }

    /// Register a commit also served by the local fast path.
    pub fn commit_local(&self, txn_id: TxnId, time: HybridTime) {
        self.txns
            .write()
            .insert(txn_id, TxnRecord::Committed { time, local: true });
    }

    pub fn mark_pending(&self, txn_id: TxnId) {
        self.txns.write().insert(txn_id, TxnRecord::Pending);
    }

    pub fn abort(&self, txn_id: TxnId) {
        self.txns.write().insert(txn_id, TxnRecord::Aborted);
    }

    /// Transaction ids that went through the full status path, in order.
    #[must_use]
    pub fn status_calls(&self) -> Vec<TxnId> {
        self.status_calls.read().clone()
    }
}

impl TxnStatusOracle for MockOracle {
    fn status(&self, txn_id: TxnId, _read_time: HybridTime) -> TxnStatus {
        self.status_calls.write().push(txn_id);
        match self.txns.read().get(&txn_id) {
            Some(TxnRecord::Committed { time, .. }) => TxnStatus::Committed(*time),
            Some(TxnRecord::Pending) => TxnStatus::Pending,
            Some(TxnRecord::Aborted) => TxnStatus::Aborted,
            None => TxnStatus::Unknown,
        }
    }

    fn local_commit_time(&self, txn_id: TxnId) -> HybridTime {
        match self.txns.read().get(&txn_id) {
            Some(TxnRecord::Committed { time, local: true }) => *time,
            _ => HybridTime::INVALID,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn txn(raw: u64) -> TxnId {
        TxnId::new(raw).unwrap()
    }

    #[test]
    fn committed_resolves_to_commit_time() {
        let oracle = MockOracle::new();
        oracle.commit(txn(1), HybridTime::from_micros(3500));

        let mut resolver = IntentResolver::new(Some(TxnOpContext::new(&oracle)));
        let cx = Cx::new();
        let r = resolver
            .resolve(&cx, txn(1), HybridTime::from_micros(5000))
            .unwrap();
        assert_eq!(r, Resolution::CommittedAt(HybridTime::from_micros(3500)));
    }

    #[test]
    fn pending_and_unknown_are_try_again() {
        let oracle = MockOracle::new();
        oracle.mark_pending(txn(1));

        let mut resolver = IntentResolver::new(Some(TxnOpContext::new(&oracle)));
        let cx = Cx::new();
        let read = HybridTime::from_micros(5000);

        let err = resolver.resolve(&cx, txn(1), read).unwrap_err();
        assert!(matches!(err, VellumError::TryAgain { txn_id: 1 }));

        // Never registered: unknown.
        let err = resolver.resolve(&cx, txn(9), read).unwrap_err();
        assert!(matches!(err, VellumError::TryAgain { txn_id: 9 }));
    }

    #[test]
    fn aborted_is_invisible() {
        let oracle = MockOracle::new();
        oracle.abort(txn(2));

        let mut resolver = IntentResolver::new(Some(TxnOpContext::new(&oracle)));
        let cx = Cx::new();
        let r = resolver
            .resolve(&cx, txn(2), HybridTime::from_micros(100))
            .unwrap();
        assert_eq!(r, Resolution::Invisible);
    }

    #[test]
    fn results_are_memoized_within_a_row() {
        let oracle = MockOracle::new();
        oracle.commit(txn(1), HybridTime::from_micros(3500));

        let mut resolver = IntentResolver::new(Some(TxnOpContext::new(&oracle)));
        let cx = Cx::new();
        let read = HybridTime::from_micros(5000);

        resolver.resolve(&cx, txn(1), read).unwrap();
        resolver.resolve(&cx, txn(1), read).unwrap();
        assert_eq!(oracle.status_calls().len(), 1);

        // A new row asks the oracle again.
        resolver.begin_row();
        resolver.resolve(&cx, txn(1), read).unwrap();
        assert_eq!(oracle.status_calls().len(), 2);
    }

    #[test]
    fn local_commit_time_skips_the_status_call() {
        let oracle = MockOracle::new();
        oracle.commit_local(txn(3), HybridTime::from_micros(777));

        let mut resolver = IntentResolver::new(Some(TxnOpContext::new(&oracle)));
        let cx = Cx::new();
        let r = resolver
            .resolve(&cx, txn(3), HybridTime::from_micros(1000))
            .unwrap();
        assert_eq!(r, Resolution::CommittedAt(HybridTime::from_micros(777)));
        assert!(oracle.status_calls().is_empty());
    }

    #[test]
    fn cancelled_context_stops_resolution() {
        let oracle = MockOracle::new();
        oracle.commit(txn(1), HybridTime::from_micros(100));

        let mut resolver = IntentResolver::new(Some(TxnOpContext::new(&oracle)));
        let cx = Cx::new();
        cx.cancel();
        let err = resolver
            .resolve(&cx, txn(1), HybridTime::from_micros(5000))
            .unwrap_err();
        assert!(matches!(err, VellumError::Cancelled { .. }));
        assert!(oracle.status_calls().is_empty());
    }
}
