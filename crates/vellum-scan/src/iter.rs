//! Row iterator facade.
//!
//! [`DocRowIterator`] wires the walker, codecs and row assembly behind the
//! three-call surface the query layer consumes: `init`, `has_next`,
//! `next_row`. Lookahead is explicit: `has_next` materializes the next row
//! into a slot and is idempotent; `next_row` consumes the slot. After any
//! failure the iterator replays the same error on every subsequent call.
//!
//! An iterator is single-use and single-threaded: it borrows the schema,
//! projection and store for its lifetime, pins a store snapshot at `init`,
//! and releases it when dropped.

use vellum_error::{ErrorClass, Result, VellumError};
use vellum_types::{Cx, HybridTime};

use crate::intents::{IntentResolver, TxnOpContext};
use crate::row::{self, Row};
use crate::schema::{Projection, ScanBounds, TableSchema};
use crate::store::DocStore;
use crate::walker::DocWalker;

/// Everything that parameterizes one read: the snapshot time, the optional
/// transactional context (absent means intents are invisible), and the
/// cancellation context.
#[derive(Debug, Clone)]
pub struct ReadContext<'a> {
    pub read_time: HybridTime,
    pub txn: Option<TxnOpContext<'a>>,
    pub cx: Cx,
}

impl<'a> ReadContext<'a> {
    /// A non-transactional read: intents are unconditionally ignored.
    #[must_use]
    pub fn non_transactional(read_time: HybridTime) -> Self {
        Self {
            read_time,
            txn: None,
            cx: Cx::new(),
        }
    }

    /// A transactional read resolving intents through `txn`'s oracle.
    #[must_use]
    pub fn transactional(read_time: HybridTime, txn: TxnOpContext<'a>) -> Self {
        Self {
            read_time,
            txn: Some(txn),
            cx: Cx::new(),
        }
    }

    #[must_use]
    pub fn with_cx(mut self, cx: Cx) -> Self {
        self.cx = cx;
        self
    }
}

/// The row-wise iteration capability exposed to the query layer.
pub trait RowSource {
    /// Pin a snapshot and position at the first document in bounds.
    fn init(&mut self) -> Result<()>;

    /// Whether another row exists. Idempotent: repeated calls return the
    /// same answer and do not advance.
    fn has_next(&mut self) -> Result<bool>;

    /// Produce the next row. Fails with [`VellumError::Exhausted`] after
    /// `has_next` has returned false.
    fn next_row(&mut self) -> Result<Row>;
}

/// Replayable image of a failure, so every call after an error reports the
/// same condition.
#[derive(Debug, Clone)]
enum Failure {
    TryAgain { txn_id: u64 },
    Cancelled { reason: &'static str },
    Corruption { detail: String },
    TypeMismatch { column: String, expected: String, actual: String },
    Io { kind: std::io::ErrorKind, message: String },
    Exhausted,
}

impl Failure {
    fn capture(err: &VellumError) -> Self {
        match err {
            VellumError::TryAgain { txn_id } => Self::TryAgain { txn_id: *txn_id },
            VellumError::Cancelled { reason } => Self::Cancelled { reason },
            VellumError::Corruption { detail } => Self::Corruption {
                detail: detail.clone(),
            },
            VellumError::TypeMismatch {
                column,
                expected,
                actual,
            } => Self::TypeMismatch {
                column: column.clone(),
                expected: expected.clone(),
                actual: actual.clone(),
            },
            VellumError::Io(io) => Self::Io {
                kind: io.kind(),
                message: io.to_string(),
            },
            VellumError::Exhausted => Self::Exhausted,
        }
    }

    fn to_error(&self) -> VellumError {
        match self {
            Self::TryAgain { txn_id } => VellumError::TryAgain { txn_id: *txn_id },
            Self::Cancelled { reason } => VellumError::Cancelled { reason },
            Self::Corruption { detail } => VellumError::Corruption {
                detail: detail.clone(),
            },
            Self::TypeMismatch {
                column,
                expected,
                actual,
            } => VellumError::TypeMismatch {
                column: column.clone(),
                expected: expected.clone(),
                actual: actual.clone(),
            },
            Self::Io { kind, message } => {
                VellumError::Io(std::io::Error::new(*kind, message.clone()))
            }
            Self::Exhausted => VellumError::Exhausted,
        }
    }
}

/// Lookahead slot: advancing and emitting are separate steps.
#[derive(Debug)]
enum Lookahead {
    /// No row materialized yet.
    Blank,
    /// The next row, waiting for `next_row`.
    Ready(Row),
    /// The scan is over.
    Done,
    /// A failure to replay.
    Failed(Failure),
}

/// Row-wise iterator over one table's documents at one read time.
pub struct DocRowIterator<'a> {
    projection: &'a Projection,
    schema: &'a TableSchema,
    ctx: ReadContext<'a>,
    store: &'a dyn DocStore,
    bounds: ScanBounds,
    walker: Option<DocWalker<'a>>,
    lookahead: Lookahead,
}

impl<'a> DocRowIterator<'a> {
    #[must_use]
    pub fn new(
        projection: &'a Projection,
        schema: &'a TableSchema,
        ctx: ReadContext<'a>,
        store: &'a dyn DocStore,
    ) -> Self {
        Self {
            projection,
            schema,
            ctx,
            store,
            bounds: ScanBounds::all(),
            walker: None,
            lookahead: Lookahead::Blank,
        }
    }

    /// Restrict the scan to a document-key range.
    #[must_use]
    pub fn with_bounds(mut self, bounds: ScanBounds) -> Self {
        self.bounds = bounds;
        self
    }

    fn fail(&mut self, err: VellumError) -> VellumError {
        match err.class() {
            ErrorClass::Corruption => tracing::warn!(error = %err, "row iterator failed"),
            _ => tracing::debug!(error = %err, "row iterator stopped"),
        }
        self.lookahead = Lookahead::Failed(Failure::capture(&err));
        err
    }

    /// Materialize the next row into the lookahead slot.
    fn fill_lookahead(&mut self) -> Result<()> {
        if self.walker.is_none() {
            self.init()?;
        }
        let walker = self.walker.as_mut().expect("walker initialized");
        match walker.next_document() {
            Ok(Some(walked)) => {
                let assembled = self
                    .schema
                    .decode_doc_key(&walked.doc_key)
                    .and_then(|pk| row::assemble(self.projection, pk, &walked.cells));
                match assembled {
                    Ok(row) => {
                        self.lookahead = Lookahead::Ready(row);
                        Ok(())
                    }
                    Err(err) => Err(self.fail(err)),
                }
            }
            Ok(None) => {
                self.lookahead = Lookahead::Done;
                Ok(())
            }
            Err(err) => Err(self.fail(err)),
        }
    }
}

impl RowSource for DocRowIterator<'_> {
    fn init(&mut self) -> Result<()> {
        let store = self.store;
        let cursor = store.snapshot().map_err(|e| self.fail(e))?;
        let resolver = IntentResolver::new(self.ctx.txn);
        let walker = DocWalker::new(
            cursor,
            self.ctx.read_time,
            resolver,
            self.projection,
            self.bounds.clone(),
            self.ctx.cx.clone(),
        )
        .map_err(|e| self.fail(e))?;
        self.walker = Some(walker);
        self.lookahead = Lookahead::Blank;
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool> {
        if matches!(self.lookahead, Lookahead::Blank) {
            self.fill_lookahead()?;
        }
        match &self.lookahead {
            Lookahead::Ready(_) => Ok(true),
            Lookahead::Done => Ok(false),
            Lookahead::Failed(failure) => Err(failure.to_error()),
            Lookahead::Blank => unreachable!("lookahead filled above"),
        }
    }

    fn next_row(&mut self) -> Result<Row> {
        if matches!(self.lookahead, Lookahead::Blank) {
            self.fill_lookahead()?;
        }
        match std::mem::replace(&mut self.lookahead, Lookahead::Blank) {
            Lookahead::Ready(row) => Ok(row),
            Lookahead::Done => {
                self.lookahead = Lookahead::Done;
                Err(VellumError::Exhausted)
            }
            Lookahead::Failed(failure) => {
                let err = failure.to_error();
                self.lookahead = Lookahead::Failed(failure);
                Err(err)
            }
            Lookahead::Blank => unreachable!("lookahead filled above"),
        }
    }
}
