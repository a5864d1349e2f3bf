//! Row-wise MVCC iterator over the Vellum document store.
//!
//! The storage layer keeps each logical row as a *document*: an ordered run
//! of entries whose keys encode `(document key, sub-key path, hybrid
//! timestamp, write index)` and whose values are primitives, tombstones, or
//! provisional transactional writes. This crate materializes the committed
//! row snapshot observable at a caller-chosen read time:
//!
//! - [`keys`] / [`values`] decode the order-preserving entry layout,
//! - [`intents`] resolves provisional writes through the transaction-status
//!   oracle,
//! - [`visibility`] picks the version of one cell a read observes,
//! - [`walker`] walks documents over the raw snapshot cursor,
//! - [`row`] assembles projected rows, and
//! - [`iter`] exposes the `init` / `has_next` / `next_row` facade.
//!
//! The underlying store, the oracle, and the schema are external
//! collaborators consumed through the traits in [`store`], [`intents`] and
//! [`schema`]. [`store::MemStore`], [`intents::MockOracle`] and the
//! [`testing`] helpers are exported for tests of this and dependent crates.

pub mod intents;
pub mod iter;
pub mod keys;
pub mod row;
pub mod schema;
pub mod store;
pub mod testing;
pub mod values;
pub mod visibility;
pub mod walker;

pub use intents::{MockOracle, TxnOpContext, TxnStatus, TxnStatusOracle};
pub use iter::{DocRowIterator, ReadContext, RowSource};
pub use row::Row;
pub use schema::{ColumnSchema, Projection, ScanBounds, TableSchema};
pub use store::{DocStore, MemStore, RawCursor};
