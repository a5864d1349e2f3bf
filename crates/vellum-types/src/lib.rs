//! Core types shared across the Vellum storage layer.
//!
//! This crate holds the cross-cutting vocabulary of the storage read path:
//! hybrid timestamps and write indices (the MVCC version coordinates),
//! transaction and column identifiers, dynamically-typed storage values, and
//! the [`cx::Cx`] cancellation context.

pub mod cx;
pub mod time;
pub mod txn;
pub mod value;

pub use cx::{Cx, InterruptKind, Interrupted};
pub use time::{HybridTime, Ttl, WriteIndex, LOGICAL_BITS};
pub use txn::{InvalidTxnId, TxnId};
pub use value::{ColumnId, DataType, DocValue};
