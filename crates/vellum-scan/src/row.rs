//! Row materialization.
//!
//! Translates a document's selected cells into a projected row: key columns
//! come from the decoded document key, value columns from the cell map, and
//! every value is checked against the column's declared type.

use smallvec::SmallVec;
use vellum_error::{Result, VellumError};
use vellum_types::{ColumnId, DocValue};

use crate::schema::Projection;

/// A materialized row: projected columns in projection order, plus the
/// decoded primary-key values. Built fresh for every `next_row`.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: SmallVec<[(ColumnId, DocValue); 8]>,
    primary_key: SmallVec<[DocValue; 2]>,
}

impl Row {
    /// Value at a projection position.
    #[must_use]
    pub fn get(&self, index: usize) -> &DocValue {
        &self.columns[index].1
    }

    /// Value of a projected column by id.
    #[must_use]
    pub fn by_id(&self, id: ColumnId) -> Option<&DocValue> {
        self.columns
            .iter()
            .find(|(col, _)| *col == id)
            .map(|(_, v)| v)
    }

    /// The row's decoded primary-key values, in key order.
    #[must_use]
    pub fn primary_key(&self) -> &[DocValue] {
        &self.primary_key
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Assemble a row from decoded primary-key values and the visible cells.
///
/// `cells` maps value-column ids to their visible values; absent columns read
/// as NULL. Schema type checking happens here: a payload the declared type
/// does not accept is corruption.
pub fn assemble(
    projection: &Projection,
    primary_key: Vec<DocValue>,
    cells: &[(ColumnId, DocValue)],
) -> Result<Row> {
    let mut columns = SmallVec::with_capacity(projection.len());
    for col in projection.columns() {
        let value = match col.key_position {
            Some(pos) => primary_key
                .get(pos)
                .cloned()
                .ok_or_else(|| {
                    VellumError::corruption(format!(
                        "document key has no component for key column {:?}",
                        col.name
                    ))
                })?,
            None => cells
                .iter()
                .find(|(id, _)| *id == col.id)
                .map(|(_, v)| v.clone())
                .unwrap_or(DocValue::Null),
        };
        if !col.data_type.accepts(&value) {
            return Err(VellumError::TypeMismatch {
                column: col.name.clone(),
                expected: col.data_type.to_string(),
                actual: value
                    .data_type()
                    .map_or_else(|| "null".to_owned(), |t| t.to_string()),
            });
        }
        columns.push((col.id, value));
    }
    Ok(Row {
        columns,
        primary_key: primary_key.into(),
    })
}
