//! Table schema, projection and scan bounds.
//!
//! The schema is borrowed immutably for the iterator's lifetime. It knows the
//! column layout (key columns first), encodes and decodes document keys from
//! primary-key values, and builds projections by column names.

use smallvec::SmallVec;
use vellum_error::{Result, VellumError};
use vellum_types::{ColumnId, DataType, DocValue};

use crate::keys;

/// One column of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: String,
    pub id: ColumnId,
    pub data_type: DataType,
    pub nullable: bool,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, id: u32, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            id: ColumnId::new(id),
            data_type,
            nullable,
        }
    }
}

/// A table's column layout. The first `num_key_columns` columns form the
/// primary key, in document-key encoding order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    columns: Vec<ColumnSchema>,
    num_key_columns: usize,
}

fn config_error(detail: String) -> VellumError {
    VellumError::Corruption { detail }
}

impl TableSchema {
    pub fn new(columns: Vec<ColumnSchema>, num_key_columns: usize) -> Result<Self> {
        if num_key_columns > columns.len() {
            return Err(config_error(format!(
                "schema has {} columns but {} key columns",
                columns.len(),
                num_key_columns
            )));
        }
        for (i, col) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.id == col.id) {
                return Err(config_error(format!("duplicate column id {}", col.id)));
            }
            if columns[..i].iter().any(|c| c.name == col.name) {
                return Err(config_error(format!("duplicate column name {:?}", col.name)));
            }
        }
        for col in &columns[..num_key_columns] {
            if !matches!(col.data_type, DataType::Text | DataType::Int64) {
                return Err(config_error(format!(
                    "key column {:?} has non-key-encodable type {}",
                    col.name, col.data_type
                )));
            }
        }
        Ok(Self {
            columns,
            num_key_columns,
        })
    }

    #[must_use]
    pub fn columns(&self) -> &[ColumnSchema] {
        &self.columns
    }

    #[must_use]
    pub fn num_key_columns(&self) -> usize {
        self.num_key_columns
    }

    #[must_use]
    pub fn key_columns(&self) -> &[ColumnSchema] {
        &self.columns[..self.num_key_columns]
    }

    #[must_use]
    pub fn column_by_id(&self, id: ColumnId) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.id == id)
    }

    #[must_use]
    pub fn column_by_name(&self, name: &str) -> Option<(usize, &ColumnSchema)> {
        self.columns
            .iter()
            .enumerate()
            .find(|(_, c)| c.name == name)
    }

    /// Encode primary-key values into a document key, validating arity and
    /// types against the key columns.
    pub fn encode_doc_key(&self, key_values: &[DocValue]) -> Result<Vec<u8>> {
        if key_values.len() != self.num_key_columns {
            return Err(config_error(format!(
                "expected {} primary key values, got {}",
                self.num_key_columns,
                key_values.len()
            )));
        }
        for (col, value) in self.key_columns().iter().zip(key_values) {
            if value.is_null() || !col.data_type.accepts(value) {
                return Err(config_error(format!(
                    "primary key column {:?} ({}) cannot hold {value:?}",
                    col.name, col.data_type
                )));
            }
        }
        keys::encode_doc_key(key_values)
    }

    /// Decode the primary-key values from document-key bytes.
    pub fn decode_doc_key(&self, doc_key: &[u8]) -> Result<Vec<DocValue>> {
        let values = keys::decode_doc_key(doc_key)?;
        if values.len() != self.num_key_columns {
            return Err(VellumError::corruption(format!(
                "document key has {} components, schema expects {}",
                values.len(),
                self.num_key_columns
            )));
        }
        for (col, value) in self.key_columns().iter().zip(&values) {
            if !col.data_type.accepts(value) {
                return Err(VellumError::TypeMismatch {
                    column: col.name.clone(),
                    expected: col.data_type.to_string(),
                    actual: value
                        .data_type()
                        .map_or_else(|| "null".to_owned(), |t| t.to_string()),
                });
            }
        }
        Ok(values)
    }
}

/// One column of a projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectedColumn {
    pub id: ColumnId,
    pub name: String,
    pub data_type: DataType,
    /// Position among the schema's key columns, or `None` for value columns.
    pub key_position: Option<usize>,
}

/// An ordered list of columns to materialize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    columns: SmallVec<[ProjectedColumn; 8]>,
}

impl Projection {
    /// Build a projection of value (non-key) columns by name.
    pub fn by_names(schema: &TableSchema, names: &[&str]) -> Result<Self> {
        Self::by_names_with_key_prefix(schema, names, 0)
    }

    /// Build a projection by name where the first `key_prefix` names are the
    /// schema's leading key columns, in order, and the rest are value
    /// columns.
    ///
    /// Naming a key column outside the declared prefix is a configuration
    /// error.
    pub fn by_names_with_key_prefix(
        schema: &TableSchema,
        names: &[&str],
        key_prefix: usize,
    ) -> Result<Self> {
        if key_prefix > names.len() || key_prefix > schema.num_key_columns() {
            return Err(config_error(format!(
                "key prefix {key_prefix} exceeds projection or schema key columns"
            )));
        }
        let mut columns = SmallVec::new();
        for (i, name) in names.iter().enumerate() {
            let (pos, col) = schema
                .column_by_name(name)
                .ok_or_else(|| config_error(format!("no such column: {name}")))?;
            let is_key = pos < schema.num_key_columns();
            if i < key_prefix {
                if pos != i {
                    return Err(config_error(format!(
                        "projection key prefix must name the leading key columns in order, \
                         got {name:?} at position {i}"
                    )));
                }
            } else if is_key {
                return Err(config_error(format!(
                    "key column {name:?} outside the declared key prefix"
                )));
            }
            columns.push(ProjectedColumn {
                id: col.id,
                name: col.name.clone(),
                data_type: col.data_type,
                key_position: is_key.then_some(pos),
            });
        }
        Ok(Self { columns })
    }

    #[must_use]
    pub fn columns(&self) -> &[ProjectedColumn] {
        &self.columns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column id at a projection position.
    #[must_use]
    pub fn column_id(&self, index: usize) -> ColumnId {
        self.columns[index].id
    }

    /// Whether a value column id is part of this projection.
    #[must_use]
    pub fn contains_value_column(&self, id: ColumnId) -> bool {
        self.columns
            .iter()
            .any(|c| c.id == id && c.key_position.is_none())
    }
}

/// Document-key bounds of a scan: inclusive lower, exclusive upper.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanBounds {
    pub lower: Option<Vec<u8>>,
    pub upper: Option<Vec<u8>>,
}

impl ScanBounds {
    /// Unbounded scan.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_lower(mut self, doc_key: Vec<u8>) -> Self {
        self.lower = Some(doc_key);
        self
    }

    #[must_use]
    pub fn with_upper(mut self, doc_key: Vec<u8>) -> Self {
        self.upper = Some(doc_key);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_schema() -> TableSchema {
        TableSchema::new(
            vec![
                ColumnSchema::new("a", 10, DataType::Text, false),
                ColumnSchema::new("b", 20, DataType::Int64, false),
                ColumnSchema::new("c", 30, DataType::Text, true),
                ColumnSchema::new("d", 40, DataType::Int64, true),
                ColumnSchema::new("e", 50, DataType::Text, true),
            ],
            2,
        )
        .unwrap()
    }

    #[test]
    fn doc_key_round_trip_through_schema() {
        let schema = test_schema();
        let pk = vec![DocValue::Text("row1".into()), DocValue::Int64(11111)];
        let encoded = schema.encode_doc_key(&pk).unwrap();
        assert_eq!(schema.decode_doc_key(&encoded).unwrap(), pk);
    }

    #[test]
    fn doc_key_arity_and_types_are_checked() {
        let schema = test_schema();
        assert!(schema.encode_doc_key(&[DocValue::Text("x".into())]).is_err());
        assert!(schema
            .encode_doc_key(&[DocValue::Int64(1), DocValue::Int64(2)])
            .is_err());
    }

    #[test]
    fn projection_by_names() {
        let schema = test_schema();
        let proj = Projection::by_names(&schema, &["c", "d", "e"]).unwrap();
        assert_eq!(proj.len(), 3);
        assert_eq!(proj.column_id(0), ColumnId::new(30));
        assert_eq!(proj.column_id(1), ColumnId::new(40));
        assert!(proj.contains_value_column(ColumnId::new(50)));
        assert!(!proj.contains_value_column(ColumnId::new(10)));
    }

    #[test]
    fn key_projection() {
        let schema = test_schema();
        let proj = Projection::by_names_with_key_prefix(&schema, &["a", "b"], 2).unwrap();
        assert_eq!(proj.columns()[0].key_position, Some(0));
        assert_eq!(proj.columns()[1].key_position, Some(1));
        assert!(!proj.contains_value_column(ColumnId::new(10)));
    }

    #[test]
    fn key_column_outside_prefix_is_rejected() {
        let schema = test_schema();
        assert!(Projection::by_names(&schema, &["a"]).is_err());
        assert!(Projection::by_names_with_key_prefix(&schema, &["b", "c"], 1).is_err());
        assert!(Projection::by_names_with_key_prefix(&schema, &["a"], 2).is_err());
    }

    #[test]
    fn unknown_column_is_rejected() {
        let schema = test_schema();
        assert!(Projection::by_names(&schema, &["zz"]).is_err());
    }

    #[test]
    fn duplicate_columns_rejected() {
        let result = TableSchema::new(
            vec![
                ColumnSchema::new("a", 10, DataType::Text, false),
                ColumnSchema::new("a2", 10, DataType::Text, true),
            ],
            1,
        );
        assert!(result.is_err());
    }

    #[test]
    fn key_columns_must_be_key_encodable() {
        let result = TableSchema::new(
            vec![ColumnSchema::new("a", 10, DataType::Double, false)],
            1,
        );
        assert!(result.is_err());
    }
}
