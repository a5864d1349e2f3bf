//! Storage values and declared column types.

use std::fmt;

/// Stable numeric identifier of a table column.
///
/// Column ids survive schema changes (columns are added and dropped by id,
/// never renumbered), so stored data never needs rewriting.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct ColumnId(u32);

impl ColumnId {
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

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "col#{}", self.0)
    }
}

/// Declared type of a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum DataType {
    Bool,
    Int64,
    Double,
    Text,
    Binary,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::Int64 => "int64",
            Self::Double => "double",
            Self::Text => "text",
            Self::Binary => "binary",
        };
        f.write_str(name)
    }
}

impl DataType {
    /// Whether a stored value is acceptable in a column of this type.
    ///
    /// NULL is accepted by every column type; nullability is a table
    /// constraint enforced on the write path, not here.
    #[must_use]
    pub const fn accepts(self, value: &DocValue) -> bool {
        matches!(
            (self, value),
            (_, DocValue::Null)
                | (Self::Bool, DocValue::Bool(_))
                | (Self::Int64, DocValue::Int64(_))
                | (Self::Double, DocValue::Double(_))
                | (Self::Text, DocValue::Text(_))
                | (Self::Binary, DocValue::Binary(_))
        )
    }
}

/// A dynamically-typed storage value, as decoded from a stored cell.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum DocValue {
    Null,
    Bool(bool),
    Int64(i64),
    Double(f64),
    Text(String),
    Binary(Vec<u8>),
}

impl DocValue {
    #[inline]
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The declared type this value belongs to, or `None` for NULL.
    #[must_use]
    pub const fn data_type(&self) -> Option<DataType> {
        match self {
            Self::Null => None,
            Self::Bool(_) => Some(DataType::Bool),
            Self::Int64(_) => Some(DataType::Int64),
            Self::Double(_) => Some(DataType::Double),
            Self::Text(_) => Some(DataType::Text),
            Self::Binary(_) => Some(DataType::Binary),
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int64(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for DocValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Binary(b) => write!(f, "x{:02x?}", b),
        }
    }
}

impl From<i64> for DocValue {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<&str> for DocValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<bool> for DocValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}
