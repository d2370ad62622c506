//! SQL-level column types for DDL generation.
//!
//! These are storage types. The catalog's `ColumnType` describes how a
//! column is filtered; several filter types share one storage type.

use std::fmt;

/// SQL-level data type for CREATE TABLE statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Unbounded text.
    Text,
    /// Length-limited text.
    Varchar(u32),
    /// 16-bit integer, used for small coded enums.
    SmallInt,
    /// 32-bit integer.
    Integer,
    /// 64-bit integer.
    BigInt,
    /// Auto-incrementing integer key.
    Serial,
    /// 64-bit floating point.
    Double,
    Boolean,
    /// Timestamp without time zone.
    Timestamp,
    Uuid,
    Json,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Text => write!(f, "text"),
            DataType::Varchar(n) => write!(f, "varchar({})", n),
            DataType::SmallInt => write!(f, "smallint"),
            DataType::Integer => write!(f, "integer"),
            DataType::BigInt => write!(f, "bigint"),
            DataType::Serial => write!(f, "serial"),
            DataType::Double => write!(f, "double"),
            DataType::Boolean => write!(f, "boolean"),
            DataType::Timestamp => write!(f, "timestamp"),
            DataType::Uuid => write!(f, "uuid"),
            DataType::Json => write!(f, "json"),
        }
    }
}
