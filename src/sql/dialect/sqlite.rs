//! SQLite SQL dialect.
//!
//! SQLite features:
//! - ANSI identifier quoting (`"`)
//! - No native boolean; stored as 0/1
//! - UUIDs and timestamps stored as TEXT
//! - `?n` placeholders
//! - LIKE is already case-insensitive for ASCII

use super::helpers;
use super::SqlDialect;
use crate::sql::types::DataType;

/// SQLite SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Sqlite;

impl SqlDialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }

    fn placeholder(&self, index: usize) -> String {
        format!("?{}", index)
    }

    // Uses default emit_limit_offset (LIMIT ... OFFSET ...)

    fn emit_data_type(&self, dt: &DataType) -> String {
        match dt {
            DataType::Text | DataType::Varchar(_) | DataType::Uuid | DataType::Json => {
                "TEXT".into()
            }
            DataType::Timestamp => "TEXT".into(),
            DataType::SmallInt
            | DataType::Integer
            | DataType::BigInt
            | DataType::Boolean => "INTEGER".into(),
            // INTEGER PRIMARY KEY aliases the rowid
            DataType::Serial => "INTEGER".into(),
            DataType::Double => "REAL".into(),
        }
    }
}
