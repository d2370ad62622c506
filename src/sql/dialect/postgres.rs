//! PostgreSQL SQL dialect.
//!
//! - ANSI identifier quoting (`"`)
//! - Native boolean and UUID types
//! - `$n` placeholders
//! - ILIKE for case-insensitive matching

use super::helpers;
use super::SqlDialect;
use crate::sql::types::DataType;

/// PostgreSQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn case_insensitive_like(&self) -> &'static str {
        "ILIKE"
    }

    fn emit_data_type(&self, dt: &DataType) -> String {
        match dt {
            DataType::Text => "TEXT".into(),
            DataType::Varchar(n) => format!("VARCHAR({})", n),
            DataType::SmallInt => "SMALLINT".into(),
            DataType::Integer => "INTEGER".into(),
            DataType::BigInt => "BIGINT".into(),
            DataType::Serial => "SERIAL".into(),
            DataType::Double => "DOUBLE PRECISION".into(),
            DataType::Boolean => "BOOLEAN".into(),
            DataType::Timestamp => "TIMESTAMP".into(),
            DataType::Uuid => "UUID".into(),
            DataType::Json => "JSONB".into(),
        }
    }
}
