//! SQL generation module.
//!
//! A type-safe SQL builder that renders PostgreSQL or SQLite with bound
//! parameters:
//!
//! - [`query`] - SELECT query builder
//! - [`expr`] - Expression AST and builder DSL
//! - [`ddl`] - CREATE TABLE / CREATE INDEX
//! - [`dml`] - UPDATE
//! - [`token`] - Token types and statement rendering
//! - [`value`] - Bound parameter values
//! - [`dialect`] - SQL dialect implementations

pub mod ddl;
pub mod dialect;
pub mod dml;
pub mod expr;
pub mod query;
pub mod token;
pub mod types;
pub mod value;

pub use types::DataType as SqlDataType;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types at the sql module level
pub use dialect::{Dialect, SqlDialect};
pub use expr::{
    and_all, col, count_distinct, count_star, func, lit_bool, lit_int, lit_null, lit_str, max,
    min, param, star, table_col, BinaryOperator, Expr, ExprExt, Literal,
};
pub use query::{JoinType, LimitOffset, NullsOrder, OrderByExpr, Query, SelectExpr, SortDir, TableRef};
pub use token::{Statement, Token, TokenStream};
pub use value::Value;

pub use ddl::{ColumnDef, CreateIndex, CreateTable, DdlStatement, TableConstraint};
pub use dml::Update;
