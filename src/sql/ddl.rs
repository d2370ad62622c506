//! DDL (Data Definition Language) support.
//!
//! Builders for the CREATE TABLE / CREATE INDEX statements the catalog
//! emits when bootstrapping a store.
//!
//! ```ignore
//! use roster::sql::{ColumnDef, CreateTable, Dialect, SqlDataType};
//!
//! let table = CreateTable::new("artists")
//!     .column(ColumnDef::new("id", SqlDataType::Uuid).primary_key())
//!     .column(ColumnDef::new("name", SqlDataType::Varchar(256)).not_null());
//!
//! println!("{}", table.to_sql(Dialect::Postgres));
//! ```

use super::dialect::{Dialect, SqlDialect};
use super::expr::Expr;
use super::token::{Token, TokenStream};

pub use super::types::DataType;

/// DDL statement types.
#[derive(Debug, Clone)]
pub enum DdlStatement {
    CreateTable(CreateTable),
    CreateIndex(CreateIndex),
}

impl DdlStatement {
    /// Convert to SQL for the given dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect).serialize(dialect)
    }

    /// Convert to token stream.
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        match self {
            DdlStatement::CreateTable(ct) => ct.to_tokens(dialect),
            DdlStatement::CreateIndex(ci) => ci.to_tokens(dialect),
        }
    }
}

// ============================================================================
// CREATE TABLE
// ============================================================================

/// CREATE TABLE statement.
#[derive(Debug, Clone)]
#[must_use = "DDL statements have no effect until converted to SQL with to_sql()"]
pub struct CreateTable {
    pub if_not_exists: bool,
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub constraints: Vec<TableConstraint>,
}

impl CreateTable {
    /// Create a new CREATE TABLE statement.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            if_not_exists: false,
            name: name.into(),
            columns: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// Add IF NOT EXISTS clause.
    pub fn if_not_exists(mut self) -> Self {
        self.if_not_exists = true;
        self
    }

    /// Add a column definition.
    pub fn column(mut self, col: ColumnDef) -> Self {
        self.columns.push(col);
        self
    }

    /// Add a table constraint.
    pub fn constraint(mut self, constraint: TableConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Convert to SQL for the given dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect).serialize(dialect)
    }

    /// Convert to token stream.
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        ts.push(Token::Create).space().push(Token::Table);

        if self.if_not_exists && dialect.supports_if_not_exists() {
            ts.space()
                .push(Token::If)
                .space()
                .push(Token::Not)
                .space()
                .push(Token::Exists);
        }

        ts.space().push(Token::Ident(self.name.clone()));
        ts.space().lparen();

        let mut first = true;
        for col in &self.columns {
            if !first {
                ts.comma().space();
            }
            first = false;
            ts.append(&col.to_tokens(dialect));
        }

        for constraint in &self.constraints {
            if !first {
                ts.comma().space();
            }
            first = false;
            ts.append(&constraint.to_tokens());
        }

        ts.rparen();
        ts
    }
}

// ============================================================================
// Column Definition
// ============================================================================

/// Column definition for CREATE TABLE.
#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
    pub nullable: Option<bool>,
    pub default: Option<Expr>,
    pub constraints: Vec<ColumnConstraint>,
}

impl ColumnDef {
    /// Create a new column definition.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: None,
            default: None,
            constraints: Vec::new(),
        }
    }

    /// Mark column as NOT NULL.
    pub fn not_null(mut self) -> Self {
        self.nullable = Some(false);
        self
    }

    /// Set default value.
    pub fn default(mut self, expr: Expr) -> Self {
        self.default = Some(expr);
        self
    }

    /// Add PRIMARY KEY constraint.
    pub fn primary_key(mut self) -> Self {
        self.constraints.push(ColumnConstraint::PrimaryKey);
        self
    }

    /// Add UNIQUE constraint.
    pub fn unique(mut self) -> Self {
        self.constraints.push(ColumnConstraint::Unique);
        self
    }

    /// Add REFERENCES constraint.
    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.constraints.push(ColumnConstraint::References {
            table: table.into(),
            column: column.into(),
        });
        self
    }

    /// Convert to token stream.
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        ts.push(Token::Ident(self.name.clone()));
        ts.space()
            .push(Token::Raw(dialect.emit_data_type(&self.data_type)));

        if self.nullable == Some(false) {
            ts.space().push(Token::Not).space().push(Token::Null);
        }

        if let Some(ref expr) = self.default {
            ts.space()
                .push(Token::Default)
                .space()
                .append(&expr.to_tokens_for_dialect(dialect));
        }

        for constraint in &self.constraints {
            match constraint {
                ColumnConstraint::PrimaryKey => {
                    ts.space().push(Token::Primary).space().push(Token::Key);
                }
                ColumnConstraint::Unique => {
                    ts.space().push(Token::Unique);
                }
                ColumnConstraint::References { table, column } => {
                    ts.space()
                        .push(Token::References)
                        .space()
                        .push(Token::Ident(table.clone()))
                        .lparen()
                        .push(Token::Ident(column.clone()))
                        .rparen();
                }
            }
        }

        ts
    }
}

/// Column-level constraints.
#[derive(Debug, Clone)]
pub enum ColumnConstraint {
    PrimaryKey,
    Unique,
    References { table: String, column: String },
}

/// Table-level constraints.
#[derive(Debug, Clone)]
pub enum TableConstraint {
    PrimaryKey { columns: Vec<String> },
}

impl TableConstraint {
    /// Create a composite PRIMARY KEY constraint.
    pub fn primary_key(columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        TableConstraint::PrimaryKey {
            columns: columns.into_iter().map(|c| c.into()).collect(),
        }
    }

    /// Convert to token stream.
    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        match self {
            TableConstraint::PrimaryKey { columns } => {
                ts.push(Token::Primary).space().push(Token::Key).space();
                emit_column_list(&mut ts, columns);
            }
        }
        ts
    }
}

// ============================================================================
// CREATE INDEX
// ============================================================================

/// CREATE INDEX statement.
#[derive(Debug, Clone)]
#[must_use = "DDL statements have no effect until converted to SQL with to_sql()"]
pub struct CreateIndex {
    pub unique: bool,
    pub if_not_exists: bool,
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
}

impl CreateIndex {
    /// Create a new CREATE INDEX statement.
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            unique: false,
            if_not_exists: false,
            name: name.into(),
            table: table.into(),
            columns: Vec::new(),
        }
    }

    /// Make this a unique index.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Add IF NOT EXISTS clause.
    pub fn if_not_exists(mut self) -> Self {
        self.if_not_exists = true;
        self
    }

    /// Add multiple columns to the index.
    pub fn columns(mut self, cols: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.columns.extend(cols.into_iter().map(|c| c.into()));
        self
    }

    /// Convert to SQL for the given dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect).serialize(dialect)
    }

    /// Convert to token stream.
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        ts.push(Token::Create);
        if self.unique {
            ts.space().push(Token::Unique);
        }
        ts.space().push(Token::Index);

        if self.if_not_exists && dialect.supports_if_not_exists() {
            ts.space()
                .push(Token::If)
                .space()
                .push(Token::Not)
                .space()
                .push(Token::Exists);
        }

        ts.space().push(Token::Ident(self.name.clone()));
        ts.space().push(Token::On).space();
        ts.push(Token::Ident(self.table.clone()));
        ts.space();
        emit_column_list(&mut ts, &self.columns);

        ts
    }
}

fn emit_column_list(ts: &mut TokenStream, columns: &[String]) {
    ts.lparen();
    for (i, col) in columns.iter().enumerate() {
        if i > 0 {
            ts.comma().space();
        }
        ts.push(Token::Ident(col.clone()));
    }
    ts.rparen();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::expr::lit_bool;
    use crate::sql::test_utils::validate_sql;

    fn memberships() -> CreateTable {
        CreateTable::new("organizations_artists")
            .if_not_exists()
            .column(ColumnDef::new("organization_id", DataType::Varchar(28)).not_null())
            .column(
                ColumnDef::new("artist_id", DataType::Uuid)
                    .not_null()
                    .references("artists", "id"),
            )
            .column(
                ColumnDef::new("muted", DataType::Boolean)
                    .not_null()
                    .default(lit_bool(false)),
            )
            .constraint(TableConstraint::primary_key(["organization_id", "artist_id"]))
    }

    #[test]
    fn test_create_table_postgres() {
        let sql = memberships().to_sql(Dialect::Postgres);
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS \"organizations_artists\" (\"organization_id\" VARCHAR(28) NOT NULL, \"artist_id\" UUID NOT NULL REFERENCES \"artists\"(\"id\"), \"muted\" BOOLEAN NOT NULL DEFAULT false, PRIMARY KEY (\"organization_id\", \"artist_id\"))"
        );
        validate_sql(&sql, Dialect::Postgres).unwrap();
    }

    #[test]
    fn test_create_table_sqlite_types() {
        let sql = memberships().to_sql(Dialect::Sqlite);
        assert!(sql.contains("\"artist_id\" TEXT NOT NULL"));
        assert!(sql.contains("\"muted\" INTEGER NOT NULL DEFAULT 0"));
    }

    #[test]
    fn test_create_index() {
        let idx = CreateIndex::new("idx_tags_artist", "tags")
            .if_not_exists()
            .columns(["artist_id", "tag_type_id"]);
        assert_eq!(
            idx.to_sql(Dialect::Sqlite),
            "CREATE INDEX IF NOT EXISTS \"idx_tags_artist\" ON \"tags\" (\"artist_id\", \"tag_type_id\")"
        );
    }
}
