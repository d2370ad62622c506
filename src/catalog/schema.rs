//! Static table definitions for the roster entity graph.
//!
//! Each [`TableSpec`] carries both the storage shape used for DDL and the
//! filter type of every column, so routing and operator checks read from
//! the same source as schema creation.

use crate::sql::ddl::{ColumnDef, CreateIndex, CreateTable, DdlStatement, TableConstraint};
use crate::sql::expr::{lit_bool, lit_int};
use crate::sql::types::DataType;

// ============================================================================
// Column types
// ============================================================================

/// One label of a coded column, e.g. `signed` stored as `2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Choice {
    pub label: &'static str,
    pub code: i64,
}

/// How a column is compared when filtered or sorted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Int,
    Float,
    Bool,
    Timestamp,
    Uuid,
    /// Small integer code with string labels.
    Choice(&'static [Choice]),
    /// Opaque document; never filterable.
    Json,
}

impl ColumnType {
    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::Int => "integer",
            ColumnType::Float => "float",
            ColumnType::Bool => "boolean",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Uuid => "uuid",
            ColumnType::Choice(_) => "choice",
            ColumnType::Json => "json",
        }
    }

    /// Resolve a label (case-insensitive) to its stored code.
    pub fn choice_code(&self, label: &str) -> Option<i64> {
        match self {
            ColumnType::Choice(choices) => choices
                .iter()
                .find(|c| c.label.eq_ignore_ascii_case(label))
                .map(|c| c.code),
            _ => None,
        }
    }

    /// Resolve a stored code back to its label.
    pub fn choice_label(&self, code: i64) -> Option<&'static str> {
        match self {
            ColumnType::Choice(choices) => choices.iter().find(|c| c.code == code).map(|c| c.label),
            _ => None,
        }
    }
}

pub const EVALUATION_STATUS: &[Choice] = &[
    Choice { label: "unknown", code: 0 },
    Choice { label: "unsigned", code: 1 },
    Choice { label: "signed", code: 2 },
];

pub const DISTRIBUTOR_TYPE: &[Choice] = &[
    Choice { label: "unknown", code: 0 },
    Choice { label: "diy", code: 1 },
    Choice { label: "indie", code: 2 },
    Choice { label: "major", code: 3 },
];

pub const BACK_CATALOG: &[Choice] = &[
    Choice { label: "clean", code: 0 },
    Choice { label: "dirty", code: 1 },
];

// ============================================================================
// Column and table specs
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnDefault {
    Bool(bool),
    Int(i64),
}

/// A column of a catalog table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub ty: ColumnType,
    pub storage: DataType,
    pub not_null: bool,
    pub primary_key: bool,
    pub unique: bool,
    pub default: Option<ColumnDefault>,
    pub references: Option<(&'static str, &'static str)>,
}

impl ColumnSpec {
    const fn new(name: &'static str, ty: ColumnType, storage: DataType) -> Self {
        Self {
            name,
            ty,
            storage,
            not_null: false,
            primary_key: false,
            unique: false,
            default: None,
            references: None,
        }
    }

    const fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    const fn default(mut self, default: ColumnDefault) -> Self {
        self.default = Some(default);
        self
    }

    const fn references(mut self, table: &'static str, column: &'static str) -> Self {
        self.references = Some((table, column));
        self
    }

    fn to_column_def(&self) -> ColumnDef {
        let mut def = ColumnDef::new(self.name, self.storage);
        if self.not_null {
            def = def.not_null();
        }
        if let Some(default) = self.default {
            def = def.default(match default {
                ColumnDefault::Bool(b) => lit_bool(b),
                ColumnDefault::Int(n) => lit_int(n),
            });
        }
        if self.primary_key {
            def = def.primary_key();
        }
        if self.unique {
            def = def.unique();
        }
        if let Some((table, column)) = self.references {
            def = def.references(table, column);
        }
        def
    }
}

/// A catalog table: its columns, composite key and secondary indexes.
#[derive(Debug)]
pub struct TableSpec {
    pub name: &'static str,
    pub columns: &'static [ColumnSpec],
    pub composite_key: &'static [&'static str],
    pub indexes: &'static [&'static [&'static str]],
}

impl TableSpec {
    pub fn column(&self, name: &str) -> Option<&'static ColumnSpec> {
        // Columns live in 'static slices, so the borrow can outlive &self.
        let columns: &'static [ColumnSpec] = self.columns;
        columns.iter().find(|c| c.name == name)
    }

    /// CREATE TABLE plus one CREATE INDEX per secondary index.
    pub fn create_statements(&self) -> Vec<DdlStatement> {
        let mut table = CreateTable::new(self.name).if_not_exists();
        for column in self.columns {
            table = table.column(column.to_column_def());
        }
        if !self.composite_key.is_empty() {
            table = table.constraint(TableConstraint::primary_key(self.composite_key.iter().copied()));
        }

        let mut statements = vec![DdlStatement::CreateTable(table)];
        for columns in self.indexes {
            let name = format!("idx_{}_{}", self.name, columns.join("_"));
            statements.push(DdlStatement::CreateIndex(
                CreateIndex::new(name, self.name)
                    .if_not_exists()
                    .columns(columns.iter().copied()),
            ));
        }
        statements
    }
}

const fn text(name: &'static str) -> ColumnSpec {
    ColumnSpec::new(name, ColumnType::Text, DataType::Text)
}

const fn varchar(name: &'static str, len: u32) -> ColumnSpec {
    ColumnSpec::new(name, ColumnType::Text, DataType::Varchar(len))
}

const fn uuid(name: &'static str) -> ColumnSpec {
    ColumnSpec::new(name, ColumnType::Uuid, DataType::Uuid)
}

const fn int(name: &'static str) -> ColumnSpec {
    ColumnSpec::new(name, ColumnType::Int, DataType::Integer)
}

const fn serial(name: &'static str) -> ColumnSpec {
    ColumnSpec::new(name, ColumnType::Int, DataType::Serial).primary_key()
}

const fn float(name: &'static str) -> ColumnSpec {
    ColumnSpec::new(name, ColumnType::Float, DataType::Double)
}

const fn flag(name: &'static str, default: bool) -> ColumnSpec {
    ColumnSpec::new(name, ColumnType::Bool, DataType::Boolean)
        .not_null()
        .default(ColumnDefault::Bool(default))
}

const fn timestamp(name: &'static str) -> ColumnSpec {
    ColumnSpec::new(name, ColumnType::Timestamp, DataType::Timestamp)
}

const fn choice(name: &'static str, choices: &'static [Choice]) -> ColumnSpec {
    ColumnSpec::new(name, ColumnType::Choice(choices), DataType::SmallInt)
        .not_null()
        .default(ColumnDefault::Int(0))
}

// ============================================================================
// Tables
// ============================================================================

pub static ARTISTS: TableSpec = TableSpec {
    name: "artists",
    columns: &[
        uuid("id").primary_key(),
        varchar("name", 256),
        varchar("spotify_id", 22).unique(),
        text("avatar"),
        flag("active", true),
        int("evaluation_id"),
        timestamp("created_at"),
        timestamp("updated_at"),
    ],
    composite_key: &[],
    indexes: &[],
};

pub static EVALUATIONS: TableSpec = TableSpec {
    name: "evaluations",
    columns: &[
        serial("id"),
        uuid("artist_id").not_null().references("artists", "id"),
        choice("status", EVALUATION_STATUS),
        choice("distributor_type", DISTRIBUTOR_TYPE),
        varchar("distributor", 256),
        varchar("label", 256),
        choice("back_catalog", BACK_CATALOG),
        timestamp("created_at"),
        timestamp("updated_at"),
    ],
    composite_key: &[],
    indexes: &[&["artist_id"]],
};

pub static STATISTIC_TYPES: TableSpec = TableSpec {
    name: "statistic_types",
    columns: &[
        serial("id"),
        varchar("source", 256).not_null(),
        varchar("key", 128).not_null(),
        text("name").not_null(),
        varchar("format", 8).not_null(),
        int("display_order"),
    ],
    composite_key: &[],
    indexes: &[],
};

pub static STATISTICS: TableSpec = TableSpec {
    name: "statistics",
    columns: &[
        uuid("artist_id").not_null().references("artists", "id"),
        int("statistic_type_id")
            .not_null()
            .references("statistic_types", "id"),
        float("latest"),
        float("previous"),
        float("min"),
        float("max"),
        float("avg"),
        float("week_over_week"),
        float("month_over_month"),
        ColumnSpec::new("data", ColumnType::Json, DataType::Json),
        timestamp("latest_date"),
        timestamp("created_at"),
        timestamp("updated_at"),
    ],
    composite_key: &["artist_id", "statistic_type_id"],
    indexes: &[],
};

pub static MEMBERSHIPS: TableSpec = TableSpec {
    name: "organizations_artists",
    columns: &[
        varchar("organization_id", 28).not_null(),
        uuid("artist_id").not_null().references("artists", "id"),
        varchar("added_by", 28).not_null(),
        flag("muted", false),
        flag("archived", false),
        timestamp("archived_at"),
        varchar("archived_by", 28),
        flag("favorite", false),
        timestamp("created_at"),
        text("last_playlist_id"),
    ],
    composite_key: &["organization_id", "artist_id", "added_by"],
    indexes: &[&["organization_id", "archived", "muted"], &["artist_id"]],
};

pub static TAGS: TableSpec = TableSpec {
    name: "tags",
    columns: &[
        serial("id"),
        uuid("artist_id").not_null().references("artists", "id"),
        text("tag").not_null(),
        int("tag_type_id").not_null(),
        varchar("organization_id", 28),
        timestamp("created_at"),
    ],
    composite_key: &[],
    indexes: &[&["artist_id", "tag_type_id"]],
};

pub static USER_ARTISTS: TableSpec = TableSpec {
    name: "user_artists",
    columns: &[
        varchar("user_id", 28).not_null(),
        varchar("organization_id", 28).not_null(),
        uuid("artist_id").not_null().references("artists", "id"),
        timestamp("created_at"),
    ],
    composite_key: &["user_id", "organization_id", "artist_id"],
    indexes: &[&["organization_id", "artist_id"]],
};

pub static LINK_SOURCES: TableSpec = TableSpec {
    name: "link_sources",
    columns: &[
        serial("id"),
        varchar("key", 32).not_null(),
        text("logo"),
        text("url").not_null(),
    ],
    composite_key: &[],
    indexes: &[],
};

pub static ARTIST_LINKS: TableSpec = TableSpec {
    name: "artist_links",
    columns: &[
        serial("id"),
        uuid("artist_id").not_null().references("artists", "id"),
        int("link_source_id")
            .not_null()
            .references("link_sources", "id"),
        text("path").not_null(),
    ],
    composite_key: &[],
    indexes: &[&["artist_id"]],
};

/// All tables in dependency order.
pub static TABLES: &[&TableSpec] = &[
    &ARTISTS,
    &EVALUATIONS,
    &STATISTIC_TYPES,
    &STATISTICS,
    &MEMBERSHIPS,
    &TAGS,
    &USER_ARTISTS,
    &LINK_SOURCES,
    &ARTIST_LINKS,
];
