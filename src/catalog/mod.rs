//! Schema catalog.
//!
//! Static table metadata (see [`schema`]) plus the reference data loaded
//! from the store: statistic types and link sources. The catalog is pure
//! data; routing and compilation read from it.

pub mod schema;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::sql::ddl::DdlStatement;

pub use schema::{Choice, ColumnSpec, ColumnType, TableSpec, TABLES};

/// Kind of an artist tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagType {
    /// Free-form tag entered by a tenant's user.
    User,
    /// Genre assigned by the metadata provider; usually global.
    Genre,
}

impl TagType {
    pub fn id(self) -> i64 {
        match self {
            TagType::User => 1,
            TagType::Genre => 2,
        }
    }

    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            1 => Some(TagType::User),
            2 => Some(TagType::Genre),
            _ => None,
        }
    }
}

/// A tracked metric, e.g. monthly listeners from one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticType {
    pub id: i64,
    pub source: String,
    pub key: String,
    pub name: String,
    pub format: String,
    pub display_order: Option<i64>,
}

/// An external profile kind used to build artist links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkSource {
    pub id: i64,
    pub key: String,
    pub logo: Option<String>,
    pub url: String,
}

/// Reference data needed to route and validate field names.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    statistic_types: BTreeMap<i64, StatisticType>,
    link_sources: BTreeMap<i64, LinkSource>,
}

impl Catalog {
    pub fn new(
        statistic_types: impl IntoIterator<Item = StatisticType>,
        link_sources: impl IntoIterator<Item = LinkSource>,
    ) -> Self {
        Self {
            statistic_types: statistic_types.into_iter().map(|t| (t.id, t)).collect(),
            link_sources: link_sources.into_iter().map(|s| (s.id, s)).collect(),
        }
    }

    pub fn statistic_type(&self, id: i64) -> Option<&StatisticType> {
        self.statistic_types.get(&id)
    }

    /// Statistic types in display order, then id.
    pub fn statistic_types(&self) -> Vec<&StatisticType> {
        let mut types: Vec<_> = self.statistic_types.values().collect();
        types.sort_by_key(|t| (t.display_order.unwrap_or(i64::MAX), t.id));
        types
    }

    pub fn link_source(&self, id: i64) -> Option<&LinkSource> {
        self.link_sources.get(&id)
    }

    /// Look up a table by physical name.
    pub fn table(name: &str) -> Option<&'static TableSpec> {
        TABLES.iter().copied().find(|t| t.name == name)
    }

    /// DDL for every table, in dependency order.
    pub fn create_statements() -> Vec<DdlStatement> {
        TABLES.iter().flat_map(|t| t.create_statements()).collect()
    }
}
