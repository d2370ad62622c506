//! Filter, sort and page input model.
//!
//! These are the shapes the browsable grid sends. They deserialize straight
//! from request JSON and are echoed back in responses.

pub mod operator;
pub mod router;

use serde::{Deserialize, Serialize};

use crate::sql::SortDir;

pub use operator::{escape_like, Membership, Operator, OperatorEvaluator};
pub use router::{FieldRouter, JoinSet, JoinTarget, JoinedTable, RouteKind, StatisticMetric};

/// Which memberships count as visible, by their mute flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MuteMode {
    #[default]
    Hide,
    Only,
    ShowAll,
}

/// One filter condition: `field operator value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterItem {
    pub field: String,
    pub operator: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl FilterItem {
    pub fn new(
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }
}

/// A flat AND of filter items plus the mute mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterModel {
    #[serde(default)]
    pub items: Vec<FilterItem>,
    #[serde(default)]
    pub muted: Option<MuteMode>,
}

impl FilterModel {
    pub fn new(items: Vec<FilterItem>) -> Self {
        Self { items, muted: None }
    }

    pub fn with_muted(mut self, muted: MuteMode) -> Self {
        self.muted = Some(muted);
        self
    }

    /// Mute mode with `null` treated as the default.
    pub fn mute_mode(&self) -> MuteMode {
        self.muted.unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl From<SortDirection> for SortDir {
    fn from(dir: SortDirection) -> Self {
        match dir {
            SortDirection::Asc => SortDir::Asc,
            SortDirection::Desc => SortDir::Desc,
        }
    }
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortItem {
    pub field: String,
    pub sort: SortDirection,
}

impl SortItem {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            sort: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            sort: SortDirection::Desc,
        }
    }
}

/// Zero-based page index and page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    pub page: u64,
    pub page_size: u64,
}

impl PageRequest {
    pub fn new(page: u64, page_size: u64) -> Self {
        Self { page, page_size }
    }

    pub fn offset(&self) -> u64 {
        self.page.saturating_mul(self.page_size)
    }
}
