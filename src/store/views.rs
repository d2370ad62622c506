//! Response views.
//!
//! Views are what callers see: coded columns come back as labels and
//! statistics carry their type's display name. Each view decodes from the
//! row layout of its relation query in [`crate::compile::relations`].

use chrono::NaiveDateTime;
use serde::Serialize;
use uuid::Uuid;

use super::executor::RowExt;
use super::StoreResult;
use crate::catalog::schema::{BACK_CATALOG, DISTRIBUTOR_TYPE, EVALUATION_STATUS};
use crate::catalog::{Catalog, Choice, ColumnType, TagType};
use crate::sql::Value;

/// An artist with its list-level relations.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistView {
    pub id: Uuid,
    pub name: Option<String>,
    pub spotify_id: Option<String>,
    pub avatar: Option<String>,
    pub active: bool,
    pub evaluation: Option<EvaluationView>,
    pub statistics: Vec<StatisticView>,
    pub links: Vec<LinkView>,
    pub tags: Vec<TagView>,
    pub memberships: Vec<MembershipView>,
    pub users: Vec<AttributionView>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl ArtistView {
    /// Decode a [`Relation::Artists`](crate::compile::Relation::Artists) row.
    pub(crate) fn from_row(row: &[Value]) -> StoreResult<Self> {
        Ok(Self {
            id: row.uuid_at(0)?,
            name: row.text_at(1),
            spotify_id: row.text_at(2),
            avatar: row.text_at(3),
            active: row.bool_at(4),
            evaluation: None,
            statistics: Vec::new(),
            links: Vec::new(),
            tags: Vec::new(),
            memberships: Vec::new(),
            users: Vec::new(),
            created_at: row.timestamp_at(6),
            updated_at: row.timestamp_at(7),
        })
    }
}

/// A single artist with its full history.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistDeepView {
    #[serde(flatten)]
    pub artist: ArtistView,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub evaluations: Vec<EvaluationView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationView {
    pub id: i64,
    pub status: &'static str,
    pub distributor_type: &'static str,
    pub distributor: Option<String>,
    pub label: Option<String>,
    pub back_catalog: &'static str,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl EvaluationView {
    /// Decode evaluation columns starting at `offset`.
    pub(crate) fn from_row(row: &[Value], offset: usize) -> StoreResult<Self> {
        let label = |choices: &'static [Choice], idx: usize| {
            ColumnType::Choice(choices)
                .choice_label(row.int_at(offset + idx).unwrap_or(0))
                .unwrap_or("unknown")
        };
        Ok(Self {
            id: row.required_int_at(offset)?,
            status: label(EVALUATION_STATUS, 1),
            distributor_type: label(DISTRIBUTOR_TYPE, 2),
            distributor: row.text_at(offset + 3),
            label: row.text_at(offset + 4),
            back_catalog: label(BACK_CATALOG, 5),
            created_at: row.timestamp_at(offset + 6),
            updated_at: row.timestamp_at(offset + 7),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticView {
    pub statistic_type_id: i64,
    pub name: Option<String>,
    pub format: Option<String>,
    pub latest: Option<f64>,
    pub previous: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub avg: Option<f64>,
    pub week_over_week: Option<f64>,
    pub month_over_month: Option<f64>,
    pub latest_date: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl StatisticView {
    /// Decode a statistics row; column 0 is `artist_id`.
    pub(crate) fn from_row(row: &[Value], catalog: &Catalog) -> StoreResult<Self> {
        let type_id = row.required_int_at(1)?;
        let ty = catalog.statistic_type(type_id);
        let data = match row.text_at(10) {
            Some(raw) => Some(serde_json::from_str(&raw)?),
            None => None,
        };
        Ok(Self {
            statistic_type_id: type_id,
            name: ty.map(|t| t.name.clone()),
            format: ty.map(|t| t.format.clone()),
            latest: row.float_at(2),
            previous: row.float_at(3),
            min: row.float_at(4),
            max: row.float_at(5),
            avg: row.float_at(6),
            week_over_week: row.float_at(7),
            month_over_month: row.float_at(8),
            latest_date: row.timestamp_at(9),
            data,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkView {
    pub source: String,
    pub logo: Option<String>,
    pub url: String,
}

impl LinkView {
    pub(crate) fn from_row(row: &[Value]) -> Self {
        Self {
            source: row.text_at(2).unwrap_or_default(),
            logo: row.text_at(3),
            url: row.text_at(4).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagView {
    pub tag: String,
    pub tag_type: Option<TagType>,
}

impl TagView {
    pub(crate) fn from_row(row: &[Value]) -> Self {
        Self {
            tag: row.text_at(1).unwrap_or_default(),
            tag_type: row.int_at(2).and_then(TagType::from_id),
        }
    }
}

/// The tenant's membership row for an artist.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipView {
    pub added_by: Option<String>,
    pub muted: bool,
    pub favorite: bool,
    pub created_at: Option<NaiveDateTime>,
    pub last_playlist_id: Option<String>,
}

impl MembershipView {
    pub(crate) fn from_row(row: &[Value]) -> Self {
        Self {
            added_by: row.text_at(1),
            muted: row.bool_at(2),
            favorite: row.bool_at(3),
            created_at: row.timestamp_at(4),
            last_playlist_id: row.text_at(5),
        }
    }
}

/// A user of the tenant attributed to an artist.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributionView {
    pub user_id: String,
    pub created_at: Option<NaiveDateTime>,
}

impl AttributionView {
    pub(crate) fn from_row(row: &[Value]) -> Self {
        Self {
            user_id: row.text_at(1).unwrap_or_default(),
            created_at: row.timestamp_at(2),
        }
    }
}

/// Number of visible artists whose current evaluation has `label`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelCount {
    pub label: Option<String>,
    pub count: u64,
}

impl LabelCount {
    pub(crate) fn from_row(row: &[Value]) -> StoreResult<Self> {
        Ok(Self {
            label: row.text_at(0),
            count: row.required_int_at(1)?.max(0) as u64,
        })
    }
}
