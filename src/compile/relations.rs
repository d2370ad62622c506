//! Eager-load queries.
//!
//! After the page query returns ids, each relation is fetched with one query
//! keyed by those ids. Every relation query selects `artist_id` first so rows
//! can be grouped back onto their artist.

use uuid::Uuid;

use crate::catalog::schema::{
    ARTISTS, ARTIST_LINKS, EVALUATIONS, LINK_SOURCES, MEMBERSHIPS, STATISTICS, TAGS, USER_ARTISTS,
};
use crate::sql::{lit_bool, param, table_col, Expr, ExprExt, OrderByExpr, Query, SelectExpr, TableRef};

/// Columns of `artists` in the order [`Relation::Artists`] selects them.
pub const ARTIST_COLUMNS: &[&str] = &[
    "id",
    "name",
    "spotify_id",
    "avatar",
    "active",
    "evaluation_id",
    "created_at",
    "updated_at",
];

/// Evaluation columns following `artist_id`.
pub const EVALUATION_COLUMNS: &[&str] = &[
    "id",
    "status",
    "distributor_type",
    "distributor",
    "label",
    "back_catalog",
    "created_at",
    "updated_at",
];

/// Statistic columns following `artist_id`; windowed `data` is appended for
/// [`Relation::StatisticWindows`].
pub const STATISTIC_COLUMNS: &[&str] = &[
    "statistic_type_id",
    "latest",
    "previous",
    "min",
    "max",
    "avg",
    "week_over_week",
    "month_over_month",
    "latest_date",
];

pub const MEMBERSHIP_COLUMNS: &[&str] = &[
    "added_by",
    "muted",
    "favorite",
    "created_at",
    "last_playlist_id",
];

const CURRENT: &str = "current_evaluation";
const LINK: &str = "link";
const SOURCE: &str = "source";

/// A relation loaded for a set of artist ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    /// The artist rows themselves.
    Artists,
    /// The evaluation `artists.evaluation_id` points at.
    CurrentEvaluation,
    /// Every evaluation of the artist, newest first.
    EvaluationHistory,
    Statistics,
    /// Statistics including the windowed `data` document.
    StatisticWindows,
    /// External links with their rendered URL.
    Links,
    /// Tags visible to the tenant.
    Tags,
    /// The tenant's non-archived membership rows.
    Memberships,
    /// The tenant's user attributions, oldest first.
    Attributions,
}

impl Relation {
    /// Relations hydrated for a list page.
    pub const LIST: &'static [Relation] = &[
        Relation::Artists,
        Relation::CurrentEvaluation,
        Relation::Statistics,
        Relation::Links,
        Relation::Tags,
        Relation::Memberships,
        Relation::Attributions,
    ];

    /// Relations hydrated for a single-artist view.
    pub const DEEP: &'static [Relation] = &[
        Relation::Artists,
        Relation::CurrentEvaluation,
        Relation::EvaluationHistory,
        Relation::StatisticWindows,
        Relation::Links,
        Relation::Tags,
        Relation::Memberships,
        Relation::Attributions,
    ];

    /// The query loading this relation for `ids`.
    pub fn query(&self, tenant: &str, ids: &[Uuid]) -> Query {
        match self {
            Relation::Artists => Query::new()
                .select(columns(ARTISTS.name, ARTIST_COLUMNS))
                .from(TableRef::new(ARTISTS.name))
                .filter(id_list(table_col(ARTISTS.name, "id"), ids)),

            Relation::CurrentEvaluation => {
                let mut select = vec![SelectExpr::new(table_col(ARTISTS.name, "id"))];
                select.extend(columns(CURRENT, EVALUATION_COLUMNS));
                Query::new()
                    .select(select)
                    .from(TableRef::new(ARTISTS.name))
                    .inner_join(
                        TableRef::new(EVALUATIONS.name).with_alias(CURRENT),
                        table_col(CURRENT, "id").eq(table_col(ARTISTS.name, "evaluation_id")),
                    )
                    .filter(id_list(table_col(ARTISTS.name, "id"), ids))
            }

            Relation::EvaluationHistory => Query::new()
                .select(keyed_columns(EVALUATIONS.name, EVALUATION_COLUMNS))
                .from(TableRef::new(EVALUATIONS.name))
                .filter(id_list(table_col(EVALUATIONS.name, "artist_id"), ids))
                .order_by(vec![
                    OrderByExpr::desc(table_col(EVALUATIONS.name, "created_at")),
                    OrderByExpr::desc(table_col(EVALUATIONS.name, "id")),
                ]),

            Relation::Statistics | Relation::StatisticWindows => {
                let mut select = keyed_columns(STATISTICS.name, STATISTIC_COLUMNS);
                if *self == Relation::StatisticWindows {
                    select.push(SelectExpr::new(table_col(STATISTICS.name, "data")));
                }
                Query::new()
                    .select(select)
                    .from(TableRef::new(STATISTICS.name))
                    .filter(id_list(table_col(STATISTICS.name, "artist_id"), ids))
                    .order_by(vec![OrderByExpr::asc(table_col(
                        STATISTICS.name,
                        "statistic_type_id",
                    ))])
            }

            Relation::Links => Query::new()
                .select(vec![
                    SelectExpr::new(table_col(LINK, "artist_id")),
                    SelectExpr::new(table_col(LINK, "link_source_id")),
                    SelectExpr::new(table_col(SOURCE, "key")),
                    SelectExpr::new(table_col(SOURCE, "logo")),
                    SelectExpr::new(table_col(SOURCE, "url").concat(table_col(LINK, "path")))
                        .with_alias("url"),
                ])
                .from(TableRef::new(ARTIST_LINKS.name).with_alias(LINK))
                .inner_join(
                    TableRef::new(LINK_SOURCES.name).with_alias(SOURCE),
                    table_col(SOURCE, "id").eq(table_col(LINK, "link_source_id")),
                )
                .filter(id_list(table_col(LINK, "artist_id"), ids))
                .order_by(vec![OrderByExpr::asc(table_col(LINK, "id"))]),

            Relation::Tags => Query::new()
                .select(keyed_columns(TAGS.name, &["tag", "tag_type_id"]))
                .from(TableRef::new(TAGS.name))
                .filter(id_list(table_col(TAGS.name, "artist_id"), ids))
                .filter(
                    table_col(TAGS.name, "organization_id")
                        .is_null()
                        .or(table_col(TAGS.name, "organization_id").eq(param(tenant)))
                        .paren(),
                )
                .order_by(vec![
                    OrderByExpr::asc(table_col(TAGS.name, "tag_type_id")),
                    OrderByExpr::asc(table_col(TAGS.name, "tag")),
                ]),

            Relation::Memberships => Query::new()
                .select(keyed_columns(MEMBERSHIPS.name, MEMBERSHIP_COLUMNS))
                .from(TableRef::new(MEMBERSHIPS.name))
                .filter(table_col(MEMBERSHIPS.name, "organization_id").eq(param(tenant)))
                .filter(table_col(MEMBERSHIPS.name, "archived").eq(lit_bool(false)))
                .filter(id_list(table_col(MEMBERSHIPS.name, "artist_id"), ids))
                .order_by(vec![OrderByExpr::asc(table_col(
                    MEMBERSHIPS.name,
                    "created_at",
                ))]),

            Relation::Attributions => Query::new()
                .select(keyed_columns(USER_ARTISTS.name, &["user_id", "created_at"]))
                .from(TableRef::new(USER_ARTISTS.name))
                .filter(table_col(USER_ARTISTS.name, "organization_id").eq(param(tenant)))
                .filter(id_list(table_col(USER_ARTISTS.name, "artist_id"), ids))
                .order_by(vec![
                    OrderByExpr::asc(table_col(USER_ARTISTS.name, "created_at")),
                    OrderByExpr::asc(table_col(USER_ARTISTS.name, "user_id")),
                ]),
        }
    }
}

fn columns(table: &str, names: &[&str]) -> Vec<SelectExpr> {
    names
        .iter()
        .map(|name| SelectExpr::new(table_col(table, name)))
        .collect()
}

/// `artist_id` followed by `names`.
fn keyed_columns(table: &str, names: &[&str]) -> Vec<SelectExpr> {
    let mut select = vec![SelectExpr::new(table_col(table, "artist_id"))];
    select.extend(columns(table, names));
    select
}

fn id_list(column: Expr, ids: &[Uuid]) -> Expr {
    column.in_list(ids.iter().map(|id| param(*id)).collect())
}
