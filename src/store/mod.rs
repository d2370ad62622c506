//! Storage access.
//!
//! The compiler only produces statements; executing them goes through the
//! [`Executor`] seam. [`SqliteExecutor`] backs the CLI and the tests.
//! Fetched ids are hydrated into response views by [`hydrate`].

pub mod executor;
pub mod hydrate;
pub mod sqlite;
pub mod views;

use crate::catalog::schema::{LINK_SOURCES, STATISTIC_TYPES};
use crate::catalog::{Catalog, LinkSource, StatisticType};
use crate::sql::{table_col, Expr, OrderByExpr, Query, TableRef, Value};

pub use executor::{Executor, Row, RowExt};
pub use hydrate::hydrate;
pub use sqlite::SqliteExecutor;
pub use views::{
    ArtistDeepView, ArtistView, AttributionView, EvaluationView, LabelCount, LinkView,
    MembershipView, StatisticView, TagView,
};

/// Errors that can occur while talking to the store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Unexpected value in column {column}: {value:?}")]
    Decode { column: usize, value: Value },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Connection lock poisoned")]
    LockPoisoned,

    #[error("Blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Load the reference data the router validates fields against.
pub async fn load_catalog(executor: &dyn Executor) -> StoreResult<Catalog> {
    let dialect = executor.dialect();

    let types_query = Query::new()
        .select(
            ["id", "source", "key", "name", "format", "display_order"]
                .iter()
                .map(|c| table_col(STATISTIC_TYPES.name, c))
                .collect::<Vec<Expr>>(),
        )
        .from(TableRef::new(STATISTIC_TYPES.name))
        .order_by(vec![OrderByExpr::asc(table_col(STATISTIC_TYPES.name, "id"))]);

    let sources_query = Query::new()
        .select(
            ["id", "key", "logo", "url"]
                .iter()
                .map(|c| table_col(LINK_SOURCES.name, c))
                .collect::<Vec<Expr>>(),
        )
        .from(TableRef::new(LINK_SOURCES.name))
        .order_by(vec![OrderByExpr::asc(table_col(LINK_SOURCES.name, "id"))]);

    let types = executor
        .fetch_rows(&types_query.to_statement(dialect))
        .await?
        .into_iter()
        .map(|row| {
            Ok(StatisticType {
                id: row.required_int_at(0)?,
                source: row.text_at(1).unwrap_or_default(),
                key: row.text_at(2).unwrap_or_default(),
                name: row.text_at(3).unwrap_or_default(),
                format: row.text_at(4).unwrap_or_default(),
                display_order: row.int_at(5),
            })
        })
        .collect::<StoreResult<Vec<_>>>()?;

    let sources = executor
        .fetch_rows(&sources_query.to_statement(dialect))
        .await?
        .into_iter()
        .map(|row| {
            Ok(LinkSource {
                id: row.required_int_at(0)?,
                key: row.text_at(1).unwrap_or_default(),
                logo: row.text_at(2),
                url: row.text_at(3).unwrap_or_default(),
            })
        })
        .collect::<StoreResult<Vec<_>>>()?;

    tracing::debug!(
        statistic_types = types.len(),
        link_sources = sources.len(),
        "loaded catalog"
    );

    Ok(Catalog::new(types, sources))
}
