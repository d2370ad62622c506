//! Eager-load hydration.
//!
//! One query per relation, all keyed by the page's ids and run
//! concurrently. Rows are grouped back onto their artist by the leading
//! `artist_id` column.

use std::collections::HashMap;

use futures::future::try_join_all;
use uuid::Uuid;

use super::executor::{Executor, Row, RowExt};
use super::views::{
    ArtistDeepView, ArtistView, AttributionView, EvaluationView, LinkView, MembershipView,
    StatisticView, TagView,
};
use super::StoreResult;
use crate::catalog::Catalog;
use crate::compile::Relation;
use crate::sql::Value;

/// Load `relations` for `ids` and return one view per artist, in `ids` order.
///
/// Ids without an artist row are skipped.
pub async fn hydrate(
    executor: &dyn Executor,
    catalog: &Catalog,
    tenant: &str,
    ids: &[Uuid],
    relations: &[Relation],
) -> StoreResult<Vec<ArtistDeepView>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let dialect = executor.dialect();
    let statements: Vec<_> = relations
        .iter()
        .map(|relation| relation.query(tenant, ids).to_statement(dialect))
        .collect();
    let results = try_join_all(statements.iter().map(|stmt| executor.fetch_rows(stmt))).await?;

    let mut loaded: Vec<(Relation, Vec<Row>)> = relations.iter().copied().zip(results).collect();
    // Artists first so every other relation has somewhere to land.
    loaded.sort_by_key(|(relation, _)| *relation != Relation::Artists);

    let mut artists: HashMap<Uuid, ArtistDeepView> = HashMap::with_capacity(ids.len());
    for (relation, rows) in loaded {
        for row in rows {
            if relation == Relation::Artists {
                let artist = ArtistView::from_row(&row)?;
                artists.insert(
                    artist.id,
                    ArtistDeepView {
                        artist,
                        evaluations: Vec::new(),
                    },
                );
                continue;
            }

            let Some(view) = artists.get_mut(&row.uuid_at(0)?) else {
                continue;
            };
            attach(view, relation, &row, catalog)?;
        }
    }

    tracing::debug!(
        requested = ids.len(),
        hydrated = artists.len(),
        relations = relations.len(),
        "hydrated artists"
    );

    Ok(ids.iter().filter_map(|id| artists.remove(id)).collect())
}

fn attach(
    view: &mut ArtistDeepView,
    relation: Relation,
    row: &[Value],
    catalog: &Catalog,
) -> StoreResult<()> {
    let artist = &mut view.artist;
    match relation {
        Relation::Artists => {}
        Relation::CurrentEvaluation => artist.evaluation = Some(EvaluationView::from_row(row, 1)?),
        Relation::EvaluationHistory => view.evaluations.push(EvaluationView::from_row(row, 1)?),
        Relation::Statistics | Relation::StatisticWindows => {
            artist.statistics.push(StatisticView::from_row(row, catalog)?)
        }
        Relation::Links => artist.links.push(LinkView::from_row(row)),
        Relation::Tags => artist.tags.push(TagView::from_row(row)),
        Relation::Memberships => artist.memberships.push(MembershipView::from_row(row)),
        Relation::Attributions => artist.users.push(AttributionView::from_row(row)),
    }
    Ok(())
}
