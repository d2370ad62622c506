//! Bulk operations: export, mute, archive and label distribution.

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use common::*;
use roster::cache::PlanCache;
use roster::filter::{FilterItem, FilterModel, MuteMode, SortItem};
use roster::service::ListRequest;
use roster::sql::Value;
use uuid::Uuid;

fn starts_with(prefix: &str) -> FilterModel {
    FilterModel::new(vec![FilterItem::new("name", "startsWith", prefix)])
}

async fn muted_rows(store: &roster::store::SqliteExecutor, org: &str) -> i64 {
    scalar(
        store,
        "SELECT COUNT(*) FROM organizations_artists WHERE organization_id = ?1 AND muted = 1",
        vec![Value::Text(org.into())],
    )
    .await
}

#[tokio::test]
async fn test_export_ids_follows_sort_and_ignores_paging() {
    let store = store().await;
    let ids = add_roster(&store, ORG_A, "artist", 30).await;
    add_roster(&store, ORG_B, "other", 5).await;
    let service = service(&store).await;

    let sorted = service
        .export_ids(&alice(), &FilterModel::default(), &[SortItem::desc("name")])
        .await
        .unwrap();
    let expected: Vec<Uuid> = ids.iter().rev().copied().collect();
    assert_eq!(sorted, expected);

    let unsorted = service
        .export_ids(&alice(), &starts_with("artist-1"), &[])
        .await
        .unwrap();
    let unsorted: HashSet<Uuid> = unsorted.into_iter().collect();
    assert_eq!(unsorted, ids[10..20].iter().copied().collect());
}

#[tokio::test]
async fn test_export_ids_reports_compile_errors() {
    let store = store().await;
    let service = service(&store).await;

    let err = service
        .export_ids(&alice(), &FilterModel::default(), &[SortItem::asc("tags")])
        .await
        .unwrap_err();
    assert!(err.public_message().contains("tags"));

    let err = service
        .export_ids(&roster::service::Caller::new("nobody"), &FilterModel::default(), &[])
        .await
        .unwrap_err();
    assert!(err.public_message().contains("nobody"));
}

#[tokio::test]
async fn test_set_muted_changes_only_matching_tenant_rows() {
    let store = store().await;
    let keep = add_roster(&store, ORG_A, "keep", 3).await;
    let mute = add_roster(&store, ORG_A, "mute", 4).await;
    // The same artist is also on org-b's roster.
    add_membership(&store, ORG_B, mute[0]).await;
    let service = service(&store).await;

    let changed = service
        .set_muted(&alice(), &starts_with("mute"), true)
        .await
        .unwrap();
    assert_eq!(changed, 4);
    assert_eq!(muted_rows(&store, ORG_A).await, 4);
    assert_eq!(muted_rows(&store, ORG_B).await, 0);

    let listed = service.list(&alice(), ListRequest::default()).await;
    let listed: HashSet<Uuid> = listed.rows.iter().map(|r| r.id).collect();
    assert_eq!(listed, keep.iter().copied().collect());

    // Unmute two of them from the muted view.
    let filter = FilterModel::new(vec![FilterItem::new("name", "isAnyOf", serde_json::json!(["mute-00", "mute-01"]))])
        .with_muted(MuteMode::Only);
    let changed = service.set_muted(&alice(), &filter, false).await.unwrap();
    assert_eq!(changed, 2);
    assert_eq!(muted_rows(&store, ORG_A).await, 2);
}

#[tokio::test]
async fn test_archive_and_restore() {
    let store = store().await;
    let ids = add_roster(&store, ORG_A, "artist", 5).await;
    let service = service(&store).await;
    let first_two = FilterModel::new(vec![FilterItem::new(
        "name",
        "isAnyOf",
        serde_json::json!(["artist-00", "artist-01"]),
    )]);

    let changed = service.set_archived(&alice(), &first_two, true).await.unwrap();
    assert_eq!(changed, 2);

    let stamped = scalar(
        &store,
        "SELECT COUNT(*) FROM organizations_artists
         WHERE archived = 1 AND archived_by = ?1 AND archived_at IS NOT NULL",
        vec![Value::Text("alice".into())],
    )
    .await;
    assert_eq!(stamped, 2);

    let listed = service
        .list(
            &alice(),
            ListRequest::new(FilterModel::default().with_muted(MuteMode::ShowAll)),
        )
        .await;
    assert_eq!(listed.row_count, 3);
    assert!(service.get_artist(&alice(), ids[0]).await.artist.is_none());

    // Archiving again touches nothing: archived rows are out of scope.
    let changed = service.set_archived(&alice(), &first_two, true).await.unwrap();
    assert_eq!(changed, 0);

    let changed = service
        .set_archived(&alice(), &FilterModel::default(), false)
        .await
        .unwrap();
    assert_eq!(changed, 2);

    let cleared = scalar(
        &store,
        "SELECT COUNT(*) FROM organizations_artists
         WHERE archived = 0 AND archived_by IS NULL AND archived_at IS NULL",
        vec![],
    )
    .await;
    assert_eq!(cleared, 5);
    assert!(service.get_artist(&alice(), ids[0]).await.artist.is_some());
}

#[tokio::test]
async fn test_restore_applies_membership_filters_to_archived_rows() {
    let store = store().await;
    let ids = add_roster(&store, ORG_A, "artist", 3).await;
    set_flag(&store, ORG_A, ids[0], "favorite", true).await;
    let service = service(&store).await;

    let everything = FilterModel::default().with_muted(MuteMode::ShowAll);
    let changed = service.set_archived(&alice(), &everything, true).await.unwrap();
    assert_eq!(changed, 3);

    let favorites = FilterModel::new(vec![FilterItem::new("organization.favorite", "is", true)]);
    let changed = service.set_archived(&alice(), &favorites, false).await.unwrap();
    assert_eq!(changed, 1);

    let listed = service.list(&alice(), ListRequest::default()).await;
    assert_eq!(listed.row_count, 1);
    assert_eq!(listed.rows[0].id, ids[0]);

    let others = FilterModel::new(vec![FilterItem::new("organization.favorite", "is", false)]);
    let changed = service.set_archived(&alice(), &others, false).await.unwrap();
    assert_eq!(changed, 2);
    assert_eq!(service.list(&alice(), ListRequest::default()).await.row_count, 3);
}

#[tokio::test]
async fn test_label_distribution() {
    let store = store().await;
    let ids = add_roster(&store, ORG_A, "artist", 6).await;
    for id in &ids[..3] {
        add_evaluation(&store, *id, 2, Some("Big Label")).await;
    }
    add_evaluation(&store, ids[3], 2, Some("Small Label")).await;
    // Only the current evaluation counts.
    add_evaluation(&store, ids[4], 1, Some("Small Label")).await;
    add_evaluation(&store, ids[4], 1, None).await;
    let service = service(&store).await;

    let counts = service
        .label_distribution(&alice(), &FilterModel::default())
        .await
        .unwrap();
    let counts: Vec<(Option<&str>, u64)> = counts
        .iter()
        .map(|c| (c.label.as_deref(), c.count))
        .collect();
    assert_eq!(
        counts,
        vec![(Some("Big Label"), 3), (None, 2), (Some("Small Label"), 1)]
    );

    let signed = FilterModel::new(vec![FilterItem::new("evaluation.status", "is", "signed")]);
    let counts = service.label_distribution(&alice(), &signed).await.unwrap();
    assert_eq!(counts.len(), 2);
    assert_eq!(counts[0].count, 3);
    assert_eq!(counts[1].label.as_deref(), Some("Small Label"));
}

#[tokio::test]
async fn test_updates_invalidate_cached_counts() {
    let store = store().await;
    add_roster(&store, ORG_A, "artist", 4).await;
    add_roster(&store, ORG_B, "other", 2).await;
    let cache = Arc::new(PlanCache::new(Duration::from_secs(300), 100));
    let service = cached_service(&store, cache.clone()).await;

    assert_eq!(service.list(&alice(), ListRequest::default()).await.row_count, 4);
    assert_eq!(service.list(&bob(), ListRequest::default()).await.row_count, 2);
    assert_eq!(cache.len(), 2);

    service
        .set_muted(&alice(), &starts_with("artist-00"), true)
        .await
        .unwrap();
    assert_eq!(cache.len(), 1);

    assert_eq!(service.list(&alice(), ListRequest::default()).await.row_count, 3);
    assert_eq!(service.list(&bob(), ListRequest::default()).await.row_count, 2);
    assert_eq!(cache.stats().hits(), 1);
}
