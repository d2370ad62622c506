//! Shared in-memory SQLite fixture for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use roster::cache::PlanCache;
use roster::catalog::TagType;
use roster::service::{Caller, RosterService, StaticTenantResolver};
use roster::sql::{Statement, Value};
use roster::store::{load_catalog, Executor, SqliteExecutor};
use uuid::Uuid;

pub const ORG_A: &str = "org-a";
pub const ORG_B: &str = "org-b";

/// Monthly listeners.
pub const LISTENERS: i64 = 5;
/// Followers.
pub const FOLLOWERS: i64 = 7;

pub fn alice() -> Caller {
    Caller::new("alice")
}

pub fn bob() -> Caller {
    Caller::new("bob")
}

/// A bootstrapped store with two statistic types and one link source.
pub async fn store() -> Arc<SqliteExecutor> {
    let store = SqliteExecutor::open_in_memory().unwrap();
    store.bootstrap().await.unwrap();
    store
        .execute_batch(
            "INSERT INTO statistic_types (id, source, key, name, format, display_order) VALUES
                (5, 'spotify', 'monthly_listeners', 'Monthly listeners', 'int', 1),
                (7, 'spotify', 'followers', 'Followers', 'int', 2);
             INSERT INTO link_sources (id, key, logo, url) VALUES
                (1, 'spotify', 'spotify.svg', 'https://open.spotify.com/artist/');",
        )
        .await
        .unwrap();
    Arc::new(store)
}

/// Service over `store` where alice belongs to org-a and bob to org-b.
pub async fn service(store: &Arc<SqliteExecutor>) -> RosterService {
    let catalog = load_catalog(&**store).await.unwrap();
    let tenants = StaticTenantResolver::new()
        .with_user("alice", ORG_A)
        .with_user("bob", ORG_B);
    RosterService::new(store.clone(), Arc::new(tenants), Arc::new(catalog))
}

pub async fn cached_service(store: &Arc<SqliteExecutor>, cache: Arc<PlanCache>) -> RosterService {
    service(store).await.with_cache(cache)
}

pub async fn exec(store: &SqliteExecutor, sql: &str, params: Vec<Value>) {
    store
        .execute(&Statement {
            sql: sql.into(),
            params,
        })
        .await
        .unwrap();
}

pub async fn add_artist(store: &SqliteExecutor, name: &str) -> Uuid {
    let id = Uuid::new_v4();
    exec(
        store,
        "INSERT INTO artists (id, name, active, created_at, updated_at) VALUES (?1, ?2, 1, ?3, ?3)",
        vec![
            Value::Uuid(id),
            Value::Text(name.into()),
            Value::Text("2024-01-01 00:00:00".into()),
        ],
    )
    .await;
    id
}

/// Insert `count` artists named `prefix-00`, `prefix-01`, ... all in `org`.
pub async fn add_roster(store: &SqliteExecutor, org: &str, prefix: &str, count: usize) -> Vec<Uuid> {
    let mut ids = Vec::with_capacity(count);
    for i in 0..count {
        let id = add_artist(store, &format!("{}-{:02}", prefix, i)).await;
        add_membership(store, org, id).await;
        ids.push(id);
    }
    ids
}

pub async fn add_membership(store: &SqliteExecutor, org: &str, artist: Uuid) {
    add_membership_by(store, org, artist, "alice").await;
}

pub async fn add_membership_by(store: &SqliteExecutor, org: &str, artist: Uuid, added_by: &str) {
    exec(
        store,
        "INSERT INTO organizations_artists (organization_id, artist_id, added_by, created_at)
         VALUES (?1, ?2, ?3, '2024-01-02 00:00:00')",
        vec![
            Value::Text(org.into()),
            Value::Uuid(artist),
            Value::Text(added_by.into()),
        ],
    )
    .await;
}

pub async fn set_flag(store: &SqliteExecutor, org: &str, artist: Uuid, flag: &str, on: bool) {
    exec(
        store,
        &format!(
            "UPDATE organizations_artists SET {} = ?1 WHERE organization_id = ?2 AND artist_id = ?3",
            flag
        ),
        vec![Value::Bool(on), Value::Text(org.into()), Value::Uuid(artist)],
    )
    .await;
}

pub async fn add_statistic(store: &SqliteExecutor, artist: Uuid, type_id: i64, latest: f64) {
    exec(
        store,
        "INSERT INTO statistics (artist_id, statistic_type_id, latest, week_over_week)
         VALUES (?1, ?2, ?3, 0.1)",
        vec![Value::Uuid(artist), Value::Int(type_id), Value::Float(latest)],
    )
    .await;
}

pub async fn add_tag(
    store: &SqliteExecutor,
    artist: Uuid,
    tag: &str,
    tag_type: TagType,
    org: Option<&str>,
) {
    exec(
        store,
        "INSERT INTO tags (artist_id, tag, tag_type_id, organization_id) VALUES (?1, ?2, ?3, ?4)",
        vec![
            Value::Uuid(artist),
            Value::Text(tag.into()),
            Value::Int(tag_type.id()),
            org.map(|o| Value::Text(o.into())).unwrap_or(Value::Null),
        ],
    )
    .await;
}

/// Append an evaluation and make it the artist's current one.
pub async fn add_evaluation(store: &SqliteExecutor, artist: Uuid, status: i64, label: Option<&str>) {
    exec(
        store,
        "INSERT INTO evaluations (artist_id, status, label, created_at)
         VALUES (?1, ?2, ?3, datetime('now'))",
        vec![
            Value::Uuid(artist),
            Value::Int(status),
            label.map(|l| Value::Text(l.into())).unwrap_or(Value::Null),
        ],
    )
    .await;
    exec(
        store,
        "UPDATE artists SET evaluation_id = (SELECT MAX(id) FROM evaluations WHERE artist_id = ?1)
         WHERE id = ?1",
        vec![Value::Uuid(artist)],
    )
    .await;
}

pub async fn add_link(store: &SqliteExecutor, artist: Uuid, path: &str) {
    exec(
        store,
        "INSERT INTO artist_links (artist_id, link_source_id, path) VALUES (?1, 1, ?2)",
        vec![Value::Uuid(artist), Value::Text(path.into())],
    )
    .await;
}

pub async fn add_attribution(store: &SqliteExecutor, user: &str, org: &str, artist: Uuid) {
    exec(
        store,
        "INSERT INTO user_artists (user_id, organization_id, artist_id, created_at)
         VALUES (?1, ?2, ?3, '2024-01-03 00:00:00')",
        vec![
            Value::Text(user.into()),
            Value::Text(org.into()),
            Value::Uuid(artist),
        ],
    )
    .await;
}

/// Count rows of a query returning a single integer.
pub async fn scalar(store: &SqliteExecutor, sql: &str, params: Vec<Value>) -> i64 {
    let rows = store
        .fetch_rows(&Statement {
            sql: sql.into(),
            params,
        })
        .await
        .unwrap();
    rows[0][0].as_i64().unwrap()
}
