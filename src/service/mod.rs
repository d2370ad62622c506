//! Request boundary.
//!
//! [`RosterService`] resolves the caller's tenant, compiles the request once
//! and runs the resulting statements. Every list response carries a count
//! built from the same [`FilterPlan`](crate::compile::FilterPlan) as its
//! page, and list/get responses are always well-formed: failures become an
//! empty result with `error` set.
//!
//! Bulk operations (export, mute, archive, label distribution) reuse the
//! identifiers-only query, so they act on exactly the artists the grid shows.

pub mod tenant;

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::cache::{count_key, PlanCache};
use crate::catalog::Catalog;
use crate::compile::{CompileError, CompileOptions, MembershipChange, QueryCompiler, Relation};
use crate::config::{QuerySettings, Settings};
use crate::filter::{FilterModel, PageRequest, SortItem};
use crate::scope::Scope;
use crate::sql::Statement;
use crate::store::{hydrate, load_catalog, ArtistDeepView, ArtistView, Executor, LabelCount, StoreError};

pub use tenant::{Caller, StaticTenantResolver, TenantResolver};

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while serving a request.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("No organization for user '{user_id}'")]
    TenantNotResolved { user_id: String },

    #[error("Invalid page: {0}")]
    InvalidPage(String),

    #[error("Artist {0} not found")]
    NotFound(Uuid),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl ServiceError {
    /// Message safe to show the caller. Store details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            ServiceError::Store(_) => "Failed to load artists".into(),
            other => other.to_string(),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

// ============================================================================
// Request / Response Types
// ============================================================================

/// A grid list request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRequest {
    #[serde(default)]
    pub filter_model: FilterModel,
    #[serde(default)]
    pub sort_model: Vec<SortItem>,
    #[serde(default)]
    pub page: u64,
    /// Falls back to the configured default page size.
    #[serde(default)]
    pub page_size: Option<u64>,
}

impl ListRequest {
    pub fn new(filter_model: FilterModel) -> Self {
        Self {
            filter_model,
            ..Self::default()
        }
    }

    pub fn with_sort(mut self, sort_model: Vec<SortItem>) -> Self {
        self.sort_model = sort_model;
        self
    }

    pub fn with_page(mut self, page: u64, page_size: u64) -> Self {
        self.page = page;
        self.page_size = Some(page_size);
        self
    }
}

/// One page of artists and the total matching count.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowsResponse {
    pub rows: Vec<ArtistView>,
    pub row_count: u64,
    pub page: u64,
    pub page_size: u64,
    pub filter_model: FilterModel,
    pub sort_model: Vec<SortItem>,
    pub error: Option<String>,
}

/// A single artist with deep relations.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleResponse {
    pub artist: Option<ArtistDeepView>,
    pub error: Option<String>,
}

// ============================================================================
// Service
// ============================================================================

/// Compiles and runs tenant-scoped roster queries.
pub struct RosterService {
    executor: Arc<dyn Executor>,
    tenants: Arc<dyn TenantResolver>,
    catalog: RwLock<Arc<Catalog>>,
    cache: Option<Arc<PlanCache>>,
    query: QuerySettings,
    options: CompileOptions,
}

impl RosterService {
    /// A service with default query settings and no count cache.
    pub fn new(
        executor: Arc<dyn Executor>,
        tenants: Arc<dyn TenantResolver>,
        catalog: Arc<Catalog>,
    ) -> Self {
        let options = CompileOptions::default().with_dialect(executor.dialect());
        Self {
            executor,
            tenants,
            catalog: RwLock::new(catalog),
            cache: None,
            query: QuerySettings::default(),
            options,
        }
    }

    /// Apply query limits and, if enabled, a fresh count cache.
    pub fn with_settings(mut self, settings: &Settings) -> Self {
        self.query = settings.query.clone();
        self.options = self
            .options
            .with_does_not_contain_escaping(settings.query.escape_does_not_contain);
        self.cache = settings
            .cache
            .enabled
            .then(|| Arc::new(PlanCache::new(settings.cache.ttl(), settings.cache.max_entries)));
        self
    }

    pub fn with_cache(mut self, cache: Arc<PlanCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn cache(&self) -> Option<&PlanCache> {
        self.cache.as_deref()
    }

    /// The catalog requests are compiled against right now.
    pub async fn catalog(&self) -> Arc<Catalog> {
        self.catalog.read().await.clone()
    }

    /// Re-read statistic types and link sources from the store.
    ///
    /// Requests already running keep the catalog they started with.
    pub async fn reload_catalog(&self) -> ServiceResult<()> {
        let catalog = load_catalog(self.executor.as_ref()).await?;
        tracing::info!(
            statistic_types = catalog.statistic_types().len(),
            "reloaded catalog"
        );
        *self.catalog.write().await = Arc::new(catalog);
        Ok(())
    }

    fn compiler<'a>(&self, catalog: &'a Catalog) -> QueryCompiler<'a> {
        QueryCompiler::new(catalog, self.options.clone())
    }

    /// Resolve the caller's tenant, run `op` scoped to it and log any failure.
    async fn scoped<T, F, Fut>(&self, caller: &Caller, filter: &FilterModel, op: F) -> ServiceResult<T>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = ServiceResult<T>>,
    {
        let Some(tenant) = self.tenants.resolve(caller).await else {
            let err = ServiceError::TenantNotResolved {
                user_id: caller.user_id.clone(),
            };
            self.log_failure(caller, None, filter, &err);
            return Err(err);
        };

        let result = op(tenant.clone()).await;
        if let Err(err) = &result {
            self.log_failure(caller, Some(&tenant), filter, err);
        }
        result
    }

    // ------------------------------------------------------------------------
    // List
    // ------------------------------------------------------------------------

    /// One page of the caller's artists with the total count.
    pub async fn list(&self, caller: &Caller, request: ListRequest) -> RowsResponse {
        let page = PageRequest::new(
            request.page,
            request.page_size.unwrap_or(self.query.default_page_size),
        );

        let result = self
            .scoped(caller, &request.filter_model, |tenant| {
                self.try_list(tenant, &request, page)
            })
            .await;

        let (rows, row_count, error) = match result {
            Ok((rows, count)) => (rows, count, None),
            Err(err) => (Vec::new(), 0, Some(err.public_message())),
        };
        RowsResponse {
            rows,
            row_count,
            page: page.page,
            page_size: page.page_size,
            filter_model: request.filter_model,
            sort_model: request.sort_model,
            error,
        }
    }

    async fn try_list(
        &self,
        tenant: String,
        request: &ListRequest,
        page: PageRequest,
    ) -> ServiceResult<(Vec<ArtistView>, u64)> {
        self.check_page(page)?;

        let catalog = self.catalog().await;
        let compiler = self.compiler(&catalog);
        let dialect = compiler.dialect();
        let plan = compiler.plan(&tenant, &request.filter_model)?;
        let page_statement = compiler
            .page_query(&plan, &request.sort_model, page)?
            .to_statement(dialect);
        let count_statement = compiler.count_query(&plan).to_statement(dialect);

        let (ids, count) = tokio::join!(
            self.executor.fetch_ids(&page_statement),
            self.count(&tenant, &request.filter_model, &count_statement),
        );
        let ids = ids?;
        let count = count?;

        let rows = hydrate(
            self.executor.as_ref(),
            &catalog,
            &tenant,
            &ids,
            Relation::LIST,
        )
        .await?;

        tracing::debug!(
            tenant = %tenant,
            page = page.page,
            rows = rows.len(),
            row_count = count,
            "listed artists"
        );

        Ok((rows.into_iter().map(|view| view.artist).collect(), count))
    }

    fn check_page(&self, page: PageRequest) -> ServiceResult<()> {
        if page.page_size == 0 {
            return Err(ServiceError::InvalidPage(
                "pageSize must be greater than 0".into(),
            ));
        }
        if page.page_size > self.query.max_page_size {
            return Err(ServiceError::InvalidPage(format!(
                "pageSize must be at most {}",
                self.query.max_page_size
            )));
        }
        Ok(())
    }

    /// Row count, from the cache while fresh.
    async fn count(
        &self,
        tenant: &str,
        filter: &FilterModel,
        statement: &Statement,
    ) -> Result<u64, StoreError> {
        let cached = self.cache.as_ref().and_then(|cache| {
            let key = count_key(tenant, filter.mute_mode(), &filter.items).ok()?;
            Some((cache, key))
        });

        if let Some((cache, key)) = &cached {
            if let Some(count) = cache.get(key) {
                return Ok(count);
            }
        }

        let count = self.executor.fetch_count(statement).await?;
        if let Some((cache, key)) = cached {
            cache.insert(key, tenant, count);
        }
        Ok(count)
    }

    // ------------------------------------------------------------------------
    // Single artist
    // ------------------------------------------------------------------------

    /// One artist with evaluation history, statistic windows and attributions.
    ///
    /// Muted artists are included; archived ones are not.
    pub async fn get_artist(&self, caller: &Caller, id: Uuid) -> SingleResponse {
        let result = self
            .scoped(caller, &FilterModel::default(), |tenant| {
                self.try_get_artist(tenant, id)
            })
            .await;

        match result {
            Ok(artist) => SingleResponse {
                artist: Some(artist),
                error: None,
            },
            Err(err) => SingleResponse {
                artist: None,
                error: Some(err.public_message()),
            },
        }
    }

    async fn try_get_artist(&self, tenant: String, id: Uuid) -> ServiceResult<ArtistDeepView> {
        let catalog = self.catalog().await;
        let compiler = self.compiler(&catalog);
        let statement = compiler
            .lookup_query(&tenant, id)
            .to_statement(compiler.dialect());

        let ids = self.executor.fetch_ids(&statement).await?;
        if ids.is_empty() {
            return Err(ServiceError::NotFound(id));
        }

        hydrate(
            self.executor.as_ref(),
            &catalog,
            &tenant,
            &ids[..1],
            Relation::DEEP,
        )
        .await?
        .pop()
        .ok_or(ServiceError::NotFound(id))
    }

    // ------------------------------------------------------------------------
    // Bulk operations
    // ------------------------------------------------------------------------

    /// Every matching artist id, in sort order when a sort is given.
    pub async fn export_ids(
        &self,
        caller: &Caller,
        filter: &FilterModel,
        sort: &[SortItem],
    ) -> ServiceResult<Vec<Uuid>> {
        self.scoped(caller, filter, |tenant| self.try_export_ids(tenant, filter, sort))
            .await
    }

    async fn try_export_ids(
        &self,
        tenant: String,
        filter: &FilterModel,
        sort: &[SortItem],
    ) -> ServiceResult<Vec<Uuid>> {
        let catalog = self.catalog().await;
        let compiler = self.compiler(&catalog);
        let plan = compiler.plan(&tenant, filter)?;
        let statement = compiler
            .ids_query(&plan, sort)?
            .to_statement(compiler.dialect());
        Ok(self.executor.fetch_ids(&statement).await?)
    }

    /// Mute or unmute the caller's memberships for every matching artist.
    ///
    /// Returns the number of membership rows changed.
    pub async fn set_muted(
        &self,
        caller: &Caller,
        filter: &FilterModel,
        muted: bool,
    ) -> ServiceResult<u64> {
        let scope = Scope::Visible(filter.mute_mode());
        self.scoped(caller, filter, |tenant| {
            self.try_update(tenant, filter, scope, MembershipChange::Mute(muted))
        })
        .await
    }

    /// Archive the caller's visible matching memberships, or restore
    /// archived ones matching the filter items.
    pub async fn set_archived(
        &self,
        caller: &Caller,
        filter: &FilterModel,
        archived: bool,
    ) -> ServiceResult<u64> {
        let (scope, change) = if archived {
            (
                Scope::Visible(filter.mute_mode()),
                MembershipChange::Archive {
                    by: caller.user_id.clone(),
                    at: Utc::now().naive_utc(),
                },
            )
        } else {
            (Scope::Archived, MembershipChange::Unarchive)
        };
        self.scoped(caller, filter, |tenant| {
            self.try_update(tenant, filter, scope, change)
        })
        .await
    }

    async fn try_update(
        &self,
        tenant: String,
        filter: &FilterModel,
        scope: Scope,
        change: MembershipChange,
    ) -> ServiceResult<u64> {
        let catalog = self.catalog().await;
        let compiler = self.compiler(&catalog);
        let plan = compiler.plan_with_scope(&tenant, scope, &filter.items)?;
        let statement = compiler
            .membership_update(&plan, &change)
            .to_statement(compiler.dialect());
        let changed = self.executor.execute(&statement).await?;

        if let Some(cache) = &self.cache {
            cache.invalidate_tenant(&tenant);
        }
        tracing::info!(tenant = %tenant, ?change, changed, "updated memberships");
        Ok(changed)
    }

    /// Matching artists counted per current evaluation label, largest first.
    pub async fn label_distribution(
        &self,
        caller: &Caller,
        filter: &FilterModel,
    ) -> ServiceResult<Vec<LabelCount>> {
        self.scoped(caller, filter, |tenant| {
            self.try_label_distribution(tenant, filter)
        })
        .await
    }

    async fn try_label_distribution(
        &self,
        tenant: String,
        filter: &FilterModel,
    ) -> ServiceResult<Vec<LabelCount>> {
        let catalog = self.catalog().await;
        let compiler = self.compiler(&catalog);
        let plan = compiler.plan(&tenant, filter)?;
        let statement = compiler
            .label_distribution_query(&plan)
            .to_statement(compiler.dialect());
        let rows = self.executor.fetch_rows(&statement).await?;
        let counts = rows
            .iter()
            .map(|row| LabelCount::from_row(row))
            .collect::<Result<Vec<_>, StoreError>>()?;
        Ok(counts)
    }

    // ------------------------------------------------------------------------
    // Logging
    // ------------------------------------------------------------------------

    fn log_failure(
        &self,
        caller: &Caller,
        tenant: Option<&str>,
        filter: &FilterModel,
        err: &ServiceError,
    ) {
        let tenant = tenant.unwrap_or("-");
        match err {
            ServiceError::Compile(compile) => tracing::warn!(
                user = %caller.user_id,
                tenant,
                field = compile.field(),
                items = ?filter.items,
                error = %compile,
                "request did not compile"
            ),
            ServiceError::Store(store) => tracing::error!(
                user = %caller.user_id,
                tenant,
                items = ?filter.items,
                error = %store,
                "store failure"
            ),
            other => tracing::warn!(
                user = %caller.user_id,
                tenant,
                error = %other,
                "request rejected"
            ),
        }
    }
}
