//! Query compilation from grid models to SQL.
//!
//! ```text
//! tenant + filter ──► FilterPlan ──┬─► page query   (Rows)
//!                                  ├─► count query  (Count)
//!                                  └─► id query     (IdentifiersOnly)
//! ```
//!
//! Filters are compiled once into a [`FilterPlan`]; the page, count and id
//! queries are all built from that one plan, so a page and its total count
//! can never disagree about which artists match.
//!
//! # Example
//!
//! ```ignore
//! use roster::compile::{CompileOptions, Mode, QueryCompiler};
//! use roster::filter::{FilterItem, FilterModel, PageRequest};
//!
//! let compiler = QueryCompiler::new(&catalog, CompileOptions::default());
//! let filter = FilterModel::new(vec![FilterItem::new("statistic.5-latest", ">=", 1000)]);
//! let output = compiler.compile("org-a", &filter, &[], PageRequest::new(0, 25), Mode::Rows)?;
//! println!("{}", output.statement.sql);
//! ```

pub mod relations;

use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::catalog::schema::{ARTISTS, EVALUATIONS, MEMBERSHIPS, TAGS, USER_ARTISTS};
use crate::catalog::{Catalog, ColumnType, TagType};
use crate::filter::operator::attribution_operator;
use crate::filter::{
    FieldRouter, FilterItem, FilterModel, JoinSet, JoinTarget, JoinedTable, MuteMode, Operator,
    OperatorEvaluator, PageRequest, RouteKind, SortDirection, SortItem,
};
use crate::scope::{tenant_scope, Scope};
use crate::sql::{
    col, count_distinct, func, lit_bool, lit_null, max, min, param, table_col, Dialect, Expr,
    ExprExt, OrderByExpr, Query, SelectExpr, Statement, TableRef, Update,
};

pub use relations::Relation;

const TAG_ALIAS: &str = "tag_match";
const USER_ALIAS: &str = "user_match";
const CURRENT_EVALUATION_ALIAS: &str = "current_evaluation";

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while compiling a request.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("Unknown field '{field}'")]
    UnknownField { field: String },

    #[error("Operator '{operator}' is not supported for {column_type} field '{field}'")]
    UnsupportedOperator {
        field: String,
        operator: String,
        column_type: String,
    },

    #[error("Invalid date '{value}' for field '{field}'")]
    InvalidDate { field: String, value: String },

    #[error("Invalid value {value} for field '{field}': {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Field '{field}' cannot be sorted")]
    UnsortableField { field: String },
}

impl CompileError {
    pub fn unknown_field(field: &str) -> Self {
        CompileError::UnknownField {
            field: field.into(),
        }
    }

    pub fn unsupported_operator(field: &str, operator: &str, ty: ColumnType) -> Self {
        CompileError::UnsupportedOperator {
            field: field.into(),
            operator: operator.into(),
            column_type: ty.name().into(),
        }
    }

    pub fn invalid_date(field: &str, value: &str) -> Self {
        CompileError::InvalidDate {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn invalid_value(field: &str, value: &JsonValue, reason: &str) -> Self {
        CompileError::InvalidValue {
            field: field.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub fn unsortable_field(field: &str) -> Self {
        CompileError::UnsortableField {
            field: field.into(),
        }
    }

    /// The request field this error points at.
    pub fn field(&self) -> &str {
        match self {
            CompileError::UnknownField { field }
            | CompileError::UnsupportedOperator { field, .. }
            | CompileError::InvalidDate { field, .. }
            | CompileError::InvalidValue { field, .. }
            | CompileError::UnsortableField { field } => field,
        }
    }
}

pub type CompileResult<T> = Result<T, CompileError>;

// ============================================================================
// Options
// ============================================================================

/// Options for compilation.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// SQL dialect to generate.
    pub dialect: Dialect,

    /// Escape wildcards in `doesNotContain` values like every other pattern.
    pub escape_does_not_contain: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            dialect: Dialect::Postgres,
            escape_does_not_contain: false,
        }
    }
}

impl CompileOptions {
    /// Set the SQL dialect.
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_does_not_contain_escaping(mut self, escape: bool) -> Self {
        self.escape_does_not_contain = escape;
        self
    }
}

// ============================================================================
// Result Types
// ============================================================================

/// What a compiled query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// One page of artist ids, to be hydrated with eager relations.
    Rows,
    /// `COUNT(DISTINCT artists.id)` over the same filters.
    Count,
    /// Every matching artist id.
    IdentifiersOnly,
}

/// Filters compiled once and shared by the page, count and id queries.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterPlan {
    pub tenant: String,
    pub scope: Scope,
    /// Joins allocated by filters. Sorts extend a copy.
    pub joins: JoinSet,
    /// One predicate per filter item that contributed anything.
    pub predicates: Vec<Expr>,
}

impl FilterPlan {
    /// Tenant scope ANDed with every filter predicate.
    pub fn where_clause(&self) -> Expr {
        self.predicates
            .iter()
            .cloned()
            .fold(tenant_scope(&self.tenant, self.scope), |acc, p| acc.and(p))
    }
}

/// Result of compiling one request.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub mode: Mode,

    /// The plan the query was built from.
    pub plan: FilterPlan,

    /// The SQL query AST.
    pub query: Query,

    /// SQL with placeholders and its bound values.
    pub statement: Statement,

    /// Relations to load for the returned ids (Rows mode only).
    pub relations: &'static [Relation],
}

/// A change applied in bulk to the tenant's membership rows.
#[derive(Debug, Clone, PartialEq)]
pub enum MembershipChange {
    Mute(bool),
    Archive { by: String, at: NaiveDateTime },
    Unarchive,
}

// ============================================================================
// Compiler
// ============================================================================

/// Compiles grid requests against a catalog.
#[derive(Debug, Clone)]
pub struct QueryCompiler<'a> {
    catalog: &'a Catalog,
    options: CompileOptions,
}

impl<'a> QueryCompiler<'a> {
    pub fn new(catalog: &'a Catalog, options: CompileOptions) -> Self {
        Self { catalog, options }
    }

    pub fn dialect(&self) -> Dialect {
        self.options.dialect
    }

    /// Compile a request in one of the three modes.
    pub fn compile(
        &self,
        tenant: &str,
        filter: &FilterModel,
        sort: &[SortItem],
        page: PageRequest,
        mode: Mode,
    ) -> CompileResult<CompileOutput> {
        let plan = self.plan(tenant, filter)?;
        let (query, relations) = match mode {
            Mode::Rows => (self.page_query(&plan, sort, page)?, Relation::LIST),
            Mode::Count => (self.count_query(&plan), &[][..]),
            Mode::IdentifiersOnly => (self.ids_query(&plan, sort)?, &[][..]),
        };
        let statement = query.to_statement(self.dialect());

        tracing::debug!(tenant, ?mode, sql = %statement.sql, "compiled query");

        Ok(CompileOutput {
            mode,
            plan,
            query,
            statement,
            relations,
        })
    }

    /// Compile the filter model with the visibility scope its mute mode asks for.
    pub fn plan(&self, tenant: &str, filter: &FilterModel) -> CompileResult<FilterPlan> {
        self.plan_with_scope(tenant, Scope::Visible(filter.mute_mode()), &filter.items)
    }

    pub fn plan_with_scope(
        &self,
        tenant: &str,
        scope: Scope,
        items: &[FilterItem],
    ) -> CompileResult<FilterPlan> {
        let router = FieldRouter::new(self.catalog);
        let evaluator = OperatorEvaluator::new(self.options.escape_does_not_contain);
        let mut joins = JoinSet::new();
        let mut predicates = Vec::new();

        for item in items {
            let route = router.route(&item.field)?;
            if let Some(predicate) =
                self.filter_predicate(&evaluator, tenant, &mut joins, item, route)?
            {
                predicates.push(predicate);
            }
        }

        Ok(FilterPlan {
            tenant: tenant.into(),
            scope,
            joins,
            predicates,
        })
    }

    /// One page of artist ids, grouped and ordered by aggregated sort keys.
    pub fn page_query(
        &self,
        plan: &FilterPlan,
        sort: &[SortItem],
        page: PageRequest,
    ) -> CompileResult<Query> {
        Ok(self
            .sorted_ids_query(plan, sort)?
            .limit(page.page_size)
            .offset(page.offset()))
    }

    /// `COUNT(DISTINCT artists.id)`; sort joins never reach the count.
    pub fn count_query(&self, plan: &FilterPlan) -> Query {
        self.base_query(plan, &plan.joins, vec![count_distinct(artist_id())])
    }

    /// Every matching id, ordered only when a sort is given.
    pub fn ids_query(&self, plan: &FilterPlan, sort: &[SortItem]) -> CompileResult<Query> {
        if sort.is_empty() {
            return Ok(self
                .base_query(plan, &plan.joins, vec![artist_id()])
                .distinct());
        }
        self.sorted_ids_query(plan, sort)
    }

    /// One artist by id, visible to the tenant in any mute state.
    pub fn lookup_query(&self, tenant: &str, id: Uuid) -> Query {
        Query::new()
            .select(vec![artist_id()])
            .from(TableRef::new(ARTISTS.name))
            .filter(artist_id().eq(param(id)))
            .filter(tenant_scope(tenant, Scope::Visible(MuteMode::ShowAll)))
    }

    /// UPDATE the tenant's membership rows for every artist the plan matches.
    pub fn membership_update(&self, plan: &FilterPlan, change: &MembershipChange) -> Update {
        let ids = self
            .base_query(plan, &plan.joins, vec![artist_id()])
            .distinct();

        let update = Update::table(MEMBERSHIPS.name);
        let (update, archived) = match change {
            MembershipChange::Mute(muted) => (update.set("muted", param(*muted)), false),
            MembershipChange::Archive { by, at } => (
                update
                    .set("archived", lit_bool(true))
                    .set("archived_at", param(*at))
                    .set("archived_by", param(by.as_str())),
                false,
            ),
            MembershipChange::Unarchive => (
                update
                    .set("archived", lit_bool(false))
                    .set("archived_at", lit_null())
                    .set("archived_by", lit_null()),
                true,
            ),
        };

        update
            .filter(col("organization_id").eq(param(plan.tenant.as_str())))
            .filter(col("archived").eq(lit_bool(archived)))
            .filter(col("artist_id").in_subquery(ids))
    }

    /// Matching artists counted per current evaluation label.
    pub fn label_distribution_query(&self, plan: &FilterPlan) -> Query {
        let ids = self
            .base_query(plan, &plan.joins, vec![artist_id()])
            .distinct();
        let label = table_col(CURRENT_EVALUATION_ALIAS, "label");

        Query::new()
            .select(vec![
                SelectExpr::new(label.clone()).with_alias("label"),
                SelectExpr::new(count_distinct(artist_id())).with_alias("artist_count"),
            ])
            .from(TableRef::new(ARTISTS.name))
            .left_join(
                TableRef::new(EVALUATIONS.name).with_alias(CURRENT_EVALUATION_ALIAS),
                table_col(CURRENT_EVALUATION_ALIAS, "id")
                    .eq(table_col(ARTISTS.name, "evaluation_id")),
            )
            .filter(artist_id().in_subquery(ids))
            .group_by(vec![label.clone()])
            .order_by(vec![
                OrderByExpr::desc(count_distinct(artist_id())),
                OrderByExpr::asc(label).nulls_last(),
            ])
    }

    // ------------------------------------------------------------------------
    // Filters
    // ------------------------------------------------------------------------

    fn filter_predicate(
        &self,
        evaluator: &OperatorEvaluator,
        tenant: &str,
        joins: &mut JoinSet,
        item: &FilterItem,
        route: RouteKind,
    ) -> CompileResult<Option<Expr>> {
        let field = item.field.as_str();
        let operator = |ty: ColumnType| {
            Operator::parse(&item.operator)
                .ok_or_else(|| CompileError::unsupported_operator(field, &item.operator, ty))
        };

        match route {
            RouteKind::DirectColumn { column } => evaluator.evaluate(
                field,
                table_col(ARTISTS.name, column.name),
                column.ty,
                operator(column.ty)?,
                &item.value,
                false,
            ),
            RouteKind::Statistic { type_id, metric } => self.aliased_predicate(
                evaluator,
                joins,
                item,
                JoinTarget::Statistic { type_id },
                metric.column(),
                ColumnType::Float,
                operator(ColumnType::Float)?,
                metric.is_percent(),
            ),
            RouteKind::Evaluation { column } => self.aliased_predicate(
                evaluator,
                joins,
                item,
                JoinTarget::Evaluation,
                column.name,
                column.ty,
                operator(column.ty)?,
                false,
            ),
            RouteKind::OrgMembership {
                column,
                attribution: true,
            } => match attribution_operator(field, &item.value)? {
                Some(op) => self.aliased_predicate(
                    evaluator,
                    joins,
                    item,
                    JoinTarget::Membership,
                    column.name,
                    column.ty,
                    op,
                    false,
                ),
                None => Ok(None),
            },
            RouteKind::OrgMembership {
                column,
                attribution: false,
            } => self.aliased_predicate(
                evaluator,
                joins,
                item,
                JoinTarget::Membership,
                column.name,
                column.ty,
                operator(column.ty)?,
                false,
            ),
            RouteKind::TagMembership { tag_type } => {
                let membership = evaluator.membership(
                    field,
                    table_col(TAG_ALIAS, "tag"),
                    operator(ColumnType::Text)?,
                    &item.value,
                )?;
                Ok(membership.map(|m| {
                    semi_join(m.negated, tag_subquery(tenant, tag_type, m.inner))
                }))
            }
            RouteKind::UserMembership => {
                let membership = evaluator.membership(
                    field,
                    table_col(USER_ALIAS, "user_id"),
                    operator(ColumnType::Text)?,
                    &item.value,
                )?;
                Ok(membership.map(|m| semi_join(m.negated, user_subquery(tenant, m.inner))))
            }
        }
    }

    /// Evaluate against a fresh alias; the join is only kept when the item
    /// produced a predicate.
    #[allow(clippy::too_many_arguments)]
    fn aliased_predicate(
        &self,
        evaluator: &OperatorEvaluator,
        joins: &mut JoinSet,
        item: &FilterItem,
        target: JoinTarget,
        column: &str,
        ty: ColumnType,
        op: Operator,
        percent: bool,
    ) -> CompileResult<Option<Expr>> {
        let alias = joins.next_alias(target);
        let predicate = evaluator.evaluate(
            &item.field,
            table_col(&alias, column),
            ty,
            op,
            &item.value,
            percent,
        )?;
        if predicate.is_some() {
            joins.allocate(target);
        }
        Ok(predicate)
    }

    // ------------------------------------------------------------------------
    // Sorting
    // ------------------------------------------------------------------------

    fn order_keys(&self, joins: &mut JoinSet, sort: &[SortItem]) -> CompileResult<Vec<OrderByExpr>> {
        let router = FieldRouter::new(self.catalog);
        let mut keys = Vec::with_capacity(sort.len() + 1);

        for item in sort {
            let (key, ty) = match router.route(&item.field)? {
                RouteKind::DirectColumn { column } if column.name == "id" => {
                    keys.push(OrderByExpr::new(artist_id(), item.sort.into()));
                    continue;
                }
                RouteKind::DirectColumn { column } => {
                    (table_col(ARTISTS.name, column.name), column.ty)
                }
                RouteKind::Statistic { type_id, metric } => {
                    let alias = joins.reuse_or_allocate(JoinTarget::Statistic { type_id });
                    (table_col(&alias, metric.column()), ColumnType::Float)
                }
                RouteKind::Evaluation { column } => {
                    let alias = joins.reuse_or_allocate(JoinTarget::Evaluation);
                    (table_col(&alias, column.name), column.ty)
                }
                RouteKind::OrgMembership { column, .. } => {
                    let alias = joins.reuse_or_allocate(JoinTarget::Membership);
                    (table_col(&alias, column.name), column.ty)
                }
                RouteKind::TagMembership { .. } | RouteKind::UserMembership => {
                    return Err(CompileError::unsortable_field(&item.field));
                }
            };
            if matches!(ty, ColumnType::Json | ColumnType::Uuid) {
                return Err(CompileError::unsortable_field(&item.field));
            }
            keys.push(self.aggregate_key(key, ty, item.sort));
        }

        keys.push(OrderByExpr::asc(artist_id()));
        Ok(keys)
    }

    /// Rows are grouped by artist, so sort keys are aggregated: the smallest
    /// value ascending, the largest descending.
    fn aggregate_key(&self, key: Expr, ty: ColumnType, dir: SortDirection) -> OrderByExpr {
        let bool_aggregates = ty == ColumnType::Bool && self.dialect() == Dialect::Postgres;
        let expr = match (dir, bool_aggregates) {
            (SortDirection::Asc, false) => min(key),
            (SortDirection::Desc, false) => max(key),
            (SortDirection::Asc, true) => func("BOOL_AND", vec![key]),
            (SortDirection::Desc, true) => func("BOOL_OR", vec![key]),
        };
        OrderByExpr::new(expr, dir.into()).nulls_last()
    }

    // ------------------------------------------------------------------------
    // Assembly
    // ------------------------------------------------------------------------

    fn sorted_ids_query(&self, plan: &FilterPlan, sort: &[SortItem]) -> CompileResult<Query> {
        let mut joins = plan.joins.clone();
        let order = self.order_keys(&mut joins, sort)?;
        Ok(self
            .base_query(plan, &joins, vec![artist_id()])
            .group_by(vec![artist_id()])
            .order_by(order))
    }

    fn base_query(&self, plan: &FilterPlan, joins: &JoinSet, select: Vec<Expr>) -> Query {
        let mut query = Query::new().select(select).from(TableRef::new(ARTISTS.name));
        for joined in joins.joins() {
            query = query.left_join(
                TableRef::new(joined.target.table()).with_alias(&joined.alias),
                join_condition(plan, joined),
            );
        }
        query.filter(plan.where_clause())
    }
}

fn artist_id() -> Expr {
    table_col(ARTISTS.name, "id")
}

/// Membership joins read the same rows the plan's scope selects: archived
/// ones when restoring, live ones otherwise.
fn join_condition(plan: &FilterPlan, joined: &JoinedTable) -> Expr {
    let alias = joined.alias.as_str();
    match joined.target {
        JoinTarget::Statistic { type_id } => table_col(alias, "artist_id")
            .eq(artist_id())
            .and(table_col(alias, "statistic_type_id").eq(param(type_id))),
        JoinTarget::Evaluation => {
            table_col(alias, "id").eq(table_col(ARTISTS.name, "evaluation_id"))
        }
        JoinTarget::Membership => table_col(alias, "artist_id")
            .eq(artist_id())
            .and(table_col(alias, "organization_id").eq(param(plan.tenant.as_str())))
            .and(table_col(alias, "archived").eq(lit_bool(plan.scope == Scope::Archived))),
    }
}

fn semi_join(negated: bool, subquery: Query) -> Expr {
    if negated {
        artist_id().not_in_subquery(subquery)
    } else {
        artist_id().in_subquery(subquery)
    }
}

/// Artist ids with a tag of `tag_type` visible to the tenant.
fn tag_subquery(tenant: &str, tag_type: TagType, inner: Option<Expr>) -> Query {
    let column = |name: &str| table_col(TAG_ALIAS, name);
    let query = Query::new()
        .select(vec![column("artist_id")])
        .from(TableRef::new(TAGS.name).with_alias(TAG_ALIAS))
        .filter(column("tag_type_id").eq(param(tag_type.id())))
        .filter(
            column("organization_id")
                .is_null()
                .or(column("organization_id").eq(param(tenant)))
                .paren(),
        );
    match inner {
        Some(inner) => query.filter(inner),
        None => query,
    }
}

/// Artist ids attributed to a user of the tenant.
fn user_subquery(tenant: &str, inner: Option<Expr>) -> Query {
    let column = |name: &str| table_col(USER_ALIAS, name);
    let query = Query::new()
        .select(vec![column("artist_id")])
        .from(TableRef::new(USER_ARTISTS.name).with_alias(USER_ALIAS))
        .filter(column("organization_id").eq(param(tenant)));
    match inner {
        Some(inner) => query.filter(inner),
        None => query,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StatisticType;
    use crate::sql::test_utils::validate_sql;
    use crate::sql::Value;

    fn catalog() -> Catalog {
        let types = [5, 7].map(|id| StatisticType {
            id,
            source: "spotify".into(),
            key: format!("k{}", id),
            name: format!("Metric {}", id),
            format: "int".into(),
            display_order: None,
        });
        Catalog::new(types, vec![])
    }

    fn compile(
        items: Vec<FilterItem>,
        sort: &[SortItem],
        mode: Mode,
    ) -> CompileResult<CompileOutput> {
        let catalog = catalog();
        let compiler = QueryCompiler::new(&catalog, CompileOptions::default());
        compiler.compile(
            "org-a",
            &FilterModel::new(items),
            sort,
            PageRequest::new(1, 10),
            mode,
        )
    }

    #[test]
    fn test_unfiltered_page_query() {
        let output = compile(vec![], &[], Mode::Rows).unwrap();
        insta::assert_snapshot!(output.statement.sql, @r#"
        SELECT
          "artists"."id"
        FROM "artists"
        WHERE "artists"."id" IN (SELECT DISTINCT
          "tenant_scope"."artist_id"
        FROM "organizations_artists" AS "tenant_scope"
        WHERE "tenant_scope"."organization_id" = $1 AND "tenant_scope"."archived" = false AND "tenant_scope"."muted" = false)
        GROUP BY "artists"."id"
        ORDER BY "artists"."id" ASC
        LIMIT 10 OFFSET 10
        "#);
        assert_eq!(output.statement.params, vec![Value::Text("org-a".into())]);
        assert_eq!(output.relations, Relation::LIST);
    }

    #[test]
    fn test_statistic_filter_joins_and_binds() {
        let output = compile(
            vec![FilterItem::new("statistic.5-latest", ">=", "1000")],
            &[],
            Mode::Rows,
        )
        .unwrap();
        let sql = &output.statement.sql;
        assert!(sql.contains(
            "LEFT JOIN \"statistics\" AS \"statistic_1\" ON \"statistic_1\".\"artist_id\" = \"artists\".\"id\" AND \"statistic_1\".\"statistic_type_id\" = $1"
        ));
        assert!(sql.contains("AND \"statistic_1\".\"latest\" >= $3"));
        assert_eq!(
            output.statement.params,
            vec![Value::Int(5), Value::Text("org-a".into()), Value::Float(1000.0)]
        );
        validate_sql(sql, Dialect::Postgres).unwrap();
    }

    #[test]
    fn test_two_filters_on_same_statistic_use_two_aliases() {
        let output = compile(
            vec![
                FilterItem::new("statistic.5-latest", ">", 10),
                FilterItem::new("statistic.5-latest", "<", 100),
            ],
            &[SortItem::desc("statistic.5-latest")],
            Mode::Rows,
        )
        .unwrap();
        let sql = &output.statement.sql;
        assert_eq!(sql.matches("LEFT JOIN").count(), 2);
        assert!(sql.contains("\"statistic_1\".\"latest\" > "));
        assert!(sql.contains("\"statistic_2\".\"latest\" < "));
        assert!(sql.contains("ORDER BY MAX(\"statistic_1\".\"latest\") DESC NULLS LAST, \"artists\".\"id\" ASC"));
    }

    #[test]
    fn test_sort_allocates_alias_only_for_page() {
        let catalog = catalog();
        let compiler = QueryCompiler::new(&catalog, CompileOptions::default());
        let plan = compiler.plan("org-a", &FilterModel::default()).unwrap();
        let sort = [SortItem::asc("statistic.7-avg"), SortItem::desc("evaluation.label")];

        let page = compiler
            .page_query(&plan, &sort, PageRequest::new(0, 25))
            .unwrap()
            .to_sql(Dialect::Postgres);
        assert!(page.contains("LEFT JOIN \"statistics\" AS \"statistic_1\""));
        assert!(page.contains("LEFT JOIN \"evaluations\" AS \"evaluation_1\""));
        assert!(page.contains(
            "ORDER BY MIN(\"statistic_1\".\"avg\") ASC NULLS LAST, MAX(\"evaluation_1\".\"label\") DESC NULLS LAST, \"artists\".\"id\" ASC"
        ));

        let count = compiler.count_query(&plan).to_sql(Dialect::Postgres);
        assert!(!count.contains("JOIN"));
        assert!(count.starts_with("SELECT\n  COUNT(DISTINCT \"artists\".\"id\")"));
    }

    #[test]
    fn test_noop_filter_adds_no_join() {
        let output = compile(
            vec![FilterItem::new("statistic.5-latest", ">", JsonValue::Null)],
            &[],
            Mode::Count,
        )
        .unwrap();
        assert!(!output.statement.sql.contains("JOIN"));
        assert!(output.plan.joins.is_empty());
        assert!(output.plan.predicates.is_empty());
    }

    #[test]
    fn test_tag_filters_are_semi_joins() {
        let output = compile(
            vec![
                FilterItem::new("tags", "contains", "rock"),
                FilterItem::new("tags.genre", "isEmpty", JsonValue::Null),
            ],
            &[],
            Mode::IdentifiersOnly,
        )
        .unwrap();
        let sql = &output.statement.sql;
        assert!(!sql.contains("JOIN"));
        assert!(sql.contains("\"artists\".\"id\" IN (SELECT\n  \"tag_match\".\"artist_id\"\nFROM \"tags\" AS \"tag_match\""));
        assert!(sql.contains("\"artists\".\"id\" NOT IN (SELECT"));
        assert!(sql.contains("(\"tag_match\".\"organization_id\" IS NULL OR \"tag_match\".\"organization_id\" = $"));
        assert!(sql.starts_with("SELECT DISTINCT"));
        validate_sql(sql, Dialect::Postgres).unwrap();
    }

    #[test]
    fn test_attribution_type_rewrite() {
        let output = compile(
            vec![FilterItem::new("organization.attribution_type", "is", "true")],
            &[],
            Mode::Count,
        )
        .unwrap();
        assert!(output
            .statement
            .sql
            .contains("\"organization_1\".\"last_playlist_id\" IS NOT NULL"));
        assert!(output
            .statement
            .sql
            .contains("\"organization_1\".\"archived\" = false"));

        let err = compile(
            vec![FilterItem::new("organization.attribution_type", "is", "sometimes")],
            &[],
            Mode::Count,
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::InvalidValue { .. }));
    }

    #[test]
    fn test_errors() {
        let err = compile(vec![FilterItem::new("nonexistent.foo", "is", "x")], &[], Mode::Rows)
            .unwrap_err();
        assert_eq!(err, CompileError::unknown_field("nonexistent.foo"));
        assert_eq!(err.field(), "nonexistent.foo");

        let err = compile(vec![FilterItem::new("name", "between", "a")], &[], Mode::Rows)
            .unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedOperator { .. }));

        let err = compile(vec![], &[SortItem::asc("tags")], Mode::Rows).unwrap_err();
        assert_eq!(err, CompileError::unsortable_field("tags"));
    }

    #[test]
    fn test_lookup_uses_show_all_scope() {
        let catalog = catalog();
        let compiler = QueryCompiler::new(&catalog, CompileOptions::default());
        let sql = compiler.lookup_query("org-a", Uuid::nil()).to_sql(Dialect::Postgres);
        assert!(sql.contains("\"artists\".\"id\" = '00000000-0000-0000-0000-000000000000'"));
        assert!(!sql.contains("muted"));
    }

    #[test]
    fn test_membership_update() {
        let catalog = catalog();
        let compiler = QueryCompiler::new(&catalog, CompileOptions::default());
        let plan = compiler
            .plan(
                "org-a",
                &FilterModel::new(vec![FilterItem::new("name", "startsWith", "N")])
                    .with_muted(MuteMode::ShowAll),
            )
            .unwrap();
        let stmt = compiler
            .membership_update(&plan, &MembershipChange::Mute(true))
            .to_statement(Dialect::Postgres);
        assert!(stmt.sql.starts_with("UPDATE \"organizations_artists\" SET \"muted\" = $1\nWHERE \"organization_id\" = $2 AND \"archived\" = false AND \"artist_id\" IN (SELECT DISTINCT"));
        assert_eq!(stmt.params[0], Value::Bool(true));
        validate_sql(&stmt.sql, Dialect::Postgres).unwrap();
    }

    #[test]
    fn test_membership_join_follows_archived_scope() {
        let catalog = catalog();
        let compiler = QueryCompiler::new(&catalog, CompileOptions::default());
        let items = vec![FilterItem::new("organization.favorite", "is", true)];

        let restore = compiler
            .plan_with_scope("org-a", Scope::Archived, &items)
            .unwrap();
        let sql = compiler
            .membership_update(&restore, &MembershipChange::Unarchive)
            .to_statement(Dialect::Postgres)
            .sql;
        assert!(sql.contains("\"organization_1\".\"archived\" = true"));
        assert!(!sql.contains("\"organization_1\".\"archived\" = false"));

        let visible = compiler
            .plan_with_scope("org-a", Scope::Visible(MuteMode::ShowAll), &items)
            .unwrap();
        let sql = compiler.count_query(&visible).to_sql(Dialect::Postgres);
        assert!(sql.contains("\"organization_1\".\"archived\" = false"));
    }

    #[test]
    fn test_label_distribution_query_parses() {
        let catalog = catalog();
        let compiler = QueryCompiler::new(&catalog, CompileOptions::default());
        let plan = compiler.plan("org-a", &FilterModel::default()).unwrap();
        let sql = compiler.label_distribution_query(&plan).to_sql(Dialect::Postgres);
        assert!(sql.contains("GROUP BY \"current_evaluation\".\"label\""));
        validate_sql(&sql, Dialect::Postgres).unwrap();
    }

    #[test]
    fn test_bool_sort_on_postgres_uses_bool_aggregates() {
        let output = compile(vec![], &[SortItem::desc("active")], Mode::IdentifiersOnly).unwrap();
        assert!(output
            .statement
            .sql
            .contains("BOOL_OR(\"artists\".\"active\") DESC NULLS LAST"));
    }
}
