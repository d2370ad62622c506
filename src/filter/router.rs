//! Field routing and join alias allocation.
//!
//! A grid field name resolves to a [`RouteKind`] that says where the value
//! lives. Routes backed by a one-to-one join (statistics, the current
//! evaluation, the tenant's membership) get an alias from a [`JoinSet`];
//! one-to-many relations (tags, user attributions) are semi-joins and never
//! take an alias.

use std::sync::LazyLock;

use regex::Regex;

use crate::catalog::schema::{ARTISTS, EVALUATIONS, MEMBERSHIPS, STATISTICS};
use crate::catalog::{Catalog, ColumnSpec, TagType};
use crate::compile::CompileError;

static STATISTIC_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^statistic\.(\d+)-(\w+)$").unwrap());

/// Field rewritten to a null test on the membership's playlist id.
pub const ATTRIBUTION_FIELD: &str = "attribution_type";

/// Rolled-up statistic columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatisticMetric {
    Latest,
    Previous,
    Min,
    Max,
    Avg,
    WeekOverWeek,
    MonthOverMonth,
}

impl StatisticMetric {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "latest" => StatisticMetric::Latest,
            "previous" => StatisticMetric::Previous,
            "min" => StatisticMetric::Min,
            "max" => StatisticMetric::Max,
            "avg" => StatisticMetric::Avg,
            "week_over_week" => StatisticMetric::WeekOverWeek,
            "month_over_month" => StatisticMetric::MonthOverMonth,
            _ => return None,
        })
    }

    pub fn column(&self) -> &'static str {
        match self {
            StatisticMetric::Latest => "latest",
            StatisticMetric::Previous => "previous",
            StatisticMetric::Min => "min",
            StatisticMetric::Max => "max",
            StatisticMetric::Avg => "avg",
            StatisticMetric::WeekOverWeek => "week_over_week",
            StatisticMetric::MonthOverMonth => "month_over_month",
        }
    }

    /// Stored as a fraction, entered as a percentage.
    pub fn is_percent(&self) -> bool {
        matches!(
            self,
            StatisticMetric::WeekOverWeek | StatisticMetric::MonthOverMonth
        )
    }
}

/// Where a field's value lives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RouteKind {
    /// A column on `artists`.
    DirectColumn { column: &'static ColumnSpec },
    /// A metric on the artist's statistic row of one type.
    Statistic { type_id: i64, metric: StatisticMetric },
    /// A column on the artist's current evaluation.
    Evaluation { column: &'static ColumnSpec },
    /// A column on the tenant's membership row. `attribution` marks the
    /// rewritten `attribution_type` field.
    OrgMembership {
        column: &'static ColumnSpec,
        attribution: bool,
    },
    /// Tags of one type visible to the tenant.
    TagMembership { tag_type: TagType },
    /// Users of the tenant the artist is attributed to.
    UserMembership,
}

impl RouteKind {
    /// The aliased join this route reads from, if any.
    pub fn join_target(&self) -> Option<JoinTarget> {
        match self {
            RouteKind::Statistic { type_id, .. } => Some(JoinTarget::Statistic { type_id: *type_id }),
            RouteKind::Evaluation { .. } => Some(JoinTarget::Evaluation),
            RouteKind::OrgMembership { .. } => Some(JoinTarget::Membership),
            RouteKind::DirectColumn { .. }
            | RouteKind::TagMembership { .. }
            | RouteKind::UserMembership => None,
        }
    }
}

/// Resolves field names against the schema and the loaded catalog.
#[derive(Debug, Clone, Copy)]
pub struct FieldRouter<'a> {
    catalog: &'a Catalog,
}

impl<'a> FieldRouter<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    pub fn route(&self, field: &str) -> Result<RouteKind, CompileError> {
        let unknown = || CompileError::unknown_field(field);

        if field.starts_with("statistic.") {
            let caps = STATISTIC_FIELD.captures(field).ok_or_else(unknown)?;
            let type_id: i64 = caps[1].parse().map_err(|_| unknown())?;
            let metric = StatisticMetric::parse(&caps[2]).ok_or_else(unknown)?;
            if self.catalog.statistic_type(type_id).is_none() {
                return Err(unknown());
            }
            return Ok(RouteKind::Statistic { type_id, metric });
        }

        if let Some(key) = field.strip_prefix("evaluation.") {
            return EVALUATIONS
                .column(key)
                .filter(|c| c.name != "id" && c.name != "artist_id")
                .map(|column| RouteKind::Evaluation { column })
                .ok_or_else(unknown);
        }

        if let Some(key) = field.strip_prefix("organization.") {
            if key == ATTRIBUTION_FIELD {
                return MEMBERSHIPS
                    .column("last_playlist_id")
                    .map(|column| RouteKind::OrgMembership {
                        column,
                        attribution: true,
                    })
                    .ok_or_else(unknown);
            }
            return MEMBERSHIPS
                .column(key)
                .filter(|c| c.name != "organization_id" && c.name != "artist_id")
                .map(|column| RouteKind::OrgMembership {
                    column,
                    attribution: false,
                })
                .ok_or_else(unknown);
        }

        match field {
            "tags" | "tags.user" => {
                return Ok(RouteKind::TagMembership {
                    tag_type: TagType::User,
                })
            }
            "tags.genre" => {
                return Ok(RouteKind::TagMembership {
                    tag_type: TagType::Genre,
                })
            }
            "users" => return Ok(RouteKind::UserMembership),
            _ => {}
        }

        ARTISTS
            .column(field)
            .filter(|c| c.name != "evaluation_id")
            .map(|column| RouteKind::DirectColumn { column })
            .ok_or_else(unknown)
    }
}

// ============================================================================
// Join aliases
// ============================================================================

/// Identity of an aliased LEFT JOIN. Two routes with equal targets read the
/// same rows and may share an alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinTarget {
    Statistic { type_id: i64 },
    Evaluation,
    Membership,
}

impl JoinTarget {
    pub fn table(&self) -> &'static str {
        match self {
            JoinTarget::Statistic { .. } => STATISTICS.name,
            JoinTarget::Evaluation => EVALUATIONS.name,
            JoinTarget::Membership => MEMBERSHIPS.name,
        }
    }

    fn alias_prefix(&self) -> &'static str {
        match self {
            JoinTarget::Statistic { .. } => "statistic",
            JoinTarget::Evaluation => "evaluation",
            JoinTarget::Membership => "organization",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedTable {
    pub target: JoinTarget,
    pub alias: String,
}

/// Aliased joins allocated while compiling filters and sorts.
///
/// Filters always take a fresh alias so two filters on the same statistic
/// constrain independently. Sorts reuse any alias already joined for the same
/// target. Aliases are numbered per prefix in allocation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinSet {
    joins: Vec<JoinedTable>,
}

impl JoinSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The alias the next [`allocate`](Self::allocate) for `target` returns.
    pub fn next_alias(&self, target: JoinTarget) -> String {
        let prefix = target.alias_prefix();
        let n = self
            .joins
            .iter()
            .filter(|j| j.target.alias_prefix() == prefix)
            .count();
        format!("{}_{}", prefix, n + 1)
    }

    /// Allocate a fresh alias.
    pub fn allocate(&mut self, target: JoinTarget) -> String {
        let alias = self.next_alias(target);
        self.joins.push(JoinedTable {
            target,
            alias: alias.clone(),
        });
        alias
    }

    /// Reuse the first alias joined for `target`, or allocate one.
    pub fn reuse_or_allocate(&mut self, target: JoinTarget) -> String {
        match self.joins.iter().find(|j| j.target == target) {
            Some(existing) => existing.alias.clone(),
            None => self.allocate(target),
        }
    }

    pub fn joins(&self) -> &[JoinedTable] {
        &self.joins
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StatisticType;

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

    #[test]
    fn test_route_statistic() {
        let catalog = catalog();
        let router = FieldRouter::new(&catalog);
        assert_eq!(
            router.route("statistic.5-latest").unwrap(),
            RouteKind::Statistic {
                type_id: 5,
                metric: StatisticMetric::Latest
            }
        );
        assert!(router.route("statistic.5-median").is_err());
        assert!(router.route("statistic.x-latest").is_err());
        assert!(router.route("statistic.6-latest").is_err());
    }

    #[test]
    fn test_route_evaluation_and_organization() {
        let catalog = catalog();
        let router = FieldRouter::new(&catalog);
        assert!(matches!(
            router.route("evaluation.distributor_type").unwrap(),
            RouteKind::Evaluation { column } if column.name == "distributor_type"
        ));
        assert!(matches!(
            router.route("organization.created_at").unwrap(),
            RouteKind::OrgMembership { column, attribution: false } if column.name == "created_at"
        ));
        assert!(matches!(
            router.route("organization.attribution_type").unwrap(),
            RouteKind::OrgMembership { column, attribution: true } if column.name == "last_playlist_id"
        ));
        assert!(router.route("evaluation.nope").is_err());
        assert!(router.route("organization.organization_id").is_err());
    }

    #[test]
    fn test_route_memberships_and_direct_columns() {
        let catalog = catalog();
        let router = FieldRouter::new(&catalog);
        assert_eq!(
            router.route("tags").unwrap(),
            RouteKind::TagMembership {
                tag_type: TagType::User
            }
        );
        assert_eq!(
            router.route("tags.genre").unwrap(),
            RouteKind::TagMembership {
                tag_type: TagType::Genre
            }
        );
        assert_eq!(router.route("users").unwrap(), RouteKind::UserMembership);
        assert!(matches!(
            router.route("name").unwrap(),
            RouteKind::DirectColumn { column } if column.name == "name"
        ));

        let err = router.route("nonexistent.foo").unwrap_err();
        assert_eq!(err, CompileError::unknown_field("nonexistent.foo"));
        assert!(router.route("tags.mood").is_err());
    }

    #[test]
    fn test_filters_take_fresh_aliases() {
        let mut joins = JoinSet::new();
        let a = joins.allocate(JoinTarget::Statistic { type_id: 5 });
        let b = joins.allocate(JoinTarget::Statistic { type_id: 5 });
        let c = joins.allocate(JoinTarget::Evaluation);
        assert_eq!((a.as_str(), b.as_str(), c.as_str()), ("statistic_1", "statistic_2", "evaluation_1"));
    }

    #[test]
    fn test_sorts_reuse_matching_alias() {
        let mut joins = JoinSet::new();
        joins.allocate(JoinTarget::Statistic { type_id: 5 });
        assert_eq!(
            joins.reuse_or_allocate(JoinTarget::Statistic { type_id: 5 }),
            "statistic_1"
        );
        assert_eq!(
            joins.reuse_or_allocate(JoinTarget::Statistic { type_id: 7 }),
            "statistic_2"
        );
        assert_eq!(joins.reuse_or_allocate(JoinTarget::Membership), "organization_1");
        assert_eq!(joins.reuse_or_allocate(JoinTarget::Membership), "organization_1");
        assert_eq!(joins.len(), 3);
    }
}
