//! Tenant scoping.
//!
//! Every compiled query starts from a membership test: the artist id must
//! appear among the tenant's membership rows in the requested state. The test
//! is a distinct-id subquery, never a join, so artists with several
//! memberships for one tenant still appear once.

use crate::catalog::schema::{ARTISTS, MEMBERSHIPS};
use crate::filter::MuteMode;
use crate::sql::{lit_bool, param, table_col, Expr, ExprExt, Query, TableRef};

const SCOPE_ALIAS: &str = "tenant_scope";

/// Which of a tenant's membership rows make an artist visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Non-archived memberships, filtered by mute state.
    Visible(MuteMode),
    /// Archived memberships only.
    Archived,
}

impl Default for Scope {
    fn default() -> Self {
        Scope::Visible(MuteMode::Hide)
    }
}

/// `artists.id IN (SELECT DISTINCT artist_id FROM organizations_artists ...)`
pub fn tenant_scope(tenant: &str, scope: Scope) -> Expr {
    let column = |name: &str| table_col(SCOPE_ALIAS, name);

    let mut subquery = Query::new()
        .select(vec![column("artist_id")])
        .distinct()
        .from(TableRef::new(MEMBERSHIPS.name).with_alias(SCOPE_ALIAS))
        .filter(column("organization_id").eq(param(tenant)));

    subquery = match scope {
        Scope::Visible(mute) => {
            let active = subquery.filter(column("archived").eq(lit_bool(false)));
            match mute {
                MuteMode::Hide => active.filter(column("muted").eq(lit_bool(false))),
                MuteMode::Only => active.filter(column("muted").eq(lit_bool(true))),
                MuteMode::ShowAll => active,
            }
        }
        Scope::Archived => subquery.filter(column("archived").eq(lit_bool(true))),
    };

    table_col(ARTISTS.name, "id").in_subquery(subquery)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::test_utils::validate_sql;
    use crate::sql::{Dialect, Value};

    fn render(scope: Scope) -> (String, Vec<Value>) {
        let stmt = tenant_scope("org-a", scope)
            .to_tokens_for_dialect(Dialect::Postgres)
            .render(Dialect::Postgres);
        (stmt.sql, stmt.params)
    }

    #[test]
    fn test_hide_muted_scope() {
        let (sql, params) = render(Scope::default());
        assert_eq!(
            sql,
            "\"artists\".\"id\" IN (SELECT DISTINCT\n  \"tenant_scope\".\"artist_id\"\nFROM \"organizations_artists\" AS \"tenant_scope\"\nWHERE \"tenant_scope\".\"organization_id\" = $1 AND \"tenant_scope\".\"archived\" = false AND \"tenant_scope\".\"muted\" = false)"
        );
        assert_eq!(params, vec![Value::Text("org-a".into())]);
    }

    #[test]
    fn test_mute_modes() {
        let (only, _) = render(Scope::Visible(MuteMode::Only));
        assert!(only.ends_with("\"tenant_scope\".\"muted\" = true)"));

        let (all, _) = render(Scope::Visible(MuteMode::ShowAll));
        assert!(!all.contains("muted"));
        assert!(all.contains("\"archived\" = false"));
    }

    #[test]
    fn test_archived_scope() {
        let (sql, _) = render(Scope::Archived);
        assert!(sql.contains("\"archived\" = true"));
        assert!(!sql.contains("muted"));
    }

    #[test]
    fn test_scope_inside_select_parses() {
        let query = Query::new()
            .select(vec![table_col("artists", "id")])
            .from(TableRef::new("artists"))
            .filter(tenant_scope("org-a", Scope::default()));
        validate_sql(&query.to_sql(Dialect::Postgres), Dialect::Postgres).unwrap();
    }
}
