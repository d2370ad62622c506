//! Integration tests for grid request → SQL compilation.
//!
//! Every statement is parsed with sqlparser for the dialect it targets, so
//! these catch both shape regressions and rendering that a database would
//! reject.

use roster::catalog::{Catalog, StatisticType};
use roster::compile::{CompileError, CompileOptions, Mode, QueryCompiler};
use roster::filter::{FilterItem, FilterModel, MuteMode, PageRequest, SortItem};
use roster::sql::{Dialect, Value};
use serde_json::json;
use sqlparser::dialect::{PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::Parser;

fn catalog() -> Catalog {
    let types = [(5, "monthly_listeners"), (7, "followers")].map(|(id, key)| StatisticType {
        id,
        source: "spotify".into(),
        key: key.into(),
        name: key.replace('_', " "),
        format: "int".into(),
        display_order: None,
    });
    Catalog::new(types, vec![])
}

fn assert_parses(sql: &str, dialect: Dialect) {
    let result = match dialect {
        Dialect::Postgres => Parser::parse_sql(&PostgreSqlDialect {}, sql),
        Dialect::Sqlite => Parser::parse_sql(&SQLiteDialect {}, sql),
    };
    assert!(result.is_ok(), "{:?} rejected:\n{}\n{:?}", dialect, sql, result);
}

fn grid_filter() -> FilterModel {
    FilterModel::new(vec![
        FilterItem::new("name", "contains", "moon"),
        FilterItem::new("statistic.5-latest", ">=", 1000),
        FilterItem::new("statistic.7-week_over_week", ">", 5),
        FilterItem::new("evaluation.status", "isAnyOf", json!(["signed", "unsigned"])),
        FilterItem::new("evaluation.created_at", "onOrAfter", "2024-01-01"),
        FilterItem::new("organization.favorite", "is", true),
        FilterItem::new("tags.genre", "isAnyOf", json!(["rock", "pop"])),
        FilterItem::new("tags.user", "doesNotContain", "skip"),
        FilterItem::new("users", "isAnyOf", json!(["alice"])),
        FilterItem::new("organization.attribution_type", "is", true),
    ])
    .with_muted(MuteMode::ShowAll)
}

fn grid_sort() -> Vec<SortItem> {
    vec![
        SortItem::desc("statistic.5-latest"),
        SortItem::asc("evaluation.label"),
        SortItem::desc("organization.created_at"),
        SortItem::asc("name"),
    ]
}

#[test]
fn test_every_mode_parses_in_both_dialects() {
    let catalog = catalog();
    for dialect in [Dialect::Postgres, Dialect::Sqlite] {
        let compiler = QueryCompiler::new(&catalog, CompileOptions::default().with_dialect(dialect));
        for mode in [Mode::Rows, Mode::Count, Mode::IdentifiersOnly] {
            let output = compiler
                .compile("org-a", &grid_filter(), &grid_sort(), PageRequest::new(2, 25), mode)
                .unwrap_or_else(|e| panic!("{:?} {:?} failed: {}", dialect, mode, e));
            assert_parses(&output.statement.sql, dialect);
        }
    }
}

#[test]
fn test_placeholders_follow_dialect() {
    let catalog = catalog();
    let filter = FilterModel::new(vec![FilterItem::new("name", "is", "Nova")]);

    let pg = QueryCompiler::new(&catalog, CompileOptions::default().with_dialect(Dialect::Postgres))
        .compile("org-a", &filter, &[], PageRequest::new(0, 10), Mode::Count)
        .unwrap();
    assert!(pg.statement.sql.contains("$1"));
    assert!(pg.statement.sql.contains("$2"));
    assert!(!pg.statement.sql.contains("?1"));

    let lite = QueryCompiler::new(&catalog, CompileOptions::default().with_dialect(Dialect::Sqlite))
        .compile("org-a", &filter, &[], PageRequest::new(0, 10), Mode::Count)
        .unwrap();
    assert!(lite.statement.sql.contains("?1"));
    assert!(!lite.statement.sql.contains("$1"));

    assert_eq!(pg.statement.params, lite.statement.params);
    assert!(pg.statement.params.contains(&Value::Text("org-a".into())));
    assert!(pg.statement.params.contains(&Value::Text("Nova".into())));
}

#[test]
fn test_tenant_and_values_are_never_inlined() {
    let catalog = catalog();
    let compiler = QueryCompiler::new(&catalog, CompileOptions::default());
    let tenant = "org' OR '1'='1";
    let output = compiler
        .compile(
            tenant,
            &FilterModel::new(vec![FilterItem::new("name", "is", "x'; DROP TABLE artists; --")]),
            &[],
            PageRequest::new(0, 10),
            Mode::Rows,
        )
        .unwrap();

    assert!(!output.statement.sql.contains("OR '1'='1"));
    assert!(!output.statement.sql.contains("DROP TABLE"));
    assert!(output.statement.params.contains(&Value::Text(tenant.into())));
}

#[test]
fn test_contains_escapes_wildcards() {
    let catalog = catalog();
    let compiler = QueryCompiler::new(&catalog, CompileOptions::default().with_dialect(Dialect::Postgres));
    let output = compiler
        .compile(
            "org-a",
            &FilterModel::new(vec![FilterItem::new("name", "contains", "50%_off")]),
            &[],
            PageRequest::new(0, 10),
            Mode::Count,
        )
        .unwrap();

    assert!(output.statement.sql.contains("ILIKE"));
    assert!(output.statement.sql.contains("ESCAPE"));
    assert!(output
        .statement
        .params
        .contains(&Value::Text("%50\\%\\_off%".into())));
    assert_parses(&output.statement.sql, Dialect::Postgres);
}

#[test]
fn test_sort_reuses_filter_join() {
    let catalog = catalog();
    let compiler = QueryCompiler::new(&catalog, CompileOptions::default());
    let filter = FilterModel::new(vec![FilterItem::new("statistic.5-latest", ">=", 1000)]);
    let sort = [SortItem::desc("statistic.5-latest")];

    let rows = compiler
        .compile("org-a", &filter, &sort, PageRequest::new(0, 10), Mode::Rows)
        .unwrap();
    assert!(rows.statement.sql.contains("\"statistic_1\""));
    assert!(!rows.statement.sql.contains("\"statistic_2\""));
}

#[test]
fn test_count_ignores_sort_and_page() {
    let catalog = catalog();
    let compiler = QueryCompiler::new(&catalog, CompileOptions::default());
    let sort = [SortItem::desc("statistic.7-latest")];

    let count = compiler
        .compile("org-a", &FilterModel::default(), &sort, PageRequest::new(3, 10), Mode::Count)
        .unwrap();
    let sql = &count.statement.sql;
    assert!(sql.contains("COUNT(DISTINCT"));
    assert!(!sql.contains("ORDER BY"));
    assert!(!sql.contains("LIMIT"));
    assert!(!sql.contains("statistic_"));
    assert!(count.relations.is_empty());

    let other_page = compiler
        .compile("org-a", &FilterModel::default(), &[], PageRequest::new(0, 50), Mode::Count)
        .unwrap();
    assert_eq!(count.statement, other_page.statement);
}

#[test]
fn test_identifiers_only_is_unpaged() {
    let catalog = catalog();
    let compiler = QueryCompiler::new(&catalog, CompileOptions::default());

    let unsorted = compiler
        .compile("org-a", &FilterModel::default(), &[], PageRequest::new(4, 10), Mode::IdentifiersOnly)
        .unwrap();
    assert!(unsorted.statement.sql.starts_with("SELECT DISTINCT"));
    assert!(!unsorted.statement.sql.contains("LIMIT"));

    let sorted = compiler
        .compile("org-a", &FilterModel::default(), &[SortItem::asc("name")], PageRequest::new(4, 10), Mode::IdentifiersOnly)
        .unwrap();
    assert!(sorted.statement.sql.contains("ORDER BY"));
    assert!(!sorted.statement.sql.contains("LIMIT"));
}

#[test]
fn test_blank_values_add_nothing() {
    let catalog = catalog();
    let compiler = QueryCompiler::new(&catalog, CompileOptions::default());
    let compile = |filter: FilterModel| {
        compiler
            .compile("org-a", &filter, &[], PageRequest::new(0, 10), Mode::Rows)
            .unwrap()
            .statement
    };

    let unfiltered = compile(FilterModel::default());
    let blank = compile(FilterModel::new(vec![
        FilterItem::new("name", "contains", ""),
        FilterItem::new("statistic.5-latest", ">", json!(null)),
        FilterItem::new("tags.genre", "isAnyOf", json!([])),
        FilterItem::new("users", "isAnyOf", json!(null)),
        FilterItem::new("organization.attribution_type", "is", json!(null)),
    ]));
    assert_eq!(unfiltered, blank);

    let err = compiler
        .compile(
            "org-a",
            &FilterModel::new(vec![FilterItem::new("organization.attribution_type", "is", "maybe")]),
            &[],
            PageRequest::new(0, 10),
            Mode::Rows,
        )
        .unwrap_err();
    assert_eq!(err.field(), "organization.attribution_type");
}

#[test]
fn test_mute_modes_change_scope_only() {
    let catalog = catalog();
    let compiler = QueryCompiler::new(&catalog, CompileOptions::default());
    let sql = |mode: MuteMode| {
        compiler
            .compile("org-a", &FilterModel::default().with_muted(mode), &[], PageRequest::new(0, 10), Mode::Count)
            .unwrap()
            .statement
            .sql
    };

    assert!(sql(MuteMode::Hide).contains("\"muted\" = false"));
    assert!(sql(MuteMode::Only).contains("\"muted\" = true"));
    assert!(!sql(MuteMode::ShowAll).contains("muted"));
    for mode in [MuteMode::Hide, MuteMode::Only, MuteMode::ShowAll] {
        assert!(sql(mode).contains("\"archived\" = false"));
    }
}

#[test]
fn test_compile_errors_name_the_field() {
    let catalog = catalog();
    let compiler = QueryCompiler::new(&catalog, CompileOptions::default());
    let compile = |items: Vec<FilterItem>, sort: &[SortItem]| {
        compiler.compile("org-a", &FilterModel::new(items), sort, PageRequest::new(0, 10), Mode::Rows)
    };

    let err = compile(vec![FilterItem::new("nonexistent.foo", "is", "x")], &[]).unwrap_err();
    assert_eq!(err, CompileError::unknown_field("nonexistent.foo"));

    let err = compile(vec![FilterItem::new("statistic.99-latest", ">", 1)], &[]).unwrap_err();
    assert_eq!(err.field(), "statistic.99-latest");

    let err = compile(vec![FilterItem::new("evaluation.created_at", "after", "not a date")], &[])
        .unwrap_err();
    assert!(matches!(err, CompileError::InvalidDate { .. }));

    let err = compile(vec![], &[SortItem::asc("tags")]).unwrap_err();
    assert_eq!(err, CompileError::unsortable_field("tags"));
}
