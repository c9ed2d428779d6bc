//! Catalog queries
//!
//! Metadata lookups rendered with sea-query, one builder per question asked of the catalog.
//! SQLite names are compared case-insensitively, PostgreSQL names exactly (they are already
//! case-normalized by `TableLocation::parse`).

use sea_query::{Expr, Func, Query, SelectStatement};
use tabgis_core::{quote, DbType, TableLocation};

use crate::macros::{alias, statement};

const SQLITE_MASTER: &str = "sqlite_master";
const SQLITE_TEMP_MASTER: &str = "sqlite_temp_master";

fn is_temp_schema(schema: &str) -> bool {
    schema.eq_ignore_ascii_case("temp") || schema.eq_ignore_ascii_case("temporary")
}

fn is_main_schema(schema: &str) -> bool {
    schema.eq_ignore_ascii_case("main")
}

/// lower(col) = lower(value)
fn lower_eq(col: &str, value: &str) -> sea_query::SimpleExpr {
    Expr::expr(Func::lower(Expr::col(alias!(col)))).eq(value.to_lowercase())
}

// ================================================================================================
// SQLite
// ================================================================================================

/// `sqlite_master` rows of the table: `type`, `sql`
fn sqlite_master_stmt(master: &str, schema: Option<&str>, table: &str) -> SelectStatement {
    let mut statement = Query::select();
    statement.columns([alias!("type"), alias!("sql")]);
    match schema {
        Some(s) => statement.from((alias!(s), alias!(master))),
        None => statement.from(alias!(master)),
    };
    statement
        .and_where(Expr::col(alias!("type")).is_in(["table", "view"]))
        .and_where(lower_eq("name", table))
        .limit(1);
    statement
}

/// Candidate catalog queries for a SQLite table, in lookup order. Each yields `type` and
/// `sql`, the second element tells whether the hit is a temporary table.
pub(crate) fn sqlite_table_lookup(location: &TableLocation) -> Vec<(String, bool)> {
    let table = location.table();
    match location.schema() {
        None => vec![
            (statement!(DbType::Sqlite, sqlite_master_stmt(SQLITE_MASTER, None, table)), false),
            (
                statement!(DbType::Sqlite, sqlite_master_stmt(SQLITE_TEMP_MASTER, None, table)),
                true,
            ),
        ],
        Some(s) if is_temp_schema(s) => vec![(
            statement!(DbType::Sqlite, sqlite_master_stmt(SQLITE_TEMP_MASTER, None, table)),
            true,
        )],
        Some(s) if is_main_schema(s) => vec![(
            statement!(DbType::Sqlite, sqlite_master_stmt(SQLITE_MASTER, None, table)),
            false,
        )],
        Some(s) => vec![(
            statement!(
                DbType::Sqlite,
                sqlite_master_stmt(SQLITE_MASTER, Some(s), table)
            ),
            false,
        )],
    }
}

/// `geometry_columns` rows of the table: `f_geometry_column`, `geometry_type`, `srid`
pub(crate) fn sqlite_geometry_columns(location: &TableLocation) -> String {
    let mut statement = Query::select();
    statement.columns([
        alias!("f_geometry_column"),
        alias!("geometry_type"),
        alias!("srid"),
    ]);
    match location.schema() {
        Some(s) if !is_main_schema(s) && !is_temp_schema(s) => {
            statement.from((alias!(s), alias!("geometry_columns")))
        }
        _ => statement.from(alias!("geometry_columns")),
    };
    statement.and_where(lower_eq("f_table_name", location.table()));
    statement!(DbType::Sqlite, statement)
}

/// whether the SpatiaLite metadata tables already exist
pub(crate) fn sqlite_has_geometry_catalog() -> String {
    let statement = Query::select()
        .expr(Expr::val(1))
        .from(alias!(SQLITE_MASTER))
        .and_where(lower_eq("name", "geometry_columns"))
        .limit(1)
        .to_owned();
    statement!(DbType::Sqlite, statement)
}

pub(crate) fn sqlite_list_tables() -> String {
    let statement = Query::select()
        .column(alias!("name"))
        .from(alias!(SQLITE_MASTER))
        .and_where(Expr::col(alias!("type")).is_in(["table", "view"]))
        .and_where(Expr::col(alias!("name")).not_like("sqlite_%"))
        .to_owned();
    statement!(DbType::Sqlite, statement)
}

/// declared column types of a relation
pub(crate) fn sqlite_table_info(relation: &str) -> String {
    format!("PRAGMA table_info({})", quote(relation))
}

// ================================================================================================
// PostgreSQL
// ================================================================================================

fn pg_filter_location(statement: &mut SelectStatement, location: &TableLocation, prefix: &str) {
    statement.and_where(Expr::col(alias!(format!("{prefix}table_name"))).eq(location.table()));
    if let Some(s) = location.schema() {
        statement.and_where(Expr::col(alias!(format!("{prefix}table_schema"))).eq(s));
    }
    if let Some(c) = location.catalog() {
        statement.and_where(Expr::col(alias!(format!("{prefix}table_catalog"))).eq(c));
    }
}

/// `information_schema.tables` row of the table: `table_type`
pub(crate) fn pg_table_lookup(location: &TableLocation) -> String {
    let mut statement = Query::select();
    statement
        .column(alias!("table_type"))
        .from((alias!("information_schema"), alias!("tables")));
    pg_filter_location(&mut statement, location, "");
    statement.limit(1);
    statement!(DbType::Postgres, statement)
}

/// `geometry_columns` rows of the table: `f_geometry_column`, `type`, `srid`
pub(crate) fn pg_geometry_columns(location: &TableLocation) -> String {
    let mut statement = Query::select();
    statement
        .columns([alias!("f_geometry_column"), alias!("type"), alias!("srid")])
        .from(alias!("geometry_columns"));
    pg_filter_location(&mut statement, location, "f_");
    statement!(DbType::Postgres, statement)
}

pub(crate) fn pg_has_extension(name: &str) -> String {
    let statement = Query::select()
        .expr(Expr::val(1))
        .from(alias!("pg_extension"))
        .and_where(Expr::col(alias!("extname")).eq(name))
        .to_owned();
    statement!(DbType::Postgres, statement)
}

pub(crate) fn pg_list_tables() -> String {
    let statement = Query::select()
        .columns([alias!("table_schema"), alias!("table_name")])
        .from((alias!("information_schema"), alias!("tables")))
        .and_where(
            Expr::col(alias!("table_schema")).is_not_in(["pg_catalog", "information_schema"]),
        )
        .to_owned();
    statement!(DbType::Postgres, statement)
}

#[cfg(test)]
mod test_catalog {
    use super::*;

    #[test]
    fn sqlite_lookup_queries() {
        let loc = TableLocation::new("TOTO", DbType::Sqlite).unwrap();
        let q = sqlite_table_lookup(&loc);
        assert_eq!(q.len(), 2);
        assert_eq!(
            q[0].0,
            r#"SELECT "type", "sql" FROM "sqlite_master" WHERE "type" IN ('table', 'view') AND LOWER("name") = 'toto' LIMIT 1"#
        );
        assert!(q[1].0.contains("sqlite_temp_master"));
        assert!(q[1].1);

        let loc = TableLocation::from_parts(None, Some("AUX"), "it's", DbType::Sqlite).unwrap();
        let q = sqlite_table_lookup(&loc);
        assert_eq!(q.len(), 1);
        assert!(q[0].0.contains(r#"FROM "AUX"."sqlite_master""#));
        assert!(q[0].0.contains("'it''s'"));
    }

    #[test]
    fn pg_lookup_queries() {
        let loc = TableLocation::from_parts(None, Some("public"), "toto", DbType::Postgres).unwrap();
        assert_eq!(
            pg_table_lookup(&loc),
            r#"SELECT "table_type" FROM "information_schema"."tables" WHERE "table_name" = 'toto' AND "table_schema" = 'public' LIMIT 1"#
        );
        assert!(pg_geometry_columns(&loc).contains(r#""f_table_schema" = 'public'"#));
    }

    #[test]
    fn pragma_quotes_relation() {
        assert_eq!(sqlite_table_info("a\"b"), r#"PRAGMA table_info("a""b")"#);
    }
}
