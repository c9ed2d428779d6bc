//! Data source adapters
//!
//! `DataSourceAdapter` is the capability interface a backend offers to `DataSource`: catalog
//! lookups, query description, cursors and plain execution. The two implementations are
//! `Spatialite` (SQLite) and `Postgis` (PostgreSQL).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgQueryResult;
use sqlx::sqlite::SqliteQueryResult;
use tabgis_core::{DbType, GeometryType, TableLocation, Value};

use crate::{ColumnCatalog, Cursor, CursorType, SqlResult};

pub(crate) mod catalog;
pub mod postgres;
pub mod sqlite;
pub mod types;

pub use postgres::Postgis;
pub use sqlite::Spatialite;
pub use types::DriverRow;

/// Result of a statement that returns no rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub rows_affected: u64,
}

/// turn PgQueryResult into ExecutionResult
impl From<PgQueryResult> for ExecutionResult {
    fn from(result: PgQueryResult) -> Self {
        ExecutionResult {
            rows_affected: result.rows_affected(),
        }
    }
}

/// turn SqliteQueryResult into ExecutionResult
impl From<SqliteQueryResult> for ExecutionResult {
    fn from(result: SqliteQueryResult) -> Self {
        ExecutionResult {
            rows_affected: result.rows_affected(),
        }
    }
}

/// A geometry column registered in the spatial catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeometryColumn {
    pub name: String,
    pub geometry_type: GeometryType,
    pub srid: Option<i32>,
}

impl GeometryColumn {
    pub fn new<T: Into<String>>(name: T, geometry_type: GeometryType, srid: Option<i32>) -> Self {
        GeometryColumn {
            name: name.into(),
            geometry_type,
            srid,
        }
    }

    /// a geometry column known only from its declared type
    pub fn untyped<T: Into<String>>(name: T) -> Self {
        GeometryColumn::new(name, GeometryType::Geometry, None)
    }
}

/// Catalog flags of a named table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableKind {
    /// backed by another database (foreign or virtual table)
    pub linked: bool,
    pub temporary: bool,
}

/// Backend capability interface
#[async_trait]
pub trait DataSourceAdapter: Send + Sync {
    fn db_type(&self) -> DbType;

    /// database the adapter is connected to, without credentials
    fn location(&self) -> &str;

    /// cursor types the backend can open, in no particular order
    fn supported_cursor_types(&self) -> &[CursorType];

    /// whether independent pooled connections may read the same relation at once
    fn supports_concurrent_reads(&self) -> bool;

    /// whether `(SELECT ...)` is accepted where a table name is expected
    fn accepts_subquery_literal(&self) -> bool;

    /// whether the spatial SQL functions (PostGIS or SpatiaLite) are available
    fn spatial_functions(&self) -> bool {
        true
    }

    async fn exists(&self, location: &TableLocation) -> SqlResult<bool>;

    async fn table_kind(&self, location: &TableLocation) -> SqlResult<TableKind>;

    async fn geometry_columns(&self, location: &TableLocation) -> SqlResult<Vec<GeometryColumn>>;

    /// column names and types of a query, without running it to completion
    async fn describe(&self, sql: &str) -> SqlResult<ColumnCatalog>;

    async fn create_cursor(&self, sql: &str, cursor_type: CursorType) -> SqlResult<Cursor>;

    /// every row of a query, undecoded
    async fn fetch_rows(&self, sql: &str) -> SqlResult<Vec<DriverRow>>;

    /// every row of a small query, decoded dynamically
    async fn fetch_all(&self, sql: &str) -> SqlResult<Vec<Vec<Value>>> {
        self.fetch_rows(sql)
            .await?
            .iter()
            .map(|r| r.values(&[]))
            .collect()
    }

    async fn execute(&self, sql: &str) -> SqlResult<ExecutionResult>;

    async fn list_tables(&self) -> SqlResult<Vec<TableLocation>>;

    async fn close(&self);

    fn is_closed(&self) -> bool;
}

/// first cell of the first row
pub(crate) fn first_value(rows: Vec<Vec<Value>>) -> Option<Value> {
    rows.into_iter().next().and_then(|r| r.into_iter().next())
}

/// `(name, type, srid)` catalog row into a geometry column; the type is either an OGC code
/// (SpatiaLite) or a type name (PostGIS)
pub(crate) fn geometry_column_from_row(row: Vec<Value>) -> Option<GeometryColumn> {
    let mut cells = row.into_iter();
    let name = match cells.next()? {
        Value::String(s) => s,
        _ => return None,
    };
    let geometry_type = match cells.next() {
        Some(Value::String(s)) => GeometryType::from_name(&s),
        Some(v) => v
            .to_i64()
            .map(GeometryType::from_code)
            .unwrap_or(GeometryType::Geometry),
        None => GeometryType::Geometry,
    };
    let srid = cells
        .next()
        .and_then(|v| v.to_i64())
        .and_then(|v| i32::try_from(v).ok())
        .filter(|v| *v > 0);
    Some(GeometryColumn::new(name, geometry_type, srid))
}

#[cfg(test)]
mod test_adapter {
    use super::*;

    #[test]
    fn geometry_catalog_rows() {
        let gc = geometry_column_from_row(vec![
            Value::String("geom".into()),
            Value::I64(1003),
            Value::I64(4326),
        ])
        .unwrap();
        assert_eq!(gc, GeometryColumn::new("geom", GeometryType::Polygon, Some(4326)));

        let gc = geometry_column_from_row(vec![
            Value::String("the_geom".into()),
            Value::String("MULTIPOLYGON".into()),
            Value::I32(0),
        ])
        .unwrap();
        assert_eq!(gc.geometry_type, GeometryType::MultiPolygon);
        assert_eq!(gc.srid, None);

        assert!(geometry_column_from_row(vec![Value::Null]).is_none());
    }
}
