//! SQLite / SpatiaLite adapter

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Executor, SqlitePool};
use tabgis_core::{quote, DbType, TableLocation, Value};
use tracing::{debug, info, warn};

use super::{catalog, geometry_column_from_row, types::sqlite_value_type};
use super::{DataSourceAdapter, DriverRow, ExecutionResult, GeometryColumn, TableKind};
use crate::macros::{fetch_rows, spawn_forward_cursor};
use crate::{
    Column, ColumnCatalog, Cursor, CursorType, DataSourceConfig, SqlError, SqlResult,
};

const CURSOR_TYPES: &[CursorType] = &[CursorType::ForwardOnly];
const INIT_SPATIAL_METADATA: &str = "SELECT InitSpatialMetadata(1)";

static DESCRIBE_SEQ: AtomicUsize = AtomicUsize::new(0);

/// SQLite database, with SpatiaLite functions when the extension could be loaded.
pub struct Spatialite {
    pool: SqlitePool,
    location: String,
    spatial_extension: bool,
}

impl Spatialite {
    pub async fn open(config: &DataSourceConfig) -> SqlResult<Self> {
        let options = config.sqlite_options()?;
        // a memory database lives as long as one connection does
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(options)
            .await
            .map_err(SqlError::new_connection_error)?;

        let adapter = Spatialite {
            pool,
            location: config.to_string(),
            spatial_extension: config.spatial_extension.is_some(),
        };
        adapter.bootstrap().await;
        info!("opened sqlite data source {}", adapter.location);

        Ok(adapter)
    }

    /// wrap an existing pool, SpatiaLite assumed absent
    pub fn from_pool(pool: SqlitePool) -> Self {
        Spatialite {
            pool,
            location: "sqlite".to_string(),
            spatial_extension: false,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn has_spatial_extension(&self) -> bool {
        self.spatial_extension
    }

    /// create the SpatiaLite metadata tables when missing
    async fn bootstrap(&self) {
        if !self.spatial_extension {
            return;
        }
        match self.fetch_all(&catalog::sqlite_has_geometry_catalog()).await {
            Ok(rows) if !rows.is_empty() => {}
            Ok(_) => match self.execute(INIT_SPATIAL_METADATA).await {
                Ok(_) => debug!("initialized spatial metadata of {}", self.location),
                Err(e) => warn!("cannot initialize spatial metadata: {}", e),
            },
            Err(e) => warn!("cannot inspect spatial metadata: {}", e),
        }
    }

    /// SQLite names have at most two parts: `schema.table`
    fn check_location(location: &TableLocation) -> SqlResult<()> {
        match location.catalog() {
            Some(c) => Err(SqlError::new_unsupported_error(format!(
                "catalog '{c}' in the sqlite table name {location}"
            ))),
            None => Ok(()),
        }
    }

    /// first `sqlite_master` hit of the table: (`sql`, temporary)
    async fn lookup(&self, location: &TableLocation) -> SqlResult<Option<(Value, bool)>> {
        Self::check_location(location)?;
        for (sql, temporary) in catalog::sqlite_table_lookup(location) {
            let rows = self.fetch_all(&sql).await?;
            if let Some(row) = rows.into_iter().next() {
                let ddl = row.into_iter().nth(1).unwrap_or_default();
                return Ok(Some((ddl, temporary)));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl DataSourceAdapter for Spatialite {
    fn db_type(&self) -> DbType {
        DbType::Sqlite
    }

    fn location(&self) -> &str {
        &self.location
    }

    fn supported_cursor_types(&self) -> &[CursorType] {
        CURSOR_TYPES
    }

    fn supports_concurrent_reads(&self) -> bool {
        false
    }

    fn accepts_subquery_literal(&self) -> bool {
        false
    }

    fn spatial_functions(&self) -> bool {
        self.spatial_extension
    }

    async fn exists(&self, location: &TableLocation) -> SqlResult<bool> {
        Ok(self.lookup(location).await?.is_some())
    }

    async fn table_kind(&self, location: &TableLocation) -> SqlResult<TableKind> {
        let kind = match self.lookup(location).await? {
            Some((ddl, temporary)) => {
                let ddl = ddl.to_string().trim_start().to_uppercase();
                TableKind {
                    linked: ddl.starts_with("CREATE VIRTUAL TABLE"),
                    temporary,
                }
            }
            None => TableKind::default(),
        };
        Ok(kind)
    }

    async fn geometry_columns(&self, location: &TableLocation) -> SqlResult<Vec<GeometryColumn>> {
        Self::check_location(location)?;
        let rows = self
            .fetch_all(&catalog::sqlite_geometry_columns(location))
            .await?;
        Ok(rows.into_iter().filter_map(geometry_column_from_row).collect())
    }

    /// Declared types only survive through a view, so the query is wrapped in a temporary view
    /// on one connection and read back with `PRAGMA table_info`.
    async fn describe(&self, sql: &str) -> SqlResult<ColumnCatalog> {
        let view = format!(
            "tabgis_describe_{}",
            DESCRIBE_SEQ.fetch_add(1, Ordering::Relaxed)
        );
        let mut conn = self.pool.acquire().await?;

        let create = format!("CREATE TEMP VIEW {} AS {}", quote(&view), sql);
        conn.execute(create.as_str()).await?;
        let pragma = catalog::sqlite_table_info(&view);
        let info = conn
            .fetch_all(sqlx::query(&pragma).persistent(false))
            .await;
        let drop = format!("DROP VIEW IF EXISTS temp.{}", quote(&view));
        conn.execute(drop.as_str()).await?;

        info?
            .into_iter()
            .map(|r| -> SqlResult<Column> {
                let row = DriverRow::from(r);
                let name = String::try_from(row.value(1, &tabgis_core::ValueType::String)?)?;
                let type_name = match row.value(2, &tabgis_core::ValueType::Null)? {
                    Value::Null => String::new(),
                    v => v.to_string(),
                };
                let value_type = sqlite_value_type(&type_name);
                Ok(Column::new(name, type_name, value_type))
            })
            .collect()
    }

    async fn create_cursor(&self, sql: &str, cursor_type: CursorType) -> SqlResult<Cursor> {
        match cursor_type {
            CursorType::ForwardOnly => {
                debug!("forward cursor: {}", sql);
                Ok(spawn_forward_cursor!(self.pool, sql).into())
            }
            t => Err(SqlError::new_unsupported_error(format!(
                "{t} cursor on sqlite"
            ))),
        }
    }

    async fn fetch_rows(&self, sql: &str) -> SqlResult<Vec<DriverRow>> {
        debug!("fetch: {}", sql);
        Ok(fetch_rows!(&self.pool, sql))
    }

    async fn execute(&self, sql: &str) -> SqlResult<ExecutionResult> {
        debug!("execute: {}", sql);
        Ok(sqlx::raw_sql(sql).execute(&self.pool).await?.into())
    }

    async fn list_tables(&self) -> SqlResult<Vec<TableLocation>> {
        let rows = self.fetch_all(&catalog::sqlite_list_tables()).await?;
        let res = rows
            .into_iter()
            .filter_map(|r| r.into_iter().next())
            .map(|v| TableLocation::new(v.to_string(), DbType::Sqlite))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(res)
    }

    async fn close(&self) {
        self.pool.close().await;
    }

    fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}
