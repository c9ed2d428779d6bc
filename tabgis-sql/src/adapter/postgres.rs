//! PostgreSQL / PostGIS adapter

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Column as SColumn, Executor, PgPool, Statement, TypeInfo};
use tabgis_core::{DbType, TableLocation, Value};
use tracing::{debug, info, warn};

use super::{catalog, geometry_column_from_row, types::pg_value_type};
use super::{DataSourceAdapter, DriverRow, ExecutionResult, GeometryColumn, TableKind};
use crate::cursor::ScrollCursor;
use crate::macros::{fetch_rows, spawn_forward_cursor};
use crate::{Column, ColumnCatalog, Cursor, CursorType, DataSourceConfig, SqlError, SqlResult};

const CURSOR_TYPES: &[CursorType] = &[CursorType::ScrollInsensitive, CursorType::ForwardOnly];
const POSTGIS: &str = "postgis";

/// PostgreSQL database with the PostGIS extension.
pub struct Postgis {
    pool: PgPool,
    location: String,
}

impl Postgis {
    pub async fn open(config: &DataSourceConfig) -> SqlResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(config.pg_options()?)
            .await
            .map_err(SqlError::new_connection_error)?;

        let adapter = Postgis {
            pool,
            location: config.to_string(),
        };
        adapter.bootstrap().await;
        info!("opened postgis data source {}", adapter.location);

        Ok(adapter)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Postgis {
            pool,
            location: "postgres".to_string(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn bootstrap(&self) {
        match self.fetch_all(&catalog::pg_has_extension(POSTGIS)).await {
            Ok(rows) if !rows.is_empty() => {}
            Ok(_) => match self.execute("CREATE EXTENSION IF NOT EXISTS postgis").await {
                Ok(_) => debug!("created extension postgis on {}", self.location),
                Err(e) => warn!("cannot create extension postgis: {}", e),
            },
            Err(e) => warn!("cannot inspect extension postgis: {}", e),
        }
    }
}

#[async_trait]
impl DataSourceAdapter for Postgis {
    fn db_type(&self) -> DbType {
        DbType::Postgres
    }

    fn location(&self) -> &str {
        &self.location
    }

    fn supported_cursor_types(&self) -> &[CursorType] {
        CURSOR_TYPES
    }

    fn supports_concurrent_reads(&self) -> bool {
        true
    }

    fn accepts_subquery_literal(&self) -> bool {
        true
    }

    async fn exists(&self, location: &TableLocation) -> SqlResult<bool> {
        let rows = self.fetch_all(&catalog::pg_table_lookup(location)).await?;
        Ok(!rows.is_empty())
    }

    async fn table_kind(&self, location: &TableLocation) -> SqlResult<TableKind> {
        let rows = self.fetch_all(&catalog::pg_table_lookup(location)).await?;
        let kind = match super::first_value(rows) {
            Some(Value::String(t)) => TableKind {
                linked: t.starts_with("FOREIGN"),
                temporary: t == "LOCAL TEMPORARY",
            },
            _ => TableKind::default(),
        };
        Ok(kind)
    }

    async fn geometry_columns(&self, location: &TableLocation) -> SqlResult<Vec<GeometryColumn>> {
        let rows = self
            .fetch_all(&catalog::pg_geometry_columns(location))
            .await?;
        Ok(rows.into_iter().filter_map(geometry_column_from_row).collect())
    }

    async fn describe(&self, sql: &str) -> SqlResult<ColumnCatalog> {
        let statement = (&self.pool).prepare(sql).await?;
        let catalog = statement
            .columns()
            .iter()
            .map(|c| {
                let type_name = c.type_info().name().to_string();
                let value_type = pg_value_type(&type_name);
                Column::new(c.name(), type_name, value_type)
            })
            .collect();
        Ok(catalog)
    }

    async fn create_cursor(&self, sql: &str, cursor_type: CursorType) -> SqlResult<Cursor> {
        match cursor_type {
            CursorType::ScrollInsensitive => {
                debug!("scroll cursor: {}", sql);
                Ok(ScrollCursor::declare(&self.pool, sql).await?.into())
            }
            CursorType::ForwardOnly => {
                debug!("forward cursor: {}", sql);
                Ok(spawn_forward_cursor!(self.pool, sql).into())
            }
            t => Err(SqlError::new_unsupported_error(format!(
                "{t} cursor on postgres"
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
        let rows = self.fetch_all(&catalog::pg_list_tables()).await?;
        let res = rows
            .into_iter()
            .filter_map(|r| match r.as_slice() {
                [Value::String(s), Value::String(t)] => {
                    TableLocation::from_parts(None, Some(s.as_str()), t, DbType::Postgres).ok()
                }
                _ => None,
            })
            .collect();
        Ok(res)
    }

    async fn close(&self) {
        self.pool.close().await;
    }

    fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}
