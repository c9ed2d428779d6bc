//! Data source
//!
//! `DataSource` is the entry point: it opens an adapter, resolves table names into lazy
//! tables and runs free-form queries. Cloning is cheap, every clone shares the same pool.

use std::sync::Arc;

use tabgis_core::{DbType, TableLocation};
use tracing::{debug, error, warn};

use crate::adapter::{DataSourceAdapter, ExecutionResult, GeometryColumn, Postgis, Spatialite};
use crate::builder::{QueryBuilder, Selected};
use crate::{
    ColumnCatalog, CursorType, DataSourceConfig, LazyTable, SpatialTable, SqlError, SqlResult,
    Table,
};

const SUBQUERY_ALIAS: &str = "tabgis_subquery";

#[derive(Clone)]
pub struct DataSource {
    adapter: Arc<dyn DataSourceAdapter>,
}

impl std::fmt::Debug for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSource")
            .field("db_type", &self.db_type())
            .field("location", &self.adapter.location())
            .finish()
    }
}

impl DataSource {
    pub fn from_adapter<A>(adapter: A) -> Self
    where
        A: DataSourceAdapter + 'static,
    {
        DataSource {
            adapter: Arc::new(adapter),
        }
    }

    pub async fn open(db_type: DbType, config: &DataSourceConfig) -> SqlResult<Self> {
        match db_type {
            DbType::Sqlite => Self::open_sqlite(config).await,
            DbType::Postgres => Self::open_postgis(config).await,
        }
    }

    pub async fn open_sqlite(config: &DataSourceConfig) -> SqlResult<Self> {
        Ok(Self::from_adapter(Spatialite::open(config).await?))
    }

    pub async fn open_postgis(config: &DataSourceConfig) -> SqlResult<Self> {
        Ok(Self::from_adapter(Postgis::open(config).await?))
    }

    pub fn db_type(&self) -> DbType {
        self.adapter.db_type()
    }

    pub fn location(&self) -> &str {
        self.adapter.location()
    }

    pub fn adapter(&self) -> &Arc<dyn DataSourceAdapter> {
        &self.adapter
    }

    /// whether both handles point at the same adapter
    pub fn same_source(&self, other: &DataSource) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.adapter) as *const (),
            Arc::as_ptr(&other.adapter) as *const (),
        )
    }

    pub fn is_closed(&self) -> bool {
        self.adapter.is_closed()
    }

    /// Close the pool. Tables of this source fail with `ClosedResource` from now on.
    pub async fn close(&self) {
        self.adapter.close().await;
    }

    pub(crate) fn check_open(&self) -> SqlResult<()> {
        if self.is_closed() {
            Err(SqlError::ClosedResource("data source"))
        } else {
            Ok(())
        }
    }

    // ============================================================================================
    // tables
    // ============================================================================================

    /// Any error while checking counts as "no such table".
    pub async fn has_table(&self, name: &str) -> bool {
        let res: SqlResult<bool> = async {
            self.check_open()?;
            let location = TableLocation::parse(name, self.db_type())?;
            self.adapter.exists(&location).await
        }
        .await;

        res.unwrap_or_else(|e| {
            error!("cannot check table '{}': {}", name, e);
            false
        })
    }

    /// `None` when the table does not exist or cannot be opened, the reason being logged.
    pub async fn get_table(&self, name: &str) -> Option<Table> {
        match self.try_get_table(name).await {
            Ok(t) => Some(t),
            Err(e @ SqlError::TableNotFound(_)) => {
                warn!("{}", e);
                None
            }
            Err(e) => {
                error!("cannot open table '{}': {}", name, e);
                None
            }
        }
    }

    /// `get_table` with the reason of a failure.
    pub async fn try_get_table(&self, name: &str) -> SqlResult<Table> {
        self.check_open()?;
        let name = name.trim();

        if name.starts_with('(') && name.ends_with(')') {
            if !self.adapter.accepts_subquery_literal() {
                return Err(SqlError::new_unsupported_error(format!(
                    "subquery as table name on {}",
                    self.db_type()
                )));
            }
            let sql = format!("SELECT * FROM {} AS {}", name, SUBQUERY_ALIAS);
            return self.build_table(None, sql, None, vec![]).await;
        }

        let location = TableLocation::parse(name, self.db_type())?;
        if !self.adapter.exists(&location).await? {
            return Err(SqlError::TableNotFound(location.to_string()));
        }
        let geometry = self
            .adapter
            .geometry_columns(&location)
            .await
            .unwrap_or_else(|e| {
                debug!("no geometry catalog for {}: {}", location, e);
                vec![]
            });
        let sql = format!("SELECT * FROM {}", location.to_sql());

        self.build_table(Some(location), sql, None, geometry).await
    }

    pub async fn get_spatial_table(&self, name: &str) -> Option<SpatialTable> {
        match self.get_table(name).await? {
            Table::Spatial(t) => Some(t),
            Table::Plain(_) => {
                let e = SqlError::new_type_mismatch_error(format!(
                    "the table '{name}' is not a spatial table"
                ));
                error!("{}", e);
                None
            }
        }
    }

    /// Table over an arbitrary query, positioned before its first row.
    pub async fn query(&self, sql: &str) -> SqlResult<Table> {
        let sql = sql.trim().trim_end_matches(';').trim_end();
        self.build_table(None, sql.to_string(), None, vec![]).await
    }

    pub fn select<I, T>(&self, fields: I) -> QueryBuilder<Selected>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        QueryBuilder::select(fields).bind(self.clone())
    }

    pub async fn execute(&self, sql: &str) -> SqlResult<ExecutionResult> {
        self.check_open()?;
        self.adapter.execute(sql).await
    }

    /// every user table, rendered for this source's dialect
    pub async fn table_names(&self) -> SqlResult<Vec<String>> {
        self.check_open()?;
        let tables = self.adapter.list_tables().await?;
        Ok(tables.iter().map(|t| t.to_sql()).collect())
    }

    /// Assemble a table. Geometry columns come from `geometry` (catalog knowledge) and from
    /// the declared types of the described columns.
    pub(crate) async fn build_table(
        &self,
        location: Option<TableLocation>,
        sql: String,
        catalog: Option<ColumnCatalog>,
        geometry: Vec<GeometryColumn>,
    ) -> SqlResult<Table> {
        self.check_open()?;

        let mut catalog = match catalog {
            Some(c) => c,
            None => self.adapter.describe(&sql).await?,
        };
        let cursor_type = CursorType::best_of(self.adapter.supported_cursor_types());
        let kind = match &location {
            Some(l) => self.adapter.table_kind(l).await.unwrap_or_else(|e| {
                debug!("no table kind for {}: {}", l, e);
                Default::default()
            }),
            None => Default::default(),
        };

        let mut fields = geometry
            .into_iter()
            .filter_map(|g| catalog.index_of(&g.name).map(|i| (i, g)))
            .collect::<Vec<_>>();
        for i in catalog.geometry_indices() {
            if !fields.iter().any(|(j, _)| *j == i) {
                if let Some(c) = catalog.column(i) {
                    fields.push((i, GeometryColumn::untyped(c.name.as_str())));
                }
            }
        }
        fields.sort_by_key(|(i, _)| *i);
        fields.dedup_by_key(|(i, _)| *i);
        for (i, _) in fields.iter() {
            catalog.mark_geometry(*i);
        }
        let geometry = fields.into_iter().map(|(_, g)| g).collect::<Vec<_>>();

        debug!(
            "table {} with {} columns ({} geometry), {} cursor",
            location
                .as_ref()
                .map(|l| l.to_string())
                .unwrap_or_else(|| "query".to_string()),
            catalog.len(),
            geometry.len(),
            cursor_type
        );

        let table = LazyTable::new(
            self.clone(),
            location,
            sql,
            catalog,
            geometry,
            kind,
            cursor_type,
        );
        Ok(Table::from(table))
    }
}
