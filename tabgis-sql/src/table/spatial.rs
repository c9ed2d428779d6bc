//! Spatial table
//!
//! A `LazyTable` with at least one geometry column. Geometry metadata is taken from the
//! spatial catalog when the table is a named one, and computed by the server otherwise.

use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tabgis_core::geo_types::Rect;
use tabgis_core::{quote, DbType, Geometry, GeometryType, Value, ValueType};
use tracing::debug;

use super::{subquery, LazyTable, TableSummary};
use crate::adapter::{first_value, GeometryColumn};
use crate::{ColumnSelector, SqlError, SqlResult};

/// `TableSummary` plus the geometry side of the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialSummary {
    pub summary: TableSummary,
    pub geometry_columns: Vec<GeometryColumn>,
    pub extent: Option<Rect<f64>>,
}

impl std::fmt::Display for SpatialSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.summary)?;
        for g in &self.geometry_columns {
            write!(f, ", {} {}", g.name, g.geometry_type)?;
            if let Some(srid) = g.srid {
                write!(f, " (SRID {srid})")?;
            }
        }
        if let Some(e) = &self.extent {
            write!(
                f,
                ", extent [{} {}, {} {}]",
                e.min().x,
                e.min().y,
                e.max().x,
                e.max().y
            )?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct SpatialTable {
    table: LazyTable,
    first_geometry: usize,
}

impl SpatialTable {
    pub(crate) fn new(table: LazyTable) -> Self {
        let first_geometry = table
            .geometry()
            .iter()
            .filter_map(|g| table.meta().index_of(&g.name))
            .min()
            .or_else(|| table.meta().geometry_indices().into_iter().next())
            .unwrap_or_default();
        SpatialTable {
            table,
            first_geometry,
        }
    }

    pub fn into_inner(self) -> LazyTable {
        self.table
    }

    pub fn as_lazy(&self) -> &LazyTable {
        &self.table
    }

    pub fn as_lazy_mut(&mut self) -> &mut LazyTable {
        &mut self.table
    }

    pub fn into_plain(self) -> LazyTable {
        self.table
    }

    // ============================================================================================
    // geometry columns
    // ============================================================================================

    /// names of the geometry columns, in column order
    pub fn geometry_columns(&self) -> SqlResult<Vec<String>> {
        let catalog = self.table.catalog()?;
        Ok(catalog
            .geometry_indices()
            .into_iter()
            .filter_map(|i| catalog.column(i).map(|c| c.name.clone()))
            .collect())
    }

    pub fn first_geometry_index(&self) -> SqlResult<usize> {
        self.table.ensure_open()?;
        Ok(self.first_geometry)
    }

    /// geometry of the first geometry column on the current row
    pub fn get_default_geometry(&self) -> SqlResult<Option<Geometry>> {
        self.table.get_geometry(self.first_geometry)
    }

    /// resolved geometry column: (quoted name, catalog entry)
    fn geometry_column<C: ColumnSelector>(&self, column: C) -> SqlResult<(String, GeometryColumn)> {
        let catalog = self.table.catalog()?;
        let idx = column.resolve(catalog)?;
        let col = catalog
            .column(idx)
            .ok_or_else(|| SqlError::ColumnNotFound(idx.to_string()))?;
        if !col.is_geometry() {
            return Err(SqlError::new_type_mismatch_error(format!(
                "column {} is not a geometry column",
                col.name
            )));
        }
        let entry = self
            .table
            .geometry()
            .iter()
            .find(|g| g.name.eq_ignore_ascii_case(&col.name))
            .cloned()
            .unwrap_or_else(|| GeometryColumn::untyped(col.name.as_str()));
        Ok((quote(&col.name), entry))
    }

    async fn fetch_all(&self, sql: &str) -> SqlResult<Vec<Vec<Value>>> {
        self.table.source().adapter().fetch_all(sql).await
    }

    /// first non-null geometry of the column, decoded client-side
    async fn first_geometry_value(&self, column: &str) -> SqlResult<Option<Geometry>> {
        let sql = format!(
            "SELECT {column} FROM {} AS t WHERE {column} IS NOT NULL LIMIT 1",
            subquery(self.table.sql())
        );
        let rows = self.table.source().adapter().fetch_rows(&sql).await?;
        match rows.first() {
            Some(r) => match r.value(0, &ValueType::Geometry)? {
                Value::Geometry(g) => Ok(Some(g)),
                _ => Ok(None),
            },
            None => Ok(None),
        }
    }

    /// Catalog type when known; otherwise the distinct types found by the server, several of
    /// them giving `GeometryType::Geometry`.
    pub async fn geometry_type<C: ColumnSelector>(&self, column: C) -> SqlResult<GeometryType> {
        let (name, entry) = self.geometry_column(column)?;
        if entry.geometry_type != GeometryType::Geometry {
            return Ok(entry.geometry_type);
        }

        let sql = format!(
            "SELECT DISTINCT GeometryType({name}) FROM {} AS t WHERE {name} IS NOT NULL",
            subquery(self.table.sql())
        );
        match self.fetch_all(&sql).await {
            Ok(rows) => {
                let types = rows
                    .into_iter()
                    .filter_map(|r| r.into_iter().next())
                    .map(|v| GeometryType::from_name(&v.to_string()))
                    .unique()
                    .collect::<Vec<_>>();
                match types.as_slice() {
                    [t] => Ok(*t),
                    _ => Ok(GeometryType::Geometry),
                }
            }
            Err(e) => {
                debug!("no server geometry type for {}: {}", name, e);
                Ok(self
                    .first_geometry_value(&name)
                    .await?
                    .map(|g| g.geometry_type())
                    .unwrap_or(GeometryType::Geometry))
            }
        }
    }

    /// type of every geometry column, in column order
    pub async fn geometry_types(&self) -> SqlResult<Vec<(String, GeometryType)>> {
        let mut res = vec![];
        for name in self.geometry_columns()? {
            let t = self.geometry_type(name.as_str()).await?;
            res.push((name, t));
        }
        Ok(res)
    }

    /// Catalog SRID when known, else the SRID of the first non-null geometry.
    pub async fn srid<C: ColumnSelector>(&self, column: C) -> SqlResult<Option<i32>> {
        let (name, entry) = self.geometry_column(column)?;
        if entry.srid.is_some() {
            return Ok(entry.srid);
        }

        let function = match self.table.db_type() {
            DbType::Postgres => "ST_SRID",
            DbType::Sqlite => "SRID",
        };
        let sql = format!(
            "SELECT {function}({name}) FROM {} AS t WHERE {name} IS NOT NULL LIMIT 1",
            subquery(self.table.sql())
        );
        match self.fetch_all(&sql).await {
            Ok(rows) => Ok(first_value(rows)
                .and_then(|v| v.to_i64())
                .and_then(|v| i32::try_from(v).ok())
                .filter(|v| *v > 0)),
            Err(e) => {
                debug!("no server SRID for {}: {}", name, e);
                Ok(self
                    .first_geometry_value(&name)
                    .await?
                    .and_then(|g| g.srid()))
            }
        }
    }

    pub async fn srid_default(&self) -> SqlResult<Option<i32>> {
        self.srid(self.first_geometry).await
    }

    /// Bounding box of the column, `None` for an empty table.
    pub async fn extent<C: ColumnSelector>(&self, column: C) -> SqlResult<Option<Rect<f64>>> {
        let (name, _) = self.geometry_column(column)?;
        let sql = match self.table.db_type() {
            DbType::Postgres => format!(
                "SELECT ST_XMin(e), ST_YMin(e), ST_XMax(e), ST_YMax(e) \
                 FROM (SELECT ST_Extent({name}) AS e FROM {} AS t) AS x",
                subquery(self.table.sql())
            ),
            DbType::Sqlite => format!(
                "SELECT MbrMinX(e), MbrMinY(e), MbrMaxX(e), MbrMaxY(e) \
                 FROM (SELECT Extent({name}) AS e FROM {} AS t) AS x",
                subquery(self.table.sql())
            ),
        };
        let rows = self.fetch_all(&sql).await?;
        Ok(rows.into_iter().next().and_then(rect_of))
    }

    /// Planner estimate of the first geometry column's extent for named PostGIS tables, the
    /// exact extent otherwise.
    pub async fn estimated_extent(&self) -> SqlResult<Option<Rect<f64>>> {
        let (_, entry) = self.geometry_column(self.first_geometry)?;
        if let (DbType::Postgres, Some(location)) = (self.table.db_type(), self.table.location()) {
            let literal = |s: &str| format!("'{}'", s.replace('\'', "''"));
            let args = location
                .schema()
                .into_iter()
                .chain([location.table(), entry.name.as_str()])
                .map(literal)
                .join(", ");
            let sql = format!(
                "SELECT ST_XMin(e), ST_YMin(e), ST_XMax(e), ST_YMax(e) \
                 FROM (SELECT ST_EstimatedExtent({args}) AS e) AS x"
            );
            match self.fetch_all(&sql).await {
                Ok(rows) => {
                    if let Some(rect) = rows.into_iter().next().and_then(rect_of) {
                        return Ok(Some(rect));
                    }
                }
                Err(e) => debug!("no estimated extent for {}: {}", location, e),
            }
        }
        self.extent(self.first_geometry).await
    }

    /// Row count per geometry type, computed by the server.
    pub async fn geometry_type_histogram<C: ColumnSelector>(
        &self,
        column: C,
    ) -> SqlResult<BTreeMap<GeometryType, u64>> {
        let (name, _) = self.geometry_column(column)?;
        let sql = format!(
            "SELECT GeometryType({name}), COUNT(*) FROM {} AS t \
             WHERE {name} IS NOT NULL GROUP BY GeometryType({name})",
            subquery(self.table.sql())
        );
        let mut histogram = BTreeMap::new();
        for row in self.fetch_all(&sql).await? {
            let mut cells = row.into_iter();
            let (Some(t), Some(n)) = (cells.next(), cells.next()) else {
                continue;
            };
            let count = n.to_i64().unwrap_or_default().max(0) as u64;
            *histogram
                .entry(GeometryType::from_name(&t.to_string()))
                .or_insert(0) += count;
        }
        Ok(histogram)
    }

    /// Table summary with resolved geometry types and SRIDs; the extent is left out when the
    /// server cannot compute it.
    pub async fn spatial_summary(&mut self) -> SqlResult<SpatialSummary> {
        let summary = self.table.summary().await?;
        let mut geometry_columns = vec![];
        for name in self.geometry_columns()? {
            let geometry_type = self.geometry_type(name.as_str()).await?;
            let srid = self.srid(name.as_str()).await?;
            geometry_columns.push(GeometryColumn::new(name, geometry_type, srid));
        }
        let extent = self.extent(self.first_geometry).await.unwrap_or_else(|e| {
            debug!("no extent for {}: {}", self.table.name(), e);
            None
        });

        Ok(SpatialSummary {
            summary,
            geometry_columns,
            extent,
        })
    }

    /// Same rows with every geometry column transformed to `srid`.
    pub async fn reproject(&self, srid: i32) -> SqlResult<SpatialTable> {
        let catalog = self.table.catalog()?;
        let function = match self.table.db_type() {
            DbType::Postgres => "ST_Transform",
            DbType::Sqlite => "Transform",
        };
        let select = catalog
            .columns()
            .iter()
            .map(|c| {
                let name = quote(&c.name);
                if c.is_geometry() {
                    format!("{function}({name}, {srid}) AS {name}")
                } else {
                    name
                }
            })
            .join(", ");
        let sql = format!("SELECT {} FROM {} AS t", select, subquery(self.table.sql()));
        let geometry = self
            .table
            .geometry()
            .iter()
            .map(|g| GeometryColumn::new(g.name.as_str(), g.geometry_type, Some(srid)))
            .collect();

        debug!("reprojected table: {}", sql);
        self.table
            .source()
            .build_table(None, sql, Some(catalog.clone()), geometry)
            .await?
            .into_spatial()
    }
}

fn rect_of(row: Vec<Value>) -> Option<Rect<f64>> {
    let c = row.iter().map(|v| v.to_f64()).collect::<Option<Vec<_>>>()?;
    match c.as_slice() {
        [xmin, ymin, xmax, ymax] => Some(Rect::new((*xmin, *ymin), (*xmax, *ymax))),
        _ => None,
    }
}

impl Deref for SpatialTable {
    type Target = LazyTable;

    fn deref(&self) -> &Self::Target {
        &self.table
    }
}

impl DerefMut for SpatialTable {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.table
    }
}
