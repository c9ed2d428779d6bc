//! Lazy table
//!
//! A relation backed by SQL text. Nothing is fetched until the table is iterated, counted or
//! rewritten; the cursor is opened on the first move.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tabgis_core::{CoreError, DbType, Decimal, Geometry, TableLocation, Value, ValueType};
use tracing::debug;

use super::{is_ordered, subquery, SpatialTable, Table, TableType};
use crate::adapter::{first_value, GeometryColumn, TableKind};
use crate::macros::delegate_row_getters;
use crate::{
    Column, ColumnCatalog, ColumnSelector, Cursor, CursorType, DataSource, Row, SqlError,
    SqlResult,
};

const DERIVED_NAME: &str = "query";

/// Location, width and height of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSummary {
    pub location: String,
    pub column_count: usize,
    pub row_count: u64,
}

impl std::fmt::Display for TableSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} columns, {} rows",
            self.location, self.column_count, self.row_count
        )
    }
}

pub struct LazyTable {
    source: DataSource,
    location: Option<TableLocation>,
    sql: String,
    catalog: Arc<ColumnCatalog>,
    geometry: Arc<Vec<GeometryColumn>>,
    kind: TableKind,
    cursor_type: CursorType,
    cursor: Option<Cursor>,
    current: Option<Row>,
    /// index of the current row, `None` before the first one
    position: Option<usize>,
    exhausted: bool,
    row_count: Option<u64>,
    closed: bool,
}

impl std::fmt::Debug for LazyTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyTable")
            .field("name", &self.name())
            .field("sql", &self.sql)
            .field("columns", &self.catalog.names())
            .field("cursor_type", &self.cursor_type)
            .field("position", &self.position)
            .finish()
    }
}

impl LazyTable {
    pub(crate) fn new(
        source: DataSource,
        location: Option<TableLocation>,
        sql: String,
        catalog: ColumnCatalog,
        geometry: Vec<GeometryColumn>,
        kind: TableKind,
        cursor_type: CursorType,
    ) -> Self {
        LazyTable {
            source,
            location,
            sql,
            catalog: Arc::new(catalog),
            geometry: Arc::new(geometry),
            kind,
            cursor_type,
            cursor: None,
            current: None,
            position: None,
            exhausted: false,
            row_count: None,
            closed: false,
        }
    }

    // ============================================================================================
    // identity
    // ============================================================================================

    pub fn source(&self) -> &DataSource {
        &self.source
    }

    /// `None` for tables built from a query
    pub fn location(&self) -> Option<&TableLocation> {
        self.location.as_ref()
    }

    pub fn name(&self) -> &str {
        self.location
            .as_ref()
            .map(|l| l.table())
            .unwrap_or(DERIVED_NAME)
    }

    /// rendered location, or the query in parentheses
    pub fn location_string(&self) -> String {
        match &self.location {
            Some(l) => l.to_sql(),
            None => format!("({})", self.sql),
        }
    }

    pub fn db_type(&self) -> DbType {
        self.source.db_type()
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn is_linked(&self) -> bool {
        self.kind.linked
    }

    pub fn is_temporary(&self) -> bool {
        self.kind.temporary
    }

    pub fn is_spatial(&self) -> bool {
        !self.geometry.is_empty()
    }

    pub fn cursor_type(&self) -> CursorType {
        self.cursor_type
    }

    pub fn is_scrollable(&self) -> bool {
        self.cursor_type.is_scrollable()
    }

    pub fn is_closed(&self) -> bool {
        self.closed || self.source.is_closed()
    }

    pub(crate) fn ensure_open(&self) -> SqlResult<()> {
        if self.closed {
            return Err(SqlError::ClosedResource("table"));
        }
        self.source.check_open()
    }

    pub(crate) fn geometry(&self) -> &[GeometryColumn] {
        &self.geometry
    }

    // ============================================================================================
    // iteration
    // ============================================================================================

    async fn cursor(&mut self) -> SqlResult<&mut Cursor> {
        if self.cursor.is_none() {
            let cursor = self
                .source
                .adapter()
                .create_cursor(&self.sql, self.cursor_type)
                .await?;
            self.cursor = Some(cursor);
        }
        self.cursor
            .as_mut()
            .ok_or(SqlError::ClosedResource("cursor"))
    }

    /// next row, without keeping it as the current one
    async fn advance(&mut self) -> SqlResult<Option<Row>> {
        self.ensure_open()?;
        if self.exhausted {
            return Ok(None);
        }
        let next = self.cursor().await?.next().await?;
        match next {
            Some(r) => {
                let index = self.position.map_or(0, |p| p + 1);
                self.position = Some(index);
                Ok(Some(Row::new(r, self.catalog.clone(), index)))
            }
            None => {
                self.exhausted = true;
                self.position = None;
                Ok(None)
            }
        }
    }

    /// Move to the next row. `false` once the rows are exhausted.
    pub async fn next(&mut self) -> SqlResult<bool> {
        self.current = self.advance().await?;
        Ok(self.current.is_some())
    }

    pub fn current(&self) -> Option<&Row> {
        self.current.as_ref()
    }

    pub(crate) fn current_row(&self) -> SqlResult<&Row> {
        self.ensure_open()?;
        self.current
            .as_ref()
            .ok_or_else(|| SqlError::new_common_error("no current row"))
    }

    /// 0-based index of the current row
    pub fn row_index(&self) -> Option<usize> {
        self.current.as_ref().map(|r| r.index())
    }

    /// Jump to the 0-based `row`. Scrollable cursors only.
    pub async fn absolute(&mut self, row: usize) -> SqlResult<bool> {
        self.ensure_open()?;
        if !self.is_scrollable() {
            return Err(SqlError::new_unsupported_error(format!(
                "absolute positioning on a {} table",
                self.cursor_type
            )));
        }
        let found = self.cursor().await?.absolute(row).await?;
        self.current = found.map(|r| Row::new(r, self.catalog.clone(), row));
        self.position = self.current.as_ref().map(|r| r.index());
        self.exhausted = self.current.is_none();
        Ok(self.current.is_some())
    }

    /// Go back before the first row. Scrollable cursors only.
    pub async fn before_first(&mut self) -> SqlResult<()> {
        self.ensure_open()?;
        if !self.is_scrollable() {
            return Err(SqlError::new_unsupported_error(format!(
                "rewinding a {} table",
                self.cursor_type
            )));
        }
        if let Some(c) = self.cursor.as_mut() {
            c.rewind().await?;
        }
        self.current = None;
        self.position = None;
        self.exhausted = false;
        Ok(())
    }

    /// The remaining rows as a stream. The first error ends the stream.
    pub fn rows(self) -> BoxStream<'static, SqlResult<Row>> {
        stream::unfold(Some(self), |state| async move {
            let mut table = state?;
            match table.advance().await {
                Ok(Some(row)) => Some((Ok(row), Some(table))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
        .boxed()
    }

    /// Call `f` on every remaining row, stopping at the first error.
    pub async fn for_each_row<F>(&mut self, mut f: F) -> SqlResult<()>
    where
        F: FnMut(&Row) -> SqlResult<()>,
    {
        while self.next().await? {
            if let Some(row) = self.current.as_ref() {
                f(row)?;
            }
        }
        Ok(())
    }

    /// Rows in order, read by `workers` concurrent `LIMIT/OFFSET` windows.
    ///
    /// Every window is a statement of its own, so the windows only line up when the query
    /// carries a top-level `ORDER BY` on a unique key. Falls back to `rows()` when the query is
    /// unordered, the source cannot serve concurrent reads or the table is not scrollable.
    pub async fn par_rows(mut self, workers: usize) -> SqlResult<BoxStream<'static, SqlResult<Row>>> {
        self.ensure_open()?;
        if workers <= 1 || !self.is_scrollable() || !self.source.adapter().supports_concurrent_reads()
        {
            debug!("sequential rows for {}", self.name());
            return Ok(self.rows());
        }
        if !is_ordered(&self.sql) {
            debug!("unordered query, sequential rows for {}", self.name());
            return Ok(self.rows());
        }

        let total = self.row_count().await?;
        let window = total.div_ceil(workers as u64).max(1);
        let offsets = (0..total).step_by(window as usize).collect::<Vec<_>>();
        debug!(
            "{} rows of {} in {} windows of {}",
            total,
            self.name(),
            offsets.len(),
            window
        );

        let source = self.source.clone();
        let sql = self.sql.clone();
        let catalog = self.catalog.clone();

        let windows = stream::iter(offsets)
            .map(move |offset| {
                let source = source.clone();
                let catalog = catalog.clone();
                let sql = format!(
                    "SELECT * FROM {} AS t LIMIT {window} OFFSET {offset}",
                    subquery(&sql)
                );
                async move {
                    source.check_open()?;
                    let rows = source.adapter().fetch_rows(&sql).await?;
                    let rows = rows
                        .into_iter()
                        .enumerate()
                        .map(|(i, r)| Row::new(r, catalog.clone(), offset as usize + i))
                        .collect::<Vec<_>>();
                    Ok::<_, SqlError>(rows)
                }
            })
            .buffered(workers)
            .flat_map(|res| {
                let items = match res {
                    Ok(rows) => rows.into_iter().map(Ok).collect::<Vec<_>>(),
                    Err(e) => vec![Err(e)],
                };
                stream::iter(items)
            });

        Ok(windows.boxed())
    }

    // ============================================================================================
    // typed access on the current row
    // ============================================================================================

    pub fn get_value<C: ColumnSelector>(&self, column: C) -> SqlResult<Value> {
        self.current_row()?.get_value(column)
    }

    pub fn get<T, C>(&self, column: C) -> SqlResult<T>
    where
        T: TryFrom<Value, Error = CoreError>,
        C: ColumnSelector,
    {
        self.current_row()?.get(column)
    }

    pub fn get_opt<T, C>(&self, column: C) -> SqlResult<Option<T>>
    where
        Option<T>: TryFrom<Value, Error = CoreError>,
        C: ColumnSelector,
    {
        self.current_row()?.get_opt(column)
    }

    delegate_row_getters!(
        get_bool -> bool,
        get_char -> char,
        get_i8 -> i8,
        get_i16 -> i16,
        get_i32 -> i32,
        get_i64 -> i64,
        get_f32 -> f32,
        get_f64 -> f64,
        get_string -> String,
        get_date -> NaiveDate,
        get_time -> NaiveTime,
        get_datetime -> NaiveDateTime,
        get_decimal -> Decimal,
        get_bytes -> Vec<u8>,
        get_geometry -> Option<Geometry>,
    );

    // ============================================================================================
    // metadata
    // ============================================================================================

    /// column catalog, without the closed check
    pub(crate) fn meta(&self) -> &ColumnCatalog {
        &self.catalog
    }

    pub fn catalog(&self) -> SqlResult<&ColumnCatalog> {
        self.ensure_open()?;
        Ok(&self.catalog)
    }

    pub fn column_count(&self) -> SqlResult<usize> {
        Ok(self.catalog()?.len())
    }

    pub fn column_names(&self) -> SqlResult<Vec<String>> {
        Ok(self.catalog()?.names())
    }

    pub fn column_types(&self) -> SqlResult<Vec<ValueType>> {
        Ok(self.catalog()?.types())
    }

    pub fn column(&self, idx: usize) -> SqlResult<Option<&Column>> {
        Ok(self.catalog()?.column(idx))
    }

    pub fn has_column(&self, name: &str) -> SqlResult<bool> {
        Ok(self.catalog()?.contains(name))
    }

    pub fn column_index(&self, name: &str) -> SqlResult<Option<usize>> {
        Ok(self.catalog()?.index_of(name))
    }

    /// `COUNT(*)` of the query, without touching the cursor
    pub(crate) async fn count_rows(&self) -> SqlResult<u64> {
        self.ensure_open()?;
        if let Some(n) = self.row_count {
            return Ok(n);
        }
        let sql = format!("SELECT COUNT(*) FROM {} AS t", subquery(&self.sql));
        let rows = self.source.adapter().fetch_all(&sql).await?;
        let count = first_value(rows)
            .and_then(|v| v.to_i64())
            .ok_or_else(|| SqlError::new_common_error(format!("no row count for {sql}")))?;
        Ok(count.max(0) as u64)
    }

    /// Number of rows, counted once on the server and cached.
    pub async fn row_count(&mut self) -> SqlResult<u64> {
        let n = self.count_rows().await?;
        self.row_count = Some(n);
        Ok(n)
    }

    pub async fn is_empty(&mut self) -> SqlResult<bool> {
        self.ensure_open()?;
        if let Some(n) = self.row_count {
            return Ok(n == 0);
        }
        let sql = format!("SELECT 1 FROM {} AS t LIMIT 1", subquery(&self.sql));
        Ok(self.source.adapter().fetch_all(&sql).await?.is_empty())
    }

    pub async fn summary(&mut self) -> SqlResult<TableSummary> {
        let row_count = self.row_count().await?;
        Ok(TableSummary {
            location: self.location_string(),
            column_count: self.catalog.len(),
            row_count,
        })
    }

    // ============================================================================================
    // lifecycle
    // ============================================================================================

    /// Release the cursor. Every later access fails with `ClosedResource`.
    pub async fn close(&mut self) -> SqlResult<()> {
        self.closed = true;
        self.current = None;
        self.position = None;
        if let Some(mut c) = self.cursor.take() {
            if !self.source.is_closed() {
                c.close().await?;
            }
        }
        Ok(())
    }

    pub fn into_spatial(self) -> SqlResult<SpatialTable> {
        if !self.is_spatial() {
            return Err(SqlError::new_type_mismatch_error(format!(
                "the table '{}' is not a spatial table",
                self.name()
            )));
        }
        Ok(SpatialTable::new(self))
    }

    pub fn as_type(self, table_type: TableType) -> SqlResult<Table> {
        match table_type {
            TableType::Plain => Ok(Table::Plain(self)),
            TableType::Spatial => self.into_spatial().map(Table::Spatial),
        }
    }
}
