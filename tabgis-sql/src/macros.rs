//! Tabgis Sql Macros

/// impl SqlTypeTagMarker for SqlTypeTag, used in `adapter/types.rs`
///
/// Equivalent to:
///
/// ```rust,ignore
/// impl SqlTypeTagMarker for SqlTypeTag<bool> {
///     fn to_str(&self) -> &str {
///         self.0
///     }
///
///     fn to_dtype(&self) -> ValueType {
///         ValueType::Bool
///     }
///
///     fn extract_value(&self, row: &PgRow, idx: usize) -> SqlResult<Value> {
///         let v: Option<bool> = row.try_get(idx)?;
///         Ok(Value::from(v))
///     }
/// }
/// ```
macro_rules! impl_sql_type_tag_marker {
    ($dtype:ty, $value_type:ident) => {
        impl SqlTypeTagMarker for SqlTypeTag<$dtype> {
            fn to_str(&self) -> &str {
                self.0
            }

            fn to_dtype(&self) -> tabgis_core::ValueType {
                tabgis_core::ValueType::$value_type
            }

            fn extract_value(
                &self,
                row: &sqlx::postgres::PgRow,
                idx: usize,
            ) -> $crate::SqlResult<tabgis_core::Value> {
                let v: Option<$dtype> = sqlx::Row::try_get(row, idx)?;
                Ok(tabgis_core::Value::from(v))
            }
        }
    };
}

/// tmap pair
macro_rules! tmap_pair {
    ($key:expr, $value:ty) => {
        ($key, Box::new(SqlTypeTag::<$value>::new($key)) as Sttm)
    };
}

pub(crate) use impl_sql_type_tag_marker;
pub(crate) use tmap_pair;

/// Spawn a task that streams the rows of `$sql` into a capacity-1 channel. used in `adapter/*.rs`
///
/// The task owns a pooled connection until the stream ends or the receiver is dropped.
macro_rules! spawn_forward_cursor {
    ($pool:expr, $sql:expr) => {{
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        let pool = $pool.clone();
        let sql: String = $sql.to_string();
        let pump = tokio::spawn(async move {
            let mut rows = sqlx::query(&sql).persistent(false).fetch(&pool);
            while let Some(row) = futures::StreamExt::next(&mut rows).await {
                let item = row
                    .map($crate::DriverRow::from)
                    .map_err($crate::SqlError::from);
                let failed = item.is_err();
                if tx.send(item).await.is_err() || failed {
                    break;
                }
            }
        });
        $crate::cursor::ForwardCursor::new(rx, pump)
    }};
}

pub(crate) use spawn_forward_cursor;

/// fetch all rows of a query as driver rows. used in `adapter/*.rs`
///
/// Equivalent to:
///
/// ```rust,ignore
/// sqlx::query(sql)
///     .persistent(false)
///     .fetch_all(pool)
///     .await?
///     .into_iter()
///     .map(DriverRow::from)
///     .collect::<Vec<_>>()
/// ```
macro_rules! fetch_rows {
    ($pool:expr, $sql:expr) => {
        sqlx::query($sql)
            .persistent(false)
            .fetch_all($pool)
            .await?
            .into_iter()
            .map($crate::DriverRow::from)
            .collect::<Vec<_>>()
    };
}

pub(crate) use fetch_rows;

/// typed getters on a row, each one a thin wrapper over `Row::get`. used in `table/row.rs`
macro_rules! impl_row_getters {
    ($($method:ident -> $ret:ty),* $(,)?) => {
        $(
            pub fn $method<C: $crate::ColumnSelector>(&self, column: C) -> $crate::SqlResult<$ret> {
                self.get::<$ret, C>(column)
            }
        )*
    };
}

/// forward row getters of the current row. used in `table/lazy.rs`
macro_rules! delegate_row_getters {
    ($($method:ident -> $ret:ty),* $(,)?) => {
        $(
            pub fn $method<C: $crate::ColumnSelector>(&self, column: C) -> $crate::SqlResult<$ret> {
                self.current_row()?.$method(column)
            }
        )*
    };
}

pub(crate) use delegate_row_getters;
pub(crate) use impl_row_getters;

/// statement macro, renders a sea-query statement for the dialect
macro_rules! statement {
    ($db_type:expr, $statement:expr) => {{
        match $db_type {
            tabgis_core::DbType::Postgres => $statement.to_string(sea_query::PostgresQueryBuilder),
            tabgis_core::DbType::Sqlite => $statement.to_string(sea_query::SqliteQueryBuilder),
        }
    }};
}

pub(crate) use statement;

/// sea query alias macro
macro_rules! alias {
    ($name:expr) => {
        sea_query::Alias::new($name)
    };
}

pub(crate) use alias;
