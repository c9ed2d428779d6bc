//! Table algebra
//!
//! Projection, drop, merge, union and the where/option stage, all as SQL rewrites returning a
//! new table on the left operand's data source. Operands living on another data source are
//! fetched and inlined as a `VALUES` list.

use itertools::Itertools;
use tabgis_core::{quote, DbType, Value, ValueType};
use tracing::{debug, warn};

use crate::adapter::types::pg_cast_type;
use crate::adapter::GeometryColumn;
use crate::table::subquery;
use crate::{Column, ColumnCatalog, ColumnSelector, LazyTable, Order, SqlError, SqlResult, Table};

const ROW_NUMBER: &str = "tabgis_rn";

impl LazyTable {
    /// new derived table on this table's source, with a known column catalog
    async fn derive(
        &self,
        sql: String,
        catalog: ColumnCatalog,
        geometry: Vec<GeometryColumn>,
    ) -> SqlResult<Table> {
        debug!("derived table: {}", sql);
        self.source()
            .build_table(None, sql, Some(catalog), geometry)
            .await
    }

    fn geometry_of(&self, columns: &[Column]) -> Vec<GeometryColumn> {
        self.geometry()
            .iter()
            .filter(|g| columns.iter().any(|c| c.name.eq_ignore_ascii_case(&g.name)))
            .cloned()
            .collect()
    }

    async fn project(&self, indices: &[usize]) -> SqlResult<Table> {
        let columns = indices
            .iter()
            .filter_map(|i| self.meta().column(*i).cloned())
            .collect::<Vec<_>>();
        if columns.is_empty() {
            return Err(SqlError::new_common_error(format!(
                "no column left in {}",
                self.name()
            )));
        }
        let sql = format!(
            "SELECT {} FROM {} AS t",
            columns.iter().map(|c| quote(&c.name)).join(", "),
            subquery(self.sql())
        );
        let geometry = self.geometry_of(&columns);
        self.derive(sql, ColumnCatalog::new(columns), geometry).await
    }

    /// Keep only the given columns, in the given order.
    pub async fn columns<I, T>(&self, names: I) -> SqlResult<Table>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        self.ensure_open()?;
        let indices = names
            .into_iter()
            .map(|n| n.as_ref().resolve(self.meta()))
            .collect::<SqlResult<Vec<_>>>()?;
        self.project(&indices).await
    }

    /// Every column but the given ones.
    pub async fn drop<I, T>(&self, names: I) -> SqlResult<Table>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        self.ensure_open()?;
        let dropped = names
            .into_iter()
            .map(|n| n.as_ref().resolve(self.meta()))
            .collect::<SqlResult<Vec<_>>>()?;
        let kept = (0..self.meta().len())
            .filter(|i| !dropped.contains(i))
            .collect::<Vec<_>>();
        self.project(&kept).await
    }

    /// Side-by-side join on row position. Column names must be unique across the operands;
    /// the result has as many rows as the shortest operand.
    pub async fn merge(&self, others: &[&LazyTable]) -> SqlResult<Table> {
        self.ensure_open()?;
        let mut columns = self.meta().columns().to_vec();
        let mut geometry = self.geometry().to_vec();
        for other in others {
            other.ensure_open()?;
            for c in other.meta().columns() {
                if columns.iter().any(|x| x.name.eq_ignore_ascii_case(&c.name)) {
                    return Err(SqlError::DuplicateColumn(c.name.clone()));
                }
                columns.push(c.clone());
            }
            geometry.extend(other.geometry().iter().cloned());
        }

        let mut counts = vec![self.count_rows().await?];
        for other in others {
            counts.push(other.count_rows().await?);
        }
        if counts.iter().any(|c| *c != counts[0]) {
            warn!(
                "merging tables of {:?} rows, the result keeps {}",
                counts,
                counts.iter().min().copied().unwrap_or_default()
            );
        }

        let mut operands = vec![self.sql().to_string()];
        for other in others {
            operands.push(self.operand_sql(other).await?);
        }

        let rn = quote(ROW_NUMBER);
        let mut select = Vec::with_capacity(columns.len());
        let mut from = String::new();
        let mut offset = 0;
        for (i, sql) in operands.iter().enumerate() {
            let width = if i == 0 {
                self.meta().len()
            } else {
                others[i - 1].meta().len()
            };
            for c in &columns[offset..offset + width] {
                select.push(format!("t{}.{}", i, quote(&c.name)));
            }
            offset += width;

            let numbered = format!(
                "(SELECT ROW_NUMBER() OVER () AS {rn}, x.* FROM {} AS x) AS t{i}",
                subquery(sql)
            );
            if i == 0 {
                from = numbered;
            } else {
                from = format!("{from} JOIN {numbered} ON t0.{rn} = t{i}.{rn}");
            }
        }

        let sql = format!(
            "SELECT {} FROM {} ORDER BY t0.{}",
            select.join(", "),
            from,
            rn
        );
        self.derive(sql, ColumnCatalog::new(columns), geometry)
            .await
    }

    /// Rows of this table followed by the rows of `others`. Every operand must have the same
    /// column names and types; dynamically typed columns match any type.
    pub async fn union(&self, others: &[&LazyTable]) -> SqlResult<Table> {
        self.ensure_open()?;
        for other in others {
            other.ensure_open()?;
            self.check_union_schema(other)?;
        }

        let mut parts = vec![format!("SELECT * FROM {} AS t0", subquery(self.sql()))];
        for (i, other) in others.iter().enumerate() {
            let sql = self.operand_sql(other).await?;
            parts.push(format!("SELECT * FROM {} AS t{}", subquery(&sql), i + 1));
        }

        let sql = parts.join(" UNION ALL ");
        self.derive(sql, self.meta().clone(), self.geometry().to_vec())
            .await
    }

    fn check_union_schema(&self, other: &LazyTable) -> SqlResult<()> {
        if self.meta().len() != other.meta().len() {
            return Err(SqlError::new_type_mismatch_error(format!(
                "{} has {} columns, {} has {}",
                self.name(),
                self.meta().len(),
                other.name(),
                other.meta().len()
            )));
        }
        for (a, b) in self.meta().columns().iter().zip(other.meta().columns()) {
            if !a.name.eq_ignore_ascii_case(&b.name) {
                return Err(SqlError::new_type_mismatch_error(format!(
                    "column {} does not match column {}",
                    a.name, b.name
                )));
            }
            let dynamic = a.value_type == ValueType::Null || b.value_type == ValueType::Null;
            if !dynamic && a.value_type != b.value_type {
                return Err(SqlError::new_type_mismatch_error(format!(
                    "column {} is {} on one side and {} on the other",
                    a.name, a.value_type, b.value_type
                )));
            }
        }
        Ok(())
    }

    /// Rows satisfying a verbatim SQL condition.
    pub async fn filter(&self, condition: &str) -> SqlResult<Table> {
        self.ensure_open()?;
        let sql = format!("SELECT * FROM {} AS t WHERE {}", subquery(self.sql()), condition);
        self.derive(sql, self.meta().clone(), self.geometry().to_vec())
            .await
    }

    pub async fn order_by(&self, field: &str, order: Order) -> SqlResult<Table> {
        self.ensure_open()?;
        let sql = format!(
            "SELECT * FROM {} AS t ORDER BY {} {}",
            subquery(self.sql()),
            field,
            order
        );
        self.derive(sql, self.meta().clone(), self.geometry().to_vec())
            .await
    }

    pub async fn limit(&self, n: u64) -> SqlResult<Table> {
        self.ensure_open()?;
        let sql = format!("SELECT * FROM {} AS t LIMIT {}", subquery(self.sql()), n);
        self.derive(sql, self.meta().clone(), self.geometry().to_vec())
            .await
    }

    // ============================================================================================
    // cross-source operands
    // ============================================================================================

    /// SQL of `other` as this table's source can run it
    async fn operand_sql(&self, other: &LazyTable) -> SqlResult<String> {
        if self.source().same_source(other.source()) {
            Ok(other.sql().to_string())
        } else {
            self.materialize(other).await
        }
    }

    async fn materialize(&self, other: &LazyTable) -> SqlResult<String> {
        let rows = other.source().adapter().fetch_rows(other.sql()).await?;
        let names = other.meta().names();
        let types = other.meta().types();
        let db_type = self.db_type();
        let spatial = self.source().adapter().spatial_functions();
        debug!(
            "materializing {} rows x {} columns of {} on {}",
            rows.len(),
            names.len(),
            other.location_string(),
            db_type
        );

        if rows.is_empty() {
            let columns = names
                .iter()
                .zip(types.iter())
                .map(|(n, t)| format!("{} AS {}", literal(&Value::Null, t, db_type, spatial), quote(n)))
                .join(", ");
            return Ok(format!("SELECT {columns} WHERE 1 = 0"));
        }

        let tuples = rows
            .iter()
            .map(|r| -> SqlResult<String> {
                let values = r.values(&types)?;
                let tuple = values
                    .iter()
                    .zip(types.iter())
                    .map(|(v, t)| literal(v, t, db_type, spatial))
                    .join(", ");
                Ok(format!("({tuple})"))
            })
            .collect::<SqlResult<Vec<_>>>()?;
        let columns = names
            .iter()
            .enumerate()
            .map(|(i, n)| format!("column{} AS {}", i + 1, quote(n)))
            .join(", ");

        Ok(format!(
            "SELECT {} FROM (VALUES {}) AS v",
            columns,
            tuples.join(", ")
        ))
    }
}

fn string_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).join("")
}

fn bytes_literal(bytes: &[u8], db_type: DbType) -> String {
    match db_type {
        DbType::Sqlite => format!("X'{}'", hex(bytes)),
        DbType::Postgres => format!("decode('{}', 'hex')", hex(bytes)),
    }
}

/// SQL literal of a value. PostgreSQL literals are cast to the column type so that every row of
/// a `VALUES` list agrees on it.
pub(crate) fn literal(value: &Value, value_type: &ValueType, db_type: DbType, spatial: bool) -> String {
    let lit = match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(v) => match db_type {
            DbType::Sqlite => (*v as i32).to_string(),
            DbType::Postgres => v.to_string().to_uppercase(),
        },
        Value::I8(v) => v.to_string(),
        Value::I16(v) => v.to_string(),
        Value::I32(v) => v.to_string(),
        Value::I64(v) => v.to_string(),
        Value::F32(v) if v.is_finite() => v.to_string(),
        Value::F64(v) if v.is_finite() => v.to_string(),
        Value::F32(_) | Value::F64(_) => "NULL".to_string(),
        Value::Decimal(v) => v.to_string(),
        Value::String(v) => string_literal(v),
        Value::Date(_) | Value::Time(_) | Value::DateTime(_) => string_literal(&value.to_string()),
        Value::Bytes(v) => bytes_literal(v, db_type),
        Value::Geometry(g) => match (db_type, spatial) {
            (DbType::Sqlite, true) => format!(
                "GeomFromWKB({}, {})",
                bytes_literal(&g.to_wkb(), db_type),
                g.srid().unwrap_or(0)
            ),
            (DbType::Sqlite, false) => bytes_literal(&g.to_ewkb(), db_type),
            (DbType::Postgres, _) => {
                format!("ST_GeomFromEWKB({})", bytes_literal(&g.to_ewkb(), db_type))
            }
        },
    };

    match db_type {
        DbType::Sqlite => lit,
        DbType::Postgres => {
            let target = match value_type {
                ValueType::Null => value.value_type(),
                t => *t,
            };
            format!("CAST({} AS {})", lit, pg_cast_type(&target))
        }
    }
}

#[cfg(test)]
mod test_algebra {
    use chrono::NaiveDate;
    use tabgis_core::geo_types::Point;
    use tabgis_core::Geometry;

    use super::*;

    #[test]
    fn sqlite_literals() {
        let db = DbType::Sqlite;
        assert_eq!(literal(&Value::Null, &ValueType::I32, db, false), "NULL");
        assert_eq!(literal(&Value::Bool(true), &ValueType::Bool, db, false), "1");
        assert_eq!(
            literal(&Value::String("it's".into()), &ValueType::String, db, false),
            "'it''s'"
        );
        assert_eq!(
            literal(&Value::Bytes(vec![0, 255]), &ValueType::Bytes, db, false),
            "X'00FF'"
        );
        assert_eq!(
            literal(&Value::F64(f64::NAN), &ValueType::F64, db, false),
            "NULL"
        );
        let g = Geometry::new(Point::new(1.0, 2.0)).with_srid(4326);
        assert!(literal(&Value::Geometry(g), &ValueType::Geometry, db, true)
            .starts_with("GeomFromWKB(X'0101000000"));
    }

    #[test]
    fn postgres_literals_are_cast() {
        let db = DbType::Postgres;
        assert_eq!(
            literal(&Value::I32(3), &ValueType::I32, db, true),
            "CAST(3 AS INTEGER)"
        );
        assert_eq!(
            literal(&Value::Null, &ValueType::Date, db, true),
            "CAST(NULL AS DATE)"
        );
        let d = NaiveDate::from_ymd_opt(2020, 1, 31).unwrap();
        assert_eq!(
            literal(&Value::Date(d), &ValueType::Null, db, true),
            "CAST('2020-01-31' AS DATE)"
        );
        assert_eq!(
            literal(&Value::Bool(false), &ValueType::Bool, db, true),
            "CAST(FALSE AS BOOLEAN)"
        );
        assert_eq!(
            literal(&Value::Bytes(vec![1]), &ValueType::Bytes, db, true),
            "CAST(decode('01', 'hex') AS BYTEA)"
        );
    }
}
