//! Sqlite table test
//!
//! test case:
//! 1. table metadata
//! 1. typed access on the current row
//! 1. typed access over every row of a nine-type table
//! 1. streams and closures over the rows
//! 1. closing tables and sources
//! 1. closed cursors hand their connection back
//! 1. absent tables

use chrono::{NaiveDate, NaiveDateTime};
use futures::StreamExt;
use rust_decimal::Decimal;
use tabgis::*;
use tracing_subscriber::EnvFilter;

const TOTO: &str = r#"
CREATE TABLE toto (
    id INTEGER,
    name VARCHAR(20),
    flag BOOLEAN,
    small SMALLINT,
    ratio DOUBLE,
    price DECIMAL(10, 2),
    day DATE,
    stamp TIMESTAMP,
    data BLOB
);
INSERT INTO toto VALUES
    (1, 'a', 1, 10, 0.5, 12.5, '2020-01-01', '2020-01-01 10:00:00', X'01'),
    (2, 'b', 0, 20, 1.5, 3.25, '2020-01-02', '2020-01-02 11:30:00', X'0203'),
    (3, 'c', 1, 30, 2.5, 0, '2020-01-03', '2020-01-03 12:00:00', NULL),
    (4, NULL, 0, 40, 3.5, 7, '2020-01-04', '2020-01-04 13:00:00', NULL),
    (5, 'e', 1, 50, NULL, 1.75, NULL, NULL, X'FF');
"#;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn source() -> TabgisResult<DataSource> {
    init_tracing();
    let ds = DataSource::open(DbType::Sqlite, &DataSourceConfig::memory()).await?;
    ds.execute(TOTO).await?;
    Ok(ds)
}

#[tokio::test]
async fn table_metadata() -> TabgisResult<()> {
    let ds = source().await?;
    let mut t = ds.get_table("toto").await.expect("toto exists");

    assert_eq!(t.table_type(), TableType::Plain);
    assert!(!t.is_spatial());
    assert!(!t.is_linked());
    assert!(!t.is_temporary());
    assert_eq!(t.cursor_type(), CursorType::ForwardOnly);
    assert!(!t.is_scrollable());

    assert_eq!(t.column_count()?, 9);
    assert_eq!(
        t.column_names()?,
        vec!["id", "name", "flag", "small", "ratio", "price", "day", "stamp", "data"]
    );
    assert_eq!(
        t.column_types()?,
        vec![
            ValueType::I64,
            ValueType::String,
            ValueType::Bool,
            ValueType::I16,
            ValueType::F64,
            ValueType::Decimal,
            ValueType::Date,
            ValueType::DateTime,
            ValueType::Bytes,
        ]
    );
    assert!(t.has_column("PRICE")?);
    assert_eq!(t.column_index("day")?, Some(6));
    assert_eq!(t.column(1)?.map(|c| c.type_name.as_str()), Some("VARCHAR(20)"));

    assert_eq!(t.row_count().await?, 5);
    assert!(!t.is_empty().await?);
    let summary = t.summary().await?;
    assert_eq!(summary.column_count, 9);
    assert_eq!(summary.row_count, 5);
    assert!(summary.to_string().ends_with("9 columns, 5 rows"));

    Ok(())
}

#[tokio::test]
async fn typed_access() -> TabgisResult<()> {
    let ds = source().await?;
    let mut t = ds.get_table("toto").await.expect("toto exists");
    assert!(t.current().is_none());
    assert_eq!(t.row_index(), None);

    assert!(t.next().await?);
    assert_eq!(t.row_index(), Some(0));
    assert_eq!(t.get_i32(0)?, 1);
    assert_eq!(t.get_i64("ID")?, 1);
    assert_eq!(t.get_string("name")?, "a");
    assert_eq!(t.get_char("name")?, 'a');
    assert!(t.get_bool("flag")?);
    assert_eq!(t.get_i16("small")?, 10);
    assert_eq!(t.get_i8("small")?, 10);
    assert_eq!(t.get_f64("ratio")?, 0.5);
    assert_eq!(t.get_decimal("price")?, Decimal::new(125, 1));
    assert_eq!(
        t.get_date("day")?,
        NaiveDate::from_ymd_opt(2020, 1, 1).expect("valid date")
    );
    assert_eq!(
        t.get_datetime("stamp")?,
        NaiveDateTime::parse_from_str("2020-01-01 10:00:00", "%Y-%m-%d %H:%M:%S")
            .expect("valid datetime")
    );
    assert_eq!(t.get_bytes("data")?, vec![1u8]);
    assert_eq!(t.get::<String, _>(1)?, "a");
    assert!(matches!(
        t.get_i32("nope"),
        Err(SqlError::ColumnNotFound(_))
    ));
    assert!(matches!(
        t.get_i32("name"),
        Err(SqlError::TypeConversion { .. })
    ));

    let row = t.current().expect("current row");
    assert_eq!(row.index(), 0);
    assert_eq!(row.len(), 9);
    assert_eq!(row.get_value("small")?, Value::I16(10));

    // forward to the row with a null name
    assert!(t.next().await?);
    assert!(t.next().await?);
    assert!(t.next().await?);
    assert_eq!(t.row_index(), Some(3));
    assert_eq!(t.get_value("name")?, Value::Null);
    assert_eq!(t.get_opt::<String, _>("name")?, None);
    assert!(matches!(
        t.get_string("name"),
        Err(SqlError::TypeConversion { .. })
    ));

    assert!(t.next().await?);
    assert_eq!(t.get_opt::<f64, _>("ratio")?, None);
    assert_eq!(t.get_bytes("data")?, vec![255u8]);

    assert!(!t.next().await?);
    assert_eq!(t.row_index(), None);
    assert!(!t.next().await?);

    Ok(())
}

const TYPED: &str = r#"
CREATE TABLE typed (
    col1 INT,
    col2 VARCHAR(10),
    col3 BOOLEAN,
    col4 CHAR(1),
    col5 TINYINT,
    col6 SMALLINT,
    col7 BIGINT,
    col8 REAL,
    col9 DOUBLE
);
INSERT INTO typed VALUES
    (0, 'val0', TRUE, '0', 0, 0, 0, 0.0, 0.0),
    (1, 'val1', TRUE, '1', 1, 1, 1, 1.0, 1.0),
    (2, 'val2', TRUE, '2', 2, 2, 2, 2.0, 2.0),
    (3, 'val3', TRUE, '3', 3, 3, 3, 3.0, 3.0),
    (4, 'val4', TRUE, '4', 4, 4, 4, 4.0, 4.0);
"#;

#[tokio::test]
async fn typed_access_on_every_row() -> TabgisResult<()> {
    let ds = source().await?;
    ds.execute(TYPED).await?;
    let mut t = ds.get_table("typed").await.expect("typed exists");

    assert_eq!(
        t.column_types()?,
        vec![
            ValueType::I32,
            ValueType::String,
            ValueType::Bool,
            ValueType::String,
            ValueType::I8,
            ValueType::I16,
            ValueType::I64,
            ValueType::F64,
            ValueType::F64,
        ]
    );

    let mut rows = 0;
    while t.next().await? {
        let i = t.get_i32("col1")?;
        assert_eq!(t.row_index(), Some(i as usize));

        // declared types
        assert_eq!(t.get_string("col2")?, format!("val{i}"));
        assert!(t.get_bool("col3")?);
        assert_eq!(t.get_char("col4")?, char::from_digit(i as u32, 10).expect("digit"));
        assert_eq!(t.get_i8("col5")?, i as i8);
        assert_eq!(t.get_i16("col6")?, i as i16);
        assert_eq!(t.get_i64("col7")?, i as i64);
        assert_eq!(t.get_f32("col8")?, i as f32);
        assert_eq!(t.get_f64("col9")?, i as f64);
        assert_eq!(t.get_value("col5")?, Value::I8(i as i8));

        // across types
        assert_eq!(t.get_i64("col1")?, i as i64);
        assert_eq!(t.get_string("col1")?, i.to_string());
        assert_eq!(t.get_i32("col4")?, i);
        assert_eq!(t.get_i16("col5")?, i as i16);
        assert_eq!(t.get_f64("col7")?, i as f64);
        assert_eq!(t.get_i32("col9")?, i);
        assert_eq!(t.get_decimal("col8")?, Decimal::from(i));
        assert!(matches!(
            t.get_char("col2"),
            Err(SqlError::TypeConversion { .. })
        ));

        rows += 1;
    }
    assert_eq!(rows, 5);

    Ok(())
}

#[tokio::test]
async fn trailing_line_comments() -> TabgisResult<()> {
    let ds = source().await?;
    let mut t = ds
        .query("SELECT id, small FROM toto -- every row")
        .await?;
    assert_eq!(t.row_count().await?, 5);
    assert!(!t.is_empty().await?);

    let mut filtered = t.filter("small > 20").await?;
    assert_eq!(filtered.row_count().await?, 3);
    let mut limited = t.limit(2).await?;
    assert_eq!(limited.row_count().await?, 2);

    Ok(())
}

#[tokio::test]
async fn forward_only_positioning() -> TabgisResult<()> {
    let ds = source().await?;
    let mut t = ds.get_table("toto").await.expect("toto exists");

    assert!(matches!(t.absolute(2).await, Err(SqlError::Unsupported(_))));
    assert!(matches!(t.before_first().await, Err(SqlError::Unsupported(_))));

    Ok(())
}

#[tokio::test]
async fn row_streams() -> TabgisResult<()> {
    let ds = source().await?;

    let t = ds.get_table("toto").await.expect("toto exists").into_lazy();
    let ids = t
        .rows()
        .map(|r| r.and_then(|r| r.get_i64("id")))
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect::<SqlResult<Vec<_>>>()?;
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);

    let mut t = ds.get_table("toto").await.expect("toto exists");
    let mut total = 0;
    t.for_each_row(|r| {
        total += r.get_i32("small")?;
        Ok(())
    })
    .await?;
    assert_eq!(total, 150);

    // no concurrent reads on sqlite: the rows come sequentially
    let t = ds.get_table("toto").await.expect("toto exists").into_lazy();
    let rows = t.par_rows(4).await?.collect::<Vec<_>>().await;
    assert_eq!(rows.len(), 5);
    let indexes = rows
        .into_iter()
        .map(|r| r.map(|r| r.index()))
        .collect::<SqlResult<Vec<_>>>()?;
    assert_eq!(indexes, vec![0, 1, 2, 3, 4]);

    Ok(())
}

#[tokio::test]
async fn closed_tables() -> TabgisResult<()> {
    let ds = source().await?;

    let mut t = ds.get_table("toto").await.expect("toto exists");
    assert!(t.next().await?);
    t.close().await?;
    assert!(t.is_closed());
    assert!(matches!(t.next().await, Err(SqlError::ClosedResource(_))));
    assert!(matches!(t.get_value(0), Err(SqlError::ClosedResource(_))));
    assert!(matches!(
        t.columns(["id"]).await,
        Err(SqlError::ClosedResource(_))
    ));
    // metadata is not served from the cache once closed
    assert!(matches!(t.catalog(), Err(SqlError::ClosedResource(_))));
    assert!(matches!(t.column_count(), Err(SqlError::ClosedResource(_))));
    assert!(matches!(t.column_names(), Err(SqlError::ClosedResource(_))));
    assert!(matches!(t.column_types(), Err(SqlError::ClosedResource(_))));
    assert!(matches!(t.column(0), Err(SqlError::ClosedResource(_))));
    assert!(matches!(t.has_column("id"), Err(SqlError::ClosedResource(_))));
    assert!(matches!(t.column_index("id"), Err(SqlError::ClosedResource(_))));
    assert!(matches!(t.summary().await, Err(SqlError::ClosedResource(_))));

    let mut other = ds.get_table("toto").await.expect("toto exists");
    ds.close().await;
    assert!(other.is_closed());
    assert!(matches!(other.next().await, Err(SqlError::ClosedResource(_))));
    assert!(matches!(other.row_count().await, Err(SqlError::ClosedResource(_))));
    assert!(matches!(other.column_names(), Err(SqlError::ClosedResource(_))));

    Ok(())
}

#[tokio::test]
async fn closed_cursors_release_their_connection() -> TabgisResult<()> {
    init_tracing();
    let config = DataSourceConfig::memory().max_connections(1);
    let ds = DataSource::open(DbType::Sqlite, &config).await?;
    ds.execute(TOTO).await?;

    // each open forward cursor holds the only pooled connection
    for _ in 0..3 {
        let mut t = ds.try_get_table("toto").await?;
        assert!(t.next().await?);
        t.close().await?;
    }

    let mut t = ds.try_get_table("toto").await?;
    let mut n = 0;
    while t.next().await? {
        n += 1;
    }
    assert_eq!(n, 5);

    ds.close().await;
    Ok(())
}

#[tokio::test]
async fn absent_tables() -> TabgisResult<()> {
    let ds = source().await?;

    assert!(ds.has_table("toto").await);
    assert!(ds.has_table("main.toto").await);
    assert!(!ds.has_table("titi").await);
    assert!(ds.get_table("titi").await.is_none());
    assert!(matches!(
        ds.try_get_table("titi").await,
        Err(SqlError::TableNotFound(_))
    ));
    assert!(ds.get_spatial_table("toto").await.is_none());
    assert!(ds.get_spatial_table("titi").await.is_none());

    // sqlite names stop at schema.table
    assert!(!ds.has_table("other.main.toto").await);
    assert!(ds.get_table("other.main.toto").await.is_none());
    assert!(matches!(
        ds.try_get_table("other.main.toto").await,
        Err(SqlError::Unsupported(_))
    ));

    // subquery literals are a PostgreSQL feature
    assert!(matches!(
        ds.try_get_table("(SELECT * FROM toto)").await,
        Err(SqlError::Unsupported(_))
    ));

    Ok(())
}
