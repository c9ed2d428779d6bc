//! Table algebra test
//!
//! test case:
//! 1. query builder against a sqlite source
//! 1. columns & drop
//! 1. merge
//! 1. union
//! 1. filter, order and limit
//! 1. operands living on another source

use futures::StreamExt;
use tabgis::*;

const TOTO: &str = r#"
CREATE TABLE toto (id INTEGER, name VARCHAR(20), flag BOOLEAN, small SMALLINT);
INSERT INTO toto VALUES
    (1, 'a', 1, 10),
    (2, 'b', 0, 20),
    (3, 'c', 1, 30),
    (4, NULL, 0, 40),
    (5, 'e', 1, 50);
"#;

const TITI: &str = r#"
CREATE TABLE titi (id INTEGER, name TEXT);
INSERT INTO titi VALUES (10, 'x'), (11, 'it''s');
"#;

async fn source(ddl: &str) -> TabgisResult<DataSource> {
    let ds = DataSource::open(DbType::Sqlite, &DataSourceConfig::memory()).await?;
    ds.execute(ddl).await?;
    Ok(ds)
}

async fn ids(table: Table) -> SqlResult<Vec<i64>> {
    table
        .into_lazy()
        .rows()
        .map(|r| r.and_then(|r| r.get_i64(0)))
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect()
}

#[tokio::test]
async fn builder_execute() -> TabgisResult<()> {
    let ds = source(TOTO).await?;

    let builder = ds
        .select(["id", "name"])
        .from(["toto"])
        .where_("id > 1")
        .and("name IS NOT NULL")
        .order_by("id", Order::Desc)
        .limit(2);
    assert_eq!(
        builder.sql()?,
        "SELECT id, name FROM toto WHERE id > 1 AND name IS NOT NULL ORDER BY id DESC LIMIT 2"
    );
    let t = builder.execute().await?;
    assert_eq!(t.column_names()?, vec!["id", "name"]);
    assert_eq!(t.column_types()?, vec![ValueType::I64, ValueType::String]);
    assert_eq!(ids(t).await?, vec![5, 3]);

    let mut t = ds
        .select(["flag", "COUNT(*) AS n"])
        .from(["toto"])
        .group_by(["flag"])
        .order_by_asc("flag")
        .execute()
        .await?;
    assert!(t.next().await?);
    assert_eq!(t.get_i64("n")?, 2);
    assert!(t.next().await?);
    assert_eq!(t.get_i64("n")?, 3);
    assert!(!t.next().await?);

    // unbound builders run on any source
    let t = QueryBuilder::select(Vec::<String>::new())
        .from(["toto"])
        .where_("small >= 30")
        .execute_on(&ds)
        .await?;
    assert_eq!(ids(t).await?, vec![3, 4, 5]);

    Ok(())
}

#[tokio::test]
async fn columns_and_drop() -> TabgisResult<()> {
    let ds = source(TOTO).await?;
    let t = ds.get_table("toto").await.expect("toto exists");

    let mut projected = t.columns(["name", "ID"]).await?;
    assert_eq!(projected.column_names()?, vec!["name", "id"]);
    assert!(projected.location().is_none());
    assert!(projected.next().await?);
    assert_eq!(projected.get_string(0)?, "a");
    assert_eq!(projected.get_i64("id")?, 1);

    assert!(matches!(
        t.columns(["nope"]).await,
        Err(SqlError::ColumnNotFound(_))
    ));

    let dropped = t.drop(["flag", "small"]).await?;
    assert_eq!(dropped.column_names()?, vec!["id", "name"]);
    assert!(matches!(
        t.drop(["id", "name", "flag", "small"]).await,
        Err(SqlError::Common(_))
    ));
    assert!(matches!(t.drop(["nope"]).await, Err(SqlError::ColumnNotFound(_))));

    Ok(())
}

#[tokio::test]
async fn merge_tables() -> TabgisResult<()> {
    let ds = source(TOTO).await?;
    let t = ds.get_table("toto").await.expect("toto exists");

    let left = t.columns(["id"]).await?;
    let right = ds.query("SELECT name AS label, small FROM toto").await?;
    let mut merged = left.merge(&[&*right]).await?;
    assert_eq!(merged.column_names()?, vec!["id", "label", "small"]);
    assert_eq!(merged.row_count().await?, 5);
    assert!(merged.next().await?);
    assert_eq!(merged.get_i64("id")?, 1);
    assert_eq!(merged.get_string("label")?, "a");
    assert_eq!(merged.get_i32("small")?, 10);

    // the shortest operand wins
    let short = ds.query("SELECT name AS label FROM toto LIMIT 2").await?;
    let mut merged = left.merge(&[&*short]).await?;
    assert_eq!(merged.row_count().await?, 2);

    assert!(matches!(
        t.merge(&[&*left]).await,
        Err(SqlError::DuplicateColumn(_))
    ));

    Ok(())
}

#[tokio::test]
async fn union_tables() -> TabgisResult<()> {
    let ds = source(TOTO).await?;
    let t = ds.get_table("toto").await.expect("toto exists");
    let other = ds.get_table("toto").await.expect("toto exists");

    let mut all = t.union(&[&*other]).await?;
    assert_eq!(all.row_count().await?, 10);
    assert_eq!(all.column_names()?, t.column_names()?);

    let ids_only = t.columns(["id"]).await?;
    let names_only = t.columns(["name"]).await?;
    assert!(matches!(
        ids_only.union(&[&*names_only]).await,
        Err(SqlError::TypeMismatch(_))
    ));
    assert!(matches!(
        t.union(&[&*ids_only]).await,
        Err(SqlError::TypeMismatch(_))
    ));

    Ok(())
}

#[tokio::test]
async fn filter_order_limit() -> TabgisResult<()> {
    let ds = source(TOTO).await?;
    let t = ds.get_table("toto").await.expect("toto exists");

    let mut filtered = t.filter("id >= 3").await?;
    assert_eq!(filtered.row_count().await?, 3);

    let ordered = t.order_by("small", Order::Desc).await?;
    let limited = ordered.limit(2).await?;
    assert_eq!(ids(limited).await?, vec![5, 4]);

    Ok(())
}

#[tokio::test]
async fn cross_source_operands() -> TabgisResult<()> {
    let ds = source(TOTO).await?;
    let remote = source(TITI).await?;
    assert!(!ds.same_source(&remote));
    assert!(!ds.has_table("titi").await);

    let local = ds.query("SELECT id, name FROM toto").await?;
    let other = remote.get_table("titi").await.expect("titi exists");
    let mut all = local.union(&[&*other]).await?;
    assert!(all.sql().contains("VALUES"));
    assert_eq!(all.row_count().await?, 7);
    assert_eq!(ids(all).await?, vec![1, 2, 3, 4, 5, 10, 11]);

    let empty = remote.query("SELECT id, name FROM titi WHERE 1 = 0").await?;
    let mut same = local.union(&[&*empty]).await?;
    assert_eq!(same.row_count().await?, 5);

    let first = ds.query("SELECT id FROM toto LIMIT 2").await?;
    let labels = remote.query("SELECT name AS label FROM titi").await?;
    let mut merged = first.merge(&[&*labels]).await?;
    assert!(merged.next().await?);
    assert_eq!(merged.get_string("label")?, "x");
    assert!(merged.next().await?);
    assert_eq!(merged.get_i64("id")?, 2);
    assert_eq!(merged.get_string("label")?, "it's");
    assert!(!merged.next().await?);

    Ok(())
}
