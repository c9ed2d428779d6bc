//! Cursors
//!
//! Server-side positions over a result set.
//!
//! - `ForwardCursor`: a background task streams rows into a capacity-1 channel, so at most one
//!   row is buffered ahead of the reader
//! - `ScrollCursor`: a PostgreSQL `SCROLL` cursor declared inside its own transaction

use std::fmt::Display;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use sqlx::{Executor, PgPool, Postgres, Transaction};
use tokio::sync::mpsc::Receiver;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::{DriverRow, SqlError, SqlResult};

static CURSOR_SEQ: AtomicUsize = AtomicUsize::new(0);

/// Cursor kinds, from most to least capable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CursorType {
    ScrollSensitive,
    ScrollInsensitive,
    ForwardOnly,
}

impl CursorType {
    /// preference order used to pick a cursor type
    pub const PREFERENCE: [CursorType; 3] = [
        CursorType::ScrollSensitive,
        CursorType::ScrollInsensitive,
        CursorType::ForwardOnly,
    ];

    pub fn is_scrollable(&self) -> bool {
        !matches!(self, CursorType::ForwardOnly)
    }

    /// first preferred type the source supports, `ForwardOnly` when none matches
    pub fn best_of(supported: &[CursorType]) -> CursorType {
        Self::PREFERENCE
            .into_iter()
            .find(|t| supported.contains(t))
            .unwrap_or(CursorType::ForwardOnly)
    }
}

impl Display for CursorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CursorType::ScrollSensitive => write!(f, "scroll sensitive"),
            CursorType::ScrollInsensitive => write!(f, "scroll insensitive"),
            CursorType::ForwardOnly => write!(f, "forward only"),
        }
    }
}

// ================================================================================================
// ForwardCursor
// ================================================================================================

/// Rows pumped by a background task. The task holds one pooled connection until the rows are
/// drained or the cursor is closed or dropped, so at most `max_connections` forward cursors can
/// be open at once on a source; further reads wait for a connection to come back.
pub struct ForwardCursor {
    rx: Receiver<SqlResult<DriverRow>>,
    pump: JoinHandle<()>,
}

impl ForwardCursor {
    pub(crate) fn new(rx: Receiver<SqlResult<DriverRow>>, pump: JoinHandle<()>) -> Self {
        ForwardCursor { rx, pump }
    }

    pub async fn next(&mut self) -> SqlResult<Option<DriverRow>> {
        self.rx.recv().await.transpose()
    }

    pub fn close(&mut self) {
        self.rx.close();
        self.pump.abort();
    }
}

impl Drop for ForwardCursor {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

// ================================================================================================
// ScrollCursor
// ================================================================================================

pub struct ScrollCursor {
    tx: Option<Transaction<'static, Postgres>>,
    name: String,
}

impl ScrollCursor {
    pub(crate) async fn declare(pool: &PgPool, sql: &str) -> SqlResult<Self> {
        let mut tx = pool.begin().await?;
        let name = format!(
            "tabgis_cursor_{}",
            CURSOR_SEQ.fetch_add(1, Ordering::Relaxed)
        );
        let declare = format!("DECLARE {name} SCROLL CURSOR FOR {sql}");
        tx.execute(declare.as_str()).await?;
        debug!("declared cursor {}", name);

        Ok(ScrollCursor { tx: Some(tx), name })
    }

    async fn fetch(&mut self, direction: &str) -> SqlResult<Option<DriverRow>> {
        let tx = self
            .tx
            .as_mut()
            .ok_or(SqlError::ClosedResource("cursor"))?;
        let sql = format!("FETCH {} FROM {}", direction, self.name);
        let row = tx
            .fetch_optional(sqlx::query(&sql).persistent(false))
            .await?;
        Ok(row.map(DriverRow::from))
    }

    pub async fn next(&mut self) -> SqlResult<Option<DriverRow>> {
        self.fetch("NEXT").await
    }

    /// position on the 0-based `row`, `None` when it is past the end
    pub async fn absolute(&mut self, row: usize) -> SqlResult<Option<DriverRow>> {
        self.fetch(&format!("ABSOLUTE {}", row + 1)).await
    }

    /// move before the first row
    pub async fn rewind(&mut self) -> SqlResult<()> {
        let tx = self
            .tx
            .as_mut()
            .ok_or(SqlError::ClosedResource("cursor"))?;
        let sql = format!("MOVE ABSOLUTE 0 FROM {}", self.name);
        tx.execute(sql.as_str()).await?;
        Ok(())
    }

    pub async fn close(&mut self) -> SqlResult<()> {
        if let Some(mut tx) = self.tx.take() {
            let sql = format!("CLOSE {}", self.name);
            tx.execute(sql.as_str()).await?;
            tx.rollback().await?;
            debug!("closed cursor {}", self.name);
        }
        Ok(())
    }
}

// ================================================================================================
// Cursor
// ================================================================================================

pub enum Cursor {
    Forward(ForwardCursor),
    Scroll(ScrollCursor),
}

impl Cursor {
    pub fn cursor_type(&self) -> CursorType {
        match self {
            Cursor::Forward(_) => CursorType::ForwardOnly,
            Cursor::Scroll(_) => CursorType::ScrollInsensitive,
        }
    }

    pub async fn next(&mut self) -> SqlResult<Option<DriverRow>> {
        match self {
            Cursor::Forward(c) => c.next().await,
            Cursor::Scroll(c) => c.next().await,
        }
    }

    pub async fn absolute(&mut self, row: usize) -> SqlResult<Option<DriverRow>> {
        match self {
            Cursor::Forward(_) => Err(SqlError::new_unsupported_error(
                "absolute positioning on a forward only cursor",
            )),
            Cursor::Scroll(c) => c.absolute(row).await,
        }
    }

    pub async fn rewind(&mut self) -> SqlResult<()> {
        match self {
            Cursor::Forward(_) => Err(SqlError::new_unsupported_error(
                "rewinding a forward only cursor",
            )),
            Cursor::Scroll(c) => c.rewind().await,
        }
    }

    pub async fn close(&mut self) -> SqlResult<()> {
        match self {
            Cursor::Forward(c) => {
                c.close();
                Ok(())
            }
            Cursor::Scroll(c) => c.close().await,
        }
    }
}

impl From<ForwardCursor> for Cursor {
    fn from(c: ForwardCursor) -> Self {
        Cursor::Forward(c)
    }
}

impl From<ScrollCursor> for Cursor {
    fn from(c: ScrollCursor) -> Self {
        Cursor::Scroll(c)
    }
}

#[cfg(test)]
mod test_cursor {
    use super::*;

    #[test]
    fn best_cursor_type() {
        assert_eq!(
            CursorType::best_of(&[CursorType::ForwardOnly, CursorType::ScrollInsensitive]),
            CursorType::ScrollInsensitive
        );
        assert_eq!(
            CursorType::best_of(&[CursorType::ForwardOnly]),
            CursorType::ForwardOnly
        );
        assert_eq!(CursorType::best_of(&[]), CursorType::ForwardOnly);
        assert!(!CursorType::ForwardOnly.is_scrollable());
    }
}
