//! Row sources for status queries.
//!
//! Scrapers never touch the pool directly: they borrow a [`StatusSource`] for
//! the duration of one scrape and consume the rows it streams back. The pool
//! itself belongs to the process and is never closed by a scraper.

use futures::{
    StreamExt,
    future::BoxFuture,
    stream::BoxStream,
};
use sqlx::{MySqlPool, Row, mysql::MySqlRow};

/// One `(name, value)` pair returned by a `SHOW ... STATUS` style query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusRow {
    pub key: String,
    pub raw_value: Vec<u8>,
}

impl StatusRow {
    pub fn new(key: impl Into<String>, raw_value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            raw_value: raw_value.into(),
        }
    }

    /// NULL values become an empty value and are dropped by the parser.
    fn from_columns(key: String, value: Option<Vec<u8>>) -> Self {
        Self {
            key,
            raw_value: value.unwrap_or_default(),
        }
    }

    fn try_from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        // Values stay raw bytes: binary or non UTF-8 values must not fail the row.
        Ok(Self::from_columns(row.try_get(0)?, row.try_get(1)?))
    }
}

/// A read-only, two-column status query target.
pub trait StatusSource: Send + Sync {
    /// Checks that a connection can be acquired and answers.
    fn ping(&self) -> BoxFuture<'_, Result<(), sqlx::Error>>;

    /// Streams the rows of `query` in server order.
    ///
    /// Dropping the stream aborts the query; this is how deadline expiry and
    /// client disconnects reach the database.
    fn query_rows<'a>(&'a self, query: &'static str)
    -> BoxStream<'a, Result<StatusRow, sqlx::Error>>;
}

impl StatusSource for MySqlPool {
    fn ping(&self) -> BoxFuture<'_, Result<(), sqlx::Error>> {
        Box::pin(async move {
            let mut conn = self.acquire().await?;
            sqlx::Connection::ping(&mut *conn).await
        })
    }

    fn query_rows<'a>(
        &'a self,
        query: &'static str,
    ) -> BoxStream<'a, Result<StatusRow, sqlx::Error>> {
        sqlx::query(query)
            .fetch(self)
            .map(|row| row.and_then(|row| StatusRow::try_from_row(&row)))
            .boxed()
    }
}
