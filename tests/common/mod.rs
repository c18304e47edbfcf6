#![allow(dead_code)]

use anyhow::Result;
use futures::{StreamExt, future::BoxFuture, stream::BoxStream};
use mysql_exporter::{
    collectors::{
        config::ScraperSet,
        exporter::ExporterMetrics,
        source::{StatusRow, StatusSource},
    },
    exporter::{ExporterState, router},
};
use std::{collections::HashMap, sync::Arc};
use tokio::{net::TcpListener, task::JoinHandle};

pub const GLOBAL_STATUS: &str = "SHOW GLOBAL STATUS";
pub const GLOBAL_VARIABLES: &str = "SHOW GLOBAL VARIABLES";

/// How a fake server answers one query.
#[derive(Clone)]
pub enum Answer {
    Rows(Vec<(&'static str, &'static str)>),
    Fail,
    Hang,
}

/// A MySQL stand-in answering fixed queries from memory.
#[derive(Clone, Default)]
pub struct FakeServer {
    answers: HashMap<&'static str, Answer>,
    down: bool,
}

impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn down() -> Self {
        Self {
            down: true,
            ..Self::default()
        }
    }

    pub fn answer(mut self, query: &'static str, answer: Answer) -> Self {
        self.answers.insert(query, answer);
        self
    }

    /// Typical answers from a healthy server.
    pub fn healthy() -> Self {
        Self::new()
            .answer(
                GLOBAL_STATUS,
                Answer::Rows(vec![
                    ("Com_select", "42"),
                    ("Com_insert", "7"),
                    ("Handler_read_first", "3"),
                    ("Innodb_buffer_pool_pages_free", "1024"),
                    ("Uptime", "3600"),
                    ("wsrep_local_state_uuid", "0f2b3c4d-uuid"),
                    ("Ssl_cipher", ""),
                ]),
            )
            .answer(
                GLOBAL_VARIABLES,
                Answer::Rows(vec![
                    ("max_connections", "151"),
                    ("read_only", "OFF"),
                    ("version", "8.0.36"),
                ]),
            )
    }
}

fn refused() -> sqlx::Error {
    sqlx::Error::Io(std::io::Error::new(
        std::io::ErrorKind::ConnectionRefused,
        "connection refused",
    ))
}

impl StatusSource for FakeServer {
    fn ping(&self) -> BoxFuture<'_, Result<(), sqlx::Error>> {
        let down = self.down;
        Box::pin(async move { if down { Err(refused()) } else { Ok(()) } })
    }

    fn query_rows<'a>(&'a self, query: &'static str) -> BoxStream<'a, Result<StatusRow, sqlx::Error>> {
        match self.answers.get(query) {
            Some(Answer::Rows(rows)) => futures::stream::iter(
                rows.iter()
                    .map(|(k, v)| Ok(StatusRow::new(*k, *v)))
                    .collect::<Vec<_>>(),
            )
            .boxed(),
            Some(Answer::Hang) => futures::stream::pending().boxed(),
            Some(Answer::Fail) | None => futures::stream::once(async { Err(refused()) }).boxed(),
        }
    }
}

pub fn state(source: FakeServer, scrapers: &[&str]) -> Result<ExporterState> {
    let names: Vec<String> = scrapers.iter().map(ToString::to_string).collect();

    Ok(ExporterState {
        source: Arc::new(source),
        scrapers: ScraperSet::from_names(&names)?,
        metrics: ExporterMetrics::new(env!("CARGO_PKG_VERSION"), "test")?,
        timeout_offset: 0.25,
        metrics_path: Arc::from("/metrics"),
    })
}

/// Serves the exporter on an ephemeral port, returns its base URL.
pub async fn serve(state: ExporterState) -> Result<(String, JoinHandle<()>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, router(state).into_make_service()).await;
    });

    Ok((format!("http://{addr}"), handle))
}
