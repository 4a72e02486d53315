//! The connect, stream, load, query and teardown sequence.
//!
//! Every resource acquired here is released on every exit path: the stream is
//! closed before the session, and the session (which closes the channel) is
//! closed even when opening, loading or querying failed. Teardown is best
//! effort: its failures are logged and never replace the outcome of the work,
//! so a run that rendered all three queries still succeeds.

use std::io::Write;

use tracing::{info, warn};

use crate::cli::OutputFormatter;
use crate::config::Settings;
use crate::error::{RemoteError, Result};
use crate::query::{QueryEngine, QueryRunner};
use crate::remote::{self, RemoteFile, RemoteStream, Session, Transport};
use crate::table::TabularLoader;

/// What a successful run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub rows_loaded: usize,
    pub bytes_read: u64,
    /// `(label, result rows)` per query, in execution order
    pub queries: Vec<(&'static str, usize)>,
}

/// Load-and-query plan for one remote file.
pub struct Pipeline {
    table_name: String,
    loader: TabularLoader,
    runner: QueryRunner,
}

impl Pipeline {
    pub fn new(table_name: impl Into<String>, loader: TabularLoader, runner: QueryRunner) -> Self {
        Self {
            table_name: table_name.into(),
            loader,
            runner,
        }
    }

    /// Pipeline for resolved settings, rendering with `formatter`.
    pub fn from_settings(settings: &Settings, formatter: OutputFormatter) -> Self {
        Self::new(
            settings.table_name.clone(),
            TabularLoader::new().with_delimiter(settings.delimiter),
            QueryRunner::new(formatter),
        )
    }

    /// Stream `remote_path` from `session`, query it, and close the session.
    ///
    /// The session is consumed: it is always closed before this returns.
    pub async fn run<T, W>(
        &self,
        mut session: Session<T>,
        remote_path: &str,
        writer: &mut W,
    ) -> Result<RunSummary>
    where
        T: Transport,
        W: Write,
    {
        let outcome = self.stream_and_query(&mut session, remote_path, writer).await;
        let closed = session.close().await;
        let summary = settle(outcome, closed)?;

        info!(endpoint = %session.endpoint(), "all connections closed");
        Ok(summary)
    }

    async fn stream_and_query<T, W>(
        &self,
        session: &mut Session<T>,
        remote_path: &str,
        writer: &mut W,
    ) -> Result<RunSummary>
    where
        T: Transport,
        W: Write,
    {
        let mut stream = session.open_file(remote_path).await?;
        info!(
            endpoint = %session.endpoint(),
            user = session.username(),
            path = stream.path(),
            "connected and stream is open"
        );

        let outcome = self.load_and_query(&mut stream, writer).await;
        let bytes_read = stream.bytes_read();
        let closed = stream.close().await;

        let mut summary = settle(outcome, closed)?;
        summary.bytes_read = bytes_read;
        Ok(summary)
    }

    async fn load_and_query<F, W>(
        &self,
        stream: &mut RemoteStream<F>,
        writer: &mut W,
    ) -> Result<RunSummary>
    where
        F: RemoteFile,
        W: Write,
    {
        let table = self.loader.load(stream).await?;
        info!(rows = table.num_rows(), "rows loaded into memory");

        let engine = QueryEngine::new(&self.table_name, &table)?;
        let queries = self.runner.run(&engine, writer).await?;

        Ok(RunSummary {
            rows_loaded: table.num_rows(),
            bytes_read: 0,
            queries,
        })
    }
}

/// Combine the outcome of some work with the outcome of releasing its resource.
fn settle<T>(outcome: Result<T>, teardown: std::result::Result<(), RemoteError>) -> Result<T> {
    if let Err(err) = teardown {
        warn!(error = %err, work_failed = outcome.is_err(), "teardown failed");
    }
    outcome
}

/// Connect with `settings` and run the standard battery, writing to `writer`.
pub async fn run<W: Write>(
    settings: &Settings,
    formatter: OutputFormatter,
    writer: &mut W,
) -> Result<RunSummary> {
    let session = remote::connect(&settings.connection, settings.timeout).await?;
    Pipeline::from_settings(settings, formatter)
        .run(session, &settings.connection.remote_path, writer)
        .await
}
