//! End-to-end tests for the load-and-query pipeline.
//!
//! Uses an in-memory transport that records every lifecycle call, so the
//! teardown order can be checked on success and on each failure path.

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::io::{AsyncRead, ReadBuf};

use sftpql::cli::{OutputFormat, OutputFormatter};
use sftpql::error::{Error, ParseError, QueryError, RemoteError};
use sftpql::pipeline::Pipeline;
use sftpql::query::QueryRunner;
use sftpql::remote::{RemoteFile, Session, Transport};
use sftpql::table::TabularLoader;
use sftpql::Phase;

const CUSTOMERS: &str = "\
id,name,city,state
1,Ada,Denver,CO
2,Grace,Boulder,CO
3,Linus,LA,CA
";

type Events = Arc<Mutex<Vec<&'static str>>>;

struct FakeFile {
    data: io::Cursor<Vec<u8>>,
    events: Events,
}

impl AsyncRead for FakeFile {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.data).poll_read(cx, buf)
    }
}

#[async_trait]
impl RemoteFile for FakeFile {
    async fn close(&mut self) -> Result<(), RemoteError> {
        self.events.lock().unwrap().push("file.close");
        Ok(())
    }
}

struct FakeTransport {
    content: String,
    fail_shutdown: bool,
    events: Events,
}

#[async_trait]
impl Transport for FakeTransport {
    type File = FakeFile;

    async fn open(&mut self, path: &str) -> Result<FakeFile, RemoteError> {
        self.events.lock().unwrap().push("file.open");
        match path {
            "customers.csv" => Ok(FakeFile {
                data: io::Cursor::new(self.content.clone().into_bytes()),
                events: self.events.clone(),
            }),
            "secret.csv" => Err(RemoteError::Permission { path: path.into() }),
            _ => Err(RemoteError::NotFound { path: path.into() }),
        }
    }

    async fn shutdown(&mut self) -> Result<(), RemoteError> {
        let mut events = self.events.lock().unwrap();
        events.push("sftp.close");
        events.push("channel.close");
        if self.fail_shutdown {
            return Err(RemoteError::Teardown {
                resource: "ssh channel",
                reason: "connection reset".into(),
            });
        }
        Ok(())
    }
}

fn session(content: &str, events: &Events) -> Session<FakeTransport> {
    Session::new(
        "localhost:2022",
        "stream_user",
        FakeTransport {
            content: content.to_string(),
            fail_shutdown: false,
            events: events.clone(),
        },
    )
}

fn pipeline(format: OutputFormat) -> Pipeline {
    Pipeline::new(
        "customers",
        TabularLoader::new(),
        QueryRunner::new(OutputFormatter::new(format)),
    )
}

fn events(events: &Events) -> Vec<&'static str> {
    events.lock().unwrap().clone()
}

#[tokio::test]
async fn test_full_run() {
    let log = Events::default();
    let mut output = Vec::new();

    let summary = pipeline(OutputFormat::Csv)
        .run(session(CUSTOMERS, &log), "customers.csv", &mut output)
        .await
        .unwrap();

    assert_eq!(summary.rows_loaded, 3);
    assert_eq!(summary.bytes_read, CUSTOMERS.len() as u64);
    assert_eq!(
        summary.queries,
        vec![
            ("All Records", 3),
            ("Customers by State", 2),
            ("Denver Customers", 1)
        ]
    );

    let output = String::from_utf8(output).unwrap();
    let expected = "\
── All Records ──
id,name,city,state
1,Ada,Denver,CO
2,Grace,Boulder,CO
3,Linus,LA,CA
── Customers by State ──
state,customer_count
CO,2
CA,1
── Denver Customers ──
id,name,city,state
1,Ada,Denver,CO
";
    assert_eq!(output, expected);

    assert_eq!(
        events(&log),
        vec!["file.open", "file.close", "sftp.close", "channel.close"]
    );
}

#[tokio::test]
async fn test_projection_reproduces_every_row() {
    let log = Events::default();
    let mut output = Vec::new();

    pipeline(OutputFormat::Table)
        .run(session(CUSTOMERS, &log), "customers.csv", &mut output)
        .await
        .unwrap();

    let output = String::from_utf8(output).unwrap();
    let all_records = output
        .split("── Customers by State ──")
        .next()
        .unwrap();

    let mut cursor = 0;
    for line in CUSTOMERS.lines().skip(1) {
        for value in line.split(',') {
            let found = all_records[cursor..]
                .find(value)
                .unwrap_or_else(|| panic!("{value} missing or out of order"));
            cursor += found + value.len();
        }
    }
}

#[tokio::test]
async fn test_parse_failure_still_tears_down() {
    let log = Events::default();
    let mut output = Vec::new();

    let err = pipeline(OutputFormat::Table)
        .run(
            session("state,city\nCO\nCA,LA\n", &log),
            "customers.csv",
            &mut output,
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Parse(ParseError::FieldCount { line: 2, .. })
    ));
    assert_eq!(err.phase(), Phase::Load);
    assert!(output.is_empty(), "no query may run on a failed load");
    assert_eq!(
        events(&log),
        vec!["file.open", "file.close", "sftp.close", "channel.close"]
    );
}

#[tokio::test]
async fn test_missing_column_still_tears_down() {
    let log = Events::default();
    let mut output = Vec::new();

    let err = pipeline(OutputFormat::Table)
        .run(
            session("id,town,state\n1,Denver,CO\n", &log),
            "customers.csv",
            &mut output,
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Query(QueryError::ColumnNotFound { ref column, .. }) if column == "city"
    ));
    assert_eq!(err.phase(), Phase::Query);
    assert_eq!(
        events(&log),
        vec!["file.open", "file.close", "sftp.close", "channel.close"]
    );
}

#[tokio::test]
async fn test_open_failures_close_session() {
    for (path, phase) in [("orders.csv", Phase::Open), ("secret.csv", Phase::Open)] {
        let log = Events::default();
        let mut output = Vec::new();

        let err = pipeline(OutputFormat::Table)
            .run(session(CUSTOMERS, &log), path, &mut output)
            .await
            .unwrap_err();

        match path {
            "orders.csv" => assert!(matches!(err, Error::Remote(RemoteError::NotFound { .. }))),
            _ => assert!(matches!(err, Error::Remote(RemoteError::Permission { .. }))),
        }
        assert_eq!(err.phase(), phase);
        assert_eq!(events(&log), vec!["file.open", "sftp.close", "channel.close"]);
    }
}

#[tokio::test]
async fn test_teardown_failure_after_success_keeps_results() {
    let log = Events::default();
    let mut output = Vec::new();

    let session = Session::new(
        "localhost:2022",
        "stream_user",
        FakeTransport {
            content: CUSTOMERS.to_string(),
            fail_shutdown: true,
            events: log.clone(),
        },
    );

    let summary = pipeline(OutputFormat::Csv)
        .run(session, "customers.csv", &mut output)
        .await
        .unwrap();

    assert_eq!(summary.queries.len(), 3);
    assert!(String::from_utf8(output)
        .unwrap()
        .contains("── Denver Customers ──"));
    assert_eq!(
        events(&log),
        vec!["file.open", "file.close", "sftp.close", "channel.close"]
    );
}

#[tokio::test]
async fn test_teardown_failure_does_not_mask_load_error() {
    let log = Events::default();
    let mut output = Vec::new();

    let session = Session::new(
        "localhost:2022",
        "stream_user",
        FakeTransport {
            content: String::new(),
            fail_shutdown: true,
            events: log.clone(),
        },
    );

    let err = pipeline(OutputFormat::Csv)
        .run(session, "customers.csv", &mut output)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Parse(ParseError::MissingHeader)));
    assert_eq!(
        events(&log),
        vec!["file.open", "file.close", "sftp.close", "channel.close"]
    );
}
