//! Error types for sftpql.

use std::fmt;

use thiserror::Error;

/// Main error type for sftpql operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Error talking to the remote host
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Error turning the remote file into a table
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Error during SQL query execution
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// Invalid or incomplete configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error while draining the remote stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The pipeline phase this error belongs to.
    pub fn phase(&self) -> Phase {
        match self {
            Error::Remote(err) => err.phase(),
            Error::Parse(_) | Error::Io(_) => Phase::Load,
            Error::Query(_) => Phase::Query,
            Error::Config(_) => Phase::Config,
        }
    }
}

/// Steps of the connect, stream, load, query, teardown pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Config,
    Connect,
    Open,
    Load,
    Query,
    Teardown,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Config => "config",
            Phase::Connect => "connect",
            Phase::Open => "open",
            Phase::Load => "load",
            Phase::Query => "query",
            Phase::Teardown => "teardown",
        };
        f.write_str(name)
    }
}

/// Errors raised by the remote file session.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// Host unreachable, handshake failure or connect timeout
    #[error("Cannot connect to {endpoint}: {reason}")]
    Connection { endpoint: String, reason: String },

    /// Credentials rejected by the server
    #[error("Authentication failed for user {username}")]
    Authentication { username: String },

    /// Remote path does not exist
    #[error("Remote file not found: {path}")]
    NotFound { path: String },

    /// Remote path exists but cannot be read
    #[error("Permission denied: {path}")]
    Permission { path: String },

    /// Operation attempted on a closed session
    #[error("Session is closed")]
    SessionClosed,

    /// Any other SFTP or SSH protocol failure
    #[error("{operation} failed: {reason}")]
    Protocol { operation: &'static str, reason: String },

    /// Failure while releasing the stream, session or channel
    #[error("Teardown of {resource} failed: {reason}")]
    Teardown { resource: &'static str, reason: String },
}

impl RemoteError {
    pub fn phase(&self) -> Phase {
        match self {
            RemoteError::Connection { .. } | RemoteError::Authentication { .. } => Phase::Connect,
            RemoteError::NotFound { .. }
            | RemoteError::Permission { .. }
            | RemoteError::SessionClosed
            | RemoteError::Protocol { .. } => Phase::Open,
            RemoteError::Teardown { .. } => Phase::Teardown,
        }
    }
}

/// Errors raised while tabularizing delimited text.
#[derive(Error, Debug)]
pub enum ParseError {
    /// The input has no header row
    #[error("Missing header row")]
    MissingHeader,

    /// Two header fields share a name
    #[error("Duplicate column name in header: {name}")]
    DuplicateColumn { name: String },

    /// A row does not have as many fields as the header
    #[error("Line {line}: expected {expected} fields, found {found}")]
    FieldCount {
        line: u64,
        expected: usize,
        found: usize,
    },

    /// Any other malformed input (bad UTF-8, bad quoting)
    #[error("Malformed input: {0}")]
    Malformed(String),

    /// Arrow refused the assembled columns
    #[error("Cannot build table: {0}")]
    Build(String),
}

impl From<csv::Error> for ParseError {
    fn from(err: csv::Error) -> Self {
        match err.kind() {
            csv::ErrorKind::UnequalLengths {
                pos,
                expected_len,
                len,
            } => ParseError::FieldCount {
                line: pos.as_ref().map_or(0, |p| p.line()),
                expected: *expected_len as usize,
                found: *len as usize,
            },
            _ => ParseError::Malformed(err.to_string()),
        }
    }
}

impl From<arrow::error::ArrowError> for ParseError {
    fn from(err: arrow::error::ArrowError) -> Self {
        ParseError::Build(err.to_string())
    }
}

/// Errors related to SQL query execution.
#[derive(Error, Debug)]
pub enum QueryError {
    /// A query references a column the table does not have
    #[error("Unknown column: {column} in table {table}")]
    ColumnNotFound { table: String, column: String },

    /// DataFusion error
    #[error("Query execution error: {0}")]
    Execution(String),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(String),

    /// Writing the rendered result failed
    #[error("Cannot write result: {0}")]
    Output(String),
}

impl From<datafusion::error::DataFusionError> for QueryError {
    fn from(err: datafusion::error::DataFusionError) -> Self {
        QueryError::Execution(err.to_string())
    }
}

impl From<arrow::error::ArrowError> for QueryError {
    fn from(err: arrow::error::ArrowError) -> Self {
        QueryError::Arrow(err.to_string())
    }
}

/// Errors related to resolving connection settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required key was not supplied by file, environment or flag
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    /// The config file could not be read
    #[error("Cannot read config file {path}: {reason}")]
    Read { path: String, reason: String },

    /// A value is present but unusable
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_classification() {
        let connect = Error::from(RemoteError::Authentication {
            username: "stream_user".into(),
        });
        assert_eq!(connect.phase(), Phase::Connect);

        let open = Error::from(RemoteError::NotFound {
            path: "customers.csv".into(),
        });
        assert_eq!(open.phase(), Phase::Open);

        let load = Error::from(ParseError::MissingHeader);
        assert_eq!(load.phase(), Phase::Load);

        let query = Error::from(QueryError::ColumnNotFound {
            table: "customers".into(),
            column: "city".into(),
        });
        assert_eq!(query.phase(), Phase::Query);

        let teardown = Error::from(RemoteError::Teardown {
            resource: "channel",
            reason: "broken pipe".into(),
        });
        assert_eq!(teardown.phase(), Phase::Teardown);
    }

    #[test]
    fn test_csv_unequal_lengths_maps_to_field_count() {
        let data = "state,city\nCO\n";
        let mut reader = csv::ReaderBuilder::new().from_reader(data.as_bytes());
        let err = reader
            .records()
            .next()
            .expect("one record")
            .expect_err("short row must fail");

        match ParseError::from(err) {
            ParseError::FieldCount {
                line,
                expected,
                found,
            } => {
                assert_eq!(line, 2);
                assert_eq!(expected, 2);
                assert_eq!(found, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Load.to_string(), "load");
        assert_eq!(Phase::Teardown.to_string(), "teardown");
    }
}
