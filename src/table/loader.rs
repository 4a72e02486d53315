//! Draining a byte stream of delimited text into a [`Table`].

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use super::{Table, TableBuilder};
use crate::error::{ParseError, Result};

/// Loads comma-separated (or other single-byte delimited) text with a header row.
#[derive(Debug, Clone, Copy)]
pub struct TabularLoader {
    delimiter: u8,
}

impl Default for TabularLoader {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

impl TabularLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Read `reader` to end of input and build a table from it.
    ///
    /// The reader is fully consumed whether or not parsing succeeds. A row
    /// whose field count differs from the header fails the whole load.
    pub async fn load<R>(&self, reader: &mut R) -> Result<Table>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await?;
        debug!(bytes = data.len(), "stream drained");

        let table = self.parse(&data)?;
        debug!(
            rows = table.num_rows(),
            columns = table.num_columns(),
            "table materialized"
        );
        Ok(table)
    }

    /// Build a table from bytes already in memory.
    pub fn parse(&self, data: &[u8]) -> std::result::Result<Table, ParseError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(false)
            .from_reader(data);

        let header = reader.headers()?.clone();
        if header.is_empty() {
            return Err(ParseError::MissingHeader);
        }

        let mut builder = TableBuilder::new(header.iter())?;
        for record in reader.records() {
            let record = record?;
            let line = record.position().map_or(0, |p| p.line());
            builder.push_row(record.iter(), line)?;
        }

        builder.finish()
    }
}
