//! Output formatting for query results.
//!
//! Results are rendered as a table, CSV or JSON Lines. Formatting is type
//! aware: nulls render empty (or `null` in JSON) and numeric columns stay
//! numbers in JSON.

use std::io::Write;

use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, RecordBatch};
use arrow::datatypes::DataType;
use clap::ValueEnum;

use crate::query::QueryResult;

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed table (default)
    Table,
    /// Comma-separated values
    Csv,
    /// JSON Lines (one JSON object per row)
    Json,
}

/// Formats query results for output.
#[derive(Debug, Clone, Copy)]
pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    /// Create a new formatter with the specified format.
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Format a whole query result (all batches) and write it to `writer`.
    pub fn write_result<W: Write>(
        &self,
        result: &QueryResult,
        writer: &mut W,
    ) -> std::io::Result<()> {
        let headers: Vec<&str> = result
            .schema
            .fields()
            .iter()
            .map(|f| f.name().as_str())
            .collect();

        match self.format {
            OutputFormat::Table => self.write_table(&headers, &result.batches, writer),
            OutputFormat::Csv => self.write_csv(&headers, &result.batches, writer),
            OutputFormat::Json => self.write_json(&headers, &result.batches, writer),
        }
    }

    /// Format a single cell value; nulls become empty strings.
    fn format_value(col: &ArrayRef, row_idx: usize) -> String {
        if col.is_null(row_idx) {
            return String::new();
        }

        arrow::util::display::array_value_to_string(col, row_idx)
            .unwrap_or_else(|_| "?".to_string())
    }

    fn json_value(col: &ArrayRef, row_idx: usize) -> serde_json::Value {
        if col.is_null(row_idx) {
            return serde_json::Value::Null;
        }

        match col.data_type() {
            DataType::Int64 => {
                if let Some(arr) = col.as_any().downcast_ref::<Int64Array>() {
                    return serde_json::Value::Number(arr.value(row_idx).into());
                }
            }
            DataType::Float64 => {
                if let Some(arr) = col.as_any().downcast_ref::<Float64Array>() {
                    // NaN and infinities have no JSON number form
                    if let Some(n) = serde_json::Number::from_f64(arr.value(row_idx)) {
                        return serde_json::Value::Number(n);
                    }
                }
            }
            _ => {}
        }

        serde_json::Value::String(Self::format_value(col, row_idx))
    }

    fn write_table<W: Write>(
        &self,
        headers: &[&str],
        batches: &[RecordBatch],
        writer: &mut W,
    ) -> std::io::Result<()> {
        use comfy_table::{Cell, CellAlignment, Table};

        let mut table = Table::new();
        table.set_header(headers.iter().map(|h| Cell::new(h)));

        let mut rows = 0;
        for batch in batches {
            for row_idx in 0..batch.num_rows() {
                let row = batch.columns().iter().map(|col| {
                    let cell = Cell::new(Self::format_value(col, row_idx));
                    if col.data_type().is_numeric() {
                        cell.set_alignment(CellAlignment::Right)
                    } else {
                        cell
                    }
                });
                table.add_row(row);
                rows += 1;
            }
        }

        writeln!(writer, "{table}")?;
        writeln!(writer, "({rows} {})", if rows == 1 { "row" } else { "rows" })
    }

    fn write_csv<W: Write>(
        &self,
        headers: &[&str],
        batches: &[RecordBatch],
        writer: &mut W,
    ) -> std::io::Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(headers)?;

        for batch in batches {
            for row_idx in 0..batch.num_rows() {
                let values = batch
                    .columns()
                    .iter()
                    .map(|col| Self::format_value(col, row_idx));
                csv_writer.write_record(values)?;
            }
        }

        csv_writer.flush()
    }

    fn write_json<W: Write>(
        &self,
        headers: &[&str],
        batches: &[RecordBatch],
        writer: &mut W,
    ) -> std::io::Result<()> {
        for batch in batches {
            for row_idx in 0..batch.num_rows() {
                let mut obj = serde_json::Map::new();
                for (col_idx, name) in headers.iter().enumerate() {
                    let value = Self::json_value(batch.column(col_idx), row_idx);
                    obj.insert(name.to_string(), value);
                }
                writeln!(writer, "{}", serde_json::Value::Object(obj))?;
            }
        }

        Ok(())
    }
}
