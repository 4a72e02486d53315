//! Column type inference and Arrow array assembly.

use std::collections::HashSet;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Builder, Int64Builder, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;

use super::Table;
use crate::error::ParseError;

/// Inferred type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Float,
    Text,
}

impl ColumnKind {
    /// Narrowest kind that every non-empty value parses as.
    ///
    /// Empty (or all-blank) columns are text.
    pub fn infer<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut kind = ColumnKind::Integer;
        let mut seen_value = false;

        for value in values {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            seen_value = true;

            if kind == ColumnKind::Integer && value.parse::<i64>().is_err() {
                kind = ColumnKind::Float;
            }
            if kind == ColumnKind::Float && parse_float(value).is_none() {
                return ColumnKind::Text;
            }
        }

        if seen_value {
            kind
        } else {
            ColumnKind::Text
        }
    }

    pub fn data_type(self) -> DataType {
        match self {
            ColumnKind::Integer => DataType::Int64,
            ColumnKind::Float => DataType::Float64,
            ColumnKind::Text => DataType::Utf8,
        }
    }

    pub fn from_data_type(data_type: &DataType) -> Option<Self> {
        match data_type {
            DataType::Int64 => Some(ColumnKind::Integer),
            DataType::Float64 => Some(ColumnKind::Float),
            DataType::Utf8 => Some(ColumnKind::Text),
            _ => None,
        }
    }

    fn build(self, values: &[String]) -> ArrayRef {
        match self {
            ColumnKind::Integer => {
                let mut builder = Int64Builder::with_capacity(values.len());
                for value in values {
                    let value = value.trim();
                    if value.is_empty() {
                        builder.append_null();
                    } else {
                        builder.append_option(value.parse::<i64>().ok());
                    }
                }
                Arc::new(builder.finish())
            }
            ColumnKind::Float => {
                let mut builder = Float64Builder::with_capacity(values.len());
                for value in values {
                    let value = value.trim();
                    if value.is_empty() {
                        builder.append_null();
                    } else {
                        builder.append_option(parse_float(value));
                    }
                }
                Arc::new(builder.finish())
            }
            ColumnKind::Text => {
                let bytes = values.iter().map(String::len).sum();
                let mut builder = StringBuilder::with_capacity(values.len(), bytes);
                for value in values {
                    if value.is_empty() {
                        builder.append_null();
                    } else {
                        builder.append_value(value);
                    }
                }
                Arc::new(builder.finish())
            }
        }
    }
}

/// Finite floats only: `nan`, `inf` and overflowing literals stay text.
fn parse_float(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Accumulates rows column by column, then infers types and builds a [`Table`].
pub struct TableBuilder {
    names: Vec<String>,
    columns: Vec<Vec<String>>,
    rows: usize,
}

impl TableBuilder {
    /// Start a table with the given header.
    ///
    /// Blank header fields are named `column_<n>` (1-based).
    pub fn new<'a, I>(header: I) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let names: Vec<String> = header
            .into_iter()
            .enumerate()
            .map(|(idx, name)| {
                let name = name.trim();
                if name.is_empty() {
                    format!("column_{}", idx + 1)
                } else {
                    name.to_string()
                }
            })
            .collect();

        if names.is_empty() {
            return Err(ParseError::MissingHeader);
        }

        let mut seen = HashSet::with_capacity(names.len());
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(ParseError::DuplicateColumn { name: name.clone() });
            }
        }

        let columns = vec![Vec::new(); names.len()];
        Ok(Self {
            names,
            columns,
            rows: 0,
        })
    }

    pub fn num_columns(&self) -> usize {
        self.names.len()
    }

    pub fn num_rows(&self) -> usize {
        self.rows
    }

    /// Append one row. `line` is only used for error reporting.
    pub fn push_row<'a, I>(&mut self, values: I, line: u64) -> Result<(), ParseError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let values: Vec<&str> = values.into_iter().collect();
        if values.len() != self.names.len() {
            return Err(ParseError::FieldCount {
                line,
                expected: self.names.len(),
                found: values.len(),
            });
        }

        for (column, value) in self.columns.iter_mut().zip(values) {
            column.push(value.to_string());
        }
        self.rows += 1;
        Ok(())
    }

    pub fn finish(self) -> Result<Table, ParseError> {
        let mut fields = Vec::with_capacity(self.names.len());
        let mut arrays = Vec::with_capacity(self.names.len());

        for (name, values) in self.names.into_iter().zip(self.columns) {
            let kind = ColumnKind::infer(values.iter().map(String::as_str));
            fields.push(Field::new(name, kind.data_type(), true));
            arrays.push(kind.build(&values));
        }

        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?;
        Ok(Table::new(batch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, Float64Array, Int64Array, StringArray};

    #[test]
    fn test_infer_kinds() {
        assert_eq!(ColumnKind::infer(["1", "2", "-3"]), ColumnKind::Integer);
        assert_eq!(ColumnKind::infer(["1", "2.5", "1e3"]), ColumnKind::Float);
        assert_eq!(ColumnKind::infer(["1", "two"]), ColumnKind::Text);
        assert_eq!(ColumnKind::infer(["CO", "CA"]), ColumnKind::Text);
        assert_eq!(ColumnKind::infer(["", " 7 ", ""]), ColumnKind::Integer);
        assert_eq!(ColumnKind::infer(["", ""]), ColumnKind::Text);
        assert_eq!(ColumnKind::infer(Vec::<&str>::new()), ColumnKind::Text);
    }

    #[test]
    fn test_infer_non_finite_is_text() {
        assert_eq!(ColumnKind::infer(["Nan", "Inf"]), ColumnKind::Text);
        assert_eq!(ColumnKind::infer(["1.5", "Infinity"]), ColumnKind::Text);
        assert_eq!(ColumnKind::infer(["-inf"]), ColumnKind::Text);
        assert_eq!(ColumnKind::infer(["1", "1e400"]), ColumnKind::Text);
    }

    #[test]
    fn test_build_with_nulls() {
        let mut builder = TableBuilder::new(["id", "balance", "city"]).unwrap();
        builder.push_row(["1", "10.5", "Denver"], 2).unwrap();
        builder.push_row(["", "", ""], 3).unwrap();
        builder.push_row(["3", "7", "Boulder"], 4).unwrap();
        let table = builder.finish().unwrap();

        assert_eq!(table.num_rows(), 3);
        assert_eq!(table.column_kind("id"), Some(ColumnKind::Integer));
        assert_eq!(table.column_kind("balance"), Some(ColumnKind::Float));
        assert_eq!(table.column_kind("city"), Some(ColumnKind::Text));

        let batch = table.batch();
        let ids = batch.column(0).as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(ids.value(0), 1);
        assert!(ids.is_null(1));
        assert_eq!(ids.value(2), 3);

        let balances = batch.column(1).as_any().downcast_ref::<Float64Array>().unwrap();
        assert_eq!(balances.value(2), 7.0);

        let cities = batch.column(2).as_any().downcast_ref::<StringArray>().unwrap();
        assert!(cities.is_null(1));
        assert_eq!(cities.value(2), "Boulder");
    }

    #[test]
    fn test_blank_header_names() {
        let builder = TableBuilder::new(["", "city", " "]).unwrap();
        let table = builder.finish().unwrap();
        assert_eq!(table.column_names(), vec!["column_1", "city", "column_3"]);
    }

    #[test]
    fn test_duplicate_header_rejected() {
        let result = TableBuilder::new(["state", "city", "state"]);
        assert!(matches!(
            result,
            Err(ParseError::DuplicateColumn { name }) if name == "state"
        ));
    }

    #[test]
    fn test_row_width_checked() {
        let mut builder = TableBuilder::new(["state", "city"]).unwrap();
        let err = builder.push_row(["CO"], 2).unwrap_err();
        assert!(matches!(
            err,
            ParseError::FieldCount {
                line: 2,
                expected: 2,
                found: 1
            }
        ));
        assert_eq!(builder.num_rows(), 0);
    }
}
