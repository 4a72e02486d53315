//! In-memory tables built from delimited text.
//!
//! A [`Table`] is a single Arrow `RecordBatch` with an inferred schema. It owns
//! its data outright, so it stays usable after the stream and session that
//! produced it are closed.

mod builder;
mod loader;

pub use builder::{ColumnKind, TableBuilder};
pub use loader::TabularLoader;

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;

/// Immutable columnar table.
#[derive(Debug, Clone)]
pub struct Table {
    batch: RecordBatch,
}

impl Table {
    pub fn new(batch: RecordBatch) -> Self {
        Self { batch }
    }

    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    /// Column names in header order.
    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    /// Exact, case-sensitive lookup.
    pub fn has_column(&self, name: &str) -> bool {
        self.batch.schema().column_with_name(name).is_some()
    }

    /// Inferred kind of a column, if present.
    pub fn column_kind(&self, name: &str) -> Option<ColumnKind> {
        let schema = self.batch.schema();
        let (_, field) = schema.column_with_name(name)?;
        ColumnKind::from_data_type(field.data_type())
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }
}
