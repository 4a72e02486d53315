//! SQL query engine module.
//!
//! This module provides DataFusion integration for querying a loaded [`Table`].
//! The table is registered as an in-memory provider under a single name; the
//! fixed query battery lives in [`battery`].

pub mod battery;

pub use battery::{standard_battery, FixedQuery, QueryRunner};

use std::sync::Arc;

use arrow::array::RecordBatch;
use arrow::datatypes::{Schema, SchemaRef};
use datafusion::config::ConfigOptions;
use datafusion::datasource::MemTable;
use datafusion::prelude::*;
use tracing::debug;

use crate::error::{Error, QueryError};
use crate::table::Table;

/// Configure DataFusion for single-threaded, order-preserving execution.
fn create_session_context() -> SessionContext {
    let mut config = ConfigOptions::default();

    // One partition keeps scans and filters in input order
    config.execution.target_partitions = 1;
    config.optimizer.enable_round_robin_repartition = false;

    SessionContext::new_with_config(config.into())
}

/// Result of one query, collected in memory.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub label: String,
    pub schema: SchemaRef,
    pub batches: Vec<RecordBatch>,
}

impl QueryResult {
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }
}

/// Query engine over one in-memory table.
pub struct QueryEngine {
    ctx: SessionContext,
    table_name: String,
    schema: SchemaRef,
}

impl QueryEngine {
    /// Register `table` under `table_name`.
    pub fn new(table_name: &str, table: &Table) -> Result<Self, Error> {
        let ctx = create_session_context();
        let schema = table.schema();

        let provider = MemTable::try_new(schema.clone(), vec![vec![table.batch().clone()]])
            .map_err(QueryError::from)?;
        ctx.register_table(table_name, Arc::new(provider))
            .map_err(QueryError::from)?;
        debug!(table = table_name, rows = table.num_rows(), "table registered");

        Ok(Self {
            ctx,
            table_name: table_name.to_string(),
            schema,
        })
    }

    /// Fail with `ColumnNotFound` unless every column exists in the table.
    pub fn check_columns(&self, columns: &[&str]) -> Result<(), Error> {
        for column in columns {
            if self.schema.column_with_name(column).is_none() {
                return Err(QueryError::ColumnNotFound {
                    table: self.table_name.clone(),
                    column: column.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Validate and execute one query of the battery.
    pub async fn execute(&self, query: &FixedQuery) -> Result<QueryResult, Error> {
        self.check_columns(query.columns)?;

        let sql = query.sql(&self.table_name);
        debug!(label = query.label, sql = %sql, "executing query");

        let df = self.ctx.sql(&sql).await.map_err(QueryError::from)?;
        let schema = Arc::new(Schema::from(df.schema()));
        let batches = df.collect().await.map_err(QueryError::from)?;

        Ok(QueryResult {
            label: query.label.to_string(),
            schema,
            batches,
        })
    }
}
