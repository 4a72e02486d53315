//! The fixed set of analytical queries run against every loaded table.

use std::fmt;
use std::io::Write;

use tracing::info;

use super::QueryEngine;
use crate::cli::OutputFormatter;
use crate::error::{Error, QueryError};

/// One query of the battery.
#[derive(Clone, Copy)]
pub struct FixedQuery {
    /// Heading printed above the result
    pub label: &'static str,
    /// Columns the query reads, checked before execution
    pub columns: &'static [&'static str],
    template: fn(&str) -> String,
}

impl FixedQuery {
    pub const fn new(
        label: &'static str,
        columns: &'static [&'static str],
        template: fn(&str) -> String,
    ) -> Self {
        Self {
            label,
            columns,
            template,
        }
    }

    /// SQL text for this query against `table`.
    pub fn sql(&self, table: &str) -> String {
        (self.template)(table)
    }
}

impl fmt::Debug for FixedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedQuery")
            .field("label", &self.label)
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}

fn all_records(table: &str) -> String {
    format!("SELECT * FROM \"{table}\"")
}

fn count_by_state(table: &str) -> String {
    format!(
        "SELECT \"state\", COUNT(*) AS customer_count \
         FROM \"{table}\" \
         GROUP BY \"state\" \
         ORDER BY customer_count DESC, \"state\" ASC"
    )
}

fn denver_customers(table: &str) -> String {
    format!("SELECT * FROM \"{table}\" WHERE \"city\" = 'Denver'")
}

pub const ALL_RECORDS: FixedQuery = FixedQuery {
    label: "All Records",
    columns: &[],
    template: all_records,
};

pub const CUSTOMERS_BY_STATE: FixedQuery = FixedQuery {
    label: "Customers by State",
    columns: &["state"],
    template: count_by_state,
};

pub const DENVER_CUSTOMERS: FixedQuery = FixedQuery {
    label: "Denver Customers",
    columns: &["city"],
    template: denver_customers,
};

/// The battery in execution order.
pub fn standard_battery() -> Vec<FixedQuery> {
    vec![ALL_RECORDS, CUSTOMERS_BY_STATE, DENVER_CUSTOMERS]
}

/// Runs a list of queries in order and renders each result.
pub struct QueryRunner {
    queries: Vec<FixedQuery>,
    formatter: OutputFormatter,
}

impl QueryRunner {
    /// Runner for the standard battery.
    pub fn new(formatter: OutputFormatter) -> Self {
        Self::with_queries(standard_battery(), formatter)
    }

    pub fn with_queries(queries: Vec<FixedQuery>, formatter: OutputFormatter) -> Self {
        Self { queries, formatter }
    }

    /// Execute every query, writing a label line and the rendered result for each.
    ///
    /// Stops at the first failure. Returns `(label, row count)` per query.
    pub async fn run<W: Write>(
        &self,
        engine: &QueryEngine,
        writer: &mut W,
    ) -> Result<Vec<(&'static str, usize)>, Error> {
        let mut counts = Vec::with_capacity(self.queries.len());

        for query in &self.queries {
            let result = engine.execute(query).await?;

            writeln!(writer, "── {} ──", query.label)
                .and_then(|_| self.formatter.write_result(&result, writer))
                .map_err(|e| QueryError::Output(e.to_string()))?;

            info!(label = query.label, rows = result.num_rows(), "query complete");
            counts.push((query.label, result.num_rows()));
        }

        Ok(counts)
    }
}
