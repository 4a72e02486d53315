//! sftpql - Query CSV files on SFTP servers using SQL syntax.
//!
//! This library connects to an SFTP server, streams one CSV file into an
//! in-memory Arrow table and runs a fixed battery of SQL queries over it via
//! Apache DataFusion.
//!
//! # Example
//!
//! ```no_run
//! use sftpql::cli::{OutputFormat, OutputFormatter};
//! use sftpql::config::ConfigFile;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = ConfigFile::load("sftpql.toml")?.resolve()?;
//!     let formatter = OutputFormatter::new(OutputFormat::Table);
//!     let summary = sftpql::pipeline::run(&settings, formatter, &mut std::io::stdout()).await?;
//!     println!("{} rows loaded", summary.rows_loaded);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod query;
pub mod remote;
pub mod table;

pub use error::{Error, Phase, Result};
