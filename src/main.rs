//! sftpql CLI entry point.

use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sftpql::cli::{Args, OutputFormatter};
use sftpql::config::ConfigFile;
use sftpql::query::standard_battery;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Set up logging; stdout is reserved for query results
    let filter = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(io::stderr)
        .init();

    // Handle info-only commands
    if args.is_info_only() {
        list_queries();
        return Ok(());
    }

    let file_settings = match &args.config {
        Some(path) => ConfigFile::load(path).context("config phase failed")?,
        None => ConfigFile::default(),
    };
    let mut merged = file_settings.merge(args.overrides());
    merged.check_required().context("config phase failed")?;

    if merged.password.is_none() {
        let prompt = format!(
            "Password for {}@{}: ",
            merged.username.as_deref().unwrap_or("?"),
            merged.host.as_deref().unwrap_or("?")
        );
        let password = rpassword::prompt_password(prompt)
            .context("config phase failed: could not read password")?;
        merged.password = Some(password);
    }

    let settings = merged.resolve().context("config phase failed")?;
    let formatter = OutputFormatter::new(args.format);

    let mut stdout = io::stdout().lock();
    let summary = sftpql::pipeline::run(&settings, formatter, &mut stdout)
        .await
        .map_err(|err| {
            let phase = err.phase();
            anyhow::Error::new(err).context(format!("{phase} phase failed"))
        })?;
    stdout.flush()?;

    eprintln!(
        "Loaded {} rows ({} bytes) from {}; ran {} queries.",
        summary.rows_loaded,
        summary.bytes_read,
        settings.connection.remote_path,
        summary.queries.len()
    );
    Ok(())
}

fn list_queries() {
    println!("Query battery (table name defaults to the remote file stem):");
    println!("{:-<60}", "");

    for (idx, query) in standard_battery().iter().enumerate() {
        println!("{}. {}", idx + 1, query.label);
        if !query.columns.is_empty() {
            println!("   requires: {}", query.columns.join(", "));
        }
        println!("   {}", query.sql("customers"));
    }
}
