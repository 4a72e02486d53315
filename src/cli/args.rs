//! Command-line argument definitions.

use clap::Parser;
use std::path::PathBuf;

use super::OutputFormat;
use crate::config::ConfigFile;

/// Stream a CSV file from an SFTP server and query it with SQL.
#[derive(Parser, Debug)]
#[command(name = "sftpql")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// TOML file with connection settings
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Remote host name or address
    #[arg(long, env = "SFTPQL_HOST")]
    pub host: Option<String>,

    /// Remote SSH port [default: 22]
    #[arg(short = 'P', long, env = "SFTPQL_PORT")]
    pub port: Option<u16>,

    /// Login user name
    #[arg(short = 'u', long = "username", env = "SFTPQL_USER")]
    pub username: Option<String>,

    /// Login password (prompted for when not supplied)
    #[arg(long, env = "SFTPQL_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Path of the CSV file on the server
    #[arg(value_name = "REMOTE_PATH", env = "SFTPQL_REMOTE_PATH")]
    pub remote_path: Option<String>,

    /// Name the loaded table is registered under [default: remote file stem]
    #[arg(short = 't', long = "table")]
    pub table_name: Option<String>,

    /// Field delimiter [default: ,]
    #[arg(short = 'd', long)]
    pub delimiter: Option<char>,

    /// Give up connecting after this many seconds
    #[arg(long = "timeout", value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Output format for stdout
    #[arg(long = "format", value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Print the query battery and exit
    #[arg(long = "list-queries")]
    pub list_queries: bool,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Settings given on the command line, to be layered over the config file.
    pub fn overrides(&self) -> ConfigFile {
        ConfigFile {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
            remote_path: self.remote_path.clone(),
            timeout_secs: self.timeout_secs,
            table_name: self.table_name.clone(),
            delimiter: self.delimiter,
        }
    }

    /// Check if this is an info-only command (no connection needed).
    pub fn is_info_only(&self) -> bool {
        self.list_queries
    }
}
