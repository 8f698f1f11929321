use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::TOKEN_ENV;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Serve CSV/Excel tables from drive archives to agents",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the HTTP tool server (REST + MCP)
    Serve(ServeArgs),
    /// Load a local ZIP archive and list the tables it yields
    Inspect(InspectArgs),
    /// Load a local ZIP archive and run one query against it
    Query(QueryArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Address to listen on, e.g. 127.0.0.1:3000
    #[arg(long)]
    pub bind: Option<String>,
    /// Bearer token required on tool endpoints
    #[arg(long, env = TOKEN_ENV, hide_env_values = true)]
    pub token: Option<String>,
    /// Directory backing the local drive
    #[arg(long = "drive-root")]
    pub drive_root: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct InspectArgs {
    /// ZIP archive containing CSV/Excel files
    #[arg(short, long)]
    pub archive: PathBuf,
}

#[derive(Debug, Args)]
pub struct QueryArgs {
    /// ZIP archive containing CSV/Excel files
    #[arg(short, long)]
    pub archive: PathBuf,
    /// Table name or fragment of one
    #[arg(short, long)]
    pub table: String,
    /// count, get_columns, sample, sum, group_by, filter or all
    #[arg(short, long)]
    pub operation: String,
    /// Column used by sum, group_by and filter
    #[arg(short, long)]
    pub column: Option<String>,
    /// Substring matched by filter
    #[arg(long)]
    pub value: Option<String>,
    /// Maximum rows returned by sample and filter
    #[arg(short, long)]
    pub limit: Option<usize>,
}
