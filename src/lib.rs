pub mod analyze;
pub mod archive;
pub mod cli;
pub mod columns;
pub mod config;
pub mod data;
pub mod decode;
pub mod drive;
pub mod error;
pub mod export;
pub mod mcp;
pub mod query;
pub mod resolver;
pub mod server;
pub mod service;
pub mod store;
pub mod table;
pub mod tools;

use std::{env, fs, path::Path, sync::Arc, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands},
    config::Config,
    drive::LocalDrive,
    query::{Operation, QueryRequest},
    service::{ServiceSettings, TableService},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("drive_tables", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(args) => handle_serve(args),
        Commands::Inspect(args) => handle_inspect(&args),
        Commands::Query(args) => handle_query(args),
    }
}

fn handle_serve(args: cli::ServeArgs) -> Result<()> {
    let mut config = Config::load_or_default(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if let Some(token) = args.token {
        config.auth_token = Some(token);
    }
    if let Some(root) = args.drive_root {
        config.drive_root = root;
    }
    debug!("Effective config: bind={} drive_root={:?}", config.bind, config.drive_root);
    let runtime = tokio::runtime::Runtime::new().context("Starting async runtime")?;
    runtime.block_on(server::serve(config))
}

/// Service over a scratch drive with `archive` already loaded. The archive is
/// read from disk directly; the drive only matters for uploads.
fn load_local_archive(archive: &Path) -> Result<(TableService, service::LoadSummary)> {
    let bytes = fs::read(archive).with_context(|| format!("Reading archive {archive:?}"))?;
    let scratch = env::temp_dir().join("drive-tables");
    let drive = LocalDrive::new(scratch)?;
    let mut service = TableService::new(Arc::new(drive), ServiceSettings::default());
    let summary = service
        .load_archive_bytes(&bytes)
        .with_context(|| format!("Loading archive {archive:?}"))?;
    info!(
        "Loaded {} of {} file(s) from {:?}",
        summary.succeeded, summary.files_processed, archive
    );
    Ok((service, summary))
}

fn handle_inspect(args: &cli::InspectArgs) -> Result<()> {
    let (service, summary) = load_local_archive(&args.archive)?;
    print!("{}", table::render_load_summary(&summary));
    println!();
    print!("{}", table::render_loaded_tables(&service.list_loaded()));
    Ok(())
}

fn handle_query(args: cli::QueryArgs) -> Result<()> {
    let (service, _) = load_local_archive(&args.archive)?;
    let request = QueryRequest {
        operation: args.operation.parse::<Operation>()?,
        column: args.column,
        value: args.value,
        limit: args.limit,
    };
    let result = service.query(&args.table, request)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&result).context("Serializing query result")?
    );
    Ok(())
}
