pub mod analyze;
pub mod analyze_cmd;
pub mod apply;
pub mod batch;
pub mod cli;
pub mod config;
pub mod config_cmd;
pub mod io_utils;
pub mod table;
pub mod transform;
pub mod validate;
pub mod value;

use std::{env, sync::Arc, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands},
    config::MigrationConfig,
    transform::{LookupBinding, ReferenceTables, TransformEngine, UnknownPolicy},
    value::Value,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("his_migrate", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Analyze(args) => analyze_cmd::execute(&args),
        Commands::Transform(args) => handle_transform(&args),
        Commands::Apply(args) => apply::execute(&args),
        Commands::Query(args) => handle_query(&args),
        Commands::Config(args) => config_cmd::execute(&args),
    }
}

fn handle_transform(args: &cli::TransformArgs) -> Result<()> {
    let policy = if args.lenient {
        UnknownPolicy::PassThrough
    } else {
        UnknownPolicy::Reject
    };
    let pipeline = transform::parse_pipeline(&args.transformers, policy)?;
    debug!("Transformer pipeline: {:?}", pipeline);
    let engine = match &args.lookup {
        Some(path) => {
            let tables = ReferenceTables::load(path)
                .with_context(|| format!("Loading reference tables from {path:?}"))?;
            TransformEngine::with_resolver(Arc::new(tables))
        }
        None => TransformEngine::new(),
    };
    let binding = LookupBinding::new(args.lookup_table.as_deref(), args.lookup_by.as_deref());
    let result = engine.apply_pipeline(Value::text(args.value.as_str()), &pipeline, binding);
    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}

fn handle_query(args: &cli::QueryArgs) -> Result<()> {
    let config = MigrationConfig::load(&args.config)
        .with_context(|| format!("Loading mapping configuration {:?}", args.config))?;
    info!(
        "Building {:?} read query for '{}'",
        args.dialect, config.name
    );
    println!(
        "{}",
        config.select_query(args.table.as_deref(), args.limit, args.dialect.into())
    );
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
