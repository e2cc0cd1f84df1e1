use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::SqlDialect;

pub const DEFAULT_STORE_DIR: &str = ".his-migrate/configs";

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Analyze, transform and migrate hospital information records",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Analyze sampled columns and recommend transformers, validators and targets
    Analyze(AnalyzeArgs),
    /// Run a transformer pipeline over a single value
    Transform(TransformArgs),
    /// Apply a mapping configuration to the rows of a CSV file
    Apply(ApplyArgs),
    /// Print the source read query for a mapping configuration
    Query(QueryArgs),
    /// Manage versioned mapping configurations
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// CSV file holding sampled rows of the source table
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Number of rows to read from the sample file
    #[arg(long, default_value_t = 20)]
    pub sample_rows: usize,
    /// Candidate target column names used for name matching
    #[arg(long = "target-columns", value_delimiter = ',')]
    pub target_columns: Vec<String>,
    /// Enable fuzzy name matching with this minimum similarity (0-1)
    #[arg(long = "similarity-threshold")]
    pub similarity_threshold: Option<f64>,
    /// Write a draft mapping configuration to this path
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Print recommendations as JSON instead of a table
    #[arg(long)]
    pub json: bool,
    /// Name of the drafted configuration (defaults to the input file stem)
    #[arg(long)]
    pub name: Option<String>,
    /// Module the drafted configuration belongs to
    #[arg(long, default_value = "")]
    pub module: String,
    /// Source database recorded in the draft
    #[arg(long = "source-db", default_value = "")]
    pub source_db: String,
    /// Source table recorded in the draft (defaults to the configuration name)
    #[arg(long = "source-table")]
    pub source_table: Option<String>,
    /// Target database recorded in the draft
    #[arg(long = "target-db", default_value = "")]
    pub target_db: String,
    /// Target table recorded in the draft (defaults to the configuration name)
    #[arg(long = "target-table")]
    pub target_table: Option<String>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct TransformArgs {
    /// Value to transform
    #[arg(long = "value", allow_hyphen_values = true)]
    pub value: String,
    /// Comma-separated transformer names applied in order
    #[arg(short = 't', long = "transformers", value_delimiter = ',', required = true)]
    pub transformers: Vec<String>,
    /// Skip unknown transformer names instead of failing
    #[arg(long)]
    pub lenient: bool,
    /// Reference tables (JSON) used by LOOKUP_* transformers
    #[arg(long = "lookup")]
    pub lookup: Option<PathBuf>,
    /// Reference table consulted by LOOKUP_* transformers
    #[arg(long = "lookup-table", requires = "lookup_by")]
    pub lookup_table: Option<String>,
    /// Key column consulted by LOOKUP_* transformers
    #[arg(long = "lookup-by", requires = "lookup_table")]
    pub lookup_by: Option<String>,
}

#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// Input CSV file with source rows
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Mapping configuration (JSON)
    #[arg(short = 'c', long = "config")]
    pub config: PathBuf,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Reference tables (JSON) used by LOOKUP_* transformers
    #[arg(long = "lookup")]
    pub lookup: Option<PathBuf>,
    /// Limit number of rows processed
    #[arg(long)]
    pub limit: Option<usize>,
    /// Grade transformed values against each mapping's validators
    #[arg(long)]
    pub grade: bool,
    /// CSV delimiter character for reading input
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Delimiter to use for output (defaults to input delimiter)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Character encoding for the output file/stdout (defaults to utf-8)
    #[arg(long = "output-encoding")]
    pub output_encoding: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "lowercase")]
pub enum QueryDialect {
    Sqlserver,
    Postgres,
    Mysql,
}

impl From<QueryDialect> for SqlDialect {
    fn from(value: QueryDialect) -> Self {
        match value {
            QueryDialect::Sqlserver => SqlDialect::SqlServer,
            QueryDialect::Postgres => SqlDialect::Postgres,
            QueryDialect::Mysql => SqlDialect::MySql,
        }
    }
}

#[derive(Debug, Args)]
pub struct QueryArgs {
    /// Mapping configuration (JSON)
    #[arg(short = 'c', long = "config")]
    pub config: PathBuf,
    /// Table to read from (defaults to the configuration's source table)
    #[arg(long)]
    pub table: Option<String>,
    /// Limit number of rows returned by the query
    #[arg(long)]
    pub limit: Option<usize>,
    /// SQL dialect used for identifier quoting and row limits
    #[arg(long, value_enum, default_value = "sqlserver")]
    pub dialect: QueryDialect,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Directory holding versioned configurations
    #[arg(long, default_value = DEFAULT_STORE_DIR)]
    pub store: PathBuf,
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Save a configuration file as a new version
    Save {
        /// Mapping configuration (JSON)
        #[arg(short = 'c', long = "config")]
        config: PathBuf,
    },
    /// List stored configurations, most recently updated first
    List,
    /// Print a stored configuration
    Show {
        name: String,
        /// Version to print (defaults to the latest)
        #[arg(long)]
        version: Option<u32>,
    },
    /// List the versions of a configuration, newest first
    History { name: String },
    /// Compare two versions of a configuration
    Diff { name: String, from: u32, to: u32 },
    /// Delete a configuration together with its history
    Delete { name: String },
    /// Render a stored configuration as a TypeScript table definition
    Export {
        name: String,
        /// Version to export (defaults to the latest)
        #[arg(long)]
        version: Option<u32>,
        /// Destination file (defaults to stdout)
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
    },
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
