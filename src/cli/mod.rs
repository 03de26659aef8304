//! Command-line interface for knapsack
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading and validation
//! - Turning `export` arguments into an [`ExportRequest`]

use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;

use crate::config::{Config, LogLevel};
use crate::error::{ConfigError, KnapsackError, Result};
use crate::export::{ExportRequest, RenameTable};
use crate::utils::convert::parse_bytes;
use crate::utils::fs::expand_home;
use crate::utils::time::parse_duration;

/// Knapsack - export search cluster indices into replayable archives
#[derive(Parser, Debug)]
#[command(
    name = "knapsack",
    version,
    about = "Export search cluster indices into replayable archives",
    long_about = "Exports index settings, mappings, aliases and documents of a search cluster
into a packet archive (.jsonl) or a bulk-load stream (.bulk)."
)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    pub config_file: Option<PathBuf>,

    /// Cluster URL, overrides the configuration file
    #[arg(long, value_name = "URL", global = true)]
    pub url: Option<String>,

    /// Verbose mode (debug logging)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Very verbose mode (trace logging)
    #[arg(long = "vv", global = true)]
    pub very_verbose: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands for knapsack
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export indices into an archive
    Export(ExportArgs),

    /// Show configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,
    },

    /// Show version information
    Version,
}

/// Options of the `export` subcommand
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Comma-separated indices, wildcards allowed
    #[arg(long, value_name = "SPEC", default_value = "_all")]
    pub index: String,

    /// Comma-separated types (all when omitted)
    #[arg(long = "type", value_name = "SPEC")]
    pub types: Option<String>,

    /// Target file; `.bulk` writes a bulk-load stream
    #[arg(long, value_name = "FILE")]
    pub path: Option<String>,

    /// Replace an existing target
    #[arg(long)]
    pub overwrite: bool,

    /// Percent-encode archive entry names
    #[arg(long)]
    pub encode: bool,

    /// Export settings and mappings (default)
    #[arg(long = "with-metadata", overrides_with = "no_metadata")]
    pub with_metadata: bool,

    /// Skip settings and mappings
    #[arg(long = "no-metadata", overrides_with = "with_metadata")]
    pub no_metadata: bool,

    /// Export aliases (default)
    #[arg(long = "with-aliases", overrides_with = "no_aliases")]
    pub with_aliases: bool,

    /// Skip aliases
    #[arg(long = "no-aliases", overrides_with = "with_aliases")]
    pub no_aliases: bool,

    /// Expected transfer size (e.g. 512MB), sizes the progress bar
    #[arg(long, value_name = "SIZE")]
    pub bytes: Option<String>,

    /// Scroll keep-alive (e.g. 90s, 5m)
    #[arg(long, value_name = "DURATION")]
    pub timeout: Option<String>,

    /// Hits per scroll page
    #[arg(long, value_name = "N")]
    pub size: Option<u32>,

    /// Raw search body as JSON
    #[arg(long, value_name = "JSON", conflicts_with = "query_file")]
    pub query: Option<String>,

    /// File holding the raw search body
    #[arg(long, value_name = "FILE")]
    pub query_file: Option<PathBuf>,

    /// Restrict metadata to index/type (repeatable)
    #[arg(long = "index-type", value_name = "INDEX/TYPE")]
    pub index_types: Vec<String>,

    /// Rename index or index/type on export, as from=to (repeatable)
    #[arg(long = "map", value_name = "FROM=TO")]
    pub renames: Vec<String>,

    /// Draw a progress bar
    #[arg(long)]
    pub progress: bool,
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Loaded configuration
    config: Config,
}

impl CliInterface {
    /// Create a new CLI interface from the process arguments
    ///
    /// # Returns
    /// * `Result<Self>` - New CLI interface or error
    pub fn new() -> Result<Self> {
        Self::from_args(CliArgs::parse())
    }

    /// Create a CLI interface from already parsed arguments
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let config = Self::load_config(&args)?;
        Ok(Self { args, config })
    }

    /// Load configuration from file and merge with arguments
    ///
    /// # Arguments
    /// * `args` - Command-line arguments
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    fn load_config(args: &CliArgs) -> Result<Config> {
        let mut config = Config::load(args.config_file.as_deref())?;

        if let Err(e) = config.validate() {
            eprintln!("Warning: Configuration validation failed: {}", e);
            eprintln!("Using default configuration instead.");
            config = Config::default();
        }

        Self::apply_args_to_config(&mut config, args);
        Ok(config)
    }

    /// Apply CLI arguments to configuration
    fn apply_args_to_config(config: &mut Config, args: &CliArgs) {
        config.logging.level = if args.very_verbose {
            LogLevel::Trace
        } else if args.verbose {
            LogLevel::Debug
        } else {
            config.logging.level
        };

        if let Some(url) = &args.url {
            config.cluster.url = url.clone();
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the CLI arguments
    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    /// Build an export request from `export` arguments and configured defaults
    ///
    /// # Arguments
    /// * `args` - Parsed `export` options
    ///
    /// # Returns
    /// * `Result<ExportRequest>` - Request ready for submission
    pub fn export_request(&self, args: &ExportArgs) -> Result<ExportRequest> {
        let defaults = &self.config.export;

        let scroll_timeout = match &args.timeout {
            Some(text) => parse_duration(text).ok_or_else(|| invalid_arg("timeout", text))?,
            None => self.config.scroll_timeout(),
        };
        let bytes_to_transfer = match &args.bytes {
            Some(text) => parse_bytes(text).ok_or_else(|| invalid_arg("bytes", text))?,
            None => defaults.bytes_to_transfer,
        };

        let mut renames = RenameTable::new();
        for rule in &args.renames {
            renames.parse_rule(rule)?;
        }

        let mut request = ExportRequest::new()
            .index(args.index.as_str())
            .types(args.types.as_deref().unwrap_or_default())
            .overwrite(args.overwrite)
            .encode_entry_names(args.encode)
            .with_metadata(!args.no_metadata)
            .with_aliases(!args.no_aliases)
            .bytes_to_transfer(bytes_to_transfer)
            .scroll_timeout(scroll_timeout)
            .scroll_size(args.size.unwrap_or(defaults.scroll_size))
            .renames(renames)
            .progress_bar(args.progress || defaults.progress_bar);

        if let Some(path) = &args.path {
            request = request.path(expand_home(path));
        }
        if let Some(query) = Self::read_query(args)? {
            request = request.query(query);
        }
        if !args.index_types.is_empty() {
            request = request.index_types(args.index_types.iter().cloned());
        }
        Ok(request)
    }

    /// Raw search body from `--query` or `--query-file`
    fn read_query(args: &ExportArgs) -> Result<Option<Value>> {
        let text = match (&args.query, &args.query_file) {
            (Some(query), _) => query.clone(),
            (None, Some(file)) => std::fs::read_to_string(file)?,
            (None, None) => return Ok(None),
        };
        let query: Value = serde_json::from_str(&text)?;
        if !query.is_object() {
            return Err(KnapsackError::Generic(
                "search body must be a JSON object".to_string(),
            ));
        }
        Ok(Some(query))
    }

    /// Handle the subcommands that need no cluster
    ///
    /// # Returns
    /// * `Result<bool>` - True if the subcommand was handled
    pub fn handle_subcommand(&self) -> Result<bool> {
        match &self.args.command {
            Commands::Version => {
                self.show_version();
                Ok(true)
            }
            Commands::Config { show } => {
                if *show {
                    self.show_config()?;
                }
                Ok(true)
            }
            Commands::Export(_) => Ok(false),
        }
    }

    /// Show version information
    fn show_version(&self) {
        println!("knapsack version {}", env!("CARGO_PKG_VERSION"));
        println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
    }

    /// Show effective configuration
    fn show_config(&self) -> Result<()> {
        let path = self.get_config_path();
        println!("# Configuration file: {}", path.display());
        println!("{}", self.config.to_toml()?);
        Ok(())
    }

    /// Get configuration file path (from args or default)
    fn get_config_path(&self) -> PathBuf {
        self.args
            .config_file
            .clone()
            .unwrap_or_else(Config::default_path)
    }
}

fn invalid_arg(field: &str, value: &str) -> KnapsackError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
    .into()
}
