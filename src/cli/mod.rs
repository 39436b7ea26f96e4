//! Command-line interface for `pgjsonl`.
//!
//! This module provides the CLI parsing and command routing using clap.

pub mod commands;
pub mod prompt;

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use pgjsonl_lib::{ConnectionParams, ExportFormat};

use crate::config::{self, ConnectionOverrides, Profile};
use crate::logging::{self, LogFormat};

/// `pgjsonl` - move PostgreSQL table data to and from JSONL files.
#[derive(Parser, Debug)]
#[command(name = "pgjsonl")]
#[command(
    author,
    version,
    about = "Move PostgreSQL table data to and from JSONL files",
    long_about = None,
    after_help = "Connection settings fall back to PGHOST, PGPORT, PGDATABASE, PGUSER and PGPASSWORD, then to ./pgjsonl.yaml."
)]
pub struct Cli {
    /// Print the report as JSON on stdout
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// YAML profile with connection and size settings
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// The command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load JSONL files into tables
    Import(ImportArgs),

    /// Write tables out as JSONL files
    Export(ExportArgs),

    /// Generate a shell completion script
    Completions(CompletionsArgs),
}

/// Connection flags shared by `import` and `export`.
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Database server host
    #[arg(short = 'H', long, env = "PGHOST")]
    pub host: Option<String>,

    /// Database server port
    #[arg(short, long, env = "PGPORT")]
    pub port: Option<u16>,

    /// Database name
    #[arg(short, long, env = "PGDATABASE")]
    pub database: Option<String>,

    /// Database user
    #[arg(short = 'U', long, env = "PGUSER")]
    pub username: Option<String>,

    /// Database password
    #[arg(long, env = "PGPASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Prompt for the password
    #[arg(short = 'W', long)]
    pub password_prompt: bool,

    /// Target schema [default: public]
    #[arg(short, long)]
    pub schema: Option<String>,
}

impl ConnectionArgs {
    #[must_use]
    pub fn overrides(&self) -> ConnectionOverrides {
        ConnectionOverrides {
            host: self.host.clone(),
            port: self.port,
            database: self.database.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            schema: self.schema.clone(),
        }
    }
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("source").required(true).args(["input_dir", "file"])))]
#[allow(clippy::struct_excessive_bools)]
pub struct ImportArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Directory of {table}.jsonl files
    #[arg(short, long, value_name = "DIR")]
    pub input_dir: Option<PathBuf>,

    /// Single {table}.jsonl file
    #[arg(short, long, value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Create missing tables from the file contents
    #[arg(long)]
    pub create_tables: bool,

    /// Delete existing rows before loading each table
    #[arg(long)]
    pub clear: bool,

    /// Suspend foreign-key checks for the whole run
    #[arg(long)]
    pub disable_foreign_keys: bool,

    /// Tables to skip (comma-separated)
    #[arg(long, value_name = "TABLES")]
    pub skip_tables: Option<String>,

    /// Columns to skip (table.column,table2.column2)
    #[arg(long, value_name = "COLUMNS")]
    pub skip_columns: Option<String>,

    /// Rows per INSERT statement [default: 500]
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Rows sampled for type inference [default: 1000]
    #[arg(long)]
    pub sample_size: Option<usize>,
}

/// Output file format.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FormatArg {
    /// {table}.jsonl, one object per line
    #[default]
    Jsonl,
    /// {table}.json, one array
    Json,
}

impl From<FormatArg> for ExportFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Jsonl => Self::Jsonl,
            FormatArg::Json => Self::Json,
        }
    }
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Directory to write files into
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Tables to export (comma-separated) [default: all]
    #[arg(long, value_name = "TABLES")]
    pub tables: Option<String>,

    /// Output file format
    #[arg(long, value_enum, default_value_t = FormatArg::Jsonl)]
    pub format: FormatArg,

    /// Tables to skip (comma-separated)
    #[arg(long, value_name = "TABLES")]
    pub skip_tables: Option<String>,

    /// Columns to skip (table.column,table2.column2)
    #[arg(long, value_name = "COLUMNS")]
    pub skip_columns: Option<String>,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Settings shared by every command for one invocation.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub json: bool,
    pub quiet: bool,
    pub profile: Profile,
}

impl RunContext {
    /// Resolve connection parameters, prompting for a password if asked.
    ///
    /// # Errors
    ///
    /// Returns `PromptCancelled` or `Io` if the password prompt fails.
    pub fn connection(&self, args: &ConnectionArgs) -> crate::error::Result<ConnectionParams> {
        let mut params = config::resolve_connection(&args.overrides(), &self.profile);
        if args.password_prompt {
            let prompt = format!("Password for {}: ", params.user);
            params.password = Some(prompt::read_password(&prompt)?);
        }
        Ok(params)
    }

    /// Whether the text summary should be printed.
    #[must_use]
    pub const fn show_summary(&self, success: bool) -> bool {
        !self.json && (!self.quiet || !success)
    }
}

/// Run the CLI.
///
/// Returns `Ok(false)` when the command ran but at least one table failed.
///
/// # Errors
///
/// Returns an error if the command cannot run at all.
pub fn run() -> Result<bool> {
    let cli = Cli::parse();
    let format = if cli.json {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    logging::init_logging(cli.verbose, cli.quiet, format)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;

    if let Commands::Completions(args) = &cli.command {
        commands::completions::execute(args.shell);
        return Ok(true);
    }

    let ctx = RunContext {
        json: cli.json,
        quiet: cli.quiet,
        profile: config::load_profile(cli.config.as_deref())?,
    };

    let success = match &cli.command {
        Commands::Import(args) => commands::import::execute(args, &ctx)?,
        Commands::Export(args) => commands::export::execute(args, &ctx)?,
        Commands::Completions(_) => true,
    };
    Ok(success)
}
