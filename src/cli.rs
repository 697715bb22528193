// CLI interface for Lionel using clap
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::dataset::{Dataset, Owner};
use crate::dialect::Sniffer;
use crate::engine::ProcedureEngine;
use crate::error::{LionelError, Result};
use crate::interpreter::InterpreterRegistry;
use crate::preview::{preview, profile_columns, DEFAULT_PREVIEW_ROWS};
use crate::procedure::{Procedure, MAX_NAME_LENGTH};

#[derive(Parser)]
#[command(
    name = "lionel",
    about = "Lionel - sniff uploaded data feeds and run procedures against them",
    version = crate::VERSION,
    long_about = "Lionel infers the delimiter, line terminator and header of uploaded delimited files and runs user-supplied Bash, Python and SQL procedures against them, streaming their output."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path (defaults are used when omitted)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Control color output (auto, always, never)
    #[arg(long, global = true, value_name = "WHEN")]
    pub color: Option<String>,

    /// Log output format (pretty, json, compact)
    #[arg(
        long,
        global = true,
        value_name = "FORMAT",
        value_parser = ["pretty", "json", "compact"]
    )]
    pub log_format: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the registered procedure languages and their file extensions
    Languages,

    /// Infer the delimiter, terminator and header of a delimited file
    Sniff {
        /// File to inspect
        file: PathBuf,

        /// Number of leading lines to sample
        #[arg(short = 'n', long)]
        lines: Option<usize>,
    },

    /// Show the header, first rows and inferred column types of a file
    Preview {
        /// File to preview
        file: PathBuf,

        /// Number of data rows to show
        #[arg(short = 'n', long, default_value_t = DEFAULT_PREVIEW_ROWS)]
        rows: usize,
    },

    /// Run a procedure against a dataset, streaming its output
    Run {
        /// Procedure script
        script: PathBuf,

        /// Declared procedure language, e.g. Python
        #[arg(short, long)]
        language: String,

        /// Dataset file the procedure runs against
        #[arg(short, long)]
        dataset: PathBuf,

        /// Target table (defaults to the dataset's file stem)
        #[arg(long)]
        table: Option<String>,

        /// Username passed to the procedure (defaults to $USER)
        #[arg(long)]
        user: Option<String>,

        /// Email passed to the procedure
        #[arg(long, default_value = "")]
        email: String,

        /// Extra arguments appended after the payload
        #[arg(last = true)]
        extra: Vec<String>,
    },
}

impl Cli {
    pub fn run(&self) -> Result<i32> {
        self.init_logging();
        let config = Config::load(self.config.as_deref())?;

        match &self.command {
            Commands::Languages => {
                let registry = InterpreterRegistry::discover(&config.interpreters)?;
                for language in registry.languages() {
                    let extension = registry.extension_for(&language).unwrap_or_default();
                    println!("{language}\t{extension}");
                }
                Ok(0)
            }
            Commands::Sniff { file, lines } => {
                let dataset = Dataset::new(file, local_owner(None, ""));
                let sniffer = Sniffer::from_settings(&config.sniffer);
                let sample_lines = lines.unwrap_or(config.sniffer.sample_lines);
                let dialect = dataset.infer_format(&sniffer, sample_lines)?;
                println!("delimiter: {:?}", dialect.delimiter);
                println!("terminator: {}", dialect.terminator);
                println!("header: {}", dialect.has_header);
                Ok(0)
            }
            Commands::Preview { file, rows } => {
                let dataset = ingest(file, &config, local_owner(None, ""))?;
                let preview = preview(&dataset, *rows)?;
                let delimiter = dataset.delimiter.to_string();

                if let Some(header) = &preview.header {
                    println!("{}", header.join(&delimiter));
                }
                for row in &preview.rows {
                    println!("{}", row.join(&delimiter));
                }
                println!();
                for profile in profile_columns(&preview) {
                    println!(
                        "{}\t{}\tdistinct={}\tempty={}",
                        profile.name, profile.sql_type, profile.distinct, profile.empty
                    );
                }
                Ok(0)
            }
            Commands::Run {
                script,
                language,
                dataset,
                table,
                user,
                email,
                extra,
            } => {
                let owner = local_owner(user.as_deref(), email);
                let mut dataset = ingest(dataset, &config, owner.clone())?;
                dataset.table = table.clone().unwrap_or_else(|| file_stem(&dataset.path));

                let procedure = Procedure::unchecked(
                    procedure_name(script),
                    language.clone(),
                    "Run from the command line",
                    script.clone(),
                    owner,
                );

                let runtime = tokio::runtime::Runtime::new()?;
                runtime.block_on(run_procedure(&config, &procedure, &dataset, extra))?;
                Ok(0)
            }
        }
    }

    fn init_logging(&self) {
        use crate::logging::{init_logging, LogConfig, LogFormat};

        let mut log_config = LogConfig::from_cli(self.verbose, self.quiet, self.color.clone());
        if let Some(format) = self.log_format.as_deref().and_then(LogFormat::from_name) {
            log_config = log_config.with_format(format);
        }

        if let Err(e) = init_logging(log_config) {
            eprintln!("Failed to initialize logging: {e}");
        }
    }
}

async fn run_procedure(
    config: &Config,
    procedure: &Procedure,
    dataset: &Dataset,
    extra: &[String],
) -> Result<()> {
    let registry = InterpreterRegistry::discover(&config.interpreters)?;
    let engine = ProcedureEngine::new(Arc::new(registry), config.execution.clone());

    let mut stream = engine.execute(procedure, dataset, extra).await?;
    while let Some(line) = stream.next_line().await {
        println!("{}", line?);
    }
    Ok(())
}

/// Sniff the file's dialect and read its column names. An undetermined
/// dialect falls back to comma-separated with a header.
fn ingest(path: &Path, config: &Config, owner: Owner) -> Result<Dataset> {
    let mut dataset = Dataset::new(path, owner);
    let sniffer = Sniffer::from_settings(&config.sniffer);

    match dataset.infer_format(&sniffer, config.sniffer.sample_lines) {
        Ok(dialect) => dataset.apply_dialect(dialect),
        Err(LionelError::Dialect(e)) => {
            tracing::warn!(
                dataset = %dataset.display_name(),
                "{e}; falling back to comma-separated with a header"
            );
        }
        Err(e) => return Err(e),
    }

    if dataset.has_header {
        if let Some(header) = preview(&dataset, 0)?.header {
            dataset.set_columns(header);
        }
    }
    Ok(dataset)
}

fn local_owner(user: Option<&str>, email: &str) -> Owner {
    let username = user
        .map(str::to_string)
        .or_else(|| std::env::var("USER").ok())
        .unwrap_or_default();
    Owner::new(username, email)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn procedure_name(script: &Path) -> String {
    file_stem(script).chars().take(MAX_NAME_LENGTH).collect()
}
