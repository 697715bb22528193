// Logging setup for Lionel
use std::io::{self, IsTerminal};
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{ConfigError, Result};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: Level,
    /// Output format
    pub format: LogFormat,
    /// Color output configuration
    pub color: ColorConfig,
    /// Whether to show targets (module names)
    pub show_targets: bool,
}

/// Log output format options
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    /// Human readable output for terminals
    Pretty,
    /// JSON lines for log shippers
    Json,
    /// Single-line compact output
    Compact,
}

impl LogFormat {
    /// Parse a `--log-format` value
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "pretty" => Some(LogFormat::Pretty),
            "json" => Some(LogFormat::Json),
            "compact" => Some(LogFormat::Compact),
            _ => None,
        }
    }
}

/// Color output configuration
#[derive(Debug, Clone, PartialEq)]
pub enum ColorConfig {
    Auto,
    Always,
    Never,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Pretty,
            color: ColorConfig::Auto,
            show_targets: false,
        }
    }
}

impl LogConfig {
    /// Create logging configuration from CLI arguments
    pub fn from_cli(verbose: bool, quiet: bool, color: Option<String>) -> Self {
        let level = if quiet {
            Level::ERROR
        } else if verbose {
            Level::DEBUG
        } else {
            Level::INFO
        };

        let color = match color.as_deref() {
            Some("always") => ColorConfig::Always,
            Some("never") => ColorConfig::Never,
            _ => ColorConfig::Auto,
        };

        Self {
            level,
            color,
            ..Self::default()
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Check if colors should be used based on configuration and terminal
    pub fn should_use_colors(&self) -> bool {
        match self.color {
            ColorConfig::Always => true,
            ColorConfig::Never => false,
            ColorConfig::Auto => {
                io::stderr().is_terminal()
                    && std::env::var("TERM").map_or(true, |term| term != "dumb")
                    && std::env::var("NO_COLOR").is_err()
            }
        }
    }

    fn env_filter(&self) -> EnvFilter {
        // RUST_LOG wins over the CLI level when set
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("lionel={}", self.level)))
    }
}

/// Initialize the logging system. Logs go to stderr so procedure output on
/// stdout stays clean.
pub fn init_logging(config: LogConfig) -> Result<()> {
    let ansi = config.should_use_colors();
    let builder = fmt()
        .with_env_filter(config.env_filter())
        .with_writer(io::stderr)
        .with_ansi(ansi)
        .with_target(config.show_targets);

    let installed = match config.format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };

    installed.map_err(|e| {
        ConfigError::InvalidValue {
            message: format!("failed to install log subscriber: {e}"),
            field: "logging".to_string(),
            value: format!("{:?}", config.format),
            expected: "a single global subscriber".to_string(),
        }
        .into()
    })
}

/// Logging helpers for common operations
pub mod utils {
    use std::path::Path;
    use tracing::{error, info, span, Level, Span};

    /// Create a span for one procedure execution
    pub fn procedure_span(procedure: &str, language: &str, dataset_id: &str) -> Span {
        span!(
            Level::INFO,
            "procedure_execution",
            procedure = %procedure,
            language = %language,
            dataset_id = %dataset_id
        )
    }

    /// Create a span for dialect sniffing
    pub fn sniff_span(source: &str, sample_lines: usize) -> Span {
        span!(Level::DEBUG, "dialect_sniff", source = %source, sample_lines = sample_lines)
    }

    pub fn log_procedure_start(procedure: &str, script: &Path, command: &str) {
        info!(
            procedure = %procedure,
            script = %script.display(),
            command = %command,
            "Starting procedure"
        );
    }

    /// Log procedure completion
    pub fn log_procedure_completion(command: &str, success: bool, lines: u64, duration_ms: u128) {
        if success {
            info!(
                command = %command,
                lines = lines,
                duration_ms = duration_ms,
                "Procedure completed successfully"
            );
        } else {
            error!(
                command = %command,
                lines = lines,
                duration_ms = duration_ms,
                "Procedure failed"
            );
        }
    }
}
