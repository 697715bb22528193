// Error handling framework for Lionel
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LionelError>;

/// Main error type for Lionel
#[derive(Debug, Error)]
pub enum LionelError {
    #[error("Configuration error: {0}")]
    Config(#[from] Box<ConfigError>),

    #[error("Interpreter registry error: {0}")]
    Registry(#[from] Box<RegistryError>),

    #[error("Procedure execution failed: {0}")]
    Execution(#[from] Box<ExecutionError>),

    #[error("Dialect inference failed: {0}")]
    Dialect(#[from] Box<DialectError>),

    #[error("Dataset error: {0}")]
    Dataset(#[from] Box<DatasetError>),

    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration file errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid YAML syntax: {message}")]
    InvalidYaml {
        message: String,
        line: Option<u32>,
        column: Option<u32>,
        file_path: Option<PathBuf>,
    },

    #[error("Configuration file not found: {path}")]
    NotFound {
        path: PathBuf,
        suggestion: Option<String>,
    },

    #[error("Invalid configuration value for {field}: {message}")]
    InvalidValue {
        message: String,
        field: String,
        value: String,
        expected: String,
    },
}

/// Startup-time plugin errors. Any of these prevents the registry from being built.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Interpreter plugin {plugin} declares no language identifier")]
    MissingLanguage { plugin: String },

    #[error("Interpreter plugin for {language} declares no file extension")]
    MissingExtension { language: String },

    #[error("Language {language} is registered more than once")]
    DuplicateLanguage { language: String },
}

/// Procedure execution errors
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Unknown procedure language: {language}")]
    UnknownLanguage {
        language: String,
        available: Vec<String>,
    },

    #[error("Script {} does not end with {expected} required by {language}", .path.display())]
    ExtensionMismatch {
        path: PathBuf,
        language: String,
        expected: String,
    },

    #[error("Failed to spawn {command}: {error}")]
    SpawnFailed {
        command: String,
        error: String,
        suggestion: Option<String>,
    },

    #[error("{command} exited with {}", .exit_code.map_or_else(|| "a signal".to_string(), |c| format!("code {c}")))]
    SubprocessFailure {
        command: String,
        script: PathBuf,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Output stream of {command} interrupted: {error}")]
    StreamInterrupted { command: String, error: String },

    #[error("{command} timed out after {duration:?}")]
    Timeout { command: String, duration: Duration },
}

/// Dialect sniffing errors
#[derive(Debug, Error)]
pub enum DialectError {
    #[error("Cannot infer a dialect from an empty sample of {source_name}")]
    EmptySample { source_name: String },

    #[error("Could not determine delimiter for {source_name}: {reason}")]
    DialectUndetermined { source_name: String, reason: String },

    #[error("Delimiter {delimiter:?} is not a single-byte character")]
    UnsupportedDelimiter { delimiter: char },
}

/// Dataset and procedure record errors
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Cannot read dataset {dataset_id} at {}: {error}", .path.display())]
    Unreadable {
        dataset_id: String,
        path: PathBuf,
        error: String,
    },

    #[error("Malformed column list on dataset {dataset_id}: {error}")]
    MalformedColumns { dataset_id: String, error: String },

    #[error("Malformed execution payload: {error}")]
    MalformedPayload { error: String },

    #[error("Invalid procedure {name}: {message}")]
    InvalidProcedure { name: String, message: String },
}

/// Format errors with colors and context
pub struct ErrorFormatter {
    use_colors: bool,
}

impl ErrorFormatter {
    pub fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }

    /// Format an error with context and colors
    pub fn format_error(&self, error: &LionelError) -> String {
        use tracing::error;

        match error {
            LionelError::Config(_) => {
                error!(error_type = "config", error = %error, "Configuration error occurred");
            }
            LionelError::Registry(_) => {
                error!(error_type = "registry", error = %error, "Interpreter registry rejected a plugin");
            }
            LionelError::Execution(_) => {
                error!(error_type = "execution", error = %error, "Procedure execution failed");
            }
            LionelError::Dialect(_) => {
                error!(error_type = "dialect", error = %error, "Dialect inference failed");
            }
            LionelError::Dataset(_) => {
                error!(error_type = "dataset", error = %error, "Dataset error occurred");
            }
            LionelError::Io(_) => {
                error!(error_type = "io", error = %error, "IO operation failed");
            }
        }

        let mut output = String::new();

        if self.use_colors {
            output.push_str("\x1b[31m");
        }
        output.push_str("Error: ");
        if self.use_colors {
            output.push_str("\x1b[0m");
        }

        output.push_str(&error.to_string());

        match error {
            LionelError::Config(config_err) => {
                self.add_config_context(&mut output, config_err.as_ref());
            }
            LionelError::Execution(exec_err) => {
                self.add_execution_context(&mut output, exec_err.as_ref());
            }
            LionelError::Dialect(_) => {
                output.push_str("\n  Help: Set the delimiter explicitly or upload a larger sample");
            }
            _ => {}
        }

        output
    }

    fn add_config_context(&self, output: &mut String, error: &ConfigError) {
        match error {
            ConfigError::InvalidYaml {
                file_path: Some(path),
                line: Some(line),
                ..
            } => {
                output.push_str(&format!("\n  --> {}:{}", path.display(), line));
            }
            ConfigError::NotFound {
                suggestion: Some(suggestion),
                ..
            } => {
                output.push_str(&format!("\n  Help: {suggestion}"));
            }
            ConfigError::InvalidValue {
                value, expected, ..
            } => {
                output.push_str(&format!("\n  Got {value:?}, expected {expected}"));
            }
            _ => {}
        }
    }

    fn add_execution_context(&self, output: &mut String, error: &ExecutionError) {
        match error {
            ExecutionError::UnknownLanguage { available, .. } => {
                output.push_str(&format!("\n  Available languages: {}", available.join(", ")));
            }
            ExecutionError::SpawnFailed {
                suggestion: Some(suggestion),
                ..
            } => {
                output.push_str(&format!("\n  Help: {suggestion}"));
            }
            ExecutionError::SubprocessFailure { stderr, script, .. } => {
                output.push_str(&format!("\n  Script: {}", script.display()));
                if !stderr.is_empty() {
                    output.push_str(&format!("\n  Process error: {}", stderr.trim_end()));
                }
            }
            _ => {}
        }
    }
}

/// Process exit codes
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const CONFIG_ERROR: i32 = 2;
    pub const VALIDATION_ERROR: i32 = 3;
    pub const PROCEDURE_FAILURE: i32 = 4;
    pub const TIMEOUT_ERROR: i32 = 6;
    pub const DIALECT_ERROR: i32 = 7;
    pub const DATASET_ERROR: i32 = 8;
    pub const PROCESS_ERROR: i32 = 9;
}

impl LionelError {
    /// Get the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            LionelError::Config(_) | LionelError::Registry(_) => exit_codes::CONFIG_ERROR,
            LionelError::Execution(exec_err) => match exec_err.as_ref() {
                ExecutionError::UnknownLanguage { .. } | ExecutionError::ExtensionMismatch { .. } => {
                    exit_codes::VALIDATION_ERROR
                }
                ExecutionError::SubprocessFailure { .. } => exit_codes::PROCEDURE_FAILURE,
                ExecutionError::Timeout { .. } => exit_codes::TIMEOUT_ERROR,
                ExecutionError::SpawnFailed { .. } | ExecutionError::StreamInterrupted { .. } => {
                    exit_codes::PROCESS_ERROR
                }
            },
            LionelError::Dialect(_) => exit_codes::DIALECT_ERROR,
            LionelError::Dataset(_) => exit_codes::DATASET_ERROR,
            LionelError::Io(_) => exit_codes::GENERAL_ERROR,
        }
    }

    /// Create a user-friendly error message with context
    pub fn user_message(&self, use_colors: bool) -> String {
        ErrorFormatter::new(use_colors).format_error(self)
    }

    /// Whether the error was raised before any subprocess was spawned
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            LionelError::Execution(e) if matches!(
                e.as_ref(),
                ExecutionError::UnknownLanguage { .. } | ExecutionError::ExtensionMismatch { .. }
            )
        )
    }
}

impl From<ConfigError> for LionelError {
    fn from(error: ConfigError) -> Self {
        LionelError::Config(Box::new(error))
    }
}

impl From<RegistryError> for LionelError {
    fn from(error: RegistryError) -> Self {
        LionelError::Registry(Box::new(error))
    }
}

impl From<ExecutionError> for LionelError {
    fn from(error: ExecutionError) -> Self {
        LionelError::Execution(Box::new(error))
    }
}

impl From<DialectError> for LionelError {
    fn from(error: DialectError) -> Self {
        LionelError::Dialect(Box::new(error))
    }
}

impl From<DatasetError> for LionelError {
    fn from(error: DatasetError) -> Self {
        LionelError::Dataset(Box::new(error))
    }
}

// Conversion from serde_yaml::Error to ConfigError
impl From<serde_yaml::Error> for Box<ConfigError> {
    fn from(error: serde_yaml::Error) -> Self {
        let location = error.location();
        Box::new(ConfigError::InvalidYaml {
            message: error.to_string(),
            line: location.as_ref().map(|l| l.line() as u32),
            column: location.as_ref().map(|l| l.column() as u32),
            file_path: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_names_offender() {
        let error = LionelError::from(ExecutionError::ExtensionMismatch {
            path: PathBuf::from("procedures/Python/load.sh"),
            language: "Python".to_string(),
            expected: ".py".to_string(),
        });
        let message = error.to_string();
        assert!(message.contains("procedures/Python/load.sh"));
        assert!(message.contains(".py"));
        assert!(message.contains("Python"));
    }

    #[test]
    fn test_subprocess_failure_display() {
        let error = ExecutionError::SubprocessFailure {
            command: "python".to_string(),
            script: PathBuf::from("a.py"),
            exit_code: Some(3),
            stderr: String::new(),
        };
        assert_eq!(error.to_string(), "python exited with code 3");

        let killed = ExecutionError::SubprocessFailure {
            command: "bash".to_string(),
            script: PathBuf::from("a.sh"),
            exit_code: None,
            stderr: String::new(),
        };
        assert_eq!(killed.to_string(), "bash exited with a signal");
    }

    #[test]
    fn test_exit_codes() {
        let unknown = LionelError::from(ExecutionError::UnknownLanguage {
            language: "cobol".to_string(),
            available: vec![],
        });
        assert_eq!(unknown.exit_code(), exit_codes::VALIDATION_ERROR);
        assert!(unknown.is_validation_error());

        let empty = LionelError::from(DialectError::EmptySample {
            source_name: "x.csv".to_string(),
        });
        assert_eq!(empty.exit_code(), exit_codes::DIALECT_ERROR);
        assert!(!empty.is_validation_error());

        let duplicate = LionelError::from(RegistryError::DuplicateLanguage {
            language: "Bash".to_string(),
        });
        assert_eq!(duplicate.exit_code(), exit_codes::CONFIG_ERROR);
    }

    #[test]
    fn test_user_message_without_colors() {
        let error = LionelError::from(ExecutionError::UnknownLanguage {
            language: "cobol".to_string(),
            available: vec!["Bash".to_string(), "Python".to_string()],
        });
        let message = error.user_message(false);
        assert!(message.starts_with("Error: "));
        assert!(message.contains("cobol"));
        assert!(message.contains("Available languages: Bash, Python"));
        assert!(!message.contains("\x1b["));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error = LionelError::from(io_error);
        assert!(error.to_string().contains("IO operation failed"));
    }
}
