// Lionel - Library module
// Dataset dialect sniffing and pluggable procedure execution

pub mod cli;
pub mod config;
pub mod dataset;
pub mod dialect;
pub mod engine;
pub mod error;
pub mod interpreter;
pub mod logging;
pub mod payload;
pub mod preview;
pub mod procedure;
pub mod process;

// Re-export main types for easier access
pub use config::{CommandSettings, Config, ExecutionSettings, InterpreterSettings, SnifferSettings};
pub use dataset::{feed_upload_path, procedure_upload_path, Column, Dataset, Owner};
pub use dialect::{Dialect, LineTerminator, Sniffer};
pub use engine::ProcedureEngine;
pub use error::{
    exit_codes, ConfigError, DatasetError, DialectError, ExecutionError, LionelError,
    RegistryError, Result,
};
pub use interpreter::{
    BuiltinLanguage, Command, Interpreter, InterpreterRegistry, OracleInterpreter,
    PostgresInterpreter, PythonInterpreter, RegistryBuilder, ShellInterpreter,
};
pub use logging::{ColorConfig, LogConfig, LogFormat};
pub use payload::Payload;
pub use preview::{preview, profile_columns, ColumnProfile, Preview, SqlType};
pub use procedure::Procedure;
pub use process::{OutputStream, RunOptions};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
