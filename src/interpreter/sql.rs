// SQL client interpreters, one per target database engine

use std::path::Path;

use crate::config::CommandSettings;

use super::traits::{script_arg, Command, Interpreter};

/// Runs `.sql` procedures against Oracle through SQL*Plus:
/// `sqlplus <connect args...> @<script> <payload> <extra...>`.
/// The payload and extra arguments arrive in the script as `&1`, `&2`, ...
pub struct OracleInterpreter {
    executable: String,
    connect_args: Vec<String>,
}

impl OracleInterpreter {
    pub const LANGUAGE: &'static str = "oracle";
    pub const EXTENSION: &'static str = ".sql";

    pub fn from_settings(settings: &CommandSettings) -> Self {
        Self {
            executable: settings
                .executable
                .clone()
                .unwrap_or_else(|| "sqlplus".to_string()),
            connect_args: settings.args.clone(),
        }
    }
}

impl Interpreter for OracleInterpreter {
    fn language(&self) -> &str {
        Self::LANGUAGE
    }

    fn extension(&self) -> &str {
        Self::EXTENSION
    }

    fn build_command(&self, script: &Path, payload: &str, extra_args: &[String]) -> Command {
        let mut command = Command::new(&self.executable);
        command
            .args(&self.connect_args)
            .arg(format!("@{}", script_arg(script)))
            .arg(payload)
            .args(extra_args);
        command
    }
}

/// Runs `.sql` procedures against PostgreSQL through psql:
/// `psql <connection args...> -f <script> -v payload=<payload> <extra...>`.
/// The payload is readable in the script as `:'payload'`.
pub struct PostgresInterpreter {
    executable: String,
    connect_args: Vec<String>,
}

impl PostgresInterpreter {
    pub const LANGUAGE: &'static str = "postgres";
    pub const EXTENSION: &'static str = ".sql";

    pub fn from_settings(settings: &CommandSettings) -> Self {
        Self {
            executable: settings
                .executable
                .clone()
                .unwrap_or_else(|| "psql".to_string()),
            connect_args: settings.args.clone(),
        }
    }
}

impl Interpreter for PostgresInterpreter {
    fn language(&self) -> &str {
        Self::LANGUAGE
    }

    fn extension(&self) -> &str {
        Self::EXTENSION
    }

    fn build_command(&self, script: &Path, payload: &str, extra_args: &[String]) -> Command {
        let mut command = Command::new(&self.executable);
        command
            .args(&self.connect_args)
            .args(["-v", "ON_ERROR_STOP=1", "-f"])
            .arg(script_arg(script))
            .arg("-v")
            .arg(format!("payload={payload}"))
            .args(extra_args);
        command
    }
}
