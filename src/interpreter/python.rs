// Python-script interpreter

use std::path::Path;

use crate::config::CommandSettings;

use super::traits::{script_arg, Command, Interpreter};

const DEFAULT_PYTHON: &str = "python";

/// Runs `.py` procedures as `python <script> <payload> <extra...>`
pub struct PythonInterpreter {
    executable: String,
    prefix_args: Vec<String>,
}

impl Default for PythonInterpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl PythonInterpreter {
    pub const LANGUAGE: &'static str = "Python";
    pub const EXTENSION: &'static str = ".py";

    pub fn new() -> Self {
        Self {
            executable: DEFAULT_PYTHON.to_string(),
            prefix_args: Vec::new(),
        }
    }

    pub fn from_settings(settings: &CommandSettings) -> Self {
        Self {
            executable: settings
                .executable
                .clone()
                .unwrap_or_else(|| DEFAULT_PYTHON.to_string()),
            prefix_args: settings.args.clone(),
        }
    }
}

impl Interpreter for PythonInterpreter {
    fn language(&self) -> &str {
        Self::LANGUAGE
    }

    fn extension(&self) -> &str {
        Self::EXTENSION
    }

    fn build_command(&self, script: &Path, payload: &str, extra_args: &[String]) -> Command {
        let mut command = Command::new(&self.executable);
        command
            .args(&self.prefix_args)
            .arg(script_arg(script))
            .arg(payload)
            .args(extra_args)
            // Line-buffered output so lines reach the stream as they are printed
            .env("PYTHONUNBUFFERED", "1");
        command
    }
}
