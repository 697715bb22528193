// Interpreter capability contract

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::process::{self, OutputStream, RunOptions};

/// An interpreter knows how to invoke program files of one language.
///
/// Implementations declare a language identifier and the canonical file
/// extension of that language (leading dot included, e.g. `.py`), and build
/// the command line for a script. The default `run` spawns that command and
/// streams its standard output line by line; a process that cannot be
/// started shows up as the stream's only item. Must be called from within a
/// Tokio runtime.
pub trait Interpreter: Send + Sync {
    /// Language identifier procedures declare, e.g. `Python`
    fn language(&self) -> &str;

    /// Suffix every procedure file of this language must carry
    fn extension(&self) -> &str;

    /// Command line: fixed prefix, script, payload, then extra arguments.
    ///
    /// Clients that do not take positional script arguments (SQL clients)
    /// may wrap the payload in a client variable such as `-v payload=<json>`,
    /// still ahead of the extra arguments.
    fn build_command(&self, script: &Path, payload: &str, extra_args: &[String]) -> Command;

    fn run(
        &self,
        script: &Path,
        payload: &str,
        extra_args: &[String],
        options: &RunOptions,
    ) -> OutputStream {
        let command = self.build_command(script, payload, extra_args);
        process::spawn_streaming(&command, script, options)
    }
}

/// A fully built command line
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub executable: String,
    pub arguments: Vec<String>,
    pub environment: HashMap<String, String>,
    pub working_directory: Option<PathBuf>,
}

impl Command {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            arguments: Vec::new(),
            environment: HashMap::new(),
            working_directory: None,
        }
    }

    pub fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.arguments.push(arg.into());
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub fn current_dir(&mut self, dir: impl AsRef<Path>) -> &mut Self {
        self.working_directory = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Short name used in logs and error messages
    pub fn program_name(&self) -> String {
        Path::new(&self.executable)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.executable.clone())
    }
}

/// Lossy path-to-argument conversion used by the built-in interpreters
pub(crate) fn script_arg(script: &Path) -> String {
    script.to_string_lossy().into_owned()
}
