// Shell-script interpreter

use std::path::Path;

use crate::config::CommandSettings;

use super::traits::{script_arg, Command, Interpreter};

/// Runs `.sh` procedures. With no executable configured the script is
/// executed directly and its shebang picks the shell.
pub struct ShellInterpreter {
    executable: Option<String>,
    prefix_args: Vec<String>,
}

impl Default for ShellInterpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellInterpreter {
    pub const LANGUAGE: &'static str = "Bash";
    pub const EXTENSION: &'static str = ".sh";

    pub fn new() -> Self {
        Self {
            executable: None,
            prefix_args: Vec::new(),
        }
    }

    pub fn from_settings(settings: &CommandSettings) -> Self {
        Self {
            executable: settings.executable.clone(),
            prefix_args: settings.args.clone(),
        }
    }
}

impl Interpreter for ShellInterpreter {
    fn language(&self) -> &str {
        Self::LANGUAGE
    }

    fn extension(&self) -> &str {
        Self::EXTENSION
    }

    fn build_command(&self, script: &Path, payload: &str, extra_args: &[String]) -> Command {
        let mut command = match &self.executable {
            Some(shell) => {
                let mut command = Command::new(shell);
                command.args(&self.prefix_args).arg(script_arg(script));
                command
            }
            None => Command::new(direct_path(script)),
        };
        command.arg(payload).args(extra_args);

        tracing::debug!(
            "Shell interpreter built command: {} {:?}",
            command.executable,
            command.arguments
        );
        command
    }
}

/// A bare file name would otherwise be looked up on PATH
fn direct_path(script: &Path) -> String {
    match script.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => script_arg(script),
        _ => script_arg(&Path::new(".").join(script)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_execution() {
        let command = ShellInterpreter::new().build_command(
            Path::new("procedures/Bash/load.sh"),
            "{}",
            &["x".to_string()],
        );
        assert_eq!(command.executable, "procedures/Bash/load.sh");
        assert_eq!(command.arguments, vec!["{}", "x"]);

        let command = ShellInterpreter::new().build_command(Path::new("load.sh"), "{}", &[]);
        assert_eq!(command.executable, "./load.sh");
    }

    #[test]
    fn test_configured_shell() {
        let settings = CommandSettings {
            executable: Some("bash".to_string()),
            args: vec!["-e".to_string()],
        };
        let command =
            ShellInterpreter::from_settings(&settings).build_command(Path::new("a.sh"), "{}", &[]);
        assert_eq!(command.executable, "bash");
        assert_eq!(command.arguments, vec!["-e", "a.sh", "{}"]);
    }
}
