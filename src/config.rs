// Configuration handling for Lionel
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, LionelError, Result};

pub const DEFAULT_SAMPLE_LINES: usize = 10;
pub const DEFAULT_STDERR_TAIL_BYTES: usize = 8 * 1024;
pub const DEFAULT_CANDIDATES: [char; 4] = [',', '\t', ';', '|'];

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub execution: ExecutionSettings,
    #[serde(default)]
    pub sniffer: SnifferSettings,
    #[serde(default)]
    pub interpreters: InterpreterSettings,
}

/// Limits applied to every procedure execution. Both limits are off unless set.
///
/// The timeout is configured with either `timeout_secs` or `timeout_ms`;
/// `timeout_ms` wins when both are present.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutionSettings {
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    pub max_concurrent: Option<usize>,
    #[serde(default = "default_stderr_tail")]
    pub stderr_tail_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SnifferSettings {
    #[serde(default = "default_sample_lines")]
    pub sample_lines: usize,
    #[serde(default = "default_candidates")]
    pub candidates: Vec<char>,
}

/// Per-language overrides for the built-in interpreters
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InterpreterSettings {
    #[serde(default)]
    pub bash: CommandSettings,
    #[serde(default)]
    pub python: CommandSettings,
    #[serde(default)]
    pub oracle: CommandSettings,
    #[serde(default)]
    pub postgres: CommandSettings,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CommandSettings {
    /// Executable to run instead of the language default
    pub executable: Option<String>,
    /// Arguments placed before the script, e.g. a connect string
    #[serde(default)]
    pub args: Vec<String>,
}

fn default_sample_lines() -> usize {
    DEFAULT_SAMPLE_LINES
}

fn default_stderr_tail() -> usize {
    DEFAULT_STDERR_TAIL_BYTES
}

fn default_candidates() -> Vec<char> {
    DEFAULT_CANDIDATES.to_vec()
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            timeout_ms: None,
            max_concurrent: None,
            stderr_tail_bytes: DEFAULT_STDERR_TAIL_BYTES,
        }
    }
}

impl ExecutionSettings {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms
            .map(Duration::from_millis)
            .or_else(|| self.timeout_secs.map(Duration::from_secs))
    }

    /// Kept to millisecond precision; anything under 1ms becomes 1ms
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self.timeout_ms = Some(millis.max(1));
        self.timeout_secs = None;
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = Some(max_concurrent);
        self
    }
}

impl Default for SnifferSettings {
    fn default() -> Self {
        Self {
            sample_lines: DEFAULT_SAMPLE_LINES,
            candidates: default_candidates(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
                suggestion: Some(
                    "Create a lionel.yaml file or omit --config to use defaults".to_string(),
                ),
            }
            .into());
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_with_context(&content, Some(path))
    }

    /// Load the file when given, otherwise fall back to defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Self::from_yaml_with_context(yaml, None)
    }

    fn from_yaml_with_context(yaml: &str, path: Option<&Path>) -> Result<Self> {
        // An empty document means "all defaults"
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(yaml).map_err(|e| {
            let mut config_error = *Box::<ConfigError>::from(e);
            if let ConfigError::InvalidYaml {
                ref mut file_path, ..
            } = config_error
            {
                *file_path = path.map(PathBuf::from);
            }
            LionelError::Config(Box::new(config_error))
        })?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.execution.timeout_secs == Some(0) {
            return Err(invalid("execution.timeout_secs", "0", "a positive number of seconds"));
        }
        if self.execution.timeout_ms == Some(0) {
            return Err(invalid("execution.timeout_ms", "0", "a positive number of milliseconds"));
        }
        if self.execution.max_concurrent == Some(0) {
            return Err(invalid("execution.max_concurrent", "0", "at least 1"));
        }
        if self.sniffer.sample_lines == 0 {
            return Err(invalid("sniffer.sample_lines", "0", "at least 1"));
        }
        if self.sniffer.candidates.is_empty() {
            return Err(invalid("sniffer.candidates", "[]", "at least one delimiter"));
        }

        let mut seen = Vec::with_capacity(self.sniffer.candidates.len());
        for candidate in &self.sniffer.candidates {
            if seen.contains(candidate) {
                return Err(invalid(
                    "sniffer.candidates",
                    &candidate.escape_default().to_string(),
                    "distinct delimiters",
                ));
            }
            if !candidate.is_ascii()
                || candidate.is_alphanumeric()
                || *candidate == '"'
                || *candidate == '\n'
                || *candidate == '\r'
            {
                return Err(invalid(
                    "sniffer.candidates",
                    &candidate.escape_default().to_string(),
                    "an ASCII punctuation or whitespace separator",
                ));
            }
            seen.push(*candidate);
        }

        for (language, settings) in [
            ("bash", &self.interpreters.bash),
            ("python", &self.interpreters.python),
            ("oracle", &self.interpreters.oracle),
            ("postgres", &self.interpreters.postgres),
        ] {
            if settings.executable.as_deref().is_some_and(|e| e.trim().is_empty()) {
                return Err(invalid(
                    &format!("interpreters.{language}.executable"),
                    "",
                    "a command name or path",
                ));
            }
        }

        Ok(())
    }
}

fn invalid(field: &str, value: &str, expected: &str) -> LionelError {
    ConfigError::InvalidValue {
        message: format!("expected {expected}"),
        field: field.to_string(),
        value: value.to_string(),
        expected: expected.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.execution.timeout(), None);
        assert_eq!(config.execution.max_concurrent, None);
        assert_eq!(config.sniffer.sample_lines, 10);
        assert_eq!(config.sniffer.candidates, vec![',', '\t', ';', '|']);
        assert!(config.interpreters.python.executable.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
execution:
  timeout_secs: 30
  max_concurrent: 4
sniffer:
  sample_lines: 25
  candidates: [",", "|"]
interpreters:
  python:
    executable: python3
  oracle:
    args: ["-S", "inbound/secret@s1"]
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.execution.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.execution.max_concurrent, Some(4));
        assert_eq!(config.execution.stderr_tail_bytes, DEFAULT_STDERR_TAIL_BYTES);
        assert_eq!(config.sniffer.sample_lines, 25);
        assert_eq!(config.sniffer.candidates, vec![',', '|']);
        assert_eq!(
            config.interpreters.python.executable.as_deref(),
            Some("python3")
        );
        assert_eq!(config.interpreters.oracle.args.len(), 2);
    }

    #[test]
    fn test_empty_document_is_default() {
        let config = Config::from_yaml("   \n").unwrap();
        assert_eq!(config.sniffer.sample_lines, DEFAULT_SAMPLE_LINES);
    }

    #[test]
    fn test_rejects_zero_limits() {
        let err = Config::from_yaml("execution:\n  timeout_secs: 0\n").unwrap_err();
        assert!(err.to_string().contains("execution.timeout_secs"));

        let err = Config::from_yaml("execution:\n  max_concurrent: 0\n").unwrap_err();
        assert!(err.to_string().contains("execution.max_concurrent"));

        let err = Config::from_yaml("sniffer:\n  sample_lines: 0\n").unwrap_err();
        assert!(err.to_string().contains("sniffer.sample_lines"));
    }

    #[test]
    fn test_rejects_bad_candidates() {
        let err = Config::from_yaml("sniffer:\n  candidates: [\",\", \",\"]\n").unwrap_err();
        assert!(err.to_string().contains("sniffer.candidates"));

        let err = Config::from_yaml("sniffer:\n  candidates: [\"a\"]\n").unwrap_err();
        assert!(err.to_string().contains("sniffer.candidates"));

        let err = Config::from_yaml("sniffer:\n  candidates: [\"§\"]\n").unwrap_err();
        assert!(err.to_string().contains("sniffer.candidates"));
    }

    #[test]
    fn test_invalid_yaml() {
        let result = Config::from_yaml("execution: [\ninvalid");
        match result {
            Err(LionelError::Config(err)) => {
                assert!(matches!(err.as_ref(), ConfigError::InvalidYaml { .. }));
            }
            other => panic!("Expected InvalidYaml, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_file() {
        let path = PathBuf::from("/non/existent/lionel.yaml");
        match Config::from_file(&path) {
            Err(LionelError::Config(err)) => match err.as_ref() {
                ConfigError::NotFound { path: p, suggestion } => {
                    assert_eq!(p, &path);
                    assert!(suggestion.is_some());
                }
                other => panic!("Expected NotFound, got {other:?}"),
            },
            other => panic!("Expected config error, got {other:?}"),
        }
    }

    #[test]
    fn test_sub_second_timeouts() {
        let settings = ExecutionSettings::default().with_timeout(Duration::from_millis(250));
        assert_eq!(settings.timeout(), Some(Duration::from_millis(250)));

        let settings = ExecutionSettings::default().with_timeout(Duration::from_micros(10));
        assert_eq!(settings.timeout(), Some(Duration::from_millis(1)));

        let config = Config::from_yaml("execution:\n  timeout_secs: 30\n  timeout_ms: 1500\n").unwrap();
        assert_eq!(config.execution.timeout(), Some(Duration::from_millis(1500)));

        let err = Config::from_yaml("execution:\n  timeout_ms: 0\n").unwrap_err();
        assert!(err.to_string().contains("execution.timeout_ms"));
    }

    #[test]
    fn test_load_without_path() {
        let config = Config::load(None).unwrap();
        assert!(config.execution.timeout().is_none());
    }
}
