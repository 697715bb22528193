// Startup-time interpreter registry
//
// The set of built-in languages is a closed table; extra plugins may be
// added through `RegistryBuilder` before `build()`. The finished registry is
// immutable and safe to share across tasks without locking.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::InterpreterSettings;
use crate::error::{ExecutionError, RegistryError, Result};

use super::python::PythonInterpreter;
use super::shell::ShellInterpreter;
use super::sql::{OracleInterpreter, PostgresInterpreter};
use super::traits::Interpreter;

/// Languages shipped with Lionel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinLanguage {
    Bash,
    Python,
    Oracle,
    Postgres,
}

impl BuiltinLanguage {
    pub const ALL: [BuiltinLanguage; 4] = [
        BuiltinLanguage::Bash,
        BuiltinLanguage::Python,
        BuiltinLanguage::Oracle,
        BuiltinLanguage::Postgres,
    ];

    pub fn language(&self) -> &'static str {
        match self {
            BuiltinLanguage::Bash => ShellInterpreter::LANGUAGE,
            BuiltinLanguage::Python => PythonInterpreter::LANGUAGE,
            BuiltinLanguage::Oracle => OracleInterpreter::LANGUAGE,
            BuiltinLanguage::Postgres => PostgresInterpreter::LANGUAGE,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            BuiltinLanguage::Bash => ShellInterpreter::EXTENSION,
            BuiltinLanguage::Python => PythonInterpreter::EXTENSION,
            BuiltinLanguage::Oracle => OracleInterpreter::EXTENSION,
            BuiltinLanguage::Postgres => PostgresInterpreter::EXTENSION,
        }
    }

    pub fn instantiate(&self, settings: &InterpreterSettings) -> Arc<dyn Interpreter> {
        match self {
            BuiltinLanguage::Bash => Arc::new(ShellInterpreter::from_settings(&settings.bash)),
            BuiltinLanguage::Python => Arc::new(PythonInterpreter::from_settings(&settings.python)),
            BuiltinLanguage::Oracle => Arc::new(OracleInterpreter::from_settings(&settings.oracle)),
            BuiltinLanguage::Postgres => {
                Arc::new(PostgresInterpreter::from_settings(&settings.postgres))
            }
        }
    }
}

/// Collects interpreter candidates and validates them into a registry
#[derive(Default)]
pub struct RegistryBuilder {
    candidates: Vec<Arc<dyn Interpreter>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add every built-in language configured from `settings`
    pub fn with_builtins(mut self, settings: &InterpreterSettings) -> Self {
        self.candidates
            .extend(BuiltinLanguage::ALL.iter().map(|b| b.instantiate(settings)));
        self
    }

    pub fn with_plugin(mut self, plugin: Arc<dyn Interpreter>) -> Self {
        self.candidates.push(plugin);
        self
    }

    /// Validate every candidate. An empty language or extension, or a
    /// language claimed twice, rejects the whole registry.
    pub fn build(self) -> Result<InterpreterRegistry> {
        let mut interpreters: HashMap<String, Arc<dyn Interpreter>> = HashMap::new();
        let mut order = Vec::with_capacity(self.candidates.len());

        for (index, candidate) in self.candidates.into_iter().enumerate() {
            let language = candidate.language().trim().to_string();
            if language.is_empty() {
                return Err(RegistryError::MissingLanguage {
                    plugin: format!("#{index} (extension {:?})", candidate.extension()),
                }
                .into());
            }
            if candidate.extension().trim().is_empty() {
                return Err(RegistryError::MissingExtension { language }.into());
            }
            if interpreters.contains_key(&language) {
                return Err(RegistryError::DuplicateLanguage { language }.into());
            }

            tracing::debug!(
                language = %language,
                extension = %candidate.extension(),
                "Registered interpreter"
            );
            order.push(language.clone());
            interpreters.insert(language, candidate);
        }

        Ok(InterpreterRegistry {
            interpreters,
            order,
        })
    }
}

/// Immutable language → interpreter map
pub struct InterpreterRegistry {
    interpreters: HashMap<String, Arc<dyn Interpreter>>,
    order: Vec<String>,
}

impl InterpreterRegistry {
    /// Build the registry of built-in interpreters
    pub fn discover(settings: &InterpreterSettings) -> Result<Self> {
        RegistryBuilder::new().with_builtins(settings).build()
    }

    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn get(&self, language: &str) -> Option<Arc<dyn Interpreter>> {
        self.interpreters.get(language).cloned()
    }

    /// Look up a language, failing with `UnknownLanguage` listing what is available
    pub fn resolve(&self, language: &str) -> Result<Arc<dyn Interpreter>> {
        self.get(language).ok_or_else(|| {
            ExecutionError::UnknownLanguage {
                language: language.to_string(),
                available: self.languages(),
            }
            .into()
        })
    }

    pub fn contains(&self, language: &str) -> bool {
        self.interpreters.contains_key(language)
    }

    pub fn extension_for(&self, language: &str) -> Option<&str> {
        self.interpreters.get(language).map(|i| i.extension())
    }

    /// Languages in registration order
    pub fn languages(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.interpreters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interpreters.is_empty()
    }
}

impl std::fmt::Debug for InterpreterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterpreterRegistry")
            .field("languages", &self.order)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LionelError;
    use crate::interpreter::Command;
    use std::path::Path;

    struct FakeInterpreter {
        language: &'static str,
        extension: &'static str,
    }

    impl Interpreter for FakeInterpreter {
        fn language(&self) -> &str {
            self.language
        }

        fn extension(&self) -> &str {
            self.extension
        }

        fn build_command(&self, script: &Path, payload: &str, _extra_args: &[String]) -> Command {
            let mut command = Command::new("fake");
            command.arg(script.to_string_lossy()).arg(payload);
            command
        }
    }

    fn fake(language: &'static str, extension: &'static str) -> Arc<dyn Interpreter> {
        Arc::new(FakeInterpreter {
            language,
            extension,
        })
    }

    #[test]
    fn test_discover_builtins() {
        let registry = InterpreterRegistry::discover(&InterpreterSettings::default()).unwrap();
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.languages(), vec!["Bash", "Python", "oracle", "postgres"]);
        assert_eq!(registry.extension_for("Python"), Some(".py"));
        assert_eq!(registry.extension_for("Bash"), Some(".sh"));
        assert_eq!(registry.extension_for("oracle"), Some(".sql"));
        assert!(registry.get("cobol").is_none());
    }

    #[test]
    fn test_builtin_table_matches_instances() {
        let settings = InterpreterSettings::default();
        for builtin in BuiltinLanguage::ALL {
            let instance = builtin.instantiate(&settings);
            assert_eq!(instance.language(), builtin.language());
            assert_eq!(instance.extension(), builtin.extension());
        }
    }

    #[test]
    fn test_plugin_extends_builtins() {
        let registry = RegistryBuilder::new()
            .with_builtins(&InterpreterSettings::default())
            .with_plugin(fake("R", ".R"))
            .build()
            .unwrap();
        assert!(registry.contains("R"));
        assert_eq!(registry.languages().last().map(String::as_str), Some("R"));
    }

    #[test]
    fn test_missing_language_is_fatal() {
        let result = RegistryBuilder::new().with_plugin(fake("  ", ".x")).build();
        match result {
            Err(LionelError::Registry(err)) => {
                assert!(matches!(err.as_ref(), RegistryError::MissingLanguage { .. }));
                assert!(err.to_string().contains(".x"));
            }
            other => panic!("Expected MissingLanguage, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_extension_is_fatal() {
        let result = RegistryBuilder::new().with_plugin(fake("Perl", "")).build();
        match result {
            Err(LionelError::Registry(err)) => match err.as_ref() {
                RegistryError::MissingExtension { language } => assert_eq!(language, "Perl"),
                other => panic!("Expected MissingExtension, got {other:?}"),
            },
            other => panic!("Expected registry error, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_language_is_fatal() {
        let result = RegistryBuilder::new()
            .with_builtins(&InterpreterSettings::default())
            .with_plugin(fake("Python", ".py3"))
            .build();
        match result {
            Err(LionelError::Registry(err)) => match err.as_ref() {
                RegistryError::DuplicateLanguage { language } => assert_eq!(language, "Python"),
                other => panic!("Expected DuplicateLanguage, got {other:?}"),
            },
            other => panic!("Expected registry error, got {other:?}"),
        }
    }

    #[test]
    fn test_resolve_unknown_language() {
        let registry = InterpreterRegistry::discover(&InterpreterSettings::default()).unwrap();
        let err = registry.resolve("cobol").err().expect("expected resolve error");
        assert!(err.is_validation_error());
        assert!(err.to_string().contains("cobol"));
    }
}
