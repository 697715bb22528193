// Procedure records: a user-authored script bound to a declared language
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::dataset::Owner;
use crate::error::{DatasetError, ExecutionError, Result};
use crate::interpreter::InterpreterRegistry;

pub const MAX_NAME_LENGTH: usize = 20;
pub const MAX_COMMENTS_LENGTH: usize = 400;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Procedure {
    pub name: String,
    pub language: String,
    pub comments: String,
    pub script: PathBuf,
    pub owner: Owner,
}

impl Procedure {
    /// Create a procedure record, rejecting a script whose suffix does not
    /// match the extension registered for `language`.
    pub fn new(
        name: impl Into<String>,
        language: impl Into<String>,
        comments: impl Into<String>,
        script: impl Into<PathBuf>,
        owner: Owner,
        registry: &InterpreterRegistry,
    ) -> Result<Self> {
        let procedure = Self::unchecked(name, language, comments, script, owner);
        procedure.validate_fields()?;
        procedure.validate_against(registry)?;
        Ok(procedure)
    }

    /// Build a record without validation, as loaded from an external store
    pub fn unchecked(
        name: impl Into<String>,
        language: impl Into<String>,
        comments: impl Into<String>,
        script: impl Into<PathBuf>,
        owner: Owner,
    ) -> Self {
        Self {
            name: name.into(),
            language: language.into(),
            comments: comments.into(),
            script: script.into(),
            owner,
        }
    }

    /// Check the declared language is known and the script carries its extension
    pub fn validate_against(&self, registry: &InterpreterRegistry) -> Result<()> {
        let interpreter = registry.resolve(&self.language)?;
        check_extension(&self.script, &self.language, interpreter.extension())
    }

    fn validate_fields(&self) -> Result<()> {
        let problem = if self.name.trim().is_empty() {
            Some("name must not be empty".to_string())
        } else if self.name.chars().count() > MAX_NAME_LENGTH {
            Some(format!("name is longer than {MAX_NAME_LENGTH} characters"))
        } else if self.comments.trim().is_empty() {
            Some("comments must not be empty".to_string())
        } else if self.comments.chars().count() > MAX_COMMENTS_LENGTH {
            Some(format!("comments are longer than {MAX_COMMENTS_LENGTH} characters"))
        } else {
            None
        };

        match problem {
            Some(message) => Err(DatasetError::InvalidProcedure {
                name: self.name.clone(),
                message,
            }
            .into()),
            None => Ok(()),
        }
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\n\nDescription:\n{}",
            self.script.display(),
            self.comments
        )
    }
}

/// Suffix comparison on the file name, so `load.tar.py` satisfies `.py`
pub(crate) fn check_extension(script: &Path, language: &str, expected: &str) -> Result<()> {
    let file_name = script
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();

    if file_name.ends_with(expected) && file_name.len() > expected.len() {
        Ok(())
    } else {
        Err(ExecutionError::ExtensionMismatch {
            path: script.to_path_buf(),
            language: language.to_string(),
            expected: expected.to_string(),
        }
        .into())
    }
}
