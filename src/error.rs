//! Error handling for the blueprint generator.
//! Defines the error taxonomy and result alias used throughout the engine.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A single variable that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Name of the offending variable
    pub variable: String,
    /// What went wrong with it
    pub reason: ValidationReason,
}

/// Why a variable was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationReason {
    /// Required, not supplied and no default declared
    MissingRequired,
    /// Supplied value has the wrong type for the declaration
    TypeMismatch { expected: String, found: String },
    /// Value is not one of the declared choices
    InvalidChoice { value: String, choices: Vec<String> },
    /// Value does not match the declared validation pattern
    PatternMismatch { value: String, pattern: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            ValidationReason::MissingRequired => {
                write!(f, "missing required variable '{}'", self.variable)
            }
            ValidationReason::TypeMismatch { expected, found } => write!(
                f,
                "variable '{}' expects {expected}, got {found}",
                self.variable
            ),
            ValidationReason::InvalidChoice { value, choices } => write!(
                f,
                "invalid choice '{value}' for variable '{}' (allowed: {})",
                self.variable,
                choices.iter().map(|c| format!("'{c}'")).collect::<Vec<_>>().join(", ")
            ),
            ValidationReason::PatternMismatch { value, pattern } => write!(
                f,
                "pattern mismatch for variable '{}': '{value}' does not match '{pattern}'",
                self.variable
            ),
        }
    }
}

/// Every validation failure of one run, one entry per offending variable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, error: ValidationError) {
        self.0.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.0.iter()
    }

    /// Looks up the failure recorded for `variable`, if any.
    pub fn get(&self, variable: &str) -> Option<&ValidationError> {
        self.0.iter().find(|e| e.variable == variable)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  - {error}")?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a ValidationError;
    type IntoIter = std::slice::Iter<'a, ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Broad classification of an [`Error`], used by callers deciding how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Configuration,
    Rendering,
    Io,
    Hook,
}

/// Custom error types for blueprint operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Represents errors that occur during file system operations
    #[error("IO error: {0}.")]
    IoError(#[from] std::io::Error),

    /// Represents template syntax or rendering failures
    #[error("Template rendering error: {0}.")]
    MinijinjaError(#[from] minijinja::Error),

    #[error("Failed to parse JSON: {0}.")]
    JsonError(#[from] serde_json::Error),

    #[error("Failed to parse YAML: {0}.")]
    YamlError(#[from] serde_yaml::Error),

    /// Represents errors in the blueprint manifest itself
    #[error("Configuration error: {0}.")]
    ConfigError(String),

    /// One or more supplied variables failed validation
    #[error("Validation failed:\n{0}")]
    ValidationErrors(ValidationErrors),

    /// A condition could not be parsed
    #[error("Invalid condition '{expression}': {message}.")]
    ExpressionSyntax { expression: String, message: String },

    /// A condition references a variable that is not part of the context
    #[error("Condition '{expression}' references undefined variable '{name}'.")]
    UndefinedVariable { name: String, expression: String },

    /// A condition compares values of incompatible types
    #[error("Condition '{expression}' cannot compare {left} with {right}.")]
    TypeMismatch { expression: String, left: String, right: String },

    /// A rendered destination or working directory is not a safe relative path
    #[error("Invalid rendered path '{path}': {reason}.")]
    InvalidPath { path: String, reason: String },

    /// Two active file rules resolved to the same destination
    #[error("Destination collision: '{}' is produced by both '{first}' and '{second}'.", destination.display())]
    PathCollision { destination: PathBuf, first: String, second: String },

    /// Two active dependency entries disagree on a version
    #[error("Conflicting versions for dependency '{identifier}': '{first}' and '{second}'.")]
    DependencyConflict { identifier: String, first: String, second: String },

    /// Represents errors while reading or rewriting the dependency manifest
    #[error("Dependency manifest error in '{}': {message}.", path.display())]
    ManifestError { path: PathBuf, message: String },

    /// Hook exited unsuccessfully
    #[error("Hook '{name}' failed with {status}.\n{output}")]
    HookError { name: String, status: String, output: String },

    #[error("Cannot proceed: output directory '{output_dir}' already exists. Use --force to overwrite it.")]
    OutputDirectoryExistsError { output_dir: String },
}

impl Error {
    /// Classifies the error into the generator's error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ValidationErrors(_) => ErrorKind::Validation,
            Error::MinijinjaError(_) | Error::InvalidPath { .. } => ErrorKind::Rendering,
            Error::IoError(_) | Error::ManifestError { .. } => ErrorKind::Io,
            Error::HookError { .. } => ErrorKind::Hook,
            Error::JsonError(_)
            | Error::YamlError(_)
            | Error::ConfigError(_)
            | Error::ExpressionSyntax { .. }
            | Error::UndefinedVariable { .. }
            | Error::TypeMismatch { .. }
            | Error::PathCollision { .. }
            | Error::DependencyConflict { .. }
            | Error::OutputDirectoryExistsError { .. } => ErrorKind::Configuration,
        }
    }
}

/// Convenience type alias for Results with Error as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Default error handler that prints the error and exits the program.
///
/// # Arguments
/// * `err` - The Error to handle
///
/// # Behavior
/// Prints the error message to stderr and exits with status code 1
pub fn default_error_handler(err: Error) -> ! {
    eprintln!("{err}");
    std::process::exit(1);
}
