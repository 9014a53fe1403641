//! blueprint is a declarative project generator.
//! A blueprint declares variables, conditional file templates, conditional
//! dependency entries and hooks; the generator validates caller-supplied values,
//! renders the active files into an output directory, merges the active
//! dependencies into the project's manifest and runs the hooks.

/// Blueprint manifest loading
/// Supports JSON and YAML formats (blueprint.yaml, blueprint.yml, blueprint.json)
pub mod blueprint;

/// Command-line interface module for the blueprint application
pub mod cli;

/// Common constants
pub mod constants;

/// Typed variable values and the generation context
pub mod context;

/// Condition filtering of dependency entries
pub mod dependencies;

/// Error types and handling for the blueprint application
pub mod error;

/// Condition expression parsing and evaluation
pub mod expression;

/// Pure string transforms available to templates
pub mod functions;

/// Generation orchestration
/// Combines all components to generate the final output
pub mod generator;

/// Pre and post generation hook execution
pub mod hooks;

/// Logger setup for the binary
pub mod logger;

/// Dependency manifest merging (go.mod, package.json style)
pub mod manifest;

/// File planning and materialization
pub mod processor;

/// Template parsing and rendering functionality
pub mod renderer;

/// Validation of caller-supplied variable values
pub mod validation;
