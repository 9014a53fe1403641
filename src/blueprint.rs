//! Blueprint manifest loading.
//! Supports JSON and YAML formats (blueprint.yaml, blueprint.yml, blueprint.json).
//!
//! The raw document is deserialized first, then checked and converted into an
//! immutable [`Blueprint`]: conditions are parsed into expressions, patterns are
//! compiled and declared defaults are validated against their own declaration.

use crate::constants::CONFIG_FILES;
use crate::error::{Error, Result, ValidationError};
use crate::expression::Expression;
use crate::hooks::variable_env_name;
use crate::renderer::validate_relative_path;
use indexmap::IndexMap;
use log::debug;
use regex::Regex;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Declared type of a blueprint variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    #[serde(alias = "str")]
    String,
    #[serde(alias = "int")]
    Integer,
    #[serde(alias = "bool")]
    Boolean,
    #[serde(alias = "enum")]
    Choice,
}

impl VariableType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariableType::String => "string",
            VariableType::Integer => "integer",
            VariableType::Boolean => "boolean",
            VariableType::Choice => "choice",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPhase {
    PreGeneration,
    #[default]
    PostGeneration,
}

impl HookPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookPhase::PreGeneration => "pre_generation",
            HookPhase::PostGeneration => "post_generation",
        }
    }
}

/// What happens to the remaining hooks when one fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop and report; later hooks do not run
    #[default]
    Abort,
    /// Record the failure and carry on with the next hook
    Continue,
}

/// On-disk format of the dependency manifest merged dependencies go into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestFormat {
    #[serde(alias = "go.mod")]
    GoMod,
    Json,
}

#[derive(Debug, Clone)]
pub struct VariableDefinition {
    pub name: String,
    pub var_type: VariableType,
    pub required: bool,
    pub default: Option<serde_json::Value>,
    pub pattern: Option<Regex>,
    pub choices: Vec<String>,
    pub multiselect: bool,
    pub help: String,
}

#[derive(Debug, Clone)]
pub struct FileRule {
    /// Template path relative to the blueprint root
    pub source: String,
    /// Destination path expression, relative to the output directory
    pub destination: String,
    pub condition: Option<Expression>,
    /// Copy the source verbatim instead of rendering it
    pub raw: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEntry {
    pub identifier: String,
    pub version: String,
    pub condition: Option<Expression>,
}

/// A hook command as written in the manifest. Every part may contain placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandTemplate {
    /// Program followed by its arguments, each rendered on its own
    Args(Vec<String>),
    /// One command line, rendered as a whole and then split with shell quoting rules
    Line(String),
}

#[derive(Debug, Clone)]
pub struct Hook {
    pub name: String,
    pub command: CommandTemplate,
    /// Working directory expression, relative to the output directory
    pub working_dir: Option<String>,
    pub phase: HookPhase,
    pub on_failure: FailurePolicy,
    pub env: IndexMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct Feature {
    pub name: String,
    pub enabled_when: Option<Expression>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestConfig {
    pub path: PathBuf,
    pub format: ManifestFormat,
}

/// A loaded, checked blueprint. Immutable once built.
#[derive(Debug, Clone)]
pub struct Blueprint {
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    /// Directory template sources are resolved against
    pub root: PathBuf,
    pub variables: Vec<VariableDefinition>,
    pub files: Vec<FileRule>,
    pub dependencies: Vec<DependencyEntry>,
    pub hooks: Vec<Hook>,
    pub features: Vec<Feature>,
    pub manifest: Option<ManifestConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawBlueprint {
    name: String,
    #[serde(default = "default_version")]
    version: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    variables: Vec<RawVariable>,
    #[serde(default)]
    files: Vec<RawFileRule>,
    #[serde(default)]
    dependencies: Vec<RawDependency>,
    #[serde(default)]
    hooks: Vec<RawHook>,
    #[serde(default)]
    features: Vec<RawFeature>,
    #[serde(default)]
    manifest: Option<RawManifest>,
}

fn default_version() -> String {
    "0.0.0".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawVariable {
    name: String,
    #[serde(rename = "type")]
    var_type: VariableType,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    default: Option<serde_json::Value>,
    #[serde(default, alias = "validation")]
    pattern: Option<String>,
    #[serde(default)]
    choices: Vec<String>,
    #[serde(default)]
    multiselect: bool,
    #[serde(default)]
    help: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFileRule {
    source: String,
    destination: String,
    #[serde(default, alias = "when")]
    condition: Option<String>,
    #[serde(default)]
    raw: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDependency {
    #[serde(alias = "module")]
    identifier: String,
    version: String,
    #[serde(default, alias = "when")]
    condition: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawCommand {
    Args(Vec<String>),
    Line(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawHook {
    name: String,
    command: RawCommand,
    #[serde(default)]
    working_dir: Option<String>,
    #[serde(default)]
    phase: HookPhase,
    #[serde(default)]
    on_failure: FailurePolicy,
    #[serde(default)]
    env: IndexMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFeature {
    name: String,
    #[serde(default)]
    enabled_when: Option<String>,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManifest {
    path: String,
    #[serde(default)]
    format: Option<ManifestFormat>,
}

/// Locates the manifest file inside a blueprint directory.
///
/// # Arguments
/// * `blueprint_dir` - Directory containing the blueprint
/// * `config_files` - Candidate file names, tried in order
///
/// # Errors
/// * `Error::ConfigError` if none of the candidates exists
pub fn find_manifest<P: AsRef<Path>>(blueprint_dir: P, config_files: &[&str]) -> Result<PathBuf> {
    let blueprint_dir = blueprint_dir.as_ref();
    for file in config_files {
        let path = blueprint_dir.join(file);
        if path.is_file() {
            return Ok(path);
        }
    }

    Err(Error::ConfigError(format!(
        "No blueprint manifest found in '{}' (tried: {})",
        blueprint_dir.display(),
        config_files.join(", ")
    )))
}

fn parse_condition(source: Option<String>) -> Result<Option<Expression>> {
    match source {
        Some(text) if !text.trim().is_empty() => Expression::parse(&text).map(Some),
        _ => Ok(None),
    }
}

impl Blueprint {
    /// Loads the blueprint found in `blueprint_dir`.
    ///
    /// # Errors
    /// * `Error::ConfigError` if no manifest exists or the manifest is inconsistent
    /// * `Error::YamlError` if the manifest cannot be parsed
    /// * `Error::ExpressionSyntax` if a condition is malformed
    pub fn load<P: AsRef<Path>>(blueprint_dir: P) -> Result<Self> {
        let blueprint_dir = blueprint_dir.as_ref();
        let manifest_path = find_manifest(blueprint_dir, &CONFIG_FILES)?;
        debug!("Loading blueprint from {}", manifest_path.display());
        let content = std::fs::read_to_string(&manifest_path)?;
        Self::parse(&content, blueprint_dir)
    }

    /// Parses manifest content; template sources resolve against `root`.
    pub fn parse<P: AsRef<Path>>(content: &str, root: P) -> Result<Self> {
        let raw: RawBlueprint = match serde_json::from_str(content) {
            Ok(raw) => raw,
            Err(_) => serde_yaml::from_str(content)?,
        };
        Self::from_raw(raw, root.as_ref().to_path_buf())
    }

    fn from_raw(raw: RawBlueprint, root: PathBuf) -> Result<Self> {
        if raw.name.trim().is_empty() {
            return Err(Error::ConfigError("blueprint name must not be empty".to_string()));
        }

        let mut seen = HashSet::new();
        // Hook env var name -> variable exporting it
        let mut env_names: HashMap<String, String> = HashMap::new();
        let mut variables = Vec::with_capacity(raw.variables.len());
        for var in raw.variables {
            if !seen.insert(var.name.clone()) {
                return Err(Error::ConfigError(format!("duplicate variable '{}'", var.name)));
            }
            let env_name = variable_env_name(&var.name);
            if let Some(other) = env_names.insert(env_name.clone(), var.name.clone()) {
                return Err(Error::ConfigError(format!(
                    "variables '{other}' and '{}' both map to hook environment variable '{env_name}'",
                    var.name
                )));
            }
            variables.push(VariableDefinition::from_raw(var)?);
        }

        let files = raw
            .files
            .into_iter()
            .map(|rule| {
                validate_relative_path(&rule.source).map_err(|e| {
                    Error::ConfigError(format!("invalid file source '{}': {e}", rule.source))
                })?;
                if rule.destination.trim().is_empty() {
                    return Err(Error::ConfigError(format!(
                        "file rule '{}' has an empty destination",
                        rule.source
                    )));
                }
                Ok(FileRule {
                    source: rule.source,
                    destination: rule.destination,
                    condition: parse_condition(rule.condition)?,
                    raw: rule.raw,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let dependencies = raw
            .dependencies
            .into_iter()
            .map(|dep| {
                if dep.identifier.trim().is_empty() || dep.version.trim().is_empty() {
                    return Err(Error::ConfigError(
                        "dependency entries need both an identifier and a version".to_string(),
                    ));
                }
                Ok(DependencyEntry {
                    identifier: dep.identifier,
                    version: dep.version,
                    condition: parse_condition(dep.condition)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let hooks = raw.hooks.into_iter().map(Hook::from_raw).collect::<Result<Vec<_>>>()?;

        let mut feature_names = HashSet::new();
        let features = raw
            .features
            .into_iter()
            .map(|feature| {
                if !feature_names.insert(feature.name.clone()) {
                    return Err(Error::ConfigError(format!(
                        "duplicate feature '{}'",
                        feature.name
                    )));
                }
                Ok(Feature {
                    name: feature.name,
                    enabled_when: parse_condition(feature.enabled_when)?,
                    description: feature.description,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let manifest = match raw.manifest {
            Some(manifest) => {
                let path = validate_relative_path(&manifest.path).map_err(|e| {
                    Error::ConfigError(format!("invalid manifest path '{}': {e}", manifest.path))
                })?;
                let format = manifest.format.unwrap_or_else(|| {
                    if manifest.path.ends_with(".json") {
                        ManifestFormat::Json
                    } else {
                        ManifestFormat::GoMod
                    }
                });
                Some(ManifestConfig { path, format })
            }
            None => None,
        };

        Ok(Self {
            name: raw.name,
            version: raw.version,
            description: raw.description,
            root,
            variables,
            files,
            dependencies,
            hooks,
            features,
            manifest,
        })
    }

    pub fn variable(&self, name: &str) -> Option<&VariableDefinition> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Every condition declared anywhere in the blueprint.
    pub fn conditions(&self) -> impl Iterator<Item = &Expression> {
        let files = self.files.iter().filter_map(|f| f.condition.as_ref());
        let deps = self.dependencies.iter().filter_map(|d| d.condition.as_ref());
        let features = self.features.iter().filter_map(|f| f.enabled_when.as_ref());
        files.chain(deps).chain(features)
    }
}

impl VariableDefinition {
    fn from_raw(raw: RawVariable) -> Result<Self> {
        let config_error = |msg: String| Error::ConfigError(format!("variable '{}': {msg}", raw.name));

        if raw.name.trim().is_empty() {
            return Err(Error::ConfigError("variable name must not be empty".to_string()));
        }
        if raw.var_type == VariableType::Choice && raw.choices.is_empty() {
            return Err(config_error("choice variables must declare choices".to_string()));
        }
        if raw.multiselect && raw.var_type != VariableType::Choice {
            return Err(config_error("only choice variables can be multiselect".to_string()));
        }
        let pattern = match &raw.pattern {
            Some(pattern) => Some(
                Regex::new(pattern).map_err(|e| config_error(format!("invalid pattern: {e}")))?,
            ),
            None => None,
        };

        let definition = Self {
            name: raw.name.clone(),
            var_type: raw.var_type,
            required: raw.required,
            default: raw.default.filter(|v| !v.is_null()),
            pattern,
            choices: raw.choices,
            multiselect: raw.multiselect,
            help: raw.help,
        };

        if let Some(default) = &definition.default {
            definition.check(default).map_err(|reason| {
                let error = ValidationError { variable: definition.name.clone(), reason };
                config_error(format!("invalid default value ({error})"))
            })?;
        }

        Ok(definition)
    }
}

impl Hook {
    fn from_raw(raw: RawHook) -> Result<Self> {
        let command = match raw.command {
            RawCommand::Args(args) => CommandTemplate::Args(args),
            RawCommand::Line(line) => CommandTemplate::Line(line),
        };
        let empty = match &command {
            CommandTemplate::Args(args) => args.first().map_or(true, |p| p.trim().is_empty()),
            CommandTemplate::Line(line) => line.trim().is_empty(),
        };
        if empty {
            return Err(Error::ConfigError(format!("hook '{}' has an empty command", raw.name)));
        }

        Ok(Self {
            name: raw.name,
            command,
            working_dir: raw.working_dir.filter(|dir| !dir.trim().is_empty()),
            phase: raw.phase,
            on_failure: raw.on_failure,
            env: raw.env,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_yaml_blueprint() {
        let content = r#"
name: service
version: 1.2.0
variables:
  - name: ProjectName
    type: string
    required: true
    pattern: "^[a-z]+$"
  - name: AuthType
    type: choice
    choices: ["", "jwt"]
files:
  - source: templates/main.go.tmpl
    destination: "cmd/{{ ProjectName }}/main.go"
  - source: templates/auth.go.tmpl
    destination: internal/auth/auth.go
    condition: AuthType != ""
dependencies:
  - identifier: github.com/golang-jwt/jwt/v5
    version: v5.2.0
    condition: AuthType == "jwt"
hooks:
  - name: tidy
    command: go mod tidy
  - name: fmt
    command: ["gofmt", "-w", "."]
    on_failure: continue
manifest:
  path: go.mod
"#;
        let blueprint = Blueprint::parse(content, "/tmp/bp").unwrap();
        assert_eq!(blueprint.name, "service");
        assert_eq!(blueprint.variables.len(), 2);
        assert!(blueprint.files[0].condition.is_none());
        assert!(blueprint.files[1].condition.is_some());
        assert_eq!(blueprint.hooks[0].command, CommandTemplate::Line("go mod tidy".to_string()));
        assert_eq!(
            blueprint.hooks[1].command,
            CommandTemplate::Args(vec!["gofmt".into(), "-w".into(), ".".into()])
        );
        assert_eq!(blueprint.hooks[1].on_failure, FailurePolicy::Continue);
        assert_eq!(blueprint.hooks[1].phase, HookPhase::PostGeneration);
        assert_eq!(blueprint.manifest.as_ref().unwrap().format, ManifestFormat::GoMod);
        assert_eq!(blueprint.conditions().count(), 2);
    }

    #[test]
    fn test_parse_json_blueprint() {
        let content = r#"{"name": "web", "variables": [{"name": "Port", "type": "int", "default": 8080}]}"#;
        let blueprint = Blueprint::parse(content, ".").unwrap();
        assert_eq!(blueprint.version, "0.0.0");
        assert_eq!(blueprint.variables[0].var_type, VariableType::Integer);
    }

    #[test]
    fn test_rejects_inconsistent_declarations() {
        let cases = [
            r#"{"name": "x", "variables": [{"name": "A", "type": "string"}, {"name": "A", "type": "string"}]}"#,
            r#"{"name": "x", "variables": [{"name": "A", "type": "choice"}]}"#,
            r#"{"name": "x", "variables": [{"name": "A", "type": "string", "pattern": "("}]}"#,
            r#"{"name": "x", "variables": [{"name": "A", "type": "choice", "choices": ["a"], "default": "b"}]}"#,
            r#"{"name": "x", "hooks": [{"name": "h", "command": []}]}"#,
            r#"{"name": "x", "hooks": [{"name": "h", "command": "  "}]}"#,
            r#"{"name": "x", "files": [{"source": "../escape", "destination": "a"}]}"#,
            r#"{"name": "x", "variables": [{"name": "projectName", "type": "string"}, {"name": "project_name", "type": "string"}]}"#,
            r#"{"name": "x", "features": [{"name": "auth"}, {"name": "auth"}]}"#,
        ];
        for content in cases {
            let err = Blueprint::parse(content, ".").unwrap_err();
            assert!(matches!(err, Error::ConfigError(_)), "{content}: {err:?}");
        }
    }

    #[test]
    fn test_malformed_condition_fails_at_load() {
        let content = r#"{"name": "x", "files": [{"source": "a", "destination": "a", "condition": "A =="}]}"#;
        let err = Blueprint::parse(content, ".").unwrap_err();
        assert!(matches!(err, Error::ExpressionSyntax { .. }));
    }
}
