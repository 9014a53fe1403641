//! Merging resolved dependencies into the generated project's dependency manifest.
//!
//! A merge only adds entries or updates the version of an entry with the same
//! identifier. Unrelated entries and any other content are kept.

use log::{debug, info};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::blueprint::{ManifestConfig, ManifestFormat};
use crate::dependencies::ResolvedDependency;
use crate::error::{Error, Result};

/// A dependency manifest file format.
pub trait DependencyManifest {
    /// Merges `dependencies` into `existing` content (`None` when the file does
    /// not exist yet) and returns the new content.
    fn merge(
        &self,
        existing: Option<&str>,
        dependencies: &[ResolvedDependency],
    ) -> std::result::Result<String, String>;
}

/// `go.mod` style manifest with `require` directives.
#[derive(Debug, Default)]
pub struct GoModManifest;

/// JSON document with a `dependencies` object, package.json style.
#[derive(Debug, Default)]
pub struct JsonManifest;

pub fn manifest_for(format: ManifestFormat) -> Box<dyn DependencyManifest> {
    match format {
        ManifestFormat::GoMod => Box::new(GoModManifest),
        ManifestFormat::Json => Box::new(JsonManifest),
    }
}

/// Splits `module version [// comment]` into its parts.
fn parse_require_spec(spec: &str) -> Option<(&str, &str, &str)> {
    let (body, comment) = match spec.find("//") {
        Some(pos) => (&spec[..pos], &spec[pos..]),
        None => (spec, ""),
    };
    let mut parts = body.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(module), Some(version), None) => Some((module, version, comment)),
        _ => None,
    }
}

/// Returns the text after a `require` keyword, if the line is a require directive.
fn strip_require(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("require")?;
    match rest.chars().next() {
        Some(c) if c.is_whitespace() || c == '(' => Some(rest.trim_start()),
        _ => None,
    }
}

fn with_comment(line: String, comment: &str) -> String {
    if comment.is_empty() {
        line
    } else {
        format!("{line} {comment}")
    }
}

impl DependencyManifest for GoModManifest {
    fn merge(
        &self,
        existing: Option<&str>,
        dependencies: &[ResolvedDependency],
    ) -> std::result::Result<String, String> {
        let mut lines: Vec<String> = existing.unwrap_or_default().lines().map(String::from).collect();

        // module -> (line index, inside a require block)
        let mut index: HashMap<String, (usize, bool)> = HashMap::new();
        let mut in_block = false;
        let mut last_block_end = None;

        for (i, line) in lines.iter().enumerate() {
            let trimmed = line.trim();
            if in_block {
                if trimmed == ")" {
                    in_block = false;
                    last_block_end = Some(i);
                } else if let Some((module, _, _)) = parse_require_spec(trimmed) {
                    index.insert(module.to_string(), (i, true));
                }
                continue;
            }
            if let Some(rest) = strip_require(trimmed) {
                if let Some(inner) = rest.strip_prefix('(') {
                    in_block = inner.trim() != ")";
                } else if let Some((module, _, _)) = parse_require_spec(rest) {
                    index.insert(module.to_string(), (i, false));
                }
            }
        }
        if in_block {
            return Err("unterminated require block".to_string());
        }

        let mut appended = Vec::new();
        for dep in dependencies {
            match index.get(&dep.identifier) {
                Some(&(i, block)) => {
                    let line = &lines[i];
                    let indent: String = line.chars().take_while(|c| c.is_whitespace()).collect();
                    let spec = if block { line.trim() } else { strip_require(line.trim()).unwrap_or_default() };
                    let comment = parse_require_spec(spec).map(|(_, _, c)| c).unwrap_or_default();
                    let replacement = if block {
                        format!("{indent}{} {}", dep.identifier, dep.version)
                    } else {
                        format!("{indent}require {} {}", dep.identifier, dep.version)
                    };
                    debug!("Updating {} in manifest", dep);
                    lines[i] = with_comment(replacement, comment);
                }
                None => {
                    debug!("Adding {} to manifest", dep);
                    appended.push(format!("\t{} {}", dep.identifier, dep.version));
                }
            }
        }

        if !appended.is_empty() {
            match last_block_end {
                Some(end) => {
                    lines.splice(end..end, appended);
                }
                None => {
                    if lines.last().is_some_and(|l| !l.trim().is_empty()) {
                        lines.push(String::new());
                    }
                    lines.push("require (".to_string());
                    lines.extend(appended);
                    lines.push(")".to_string());
                }
            }
        }

        let mut content = lines.join("\n");
        content.push('\n');
        Ok(content)
    }
}

impl DependencyManifest for JsonManifest {
    fn merge(
        &self,
        existing: Option<&str>,
        dependencies: &[ResolvedDependency],
    ) -> std::result::Result<String, String> {
        let mut document = match existing {
            Some(content) if !content.trim().is_empty() => {
                serde_json::from_str::<serde_json::Value>(content).map_err(|e| e.to_string())?
            }
            _ => serde_json::Value::Object(serde_json::Map::new()),
        };

        let root = document
            .as_object_mut()
            .ok_or_else(|| "top-level value must be an object".to_string())?;
        let section = root
            .entry("dependencies")
            .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()))
            .as_object_mut()
            .ok_or_else(|| "'dependencies' must be an object".to_string())?;

        for dep in dependencies {
            section.insert(dep.identifier.clone(), serde_json::Value::String(dep.version.clone()));
        }

        let mut content = serde_json::to_string_pretty(&document).map_err(|e| e.to_string())?;
        content.push('\n');
        Ok(content)
    }
}

/// Merges `dependencies` into the manifest file below `output_root`.
///
/// With no dependencies the file is left untouched. A missing file is created.
///
/// # Returns
/// * `Result<Option<PathBuf>>` - Path of the manifest if it was rewritten
///
/// # Errors
/// * `Error::ManifestError` if the existing file cannot be parsed
/// * `Error::IoError` if reading or writing fails
pub fn merge_into_file(
    output_root: &Path,
    config: &ManifestConfig,
    dependencies: &[ResolvedDependency],
) -> Result<Option<PathBuf>> {
    if dependencies.is_empty() {
        debug!("No active dependencies, leaving {} untouched", config.path.display());
        return Ok(None);
    }

    let path = output_root.join(&config.path);
    let existing = if path.exists() { Some(fs::read_to_string(&path)?) } else { None };

    let merged = manifest_for(config.format)
        .merge(existing.as_deref(), dependencies)
        .map_err(|message| Error::ManifestError { path: path.clone(), message })?;

    if existing.as_deref() == Some(merged.as_str()) {
        return Ok(None);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, merged)?;
    info!("Merged {} dependencies into {}", dependencies.len(), path.display());
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dep(identifier: &str, version: &str) -> ResolvedDependency {
        ResolvedDependency { identifier: identifier.to_string(), version: version.to_string() }
    }

    #[test]
    fn test_go_mod_appends_to_existing_block() {
        let existing = "module example.com/app\n\ngo 1.22\n\nrequire (\n\tgithub.com/a/a v1.0.0\n)\n";
        let merged = GoModManifest
            .merge(Some(existing), &[dep("github.com/b/b", "v2.0.0")])
            .unwrap();
        assert_eq!(
            merged,
            "module example.com/app\n\ngo 1.22\n\nrequire (\n\tgithub.com/a/a v1.0.0\n\tgithub.com/b/b v2.0.0\n)\n"
        );
    }

    #[test]
    fn test_go_mod_updates_in_place_and_keeps_comments() {
        let existing = "module m\n\nrequire github.com/a/a v1.0.0 // indirect\n";
        let merged = GoModManifest
            .merge(Some(existing), &[dep("github.com/a/a", "v1.1.0"), dep("github.com/c/c", "v0.1.0")])
            .unwrap();
        assert_eq!(
            merged,
            "module m\n\nrequire github.com/a/a v1.1.0 // indirect\n\nrequire (\n\tgithub.com/c/c v0.1.0\n)\n"
        );
    }

    #[test]
    fn test_go_mod_unterminated_block() {
        let err = GoModManifest.merge(Some("require (\n\ta v1\n"), &[dep("b", "v1")]).unwrap_err();
        assert!(err.contains("unterminated"));
    }

    #[test]
    fn test_json_merge_preserves_unrelated_entries() {
        let existing = r#"{"name": "web", "dependencies": {"react": "18.0.0"}, "private": true}"#;
        let merged = JsonManifest
            .merge(Some(existing), &[dep("zod", "3.22.0"), dep("react", "18.2.0")])
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&merged).unwrap();
        assert_eq!(value["name"], "web");
        assert_eq!(value["private"], true);
        assert_eq!(value["dependencies"]["react"], "18.2.0");
        assert_eq!(value["dependencies"]["zod"], "3.22.0");
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["name", "dependencies", "private"]);
    }
}
