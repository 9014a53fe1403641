//! File materialization: turns active file rules into files on disk.
//!
//! Work happens in two passes. [`Processor::plan`] evaluates conditions and
//! renders every destination without touching the filesystem, failing on the
//! first destination collision, including a file planned where another file
//! needs a directory. [`Processor::materialize`] then renders content
//! and writes each planned file in declaration order.

use indexmap::IndexMap;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

use crate::blueprint::FileRule;
use crate::context::GenerationContext;
use crate::error::{Error, Result};
use crate::renderer::TemplateRenderer;

/// An active file rule with its destination already rendered.
#[derive(Debug, Clone)]
pub struct PlannedFile<'a> {
    pub rule: &'a FileRule,
    /// Absolute or blueprint-relative path of the template source
    pub source: PathBuf,
    /// Destination relative to the output directory
    pub destination: PathBuf,
}

/// How the content of a planned file is produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOperation {
    /// Source bytes copied verbatim
    Copy,
    /// Source rendered as a template
    Write,
}

/// Final path and bytes of one active file rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArtifact {
    pub path: PathBuf,
    pub content: Vec<u8>,
    pub operation: FileOperation,
}

/// Ensures the output directory is safe to write to.
///
/// # Errors
/// * `Error::OutputDirectoryExistsError` if the directory exists and `force` is false
pub fn ensure_output_dir<P: AsRef<Path>>(output_dir: P, force: bool) -> Result<PathBuf> {
    let output_dir = output_dir.as_ref();
    if output_dir.exists() && !force {
        return Err(Error::OutputDirectoryExistsError {
            output_dir: output_dir.display().to_string(),
        });
    }
    Ok(output_dir.to_path_buf())
}

fn write_file(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(Error::IoError)?;
    }
    fs::write(path, content).map_err(Error::IoError)
}

/// Renders and writes the files of one blueprint into one output directory.
pub struct Processor<'a> {
    renderer: &'a dyn TemplateRenderer,
    blueprint_root: &'a Path,
    output_root: &'a Path,
    context: &'a GenerationContext,
}

impl<'a> Processor<'a> {
    pub fn new(
        renderer: &'a dyn TemplateRenderer,
        blueprint_root: &'a Path,
        output_root: &'a Path,
        context: &'a GenerationContext,
    ) -> Self {
        Self { renderer, blueprint_root, output_root, context }
    }

    /// Computes every active destination without writing anything.
    ///
    /// # Errors
    /// * `Error::UndefinedVariable` / `Error::TypeMismatch` from condition evaluation
    /// * `Error::MinijinjaError` / `Error::InvalidPath` from destination rendering
    /// * `Error::ConfigError` if an active rule's template source does not exist
    /// * `Error::PathCollision` if two active rules share a destination, or one
    ///   destination lies inside another
    pub fn plan<'r>(&self, rules: &'r [FileRule]) -> Result<Vec<PlannedFile<'r>>> {
        let mut destinations: IndexMap<PathBuf, &str> = IndexMap::new();
        let mut planned = Vec::new();

        for rule in rules {
            if let Some(condition) = &rule.condition {
                if !condition.evaluate(self.context)? {
                    debug!("Skipping '{}': condition '{}' is false", rule.source, condition);
                    continue;
                }
            }

            let destination = self.renderer.render_path(&rule.destination, self.context)?;
            // A file cannot also be the parent directory of another file.
            let clash = destinations.iter().find(|(planned, _)| {
                planned.starts_with(&destination) || destination.starts_with(planned)
            });
            if let Some((_, first)) = clash {
                return Err(Error::PathCollision {
                    destination,
                    first: first.to_string(),
                    second: rule.source.clone(),
                });
            }

            let source = self.blueprint_root.join(&rule.source);
            if !source.is_file() {
                return Err(Error::ConfigError(format!(
                    "template source '{}' does not exist",
                    source.display()
                )));
            }

            debug!("Planned '{}' -> '{}'", rule.source, destination.display());
            destinations.insert(destination.clone(), &rule.source);
            planned.push(PlannedFile { rule, source, destination });
        }

        Ok(planned)
    }

    /// Produces the final path and content for one planned file.
    pub fn render(&self, planned: &PlannedFile<'_>) -> Result<RenderedArtifact> {
        let path = self.output_root.join(&planned.destination);
        if planned.rule.raw {
            let content = fs::read(&planned.source)?;
            return Ok(RenderedArtifact { path, content, operation: FileOperation::Copy });
        }

        let template = fs::read_to_string(&planned.source)?;
        let rendered = self.renderer.render(&planned.rule.source, &template, self.context)?;
        Ok(RenderedArtifact { path, content: rendered.into_bytes(), operation: FileOperation::Write })
    }

    /// Renders and writes every planned file, in order.
    ///
    /// Each successfully written path is pushed onto `written` as it lands, so
    /// the caller knows what is on disk if a later file fails. Nothing written
    /// before a failure is removed.
    pub fn materialize(&self, plan: &[PlannedFile<'_>], written: &mut Vec<PathBuf>) -> Result<()> {
        for planned in plan {
            let artifact = self.render(planned)?;
            match artifact.operation {
                FileOperation::Copy => debug!("Copying file: {}", artifact.path.display()),
                FileOperation::Write => debug!("Writing file: {}", artifact.path.display()),
            }
            write_file(&artifact.path, &artifact.content)?;
            written.push(artifact.path);
        }
        Ok(())
    }
}
