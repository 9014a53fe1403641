//! Generation orchestration.
//!
//! Sequences the stages of one run: validate the caller's values, check every
//! condition's references, resolve dependencies, plan the output tree, then
//! write files, merge the dependency manifest and run hooks. The first failing
//! stage stops the run.

use log::{debug, info, warn};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::blueprint::{Blueprint, HookPhase};
use crate::context::GenerationContext;
use crate::dependencies::{self, ResolvedDependency};
use crate::error::{Error, Result};
use crate::functions::FunctionRegistry;
use crate::hooks::{HookExecutor, HookResult, HookRunner, ProcessExecutor};
use crate::manifest;
use crate::processor::{ensure_output_dir, Processor};
use crate::renderer::{MiniJinjaRenderer, TemplateRenderer};
use crate::validation::{validate, RawInput};

/// Switches controlling one generation run.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerationOptions {
    /// Allow generating into an existing output directory
    pub force: bool,
    /// Do not execute any hooks
    pub skip_hooks: bool,
}

/// What a successful run produced.
#[derive(Debug, Clone, Default)]
pub struct GenerationReport {
    /// Files written, in the order they were written
    pub written: Vec<PathBuf>,
    /// Active dependencies after filtering and deduplication
    pub dependencies: Vec<ResolvedDependency>,
    /// Dependency manifest path, if it was rewritten
    pub manifest: Option<PathBuf>,
    /// Names of enabled features
    pub features: Vec<String>,
    pub hooks: Vec<HookResult>,
}

/// State of the output directory when a run failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputState {
    /// Nothing was created or written
    Untouched,
    /// The output directory was created and the listed files were written.
    /// They are left in place.
    Partial { written: Vec<PathBuf> },
}

/// A failed run: the error plus what it left on disk.
#[derive(Debug)]
pub struct GenerationFailure {
    pub error: Error,
    pub state: OutputState,
}

impl GenerationFailure {
    pub fn nothing_written(&self) -> bool {
        self.state == OutputState::Untouched
    }
}

impl fmt::Display for GenerationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;
        if let OutputState::Partial { written } = &self.state {
            write!(
                f,
                "\nGeneration stopped after writing {} file(s); the partial output was left in place.",
                written.len()
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for GenerationFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Evaluates every feature flag, returning the names of the enabled ones.
pub fn enabled_features(blueprint: &Blueprint, context: &GenerationContext) -> Result<Vec<String>> {
    let mut enabled = Vec::new();
    for feature in &blueprint.features {
        let on = match &feature.enabled_when {
            Some(condition) => condition.evaluate(context)?,
            None => true,
        };
        debug!("Feature '{}' {}", feature.name, if on { "enabled" } else { "disabled" });
        if on {
            enabled.push(feature.name.clone());
        }
    }
    Ok(enabled)
}

/// Checks every condition in the blueprint for references missing from `context`.
pub fn check_condition_references(blueprint: &Blueprint, context: &GenerationContext) -> Result<()> {
    blueprint.conditions().try_for_each(|condition| condition.check_references(context))
}

/// Runs blueprints with a given renderer and hook executor.
pub struct Generator<'a> {
    renderer: &'a dyn TemplateRenderer,
    executor: &'a dyn HookExecutor,
    options: GenerationOptions,
}

impl<'a> Generator<'a> {
    pub fn new(renderer: &'a dyn TemplateRenderer, executor: &'a dyn HookExecutor) -> Self {
        Self { renderer, executor, options: GenerationOptions::default() }
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    /// Generates `blueprint` into `output_dir` using the caller's `input`.
    ///
    /// # Errors
    /// Returns a [`GenerationFailure`] carrying the first error and whether the
    /// output directory was left untouched or partially written.
    pub fn generate(
        &self,
        blueprint: &Blueprint,
        input: &RawInput,
        output_dir: &Path,
    ) -> std::result::Result<GenerationReport, GenerationFailure> {
        let mut report = GenerationReport::default();
        let mut touched = false;

        match self.run(blueprint, input, output_dir, &mut report, &mut touched) {
            Ok(()) => Ok(report),
            Err(error) => {
                let state = if touched {
                    OutputState::Partial { written: report.written }
                } else {
                    OutputState::Untouched
                };
                Err(GenerationFailure { error, state })
            }
        }
    }

    fn run(
        &self,
        blueprint: &Blueprint,
        input: &RawInput,
        output_dir: &Path,
        report: &mut GenerationReport,
        touched: &mut bool,
    ) -> Result<()> {
        info!("Generating '{}' {} into {}", blueprint.name, blueprint.version, output_dir.display());
        let output_dir = ensure_output_dir(output_dir, self.options.force)?;

        let context = validate(blueprint, input)?;
        check_condition_references(blueprint, &context)?;
        report.features = enabled_features(blueprint, &context)?;
        report.dependencies = dependencies::resolve(&blueprint.dependencies, &context)?;
        if !report.dependencies.is_empty() && blueprint.manifest.is_none() {
            warn!("Blueprint declares dependencies but no manifest to merge them into");
        }

        let processor = Processor::new(self.renderer, &blueprint.root, &output_dir, &context);
        let plan = processor.plan(&blueprint.files)?;
        debug!("{} of {} file rules active", plan.len(), blueprint.files.len());

        // Everything below has side effects.
        *touched = true;
        fs::create_dir_all(&output_dir)?;
        // Hooks get an absolute path regardless of where the caller runs from.
        let output_root = fs::canonicalize(&output_dir)?;
        let hooks =
            HookRunner::new(self.executor, self.renderer, &context, &output_root, &report.features);
        let mut hook_results = Vec::new();
        let run_hooks = !self.options.skip_hooks;
        if !run_hooks && !blueprint.hooks.is_empty() {
            info!("Skipping {} hook(s)", blueprint.hooks.len());
        }

        if run_hooks {
            let outcome = hooks.run(&blueprint.hooks, HookPhase::PreGeneration, &mut hook_results);
            report.hooks.append(&mut hook_results);
            outcome?;
        }

        processor.materialize(&plan, &mut report.written)?;

        if let Some(config) = &blueprint.manifest {
            report.manifest = manifest::merge_into_file(&output_dir, config, &report.dependencies)?;
            if let Some(path) = &report.manifest {
                if !report.written.contains(path) {
                    report.written.push(path.clone());
                }
            }
        }

        if run_hooks {
            let outcome = hooks.run(&blueprint.hooks, HookPhase::PostGeneration, &mut hook_results);
            report.hooks.append(&mut hook_results);
            outcome?;
        }

        info!(
            "Generated {} file(s) and {} dependency entries",
            report.written.len(),
            report.dependencies.len()
        );
        Ok(())
    }
}

/// Loads the blueprint in `blueprint_dir` and generates it with the default
/// function registry, the MiniJinja renderer and real hook processes.
pub fn generate_from_dir<P: AsRef<Path>, Q: AsRef<Path>>(
    blueprint_dir: P,
    input: &RawInput,
    output_dir: Q,
    options: GenerationOptions,
) -> std::result::Result<GenerationReport, GenerationFailure> {
    let blueprint = Blueprint::load(blueprint_dir)
        .map_err(|error| GenerationFailure { error, state: OutputState::Untouched })?;
    let renderer = MiniJinjaRenderer::new(&FunctionRegistry::new());
    let executor = ProcessExecutor;

    Generator::new(&renderer, &executor)
        .with_options(options)
        .generate(&blueprint, input, output_dir.as_ref())
}
