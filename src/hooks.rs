//! Hook execution against the generated tree.
//!
//! Commands are described by a [`CommandSpec`] and handed to a [`HookExecutor`].
//! [`ProcessExecutor`] spawns real processes; tests plug in their own executor
//! to observe ordering and failure handling without spawning anything.

use log::{debug, info, warn};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::blueprint::{CommandTemplate, FailurePolicy, Hook, HookPhase};
use crate::constants::env;
use crate::context::GenerationContext;
use crate::error::{Error, Result};
use crate::renderer::TemplateRenderer;

/// A fully rendered command, ready to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub env: Vec<(String, String)>,
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of one command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HookOutput {
    /// Exit code, `None` if the process was terminated by a signal
    pub status: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl HookOutput {
    fn status_text(&self) -> String {
        match self.status {
            Some(code) => format!("exit status {code}"),
            None => "no exit status".to_string(),
        }
    }

    fn combined(&self) -> String {
        let mut text = String::new();
        if !self.stdout.trim().is_empty() {
            text.push_str("stdout:\n");
            text.push_str(self.stdout.trim_end());
            text.push('\n');
        }
        if !self.stderr.trim().is_empty() {
            text.push_str("stderr:\n");
            text.push_str(self.stderr.trim_end());
            text.push('\n');
        }
        text
    }
}

/// Runs commands on behalf of the hook runner.
pub trait HookExecutor {
    /// Executes the command and captures its output.
    ///
    /// An `Err` means the command could not be run at all; a command that ran
    /// and failed is an `Ok` with `success == false`.
    fn execute(&self, command: &CommandSpec) -> Result<HookOutput>;
}

/// Executes hooks as child processes.
#[derive(Debug, Default)]
pub struct ProcessExecutor;

impl HookExecutor for ProcessExecutor {
    fn execute(&self, command: &CommandSpec) -> Result<HookOutput> {
        let output = Command::new(&command.program)
            .args(&command.args)
            .current_dir(&command.working_dir)
            .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .output()
            .map_err(Error::IoError)?;

        Ok(HookOutput {
            status: output.status.code(),
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Outcome of one hook, kept for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookResult {
    pub name: String,
    pub phase: HookPhase,
    pub command: String,
    pub output: HookOutput,
}

/// Builds environment variable name for a blueprint variable, e.g.
/// `ProjectName` becomes `BLUEPRINT_VAR_PROJECT_NAME`.
pub fn variable_env_name(name: &str) -> String {
    format!("{}{}", env::VAR_PREFIX, cruet::to_screaming_snake_case(name))
}

/// Runs the hooks of one phase in declared order.
pub struct HookRunner<'a> {
    executor: &'a dyn HookExecutor,
    renderer: &'a dyn TemplateRenderer,
    context: &'a GenerationContext,
    output_root: &'a Path,
    features: &'a [String],
}

impl<'a> HookRunner<'a> {
    pub fn new(
        executor: &'a dyn HookExecutor,
        renderer: &'a dyn TemplateRenderer,
        context: &'a GenerationContext,
        output_root: &'a Path,
        features: &'a [String],
    ) -> Self {
        Self { executor, renderer, context, output_root, features }
    }

    fn base_env(&self, phase: HookPhase) -> Result<Vec<(String, String)>> {
        let mut vars = vec![
            (env::OUTPUT_DIR.to_string(), self.output_root.display().to_string()),
            (env::CONTEXT.to_string(), serde_json::to_string(self.context)?),
            (env::FEATURES.to_string(), self.features.join(",")),
            (env::HOOK_PHASE.to_string(), phase.as_str().to_string()),
        ];
        vars.extend(
            self.context.iter().map(|(name, value)| (variable_env_name(name), value.to_string())),
        );
        Ok(vars)
    }

    /// Renders the hook's program, arguments, working directory and environment.
    pub fn command_for(&self, hook: &Hook) -> Result<CommandSpec> {
        let render = |text: &str| self.renderer.render(&hook.name, text, self.context);

        let working_dir = match &hook.working_dir {
            Some(dir) => self.output_root.join(self.renderer.render_path(dir, self.context)?),
            None => self.output_root.to_path_buf(),
        };

        let mut env = self.base_env(hook.phase)?;
        for (key, value) in &hook.env {
            env.push((key.clone(), render(value)?));
        }

        let mut parts = match &hook.command {
            CommandTemplate::Args(args) => {
                args.iter().map(|arg| render(arg)).collect::<Result<Vec<_>>>()?
            }
            CommandTemplate::Line(line) => {
                let rendered = render(line)?;
                shell_words::split(&rendered).map_err(|e| {
                    Error::ConfigError(format!(
                        "hook '{}' command '{rendered}' cannot be split: {e}",
                        hook.name
                    ))
                })?
            }
        };
        if parts.first().map_or(true, |p| p.trim().is_empty()) {
            return Err(Error::ConfigError(format!(
                "hook '{}' rendered an empty command",
                hook.name
            )));
        }
        let program = parts.remove(0);

        Ok(CommandSpec {
            program,
            args: parts,
            working_dir,
            env,
        })
    }

    /// Runs every hook of `phase`, appending each outcome to `results`.
    ///
    /// A failing hook with the `abort` policy stops the run: later hooks are not
    /// executed and its captured output is returned in the error. With the
    /// `continue` policy the failure is logged and the next hook runs.
    ///
    /// # Errors
    /// * `Error::HookError` for the first failing hook whose policy is `abort`
    /// * Rendering errors from the hook's command template
    pub fn run(&self, hooks: &[Hook], phase: HookPhase, results: &mut Vec<HookResult>) -> Result<()> {
        for hook in hooks.iter().filter(|hook| hook.phase == phase) {
            let command = self.command_for(hook)?;
            info!("Running hook '{}': {}", hook.name, command);

            let output = match self.executor.execute(&command) {
                Ok(output) => output,
                Err(e) => HookOutput {
                    status: None,
                    success: false,
                    stdout: String::new(),
                    stderr: e.to_string(),
                },
            };
            debug!("Hook '{}' finished with {}", hook.name, output.status_text());

            let failed = !output.success;
            results.push(HookResult {
                name: hook.name.clone(),
                phase,
                command: command.to_string(),
                output: output.clone(),
            });

            if failed {
                match hook.on_failure {
                    FailurePolicy::Abort => {
                        return Err(Error::HookError {
                            name: hook.name.clone(),
                            status: output.status_text(),
                            output: output.combined(),
                        });
                    }
                    FailurePolicy::Continue => {
                        warn!(
                            "Hook '{}' failed with {}, continuing",
                            hook.name,
                            output.status_text()
                        );
                    }
                }
            }
        }
        Ok(())
    }
}
