use std::cell::RefCell;
use std::path::Path;

use blueprint::blueprint::{Blueprint, HookPhase};
use blueprint::context::GenerationContext;
use blueprint::error::{Error, Result};
use blueprint::hooks::{
    variable_env_name, CommandSpec, HookExecutor, HookOutput, HookResult, HookRunner,
};
use blueprint::renderer::MiniJinjaRenderer;
use blueprint::validation::{validate, RawInput};
use serde_json::json;
use tempfile::TempDir;

/// Records every command and fails the ones whose program is listed.
#[derive(Default)]
struct FakeExecutor {
    failing: Vec<&'static str>,
    calls: RefCell<Vec<CommandSpec>>,
}

impl HookExecutor for FakeExecutor {
    fn execute(&self, command: &CommandSpec) -> Result<HookOutput> {
        self.calls.borrow_mut().push(command.clone());
        let success = !self.failing.contains(&command.program.as_str());
        Ok(HookOutput {
            status: Some(if success { 0 } else { 2 }),
            success,
            stdout: format!("ran {}", command.program),
            stderr: if success { String::new() } else { "boom".to_string() },
        })
    }
}

fn setup(hooks: &str) -> (Blueprint, GenerationContext) {
    let manifest = format!(
        r#"
name: hooks
variables:
  - name: ProjectName
    type: string
    default: api
hooks:
{hooks}
"#
    );
    let blueprint = Blueprint::parse(&manifest, ".").unwrap();
    let mut input = RawInput::new();
    input.insert("ProjectName".into(), json!("orders"));
    let context = validate(&blueprint, &input).unwrap();
    (blueprint, context)
}

fn run(
    executor: &FakeExecutor,
    blueprint: &Blueprint,
    context: &GenerationContext,
    output: &Path,
) -> (Result<()>, Vec<HookResult>) {
    let renderer = MiniJinjaRenderer::default();
    let features = vec!["auth".to_string()];
    let runner = HookRunner::new(executor, &renderer, context, output, &features);
    let mut results = Vec::new();
    let outcome = runner.run(&blueprint.hooks, HookPhase::PostGeneration, &mut results);
    (outcome, results)
}

fn programs(executor: &FakeExecutor) -> Vec<String> {
    executor.calls.borrow().iter().map(|c| c.program.clone()).collect()
}

#[test]
fn test_hooks_run_in_declared_order() {
    let (blueprint, context) = setup(
        r#"
  - name: tidy
    command: first
  - name: generate
    command: second
  - name: format
    command: third
"#,
    );
    let executor = FakeExecutor::default();
    let out = TempDir::new().unwrap();
    let (outcome, results) = run(&executor, &blueprint, &context, out.path());

    outcome.unwrap();
    assert_eq!(programs(&executor), vec!["first", "second", "third"]);
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].output.stdout, "ran first");
}

#[test]
fn test_failing_hook_aborts_remaining_hooks() {
    let (blueprint, context) = setup(
        r#"
  - name: tidy
    command: first
  - name: generate
    command: second
  - name: format
    command: third
"#,
    );
    let executor = FakeExecutor { failing: vec!["second"], ..Default::default() };
    let out = TempDir::new().unwrap();
    let (outcome, results) = run(&executor, &blueprint, &context, out.path());

    match outcome {
        Err(Error::HookError { name, status, output }) => {
            assert_eq!(name, "generate");
            assert_eq!(status, "exit status 2");
            assert!(output.contains("boom"));
        }
        other => panic!("expected hook error, got {other:?}"),
    }
    assert_eq!(programs(&executor), vec!["first", "second"]);
    assert_eq!(results.len(), 2);
}

#[test]
fn test_continue_policy_keeps_going() {
    let (blueprint, context) = setup(
        r#"
  - name: format
    command: first
    on_failure: continue
  - name: generate
    command: second
"#,
    );
    let executor = FakeExecutor { failing: vec!["first"], ..Default::default() };
    let out = TempDir::new().unwrap();
    let (outcome, results) = run(&executor, &blueprint, &context, out.path());

    outcome.unwrap();
    assert_eq!(programs(&executor), vec!["first", "second"]);
    assert!(!results[0].output.success);
    assert!(results[1].output.success);
}

#[test]
fn test_only_requested_phase_runs() {
    let (blueprint, context) = setup(
        r#"
  - name: prepare
    command: early
    phase: pre_generation
  - name: tidy
    command: late
"#,
    );
    let executor = FakeExecutor::default();
    let out = TempDir::new().unwrap();
    let (outcome, _) = run(&executor, &blueprint, &context, out.path());

    outcome.unwrap();
    assert_eq!(programs(&executor), vec!["late"]);
}

#[test]
fn test_command_is_rendered_with_environment() {
    let (blueprint, context) = setup(
        r#"
  - name: build
    command: ["go", "build", "-o", "bin/{{ ProjectName }}", "./cmd/{{ ProjectName }}"]
    working_dir: "services/{{ ProjectName | upper }}"
    env:
      APP_NAME: "{{ ProjectName | pascal_case }}"
"#,
    );
    let executor = FakeExecutor::default();
    let out = TempDir::new().unwrap();
    let (outcome, _) = run(&executor, &blueprint, &context, out.path());
    outcome.unwrap();

    let calls = executor.calls.borrow();
    let command = &calls[0];
    assert_eq!(command.program, "go");
    assert_eq!(command.args, vec!["build", "-o", "bin/orders", "./cmd/orders"]);
    assert_eq!(command.working_dir, out.path().join("services/ORDERS"));

    let env = |key: &str| {
        command.env.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone()).unwrap()
    };
    assert_eq!(env("BLUEPRINT_OUTPUT_DIR"), out.path().display().to_string());
    assert_eq!(env("BLUEPRINT_CONTEXT"), r#"{"ProjectName":"orders"}"#);
    assert_eq!(env("BLUEPRINT_FEATURES"), "auth");
    assert_eq!(env("BLUEPRINT_HOOK_PHASE"), "post_generation");
    assert_eq!(env("BLUEPRINT_VAR_PROJECT_NAME"), "orders");
    assert_eq!(env("APP_NAME"), "Orders");
}

#[test]
fn test_command_line_is_rendered_before_splitting() {
    let (blueprint, context) = setup(
        r#"
  - name: build
    command: go build -o {{ ProjectName }} ./cmd/{{ ProjectName | upper }}
  - name: greet
    command: sh -c 'echo "hello {{ ProjectName }}"'
"#,
    );
    let executor = FakeExecutor::default();
    let out = TempDir::new().unwrap();
    let (outcome, results) = run(&executor, &blueprint, &context, out.path());
    outcome.unwrap();

    let calls = executor.calls.borrow();
    assert_eq!(calls[0].program, "go");
    assert_eq!(calls[0].args, vec!["build", "-o", "orders", "./cmd/ORDERS"]);
    assert_eq!(calls[1].program, "sh");
    assert_eq!(calls[1].args, vec!["-c", "echo \"hello orders\""]);
    assert_eq!(results[0].command, "go build -o orders ./cmd/ORDERS");
}

#[test]
fn test_unbalanced_quotes_in_command_line_fail() {
    let (blueprint, context) = setup(
        r#"
  - name: broken
    command: echo "{{ ProjectName }}
"#,
    );
    let executor = FakeExecutor::default();
    let out = TempDir::new().unwrap();
    let (outcome, _) = run(&executor, &blueprint, &context, out.path());

    assert!(matches!(outcome, Err(Error::ConfigError(_))));
    assert!(executor.calls.borrow().is_empty());
}

#[test]
fn test_working_dir_traversal_is_rejected() {
    let (blueprint, context) = setup(
        r#"
  - name: escape
    command: ls
    working_dir: "../{{ ProjectName }}"
"#,
    );
    let executor = FakeExecutor::default();
    let out = TempDir::new().unwrap();
    let (outcome, _) = run(&executor, &blueprint, &context, out.path());

    assert!(matches!(outcome, Err(Error::InvalidPath { .. })));
    assert!(executor.calls.borrow().is_empty());
}

#[test]
fn test_variable_env_name() {
    assert_eq!(variable_env_name("ProjectName"), "BLUEPRINT_VAR_PROJECT_NAME");
    assert_eq!(variable_env_name("auth_type"), "BLUEPRINT_VAR_AUTH_TYPE");
}

#[cfg(unix)]
#[test]
fn test_process_executor_captures_output() {
    use blueprint::hooks::ProcessExecutor;

    let out = TempDir::new().unwrap();
    let command = CommandSpec {
        program: "sh".to_string(),
        args: vec!["-c".to_string(), "echo \"$GREETING\"; echo oops >&2; exit 3".to_string()],
        working_dir: out.path().to_path_buf(),
        env: vec![("GREETING".to_string(), "hello".to_string())],
    };
    let output = ProcessExecutor.execute(&command).unwrap();

    assert!(!output.success);
    assert_eq!(output.status, Some(3));
    assert_eq!(output.stdout, "hello\n");
    assert_eq!(output.stderr, "oops\n");
}
