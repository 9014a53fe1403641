use blueprint::blueprint::Blueprint;
use blueprint::context::GenerationContext;
use blueprint::error::Error;
use blueprint::functions::FunctionRegistry;
use blueprint::renderer::{MiniJinjaRenderer, TemplateRenderer};
use blueprint::validation::{validate, RawInput};
use serde_json::json;
use std::path::PathBuf;

fn context() -> GenerationContext {
    let blueprint = Blueprint::parse(
        r#"{"name": "r", "variables": [
            {"name": "ProjectName", "type": "string"},
            {"name": "Model", "type": "string"},
            {"name": "Port", "type": "integer"},
            {"name": "UseDocker", "type": "boolean"}
        ]}"#,
        ".",
    )
    .unwrap();
    let input: RawInput = [
        ("ProjectName".to_string(), json!("order-service")),
        ("Model".to_string(), json!("user_account")),
        ("Port".to_string(), json!(8080)),
        ("UseDocker".to_string(), json!(true)),
    ]
    .into_iter()
    .collect();
    validate(&blueprint, &input).unwrap()
}

#[test]
fn test_render_placeholders_and_functions() {
    let renderer = MiniJinjaRenderer::default();
    let ctx = context();

    assert_eq!(renderer.render("t", "Hello {{ProjectName}}!", &ctx).unwrap(), "Hello order-service!");
    assert_eq!(renderer.render("t", "{{ ProjectName | snake_case }}", &ctx).unwrap(), "order_service");
    assert_eq!(renderer.render("t", "{{ Model | pascal_case | pluralize }}", &ctx).unwrap(), "UserAccounts");
    assert_eq!(
        renderer.render("t", r#"{{ ProjectName | replace("-", ".") | upper }}"#, &ctx).unwrap(),
        "ORDER.SERVICE"
    );
    assert_eq!(renderer.render("t", "port={{ Port }}", &ctx).unwrap(), "port=8080");
}

#[test]
fn test_render_blocks_and_trailing_newline() {
    let renderer = MiniJinjaRenderer::default();
    let template = "{% if UseDocker %}docker{% else %}bare{% endif %}\n";
    assert_eq!(renderer.render("t", template, &context()).unwrap(), "docker\n");
}

#[test]
fn test_undefined_variable_fails() {
    let renderer = MiniJinjaRenderer::default();
    let err = renderer.render("t", "{{ Missing }}", &context()).unwrap_err();
    assert!(matches!(err, Error::MinijinjaError(_)));
}

#[test]
fn test_malformed_placeholder_fails() {
    let renderer = MiniJinjaRenderer::default();
    let err = renderer.render("t", "{{ ProjectName ", &context()).unwrap_err();
    assert!(matches!(err, Error::MinijinjaError(_)));
}

#[test]
fn test_only_registry_functions_are_available() {
    let mut registry = FunctionRegistry::empty();
    registry.register_unary("shout", |s| format!("{}!", s.to_uppercase()));
    let renderer = MiniJinjaRenderer::new(&registry);
    let ctx = context();

    assert_eq!(renderer.render("t", "{{ Model | shout }}", &ctx).unwrap(), "USER_ACCOUNT!");
    assert!(renderer.render("t", "{{ Model | snake_case }}", &ctx).is_err());
}

#[test]
fn test_function_argument_errors_are_rendering_errors() {
    let renderer = MiniJinjaRenderer::default();
    let err = renderer.render("t", r#"{{ Model | replace("_") }}"#, &context()).unwrap_err();
    assert!(matches!(err, Error::MinijinjaError(_)));
}

#[test]
fn test_render_path() {
    let renderer = MiniJinjaRenderer::default();
    let ctx = context();

    assert_eq!(
        renderer.render_path("cmd/{{ ProjectName }}/main.go", &ctx).unwrap(),
        PathBuf::from("cmd/order-service/main.go")
    );
    assert_eq!(
        renderer.render_path("internal/{{ Model | kebab_case }}.go", &ctx).unwrap(),
        PathBuf::from("internal/user-account.go")
    );
}

#[test]
fn test_render_path_rejects_traversal_and_empty_segments() {
    let renderer = MiniJinjaRenderer::default();
    let ctx = context();

    for template in [
        "../{{ ProjectName }}.go",
        "{{ Model | replace(\"user_account\", \"..\") }}/x.go",
        "/etc/{{ ProjectName }}",
        "src//{{ ProjectName }}.go",
        "{{ Model | replace(\"user_account\", \"\") }}",
        "src/{{ Model | replace(\"user_account\", \"\") }}/main.go",
    ] {
        let err = renderer.render_path(template, &ctx).unwrap_err();
        assert!(matches!(err, Error::InvalidPath { .. }), "{template}: {err:?}");
    }
}
