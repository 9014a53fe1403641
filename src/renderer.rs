//! Template rendering for file content and destination paths.
//! Placeholders use MiniJinja syntax; the only callable functions are the ones
//! in the [`FunctionRegistry`] the renderer was built from.
use crate::context::GenerationContext;
use crate::error::{Error, Result};
use crate::functions::FunctionRegistry;
use minijinja::value::Rest;
use minijinja::{AutoEscape, Environment, ErrorKind, UndefinedBehavior};
use std::path::{Component, Path, PathBuf};

/// Trait for template rendering engines.
pub trait TemplateRenderer {
    /// Renders a template string with the given context.
    ///
    /// # Arguments
    /// * `name` - Name used in error messages (usually the template source)
    /// * `template` - Template string to render
    /// * `context` - Variables available to the template
    ///
    /// # Returns
    /// * `Result<String>` - Rendered template string
    fn render(&self, name: &str, template: &str, context: &GenerationContext) -> Result<String>;

    /// Renders a destination path expression and checks that the result is a
    /// safe relative path.
    ///
    /// # Errors
    /// * `Error::MinijinjaError` for malformed placeholders or undefined variables
    /// * `Error::InvalidPath` if the rendered path is empty, absolute, has empty
    ///   segments or contains `.`/`..` segments
    fn render_path(&self, template: &str, context: &GenerationContext) -> Result<PathBuf> {
        let rendered = self.render(template, template, context)?;
        validate_relative_path(&rendered)
    }
}

/// Checks that `rendered` is a non-empty relative path without traversal or empty segments.
pub fn validate_relative_path(rendered: &str) -> Result<PathBuf> {
    let invalid = |reason: &str| Error::InvalidPath {
        path: rendered.to_string(),
        reason: reason.to_string(),
    };

    if rendered.trim().is_empty() {
        return Err(invalid("path is empty"));
    }
    if rendered.contains('\0') {
        return Err(invalid("path contains a NUL byte"));
    }
    if rendered.starts_with('/') || rendered.starts_with('\\') || Path::new(rendered).is_absolute()
    {
        return Err(invalid("path must be relative"));
    }
    for segment in rendered.split(['/', '\\']) {
        match segment {
            "" => return Err(invalid("path contains an empty segment")),
            "." | ".." => return Err(invalid("path contains a traversal segment")),
            s if s.trim().is_empty() => return Err(invalid("path contains a blank segment")),
            _ => {}
        }
    }

    let path = PathBuf::from(rendered);
    if path.components().any(|c| !matches!(c, Component::Normal(_))) {
        return Err(invalid("path must only contain plain segments"));
    }
    Ok(path)
}

/// MiniJinja-based template rendering engine.
pub struct MiniJinjaRenderer {
    /// MiniJinja environment instance
    env: Environment<'static>,
}

impl MiniJinjaRenderer {
    /// Creates a renderer exposing exactly the functions in `functions`.
    ///
    /// Undefined variables are errors and content keeps its trailing newline.
    pub fn new(functions: &FunctionRegistry) -> Self {
        let mut env = Environment::empty();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);
        // Generated sources are not HTML, whatever their extension.
        env.set_auto_escape_callback(|_| AutoEscape::None);

        for function in functions.iter() {
            let function = function.clone();
            env.add_filter(
                function.name().to_string(),
                move |value: String, args: Rest<String>| {
                    function
                        .call(&value, &args.0)
                        .map_err(|msg| minijinja::Error::new(ErrorKind::InvalidOperation, msg))
                },
            );
        }

        Self { env }
    }
}

impl Default for MiniJinjaRenderer {
    fn default() -> Self {
        MiniJinjaRenderer::new(&FunctionRegistry::new())
    }
}

impl TemplateRenderer for MiniJinjaRenderer {
    /// Renders a template string using MiniJinja.
    ///
    /// # Errors
    /// * `Error::MinijinjaError` if the template has a syntax error, references an
    ///   undefined variable or calls a function that fails
    fn render(&self, name: &str, template: &str, context: &GenerationContext) -> Result<String> {
        self.env.render_named_str(name, template, context).map_err(Error::MinijinjaError)
    }
}
