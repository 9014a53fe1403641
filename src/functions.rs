//! Pure string transforms usable from templates and destination paths,
//! e.g. `{{ ProjectName | snake_case }}` or `{{ Model | replace("_", "-") | pluralize }}`.
//!
//! The registry is a plain value owned by the caller and handed to the renderer.
//! Nothing is registered globally.

use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// Signature of a transform: the piped value plus the call arguments.
pub type TransformFn =
    Arc<dyn Fn(&str, &[String]) -> std::result::Result<String, String> + Send + Sync>;

/// A named transform and the number of arguments it accepts.
#[derive(Clone)]
pub struct Function {
    name: String,
    arity: usize,
    func: TransformFn,
}

impl Function {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Applies the transform after checking the argument count.
    pub fn call(&self, value: &str, args: &[String]) -> std::result::Result<String, String> {
        if args.len() != self.arity {
            return Err(format!(
                "function '{}' takes {} argument(s), {} given",
                self.name,
                self.arity,
                args.len()
            ));
        }
        (self.func)(value, args)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function").field("name", &self.name).field("arity", &self.arity).finish()
    }
}

/// Table of transforms available to the renderer.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: IndexMap<String, Function>,
}

impl FunctionRegistry {
    /// Creates a registry with no functions at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a registry holding the standard transforms.
    pub fn new() -> Self {
        let mut registry = Self::empty();

        registry.register_unary("upper", |s| s.to_uppercase());
        registry.register_unary("lower", |s| s.to_lowercase());
        registry.register_unary("trim", |s| s.trim().to_string());
        registry.register_unary("title", cruet::to_title_case);
        registry.register_unary("snake_case", cruet::to_snake_case);
        registry.register_unary("kebab_case", cruet::to_kebab_case);
        registry.register_unary("camel_case", cruet::to_camel_case);
        registry.register_unary("pascal_case", cruet::to_pascal_case);
        registry.register_unary("screaming_snake_case", cruet::to_screaming_snake_case);
        registry.register_unary("train_case", cruet::to_train_case);
        registry.register_unary("pluralize", cruet::to_plural);
        registry.register_unary("singularize", cruet::to_singular);

        registry.register("replace", 2, |s, args| Ok(s.replace(&args[0], &args[1])));
        registry.register("default", 1, |s, args| {
            Ok(if s.is_empty() { args[0].clone() } else { s.to_string() })
        });

        registry
    }

    /// Registers (or replaces) a transform taking `arity` arguments.
    pub fn register<F>(&mut self, name: &str, arity: usize, func: F)
    where
        F: Fn(&str, &[String]) -> std::result::Result<String, String> + Send + Sync + 'static,
    {
        self.functions.insert(
            name.to_string(),
            Function { name: name.to_string(), arity, func: Arc::new(func) },
        );
    }

    /// Registers an infallible transform taking no arguments.
    pub fn register_unary<F>(&mut self, name: &str, func: F)
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.register(name, 0, move |s, _| Ok(func(s)));
    }

    pub fn get(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Calls the named function.
    pub fn apply(
        &self,
        name: &str,
        value: &str,
        args: &[String],
    ) -> std::result::Result<String, String> {
        match self.functions.get(name) {
            Some(function) => function.call(value, args),
            None => Err(format!("unknown function '{name}'")),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Function> {
        self.functions.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_conversion() {
        let registry = FunctionRegistry::new();
        assert_eq!(registry.apply("snake_case", "MyProject", &[]).unwrap(), "my_project");
        assert_eq!(registry.apply("kebab_case", "my_project", &[]).unwrap(), "my-project");
        assert_eq!(registry.apply("pascal_case", "my-project", &[]).unwrap(), "MyProject");
        assert_eq!(registry.apply("camel_case", "my_project", &[]).unwrap(), "myProject");
        assert_eq!(registry.apply("upper", "abc", &[]).unwrap(), "ABC");
    }

    #[test]
    fn test_replace_and_plural() {
        let registry = FunctionRegistry::new();
        let args = vec!["-".to_string(), "_".to_string()];
        assert_eq!(registry.apply("replace", "a-b-c", &args).unwrap(), "a_b_c");
        assert_eq!(registry.apply("pluralize", "user", &[]).unwrap(), "users");
        assert_eq!(registry.apply("singularize", "users", &[]).unwrap(), "user");
    }

    #[test]
    fn test_arity_and_unknown() {
        let registry = FunctionRegistry::new();
        assert!(registry.apply("replace", "abc", &["a".to_string()]).is_err());
        assert!(registry.apply("shout", "abc", &[]).is_err());
    }

    #[test]
    fn test_custom_function() {
        let mut registry = FunctionRegistry::empty();
        registry.register_unary("reverse", |s| s.chars().rev().collect());
        assert_eq!(registry.apply("reverse", "abc", &[]).unwrap(), "cba");
        assert!(!registry.contains("upper"));
    }
}
