//! Command-line interface implementation for blueprint.
//! Provides argument parsing and turns flags, answer files and stdin into the
//! flat variable map the generator consumes.

use clap::{error::ErrorKind, CommandFactory, Parser};
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::generator::GenerationOptions;
use crate::validation::RawInput;

/// Command-line arguments structure for blueprint.
#[derive(Parser, Debug)]
#[command(author, version, about = "blueprint: declarative project generator", long_about = None)]
pub struct Args {
    /// Directory containing blueprint.yaml / blueprint.json and its templates
    #[arg(value_name = "BLUEPRINT")]
    pub blueprint: PathBuf,

    /// Directory where the generated project will be created
    #[arg(value_name = "OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// Set a variable, e.g. --var ProjectName=api. May be repeated.
    #[arg(short = 'D', long = "var", value_name = "NAME=VALUE", value_parser = parse_key_val)]
    pub vars: Vec<(String, String)>,

    /// JSON or YAML file holding variable values
    #[arg(short, long, value_name = "FILE")]
    pub answers: Option<PathBuf>,

    /// Read variable values (JSON or YAML) from stdin
    #[arg(short, long)]
    pub stdin: bool,

    /// Generate into an existing output directory
    #[arg(short, long)]
    pub force: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Do not run any hooks declared by the blueprint
    #[arg(long)]
    pub skip_hooks: bool,
}

impl Args {
    pub fn options(&self) -> GenerationOptions {
        GenerationOptions { force: self.force, skip_hooks: self.skip_hooks }
    }
}

fn parse_key_val(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{s}'")),
    }
}

/// Parses answers given as a JSON or YAML mapping.
///
/// Empty input yields an empty map.
///
/// # Errors
/// * `Error::ConfigError` if the content is neither a JSON nor a YAML mapping
pub fn parse_answers(content: &str) -> Result<RawInput> {
    if content.trim().is_empty() {
        return Ok(RawInput::new());
    }
    match serde_json::from_str::<RawInput>(content) {
        Ok(answers) => Ok(answers),
        Err(_) => serde_yaml::from_str::<RawInput>(content).map_err(|e| {
            Error::ConfigError(format!("Failed to parse answers as JSON or YAML: {e}"))
        }),
    }
}

pub fn load_answers_file<P: AsRef<Path>>(path: P) -> Result<RawInput> {
    let content = std::fs::read_to_string(path.as_ref())?;
    parse_answers(&content)
}

pub fn load_answers_stdin() -> Result<RawInput> {
    let mut buffer = String::new();
    std::io::stdin().read_to_string(&mut buffer)?;
    parse_answers(&buffer)
}

/// Merges every input source; later sources win: answers file, stdin, `--var`.
pub fn collect_input(args: &Args) -> Result<RawInput> {
    let mut input = RawInput::new();
    if let Some(path) = &args.answers {
        input.extend(load_answers_file(path)?);
    }
    if args.stdin {
        input.extend(load_answers_stdin()?);
    }
    for (key, value) in &args.vars {
        input.insert(key.clone(), serde_json::Value::String(value.clone()));
    }
    Ok(input)
}

/// Parses command line arguments and returns the Args structure.
///
/// # Exits
/// * With status code 1 if required arguments are missing
/// * With clap's default error handling for other argument errors
pub fn get_args() -> Args {
    match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            if e.kind() == ErrorKind::MissingRequiredArgument {
                let _ = Args::command()
                    .help_template(
                        r#"{about-section}
{usage-heading} {usage}

{all-args}
{after-help}
"#,
                    )
                    .print_help();
                std::process::exit(1);
            } else {
                e.exit();
            }
        }
    }
}
