//! blueprint's command-line entry point.
//! Parses arguments, assembles the variable map and hands both to the generator.

use blueprint::{
    cli::{collect_input, get_args, Args},
    error::default_error_handler,
    generator::generate_from_dir,
    logger::init_logger,
};

/// Main application entry point.
fn main() {
    let args = get_args();
    init_logger(args.verbose);

    if let Err(code) = run(args) {
        std::process::exit(code);
    }
}

/// Runs one generation and prints its outcome.
///
/// # Returns
/// * `Err(1)` if generation failed; the failure has already been printed
fn run(args: Args) -> Result<(), i32> {
    let input = match collect_input(&args) {
        Ok(input) => input,
        Err(err) => default_error_handler(err),
    };

    match generate_from_dir(&args.blueprint, &input, &args.output_dir, args.options()) {
        Ok(report) => {
            for path in &report.written {
                println!("Generated: '{}'", path.display());
            }
            for dep in &report.dependencies {
                println!("Dependency: {dep}");
            }
            for hook in &report.hooks {
                if !hook.output.success {
                    println!("Hook '{}' failed (continued)", hook.name);
                }
            }
            println!(
                "Project generation completed successfully in {}.",
                args.output_dir.display()
            );
            Ok(())
        }
        Err(failure) => {
            eprintln!("{failure}");
            if failure.nothing_written() {
                eprintln!("Nothing was written.");
            }
            Err(1)
        }
    }
}
