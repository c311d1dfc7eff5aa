//! YAIL compiler CLI

use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use yail_compiler::{CompileOptions, Compiler, Severity};

#[derive(Parser, Debug)]
#[command(name = "yailc")]
#[command(about = "Compile a blocks project into a YAIL program")]
#[command(version)]
struct Args {
    /// Project file (workspace JSON)
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Assemble for a live REPL session
    #[arg(long)]
    repl: bool,

    /// Write the program here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Package prefix for the form
    #[arg(long, value_name = "NAME")]
    package: Option<String>,

    /// Language definition JSON (defaults to the built-in language)
    #[arg(long, value_name = "FILE")]
    language: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    let mut options = CompileOptions::new(&args.input)
        .repl(args.repl)
        .verbose(args.verbose);
    if let Some(output) = &args.output {
        options = options.output(output);
    }
    if let Some(package) = args.package {
        options = options.package(package);
    }
    if let Some(language) = args.language {
        options = options.language(language);
    }

    let output = Compiler::new(options)
        .compile()
        .with_context(|| format!("failed to compile {}", args.input.display()))?;

    for diag in &output.diagnostics {
        let level = match diag.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Internal => "internal error",
        };
        eprintln!("{}: block {}: {}", level, diag.block, diag.message);
    }

    if args.output.is_none() {
        print!("{}", output.yail);
    }

    if output.has_errors() {
        process::exit(1);
    }
    Ok(())
}
