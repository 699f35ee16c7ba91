use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use lcm_gen::{generate, Options};

/// Compile LCM type definitions into Rust message structs.
#[derive(Debug, Parser)]
#[command(name = "lcm-gen", version, about)]
struct Args {
    /// IDL files to compile.
    #[arg(required = true, value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Directory generated sources are written beneath.
    #[arg(short, long, default_value = ".", value_name = "DIR")]
    out: PathBuf,

    /// Write generated files directly into the output directory instead
    /// of creating the package directory tree.
    #[arg(long)]
    flat: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let options = Options {
        out_dir: args.out,
        package_dirs: !args.flat,
    };

    let summary = generate(&args.files, &options);
    for (path, err) in &summary.failures {
        eprintln!("{}: {err}", path.display());
    }
    if summary.failures.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
