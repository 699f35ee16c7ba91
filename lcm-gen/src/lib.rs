//! The LCM IDL compiler.
//!
//! Turns `.lcm` type definitions into Rust message structs built on the
//! `lcm-codec` runtime. The pipeline is tokenizer → parser → fingerprint
//! → emitter; every struct's 64-bit fingerprint is computed here and
//! baked into the generated source, so peers generated from the same IDL
//! in any host language agree on the wire.

use std::fs;
use std::path::{Path, PathBuf};

pub mod ast;
pub mod emit;
pub mod error;
pub mod fingerprint;
pub mod lexer;
pub mod parser;

pub use error::Error;

/// Generator configuration.
#[derive(Debug, Clone)]
pub struct Options {
    /// Directory generated sources are written beneath.
    pub out_dir: PathBuf,
    /// Whether to create the directory tree implied by package names.
    /// When false every file lands directly in `out_dir`.
    pub package_dirs: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("."),
            package_dirs: true,
        }
    }
}

/// Outcome of one generator run.
#[derive(Debug, Default)]
pub struct Summary {
    /// Generated files, in emission order.
    pub written: Vec<PathBuf>,
    /// Source files that failed, with their diagnostics. A failure
    /// aborts that file only; the run continues.
    pub failures: Vec<(PathBuf, Error)>,
}

/// Compile every IDL file in `paths`, resolving cross-file type
/// references across the whole invocation.
pub fn generate(paths: &[PathBuf], options: &Options) -> Summary {
    let mut summary = Summary::default();

    let mut parsed = Vec::new();
    for path in paths {
        match read_and_parse(path) {
            Ok(file) => parsed.push(file),
            Err(err) => summary.failures.push((path.clone(), err)),
        }
    }

    let mut resolver =
        fingerprint::Resolver::new(parsed.iter().flat_map(|file| &file.structs));
    for file in &parsed {
        match emit::emit_file(file, &mut resolver, options) {
            Ok(written) => summary.written.extend(written),
            Err(err) => summary.failures.push((file.path.clone(), err)),
        }
    }

    if !summary.written.is_empty() {
        match emit::write_module_tree(&options.out_dir, &summary.written) {
            Ok(module_files) => summary.written.extend(module_files),
            Err(err) => summary.failures.push((options.out_dir.clone(), err)),
        }
    }
    summary
}

fn read_and_parse(path: &Path) -> Result<ast::File, Error> {
    let source = fs::read_to_string(path)?;
    parser::parse(path, &source)
}
