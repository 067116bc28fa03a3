//! `render` — the illustrative command-line driver from spec §6.
//!
//! `render <templates…> < input.json` reads a JSON document from standard
//! input, then renders each template argument against it, in order, to
//! standard output (or to `--output`, if given). This binary is explicitly
//! "not core" (spec §1): it is a thin composition of `lattice-parser`,
//! `lattice-render`, and the `lattice-json` reference value backend, wired
//! up the way the teacher's `lumen` binary composes its own core crates
//! behind a `clap` front end.

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use lattice_core::{ErrorKind, LatticeError};
use lattice_json::JsonSystem;
use lattice_render::{render_to_buffer, resolve_includes, RenderOptions};

/// Exit codes from spec §6, "CLI surface".
mod exit {
    pub const SUCCESS: u8 = 0;
    pub const ARGUMENT_ERROR: u8 = 1;
    pub const IO_ERROR: u8 = 2;
    pub const JSON_ERROR: u8 = 3;
    pub const TEMPLATE_ERROR: u8 = 4;
}

#[derive(Parser)]
#[command(
    name = "render",
    version,
    about = "Render Lattice templates against a JSON document read from stdin"
)]
struct Cli {
    /// Template files to render, in order.
    #[arg(required = true)]
    templates: Vec<PathBuf>,

    /// Directory to search for `$<path>` includes. Repeatable.
    #[arg(short = 'I', long = "include-dir", value_name = "DIR")]
    include_dirs: Vec<String>,

    /// Write rendered output here instead of stdout.
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Treat an emit callback returning 0 bytes as "done", not an IO error.
    #[arg(long)]
    ignore_emit_zero: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    match run() {
        Ok(()) => ExitCode::from(exit::SUCCESS),
        Err(code) => ExitCode::from(code),
    }
}

fn run() -> Result<(), u8> {
    let cli = Cli::try_parse().map_err(|e| {
        eprintln!("{e}");
        exit::ARGUMENT_ERROR
    })?;

    let mut input = String::new();
    io::stdin().read_to_string(&mut input).map_err(|e| {
        eprintln!("render: failed to read standard input: {e}");
        exit::IO_ERROR
    })?;

    let sys = JsonSystem::new();
    let root = serde_json::from_str::<serde_json::Value>(&input).map_err(|e| {
        eprintln!("render: invalid JSON on standard input: {e}");
        exit::JSON_ERROR
    })?;

    let opts = RenderOptions::default()
        .with_search_path(cli.include_dirs.clone())
        .ignore_emit_zero(cli.ignore_emit_zero);

    let mut output: Vec<u8> = Vec::new();
    for path in &cli.templates {
        let source = fs::read(path).map_err(|e| {
            eprintln!("render: failed to read '{}': {e}", path.display());
            exit::IO_ERROR
        })?;

        let bytes = render_one(&sys, &source, &root, &opts, path).map_err(|err| {
            eprintln!("render: {}: {err}", path.display());
            classify(&err)
        })?;
        output.extend_from_slice(&bytes);
    }

    match cli.output {
        Some(path) => fs::write(&path, &output).map_err(|e| {
            eprintln!("render: failed to write '{}': {e}", path.display());
            exit::IO_ERROR
        }),
        None => io::stdout().write_all(&output).map_err(|e| {
            eprintln!("render: failed to write to stdout: {e}");
            exit::IO_ERROR
        }),
    }
}

#[tracing::instrument(skip_all, fields(path = %path.display()))]
fn render_one(
    sys: &JsonSystem,
    source: &[u8],
    root: &serde_json::Value,
    opts: &RenderOptions,
    path: &std::path::Path,
) -> Result<Vec<u8>, LatticeError> {
    let template = lattice_parser::parse_template(source)?;
    let template = resolve_includes(template, opts)?;
    render_to_buffer(sys, &template, root, opts)
}

fn classify(err: &LatticeError) -> u8 {
    match err.kind {
        ErrorKind::Json => exit::JSON_ERROR,
        ErrorKind::Io => exit::IO_ERROR,
        _ => exit::TEMPLATE_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_maps_json_and_io_errors_to_their_own_codes() {
        assert_eq!(classify(&LatticeError::json(1, "x")), exit::JSON_ERROR);
        assert_eq!(classify(&LatticeError::io(1, "x")), exit::IO_ERROR);
        assert_eq!(classify(&LatticeError::syntax(1, "x")), exit::TEMPLATE_ERROR);
        assert_eq!(classify(&LatticeError::name(1, "x")), exit::TEMPLATE_ERROR);
    }
}
