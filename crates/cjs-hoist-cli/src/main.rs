#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::needless_pass_by_value)]

mod commands;
mod logging;

use cjs_hoist_core::TransformOptions;
use clap::Parser;
use commands::transform::TransformAction;
use miette::Result;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "cjs-hoist")]
#[command(author, version, about = "Hoist CommonJS exports, module and require into private bindings", long_about = None)]
struct Cli {
    /// Files, or directories to search for .js and .cjs files
    #[arg(required = true, value_name = "PATHS")]
    paths: Vec<PathBuf>,

    /// Write results under this directory instead of stdout
    #[arg(short = 'o', long, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    /// Write a .map file beside each output
    #[arg(long, requires = "out_dir")]
    sourcemap: bool,

    /// Also rewrite requires inside Promise.resolve(require("..."))
    #[arg(long)]
    transform_dynamic_require: bool,

    /// JSON file with transform options
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit a JSON summary on stdout (stable, machine-readable)
    #[arg(long)]
    json: bool,

    /// Override the working directory
    #[arg(long, value_name = "PATH")]
    cwd: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    logging::init(cli.verbose, cli.json);

    let mut options = match &cli.config {
        Some(path) => load_options(&cwd.join(path))?,
        None => TransformOptions::default(),
    };
    if cli.sourcemap {
        options.source_map = true;
    }
    if cli.transform_dynamic_require {
        options.ignore_dynamic_require = false;
    }
    if options.source_map && cli.out_dir.is_none() {
        return Err(miette::miette!(
            "Source maps are written beside each output; pass --out-dir or unset sourceMap"
        ));
    }

    let action = TransformAction {
        cwd: cwd.clone(),
        paths: cli.paths,
        out_dir: cli.out_dir.map(|dir| cwd.join(dir)),
        options,
    };
    commands::transform::run(action, cli.json)
}

fn load_options(path: &Path) -> Result<TransformOptions> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| miette::miette!("Failed to read config {}: {}", path.display(), e))?;
    serde_json::from_str(&text)
        .map_err(|e| miette::miette!("Invalid config {}: {}", path.display(), e))
}
