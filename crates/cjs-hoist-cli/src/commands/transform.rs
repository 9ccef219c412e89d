//! `cjs-hoist` command implementation.
//!
//! Collects input files, transforms them in parallel and writes each result
//! to stdout or under the output directory.

use cjs_hoist_core::{transform_source, TransformOptions};
use miette::Result;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::debug;
use walkdir::WalkDir;

/// Directories never searched for inputs.
const EXCLUDE_DIRS: &[&str] = &["node_modules"];

/// Extensions picked up when walking a directory.
const EXTENSIONS: &[&str] = &["js", "cjs"];

const IO_ERROR: &str = "IO_ERROR";

/// Transform command action.
#[derive(Debug, Clone)]
pub struct TransformAction {
    /// Working directory inputs are resolved against.
    pub cwd: PathBuf,
    /// Files or directories given on the command line.
    pub paths: Vec<PathBuf>,
    /// Output directory (if None, the single result goes to stdout).
    pub out_dir: Option<PathBuf>,
    /// Options applied to every file.
    pub options: TransformOptions,
}

/// One file to transform.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Input {
    path: PathBuf,
    /// Path relative to the input root it was found under.
    relative: PathBuf,
}

/// JSON output for the command.
#[derive(Serialize)]
struct TransformResultJson {
    ok: bool,
    files: Vec<FileResultJson>,
    touched: usize,
    failed: usize,
    duration_ms: u64,
}

#[derive(Serialize)]
struct FileResultJson {
    path: String,
    touched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    outfile: Option<String>,
    /// Result text when writing to stdout.
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<FileErrorJson>,
}

#[derive(Serialize)]
struct FileErrorJson {
    code: String,
    message: String,
}

impl FileErrorJson {
    fn io(e: &std::io::Error) -> Self {
        Self {
            code: IO_ERROR.to_string(),
            message: e.to_string(),
        }
    }
}

/// Run the transform command.
pub fn run(action: TransformAction, json: bool) -> Result<()> {
    let start = Instant::now();

    let inputs = collect_inputs(&action.cwd, &action.paths)?;
    if action.out_dir.is_none() && inputs.len() != 1 {
        return Err(miette::miette!(
            "Writing to stdout needs exactly one input file, found {}; pass --out-dir",
            inputs.len()
        ));
    }
    debug!(files = inputs.len(), "collected inputs");

    let files: Vec<FileResultJson> = inputs
        .par_iter()
        .map(|input| process(input, &action))
        .collect();

    let touched = files.iter().filter(|f| f.touched).count();
    let failed = files.iter().filter(|f| f.error.is_some()).count();
    let duration_ms = start.elapsed().as_millis() as u64;
    debug!(touched, failed, duration_ms, "transform complete");

    if json {
        let json_result = TransformResultJson {
            ok: failed == 0,
            files,
            touched,
            failed,
            duration_ms,
        };
        println!(
            "{}",
            serde_json::to_string(&json_result)
                .map_err(|e| miette::miette!("Failed to serialize result: {}", e))?
        );
    } else {
        for file in &files {
            if let Some(error) = &file.error {
                eprintln!("error: {}: {} [{}]", file.path, error.message, error.code);
            } else if let Some(code) = &file.code {
                print!("{code}");
            } else if let Some(outfile) = &file.outfile {
                let mark = if file.touched { "" } else { " (unchanged)" };
                println!("  {} -> {}{}", file.path, outfile, mark);
            }
        }
        if action.out_dir.is_some() {
            println!(
                "  {} files, {} rewritten, {} failed ({}ms)",
                files.len(),
                touched,
                failed,
                duration_ms
            );
        }
    }

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Transform one file and write its output.
fn process(input: &Input, action: &TransformAction) -> FileResultJson {
    let mut result = FileResultJson {
        path: input.path.display().to_string(),
        touched: false,
        outfile: None,
        code: None,
        error: None,
    };

    let source = match std::fs::read_to_string(&input.path) {
        Ok(source) => source,
        Err(e) => {
            result.error = Some(FileErrorJson::io(&e));
            return result;
        }
    };

    let mut options = action.options.clone();
    if options.file.is_none() {
        options.file = input
            .relative
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
    }

    let output = match transform_source(&source, &options) {
        Ok(output) => output,
        Err(e) => {
            debug!(path = %input.path.display(), error = %e, "transform failed");
            result.error = Some(FileErrorJson {
                code: e.code().to_string(),
                message: e.to_string(),
            });
            return result;
        }
    };
    result.touched = output.is_touched;
    debug!(path = %input.path.display(), touched = output.is_touched, "transformed");

    let Some(out_dir) = &action.out_dir else {
        result.code = Some(output.code.into_owned());
        return result;
    };

    let outfile = out_dir.join(&input.relative);
    if let Err(e) = write_output(&outfile, &output.code, output.map.as_deref()) {
        result.error = Some(FileErrorJson::io(&e));
        return result;
    }
    result.outfile = Some(outfile.display().to_string());
    result
}

fn write_output(outfile: &Path, code: &str, map: Option<&str>) -> std::io::Result<()> {
    if let Some(parent) = outfile.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(outfile, code)?;
    if let Some(map) = map {
        let mut map_path = outfile.as_os_str().to_owned();
        map_path.push(".map");
        std::fs::write(PathBuf::from(map_path), map)?;
    }
    Ok(())
}

/// Expand the command-line paths into a sorted, deduplicated file list.
fn collect_inputs(cwd: &Path, paths: &[PathBuf]) -> Result<Vec<Input>> {
    let mut inputs = Vec::new();

    for path in paths {
        let root = cwd.join(path);
        if root.is_dir() {
            for entry in WalkDir::new(&root)
                .into_iter()
                .filter_entry(|e| !is_excluded_dir(e))
                .filter_map(|e| e.ok())
            {
                let file = entry.path();
                if entry.file_type().is_file() && is_supported_extension(file) {
                    let relative = file.strip_prefix(&root).unwrap_or(file).to_path_buf();
                    inputs.push(Input {
                        path: file.to_path_buf(),
                        relative,
                    });
                }
            }
        } else if root.is_file() {
            let relative = root.file_name().map(PathBuf::from).unwrap_or_default();
            inputs.push(Input {
                path: root,
                relative,
            });
        } else {
            return Err(miette::miette!("Input not found: {}", root.display()));
        }
    }

    inputs.sort();
    inputs.dedup_by(|a, b| a.path == b.path);

    let mut targets: HashMap<&Path, &Path> = HashMap::new();
    for input in &inputs {
        if let Some(other) = targets.insert(&input.relative, &input.path) {
            return Err(miette::miette!(
                "Inputs {} and {} would both be written to {}",
                other.display(),
                input.path.display(),
                input.relative.display()
            ));
        }
    }

    Ok(inputs)
}

fn is_excluded_dir(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_dir()
        && EXCLUDE_DIRS
            .iter()
            .any(|excluded| entry.file_name() == std::ffi::OsStr::new(*excluded))
}

fn is_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| EXTENSIONS.contains(&ext))
}
