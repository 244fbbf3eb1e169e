// -----------------------------------------------------------------------------
// pyobfuscate — CLI entry point.
//
// Owns CLI parsing, `.gitignore`-filtered copy, and phase-marker/exit-code
// reporting. The actual obfuscation engine lives entirely in the
// library crate and never touches argv or stdout directly.
// -----------------------------------------------------------------------------

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use ignore::WalkBuilder;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pyobfuscate::cli::Cli;
use pyobfuscate::orchestrator::Orchestrator;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", cli.log_level.as_str());
    }
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(ValidationFailure(msg)) if msg.starts_with("VALIDATION:") => {
            eprintln!("{}", msg.trim_start_matches("VALIDATION:"));
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("status=failure");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

struct ValidationFailure(String);
impl std::fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::fmt::Debug for ValidationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::error::Error for ValidationFailure {}

fn run(cli: &Cli) -> Result<()> {
    eprintln!("validation:start");
    validate(cli).map_err(|e| ValidationFailure(format!("VALIDATION:{e}")))?;
    eprintln!("validation:done");

    eprintln!("copy:start");
    let file_set = copy_project(&cli.input, &cli.output)?;
    eprintln!("copy:done");

    if cli.dry_run {
        eprintln!("transform:start");
        eprintln!("transform:done");
        println!("status=success (dry-run, {} file(s) would be transformed)", file_set.len());
        return Ok(());
    }

    eprintln!("transform:start");
    let summary = Orchestrator::transform(&cli.output, &file_set)
        .context("transform failed")?;
    eprintln!("transform:done");

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary_table(&summary);
    }
    println!("status=success");
    Ok(())
}

fn validate(cli: &Cli) -> Result<(), String> {
    if !cli.input.is_dir() {
        return Err(format!("input directory does not exist: {}", cli.input.display()));
    }
    if !cli.input.join(".gitignore").is_file() {
        return Err(format!(
            "input directory must contain a .gitignore: {}",
            cli.input.display()
        ));
    }
    if cli.output.is_dir() {
        let non_empty = fs::read_dir(&cli.output)
            .map(|mut it| it.next().is_some())
            .unwrap_or(false);
        if non_empty {
            return Err(format!(
                "output directory exists and is not empty: {}",
                cli.output.display()
            ));
        }
    }
    if paths_nest(&cli.input, &cli.output) {
        return Err("input and output paths must not nest".to_string());
    }
    Ok(())
}

fn paths_nest(a: &Path, b: &Path) -> bool {
    let (Ok(a), Ok(b)) = (a.canonicalize(), b.canonicalize().or_else(|_| {
        b.parent()
            .map(|p| p.canonicalize())
            .unwrap_or_else(|| Ok(b.to_path_buf()))
    })) else {
        return false;
    };
    a.starts_with(&b) || b.starts_with(&a)
}

/// Walks `input` with `.gitignore` filtering (and always excludes VCS
/// metadata — `ignore::WalkBuilder`'s default), copies every file into
/// `output` preserving relative structure, and returns the
/// project-relative paths of every `.py` file found, in discovery
/// order (the orchestrator re-sorts lexicographically itself).
fn copy_project(input: &Path, output: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(output)
        .with_context(|| format!("creating output directory {}", output.display()))?;

    let mut py_files = Vec::new();
    let walker = WalkBuilder::new(input).hidden(false).git_ignore(true).build();
    for entry in walker {
        let entry = entry.context("walking input directory")?;
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(input)
            .context("input entry escaped input root")?;
        let dest = output.join(rel);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(entry.path(), &dest)
            .with_context(|| format!("copying {}", entry.path().display()))?;
        if rel.extension().map(|e| e == "py").unwrap_or(false) {
            py_files.push(rel.to_path_buf());
        }
    }
    Ok(py_files)
}

fn print_summary_table(summary: &pyobfuscate::orchestrator::TransformSummary) {
    println!("Python files discovered : {}", summary.python_files_discovered);
    println!("Python files processed  : {}", summary.python_files_processed);
    println!("Python files unchanged  : {}", summary.python_files_unchanged);
    println!("Symbols discovered      : {}", summary.symbols_discovered);
    println!("Symbols renamed         : {}", summary.symbols_renamed);
    println!("  via likely-local      : {}", summary.symbols_renamed_likely_local);
    println!("Symbols skipped external: {}", summary.symbols_skipped_external);
    println!("Dynamic-name rewrites   : {}", summary.dynamic_name_rewrites);
    if !summary.warnings.is_empty() {
        println!("Warnings ({}):", summary.warnings.len());
        for w in &summary.warnings {
            println!(
                "  {}:{}:{} {} ({})",
                w.file.display(),
                w.line,
                w.column,
                w.symbol,
                w.reason
            );
        }
    }
}
