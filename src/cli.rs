// -----------------------------------------------------------------------------
// CLI definitions for the obfuscator.
// All command-line argument parsing happens here using clap, extracted
// from the binary entry point to keep things organized.
// -----------------------------------------------------------------------------

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Project-wide identifier obfuscator for Python sources.
#[derive(Parser, Debug)]
#[command(
    name = "pyobfuscate",
    about = "Rewrites every in-project identifier to an opaque token while preserving behavior.",
    author
)]
pub struct Cli {
    /// Project root to read sources from. Must be an existing
    /// directory containing a `.gitignore`.
    #[arg(long, value_name = "DIR")]
    pub input: PathBuf,

    /// Directory to write the obfuscated copy to. Must not already be
    /// a non-empty directory, and must not nest with `--input`.
    #[arg(long, value_name = "DIR")]
    pub output: PathBuf,

    /// Report what would be renamed without writing any files.
    #[arg(long)]
    pub dry_run: bool,

    /// Emit the TransformSummary as JSON instead of a human table.
    #[arg(long)]
    pub json: bool,

    /// Minimum log level.
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}
