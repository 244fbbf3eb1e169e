//! Typed fatal-error taxonomy for the obfuscation engine.
//!
//! Everything here is a fatal condition: the orchestrator
//! turns any of these into an aborted `TransformSummary` without
//! touching further files. Non-fatal conditions (ambiguous ownership,
//! uncertain dynamic-name resolution) are not errors — they are
//! warnings accumulated on `TransformSummary`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{path}:{line}:{column}: {message}")]
    Syntax {
        path: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },
    #[error("{path}: failed to read source: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("rename token space exhausted after {attempted} candidates")]
    TokenExhaustion { attempted: usize },

    #[error("{path}: rewritten output failed to re-parse: {message}")]
    RewriteValidation { path: PathBuf, message: String },

    #[error("{path}: I/O error: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
