//! `pyobfuscate` — project-wide identifier obfuscation engine for
//! Python sources.
//!
//! This crate indexes every declaration, import, attribute access and
//! dynamic-name call site across a multi-file project, classifies
//! each symbol as project-owned, external or uncertain-but-likely-local,
//! emits one deterministic rename map, and rewrites every source file
//! with `tree-sitter`-accurate edits that keep the output parseable.
//!
//! See [`orchestrator::Orchestrator::transform`] for the single
//! entry point a CLI or other collaborator drives.

pub mod cli;
pub mod error;
pub mod indexer;
pub mod model;
pub mod orchestrator;
pub mod ownership;
pub mod parse;
pub mod rename_map;
pub mod rewriter;
