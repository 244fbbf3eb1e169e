//! Orchestrator — drives the whole pipeline: index every discovered
//! file, build the rename map, rewrite each file, emit counters.
//!
//! Single-threaded and synchronous by design: determinism is
//! a hard requirement, so there is no concurrent traversal here. Files
//! are processed in lexicographic order of their project-relative
//! paths.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::TransformError;
use crate::indexer::ProjectIndexer;
use crate::parse::ParseFacade;
use crate::rename_map::RenameMapper;
use crate::rewriter::{RewriteWarning, Rewriter};

#[derive(Debug, Default, Serialize)]
pub struct TransformSummary {
    pub symbols_discovered: usize,
    pub symbols_renamed: usize,
    pub symbols_skipped_external: usize,
    pub symbols_renamed_likely_local: usize,
    pub dynamic_name_rewrites: usize,
    pub python_files_discovered: usize,
    pub python_files_processed: usize,
    pub python_files_unchanged: usize,
    pub warnings: Vec<WarningEntry>,
}

#[derive(Debug, Serialize)]
pub struct WarningEntry {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
    pub symbol: String,
    pub reason: String,
}

impl From<RewriteWarning> for WarningEntry {
    fn from(w: RewriteWarning) -> Self {
        Self {
            file: w.file,
            line: w.line,
            column: w.column,
            symbol: w.symbol,
            reason: w.reason.to_string(),
        }
    }
}

pub struct Orchestrator;

impl Orchestrator {
    /// Public contract: `transform(project_root, file_set) -> TransformSummary`.
    ///
    /// `file_set` is project-relative paths; every one of them is
    /// assumed readable and writable — enforced by the CLI's copy and
    /// validation phases before this is ever called.
    pub fn transform(
        project_root: &Path,
        file_set: &[PathBuf],
    ) -> Result<TransformSummary, TransformError> {
        let mut files: Vec<PathBuf> = file_set.to_vec();
        files.sort();

        let mut facade = ParseFacade::new();
        let mut parsed = Vec::with_capacity(files.len());

        info!(count = files.len(), "indexing project files");
        for rel in &files {
            let abs = project_root.join(rel);
            let source = fs::read_to_string(&abs).map_err(|e| TransformError::Io {
                path: abs.clone(),
                source: e,
            })?;
            let parsed_file = facade.parse(&abs, &source)?;
            parsed.push(parsed_file);
        }

        let indexer = ProjectIndexer::new(project_root, &parsed);
        let index = indexer.index(&parsed);
        debug!(
            candidates = index.rename_candidates.len(),
            external = index.external_names.len(),
            "built project index"
        );

        let map = RenameMapper::build_map(&index)?;
        info!(mapped = map.mapping.len(), "built rename map");

        let mut summary = TransformSummary {
            symbols_discovered: index.declarations.len(),
            symbols_skipped_external: index.external_names.len(),
            python_files_discovered: parsed.len(),
            ..Default::default()
        };

        for file in &parsed {
            let outcome = Rewriter::rewrite(
                &file.path,
                &file.source,
                file.root_node(),
                &index,
                &map,
            );

            if outcome.source != file.source {
                facade
                    .validate(&file.path, &outcome.source)
                    .map_err(|e| TransformError::RewriteValidation {
                        path: file.path.clone(),
                        message: e.to_string(),
                    })?;
                fs::write(&file.path, &outcome.source).map_err(|e| TransformError::Io {
                    path: file.path.clone(),
                    source: e,
                })?;
                summary.python_files_processed += 1;
            } else {
                summary.python_files_unchanged += 1;
            }

            summary.symbols_renamed += outcome.symbols_renamed;
            summary.symbols_renamed_likely_local += outcome.symbols_renamed_likely_local;
            summary.dynamic_name_rewrites += outcome.dynamic_name_rewrites;
            for w in outcome.warnings {
                if matches!(w.reason, "likely_local dynamic-name fallback" | "likely_local attribute fallback") {
                    warn!(file = %w.file.display(), line = w.line, symbol = %w.symbol, "ambiguous ownership, used likely-local fallback");
                }
                summary.warnings.push(w.into());
            }
        }

        info!(
            renamed = summary.symbols_renamed,
            processed = summary.python_files_processed,
            "transform complete"
        );

        Ok(summary)
    }
}
