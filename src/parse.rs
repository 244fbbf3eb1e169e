//! Parse Facade — produces a concrete-syntax tree for one source file
//! and reports parse errors with position. Wraps `tree-sitter-python`;
//! this is the only module that imports `tree_sitter` directly outside
//! of the Rewriter, which re-parses output for the validation gate.

use std::path::{Path, PathBuf};

use tree_sitter::{Parser, Tree};

use crate::error::ParseError;

/// A parsed file: its source text plus the tree-sitter tree over it.
/// Byte offsets in the tree always index into `source`.
pub struct ParsedFile {
    pub path: PathBuf,
    pub source: String,
    pub tree: Tree,
}

impl ParsedFile {
    pub fn root_node(&self) -> tree_sitter::Node<'_> {
        self.tree.root_node()
    }
}

/// Thin wrapper around a configured `tree_sitter::Parser`. One
/// instance is reused across every file in a project.
pub struct ParseFacade {
    parser: Parser,
}

impl ParseFacade {
    pub fn new() -> Self {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .expect("tree-sitter-python grammar failed to load");
        Self { parser }
    }

    /// Parse one file's content. `tree-sitter` does not hard-fail on
    /// malformed input — it produces a tree peppered with `ERROR`
    /// nodes — so we additionally walk the tree once looking for the
    /// first `ERROR` or missing node and surface it as a `ParseError`
    /// with a line/column position, so parse errors are always
    /// reported and never silently accepted.
    pub fn parse(&mut self, path: &Path, source: &str) -> Result<ParsedFile, ParseError> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| ParseError::Syntax {
                path: path.to_path_buf(),
                line: 0,
                column: 0,
                message: "parser produced no tree".to_string(),
            })?;

        if let Some(bad) = first_error_node(&tree.root_node()) {
            let pos = bad.start_position();
            return Err(ParseError::Syntax {
                path: path.to_path_buf(),
                line: pos.row + 1,
                column: pos.column + 1,
                message: if bad.is_missing() {
                    format!("missing {}", bad.kind())
                } else {
                    "syntax error".to_string()
                },
            });
        }

        Ok(ParsedFile {
            path: path.to_path_buf(),
            source: source.to_string(),
            tree,
        })
    }

    /// Re-parse rewritten output for the post-rewrite validation gate.
    /// Returns `Ok(())` when the text is parser-accepted (not
    /// necessarily byte-identical to any prior parse).
    pub fn validate(&mut self, path: &Path, source: &str) -> Result<(), ParseError> {
        self.parse(path, source).map(|_| ())
    }
}

impl Default for ParseFacade {
    fn default() -> Self {
        Self::new()
    }
}

fn first_error_node<'a>(node: &tree_sitter::Node<'a>) -> Option<tree_sitter::Node<'a>> {
    if node.is_error() || node.is_missing() {
        return Some(*node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = first_error_node(&child) {
            return Some(found);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_source() {
        let mut facade = ParseFacade::new();
        let result = facade.parse(Path::new("a.py"), "def f(x):\n    return x\n");
        assert!(result.is_ok());
    }

    #[test]
    fn reports_syntax_error_with_position() {
        let mut facade = ParseFacade::new();
        let result = facade.parse(Path::new("a.py"), "def f(x:\n    return x\n");
        assert!(result.is_err());
    }
}
