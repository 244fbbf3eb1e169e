//! Symbol kinds and ownership model shared by every other module.
//!
//! These are plain value types — the enumerations and value types
//! used throughout. Nothing here touches a syntax tree; it's the
//! vocabulary the indexer, mapper, resolver and rewriter all speak.

use serde::Serialize;

/// What a declaration site is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SymbolKind {
    Module,
    Class,
    Function,
    Method,
    Parameter,
    Local,
    ClassAttribute,
    ImportAlias,
}

/// Ownership verdict for a usage site: does this name refer to
/// something declared in the project, something external, or can we
/// not tell?
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Ownership {
    ProjectLocal,
    External,
    Unresolved,
}

/// Confidence behind a mapped symbol, or behind an ownership verdict
/// that resolved to `ProjectLocal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Provenance {
    /// A declaration for this name was found in the project index.
    ResolvedLocal,
    /// No contrary evidence; renamed with a warning attached.
    LikelyLocal,
    /// Known to originate outside the project (stdlib, third-party).
    ExternalCertain,
}

/// A name is dunder when it starts and ends with `__`. Dunder names
/// are never renamed, anywhere, under any verdict.
pub fn is_dunder(name: &str) -> bool {
    name.len() > 4 && name.starts_with("__") && name.ends_with("__")
}

/// Parser keywords of the target language. The Rename Mapper must
/// never emit one of these as a generated token, and the indexer
/// never treats one as a renamable name.
pub const PYTHON_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield", "match", "case",
];

/// Builtin names that are never treated as project-owned and whose
/// keyword arguments are never rewritten — calls to these are always
/// treated as external.
pub const PYTHON_BUILTINS: &[&str] = &[
    "sorted", "len", "min", "max", "enumerate", "range", "list", "dict", "set", "tuple", "str",
    "int", "float", "bool", "print", "getattr", "setattr", "hasattr", "isinstance", "super",
    "zip", "map", "filter", "reversed", "open", "iter", "next", "type", "repr", "format",
];

pub fn is_python_keyword(name: &str) -> bool {
    PYTHON_KEYWORDS.contains(&name)
}

pub fn is_python_builtin(name: &str) -> bool {
    PYTHON_BUILTINS.contains(&name)
}
