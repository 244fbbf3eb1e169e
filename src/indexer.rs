//! Project Indexer — one pass per file that records declarations,
//! import bindings, dynamic-name call sites and per-symbol location
//! metadata, aggregated into an immutable `ProjectIndex`.
//!
//! Cross-file lookups (is this imported name project-owned? does this
//! method return a project type?) are deliberately *not* resolved
//! eagerly here — cyclic imports are handled by building the index in
//! one pass without eager resolution and deferring cross-file
//! questions to the rewrite phase, once the full index exists.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use tree_sitter::Node;

use crate::model::{is_dunder, SymbolKind};
use crate::parse::ParsedFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start_byte: usize,
    pub end_byte: usize,
    pub start_line: usize,
    pub start_column: usize,
}

impl Span {
    fn from_node(node: &Node) -> Self {
        let pos = node.start_position();
        Self {
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            start_line: pos.row + 1,
            start_column: pos.column + 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Declaration {
    pub file: PathBuf,
    pub scope_path: String,
    pub name: String,
    pub kind: SymbolKind,
    pub span: Span,
    /// Populated for `SymbolKind::Class`: attribute names assigned in
    /// the class body or in any `self.<attr> = ...` inside its methods.
    pub attributes: Option<HashSet<String>>,
    /// Populated for `SymbolKind::Function` / `SymbolKind::Method`
    /// when a return annotation is present, used for one-hop
    /// method-return ownership propagation (we never chase past the
    /// first call).
    pub return_annotation: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ImportBinding {
    pub source_module: String,
    /// `None` means this binds the whole module (`import foo [as x]`);
    /// `Some(name)` means `from foo import name [as x]`.
    pub imported_member: Option<String>,
    pub is_project_module: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynamicKind {
    Get,
    Set,
    Has,
}

#[derive(Debug, Clone)]
pub struct DynamicSite {
    pub file: PathBuf,
    pub span: Span,
    pub kind: DynamicKind,
    pub receiver_expression: String,
    pub name_literal: Option<String>,
}

/// The immutable cross-file aggregate. Constructed once, read by the
/// Rename Mapper and consulted (read-only) by the Ownership Resolver
/// and Rewriter during the rewrite phase.
#[derive(Debug, Default)]
pub struct ProjectIndex {
    pub declarations: HashMap<(PathBuf, String, String), Declaration>,
    pub imports: HashMap<PathBuf, HashMap<String, ImportBinding>>,
    pub attribute_owners: HashMap<String, HashSet<String>>,
    pub dynamic_sites: Vec<DynamicSite>,
    /// name -> annotation text, collected wherever an annotation names
    /// it; used only as an ownership-inference signal, never renamed
    /// differently because of it.
    pub type_hints: HashMap<String, String>,
    pub rename_candidates: HashSet<String>,
    pub external_names: HashSet<String>,
    pub likely_local_attribute_names: HashSet<String>,
    /// Every class name declared anywhere in the project — used by the
    /// Ownership Resolver to recognize `x = SomeClass(...)`.
    pub project_classes: HashSet<String>,
    /// function/method name -> one-hop return annotation, when known.
    pub project_callables: HashMap<String, Option<String>>,
    /// every identifier spelling observed anywhere in the project,
    /// used by the Rename Mapper to avoid token collisions.
    pub all_identifiers: HashSet<String>,
}

impl ProjectIndex {
    pub fn is_project_class(&self, name: &str) -> bool {
        self.project_classes.contains(name)
    }

    pub fn class_attributes(&self, class_name: &str) -> Option<&HashSet<String>> {
        self.declarations
            .values()
            .find(|d| d.kind == SymbolKind::Class && d.name == class_name)
            .and_then(|d| d.attributes.as_ref())
    }
}

pub struct ProjectIndexer<'a> {
    project_root: &'a Path,
    /// dotted module path -> project-relative file path, used to
    /// resolve `import`/`from ... import` against the project file set.
    module_map: HashMap<String, PathBuf>,
}

impl<'a> ProjectIndexer<'a> {
    pub fn new(project_root: &'a Path, files: &[ParsedFile]) -> Self {
        let mut module_map = HashMap::new();
        for f in files {
            if let Ok(rel) = f.path.strip_prefix(project_root) {
                if let Some(module) = module_dotted_path(rel) {
                    module_map.insert(module, f.path.clone());
                }
            }
        }
        Self {
            project_root,
            module_map,
        }
    }

    /// Public contract: `index(files) -> ProjectIndex`.
    pub fn index(&self, files: &[ParsedFile]) -> ProjectIndex {
        let mut idx = ProjectIndex::default();

        // First sub-pass: collect every class name project-wide so
        // that `x = SomeClass(...)` recognition works regardless of
        // declaration order across files.
        for f in files {
            collect_class_names(&f.root_node(), &f.source, &mut idx.project_classes);
        }

        for f in files {
            let mut ctx = FileCtx {
                file: f.path.clone(),
                source: f.source.as_bytes(),
                scope: Vec::new(),
                current_class: None,
                module_map: &self.module_map,
                idx: &mut idx,
            };
            walk(&f.root_node(), &mut ctx, true);
        }

        // `attribute_owners` and `dynamic_sites` are the project-wide
        // aggregates for attribute rename-eligibility and dynamic-name
        // call evidence; both derived sets consumed by the Rename
        // Mapper and Rewriter (`rename_candidates`,
        // `likely_local_attribute_names`) are built directly from them
        // here, once, rather than duplicated at each collection call
        // site that first discovers an attribute or dynamic-call name.
        for attr in idx.attribute_owners.keys() {
            idx.rename_candidates.insert(attr.clone());
            if !is_dunder(attr) {
                idx.likely_local_attribute_names.insert(attr.clone());
            }
        }
        for site in &idx.dynamic_sites {
            if let Some(name) = &site.name_literal {
                if !is_dunder(name) && !idx.external_names.contains(name) {
                    idx.likely_local_attribute_names.insert(name.clone());
                }
            }
        }

        idx.rename_candidates.retain(|n| {
            !idx.external_names.contains(n)
                && !is_dunder(n)
                && !crate::model::is_python_keyword(n)
                && !crate::model::is_python_builtin(n)
        });
        idx
    }
}

struct FileCtx<'i> {
    file: PathBuf,
    source: &'i [u8],
    scope: Vec<String>,
    current_class: Option<String>,
    module_map: &'i HashMap<String, PathBuf>,
    idx: &'i mut ProjectIndex,
}

impl<'i> FileCtx<'i> {
    fn scope_path(&self) -> String {
        if self.scope.is_empty() {
            "module".to_string()
        } else {
            format!("module::{}", self.scope.join("::"))
        }
    }

    fn text(&self, node: &Node) -> String {
        node.utf8_text(self.source).unwrap_or_default().to_string()
    }

    fn record_declaration(
        &mut self,
        name: &str,
        kind: SymbolKind,
        span: Span,
        attributes: Option<HashSet<String>>,
        return_annotation: Option<String>,
    ) {
        self.idx.all_identifiers.insert(name.to_string());
        if is_dunder(name) {
            return;
        }
        let key = (self.file.clone(), self.scope_path(), name.to_string());
        self.idx.declarations.insert(
            key,
            Declaration {
                file: self.file.clone(),
                scope_path: self.scope_path(),
                name: name.to_string(),
                kind,
                span,
                attributes,
                return_annotation: return_annotation.clone(),
            },
        );
        if matches!(kind, SymbolKind::Function | SymbolKind::Method) {
            self.idx
                .project_callables
                .insert(name.to_string(), return_annotation);
        }
        self.idx.rename_candidates.insert(name.to_string());
    }
}

fn collect_class_names(node: &Node, source: &str, out: &mut HashSet<String>) {
    if node.kind() == "class_definition" {
        if let Some(name_node) = node.child_by_field_name("name") {
            out.insert(name_node.utf8_text(source.as_bytes()).unwrap_or("").to_string());
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_class_names(&child, source, out);
    }
}

fn module_dotted_path(rel: &Path) -> Option<String> {
    let rel = rel.with_extension("");
    let mut parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    if parts.last().map(|s| s.as_str()) == Some("__init__") {
        parts.pop();
    }
    if parts.is_empty() {
        return None;
    }
    // Treat a leading `src` directory as the conventional project-layout
    // root rather than part of the dotted module path.
    if parts.first().map(|s| s.as_str()) == Some("src") {
        parts.remove(0);
    }
    Some(parts.join("."))
}

/// Pre-order walk. `top_level` tracks whether we are still directly
/// inside the module body (used only to decide whether an assignment
/// target is a module-level symbol vs. a local).
fn walk(node: &Node, ctx: &mut FileCtx, top_level: bool) {
    match node.kind() {
        "class_definition" => {
            index_class(node, ctx);
            return; // index_class recurses into the body itself
        }
        "function_definition" => {
            index_function(node, ctx);
            return;
        }
        "import_statement" => {
            index_import_statement(node, ctx);
        }
        "import_from_statement" => {
            index_import_from_statement(node, ctx);
        }
        "assignment" => {
            index_assignment(node, ctx, top_level);
        }
        "call" => {
            index_dynamic_call(node, ctx);
        }
        "string" => {
            // Never descend into plain string content; interpolation
            // fragments inside f-strings are visited explicitly so we
            // don't accidentally index identifiers living in literal
            // text.
            index_fstring_expressions(node, ctx);
            return;
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(&child, ctx, false);
    }
}

fn index_class(node: &Node, ctx: &mut FileCtx) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = ctx.text(&name_node);
    let span = Span::from_node(node);

    let mut attributes = HashSet::new();
    if let Some(body) = node.child_by_field_name("body") {
        collect_class_attributes(&body, ctx, &mut attributes);
    }
    for attr in &attributes {
        // `rename_candidates`/`likely_local_attribute_names` entries
        // for this attribute are derived from `attribute_owners` once,
        // after every file is indexed (see `ProjectIndexer::index`) —
        // recording ownership here is all this call site does.
        ctx.idx
            .attribute_owners
            .entry(attr.clone())
            .or_default()
            .insert(name.clone());
    }

    ctx.record_declaration(&name, SymbolKind::Class, span, Some(attributes), None);

    ctx.scope.push(name.clone());
    let prev_class = ctx.current_class.replace(name);
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for child in body.children(&mut cursor) {
            walk(&child, ctx, false);
        }
    }
    ctx.current_class = prev_class;
    ctx.scope.pop();
}

/// Direct-child attribute declarations: `x = 1`, `x: int`, `x: int = 1`
/// at class-body top level, plus `self.<attr> = ...` anywhere in any
/// method of the class.
fn collect_class_attributes(body: &Node, ctx: &FileCtx, out: &mut HashSet<String>) {
    let mut cursor = body.walk();
    for child in body.children(&mut cursor) {
        match child.kind() {
            "expression_statement" => {
                let mut inner = child.walk();
                for grand in child.children(&mut inner) {
                    collect_class_body_assignment_target(&grand, ctx, out);
                }
            }
            "assignment" => collect_class_body_assignment_target(&child, ctx, out),
            "function_definition" => collect_self_attributes(&child, ctx, out),
            _ => {}
        }
    }
}

fn collect_class_body_assignment_target(node: &Node, ctx: &FileCtx, out: &mut HashSet<String>) {
    if node.kind() != "assignment" {
        return;
    }
    if let Some(left) = node.child_by_field_name("left") {
        if left.kind() == "identifier" {
            out.insert(ctx.text(&left));
        }
    }
}

fn collect_self_attributes(func: &Node, ctx: &FileCtx, out: &mut HashSet<String>) {
    fn recurse(node: &Node, ctx: &FileCtx, out: &mut HashSet<String>) {
        if node.kind() == "assignment" {
            if let Some(left) = node.child_by_field_name("left") {
                if left.kind() == "attribute" {
                    if let (Some(obj), Some(attr)) = (
                        left.child_by_field_name("object"),
                        left.child_by_field_name("attribute"),
                    ) {
                        if ctx.text(&obj) == "self" {
                            out.insert(ctx.text(&attr));
                        }
                    }
                }
            }
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            recurse(&child, ctx, out);
        }
    }
    recurse(func, ctx, out);
}

fn index_function(node: &Node, ctx: &mut FileCtx) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = ctx.text(&name_node);
    let span = Span::from_node(node);
    let kind = if ctx.current_class.is_some() {
        SymbolKind::Method
    } else {
        SymbolKind::Function
    };
    let return_annotation = node
        .child_by_field_name("return_type")
        .map(|n| ctx.text(&n));

    ctx.record_declaration(&name, kind, span, None, return_annotation);

    ctx.scope.push(name.clone());
    if let Some(params) = node.child_by_field_name("parameters") {
        index_parameters(&params, ctx);
    }
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for child in body.children(&mut cursor) {
            walk(&child, ctx, false);
        }
    }
    ctx.scope.pop();
}

fn index_parameters(params: &Node, ctx: &mut FileCtx) {
    let mut cursor = params.walk();
    for child in params.children(&mut cursor) {
        let (ident, annotation) = match child.kind() {
            "identifier" => (Some(child), None),
            "typed_parameter" => {
                let ident = first_child_of_kind(&child, "identifier");
                let annotation = child.child_by_field_name("type").map(|n| ctx.text(&n));
                (ident, annotation)
            }
            "default_parameter" => (child.child_by_field_name("name"), None),
            "typed_default_parameter" => {
                let ident = child.child_by_field_name("name");
                let annotation = child.child_by_field_name("type").map(|n| ctx.text(&n));
                (ident, annotation)
            }
            _ => (None, None),
        };
        if let Some(ident) = ident {
            let name = ctx.text(&ident);
            if name == "self" || name == "cls" {
                continue;
            }
            let span = Span::from_node(&ident);
            if let Some(ann) = &annotation {
                ctx.idx.type_hints.insert(name.clone(), ann.clone());
            }
            ctx.record_declaration(&name, SymbolKind::Parameter, span, None, None);
        }
    }
}

fn index_import_statement(node: &Node, ctx: &mut FileCtx) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "dotted_name" => {
                let module = ctx.text(&child);
                let bind_name = module.split('.').next().unwrap_or(&module).to_string();
                // `import pkg.sub` binds the top-level package name
                // `pkg` in this file's namespace; the rewriter only
                // ever rewrites this form of import statement when the
                // bound name is a single component (see
                // `rewrite_import_statement`'s `!module.contains('.')`
                // guard), since renaming `pkg` here without also
                // requalifying every `pkg.sub....` reference downstream
                // would leave the import and its usages referring to
                // different names. So a dotted bind is never a rename
                // candidate, keeping the declaration site and every
                // reference to `pkg` consistent (both left untouched).
                let renamable = !module.contains('.');
                record_import(ctx, &bind_name, &module, None, renamable);
            }
            "aliased_import" => {
                let Some(name_node) = child.child_by_field_name("name") else {
                    continue;
                };
                let Some(alias_node) = child.child_by_field_name("alias") else {
                    continue;
                };
                let module = ctx.text(&name_node);
                let alias = ctx.text(&alias_node);
                record_import(ctx, &alias, &module, None, true);
            }
            _ => {}
        }
    }
}

fn index_import_from_statement(node: &Node, ctx: &mut FileCtx) {
    let Some(module_node) = node.child_by_field_name("module_name") else {
        return;
    };
    let module = ctx.text(&module_node);

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "dotted_name" if child.id() != module_node.id() => {
                let member = ctx.text(&child);
                record_import(ctx, &member, &module, Some(member.clone()), true);
            }
            "aliased_import" => {
                let Some(name_node) = child.child_by_field_name("name") else {
                    continue;
                };
                let Some(alias_node) = child.child_by_field_name("alias") else {
                    continue;
                };
                let member = ctx.text(&name_node);
                let alias = ctx.text(&alias_node);
                record_import(ctx, &alias, &module, Some(member), true);
            }
            "wildcard_import" => {
                record_import(ctx, "*", &module, None, false);
            }
            _ => {}
        }
    }
}

/// `renamable` is false only for a plain `import pkg.sub`'s top-level
/// bind name (see the comment at its call site) and for the `*` of a
/// wildcard import, which isn't a real identifier to begin with.
fn record_import(
    ctx: &mut FileCtx,
    bind_name: &str,
    module: &str,
    member: Option<String>,
    renamable: bool,
) {
    let is_project_module = ctx.module_is_project(module);
    ctx.idx.all_identifiers.insert(bind_name.to_string());

    if is_project_module {
        if let Some(m) = &member {
            ctx.idx.rename_candidates.insert(m.clone());
        }
        if renamable {
            ctx.idx.rename_candidates.insert(bind_name.to_string());
        }
    } else {
        ctx.idx.external_names.insert(bind_name.to_string());
        if let Some(m) = &member {
            ctx.idx.external_names.insert(m.clone());
        }
    }

    ctx.idx
        .imports
        .entry(ctx.file.clone())
        .or_default()
        .insert(
            bind_name.to_string(),
            ImportBinding {
                source_module: module.to_string(),
                imported_member: member,
                is_project_module,
            },
        );
}

impl<'i> FileCtx<'i> {
    /// A dotted module path is project-local iff it resolves to a file
    /// in the project set directly, or is a package prefix of one
    /// (`pkg` resolves via `pkg/__init__.py`, `pkg.sub` via the
    /// `module_map` entry built for that file's dotted path).
    fn module_is_project(&self, module: &str) -> bool {
        if module.is_empty() {
            return false;
        }
        self.module_map.contains_key(module)
    }
}

fn first_child_of_kind<'a>(node: &'a Node, kind: &str) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).find(|c| c.kind() == kind)
}

fn index_dynamic_call(node: &Node, ctx: &mut FileCtx) {
    let Some(function) = node.child_by_field_name("function") else {
        return;
    };
    if function.kind() != "identifier" {
        return;
    }
    let callee = ctx.text(&function);
    let kind = match callee.as_str() {
        "getattr" => DynamicKind::Get,
        "setattr" => DynamicKind::Set,
        "hasattr" => DynamicKind::Has,
        _ => return,
    };
    let Some(args) = node.child_by_field_name("arguments") else {
        return;
    };
    let mut positional = Vec::new();
    let mut cursor = args.walk();
    for child in args.children(&mut cursor) {
        if matches!(child.kind(), "(" | ")" | ",") {
            continue;
        }
        positional.push(child);
    }
    if positional.len() < 2 {
        return;
    }
    let receiver_expression = ctx.text(&positional[0]);
    let name_node = &positional[1];
    let name_literal = if name_node.kind() == "string" {
        string_literal_value(name_node, ctx.source)
    } else {
        None
    };
    // `likely_local_attribute_names`'s dynamic-call evidence is derived
    // from `dynamic_sites` once, after every file is indexed (see
    // `ProjectIndexer::index`) — `external_names` isn't even fully
    // populated yet at this point in a single-file pass, so filtering
    // against it here would be unreliable for names only known to be
    // external via a file processed later.
    ctx.idx.dynamic_sites.push(DynamicSite {
        file: ctx.file.clone(),
        span: Span::from_node(node),
        kind,
        receiver_expression,
        name_literal,
    });
}

/// Extracts the literal text of a simple (non-interpolated) string
/// node, stripping quotes/prefix. Returns `None` for f-strings, since
/// those are not literal name arguments.
pub fn string_literal_value(node: &Node, source: &[u8]) -> Option<String> {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "interpolation" {
            return None;
        }
    }
    let text = node.utf8_text(source).ok()?;
    let trimmed = text.trim_start_matches(['r', 'b', 'R', 'B']);
    let inner = trimmed
        .trim_matches('"')
        .trim_matches('\'')
        .to_string();
    Some(inner)
}

fn index_fstring_expressions(node: &Node, ctx: &mut FileCtx) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "interpolation" {
            let mut inner_cursor = child.walk();
            for expr in child.children(&mut inner_cursor) {
                if !matches!(expr.kind(), "{" | "}" | "!" | "format_spec" | ":") {
                    walk(&expr, ctx, false);
                }
            }
        }
    }
}

fn index_assignment(node: &Node, ctx: &mut FileCtx, _top_level: bool) {
    let Some(left) = node.child_by_field_name("left") else {
        return;
    };
    let annotation = node.child_by_field_name("type").map(|n| ctx.text(&n));

    index_assignment_targets(&left, ctx, annotation.as_deref());

    if let Some(right) = node.child_by_field_name("right") {
        walk(&right, ctx, false);
    }
}

fn index_assignment_targets(target: &Node, ctx: &mut FileCtx, annotation: Option<&str>) {
    match target.kind() {
        "identifier" => {
            let name = ctx.text(target);
            let span = Span::from_node(target);
            if let Some(ann) = annotation {
                ctx.idx.type_hints.insert(name.clone(), ann.to_string());
            }
            ctx.record_declaration(&name, SymbolKind::Local, span, None, None);
        }
        "attribute" => {
            // `self.x = ...` is handled by `collect_self_attributes`
            // ahead of time; a bare reference here doesn't declare a
            // new symbol, so nothing further to index.
        }
        "tuple_pattern" | "list_pattern" | "pattern_list" => {
            let mut cursor = target.walk();
            for child in target.children(&mut cursor) {
                index_assignment_targets(&child, ctx, None);
            }
        }
        _ => {}
    }
}
