//! Rewriter — source-to-source transform using AST-aware edits.
//!
//! The tree-sitter tree itself is immutable, so instead of mutating
//! nodes in place, this walks the tree once collecting a flat list of
//! byte-range edits, then splices them into a fresh output buffer in
//! one pass — slicing the original source by node byte ranges and
//! stitching replacements in between, generalized to many small edits
//! instead of one big structural one.

use std::collections::HashMap;
use std::path::PathBuf;

use tree_sitter::Node;

use crate::indexer::{string_literal_value, DynamicKind, ImportBinding, ProjectIndex};
use crate::model::Ownership;
use crate::ownership::{OwnershipResolver, ScopeBindings};
use crate::rename_map::RenameMap;

#[derive(Debug, Clone)]
pub struct RewriteWarning {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
    pub symbol: String,
    pub reason: &'static str,
}

#[derive(Debug, Default)]
pub struct RewriteOutcome {
    pub source: String,
    pub symbols_renamed: usize,
    pub symbols_renamed_likely_local: usize,
    pub dynamic_name_rewrites: usize,
    pub warnings: Vec<RewriteWarning>,
}

struct Edit {
    start: usize,
    end: usize,
    replacement: String,
}

struct RewriteCtx<'a> {
    file: PathBuf,
    source: &'a [u8],
    map: &'a RenameMap,
    index: &'a ProjectIndex,
    resolver: OwnershipResolver<'a>,
    bindings: ScopeBindings,
    call_target_stack: Vec<bool>,
    edits: Vec<Edit>,
    symbols_renamed: usize,
    symbols_renamed_likely_local: usize,
    dynamic_name_rewrites: usize,
    warnings: Vec<RewriteWarning>,
}

impl<'a> RewriteCtx<'a> {
    fn text(&self, node: &Node) -> String {
        node.utf8_text(self.source).unwrap_or("").to_string()
    }

    fn rename_identifier(&mut self, node: &Node) {
        let name = self.text(node);
        if let Some(token) = self.map.get(&name) {
            self.edits.push(Edit {
                start: node.start_byte(),
                end: node.end_byte(),
                replacement: token.to_string(),
            });
            self.symbols_renamed += 1;
        }
    }

    fn warn_unresolved(&mut self, node: &Node, symbol: &str, reason: &'static str) {
        let pos = node.start_position();
        self.warnings.push(RewriteWarning {
            file: self.file.clone(),
            line: pos.row + 1,
            column: pos.column + 1,
            symbol: symbol.to_string(),
            reason,
        });
    }
}

pub struct Rewriter;

impl Rewriter {
    /// Rewrites one already-parsed file using the global `ProjectIndex`
    /// and `RenameMap`. Does not re-parse the output; the orchestrator
    /// runs the Parse Facade's validation gate separately.
    pub fn rewrite(
        file: &PathBuf,
        source: &str,
        root: Node,
        index: &ProjectIndex,
        map: &RenameMap,
    ) -> RewriteOutcome {
        let empty_imports: HashMap<String, ImportBinding> = HashMap::new();
        let imports = index.imports.get(file).unwrap_or(&empty_imports);
        let resolver = OwnershipResolver::new(index, imports);

        let mut ctx = RewriteCtx {
            file: file.clone(),
            source: source.as_bytes(),
            map,
            index,
            resolver,
            bindings: ScopeBindings::new(),
            call_target_stack: Vec::new(),
            edits: Vec::new(),
            symbols_renamed: 0,
            symbols_renamed_likely_local: 0,
            dynamic_name_rewrites: 0,
            warnings: Vec::new(),
        };

        walk(&root, &mut ctx);

        let new_source = apply_edits(source.as_bytes(), ctx.edits);

        RewriteOutcome {
            source: new_source,
            symbols_renamed: ctx.symbols_renamed,
            symbols_renamed_likely_local: ctx.symbols_renamed_likely_local,
            dynamic_name_rewrites: ctx.dynamic_name_rewrites,
            warnings: ctx.warnings,
        }
    }
}

fn apply_edits(source: &[u8], mut edits: Vec<Edit>) -> String {
    edits.sort_by_key(|e| (e.start, e.end));
    let mut out = Vec::with_capacity(source.len());
    let mut last_end = 0usize;
    for edit in edits {
        if edit.start < last_end {
            // Overlaps a previously applied edit (shouldn't happen for
            // disjoint node spans); keep the earlier edit and skip.
            continue;
        }
        out.extend_from_slice(&source[last_end..edit.start]);
        out.extend_from_slice(edit.replacement.as_bytes());
        last_end = edit.end;
    }
    out.extend_from_slice(&source[last_end..]);
    String::from_utf8(out).unwrap_or_else(|_| String::from_utf8_lossy(&source[..]).to_string())
}

fn walk(node: &Node, ctx: &mut RewriteCtx) {
    match node.kind() {
        "class_definition" => rewrite_class(node, ctx),
        "function_definition" => rewrite_function(node, ctx),
        "lambda" => rewrite_lambda(node, ctx),
        "for_statement" => rewrite_for(node, ctx),
        "list_comprehension" | "set_comprehension" | "dictionary_comprehension"
        | "generator_expression" => rewrite_comprehension(node, ctx),
        "assignment" => rewrite_assignment(node, ctx),
        "import_statement" => rewrite_import_statement(node, ctx),
        "import_from_statement" => rewrite_import_from_statement(node, ctx),
        "call" => rewrite_call(node, ctx),
        "attribute" => rewrite_attribute(node, ctx),
        "keyword_argument" => rewrite_keyword_argument(node, ctx),
        "string" => rewrite_string(node, ctx),
        "identifier" => ctx.rename_identifier(node),
        _ => recurse_children(node, ctx),
    }
}

fn recurse_children(node: &Node, ctx: &mut RewriteCtx) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(&child, ctx);
    }
}

fn rewrite_class(node: &Node, ctx: &mut RewriteCtx) {
    if let Some(name) = node.child_by_field_name("name") {
        ctx.rename_identifier(&name);
    }
    // Base classes / keyword args in the class header still need the
    // normal pipeline (e.g. `class Widget(Base, metaclass=Meta):`).
    if let Some(superclasses) = node.child_by_field_name("superclasses") {
        walk(&superclasses, ctx);
    }
    ctx.bindings.push();
    if let Some(body) = node.child_by_field_name("body") {
        recurse_children(&body, ctx);
    }
    ctx.bindings.pop();
}

fn rewrite_function(node: &Node, ctx: &mut RewriteCtx) {
    if let Some(name) = node.child_by_field_name("name") {
        ctx.rename_identifier(&name);
    }
    ctx.bindings.push();
    if let Some(params) = node.child_by_field_name("parameters") {
        ctx.resolver
            .seed_parameters(&params, ctx.source, &mut ctx.bindings);
        rewrite_parameters(&params, ctx);
    }
    if let Some(ret) = node.child_by_field_name("return_type") {
        walk(&ret, ctx);
    }
    if let Some(body) = node.child_by_field_name("body") {
        recurse_children(&body, ctx);
    }
    ctx.bindings.pop();
}

fn rewrite_parameters(params: &Node, ctx: &mut RewriteCtx) {
    let mut cursor = params.walk();
    for child in params.children(&mut cursor) {
        match child.kind() {
            "identifier" => {
                if ctx.text(&child) != "self" && ctx.text(&child) != "cls" {
                    ctx.rename_identifier(&child);
                }
            }
            "typed_parameter" => {
                let mut inner = child.walk();
                for grand in child.children(&mut inner) {
                    if grand.kind() == "identifier" {
                        if ctx.text(&grand) != "self" && ctx.text(&grand) != "cls" {
                            ctx.rename_identifier(&grand);
                        }
                    } else if grand.kind() != "*" && grand.kind() != "**" && grand.kind() != ":" {
                        walk(&grand, ctx);
                    }
                }
            }
            "default_parameter" | "typed_default_parameter" => {
                if let Some(name) = child.child_by_field_name("name") {
                    ctx.rename_identifier(&name);
                }
                if let Some(ty) = child.child_by_field_name("type") {
                    walk(&ty, ctx);
                }
                if let Some(val) = child.child_by_field_name("value") {
                    walk(&val, ctx);
                }
            }
            _ => {}
        }
    }
}

fn rewrite_lambda(node: &Node, ctx: &mut RewriteCtx) {
    ctx.bindings.push();
    // Lambda parameters don't get their own renamed token (the
    // indexer never records them as declarations), but they do need
    // an ownership seed so `lambda t: t.score` renames `.score` when
    // the lambda is the `key=` argument of `sorted(project_list, ...)`.
    if let Some(params) = node.child_by_field_name("parameters") {
        seed_lambda_from_call_site(node, &params, ctx);
    }
    if let Some(body) = node.child_by_field_name("body") {
        walk(&body, ctx);
    }
    ctx.bindings.pop();
}

fn seed_lambda_from_call_site(lambda: &Node, params: &Node, ctx: &mut RewriteCtx) {
    let Some(keyword_arg) = lambda.parent().filter(|p| p.kind() == "keyword_argument") else {
        return;
    };
    if keyword_arg
        .child_by_field_name("name")
        .map(|n| ctx.text(&n))
        .as_deref()
        != Some("key")
    {
        return;
    }
    let Some(args) = keyword_arg.parent() else { return };
    let Some(call) = args.parent() else { return };
    if call.kind() != "call" {
        return;
    }
    let Some(function) = call.child_by_field_name("function") else {
        return;
    };
    if function.kind() != "identifier" {
        return;
    }
    let callee = ctx.text(&function);
    if !matches!(callee.as_str(), "sorted" | "min" | "max" | "filter") {
        return;
    }
    let Some(arguments) = call.child_by_field_name("arguments") else {
        return;
    };
    let mut cursor = arguments.walk();
    let Some(first_arg) = arguments
        .children(&mut cursor)
        .find(|c| !matches!(c.kind(), "(" | ")" | "," | "keyword_argument"))
    else {
        return;
    };
    let element_ownership =
        ctx.resolver
            .element_ownership_of_iterable(&first_arg, ctx.source, &ctx.bindings);

    let mut pcursor = params.walk();
    for child in params.children(&mut pcursor) {
        if child.kind() == "identifier" {
            ctx.bindings.set(&ctx.text(&child), element_ownership);
        }
    }
}

fn rewrite_for(node: &Node, ctx: &mut RewriteCtx) {
    let Some(right) = node.child_by_field_name("right") else {
        recurse_children(node, ctx);
        return;
    };
    walk(&right, ctx);

    let element_ownership = node
        .child_by_field_name("left")
        .map(|_| {
            ctx.resolver
                .element_ownership_of_iterable(&right, ctx.source, &ctx.bindings)
        })
        .unwrap_or(Ownership::Unresolved);

    let enumerate_second = ctx
        .resolver
        .enumerate_element_ownership(&right, ctx.source, &ctx.bindings);

    if let Some(left) = node.child_by_field_name("left") {
        bind_for_target(&left, ctx, element_ownership, enumerate_second);
        walk(&left, ctx);
    }
    if let Some(body) = node.child_by_field_name("body") {
        walk(&body, ctx);
    }
    if let Some(alt) = node.child_by_field_name("alternative") {
        walk(&alt, ctx);
    }
}

fn bind_for_target(
    left: &Node,
    ctx: &mut RewriteCtx,
    element_ownership: Ownership,
    enumerate_second: Option<Ownership>,
) {
    match left.kind() {
        "identifier" => ctx.bindings.set(&ctx.text(left), element_ownership),
        "tuple_pattern" | "pattern_list" | "list_pattern" => {
            let mut cursor = left.walk();
            let children: Vec<Node> = left
                .children(&mut cursor)
                .filter(|c| c.kind() == "identifier")
                .collect();
            if let Some(second_ownership) = enumerate_second {
                if children.len() == 2 {
                    ctx.bindings.set(&ctx.text(&children[0]), Ownership::Unresolved);
                    ctx.bindings.set(&ctx.text(&children[1]), second_ownership);
                    return;
                }
            }
            for c in children {
                ctx.bindings.set(&ctx.text(&c), element_ownership);
            }
        }
        _ => {}
    }
}

fn rewrite_comprehension(node: &Node, ctx: &mut RewriteCtx) {
    ctx.bindings.push();
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();

    for child in &children {
        if child.kind() == "for_in_clause" {
            let Some(right) = child.child_by_field_name("right") else {
                continue;
            };
            walk(&right, ctx);
            let element_ownership =
                ctx.resolver
                    .element_ownership_of_iterable(&right, ctx.source, &ctx.bindings);
            let enumerate_second =
                ctx.resolver
                    .enumerate_element_ownership(&right, ctx.source, &ctx.bindings);
            if let Some(left) = child.child_by_field_name("left") {
                bind_for_target(&left, ctx, element_ownership, enumerate_second);
                walk(&left, ctx);
            }
        }
    }
    for child in &children {
        match child.kind() {
            "for_in_clause" => {} // already handled above
            _ => walk(child, ctx),
        }
    }
    ctx.bindings.pop();
}

fn rewrite_assignment(node: &Node, ctx: &mut RewriteCtx) {
    if let Some(right) = node.child_by_field_name("right") {
        walk(&right, ctx);
    }
    let annotation_ownership = node
        .child_by_field_name("type")
        .map(|ann| ctx.resolver.ownership_of_annotation(&ctx.text(&ann)));
    if let Some(ann) = node.child_by_field_name("type") {
        walk(&ann, ctx);
    }

    let ownership = match annotation_ownership {
        Some(o) => o,
        None => node
            .child_by_field_name("right")
            .map(|right| ctx.resolver.resolve_expr(&right, ctx.source, &ctx.bindings))
            .unwrap_or(Ownership::Unresolved),
    };

    if let Some(left) = node.child_by_field_name("left") {
        bind_assignment_target(&left, ctx, ownership);
        walk(&left, ctx);
    }
}

fn bind_assignment_target(target: &Node, ctx: &mut RewriteCtx, ownership: Ownership) {
    match target.kind() {
        "identifier" => ctx.bindings.set(&ctx.text(target), ownership),
        "tuple_pattern" | "list_pattern" | "pattern_list" => {
            let mut cursor = target.walk();
            for child in target.children(&mut cursor) {
                bind_assignment_target(&child, ctx, Ownership::Unresolved);
            }
        }
        _ => {}
    }
}

fn rewrite_import_statement(node: &Node, ctx: &mut RewriteCtx) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "dotted_name" => {
                let module = ctx.text(&child);
                // The indexer never enrolls a dotted bind name (`pkg`
                // from `import pkg.sub`) as a rename candidate — see
                // `index_import_statement` — since renaming it here
                // without requalifying every downstream `pkg.sub....`
                // reference would leave the import and its usages
                // pointing at different names. `ctx.map.get` below is
                // therefore already a no-op for a dotted module; the
                // `contains('.')` check just avoids the lookup.
                if !module.contains('.') {
                    if let Some(token) = ctx.map.get(&module) {
                        ctx.edits.push(Edit {
                            start: child.end_byte(),
                            end: child.end_byte(),
                            replacement: format!(" as {}", token),
                        });
                        ctx.symbols_renamed += 1;
                    }
                }
            }
            "aliased_import" => {
                if let Some(alias) = child.child_by_field_name("alias") {
                    ctx.rename_identifier(&alias);
                }
            }
            _ => {}
        }
    }
}

fn rewrite_import_from_statement(node: &Node, ctx: &mut RewriteCtx) {
    let module_id = node.child_by_field_name("module_name").map(|n| n.id());
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if Some(child.id()) == module_id {
            continue;
        }
        match child.kind() {
            // `from m import y`: `y` names the actual declaration in
            // module `m`, which has already been renamed at its
            // declaration site — so the import must name the same
            // token directly, not alias around the old name.
            "dotted_name" => ctx.rename_identifier(&child),
            "aliased_import" => {
                // `from m import y as z`: `y` (the real declared name)
                // and `z` (this file's local bind name) are renamed
                // independently — they may even land on different
                // tokens.
                if let Some(name) = child.child_by_field_name("name") {
                    ctx.rename_identifier(&name);
                }
                if let Some(alias) = child.child_by_field_name("alias") {
                    ctx.rename_identifier(&alias);
                }
            }
            _ => {}
        }
    }
}

fn rewrite_call(node: &Node, ctx: &mut RewriteCtx) {
    let function = node.child_by_field_name("function");
    if let Some(function) = &function {
        if function.kind() == "identifier" {
            let callee = ctx.text(function);
            let dynamic_kind = match callee.as_str() {
                "getattr" => Some(DynamicKind::Get),
                "setattr" => Some(DynamicKind::Set),
                "hasattr" => Some(DynamicKind::Has),
                _ => None,
            };
            if let Some(_kind) = dynamic_kind {
                try_rewrite_dynamic_name(node, ctx);
            }
        }
    }

    let is_project_target = function
        .as_ref()
        .map(|f| {
            ctx.resolver
                .is_project_callable_target(f, ctx.source, &ctx.bindings)
        })
        .unwrap_or(false);
    ctx.call_target_stack.push(is_project_target);

    recurse_children(node, ctx);

    ctx.call_target_stack.pop();
}

fn try_rewrite_dynamic_name(call: &Node, ctx: &mut RewriteCtx) {
    let Some(args) = call.child_by_field_name("arguments") else {
        return;
    };
    let mut cursor = args.walk();
    let positional: Vec<Node> = args
        .children(&mut cursor)
        .filter(|c| !matches!(c.kind(), "(" | ")" | ","))
        .collect();
    if positional.len() < 2 {
        return;
    }
    let receiver = &positional[0];
    let name_arg = &positional[1];
    if name_arg.kind() != "string" {
        return;
    }
    let Some(name_literal) = string_literal_value(name_arg, ctx.source) else {
        return;
    };
    let Some(token) = ctx.map.get(&name_literal).map(|s| s.to_string()) else {
        return;
    };

    let receiver_ownership = ctx
        .resolver
        .resolve_expr(receiver, ctx.source, &ctx.bindings);
    let eligible = match receiver_ownership {
        Ownership::ProjectLocal => true,
        Ownership::Unresolved => ctx.index.likely_local_attribute_names.contains(&name_literal),
        Ownership::External => false,
    };
    if !eligible {
        return;
    }

    if let Some(edit) = rewrite_string_inner(name_arg, ctx.source, &token) {
        ctx.edits.push(edit);
        ctx.dynamic_name_rewrites += 1;
        if receiver_ownership == Ownership::Unresolved {
            ctx.symbols_renamed_likely_local += 1;
            ctx.warn_unresolved(name_arg, &name_literal, "likely_local dynamic-name fallback");
        }
    }
}

fn rewrite_string_inner(node: &Node, source: &[u8], new_value: &str) -> Option<Edit> {
    let text = node.utf8_text(source).ok()?;
    let quote_start = text.find(['"', '\''])?;
    let prefix = &text[..quote_start];
    let quote_char = text.as_bytes()[quote_start] as char;
    let triple: String = quote_char.to_string().repeat(3);
    let is_triple = text[quote_start..].starts_with(&triple);
    let quote = if is_triple {
        triple
    } else {
        quote_char.to_string()
    };
    let replacement = format!("{prefix}{quote}{new_value}{quote}");
    Some(Edit {
        start: node.start_byte(),
        end: node.end_byte(),
        replacement,
    })
}

fn rewrite_attribute(node: &Node, ctx: &mut RewriteCtx) {
    let Some(object) = node.child_by_field_name("object") else {
        recurse_children(node, ctx);
        return;
    };
    let Some(attribute) = node.child_by_field_name("attribute") else {
        walk(&object, ctx);
        return;
    };

    walk(&object, ctx);

    let attr_name = ctx.text(&attribute);
    let Some(token) = ctx.map.get(&attr_name).map(|s| s.to_string()) else {
        return;
    };

    let object_ownership = if ctx.text(&object) == "self" {
        Ownership::ProjectLocal
    } else {
        ctx.resolver.resolve_expr(&object, ctx.source, &ctx.bindings)
    };

    let eligible = match object_ownership {
        Ownership::ProjectLocal => true,
        Ownership::Unresolved => ctx.index.likely_local_attribute_names.contains(&attr_name),
        Ownership::External => false,
    };
    if !eligible {
        return;
    }

    ctx.edits.push(Edit {
        start: attribute.start_byte(),
        end: attribute.end_byte(),
        replacement: token,
    });
    ctx.symbols_renamed += 1;
    if object_ownership == Ownership::Unresolved {
        ctx.symbols_renamed_likely_local += 1;
        ctx.warn_unresolved(&attribute, &attr_name, "likely_local attribute fallback");
    }
}

fn rewrite_keyword_argument(node: &Node, ctx: &mut RewriteCtx) {
    let is_project_target = ctx.call_target_stack.last().copied().unwrap_or(false);
    if let Some(name) = node.child_by_field_name("name") {
        if is_project_target {
            ctx.rename_identifier(&name);
        }
    }
    if let Some(value) = node.child_by_field_name("value") {
        walk(&value, ctx);
    }
}

fn rewrite_string(node: &Node, ctx: &mut RewriteCtx) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "interpolation" {
            let mut inner = child.walk();
            for expr in child.children(&mut inner) {
                if !matches!(expr.kind(), "{" | "}" | "!" | "format_spec" | ":") {
                    walk(&expr, ctx);
                }
            }
        }
    }
}

// Extra ownership helper that needs access to `ImportBinding` directly
// (kept here, not in `ownership.rs`, since it's only needed by the
// keyword-argument gating rule and would otherwise force `ownership`
// to depend on call-site shape it doesn't otherwise need).
impl<'a> OwnershipResolver<'a> {
    pub fn is_project_callable_target(
        &self,
        function: &Node,
        source: &[u8],
        bindings: &ScopeBindings,
    ) -> bool {
        match function.kind() {
            "identifier" => {
                let name = function.utf8_text(source).unwrap_or("");
                self.is_project_callable(name)
            }
            "attribute" => {
                let Some(object) = function.child_by_field_name("object") else {
                    return false;
                };
                let Some(method) = function.child_by_field_name("attribute") else {
                    return false;
                };
                let receiver_ownership = if object.utf8_text(source).unwrap_or("") == "self" {
                    Ownership::ProjectLocal
                } else {
                    self.resolve_expr(&object, source, bindings)
                };
                receiver_ownership == Ownership::ProjectLocal
                    && self.is_project_callable(method.utf8_text(source).unwrap_or(""))
            }
            _ => false,
        }
    }
}
