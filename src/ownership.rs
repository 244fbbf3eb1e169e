//! Ownership Resolver — infers, for each usage site, whether the
//! receiver (or bare name) is project-owned, external, or unresolved.
//!
//! This is a conservative, flow-insensitive inference over a single
//! function's scope, seeded from parameter annotations and refined by
//! a forward pass over assignments in source order. It
//! never looks at runtime values — every verdict is built from static
//! evidence: declaration site, annotation text, call-target identity,
//! or container element type.

use std::collections::HashMap;

use tree_sitter::Node;

use crate::indexer::{ImportBinding, ProjectIndex};
use crate::model::{is_python_builtin, Ownership};

/// Per-function (and nested-scope) variable bindings. A new scope is
/// pushed on function/lambda entry and popped on exit; comprehensions
/// get their own scope too since their loop targets are local to the
/// comprehension in the target language.
#[derive(Debug, Default)]
pub struct ScopeBindings {
    stack: Vec<HashMap<String, Ownership>>,
}

impl ScopeBindings {
    pub fn new() -> Self {
        Self {
            stack: vec![HashMap::new()],
        }
    }

    pub fn push(&mut self) {
        self.stack.push(HashMap::new());
    }

    pub fn pop(&mut self) {
        self.stack.pop();
        if self.stack.is_empty() {
            self.stack.push(HashMap::new());
        }
    }

    pub fn set(&mut self, name: &str, ownership: Ownership) {
        self.stack
            .last_mut()
            .expect("scope stack never empty")
            .insert(name.to_string(), ownership);
    }

    pub fn get(&self, name: &str) -> Option<Ownership> {
        for scope in self.stack.iter().rev() {
            if let Some(o) = scope.get(name) {
                return Some(*o);
            }
        }
        None
    }
}

pub struct OwnershipResolver<'a> {
    index: &'a ProjectIndex,
    imports: &'a HashMap<String, ImportBinding>,
}

impl<'a> OwnershipResolver<'a> {
    pub fn new(index: &'a ProjectIndex, imports: &'a HashMap<String, ImportBinding>) -> Self {
        Self { index, imports }
    }

    /// Seed a freshly-pushed function scope from parameter annotations.
    /// `self`/`cls` are intentionally not bound here; the rewriter
    /// treats bare `self.` receivers as project-local unconditionally
    /// (a method's own instance is always project-owned by construction).
    pub fn seed_parameters(&self, params: &Node, source: &[u8], bindings: &mut ScopeBindings) {
        let mut cursor = params.walk();
        for child in params.children(&mut cursor) {
            let (ident, annotation) = match child.kind() {
                "typed_parameter" => (
                    first_child_of_kind(&child, "identifier"),
                    child.child_by_field_name("type"),
                ),
                "typed_default_parameter" => (
                    child.child_by_field_name("name"),
                    child.child_by_field_name("type"),
                ),
                _ => (None, None),
            };
            let (Some(ident), Some(annotation)) = (ident, annotation) else {
                continue;
            };
            let name = text(&ident, source);
            if name == "self" || name == "cls" {
                continue;
            }
            let ann_text = text(&annotation, source);
            bindings.set(&name, self.ownership_of_annotation(&ann_text));
        }
    }

    /// Ownership implied by an annotation's leading type name: a
    /// project class (optionally inside `list[...]`/`Optional[...]`)
    /// is `ProjectLocal`; a name known to be external is `External`;
    /// anything else is `Unresolved`.
    pub fn ownership_of_annotation(&self, annotation: &str) -> Ownership {
        let head = annotation_head(annotation);
        if self.index.is_project_class(&head) {
            Ownership::ProjectLocal
        } else if self.imports.get(&head).map(|b| !b.is_project_module) == Some(true)
            || self.index.external_names.contains(&head)
        {
            Ownership::External
        } else {
            Ownership::Unresolved
        }
    }

    pub fn is_project_callable(&self, name: &str) -> bool {
        self.index.project_callables.contains_key(name)
    }

    /// Resolve a bare name reference.
    pub fn resolve_name(&self, name: &str, bindings: &ScopeBindings) -> Ownership {
        if name == "self" || name == "cls" {
            return Ownership::ProjectLocal;
        }
        if let Some(o) = bindings.get(name) {
            return o;
        }
        if self.index.is_project_class(name) {
            return Ownership::ProjectLocal;
        }
        if let Some(binding) = self.imports.get(name) {
            return if binding.is_project_module {
                Ownership::ProjectLocal
            } else {
                Ownership::External
            };
        }
        if is_python_builtin(name) {
            return Ownership::External;
        }
        Ownership::Unresolved
    }

    /// Resolve the ownership of an arbitrary expression node, used for
    /// call receivers, assignment right-hand sides, and f-string
    /// interpolation expressions.
    pub fn resolve_expr(&self, node: &Node, source: &[u8], bindings: &ScopeBindings) -> Ownership {
        match node.kind() {
            "identifier" => self.resolve_name(&text(node, source), bindings),
            "call" => self.resolve_call(node, source, bindings),
            "attribute" => {
                // `obj.attr` used as a value: method-return-shaped
                // attribute access has already been handled by
                // `resolve_call` when it's actually invoked; a bare
                // attribute read's ownership is conservatively
                // unresolved unless the object itself is project-local
                // and the attribute is itself a project class name
                // re-exported as a module attribute (rare) — we don't
                // claim that without evidence.
                Ownership::Unresolved
            }
            "subscript" => node
                .child_by_field_name("value")
                .map(|v| self.element_ownership_of_iterable(&v, source, bindings))
                .unwrap_or(Ownership::Unresolved),
            "parenthesized_expression" => node
                .named_child(0)
                .map(|inner| self.resolve_expr(&inner, source, bindings))
                .unwrap_or(Ownership::Unresolved),
            _ => Ownership::Unresolved,
        }
    }

    fn resolve_call(&self, node: &Node, source: &[u8], bindings: &ScopeBindings) -> Ownership {
        let Some(function) = node.child_by_field_name("function") else {
            return Ownership::Unresolved;
        };
        match function.kind() {
            "identifier" => {
                let callee = text(&function, source);
                if self.index.is_project_class(&callee) {
                    return Ownership::ProjectLocal;
                }
                if is_python_builtin(&callee) {
                    return Ownership::External;
                }
                // Calling a project-level function: one-hop
                // return-annotation propagation only — we don't chase
                // a second call through the returned value.
                if let Some(Some(ret)) = self.index.project_callables.get(&callee) {
                    return self.ownership_of_annotation(ret);
                }
                if let Some(binding) = self.imports.get(&callee) {
                    return if binding.is_project_module {
                        Ownership::Unresolved
                    } else {
                        Ownership::External
                    };
                }
                Ownership::Unresolved
            }
            "attribute" => {
                let Some(object) = function.child_by_field_name("object") else {
                    return Ownership::Unresolved;
                };
                let Some(method) = function.child_by_field_name("attribute") else {
                    return Ownership::Unresolved;
                };
                let receiver_ownership = if text(&object, source) == "self" {
                    Ownership::ProjectLocal
                } else {
                    self.resolve_expr(&object, source, bindings)
                };
                let method_name = text(&method, source);
                match receiver_ownership {
                    Ownership::External => Ownership::External,
                    Ownership::ProjectLocal => {
                        match self.index.project_callables.get(&method_name) {
                            Some(Some(ret)) => self.ownership_of_annotation(ret),
                            _ => Ownership::Unresolved,
                        }
                    }
                    Ownership::Unresolved => Ownership::Unresolved,
                }
            }
            _ => Ownership::Unresolved,
        }
    }

    /// Derives element ownership for a `for`/comprehension iterable
    /// expression `E`, covering `sorted`/slice/`enumerate`/
    /// project-typed-container cases.
    pub fn element_ownership_of_iterable(
        &self,
        node: &Node,
        source: &[u8],
        bindings: &ScopeBindings,
    ) -> Ownership {
        match node.kind() {
            "call" => {
                let Some(function) = node.child_by_field_name("function") else {
                    return Ownership::Unresolved;
                };
                if function.kind() == "identifier" {
                    let callee = text(&function, source);
                    if matches!(callee.as_str(), "sorted" | "reversed" | "list" | "set") {
                        if let Some(first) = first_positional_arg(node) {
                            return self.element_ownership_of_iterable(&first, source, bindings);
                        }
                    }
                    if callee == "enumerate" {
                        // Caller is expected to unpack a 2-tuple and
                        // ask separately for each component; as a bare
                        // expression ownership this is unresolved.
                        return Ownership::Unresolved;
                    }
                }
                Ownership::Unresolved
            }
            "subscript" => node
                .child_by_field_name("value")
                .map(|v| self.element_ownership_of_iterable(&v, source, bindings))
                .unwrap_or(Ownership::Unresolved),
            "identifier" => {
                let name = text(node, source);
                if let Some(ann) = self.index.type_hints.get(&name) {
                    if let Some(elem) = container_element_type(ann) {
                        return self.ownership_of_annotation(&elem);
                    }
                }
                self.resolve_name(&name, bindings)
            }
            "attribute" => {
                let Some(object) = node.child_by_field_name("object") else {
                    return Ownership::Unresolved;
                };
                self.resolve_expr(&object, source, bindings)
            }
            _ => Ownership::Unresolved,
        }
    }

    /// Ownership for the element bound by `enumerate(S)`'s second
    /// tuple component.
    pub fn enumerate_element_ownership(
        &self,
        call_node: &Node,
        source: &[u8],
        bindings: &ScopeBindings,
    ) -> Option<Ownership> {
        let function = call_node.child_by_field_name("function")?;
        if function.kind() != "identifier" || text(&function, source) != "enumerate" {
            return None;
        }
        let first = first_positional_arg(call_node)?;
        Some(self.element_ownership_of_iterable(&first, source, bindings))
    }
}

fn first_positional_arg<'t>(call: &Node<'t>) -> Option<Node<'t>> {
    let args = call.child_by_field_name("arguments")?;
    let mut cursor = args.walk();
    args.children(&mut cursor)
        .find(|c| !matches!(c.kind(), "(" | ")" | "," | "keyword_argument"))
}

fn first_child_of_kind<'a>(node: &'a Node, kind: &str) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).find(|c| c.kind() == kind)
}

fn text(node: &Node, source: &[u8]) -> String {
    node.utf8_text(source).unwrap_or("").to_string()
}

/// Strips generic parameters from an annotation to get the head type
/// name: `list[Record]` -> `list`, `Optional[Widget]` -> `Optional`,
/// `Widget` -> `Widget`.
fn annotation_head(annotation: &str) -> String {
    annotation
        .split(['[', '.'])
        .next()
        .unwrap_or(annotation)
        .trim()
        .to_string()
}

/// For a container annotation like `list[Record]` or `List[Record]`,
/// returns the element type name `Record`.
fn container_element_type(annotation: &str) -> Option<String> {
    let start = annotation.find('[')?;
    let end = annotation.rfind(']')?;
    if end <= start {
        return None;
    }
    Some(annotation[start + 1..end].trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotation_head_strips_generics() {
        assert_eq!(annotation_head("list[Record]"), "list");
        assert_eq!(annotation_head("Widget"), "Widget");
    }

    #[test]
    fn container_element_extracts_inner_type() {
        assert_eq!(
            container_element_type("list[Record]"),
            Some("Record".to_string())
        );
        assert_eq!(container_element_type("Widget"), None);
    }
}
