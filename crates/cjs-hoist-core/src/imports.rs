//! Hoists free `require("<literal>")` calls into private bindings.
//!
//! Each distinct specifier gets one `const _require_<name>_ = require(...)`
//! declaration, placed in front of the top-level statement open at its first
//! use. Every qualifying call site is then replaced by that binding.

use crate::buffer::SourceBuffer;
use crate::parse::SyntaxTree;
use crate::scope::ScopeTree;
use rustc_hash::FxHashMap;
use swc_ecma_ast::{CallExpr, Callee, Expr, Ident, Lit, MemberProp, Str};
use tracing::debug;

pub const REQUIRE: &str = "require";

/// Generated binding for one specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportBinding {
    /// Generated identifier.
    pub name: String,
    /// Byte offset the declaration was inserted at.
    pub declared_at: usize,
}

/// Per-call import binding table, keyed by exact specifier value.
#[derive(Debug, Default)]
pub struct ImportTransformer {
    bindings: FxHashMap<String, ImportBinding>,
    rewritten: usize,
}

impl ImportTransformer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrite `call` if it is a free `require("<literal>")`.
    ///
    /// Returns whether the call was replaced.
    pub fn transform(
        &mut self,
        call: &CallExpr,
        tree: &SyntaxTree,
        scopes: &ScopeTree,
        anchor: usize,
        buf: &mut SourceBuffer<'_>,
    ) -> bool {
        let Some((callee, specifier)) = require_call(call) else {
            return false;
        };
        if !scopes.is_free(callee) {
            return false;
        }

        let value = specifier.value.to_string();
        let name = match self.bindings.get(&value) {
            Some(binding) => binding.name.clone(),
            None => {
                let name = binding_name(&value);
                let literal = &buf.original()[tree.range(specifier.span)];
                buf.insert_before(anchor, format!("const {name} = require({literal});\n"));
                debug!(specifier = %value, binding = %name, at = anchor, "hoisted require");
                self.bindings.insert(
                    value,
                    ImportBinding {
                        name: name.clone(),
                        declared_at: anchor,
                    },
                );
                name
            }
        };

        buf.overwrite(tree.range(call.span), name);
        self.rewritten += 1;
        true
    }

    #[must_use]
    pub fn binding(&self, specifier: &str) -> Option<&ImportBinding> {
        self.bindings.get(specifier)
    }

    #[must_use]
    pub fn is_touched(&self) -> bool {
        self.rewritten > 0
    }
}

/// String literal argument of a `require("<literal>")`-shaped call.
///
/// Only the call shape is checked here; whether `require` is free is up to
/// the caller.
#[must_use]
pub fn require_specifier(call: &CallExpr) -> Option<&Str> {
    require_call(call).map(|(_, specifier)| specifier)
}

fn require_call(call: &CallExpr) -> Option<(&Ident, &Str)> {
    let Callee::Expr(callee) = &call.callee else {
        return None;
    };
    let Expr::Ident(ident) = &**callee else {
        return None;
    };
    if &*ident.sym != REQUIRE {
        return None;
    }
    let [arg] = call.args.as_slice() else {
        return None;
    };
    if arg.spread.is_some() {
        return None;
    }
    match &*arg.expr {
        Expr::Lit(Lit::Str(s)) => Some((ident, s)),
        _ => None,
    }
}

/// Whether `call` is the `Promise.resolve(require("<literal>"))` idiom that
/// marks a lazy import for downstream bundlers.
#[must_use]
pub fn is_dynamic_require(call: &CallExpr) -> bool {
    let Callee::Expr(callee) = &call.callee else {
        return false;
    };
    let Expr::Member(member) = &**callee else {
        return false;
    };
    let Expr::Ident(object) = &*member.obj else {
        return false;
    };
    let MemberProp::Ident(prop) = &member.prop else {
        return false;
    };
    if &*object.sym != "Promise" || &*prop.sym != "resolve" {
        return false;
    }
    let [arg] = call.args.as_slice() else {
        return false;
    };
    match &*arg.expr {
        Expr::Call(inner) if arg.spread.is_none() => require_specifier(inner).is_some(),
        _ => false,
    }
}

/// Identifier generated for a specifier.
///
/// ASCII letters and digits are kept, `/` and `\` become `$`, `_` is
/// doubled and anything else becomes `_`, so distinct specifiers rarely
/// collide.
#[must_use]
pub fn binding_name(specifier: &str) -> String {
    let mut name = String::with_capacity(specifier.len() + 10);
    name.push_str("_require_");
    for c in specifier.chars() {
        match c {
            c if c.is_ascii_alphanumeric() => name.push(c),
            '/' | '\\' => name.push('$'),
            '_' => name.push_str("__"),
            _ => name.push('_'),
        }
    }
    name.push('_');
    name
}
