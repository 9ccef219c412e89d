//! Rewrites free `exports` and `module` into private bindings.
//!
//! Every free occurrence is renamed in place to `_exports_` / `_module_`.
//! After traversal the two bindings are declared in front of the top-level
//! statement where each was first needed, and one statement copying the
//! private state back into the real `module.exports` is appended after the
//! last top-level statement.

use crate::buffer::SourceBuffer;
use crate::scope::ScopeTree;
use std::ops::Range;
use swc_ecma_ast::{AssignExpr, AssignOp, AssignTarget, Expr, Ident, MemberProp, SimpleAssignTarget};
use tracing::{debug, trace};

pub const EXPORTS: &str = "exports";
pub const MODULE: &str = "module";
pub const PRIVATE_EXPORTS: &str = "_exports_";
pub const PRIVATE_MODULE: &str = "_module_";

/// Per-call state: where each private binding must be declared, if at all.
#[derive(Debug, Default)]
pub struct ExportTransformer {
    exports_anchor: Option<usize>,
    module_anchor: Option<usize>,
}

impl ExportTransformer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rename a free `exports` reference spanning `range`.
    ///
    /// `anchor` is the start of the top-level statement currently open.
    pub fn transform_exports(&mut self, range: Range<usize>, anchor: usize, buf: &mut SourceBuffer<'_>) {
        self.exports_anchor.get_or_insert(anchor);
        trace!(start = range.start, "rewrite exports");
        buf.overwrite(range, PRIVATE_EXPORTS);
    }

    /// Rename a free `module` reference spanning `range`.
    pub fn transform_module(&mut self, range: Range<usize>, anchor: usize, buf: &mut SourceBuffer<'_>) {
        self.module_anchor.get_or_insert(anchor);
        trace!(start = range.start, "rewrite module");
        buf.overwrite(range, PRIVATE_MODULE);
    }

    /// Rename a free `exports` or `module` written as a shorthand property,
    /// spelling the key out so the property name is unchanged:
    /// `{ exports }` becomes `{ exports: _exports_ }`.
    pub fn transform_shorthand(
        &mut self,
        name: &str,
        range: Range<usize>,
        anchor: usize,
        buf: &mut SourceBuffer<'_>,
    ) {
        buf.insert_before(range.start, format!("{name}: "));
        if name == EXPORTS {
            self.transform_exports(range, anchor, buf);
        } else {
            self.transform_module(range, anchor, buf);
        }
    }

    /// Whether a top-level assignment should be left verbatim.
    ///
    /// `module.exports = <expr>` is kept as written while no other free
    /// `module` reference has been renamed. The outcome depends on visit
    /// order: the first textual occurrence wins, so reordering top-level
    /// statements can change the output.
    #[must_use]
    pub fn preserves_module_assign(&self, assign: &AssignExpr, scopes: &ScopeTree) -> bool {
        self.module_anchor.is_none()
            && module_exports_target(assign).is_some_and(|module| scopes.is_free(module))
    }

    #[must_use]
    pub fn is_touched(&self) -> bool {
        self.exports_anchor.is_some() || self.module_anchor.is_some()
    }

    /// Declare the private bindings in front of their anchor statements.
    pub fn write_declarations(&self, buf: &mut SourceBuffer<'_>) {
        if let Some(mut exports_at) = self.exports_anchor {
            // `_module_` may reference `_exports_`, so it must exist by then.
            if let Some(module_at) = self.module_anchor {
                exports_at = exports_at.min(module_at);
            }
            debug!(at = exports_at, "declare {PRIVATE_EXPORTS}");
            buf.insert_before(exports_at, format!("let {PRIVATE_EXPORTS} = {{}};\n"));
        }
        if let Some(module_at) = self.module_anchor {
            let init = if self.exports_anchor.is_some() {
                PRIVATE_EXPORTS
            } else {
                "{}"
            };
            debug!(at = module_at, "declare {PRIVATE_MODULE}");
            buf.insert_before(
                module_at,
                format!("const {PRIVATE_MODULE} = {{exports: {init}}};\n"),
            );
        }
    }

    /// Copy the private state back into `module.exports` after `end`, the
    /// end of the last top-level statement.
    pub fn write_resync(&self, end: usize, buf: &mut SourceBuffer<'_>) {
        let source = if self.module_anchor.is_some() {
            format!("{PRIVATE_MODULE}.exports")
        } else if self.exports_anchor.is_some() {
            PRIVATE_EXPORTS.to_string()
        } else {
            return;
        };
        buf.insert_after(end, format!("\nmodule.exports = {source};"));
    }
}

/// The `module` identifier of a plain `module.exports = <expr>` assignment.
fn module_exports_target(assign: &AssignExpr) -> Option<&Ident> {
    if assign.op != AssignOp::Assign {
        return None;
    }
    let AssignTarget::Simple(SimpleAssignTarget::Member(member)) = &assign.left else {
        return None;
    };
    let Expr::Ident(object) = &*member.obj else {
        return None;
    };
    let MemberProp::Ident(prop) = &member.prop else {
        return None;
    };
    (&*object.sym == MODULE && &*prop.sym == EXPORTS).then_some(object)
}
