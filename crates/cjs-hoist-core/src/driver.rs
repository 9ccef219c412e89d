//! One traversal over the program, dispatching nodes to the transformers.
//!
//! Dispatch order per node: top-level bookkeeping, then identifiers
//! (`exports` / `module`), then the bare `module.exports =` exception for
//! top-level assignments, then calls (dynamic-require idiom, `require`).
//! Declarations and the re-sync write are emitted once, after traversal.

use crate::buffer::SourceBuffer;
use crate::error::{BoxedParseError, TransformError};
use crate::exports::{ExportTransformer, EXPORTS, MODULE};
use crate::imports::{is_dynamic_require, ImportTransformer};
use crate::options::TransformOptions;
use crate::parse::{parse_program, SyntaxTree};
use crate::scope::ScopeTree;
use crate::top_level::TopLevelTracker;
use std::borrow::Cow;
use swc_common::Spanned;
use swc_ecma_ast::{AssignPatProp, CallExpr, Expr, Ident, Program, Prop, Stmt};
use swc_ecma_visit::{Visit, VisitWith};
use tracing::{debug, debug_span, trace};

/// Result of a [`transform`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutput<'a> {
    /// Rewritten text, or the input itself when nothing was rewritten.
    pub code: Cow<'a, str>,
    /// v3 source map JSON, when requested.
    pub map: Option<String>,
    /// Whether any `exports`, `module` or `require` occurrence was rewritten.
    pub is_touched: bool,
}

/// Rewrite free `exports`, `module` and `require` in `code`.
///
/// `parse` turns the source into a [`SyntaxTree`]; its failure is returned
/// as [`TransformError::Parse`] and nothing else runs. Each call owns all
/// of its state, so independent files can be transformed in parallel.
pub fn transform<'a, P, E>(
    parse: P,
    code: &'a str,
    options: &TransformOptions,
) -> Result<TransformOutput<'a>, TransformError>
where
    P: FnOnce(&str) -> Result<SyntaxTree, E>,
    E: Into<BoxedParseError>,
{
    let _span = debug_span!("transform", file = options.file.as_deref(), len = code.len()).entered();

    let tree = parse(code).map_err(TransformError::parse)?;
    let scopes = ScopeTree::build(&tree.program);

    let mut driver = Driver {
        tree: &tree,
        scopes: &scopes,
        options,
        buffer: SourceBuffer::new(code),
        top_level: TopLevelTracker::new(),
        exports: ExportTransformer::new(),
        imports: ImportTransformer::new(),
    };
    driver.run();
    driver.finish()
}

/// [`transform`] with the bundled swc parser.
pub fn transform_source<'a>(
    code: &'a str,
    options: &TransformOptions,
) -> Result<TransformOutput<'a>, TransformError> {
    transform(parse_program, code, options)
}

struct Driver<'a, 'src> {
    tree: &'a SyntaxTree,
    scopes: &'a ScopeTree,
    options: &'a TransformOptions,
    buffer: SourceBuffer<'src>,
    top_level: TopLevelTracker,
    exports: ExportTransformer,
    imports: ImportTransformer,
}

impl<'a, 'src> Driver<'a, 'src> {
    fn run(&mut self) {
        let tree = self.tree;
        match &tree.program {
            Program::Module(module) => {
                for item in &module.body {
                    self.visit_top_level(item, item.as_stmt());
                }
            }
            Program::Script(script) => {
                for stmt in &script.body {
                    self.visit_top_level(stmt, Some(stmt));
                }
            }
        }
    }

    fn visit_top_level<N>(&mut self, node: &N, stmt: Option<&Stmt>)
    where
        N: Spanned + VisitWith<Self>,
    {
        self.top_level.enter(self.tree.range(node.span()));

        if let Some(Stmt::Expr(expr_stmt)) = stmt {
            let mut expr = &*expr_stmt.expr;
            while let Expr::Paren(paren) = expr {
                expr = &paren.expr;
            }
            if let Expr::Assign(assign) = expr {
                if self.exports.preserves_module_assign(assign, self.scopes) {
                    debug!(
                        start = self.tree.offset(assign.span.lo),
                        "keeping bare module.exports assignment"
                    );
                    return;
                }
            }
        }

        node.visit_with(self);
    }

    fn anchor(&self) -> Option<usize> {
        self.top_level.current().map(|range| range.start)
    }

    fn finish(mut self) -> Result<TransformOutput<'src>, TransformError> {
        self.exports.write_declarations(&mut self.buffer);
        if let Some(last) = self.top_level.current() {
            self.exports.write_resync(last.end, &mut self.buffer);
        }

        let is_touched = self.exports.is_touched() || self.imports.is_touched();
        debug!(
            touched = is_touched,
            edits = self.buffer.edit_count(),
            statements = self.top_level.entered(),
            "transform finished"
        );

        let code = if is_touched {
            Cow::Owned(self.buffer.materialize()?)
        } else {
            Cow::Borrowed(self.buffer.original())
        };
        let map = if self.options.source_map {
            Some(self.buffer.generate_map(self.options.file.as_deref())?)
        } else {
            None
        };

        Ok(TransformOutput {
            code,
            map,
            is_touched,
        })
    }

    /// Rewrite `ident` if it is a free `exports` or `module`.
    ///
    /// With `shorthand`, the identifier doubles as a property key and the key
    /// is spelled out in front of the renamed value.
    fn rewrite_reference(&mut self, ident: &Ident, shorthand: bool) -> bool {
        let name = &*ident.sym;
        if name != EXPORTS && name != MODULE {
            return false;
        }
        if !self.scopes.is_free(ident) {
            return false;
        }
        let Some(anchor) = self.anchor() else {
            return false;
        };
        let range = self.tree.range(ident.span);
        if shorthand {
            self.exports
                .transform_shorthand(name, range, anchor, &mut self.buffer);
        } else if name == EXPORTS {
            self.exports.transform_exports(range, anchor, &mut self.buffer);
        } else {
            self.exports.transform_module(range, anchor, &mut self.buffer);
        }
        true
    }
}

impl Visit for Driver<'_, '_> {
    fn visit_ident(&mut self, n: &Ident) {
        self.rewrite_reference(n, false);
    }

    fn visit_prop(&mut self, n: &Prop) {
        if let Prop::Shorthand(ident) = n {
            if self.rewrite_reference(ident, true) {
                return;
            }
        }
        n.visit_children_with(self);
    }

    fn visit_assign_pat_prop(&mut self, n: &AssignPatProp) {
        if self.rewrite_reference(&n.key.id, true) {
            n.value.visit_with(self);
            return;
        }
        n.visit_children_with(self);
    }

    fn visit_call_expr(&mut self, n: &CallExpr) {
        if self.options.ignore_dynamic_require && is_dynamic_require(n) {
            trace!(start = self.tree.offset(n.span.lo), "skipping dynamic require");
            return;
        }
        if let Some(anchor) = self.anchor() {
            if self
                .imports
                .transform(n, self.tree, self.scopes, anchor, &mut self.buffer)
            {
                return;
            }
        }
        n.visit_children_with(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(code: &str) -> TransformOutput<'_> {
        transform_source(code, &TransformOptions::default()).unwrap()
    }

    #[test]
    fn test_untouched_returns_borrowed_input() {
        let code = "const a = 1;\nconsole.log(a);\n";
        let out = run(code);
        assert!(!out.is_touched);
        assert!(matches!(out.code, Cow::Borrowed(s) if std::ptr::eq(s, code)));
        assert!(out.map.is_none());
    }

    #[test]
    fn test_require_and_exports_share_anchor() {
        let out = run("exports.a = require('a');");
        assert_eq!(
            out.code,
            "const _require_a_ = require('a');\nlet _exports_ = {};\n\
             _exports_.a = _require_a_;\nmodule.exports = _exports_;"
        );
    }

    #[test]
    fn test_parse_failure_propagates() {
        let err = transform_source("exports.a = ;", &TransformOptions::default()).unwrap_err();
        assert!(matches!(err, TransformError::Parse { .. }));
    }

    #[test]
    fn test_custom_parser_error_is_wrapped() {
        let err = transform(
            |_: &str| -> Result<SyntaxTree, std::io::Error> {
                Err(std::io::Error::other("no parser"))
            },
            "exports.a = 1;",
            &TransformOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.code(), "PARSE_ERROR");
        assert!(err.to_string().contains("no parser"));
    }
}
