//! Lexical scope tree and reference classification.
//!
//! The tree is built by one pre-pass over the program, before any rewriting.
//! Hoisting follows ECMAScript rules: `var` and function declarations bind at
//! the nearest function scope (the program counts as one), everything else at
//! the nearest block. Every identifier occurrence in reference position is
//! recorded with the scope it appears in, so later passes can ask whether an
//! occurrence is free without replaying scope entry and exit.

use rustc_hash::{FxHashMap, FxHashSet};
use swc_common::BytePos;
use swc_ecma_ast::{
    ArrowExpr, AssignPatProp, AssignTargetPat, BlockStmt, CatchClause, ClassDecl, ClassExpr,
    Constructor, Expr, FnDecl, FnExpr, ForHead, ForInStmt, ForOfStmt, ForStmt, Function,
    GetterProp, Ident, ImportDecl, ImportSpecifier, ObjectPatProp, ParamOrTsParamProp, Pat,
    Program, Prop, SetterProp, SimpleAssignTarget, SwitchStmt, TsParamPropParam, UsingDecl,
    VarDecl, VarDeclKind,
};
use swc_ecma_visit::{Visit, VisitWith};

/// Index of a scope in its [`ScopeTree`].
pub type ScopeId = usize;

/// Whether a scope receives hoisted declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// Program, function, arrow, constructor, accessor.
    Function,
    /// Block, loop head, catch clause, switch body, expression name.
    Block,
}

/// One lexical scope.
#[derive(Debug)]
pub struct Scope {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    names: FxHashSet<String>,
}

impl Scope {
    fn new(kind: ScopeKind, parent: Option<ScopeId>) -> Self {
        Self {
            kind,
            parent,
            names: FxHashSet::default(),
        }
    }

    /// Whether this scope itself declares `name`.
    #[must_use]
    pub fn declares(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}

/// All scopes of a program plus the scope of every reference occurrence.
#[derive(Debug)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
    references: FxHashMap<BytePos, ScopeId>,
}

impl ScopeTree {
    /// The program scope.
    pub const ROOT: ScopeId = 0;

    /// Analyze `program`.
    #[must_use]
    pub fn build(program: &Program) -> Self {
        let mut builder = Builder {
            tree: Self {
                scopes: vec![Scope::new(ScopeKind::Function, None)],
                references: FxHashMap::default(),
            },
            current: Self::ROOT,
            in_assign_target: false,
        };
        program.visit_with(&mut builder);
        builder.tree
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: ScopeId) -> Option<&Scope> {
        self.scopes.get(id)
    }

    /// Whether `name` is declared in `scope` or any scope enclosing it.
    #[must_use]
    pub fn has(&self, scope: ScopeId, name: &str) -> bool {
        let mut next = Some(scope);
        while let Some(id) = next {
            let Some(s) = self.scopes.get(id) else {
                return false;
            };
            if s.declares(name) {
                return true;
            }
            next = s.parent;
        }
        false
    }

    /// Scope a reference occurrence appears in, or `None` when `ident` is not
    /// in reference position (declaration site, label, ...).
    #[must_use]
    pub fn reference_scope(&self, ident: &Ident) -> Option<ScopeId> {
        self.references.get(&ident.span.lo).copied()
    }

    /// Whether `ident` is a reference that no enclosing scope declares.
    #[must_use]
    pub fn is_free(&self, ident: &Ident) -> bool {
        self.reference_scope(ident)
            .is_some_and(|scope| !self.has(scope, &ident.sym))
    }
}

struct Builder {
    tree: ScopeTree,
    current: ScopeId,
    /// Inside a destructuring assignment target, where bare identifiers are
    /// references rather than declarations.
    in_assign_target: bool,
}

impl Builder {
    fn scoped(&mut self, kind: ScopeKind, f: impl FnOnce(&mut Self)) {
        let parent = self.current;
        let in_assign_target = std::mem::replace(&mut self.in_assign_target, false);
        self.tree.scopes.push(Scope::new(kind, Some(parent)));
        self.current = self.tree.scopes.len() - 1;
        f(self);
        self.current = parent;
        self.in_assign_target = in_assign_target;
    }

    fn nearest_function(&self) -> ScopeId {
        let mut id = self.current;
        loop {
            let scope = &self.tree.scopes[id];
            match (scope.kind, scope.parent) {
                (ScopeKind::Function, _) | (_, None) => return id,
                (ScopeKind::Block, Some(parent)) => id = parent,
            }
        }
    }

    fn declare(&mut self, scope: ScopeId, ident: &Ident) {
        self.tree.scopes[scope].names.insert(ident.sym.to_string());
    }

    fn declare_pat(&mut self, scope: ScopeId, pat: &Pat) {
        match pat {
            Pat::Ident(b) => self.declare(scope, &b.id),
            Pat::Array(a) => {
                for elem in a.elems.iter().flatten() {
                    self.declare_pat(scope, elem);
                }
            }
            Pat::Rest(r) => self.declare_pat(scope, &r.arg),
            Pat::Object(o) => {
                for prop in &o.props {
                    match prop {
                        ObjectPatProp::KeyValue(kv) => self.declare_pat(scope, &kv.value),
                        ObjectPatProp::Assign(a) => self.declare(scope, &a.key.id),
                        ObjectPatProp::Rest(r) => self.declare_pat(scope, &r.arg),
                    }
                }
            }
            Pat::Assign(a) => self.declare_pat(scope, &a.left),
            Pat::Expr(_) | Pat::Invalid(_) => {}
        }
    }

    fn reference(&mut self, ident: &Ident) {
        self.tree.references.insert(ident.span.lo, self.current);
    }

    fn with_assign_target(&mut self, f: impl FnOnce(&mut Self)) {
        let saved = std::mem::replace(&mut self.in_assign_target, true);
        f(self);
        self.in_assign_target = saved;
    }
}

impl Visit for Builder {
    // Declarations

    fn visit_var_decl(&mut self, n: &VarDecl) {
        let scope = if n.kind == VarDeclKind::Var {
            self.nearest_function()
        } else {
            self.current
        };
        for decl in &n.decls {
            self.declare_pat(scope, &decl.name);
        }
        n.visit_children_with(self);
    }

    fn visit_using_decl(&mut self, n: &UsingDecl) {
        for decl in &n.decls {
            self.declare_pat(self.current, &decl.name);
        }
        n.visit_children_with(self);
    }

    fn visit_fn_decl(&mut self, n: &FnDecl) {
        let scope = self.nearest_function();
        self.declare(scope, &n.ident);
        n.visit_children_with(self);
    }

    fn visit_class_decl(&mut self, n: &ClassDecl) {
        self.declare(self.current, &n.ident);
        n.visit_children_with(self);
    }

    fn visit_import_decl(&mut self, n: &ImportDecl) {
        for specifier in &n.specifiers {
            let local = match specifier {
                ImportSpecifier::Named(s) => &s.local,
                ImportSpecifier::Default(s) => &s.local,
                ImportSpecifier::Namespace(s) => &s.local,
            };
            self.declare(ScopeTree::ROOT, local);
        }
    }

    // Function scopes

    fn visit_function(&mut self, n: &Function) {
        self.scoped(ScopeKind::Function, |this| {
            for param in &n.params {
                this.declare_pat(this.current, &param.pat);
            }
            n.visit_children_with(this);
        });
    }

    fn visit_arrow_expr(&mut self, n: &ArrowExpr) {
        self.scoped(ScopeKind::Function, |this| {
            for param in &n.params {
                this.declare_pat(this.current, param);
            }
            n.visit_children_with(this);
        });
    }

    fn visit_constructor(&mut self, n: &Constructor) {
        self.scoped(ScopeKind::Function, |this| {
            for param in &n.params {
                match param {
                    ParamOrTsParamProp::Param(p) => this.declare_pat(this.current, &p.pat),
                    ParamOrTsParamProp::TsParamProp(p) => match &p.param {
                        TsParamPropParam::Ident(b) => this.declare(this.current, &b.id),
                        TsParamPropParam::Assign(a) => this.declare_pat(this.current, &a.left),
                    },
                }
            }
            n.visit_children_with(this);
        });
    }

    fn visit_getter_prop(&mut self, n: &GetterProp) {
        self.scoped(ScopeKind::Function, |this| n.visit_children_with(this));
    }

    fn visit_setter_prop(&mut self, n: &SetterProp) {
        self.scoped(ScopeKind::Function, |this| {
            this.declare_pat(this.current, &n.param);
            n.visit_children_with(this);
        });
    }

    // Block scopes

    fn visit_block_stmt(&mut self, n: &BlockStmt) {
        self.scoped(ScopeKind::Block, |this| n.visit_children_with(this));
    }

    fn visit_for_stmt(&mut self, n: &ForStmt) {
        self.scoped(ScopeKind::Block, |this| n.visit_children_with(this));
    }

    fn visit_for_in_stmt(&mut self, n: &ForInStmt) {
        self.scoped(ScopeKind::Block, |this| n.visit_children_with(this));
    }

    fn visit_for_of_stmt(&mut self, n: &ForOfStmt) {
        self.scoped(ScopeKind::Block, |this| n.visit_children_with(this));
    }

    fn visit_switch_stmt(&mut self, n: &SwitchStmt) {
        self.scoped(ScopeKind::Block, |this| n.visit_children_with(this));
    }

    fn visit_catch_clause(&mut self, n: &CatchClause) {
        self.scoped(ScopeKind::Block, |this| {
            if let Some(param) = &n.param {
                this.declare_pat(this.current, param);
            }
            n.visit_children_with(this);
        });
    }

    // A named function or class expression sees its own name.

    fn visit_fn_expr(&mut self, n: &FnExpr) {
        self.scoped(ScopeKind::Block, |this| {
            if let Some(ident) = &n.ident {
                this.declare(this.current, ident);
            }
            n.visit_children_with(this);
        });
    }

    fn visit_class_expr(&mut self, n: &ClassExpr) {
        self.scoped(ScopeKind::Block, |this| {
            if let Some(ident) = &n.ident {
                this.declare(this.current, ident);
            }
            n.visit_children_with(this);
        });
    }

    // References

    fn visit_expr(&mut self, n: &Expr) {
        if let Expr::Ident(ident) = n {
            self.reference(ident);
        }
        n.visit_children_with(self);
    }

    fn visit_simple_assign_target(&mut self, n: &SimpleAssignTarget) {
        if let SimpleAssignTarget::Ident(b) = n {
            self.reference(&b.id);
        }
        n.visit_children_with(self);
    }

    fn visit_prop(&mut self, n: &Prop) {
        if let Prop::Shorthand(ident) = n {
            self.reference(ident);
        }
        n.visit_children_with(self);
    }

    fn visit_assign_target_pat(&mut self, n: &AssignTargetPat) {
        self.with_assign_target(|this| n.visit_children_with(this));
    }

    fn visit_for_head(&mut self, n: &ForHead) {
        if let ForHead::Pat(_) = n {
            self.with_assign_target(|this| n.visit_children_with(this));
        } else {
            n.visit_children_with(self);
        }
    }

    fn visit_pat(&mut self, n: &Pat) {
        if self.in_assign_target {
            if let Pat::Ident(b) = n {
                self.reference(&b.id);
            }
        }
        n.visit_children_with(self);
    }

    fn visit_assign_pat_prop(&mut self, n: &AssignPatProp) {
        if self.in_assign_target {
            self.reference(&n.key.id);
        }
        n.visit_children_with(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_program;

    /// Free/bound status of each reference to `name`, in source order.
    fn reference_status(code: &str, name: &str) -> Vec<bool> {
        struct Collect<'a> {
            tree: &'a ScopeTree,
            name: &'a str,
            found: Vec<(BytePos, bool)>,
        }
        impl Visit for Collect<'_> {
            fn visit_ident(&mut self, n: &Ident) {
                if &*n.sym == self.name && self.tree.reference_scope(n).is_some() {
                    self.found.push((n.span.lo, self.tree.is_free(n)));
                }
            }
        }

        let tree = parse_program(code).unwrap();
        let scopes = ScopeTree::build(&tree.program);
        let mut collect = Collect {
            tree: &scopes,
            name,
            found: Vec::new(),
        };
        tree.program.visit_with(&mut collect);
        collect.found.sort_by_key(|(pos, _)| *pos);
        collect.found.into_iter().map(|(_, free)| free).collect()
    }

    #[test]
    fn test_undeclared_reference_is_free() {
        assert_eq!(reference_status("exports.a = 1;", "exports"), vec![true]);
    }

    #[test]
    fn test_parameter_shadows() {
        let code = "function f(require) { require('x'); }\nrequire('y');";
        assert_eq!(reference_status(code, "require"), vec![false, true]);
    }

    #[test]
    fn test_var_hoists_to_function_scope() {
        let code = "function f() { exports.a = 1; if (x) { var exports = {}; } }\nexports.b = 2;";
        assert_eq!(reference_status(code, "exports"), vec![false, true]);
    }

    #[test]
    fn test_let_is_block_scoped() {
        let code = "{ let module = {}; module.id; }\nmodule.id;";
        assert_eq!(reference_status(code, "module"), vec![false, true]);
    }

    #[test]
    fn test_function_declaration_hoists() {
        let code = "require('a');\nfunction require() {}";
        assert_eq!(reference_status(code, "require"), vec![false]);
    }

    #[test]
    fn test_catch_param_binds_in_clause() {
        let code = "try {} catch (exports) { exports.x; }\nexports.y;";
        assert_eq!(reference_status(code, "exports"), vec![false, true]);
    }

    #[test]
    fn test_named_function_expression_sees_own_name() {
        let code = "(function module() { module.x; });\nmodule.y;";
        assert_eq!(reference_status(code, "module"), vec![false, true]);
    }

    #[test]
    fn test_class_expression_name_is_private() {
        let code = "(class exports { m() { return exports; } });\nexports.y;";
        assert_eq!(reference_status(code, "exports"), vec![false, true]);
    }

    #[test]
    fn test_arrow_params_and_for_heads() {
        let code =
            "const f = (module) => module.x;\nfor (let exports of []) exports.z;\nmodule.y;";
        assert_eq!(reference_status(code, "module"), vec![false, true]);
        assert_eq!(reference_status(code, "exports"), vec![false]);
    }

    #[test]
    fn test_declaration_sites_and_keys_are_not_references() {
        let code = "var o = { exports: 1 };\no.exports;\nlabel: for (;;) break label;";
        assert!(reference_status(code, "exports").is_empty());
        assert!(reference_status(code, "label").is_empty());
    }

    #[test]
    fn test_assignment_targets_are_references() {
        let code = "exports = 1;\n[exports] = [2];\n({ exports } = {});\nx = { exports };";
        assert_eq!(
            reference_status(code, "exports"),
            vec![true, true, true, true]
        );
    }

    #[test]
    fn test_top_level_declaration_binds_root() {
        let code = "var module = {};\nmodule.exports = 1;";
        assert_eq!(reference_status(code, "module"), vec![false]);
        let tree = parse_program(code).unwrap();
        let scopes = ScopeTree::build(&tree.program);
        assert!(scopes.has(ScopeTree::ROOT, "module"));
        assert!(!scopes.has(ScopeTree::ROOT, "exports"));
    }

    #[test]
    fn test_scope_chain_shape() {
        let tree = parse_program("function f(a) { { let b; } }").unwrap();
        let scopes = ScopeTree::build(&tree.program);
        // root, function, body block, inner block
        assert_eq!(scopes.len(), 4);
        assert_eq!(scopes.get(1).map(|s| s.kind), Some(ScopeKind::Function));
        assert!(scopes.get(1).is_some_and(|s| s.declares("a")));
        assert!(scopes.get(3).is_some_and(|s| s.declares("b")));
        assert_eq!(scopes.get(3).and_then(|s| s.parent), Some(2));
    }
}
