//! Where synthesized hooks may go.
//!
//! Hooks belong to the nearest enclosing component or custom hook: a
//! function whose name is capitalized (`Page`) or hook-shaped (`useAd`), a
//! function bound to such a name, a default export, or the first argument of
//! `memo`/`forwardRef`. Inside that body they must run unconditionally and
//! in the same order on every render.

use std::collections::{HashMap, HashSet};

use swc_core::ecma::{
    ast::*,
    visit::{Visit, VisitWith},
};

const WRAPPERS: &[&str] = &["forwardRef", "memo"];

/// `Page`, `AdBanner`, or a hook name such as `useTracking`.
pub(crate) fn is_component_name(name: &str) -> bool {
    if name.starts_with(|c: char| c.is_ascii_uppercase()) {
        return true;
    }
    name.strip_prefix("use")
        .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_uppercase()))
}

fn is_wrapper_callee(callee: &Callee) -> bool {
    let Callee::Expr(expr) = callee else {
        return false;
    };
    match &**expr {
        Expr::Ident(ident) => WRAPPERS.contains(&ident.sym.as_ref()),
        Expr::Member(MemberExpr {
            prop: MemberProp::Ident(prop),
            ..
        }) => WRAPPERS.contains(&prop.sym.as_ref()),
        _ => false,
    }
}

/// `memo(fn)`, `React.forwardRef(fn)` and nestings of them.
pub(crate) fn wraps_component(call: &CallExpr) -> bool {
    is_wrapper_callee(&call.callee)
        && call
            .args
            .first()
            .is_some_and(|arg| arg.spread.is_none() && is_function_like(&arg.expr))
}

/// A function expression, possibly parenthesized, cast or wrapped in
/// `memo`/`forwardRef`. The first function visited inside it is the one
/// that renders.
pub(crate) fn is_function_like(expr: &Expr) -> bool {
    match expr {
        Expr::Arrow(_) | Expr::Fn(_) => true,
        Expr::Paren(paren) => is_function_like(&paren.expr),
        Expr::TsAs(cast) => is_function_like(&cast.expr),
        Expr::TsSatisfies(cast) => is_function_like(&cast.expr),
        Expr::Call(call) => wraps_component(call),
        _ => false,
    }
}

/// Whether a statement can leave the function, not counting nested
/// functions or classes.
struct ExitFinder {
    found: bool,
}

impl Visit for ExitFinder {
    fn visit_return_stmt(&mut self, _: &ReturnStmt) {
        self.found = true;
    }

    fn visit_throw_stmt(&mut self, _: &ThrowStmt) {
        self.found = true;
    }

    fn visit_function(&mut self, _: &Function) {}

    fn visit_arrow_expr(&mut self, _: &ArrowExpr) {}

    fn visit_class(&mut self, _: &Class) {}
}

fn can_exit(stmt: &Stmt) -> bool {
    let mut finder = ExitFinder { found: false };
    stmt.visit_with(&mut finder);
    finder.found
}

fn is_directive(stmt: &Stmt) -> bool {
    matches!(stmt, Stmt::Expr(ExprStmt { expr, .. }) if matches!(&**expr, Expr::Lit(Lit::Str(_))))
}

type Sites = HashMap<String, Vec<Option<usize>>>;

/// Records each declared name with the top-level statement declaring it, or
/// `None` when the declaration sits in a nested scope.
struct DeclSites<'a> {
    site: Option<usize>,
    out: &'a mut Sites,
}

impl DeclSites<'_> {
    fn add(&mut self, ident: &Ident) {
        self.out
            .entry(ident.sym.to_string())
            .or_default()
            .push(self.site);
    }
}

impl Visit for DeclSites<'_> {
    fn visit_binding_ident(&mut self, n: &BindingIdent) {
        self.add(&n.id);
    }

    fn visit_fn_decl(&mut self, n: &FnDecl) {
        self.add(&n.ident);
        n.function.visit_with(self);
    }

    fn visit_fn_expr(&mut self, n: &FnExpr) {
        if let Some(ident) = &n.ident {
            self.add(ident);
        }
        n.function.visit_with(self);
    }

    fn visit_class_decl(&mut self, n: &ClassDecl) {
        self.add(&n.ident);
        n.class.visit_with(self);
    }

    fn visit_class_expr(&mut self, n: &ClassExpr) {
        if let Some(ident) = &n.ident {
            self.add(ident);
        }
        n.class.visit_with(self);
    }

    // Assignment targets are not declarations.
    fn visit_assign_expr(&mut self, n: &AssignExpr) {
        n.right.visit_with(self);
    }
}

struct IdentUses<'a> {
    out: &'a mut HashSet<String>,
}

impl Visit for IdentUses<'_> {
    fn visit_ident(&mut self, n: &Ident) {
        self.out.insert(n.sym.to_string());
    }
}

/// Layout of a component body, taken before it is rewritten.
#[derive(Debug, Default)]
pub(crate) struct BodyScan {
    prologue: usize,
    first_exit: usize,
    sites: Sites,
}

impl BodyScan {
    pub(crate) fn of_block(stmts: &[Stmt]) -> Self {
        let prologue = stmts.iter().take_while(|s| is_directive(s)).count();
        let first_exit = stmts
            .iter()
            .position(can_exit)
            .unwrap_or(stmts.len());

        let mut sites = Sites::new();
        for (index, stmt) in stmts.iter().enumerate() {
            match stmt {
                Stmt::Decl(Decl::Var(var)) => {
                    for decl in &var.decls {
                        decl.name.visit_with(&mut DeclSites {
                            site: Some(index),
                            out: &mut sites,
                        });
                        decl.init.visit_with(&mut DeclSites {
                            site: None,
                            out: &mut sites,
                        });
                    }
                }
                // Hoisted: callable from anywhere in the body.
                Stmt::Decl(Decl::Fn(f)) => f.function.visit_with(&mut DeclSites {
                    site: None,
                    out: &mut sites,
                }),
                Stmt::Decl(Decl::Class(c)) => {
                    DeclSites {
                        site: Some(index),
                        out: &mut sites,
                    }
                    .add(&c.ident);
                    c.class.visit_with(&mut DeclSites {
                        site: None,
                        out: &mut sites,
                    });
                }
                other => other.visit_with(&mut DeclSites {
                    site: None,
                    out: &mut sites,
                }),
            }
        }

        Self {
            prologue,
            first_exit,
            sites,
        }
    }

    /// Expression-bodied arrow: every declaration inside is nested.
    pub(crate) fn of_expr(expr: &Expr) -> Self {
        let mut sites = Sites::new();
        expr.visit_with(&mut DeclSites {
            site: None,
            out: &mut sites,
        });
        Self {
            prologue: 0,
            first_exit: 0,
            sites,
        }
    }

    /// Hooks that only reference their own bindings go first, after any
    /// directives.
    pub(crate) fn literal_position(&self) -> usize {
        self.prologue
    }

    /// Hooks that evaluate a marker expression go before the first statement
    /// that can return or throw, and never after the statement rendering the
    /// element.
    pub(crate) fn dynamic_position(&self, containing: usize) -> usize {
        self.first_exit.min(containing).max(self.prologue)
    }

    /// Names used by `expr` that are declared in this body but not bound
    /// yet at `position`, or only in a nested scope.
    pub(crate) fn unbound_at(&self, expr: &Expr, position: usize) -> Vec<String> {
        let mut used = HashSet::new();
        expr.visit_with(&mut IdentUses { out: &mut used });
        let mut own = Sites::new();
        expr.visit_with(&mut DeclSites {
            site: None,
            out: &mut own,
        });

        let mut names: Vec<String> = used
            .into_iter()
            .filter(|name| !own.contains_key(name))
            .filter(|name| {
                self.sites.get(name).is_some_and(|sites| {
                    sites
                        .iter()
                        .any(|site| !matches!(site, Some(index) if *index < position))
                })
            })
            .collect();
        names.sort();
        names
    }
}
