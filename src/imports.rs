use swc_core::{
    common::DUMMY_SP,
    ecma::ast::*,
};

use crate::ast::ident;

pub(crate) const USE_REF: &str = "__useTrackingRef";
pub(crate) const USE_CALLBACK: &str = "__useTrackingCallback";
pub(crate) const USE_EFFECT: &str = "__useTrackingEffect";

const HOOKS_SOURCE: &str = "react";

/// What [`inject`] changed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportReport {
    pub runtime_added: bool,
    pub hooks_added: bool,
}

fn as_import(item: &ModuleItem) -> Option<&ImportDecl> {
    match item {
        ModuleItem::ModuleDecl(ModuleDecl::Import(import)) => Some(import),
        _ => None,
    }
}

fn is_directive(item: &ModuleItem) -> bool {
    matches!(
        item,
        ModuleItem::Stmt(Stmt::Expr(ExprStmt { expr, .. })) if matches!(&**expr, Expr::Lit(Lit::Str(_)))
    )
}

fn imports_hook_aliases(import: &ImportDecl) -> bool {
    import.src.value.as_ref() == HOOKS_SOURCE
        && import.specifiers.iter().any(|s| {
            matches!(s, ImportSpecifier::Named(named) if named.local.sym.as_ref() == USE_REF)
        })
}

fn import_decl(source: &str, specifiers: Vec<ImportSpecifier>) -> ModuleItem {
    ModuleItem::ModuleDecl(ModuleDecl::Import(ImportDecl {
        span: DUMMY_SP,
        specifiers,
        src: Box::new(Str {
            span: DUMMY_SP,
            value: source.into(),
            raw: None,
        }),
        type_only: false,
        with: None,
        phase: ImportPhase::Evaluation,
    }))
}

fn aliased(imported: &str, local: &str) -> ImportSpecifier {
    ImportSpecifier::Named(ImportNamedSpecifier {
        span: DUMMY_SP,
        local: ident(local),
        imported: Some(ModuleExportName::Ident(ident(imported))),
        is_type_only: false,
    })
}

/// `import "<runtime>";`
fn runtime_import(runtime_url: &str) -> ModuleItem {
    import_decl(runtime_url, vec![])
}

/// `import { useCallback as __useTrackingCallback, ... } from "react";`
fn hooks_import() -> ModuleItem {
    import_decl(
        HOOKS_SOURCE,
        vec![
            aliased("useCallback", USE_CALLBACK),
            aliased("useEffect", USE_EFFECT),
            aliased("useRef", USE_REF),
        ],
    )
}

/// Ensure the module loads the tracking runtime exactly once and imports the
/// hook aliases the synthesized code calls.
///
/// The runtime import goes right after the first existing import, or at the
/// top of the module (after any directive prologue) when there is none. The
/// hooks import follows the runtime import. Both checks are by exact source,
/// so running this again changes nothing.
pub fn inject(module: &mut Module, runtime_url: &str) -> ImportReport {
    let mut report = ImportReport::default();

    let existing = module
        .body
        .iter()
        .position(|item| as_import(item).is_some_and(|i| i.src.value.as_ref() == runtime_url));

    let runtime_index = match existing {
        Some(index) => index,
        None => {
            let index = match module.body.iter().position(|item| as_import(item).is_some()) {
                Some(first) => first + 1,
                None => module.body.iter().take_while(|item| is_directive(item)).count(),
            };
            module.body.insert(index, runtime_import(runtime_url));
            report.runtime_added = true;
            log::debug!("inserted tracking runtime import at item {}", index);
            index
        }
    };

    let has_hooks = module
        .body
        .iter()
        .any(|item| as_import(item).is_some_and(imports_hook_aliases));
    if !has_hooks {
        module.body.insert(runtime_index + 1, hooks_import());
        report.hooks_added = true;
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources(module: &Module) -> Vec<String> {
        module
            .body
            .iter()
            .filter_map(as_import)
            .map(|i| i.src.value.to_string())
            .collect()
    }

    fn module(body: Vec<ModuleItem>) -> Module {
        Module {
            span: DUMMY_SP,
            body,
            shebang: None,
        }
    }

    const URL: &str = "http://localhost:3000/tracking.js";

    #[test]
    fn inserts_after_first_import() {
        let mut m = module(vec![
            import_decl("react", vec![]),
            import_decl("./styles.css", vec![]),
        ]);
        let report = inject(&mut m, URL);
        assert!(report.runtime_added && report.hooks_added);
        assert_eq!(sources(&m), vec!["react", URL, "react", "./styles.css"]);
    }

    #[test]
    fn inserts_after_directives_without_imports() {
        let directive = ModuleItem::Stmt(crate::ast::expr_stmt(crate::ast::str_lit("use client")));
        let mut m = module(vec![directive]);
        inject(&mut m, URL);
        assert!(is_directive(&m.body[0]));
        assert_eq!(sources(&m), vec![URL, "react"]);
    }

    #[test]
    fn is_idempotent() {
        let mut m = module(vec![import_decl("react", vec![])]);
        inject(&mut m, URL);
        let len = m.body.len();
        let report = inject(&mut m, URL);
        assert_eq!(report, ImportReport::default());
        assert_eq!(m.body.len(), len);
    }

    #[test]
    fn existing_runtime_import_is_reused() {
        let mut m = module(vec![
            import_decl("react", vec![]),
            import_decl("./a", vec![]),
            runtime_import(URL),
        ]);
        let report = inject(&mut m, URL);
        assert!(!report.runtime_added);
        assert!(report.hooks_added);
        assert_eq!(sources(&m), vec!["react", "./a", URL, "react"]);
    }
}
