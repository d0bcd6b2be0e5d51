//! The marker-to-instrumentation pass over one module.
//!
//! Elements are handled in document order (an element before its children).
//! For each marked element the markers are stripped, a handle is allocated
//! and attached as `ref`, every marker becomes a tracking point registered at
//! discovery time, and the synthesized hooks are queued for the nearest
//! enclosing component (see [`crate::placement`]). They are spliced into that
//! component's body once it has been fully visited.

use swc_core::{
    common::{SourceMapper, Span},
    ecma::{
        ast::*,
        visit::{VisitMut, VisitMutWith},
    },
};

use crate::ast::*;
use crate::config::TrackingOptions;
use crate::diagnostics::{Diagnostic, DiagnosticCode, Severity};
use crate::handle::{Allocation, HandleAllocator};
use crate::imports::{self, USE_REF};
use crate::marker::{module_has_markers, scan_attrs, strip_markers, ElementMarkers};
use crate::model::{ElementHandle, MarkerKind, MarkerValue, TrackingMarker, TrackingPoint};
use crate::placement::{is_component_name, is_function_like, wraps_component, BodyScan};
use crate::registry::{Registration, TrackingRegistry};
use crate::{click, visibility};

/// Inputs of one module transform besides the tree itself.
pub struct TransformContext<'a> {
    pub file_path: &'a str,
    pub options: &'a TrackingOptions,
    pub registry: &'a mut dyn TrackingRegistry,
    /// Used only to put line numbers on diagnostics.
    pub source_map: Option<&'a dyn SourceMapper>,
}

#[derive(Debug)]
pub struct ModuleOutput {
    pub module: Module,
    pub tracking_points: Vec<TrackingPoint>,
    pub diagnostics: Vec<Diagnostic>,
    /// False when the module had no markers and was returned as given.
    pub instrumented: bool,
    pub handles: usize,
}

/// Rewrite `module` so that no marker remains and every supported marker is
/// backed by synthesized instrumentation.
pub fn transform_module(mut module: Module, cx: TransformContext<'_>) -> ModuleOutput {
    if !module_has_markers(&module) {
        return ModuleOutput {
            module,
            tracking_points: vec![],
            diagnostics: vec![],
            instrumented: false,
            handles: 0,
        };
    }

    let mut pass = Instrumenter {
        file: cx.file_path,
        runtime_global: &cx.options.runtime_global,
        registry: cx.registry,
        source_map: cx.source_map,
        handles: HandleAllocator::for_module(&module),
        handle_count: 0,
        points: vec![],
        diagnostics: vec![],
        frames: vec![],
        component_hint: false,
    };
    module.visit_mut_with(&mut pass);

    if pass.handle_count > 0 {
        let report = imports::inject(&mut module, &cx.options.runtime_url);
        log::debug!(
            "{}: {} handle(s), runtime import added: {}, hooks import added: {}",
            cx.file_path,
            pass.handle_count,
            report.runtime_added,
            report.hooks_added
        );
    }

    ModuleOutput {
        module,
        tracking_points: pass.points,
        diagnostics: pass.diagnostics,
        instrumented: true,
        handles: pass.handle_count,
    }
}


enum RefAttr {
    Absent,
    Expr(usize),
    Unsupported,
}

fn is_ref(attr: &JSXAttrOrSpread) -> bool {
    matches!(attr, JSXAttrOrSpread::JSXAttr(attr) if attr_name(attr) == Some("ref"))
}

fn existing_ref(attrs: &[JSXAttrOrSpread]) -> RefAttr {
    let Some(index) = attrs.iter().rposition(is_ref) else {
        return RefAttr::Absent;
    };
    match &attrs[index] {
        JSXAttrOrSpread::JSXAttr(JSXAttr {
            value: Some(JSXAttrValue::JSXExprContainer(JSXExprContainer {
                expr: JSXExpr::Expr(_),
                ..
            })),
            ..
        }) => RefAttr::Expr(index),
        _ => RefAttr::Unsupported,
    }
}

/// Spreads after the last explicit `ref`; any of them may override it.
fn trailing_spreads(attrs: &[JSXAttrOrSpread]) -> impl Iterator<Item = &SpreadElement> {
    let start = attrs.iter().rposition(is_ref).map_or(0, |index| index + 1);
    attrs[start..].iter().filter_map(|attr| match attr {
        JSXAttrOrSpread::SpreadElement(spread) => Some(spread),
        JSXAttrOrSpread::JSXAttr(_) => None,
    })
}

/// `props`, `this.props`, `a.b.c`: safe to read twice.
fn is_plain_path(expr: &Expr) -> bool {
    match expr {
        Expr::Ident(_) | Expr::This(_) => true,
        Expr::Member(m) => matches!(m.prop, MemberProp::Ident(_)) && is_plain_path(&m.obj),
        Expr::Paren(paren) => is_plain_path(&paren.expr),
        _ => false,
    }
}

const NODE: &str = "__trackingNode";
const FORWARD: &str = "__forwardRef";

/// `(node) => { handle.current = node; <forward node to the original ref> }`
fn forwarding_ref(handle: &ElementHandle, original: Expr) -> Expr {
    arrow(
        vec![binding(NODE)],
        vec![
            expr_stmt(assign_member(
                ident_expr(&handle.name()),
                "current",
                ident_expr(NODE),
            )),
            const_decl(FORWARD, original),
            if_else_stmt(
                typeof_is(ident_expr(FORWARD), "function"),
                vec![expr_stmt(call(ident_expr(FORWARD), vec![ident_expr(NODE)]))],
                if_stmt(
                    ident_expr(FORWARD),
                    vec![expr_stmt(assign_member(
                        ident_expr(FORWARD),
                        "current",
                        ident_expr(NODE),
                    ))],
                ),
            ),
        ],
    )
}

/// Make the handle the element's `ref`, still feeding whatever ref the
/// element had: an explicit `ref`, or `spread.ref` of any later spread.
fn attach_handle(attrs: &mut Vec<JSXAttrOrSpread>, handle: &ElementHandle) {
    let spread_refs: Vec<Expr> = trailing_spreads(attrs)
        .map(|spread| member((*spread.expr).clone(), "ref"))
        .collect();
    let mut forwarded = match existing_ref(attrs) {
        RefAttr::Expr(index) => match attrs.remove(index) {
            JSXAttrOrSpread::JSXAttr(JSXAttr {
                value: Some(JSXAttrValue::JSXExprContainer(JSXExprContainer {
                    expr: JSXExpr::Expr(expr),
                    ..
                })),
                ..
            }) => Some(*expr),
            _ => None,
        },
        RefAttr::Absent | RefAttr::Unsupported => None,
    };
    // The last spread wins when it carries a ref.
    for spread_ref in spread_refs {
        forwarded = Some(match forwarded {
            Some(earlier) => bin(BinaryOp::NullishCoalescing, spread_ref, earlier),
            None => spread_ref,
        });
    }
    let value = match forwarded {
        Some(original) => forwarding_ref(handle, original),
        None => ident_expr(&handle.name()),
    };
    attrs.push(jsx_expr_attr("ref", value));
}

type Queued = (usize, Vec<Stmt>);

/// Insert each hook group before the statement at its recorded index.
fn splice(stmts: &mut Vec<Stmt>, mut pending: Vec<Queued>) {
    if pending.is_empty() {
        return;
    }
    pending.sort_by_key(|(index, _)| *index);

    let original = std::mem::take(stmts);
    let mut queued = pending.into_iter().peekable();
    for (index, stmt) in original.into_iter().enumerate() {
        while let Some((_, hooks)) = queued.next_if(|(at, _)| *at <= index) {
            stmts.extend(hooks);
        }
        stmts.push(stmt);
    }
    stmts.extend(queued.flat_map(|(_, hooks)| hooks));
}

struct ComponentFrame {
    scan: BodyScan,
    // Body statement currently being visited.
    stmt_index: usize,
    pending: Vec<Queued>,
}

enum Frame {
    Class,
    /// `None` for functions that are not components.
    Function(Option<ComponentFrame>),
}

struct Instrumenter<'a> {
    file: &'a str,
    runtime_global: &'a str,
    registry: &'a mut dyn TrackingRegistry,
    source_map: Option<&'a dyn SourceMapper>,
    handles: HandleAllocator,
    handle_count: usize,
    points: Vec<TrackingPoint>,
    diagnostics: Vec<Diagnostic>,

    frames: Vec<Frame>,
    // Set right before visiting a node whose first function is a component.
    component_hint: bool,
}

impl Instrumenter<'_> {
    fn line(&self, span: Span) -> Option<usize> {
        if span.is_dummy() {
            return None;
        }
        self.source_map.map(|cm| cm.lookup_char_pos(span.lo()).line)
    }

    fn report(&mut self, severity: Severity, code: DiagnosticCode, line: Option<usize>, message: String) {
        self.diagnostics
            .push(Diagnostic::new(severity, code, self.file, message).with_line(line));
    }

    /// Nearest enclosing component frame.
    fn target(&self) -> Result<(usize, &ComponentFrame), String> {
        for (index, frame) in self.frames.iter().enumerate().rev() {
            match frame {
                Frame::Class => return Err("inside a class body, where hooks cannot run".into()),
                Frame::Function(Some(component)) => return Ok((index, component)),
                Frame::Function(None) => {}
            }
        }
        Err("not inside a function component or custom hook".into())
    }

    /// The component frame and body index that will receive the hooks.
    fn placement(&self, markers: &ElementMarkers, attrs: &[JSXAttrOrSpread]) -> Result<(usize, usize), String> {
        let (target, frame) = self.target()?;
        if matches!(existing_ref(attrs), RefAttr::Unsupported) {
            return Err("the element has a non-expression `ref`".into());
        }
        if !trailing_spreads(attrs).all(|spread| is_plain_path(&spread.expr)) {
            return Err("the element spreads a computed expression that may carry a `ref`".into());
        }

        let dynamic: Vec<&Expr> = [&markers.show, &markers.click]
            .into_iter()
            .filter_map(|value| match value {
                Some(MarkerValue::Dynamic(expr)) => Some(&**expr),
                _ => None,
            })
            .collect();
        if dynamic.is_empty() {
            return Ok((target, frame.scan.literal_position()));
        }

        let position = frame.scan.dynamic_position(frame.stmt_index);
        let mut unbound: Vec<String> = dynamic
            .into_iter()
            .flat_map(|expr| frame.scan.unbound_at(expr, position))
            .collect();
        unbound.sort();
        unbound.dedup();
        if unbound.is_empty() {
            return Ok((target, position));
        }
        let names: Vec<String> = unbound.iter().map(|name| format!("`{}`", name)).collect();
        Err(format!(
            "the marker value uses {}, which is not in scope where the component's hooks run",
            names.join(", ")
        ))
    }

    fn discover(&mut self, marker: &TrackingMarker, line: Option<usize>) {
        let point = TrackingPoint::new(marker, self.file);
        if let Registration::Duplicate(original) = self.registry.check_and_register(&point) {
            self.report(
                Severity::Warning,
                DiagnosticCode::DuplicateKey,
                line,
                format!(
                    "duplicate tracking key `{}`: first declared at {}, declared again at {}",
                    point.key(),
                    original.location(),
                    point.location()
                ),
            );
        }
        self.points.push(point);
    }

    fn instrument_element(&mut self, el: &mut JSXElement) {
        let markers = scan_attrs(&el.opening.attrs);
        if !markers.any() {
            return;
        }
        let element = element_name(&el.opening.name);
        let line = self.line(el.opening.span);
        let placement = self.placement(&markers, &el.opening.attrs);
        strip_markers(&mut el.opening.attrs);

        for kind in &markers.missing {
            self.report(
                Severity::Warning,
                DiagnosticCode::MissingMarkerValue,
                line,
                format!("`{}` on <{}> has no value and was removed", kind.attribute(), element),
            );
        }
        if !markers.has_values() {
            return;
        }
        let (target, position) = match placement {
            Ok(found) => found,
            Err(problem) => {
                self.report(
                    Severity::Warning,
                    DiagnosticCode::UnsupportedPlacement,
                    line,
                    format!("tracking markers on <{}> were removed without instrumentation: {}", element, problem),
                );
                return;
            }
        };

        let Allocation { handle, collisions } = self.handles.allocate();
        self.handle_count += 1;
        if !collisions.is_empty() {
            self.report(
                Severity::Warning,
                DiagnosticCode::HandleCollision,
                line,
                format!(
                    "generated name(s) {} already used in the module; <{}> uses {}",
                    collisions.join(", "),
                    element,
                    handle.name()
                ),
            );
        }
        if target + 1 < self.frames.len() {
            self.report(
                Severity::Note,
                DiagnosticCode::SharedHandle,
                line,
                format!(
                    "<{}> is rendered by a nested function; all of its instances share {}",
                    element,
                    handle.name()
                ),
            );
        }
        attach_handle(&mut el.opening.attrs, &handle);

        let mut hooks = vec![const_decl(&handle.name(), call(ident_expr(USE_REF), vec![null()]))];
        let ElementMarkers { show, click, .. } = markers;
        for (kind, value) in [(MarkerKind::Show, show), (MarkerKind::Click, click)] {
            let Some(value) = value else {
                continue;
            };
            hooks.extend(match kind {
                MarkerKind::Show => visibility::synthesize(&handle, &value, self.runtime_global),
                MarkerKind::Click => click::synthesize(&handle, &value, self.runtime_global),
            });
            let marker = TrackingMarker {
                kind,
                value,
                element: element.clone(),
            };
            self.discover(&marker, line);
        }
        if let Some(Frame::Function(Some(frame))) = self.frames.get_mut(target) {
            frame.pending.push((position, hooks));
        }
    }

    /// Push a frame for the function about to be visited. Only component
    /// bodies are scanned.
    fn enter_function(&mut self, scan: impl FnOnce() -> BodyScan) -> bool {
        let component = std::mem::take(&mut self.component_hint);
        self.frames.push(Frame::Function(component.then(|| ComponentFrame {
            scan: scan(),
            stmt_index: 0,
            pending: vec![],
        })));
        component
    }

    fn exit_function(&mut self) -> Vec<Queued> {
        match self.frames.pop() {
            Some(Frame::Function(Some(frame))) => frame.pending,
            _ => vec![],
        }
    }

    fn visit_component_body(&mut self, stmts: &mut [Stmt]) {
        let depth = self.frames.len().saturating_sub(1);
        for (index, stmt) in stmts.iter_mut().enumerate() {
            if let Some(Frame::Function(Some(frame))) = self.frames.get_mut(depth) {
                frame.stmt_index = index;
            }
            stmt.visit_mut_with(self);
        }
    }
}

impl VisitMut for Instrumenter<'_> {
    fn visit_mut_class(&mut self, n: &mut Class) {
        self.frames.push(Frame::Class);
        n.visit_mut_children_with(self);
        self.frames.pop();
    }

    fn visit_mut_fn_decl(&mut self, n: &mut FnDecl) {
        self.component_hint = is_component_name(&n.ident.sym);
        n.function.visit_mut_with(self);
    }

    fn visit_mut_fn_expr(&mut self, n: &mut FnExpr) {
        if n.ident.as_ref().is_some_and(|ident| is_component_name(&ident.sym)) {
            self.component_hint = true;
        }
        n.function.visit_mut_with(self);
    }

    // `const Page = () => ..`, `const Ad = memo(function () { .. })`
    fn visit_mut_var_declarator(&mut self, n: &mut VarDeclarator) {
        n.name.visit_mut_with(self);
        let named = matches!(&n.name, Pat::Ident(binding) if is_component_name(&binding.id.sym));
        if named && n.init.as_deref().is_some_and(is_function_like) {
            self.component_hint = true;
        }
        n.init.visit_mut_with(self);
    }

    fn visit_mut_call_expr(&mut self, n: &mut CallExpr) {
        n.callee.visit_mut_with(self);
        let wraps = wraps_component(n);
        for (index, arg) in n.args.iter_mut().enumerate() {
            if index == 0 && wraps {
                self.component_hint = true;
            }
            arg.visit_mut_with(self);
        }
    }

    fn visit_mut_export_default_expr(&mut self, n: &mut ExportDefaultExpr) {
        if is_function_like(&n.expr) {
            self.component_hint = true;
        }
        n.expr.visit_mut_with(self);
    }

    fn visit_mut_export_default_decl(&mut self, n: &mut ExportDefaultDecl) {
        if matches!(n.decl, DefaultDecl::Fn(_)) {
            self.component_hint = true;
        }
        n.decl.visit_mut_with(self);
    }

    fn visit_mut_function(&mut self, n: &mut Function) {
        let component = self.enter_function(|| {
            n.body
                .as_ref()
                .map(|body| BodyScan::of_block(&body.stmts))
                .unwrap_or_default()
        });
        if !component {
            n.visit_mut_children_with(self);
            self.exit_function();
            return;
        }
        n.params.visit_mut_with(self);
        if let Some(body) = &mut n.body {
            self.visit_component_body(&mut body.stmts);
        }
        let pending = self.exit_function();
        if let Some(body) = &mut n.body {
            splice(&mut body.stmts, pending);
        }
    }

    fn visit_mut_arrow_expr(&mut self, n: &mut ArrowExpr) {
        let component = self.enter_function(|| match &*n.body {
            BlockStmtOrExpr::BlockStmt(body) => BodyScan::of_block(&body.stmts),
            BlockStmtOrExpr::Expr(expr) => BodyScan::of_expr(expr),
        });
        if !component {
            n.visit_mut_children_with(self);
            self.exit_function();
            return;
        }
        n.params.visit_mut_with(self);
        match &mut *n.body {
            BlockStmtOrExpr::BlockStmt(body) => self.visit_component_body(&mut body.stmts),
            BlockStmtOrExpr::Expr(expr) => expr.visit_mut_with(self),
        }
        let pending = self.exit_function();
        if pending.is_empty() {
            return;
        }
        if let BlockStmtOrExpr::BlockStmt(body) = &mut *n.body {
            splice(&mut body.stmts, pending);
            return;
        }
        let body = std::mem::replace(&mut *n.body, BlockStmtOrExpr::BlockStmt(block(vec![])));
        if let BlockStmtOrExpr::Expr(expr) = body {
            let mut stmts = vec![];
            splice(&mut stmts, pending);
            stmts.push(return_stmt(Some(*expr)));
            *n.body = BlockStmtOrExpr::BlockStmt(block(stmts));
        }
    }

    fn visit_mut_jsx_element(&mut self, n: &mut JSXElement) {
        self.instrument_element(n);
        n.visit_mut_children_with(self);
    }
}
