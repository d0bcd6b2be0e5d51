//! Marker detection and removal on JSX opening elements.

use swc_core::ecma::{
    ast::*,
    visit::{Visit, VisitWith},
};

use crate::ast::attr_name;
use crate::model::{MarkerKind, MarkerValue};

/// Markers present on a single element.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ElementMarkers {
    pub show: Option<MarkerValue>,
    pub click: Option<MarkerValue>,
    /// Marker attributes present without a usable value.
    pub missing: Vec<MarkerKind>,
}

impl ElementMarkers {
    /// True when the element carried a marker attribute of any kind.
    pub fn any(&self) -> bool {
        self.show.is_some() || self.click.is_some() || !self.missing.is_empty()
    }

    /// True when at least one marker can be instrumented.
    pub fn has_values(&self) -> bool {
        self.show.is_some() || self.click.is_some()
    }

    pub fn has_dynamic(&self) -> bool {
        [&self.show, &self.click]
            .into_iter()
            .flatten()
            .any(MarkerValue::is_dynamic)
    }
}

fn marker_kind(attr: &JSXAttrOrSpread) -> Option<MarkerKind> {
    match attr {
        JSXAttrOrSpread::JSXAttr(attr) => attr_name(attr).and_then(MarkerKind::from_attribute),
        JSXAttrOrSpread::SpreadElement(_) => None,
    }
}

fn literal_from_expr(expr: &Expr) -> MarkerValue {
    match expr {
        Expr::Lit(Lit::Str(s)) => MarkerValue::Literal(s.value.to_string()),
        Expr::Tpl(tpl) if tpl.exprs.is_empty() => MarkerValue::Literal(
            tpl.quasis
                .iter()
                .map(|q| {
                    q.cooked
                        .as_ref()
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| q.raw.to_string())
                })
                .collect(),
        ),
        Expr::Paren(paren) => literal_from_expr(&paren.expr),
        other => MarkerValue::Dynamic(Box::new(other.clone())),
    }
}

fn marker_value(value: &Option<JSXAttrValue>) -> Option<MarkerValue> {
    match value.as_ref()? {
        JSXAttrValue::Lit(Lit::Str(s)) => Some(MarkerValue::Literal(s.value.to_string())),
        JSXAttrValue::Lit(lit) => Some(MarkerValue::Dynamic(Box::new(Expr::Lit(lit.clone())))),
        JSXAttrValue::JSXExprContainer(container) => match &container.expr {
            JSXExpr::JSXEmptyExpr(_) => None,
            JSXExpr::Expr(expr) => Some(literal_from_expr(expr)),
        },
        JSXAttrValue::JSXElement(el) => Some(MarkerValue::Dynamic(Box::new(Expr::JSXElement(
            el.clone(),
        )))),
        JSXAttrValue::JSXFragment(frag) => {
            Some(MarkerValue::Dynamic(Box::new(Expr::JSXFragment(frag.clone()))))
        }
    }
}

/// Collect the show and click markers of one element. When a kind appears
/// more than once the last attribute wins, as it does for JSX props.
pub fn scan_attrs(attrs: &[JSXAttrOrSpread]) -> ElementMarkers {
    let mut found = ElementMarkers::default();
    for attr in attrs {
        let JSXAttrOrSpread::JSXAttr(jsx_attr) = attr else {
            continue;
        };
        let Some(kind) = marker_kind(attr) else {
            continue;
        };
        let value = marker_value(&jsx_attr.value);
        let slot = match kind {
            MarkerKind::Show => &mut found.show,
            MarkerKind::Click => &mut found.click,
        };
        match value {
            Some(v) => {
                *slot = Some(v);
                found.missing.retain(|k| *k != kind);
            }
            None => {
                *slot = None;
                if !found.missing.contains(&kind) {
                    found.missing.push(kind);
                }
            }
        }
    }
    found
}

/// Remove every marker attribute, leaving all other attributes in place.
/// Returns how many were removed.
pub fn strip_markers(attrs: &mut Vec<JSXAttrOrSpread>) -> usize {
    let before = attrs.len();
    attrs.retain(|attr| marker_kind(attr).is_none());
    before - attrs.len()
}

struct MarkerProbe {
    found: bool,
}

impl Visit for MarkerProbe {
    fn visit_jsx_opening_element(&mut self, n: &JSXOpeningElement) {
        if self.found {
            return;
        }
        if n.attrs.iter().any(|a| marker_kind(a).is_some()) {
            self.found = true;
            return;
        }
        n.visit_children_with(self);
    }
}

/// Whether any element in the module carries a marker. Modules without one
/// pass through the transform untouched.
pub fn module_has_markers(module: &Module) -> bool {
    let mut probe = MarkerProbe { found: false };
    module.visit_with(&mut probe);
    probe.found
}
