use std::fmt;

use serde::{Deserialize, Serialize};
use swc_core::ecma::ast::Expr;

/// Attribute that requests visibility instrumentation.
pub const SHOW_MARKER: &str = "data-track-show";
/// Attribute that requests click instrumentation.
pub const CLICK_MARKER: &str = "data-track-click";

/// Manifest name recorded for markers whose value is only known at runtime.
pub const DYNAMIC_NAME: &str = "dynamic";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerKind {
    Show,
    Click,
}

impl MarkerKind {
    pub fn attribute(self) -> &'static str {
        match self {
            MarkerKind::Show => SHOW_MARKER,
            MarkerKind::Click => CLICK_MARKER,
        }
    }

    pub fn from_attribute(name: &str) -> Option<Self> {
        match name {
            SHOW_MARKER => Some(MarkerKind::Show),
            CLICK_MARKER => Some(MarkerKind::Click),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MarkerKind::Show => "show",
            MarkerKind::Click => "click",
        }
    }
}

impl fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value carried by a marker attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkerValue {
    /// Known at compile time.
    Literal(String),
    /// Evaluated at runtime; wired into the generated code as-is.
    Dynamic(Box<Expr>),
}

impl MarkerValue {
    /// Name used for the manifest and the duplicate key.
    pub fn manifest_name(&self) -> &str {
        match self {
            MarkerValue::Literal(name) => name,
            MarkerValue::Dynamic(_) => DYNAMIC_NAME,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, MarkerValue::Dynamic(_))
    }

    /// Expression passed to the runtime at the call site.
    pub(crate) fn to_expr(&self) -> Expr {
        match self {
            MarkerValue::Literal(name) => crate::ast::str_lit(name),
            MarkerValue::Dynamic(expr) => (**expr).clone(),
        }
    }
}

/// A marker found on one element during scanning.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingMarker {
    pub kind: MarkerKind,
    pub value: MarkerValue,
    pub element: String,
}

/// Runtime reference to one instrumented element.
///
/// The handle name is the `useRef` binding attached to the element; the
/// click callback and visibility state are derived from the same index so a
/// collision check on the handle covers all three bindings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle {
    index: usize,
}

impl ElementHandle {
    pub(crate) fn new(index: usize) -> Self {
        Self { index }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> String {
        format!("trackingRef{}", self.index)
    }

    pub fn click_callback(&self) -> String {
        format!("trackingClick{}", self.index)
    }

    pub fn visibility_state(&self) -> String {
        format!("trackingShow{}", self.index)
    }

    pub(crate) fn bindings(&self) -> [String; 3] {
        [self.name(), self.click_callback(), self.visibility_state()]
    }
}

/// One instrumented (kind, name, element, file) instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingPoint {
    #[serde(rename = "type")]
    pub kind: MarkerKind,
    pub name: String,
    pub element_name: String,
    #[serde(skip)]
    pub file_path: String,
    /// Dynamic points share the sentinel name and are never keyed.
    #[serde(skip)]
    pub dynamic: bool,
}

impl TrackingPoint {
    pub fn new(marker: &TrackingMarker, file_path: &str) -> Self {
        Self {
            kind: marker.kind,
            name: marker.value.manifest_name().to_string(),
            element_name: marker.element.clone(),
            file_path: file_path.to_string(),
            dynamic: marker.value.is_dynamic(),
        }
    }

    /// Duplicate-detection key, `type:name`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.kind, self.name)
    }

    /// `file <element>`, used when reporting both sides of a duplicate.
    pub fn location(&self) -> String {
        format!("{} <{}>", self.file_path, self.element_name)
    }
}
