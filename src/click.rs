//! Click instrumentation.
//!
//! For handle `N` the generated hooks are:
//!
//! ```js
//! const trackingClickN = __useTrackingCallback(() => {
//!   if (window.tracking) { window.tracking.click(name); }
//! }, [/* name, when dynamic */]);
//! __useTrackingEffect(() => {
//!   const __trackingElement = trackingRefN.current;
//!   if (!__trackingElement) return;
//!   __trackingElement.removeEventListener("click", trackingClickN);
//!   __trackingElement.addEventListener("click", trackingClickN);
//!   return () => { __trackingElement.removeEventListener("click", trackingClickN); };
//! });
//! ```
//!
//! The effect has no dependency list: it re-binds after every commit, so an
//! element mounted later under a condition is picked up and an element that
//! went away is released by the previous cleanup.

use swc_core::ecma::ast::Stmt;

use crate::ast::*;
use crate::imports::{USE_CALLBACK, USE_EFFECT};
use crate::model::{ElementHandle, MarkerValue};

const ELEMENT: &str = "__trackingElement";

fn listener_call(method: &str, callback: &str) -> Stmt {
    expr_stmt(method_call(
        ident_expr(ELEMENT),
        method,
        vec![str_lit("click"), ident_expr(callback)],
    ))
}

pub fn synthesize(handle: &ElementHandle, value: &MarkerValue, runtime_global: &str) -> Vec<Stmt> {
    let callback = handle.click_callback();

    let deps = match value {
        MarkerValue::Literal(_) => vec![],
        MarkerValue::Dynamic(_) => vec![value.to_expr()],
    };
    let memoized = const_decl(
        &callback,
        call(
            ident_expr(USE_CALLBACK),
            vec![
                arrow(
                    vec![],
                    vec![guarded_runtime_call(runtime_global, "click", value.to_expr())],
                ),
                array(deps),
            ],
        ),
    );

    let effect = expr_stmt(call(
        ident_expr(USE_EFFECT),
        vec![arrow(
            vec![],
            vec![
                const_decl(ELEMENT, member(ident_expr(&handle.name()), "current")),
                if_stmt(not(ident_expr(ELEMENT)), vec![return_stmt(None)]),
                listener_call("removeEventListener", &callback),
                listener_call("addEventListener", &callback),
                return_stmt(Some(arrow(
                    vec![],
                    vec![listener_call("removeEventListener", &callback)],
                ))),
            ],
        )],
    ));

    vec![memoized, effect]
}
