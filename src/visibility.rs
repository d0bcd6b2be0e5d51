//! Fire-once visibility instrumentation.
//!
//! Each shown element gets a state holder `trackingShowN` whose `current` is
//! `null` while idle and `{ element, observer }` once an observer has been
//! created for a concrete DOM node. The lifecycle per mounted node is
//! `Idle -> Observing -> Fired`:
//!
//! - every commit compares the handle's node with the one being tracked; the
//!   same node means the observer is still watching or has already fired, so
//!   nothing happens
//! - a different or missing node disconnects the old observer first and, if
//!   a node is present, starts a new lifecycle
//! - the first intersecting entry (10% of the node visible) reports
//!   `show(name)` and disconnects in the same callback, which makes `Fired`
//!   terminal until the node is replaced
//! - a mount-once effect disconnects whatever is left when the component
//!   unmounts

use swc_core::ecma::ast::{BinaryOp, Stmt};

use crate::ast::*;
use crate::imports::{USE_EFFECT, USE_REF};
use crate::model::{ElementHandle, MarkerValue};

/// Fraction of the element that must intersect the viewport.
pub const VISIBILITY_THRESHOLD: f64 = 0.1;

const ELEMENT: &str = "__trackingElement";
const STATE: &str = "__trackingState";
const OBSERVER: &str = "__trackingObserver";
const ENTRIES: &str = "__trackingEntries";
const ENTRY: &str = "__trackingEntry";

/// `if (state) state.observer.disconnect();`
fn disconnect_previous() -> Stmt {
    if_stmt(
        ident_expr(STATE),
        vec![expr_stmt(method_call(
            member(ident_expr(STATE), "observer"),
            "disconnect",
            vec![],
        ))],
    )
}

fn reset_state(state_holder: &str) -> Stmt {
    expr_stmt(assign_member(ident_expr(state_holder), "current", null()))
}

fn observer_callback(value: &MarkerValue, runtime_global: &str) -> swc_core::ecma::ast::Expr {
    // entries.some((entry) => entry.isIntersecting)
    let intersecting = method_call(
        ident_expr(ENTRIES),
        "some",
        vec![arrow_expr(
            vec![binding(ENTRY)],
            member(ident_expr(ENTRY), "isIntersecting"),
        )],
    );
    arrow(
        vec![binding(ENTRIES)],
        vec![if_stmt(
            intersecting,
            vec![
                guarded_runtime_call(runtime_global, "show", value.to_expr()),
                expr_stmt(method_call(ident_expr(OBSERVER), "disconnect", vec![])),
            ],
        )],
    )
}

pub fn synthesize(handle: &ElementHandle, value: &MarkerValue, runtime_global: &str) -> Vec<Stmt> {
    let state_holder = handle.visibility_state();

    let holder_decl = const_decl(&state_holder, call(ident_expr(USE_REF), vec![null()]));

    let same_element = bin(
        BinaryOp::LogicalAnd,
        ident_expr(STATE),
        bin(
            BinaryOp::EqEqEq,
            member(ident_expr(STATE), "element"),
            ident_expr(ELEMENT),
        ),
    );
    let cannot_observe = bin(
        BinaryOp::LogicalOr,
        not(ident_expr(ELEMENT)),
        typeof_is(ident_expr("IntersectionObserver"), "undefined"),
    );

    let observe_effect = expr_stmt(call(
        ident_expr(USE_EFFECT),
        vec![arrow(
            vec![],
            vec![
                const_decl(ELEMENT, member(ident_expr(&handle.name()), "current")),
                const_decl(STATE, member(ident_expr(&state_holder), "current")),
                if_stmt(same_element, vec![return_stmt(None)]),
                disconnect_previous(),
                reset_state(&state_holder),
                if_stmt(cannot_observe, vec![return_stmt(None)]),
                const_decl(
                    OBSERVER,
                    new_expr(
                        "IntersectionObserver",
                        vec![
                            observer_callback(value, runtime_global),
                            object(vec![("threshold", num(VISIBILITY_THRESHOLD))]),
                        ],
                    ),
                ),
                expr_stmt(assign_member(
                    ident_expr(&state_holder),
                    "current",
                    object(vec![
                        ("element", ident_expr(ELEMENT)),
                        ("observer", ident_expr(OBSERVER)),
                    ]),
                )),
                expr_stmt(method_call(
                    ident_expr(OBSERVER),
                    "observe",
                    vec![ident_expr(ELEMENT)],
                )),
            ],
        )],
    ));

    let unmount_effect = expr_stmt(call(
        ident_expr(USE_EFFECT),
        vec![
            arrow_expr(
                vec![],
                arrow(
                    vec![],
                    vec![
                        const_decl(STATE, member(ident_expr(&state_holder), "current")),
                        disconnect_previous(),
                        reset_state(&state_holder),
                    ],
                ),
            ),
            array(vec![]),
        ],
    ));

    vec![holder_decl, observe_effect, unmount_effect]
}
