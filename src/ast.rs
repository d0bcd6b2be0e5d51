//! Small constructors for the nodes the synthesizers emit. Every generated
//! node carries `DUMMY_SP` and an empty syntax context.

use swc_core::{
    common::{SyntaxContext, DUMMY_SP},
    ecma::ast::*,
};

pub(crate) fn ident(sym: &str) -> Ident {
    Ident::new(sym.into(), DUMMY_SP, SyntaxContext::empty())
}

pub(crate) fn ident_expr(sym: &str) -> Expr {
    Expr::Ident(ident(sym))
}

pub(crate) fn binding(sym: &str) -> Pat {
    Pat::Ident(BindingIdent {
        id: ident(sym),
        type_ann: None,
    })
}

pub(crate) fn str_lit(value: &str) -> Expr {
    Expr::Lit(Lit::Str(Str {
        span: DUMMY_SP,
        value: value.into(),
        raw: None,
    }))
}

pub(crate) fn num(value: f64) -> Expr {
    Expr::Lit(Lit::Num(Number {
        span: DUMMY_SP,
        value,
        raw: None,
    }))
}

pub(crate) fn null() -> Expr {
    Expr::Lit(Lit::Null(Null { span: DUMMY_SP }))
}

pub(crate) fn member(obj: Expr, prop: &str) -> Expr {
    Expr::Member(member_expr(obj, prop))
}

fn member_expr(obj: Expr, prop: &str) -> MemberExpr {
    MemberExpr {
        span: DUMMY_SP,
        obj: Box::new(obj),
        prop: MemberProp::Ident(IdentName::new(prop.into(), DUMMY_SP)),
    }
}

fn args(args: Vec<Expr>) -> Vec<ExprOrSpread> {
    args.into_iter()
        .map(|expr| ExprOrSpread {
            spread: None,
            expr: Box::new(expr),
        })
        .collect()
}

pub(crate) fn call(callee: Expr, arguments: Vec<Expr>) -> Expr {
    Expr::Call(CallExpr {
        span: DUMMY_SP,
        callee: Callee::Expr(Box::new(callee)),
        args: args(arguments),
        type_args: None,
        ctxt: SyntaxContext::empty(),
    })
}

/// `obj.method(args..)`
pub(crate) fn method_call(obj: Expr, method: &str, arguments: Vec<Expr>) -> Expr {
    call(member(obj, method), arguments)
}

pub(crate) fn new_expr(callee: &str, arguments: Vec<Expr>) -> Expr {
    Expr::New(NewExpr {
        span: DUMMY_SP,
        callee: Box::new(ident_expr(callee)),
        args: Some(args(arguments)),
        type_args: None,
        ctxt: SyntaxContext::empty(),
    })
}

pub(crate) fn array(elems: Vec<Expr>) -> Expr {
    Expr::Array(ArrayLit {
        span: DUMMY_SP,
        elems: args(elems).into_iter().map(Some).collect(),
    })
}

pub(crate) fn object(props: Vec<(&str, Expr)>) -> Expr {
    Expr::Object(ObjectLit {
        span: DUMMY_SP,
        props: props
            .into_iter()
            .map(|(key, value)| {
                PropOrSpread::Prop(Box::new(Prop::KeyValue(KeyValueProp {
                    key: PropName::Ident(IdentName::new(key.into(), DUMMY_SP)),
                    value: Box::new(value),
                })))
            })
            .collect(),
    })
}

pub(crate) fn not(arg: Expr) -> Expr {
    Expr::Unary(UnaryExpr {
        span: DUMMY_SP,
        op: UnaryOp::Bang,
        arg: Box::new(arg),
    })
}

pub(crate) fn bin(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Bin(BinExpr {
        span: DUMMY_SP,
        op,
        left: Box::new(left),
        right: Box::new(right),
    })
}

/// `typeof name === "kind"`
pub(crate) fn typeof_is(name: Expr, kind: &str) -> Expr {
    bin(
        BinaryOp::EqEqEq,
        Expr::Unary(UnaryExpr {
            span: DUMMY_SP,
            op: UnaryOp::TypeOf,
            arg: Box::new(name),
        }),
        str_lit(kind),
    )
}

/// `obj.prop = value`
pub(crate) fn assign_member(obj: Expr, prop: &str, value: Expr) -> Expr {
    Expr::Assign(AssignExpr {
        span: DUMMY_SP,
        op: AssignOp::Assign,
        left: AssignTarget::Simple(SimpleAssignTarget::Member(member_expr(obj, prop))),
        right: Box::new(value),
    })
}

pub(crate) fn block(stmts: Vec<Stmt>) -> BlockStmt {
    BlockStmt {
        span: DUMMY_SP,
        stmts,
        ctxt: SyntaxContext::empty(),
    }
}

fn arrow_with(params: Vec<Pat>, body: BlockStmtOrExpr) -> Expr {
    Expr::Arrow(ArrowExpr {
        span: DUMMY_SP,
        params,
        body: Box::new(body),
        is_async: false,
        is_generator: false,
        type_params: None,
        return_type: None,
        ctxt: SyntaxContext::empty(),
    })
}

/// `(params) => { stmts }`
pub(crate) fn arrow(params: Vec<Pat>, stmts: Vec<Stmt>) -> Expr {
    arrow_with(params, BlockStmtOrExpr::BlockStmt(block(stmts)))
}

/// `(params) => expr`
pub(crate) fn arrow_expr(params: Vec<Pat>, body: Expr) -> Expr {
    arrow_with(params, BlockStmtOrExpr::Expr(Box::new(body)))
}

pub(crate) fn expr_stmt(expr: Expr) -> Stmt {
    Stmt::Expr(ExprStmt {
        span: DUMMY_SP,
        expr: Box::new(expr),
    })
}

pub(crate) fn return_stmt(arg: Option<Expr>) -> Stmt {
    Stmt::Return(ReturnStmt {
        span: DUMMY_SP,
        arg: arg.map(Box::new),
    })
}

/// `if (test) { cons }`
pub(crate) fn if_stmt(test: Expr, cons: Vec<Stmt>) -> Stmt {
    Stmt::If(IfStmt {
        span: DUMMY_SP,
        test: Box::new(test),
        cons: Box::new(Stmt::Block(block(cons))),
        alt: None,
    })
}

/// `if (test) { cons } else { alt }`
pub(crate) fn if_else_stmt(test: Expr, cons: Vec<Stmt>, alt: Stmt) -> Stmt {
    Stmt::If(IfStmt {
        span: DUMMY_SP,
        test: Box::new(test),
        cons: Box::new(Stmt::Block(block(cons))),
        alt: Some(Box::new(alt)),
    })
}

pub(crate) fn const_decl(name: &str, init: Expr) -> Stmt {
    Stmt::Decl(Decl::Var(Box::new(VarDecl {
        span: DUMMY_SP,
        kind: VarDeclKind::Const,
        declare: false,
        decls: vec![VarDeclarator {
            span: DUMMY_SP,
            name: binding(name),
            init: Some(Box::new(init)),
            definite: false,
        }],
        ctxt: SyntaxContext::empty(),
    })))
}

/// `if (window.<global>) { window.<global>.<method>(name); }`
///
/// The runtime may have failed to load; the generated code must never throw
/// because of that.
pub(crate) fn guarded_runtime_call(global: &str, method: &str, name: Expr) -> Stmt {
    let runtime = || member(ident_expr("window"), global);
    if_stmt(
        runtime(),
        vec![expr_stmt(method_call(runtime(), method, vec![name]))],
    )
}

/// `name={expr}`
pub(crate) fn jsx_expr_attr(name: &str, expr: Expr) -> JSXAttrOrSpread {
    JSXAttrOrSpread::JSXAttr(JSXAttr {
        span: DUMMY_SP,
        name: JSXAttrName::Ident(IdentName::new(name.into(), DUMMY_SP)),
        value: Some(JSXAttrValue::JSXExprContainer(JSXExprContainer {
            span: DUMMY_SP,
            expr: JSXExpr::Expr(Box::new(expr)),
        })),
    })
}

/// Plain identifier name of a JSX attribute; `None` for namespaced names.
pub(crate) fn attr_name(attr: &JSXAttr) -> Option<&str> {
    match &attr.name {
        JSXAttrName::Ident(ident) => Some(ident.sym.as_ref()),
        JSXAttrName::JSXNamespacedName(_) => None,
    }
}

/// Source text of an element's tag: `div`, `Foo.Bar`, `svg:rect`.
pub(crate) fn element_name(name: &JSXElementName) -> String {
    fn object_name(obj: &JSXObject) -> String {
        match obj {
            JSXObject::Ident(ident) => ident.sym.to_string(),
            JSXObject::JSXMemberExpr(inner) => {
                format!("{}.{}", object_name(&inner.obj), inner.prop.sym)
            }
        }
    }
    match name {
        JSXElementName::Ident(ident) => ident.sym.to_string(),
        JSXElementName::JSXMemberExpr(m) => format!("{}.{}", object_name(&m.obj), m.prop.sym),
        JSXElementName::JSXNamespacedName(n) => format!("{}:{}", n.ns.sym, n.name.sym),
    }
}
