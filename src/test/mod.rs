use crate::ast::*;
use crate::compiler::Compiler;

mod lowering;
mod artifact;

fn stmt(kind: StmtKind) -> Stmt {
    Stmt { kind, loc: Loc::default() }
}
fn stmt_at(kind: StmtKind, line: usize) -> Stmt {
    Stmt { kind, loc: Loc::new(line, 1) }
}
fn expr(kind: ExprKind) -> Expr {
    Expr { kind, loc: Loc::default() }
}
fn num(value: f64) -> Expr {
    expr(ExprKind::Value(Value::Number(value)))
}
fn var(name: &str) -> Expr {
    expr(ExprKind::Variable { var: name.into() })
}
fn node(name: &str, stmts: Vec<Stmt>) -> Node {
    Node { name: name.into(), stmts }
}
fn line(text: &str) -> Stmt {
    stmt(StmtKind::Line { speaker: None, text: text.into() })
}
fn jump(target: &str) -> Stmt {
    stmt(StmtKind::Jump { target: target.into() })
}
fn assign(var: &str, value: Expr) -> Stmt {
    stmt(StmtKind::Assign { var: var.into(), value })
}

/// Compiles and assembles a batch of nodes, asserting that nothing went wrong.
fn compile(nodes: &[Node]) -> Compiler {
    let mut compiler = Compiler::default();
    assert!(!compiler.process(nodes), "unexpected errors: {:?}", compiler.errors());
    compiler.assemble().unwrap();
    compiler
}
