//! The abstract syntax tree shape consumed by the compiler.
//!
//! Parsing is not this crate's concern: a front end builds these trees and hands them to
//! [`Compiler::process`](crate::compiler::Compiler::process), which only ever reads them.
//! All of the enums here are closed and are matched exhaustively by the lowering passes,
//! so adding a variant is a compile error everywhere it is not handled.

use compact_str::CompactString;

#[cfg(feature = "serde")]
use serde::{Serialize, Deserialize};

/// A source location (1-based line and column) attached to every statement and expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Loc {
    pub line: usize,
    pub col: usize,
}
impl Loc {
    pub fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }
}

/// A named unit of dialogue content, analogous to a function in a conventional language.
/// Node names are the compiler's symbol names: jumps and options refer to nodes by name.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: CompactString,
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub loc: Loc,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    /// A block of dialogue content. Lines inside it flow as literal text until a control
    /// statement interrupts them, which splits the block into resumable segments.
    Dialogue { body: Vec<Stmt> },
    /// One line of dialogue, optionally attributed to a speaker.
    Line { speaker: Option<CompactString>, text: String },
    /// One entry of an option menu, targeting another node by name.
    Option { text: String, target: CompactString },
    /// An unconditional transfer to another node by name.
    Jump { target: CompactString },
    /// Evaluate `value` and store the result in a variable.
    Assign { var: CompactString, value: Expr },
    /// A two-armed conditional over nested statements. `otherwise` may be empty.
    If { condition: Expr, then: Vec<Stmt>, otherwise: Vec<Stmt> },
    /// A bare embedded expression evaluated for its side effects (e.g. a command function).
    Evaluate { expr: Expr },
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub loc: Loc,
}

/// A literal value appearing in an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Number(f64),
    String(String),
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Value(Value),
    Variable { var: CompactString },
    Call { function: CompactString, args: Vec<Expr> },

    Not { value: Box<Expr> },

    And { left: Box<Expr>, right: Box<Expr> },
    Or { left: Box<Expr>, right: Box<Expr> },
    Xor { left: Box<Expr>, right: Box<Expr> },

    Eq { left: Box<Expr>, right: Box<Expr> },
    Neq { left: Box<Expr>, right: Box<Expr> },
    Greater { left: Box<Expr>, right: Box<Expr> },
    GreaterEq { left: Box<Expr>, right: Box<Expr> },
    Less { left: Box<Expr>, right: Box<Expr> },
    LessEq { left: Box<Expr>, right: Box<Expr> },

    Add { left: Box<Expr>, right: Box<Expr> },
    Sub { left: Box<Expr>, right: Box<Expr> },
    Mul { left: Box<Expr>, right: Box<Expr> },
    Div { left: Box<Expr>, right: Box<Expr> },
    Mod { left: Box<Expr>, right: Box<Expr> },
}
