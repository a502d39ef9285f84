//! A compiler from parsed Skein dialogue scripts to a linked bytecode program.
//!
//! A script is a set of named nodes, each holding dialogue lines, option menus, jumps to
//! other nodes, variable assignments, conditionals, and embedded expressions. The parser
//! is a separate collaborator: it produces the [`ast`] trees this crate consumes.
//!
//! Compilation is incremental: [`compiler::Compiler::process`] lowers one batch of nodes
//! at a time into accumulated state, and [`compiler::Compiler::assemble`] links the whole
//! set into an immutable [`bytecode::Program`], which can be serialized with
//! [`compiler::Compiler::write_bytecode`] or inspected with the hex dump utilities.
//! Input problems accumulate as diagnostics rather than aborting, so a single run reports
//! as much as possible.
//!
//! ```
//! use skein_compiler::ast::{Loc, Node, Stmt, StmtKind};
//! use skein_compiler::compiler::Compiler;
//!
//! let node = Node {
//!     name: "start".into(),
//!     stmts: vec![
//!         Stmt { kind: StmtKind::Line { speaker: None, text: "hello".into() }, loc: Loc::new(1, 1) },
//!     ],
//! };
//!
//! let mut compiler = Compiler::default();
//! assert!(!compiler.process(&[node])); // no errors
//! compiler.assemble().unwrap();
//! assert_eq!(compiler.program().unwrap().instructions().len(), 1);
//! ```
//!
//! # Features
//!
//! | name | description |
//! | ---- | ----------- |
//! | `serde` | Adds serialization support to the public data types |

#![forbid(unsafe_code)]

pub mod ast;
pub mod bytecode;
pub mod compiler;
pub mod vecmap;

#[cfg(test)] mod test;

/// Format fingerprint embedded at the head of every serialized program.
/// Changes whenever the wire format changes incompatibly.
pub(crate) const FINGERPRINT: u128 = 0x3f8a_1d64_9c02_b7e5_5a31_c8f0_664d_2b19;
