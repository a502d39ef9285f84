use super::*;
use crate::ast;
use crate::bytecode::{BinaryOp, Instruction, Target};

fn lower(e: Expr) -> Vec<Instruction> {
    let compiler = compile(&[node("test", vec![stmt(StmtKind::Evaluate { expr: e })])]);
    compiler.program().unwrap().instructions().to_vec()
}

#[test]
fn binary_operators_lower_to_their_own_opcodes() {
    type Make = fn(Box<Expr>, Box<Expr>) -> ExprKind;
    let cases: &[(Make, BinaryOp)] = &[
        (|left, right| ExprKind::And { left, right }, BinaryOp::And),
        (|left, right| ExprKind::Or { left, right }, BinaryOp::Or),
        (|left, right| ExprKind::Xor { left, right }, BinaryOp::Xor),
        (|left, right| ExprKind::Eq { left, right }, BinaryOp::Equal),
        (|left, right| ExprKind::Greater { left, right }, BinaryOp::Greater),
        (|left, right| ExprKind::Less { left, right }, BinaryOp::Less),
        (|left, right| ExprKind::Add { left, right }, BinaryOp::Add),
        (|left, right| ExprKind::Sub { left, right }, BinaryOp::Sub),
        (|left, right| ExprKind::Mul { left, right }, BinaryOp::Mul),
        (|left, right| ExprKind::Div { left, right }, BinaryOp::Div),
        (|left, right| ExprKind::Mod { left, right }, BinaryOp::Mod),
    ];
    for &(make, op) in cases {
        let ins = lower(expr(make(Box::new(var("a")), Box::new(var("b")))));
        assert_eq!(ins, vec![
            Instruction::PushVariable { var: "a".into() },
            Instruction::PushVariable { var: "b".into() },
            Instruction::BinaryOp { op, lhs: 1, rhs: 0 },
            Instruction::ClearArgs { start: 1, count: 2 },
            Instruction::ClearArgs { start: 0, count: 1 },
        ], "operator {op:?}");
    }
}

#[test]
fn greater_eq_lowers_to_strict_or_equal() {
    let ins = lower(expr(ExprKind::GreaterEq { left: Box::new(var("a")), right: Box::new(var("b")) }));
    assert_eq!(ins, vec![
        Instruction::PushVariable { var: "a".into() },
        Instruction::PushVariable { var: "b".into() },
        Instruction::BinaryOp { op: BinaryOp::Greater, lhs: 1, rhs: 0 },
        Instruction::BinaryOp { op: BinaryOp::Equal, lhs: 2, rhs: 1 },
        Instruction::BinaryOp { op: BinaryOp::Or, lhs: 1, rhs: 0 },
        Instruction::ClearArgs { start: 1, count: 4 },
        Instruction::ClearArgs { start: 0, count: 1 },
    ]);
}

#[test]
fn less_eq_lowers_to_strict_or_equal() {
    let ins = lower(expr(ExprKind::LessEq { left: Box::new(var("a")), right: Box::new(var("b")) }));
    assert_eq!(ins, vec![
        Instruction::PushVariable { var: "a".into() },
        Instruction::PushVariable { var: "b".into() },
        Instruction::BinaryOp { op: BinaryOp::Less, lhs: 1, rhs: 0 },
        Instruction::BinaryOp { op: BinaryOp::Equal, lhs: 2, rhs: 1 },
        Instruction::BinaryOp { op: BinaryOp::Or, lhs: 1, rhs: 0 },
        Instruction::ClearArgs { start: 1, count: 4 },
        Instruction::ClearArgs { start: 0, count: 1 },
    ]);
}

#[test]
fn not_equal_lowers_through_equal_and_not() {
    let ins = lower(expr(ExprKind::Neq { left: Box::new(var("a")), right: Box::new(var("b")) }));
    assert_eq!(ins, vec![
        Instruction::PushVariable { var: "a".into() },
        Instruction::PushVariable { var: "b".into() },
        Instruction::BinaryOp { op: BinaryOp::Equal, lhs: 1, rhs: 0 },
        Instruction::ClearArgs { start: 1, count: 2 },
        Instruction::Not { slot: 0 },
        Instruction::ClearArgs { start: 1, count: 1 },
        Instruction::ClearArgs { start: 0, count: 1 },
    ]);
}

#[test]
fn logical_not() {
    let ins = lower(expr(ExprKind::Not { value: Box::new(var("a")) }));
    assert_eq!(ins, vec![
        Instruction::PushVariable { var: "a".into() },
        Instruction::Not { slot: 0 },
        Instruction::ClearArgs { start: 1, count: 1 },
        Instruction::ClearArgs { start: 0, count: 1 },
    ]);
}

#[test]
fn function_call_clears_argument_slots() {
    let ins = lower(expr(ExprKind::Call { function: "visited".into(), args: vec![num(1.0), num(2.0), num(3.0)] }));
    assert_eq!(ins, vec![
        Instruction::PushNumber { value: 1.0 },
        Instruction::PushNumber { value: 2.0 },
        Instruction::PushNumber { value: 3.0 },
        Instruction::CallFunction { function: "visited".into(), args: 3 },
        Instruction::ClearArgs { start: 1, count: 3 },
        Instruction::ClearArgs { start: 0, count: 1 },
    ]);
}

#[test]
fn zero_arg_function_call() {
    // the empty clear is still emitted, keeping call sites uniform
    let ins = lower(expr(ExprKind::Call { function: "rand".into(), args: vec![] }));
    assert_eq!(ins, vec![
        Instruction::CallFunction { function: "rand".into(), args: 0 },
        Instruction::ClearArgs { start: 1, count: 0 },
        Instruction::ClearArgs { start: 0, count: 1 },
    ]);
}

#[test]
fn nested_expressions_shift_operand_slots() {
    // (a + b) * c
    let sum = expr(ExprKind::Add { left: Box::new(var("a")), right: Box::new(var("b")) });
    let ins = lower(expr(ExprKind::Mul { left: Box::new(sum), right: Box::new(var("c")) }));
    assert_eq!(ins, vec![
        Instruction::PushVariable { var: "a".into() },
        Instruction::PushVariable { var: "b".into() },
        Instruction::BinaryOp { op: BinaryOp::Add, lhs: 1, rhs: 0 },
        Instruction::ClearArgs { start: 1, count: 2 },
        Instruction::PushVariable { var: "c".into() },
        Instruction::BinaryOp { op: BinaryOp::Mul, lhs: 1, rhs: 0 },
        Instruction::ClearArgs { start: 1, count: 2 },
        Instruction::ClearArgs { start: 0, count: 1 },
    ]);
}

#[test]
fn assignment_consumes_slot_zero() {
    let compiler = compile(&[node("test", vec![assign("x", num(5.0))])]);
    assert_eq!(compiler.program().unwrap().instructions(), &[
        Instruction::PushNumber { value: 5.0 },
        Instruction::StoreVariable { var: "x".into() },
        Instruction::ClearArgs { start: 0, count: 1 },
    ]);
}

#[test]
fn speaker_prefixes_the_line() {
    let compiler = compile(&[node("test", vec![
        stmt(StmtKind::Line { speaker: Some("Ava".into()), text: "hi there".into() }),
        line("anonymous"),
    ])]);
    assert_eq!(compiler.program().unwrap().instructions(), &[
        Instruction::RunLine { text: "Ava: hi there".into() },
        Instruction::RunLine { text: "anonymous".into() },
    ]);
}

#[test]
fn option_run_forms_one_menu() {
    let compiler = compile(&[
        node("test", vec![
            stmt(StmtKind::Option { text: "left".into(), target: "a".into() }),
            stmt(StmtKind::Option { text: "right".into(), target: "b".into() }),
            line("unreachable remark"),
        ]),
        node("a", vec![line("went left")]),
        node("b", vec![line("went right")]),
    ]);
    assert_eq!(compiler.program().unwrap().instructions(), &[
        Instruction::AddOption { text: "left".into(), target: Target::Offset(4) },
        Instruction::AddOption { text: "right".into(), target: Target::Offset(5) },
        Instruction::ShowOptions,
        Instruction::RunLine { text: "unreachable remark".into() },
        Instruction::RunLine { text: "went left".into() },
        Instruction::RunLine { text: "went right".into() },
    ]);
}

#[test]
fn if_else_links_forward_labels() {
    let compiler = compile(&[node("test", vec![
        stmt(StmtKind::If {
            condition: var("flag"),
            then: vec![assign("a", num(1.0))],
            otherwise: vec![assign("b", num(2.0))],
        }),
    ])]);
    // both paths clear the condition slot: the fallthrough right after the branch,
    // the taken path at the head of the else region
    assert_eq!(compiler.program().unwrap().instructions(), &[
        Instruction::PushVariable { var: "flag".into() },
        Instruction::JumpIfFalse { slot: 0, target: Target::Offset(7) },
        Instruction::ClearArgs { start: 0, count: 1 },
        Instruction::PushNumber { value: 1.0 },
        Instruction::StoreVariable { var: "a".into() },
        Instruction::ClearArgs { start: 0, count: 1 },
        Instruction::Jump { target: Target::Offset(11) },
        Instruction::ClearArgs { start: 0, count: 1 },
        Instruction::PushNumber { value: 2.0 },
        Instruction::StoreVariable { var: "b".into() },
        Instruction::ClearArgs { start: 0, count: 1 },
    ]);
}

#[test]
fn if_without_else_falls_through_to_node_end() {
    let compiler = compile(&[node("test", vec![
        stmt(StmtKind::If {
            condition: var("flag"),
            then: vec![assign("a", num(1.0))],
            otherwise: vec![],
        }),
    ])]);
    // the taken path still clears the condition slot before falling through to the node end
    assert_eq!(compiler.program().unwrap().instructions(), &[
        Instruction::PushVariable { var: "flag".into() },
        Instruction::JumpIfFalse { slot: 0, target: Target::Offset(7) },
        Instruction::ClearArgs { start: 0, count: 1 },
        Instruction::PushNumber { value: 1.0 },
        Instruction::StoreVariable { var: "a".into() },
        Instruction::ClearArgs { start: 0, count: 1 },
        Instruction::Jump { target: Target::Offset(8) },
        Instruction::ClearArgs { start: 0, count: 1 },
    ]);
}

#[test]
fn dialogue_block_splits_at_control_commands() {
    let compiler = compile(&[
        node("test", vec![
            assign("x", num(1.0)),
            stmt(StmtKind::Dialogue { body: vec![
                line("before"),
                jump("next"),
                line("after"),
            ] }),
        ]),
        node("next", vec![line("elsewhere")]),
    ]);
    // logic commands come first, then the dialogue segments in order
    assert_eq!(compiler.program().unwrap().instructions(), &[
        Instruction::PushNumber { value: 1.0 },
        Instruction::StoreVariable { var: "x".into() },
        Instruction::ClearArgs { start: 0, count: 1 },
        Instruction::RunLine { text: "before".into() },
        Instruction::Jump { target: Target::Offset(6) },
        Instruction::RunLine { text: "after".into() },
        Instruction::RunLine { text: "elsewhere".into() },
    ]);
}

#[test]
fn evaluate_discards_the_result() {
    let ins = lower(ast::Expr { kind: ExprKind::Call { function: "camera_shake".into(), args: vec![num(0.5)] }, loc: Loc::new(3, 1) });
    assert_eq!(ins, vec![
        Instruction::PushNumber { value: 0.5 },
        Instruction::CallFunction { function: "camera_shake".into(), args: 1 },
        Instruction::ClearArgs { start: 1, count: 1 },
        Instruction::ClearArgs { start: 0, count: 1 },
    ]);
}
