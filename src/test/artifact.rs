use super::*;
use crate::bytecode::{Instruction, Program};
use crate::compiler::{Compiler, CompilerConfig};

/// A script exercising every instruction kind, including a stub from an undefined reference.
fn full_script() -> Compiler {
    let mut compiler = Compiler::new(CompilerConfig { error_if_node_undefined: false, ..Default::default() });
    let processed = compiler.process(&[
        node("start", vec![
            assign("greeted", expr(ExprKind::Value(Value::Bool(true)))),
            assign("name", expr(ExprKind::Value(Value::String("traveler".into())))),
            assign("gold", expr(ExprKind::Xor { left: Box::new(var("a")), right: Box::new(var("b")) })),
            assign("ok", expr(ExprKind::And {
                left: Box::new(expr(ExprKind::GreaterEq { left: Box::new(var("gold")), right: Box::new(num(10.0)) })),
                right: Box::new(expr(ExprKind::Less { left: Box::new(var("gold")), right: Box::new(num(100.0)) })),
            })),
            stmt(StmtKind::Evaluate { expr: expr(ExprKind::Call { function: "visited".into(), args: vec![num(2.5)] }) }),
            stmt(StmtKind::Dialogue { body: vec![
                stmt(StmtKind::Line { speaker: Some("Ava".into()), text: "welcome".into() }),
                stmt(StmtKind::Option { text: "stay".into(), target: "camp".into() }),
                stmt(StmtKind::Option { text: "leave".into(), target: "ghost".into() }),
            ] }),
        ]),
        node("camp", vec![
            stmt(StmtKind::If {
                condition: expr(ExprKind::Not { value: Box::new(var("greeted")) }),
                then: vec![line("first time here")],
                otherwise: vec![jump("start")],
            }),
        ]),
    ]);
    assert!(!processed);
    compiler.assemble().unwrap();
    compiler
}

#[test]
fn serialized_instructions_round_trip() {
    let compiler = full_script();
    let program = compiler.program().unwrap();
    let bytes = program.to_bytes();

    let decoded = Program::decode_instructions(&bytes).unwrap();
    assert_eq!(decoded.len(), program.instructions().len());
    let ins: Vec<Instruction> = decoded.into_iter().map(|x| x.1).collect();
    assert_eq!(&ins[..], program.instructions());

    // byte addresses are strictly increasing from zero
    let addrs: Vec<usize> = Program::decode_instructions(&bytes).unwrap().into_iter().map(|x| x.0).collect();
    assert_eq!(addrs[0], 0);
    assert!(addrs.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn empty_program_round_trips() {
    let mut compiler = Compiler::default();
    assert!(!compiler.process(&[]));
    compiler.assemble().unwrap();
    let bytes = compiler.program().unwrap().to_bytes();
    assert_eq!(Program::decode_instructions(&bytes).unwrap(), vec![]);
}

#[test]
fn decode_rejects_foreign_bytes() {
    assert!(Program::decode_instructions(&[]).is_none());
    assert!(Program::decode_instructions(&[0x00; 8]).is_none());

    let mut bytes = full_script().program().unwrap().to_bytes();
    bytes[3] ^= 0xff; // corrupt the fingerprint
    assert!(Program::decode_instructions(&bytes).is_none());
}

#[test]
fn decode_rejects_corrupt_code_section() {
    let compiler = compile(&[node("test", vec![line("hi")])]);
    let good = compiler.program().unwrap().to_bytes();
    assert!(Program::decode_instructions(&good).is_some());

    // the layout here ends with the 2-byte "hi" data section and its 1-byte length,
    // preceded by the 3-byte encoded RunLine
    let code_start = good.len() - 2 - 1 - 3;
    assert_eq!(good[code_start], 15); // RunLine opcode byte
    let mut bytes = good.clone();
    bytes[code_start] = 0xff;
    assert_eq!(Program::decode_instructions(&bytes), None);

    // a fingerprint-valid buffer must decode cleanly or be rejected, never tear:
    // clobber every byte past the fingerprint in turn, and truncate at every length
    for i in 16..good.len() {
        let mut bytes = good.clone();
        bytes[i] = 0xff;
        let _ = Program::decode_instructions(&bytes);
    }
    for len in 0..good.len() {
        assert_eq!(Program::decode_instructions(&good[..len]), None);
    }
}

#[test]
fn serialization_is_deterministic() {
    let a = full_script();
    let b = full_script();
    assert_eq!(a.program().unwrap().to_bytes(), b.program().unwrap().to_bytes());
}

#[test]
fn string_operands_are_pooled() {
    let repeated = compile(&[
        node("a", vec![line("an identical line of text")]),
        node("b", vec![line("an identical line of text")]),
    ]);
    let distinct = compile(&[
        node("a", vec![line("one line of spoken text #1")]),
        node("b", vec![line("one line of spoken text #2")]),
    ]);
    assert!(repeated.program().unwrap().total_size() < distinct.program().unwrap().total_size());
}

#[test]
fn total_size_matches_serialized_length() {
    let compiler = full_script();
    let program = compiler.program().unwrap();
    assert_eq!(program.total_size(), program.to_bytes().len());
}

#[test]
fn dump_code_lists_every_instruction() {
    let compiler = full_script();
    let mut out = vec![];
    compiler.program().unwrap().dump_code(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with("00000000"));
    assert!(text.contains("RunLine"));
    assert!(text.contains("ShowOptions"));
    assert!(text.contains("Abort"));
    assert!(text.lines().count() >= compiler.program().unwrap().instructions().len());
}

#[test]
fn dump_data_shows_pooled_strings() {
    let compiler = compile(&[node("test", vec![line("hi")])]);
    let mut out = vec![];
    compiler.program().unwrap().dump_data(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with("00000000"));
    assert!(text.contains("hi"));
}
