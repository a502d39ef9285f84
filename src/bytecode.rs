//! The instruction set produced by the compiler and the finished [`Program`] artifact.
//!
//! Instructions are generated by the compilation pipeline in [`crate::compiler`] and remain
//! symbolic (node names, forward labels) until the linking pass rewrites every [`Target`]
//! to an absolute instruction offset. Only fully linked instructions can be serialized.

use std::io::{self, Write};

#[cfg(feature = "serde")]
use serde::{Serialize, Deserialize};

use bin_pool::BinPool;
use compact_str::CompactString;
use monostate::MustBeU128;
use num_traits::FromPrimitive;
use superslice::Ext;

use crate::ast::Loc;
use crate::FINGERPRINT;

/// Number of bytes to display on each line of a hex dump
const BYTES_PER_LINE: usize = 10;

/// A binary operator over two stack slots.
///
/// Every source operator lowers to its own discriminant; none of them alias another.
#[derive(Clone, Copy, Debug, PartialEq, Eq, num_derive::FromPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum BinaryOp {
    And, Or, Xor,
    Equal, Greater, Less,
    Add, Sub, Mul, Div, Mod,
}

/// The operand of a control-transfer instruction.
///
/// Lowering emits symbolic targets; the linking pass rewrites them in place to
/// [`Target::Offset`] values, which index into the concatenated instruction stream.
/// Linking a target that is already an offset is a no-op, so linking is idempotent.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Target {
    /// A node referenced by name, resolved to the node's entry offset.
    Node(CompactString),
    /// A forward label within the instruction's own node.
    Label(usize),
    /// A resolved absolute instruction offset.
    Offset(usize),
}
impl Target {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Target::Offset(_))
    }
}

/// One instruction of the dialogue bytecode.
///
/// Expression instructions follow a stack-slot convention: slot 0 is the most recently
/// pushed value, slot 1 the one before it, and so on. An instruction that produces a value
/// pushes it, which shifts every existing slot up by one.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Instruction {
    /// Pushes 1 bool value onto the value stack.
    PushBool { value: bool },
    /// Pushes 1 number value onto the value stack.
    PushNumber { value: f64 },
    /// Pushes 1 string value onto the value stack.
    PushString { value: String },
    /// Pushes 1 value onto the value stack, as looked up from the runtime's variable storage.
    PushVariable { var: CompactString },

    /// Reads slots `lhs` and `rhs` and pushes the value `op(lhs, rhs)` onto the value stack.
    /// The consumed slots are not removed; a following [`Instruction::ClearArgs`] marks them dead.
    BinaryOp { op: BinaryOp, lhs: usize, rhs: usize },
    /// Reads slot `slot` and pushes its boolean negation onto the value stack.
    Not { slot: usize },
    /// Marks `count` slots beginning at `start` as no longer needed and free for reuse.
    /// This carries no runtime effect beyond signaling slot lifetime to the interpreter.
    ClearArgs { start: usize, count: usize },
    /// Calls the named host function with `args` arguments taken from slots `args-1..=0`
    /// (pushed left to right) and pushes the return value onto the value stack.
    /// The encoded form enumerates the argument slot indices after the count.
    CallFunction { function: CompactString, args: usize },

    /// Reads slot 0 and stores it in the named variable. Does not push a value.
    StoreVariable { var: CompactString },

    /// Presents one line of dialogue.
    RunLine { text: String },
    /// Adds one entry to the pending option menu, to be presented by [`Instruction::ShowOptions`].
    AddOption { text: String, target: Target },
    /// Presents the accumulated option menu and transfers to the chosen entry's target.
    ShowOptions,

    /// Unconditionally transfers to the given target.
    Jump { target: Target },
    /// Reads slot 0 and transfers to the given target if it is false. Does not push a value.
    JumpIfFalse { slot: usize, target: Target },

    /// Surfaces a runtime error with the given message.
    /// Nodes synthesized for undefined references consist of a single one of these.
    Abort { message: String },
}
impl Instruction {
    /// The control-transfer target of this instruction, if it has one.
    pub fn target(&self) -> Option<&Target> {
        match self {
            Instruction::AddOption { target, .. } | Instruction::Jump { target } | Instruction::JumpIfFalse { target, .. } => Some(target),
            _ => None,
        }
    }
    pub(crate) fn target_mut(&mut self) -> Option<&mut Target> {
        match self {
            Instruction::AddOption { target, .. } | Instruction::Jump { target } | Instruction::JumpIfFalse { target, .. } => Some(target),
            _ => None,
        }
    }
    /// Registers this instruction's string operands in the data pool, in operand order.
    fn intern_strings(&self, pool: &mut BinPool, order: &mut Vec<usize>) {
        match self {
            Instruction::PushString { value } => order.push(pool.add(value.as_bytes())),
            Instruction::PushVariable { var } => order.push(pool.add(var.as_bytes())),
            Instruction::CallFunction { function, .. } => order.push(pool.add(function.as_bytes())),
            Instruction::StoreVariable { var } => order.push(pool.add(var.as_bytes())),
            Instruction::RunLine { text } => order.push(pool.add(text.as_bytes())),
            Instruction::AddOption { text, .. } => order.push(pool.add(text.as_bytes())),
            Instruction::Abort { message } => order.push(pool.add(message.as_bytes())),

            Instruction::PushBool { .. } | Instruction::PushNumber { .. } | Instruction::BinaryOp { .. } |
            Instruction::Not { .. } | Instruction::ClearArgs { .. } | Instruction::ShowOptions |
            Instruction::Jump { .. } | Instruction::JumpIfFalse { .. } => (),
        }
    }
}

// encodes values as a sequence of bytes of form [1: next][7: bits] in little-endian order
fn encode_u64(mut val: u64, out: &mut Vec<u8>) {
    let blocks = ((64 - val.leading_zeros() as usize + 6) / 7).max(1);
    debug_assert!((1..=10).contains(&blocks));
    for _ in 1..blocks {
        out.push((val as u8 & 0x7f) | 0x80);
        val >>= 7;
    }
    debug_assert!(val <= 0x7f);
    out.push(val as u8);
}
fn decode_u64(data: &[u8], start: usize) -> Option<(u64, usize)> {
    let mut aft = start;
    loop {
        let &b = data.get(aft)?;
        aft += 1;
        if b & 0x80 == 0 { break }
    }
    let mut val = 0;
    for &b in data[start..aft].iter().rev() {
        val = (val << 7) | (b & 0x7f) as u64;
    }
    Some((val, aft))
}

#[test]
fn test_binary_u64() {
    let mut buf = vec![];
    let tests = [
        (0,                 [0x00].as_slice()),
        (1,                 [0x01].as_slice()),
        (2,                 [0x02].as_slice()),
        (0x53,              [0x53].as_slice()),
        (0x7f,              [0x7f].as_slice()),
        (0x80,              [0x80, 0x01].as_slice()),
        (0x347462356236574, [0xf4, 0xca, 0x8d, 0xb1, 0xb5, 0xc4, 0xd1, 0xa3, 0x03].as_slice()),
        (u64::MAX >> 1,     [0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x7f].as_slice()),
        (u64::MAX,          [0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01].as_slice()),
    ];
    for (v, expect) in tests {
        for prefix_bytes in 0..8 {
            buf.clear();
            buf.extend(std::iter::once(0x53).cycle().take(prefix_bytes));
            encode_u64(v, &mut buf);
            assert!(buf[..prefix_bytes].iter().all(|&x| x == 0x53));
            assert_eq!(&buf[prefix_bytes..], expect);
            buf.extend(std::iter::once(0xff).cycle().take(8));
            let (back, aft) = decode_u64(&buf, prefix_bytes).unwrap();
            assert_eq!(back, v);
            assert_eq!(aft, prefix_bytes + expect.len());
        }
    }

    assert_eq!(decode_u64(&[], 0), None);
    assert_eq!(decode_u64(&[0x53], 1), None);
    assert_eq!(decode_u64(&[0x80], 0), None);
    assert_eq!(decode_u64(&[0x80, 0x80], 0), None);
}

/// Resolved data-pool offsets for string operands, consumed in the same order
/// the interning walk produced them.
struct DataRefs<'a> {
    offsets: &'a [usize],
    order: std::slice::Iter<'a, usize>,
}
impl DataRefs<'_> {
    fn next_offset(&mut self) -> usize {
        self.offsets[*self.order.next().unwrap()]
    }
}

trait BinaryRead<'a>: Sized {
    /// Reads a value from `code` starting at `start`.
    /// Returns the read value and the position of the first byte after the read segment,
    /// or [`None`] if the segment is truncated, out of bounds, or otherwise malformed.
    fn read(code: &'a [u8], data: &'a [u8], start: usize) -> Option<(Self, usize)>;
}
trait BinaryWrite: Sized {
    /// Appends a binary representation of the value to the code buffer.
    fn append(val: &Self, code: &mut Vec<u8>, refs: &mut DataRefs);
}

impl BinaryRead<'_> for u64 {
    fn read(code: &[u8], _: &[u8], start: usize) -> Option<(Self, usize)> {
        decode_u64(code, start)
    }
}
impl BinaryWrite for u64 {
    fn append(val: &Self, code: &mut Vec<u8>, _: &mut DataRefs) {
        encode_u64(*val, code)
    }
}

impl BinaryRead<'_> for usize {
    fn read(code: &[u8], data: &[u8], start: usize) -> Option<(Self, usize)> {
        let (v, aft) = <u64 as BinaryRead>::read(code, data, start)?;
        Some((usize::try_from(v).ok()?, aft))
    }
}
impl BinaryWrite for usize {
    fn append(val: &Self, code: &mut Vec<u8>, refs: &mut DataRefs) {
        BinaryWrite::append(&(*val as u64), code, refs)
    }
}

// stored as the bit pattern byte-swapped so that common constants encode compactly
impl BinaryRead<'_> for f64 {
    fn read(code: &[u8], data: &[u8], start: usize) -> Option<(Self, usize)> {
        let (v, aft) = <u64 as BinaryRead>::read(code, data, start)?;
        Some((f64::from_bits(v.swap_bytes()), aft))
    }
}
impl BinaryWrite for f64 {
    fn append(val: &Self, code: &mut Vec<u8>, refs: &mut DataRefs) {
        BinaryWrite::append(&val.to_bits().swap_bytes(), code, refs)
    }
}

impl BinaryRead<'_> for BinaryOp {
    fn read(code: &[u8], _: &[u8], start: usize) -> Option<(Self, usize)> {
        Some((Self::from_u8(*code.get(start)?)?, start + 1))
    }
}
impl BinaryWrite for BinaryOp {
    fn append(val: &Self, code: &mut Vec<u8>, _: &mut DataRefs) {
        debug_assert_eq!(std::mem::size_of::<Self>(), 1);
        code.push((*val) as u8)
    }
}

impl<'a> BinaryRead<'a> for &'a str {
    fn read(code: &'a [u8], data: &'a [u8], start: usize) -> Option<(Self, usize)> {
        let (data_pos, aft) = <usize as BinaryRead>::read(code, data, start)?;
        let (data_len, aft) = <usize as BinaryRead>::read(code, data, aft)?;
        let bytes = data.get(data_pos..data_pos.checked_add(data_len)?)?;
        Some((std::str::from_utf8(bytes).ok()?, aft))
    }
}
impl BinaryRead<'_> for String {
    fn read(code: &[u8], data: &[u8], start: usize) -> Option<(Self, usize)> {
        let (v, aft) = <&str as BinaryRead>::read(code, data, start)?;
        Some((v.to_owned(), aft))
    }
}
impl BinaryRead<'_> for CompactString {
    fn read(code: &[u8], data: &[u8], start: usize) -> Option<(Self, usize)> {
        let (v, aft) = <&str as BinaryRead>::read(code, data, start)?;
        Some((v.into(), aft))
    }
}

impl BinaryRead<'_> for Target {
    fn read(code: &[u8], data: &[u8], start: usize) -> Option<(Self, usize)> {
        let (v, aft) = <usize as BinaryRead>::read(code, data, start)?;
        Some((Target::Offset(v), aft))
    }
}
impl BinaryWrite for Target {
    fn append(val: &Self, code: &mut Vec<u8>, refs: &mut DataRefs) {
        match val {
            Target::Offset(x) => BinaryWrite::append(x, code, refs),
            Target::Node(_) | Target::Label(_) => unreachable!(),
        }
    }
}

impl BinaryRead<'_> for Instruction {
    fn read(code: &[u8], data: &[u8], start: usize) -> Option<(Self, usize)> {
        macro_rules! read_prefixed {
            (Instruction::$root:ident) => {
                (Instruction::$root, start + 1)
            };
            (Instruction::$root:ident { $($tt:tt)* } $(: $($vals:ident),+$(,)? )?) => {{
                #[allow(unused_mut)]
                let mut parsing_stop = start + 1;
                $($(let $vals = {
                    let x = BinaryRead::read(code, data, parsing_stop)?;
                    parsing_stop = x.1;
                    x.0
                };)*)?
                (Instruction::$root { $($tt)* $($($vals),+ )? }, parsing_stop)
            }};
        }
        Some(match *code.get(start)? {
            0 => read_prefixed!(Instruction::PushBool { value: false }),
            1 => read_prefixed!(Instruction::PushBool { value: true }),
            2 => read_prefixed!(Instruction::PushNumber {} : value),
            3 => read_prefixed!(Instruction::PushString {} : value),
            4 => read_prefixed!(Instruction::PushVariable {} : var),

            5 => read_prefixed!(Instruction::BinaryOp { op: BinaryOp::And, } : lhs, rhs),
            6 => read_prefixed!(Instruction::BinaryOp { op: BinaryOp::Or, } : lhs, rhs),
            7 => read_prefixed!(Instruction::BinaryOp { op: BinaryOp::Equal, } : lhs, rhs),
            8 => read_prefixed!(Instruction::BinaryOp { op: BinaryOp::Greater, } : lhs, rhs),
            9 => read_prefixed!(Instruction::BinaryOp { op: BinaryOp::Less, } : lhs, rhs),
            10 => read_prefixed!(Instruction::BinaryOp {} : op, lhs, rhs),

            11 => read_prefixed!(Instruction::Not {} : slot),
            12 => read_prefixed!(Instruction::ClearArgs {} : start, count),

            13 => {
                let (function, aft) = BinaryRead::read(code, data, start + 1)?;
                let (args, mut aft) = <usize as BinaryRead>::read(code, data, aft)?;
                for i in 0..args {
                    let (slot, x) = <usize as BinaryRead>::read(code, data, aft)?;
                    if slot != i { return None }
                    aft = x;
                }
                (Instruction::CallFunction { function, args }, aft)
            }

            14 => read_prefixed!(Instruction::StoreVariable {} : var),

            15 => read_prefixed!(Instruction::RunLine {} : text),
            16 => read_prefixed!(Instruction::AddOption {} : text, target),
            17 => read_prefixed!(Instruction::ShowOptions),

            18 => read_prefixed!(Instruction::Jump {} : target),
            19 => read_prefixed!(Instruction::JumpIfFalse {} : slot, target),

            20 => read_prefixed!(Instruction::Abort {} : message),

            _ => return None,
        })
    }
}
impl BinaryWrite for Instruction {
    fn append(val: &Self, code: &mut Vec<u8>, refs: &mut DataRefs) {
        macro_rules! append_prefixed {
            ($op:literal $(: $($($vals:ident)+),+$(,)?)?) => {{
                code.push($op);
                $($( append_prefixed!(@single $($vals)+); )*)?
            }};
            (@single str $val:ident) => {{
                let data_pos = refs.next_offset();
                encode_u64(data_pos as u64, code);
                encode_u64($val.len() as u64, code);
            }};
            (@single $val:ident) => { BinaryWrite::append($val, code, refs) };
        }
        match val {
            Instruction::PushBool { value: false } => append_prefixed!(0),
            Instruction::PushBool { value: true } => append_prefixed!(1),
            Instruction::PushNumber { value } => append_prefixed!(2: value),
            Instruction::PushString { value } => append_prefixed!(3: str value),
            Instruction::PushVariable { var } => append_prefixed!(4: str var),

            Instruction::BinaryOp { op: BinaryOp::And, lhs, rhs } => append_prefixed!(5: lhs, rhs),
            Instruction::BinaryOp { op: BinaryOp::Or, lhs, rhs } => append_prefixed!(6: lhs, rhs),
            Instruction::BinaryOp { op: BinaryOp::Equal, lhs, rhs } => append_prefixed!(7: lhs, rhs),
            Instruction::BinaryOp { op: BinaryOp::Greater, lhs, rhs } => append_prefixed!(8: lhs, rhs),
            Instruction::BinaryOp { op: BinaryOp::Less, lhs, rhs } => append_prefixed!(9: lhs, rhs),
            Instruction::BinaryOp { op, lhs, rhs } => append_prefixed!(10: op, lhs, rhs),

            Instruction::Not { slot } => append_prefixed!(11: slot),
            Instruction::ClearArgs { start, count } => append_prefixed!(12: start, count),

            Instruction::CallFunction { function, args } => {
                append_prefixed!(13: str function, args);
                for i in 0..*args {
                    encode_u64(i as u64, code);
                }
            }

            Instruction::StoreVariable { var } => append_prefixed!(14: str var),

            Instruction::RunLine { text } => append_prefixed!(15: str text),
            Instruction::AddOption { text, target } => append_prefixed!(16: str text, target),
            Instruction::ShowOptions => append_prefixed!(17),

            Instruction::Jump { target } => append_prefixed!(18: target),
            Instruction::JumpIfFalse { slot, target } => append_prefixed!(19: slot, target),

            Instruction::Abort { message } => append_prefixed!(20: str message),
        }
    }
}

/// An engine-ready dialogue program.
///
/// This is the immutable output of [`Compiler::assemble`](crate::compiler::Compiler::assemble):
/// a fully linked instruction stream (every [`Target`] resolved to an offset), the entry
/// offset of every node, and, depending on the compiler configuration, per-instruction
/// source locations and a source-line map.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Program {
    #[allow(dead_code)] tag: MustBeU128<FINGERPRINT>,

    pub(crate) ins: Box<[Instruction]>,
    pub(crate) nodes: Box<[(CompactString, usize)]>,
    pub(crate) debug: Option<Box<[Loc]>>,
    pub(crate) source_map: Option<Box<[(usize, usize)]>>,
}
impl Program {
    pub(crate) fn new(ins: Vec<Instruction>, nodes: Vec<(CompactString, usize)>, debug: Option<Vec<Loc>>, source_map: Option<Vec<(usize, usize)>>) -> Self {
        Self {
            tag: Default::default(),
            ins: ins.into_boxed_slice(),
            nodes: nodes.into_boxed_slice(),
            debug: debug.map(Vec::into_boxed_slice),
            source_map: source_map.map(Vec::into_boxed_slice),
        }
    }

    /// The linked instruction stream. Offsets stored in instruction operands index into this.
    pub fn instructions(&self) -> &[Instruction] {
        &self.ins
    }
    /// Every compiled node's name and entry offset, in concatenation order.
    pub fn node_offsets(&self) -> &[(CompactString, usize)] {
        &self.nodes
    }
    /// The entry offset of the named node, if it was compiled.
    pub fn entry_offset(&self, name: &str) -> Option<usize> {
        self.nodes.iter().find(|x| x.0 == name).map(|x| x.1)
    }
    /// Per-instruction source locations, present when compiled with `debug` enabled.
    pub fn debug_locs(&self) -> Option<&[Loc]> {
        self.debug.as_deref()
    }
    /// The (first instruction offset, source line) map, present when compiled with `source_map` enabled.
    pub fn source_line_map(&self) -> Option<&[(usize, usize)]> {
        self.source_map.as_deref()
    }
    /// Looks up the original source line of an instruction offset.
    /// Returns [`None`] unless compiled with `source_map` enabled.
    pub fn lookup_line(&self, pos: usize) -> Option<usize> {
        let map = self.source_map.as_deref()?;
        let p = map.upper_bound_by_key(&pos, |x| x.0);
        if p == 0 { return None }
        Some(map[p - 1].1)
    }

    /// Encodes the instruction stream into (code, data) buffers.
    /// String operands are pooled in the data buffer and referenced as (offset, length) pairs.
    fn encode(&self) -> (Vec<u8>, Vec<u8>) {
        let mut pool = BinPool::new();
        let mut order = Vec::with_capacity(self.ins.len());
        for ins in self.ins.iter() {
            ins.intern_strings(&mut pool, &mut order);
        }

        let backing = pool.into_backing();
        let (data, offsets) = {
            let mut data = Vec::with_capacity(backing.0.iter().map(Vec::len).sum::<usize>());
            let mut backing_pos = Vec::with_capacity(backing.0.len());
            for chunk in backing.0.iter() {
                backing_pos.push(data.len());
                data.extend_from_slice(chunk);
            }
            let offsets = backing.1.iter().map(|slice| backing_pos[slice.src] + slice.start).collect::<Vec<_>>();
            (data, offsets)
        };

        let mut code = Vec::with_capacity(self.ins.len() * 4);
        let mut refs = DataRefs { offsets: &offsets, order: order.iter() };
        for ins in self.ins.iter() {
            BinaryWrite::append(ins, &mut code, &mut refs);
        }
        debug_assert!(refs.order.as_slice().is_empty());

        (code, data)
    }

    /// Serializes the whole program (fingerprint, node offset table, code, data) into one buffer.
    /// The encoding is deterministic: the same program always yields the same bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let (code, data) = self.encode();

        let mut res = Vec::with_capacity(32 + code.len() + data.len());
        res.extend_from_slice(&FINGERPRINT.to_le_bytes());
        encode_u64(self.nodes.len() as u64, &mut res);
        for (name, offset) in self.nodes.iter() {
            encode_u64(name.len() as u64, &mut res);
            res.extend_from_slice(name.as_bytes());
            encode_u64(*offset as u64, &mut res);
        }
        encode_u64(self.ins.len() as u64, &mut res);
        encode_u64(code.len() as u64, &mut res);
        res.extend_from_slice(&code);
        encode_u64(data.len() as u64, &mut res);
        res.extend_from_slice(&data);
        res
    }

    /// Decodes a serialized program's instruction stream back into instruction form, along
    /// with each instruction's byte address. Returns [`None`] if the buffer does not hold a
    /// program serialized by this version of the crate.
    ///
    /// This is an inspection and testing utility; a runtime is expected to consume the
    /// serialized form directly.
    pub fn decode_instructions(bytes: &[u8]) -> Option<Vec<(usize, Instruction)>> {
        let tag = u128::from_le_bytes(bytes.get(..16)?.try_into().ok()?);
        if tag != FINGERPRINT { return None }
        let mut pos = 16;

        let (node_count, aft) = decode_u64(bytes, pos)?;
        pos = aft;
        for _ in 0..node_count {
            let (name_len, aft) = decode_u64(bytes, pos)?;
            let (_, aft) = decode_u64(bytes, aft.checked_add(usize::try_from(name_len).ok()?)?)?;
            pos = aft;
        }

        let (ins_count, aft) = decode_u64(bytes, pos)?;
        let ins_count = usize::try_from(ins_count).ok()?;
        let (code_len, aft) = decode_u64(bytes, aft)?;
        let code_len = usize::try_from(code_len).ok()?;
        let code = bytes.get(aft..aft.checked_add(code_len)?)?;
        pos = aft + code_len;
        let (data_len, aft) = decode_u64(bytes, pos)?;
        let data = bytes.get(aft..aft.checked_add(usize::try_from(data_len).ok()?)?)?;

        // every instruction encodes to at least one byte, so ins_count cannot exceed code.len()
        let mut res = Vec::with_capacity(ins_count.min(code.len()));
        let mut at = 0;
        while at < code.len() {
            let (ins, aft) = <Instruction as BinaryRead>::read(code, data, at)?;
            res.push((at, ins));
            at = aft;
        }
        if res.len() != ins_count { return None }
        Some(res)
    }

    /// Generates a hex dump of the encoded code, including instructions and addresses.
    pub fn dump_code(&self, f: &mut dyn Write) -> io::Result<()> {
        let (code, data) = self.encode();
        let mut pos = 0;
        while pos < code.len() {
            // self-encoded buffers always decode
            let Some((ins, aft)) = <Instruction as BinaryRead>::read(&code, &data, pos) else { break };
            for (i, bytes) in code[pos..aft].chunks(BYTES_PER_LINE).enumerate() {
                if i == 0 {
                    write!(f, "{pos:08}   ")?;
                } else {
                    write!(f, "           ")?;
                }

                for &b in bytes {
                    write!(f, " {b:02x}")?;
                }
                for _ in bytes.len()..BYTES_PER_LINE {
                    write!(f, "   ")?;
                }

                if i == 0 {
                    write!(f, "    {ins:?}")?;
                }
                writeln!(f)?;
            }
            pos = aft;
        }
        Ok(())
    }
    /// Generates a hex dump of the pooled program data (string literals and names).
    pub fn dump_data(&self, f: &mut dyn Write) -> io::Result<()> {
        let (_, data) = self.encode();
        for (i, bytes) in data.chunks(BYTES_PER_LINE).enumerate() {
            write!(f, "{:08}   ", i * BYTES_PER_LINE)?;
            for &b in bytes {
                write!(f, " {b:02x}")?;
            }
            for _ in bytes.len()..BYTES_PER_LINE {
                write!(f, "   ")?;
            }
            write!(f, "    ")?;
            for &b in bytes {
                write!(f, "{}", if (0x21..=0x7e).contains(&b) { b as char } else { '.' })?;
            }
            writeln!(f)?;
        }
        Ok(())
    }

    /// Returns the total serialized size of the program (in bytes).
    pub fn total_size(&self) -> usize {
        self.to_bytes().len()
    }
}

/// Builds the source-line map for a program: one (first instruction offset, line) entry per
/// run of instructions originating from the same source line, ascending by offset.
pub(crate) fn condense_source_map(locs: &[Loc]) -> Vec<(usize, usize)> {
    let mut res: Vec<(usize, usize)> = Vec::new();
    for (pos, loc) in locs.iter().enumerate() {
        if res.last().map(|x| x.1) != Some(loc.line) {
            res.push((pos, loc.line));
        }
    }
    res
}
