//! The compilation pipeline: lowering, concatenation, validation, linking, and assembly.
//!
//! [`Compiler`] is the public driver. [`Compiler::process`] lowers one batch of AST nodes
//! into the accumulated state (statement and expression lowering, node concatenation, and
//! reference validation), and may be called once per batch as nodes become available.
//! [`Compiler::assemble`] then links every symbolic target and freezes the result into a
//! [`Program`], which [`Compiler::write_bytecode`] serializes to caller-provided sinks.
//!
//! The passes never abort on user input: problems accumulate as [`Diagnostic`] values and
//! compilation continues, so a single run surfaces as many issues as possible. Only an
//! internal invariant violation surfaced at assembly time is a hard error.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::fmt;

use compact_str::CompactString;

use crate::ast::{self, Loc};
use crate::bytecode::{condense_source_map, BinaryOp, Instruction, Program, Target};
use crate::vecmap::VecMap;

/// Configuration for a [`Compiler`] instance, fixed for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilerConfig {
    /// Whether a reference to an undefined node is an error rather than a warning.
    /// Either way a stub node is synthesized so that linking stays well-formed.
    pub error_if_node_undefined: bool,
    /// Whether to attach per-instruction source locations to the assembled program.
    pub debug: bool,
    /// Whether to attach a source-line map to the assembled program.
    pub source_map: bool,
}
impl Default for CompilerConfig {
    fn default() -> Self {
        Self { error_if_node_undefined: true, debug: false, source_map: false }
    }
}

/// One accumulated error or warning message, with the source location that produced it
/// when one is known (duplicate-definition warnings are node-level and carry none).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub loc: Option<Loc>,
}
impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.loc {
            Some(loc) => write!(f, "line {}, col {}: {}", loc.line, loc.col, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// An internal invariant violation surfaced by [`Compiler::assemble`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssembleError {
    /// A symbolic target survived linking. This is a compiler bug, not a user input error,
    /// and must never be silently emitted as a broken offset.
    UnresolvedTarget { pos: usize, target: Target },
}
impl fmt::Display for AssembleError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AssembleError::UnresolvedTarget { pos, target } => write!(f, "unresolved target {target:?} at command {pos}"),
        }
    }
}
impl std::error::Error for AssembleError {}

/// An error from [`Compiler::write_bytecode`].
#[derive(Debug)]
pub enum WriteError {
    /// No assembled program exists; [`Compiler::assemble`] must succeed first.
    NotAssembled,
    Io(io::Error),
}
impl From<io::Error> for WriteError {
    fn from(e: io::Error) -> Self {
        WriteError::Io(e)
    }
}
impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WriteError::NotAssembled => write!(f, "no assembled program to write"),
            WriteError::Io(e) => write!(f, "failed to write bytecode: {e}"),
        }
    }
}
impl std::error::Error for WriteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WriteError::NotAssembled => None,
            WriteError::Io(e) => Some(e),
        }
    }
}

/// The number of bytes accepted by each sink during [`Compiler::write_bytecode`].
/// A sink that was not provided (or had no payload to receive) reports zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteCounts {
    pub bytecode: usize,
    pub debug: usize,
    pub source_map: usize,
}

/// The position of a forward label within a node, in the node's own coordinates.
/// Translated to a node-local offset only once the node's layout is frozen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LabelPos {
    /// An index into the node's logic commands.
    Logic(usize),
    /// An index into one of the node's dialogue segments.
    Segment(usize, usize),
}

/// A contiguous run of dialogue-block commands. A new segment starts wherever a control
/// command interrupts literal text, so a runtime can resume mid-block after a branch.
#[derive(Debug, Default)]
struct Segment {
    ins: Vec<Instruction>,
    locs: Vec<Loc>,
}

/// The output of lowering one AST node: its logic commands followed by its dialogue
/// segments, plus the bookkeeping linking needs (labels and outgoing node references).
/// Immutable after lowering except for the start offset assigned during concatenation.
#[derive(Debug)]
struct CompiledNode {
    name: CompactString,
    logic: Vec<Instruction>,
    logic_locs: Vec<Loc>,
    segments: Vec<Segment>,
    labels: Vec<LabelPos>,
    refs: Vec<(CompactString, Loc)>,
    placeholder: bool,
    offset: usize,
}
impl CompiledNode {
    /// A synthetic stand-in for an undefined node: jumping to it surfaces a runtime error.
    fn stub(name: &str) -> Self {
        Self {
            name: name.into(),
            logic: vec![Instruction::Abort { message: format!("jumped to undefined node {name}") }],
            logic_locs: vec![Loc::default()],
            segments: vec![],
            labels: vec![],
            refs: vec![],
            placeholder: true,
            offset: 0,
        }
    }
    /// The total number of commands in this node (logic plus all segments).
    fn len(&self) -> usize {
        self.logic.len() + self.segments.iter().map(|s| s.ins.len()).sum::<usize>()
    }
    /// Translates a label to a node-local command offset. A label placed past the last
    /// emitted command resolves to the node's end (falling through to the next node).
    fn label_offset(&self, label: usize) -> usize {
        match self.labels[label] {
            LabelPos::Logic(i) => i,
            LabelPos::Segment(seg, i) => self.logic.len() + self.segments[..seg].iter().map(|s| s.ins.len()).sum::<usize>() + i,
        }
    }
    /// The node's commands in layout order, paired with their source locations.
    fn commands(&self) -> impl Iterator<Item = (&Instruction, Loc)> + '_ {
        self.logic.iter().zip(self.logic_locs.iter().copied())
            .chain(self.segments.iter().flat_map(|s| s.ins.iter().zip(s.locs.iter().copied())))
    }
    fn commands_mut(&mut self) -> impl Iterator<Item = &mut Instruction> + '_ {
        self.logic.iter_mut().chain(self.segments.iter_mut().flat_map(|s| s.ins.iter_mut()))
    }
}

// label placeholder value used between allocation and placement
const UNPLACED: LabelPos = LabelPos::Logic(usize::MAX);

/// Lowers one AST node into a [`CompiledNode`].
///
/// Emission routes to the logic command list outside dialogue blocks and to the current
/// dialogue segment inside one. Control statements inside a dialogue block mark a split,
/// so the following line of text begins a fresh segment.
struct NodeBuilder {
    name: CompactString,
    logic: Vec<Instruction>,
    logic_locs: Vec<Loc>,
    segments: Vec<Segment>,
    labels: Vec<LabelPos>,
    refs: Vec<(CompactString, Loc)>,
    in_dialogue: bool,
    split_pending: bool,
    pending_options: bool,
}
impl NodeBuilder {
    fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            logic: vec![],
            logic_locs: vec![],
            segments: vec![],
            labels: vec![],
            refs: vec![],
            in_dialogue: false,
            split_pending: false,
            pending_options: false,
        }
    }
    fn build(mut self, stmts: &[ast::Stmt]) -> CompiledNode {
        self.append_stmts(stmts);
        self.flush_options(stmts.last().map(|s| s.loc).unwrap_or_default());
        debug_assert!(self.labels.iter().all(|&x| x != UNPLACED));
        CompiledNode {
            name: self.name,
            logic: self.logic,
            logic_locs: self.logic_locs,
            segments: self.segments,
            labels: self.labels,
            refs: self.refs,
            placeholder: false,
            offset: 0,
        }
    }

    fn emit(&mut self, ins: Instruction, loc: Loc) {
        if let Some(Target::Node(name)) = ins.target() {
            self.refs.push((name.clone(), loc));
        }
        if self.in_dialogue {
            if self.split_pending || self.segments.is_empty() {
                self.segments.push(Segment::default());
                self.split_pending = false;
            }
            let seg = self.segments.len() - 1;
            self.segments[seg].ins.push(ins);
            self.segments[seg].locs.push(loc);
        } else {
            self.logic.push(ins);
            self.logic_locs.push(loc);
        }
    }
    /// Marks the end of linear text flow; the next emission into a dialogue block opens a
    /// new segment. No effect outside a dialogue block.
    fn split(&mut self) {
        if self.in_dialogue {
            self.split_pending = true;
        }
    }

    fn new_label(&mut self) -> usize {
        self.labels.push(UNPLACED);
        self.labels.len() - 1
    }
    fn place_label(&mut self, label: usize) {
        self.labels[label] = self.cur_pos();
    }
    fn cur_pos(&self) -> LabelPos {
        if self.in_dialogue {
            match self.split_pending || self.segments.is_empty() {
                true => LabelPos::Segment(self.segments.len(), 0),
                false => LabelPos::Segment(self.segments.len() - 1, self.segments[self.segments.len() - 1].ins.len()),
            }
        } else {
            LabelPos::Logic(self.logic.len())
        }
    }

    /// Closes a pending option menu, if one is open. A run of option statements forms one
    /// menu, presented as a whole where the run ends.
    fn flush_options(&mut self, loc: Loc) {
        if self.pending_options {
            self.pending_options = false;
            self.emit(Instruction::ShowOptions, loc);
            self.split();
        }
    }

    fn append_stmts(&mut self, stmts: &[ast::Stmt]) {
        for stmt in stmts {
            self.append_stmt(stmt);
        }
    }
    fn append_stmt(&mut self, stmt: &ast::Stmt) {
        let loc = stmt.loc;
        if !matches!(stmt.kind, ast::StmtKind::Option { .. }) {
            self.flush_options(loc);
        }
        match &stmt.kind {
            ast::StmtKind::Dialogue { body } => {
                let prev = self.in_dialogue;
                self.in_dialogue = true;
                self.split_pending = true;
                self.append_stmts(body);
                self.flush_options(body.last().map(|s| s.loc).unwrap_or(loc));
                self.in_dialogue = prev;
            }
            ast::StmtKind::Line { speaker, text } => {
                let text = match speaker {
                    Some(speaker) => format!("{speaker}: {text}"),
                    None => text.clone(),
                };
                self.emit(Instruction::RunLine { text }, loc);
            }
            ast::StmtKind::Option { text, target } => {
                self.emit(Instruction::AddOption { text: text.clone(), target: Target::Node(target.clone()) }, loc);
                self.pending_options = true;
            }
            ast::StmtKind::Jump { target } => {
                self.emit(Instruction::Jump { target: Target::Node(target.clone()) }, loc);
                self.split();
            }
            ast::StmtKind::Assign { var, value } => {
                self.append_expr(value);
                self.emit(Instruction::StoreVariable { var: var.clone() }, loc);
                self.emit(Instruction::ClearArgs { start: 0, count: 1 }, loc);
                self.split();
            }
            ast::StmtKind::If { condition, then, otherwise } => {
                self.append_expr(condition);
                let else_label = self.new_label();
                self.emit(Instruction::JumpIfFalse { slot: 0, target: Target::Label(else_label) }, loc);
                self.emit(Instruction::ClearArgs { start: 0, count: 1 }, loc);
                self.append_stmts(then);
                self.flush_options(then.last().map(|s| s.loc).unwrap_or(loc));
                let end_label = self.new_label();
                self.emit(Instruction::Jump { target: Target::Label(end_label) }, loc);
                self.place_label(else_label);
                // the condition slot is still live when the branch is taken
                self.emit(Instruction::ClearArgs { start: 0, count: 1 }, loc);
                if !otherwise.is_empty() {
                    self.append_stmts(otherwise);
                    self.flush_options(otherwise.last().map(|s| s.loc).unwrap_or(loc));
                }
                self.place_label(end_label);
                self.split();
            }
            ast::StmtKind::Evaluate { expr } => {
                self.append_expr(expr);
                self.emit(Instruction::ClearArgs { start: 0, count: 1 }, loc);
                self.split();
            }
        }
    }

    /// Lowers an expression to stack-slot commands. The lowered sequence leaves exactly one
    /// live value in slot 0; every intermediate operand slot is explicitly cleared.
    fn append_expr(&mut self, expr: &ast::Expr) {
        let loc = expr.loc;
        match &expr.kind {
            ast::ExprKind::Value(ast::Value::Bool(value)) => self.emit(Instruction::PushBool { value: *value }, loc),
            ast::ExprKind::Value(ast::Value::Number(value)) => self.emit(Instruction::PushNumber { value: *value }, loc),
            ast::ExprKind::Value(ast::Value::String(value)) => self.emit(Instruction::PushString { value: value.clone() }, loc),
            ast::ExprKind::Variable { var } => self.emit(Instruction::PushVariable { var: var.clone() }, loc),

            ast::ExprKind::Call { function, args } => {
                for arg in args {
                    self.append_expr(arg);
                }
                self.emit(Instruction::CallFunction { function: function.clone(), args: args.len() }, loc);
                self.emit(Instruction::ClearArgs { start: 1, count: args.len() }, loc);
            }

            ast::ExprKind::Not { value } => {
                self.append_expr(value);
                self.emit(Instruction::Not { slot: 0 }, loc);
                self.emit(Instruction::ClearArgs { start: 1, count: 1 }, loc);
            }

            ast::ExprKind::And { left, right } => self.append_binary_op(BinaryOp::And, left, right, loc),
            ast::ExprKind::Or { left, right } => self.append_binary_op(BinaryOp::Or, left, right, loc),
            ast::ExprKind::Xor { left, right } => self.append_binary_op(BinaryOp::Xor, left, right, loc),
            ast::ExprKind::Eq { left, right } => self.append_binary_op(BinaryOp::Equal, left, right, loc),
            ast::ExprKind::Greater { left, right } => self.append_binary_op(BinaryOp::Greater, left, right, loc),
            ast::ExprKind::Less { left, right } => self.append_binary_op(BinaryOp::Less, left, right, loc),
            ast::ExprKind::Add { left, right } => self.append_binary_op(BinaryOp::Add, left, right, loc),
            ast::ExprKind::Sub { left, right } => self.append_binary_op(BinaryOp::Sub, left, right, loc),
            ast::ExprKind::Mul { left, right } => self.append_binary_op(BinaryOp::Mul, left, right, loc),
            ast::ExprKind::Div { left, right } => self.append_binary_op(BinaryOp::Div, left, right, loc),
            ast::ExprKind::Mod { left, right } => self.append_binary_op(BinaryOp::Mod, left, right, loc),

            ast::ExprKind::Neq { left, right } => {
                self.append_expr(left);
                self.append_expr(right);
                self.emit(Instruction::BinaryOp { op: BinaryOp::Equal, lhs: 1, rhs: 0 }, loc);
                self.emit(Instruction::ClearArgs { start: 1, count: 2 }, loc);
                self.emit(Instruction::Not { slot: 0 }, loc);
                self.emit(Instruction::ClearArgs { start: 1, count: 1 }, loc);
            }
            // x >= y and x <= y have no dedicated opcode: they lower to (strict cmp) or (equal),
            // with the intermediates cleared in one final batch
            ast::ExprKind::GreaterEq { left, right } => self.append_ordered_eq(BinaryOp::Greater, left, right, loc),
            ast::ExprKind::LessEq { left, right } => self.append_ordered_eq(BinaryOp::Less, left, right, loc),
        }
    }
    fn append_binary_op(&mut self, op: BinaryOp, left: &ast::Expr, right: &ast::Expr, loc: Loc) {
        self.append_expr(left);
        self.append_expr(right);
        self.emit(Instruction::BinaryOp { op, lhs: 1, rhs: 0 }, loc);
        self.emit(Instruction::ClearArgs { start: 1, count: 2 }, loc);
    }
    fn append_ordered_eq(&mut self, strict: BinaryOp, left: &ast::Expr, right: &ast::Expr, loc: Loc) {
        self.append_expr(left);
        self.append_expr(right);
        self.emit(Instruction::BinaryOp { op: strict, lhs: 1, rhs: 0 }, loc);
        self.emit(Instruction::BinaryOp { op: BinaryOp::Equal, lhs: 2, rhs: 1 }, loc);
        self.emit(Instruction::BinaryOp { op: BinaryOp::Or, lhs: 1, rhs: 0 }, loc);
        self.emit(Instruction::ClearArgs { start: 1, count: 4 }, loc);
    }
}

/// All mutable state accumulated across a compilation. [`Compiler::reset`] replaces it
/// with a fresh instance.
#[derive(Default)]
struct CompilerState {
    compiled_nodes: VecMap<CompactString, CompiledNode, false>,
    undefined_nodes: VecMap<CompactString, Vec<Loc>, false>,
    pending_refs: Vec<(CompactString, Loc)>,
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
    linking_required: bool,
    linked: bool,
    program: Option<Program>,
}
impl CompilerState {
    fn new() -> Self {
        Self { linking_required: true, ..Default::default() }
    }
}

/// Compiles batches of AST nodes into a linked bytecode [`Program`].
///
/// One instance serves one compilation at a time; concurrent compilations use separate
/// instances. Call [`Compiler::process`] once per batch, then [`Compiler::assemble`] after
/// the last batch, then [`Compiler::write_bytecode`] to serialize the result.
pub struct Compiler {
    config: CompilerConfig,
    state: CompilerState,
}
impl Default for Compiler {
    fn default() -> Self {
        Self::new(CompilerConfig::default())
    }
}
impl Compiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self { config, state: CompilerState::new() }
    }

    /// Compiles and merges one batch of nodes into the accumulated state.
    /// Returns whether this batch introduced new errors (not whether any errors exist).
    ///
    /// A reference to a node that is still undefined when this call completes is diagnosed
    /// by this call, even if a later batch defines the node. The later definition replaces
    /// the synthesized stub silently.
    pub fn process(&mut self, nodes: &[ast::Node]) -> bool {
        let error_count = self.state.errors.len();
        self.state.linking_required = true;

        for node in nodes {
            self.add_node(NodeBuilder::new(&node.name).build(&node.stmts));
        }
        self.assign_offsets();
        self.validate_refs();

        self.state.errors.len() != error_count
    }

    /// Links every symbolic target and freezes the result into a [`Program`], available
    /// from [`Compiler::program`]. Must be called after the last [`Compiler::process`].
    pub fn assemble(&mut self) -> Result<(), AssembleError> {
        self.link();
        self.finalize()
    }

    /// Serializes the assembled program to `out`, and its debug locations and source map
    /// as JSON to `debug_out` and `source_map_out` when provided. Each sink receives only
    /// its own payload; a metadata sink receives nothing unless the corresponding
    /// [`CompilerConfig`] flag was set. Writes block until the sink has accepted all bytes.
    pub fn write_bytecode(&self, out: &mut dyn Write, debug_out: Option<&mut dyn Write>, source_map_out: Option<&mut dyn Write>) -> Result<WriteCounts, WriteError> {
        let program = self.state.program.as_ref().ok_or(WriteError::NotAssembled)?;
        let mut counts = WriteCounts::default();

        let bytes = program.to_bytes();
        out.write_all(&bytes)?;
        out.flush()?;
        counts.bytecode = bytes.len();

        if let Some(sink) = debug_out {
            if let Some(locs) = program.debug_locs() {
                let payload = serde_json::Value::Array(locs.iter().map(|loc| serde_json::json!({ "line": loc.line, "col": loc.col })).collect()).to_string();
                sink.write_all(payload.as_bytes())?;
                sink.flush()?;
                counts.debug = payload.len();
            }
        }
        if let Some(sink) = source_map_out {
            if let Some(map) = program.source_line_map() {
                let payload = serde_json::Value::Array(map.iter().map(|&(pos, line)| serde_json::json!([pos, line])).collect()).to_string();
                sink.write_all(payload.as_bytes())?;
                sink.flush()?;
                counts.source_map = payload.len();
            }
        }

        Ok(counts)
    }

    /// Restores the compiler to its initial empty state: all nodes, diagnostics, and any
    /// assembled program are discarded. The configuration is kept.
    pub fn reset(&mut self) {
        self.state = CompilerState::new();
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }
    pub fn errors(&self) -> &[Diagnostic] {
        &self.state.errors
    }
    pub fn warnings(&self) -> &[Diagnostic] {
        &self.state.warnings
    }
    /// The assembled program, present after a successful [`Compiler::assemble`].
    pub fn program(&self) -> Option<&Program> {
        self.state.program.as_ref()
    }

    /// Merges one compiled node into the state. Redefining a real node warns and replaces;
    /// redefining a stub replaces silently and discharges the pending references.
    /// Redefining any node after a linking pass has run is an error: offsets already burned
    /// into other nodes cannot follow the layout shift. Appending new nodes stays fine.
    fn add_node(&mut self, node: CompiledNode) {
        match self.state.compiled_nodes.get(&node.name) {
            Some(prev) if !prev.placeholder => {
                self.state.warnings.push(Diagnostic { message: format!("{} already existed, overwriting", node.name), loc: None });
            }
            Some(_) => {
                self.state.undefined_nodes.remove(&node.name);
            }
            None => (),
        }
        if self.state.linked && self.state.compiled_nodes.contains_key(&node.name) {
            self.state.errors.push(Diagnostic { message: format!("{} redefined after linking, previously resolved jumps may be stale", node.name), loc: None });
        }
        for (target, loc) in node.refs.iter() {
            self.state.pending_refs.push((target.clone(), *loc));
        }
        self.state.compiled_nodes.insert(node.name.clone(), node);
    }
    /// Assigns every node its start offset in the concatenated stream: strictly increasing,
    /// contiguous, in insertion order.
    fn assign_offsets(&mut self) {
        let mut pos = 0;
        for (_, node) in self.state.compiled_nodes.iter_mut() {
            node.offset = pos;
            pos += node.len();
        }
    }
    /// Checks every reference introduced since the last check. References to nodes that are
    /// still undefined are diagnosed (severity per config) and a stub node is synthesized
    /// for each missing name so that linking stays well-formed. Never aborts the pipeline.
    fn validate_refs(&mut self) {
        let pending = std::mem::take(&mut self.state.pending_refs);
        let mut stubs_added = false;
        for (name, loc) in pending {
            let defined = match self.state.compiled_nodes.get(&name) {
                Some(node) => !node.placeholder,
                None => false,
            };
            if defined {
                continue;
            }

            let diag = Diagnostic { message: format!("reference to undefined node {name}"), loc: Some(loc) };
            match self.config.error_if_node_undefined {
                true => self.state.errors.push(diag),
                false => self.state.warnings.push(diag),
            }
            match self.state.undefined_nodes.get_mut(&name) {
                Some(locs) => locs.push(loc),
                None => {
                    self.state.undefined_nodes.insert(name.clone(), vec![loc]);
                }
            }
            if !self.state.compiled_nodes.contains_key(&name) {
                self.state.compiled_nodes.insert(name.clone(), CompiledNode::stub(&name));
                stubs_added = true;
            }
        }
        if stubs_added {
            self.assign_offsets();
        }
    }
    /// Rewrites every symbolic target to its absolute command offset, in place. Runs only
    /// when linking is required and clears the flag afterward; already-resolved targets are
    /// left untouched, so relinking is idempotent.
    fn link(&mut self) {
        if !self.state.linking_required {
            return;
        }
        let entry_offsets: BTreeMap<CompactString, usize> = self.state.compiled_nodes.iter().map(|(name, node)| (name.clone(), node.offset)).collect();
        for (_, node) in self.state.compiled_nodes.iter_mut() {
            let label_offsets: Vec<usize> = (0..node.labels.len()).map(|label| node.offset + node.label_offset(label)).collect();
            for ins in node.commands_mut() {
                if let Some(target) = ins.target_mut() {
                    let resolved = match &*target {
                        Target::Node(name) => entry_offsets.get(name).copied(),
                        Target::Label(label) => Some(label_offsets[*label]),
                        Target::Offset(_) => None,
                    };
                    if let Some(pos) = resolved {
                        *target = Target::Offset(pos);
                    }
                }
            }
        }
        self.state.linking_required = false;
        self.state.linked = true;
    }
    /// Freezes the linked stream into an immutable [`Program`]. A symbolic target surviving
    /// to this point is an internal invariant violation and halts assembly.
    fn finalize(&mut self) -> Result<(), AssembleError> {
        let mut ins = vec![];
        let mut locs = vec![];
        let mut nodes = Vec::with_capacity(self.state.compiled_nodes.len());
        for (name, node) in self.state.compiled_nodes.iter() {
            debug_assert_eq!(node.offset, ins.len());
            nodes.push((name.clone(), node.offset));
            for (command, loc) in node.commands() {
                if let Some(target) = command.target() {
                    if !target.is_resolved() {
                        return Err(AssembleError::UnresolvedTarget { pos: ins.len(), target: target.clone() });
                    }
                }
                ins.push(command.clone());
                locs.push(loc);
            }
        }

        let source_map = self.config.source_map.then(|| condense_source_map(&locs));
        let debug = self.config.debug.then_some(locs);
        self.state.program = Some(Program::new(ins, nodes, debug, source_map));
        Ok(())
    }
}
