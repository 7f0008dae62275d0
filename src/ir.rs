//! Basic-block intermediate representation.
//!
//! A block is a flat, append-only arena of [`IrNode`]s built while
//! decoding a run of instructions starting at some `pc_start`. Nodes
//! reference each other by position (a [`NodeRef`]) rather than by
//! pointer, so the arena can be grown, sealed, and handed to a future
//! block-compiling backend without any lifetime entanglement.
//!
//! Each node also records a `parent`: the index of the most recent node
//! that consumed it as an operand. This is a hint for a future backend
//! deciding which intermediate values are worth keeping in registers,
//! not a full use-def chain — a node can be read by more than one later
//! node, and only the last such read is recorded.

use thiserror::Error;

/// A reference to a node within a single [`IrBlock`]. Not meaningful
/// across blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRef(usize);

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrError {
    #[error("basic block exceeded its node capacity ({0} nodes)")]
    OutOfCapacity(usize),
    #[error("basic block is sealed and cannot accept new nodes")]
    Sealed,
}

/// The operation a node performs. Shift amounts are masked to the low 5
/// bits of the right operand, matching the scalar interpreter in
/// [`crate::rv32i`]. `shl` is a logical left shift, `sll` a logical
/// right shift, and `sal` an arithmetic right shift — an unusual naming
/// but a deliberate one, kept so nodes built here read directly against
/// the handler that will later consume them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrOp {
    /// Load an immediate constant; `value` holds it, `lhs`/`rhs` unused.
    Imm,
    /// Load a register; `reg_index` names the source.
    LdReg,
    /// Store a value into a register; `reg_index` names the destination,
    /// `lhs` the value.
    StReg,
    /// Store a value into `pc`; `lhs` the value.
    StPc,
    Add,
    Sub,
    And,
    Or,
    Xor,
    /// Unsigned less-than.
    Sltu,
    /// Signed less-than.
    Slt,
    /// Logical left shift.
    Shl,
    /// Logical right shift.
    Sll,
    /// Arithmetic right shift.
    Sal,
    Mul,
    /// Signed multiply.
    Imul,
}

/// One node in the block's arena.
#[derive(Debug, Clone, Copy)]
pub struct IrNode {
    pub op: IrOp,
    /// Left (or only) operand, for binary/unary ops.
    pub lhs: Option<NodeRef>,
    /// Right operand, for binary ops.
    pub rhs: Option<NodeRef>,
    /// Constant payload for `Imm`.
    pub value: u32,
    /// Logical register index for `LdReg`/`StReg`. Holds the architectural
    /// register number (0-31), not a byte offset into a register-file
    /// structure: a node that reads or writes `x5` carries `reg_index ==
    /// 5` regardless of how a future backend lays registers out in memory.
    pub reg_index: u8,
    /// The most recent node (by arena position) that consumed this node
    /// as an operand, if any.
    pub parent: Option<NodeRef>,
}

/// An append-only, optionally bounded arena of [`IrNode`]s for one basic
/// block of decoded instructions.
pub struct IrBlock {
    nodes: Vec<IrNode>,
    capacity: usize,
    sealed: bool,
    /// Address of the first instruction translated into this block.
    pub pc_start: u32,
    /// Address one past the last instruction translated, once sealed.
    pub pc_end: Option<u32>,
    /// The block predicted to run next, if the backend chose to record
    /// a prediction (e.g. a branch's likely target). Not authoritative:
    /// the interpreter always re-derives control flow at block exit.
    pub predicted_successor: Option<u32>,
}

impl IrBlock {
    pub fn new(pc_start: u32, capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity.min(256)),
            capacity,
            sealed: false,
            pc_start,
            pc_end: None,
            predicted_successor: None,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, r: NodeRef) -> &IrNode {
        &self.nodes[r.0]
    }

    /// Seal the block: no further nodes may be appended. `pc_end` is the
    /// address one past the last translated instruction.
    pub fn seal(&mut self, pc_end: u32) {
        self.sealed = true;
        self.pc_end = Some(pc_end);
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    fn push(&mut self, node: IrNode) -> Result<NodeRef, IrError> {
        if self.sealed {
            return Err(IrError::Sealed);
        }
        if self.nodes.len() >= self.capacity {
            return Err(IrError::OutOfCapacity(self.capacity));
        }
        let r = NodeRef(self.nodes.len());
        self.nodes.push(node);
        Ok(r)
    }

    fn mark_parent(&mut self, operand: Option<NodeRef>, parent: NodeRef) {
        if let Some(operand) = operand {
            self.nodes[operand.0].parent = Some(parent);
        }
    }

    pub fn imm(&mut self, value: u32) -> Result<NodeRef, IrError> {
        self.push(IrNode {
            op: IrOp::Imm,
            lhs: None,
            rhs: None,
            value,
            reg_index: 0,
            parent: None,
        })
    }

    pub fn ld_reg(&mut self, reg_index: u8) -> Result<NodeRef, IrError> {
        self.push(IrNode {
            op: IrOp::LdReg,
            lhs: None,
            rhs: None,
            value: 0,
            reg_index,
            parent: None,
        })
    }

    pub fn st_reg(&mut self, reg_index: u8, lhs: NodeRef) -> Result<NodeRef, IrError> {
        let r = self.push(IrNode {
            op: IrOp::StReg,
            lhs: Some(lhs),
            rhs: None,
            value: 0,
            reg_index,
            parent: None,
        })?;
        self.mark_parent(Some(lhs), r);
        Ok(r)
    }

    pub fn st_pc(&mut self, lhs: NodeRef) -> Result<NodeRef, IrError> {
        let r = self.push(IrNode {
            op: IrOp::StPc,
            lhs: Some(lhs),
            rhs: None,
            value: 0,
            reg_index: 0,
            parent: None,
        })?;
        self.mark_parent(Some(lhs), r);
        Ok(r)
    }

    fn binary(&mut self, op: IrOp, lhs: NodeRef, rhs: NodeRef) -> Result<NodeRef, IrError> {
        let r = self.push(IrNode {
            op,
            lhs: Some(lhs),
            rhs: Some(rhs),
            value: 0,
            reg_index: 0,
            parent: None,
        })?;
        self.mark_parent(Some(lhs), r);
        self.mark_parent(Some(rhs), r);
        Ok(r)
    }

    pub fn add(&mut self, lhs: NodeRef, rhs: NodeRef) -> Result<NodeRef, IrError> {
        self.binary(IrOp::Add, lhs, rhs)
    }

    pub fn sub(&mut self, lhs: NodeRef, rhs: NodeRef) -> Result<NodeRef, IrError> {
        self.binary(IrOp::Sub, lhs, rhs)
    }

    pub fn and(&mut self, lhs: NodeRef, rhs: NodeRef) -> Result<NodeRef, IrError> {
        self.binary(IrOp::And, lhs, rhs)
    }

    pub fn or(&mut self, lhs: NodeRef, rhs: NodeRef) -> Result<NodeRef, IrError> {
        self.binary(IrOp::Or, lhs, rhs)
    }

    pub fn xor(&mut self, lhs: NodeRef, rhs: NodeRef) -> Result<NodeRef, IrError> {
        self.binary(IrOp::Xor, lhs, rhs)
    }

    pub fn sltu(&mut self, lhs: NodeRef, rhs: NodeRef) -> Result<NodeRef, IrError> {
        self.binary(IrOp::Sltu, lhs, rhs)
    }

    pub fn slt(&mut self, lhs: NodeRef, rhs: NodeRef) -> Result<NodeRef, IrError> {
        self.binary(IrOp::Slt, lhs, rhs)
    }

    pub fn shl(&mut self, lhs: NodeRef, rhs: NodeRef) -> Result<NodeRef, IrError> {
        self.binary(IrOp::Shl, lhs, rhs)
    }

    pub fn sll(&mut self, lhs: NodeRef, rhs: NodeRef) -> Result<NodeRef, IrError> {
        self.binary(IrOp::Sll, lhs, rhs)
    }

    pub fn sal(&mut self, lhs: NodeRef, rhs: NodeRef) -> Result<NodeRef, IrError> {
        self.binary(IrOp::Sal, lhs, rhs)
    }

    pub fn mul(&mut self, lhs: NodeRef, rhs: NodeRef) -> Result<NodeRef, IrError> {
        self.binary(IrOp::Mul, lhs, rhs)
    }

    pub fn imul(&mut self, lhs: NodeRef, rhs: NodeRef) -> Result<NodeRef, IrError> {
        self.binary(IrOp::Imul, lhs, rhs)
    }

    /// Evaluate every node in arena order against a register file and
    /// return the resulting program counter, if any `StPc` node ran.
    /// This is a reference interpreter for the IR, exercised by tests
    /// and usable by a host that wants to replay a block without a full
    /// compiling backend.
    pub fn evaluate(&self, x: &mut crate::registers::RegisterFile) -> Option<u32> {
        let mut values = vec![0u32; self.nodes.len()];
        let mut new_pc = None;
        for (i, node) in self.nodes.iter().enumerate() {
            let lhs = node.lhs.map(|r| values[r.0]).unwrap_or(0);
            let rhs = node.rhs.map(|r| values[r.0]).unwrap_or(0);
            let shamt = rhs & 0x1f;
            values[i] = match node.op {
                IrOp::Imm => node.value,
                IrOp::LdReg => x.get(node.reg_index),
                IrOp::StReg => {
                    x.set(node.reg_index, lhs);
                    lhs
                }
                IrOp::StPc => {
                    new_pc = Some(lhs);
                    lhs
                }
                IrOp::Add => lhs.wrapping_add(rhs),
                IrOp::Sub => lhs.wrapping_sub(rhs),
                IrOp::And => lhs & rhs,
                IrOp::Or => lhs | rhs,
                IrOp::Xor => lhs ^ rhs,
                IrOp::Sltu => (lhs < rhs) as u32,
                IrOp::Slt => ((lhs as i32) < (rhs as i32)) as u32,
                IrOp::Shl => lhs << shamt,
                IrOp::Sll => lhs >> shamt,
                IrOp::Sal => ((lhs as i32) >> shamt) as u32,
                IrOp::Mul => lhs.wrapping_mul(rhs),
                IrOp::Imul => ((lhs as i32).wrapping_mul(rhs as i32)) as u32,
            };
        }
        new_pc
    }
}
