//! The interpreter: machine state plus the per-opcode handlers.
//!
//! Handlers live as private methods on [`Rv32i`] rather than as free
//! functions generic over an execution-environment trait, since there
//! is only one machine type to generalize over here: the host side of
//! the interface is the `HostIo<U>` trait from [`crate::memory`], and
//! that is the only seam that needs to stay generic.

use crate::exception::Exception;
use crate::fields::{decode_btype, decode_itype, decode_rtype, decode_stype, decode_utype, decode_jtype};
use crate::memory::HostIo;
use crate::opcodes::*;
use crate::registers::RegisterFile;
use crate::utils::sign_extend;

/// A RV32I machine: 32 integer registers, the program counter, and the
/// host-supplied memory interface. `Io` is read-only to the core after
/// construction; `userdata` is the opaque value handed back unchanged by
/// [`Rv32i::userdata`].
pub struct Rv32i<U, Io: HostIo<U>> {
    x: RegisterFile,
    pc: u32,
    io: Io,
    userdata: U,
    /// Number of steps executed since reset. Not required for RV32I
    /// correctness on its own, but threaded through so `step_jit` has
    /// something to bound on, and so a host can observe progress.
    cycle: u64,
    /// Machine-status placeholder; RV32I itself never writes it. Reserved
    /// for a future privileged-mode extension.
    mstatus: u32,
    /// The exception raised by the most recent step, if any. `step` both
    /// returns this and leaves it here for a host that wants to poll
    /// machine state between steps instead of matching on the return
    /// value.
    exception: Option<Exception>,
}

impl<U, Io: HostIo<U>> Rv32i<U, Io> {
    /// Allocate a machine and reset it to its power-on state.
    pub fn create(io: Io, userdata: U) -> Self {
        Self {
            x: RegisterFile::new(),
            pc: 0,
            io,
            userdata,
            cycle: 0,
            mstatus: 0,
            exception: None,
        }
    }

    /// Zero all registers and set `pc = 0`. Does not touch `io` or
    /// `userdata`.
    pub fn reset(&mut self) {
        self.x.reset();
        self.pc = 0;
        self.cycle = 0;
        self.exception = None;
    }

    /// The exception raised by the most recent step, if any. Cleared by
    /// the next call to `step` before it dispatches.
    pub fn exception(&self) -> Option<Exception> {
        self.exception
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn set_pc(&mut self, pc: u32) {
        self.pc = pc;
    }

    /// `which` is masked to 5 bits.
    pub fn reg(&self, which: u8) -> u32 {
        self.x.get(which)
    }

    /// Write to slot 0 is visible until the next [`Rv32i::step`], which
    /// re-zeroes it unconditionally; see [`RegisterFile`].
    pub fn set_reg(&mut self, which: u8, value: u32) {
        self.x.set(which, value);
    }

    pub fn userdata(&self) -> &U {
        &self.userdata
    }

    pub fn userdata_mut(&mut self) -> &mut U {
        &mut self.userdata
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Execute exactly one instruction.
    ///
    /// Side effects within the step occur in program order: register
    /// reads, then memory access, then the register write, then the PC
    /// update. After the handler returns (successfully or not), `x0` is
    /// unconditionally rewritten to zero.
    pub fn step(&mut self) -> Result<(), Exception> {
        self.exception = None;
        let instr = self.io.read_word(&mut self.userdata, self.pc);
        let result = self.dispatch(instr);
        self.x.enforce_zero_register();
        self.cycle += 1;
        if let Err(exception) = result {
            self.exception = Some(exception);
        }
        result
    }

    /// Run steps until the cycle counter reaches `target_cycle` or a
    /// step raises an exception, whichever comes first. A plain
    /// interpreter loop bound by cycle count, not a dynamic translator;
    /// the basic-block IR in [`crate::ir`] is the seam a future
    /// block-compiling backend would hang off of.
    pub fn step_jit(&mut self, target_cycle: u64) -> Result<(), Exception> {
        while self.cycle < target_cycle {
            self.step()?;
        }
        Ok(())
    }

    fn dispatch(&mut self, instr: u32) -> Result<(), Exception> {
        // The empty-handler-slot case is resolved by the decode layer
        // and converted to `Exception::IllegalInstruction` via `?`; a
        // known opcode whose own `funct3`/`funct7` switch falls through
        // is still reported by that handler directly (see each
        // `exec_*` below).
        let index = crate::decode::decode_opcode(instr)?;
        match index {
            i if i == OP_LOAD >> 2 => self.exec_load(instr),
            i if i == OP_MISC_MEM >> 2 => self.exec_misc_mem(instr),
            i if i == OP_IMM >> 2 => self.exec_op_imm(instr),
            i if i == OP_AUIPC >> 2 => self.exec_auipc(instr),
            i if i == OP_STORE >> 2 => self.exec_store(instr),
            i if i == OP >> 2 => self.exec_op(instr),
            i if i == OP_LUI >> 2 => self.exec_lui(instr),
            i if i == OP_BRANCH >> 2 => self.exec_branch(instr),
            i if i == OP_JALR >> 2 => self.exec_jalr(instr),
            i if i == OP_JAL >> 2 => self.exec_jal(instr),
            i if i == OP_SYSTEM >> 2 => self.exec_system(instr),
            _ => unreachable!("decode_opcode already rejected every other index"),
        }
    }

    fn advance(&mut self) {
        self.pc = self.pc.wrapping_add(4);
    }

    fn jump_to(&mut self, target_pc: u32) -> Result<(), Exception> {
        if target_pc & 0x3 != 0 {
            return Err(Exception::InstructionAddressMisaligned(target_pc));
        }
        self.pc = target_pc;
        Ok(())
    }

    fn jump_relative(&mut self, offset: i32) -> Result<(), Exception> {
        let target_pc = self.pc.wrapping_add(offset as u32);
        self.jump_to(target_pc)
    }

    fn exec_load(&mut self, instr: u32) -> Result<(), Exception> {
        let f = decode_itype(instr);
        let addr = self.x.get(f.rs1).wrapping_add(f.imm as u32);
        let value = match f.funct3 {
            FUNCT3_B => sign_extend(self.io.read_byte(&mut self.userdata, addr) as u8, 7),
            FUNCT3_H => sign_extend(self.io.read_half(&mut self.userdata, addr) as u16, 15),
            FUNCT3_W => self.io.read_word(&mut self.userdata, addr),
            FUNCT3_BU => self.io.read_byte(&mut self.userdata, addr),
            FUNCT3_HU => self.io.read_half(&mut self.userdata, addr),
            _ => return Err(Exception::IllegalInstruction(instr)),
        };
        self.x.set(f.rd, value);
        self.advance();
        Ok(())
    }

    fn exec_store(&mut self, instr: u32) -> Result<(), Exception> {
        let f = decode_stype(instr);
        let addr = self.x.get(f.rs1).wrapping_add(f.imm as u32);
        let data = self.x.get(f.rs2);
        match f.funct3 {
            FUNCT3_B => self.io.write_byte(&mut self.userdata, addr, data),
            FUNCT3_H => self.io.write_half(&mut self.userdata, addr, data),
            FUNCT3_W => self.io.write_word(&mut self.userdata, addr, data),
            _ => return Err(Exception::IllegalInstruction(instr)),
        }
        self.advance();
        Ok(())
    }

    fn exec_op_imm(&mut self, instr: u32) -> Result<(), Exception> {
        let f = decode_itype(instr);
        let src = self.x.get(f.rs1);
        let shamt = (f.imm as u32) & 0x1f;
        let value = match f.funct3 {
            FUNCT3_ADDI => src.wrapping_add(f.imm as u32),
            FUNCT3_SLTI => ((src as i32) < f.imm) as u32,
            FUNCT3_SLTIU => (src < (f.imm as u32)) as u32,
            FUNCT3_XORI => src ^ (f.imm as u32),
            FUNCT3_ORI => src | (f.imm as u32),
            FUNCT3_ANDI => src & (f.imm as u32),
            FUNCT3_SLLI => src << shamt,
            FUNCT3_SRLI_SRAI => {
                // Distinguished by funct7 (instruction bit 30), not by
                // whether the immediate happens to be nonzero: a
                // SRAI with shamt == 0 must still behave as an
                // arithmetic shift.
                if (instr >> 30) & 1 == 0 {
                    src >> shamt
                } else {
                    ((src as i32) >> shamt) as u32
                }
            }
            _ => return Err(Exception::IllegalInstruction(instr)),
        };
        self.x.set(f.rd, value);
        self.advance();
        Ok(())
    }

    fn exec_op(&mut self, instr: u32) -> Result<(), Exception> {
        let f = decode_rtype(instr);
        let src1 = self.x.get(f.rs1);
        let src2 = self.x.get(f.rs2);
        let shamt = src2 & 0x1f;
        let alt = f.funct7 == FUNCT7_ALT;
        let value = match (f.funct3, alt) {
            (FUNCT3_ADD_SUB, false) => src1.wrapping_add(src2),
            (FUNCT3_ADD_SUB, true) => src1.wrapping_sub(src2),
            (FUNCT3_SLL, false) => src1 << shamt,
            (FUNCT3_SLT, false) => ((src1 as i32) < (src2 as i32)) as u32,
            (FUNCT3_SLTU, false) => (src1 < src2) as u32,
            (FUNCT3_XOR, false) => src1 ^ src2,
            (FUNCT3_SRL_SRA, false) => src1 >> shamt,
            (FUNCT3_SRL_SRA, true) => ((src1 as i32) >> shamt) as u32,
            (FUNCT3_OR, false) => src1 | src2,
            (FUNCT3_AND, false) => src1 & src2,
            _ => return Err(Exception::IllegalInstruction(instr)),
        };
        self.x.set(f.rd, value);
        self.advance();
        Ok(())
    }

    fn exec_lui(&mut self, instr: u32) -> Result<(), Exception> {
        let f = decode_utype(instr);
        self.x.set(f.rd, f.imm as u32);
        self.advance();
        Ok(())
    }

    fn exec_auipc(&mut self, instr: u32) -> Result<(), Exception> {
        let f = decode_utype(instr);
        self.x.set(f.rd, self.pc.wrapping_add(f.imm as u32));
        self.advance();
        Ok(())
    }

    fn exec_branch(&mut self, instr: u32) -> Result<(), Exception> {
        let f = decode_btype(instr);
        let src1 = self.x.get(f.rs1);
        let src2 = self.x.get(f.rs2);
        let taken = match f.funct3 {
            FUNCT3_BEQ => src1 == src2,
            FUNCT3_BNE => src1 != src2,
            FUNCT3_BLT => (src1 as i32) < (src2 as i32),
            FUNCT3_BGE => (src1 as i32) >= (src2 as i32),
            FUNCT3_BLTU => src1 < src2,
            FUNCT3_BGEU => src1 >= src2,
            _ => return Err(Exception::IllegalInstruction(instr)),
        };
        if taken {
            self.jump_relative(f.imm)
        } else {
            self.advance();
            Ok(())
        }
    }

    fn exec_jal(&mut self, instr: u32) -> Result<(), Exception> {
        let f = decode_jtype(instr);
        let return_address = self.pc.wrapping_add(4);
        self.jump_relative(f.imm)?;
        self.x.set(f.rd, return_address);
        Ok(())
    }

    fn exec_jalr(&mut self, instr: u32) -> Result<(), Exception> {
        let f = decode_itype(instr);
        let base = self.x.get(f.rs1);
        let return_address = self.pc.wrapping_add(4);
        let target_pc = base.wrapping_add(f.imm as u32) & !1u32;
        self.jump_to(target_pc)?;
        self.x.set(f.rd, return_address);
        Ok(())
    }

    fn exec_misc_mem(&mut self, _instr: u32) -> Result<(), Exception> {
        // FENCE is a no-op at this level of simulation.
        self.advance();
        Ok(())
    }

    fn exec_system(&mut self, instr: u32) -> Result<(), Exception> {
        let f = decode_itype(instr);
        self.advance();
        match f.imm {
            i if i == SYSTEM_ECALL as i32 => Err(Exception::EnvironmentCall),
            i if i == SYSTEM_EBREAK as i32 => Err(Exception::Breakpoint),
            _ => Err(Exception::IllegalInstruction(instr)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::{btype, itype, jtype};

    /// A byte-addressed host memory backed by a `Vec<u8>`, used only by
    /// the tests in this module. A fuller in-memory host (with a UART
    /// or similar) belongs to a demo binary, not the core crate.
    struct VecMemory;

    impl HostIo<Vec<u8>> for VecMemory {
        fn read_byte(&mut self, mem: &mut Vec<u8>, addr: u32) -> u32 {
            *mem.get(addr as usize).unwrap_or(&0) as u32
        }
        fn read_half(&mut self, mem: &mut Vec<u8>, addr: u32) -> u32 {
            self.read_byte(mem, addr) | (self.read_byte(mem, addr + 1) << 8)
        }
        fn read_word(&mut self, mem: &mut Vec<u8>, addr: u32) -> u32 {
            self.read_half(mem, addr) | (self.read_half(mem, addr + 2) << 16)
        }
        fn write_byte(&mut self, mem: &mut Vec<u8>, addr: u32, value: u32) {
            let addr = addr as usize;
            if mem.len() <= addr {
                mem.resize(addr + 1, 0);
            }
            mem[addr] = value as u8;
        }
        fn write_half(&mut self, mem: &mut Vec<u8>, addr: u32, value: u32) {
            self.write_byte(mem, addr, value & 0xff);
            self.write_byte(mem, addr + 1, (value >> 8) & 0xff);
        }
        fn write_word(&mut self, mem: &mut Vec<u8>, addr: u32, value: u32) {
            self.write_half(mem, addr, value & 0xffff);
            self.write_half(mem, addr + 2, (value >> 16) & 0xffff);
        }
    }

    fn machine_with(program: &[u32]) -> Rv32i<Vec<u8>, VecMemory> {
        machine_at(0, program)
    }

    fn machine_at(start_pc: u32, program: &[u32]) -> Rv32i<Vec<u8>, VecMemory> {
        let mut mem = Vec::new();
        for (i, &word) in program.iter().enumerate() {
            VecMemory.write_word(&mut mem, start_pc + (i * 4) as u32, word);
        }
        let mut rv = Rv32i::create(VecMemory, mem);
        rv.set_pc(start_pc);
        rv
    }

    #[test]
    fn addi_loads_a_small_immediate() {
        // ADDI x1, x0, 5
        let mut rv = machine_with(&[0x0050_0093]);
        rv.step().unwrap();
        assert_eq!(rv.reg(1), 5);
        assert_eq!(rv.pc(), 4);
    }

    #[test]
    fn lui_sets_the_upper_bits() {
        // LUI x2, 0x12345
        let mut rv = machine_with(&[0x1234_5137]);
        rv.step().unwrap();
        assert_eq!(rv.reg(2), 0x1234_5000);
    }

    #[test]
    fn branch_sequence_counts_down_to_zero_then_jumps() {
        use crate::opcodes::{FUNCT3_ADDI, FUNCT3_BEQ, OP_BRANCH, OP_IMM};
        let program = [
            itype(1, 0, FUNCT3_ADDI, 1, OP_IMM),   // addi x1, x0, 1
            itype(-1, 1, FUNCT3_ADDI, 1, OP_IMM),  // addi x1, x1, -1
            btype(8, 0, 1, FUNCT3_BEQ, OP_BRANCH),  // beq x1, x0, +8
        ];
        let mut rv = machine_with(&program);
        rv.step().unwrap();
        rv.step().unwrap();
        rv.step().unwrap();
        assert_eq!(rv.reg(1), 0);
        assert_eq!(rv.pc(), 16);
    }

    #[test]
    fn jal_links_and_jumps() {
        use crate::opcodes::OP_JAL;
        let mut rv = machine_at(0x100, &[jtype(8, 1, OP_JAL)]);
        rv.step().unwrap();
        assert_eq!(rv.reg(1), 0x104);
        assert_eq!(rv.pc(), 0x108);
    }

    #[test]
    fn jalr_computes_the_link_before_overwriting_rd_even_when_rd_is_rs1() {
        use crate::opcodes::OP_JALR;
        let mut rv = machine_at(0x50, &[itype(0, 1, 0, 1, OP_JALR)]);
        rv.set_reg(1, 0x200);
        rv.step().unwrap();
        assert_eq!(rv.reg(1), 0x54);
        assert_eq!(rv.pc(), 0x200);
    }

    #[test]
    fn set_reg_zero_is_discarded_at_the_next_step_boundary() {
        // ADDI x2, x0, 0 — any instruction that doesn't touch x0.
        let mut rv = machine_with(&[0x0000_0113]);
        rv.set_reg(0, 42);
        assert_eq!(rv.reg(0), 42);
        rv.step().unwrap();
        assert_eq!(rv.reg(0), 0);
    }

    #[test]
    fn lb_sign_extends_and_lbu_zero_extends() {
        use crate::opcodes::{FUNCT3_B, FUNCT3_BU, OP_LOAD};
        let mut rv = machine_with(&[
            itype(100, 0, FUNCT3_B, 3, OP_LOAD),
            itype(100, 0, FUNCT3_BU, 4, OP_LOAD),
        ]);
        rv.userdata_mut().resize(101, 0);
        rv.userdata_mut()[100] = 0xff;
        rv.step().unwrap();
        assert_eq!(rv.reg(3), 0xffff_ffff);
        rv.step().unwrap();
        assert_eq!(rv.reg(4), 0x0000_00ff);
    }

    #[test]
    fn srli_with_a_nonzero_immediate_stays_logical() {
        use crate::opcodes::{FUNCT3_ADDI, FUNCT3_SRLI_SRAI, OP_IMM};
        // addi x1, x0, -1 ; srli x1, x1, 1 — selector bit 30 is clear, so
        // this must shift logically even though the immediate is nonzero
        // (a selector that checked "imm == 0" instead of bit 30 would get
        // this wrong and shift arithmetically, leaving the top bit set).
        let srli = itype(1, 1, FUNCT3_SRLI_SRAI, 1, OP_IMM);
        let mut rv = machine_with(&[itype(-1, 0, FUNCT3_ADDI, 1, OP_IMM), srli]);
        rv.step().unwrap();
        rv.step().unwrap();
        assert_eq!(rv.reg(1), 0x7fff_ffff);
    }

    #[test]
    fn srai_is_arithmetic_even_with_a_zero_shift_amount() {
        use crate::opcodes::{FUNCT3_ADDI, FUNCT3_SRLI_SRAI, OP_IMM};
        // addi x1, x0, -1 ; srai x1, x1, 0 — selector bit 30 is set, so
        // this must shift arithmetically even though the shift amount
        // itself is zero.
        let srai = itype(0, 1, FUNCT3_SRLI_SRAI, 1, OP_IMM) | (1 << 30);
        let mut rv = machine_with(&[itype(-1, 0, FUNCT3_ADDI, 1, OP_IMM), srai]);
        rv.step().unwrap();
        rv.step().unwrap();
        assert_eq!(rv.reg(1), 0xffff_ffff);
    }

    #[test]
    fn bge_uses_greater_than_or_equal_not_strict_greater_than() {
        use crate::opcodes::{FUNCT3_BGE, OP_BRANCH};
        let mut rv = machine_with(&[btype(8, 0, 0, FUNCT3_BGE, OP_BRANCH)]);
        // x0 >= x0: equal operands must take a BGE/BGEU branch.
        rv.step().unwrap();
        assert_eq!(rv.pc(), 8);
    }

    #[test]
    fn branch_to_a_misaligned_target_raises_an_exception() {
        use crate::opcodes::{FUNCT3_BEQ, OP_BRANCH};
        let mut rv = machine_with(&[btype(2, 0, 0, FUNCT3_BEQ, OP_BRANCH)]);
        let err = rv.step().unwrap_err();
        assert_eq!(err, Exception::InstructionAddressMisaligned(2));
    }

    #[test]
    fn illegal_opcode_is_reported_not_panicked() {
        let mut rv = machine_with(&[0xffff_ffff]);
        let err = rv.step().unwrap_err();
        assert!(matches!(err, Exception::IllegalInstruction(_)));
    }

    #[test]
    fn ecall_and_ebreak_advance_pc_then_report_to_the_host() {
        use crate::opcodes::OP_SYSTEM;
        let mut rv = machine_with(&[itype(0, 0, 0, 0, OP_SYSTEM), itype(1, 0, 0, 0, OP_SYSTEM)]);
        let err = rv.step().unwrap_err();
        assert_eq!(err, Exception::EnvironmentCall);
        assert_eq!(rv.pc(), 4);
        rv.set_pc(4);
        let err = rv.step().unwrap_err();
        assert_eq!(err, Exception::Breakpoint);
        assert_eq!(rv.pc(), 8);
    }

    #[test]
    fn exception_is_polled_from_machine_state_and_cleared_by_the_next_step() {
        use crate::opcodes::{FUNCT3_ADDI, OP_IMM, OP_SYSTEM};
        let mut rv = machine_with(&[itype(0, 0, 0, 0, OP_SYSTEM), itype(0, 0, FUNCT3_ADDI, 1, OP_IMM)]);
        assert_eq!(rv.exception(), None);
        rv.step().unwrap_err();
        assert_eq!(rv.exception(), Some(Exception::EnvironmentCall));
        rv.step().unwrap();
        assert_eq!(rv.exception(), None);
    }

    #[test]
    fn shift_amounts_are_masked_to_five_bits() {
        use crate::encode::rtype;
        use crate::opcodes::{FUNCT3_ADDI, FUNCT3_SLL, OP, OP_IMM};
        // x1 = 0xffffffff (via addi x1, x0, -1); x2 = 33 (shift amount,
        // masked to 1); sll x3, x1, x2 must equal x1 << 1, not undefined.
        let program = [
            itype(-1, 0, FUNCT3_ADDI, 1, OP_IMM),
            itype(33, 0, FUNCT3_ADDI, 2, OP_IMM),
            rtype(0, 2, 1, FUNCT3_SLL, 3, OP),
        ];
        let mut rv = machine_with(&program);
        rv.step().unwrap();
        rv.step().unwrap();
        rv.step().unwrap();
        assert_eq!(rv.reg(3), 0xffff_fffe);
    }

    #[test]
    fn reset_zeroes_registers_and_pc() {
        let mut rv = machine_with(&[0x0050_0093]);
        rv.step().unwrap();
        rv.reset();
        for i in 0..32 {
            assert_eq!(rv.reg(i), 0);
        }
        assert_eq!(rv.pc(), 0);
    }
}
