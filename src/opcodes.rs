//! RV32I opcode and funct3/funct7 constants.
//!
//! Values are the seven-bit `opcode` field exactly as they appear in the
//! unprivileged specification, not the five-bit dispatch index derived
//! from them (see [`crate::decode::dispatch_index`]).

pub const OP_LOAD: u32 = 0b0000011;
pub const OP_MISC_MEM: u32 = 0b0001111;
pub const OP_IMM: u32 = 0b0010011;
pub const OP_AUIPC: u32 = 0b0010111;
pub const OP_STORE: u32 = 0b0100011;
pub const OP: u32 = 0b0110011;
pub const OP_LUI: u32 = 0b0110111;
pub const OP_BRANCH: u32 = 0b1100011;
pub const OP_JALR: u32 = 0b1100111;
pub const OP_JAL: u32 = 0b1101111;
pub const OP_SYSTEM: u32 = 0b1110011;

// LOAD / STORE widths (funct3)
pub const FUNCT3_B: u32 = 0b000;
pub const FUNCT3_H: u32 = 0b001;
pub const FUNCT3_W: u32 = 0b010;
pub const FUNCT3_BU: u32 = 0b100;
pub const FUNCT3_HU: u32 = 0b101;

// BRANCH conditions (funct3)
pub const FUNCT3_BEQ: u32 = 0b000;
pub const FUNCT3_BNE: u32 = 0b001;
pub const FUNCT3_BLT: u32 = 0b100;
pub const FUNCT3_BGE: u32 = 0b101;
pub const FUNCT3_BLTU: u32 = 0b110;
pub const FUNCT3_BGEU: u32 = 0b111;

// OP-IMM (funct3)
pub const FUNCT3_ADDI: u32 = 0b000;
pub const FUNCT3_SLLI: u32 = 0b001;
pub const FUNCT3_SLTI: u32 = 0b010;
pub const FUNCT3_SLTIU: u32 = 0b011;
pub const FUNCT3_XORI: u32 = 0b100;
pub const FUNCT3_SRLI_SRAI: u32 = 0b101;
pub const FUNCT3_ORI: u32 = 0b110;
pub const FUNCT3_ANDI: u32 = 0b111;

// OP (funct3)
pub const FUNCT3_ADD_SUB: u32 = 0b000;
pub const FUNCT3_SLL: u32 = 0b001;
pub const FUNCT3_SLT: u32 = 0b010;
pub const FUNCT3_SLTU: u32 = 0b011;
pub const FUNCT3_XOR: u32 = 0b100;
pub const FUNCT3_SRL_SRA: u32 = 0b101;
pub const FUNCT3_OR: u32 = 0b110;
pub const FUNCT3_AND: u32 = 0b111;

// OP / OP-IMM funct7 selector bit (bit 30 of the instruction, i.e. bit
// 5 of funct7) distinguishes SUB from ADD and SRA from SRL.
pub const FUNCT7_ALT: u32 = 0b0100000;

// SYSTEM (imm field, since funct3 is always zero for ECALL/EBREAK)
pub const SYSTEM_ECALL: u32 = 0;
pub const SYSTEM_EBREAK: u32 = 1;
