//! Instruction word assembly — the inverse of [`crate::fields`].
//!
//! This is test and demo tooling, not part of the simulator's public
//! embedding surface: it exists so that test vectors and the `demos/`
//! examples can build instruction words from mnemonic-shaped arguments
//! instead of hand-packed hex literals.

use crate::utils::mask;

fn low_bits(imm: i32, width: u32) -> u32 {
    (imm as u32) & mask(width)
}

pub fn rtype(funct7: u32, rs2: u8, rs1: u8, funct3: u32, rd: u8, opcode: u32) -> u32 {
    (funct7 & mask(7)) << 25
        | (rs2 as u32) << 20
        | (rs1 as u32) << 15
        | (funct3 & mask(3)) << 12
        | (rd as u32) << 7
        | (opcode & mask(7))
}

pub fn itype(imm: i32, rs1: u8, funct3: u32, rd: u8, opcode: u32) -> u32 {
    low_bits(imm, 12) << 20
        | (rs1 as u32) << 15
        | (funct3 & mask(3)) << 12
        | (rd as u32) << 7
        | (opcode & mask(7))
}

pub fn stype(imm: i32, rs2: u8, rs1: u8, funct3: u32, opcode: u32) -> u32 {
    let imm = low_bits(imm, 12);
    (imm >> 5) << 25
        | (rs2 as u32) << 20
        | (rs1 as u32) << 15
        | (funct3 & mask(3)) << 12
        | (imm & mask(5)) << 7
        | (opcode & mask(7))
}

pub fn btype(imm: i32, rs2: u8, rs1: u8, funct3: u32, opcode: u32) -> u32 {
    let imm = low_bits(imm, 13);
    ((imm >> 12) & 1) << 31
        | ((imm >> 5) & mask(6)) << 25
        | (rs2 as u32) << 20
        | (rs1 as u32) << 15
        | (funct3 & mask(3)) << 12
        | ((imm >> 1) & mask(4)) << 8
        | ((imm >> 11) & 1) << 7
        | (opcode & mask(7))
}

pub fn utype(imm: u32, rd: u8, opcode: u32) -> u32 {
    (imm & 0xffff_f000) | (rd as u32) << 7 | (opcode & mask(7))
}

pub fn jtype(imm: i32, rd: u8, opcode: u32) -> u32 {
    let imm = low_bits(imm, 21);
    ((imm >> 20) & 1) << 31
        | ((imm >> 12) & mask(8)) << 12
        | ((imm >> 11) & 1) << 20
        | ((imm >> 1) & mask(10)) << 21
        | (rd as u32) << 7
        | (opcode & mask(7))
}
