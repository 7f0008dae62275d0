//! Opcode dispatch index.
//!
//! Opcode bits `[6:2]` are the five bits of the seven-bit opcode field
//! that actually vary under RV32I (bits `[1:0]` are always `11`). They
//! form a dense 32-entry index space; [`crate::rv32i::Rv32i::step`]
//! switches on this index directly rather than re-matching the full
//! seven-bit opcode: a total mapping with illegal slots explicit,
//! rather than a sparse match on the raw opcode value.

use thiserror::Error;

use crate::opcodes::*;
use crate::utils::extract_field;

pub fn dispatch_index(instr: u32) -> u32 {
    extract_field(instr, 6, 2)
}

/// Raised when an opcode's dispatch index selects an empty handler
/// slot — the "opcode index selects an empty handler slot" half of
/// §7's `IllegalInstruction` condition. The other half (a known opcode
/// whose `funct3`/`funct7` switch falls through) is reported directly
/// by the handler that owns that switch, in [`crate::rv32i`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("no RV32I handler for opcode dispatch index {index} (instruction 0x{instr:08x})")]
    UnhandledOpcode { instr: u32, index: u32 },
}

/// The 32-entry index space RV32I actually populates. Anything outside
/// this set is an empty handler slot.
const KNOWN_INDICES: [u32; 11] = [
    OP_LOAD >> 2,
    OP_MISC_MEM >> 2,
    OP_IMM >> 2,
    OP_AUIPC >> 2,
    OP_STORE >> 2,
    OP >> 2,
    OP_LUI >> 2,
    OP_BRANCH >> 2,
    OP_JALR >> 2,
    OP_JAL >> 2,
    OP_SYSTEM >> 2,
];

/// Resolve `instr`'s dispatch index, failing with [`DecodeError`] if it
/// selects a slot with no RV32I handler. [`crate::rv32i::Rv32i::step`]
/// calls this before dispatching so the "empty slot" case is reported
/// from the decode layer rather than folded into the handler match's
/// catch-all arm.
pub fn decode_opcode(instr: u32) -> Result<u32, DecodeError> {
    let index = dispatch_index(instr);
    if KNOWN_INDICES.contains(&index) {
        Ok(index)
    } else {
        Err(DecodeError::UnhandledOpcode { instr, index })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_drops_the_fixed_low_bits() {
        assert_eq!(dispatch_index(OP_LOAD), OP_LOAD >> 2);
        assert_eq!(dispatch_index(OP_LUI), OP_LUI >> 2);
    }

    #[test]
    fn index_is_insensitive_to_upper_fields() {
        let a = dispatch_index(OP_IMM);
        let b = dispatch_index(OP_IMM | (5 << 15) | (0x123 << 20));
        assert_eq!(a, b);
    }

    #[test]
    fn decode_opcode_accepts_every_known_rv32i_opcode() {
        for opcode in [
            OP_LOAD, OP_MISC_MEM, OP_IMM, OP_AUIPC, OP_STORE, OP, OP_LUI, OP_BRANCH, OP_JALR,
            OP_JAL, OP_SYSTEM,
        ] {
            assert!(decode_opcode(opcode).is_ok(), "opcode {opcode:#09b} should decode");
        }
    }

    #[test]
    fn decode_opcode_rejects_an_empty_handler_slot() {
        // opcode 0b0000111 (FLW, an RV32F load) has dispatch index 1,
        // which no RV32I handler occupies.
        let instr = 0b0000111;
        let err = decode_opcode(instr).unwrap_err();
        assert_eq!(err, DecodeError::UnhandledOpcode { instr, index: 1 });
    }
}
