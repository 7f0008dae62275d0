//! The exception channel.
//!
//! Every condition a handler can run into — an unrecognized opcode, a
//! misaligned jump target, ECALL, EBREAK — is surfaced here to the host
//! through `step`'s return value instead of a panic or a silently
//! skipped step, with one `thiserror` enum covering the whole set.

use thiserror::Error;

use crate::decode::DecodeError;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exception {
    /// The opcode index selects an empty handler slot, or a handler's
    /// `funct3`/`funct7` switch fell through with no match.
    #[error("illegal instruction 0x{0:08x}")]
    IllegalInstruction(u32),

    /// A branch, JAL or JALR target has its low two bits set.
    #[error("instruction address misaligned: target 0x{0:08x}")]
    InstructionAddressMisaligned(u32),

    /// ECALL was executed.
    #[error("environment call")]
    EnvironmentCall,

    /// EBREAK was executed.
    #[error("breakpoint")]
    Breakpoint,
}

impl From<DecodeError> for Exception {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::UnhandledOpcode { instr, .. } => Exception::IllegalInstruction(instr),
        }
    }
}
