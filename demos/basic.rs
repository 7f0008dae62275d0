//! Minimal embedding example: a host that backs memory with a flat byte
//! vector and runs a handful of instructions to completion.

use riscvemu::encode::{itype, jtype};
use riscvemu::memory::HostIo;
use riscvemu::opcodes::{FUNCT3_ADDI, OP_IMM, OP_JAL};
use riscvemu::Rv32i;

struct FlatMemory;

impl HostIo<Vec<u8>> for FlatMemory {
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

fn main() {
    let program = [
        itype(10, 0, FUNCT3_ADDI, 1, OP_IMM), // addi x1, x0, 10
        itype(20, 0, FUNCT3_ADDI, 2, OP_IMM), // addi x2, x0, 20
        jtype(8, 0, OP_JAL),                  // jal x0, +8 (skip one instruction)
        itype(0, 0, FUNCT3_ADDI, 3, OP_IMM),  // addi x3, x0, 0 (skipped)
    ];
    let mut mem = Vec::new();
    for (i, &word) in program.iter().enumerate() {
        FlatMemory.write_word(&mut mem, (i * 4) as u32, word);
    }

    let mut rv = Rv32i::create(FlatMemory, mem);
    loop {
        match rv.step() {
            Ok(()) => {}
            Err(exception) => {
                println!("stopped at pc=0x{:08x}: {exception}", rv.pc());
                break;
            }
        }
        if rv.pc() as usize >= program.len() * 4 {
            break;
        }
    }

    println!("x1 = {}", rv.reg(1));
    println!("x2 = {}", rv.reg(2));
    println!("x3 = {} (never executed, skipped by the jal)", rv.reg(3));
}
