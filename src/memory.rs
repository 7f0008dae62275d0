//! The host memory-access interface.
//!
//! The core has no memory of its own: every load and store is forwarded
//! to the embedder through this trait, the idiomatic Rust shape for
//! "host supplies behavior, core calls back into it" in place of a
//! struct of raw function pointers.
//!
//! `userdata` is threaded through explicitly rather than bundled inside
//! `Self`, so that one `HostIo` implementation can be shared by machines
//! with different opaque userdata, and so `Rv32i::userdata` can return
//! it without borrowing through the trait object.
//!
//! No alignment enforcement is promised to the host: addresses are
//! passed through exactly as computed by the handler.

pub trait HostIo<U> {
    /// Zero-extended 8-bit read.
    fn read_byte(&mut self, userdata: &mut U, addr: u32) -> u32;
    /// Zero-extended 16-bit read.
    fn read_half(&mut self, userdata: &mut U, addr: u32) -> u32;
    /// 32-bit read.
    fn read_word(&mut self, userdata: &mut U, addr: u32) -> u32;

    /// Store the low 8 bits of `value`.
    fn write_byte(&mut self, userdata: &mut U, addr: u32, value: u32);
    /// Store the low 16 bits of `value`.
    fn write_half(&mut self, userdata: &mut U, addr: u32, value: u32);
    /// Store all 32 bits of `value`.
    fn write_word(&mut self, userdata: &mut U, addr: u32, value: u32);
}
