//! Small bit-manipulation helpers shared by the decoder and the IR builder.

use std::ops::{BitAnd, Shl, Shr};

use num::Integer;

/// Make an `n_bits`-long mask (all ones).
pub fn mask<T>(n_bits: T) -> T
where
    T: Integer + Shl<Output = T>,
{
    (T::one() << n_bits) - T::one()
}

/// Obtain `value[end:start]` (Verilog notation) from `value`.
pub fn extract_field<T>(value: T, end: T, start: T) -> T
where
    T: Copy + Integer + Shl<Output = T> + Shr<Output = T> + BitAnd<Output = T>,
{
    mask(end - start + T::one()) & (value >> start)
}

/// Take an unsigned value and a bit position for the sign bit, and copy
/// the value of that bit into all the higher bits of a 32-bit word.
pub fn sign_extend<T: Into<u32>>(value: T, sign_bit_position: u32) -> u32 {
    let value: u32 = value.into();
    let sign_bit = 1 & (value >> sign_bit_position);
    if sign_bit == 1 {
        let sign_extension = 0xffff_ffff - mask(sign_bit_position);
        value | sign_extension
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_makes_all_ones() {
        assert_eq!(mask::<u32>(0), 0);
        assert_eq!(mask::<u32>(1), 1);
        assert_eq!(mask::<u32>(5), 0b11111);
        // A full-width mask would require shifting a u32 by 32, which
        // overflows; extract_field never needs more than a 31-bit mask
        // (the widest field, imm_i's bits[31:20], is 12 bits) so this
        // only exercises the widths the decoders actually ask for.
        assert_eq!(mask::<u64>(32), 0xffff_ffff);
    }

    #[test]
    fn extract_field_pulls_out_a_slice() {
        let value: u32 = 0b1010_1100;
        assert_eq!(extract_field(value, 7, 4), 0b1010);
        assert_eq!(extract_field(value, 3, 0), 0b1100);
    }

    #[test]
    fn sign_extend_replicates_sign_bit() {
        assert_eq!(sign_extend(0xffu8, 7), 0xffff_ffff);
        assert_eq!(sign_extend(0x7fu8, 7), 0x0000_007f);
        assert_eq!(sign_extend(0x8000u16, 15), 0xffff_8000);
    }
}
