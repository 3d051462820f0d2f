//! Reading and writing bitfields of integers.
//!
//! If `x` is an unsigned integer, `x.bits(lo, hi)` is a number of
//! the same type with the bits of `x` in the range [`lo`, `hi`) in
//! its low part, and `x.with_bits(lo, hi, v)` is `x` with that range
//! replaced by the low bits of `v`.
//!
//! # Examples
//! ```ignore
//! let x = 0xabcdef00u32;
//! assert_eq!(x.bits(8, 16), 0xef);
//! assert_eq!(x.with_bits(8, 16, 0x12), 0xabcd1200);
//! ```

pub trait BitField: Sized {
    fn bits(self, lo: u32, hi: u32) -> Self;
    fn with_bits(self, lo: u32, hi: u32, v: Self) -> Self;
}

macro_rules! def_bitfield {
    ($t:ty, $bitwidth:expr) => {
        impl BitField for $t {
            #[inline(always)]
            fn bits(self, lo: u32, hi: u32) -> $t {
                assert!(lo <= hi);
                assert!(hi <= $bitwidth);
                if hi == lo { return 0; }
                (self >> lo) & (!0 >> ($bitwidth - (hi - lo)))
            }

            #[inline(always)]
            fn with_bits(self, lo: u32, hi: u32, v: $t) -> $t {
                assert!(lo <= hi);
                assert!(hi <= $bitwidth);
                if hi == lo { return self; }
                let mask: $t = (!0 >> ($bitwidth - (hi - lo))) << lo;
                (self & !mask) | ((v << lo) & mask)
            }
        }
    }
}

def_bitfield!(u8, 8);
def_bitfield!(u16, 16);
def_bitfield!(u32, 32);

#[test]
fn test() {
    let x = 0xabcdef00u32;
    assert_eq!(x.bits(8, 16), 0xef);
    assert_eq!(x.bits(16, 28), 0xbcd);
    assert_eq!(x.bits(0, 32), x);
    assert_eq!(x.with_bits(8, 16, 0x12), 0xabcd1200);
    assert_eq!(0u32.with_bits(24, 32, 0x61), 0x61000000);
    assert_eq!(0u8.with_bits(0, 3, 0xFF), 7);
}
