//! Declarative big-endian binary schemas.
//!
//! Everything the file sections are made of implements [`Unpack`] (read
//! from a [`Cur`]) and [`Pack`] (written to an [`Out`]). Types whose
//! encoding always has the same length also implement [`FixedSize`];
//! only those can be nested inside a [`record!`].

pub mod cur;
pub mod out;
#[macro_use]
pub mod record;
#[macro_use]
pub mod fixed;
pub mod list;
pub mod names;
pub mod pool;
pub mod string;

pub use self::cur::Cur;
pub use self::out::{Out, Padding};

use crate::errors::Result;
use std::convert::TryInto;

pub trait Unpack: Sized {
    fn unpack(cur: &mut Cur) -> Result<Self>;
}

pub trait Pack {
    fn pack(&self, out: &mut Out) -> Result<()>;
}

/// Encoded size in bytes, known without looking at a value.
pub trait FixedSize {
    const SIZE: usize;
}

macro_rules! scalar {
    ($t:ty, $n:expr) => {
        impl Unpack for $t {
            #[inline]
            fn unpack(cur: &mut Cur) -> Result<$t> {
                let mut bytes = [0; $n];
                bytes.copy_from_slice(cur.next_n_u8s($n)?);
                Ok(<$t>::from_be_bytes(bytes))
            }
        }

        impl Pack for $t {
            #[inline]
            fn pack(&self, out: &mut Out) -> Result<()> {
                out.write_bytes(&self.to_be_bytes());
                Ok(())
            }
        }

        impl FixedSize for $t {
            const SIZE: usize = $n;
        }
    };
}

scalar!(u8, 1);
scalar!(i8, 1);
scalar!(u16, 2);
scalar!(i16, 2);
scalar!(u32, 4);
scalar!(i32, 4);
scalar!(u64, 8);
scalar!(i64, 8);
scalar!(f32, 4);
scalar!(f64, 8);

impl Unpack for bool {
    fn unpack(cur: &mut Cur) -> Result<bool> {
        let pos = cur.pos();
        match cur.next::<u8>()? {
            0 => Ok(false),
            1 => Ok(true),
            x => Err(cur.error_at(pos, format!("invalid bool {:#x}", x))),
        }
    }
}

impl Pack for bool {
    fn pack(&self, out: &mut Out) -> Result<()> {
        (*self as u8).pack(out)
    }
}

impl FixedSize for bool {
    const SIZE: usize = 1;
}

impl<T: Unpack, const N: usize> Unpack for [T; N] {
    fn unpack(cur: &mut Cur) -> Result<[T; N]> {
        let pos = cur.pos();
        let mut v = Vec::with_capacity(N);
        for _ in 0..N {
            v.push(cur.next()?);
        }
        v.try_into().map_err(|_| cur.error_at(pos, "array length mismatch"))
    }
}

impl<T: Pack, const N: usize> Pack for [T; N] {
    fn pack(&self, out: &mut Out) -> Result<()> {
        for x in self.iter() {
            x.pack(out)?;
        }
        Ok(())
    }
}

impl<T: FixedSize, const N: usize> FixedSize for [T; N] {
    const SIZE: usize = T::SIZE * N;
}

/// Types with a reserved raw value meaning "absent", so that `Option<T>`
/// can be stored in the same space as `T`.
pub trait Sentinel: Sized {
    fn is_none_raw(cur: &Cur) -> Result<bool>;
    fn pack_none(out: &mut Out) -> Result<()>;
}

impl Sentinel for u8 {
    fn is_none_raw(cur: &Cur) -> Result<bool> {
        Ok(cur.peek::<u8>()? == 0xFF)
    }
    fn pack_none(out: &mut Out) -> Result<()> {
        0xFFu8.pack(out)
    }
}

impl Sentinel for u16 {
    fn is_none_raw(cur: &Cur) -> Result<bool> {
        Ok(cur.peek::<u16>()? == 0xFFFF)
    }
    fn pack_none(out: &mut Out) -> Result<()> {
        0xFFFFu16.pack(out)
    }
}

impl<T: Sentinel + Unpack> Unpack for Option<T> {
    fn unpack(cur: &mut Cur) -> Result<Option<T>> {
        if T::is_none_raw(cur)? {
            cur.next::<T>().ok();
            return Ok(None);
        }
        Ok(Some(cur.next()?))
    }
}

impl<T: Sentinel + Pack> Pack for Option<T> {
    fn pack(&self, out: &mut Out) -> Result<()> {
        match *self {
            Some(ref x) => x.pack(out),
            None => T::pack_none(out),
        }
    }
}

impl<T: Sentinel + FixedSize> FixedSize for Option<T> {
    const SIZE: usize = T::SIZE;
}

/// Round `x` up to a multiple of `n`.
pub fn align_up(x: usize, n: usize) -> usize {
    (x + n - 1) / n * n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_are_big_endian() {
        let mut out = Out::new();
        0x1234u16.pack(&mut out).unwrap();
        (-2i32).pack(&mut out).unwrap();
        1.0f32.pack(&mut out).unwrap();
        assert_eq!(out.bytes(), &[0x12, 0x34, 0xFF, 0xFF, 0xFF, 0xFE, 0x3F, 0x80, 0, 0]);

        let buf = out.into_inner();
        let mut cur = Cur::new(&buf);
        assert_eq!(cur.next::<u16>().unwrap(), 0x1234);
        assert_eq!(cur.next::<i32>().unwrap(), -2);
        assert_eq!(cur.next::<f32>().unwrap(), 1.0);
        assert!(cur.next::<u8>().is_err());
    }

    #[test]
    fn sentinel_option() {
        let buf = [0xFF, 0xFF, 0x00, 0x07];
        let mut cur = Cur::new(&buf);
        assert_eq!(cur.next::<Option<u16>>().unwrap(), None);
        assert_eq!(cur.next::<Option<u16>>().unwrap(), Some(7));
        assert_eq!(<Option<u16> as FixedSize>::SIZE, 2);
    }

    #[test]
    fn bad_bool_reports_position() {
        let buf = [0, 1, 2];
        let mut cur = Cur::new(&buf);
        let xs: [bool; 2] = cur.next().unwrap();
        assert_eq!(xs, [false, true]);
        match cur.next::<bool>().unwrap_err().kind() {
            crate::errors::ErrorKind::Format(pos, _) => assert_eq!(*pos, 2),
            k => panic!("wrong error {:?}", k),
        }
    }
}
