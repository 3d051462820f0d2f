//! Fixed-point fields: an integer on disk, a float in memory.

/// Declares a newtype over `f32` stored as the integer type `$raw`
/// scaled by `$scale`. Unpacking multiplies; packing divides and rounds
/// to the nearest integer, failing when the result doesn't fit.
macro_rules! fixed_point {
    ($(#[$attr:meta])* pub struct $name:ident($raw:ty) * $scale:expr;) => {
        $(#[$attr])*
        #[derive(Copy, Clone, Debug, Default, PartialEq, PartialOrd)]
        pub struct $name(pub f32);

        impl $name {
            pub const SCALE: f64 = $scale;

            pub fn from_raw(raw: $raw) -> $name {
                $name((raw as f64 * Self::SCALE) as f32)
            }

            pub fn to_raw(self) -> Option<$raw> {
                let x = (self.0 as f64 / Self::SCALE).round();
                if x < <$raw>::MIN as f64 || x > <$raw>::MAX as f64 {
                    None
                } else {
                    Some(x as $raw)
                }
            }
        }

        impl $crate::binary::Unpack for $name {
            fn unpack(cur: &mut $crate::binary::Cur) -> $crate::errors::Result<$name> {
                Ok($name::from_raw(cur.next::<$raw>()?))
            }
        }

        impl $crate::binary::Pack for $name {
            fn pack(&self, out: &mut $crate::binary::Out) -> $crate::errors::Result<()> {
                match self.to_raw() {
                    Some(raw) => $crate::binary::Pack::pack(&raw, out),
                    None => bail!("{} out of range for {}: {}",
                        stringify!($name), stringify!($raw), self.0),
                }
            }
        }

        impl $crate::binary::FixedSize for $name {
            const SIZE: usize = <$raw as $crate::binary::FixedSize>::SIZE;
        }

        impl From<f32> for $name {
            fn from(x: f32) -> $name { $name(x) }
        }

        impl From<$name> for f32 {
            fn from(x: $name) -> f32 { x.0 }
        }
    };
}

fixed_point! {
    /// Rotation in degrees; ±32767 is ±180.
    pub struct Angle(i16) * 180.0 / 32767.0;
}

fixed_point! {
    /// Texture LOD bias, in hundredths.
    pub struct LodBias(i16) * 0.01;
}

fixed_point! {
    /// Texture min/max LOD, in eighths.
    pub struct Lod(i8) * 0.125;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::{Cur, Out, Pack};

    #[test]
    fn angle() {
        let buf = [0x7F, 0xFF, 0x80, 0x01, 0x40, 0x00];
        let mut cur = Cur::new(&buf);
        assert_eq!(cur.next::<Angle>().unwrap().0, 180.0);
        assert_eq!(cur.next::<Angle>().unwrap().0, -180.0);
        assert!((cur.next::<Angle>().unwrap().0 - 90.0027).abs() < 1e-4);

        let mut out = Out::new();
        Angle(180.0).pack(&mut out).unwrap();
        Angle(-180.0).pack(&mut out).unwrap();
        Angle(0.0).pack(&mut out).unwrap();
        assert_eq!(out.bytes(), &[0x7F, 0xFF, 0x80, 0x01, 0x00, 0x00]);
        assert_eq!(Angle(180.1).to_raw(), None);
    }

    #[test]
    fn angle_reencodes_to_the_same_raw() {
        for &raw in &[1i16, 100, 16384, -12345, 32767] {
            assert_eq!(Angle::from_raw(raw).to_raw(), Some(raw));
        }
    }

    #[test]
    fn rounds_to_nearest() {
        assert_eq!(LodBias(0.304).to_raw(), Some(30));
        assert_eq!(LodBias(-0.306).to_raw(), Some(-31));
        assert_eq!(LodBias::from_raw(-31).to_raw(), Some(-31));
    }

    #[test]
    fn out_of_range_fails() {
        let mut out = Out::new();
        assert!(Lod(16.0).pack(&mut out).is_err());
        assert!(Lod(15.875).pack(&mut out).is_ok());
    }
}
