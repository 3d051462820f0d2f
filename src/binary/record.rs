//! The `record!` macro: declare a struct together with its fixed-size
//! big-endian layout.
//!
//! ```ignore
//! record! {
//!     #[derive(Clone, Debug, PartialEq)]
//!     pub struct TevOrder {
//!         texcoord: Option<TexCoordId>,
//!         texture: Option<TexMapId>,
//!         color: Option<ChannelId>,
//!         pad(1),
//!     }
//! }
//! ```
//!
//! Fields are laid out in declaration order. `pad(n)` entries take up `n`
//! bytes (written as `0xFF`, skipped on read) but are not struct fields,
//! so they never take part in equality. Every field type must be
//! `FixedSize`; the record's size is the sum of its fields.

macro_rules! record {
    (@struct [$($attr:tt)*] $name:ident [$($fields:tt)*] pad($n:expr), $($rest:tt)*) => {
        record!(@struct [$($attr)*] $name [$($fields)*] $($rest)*);
    };
    (@struct [$($attr:tt)*] $name:ident [$($fields:tt)*]
        $(#[$fattr:meta])* $f:ident : $t:ty, $($rest:tt)*) => {
        record!(@struct [$($attr)*] $name [$($fields)* $(#[$fattr])* pub $f: $t,] $($rest)*);
    };
    (@struct [$($attr:tt)*] $name:ident [$($fields:tt)*]) => {
        $($attr)*
        pub struct $name { $($fields)* }
    };

    (@unpack $cur:ident $name:ident [$($done:ident)*] pad($n:expr), $($rest:tt)*) => {{
        $cur.next_n_u8s($n)?;
        record!(@unpack $cur $name [$($done)*] $($rest)*)
    }};
    (@unpack $cur:ident $name:ident [$($done:ident)*]
        $(#[$fattr:meta])* $f:ident : $t:ty, $($rest:tt)*) => {{
        let pos = $cur.pos();
        let $f: $t = $cur.next()?;
        trace!("{}.{}@{:#x}: {:?}", stringify!($name), stringify!($f), pos, $f);
        record!(@unpack $cur $name [$($done)* $f] $($rest)*)
    }};
    (@unpack $cur:ident $name:ident [$($done:ident)*]) => {
        Ok($name { $($done),* })
    };

    (@pack $self:ident $out:ident pad($n:expr), $($rest:tt)*) => {
        $out.pad($n);
        record!(@pack $self $out $($rest)*);
    };
    (@pack $self:ident $out:ident $(#[$fattr:meta])* $f:ident : $t:ty, $($rest:tt)*) => {
        $crate::binary::Pack::pack(&$self.$f, $out)?;
        record!(@pack $self $out $($rest)*);
    };
    (@pack $self:ident $out:ident) => {};

    (@size pad($n:expr), $($rest:tt)*) => {
        $n + record!(@size $($rest)*)
    };
    (@size $(#[$fattr:meta])* $f:ident : $t:ty, $($rest:tt)*) => {
        <$t as $crate::binary::FixedSize>::SIZE + record!(@size $($rest)*)
    };
    (@size) => { 0 };

    (
        $(#[$attr:meta])*
        pub struct $name:ident { $($body:tt)* }
    ) => {
        record!(@struct [$(#[$attr])*] $name [] $($body)*);

        impl $crate::binary::Unpack for $name {
            fn unpack(cur: &mut $crate::binary::Cur) -> $crate::errors::Result<$name> {
                record!(@unpack cur $name [] $($body)*)
            }
        }

        impl $crate::binary::Pack for $name {
            fn pack(&self, out: &mut $crate::binary::Out) -> $crate::errors::Result<()> {
                record!(@pack self out $($body)*);
                Ok(())
            }
        }

        impl $crate::binary::FixedSize for $name {
            const SIZE: usize = record!(@size $($body)*);
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::binary::{Cur, FixedSize, Out, Pack};

    record! {
        #[derive(Clone, Debug, PartialEq, Default)]
        pub struct Sample {
            kind: u8,
            pad(1),
            count: u16,
            scale: [f32; 2],
        }
    }

    #[test]
    fn layout() {
        assert_eq!(Sample::SIZE, 12);

        let s = Sample { kind: 3, count: 0x102, scale: [1.0, -1.0] };
        let mut out = Out::new();
        s.pack(&mut out).unwrap();
        assert_eq!(out.len(), Sample::SIZE);
        assert_eq!(&out.bytes()[..4], &[3, 0xFF, 1, 2]);

        let buf = out.into_inner();
        assert_eq!(Cur::new(&buf).next::<Sample>().unwrap(), s);
    }

    #[test]
    fn padding_is_ignored() {
        let buf = [3, 0x42, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0];
        let s: Sample = Cur::new(&buf).next().unwrap();
        assert_eq!(s, Sample { kind: 3, count: 1, scale: [0.0, 0.0] });
    }
}
