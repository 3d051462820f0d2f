//! Offset-addressed pools: values referenced by offset from some base,
//! where equal values may share storage.

use super::{Cur, Out};
use crate::errors::Result;
use std::collections::HashMap;
use std::hash::Hash;

/// Packs values into a pool, returning offsets relative to `base`. A key
/// that was already packed gets the earlier offset back and writes
/// nothing.
pub struct OffsetPacker<K> {
    base: usize,
    table: HashMap<K, u32>,
}

impl<K: Hash + Eq> OffsetPacker<K> {
    pub fn new(base: usize) -> OffsetPacker<K> {
        OffsetPacker { base, table: HashMap::new() }
    }

    /// Returns the offset of `key`, calling `write` at the current output
    /// position if it hasn't been packed before.
    pub fn pack<F>(&mut self, out: &mut Out, key: K, write: F) -> Result<u32>
    where
        F: FnOnce(&mut Out) -> Result<()>,
    {
        if let Some(&offset) = self.table.get(&key) {
            return Ok(offset);
        }
        let offset = out.tell() - self.base;
        check!(offset <= u32::MAX as usize)?;
        write(out)?;
        self.table.insert(key, offset as u32);
        Ok(offset as u32)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }
}

/// The read side: every offset is decoded once, later lookups of the same
/// offset return a clone of the first result (use `Rc` to share). The
/// arguments used to decode must agree between lookups.
pub struct OffsetUnpacker<'a, A, T> {
    base: Cur<'a>,
    table: HashMap<u32, (A, T)>,
}

impl<'a, A: PartialEq + std::fmt::Debug, T: Clone> OffsetUnpacker<'a, A, T> {
    pub fn new(base: Cur<'a>) -> OffsetUnpacker<'a, A, T> {
        OffsetUnpacker { base, table: HashMap::new() }
    }

    pub fn unpack<F>(&mut self, offset: u32, args: A, read: F) -> Result<T>
    where
        F: FnOnce(&mut Cur<'a>, &A) -> Result<T>,
    {
        if let Some(&(ref prev_args, ref value)) = self.table.get(&offset) {
            if *prev_args != args {
                return Err(self.base.error_at(
                    self.base.pos() + offset as usize,
                    format!("shared data read with conflicting parameters {:?} and {:?}",
                        prev_args, args),
                ));
            }
            return Ok(value.clone());
        }
        let mut cur = self.base + offset;
        let value = read(&mut cur, &args)?;
        self.table.insert(offset, (args, value.clone()));
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn repeated_key_writes_nothing() {
        let mut out = Out::new();
        out.reserve(4);
        let mut packer = OffsetPacker::new(2);
        let a = packer.pack(&mut out, vec![1u8, 2], |out| { out.write_bytes(&[1, 2]); Ok(()) }).unwrap();
        let len = out.len();
        let b = packer.pack(&mut out, vec![1u8, 2], |out| { out.write_bytes(&[1, 2]); Ok(()) }).unwrap();
        assert_eq!(a, 2);
        assert_eq!(b, 2);
        assert_eq!(out.len(), len);
        assert_eq!(packer.len(), 1);
    }

    #[test]
    fn shared_offsets_share_values() {
        let buf = [0u8, 0, 7, 9];
        let mut unpacker = OffsetUnpacker::new(Cur::new(&buf));
        let read = |cur: &mut Cur, n: &usize| Ok(Rc::new(cur.next_n_u8s(*n)?.to_vec()));
        let x = unpacker.unpack(2, 2, read).unwrap();
        let y = unpacker.unpack(2, 2, read).unwrap();
        assert!(Rc::ptr_eq(&x, &y));
        assert!(unpacker.unpack(2, 1, read).is_err());
    }
}
