//! Sequences that end with a terminator element instead of a count.

use super::{Cur, Out, Pack, Unpack};
use crate::errors::Result;

/// Reads elements until one satisfies `is_terminator` (which is consumed
/// but not returned). Fails instead of running past `end`.
pub fn unpack_terminated<T, F>(cur: &mut Cur, end: usize, is_terminator: F) -> Result<Vec<T>>
where
    T: Unpack,
    F: Fn(&T) -> bool,
{
    let mut items = vec![];
    loop {
        if cur.pos() >= end {
            return Err(cur.error("terminator not found"));
        }
        let item = cur.next::<T>()?;
        if is_terminator(&item) {
            return Ok(items);
        }
        items.push(item);
    }
}

/// Writes `items` followed by `terminator`.
pub fn pack_terminated<T: Pack>(out: &mut Out, items: &[T], terminator: &T) -> Result<()> {
    for item in items {
        item.pack(out)?;
    }
    terminator.pack(out)
}

#[test]
fn test() {
    let buf = [0, 1, 0, 2, 0xFF, 0xFF, 0, 3];
    let mut cur = Cur::new(&buf);
    let xs = unpack_terminated::<u16, _>(&mut cur, buf.len(), |&x| x == 0xFFFF).unwrap();
    assert_eq!(xs, vec![1, 2]);
    assert_eq!(cur.pos(), 6);

    let mut cur = Cur::new(&buf[..4]);
    assert!(unpack_terminated::<u16, _>(&mut cur, 4, |&x| x == 0xFFFF).is_err());
}
