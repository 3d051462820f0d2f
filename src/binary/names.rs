//! Name tables: a count, then (hash, offset) pairs, then the strings.
//! Offsets are relative to the start of the table.

use super::{Cur, Out, Pack};
use crate::errors::Result;

pub fn name_hash(name: &str) -> u16 {
    name.bytes().fold(0u16, |h, b| h.wrapping_mul(3).wrapping_add(b as u16))
}

pub fn unpack_names(cur: &mut Cur) -> Result<Vec<String>> {
    let base = *cur;
    let count = cur.next::<u16>()?;
    cur.next::<u16>()?;

    let mut names = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let hash = cur.next::<u16>()?;
        let offset = cur.next::<u16>()?;
        let name = (base + offset).next_c_string()?;
        if name_hash(&name) != hash {
            warn!("name table: bad hash for {:?}", name);
        }
        names.push(name);
    }
    Ok(names)
}

pub fn pack_names(out: &mut Out, names: &[String]) -> Result<()> {
    check!(names.len() <= 0xFFFF)?;
    let base = out.tell();
    (names.len() as u16).pack(out)?;
    0xFFFFu16.pack(out)?;

    let mut offset = 4 + 4 * names.len();
    for name in names {
        check!(offset <= 0xFFFF)?;
        name_hash(name).pack(out)?;
        (offset as u16).pack(out)?;
        offset += name.len() + 1;
    }
    for name in names {
        out.write_c_string(name);
    }
    debug_assert_eq!(out.tell() - base, offset);
    Ok(())
}

#[test]
fn test() {
    let names = vec!["body".to_string(), "eye_L".to_string(), String::new()];
    let mut out = Out::new();
    pack_names(&mut out, &names).unwrap();
    let buf = out.into_inner();
    assert_eq!(&buf[0..4], &[0, 3, 0xFF, 0xFF]);
    assert_eq!(&buf[6..8], &[0, 16]);
    assert_eq!(unpack_names(&mut Cur::new(&buf)).unwrap(), names);

    assert_eq!(name_hash("ab"), 97 * 3 + 98);
}
