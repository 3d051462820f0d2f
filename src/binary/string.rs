//! String encodings other than NUL-terminated (see `Cur::next_c_string`).

use super::{Cur, Out};
use crate::errors::Result;

/// Exactly `n` bytes, NUL-padded. Trailing NULs are stripped on read.
pub fn unpack_fixed(cur: &mut Cur, n: usize) -> Result<String> {
    let pos = cur.pos();
    let bytes = cur.next_n_u8s(n)?;
    let len = bytes.iter().position(|&b| b == 0).unwrap_or(n);
    String::from_utf8(bytes[..len].to_vec())
        .map_err(|_| cur.error_at(pos, "string is not valid UTF-8"))
}

pub fn pack_fixed(out: &mut Out, s: &str, n: usize) -> Result<()> {
    check!(s.len() <= n)?;
    out.write_bytes(s.as_bytes());
    out.reserve(n - s.len());
    Ok(())
}

/// A u8 length followed by that many bytes.
pub fn unpack_length_prefixed(cur: &mut Cur) -> Result<String> {
    let len = cur.next::<u8>()? as usize;
    unpack_fixed(cur, len)
}

pub fn pack_length_prefixed(out: &mut Out, s: &str) -> Result<()> {
    check!(s.len() <= 0xFF)?;
    out.write_bytes(&[s.len() as u8]);
    out.write_bytes(s.as_bytes());
    Ok(())
}

#[test]
fn test() {
    let mut out = Out::new();
    pack_fixed(&mut out, "J3D2", 4).unwrap();
    pack_fixed(&mut out, "ab", 4).unwrap();
    pack_length_prefixed(&mut out, "xyz").unwrap();
    assert!(pack_fixed(&mut out, "toolong", 4).is_err());
    let buf = out.into_inner();
    assert_eq!(&buf[..12], b"J3D2ab\0\0\x03xyz");

    let mut cur = Cur::new(&buf);
    assert_eq!(unpack_fixed(&mut cur, 4).unwrap(), "J3D2");
    assert_eq!(unpack_fixed(&mut cur, 4).unwrap(), "ab");
    assert_eq!(unpack_length_prefixed(&mut cur).unwrap(), "xyz");
}
