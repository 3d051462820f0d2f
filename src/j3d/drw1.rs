//! DRW1: what each slot of the runtime matrix table holds.

use super::{open_section, SectionWriter};
use crate::binary::{Cur, FixedSize, Out, Pack, Padding};
use crate::errors::Result;

record! {
    pub struct Header {
        tag: [u8; 4],
        section_size: u32,
        count: u16,
        pad(2),
        kind_offset: u32,
        index_offset: u32,
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MatrixDescriptor {
    /// A joint's world matrix.
    Joint(u16),
    /// A blend of joint matrices (an index into the EVP1 groups).
    InfluenceGroup(u16),
}

pub fn unpack(cur: Cur) -> Result<Vec<MatrixDescriptor>> {
    open_section(cur, b"DRW1")?;
    let header: Header = cur.peek()?;
    let n = header.count as usize;

    let mut kinds = cur + header.kind_offset;
    let mut indices = cur + header.index_offset;
    let mut descriptors = Vec::with_capacity(n);
    for _ in 0..n {
        let pos = kinds.pos();
        let kind = kinds.next::<u8>()?;
        let index = indices.next::<u16>()?;
        descriptors.push(match kind {
            0 => MatrixDescriptor::Joint(index),
            1 => MatrixDescriptor::InfluenceGroup(index),
            x => return Err(kinds.error_at(pos, format!("invalid matrix kind {}", x))),
        });
    }
    Ok(descriptors)
}

pub fn pack(out: &mut Out, descriptors: &[MatrixDescriptor]) -> Result<()> {
    check!(descriptors.len() <= 0xFFFF)?;
    let w = SectionWriter::begin(out, Header::SIZE);

    let kind_offset = w.offset(out)?;
    for d in descriptors {
        let kind: u8 = match *d {
            MatrixDescriptor::Joint(_) => 0,
            MatrixDescriptor::InfluenceGroup(_) => 1,
        };
        kind.pack(out)?;
    }

    out.align_from(w.base(), 2, Padding::Ff);
    let index_offset = w.offset(out)?;
    for d in descriptors {
        match *d {
            MatrixDescriptor::Joint(i) | MatrixDescriptor::InfluenceGroup(i) => i.pack(out)?,
        }
    }

    let section_size = w.end(out)?;
    w.write_header(out, &Header {
        tag: *b"DRW1",
        section_size,
        count: descriptors.len() as u16,
        kind_offset,
        index_offset,
    })
}

#[test]
fn test() {
    let descriptors = vec![
        MatrixDescriptor::Joint(0),
        MatrixDescriptor::Joint(3),
        MatrixDescriptor::InfluenceGroup(1),
    ];
    let mut out = Out::new();
    pack(&mut out, &descriptors).unwrap();
    let buf = out.into_inner();
    assert_eq!(buf.len(), 32);
    // Kinds end at an odd offset, so the indices start one byte later.
    assert_eq!(&buf[0x14..0x18], &[0, 0, 1, 0xFF]);
    assert_eq!(unpack(Cur::new(&buf)).unwrap(), descriptors);
}
