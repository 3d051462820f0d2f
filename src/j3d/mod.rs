//! J3D, the model and animation file family used by first-party
//! GameCube titles.
//!
//! A file is a small header followed by a sequence of tagged sections.
//! Each section module here knows how to unpack its section from a
//! [`Cur`] positioned at the tag and how to pack it back.

pub mod animation;
pub mod drw1;
pub mod evp1;
pub mod file;
pub mod inf1;
pub mod jnt1;
pub mod mat3;
pub mod material;
pub mod mdl3;
pub mod model;
pub mod shp1;
pub mod tex1;
pub mod texture;
pub mod vtx1;

use crate::binary::{Cur, Out, Pack, Padding};
use crate::errors::Result;

pub type Tag = [u8; 4];

pub fn tag_str(tag: &Tag) -> String {
    tag.iter()
        .map(|&b| if b.is_ascii_graphic() { b as char } else { '?' })
        .collect()
}

/// Checks the tag and size of the section at `cur`. Returns the section
/// size; the section's data is `cur.pos()..cur.pos() + size`.
pub fn open_section(cur: Cur, tag: &Tag) -> Result<usize> {
    let mut c = cur;
    let found: Tag = c.next()?;
    if &found != tag {
        return Err(cur.error(format!(
            "expected section {}, found {}", tag_str(tag), tag_str(&found),
        )));
    }
    let size = c.next::<u32>()? as usize;
    if size < 8 || size > cur.bytes_remaining() {
        return Err(cur.error(format!(
            "{} section size {:#x} runs past end of file", tag_str(tag), size,
        )));
    }
    debug!("{} section at {:#x}, size {:#x}", tag_str(tag), cur.pos(), size);
    Ok(size)
}

/// Writes one section. The header is reserved up front and filled in by
/// `finish` once the offsets and the size are known.
pub struct SectionWriter {
    base: usize,
}

impl SectionWriter {
    pub fn begin(out: &mut Out, header_size: usize) -> SectionWriter {
        let base = out.tell();
        out.reserve(header_size);
        SectionWriter { base }
    }

    pub fn base(&self) -> usize {
        self.base
    }

    /// Current position relative to the section start.
    pub fn offset(&self, out: &Out) -> Result<u32> {
        let offset = out.tell() - self.base;
        check!(offset <= u32::MAX as usize)?;
        Ok(offset as u32)
    }

    /// Aligns the section end to 32 bytes and returns the section size.
    pub fn end(&self, out: &mut Out) -> Result<u32> {
        out.align_from(self.base, 32, Padding::Text);
        self.offset(out)
    }

    pub fn write_header<H: Pack>(&self, out: &mut Out, header: &H) -> Result<()> {
        out.write_at(self.base, header)
    }
}

/// Index arrays that are always written as 0..n but may in principle
/// remap entries on read.
pub fn unpack_index_array(cur: Cur, count: usize, limit: usize) -> Result<Vec<usize>> {
    let mut c = cur;
    let mut indices = Vec::with_capacity(count);
    for _ in 0..count {
        let pos = c.pos();
        let i = c.next::<u16>()? as usize;
        if i >= limit {
            return Err(c.error_at(pos, format!("index {} out of range ({})", i, limit)));
        }
        indices.push(i);
    }
    Ok(indices)
}

pub fn pack_identity_array(out: &mut Out, count: usize) -> Result<()> {
    check!(count <= 0x10000)?;
    for i in 0..count {
        (i as u16).pack(out)?;
    }
    Ok(())
}

/// Offset of an optional sub-table: 0 stands for absent.
pub fn optional_offset(offset: u32) -> Option<u32> {
    if offset == 0 { None } else { Some(offset) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_framing() {
        let mut out = Out::new();
        out.write_bytes(&[0xAA; 4]);
        let w = SectionWriter::begin(&mut out, 8);
        out.write_bytes(&[1, 2, 3]);
        let size = w.end(&mut out).unwrap();
        assert_eq!(size, 32);
        w.write_header(&mut out, b"TEST").unwrap();
        let buf = out.into_inner();
        assert_eq!(buf.len(), 36);
        assert_eq!(&buf[4..8], b"TEST");
        assert_eq!(&buf[15..19], b"This");
    }

    #[test]
    fn open_section_checks_tag_and_size() {
        let mut buf = b"INF1\0\0\0\x20".to_vec();
        buf.resize(0x20, 0);
        assert_eq!(open_section(Cur::new(&buf), b"INF1").unwrap(), 0x20);
        assert!(open_section(Cur::new(&buf), b"VTX1").is_err());
        buf.truncate(0x10);
        assert!(open_section(Cur::new(&buf), b"INF1").is_err());
    }
}
