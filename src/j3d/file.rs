//! The outer J3D container header and section walking.

use super::{tag_str, Tag};
use crate::binary::{Cur, FixedSize, Out};
use crate::errors::Result;
use std::path::Path;

record! {
    pub struct Header {
        magic: [u8; 4],
        file_type: [u8; 4],
        file_size: u32,
        section_count: u32,
        subversion: [u8; 4],
        pad(12),
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FileType {
    Bmd3,
    Bdl4,
    Bmt3,
    Bck1,
    Btk1,
    Btp1,
    Bva1,
    Brk1,
    Bpk1,
}

impl FileType {
    pub const ALL: [FileType; 9] = [
        FileType::Bmd3, FileType::Bdl4, FileType::Bmt3,
        FileType::Bck1, FileType::Btk1, FileType::Btp1,
        FileType::Bva1, FileType::Brk1, FileType::Bpk1,
    ];

    pub fn tag(self) -> Tag {
        match self {
            FileType::Bmd3 => *b"bmd3",
            FileType::Bdl4 => *b"bdl4",
            FileType::Bmt3 => *b"bmt3",
            FileType::Bck1 => *b"bck1",
            FileType::Btk1 => *b"btk1",
            FileType::Btp1 => *b"btp1",
            FileType::Bva1 => *b"bva1",
            FileType::Brk1 => *b"brk1",
            FileType::Bpk1 => *b"bpk1",
        }
    }

    pub fn from_tag(tag: &Tag) -> Option<FileType> {
        FileType::ALL.iter().cloned().find(|ft| &ft.tag() == tag)
    }

    pub fn magic(self) -> Tag {
        if self.is_animation() { *b"J3D1" } else { *b"J3D2" }
    }

    pub fn is_model(self) -> bool {
        self == FileType::Bmd3 || self == FileType::Bdl4
    }

    pub fn is_animation(self) -> bool {
        !self.is_model() && self != FileType::Bmt3
    }

    pub fn section_count(self) -> u32 {
        match self {
            FileType::Bmd3 => 8,
            FileType::Bdl4 => 9,
            FileType::Bmt3 => 2,
            _ => 1,
        }
    }

    /// Picks the file type from a file name's extension. Case-insensitive.
    pub fn from_path(path: &Path) -> Option<FileType> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        Some(match &ext[..] {
            "bmd" => FileType::Bmd3,
            "bdl" => FileType::Bdl4,
            "bmt" => FileType::Bmt3,
            "bck" => FileType::Bck1,
            "btk" => FileType::Btk1,
            "btp" => FileType::Btp1,
            "bva" => FileType::Bva1,
            "brk" => FileType::Brk1,
            "bpk" => FileType::Bpk1,
            _ => return None,
        })
    }
}

/// The four-byte tool generation marker.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Subversion {
    Svr3,
    Svr1,
    Blank,
}

impl Default for Subversion {
    fn default() -> Subversion { Subversion::Svr3 }
}

impl Subversion {
    pub fn raw(self) -> Tag {
        match self {
            Subversion::Svr3 => *b"SVR3",
            Subversion::Svr1 => *b"SVR1",
            Subversion::Blank => [0xFF; 4],
        }
    }

    pub fn from_raw(raw: &Tag) -> Option<Subversion> {
        match raw {
            b"SVR3" => Some(Subversion::Svr3),
            b"SVR1" => Some(Subversion::Svr1),
            [0xFF, 0xFF, 0xFF, 0xFF] => Some(Subversion::Blank),
            _ => None,
        }
    }
}

/// A container opened for reading.
pub struct Container<'a> {
    pub file_type: FileType,
    pub subversion: Subversion,
    /// Cursors at the start of each section, in file order.
    pub sections: Vec<(Tag, Cur<'a>)>,
}

impl<'a> Container<'a> {
    /// The next section, which must have the given tag.
    pub fn expect(&self, index: usize, tag: &Tag) -> Result<Cur<'a>> {
        match self.sections.get(index) {
            Some((t, cur)) if t == tag => Ok(*cur),
            Some((t, cur)) => Err(cur.error(format!(
                "expected section {}, found {}", tag_str(tag), tag_str(t),
            ))),
            None => bail!("missing section {}", tag_str(tag)),
        }
    }
}

pub fn open(buf: &[u8]) -> Result<Container> {
    let cur = Cur::new(buf);
    let header: Header = cur.peek()?;

    let file_type = FileType::from_tag(&header.file_type)
        .ok_or_else(|| cur.error(format!("unknown file type {}", tag_str(&header.file_type))))?;
    if header.magic != file_type.magic() {
        return Err(cur.error(format!(
            "bad magic {} for {}", tag_str(&header.magic), tag_str(&header.file_type),
        )));
    }
    let subversion = match Subversion::from_raw(&header.subversion) {
        Some(s) => s,
        None => {
            warn!("unknown subversion {}, assuming SVR3", tag_str(&header.subversion));
            Subversion::Svr3
        }
    };
    if header.file_size as usize > buf.len() {
        return Err(cur.error(format!(
            "file size {:#x} exceeds the {:#x} bytes available", header.file_size, buf.len(),
        )));
    }
    let expected = file_type.section_count();
    if header.section_count != expected {
        return Err(cur.error(format!(
            "{} has {} sections, expected {}",
            tag_str(&header.file_type), header.section_count, expected,
        )));
    }
    debug!("{} {}, {:#x} bytes", tag_str(&header.magic), tag_str(&header.file_type), header.file_size);

    let data = &buf[..header.file_size as usize];
    let mut sections = Vec::with_capacity(expected as usize);
    let mut pos = Header::SIZE;
    for _ in 0..expected {
        let mut c = Cur::new(data);
        c.jump_to(pos);
        let section = c;
        let tag: Tag = c.next()?;
        let size = c.next::<u32>()? as usize;
        if size < 8 || pos + size > data.len() {
            return Err(section.error(format!(
                "{} section size {:#x} runs past end of file", tag_str(&tag), size,
            )));
        }
        sections.push((tag, section));
        pos += size;
    }

    Ok(Container { file_type, subversion, sections })
}

/// Reserves the container header. Sections are then written back to back
/// and `finish` fills the header in.
pub fn begin(out: &mut Out) {
    out.reserve(Header::SIZE);
}

pub fn finish(out: &mut Out, file_type: FileType, subversion: Subversion) -> Result<()> {
    let file_size = out.len();
    check!(file_size <= u32::MAX as usize)?;
    out.write_at(0, &Header {
        magic: file_type.magic(),
        file_type: file_type.tag(),
        file_size: file_size as u32,
        section_count: file_type.section_count(),
        subversion: subversion.raw(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::Padding;

    fn fake_section(out: &mut Out, tag: &Tag) {
        let at = out.tell();
        out.write_bytes(tag);
        out.write(&32u32).unwrap();
        out.align_from(at, 32, Padding::Text);
    }

    #[test]
    fn header() {
        let mut out = Out::new();
        begin(&mut out);
        fake_section(&mut out, b"MAT3");
        fake_section(&mut out, b"TEX1");
        finish(&mut out, FileType::Bmt3, Subversion::Svr3).unwrap();
        let buf = out.into_inner();
        assert_eq!(&buf[..8], b"J3D2bmt3");
        assert_eq!(&buf[20..32], &[0xFF; 12]);

        let c = open(&buf).unwrap();
        assert_eq!(c.file_type, FileType::Bmt3);
        assert_eq!(c.sections.len(), 2);
        assert_eq!(c.sections[1].1.pos(), 64);
        assert!(c.expect(0, b"MAT3").is_ok());
        assert!(c.expect(0, b"TEX1").is_err());
    }

    #[test]
    fn wrong_section_count() {
        let mut out = Out::new();
        begin(&mut out);
        fake_section(&mut out, b"ANK1");
        finish(&mut out, FileType::Bck1, Subversion::Blank).unwrap();
        let mut buf = out.into_inner();
        assert_eq!(&buf[..4], b"J3D1");
        buf[15] = 2;
        assert!(open(&buf).is_err());
    }

    #[test]
    fn file_type_from_extension() {
        assert_eq!(FileType::from_path(Path::new("a/b.BDL")), Some(FileType::Bdl4));
        assert_eq!(FileType::from_path(Path::new("x.btk")), Some(FileType::Btk1));
        assert_eq!(FileType::from_path(Path::new("x.dae")), None);
    }
}
