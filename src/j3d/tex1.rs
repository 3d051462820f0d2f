//! TEX1: the texture table.

use super::texture::{BtiRecord, Texture, TextureReader, TextureWriter};
use super::{open_section, SectionWriter};
use crate::binary::names::{pack_names, unpack_names};
use crate::binary::{Cur, FixedSize, Out, Padding};
use crate::errors::Result;

record! {
    pub struct Header {
        tag: [u8; 4],
        section_size: u32,
        count: u16,
        pad(2),
        bti_offset: u32,
        name_offset: u32,
    }
}

pub fn unpack(cur: Cur) -> Result<Vec<Texture>> {
    open_section(cur, b"TEX1")?;
    let header: Header = cur.peek()?;
    let n = header.count as usize;

    let names = unpack_names(&mut (cur + header.name_offset))?;
    if names.len() != n {
        return Err(cur.error(format!("{} textures but {} texture names", n, names.len())));
    }

    let mut reader = TextureReader::new(cur);
    let mut textures = Vec::with_capacity(n);
    for (i, name) in names.into_iter().enumerate() {
        let record = cur + header.bti_offset + i * BtiRecord::SIZE;
        textures.push(reader.read(record, name)?);
    }
    Ok(textures)
}

pub fn pack(out: &mut Out, textures: &[Texture]) -> Result<()> {
    check!(textures.len() <= 0xFFFF)?;
    let w = SectionWriter::begin(out, Header::SIZE);

    out.align_from(w.base(), 32, Padding::Ff);
    let bti_offset = w.offset(out)?;
    let records_at = out.tell();
    out.reserve(textures.len() * BtiRecord::SIZE);
    TextureWriter::new(w.base()).write(out, records_at, textures)?;

    let name_offset = w.offset(out)?;
    let names: Vec<String> = textures.iter().map(|t| t.name.clone()).collect();
    pack_names(out, &names)?;

    let section_size = w.end(out)?;
    w.write_header(out, &Header {
        tag: *b"TEX1",
        section_size,
        count: textures.len() as u16,
        bti_offset,
        name_offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gx::TextureFormat;
    use crate::j3d::texture::tests::sample;
    use crate::j3d::texture::{Images, Palette};
    use std::rc::Rc;

    #[test]
    fn shared_palette_and_images() {
        let palette = Rc::new(Palette((0..512).map(|i| i as u8).collect()));
        let images = Rc::new(Images(vec![vec![7; 64]]));
        let textures = vec![
            sample("a", TextureFormat::CI8, Some(palette.clone()), images.clone()),
            sample("b", TextureFormat::CI8, Some(Rc::new((*palette).clone())), Rc::new((*images).clone())),
        ];

        let mut out = Out::new();
        pack(&mut out, &textures).unwrap();
        let buf = out.into_inner();
        assert_eq!(buf.len() % 32, 0);

        let header: Header = Cur::new(&buf).next().unwrap();
        let at = |i: usize| header.bti_offset as usize + i * BtiRecord::SIZE;
        let r0: BtiRecord = (Cur::new(&buf) + at(0)).next().unwrap();
        let r1: BtiRecord = (Cur::new(&buf) + at(1)).next().unwrap();
        assert_eq!(r0.palette_offset as usize + at(0), r1.palette_offset as usize + at(1));
        assert_eq!(r0.image_offset as usize + at(0), r1.image_offset as usize + at(1));
        assert_eq!(r0.palette_entry_count, 256);

        // One palette and one image, not two of each.
        assert!(buf.len() < 0x20 + 2 * 32 + 512 + 64 + 64);

        let read = unpack(Cur::new(&buf)).unwrap();
        assert_eq!(read, textures);
        let p0 = read[0].palette.as_ref().unwrap();
        let p1 = read[1].palette.as_ref().unwrap();
        assert!(Rc::ptr_eq(p0, p1));
        assert!(Rc::ptr_eq(&read[0].images, &read[1].images));

        let mut again = Out::new();
        pack(&mut again, &read).unwrap();
        assert_eq!(again.into_inner(), buf);
    }
}
