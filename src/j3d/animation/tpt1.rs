//! TPT1 (`.btp`): per-frame texture swaps.

use super::{pack_material_names, pack_pool, pool_insert, unpack_material_names, unpack_pool, LoopMode};
use crate::binary::{Cur, FixedSize, Out, Padding};
use crate::errors::Result;
use crate::j3d::{open_section, SectionWriter};

record! {
    pub struct Header {
        tag: [u8; 4],
        section_size: u32,
        loop_mode: LoopMode,
        pad(1),
        duration: u16,
        animation_count: u16,
        texture_index_count: u16,
        animation_offset: u32,
        texture_index_offset: u32,
        material_index_offset: u32,
        name_offset: u32,
    }
}

record! {
    pub struct Entry {
        count: u16,
        first: u16,
        texture_slot: u8,
        pad(3),
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TexturePatternTrack {
    pub material_name: String,
    pub material_index: u16,
    /// Which of the material's eight texture slots changes.
    pub texture_slot: u8,
    /// Texture index for frame 0, 1, ...; the last one holds.
    pub textures: Vec<u16>,
}

impl TexturePatternTrack {
    pub fn sample(&self, time: f32) -> Option<u16> {
        let last = self.textures.len().checked_sub(1)?;
        let i = (time.max(0.0) as usize).min(last);
        Some(self.textures[i])
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TexturePatternAnimation {
    pub loop_mode: LoopMode,
    pub duration: u16,
    pub tracks: Vec<TexturePatternTrack>,
}

pub fn unpack(cur: Cur) -> Result<TexturePatternAnimation> {
    open_section(cur, b"TPT1")?;
    let h: Header = cur.peek()?;
    let n = h.animation_count as usize;
    let pool: Vec<u16> = unpack_pool(cur + h.texture_index_offset, h.texture_index_count as usize)?;
    let (names, indices) = unpack_material_names(cur, h.material_index_offset, h.name_offset, n)?;

    let mut c = cur + h.animation_offset;
    let mut tracks = Vec::with_capacity(n);
    for (i, material_name) in names.into_iter().enumerate() {
        let pos = c.pos();
        let e: Entry = c.next()?;
        let range = e.first as usize..e.first as usize + e.count as usize;
        let textures = pool.get(range).ok_or_else(|| c.error_at(pos, format!(
            "{} texture indices at {} run past end of a pool of {}", e.count, e.first, pool.len(),
        )))?;
        tracks.push(TexturePatternTrack {
            material_name,
            material_index: indices[i],
            texture_slot: e.texture_slot,
            textures: textures.to_vec(),
        });
    }
    Ok(TexturePatternAnimation { loop_mode: h.loop_mode, duration: h.duration, tracks })
}

pub fn pack(out: &mut Out, anim: &TexturePatternAnimation) -> Result<()> {
    check!(anim.tracks.len() <= 0xFFFF)?;
    let w = SectionWriter::begin(out, Header::SIZE);

    let mut pool = vec![];
    let mut entries = Vec::with_capacity(anim.tracks.len());
    for t in &anim.tracks {
        check!(t.textures.len() <= 0xFFFF)?;
        entries.push(Entry {
            count: t.textures.len() as u16,
            first: pool_insert(&mut pool, &t.textures)?,
            texture_slot: t.texture_slot,
        });
    }

    out.align_from(w.base(), 32, Padding::Ff);
    let animation_offset = w.offset(out)?;
    for e in &entries {
        out.write(e)?;
    }
    let texture_index_offset = pack_pool(out, &w, &pool)?;
    let names: Vec<String> = anim.tracks.iter().map(|t| t.material_name.clone()).collect();
    let indices: Vec<u16> = anim.tracks.iter().map(|t| t.material_index).collect();
    let (material_index_offset, name_offset) = pack_material_names(out, &w, &names, &indices)?;

    let section_size = w.end(out)?;
    w.write_header(out, &Header {
        tag: *b"TPT1",
        section_size,
        loop_mode: anim.loop_mode,
        duration: anim.duration,
        animation_count: anim.tracks.len() as u16,
        texture_index_count: pool.len() as u16,
        animation_offset,
        texture_index_offset,
        material_index_offset,
        name_offset,
    })
}

#[cfg(test)]
pub mod tests {
    use super::*;

    pub fn sample(material_name: &str) -> TexturePatternAnimation {
        TexturePatternAnimation {
            loop_mode: LoopMode::Repeat,
            duration: 4,
            tracks: vec![TexturePatternTrack {
                material_name: material_name.into(),
                material_index: 0,
                texture_slot: 0,
                textures: vec![0, 1, 1, 0],
            }],
        }
    }

    #[test]
    fn sampling_holds_last() {
        let t = &sample("m").tracks[0];
        assert_eq!(t.sample(1.5), Some(1));
        assert_eq!(t.sample(9.0), Some(0));
    }

    #[test]
    fn round_trip() {
        assert_eq!(Header::SIZE, 32);
        let mut anim = sample("m");
        let mut other = anim.tracks[0].clone();
        other.textures = vec![1, 1];
        anim.tracks.push(other);
        let mut out = Out::new();
        pack(&mut out, &anim).unwrap();
        let buf = out.into_inner();
        assert_eq!(unpack(Cur::new(&buf)).unwrap(), anim);
        let h: Header = Cur::new(&buf).peek().unwrap();
        assert_eq!(h.texture_index_count, 4);
    }
}
