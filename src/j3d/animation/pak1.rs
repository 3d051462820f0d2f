//! PAK1 (`.bpk`): keyframed material colors.

use super::trk1::ColorPools;
use super::{pack_material_names, unpack_material_names, Curve, LoopMode, Selection};
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
        counts: [u16; 4],
        pad(2),
        animation_offset: u32,
        index_offset: u32,
        name_offset: u32,
        pool_offsets: [u32; 4],
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MaterialColorTrack {
    pub material_name: String,
    pub material_index: u16,
    /// r, g, b, a
    pub curves: [Curve; 4],
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MaterialColorAnimation {
    pub loop_mode: LoopMode,
    pub duration: u16,
    pub tracks: Vec<MaterialColorTrack>,
}

pub fn unpack(cur: Cur) -> Result<MaterialColorAnimation> {
    open_section(cur, b"PAK1")?;
    let h: Header = cur.peek()?;
    let n = h.animation_count as usize;
    let pools = ColorPools::unpack(cur, &h.pool_offsets, &h.counts)?;
    let (names, indices) = unpack_material_names(cur, h.index_offset, h.name_offset, n)?;

    let mut c = cur + h.animation_offset;
    let mut tracks = Vec::with_capacity(n);
    for (i, material_name) in names.into_iter().enumerate() {
        let sels: [Selection; 4] = c.next()?;
        tracks.push(MaterialColorTrack {
            material_name,
            material_index: indices[i],
            curves: pools.read(&sels)?,
        });
    }
    Ok(MaterialColorAnimation { loop_mode: h.loop_mode, duration: h.duration, tracks })
}

pub fn pack(out: &mut Out, anim: &MaterialColorAnimation) -> Result<()> {
    check!(anim.tracks.len() <= 0xFFFF)?;
    let w = SectionWriter::begin(out, Header::SIZE);

    out.align_from(w.base(), 32, Padding::Ff);
    let animation_offset = w.offset(out)?;
    let mut pools = ColorPools::default();
    for t in &anim.tracks {
        out.write(&pools.write(&t.curves)?)?;
    }
    let names: Vec<String> = anim.tracks.iter().map(|t| t.material_name.clone()).collect();
    let indices: Vec<u16> = anim.tracks.iter().map(|t| t.material_index).collect();
    let (index_offset, name_offset) = pack_material_names(out, &w, &names, &indices)?;
    let pool_offsets = pools.pack(out, &w)?;

    let section_size = w.end(out)?;
    w.write_header(out, &Header {
        tag: *b"PAK1",
        section_size,
        loop_mode: anim.loop_mode,
        duration: anim.duration,
        animation_count: anim.tracks.len() as u16,
        counts: pools.counts(),
        animation_offset,
        index_offset,
        name_offset,
        pool_offsets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::j3d::animation::trk1::tests::pulse;

    #[test]
    fn round_trip() {
        assert_eq!(Header::SIZE, 52);
        let anim = MaterialColorAnimation {
            loop_mode: LoopMode::Once,
            duration: 20,
            tracks: vec![
                MaterialColorTrack { material_name: "a".into(), material_index: 0, curves: pulse() },
                MaterialColorTrack { material_name: "b".into(), material_index: 1, curves: pulse() },
            ],
        };
        let mut out = Out::new();
        pack(&mut out, &anim).unwrap();
        let buf = out.into_inner();
        assert_eq!(buf.len() % 32, 0);
        assert_eq!(unpack(Cur::new(&buf)).unwrap(), anim);
        let h: Header = Cur::new(&buf).peek().unwrap();
        assert_eq!(h.counts, [6, 1, 1, 1]);
    }
}
