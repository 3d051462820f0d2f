//! TRK1 (`.brk`): keyframed TEV register and konst colors.

use super::{
    pack_material_names, pack_pool, unpack_material_names, unpack_pool, Curve, LoopMode,
    Selection,
};
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
        register_animation_count: u16,
        konst_animation_count: u16,
        register_counts: [u16; 4],
        konst_counts: [u16; 4],
        register_animation_offset: u32,
        konst_animation_offset: u32,
        register_index_offset: u32,
        konst_index_offset: u32,
        register_name_offset: u32,
        konst_name_offset: u32,
        register_pool_offsets: [u32; 4],
        konst_pool_offsets: [u32; 4],
    }
}

record! {
    pub struct Entry {
        /// r, g, b, a
        selections: [Selection; 4],
        register: u8,
        pad(3),
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColorTrack {
    pub material_name: String,
    pub material_index: u16,
    /// TEV register (0-2 for the color registers, 3 for the previous
    /// register) or konst color index.
    pub register: u8,
    /// r, g, b, a
    pub curves: [Curve; 4],
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TevRegisterAnimation {
    pub loop_mode: LoopMode,
    pub duration: u16,
    pub register_tracks: Vec<ColorTrack>,
    pub konst_tracks: Vec<ColorTrack>,
}

/// Four pools of `i16`, one per color component.
#[derive(Default)]
pub struct ColorPools {
    pub pools: [Vec<i16>; 4],
}

impl ColorPools {
    pub fn unpack(cur: Cur, offsets: &[u32; 4], counts: &[u16; 4]) -> Result<ColorPools> {
        let mut pools: [Vec<i16>; 4] = Default::default();
        for i in 0..4 {
            pools[i] = unpack_pool(cur + offsets[i], counts[i] as usize)?;
        }
        Ok(ColorPools { pools })
    }

    pub fn read(&self, sels: &[Selection; 4]) -> Result<[Curve; 4]> {
        Ok([
            Curve::read(&sels[0], &self.pools[0], 1.0)?,
            Curve::read(&sels[1], &self.pools[1], 1.0)?,
            Curve::read(&sels[2], &self.pools[2], 1.0)?,
            Curve::read(&sels[3], &self.pools[3], 1.0)?,
        ])
    }

    pub fn write(&mut self, curves: &[Curve; 4]) -> Result<[Selection; 4]> {
        Ok([
            curves[0].write(&mut self.pools[0], 1.0)?,
            curves[1].write(&mut self.pools[1], 1.0)?,
            curves[2].write(&mut self.pools[2], 1.0)?,
            curves[3].write(&mut self.pools[3], 1.0)?,
        ])
    }

    pub fn pack(&self, out: &mut Out, w: &SectionWriter) -> Result<[u32; 4]> {
        let mut offsets = [0; 4];
        for i in 0..4 {
            offsets[i] = pack_pool(out, w, &self.pools[i])?;
        }
        Ok(offsets)
    }

    pub fn counts(&self) -> [u16; 4] {
        let mut counts = [0; 4];
        for i in 0..4 {
            counts[i] = self.pools[i].len() as u16;
        }
        counts
    }
}

fn unpack_tracks(
    cur: Cur,
    pools: &ColorPools,
    count: usize,
    entry_offset: u32,
    index_offset: u32,
    name_offset: u32,
) -> Result<Vec<ColorTrack>> {
    if count == 0 {
        return Ok(vec![]);
    }
    let (names, indices) = unpack_material_names(cur, index_offset, name_offset, count)?;
    let mut c = cur + entry_offset;
    let mut tracks = Vec::with_capacity(count);
    for (i, material_name) in names.into_iter().enumerate() {
        let entry: Entry = c.next()?;
        tracks.push(ColorTrack {
            material_name,
            material_index: indices[i],
            register: entry.register,
            curves: pools.read(&entry.selections)?,
        });
    }
    Ok(tracks)
}

pub fn unpack(cur: Cur) -> Result<TevRegisterAnimation> {
    open_section(cur, b"TRK1")?;
    let h: Header = cur.peek()?;
    let register_pools = ColorPools::unpack(cur, &h.register_pool_offsets, &h.register_counts)?;
    let konst_pools = ColorPools::unpack(cur, &h.konst_pool_offsets, &h.konst_counts)?;

    let register_tracks = unpack_tracks(
        cur, &register_pools, h.register_animation_count as usize,
        h.register_animation_offset, h.register_index_offset, h.register_name_offset,
    )?;
    let konst_tracks = unpack_tracks(
        cur, &konst_pools, h.konst_animation_count as usize,
        h.konst_animation_offset, h.konst_index_offset, h.konst_name_offset,
    )?;

    Ok(TevRegisterAnimation {
        loop_mode: h.loop_mode,
        duration: h.duration,
        register_tracks,
        konst_tracks,
    })
}

/// Entries then names of one track list. Returns the entry, index and
/// name offsets, all 0 when there are no tracks.
fn pack_tracks(out: &mut Out, w: &SectionWriter, tracks: &[ColorTrack], pools: &mut ColorPools) -> Result<(u32, u32, u32)> {
    if tracks.is_empty() {
        return Ok((0, 0, 0));
    }
    out.align_from(w.base(), 4, Padding::Ff);
    let entry_offset = w.offset(out)?;
    for t in tracks {
        out.write(&Entry { selections: pools.write(&t.curves)?, register: t.register })?;
    }
    let names: Vec<String> = tracks.iter().map(|t| t.material_name.clone()).collect();
    let indices: Vec<u16> = tracks.iter().map(|t| t.material_index).collect();
    let (index_offset, name_offset) = pack_material_names(out, w, &names, &indices)?;
    Ok((entry_offset, index_offset, name_offset))
}

pub fn pack(out: &mut Out, anim: &TevRegisterAnimation) -> Result<()> {
    check!(anim.register_tracks.len() <= 0xFFFF && anim.konst_tracks.len() <= 0xFFFF)?;
    let w = SectionWriter::begin(out, Header::SIZE);
    out.align_from(w.base(), 32, Padding::Ff);

    let mut register_pools = ColorPools::default();
    let mut konst_pools = ColorPools::default();
    let (register_animation_offset, register_index_offset, register_name_offset) =
        pack_tracks(out, &w, &anim.register_tracks, &mut register_pools)?;
    let (konst_animation_offset, konst_index_offset, konst_name_offset) =
        pack_tracks(out, &w, &anim.konst_tracks, &mut konst_pools)?;
    let register_pool_offsets = register_pools.pack(out, &w)?;
    let konst_pool_offsets = konst_pools.pack(out, &w)?;

    let section_size = w.end(out)?;
    w.write_header(out, &Header {
        tag: *b"TRK1",
        section_size,
        loop_mode: anim.loop_mode,
        duration: anim.duration,
        register_animation_count: anim.register_tracks.len() as u16,
        konst_animation_count: anim.konst_tracks.len() as u16,
        register_counts: register_pools.counts(),
        konst_counts: konst_pools.counts(),
        register_animation_offset,
        konst_animation_offset,
        register_index_offset,
        konst_index_offset,
        register_name_offset,
        konst_name_offset,
        register_pool_offsets,
        konst_pool_offsets,
    })
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::j3d::animation::{Keyframe, TangentMode};

    pub fn pulse() -> [Curve; 4] {
        [
            Curve::Keys {
                tangent_mode: TangentMode::Symmetric,
                keys: vec![
                    Keyframe { time: 0.0, value: 0.0, tangent_in: 0.0, tangent_out: 0.0 },
                    Keyframe { time: 20.0, value: 255.0, tangent_in: 0.0, tangent_out: 0.0 },
                ],
            },
            Curve::Constant(0.0),
            Curve::Constant(-20.0),
            Curve::Constant(255.0),
        ]
    }

    pub fn sample(material_name: &str) -> TevRegisterAnimation {
        TevRegisterAnimation {
            loop_mode: LoopMode::MirroredRepeat,
            duration: 20,
            register_tracks: vec![ColorTrack {
                material_name: material_name.into(),
                material_index: 0,
                register: 1,
                curves: pulse(),
            }],
            konst_tracks: vec![],
        }
    }

    #[test]
    fn round_trip() {
        assert_eq!(Header::SIZE, 88);
        assert_eq!(Entry::SIZE, 28);
        let mut anim = sample("glow");
        anim.konst_tracks.push(ColorTrack {
            material_name: "glow".into(),
            material_index: 0,
            register: 3,
            curves: pulse(),
        });
        let mut out = Out::new();
        pack(&mut out, &anim).unwrap();
        let buf = out.into_inner();
        assert_eq!(buf.len() % 32, 0);
        assert_eq!(unpack(Cur::new(&buf)).unwrap(), anim);

        let only_registers = sample("glow");
        let mut out = Out::new();
        pack(&mut out, &only_registers).unwrap();
        let buf = out.into_inner();
        assert_eq!(unpack(Cur::new(&buf)).unwrap(), only_registers);
    }
}
