//! TTK1 (`.btk`): texture matrix scale/rotation/translation keyframes.
//!
//! Only the rotation about the w axis and the u/v scale and translation
//! reach the texture matrix; the rest are kept for round trips.

use super::{
    angle_scale, fit_angle_exponent, pack_material_names, pack_pool, unpack_material_names,
    unpack_pool, ComponentCurves, ComponentSelections, LoopMode, TransformPools,
};
use crate::binary::{Cur, FixedSize, Out, Padding};
use crate::errors::Result;
use crate::j3d::{open_section, SectionWriter};

record! {
    pub struct Header {
        tag: [u8; 4],
        section_size: u32,
        loop_mode: LoopMode,
        angle_scale_exponent: u8,
        duration: u16,
        /// Three per texture matrix.
        animation_count: u16,
        scale_count: u16,
        rotation_count: u16,
        translation_count: u16,
        animation_offset: u32,
        material_index_offset: u32,
        name_offset: u32,
        texture_matrix_index_offset: u32,
        center_offset: u32,
        scale_offset: u32,
        rotation_offset: u32,
        translation_offset: u32,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextureMatrixTrack {
    pub material_name: String,
    pub material_index: u16,
    pub texture_matrix: u8,
    pub center: [f32; 3],
    /// u, v, w
    pub components: [ComponentCurves; 3],
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TextureMatrixAnimation {
    pub loop_mode: LoopMode,
    pub angle_scale_exponent: u8,
    pub duration: u16,
    pub tracks: Vec<TextureMatrixTrack>,
}

pub fn unpack(cur: Cur) -> Result<TextureMatrixAnimation> {
    open_section(cur, b"TTK1")?;
    let header: Header = cur.peek()?;
    if header.animation_count % 3 != 0 {
        return Err(cur.error(format!("{} TTK1 animations, not a multiple of 3", header.animation_count)));
    }
    let n = header.animation_count as usize / 3;
    let scale = angle_scale(header.angle_scale_exponent);

    let pools = TransformPools {
        scales: unpack_pool(cur + header.scale_offset, header.scale_count as usize)?,
        rotations: unpack_pool(cur + header.rotation_offset, header.rotation_count as usize)?,
        translations: unpack_pool(cur + header.translation_offset, header.translation_count as usize)?,
    };
    let (names, material_indices) =
        unpack_material_names(cur, header.material_index_offset, header.name_offset, n)?;
    let matrix_indices: Vec<u8> = (cur + header.texture_matrix_index_offset).next_n(n)?;
    let centers: Vec<[f32; 3]> = (cur + header.center_offset).next_n(n)?;

    let mut c = cur + header.animation_offset;
    let mut tracks = Vec::with_capacity(n);
    for (i, material_name) in names.into_iter().enumerate() {
        let sels: [ComponentSelections; 3] = c.next()?;
        tracks.push(TextureMatrixTrack {
            material_name,
            material_index: material_indices[i],
            texture_matrix: matrix_indices[i],
            center: centers[i],
            components: [
                pools.read(&sels[0], scale)?,
                pools.read(&sels[1], scale)?,
                pools.read(&sels[2], scale)?,
            ],
        });
    }

    Ok(TextureMatrixAnimation {
        loop_mode: header.loop_mode,
        angle_scale_exponent: header.angle_scale_exponent,
        duration: header.duration,
        tracks,
    })
}

pub fn pack(out: &mut Out, anim: &TextureMatrixAnimation) -> Result<()> {
    check!(anim.tracks.len() * 3 <= 0xFFFF)?;
    let w = SectionWriter::begin(out, Header::SIZE);

    let exponent = fit_angle_exponent(
        anim.angle_scale_exponent,
        anim.tracks.iter().flat_map(|t| t.components.iter().map(|c| &c.rotation)),
    );
    let scale = angle_scale(exponent);

    let mut pools = TransformPools::default();
    let mut entries = Vec::with_capacity(anim.tracks.len());
    for t in &anim.tracks {
        entries.push([
            pools.write(&t.components[0], scale)?,
            pools.write(&t.components[1], scale)?,
            pools.write(&t.components[2], scale)?,
        ]);
    }

    out.align_from(w.base(), 32, Padding::Ff);
    let animation_offset = w.offset(out)?;
    for e in &entries {
        out.write(e)?;
    }

    let names: Vec<String> = anim.tracks.iter().map(|t| t.material_name.clone()).collect();
    let indices: Vec<u16> = anim.tracks.iter().map(|t| t.material_index).collect();
    let (material_index_offset, name_offset) = pack_material_names(out, &w, &names, &indices)?;

    out.align_from(w.base(), 4, Padding::Ff);
    let texture_matrix_index_offset = w.offset(out)?;
    for t in &anim.tracks {
        out.write(&t.texture_matrix)?;
    }
    out.align_from(w.base(), 4, Padding::Ff);
    let center_offset = w.offset(out)?;
    for t in &anim.tracks {
        out.write(&t.center)?;
    }

    let scale_offset = pack_pool(out, &w, &pools.scales)?;
    let rotation_offset = pack_pool(out, &w, &pools.rotations)?;
    let translation_offset = pack_pool(out, &w, &pools.translations)?;

    let section_size = w.end(out)?;
    w.write_header(out, &Header {
        tag: *b"TTK1",
        section_size,
        loop_mode: anim.loop_mode,
        angle_scale_exponent: exponent,
        duration: anim.duration,
        animation_count: (anim.tracks.len() * 3) as u16,
        scale_count: pools.scales.len() as u16,
        rotation_count: pools.rotations.len() as u16,
        translation_count: pools.translations.len() as u16,
        animation_offset,
        material_index_offset,
        name_offset,
        texture_matrix_index_offset,
        center_offset,
        scale_offset,
        rotation_offset,
        translation_offset,
    })
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::j3d::animation::{Curve, Keyframe, TangentMode};

    pub fn sample(material_name: &str, texture_matrix: u8) -> TextureMatrixAnimation {
        let mut components: [ComponentCurves; 3] = Default::default();
        components[0].scale = Curve::Constant(1.0);
        components[1].scale = Curve::Constant(1.0);
        components[0].translation = Curve::Keys {
            tangent_mode: TangentMode::Piecewise,
            keys: vec![
                Keyframe { time: 0.0, value: 0.0, tangent_in: 0.0, tangent_out: 0.1 },
                Keyframe { time: 10.0, value: 1.0, tangent_in: 0.1, tangent_out: 0.0 },
            ],
        };
        components[2].rotation = Curve::Constant(45.0);
        TextureMatrixAnimation {
            loop_mode: LoopMode::Repeat,
            angle_scale_exponent: 0,
            duration: 10,
            tracks: vec![TextureMatrixTrack {
                material_name: material_name.into(),
                material_index: 0,
                texture_matrix,
                center: [0.5, 0.5, 0.5],
                components,
            }],
        }
    }

    #[test]
    fn round_trip() {
        assert_eq!(Header::SIZE, 52);
        let anim = sample("water", 2);
        let mut out = Out::new();
        pack(&mut out, &anim).unwrap();
        let buf = out.into_inner();
        assert_eq!(buf.len() % 32, 0);
        assert_eq!(unpack(Cur::new(&buf)).unwrap(), anim);
    }
}
