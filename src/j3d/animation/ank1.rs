//! ANK1 (`.bck`): joint scale/rotation/translation keyframes.

use super::{
    angle_scale, fit_angle_exponent, pack_pool, unpack_pool, ComponentCurves,
    ComponentSelections, LoopMode, TransformPools,
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
        joint_animation_count: u16,
        scale_count: u16,
        rotation_count: u16,
        translation_count: u16,
        joint_animation_offset: u32,
        scale_offset: u32,
        rotation_offset: u32,
        translation_offset: u32,
    }
}

/// Curves for the x, y and z axes of one joint.
pub type JointCurves = [ComponentCurves; 3];

#[derive(Clone, Debug, Default, PartialEq)]
pub struct JointAnimation {
    pub loop_mode: LoopMode,
    pub angle_scale_exponent: u8,
    pub duration: u16,
    /// One entry per joint, in joint order.
    pub joints: Vec<JointCurves>,
}

pub fn unpack(cur: Cur) -> Result<JointAnimation> {
    open_section(cur, b"ANK1")?;
    let header: Header = cur.peek()?;
    let scale = angle_scale(header.angle_scale_exponent);

    let pools = TransformPools {
        scales: unpack_pool(cur + header.scale_offset, header.scale_count as usize)?,
        rotations: unpack_pool(cur + header.rotation_offset, header.rotation_count as usize)?,
        translations: unpack_pool(cur + header.translation_offset, header.translation_count as usize)?,
    };

    let mut c = cur + header.joint_animation_offset;
    let mut joints = Vec::with_capacity(header.joint_animation_count as usize);
    for _ in 0..header.joint_animation_count {
        let sels: [ComponentSelections; 3] = c.next()?;
        joints.push([
            pools.read(&sels[0], scale)?,
            pools.read(&sels[1], scale)?,
            pools.read(&sels[2], scale)?,
        ]);
    }

    Ok(JointAnimation {
        loop_mode: header.loop_mode,
        angle_scale_exponent: header.angle_scale_exponent,
        duration: header.duration,
        joints,
    })
}

pub fn pack(out: &mut Out, anim: &JointAnimation) -> Result<()> {
    check!(anim.joints.len() <= 0xFFFF)?;
    let w = SectionWriter::begin(out, Header::SIZE);

    let exponent = fit_angle_exponent(
        anim.angle_scale_exponent,
        anim.joints.iter().flat_map(|j| j.iter().map(|c| &c.rotation)),
    );
    let scale = angle_scale(exponent);

    let mut pools = TransformPools::default();
    let mut entries = Vec::with_capacity(anim.joints.len());
    for joint in &anim.joints {
        entries.push([
            pools.write(&joint[0], scale)?,
            pools.write(&joint[1], scale)?,
            pools.write(&joint[2], scale)?,
        ]);
    }

    out.align_from(w.base(), 32, Padding::Ff);
    let joint_animation_offset = w.offset(out)?;
    for e in &entries {
        out.write(e)?;
    }
    let scale_offset = pack_pool(out, &w, &pools.scales)?;
    let rotation_offset = pack_pool(out, &w, &pools.rotations)?;
    let translation_offset = pack_pool(out, &w, &pools.translations)?;

    let section_size = w.end(out)?;
    w.write_header(out, &Header {
        tag: *b"ANK1",
        section_size,
        loop_mode: anim.loop_mode,
        angle_scale_exponent: exponent,
        duration: anim.duration,
        joint_animation_count: anim.joints.len() as u16,
        scale_count: pools.scales.len() as u16,
        rotation_count: pools.rotations.len() as u16,
        translation_count: pools.translations.len() as u16,
        joint_animation_offset,
        scale_offset,
        rotation_offset,
        translation_offset,
    })
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::j3d::animation::{Curve, Keyframe, TangentMode};

    pub fn sample() -> JointAnimation {
        let spin = Curve::Keys {
            tangent_mode: TangentMode::Symmetric,
            keys: vec![
                Keyframe { time: 0.0, value: 0.0, tangent_in: 0.0, tangent_out: 0.0 },
                Keyframe { time: 30.0, value: 90.0, tangent_in: 0.0, tangent_out: 0.0 },
            ],
        };
        let mut joint: JointCurves = Default::default();
        for c in joint.iter_mut() {
            c.scale = Curve::Constant(1.0);
        }
        joint[1].rotation = spin;
        joint[2].translation = Curve::Constant(5.0);
        JointAnimation {
            loop_mode: LoopMode::Repeat,
            angle_scale_exponent: 0,
            duration: 30,
            joints: vec![Default::default(), joint],
        }
    }

    #[test]
    fn sizes() {
        assert_eq!(Header::SIZE, 36);
        assert_eq!(<[ComponentSelections; 3]>::SIZE, 54);
    }

    #[test]
    fn round_trip() {
        let mut anim = sample();
        anim.joints[0] = anim.joints[1].clone();
        let mut out = Out::new();
        pack(&mut out, &anim).unwrap();
        let buf = out.into_inner();
        assert_eq!(buf.len() % 32, 0);

        let read = unpack(Cur::new(&buf)).unwrap();
        assert_eq!(read, anim);
        // Both joints share every run; the constant 0 rotation comes first.
        let header: Header = Cur::new(&buf).peek().unwrap();
        assert_eq!(header.scale_count, 1);
        assert_eq!(header.rotation_count, 7);
        assert_eq!(header.translation_count, 2);
    }
}
