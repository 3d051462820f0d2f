//! JNT1: joints (bones).

use super::{open_section, pack_identity_array, unpack_index_array, SectionWriter};
use crate::binary::fixed::Angle;
use crate::binary::names::{pack_names, unpack_names};
use crate::binary::{Cur, FixedSize, Out, Padding};
use crate::errors::Result;

record! {
    pub struct Header {
        tag: [u8; 4],
        section_size: u32,
        count: u16,
        pad(2),
        joint_offset: u32,
        index_offset: u32,
        name_offset: u32,
    }
}

record! {
    #[derive(Copy, Clone, Debug, PartialEq)]
    pub struct JointRecord {
        /// 0 normal, 1 billboard, 2 Y-billboard.
        matrix_type: u16,
        ignore_parent_scale: u8,
        pad(1),
        scale: [f32; 3],
        rotation: [Angle; 3],
        pad(2),
        translation: [f32; 3],
        bounding_radius: f32,
        min: [f32; 3],
        max: [f32; 3],
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Joint {
    pub name: String,
    pub matrix_type: u16,
    pub ignore_parent_scale: bool,
    pub scale: [f32; 3],
    /// Euler angles in degrees, applied X then Y then Z.
    pub rotation: [f32; 3],
    pub translation: [f32; 3],
    pub bounding_radius: f32,
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Default for Joint {
    fn default() -> Joint {
        Joint {
            name: String::new(),
            matrix_type: 0,
            ignore_parent_scale: false,
            scale: [1.0; 3],
            rotation: [0.0; 3],
            translation: [0.0; 3],
            bounding_radius: 0.0,
            min: [0.0; 3],
            max: [0.0; 3],
        }
    }
}

impl Joint {
    fn from_record(name: String, r: JointRecord) -> Joint {
        Joint {
            name,
            matrix_type: r.matrix_type,
            ignore_parent_scale: r.ignore_parent_scale != 0,
            scale: r.scale,
            rotation: [r.rotation[0].0, r.rotation[1].0, r.rotation[2].0],
            translation: r.translation,
            bounding_radius: r.bounding_radius,
            min: r.min,
            max: r.max,
        }
    }

    fn to_record(&self) -> JointRecord {
        JointRecord {
            matrix_type: self.matrix_type,
            ignore_parent_scale: self.ignore_parent_scale as u8,
            scale: self.scale,
            rotation: [Angle(self.rotation[0]), Angle(self.rotation[1]), Angle(self.rotation[2])],
            translation: self.translation,
            bounding_radius: self.bounding_radius,
            min: self.min,
            max: self.max,
        }
    }
}

pub fn unpack(cur: Cur) -> Result<Vec<Joint>> {
    open_section(cur, b"JNT1")?;
    let header: Header = cur.peek()?;
    let n = header.count as usize;

    let indices = unpack_index_array(cur + header.index_offset, n, n)?;
    let records: Vec<JointRecord> = (cur + header.joint_offset).next_n(n)?;
    let names = unpack_names(&mut (cur + header.name_offset))?;
    if names.len() != n {
        return Err(cur.error(format!("{} joints but {} joint names", n, names.len())));
    }

    Ok(indices.into_iter()
        .zip(names)
        .map(|(i, name)| Joint::from_record(name, records[i]))
        .collect())
}

pub fn pack(out: &mut Out, joints: &[Joint]) -> Result<()> {
    check!(joints.len() <= 0xFFFF)?;
    let w = SectionWriter::begin(out, Header::SIZE);

    let joint_offset = w.offset(out)?;
    for joint in joints {
        out.write(&joint.to_record())?;
    }

    let index_offset = w.offset(out)?;
    pack_identity_array(out, joints.len())?;

    out.align_from(w.base(), 4, Padding::Ff);
    let name_offset = w.offset(out)?;
    let names: Vec<String> = joints.iter().map(|j| j.name.clone()).collect();
    pack_names(out, &names)?;

    let section_size = w.end(out)?;
    w.write_header(out, &Header {
        tag: *b"JNT1",
        section_size,
        count: joints.len() as u16,
        joint_offset,
        index_offset,
        name_offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_size() {
        assert_eq!(JointRecord::SIZE, 64);
    }

    #[test]
    fn round_trip() {
        let joints = vec![
            Joint { name: "root".into(), ..Joint::default() },
            Joint {
                name: "arm_L".into(),
                rotation: [Angle::from_raw(16384).0, Angle::from_raw(-8192).0, 180.0],
                translation: [10.0, 0.0, -2.5],
                ignore_parent_scale: true,
                ..Joint::default()
            },
        ];
        let mut out = Out::new();
        pack(&mut out, &joints).unwrap();
        let buf = out.into_inner();
        assert_eq!(buf.len() % 32, 0);
        assert_eq!(unpack(Cur::new(&buf)).unwrap(), joints);
    }

    #[test]
    fn rotation_out_of_range_fails() {
        let joints = vec![Joint { rotation: [200.0, 0.0, 0.0], ..Joint::default() }];
        assert!(pack(&mut Out::new(), &joints).is_err());
    }
}
