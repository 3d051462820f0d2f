//! EVP1: skinning influence groups and inverse bind matrices.

use super::{open_section, optional_offset, SectionWriter};
use crate::binary::{Cur, FixedSize, Out, Pack, Padding};
use crate::errors::Result;
use smallvec::SmallVec;

record! {
    pub struct Header {
        tag: [u8; 4],
        section_size: u32,
        group_count: u16,
        pad(2),
        influence_count_offset: u32,
        influence_index_offset: u32,
        influence_weight_offset: u32,
        inverse_bind_matrix_offset: u32,
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Influence {
    pub joint: u16,
    pub weight: f32,
}

pub type InfluenceGroup = SmallVec<[Influence; 4]>;

/// A 3x4 row-major affine matrix.
pub type Matrix3x4 = [[f32; 4]; 3];

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Skinning {
    pub influence_groups: Vec<InfluenceGroup>,
    pub inverse_bind_matrices: Vec<Matrix3x4>,
}

pub fn unpack(cur: Cur) -> Result<Skinning> {
    let size = open_section(cur, b"EVP1")?;
    let header: Header = cur.peek()?;
    let n = header.group_count as usize;

    let mut influence_groups = Vec::with_capacity(n);
    if n != 0 {
        let mut counts = cur + header.influence_count_offset;
        let mut indices = cur + header.influence_index_offset;
        let mut weights = cur + header.influence_weight_offset;
        for _ in 0..n {
            let count = counts.next::<u8>()?;
            let mut group = InfluenceGroup::new();
            for _ in 0..count {
                group.push(Influence {
                    joint: indices.next()?,
                    weight: weights.next()?,
                });
            }
            influence_groups.push(group);
        }
    }

    let mut inverse_bind_matrices = vec![];
    if let Some(offset) = optional_offset(header.inverse_bind_matrix_offset) {
        let count = size.saturating_sub(offset as usize) / <Matrix3x4>::SIZE;
        inverse_bind_matrices = (cur + offset).next_n(count)?;
    }

    debug!("{} influence groups, {} inverse bind matrices",
        influence_groups.len(), inverse_bind_matrices.len());
    Ok(Skinning { influence_groups, inverse_bind_matrices })
}

pub fn pack(out: &mut Out, skinning: &Skinning) -> Result<()> {
    let groups = &skinning.influence_groups;
    check!(groups.len() <= 0xFFFF)?;
    let w = SectionWriter::begin(out, Header::SIZE);

    let mut header = Header {
        tag: *b"EVP1",
        section_size: 0,
        group_count: groups.len() as u16,
        influence_count_offset: 0,
        influence_index_offset: 0,
        influence_weight_offset: 0,
        inverse_bind_matrix_offset: 0,
    };

    if !groups.is_empty() {
        header.influence_count_offset = w.offset(out)?;
        for group in groups {
            check!(group.len() <= 0xFF)?;
            (group.len() as u8).pack(out)?;
        }

        header.influence_index_offset = w.offset(out)?;
        for influence in groups.iter().flatten() {
            influence.joint.pack(out)?;
        }

        out.align_from(w.base(), 4, Padding::Ff);
        header.influence_weight_offset = w.offset(out)?;
        for influence in groups.iter().flatten() {
            influence.weight.pack(out)?;
        }
    }

    if !skinning.inverse_bind_matrices.is_empty() {
        header.inverse_bind_matrix_offset = w.offset(out)?;
        for matrix in &skinning.inverse_bind_matrices {
            matrix.pack(out)?;
        }
    }

    header.section_size = w.end(out)?;
    w.write_header(out, &header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn round_trip() {
        let skinning = Skinning {
            influence_groups: vec![
                smallvec![Influence { joint: 1, weight: 0.25 }, Influence { joint: 2, weight: 0.75 }],
                smallvec![Influence { joint: 0, weight: 1.0 }],
            ],
            inverse_bind_matrices: vec![
                [[1.0, 0.0, 0.0, 0.5], [0.0, 1.0, 0.0, 0.0], [0.0, 0.0, 1.0, 0.0]];
                3
            ],
        };
        let mut out = Out::new();
        pack(&mut out, &skinning).unwrap();
        let buf = out.into_inner();
        assert_eq!(buf.len() % 32, 0);
        assert_eq!(unpack(Cur::new(&buf)).unwrap(), skinning);

        let mut again = Out::new();
        pack(&mut again, &unpack(Cur::new(&buf)).unwrap()).unwrap();
        assert_eq!(again.into_inner(), buf);
    }

    #[test]
    fn empty() {
        let mut out = Out::new();
        pack(&mut out, &Skinning::default()).unwrap();
        let buf = out.into_inner();
        assert_eq!(buf.len(), 32);
        assert_eq!(&buf[12..28], &[0; 16]);
        assert_eq!(unpack(Cur::new(&buf)).unwrap(), Skinning::default());
    }
}
