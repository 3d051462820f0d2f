//! MAT3: materials.
//!
//! Material state is split into about two dozen pools of deduplicated
//! records. Each material is an [`Entry`] of indices into those pools;
//! entries are themselves deduplicated, and each material picks one by
//! index.

pub mod entry;
pub mod indexer;

use self::entry::{Entry, IndirectEntry};
use self::indexer::{load_indirect, PoolBuilder, PoolReader, POOL_COUNT};
use super::material::Material;
use super::{open_section, optional_offset, SectionWriter};
use crate::binary::names::{pack_names, unpack_names};
use crate::binary::{Cur, FixedSize, Out, Pack, Padding};
use crate::errors::Result;
use crate::util::dedup::DedupVec;

record! {
    pub struct Header {
        tag: [u8; 4],
        section_size: u32,
        count: u16,
        pad(2),
        entry_offset: u32,
        entry_index_offset: u32,
        name_offset: u32,
        indirect_entry_offset: u32,
        pool_offsets: [u32; 26],
    }
}

impl Header {
    fn table_offsets(&self) -> Vec<u32> {
        let mut offsets = vec![
            self.entry_offset,
            self.entry_index_offset,
            self.name_offset,
            self.indirect_entry_offset,
        ];
        offsets.extend_from_slice(&self.pool_offsets);
        offsets
    }
}

pub fn unpack(cur: Cur) -> Result<Vec<Material>> {
    let size = open_section(cur, b"MAT3")?;
    let header: Header = cur.peek()?;
    let n = header.count as usize;

    if header.entry_offset as usize > size {
        return Err(cur.error(format!("MAT3 entry table at {:#x} is past the section end", header.entry_offset)));
    }
    let table_offsets = header.table_offsets();
    let entries_end = table_offsets.iter()
        .cloned()
        .filter(|&o| o > header.entry_offset)
        .min()
        .unwrap_or(size as u32);
    let entry_count = entries_end.saturating_sub(header.entry_offset) as usize / Entry::SIZE;

    let names = unpack_names(&mut (cur + header.name_offset))?;
    if names.len() != n {
        return Err(cur.error(format!("{} materials but {} material names", n, names.len())));
    }

    let pools = PoolReader::new(cur, size, &header.pool_offsets, &table_offsets);

    let mut entry_indices = cur + header.entry_index_offset;
    let mut materials = Vec::with_capacity(n);
    for (i, name) in names.into_iter().enumerate() {
        let pos = entry_indices.pos();
        let entry_index = entry_indices.next::<u16>()? as usize;
        if entry_index >= entry_count {
            return Err(entry_indices.error_at(pos, format!(
                "material entry {} out of range ({})", entry_index, entry_count,
            )));
        }
        let entry: Entry = (cur + header.entry_offset + entry_index * Entry::SIZE).peek()?;

        let indirect = match optional_offset(header.indirect_entry_offset) {
            Some(offset) => Some((cur + offset + i * IndirectEntry::SIZE).peek::<IndirectEntry>()?),
            None => None,
        };

        debug!("material {:?}: entry {}", name, entry_index);
        materials.push(pools.unload(name, &entry, indirect.as_ref())?);
    }
    Ok(materials)
}

pub fn pack(out: &mut Out, materials: &[Material]) -> Result<()> {
    check!(materials.len() <= 0xFFFF)?;
    let w = SectionWriter::begin(out, Header::SIZE);

    let mut pools = PoolBuilder::new();
    let mut entries = DedupVec::new();
    let mut entry_indices = Vec::with_capacity(materials.len());
    for material in materials {
        let entry = pools.index(material)?;
        entry_indices.push(entries.push(entry));
    }

    let entry_offset = w.offset(out)?;
    for entry in entries.iter() {
        entry.pack(out)?;
    }

    let entry_index_offset = w.offset(out)?;
    for &i in &entry_indices {
        check!(i <= 0xFFFF)?;
        (i as u16).pack(out)?;
    }

    out.align_from(w.base(), 4, Padding::Ff);
    let name_offset = w.offset(out)?;
    let names: Vec<String> = materials.iter().map(|m| m.name.clone()).collect();
    pack_names(out, &names)?;

    out.align_from(w.base(), 4, Padding::Ff);
    let indirect_entry_offset = w.offset(out)?;
    for material in materials {
        load_indirect(material).pack(out)?;
    }

    let pool_offsets: [u32; POOL_COUNT] = pools.write(out, &w)?;

    let section_size = w.end(out)?;
    w.write_header(out, &Header {
        tag: *b"MAT3",
        section_size,
        count: materials.len() as u16,
        entry_offset,
        entry_index_offset,
        name_offset,
        indirect_entry_offset,
        pool_offsets,
    })
}

#[cfg(test)]
pub mod tests {
    use super::indexer::*;
    use super::*;
    use crate::gx::*;
    use crate::j3d::material::*;

    /// A material touching most of the pools.
    pub fn sample_material(name: &str) -> Material {
        let mut m = Material { name: name.to_string(), ..Material::default() };
        m.cull_mode = CullMode::None;
        m.channel_count = 2;
        m.channels[1].material_color = Color::new(1, 2, 3, 4);
        m.channels[0].color_mode.lighting_enabled = true;
        m.lights[2] = Some(Light { color: Color::new(9, 9, 9, 9), ..Light::default() });
        m.texcoord_generator_count = 1;
        m.texcoord_generators[0].matrix = TEXMTX0 + 3 * 2;
        m.texture_matrices[2].scale = [2.0, 0.5];
        m.texture_matrices[2].rotation = crate::binary::fixed::Angle::from_raw(16384);
        m.texture_indices[0] = Some(1);
        m.tev_stage_count = 2;
        m.tev_stages[0].texcoord = Some(TexCoordId::TexCoord0);
        m.tev_stages[0].texture = Some(TexMapId::TexMap0);
        m.tev_stages[0].color = Some(ChannelId::Color0A0);
        m.tev_stages[1].constant_color = KColorSelection::K1;
        m.tev_stages[1].color_swap_table = 2;
        m.tev_stages[5].constant_alpha = KAlphaSelection::K3A;
        m.kcolors[1] = Color::new(0x80, 0x40, 0x20, 0x10);
        m.tev_colors[2] = ColorS16::new(-10, 300, 0, 255);
        m.indirect_stage_count = 1;
        m.indirect_stages[0].scale_s = IndTexScale::Scale4;
        m.tev_stages[1].indirect.matrix = IndTexMatrix::Matrix0;
        m.alpha_test.function0 = CompareFunction::GreaterEqual;
        m.alpha_test.reference0 = 0x80;
        m.blend_mode.function = BlendFunction::Blend;
        m.fog.function = FogFunction::PerspectiveLinear;
        m.depth_test_early = true;
        m.unknown3[0] = 0x1234;
        m.unknown5 = Some(Unknown5 { enable: 1, scale: [1.0, 1.0, 1.0] });
        m
    }

    #[test]
    fn unload_load_identity() {
        let materials = vec![
            Material { name: "default".into(), ..Material::default() },
            sample_material("a"),
            sample_material("b"),
        ];
        let mut out = Out::new();
        pack(&mut out, &materials).unwrap();
        let buf = out.into_inner();
        assert_eq!(buf.len() % 32, 0);
        assert_eq!(&buf[4..8], &(buf.len() as u32).to_be_bytes());

        let read = unpack(Cur::new(&buf)).unwrap();
        assert_eq!(read, materials);

        let mut again = Out::new();
        pack(&mut again, &read).unwrap();
        assert_eq!(again.into_inner(), buf);
    }

    #[test]
    fn equal_materials_share_an_entry() {
        let materials = vec![sample_material("a"), sample_material("b")];
        let mut out = Out::new();
        pack(&mut out, &materials).unwrap();
        let buf = out.into_inner();
        let header: Header = Cur::new(&buf).next().unwrap();
        assert_eq!(header.entry_index_offset - header.entry_offset, Entry::SIZE as u32);
        let mut c = Cur::new(&buf) + header.entry_index_offset;
        assert_eq!(c.next_n::<u16>(2).unwrap(), vec![0, 0]);
        assert_eq!(header.pool_offsets[UNKNOWN3], 0);
    }

    #[test]
    fn combiners_merge() {
        let mut m = Material::default();
        m.tev_stage_count = 16;
        for stage in m.tev_stages.iter_mut() {
            stage.color_mode = TevColorMode {
                a: TevColorInput::Zero,
                b: TevColorInput::Zero,
                c: TevColorInput::Zero,
                d: TevColorInput::TextureColor,
                function: TevFunction::Add,
                bias: TevBias::Zero,
                scale: TevScale::One,
                clamp: true,
                output: TevRegister::Previous,
            };
        }
        let mut pools = PoolBuilder::new();
        let entry = pools.index(&m).unwrap();
        assert_eq!(pools.tev_combiner_count(), 1);
        assert_eq!(entry.tev_combiners, [Some(0); 16]);
        assert_eq!(entry.swap_modes, [Some(0); 16]);
    }

    #[test]
    fn unused_defaults_are_absent() {
        let m = Material::default();
        let entry = PoolBuilder::new().index(&m).unwrap();
        assert_eq!(entry.cull_mode, Some(0));
        assert_eq!(entry.dither, Some(1));
        assert_eq!(entry.depth_test_early, Some(0));
        assert_eq!(entry.material_colors, [Some(0), None]);
        assert_eq!(entry.texcoord_generators, [None; 8]);
        assert_eq!(entry.texture_matrices, [None; 10]);
        assert_eq!(entry.tev_orders[0], Some(0));
        assert_eq!(entry.tev_orders[1], None);
        assert_eq!(entry.kcolor_selections[0], 0);
        assert_eq!(entry.kcolor_selections[1], 0xFF);
        assert_eq!(entry.lights, [None; 8]);
    }

    #[test]
    fn unused_texture_matrix_of_enabled_generator_is_kept() {
        let mut m = Material::default();
        m.texcoord_generator_count = 2;
        let entry = PoolBuilder::new().index(&m).unwrap();
        assert_eq!(entry.texture_matrices[0], Some(0));
        assert_eq!(entry.texture_matrices[1], Some(0));
        assert_eq!(entry.texture_matrices[2], None);
    }

    #[test]
    fn entry_table_past_the_end_is_an_error() {
        let mut out = Out::new();
        pack(&mut out, &[Material::default()]).unwrap();
        let mut buf = out.into_inner();
        buf[12..16].copy_from_slice(&0x1000u32.to_be_bytes());
        assert!(unpack(Cur::new(&buf)).is_err());
    }
}
