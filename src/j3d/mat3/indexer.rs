//! Converting between materials and (entry, pools).
//!
//! Packing runs every material through a [`PoolBuilder`], which adds the
//! material's records to the shared pools and returns the entry of
//! indices. Unpacking goes the other way with a [`PoolReader`].
//!
//! A slot whose value is the material default and isn't in use (past
//! the stage/generator/channel count) is written as absent. Reading an
//! absent slot gives the default back, so `unload(load(m)) == m`.

use super::entry::{Entry, IndirectEntry};
use crate::binary::{Cur, FixedSize, Out, Pack, Padding, Unpack};
use crate::errors::Result;
use crate::gx::*;
use crate::j3d::material::*;
use crate::j3d::SectionWriter;
use crate::util::dedup::DedupVec;

pub const POOL_COUNT: usize = 26;

pub const CULL_MODE: usize = 0;
pub const MATERIAL_COLOR: usize = 1;
pub const CHANNEL_COUNT: usize = 2;
pub const LIGHTING_MODE: usize = 3;
pub const AMBIENT_COLOR: usize = 4;
pub const LIGHT: usize = 5;
pub const TEXCOORD_GENERATOR_COUNT: usize = 6;
pub const TEXCOORD_GENERATOR: usize = 7;
pub const UNKNOWN2: usize = 8;
pub const TEXTURE_MATRIX: usize = 9;
pub const UNKNOWN3: usize = 10;
pub const TEXTURE_INDEX: usize = 11;
pub const TEV_ORDER: usize = 12;
pub const TEV_COLOR: usize = 13;
pub const KCOLOR: usize = 14;
pub const TEV_STAGE_COUNT: usize = 15;
pub const TEV_COMBINER: usize = 16;
pub const SWAP_MODE: usize = 17;
pub const SWAP_TABLE: usize = 18;
pub const FOG: usize = 19;
pub const ALPHA_TEST: usize = 20;
pub const BLEND_MODE: usize = 21;
pub const DEPTH_MODE: usize = 22;
pub const DEPTH_TEST_EARLY: usize = 23;
pub const DITHER: usize = 24;
pub const UNKNOWN5: usize = 25;

pub const POOL_NAMES: [&str; POOL_COUNT] = [
    "cull mode", "material color", "channel count", "lighting mode",
    "ambient color", "light", "texcoord generator count",
    "texcoord generator", "unknown2", "texture matrix", "unknown3",
    "texture index", "tev order", "tev color", "kcolor", "tev stage count",
    "tev combiner", "swap mode", "swap table", "fog", "alpha test",
    "blend mode", "depth mode", "depth test early", "dither", "unknown5",
];

fn index8(i: usize) -> Result<Option<u8>> {
    check!(i < 0xFF)?;
    Ok(Some(i as u8))
}

fn index16(i: usize) -> Result<Option<u16>> {
    check!(i < 0xFFFF)?;
    Ok(Some(i as u16))
}

/// The pools, filled in while indexing materials for packing.
pub struct PoolBuilder {
    cull_modes: DedupVec<CullMode>,
    material_colors: DedupVec<Color>,
    channel_counts: DedupVec<u8>,
    lighting_modes: DedupVec<LightingMode>,
    ambient_colors: DedupVec<Color>,
    lights: DedupVec<Light>,
    texcoord_generator_counts: DedupVec<u8>,
    texcoord_generators: DedupVec<TexCoordGenerator>,
    post_texcoord_generators: DedupVec<PostTexCoordGenerator>,
    texture_matrices: DedupVec<TextureMatrix>,
    texture_indices: DedupVec<u16>,
    tev_orders: DedupVec<TevOrder>,
    tev_colors: DedupVec<ColorS16>,
    kcolors: DedupVec<Color>,
    tev_stage_counts: DedupVec<u8>,
    /// Combiners and swap modes share indices.
    tev_combiners: DedupVec<(TevCombiner, SwapMode)>,
    swap_tables: DedupVec<SwapTable>,
    fogs: DedupVec<Fog>,
    alpha_tests: DedupVec<AlphaTest>,
    blend_modes: DedupVec<BlendMode>,
    depth_modes: DedupVec<DepthMode>,
    depth_test_earlys: DedupVec<bool>,
    dithers: DedupVec<bool>,
    unknown5s: DedupVec<Unknown5>,
}

impl PoolBuilder {
    pub fn new() -> PoolBuilder {
        PoolBuilder {
            cull_modes: DedupVec::seeded(vec![CullMode::Back, CullMode::Front, CullMode::None]),
            material_colors: DedupVec::new(),
            channel_counts: DedupVec::new(),
            lighting_modes: DedupVec::new(),
            ambient_colors: DedupVec::new(),
            lights: DedupVec::new(),
            texcoord_generator_counts: DedupVec::new(),
            texcoord_generators: DedupVec::new(),
            post_texcoord_generators: DedupVec::new(),
            texture_matrices: DedupVec::new(),
            texture_indices: DedupVec::new(),
            tev_orders: DedupVec::new(),
            tev_colors: DedupVec::new(),
            kcolors: DedupVec::new(),
            tev_stage_counts: DedupVec::new(),
            tev_combiners: DedupVec::new(),
            swap_tables: DedupVec::new(),
            fogs: DedupVec::new(),
            alpha_tests: DedupVec::new(),
            blend_modes: DedupVec::new(),
            depth_modes: DedupVec::new(),
            depth_test_earlys: DedupVec::seeded(vec![false, true]),
            dithers: DedupVec::seeded(vec![false, true]),
            unknown5s: DedupVec::new(),
        }
    }

    /// Adds the material's records to the pools and returns its entry.
    pub fn index(&mut self, m: &Material) -> Result<Entry> {
        let default = Material::default();
        let channel_count = m.channel_count as usize;
        let tcg_count = m.texcoord_generator_count as usize;
        let stage_count = m.tev_stage_count as usize;

        let mut entry = Entry {
            unknown0: m.transparency_hint,
            cull_mode: index8(self.cull_modes.push(m.cull_mode))?,
            channel_count: index8(self.channel_counts.push(m.channel_count))?,
            texcoord_generator_count: index8(self.texcoord_generator_counts.push(m.texcoord_generator_count))?,
            tev_stage_count: index8(self.tev_stage_counts.push(m.tev_stage_count))?,
            depth_test_early: index8(self.depth_test_earlys.push(m.depth_test_early))?,
            depth_mode: index8(self.depth_modes.push(m.depth_mode))?,
            dither: index8(self.dithers.push(m.dither))?,
            material_colors: [None; 2],
            lighting_modes: [None; 4],
            ambient_colors: [None; 2],
            lights: [None; 8],
            texcoord_generators: [None; 8],
            unknown2: [None; 8],
            texture_matrices: [None; 10],
            unknown3: m.unknown3,
            texture_indices: [None; 8],
            kcolors: [None; 4],
            kcolor_selections: [0xFF; 16],
            kalpha_selections: [0xFF; 16],
            tev_orders: [None; 16],
            tev_colors: [None; 4],
            tev_combiners: [None; 16],
            swap_modes: [None; 16],
            swap_tables: [None; 4],
            unknown4: m.unknown4,
            fog: index16(self.fogs.push(m.fog))?,
            alpha_test: index16(self.alpha_tests.push(m.alpha_test))?,
            blend_mode: index16(self.blend_modes.push(m.blend_mode))?,
            unknown5: None,
        };

        for (i, (channel, default)) in m.channels.iter().zip(&default.channels).enumerate() {
            let in_use = i < channel_count;
            if in_use || channel.material_color != default.material_color {
                entry.material_colors[i] = index16(self.material_colors.push(channel.material_color))?;
            }
            if in_use || channel.color_mode != default.color_mode {
                entry.lighting_modes[2 * i] = index16(self.lighting_modes.push(channel.color_mode))?;
            }
            if in_use || channel.alpha_mode != default.alpha_mode {
                entry.lighting_modes[2 * i + 1] = index16(self.lighting_modes.push(channel.alpha_mode))?;
            }
            if in_use || channel.ambient_color != default.ambient_color {
                entry.ambient_colors[i] = index16(self.ambient_colors.push(channel.ambient_color))?;
            }
        }

        for (i, light) in m.lights.iter().enumerate() {
            if let Some(light) = light {
                entry.lights[i] = index16(self.lights.push(*light))?;
            }
        }

        for (i, tcg) in m.texcoord_generators.iter().enumerate() {
            if i < tcg_count || *tcg != default.texcoord_generators[i] {
                entry.texcoord_generators[i] = index16(self.texcoord_generators.push(*tcg))?;
            }
        }

        for (i, post) in m.post_texcoord_generators.iter().enumerate() {
            if let Some(post) = post {
                entry.unknown2[i] = index16(self.post_texcoord_generators.push(*post))?;
            }
        }

        // The console tooling writes a matrix for every enabled generator,
        // referenced or not.
        for (i, matrix) in m.texture_matrices.iter().enumerate() {
            let referenced = m.enabled_texcoord_generators().iter()
                .any(|tcg| tcg.texture_matrix() == Some(i));
            if i < tcg_count || referenced || *matrix != default.texture_matrices[i] {
                entry.texture_matrices[i] = index16(self.texture_matrices.push(*matrix))?;
            }
        }

        for (i, texture) in m.texture_indices.iter().enumerate() {
            if let Some(texture) = texture {
                entry.texture_indices[i] = index16(self.texture_indices.push(*texture))?;
            }
        }

        for (i, stage) in m.tev_stages.iter().enumerate() {
            let in_use = i < stage_count;
            let default = &default.tev_stages[i];
            if in_use || stage.order() != default.order() {
                entry.tev_orders[i] = index16(self.tev_orders.push(stage.order()))?;
            }
            let pair = (stage.combiner(), stage.swap_mode());
            if in_use || pair != (default.combiner(), default.swap_mode()) {
                let index = index16(self.tev_combiners.push(pair))?;
                entry.tev_combiners[i] = index;
                entry.swap_modes[i] = index;
            }
            if in_use || stage.constant_color != default.constant_color {
                entry.kcolor_selections[i] = stage.constant_color.raw();
            }
            if in_use || stage.constant_alpha != default.constant_alpha {
                entry.kalpha_selections[i] = stage.constant_alpha.raw();
            }
        }

        for (i, color) in m.tev_colors.iter().enumerate() {
            entry.tev_colors[i] = index16(self.tev_colors.push(*color))?;
        }
        entry.tev_colors[3] = index16(self.tev_colors.push(m.tev_color_previous))?;

        for (i, color) in m.kcolors.iter().enumerate() {
            entry.kcolors[i] = index16(self.kcolors.push(*color))?;
        }

        for (i, table) in m.swap_tables.iter().enumerate() {
            entry.swap_tables[i] = index16(self.swap_tables.push(*table))?;
        }

        if let Some(unknown5) = m.unknown5 {
            entry.unknown5 = index16(self.unknown5s.push(unknown5))?;
        }

        Ok(entry)
    }

    /// Writes the pools in header order, filling in their offsets. Empty
    /// pools get offset 0, and so does unknown3 (its data lives in the
    /// entries).
    pub fn write(&self, out: &mut Out, w: &SectionWriter) -> Result<[u32; POOL_COUNT]> {
        fn pool<'a, T, I>(out: &mut Out, w: &SectionWriter, items: I) -> Result<u32>
        where
            T: Pack + 'a,
            I: IntoIterator<Item = &'a T>,
        {
            out.align_from(w.base(), 4, Padding::Ff);
            let offset = w.offset(out)?;
            let start = out.tell();
            for item in items {
                item.pack(out)?;
            }
            Ok(if out.tell() == start { 0 } else { offset })
        }

        let mut offsets = [0; POOL_COUNT];
        offsets[CULL_MODE] = pool(out, w, self.cull_modes.iter())?;
        offsets[MATERIAL_COLOR] = pool(out, w, self.material_colors.iter())?;
        offsets[CHANNEL_COUNT] = pool(out, w, self.channel_counts.iter())?;
        offsets[LIGHTING_MODE] = pool(out, w, self.lighting_modes.iter())?;
        offsets[AMBIENT_COLOR] = pool(out, w, self.ambient_colors.iter())?;
        offsets[LIGHT] = pool(out, w, self.lights.iter())?;
        offsets[TEXCOORD_GENERATOR_COUNT] = pool(out, w, self.texcoord_generator_counts.iter())?;
        offsets[TEXCOORD_GENERATOR] = pool(out, w, self.texcoord_generators.iter())?;
        offsets[UNKNOWN2] = pool(out, w, self.post_texcoord_generators.iter())?;
        offsets[TEXTURE_MATRIX] = pool(out, w, self.texture_matrices.iter())?;
        offsets[UNKNOWN3] = 0;
        offsets[TEXTURE_INDEX] = pool(out, w, self.texture_indices.iter())?;
        offsets[TEV_ORDER] = pool(out, w, self.tev_orders.iter())?;
        offsets[TEV_COLOR] = pool(out, w, self.tev_colors.iter())?;
        offsets[KCOLOR] = pool(out, w, self.kcolors.iter())?;
        offsets[TEV_STAGE_COUNT] = pool(out, w, self.tev_stage_counts.iter())?;
        offsets[TEV_COMBINER] = pool(out, w, self.tev_combiners.iter().map(|p| &p.0))?;
        offsets[SWAP_MODE] = pool(out, w, self.tev_combiners.iter().map(|p| &p.1))?;
        offsets[SWAP_TABLE] = pool(out, w, self.swap_tables.iter())?;
        offsets[FOG] = pool(out, w, self.fogs.iter())?;
        offsets[ALPHA_TEST] = pool(out, w, self.alpha_tests.iter())?;
        offsets[BLEND_MODE] = pool(out, w, self.blend_modes.iter())?;
        offsets[DEPTH_MODE] = pool(out, w, self.depth_modes.iter())?;
        offsets[DEPTH_TEST_EARLY] = pool(out, w, self.depth_test_earlys.iter())?;
        offsets[DITHER] = pool(out, w, self.dithers.iter())?;
        offsets[UNKNOWN5] = pool(out, w, self.unknown5s.iter())?;
        Ok(offsets)
    }

    #[cfg(test)]
    pub fn tev_combiner_count(&self) -> usize {
        self.tev_combiners.len()
    }
}

/// One pool as found in a file. Its length isn't stored; it runs up to
/// the next table.
#[derive(Copy, Clone)]
struct Pool<'a> {
    start: Option<Cur<'a>>,
    len: usize,
}

/// Looks up pooled records by index while unpacking.
pub struct PoolReader<'a> {
    pools: [Pool<'a>; POOL_COUNT],
}

impl<'a> PoolReader<'a> {
    /// `table_offsets` are every offset in the MAT3 header, used to find
    /// where each pool ends.
    pub fn new(
        section: Cur<'a>,
        section_size: usize,
        offsets: &[u32; POOL_COUNT],
        table_offsets: &[u32],
    ) -> PoolReader<'a> {
        let mut ends: Vec<usize> = table_offsets.iter()
            .filter(|&&o| o != 0)
            .map(|&o| o as usize)
            .collect();
        ends.push(section_size);
        ends.sort();

        let mut pools = [Pool { start: None, len: 0 }; POOL_COUNT];
        for (pool, &offset) in pools.iter_mut().zip(offsets.iter()) {
            if offset == 0 {
                continue;
            }
            let offset = offset as usize;
            let end = ends.iter().cloned().find(|&e| e > offset).unwrap_or(section_size);
            *pool = Pool { start: Some(section + offset), len: end - offset };
        }
        PoolReader { pools }
    }

    fn get<T: Unpack + FixedSize>(&self, pool: usize, index: usize) -> Result<T> {
        let p = &self.pools[pool];
        match p.start {
            Some(start) if (index + 1) * T::SIZE <= p.len => (start + index * T::SIZE).peek(),
            Some(start) => Err(start.error(format!(
                "{} index {} out of range", POOL_NAMES[pool], index,
            ))),
            None => bail!("{} index {} but the pool is absent", POOL_NAMES[pool], index),
        }
    }

    fn get8<T: Unpack + FixedSize>(&self, pool: usize, index: Option<u8>, dest: &mut T) -> Result<()> {
        if let Some(i) = index {
            *dest = self.get(pool, i as usize)?;
        }
        Ok(())
    }

    fn get16<T: Unpack + FixedSize>(&self, pool: usize, index: Option<u16>, dest: &mut T) -> Result<()> {
        if let Some(i) = index {
            *dest = self.get(pool, i as usize)?;
        }
        Ok(())
    }

    pub fn unload(&self, name: String, entry: &Entry, indirect: Option<&IndirectEntry>) -> Result<Material> {
        let mut m = Material { name, ..Material::default() };
        m.transparency_hint = entry.unknown0;

        self.get8(CULL_MODE, entry.cull_mode, &mut m.cull_mode)?;
        self.get8(CHANNEL_COUNT, entry.channel_count, &mut m.channel_count)?;
        self.get8(TEXCOORD_GENERATOR_COUNT, entry.texcoord_generator_count, &mut m.texcoord_generator_count)?;
        self.get8(TEV_STAGE_COUNT, entry.tev_stage_count, &mut m.tev_stage_count)?;
        self.get8(DEPTH_TEST_EARLY, entry.depth_test_early, &mut m.depth_test_early)?;
        self.get8(DEPTH_MODE, entry.depth_mode, &mut m.depth_mode)?;
        self.get8(DITHER, entry.dither, &mut m.dither)?;

        for (i, channel) in m.channels.iter_mut().enumerate() {
            self.get16(MATERIAL_COLOR, entry.material_colors[i], &mut channel.material_color)?;
            self.get16(LIGHTING_MODE, entry.lighting_modes[2 * i], &mut channel.color_mode)?;
            self.get16(LIGHTING_MODE, entry.lighting_modes[2 * i + 1], &mut channel.alpha_mode)?;
            self.get16(AMBIENT_COLOR, entry.ambient_colors[i], &mut channel.ambient_color)?;
        }

        for (light, &index) in m.lights.iter_mut().zip(&entry.lights) {
            if let Some(i) = index {
                *light = Some(self.get(LIGHT, i as usize)?);
            }
        }

        for (tcg, &index) in m.texcoord_generators.iter_mut().zip(&entry.texcoord_generators) {
            self.get16(TEXCOORD_GENERATOR, index, tcg)?;
        }
        for (post, &index) in m.post_texcoord_generators.iter_mut().zip(&entry.unknown2) {
            if let Some(i) = index {
                *post = Some(self.get(UNKNOWN2, i as usize)?);
            }
        }
        for (matrix, &index) in m.texture_matrices.iter_mut().zip(&entry.texture_matrices) {
            self.get16(TEXTURE_MATRIX, index, matrix)?;
        }
        m.unknown3 = entry.unknown3;

        for (texture, &index) in m.texture_indices.iter_mut().zip(&entry.texture_indices) {
            if let Some(i) = index {
                *texture = Some(self.get(TEXTURE_INDEX, i as usize)?);
            }
        }

        for (i, stage) in m.tev_stages.iter_mut().enumerate() {
            if let Some(k) = entry.tev_orders[i] {
                let order: TevOrder = self.get(TEV_ORDER, k as usize)?;
                stage.texcoord = order.texcoord;
                stage.texture = order.texture;
                stage.color = order.color;
            }
            if let Some(k) = entry.tev_combiners[i] {
                let combiner: TevCombiner = self.get(TEV_COMBINER, k as usize)?;
                stage.unknown0 = combiner.unknown0;
                stage.color_mode = combiner.color_mode;
                stage.alpha_mode = combiner.alpha_mode;
                stage.unknown1 = combiner.unknown1;
            }
            if let Some(k) = entry.swap_modes[i] {
                let swap: SwapMode = self.get(SWAP_MODE, k as usize)?;
                stage.color_swap_table = swap.color_swap_table;
                stage.texture_swap_table = swap.texture_swap_table;
            }
            match entry.kcolor_selections[i] {
                0xFF => (),
                raw => match KColorSelection::from_raw(raw) {
                    Some(x) => stage.constant_color = x,
                    None => warn!("unknown konst color selection {:#x} in stage {}", raw, i),
                },
            }
            match entry.kalpha_selections[i] {
                0xFF => (),
                raw => match KAlphaSelection::from_raw(raw) {
                    Some(x) => stage.constant_alpha = x,
                    None => warn!("unknown konst alpha selection {:#x} in stage {}", raw, i),
                },
            }
        }

        for (color, &index) in m.tev_colors.iter_mut().zip(&entry.tev_colors[..3]) {
            self.get16(TEV_COLOR, index, color)?;
        }
        self.get16(TEV_COLOR, entry.tev_colors[3], &mut m.tev_color_previous)?;
        for (color, &index) in m.kcolors.iter_mut().zip(&entry.kcolors) {
            self.get16(KCOLOR, index, color)?;
        }
        for (table, &index) in m.swap_tables.iter_mut().zip(&entry.swap_tables) {
            self.get16(SWAP_TABLE, index, table)?;
        }
        m.unknown4 = entry.unknown4;

        self.get16(FOG, entry.fog, &mut m.fog)?;
        self.get16(ALPHA_TEST, entry.alpha_test, &mut m.alpha_test)?;
        self.get16(BLEND_MODE, entry.blend_mode, &mut m.blend_mode)?;
        if let Some(i) = entry.unknown5 {
            m.unknown5 = Some(self.get(UNKNOWN5, i as usize)?);
        }

        if let Some(indirect) = indirect {
            unload_indirect(&mut m, indirect);
        }

        Ok(m)
    }
}

pub fn load_indirect(m: &Material) -> IndirectEntry {
    let mut orders = [IndirectOrder::default(); MAX_INDIRECT_STAGES];
    let mut scales = [IndirectScale::default(); MAX_INDIRECT_STAGES];
    for (i, stage) in m.indirect_stages.iter().enumerate() {
        orders[i] = IndirectOrder { texcoord: stage.texcoord, texture: stage.texture };
        scales[i] = IndirectScale { scale_s: stage.scale_s, scale_t: stage.scale_t };
    }
    let mut tev_indirects = [TevIndirect::default(); MAX_TEV_STAGES];
    for (i, stage) in m.tev_stages.iter().enumerate() {
        tev_indirects[i] = stage.indirect;
    }
    IndirectEntry {
        unknown0: m.indirect_enable as u8,
        indirect_stage_count: m.indirect_stage_count,
        indirect_orders: orders,
        indirect_matrices: m.indirect_matrices,
        indirect_scales: scales,
        tev_indirects,
    }
}

fn unload_indirect(m: &mut Material, indirect: &IndirectEntry) {
    m.indirect_enable = indirect.unknown0 != 0;
    m.indirect_stage_count = indirect.indirect_stage_count;
    for (i, stage) in m.indirect_stages.iter_mut().enumerate() {
        let order = &indirect.indirect_orders[i];
        let scale = &indirect.indirect_scales[i];
        *stage = IndirectStage {
            texcoord: order.texcoord,
            texture: order.texture,
            scale_s: scale.scale_s,
            scale_t: scale.scale_t,
        };
    }
    m.indirect_matrices = indirect.indirect_matrices;
    for (stage, tev_indirect) in m.tev_stages.iter_mut().zip(indirect.tev_indirects.iter()) {
        stage.indirect = *tev_indirect;
    }
}
