//! MDL3: display lists that load each material's state into the GPU
//! registers directly, present in `.bdl` files.
//!
//! Everything here is derived from the materials and textures; nothing
//! is kept when reading besides a sanity check.

use super::material::{LightingMode, Material, TevStage};
use super::texture::Texture;
use super::{open_section, pack_identity_array, SectionWriter};
use crate::binary::names::{pack_names, unpack_names};
use crate::binary::{Cur, FixedSize, Out, Pack, Padding};
use crate::errors::{incompatible, Result};
use crate::gx::bp::{reg, write_bp, write_bp_mask, write_xf, write_xf_f32, xf, parse_commands, Command};
use crate::gx::*;
use crate::util::bits::BitField;

record! {
    pub struct Header {
        tag: [u8; 4],
        section_size: u32,
        count: u16,
        pad(2),
        packet_location_offset: u32,
        subpacket_location_offset: u32,
        matrix_index_offset: u32,
        unknown0_offset: u32,
        index_offset: u32,
        name_offset: u32,
    }
}

record! {
    pub struct PacketLocation {
        /// Relative to this record.
        offset: u32,
        size: u32,
    }
}

record! {
    #[derive(Copy, Clone, Debug, Default, PartialEq)]
    pub struct SubpacketLocation {
        channel_color_offset: u16,
        channel_lighting_offset: u16,
        texcoord_generator_offset: u16,
        texture_offset: u16,
        tev_offset: u16,
        pixel_offset: u16,
        pad(4),
    }
}

record! {
    pub struct MatrixIndex {
        /// Bit i set when texture matrix i is loaded by the packet.
        texture_matrix_mask: u32,
        unknown0: u32,
    }
}

fn rgba8(c: Color) -> u32 {
    (c.r as u32) << 24 | (c.g as u32) << 16 | (c.b as u32) << 8 | c.a as u32
}

/// Hardware encoding of a TEV stage's rasterized color selection.
fn ras_sel(color: Option<ChannelId>) -> u32 {
    match color {
        Some(ChannelId::Color0) | Some(ChannelId::Alpha0) | Some(ChannelId::Color0A0) => 0,
        Some(ChannelId::Color1) | Some(ChannelId::Alpha1) | Some(ChannelId::Color1A1) => 1,
        Some(ChannelId::AlphaBump) => 5,
        Some(ChannelId::AlphaBumpN) => 6,
        Some(ChannelId::ColorZero) | None => 7,
    }
}

fn min_filter_code(filter: FilterMode) -> u32 {
    match filter {
        FilterMode::Nearest => 0,
        FilterMode::NearestMipmapNearest => 1,
        FilterMode::NearestMipmapLinear => 2,
        FilterMode::Linear => 4,
        FilterMode::LinearMipmapNearest => 5,
        FilterMode::LinearMipmapLinear => 6,
    }
}

/// GX's cull register has front and back swapped relative to the API.
fn cull_code(cull: CullMode) -> u32 {
    match cull {
        CullMode::None => 0,
        CullMode::Front => 2,
        CullMode::Back => 1,
        CullMode::All => 3,
    }
}

/// Sign, exponent and 11 bits of mantissa, as the fog registers want.
fn fog_float(x: f32) -> u32 {
    let bits = x.to_bits();
    let sign = bits >> 31;
    let exponent = (bits >> 23) & 0xFF;
    let mantissa = (bits >> 12) & 0x7FF;
    sign << 19 | exponent << 11 | mantissa
}

fn texture_subpacket(out: &mut Out, m: &Material, textures: &[Texture]) -> Result<()> {
    for (unit, index) in m.texture_indices.iter().enumerate() {
        let index = match *index {
            Some(i) => i as usize,
            None => continue,
        };
        let t = textures.get(index).ok_or_else(|| incompatible(format!(
            "material {:?} uses texture {} of {}", m.name, index, textures.len(),
        )))?;

        // Image addresses are patched in at runtime.
        write_bp(out, reg::tx_setimage3(unit), 0);
        write_bp(out, reg::tx_setimage0(unit), 0u32
            .with_bits(0, 10, t.width.saturating_sub(1) as u32)
            .with_bits(10, 20, t.height.saturating_sub(1) as u32)
            .with_bits(20, 24, t.image_format.raw() as u32));

        let lod_bias = (t.lod_bias * 32.0).round() as i32 as u32 & 0xFF;
        write_bp(out, reg::tx_setmode0(unit), 0u32
            .with_bits(0, 2, t.wrap_s.raw() as u32)
            .with_bits(2, 4, t.wrap_t.raw() as u32)
            .with_bits(4, 5, (t.magnification_filter != FilterMode::Nearest) as u32)
            .with_bits(5, 8, min_filter_code(t.minification_filter))
            .with_bits(8, 9, !t.edge_lod as u32)
            .with_bits(9, 17, lod_bias)
            .with_bits(19, 21, t.max_anisotropy.raw() as u32)
            .with_bits(21, 22, t.bias_clamp as u32));
        write_bp(out, reg::tx_setmode1(unit), 0u32
            .with_bits(0, 8, (t.minimum_lod * 16.0).max(0.0) as u32)
            .with_bits(8, 16, (t.maximum_lod * 16.0).max(0.0) as u32));

        if let Some(ref palette) = t.palette {
            let tmem = 0x300 + 0x10 * unit as u32;
            let entries = palette.entry_count() as u32;
            write_bp(out, reg::TX_LOADTLUT0, 0);
            write_bp(out, reg::TX_LOADTLUT1, 0u32
                .with_bits(0, 10, tmem)
                .with_bits(10, 21, entries / 16));
            write_bp(out, reg::tx_settlut(unit), 0u32
                .with_bits(0, 10, tmem)
                .with_bits(10, 12, t.palette_format.raw() as u32));
        }
    }
    Ok(())
}

fn tev_color_mode(stage: &TevStage) -> u32 {
    let c = &stage.color_mode;
    let (bias, op, scale) = if c.function.is_compare() {
        let f = c.function.raw() as u32;
        (3, f & 1, (f >> 1) & 3)
    } else {
        (c.bias.raw() as u32, c.function.raw() as u32, c.scale.raw() as u32)
    };
    0u32.with_bits(0, 4, c.d.raw() as u32)
        .with_bits(4, 8, c.c.raw() as u32)
        .with_bits(8, 12, c.b.raw() as u32)
        .with_bits(12, 16, c.a.raw() as u32)
        .with_bits(16, 18, bias)
        .with_bits(18, 19, op)
        .with_bits(19, 20, c.clamp as u32)
        .with_bits(20, 22, scale)
        .with_bits(22, 24, c.output.raw() as u32)
}

fn tev_alpha_mode(stage: &TevStage) -> u32 {
    let a = &stage.alpha_mode;
    let (bias, op, scale) = if a.function.is_compare() {
        let f = a.function.raw() as u32;
        (3, f & 1, (f >> 1) & 3)
    } else {
        (a.bias.raw() as u32, a.function.raw() as u32, a.scale.raw() as u32)
    };
    0u32.with_bits(0, 2, stage.color_swap_table as u32)
        .with_bits(2, 4, stage.texture_swap_table as u32)
        .with_bits(4, 7, a.d.raw() as u32)
        .with_bits(7, 10, a.c.raw() as u32)
        .with_bits(10, 13, a.b.raw() as u32)
        .with_bits(13, 16, a.a.raw() as u32)
        .with_bits(16, 18, bias)
        .with_bits(18, 19, op)
        .with_bits(19, 20, a.clamp as u32)
        .with_bits(20, 22, scale)
        .with_bits(22, 24, a.output.raw() as u32)
}

fn s11(x: i16) -> u32 {
    (x as i32 as u32) & 0x7FF
}

fn tev_subpacket(out: &mut Out, m: &Material) {
    let stages = m.enabled_tev_stages();

    write_bp(out, reg::GEN_MODE, 0u32
        .with_bits(0, 4, m.texcoord_generator_count as u32)
        .with_bits(4, 7, m.channel_count as u32)
        .with_bits(10, 14, (stages.len() as u32).saturating_sub(1))
        .with_bits(14, 16, cull_code(m.cull_mode))
        .with_bits(16, 19, m.indirect_stage_count as u32));

    // The color register writes its high half three times, like the
    // console libraries do.
    for (i, color) in m.tev_colors.iter().enumerate() {
        let low = reg::TEV_REGISTERL0 + 2 * (i as u8 + 1);
        write_bp(out, low, s11(color.r) | s11(color.a) << 12);
        for _ in 0..3 {
            write_bp(out, low + 1, s11(color.b) | s11(color.g) << 12);
        }
    }

    for (i, color) in m.kcolors.iter().enumerate() {
        // Same addresses as the color registers, told apart by bit 23.
        let low = reg::TEV_REGISTERL0 + 2 * i as u8;
        write_bp(out, low, color.r as u32 | (color.a as u32) << 12 | 1 << 23);
        write_bp(out, low + 1, color.b as u32 | (color.g as u32) << 12 | 1 << 23);
    }

    for (i, stage) in stages.iter().enumerate() {
        write_bp(out, reg::TEV_COLOR_ENV0 + 2 * i as u8, tev_color_mode(stage));
        write_bp(out, reg::TEV_ALPHA_ENV0 + 2 * i as u8, tev_alpha_mode(stage));
    }

    for (i, stage) in stages.iter().enumerate() {
        let ind = &stage.indirect;
        write_bp(out, reg::IND_CMD0 + i as u8, 0u32
            .with_bits(0, 2, ind.indirect_stage.raw() as u32)
            .with_bits(2, 4, ind.format.raw() as u32)
            .with_bits(4, 7, ind.bias_components.raw() as u32)
            .with_bits(7, 9, ind.bump_alpha.raw() as u32)
            .with_bits(9, 13, ind.matrix.raw() as u32)
            .with_bits(13, 16, ind.wrap_s.raw() as u32)
            .with_bits(16, 19, ind.wrap_t.raw() as u32)
            .with_bits(19, 20, ind.use_original_lod as u32)
            .with_bits(20, 21, ind.add_previous_texcoord as u32));
    }

    for pair in 0..MAX_TEV_STAGES / 2 {
        let table = &m.swap_tables[pair / 2];
        let (x, y) = if pair % 2 == 0 { (table.r, table.g) } else { (table.b, table.a) };
        let s0 = &m.tev_stages[2 * pair];
        let s1 = &m.tev_stages[2 * pair + 1];
        write_bp(out, reg::TEV_KSEL0 + pair as u8, 0u32
            .with_bits(0, 2, x.raw() as u32)
            .with_bits(2, 4, y.raw() as u32)
            .with_bits(4, 9, s0.constant_color.raw() as u32)
            .with_bits(9, 14, s0.constant_alpha.raw() as u32)
            .with_bits(14, 19, s1.constant_color.raw() as u32)
            .with_bits(19, 24, s1.constant_alpha.raw() as u32));
    }

    for pair in 0..(stages.len() + 1) / 2 {
        let mut value = 0u32;
        for k in 0..2 {
            let stage = match stages.get(2 * pair + k) {
                Some(s) => s,
                None => break,
            };
            let shift = 12 * k as u32;
            let enable = stage.texture.is_some();
            value = value
                .with_bits(shift, shift + 3, stage.texture.map(|t| t.raw() as u32).unwrap_or(7))
                .with_bits(shift + 3, shift + 6, stage.texcoord.map(|t| t.raw() as u32).unwrap_or(7))
                .with_bits(shift + 6, shift + 7, enable as u32)
                .with_bits(shift + 7, shift + 10, ras_sel(stage.color));
        }
        write_bp(out, reg::RAS1_TREF0 + pair as u8, value);
    }

    let mut iref = 0u32;
    for (i, stage) in m.enabled_indirect_stages().iter().enumerate() {
        let shift = 6 * i as u32;
        iref = iref
            .with_bits(shift, shift + 3, stage.texture as u32 & 7)
            .with_bits(shift + 3, shift + 6, stage.texcoord as u32 & 7);
    }
    write_bp(out, reg::RAS1_IREF, iref);

    for (i, matrix) in m.indirect_matrices.iter().enumerate() {
        let s = (matrix.scale_exponent as i32 + 17) as u32 & 0x3F;
        let fixed = |x: f32| (x * 1024.0).round() as i32 as u32 & 0x7FF;
        let sm = &matrix.significand_matrix;
        let base = reg::IND_MTXA0 + 3 * i as u8;
        write_bp(out, base, fixed(sm[0][0]) | fixed(sm[1][0]) << 11 | (s & 3) << 22);
        write_bp(out, base + 1, fixed(sm[0][1]) | fixed(sm[1][1]) << 11 | ((s >> 2) & 3) << 22);
        write_bp(out, base + 2, fixed(sm[0][2]) | fixed(sm[1][2]) << 11 | ((s >> 4) & 3) << 22);
    }

    for half in 0..2 {
        let mut value = 0u32;
        for k in 0..2 {
            let stage = &m.indirect_stages[2 * half + k];
            let shift = 8 * k as u32;
            value = value
                .with_bits(shift, shift + 4, stage.scale_s.raw() as u32)
                .with_bits(shift + 4, shift + 8, stage.scale_t.raw() as u32);
        }
        write_bp(out, reg::RAS1_SS0 + half as u8, value);
    }
}

fn pixel_subpacket(out: &mut Out, m: &Material) {
    let fog = &m.fog;
    let (a, b, c) = if fog.function == FogFunction::None || fog.z_far == fog.z_near || fog.z_end == fog.z_start {
        (0.0, 0.5, 0.0)
    } else {
        (
            fog.z_near * fog.z_far / ((fog.z_far - fog.z_near) * (fog.z_end - fog.z_start)),
            fog.z_far / (fog.z_far - fog.z_near),
            fog.z_start / (fog.z_end - fog.z_start),
        )
    };
    let mut b_shift = 0u32;
    let mut b_mag = b;
    while b_mag >= 1.0 && b_shift < 31 {
        b_mag /= 2.0;
        b_shift += 1;
    }
    let orthographic = fog.function.raw() >= 8;
    write_bp(out, reg::TEV_FOG_PARAM0, fog_float(a));
    write_bp(out, reg::TEV_FOG_PARAM1, (b_mag * 8_388_638.0) as u32 & 0xFF_FFFF);
    write_bp(out, reg::TEV_FOG_PARAM2, b_shift);
    write_bp(out, reg::TEV_FOG_PARAM3, fog_float(c)
        .with_bits(20, 21, orthographic as u32)
        .with_bits(21, 24, (fog.function.raw() & 7) as u32));
    write_bp(out, reg::TEV_FOG_COLOR, rgba8(fog.color) >> 8);

    let at = &m.alpha_test;
    write_bp(out, reg::TEV_ALPHAFUNC, 0u32
        .with_bits(0, 8, at.reference0 as u32)
        .with_bits(8, 16, at.reference1 as u32)
        .with_bits(16, 19, at.function0.raw() as u32)
        .with_bits(19, 22, at.function1.raw() as u32)
        .with_bits(22, 24, at.operator.raw() as u32));

    let d = &m.depth_mode;
    write_bp(out, reg::PE_ZMODE, 0u32
        .with_bits(0, 1, d.enable as u32)
        .with_bits(1, 4, d.function.raw() as u32)
        .with_bits(4, 5, d.update_enable as u32));

    let bm = &m.blend_mode;
    write_bp(out, reg::PE_CMODE0, 0u32
        .with_bits(0, 1, (bm.function == BlendFunction::Blend || bm.function == BlendFunction::Subtract) as u32)
        .with_bits(1, 2, (bm.function == BlendFunction::Logic) as u32)
        .with_bits(2, 3, m.dither as u32)
        .with_bits(3, 4, 1)
        .with_bits(4, 5, 1)
        .with_bits(5, 8, bm.destination_factor.raw() as u32)
        .with_bits(8, 11, bm.source_factor.raw() as u32)
        .with_bits(11, 12, (bm.function == BlendFunction::Subtract) as u32)
        .with_bits(12, 16, bm.logical_operation.raw() as u32));

    write_bp_mask(out, 0x40);
    write_bp(out, reg::PE_CONTROL, (m.depth_test_early as u32) << 6);
}

/// Returns the mask of texture matrices loaded.
fn texcoord_generator_subpacket(out: &mut Out, m: &Material) -> u32 {
    let gens = m.enabled_texcoord_generators();
    write_xf(out, xf::NUM_TEXGENS, &[gens.len() as u32]);
    if gens.is_empty() {
        return 0;
    }

    let words: Vec<u32> = gens.iter().map(|g| {
        let (kind, row) = match g.source {
            TexCoordSource::Position => (0, 0),
            TexCoordSource::Normal => (0, 1),
            TexCoordSource::Binormal => (0, 3),
            TexCoordSource::Tangent => (0, 4),
            TexCoordSource::Color0 => (2, 2),
            TexCoordSource::Color1 => (3, 2),
            s => {
                let raw = s.raw() as u32;
                if raw <= TexCoordSource::Tex7.raw() as u32 {
                    (0, 5 + raw - TexCoordSource::Tex0.raw() as u32)
                } else {
                    // Emboss from an earlier texcoord.
                    (1, 5)
                }
            }
        };
        let projection = (g.function == TexCoordFunction::Matrix3x4) as u32;
        let input_form = (row <= 4) as u32;
        0u32.with_bits(1, 2, projection)
            .with_bits(2, 3, input_form)
            .with_bits(4, 7, kind)
            .with_bits(7, 12, row)
    }).collect();
    write_xf(out, xf::TEXGEN0, &words);

    let post: Vec<u32> = (0..gens.len()).map(|i| {
        let matrix = m.post_texcoord_generators[i].map(|p| p.matrix as u32).unwrap_or(125);
        matrix.saturating_sub(64) & 0x3F
    }).collect();
    write_xf(out, xf::POST_TEXGEN0, &post);

    let mut mask = 0u32;
    for g in gens {
        let i = match g.texture_matrix() {
            Some(i) if mask & (1 << i) == 0 => i,
            _ => continue,
        };
        mask |= 1 << i;
        let rows = m.texture_matrices[i].compose();
        let n = if g.function == TexCoordFunction::Matrix3x4 { 3 } else { 2 };
        let values: Vec<f32> = rows[..n].iter().flat_map(|r| r.iter().cloned()).collect();
        write_xf_f32(out, xf::matrix_address(g.matrix), &values);
    }
    mask
}

fn channel_control(mode: &LightingMode) -> u32 {
    let mask = mode.light_mask as u32;
    0u32.with_bits(0, 1, mode.material_source.raw() as u32)
        .with_bits(1, 2, mode.lighting_enabled as u32)
        .with_bits(2, 6, mask & 0xF)
        .with_bits(6, 7, mode.ambient_source.raw() as u32)
        .with_bits(7, 9, mode.diffuse_function.raw() as u32)
        .with_bits(9, 10, (mode.attenuation_function != AttenuationFunction::None) as u32)
        .with_bits(10, 11, (mode.attenuation_function == AttenuationFunction::Spot) as u32)
        .with_bits(11, 15, mask >> 4)
}

fn channel_color_subpacket(out: &mut Out, m: &Material) {
    let material: Vec<u32> = m.channels.iter().map(|c| rgba8(c.material_color)).collect();
    write_xf(out, xf::MATERIAL0, &material);
    let ambient: Vec<u32> = m.channels.iter().map(|c| rgba8(c.ambient_color)).collect();
    write_xf(out, xf::AMBIENT0, &ambient);
}

fn channel_lighting_subpacket(out: &mut Out, m: &Material) {
    write_xf(out, xf::NUM_COLORS, &[m.channel_count as u32]);
    let c = &m.channels;
    write_xf(out, xf::COLOR0_CONTROL, &[
        channel_control(&c[0].color_mode),
        channel_control(&c[1].color_mode),
        channel_control(&c[0].alpha_mode),
        channel_control(&c[1].alpha_mode),
    ]);
    for (i, light) in m.lights.iter().enumerate() {
        let light = match light {
            Some(l) => l,
            None => continue,
        };
        let mut words = vec![rgba8(light.color)];
        let floats = light.angle_attenuation.iter()
            .chain(&light.distance_attenuation)
            .chain(&light.position)
            .chain(&light.direction);
        words.extend(floats.map(|x| x.to_bits()));
        write_xf(out, xf::LIGHT0 + xf::LIGHT_STRIDE * i as u16 + 3, &words);
    }
}

/// Builds one material's packet. Returns the sub-packet offsets and the
/// texture matrix mask along with the bytes (not yet padded).
pub fn build_packet(m: &Material, textures: &[Texture]) -> Result<(Vec<u8>, SubpacketLocation, u32)> {
    let mut out = Out::new();
    let mut loc = SubpacketLocation::default();
    let at = |out: &Out| out.tell() as u16;

    loc.texture_offset = at(&out);
    texture_subpacket(&mut out, m, textures)?;
    loc.tev_offset = at(&out);
    tev_subpacket(&mut out, m);
    loc.pixel_offset = at(&out);
    pixel_subpacket(&mut out, m);
    loc.texcoord_generator_offset = at(&out);
    let mask = texcoord_generator_subpacket(&mut out, m);
    loc.channel_color_offset = at(&out);
    channel_color_subpacket(&mut out, m);
    loc.channel_lighting_offset = at(&out);
    channel_lighting_subpacket(&mut out, m);

    let bytes = out.into_inner();
    check!(bytes.len() <= 0xFFFF)?;
    Ok((bytes, loc, mask))
}

pub fn pack(out: &mut Out, materials: &[Material], textures: &[Texture]) -> Result<()> {
    check!(materials.len() <= 0xFFFF)?;
    let w = SectionWriter::begin(out, Header::SIZE);
    let base = w.base();

    let mut packets = Vec::with_capacity(materials.len());
    for m in materials {
        packets.push(build_packet(m, textures)?);
    }

    let packet_location_offset = w.offset(out)?;
    let locations_at = out.tell();
    out.reserve(materials.len() * PacketLocation::SIZE);

    let mut locations = Vec::with_capacity(packets.len());
    for (i, (bytes, _, _)) in packets.iter().enumerate() {
        out.align_from(base, 32, Padding::Zero);
        let start = out.tell();
        out.write_bytes(bytes);
        out.align_from(base, 32, Padding::Zero);
        let record_at = locations_at + i * PacketLocation::SIZE;
        locations.push(PacketLocation {
            offset: (start - record_at) as u32,
            size: (out.tell() - start) as u32,
        });
    }
    for (i, location) in locations.iter().enumerate() {
        out.write_at(locations_at + i * PacketLocation::SIZE, location)?;
    }

    let subpacket_location_offset = w.offset(out)?;
    for (_, loc, _) in &packets {
        loc.pack(out)?;
    }

    let matrix_index_offset = w.offset(out)?;
    for (_, _, mask) in &packets {
        out.write(&MatrixIndex { texture_matrix_mask: *mask, unknown0: 0 })?;
    }

    let unknown0_offset = w.offset(out)?;
    for m in materials {
        m.transparency_hint.pack(out)?;
    }

    out.align_from(base, 2, Padding::Ff);
    let index_offset = w.offset(out)?;
    pack_identity_array(out, materials.len())?;

    out.align_from(base, 4, Padding::Ff);
    let name_offset = w.offset(out)?;
    let names: Vec<String> = materials.iter().map(|m| m.name.clone()).collect();
    pack_names(out, &names)?;

    let section_size = w.end(out)?;
    w.write_header(out, &Header {
        tag: *b"MDL3",
        section_size,
        count: materials.len() as u16,
        packet_location_offset,
        subpacket_location_offset,
        matrix_index_offset,
        unknown0_offset,
        index_offset,
        name_offset,
    })
}

/// Reads the command lists, one per material, and the material names.
pub fn unpack(cur: Cur) -> Result<(Vec<String>, Vec<Vec<Command>>)> {
    open_section(cur, b"MDL3")?;
    let header: Header = cur.peek()?;
    let n = header.count as usize;
    let names = unpack_names(&mut (cur + header.name_offset))?;

    let mut packets = Vec::with_capacity(n);
    for i in 0..n {
        let record = cur + header.packet_location_offset + i * PacketLocation::SIZE;
        let location: PacketLocation = record.peek()?;
        let bytes = (record + location.offset).next_n_u8s(location.size as usize)?;
        let commands = parse_commands(bytes)
            .ok_or_else(|| record.error("unrecognized command in MDL3 packet"))?;
        packets.push(commands);
    }
    Ok((names, packets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::j3d::mat3::tests::sample_material;
    use crate::j3d::texture::tests::sample;
    use crate::j3d::texture::Images;
    use std::rc::Rc;

    fn textures() -> Vec<Texture> {
        let images = Rc::new(Images(vec![vec![0; 64]]));
        vec![
            sample("t0", TextureFormat::I8, None, images.clone()),
            sample("t1", TextureFormat::I8, None, images),
        ]
    }

    #[test]
    fn tev_color_high_half_written_three_times() {
        let m = Material::default();
        let (bytes, loc, _) = build_packet(&m, &[]).unwrap();
        let tev = &bytes[loc.tev_offset as usize..loc.pixel_offset as usize];
        let cmds = parse_commands(tev).unwrap();
        let reg0_high = cmds.iter()
            .filter(|c| match c {
                Command::Bp { reg: r, value } => *r == reg::TEV_REGISTERL0 + 3 && value & 1 << 23 == 0,
                _ => false,
            })
            .count();
        assert_eq!(reg0_high, 3);
    }

    #[test]
    fn texture_commands() {
        let m = sample_material("a");
        let (bytes, loc, _) = build_packet(&m, &textures()).unwrap();
        let cmds = parse_commands(&bytes[..loc.tev_offset as usize]).unwrap();
        // One texture: SETIMAGE3, SETIMAGE0, SETMODE0, SETMODE1.
        assert_eq!(cmds.len(), 4);
        assert_eq!(cmds[1], Command::Bp { reg: reg::tx_setimage0(0), value: 7 | 7 << 10 | 1 << 20 });
    }

    #[test]
    fn missing_texture_is_incompatible() {
        let m = sample_material("a");
        assert!(build_packet(&m, &[]).is_err());
    }

    #[test]
    fn section() {
        let materials = vec![sample_material("a"), Material::default()];
        let mut out = Out::new();
        pack(&mut out, &materials, &textures()).unwrap();
        let buf = out.into_inner();
        assert_eq!(buf.len() % 32, 0);
        let (names, packets) = unpack(Cur::new(&buf)).unwrap();
        assert_eq!(names, vec!["a".to_string(), String::new()]);
        assert_eq!(packets.len(), 2);
        assert!(packets.iter().all(|p| !p.is_empty()));
    }
}
