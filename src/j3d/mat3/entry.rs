//! Material entries: a material as a set of indices into the MAT3 pools.

use crate::gx::{MAX_INDIRECT_MATRICES, MAX_INDIRECT_STAGES, MAX_TEV_STAGES};
use crate::j3d::material::{IndirectMatrix, IndirectOrder, IndirectScale, TevIndirect};

record! {
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct Entry {
        unknown0: u8,
        cull_mode: Option<u8>,
        channel_count: Option<u8>,
        texcoord_generator_count: Option<u8>,
        tev_stage_count: Option<u8>,
        depth_test_early: Option<u8>,
        depth_mode: Option<u8>,
        dither: Option<u8>,
        material_colors: [Option<u16>; 2],
        /// Color 0, alpha 0, color 1, alpha 1.
        lighting_modes: [Option<u16>; 4],
        ambient_colors: [Option<u16>; 2],
        lights: [Option<u16>; 8],
        texcoord_generators: [Option<u16>; 8],
        unknown2: [Option<u16>; 8],
        texture_matrices: [Option<u16>; 10],
        unknown3: [u16; 20],
        texture_indices: [Option<u16>; 8],
        kcolors: [Option<u16>; 4],
        kcolor_selections: [u8; 16],
        kalpha_selections: [u8; 16],
        tev_orders: [Option<u16>; 16],
        /// Registers 0..2, then the previous register.
        tev_colors: [Option<u16>; 4],
        tev_combiners: [Option<u16>; 16],
        swap_modes: [Option<u16>; 16],
        swap_tables: [Option<u16>; 4],
        unknown4: [u16; 12],
        fog: Option<u16>,
        alpha_test: Option<u16>,
        blend_mode: Option<u16>,
        unknown5: Option<u16>,
    }
}

record! {
    /// Indirect texturing state. Stored per material, not pooled.
    #[derive(Clone, Debug, PartialEq)]
    pub struct IndirectEntry {
        unknown0: u8,
        indirect_stage_count: u8,
        pad(2),
        indirect_orders: [IndirectOrder; MAX_INDIRECT_STAGES],
        indirect_matrices: [IndirectMatrix; MAX_INDIRECT_MATRICES],
        indirect_scales: [IndirectScale; MAX_INDIRECT_STAGES],
        tev_indirects: [TevIndirect; MAX_TEV_STAGES],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::FixedSize;

    #[test]
    fn sizes() {
        assert_eq!(Entry::SIZE, 332);
        assert_eq!(IndirectEntry::SIZE, 312);
    }
}
