//! Materials: the full GX pipeline state for drawing a shape.
//!
//! In MAT3 most of these records are stored in deduplicated pools and a
//! material is a set of indices into them (see `mat3::indexer`). Here
//! they are plain values owned by the material.

use crate::binary::fixed::Angle;
use crate::gx::*;
use cgmath::{Deg, Matrix4, Angle as _};

record! {
    /// Color channel control (GX_SetChanCtrl) for either the color or the
    /// alpha half of a channel.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct LightingMode {
        lighting_enabled: bool,
        material_source: ChannelSource,
        light_mask: u8,
        diffuse_function: DiffuseFunction,
        attenuation_function: AttenuationFunction,
        ambient_source: ChannelSource,
        pad(2),
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Channel {
    pub color_mode: LightingMode,
    pub alpha_mode: LightingMode,
    pub material_color: Color,
    pub ambient_color: Color,
}

impl Default for Channel {
    fn default() -> Channel {
        Channel {
            color_mode: LightingMode::default(),
            alpha_mode: LightingMode::default(),
            material_color: Color::WHITE,
            ambient_color: Color::new(0x32, 0x32, 0x32, 0x32),
        }
    }
}

record! {
    #[derive(Copy, Clone, Debug, Default, PartialEq)]
    pub struct Light {
        position: [f32; 3],
        direction: [f32; 3],
        color: Color,
        angle_attenuation: [f32; 3],
        distance_attenuation: [f32; 3],
    }
}

record! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct TexCoordGenerator {
        function: TexCoordFunction,
        source: TexCoordSource,
        /// Raw texgen matrix slot: `TEXMTX0 + 3*i`, or `IDENTITY`.
        matrix: u8,
        pad(1),
    }
}

impl Default for TexCoordGenerator {
    fn default() -> TexCoordGenerator {
        TexCoordGenerator {
            function: TexCoordFunction::Matrix2x4,
            source: TexCoordSource::Tex0,
            matrix: IDENTITY,
        }
    }
}

impl TexCoordGenerator {
    /// Index of the texture matrix this generator reads, if any.
    pub fn texture_matrix(&self) -> Option<usize> {
        texture_matrix_index(self.matrix)
    }
}

record! {
    /// Post-transform texgen settings. Only round-tripped.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct PostTexCoordGenerator {
        function: u8,
        source: u8,
        matrix: u8,
        pad(1),
    }
}

record! {
    #[derive(Copy, Clone, Debug, PartialEq)]
    pub struct TextureMatrix {
        shape: TexCoordFunction,
        /// Selects how scale/rotation/translation/projection compose.
        matrix_type: u8,
        pad(2),
        center: [f32; 3],
        scale: [f32; 2],
        rotation: Angle,
        pad(2),
        translation: [f32; 2],
        projection_matrix: [[f32; 4]; 4],
    }
}

impl Default for TextureMatrix {
    fn default() -> TextureMatrix {
        TextureMatrix {
            shape: TexCoordFunction::Matrix2x4,
            matrix_type: 0,
            center: [0.5, 0.5, 0.5],
            scale: [1.0, 1.0],
            rotation: Angle(0.0),
            translation: [0.0, 0.0],
            projection_matrix: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }
}

/// Maps a view-space normal to [0, 1] texture space, with t flipped and
/// q fixed at 1.
const ENV_MAP_PROJECTION: [[f32; 4]; 4] = [
    [0.5, 0.0, 0.0, 0.5],
    [0.0, -0.5, 0.0, 0.5],
    [0.0, 0.0, 0.0, 1.0],
    [0.0, 0.0, 0.0, 1.0],
];

impl TextureMatrix {
    /// Rows of the 3x4 matrix a texcoord generator multiplies by.
    ///
    /// Scale and rotation are about `center`, then `translation` is
    /// added. With the 0x80 bit set the Maya convention is used instead:
    /// rotation about (0.5, 0.5) and a translation that moves the image
    /// rather than the coordinates. Low bits 1, 8 and 9 then multiply by
    /// `projection_matrix`; 6 and 7 (environment maps) also go through
    /// a fixed normal-to-texture projection first.
    pub fn compose(&self) -> [[f32; 4]; 3] {
        let srt = if self.matrix_type & 0x80 != 0 {
            self.maya_srt()
        } else {
            self.basic_srt()
        };
        match self.matrix_type & 0x3F {
            1 | 8 | 9 => rows3(to_matrix(&srt) * to_matrix(&self.projection_matrix)),
            6 | 7 => rows3(
                to_matrix(&srt)
                    * to_matrix(&ENV_MAP_PROJECTION)
                    * to_matrix(&self.projection_matrix)
            ),
            _ => [srt[0], srt[1], srt[2]],
        }
    }

    fn basic_srt(&self) -> [[f32; 4]; 4] {
        let (sin, cos) = Deg(self.rotation.0).sin_cos();
        let [su, sv] = self.scale;
        let [tu, tv] = self.translation;
        let [cx, cy, _] = self.center;
        [
            [su * cos, -su * sin, 0.0, cx + tu - (su * cos * cx - su * sin * cy)],
            [sv * sin, sv * cos, 0.0, cy + tv - (sv * sin * cx + sv * cos * cy)],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ]
    }

    fn maya_srt(&self) -> [[f32; 4]; 4] {
        let (sin, cos) = Deg(self.rotation.0).sin_cos();
        let [su, sv] = self.scale;
        let [tu, tv] = self.translation;
        [
            [su * cos, su * sin, 0.0, su * (-0.5 * cos - (0.5 * sin - 0.5) - tu)],
            [-sv * sin, sv * cos, 0.0, sv * (-0.5 * cos + (0.5 * sin - 0.5) + tv) + 1.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ]
    }
}

/// Row-major rows to a cgmath (column-major) matrix.
fn to_matrix(m: &[[f32; 4]; 4]) -> Matrix4<f32> {
    Matrix4::new(
        m[0][0], m[1][0], m[2][0], m[3][0],
        m[0][1], m[1][1], m[2][1], m[3][1],
        m[0][2], m[1][2], m[2][2], m[3][2],
        m[0][3], m[1][3], m[2][3], m[3][3],
    )
}

fn rows3(m: Matrix4<f32>) -> [[f32; 4]; 3] {
    let row = |i: usize| [m.x[i], m.y[i], m.z[i], m.w[i]];
    [row(0), row(1), row(2)]
}

record! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct TevOrder {
        texcoord: Option<TexCoordId>,
        texture: Option<TexMapId>,
        color: Option<ChannelId>,
        pad(1),
    }
}

record! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct TevColorMode {
        a: TevColorInput,
        b: TevColorInput,
        c: TevColorInput,
        d: TevColorInput,
        function: TevFunction,
        bias: TevBias,
        scale: TevScale,
        clamp: bool,
        output: TevRegister,
    }
}

impl Default for TevColorMode {
    fn default() -> TevColorMode {
        TevColorMode {
            a: TevColorInput::Zero,
            b: TevColorInput::Zero,
            c: TevColorInput::Zero,
            d: TevColorInput::RasterColor,
            function: TevFunction::Add,
            bias: TevBias::Zero,
            scale: TevScale::One,
            clamp: true,
            output: TevRegister::Previous,
        }
    }
}

record! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct TevAlphaMode {
        a: TevAlphaInput,
        b: TevAlphaInput,
        c: TevAlphaInput,
        d: TevAlphaInput,
        function: TevFunction,
        bias: TevBias,
        scale: TevScale,
        clamp: bool,
        output: TevRegister,
    }
}

impl Default for TevAlphaMode {
    fn default() -> TevAlphaMode {
        TevAlphaMode {
            a: TevAlphaInput::Zero,
            b: TevAlphaInput::Zero,
            c: TevAlphaInput::Zero,
            d: TevAlphaInput::Raster,
            function: TevFunction::Add,
            bias: TevBias::Zero,
            scale: TevScale::One,
            clamp: true,
            output: TevRegister::Previous,
        }
    }
}

record! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct TevCombiner {
        unknown0: u8,
        color_mode: TevColorMode,
        alpha_mode: TevAlphaMode,
        unknown1: u8,
    }
}

record! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct SwapMode {
        color_swap_table: u8,
        texture_swap_table: u8,
        pad(2),
    }
}

record! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct SwapTable {
        r: ColorComponent,
        g: ColorComponent,
        b: ColorComponent,
        a: ColorComponent,
    }
}

impl Default for SwapTable {
    fn default() -> SwapTable {
        use crate::gx::ColorComponent::*;
        SwapTable { r: R, g: G, b: B, a: A }
    }
}

impl SwapTable {
    pub fn components(&self) -> [ColorComponent; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

record! {
    /// Per-stage indirect texturing (GX_SetTevIndirect).
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct TevIndirect {
        indirect_stage: IndTexStageId,
        format: IndTexFormat,
        bias_components: IndTexBias,
        matrix: IndTexMatrix,
        wrap_s: IndTexWrap,
        wrap_t: IndTexWrap,
        add_previous_texcoord: bool,
        use_original_lod: bool,
        bump_alpha: IndTexAlphaSelection,
        pad(3),
    }
}

/// One TEV stage, gathered from the order, combiner, swap mode, konst
/// selector and indirect tables.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TevStage {
    pub texcoord: Option<TexCoordId>,
    pub texture: Option<TexMapId>,
    pub color: Option<ChannelId>,
    pub unknown0: u8,
    pub color_mode: TevColorMode,
    pub alpha_mode: TevAlphaMode,
    pub unknown1: u8,
    pub constant_color: KColorSelection,
    pub constant_alpha: KAlphaSelection,
    pub color_swap_table: u8,
    pub texture_swap_table: u8,
    pub indirect: TevIndirect,
}

impl Default for TevStage {
    fn default() -> TevStage {
        TevStage {
            texcoord: None,
            texture: None,
            color: None,
            unknown0: 0xFF,
            color_mode: TevColorMode::default(),
            alpha_mode: TevAlphaMode::default(),
            unknown1: 0xFF,
            constant_color: KColorSelection::One,
            constant_alpha: KAlphaSelection::One,
            color_swap_table: 0,
            texture_swap_table: 0,
            indirect: TevIndirect::default(),
        }
    }
}

impl TevStage {
    pub fn order(&self) -> TevOrder {
        TevOrder { texcoord: self.texcoord, texture: self.texture, color: self.color }
    }

    pub fn combiner(&self) -> TevCombiner {
        TevCombiner {
            unknown0: self.unknown0,
            color_mode: self.color_mode,
            alpha_mode: self.alpha_mode,
            unknown1: self.unknown1,
        }
    }

    pub fn swap_mode(&self) -> SwapMode {
        SwapMode {
            color_swap_table: self.color_swap_table,
            texture_swap_table: self.texture_swap_table,
        }
    }
}

record! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct IndirectOrder {
        texcoord: u8,
        texture: u8,
        pad(2),
    }
}

record! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct IndirectScale {
        scale_s: IndTexScale,
        scale_t: IndTexScale,
        pad(2),
    }
}

/// An indirect texture lookup stage.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct IndirectStage {
    pub texcoord: u8,
    pub texture: u8,
    pub scale_s: IndTexScale,
    pub scale_t: IndTexScale,
}

record! {
    #[derive(Copy, Clone, Debug, PartialEq)]
    pub struct IndirectMatrix {
        significand_matrix: [[f32; 3]; 2],
        scale_exponent: i8,
        pad(3),
    }
}

impl Default for IndirectMatrix {
    fn default() -> IndirectMatrix {
        IndirectMatrix {
            significand_matrix: [[0.5, 0.0, 0.0], [0.0, 0.5, 0.0]],
            scale_exponent: 1,
        }
    }
}

impl IndirectMatrix {
    /// The effective 2x3 matrix, `significand * 2^scale_exponent`.
    pub fn scaled(&self) -> [[f32; 3]; 2] {
        let k = 2f32.powi(self.scale_exponent as i32);
        let m = &self.significand_matrix;
        [
            [m[0][0] * k, m[0][1] * k, m[0][2] * k],
            [m[1][0] * k, m[1][1] * k, m[1][2] * k],
        ]
    }
}

record! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct AlphaTest {
        function0: CompareFunction,
        reference0: u8,
        operator: AlphaOperator,
        function1: CompareFunction,
        reference1: u8,
        pad(3),
    }
}

impl Default for AlphaTest {
    fn default() -> AlphaTest {
        AlphaTest {
            function0: CompareFunction::Always,
            reference0: 0,
            operator: AlphaOperator::And,
            function1: CompareFunction::Always,
            reference1: 0,
        }
    }
}

record! {
    #[derive(Copy, Clone, Debug, PartialEq)]
    pub struct Fog {
        function: FogFunction,
        range_adjustment_enable: bool,
        range_adjustment_center: u16,
        z_start: f32,
        z_end: f32,
        z_near: f32,
        z_far: f32,
        color: Color,
        range_adjustment_table: [u16; 10],
    }
}

impl Default for Fog {
    fn default() -> Fog {
        Fog {
            function: FogFunction::None,
            range_adjustment_enable: false,
            range_adjustment_center: 0,
            z_start: 0.0,
            z_end: 0.0,
            z_near: 0.0,
            z_far: 0.0,
            color: Color::WHITE,
            range_adjustment_table: [0; 10],
        }
    }
}

record! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct DepthMode {
        enable: bool,
        function: CompareFunction,
        update_enable: bool,
        pad(1),
    }
}

impl Default for DepthMode {
    fn default() -> DepthMode {
        DepthMode { enable: true, function: CompareFunction::LessEqual, update_enable: true }
    }
}

record! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct BlendMode {
        function: BlendFunction,
        source_factor: BlendSourceFactor,
        destination_factor: BlendDestinationFactor,
        logical_operation: LogicOperation,
    }
}

impl Default for BlendMode {
    fn default() -> BlendMode {
        BlendMode {
            function: BlendFunction::None,
            source_factor: BlendSourceFactor::One,
            destination_factor: BlendDestinationFactor::Zero,
            logical_operation: LogicOperation::Copy,
        }
    }
}

record! {
    /// NBT scale. Only round-tripped.
    #[derive(Copy, Clone, Debug, Default, PartialEq)]
    pub struct Unknown5 {
        enable: u8,
        pad(3),
        scale: [f32; 3],
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: String,
    pub transparency_hint: u8,
    pub cull_mode: CullMode,

    pub channel_count: u8,
    pub channels: [Channel; 2],
    pub lights: [Option<Light>; MAX_LIGHTS],

    pub texcoord_generator_count: u8,
    pub texcoord_generators: [TexCoordGenerator; MAX_TEXCOORDS],
    pub post_texcoord_generators: [Option<PostTexCoordGenerator>; MAX_TEXCOORDS],
    pub texture_matrices: [TextureMatrix; MAX_TEXTURE_MATRICES],
    /// Raw entry words for post-transform matrices; kept verbatim.
    pub unknown3: [u16; 20],
    pub texture_indices: [Option<u16>; MAX_TEXTURES],

    pub tev_stage_count: u8,
    pub tev_stages: [TevStage; MAX_TEV_STAGES],
    pub tev_colors: [ColorS16; 3],
    pub tev_color_previous: ColorS16,
    pub kcolors: [Color; 4],
    pub swap_tables: [SwapTable; 4],

    pub indirect_enable: bool,
    pub indirect_stage_count: u8,
    pub indirect_stages: [IndirectStage; MAX_INDIRECT_STAGES],
    pub indirect_matrices: [IndirectMatrix; MAX_INDIRECT_MATRICES],

    pub fog: Fog,
    pub alpha_test: AlphaTest,
    pub blend_mode: BlendMode,
    pub depth_mode: DepthMode,
    pub depth_test_early: bool,
    pub dither: bool,
    /// Raw entry words after the swap tables; kept verbatim.
    pub unknown4: [u16; 12],
    pub unknown5: Option<Unknown5>,
}

impl Default for Material {
    fn default() -> Material {
        Material {
            name: String::new(),
            transparency_hint: 1,
            cull_mode: CullMode::Back,
            channel_count: 1,
            channels: [Channel::default(); 2],
            lights: [None; MAX_LIGHTS],
            texcoord_generator_count: 0,
            texcoord_generators: [TexCoordGenerator::default(); MAX_TEXCOORDS],
            post_texcoord_generators: [None; MAX_TEXCOORDS],
            texture_matrices: [TextureMatrix::default(); MAX_TEXTURE_MATRICES],
            unknown3: [0xFFFF; 20],
            texture_indices: [None; MAX_TEXTURES],
            tev_stage_count: 1,
            tev_stages: [TevStage::default(); MAX_TEV_STAGES],
            tev_colors: [ColorS16::new(0xFF, 0xFF, 0xFF, 0xFF); 3],
            tev_color_previous: ColorS16::new(0xFF, 0xFF, 0xFF, 0xFF),
            kcolors: [Color::WHITE; 4],
            swap_tables: [SwapTable::default(); 4],
            indirect_enable: false,
            indirect_stage_count: 0,
            indirect_stages: [IndirectStage::default(); MAX_INDIRECT_STAGES],
            indirect_matrices: [IndirectMatrix::default(); MAX_INDIRECT_MATRICES],
            fog: Fog::default(),
            alpha_test: AlphaTest::default(),
            blend_mode: BlendMode::default(),
            depth_mode: DepthMode::default(),
            depth_test_early: false,
            dither: true,
            unknown4: [0xFFFF; 12],
            unknown5: None,
        }
    }
}

impl Material {
    /// The enabled TEV stages.
    pub fn enabled_tev_stages(&self) -> &[TevStage] {
        &self.tev_stages[..(self.tev_stage_count as usize).min(MAX_TEV_STAGES)]
    }

    pub fn enabled_texcoord_generators(&self) -> &[TexCoordGenerator] {
        &self.texcoord_generators[..(self.texcoord_generator_count as usize).min(MAX_TEXCOORDS)]
    }

    pub fn enabled_channels(&self) -> &[Channel] {
        &self.channels[..(self.channel_count as usize).min(2)]
    }

    pub fn enabled_indirect_stages(&self) -> &[IndirectStage] {
        &self.indirect_stages[..(self.indirect_stage_count as usize).min(MAX_INDIRECT_STAGES)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::FixedSize;

    #[test]
    fn record_sizes() {
        assert_eq!(LightingMode::SIZE, 8);
        assert_eq!(Light::SIZE, 52);
        assert_eq!(TexCoordGenerator::SIZE, 4);
        assert_eq!(TextureMatrix::SIZE, 100);
        assert_eq!(TevOrder::SIZE, 4);
        assert_eq!(TevCombiner::SIZE, 20);
        assert_eq!(SwapMode::SIZE, 4);
        assert_eq!(SwapTable::SIZE, 4);
        assert_eq!(TevIndirect::SIZE, 12);
        assert_eq!(IndirectMatrix::SIZE, 28);
        assert_eq!(AlphaTest::SIZE, 8);
        assert_eq!(Fog::SIZE, 44);
        assert_eq!(DepthMode::SIZE, 4);
        assert_eq!(BlendMode::SIZE, 4);
        assert_eq!(Unknown5::SIZE, 16);
    }

    #[test]
    fn texture_matrix_compose() {
        let m = TextureMatrix::default();
        assert_eq!(m.compose(), [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
        ]);

        let m = TextureMatrix { scale: [2.0, 1.0], translation: [0.25, 0.0], ..TextureMatrix::default() };
        let rows = m.compose();
        // u' = 2(u - 0.5) + 0.5 + 0.25
        assert_eq!(rows[0], [2.0, 0.0, 0.0, -0.25]);
        assert_eq!(rows[1], [0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn texture_matrix_maya_translation() {
        let m = TextureMatrix { matrix_type: 0x80, ..TextureMatrix::default() };
        assert_eq!(m.compose(), TextureMatrix::default().compose());

        let m = TextureMatrix {
            matrix_type: 0x80,
            translation: [0.25, 0.25],
            ..TextureMatrix::default()
        };
        let rows = m.compose();
        assert_eq!(rows[0], [1.0, 0.0, 0.0, -0.25]);
        assert_eq!(rows[1], [0.0, 1.0, 0.0, 0.25]);
    }

    #[test]
    fn texture_matrix_env_map() {
        let m = TextureMatrix { matrix_type: 6, ..TextureMatrix::default() };
        assert_eq!(m.compose(), [
            [0.5, 0.0, 0.0, 0.5],
            [0.0, -0.5, 0.0, 0.5],
            [0.0, 0.0, 0.0, 1.0],
        ]);
        // Type 0 ignores the projection matrix entirely
        let mut m = TextureMatrix::default();
        m.projection_matrix[0][0] = 3.0;
        assert_eq!(m.compose()[0], [1.0, 0.0, 0.0, 0.0]);
        m.matrix_type = 1;
        assert_eq!(m.compose()[0], [3.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn indirect_matrix_scale() {
        let m = IndirectMatrix::default();
        assert_eq!(m.scaled(), [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
    }

    #[test]
    fn texcoord_generator_matrix() {
        let mut g = TexCoordGenerator::default();
        assert_eq!(g.texture_matrix(), None);
        g.matrix = TEXMTX0 + 3 * 4;
        assert_eq!(g.texture_matrix(), Some(4));
    }
}
