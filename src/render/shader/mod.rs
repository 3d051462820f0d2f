//! GLSL 330 programs emulating a material's GX pipeline.
//!
//! Everything that can change without changing the shape of the pipeline
//! (colors, texture and indirect matrices) lives in the `MaterialBlock`
//! uniform block, so editing it doesn't need a recompile. See
//! `render::uniforms` for the Rust side of the block.

mod fragment;
pub mod usage;
mod vertex;

pub use self::usage::Usage;

use crate::errors::Result;
use crate::j3d::material::Material;
use crate::j3d::shp1::ShapeTransformation;

/// Slots in the block's `color` array.
pub const MATERIAL_COLOR: usize = 0;
pub const AMBIENT_COLOR: usize = 2;
/// Registers 0..2, then the previous register.
pub const TEV_COLOR: usize = 4;
pub const KCOLOR: usize = 8;
pub const COLOR_COUNT: usize = 12;

const MATRIX_BLOCK: &str = "\
layout(std140) uniform MatrixBlock {
    mat4 projection;
    mat4 view;
};
";

const MATERIAL_BLOCK: &str = "\
layout(std140) uniform MaterialBlock {
    vec4 color[12];
    vec4 texture_matrix[30];
    vec4 indirect_matrix[6];
};
";

#[derive(Clone, Debug)]
pub struct ShaderSource {
    pub vertex: String,
    pub fragment: String,
}

/// Builds the vertex and fragment shader for drawing shapes of the given
/// transformation type with `material`.
pub fn synthesize(material: &Material, transformation: ShapeTransformation) -> Result<ShaderSource> {
    let usage = Usage::of(material);
    let vertex = vertex::generate(material, &usage, transformation)?;
    let fragment = fragment::generate(material, &usage)?;
    trace!("synthesized shaders for {:?}:\n{}\n{}", material.name, vertex, fragment);
    Ok(ShaderSource { vertex, fragment })
}

/// The varyings passed from the vertex to the fragment shader.
fn declare_varyings(s: &mut String, material: &Material, qualifier: &str) -> Result<()> {
    use std::fmt::Write;
    writeln!(s, "{} vec4 channel0;", qualifier)?;
    writeln!(s, "{} vec4 channel1;", qualifier)?;
    for i in 0..material.enabled_texcoord_generators().len() {
        writeln!(s, "{} vec3 texgen{};", qualifier, i)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gx::*;
    use crate::j3d::mat3::tests::sample_material;

    fn fragment(material: &Material) -> String {
        synthesize(material, ShapeTransformation::SingleMatrix).unwrap().fragment
    }

    #[test]
    fn alpha_test_always_passes() {
        let mut m = Material::default();
        m.alpha_test.function0 = CompareFunction::Never;
        m.alpha_test.function1 = CompareFunction::Always;
        m.alpha_test.operator = AlphaOperator::Or;
        assert!(!fragment(&m).contains("discard"));
    }

    #[test]
    fn alpha_test_never_passes() {
        let mut m = Material::default();
        m.alpha_test.function0 = CompareFunction::Never;
        m.alpha_test.function1 = CompareFunction::Always;
        m.alpha_test.operator = AlphaOperator::And;
        let source = fragment(&m);
        assert!(source.contains("    discard;\n"));
        assert!(!source.contains("if (!("));
    }

    #[test]
    fn alpha_test_compares() {
        let m = sample_material("m");
        let source = fragment(&m);
        assert!(source.contains("if (!((tevprev.a >= 0.50196")); // 0x80 / 255
        assert!(source.contains("discard;"));
    }

    #[test]
    fn samplers_only_for_used_textures() {
        let m = sample_material("m");
        let source = fragment(&m);
        // Stage 0 reads map 0; the indirect stage reads map 0 as well.
        assert!(source.contains("uniform sampler2D texture0;"));
        assert!(!source.contains("texture1;"));
    }

    #[test]
    fn early_fragment_tests() {
        let mut m = Material::default();
        assert!(!fragment(&m).contains("early_fragment_tests"));
        m.depth_test_early = true;
        assert!(fragment(&m).contains("layout(early_fragment_tests) in;"));
    }

    #[test]
    fn vertex_inputs() {
        let m = Material::default();
        let single = synthesize(&m, ShapeTransformation::SingleMatrix).unwrap().vertex;
        assert!(single.contains("uniform uint matrix_index;"));
        assert!(!single.contains("in vec3 normal;"));

        let mut m = sample_material("m");
        m.channels[0].color_mode.lighting_enabled = true;
        let multi = synthesize(&m, ShapeTransformation::MultiMatrix).unwrap().vertex;
        assert!(multi.contains("in uint matrix_index;"));
        assert!(multi.contains("in vec3 normal;"));
        assert!(multi.contains("in vec2 texcoord0;"));
        assert!(multi.contains("out vec3 texgen0;"));
    }

    #[test]
    fn stages_write_their_registers() {
        let mut m = Material::default();
        m.tev_stage_count = 2;
        m.tev_stages[0].color_mode.output = TevRegister::Register1;
        m.tev_stages[1].color_mode.function = TevFunction::CompareR8Greater;
        let source = fragment(&m);
        assert!(source.contains("tevreg1.rgb = "));
        assert!(source.contains("tevprev = wrap(tevprev);"));
        assert!(source.contains("fragment_color = tevprev;"));
    }

    #[test]
    fn bump_texgen_must_read_earlier_coords() {
        let mut m = Material::default();
        m.texcoord_generator_count = 1;
        m.texcoord_generators[0].function = TexCoordFunction::Bump0;
        m.texcoord_generators[0].source = TexCoordSource::TexCoord0;
        assert!(synthesize(&m, ShapeTransformation::SingleMatrix).is_err());
    }
}
