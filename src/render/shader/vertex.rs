use super::{declare_varyings, Usage, AMBIENT_COLOR, MATERIAL_BLOCK, MATERIAL_COLOR, MATRIX_BLOCK};
use crate::errors::Result;
use crate::gx::{ChannelSource, DiffuseFunction, TexCoordFunction, TexCoordSource};
use crate::j3d::material::{LightingMode, Material, TexCoordGenerator};
use crate::j3d::shp1::ShapeTransformation;
use std::fmt::Write;

/// Direction the light comes from, in view space. Model files carry no
/// lights, so lit channels get a fixed headlight.
const LIGHT_DIRECTION: &str = "vec3(0.0, 0.0, 1.0)";

pub fn generate(material: &Material, usage: &Usage, transformation: ShapeTransformation) -> Result<String> {
    let mut s = String::with_capacity(4096);
    s.push_str("#version 330 core\n\n");
    s.push_str(MATRIX_BLOCK);
    s.push('\n');
    s.push_str(MATERIAL_BLOCK);
    s.push('\n');
    s.push_str("uniform sampler2D matrix_table;\n");
    match transformation {
        ShapeTransformation::MultiMatrix => s.push_str("in uint matrix_index;\n"),
        // Billboards are drawn like single matrix shapes.
        _ => s.push_str("uniform uint matrix_index;\n"),
    }
    s.push('\n');

    s.push_str("in vec3 position;\n");
    if usage.normal {
        s.push_str("in vec3 normal;\n");
    }
    if usage.binormal {
        s.push_str("in vec3 binormal;\n");
    }
    if usage.tangent {
        s.push_str("in vec3 tangent;\n");
    }
    for (i, &used) in usage.colors.iter().enumerate() {
        if used {
            writeln!(s, "in vec4 color{};", i)?;
        }
    }
    for (i, &used) in usage.texcoords.iter().enumerate() {
        if used {
            writeln!(s, "in vec2 texcoord{};", i)?;
        }
    }
    s.push('\n');
    declare_varyings(&mut s, material, "out")?;

    s.push_str("
vec3 transform(mat3x4 m, vec4 v)
{
    return v * m;
}

void main()
{
    mat3x4 model_matrix = mat3x4(
        texelFetch(matrix_table, ivec2(0, int(matrix_index)), 0),
        texelFetch(matrix_table, ivec2(1, int(matrix_index)), 0),
        texelFetch(matrix_table, ivec2(2, int(matrix_index)), 0));
    vec3 world_position = transform(model_matrix, vec4(position, 1.0));
    gl_Position = projection * view * vec4(world_position, 1.0);
");

    if usage.normal {
        s.push_str("    vec3 view_normal = normalize(mat3(view) * transform(model_matrix, vec4(normal, 0.0)));\n");
    }

    for i in 0..2 {
        match material.enabled_channels().get(i) {
            Some(channel) => {
                writeln!(s, "    channel{}.rgb = {}.rgb;", i, channel_color(i, &channel.color_mode, usage))?;
                writeln!(s, "    channel{}.a = {}.a;", i, channel_color(i, &channel.alpha_mode, usage))?;
            }
            None => writeln!(s, "    channel{} = vec4(0.0);", i)?,
        }
    }

    for (i, generator) in material.enabled_texcoord_generators().iter().enumerate() {
        writeln!(s, "    texgen{} = {};", i, texcoord(i, generator)?)?;
    }

    s.push_str("}\n");
    Ok(s)
}

/// Material color, optionally lit: a blend from the ambient color towards
/// the material color by the diffuse term.
fn channel_color(i: usize, mode: &LightingMode, usage: &Usage) -> String {
    let source = |source: ChannelSource, register: usize| match source {
        ChannelSource::Vertex if usage.colors[i] => format!("color{}", i),
        _ => format!("color[{}]", register + i),
    };
    let material = source(mode.material_source, MATERIAL_COLOR);
    if !mode.lighting_enabled {
        return material;
    }
    let ambient = source(mode.ambient_source, AMBIENT_COLOR);
    let diffuse = match mode.diffuse_function {
        DiffuseFunction::None => "1.0".to_string(),
        DiffuseFunction::Signed =>
            format!("dot(view_normal, {})", LIGHT_DIRECTION),
        DiffuseFunction::Clamp =>
            format!("max(dot(view_normal, {}), 0.0)", LIGHT_DIRECTION),
    };
    format!("({} * clamp(mix({}, vec4(1.0), {}), 0.0, 1.0))", material, ambient, diffuse)
}

fn texcoord(i: usize, generator: &TexCoordGenerator) -> Result<String> {
    use crate::gx::TexCoordSource::*;

    let source = match generator.source {
        Position => "vec4(position, 1.0)".to_string(),
        Normal => "vec4(normal, 1.0)".to_string(),
        Binormal => "vec4(binormal, 1.0)".to_string(),
        Tangent => "vec4(tangent, 1.0)".to_string(),
        Tex0 | Tex1 | Tex2 | Tex3 | Tex4 | Tex5 | Tex6 | Tex7 => {
            let k = (generator.source.raw() - TexCoordSource::Tex0.raw()) as usize;
            format!("vec4(texcoord{}, 1.0, 1.0)", k)
        }
        TexCoord0 | TexCoord1 | TexCoord2 | TexCoord3 | TexCoord4 | TexCoord5 | TexCoord6 => {
            let k = (generator.source.raw() - TexCoordSource::TexCoord0.raw()) as usize;
            if k >= i {
                bail!("texcoord generator {} reads texcoord {} before it is generated", i, k);
            }
            format!("vec4(texgen{}.xy, 1.0, 1.0)", k)
        }
        Color0 => "vec4(channel0.rg, 1.0, 1.0)".to_string(),
        Color1 => "vec4(channel1.rg, 1.0, 1.0)".to_string(),
    };

    let row = |r: usize, m: usize| format!("dot(texture_matrix[{}], {})", 3 * m + r, source);
    Ok(match (generator.function, generator.texture_matrix()) {
        (TexCoordFunction::Matrix2x4, Some(m)) =>
            format!("vec3({}, {}, 1.0)", row(0, m), row(1, m)),
        (TexCoordFunction::Matrix2x4, None) =>
            format!("vec3({}.xy, 1.0)", source),
        (TexCoordFunction::Matrix3x4, Some(m)) =>
            format!("vec3({}, {}, {})", row(0, m), row(1, m), row(2, m)),
        (TexCoordFunction::Matrix3x4, None) =>
            format!("{}.xyz", source),
        // Bump offsets depend on lights; use the source coords.
        _ =>
            format!("vec3({}.xy, 1.0)", source),
    })
}
