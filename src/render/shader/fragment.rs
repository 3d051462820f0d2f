use super::{declare_varyings, Usage, KCOLOR, MATERIAL_BLOCK, TEV_COLOR};
use crate::errors::Result;
use crate::gx::*;
use crate::j3d::material::{AlphaTest, Material, SwapTable, TevStage};
use std::fmt::Write;

/// Shared helpers. `wrap` reproduces the 8-bit overflow of the previous
/// register; the pack functions give the integer the compare modes see.
const HELPERS: &str = "
vec4 wrap(vec4 x)
{
    return fract(x * (255.0 / 256.0)) * (256.0 / 255.0);
}

float pack_gr16(vec3 x)
{
    return dot(x.rg, vec2(255.0, 65280.0));
}

float pack_bgr24(vec3 x)
{
    return dot(x.rgb, vec3(255.0, 65280.0, 16711680.0));
}
";

/// Equality in the compare modes tolerates half an 8-bit step.
const HALF_LSB: &str = "(0.5 / 255.0)";

pub fn generate(material: &Material, usage: &Usage) -> Result<String> {
    let mut s = String::with_capacity(8192);
    s.push_str("#version 330 core\n");
    if material.depth_test_early {
        s.push_str("#extension GL_ARB_shader_image_load_store : enable\n\n");
        s.push_str("layout(early_fragment_tests) in;\n");
    }
    s.push('\n');
    s.push_str(MATERIAL_BLOCK);
    s.push('\n');
    for (i, &used) in usage.textures.iter().enumerate() {
        if used {
            writeln!(s, "uniform sampler2D texture{};", i)?;
        }
    }
    s.push('\n');
    declare_varyings(&mut s, material, "in")?;
    s.push_str("\nout vec4 fragment_color;\n");
    s.push_str(HELPERS);

    s.push_str("\nvoid main()\n{\n");
    for r in 0..3 {
        writeln!(s, "    vec4 tevreg{} = color[{}];", r, TEV_COLOR + r)?;
    }
    writeln!(s, "    vec4 tevprev = color[{}];", TEV_COLOR + 3)?;
    s.push_str("    vec4 texcolor;\n");
    s.push_str("    vec4 rascolor;\n");
    s.push_str("    vec4 konst;\n");
    s.push_str("    vec2 stage_texcoord = vec2(0.0);\n");
    s.push_str("    float bump_alpha = 0.0;\n");

    let texgen_count = material.enabled_texcoord_generators().len();
    for i in 0..texgen_count {
        writeln!(s, "    vec2 uv{0} = texgen{0}.xy / texgen{0}.z;", i)?;
    }

    for (j, stage) in material.enabled_indirect_stages().iter().enumerate() {
        let coord = stage.texcoord as usize;
        let map = stage.texture as usize;
        if coord >= texgen_count {
            bail!("indirect stage {} reads texcoord {}, only {} are generated", j, coord, texgen_count);
        }
        if !usage.textures.get(map).cloned().unwrap_or(false) {
            bail!("indirect stage {} reads texture {}", j, map);
        }
        let scale = |scale: IndTexScale| (1u32 << scale.raw()) as f32;
        writeln!(s, "    vec3 indirect{} = texture(texture{}, uv{} / vec2({:?}, {:?})).bgr;",
            j, map, coord, scale(stage.scale_s), scale(stage.scale_t))?;
    }

    for (i, stage) in material.enabled_tev_stages().iter().enumerate() {
        writeln!(s, "\n    // stage {}", i)?;
        write_stage(&mut s, material, stage, texgen_count)?;
    }

    s.push_str("\n    tevprev = wrap(tevprev);\n");
    write_alpha_test(&mut s, &material.alpha_test)?;
    s.push_str("    fragment_color = tevprev;\n}\n");
    Ok(s)
}

fn write_stage(s: &mut String, material: &Material, stage: &TevStage, texgen_count: usize) -> Result<()> {
    let indirect = &stage.indirect;
    let indirect_stage = Some(indirect.indirect_stage.raw() as usize)
        .filter(|&j| j < material.enabled_indirect_stages().len());

    if let Some(j) = indirect_stage {
        match indirect.bump_alpha {
            IndTexAlphaSelection::Off => (),
            IndTexAlphaSelection::S => writeln!(s, "    bump_alpha = indirect{}.x;", j)?,
            IndTexAlphaSelection::T => writeln!(s, "    bump_alpha = indirect{}.y;", j)?,
            IndTexAlphaSelection::U => writeln!(s, "    bump_alpha = indirect{}.z;", j)?,
        }
    }

    if let Some(coord) = stage.texcoord {
        let base = if coord.index() < texgen_count {
            format!("uv{}", coord.index())
        } else {
            "vec2(0.0)".to_string()
        };
        s.push_str("    {\n");
        writeln!(s, "        vec2 coord = {};", base)?;
        if let Some(map) = stage.texture {
            writeln!(s, "        vec2 size = vec2(textureSize(texture{}, 0));", map.index())?;
            for &(wrap, st, axis) in &[(indirect.wrap_s, "s", "x"), (indirect.wrap_t, "t", "y")] {
                match wrap_period(wrap) {
                    None => (),
                    Some(0) => writeln!(s, "        coord.{} = 0.0;", st)?,
                    Some(period) => writeln!(s,
                        "        coord.{0} = mod(coord.{0} * size.{1}, {2}.0) / size.{1};",
                        st, axis, period)?,
                }
            }
            if let (Some(j), Some(k)) = (indirect_stage, indirect_matrix(indirect.matrix)) {
                write_indirect_offset(s, j, k, indirect.format, indirect.bias_components)?;
            }
        }
        if indirect.add_previous_texcoord {
            s.push_str("        coord += stage_texcoord;\n");
        }
        s.push_str("        stage_texcoord = coord;\n");
        s.push_str("    }\n");
    }

    match stage.texture {
        Some(map) => {
            let table = swap_table(material, stage.texture_swap_table)?;
            writeln!(s, "    texcolor = texture(texture{}, stage_texcoord).{};", map.index(), swizzle(table))?;
        }
        None => s.push_str("    texcolor = vec4(1.0);\n"),
    }

    let table = swap_table(material, stage.color_swap_table)?;
    writeln!(s, "    rascolor = {}.{};", raster_color(stage.color), swizzle(table))?;

    let needs_konst = {
        let m = &stage.color_mode;
        let a = &stage.alpha_mode;
        [m.a, m.b, m.c, m.d].contains(&TevColorInput::Konst) ||
            [a.a, a.b, a.c, a.d].contains(&TevAlphaInput::Konst)
    };
    if needs_konst {
        writeln!(s, "    konst = vec4({}, {});",
            konst_color(stage.constant_color), konst_alpha(stage.constant_alpha))?;
    }

    let c = &stage.color_mode;
    let a = &stage.alpha_mode;
    s.push_str("    {\n");
    writeln!(s, "        vec3 a = {};", color_input(c.a))?;
    writeln!(s, "        vec3 b = {};", color_input(c.b))?;
    writeln!(s, "        vec3 c = {};", color_input(c.c))?;
    writeln!(s, "        vec3 d = {};", color_input(c.d))?;
    writeln!(s, "        float aa = {};", alpha_input(a.a))?;
    writeln!(s, "        float ba = {};", alpha_input(a.b))?;
    writeln!(s, "        float ca = {};", alpha_input(a.c))?;
    writeln!(s, "        float da = {};", alpha_input(a.d))?;

    let color = combine(c.function, c.bias, c.scale, Part::Color);
    let alpha = combine(a.function, a.bias, a.scale, Part::Alpha);
    writeln!(s, "        vec3 color_result = {};", clamped(color, c.clamp))?;
    writeln!(s, "        float alpha_result = {};", clamped(alpha, a.clamp))?;
    writeln!(s, "        {}.rgb = color_result;", register(c.output))?;
    writeln!(s, "        {}.a = alpha_result;", register(a.output))?;
    s.push_str("    }\n");
    Ok(())
}

fn write_indirect_offset(s: &mut String, j: usize, k: usize, format: IndTexFormat, bias: IndTexBias) -> Result<()> {
    let bits = match format {
        IndTexFormat::Bits8 => 8,
        IndTexFormat::Bits5 => 5,
        IndTexFormat::Bits4 => 4,
        IndTexFormat::Bits3 => 3,
    };
    writeln!(s, "        vec3 offset = floor(indirect{} * 255.0 + 0.5);", j)?;
    if bits < 8 {
        writeln!(s, "        offset = mod(offset, {}.0);", 1 << bits)?;
    }
    if bias != IndTexBias::None {
        let amount = if bits == 8 { "-128.0" } else { "1.0" };
        let on = |bit: u8| if bias.raw() & bit != 0 { amount } else { "0.0" };
        writeln!(s, "        offset += vec3({}, {}, {});", on(1), on(2), on(4))?;
    }
    writeln!(s,
        "        coord += vec2(dot(indirect_matrix[{}].xyz, offset), dot(indirect_matrix[{}].xyz, offset)) / size;",
        2 * k, 2 * k + 1)?;
    Ok(())
}

fn write_alpha_test(s: &mut String, test: &AlphaTest) -> Result<()> {
    let t0 = alpha_term(test.function0, test.reference0);
    let t1 = alpha_term(test.function1, test.reference1);
    match alpha_combine(test.operator, t0, t1) {
        Term::Const(true) => (),
        Term::Const(false) => s.push_str("    discard;\n"),
        Term::Expr(e) => writeln!(s, "    if (!({})) discard;", e)?,
    }
    Ok(())
}

#[derive(Debug, PartialEq)]
enum Term {
    Const(bool),
    Expr(String),
}

fn alpha_term(function: CompareFunction, reference: u8) -> Term {
    let r = format!("{:.6}", reference as f32 / 255.0);
    Term::Expr(match function {
        CompareFunction::Never => return Term::Const(false),
        CompareFunction::Always => return Term::Const(true),
        CompareFunction::Less => format!("(tevprev.a < {})", r),
        CompareFunction::Equal => format!("(abs(tevprev.a - {}) < {})", r, HALF_LSB),
        CompareFunction::LessEqual => format!("(tevprev.a <= {})", r),
        CompareFunction::Greater => format!("(tevprev.a > {})", r),
        CompareFunction::NotEqual => format!("(abs(tevprev.a - {}) >= {})", r, HALF_LSB),
        CompareFunction::GreaterEqual => format!("(tevprev.a >= {})", r),
    })
}

/// Combines two alpha test terms, folding constants so a test that
/// always passes disappears and one that never passes is a bare discard.
fn alpha_combine(operator: AlphaOperator, t0: Term, t1: Term) -> Term {
    use self::Term::*;
    let not = |t: Term| match t {
        Const(x) => Const(!x),
        Expr(e) => Expr(format!("!{}", e)),
    };
    match operator {
        AlphaOperator::And => match (t0, t1) {
            (Const(false), _) | (_, Const(false)) => Const(false),
            (Const(true), t) | (t, Const(true)) => t,
            (Expr(a), Expr(b)) => Expr(format!("({} && {})", a, b)),
        },
        AlphaOperator::Or => match (t0, t1) {
            (Const(true), _) | (_, Const(true)) => Const(true),
            (Const(false), t) | (t, Const(false)) => t,
            (Expr(a), Expr(b)) => Expr(format!("({} || {})", a, b)),
        },
        AlphaOperator::Xor => match (t0, t1) {
            (Const(false), t) | (t, Const(false)) => t,
            (Const(true), t) | (t, Const(true)) => not(t),
            (Expr(a), Expr(b)) => Expr(format!("({} != {})", a, b)),
        },
        AlphaOperator::Xnor => match (t0, t1) {
            (Const(true), t) | (t, Const(true)) => t,
            (Const(false), t) | (t, Const(false)) => not(t),
            (Expr(a), Expr(b)) => Expr(format!("({} == {})", a, b)),
        },
    }
}

#[derive(Copy, Clone, PartialEq)]
enum Part {
    Color,
    Alpha,
}

fn combine(function: TevFunction, bias: TevBias, scale: TevScale, part: Part) -> String {
    let (a, b, c, d, zero) = match part {
        Part::Color => ("a", "b", "c", "d", "vec3(0.0)"),
        Part::Alpha => ("aa", "ba", "ca", "da", "0.0"),
    };
    // Packed compares look at the color inputs in both halves.
    let select = |predicate: String| format!("{} + ({} ? {} : {})", d, predicate, c, zero);
    match function {
        TevFunction::Add | TevFunction::Subtract => {
            let sign = if function == TevFunction::Add { "+" } else { "-" };
            let bias = match bias {
                TevBias::AddHalf => " + 0.5",
                TevBias::SubtractHalf => " - 0.5",
                TevBias::Zero | TevBias::Compare => "",
            };
            let value = format!("({} {} mix({}, {}, {}){})", d, sign, a, b, c, bias);
            match scale {
                TevScale::One => value,
                TevScale::Two => format!("2.0 * {}", value),
                TevScale::Four => format!("4.0 * {}", value),
                TevScale::Half => format!("0.5 * {}", value),
            }
        }
        TevFunction::CompareR8Greater => select("a.r > b.r".into()),
        TevFunction::CompareR8Equal => select(format!("abs(a.r - b.r) < {}", HALF_LSB)),
        TevFunction::CompareGR16Greater => select("pack_gr16(a) > pack_gr16(b)".into()),
        TevFunction::CompareGR16Equal => select("abs(pack_gr16(a) - pack_gr16(b)) < 0.5".into()),
        TevFunction::CompareBGR24Greater => select("pack_bgr24(a) > pack_bgr24(b)".into()),
        TevFunction::CompareBGR24Equal => select("abs(pack_bgr24(a) - pack_bgr24(b)) < 0.5".into()),
        TevFunction::CompareRGB8Greater => match part {
            Part::Color => "d + vec3(greaterThan(a, b)) * c".into(),
            Part::Alpha => select("aa > ba".into()),
        },
        TevFunction::CompareRGB8Equal => match part {
            Part::Color => format!("d + vec3(lessThan(abs(a - b), vec3{})) * c", HALF_LSB),
            Part::Alpha => select(format!("abs(aa - ba) < {}", HALF_LSB)),
        },
    }
}

fn clamped(value: String, clamp: bool) -> String {
    if clamp {
        format!("clamp({}, 0.0, 1.0)", value)
    } else {
        value
    }
}

fn register(register: TevRegister) -> &'static str {
    match register {
        TevRegister::Previous => "tevprev",
        TevRegister::Register0 => "tevreg0",
        TevRegister::Register1 => "tevreg1",
        TevRegister::Register2 => "tevreg2",
    }
}

fn color_input(input: TevColorInput) -> &'static str {
    use crate::gx::TevColorInput::*;
    match input {
        PreviousColor => "wrap(tevprev).rgb",
        PreviousAlpha => "vec3(wrap(tevprev).a)",
        Color0 => "tevreg0.rgb",
        Alpha0 => "vec3(tevreg0.a)",
        Color1 => "tevreg1.rgb",
        Alpha1 => "vec3(tevreg1.a)",
        Color2 => "tevreg2.rgb",
        Alpha2 => "vec3(tevreg2.a)",
        TextureColor => "texcolor.rgb",
        TextureAlpha => "vec3(texcolor.a)",
        RasterColor => "rascolor.rgb",
        RasterAlpha => "vec3(rascolor.a)",
        One => "vec3(1.0)",
        Half => "vec3(0.5)",
        Konst => "konst.rgb",
        Zero => "vec3(0.0)",
    }
}

fn alpha_input(input: TevAlphaInput) -> &'static str {
    use crate::gx::TevAlphaInput::*;
    match input {
        Previous => "wrap(tevprev).a",
        A0 => "tevreg0.a",
        A1 => "tevreg1.a",
        A2 => "tevreg2.a",
        Texture => "texcolor.a",
        Raster => "rascolor.a",
        Konst => "konst.a",
        Zero => "0.0",
    }
}

fn raster_color(channel: Option<ChannelId>) -> &'static str {
    use crate::gx::ChannelId::*;
    match channel {
        Some(Color0) | Some(Alpha0) | Some(Color0A0) => "channel0",
        Some(Color1) | Some(Alpha1) | Some(Color1A1) => "channel1",
        Some(AlphaBump) => "vec4(bump_alpha)",
        Some(AlphaBumpN) => "vec4(bump_alpha * (255.0 / 248.0))",
        Some(ColorZero) | None => "vec4(0.0)",
    }
}

fn component(c: u8) -> char {
    ['r', 'g', 'b', 'a'][(c & 3) as usize]
}

/// Fractions one to one eighth for raw selectors 0..7.
fn fraction(raw: u8) -> f32 {
    (8 - raw) as f32 / 8.0
}

fn konst_color(selection: KColorSelection) -> String {
    match selection.raw() {
        r @ 0x00..=0x07 => format!("vec3({:?})", fraction(r)),
        r @ 0x0C..=0x0F => format!("color[{}].rgb", KCOLOR + (r - 0x0C) as usize),
        r => format!("vec3(color[{}].{})", KCOLOR + (r & 3) as usize, component((r - 0x10) / 4)),
    }
}

fn konst_alpha(selection: KAlphaSelection) -> String {
    match selection.raw() {
        r @ 0x00..=0x07 => format!("{:?}", fraction(r)),
        r => format!("color[{}].{}", KCOLOR + (r & 3) as usize, component((r - 0x10) / 4)),
    }
}

fn swap_table(material: &Material, index: u8) -> Result<&SwapTable> {
    match material.swap_tables.get(index as usize) {
        Some(table) => Ok(table),
        None => bail!("swap table {} out of range", index),
    }
}

fn swizzle(table: &SwapTable) -> String {
    table.components().iter().map(|c| component(c.raw())).collect()
}

fn wrap_period(wrap: IndTexWrap) -> Option<u32> {
    match wrap {
        IndTexWrap::Off => None,
        IndTexWrap::Wrap256 => Some(256),
        IndTexWrap::Wrap128 => Some(128),
        IndTexWrap::Wrap64 => Some(64),
        IndTexWrap::Wrap32 => Some(32),
        IndTexWrap::Wrap16 => Some(16),
        IndTexWrap::Wrap0 => Some(0),
    }
}

/// Index of the static indirect matrix. The dynamic S and T matrices
/// depend on the texcoord derivatives and are treated as off.
fn indirect_matrix(matrix: IndTexMatrix) -> Option<usize> {
    match matrix {
        IndTexMatrix::Matrix0 => Some(0),
        IndTexMatrix::Matrix1 => Some(1),
        IndTexMatrix::Matrix2 => Some(2),
        IndTexMatrix::Off => None,
        _ => {
            debug!("dynamic indirect matrix {:?} is not emulated", matrix);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alpha_constant_folding() {
        use super::Term::*;
        let e = || Expr("x".into());
        assert_eq!(alpha_combine(AlphaOperator::And, Const(true), e()), e());
        assert_eq!(alpha_combine(AlphaOperator::Or, Const(true), e()), Const(true));
        assert_eq!(alpha_combine(AlphaOperator::Xor, Const(true), Const(true)), Const(false));
        assert_eq!(alpha_combine(AlphaOperator::Xnor, Const(true), e()), e());
        assert_eq!(alpha_combine(AlphaOperator::Xor, e(), Const(true)), Expr("!x".into()));
        assert_eq!(alpha_combine(AlphaOperator::Xnor, e(), Const(false)), Expr("!x".into()));
        assert_eq!(alpha_combine(AlphaOperator::Xnor, Const(false), Const(false)), Const(true));
        assert_eq!(
            alpha_combine(AlphaOperator::Xnor, e(), Expr("y".into())),
            Expr("(x == y)".into()),
        );
    }

    #[test]
    fn konst_selectors() {
        assert_eq!(konst_color(KColorSelection::One), "vec3(1.0)");
        assert_eq!(konst_color(KColorSelection::Eighth), "vec3(0.125)");
        assert_eq!(konst_color(KColorSelection::K2), "color[10].rgb");
        assert_eq!(konst_color(KColorSelection::K1G), "vec3(color[9].g)");
        assert_eq!(konst_alpha(KAlphaSelection::K3A), "color[11].a");
        assert_eq!(konst_alpha(KAlphaSelection::ThreeQuarters), "0.75");
    }

    #[test]
    fn combiner_expressions() {
        let add = combine(TevFunction::Add, TevBias::AddHalf, TevScale::Two, Part::Color);
        assert_eq!(add, "2.0 * (d + mix(a, b, c) + 0.5)");
        let sub = combine(TevFunction::Subtract, TevBias::Zero, TevScale::One, Part::Alpha);
        assert_eq!(sub, "(da - mix(aa, ba, ca))");
        let cmp = combine(TevFunction::CompareGR16Equal, TevBias::Zero, TevScale::One, Part::Alpha);
        assert_eq!(cmp, "da + (abs(pack_gr16(a) - pack_gr16(b)) < 0.5 ? ca : 0.0)");
    }

    #[test]
    fn swap_swizzle() {
        let table = SwapTable { r: ColorComponent::A, g: ColorComponent::A, b: ColorComponent::A, a: ColorComponent::R };
        assert_eq!(swizzle(&table), "aaar");
        assert_eq!(swizzle(&SwapTable::default()), "rgba");
    }
}
