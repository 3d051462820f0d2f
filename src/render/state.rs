//! Fixed-function GPU state set for each draw from the material.

use crate::gx::*;
use crate::j3d::material::{BlendMode, DepthMode, Material};
use crate::j3d::texture::Texture;
use glium::draw_parameters::{BackfaceCullingMode, DepthTest};
use glium::uniforms::{MagnifySamplerFilter, MinifySamplerFilter, SamplerBehavior, SamplerWrapFunction};
use glium::{Blend, BlendingFunction, Depth, DrawParameters, LinearBlendingFactor};

/// Draw parameters for `material`, or `None` if it culls everything.
pub fn draw_parameters(material: &Material) -> Option<DrawParameters<'static>> {
    let backface_culling = match material.cull_mode {
        CullMode::None => BackfaceCullingMode::CullingDisabled,
        CullMode::Front => BackfaceCullingMode::CullClockwise,
        CullMode::Back => BackfaceCullingMode::CullCounterClockwise,
        CullMode::All => return None,
    };
    Some(DrawParameters {
        depth: depth(&material.depth_mode),
        blend: blend(&material.blend_mode),
        backface_culling,
        dithering: material.dither,
        .. Default::default()
    })
}

fn depth(mode: &DepthMode) -> Depth {
    if !mode.enable {
        return Depth { test: DepthTest::Overwrite, write: false, .. Default::default() };
    }
    let test = match mode.function {
        CompareFunction::Never => DepthTest::Ignore,
        CompareFunction::Less => DepthTest::IfLess,
        CompareFunction::Equal => DepthTest::IfEqual,
        CompareFunction::LessEqual => DepthTest::IfLessOrEqual,
        CompareFunction::Greater => DepthTest::IfMore,
        CompareFunction::NotEqual => DepthTest::IfNotEqual,
        CompareFunction::GreaterEqual => DepthTest::IfMoreOrEqual,
        CompareFunction::Always => DepthTest::Overwrite,
    };
    Depth { test, write: mode.update_enable, .. Default::default() }
}

fn blend(mode: &BlendMode) -> Blend {
    let function = match mode.function {
        BlendFunction::None => BlendingFunction::AlwaysReplace,
        BlendFunction::Blend => BlendingFunction::Addition {
            source: source_factor(mode.source_factor),
            destination: destination_factor(mode.destination_factor),
        },
        BlendFunction::Subtract => BlendingFunction::ReverseSubtraction {
            source: LinearBlendingFactor::One,
            destination: LinearBlendingFactor::One,
        },
        // No logic ops in glium; these are the ones blending can express.
        BlendFunction::Logic => match mode.logical_operation {
            LogicOperation::Copy => BlendingFunction::AlwaysReplace,
            LogicOperation::NoOp => BlendingFunction::Addition {
                source: LinearBlendingFactor::Zero,
                destination: LinearBlendingFactor::One,
            },
            LogicOperation::Clear => BlendingFunction::Addition {
                source: LinearBlendingFactor::Zero,
                destination: LinearBlendingFactor::Zero,
            },
            op => {
                debug!("logic op {:?} drawn as copy", op);
                BlendingFunction::AlwaysReplace
            }
        },
    };
    Blend { color: function, alpha: function, constant_value: (0.0, 0.0, 0.0, 0.0) }
}

fn source_factor(factor: BlendSourceFactor) -> LinearBlendingFactor {
    use crate::gx::BlendSourceFactor::*;
    match factor {
        Zero => LinearBlendingFactor::Zero,
        One => LinearBlendingFactor::One,
        DestinationColor => LinearBlendingFactor::DestinationColor,
        InverseDestinationColor => LinearBlendingFactor::OneMinusDestinationColor,
        SourceAlpha => LinearBlendingFactor::SourceAlpha,
        InverseSourceAlpha => LinearBlendingFactor::OneMinusSourceAlpha,
        DestinationAlpha => LinearBlendingFactor::DestinationAlpha,
        InverseDestinationAlpha => LinearBlendingFactor::OneMinusDestinationAlpha,
    }
}

fn destination_factor(factor: BlendDestinationFactor) -> LinearBlendingFactor {
    use crate::gx::BlendDestinationFactor::*;
    match factor {
        Zero => LinearBlendingFactor::Zero,
        One => LinearBlendingFactor::One,
        SourceColor => LinearBlendingFactor::SourceColor,
        InverseSourceColor => LinearBlendingFactor::OneMinusSourceColor,
        SourceAlpha => LinearBlendingFactor::SourceAlpha,
        InverseSourceAlpha => LinearBlendingFactor::OneMinusSourceAlpha,
        DestinationAlpha => LinearBlendingFactor::DestinationAlpha,
        InverseDestinationAlpha => LinearBlendingFactor::OneMinusDestinationAlpha,
    }
}

/// Sampler state for a texture. LOD clamps and bias have no glium
/// equivalent and are not applied.
pub fn sampler_behavior(texture: &Texture) -> SamplerBehavior {
    let wrap = |mode: WrapMode| match mode {
        WrapMode::Clamp => SamplerWrapFunction::Clamp,
        WrapMode::Repeat => SamplerWrapFunction::Repeat,
        WrapMode::Mirror => SamplerWrapFunction::Mirror,
    };
    let mipmapped = texture.use_mipmapping && texture.level_count() > 1;
    let minify_filter = match (texture.minification_filter, mipmapped) {
        (FilterMode::Nearest, _) => MinifySamplerFilter::Nearest,
        (FilterMode::Linear, _) => MinifySamplerFilter::Linear,
        (FilterMode::NearestMipmapNearest, true) => MinifySamplerFilter::NearestMipmapNearest,
        (FilterMode::LinearMipmapNearest, true) => MinifySamplerFilter::LinearMipmapNearest,
        (FilterMode::NearestMipmapLinear, true) => MinifySamplerFilter::NearestMipmapLinear,
        (FilterMode::LinearMipmapLinear, true) => MinifySamplerFilter::LinearMipmapLinear,
        (FilterMode::NearestMipmapNearest, false) |
        (FilterMode::NearestMipmapLinear, false) => MinifySamplerFilter::Nearest,
        (FilterMode::LinearMipmapNearest, false) |
        (FilterMode::LinearMipmapLinear, false) => MinifySamplerFilter::Linear,
    };
    let magnify_filter = match texture.magnification_filter {
        FilterMode::Nearest | FilterMode::NearestMipmapNearest | FilterMode::NearestMipmapLinear =>
            MagnifySamplerFilter::Nearest,
        _ => MagnifySamplerFilter::Linear,
    };
    let max_anisotropy = match texture.max_anisotropy {
        AnisotropyMax::One => 1,
        AnisotropyMax::Two => 2,
        AnisotropyMax::Four => 4,
    };
    SamplerBehavior {
        wrap_function: (wrap(texture.wrap_s), wrap(texture.wrap_t), SamplerWrapFunction::Repeat),
        minify_filter,
        magnify_filter,
        max_anisotropy,
        .. Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::j3d::texture::tests::sample;
    use crate::j3d::texture::Images;
    use std::rc::Rc;

    #[test]
    fn cull_all_skips_the_draw() {
        let mut m = Material::default();
        m.cull_mode = CullMode::All;
        assert!(draw_parameters(&m).is_none());
        m.cull_mode = CullMode::Back;
        let params = draw_parameters(&m).unwrap();
        assert_eq!(params.backface_culling, BackfaceCullingMode::CullCounterClockwise);
        assert!(params.dithering);
    }

    #[test]
    fn depth_modes() {
        let mut mode = DepthMode::default();
        let d = depth(&mode);
        assert_eq!(d.test, DepthTest::IfLessOrEqual);
        assert!(d.write);
        mode.enable = false;
        let d = depth(&mode);
        assert_eq!(d.test, DepthTest::Overwrite);
        assert!(!d.write);
    }

    #[test]
    fn blend_modes() {
        let mut mode = BlendMode::default();
        assert_eq!(blend(&mode).color, BlendingFunction::AlwaysReplace);
        mode.function = BlendFunction::Blend;
        mode.source_factor = BlendSourceFactor::SourceAlpha;
        mode.destination_factor = BlendDestinationFactor::InverseSourceAlpha;
        assert_eq!(blend(&mode).color, BlendingFunction::Addition {
            source: LinearBlendingFactor::SourceAlpha,
            destination: LinearBlendingFactor::OneMinusSourceAlpha,
        });
        mode.function = BlendFunction::Subtract;
        assert_eq!(blend(&mode).alpha, BlendingFunction::ReverseSubtraction {
            source: LinearBlendingFactor::One,
            destination: LinearBlendingFactor::One,
        });
    }

    #[test]
    fn samplers() {
        let images = Rc::new(Images(vec![vec![0; 64]]));
        let mut texture = sample("a", TextureFormat::I8, None, images);
        texture.wrap_s = WrapMode::Mirror;
        texture.wrap_t = WrapMode::Clamp;
        texture.use_mipmapping = false;
        texture.minification_filter = FilterMode::LinearMipmapLinear;
        texture.magnification_filter = FilterMode::Nearest;
        let s = sampler_behavior(&texture);
        assert_eq!(s.wrap_function.0, SamplerWrapFunction::Mirror);
        assert_eq!(s.wrap_function.1, SamplerWrapFunction::Clamp);
        assert_eq!(s.minify_filter, MinifySamplerFilter::Linear);
        assert_eq!(s.magnify_filter, MagnifySamplerFilter::Nearest);
    }
}
