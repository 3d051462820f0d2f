//! Which vertex attributes and textures a material reads.

use crate::gx::{ChannelSource, TexCoordSource, MAX_TEXCOORDS, MAX_TEXTURES};
use crate::j3d::material::{LightingMode, Material};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Usage {
    pub normal: bool,
    pub binormal: bool,
    pub tangent: bool,
    pub colors: [bool; 2],
    pub texcoords: [bool; MAX_TEXCOORDS],
    pub textures: [bool; MAX_TEXTURES],
}

impl Usage {
    pub fn of(material: &Material) -> Usage {
        let mut usage = Usage::default();

        for (i, channel) in material.enabled_channels().iter().enumerate() {
            usage.lighting_mode(i, &channel.color_mode);
            usage.lighting_mode(i, &channel.alpha_mode);
        }

        for generator in material.enabled_texcoord_generators() {
            use crate::gx::TexCoordSource::*;
            match generator.source {
                Normal => usage.normal = true,
                Binormal => usage.binormal = true,
                Tangent => usage.tangent = true,
                Tex0 | Tex1 | Tex2 | Tex3 | Tex4 | Tex5 | Tex6 | Tex7 => {
                    let k = (generator.source.raw() - TexCoordSource::Tex0.raw()) as usize;
                    usage.texcoords[k] = true;
                }
                Position | TexCoord0 | TexCoord1 | TexCoord2 | TexCoord3 |
                TexCoord4 | TexCoord5 | TexCoord6 | Color0 | Color1 => (),
            }
        }

        for stage in material.enabled_tev_stages() {
            if let Some(map) = stage.texture {
                usage.textures[map.index()] = true;
            }
        }
        for stage in material.enabled_indirect_stages() {
            if let Some(used) = usage.textures.get_mut(stage.texture as usize) {
                *used = true;
            }
        }

        usage
    }

    fn lighting_mode(&mut self, channel: usize, mode: &LightingMode) {
        if mode.material_source == ChannelSource::Vertex {
            self.colors[channel] = true;
        }
        if mode.lighting_enabled {
            self.normal = true;
            if mode.ambient_source == ChannelSource::Vertex {
                self.colors[channel] = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gx::{TexMapId, TexCoordFunction};
    use crate::j3d::material::TexCoordGenerator;
    use crate::j3d::mat3::tests::sample_material;

    #[test]
    fn default_material() {
        let usage = Usage::of(&Material::default());
        assert_eq!(usage, Usage::default());
    }

    #[test]
    fn reads() {
        let mut m = sample_material("m");
        m.channel_count = 1;
        m.channels[0].color_mode.lighting_enabled = true;
        m.channels[0].alpha_mode.material_source = ChannelSource::Vertex;
        m.texcoord_generator_count = 2;
        m.texcoord_generators[0] = TexCoordGenerator {
            function: TexCoordFunction::Matrix2x4,
            source: TexCoordSource::Tex3,
            ..TexCoordGenerator::default()
        };
        m.texcoord_generators[1].source = TexCoordSource::Tangent;
        m.tev_stage_count = 1;
        m.tev_stages[0].texture = Some(TexMapId::TexMap5);
        // Disabled stages don't count.
        m.tev_stages[1].texture = Some(TexMapId::TexMap6);

        let usage = Usage::of(&m);
        assert!(usage.normal);
        assert!(usage.tangent);
        assert!(!usage.binormal);
        assert_eq!(usage.colors, [true, false]);
        assert!(usage.texcoords[3]);
        assert!(!usage.texcoords[0]);
        assert!(usage.textures[5]);
        assert!(!usage.textures[6]);
    }
}
