//! Runtime access to model fields by name, so paths can read and write
//! them.

use super::path::Fragment;
use crate::binary::fixed::Angle;
use crate::errors::Result;
use crate::gx::*;
use crate::j3d::jnt1::Joint;
use crate::j3d::material::*;
use crate::j3d::model::Model;
use crate::j3d::texture::Texture;

/// A leaf value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f32),
    Str(String),
    /// An enumeration, by variant name.
    Enum(&'static str),
}

impl Value {
    fn as_int(&self) -> Result<i64> {
        match *self {
            Value::Int(x) => Ok(x),
            Value::Bool(b) => Ok(b as i64),
            _ => bail!("expected an integer, got {:?}", self),
        }
    }
}

pub trait Reflect {
    fn field(&self, _fragment: &Fragment) -> Option<&dyn Reflect> {
        None
    }

    fn field_mut(&mut self, _fragment: &Fragment) -> Option<&mut dyn Reflect> {
        None
    }

    /// The value, for leaves.
    fn value(&self) -> Option<Value> {
        None
    }

    fn set_value(&mut self, _value: &Value) -> Result<()> {
        bail!("not assignable")
    }
}

impl Reflect for bool {
    fn value(&self) -> Option<Value> {
        Some(Value::Bool(*self))
    }
    fn set_value(&mut self, value: &Value) -> Result<()> {
        match *value {
            Value::Bool(b) => *self = b,
            Value::Int(x) => *self = x != 0,
            _ => bail!("expected a bool, got {:?}", value),
        }
        Ok(())
    }
}

macro_rules! reflect_int {
    ($($t:ty)*) => {$(
        impl Reflect for $t {
            fn value(&self) -> Option<Value> {
                Some(Value::Int(*self as i64))
            }
            fn set_value(&mut self, value: &Value) -> Result<()> {
                let x = value.as_int()?;
                if x < <$t>::MIN as i64 || x > <$t>::MAX as i64 {
                    bail!("{} out of range for {}", x, stringify!($t));
                }
                *self = x as $t;
                Ok(())
            }
        }
    )*};
}

reflect_int!(u8 u16 u32 i8 i16);

impl Reflect for f32 {
    fn value(&self) -> Option<Value> {
        Some(Value::Float(*self))
    }
    fn set_value(&mut self, value: &Value) -> Result<()> {
        match *value {
            Value::Float(x) => *self = x,
            Value::Int(x) => *self = x as f32,
            _ => bail!("expected a number, got {:?}", value),
        }
        Ok(())
    }
}

impl Reflect for Angle {
    fn value(&self) -> Option<Value> {
        self.0.value()
    }
    fn set_value(&mut self, value: &Value) -> Result<()> {
        self.0.set_value(value)
    }
}

impl Reflect for String {
    fn value(&self) -> Option<Value> {
        Some(Value::Str(self.clone()))
    }
    fn set_value(&mut self, value: &Value) -> Result<()> {
        match *value {
            Value::Str(ref s) => *self = s.clone(),
            _ => bail!("expected a string, got {:?}", value),
        }
        Ok(())
    }
}

impl<T: Reflect, const N: usize> Reflect for [T; N] {
    fn field(&self, fragment: &Fragment) -> Option<&dyn Reflect> {
        match *fragment {
            Fragment::Key(k) => self.get(k).map(|x| x as &dyn Reflect),
            _ => None,
        }
    }
    fn field_mut(&mut self, fragment: &Fragment) -> Option<&mut dyn Reflect> {
        match *fragment {
            Fragment::Key(k) => self.get_mut(k).map(|x| x as &mut dyn Reflect),
            _ => None,
        }
    }
}

impl<T: Reflect> Reflect for Vec<T> {
    fn field(&self, fragment: &Fragment) -> Option<&dyn Reflect> {
        match *fragment {
            Fragment::Key(k) => self.get(k).map(|x| x as &dyn Reflect),
            _ => None,
        }
    }
    fn field_mut(&mut self, fragment: &Fragment) -> Option<&mut dyn Reflect> {
        match *fragment {
            Fragment::Key(k) => self.get_mut(k).map(|x| x as &mut dyn Reflect),
            _ => None,
        }
    }
}

/// `None` reads as `Value::None`; fields of a present value are reached
/// through the option transparently.
impl<T: Reflect + Default> Reflect for Option<T> {
    fn field(&self, fragment: &Fragment) -> Option<&dyn Reflect> {
        self.as_ref().and_then(|x| x.field(fragment))
    }
    fn field_mut(&mut self, fragment: &Fragment) -> Option<&mut dyn Reflect> {
        self.as_mut().and_then(|x| x.field_mut(fragment))
    }
    fn value(&self) -> Option<Value> {
        match *self {
            None => Some(Value::None),
            Some(ref x) => x.value(),
        }
    }
    fn set_value(&mut self, value: &Value) -> Result<()> {
        if *value == Value::None {
            *self = None;
            return Ok(());
        }
        let mut x = T::default();
        x.set_value(value)?;
        *self = Some(x);
        Ok(())
    }
}

macro_rules! reflect_enum {
    ($($name:ident)*) => {$(
        impl Reflect for $name {
            fn value(&self) -> Option<Value> {
                Some(Value::Enum(self.name()))
            }
            fn set_value(&mut self, value: &Value) -> Result<()> {
                let found = match *value {
                    Value::Enum(name) => $name::ALL.iter().find(|x| x.name() == name),
                    _ => None,
                };
                match found {
                    Some(&x) => *self = x,
                    None => bail!("{:?} is not a {}", value, stringify!($name)),
                }
                Ok(())
            }
        }
    )*};
}

reflect_enum! {
    CullMode ChannelSource DiffuseFunction AttenuationFunction TexCoordFunction
    TexCoordSource TexCoordId TexMapId ChannelId TevColorInput TevAlphaInput
    TevFunction TevBias TevScale TevRegister KColorSelection KAlphaSelection
    ColorComponent IndTexFormat IndTexBias IndTexMatrix IndTexWrap
    IndTexAlphaSelection IndTexStageId IndTexScale CompareFunction AlphaOperator
    BlendFunction BlendSourceFactor BlendDestinationFactor LogicOperation
    FogFunction TextureFormat PaletteFormat WrapMode FilterMode AnisotropyMax
}

macro_rules! reflect_struct {
    ($($name:ty { $($field:ident),* $(,)* })*) => {$(
        impl Reflect for $name {
            fn field(&self, fragment: &Fragment) -> Option<&dyn Reflect> {
                match *fragment {
                    $(Fragment::Attr(stringify!($field)) => Some(&self.$field),)*
                    _ => None,
                }
            }
            fn field_mut(&mut self, fragment: &Fragment) -> Option<&mut dyn Reflect> {
                match *fragment {
                    $(Fragment::Attr(stringify!($field)) => Some(&mut self.$field),)*
                    _ => None,
                }
            }
        }
    )*};
}

reflect_struct! {
    Model { joints, materials, textures }
    Joint { name, matrix_type, ignore_parent_scale, scale, rotation, translation }
    Texture {
        name, image_format, width, height, wrap_s, wrap_t, palette_format,
        use_mipmapping, edge_lod, bias_clamp, max_anisotropy,
        minification_filter, magnification_filter, minimum_lod, maximum_lod,
        lod_bias,
    }
    Material {
        name, transparency_hint, cull_mode, channel_count, channels, lights,
        texcoord_generator_count, texcoord_generators, texture_matrices,
        texture_indices, tev_stage_count, tev_stages, tev_colors,
        tev_color_previous, kcolors, swap_tables, indirect_enable,
        indirect_stage_count, indirect_stages, indirect_matrices, fog,
        alpha_test, blend_mode, depth_mode, depth_test_early, dither,
    }
    Color { r, g, b, a }
    ColorS16 { r, g, b, a }
    Channel { color_mode, alpha_mode, material_color, ambient_color }
    LightingMode {
        lighting_enabled, material_source, light_mask, diffuse_function,
        attenuation_function, ambient_source,
    }
    Light { position, direction, color, angle_attenuation, distance_attenuation }
    TexCoordGenerator { function, source, matrix }
    TextureMatrix {
        shape, matrix_type, center, scale, rotation, translation,
        projection_matrix,
    }
    TevStage {
        texcoord, texture, color, color_mode, alpha_mode, constant_color,
        constant_alpha, color_swap_table, texture_swap_table, indirect,
    }
    TevColorMode { a, b, c, d, function, bias, scale, clamp, output }
    TevAlphaMode { a, b, c, d, function, bias, scale, clamp, output }
    TevIndirect {
        indirect_stage, format, bias_components, matrix, wrap_s, wrap_t,
        add_previous_texcoord, use_original_lod, bump_alpha,
    }
    SwapTable { r, g, b, a }
    IndirectStage { texcoord, texture, scale_s, scale_t }
    IndirectMatrix { significand_matrix, scale_exponent }
    AlphaTest { function0, reference0, operator, function1, reference1 }
    Fog {
        function, range_adjustment_enable, range_adjustment_center, z_start,
        z_end, z_near, z_far, color, range_adjustment_table,
    }
    DepthMode { enable, function, update_enable }
    BlendMode { function, source_factor, destination_factor, logical_operation }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::path::Path;

    #[test]
    fn enum_by_name() {
        let mut m = Material::default();
        let p = Path::root().child("cull_mode");
        assert_eq!(p.get_value(&m).unwrap(), Value::Enum("Back"));
        p.set_value(&mut m, &Value::Enum("Front")).unwrap();
        assert_eq!(m.cull_mode, CullMode::Front);
        assert!(p.set_value(&mut m, &Value::Enum("Sideways")).is_err());
        assert!(p.set_value(&mut m, &Value::Int(1)).is_err());
    }

    #[test]
    fn integer_range() {
        let mut m = Material::default();
        let p = Path::root().child("kcolors").index(0).child("r");
        p.set_value(&mut m, &Value::Int(12)).unwrap();
        assert_eq!(m.kcolors[0].r, 12);
        assert!(p.set_value(&mut m, &Value::Int(256)).is_err());
        assert_eq!(m.kcolors[0].r, 12);
    }

    #[test]
    fn optional_fields() {
        let mut m = Material::default();
        let p = Path::root().child("texture_indices").index(1);
        assert_eq!(p.get_value(&m).unwrap(), Value::None);
        p.set_value(&mut m, &Value::Int(4)).unwrap();
        assert_eq!(m.texture_indices[1], Some(4));
        p.set_value(&mut m, &Value::None).unwrap();
        assert_eq!(m.texture_indices[1], None);

        // Absent lights have no fields.
        assert!(Path::root().child("lights").index(0).child("color").resolve(&m).is_err());
    }

    #[test]
    fn structs_are_not_values() {
        let m = Material::default();
        assert!(Path::root().child("alpha_test").get_value(&m).is_err());
        assert!(Path::root().child("no_such_field").resolve(&m).is_err());
    }
}
