//! GameCube graphics (GX) vocabulary: the enumerations stored in model
//! files, and the BP/XF register commands of display lists.

#[macro_use]
mod enums;
pub mod bp;
pub mod texture;

pub use self::enums::*;

record! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Color {
        r: u8,
        g: u8,
        b: u8,
        a: u8,
    }
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Color {
        Color { r, g, b, a }
    }

    pub const WHITE: Color = Color { r: 0xFF, g: 0xFF, b: 0xFF, a: 0xFF };

    pub fn to_f32(self) -> [f32; 4] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            self.a as f32 / 255.0,
        ]
    }
}

record! {
    /// TEV register colors are signed 11-bit on hardware, stored as s16.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ColorS16 {
        r: i16,
        g: i16,
        b: i16,
        a: i16,
    }
}

impl ColorS16 {
    pub fn new(r: i16, g: i16, b: i16, a: i16) -> ColorS16 {
        ColorS16 { r, g, b, a }
    }

    pub fn to_f32(self) -> [f32; 4] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            self.a as f32 / 255.0,
        ]
    }
}

/// Number of TEV stages the hardware has.
pub const MAX_TEV_STAGES: usize = 16;
pub const MAX_TEXCOORDS: usize = 8;
pub const MAX_TEXTURES: usize = 8;
pub const MAX_LIGHTS: usize = 8;
pub const MAX_TEXTURE_MATRICES: usize = 10;
pub const MAX_INDIRECT_STAGES: usize = 4;
pub const MAX_INDIRECT_MATRICES: usize = 3;

/// Raw value of the first texture-matrix slot for texcoord generators.
pub const TEXMTX0: u8 = 30;
/// Raw value for "no texture matrix".
pub const IDENTITY: u8 = 60;

/// Texture matrix slot `i` as used in a texcoord generator's matrix field.
pub fn texture_matrix_index(raw: u8) -> Option<usize> {
    if raw >= TEXMTX0 && raw < IDENTITY && (raw - TEXMTX0) % 3 == 0 {
        Some(((raw - TEXMTX0) / 3) as usize)
    } else {
        None
    }
}

#[test]
fn test_texture_matrix_index() {
    assert_eq!(texture_matrix_index(30), Some(0));
    assert_eq!(texture_matrix_index(57), Some(9));
    assert_eq!(texture_matrix_index(60), None);
    assert_eq!(texture_matrix_index(31), None);
    assert_eq!(texture_matrix_index(0), None);
}
