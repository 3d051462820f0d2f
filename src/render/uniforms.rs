//! The uniform blocks, and which material edits touch which part of them.

use super::shader::{AMBIENT_COLOR, COLOR_COUNT, KCOLOR, MATERIAL_COLOR, TEV_COLOR};
use crate::gx::{MAX_INDIRECT_MATRICES, MAX_TEXTURE_MATRICES};
use crate::j3d::material::Material;
use crate::scene::path::{Fragment, Path};

#[derive(Copy, Clone, Debug)]
pub struct MatrixBlock {
    pub projection: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
}

implement_uniform_block!(MatrixBlock, projection, view);

/// Rust side of `MaterialBlock`. Matrices are stored as rows: three per
/// texture matrix, two per indirect matrix.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MaterialBlock {
    pub color: [[f32; 4]; COLOR_COUNT],
    pub texture_matrix: [[f32; 4]; 3 * MAX_TEXTURE_MATRICES],
    pub indirect_matrix: [[f32; 4]; 2 * MAX_INDIRECT_MATRICES],
}

implement_uniform_block!(MaterialBlock, color, texture_matrix, indirect_matrix);

/// A part of the material block that is updated as a unit.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    MaterialColor(usize),
    AmbientColor(usize),
    /// Registers 0..2; 3 is the previous register.
    TevColor(usize),
    KColor(usize),
    TextureMatrix(usize),
    IndirectMatrix(usize),
}

impl Field {
    pub fn all() -> Vec<Field> {
        let mut fields = vec![];
        for i in 0..2 {
            fields.push(Field::MaterialColor(i));
            fields.push(Field::AmbientColor(i));
        }
        for i in 0..4 {
            fields.push(Field::TevColor(i));
            fields.push(Field::KColor(i));
        }
        fields.extend((0..MAX_TEXTURE_MATRICES).map(Field::TextureMatrix));
        fields.extend((0..MAX_INDIRECT_MATRICES).map(Field::IndirectMatrix));
        fields
    }
}

/// What a change at some path below a material invalidates.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Trigger {
    /// Nothing cached; the value is read at draw time (or never).
    None,
    Field(Field),
    /// The compiled programs.
    Program,
    /// Everything.
    All,
}

/// Classifies a change at `path`, relative to the material.
pub fn trigger(path: &Path) -> Trigger {
    use self::Fragment::{Attr, Key};
    use self::Trigger::*;

    match path.fragments() {
        [] => All,

        [Attr("channels"), Key(i), Attr("material_color"), ..] if *i < 2 =>
            Field(self::Field::MaterialColor(*i)),
        [Attr("channels"), Key(i), Attr("ambient_color"), ..] if *i < 2 =>
            Field(self::Field::AmbientColor(*i)),
        [Attr("channels"), Key(_), Attr("color_mode"), ..] |
        [Attr("channels"), Key(_), Attr("alpha_mode"), ..] => Program,
        [Attr("channels"), ..] => All,

        [Attr("tev_colors"), Key(i), ..] if *i < 3 => Field(self::Field::TevColor(*i)),
        [Attr("tev_color_previous"), ..] => Field(self::Field::TevColor(3)),
        [Attr("kcolors"), Key(i), ..] if *i < 4 => Field(self::Field::KColor(*i)),
        [Attr("texture_matrices"), Key(i), ..] if *i < MAX_TEXTURE_MATRICES =>
            Field(self::Field::TextureMatrix(*i)),
        [Attr("indirect_matrices"), Key(i), ..] if *i < MAX_INDIRECT_MATRICES =>
            Field(self::Field::IndirectMatrix(*i)),
        [Attr("tev_colors")] | [Attr("kcolors")] |
        [Attr("texture_matrices")] | [Attr("indirect_matrices")] => All,

        [Attr(name), ..] => match *name {
            "channel_count" |
            "texcoord_generator_count" | "texcoord_generators" |
            "tev_stage_count" | "tev_stages" | "swap_tables" |
            "indirect_enable" | "indirect_stage_count" | "indirect_stages" |
            "alpha_test" | "depth_test_early" => Program,
            _ => None,
        },

        _ => None,
    }
}

impl MaterialBlock {
    pub fn new(material: &Material) -> MaterialBlock {
        let mut block = MaterialBlock {
            color: [[0.0; 4]; COLOR_COUNT],
            texture_matrix: [[0.0; 4]; 3 * MAX_TEXTURE_MATRICES],
            indirect_matrix: [[0.0; 4]; 2 * MAX_INDIRECT_MATRICES],
        };
        for field in Field::all() {
            block.update(field, material);
        }
        block
    }

    /// Recomputes `field` from `material`.
    pub fn update(&mut self, field: Field, material: &Material) {
        match field {
            Field::MaterialColor(i) =>
                self.color[MATERIAL_COLOR + i] = material.channels[i].material_color.to_f32(),
            Field::AmbientColor(i) =>
                self.color[AMBIENT_COLOR + i] = material.channels[i].ambient_color.to_f32(),
            Field::TevColor(3) =>
                self.color[TEV_COLOR + 3] = material.tev_color_previous.to_f32(),
            Field::TevColor(i) =>
                self.color[TEV_COLOR + i] = material.tev_colors[i].to_f32(),
            Field::KColor(i) =>
                self.color[KCOLOR + i] = material.kcolors[i].to_f32(),
            Field::TextureMatrix(i) => {
                let rows = material.texture_matrices[i].compose();
                self.texture_matrix[3 * i..3 * i + 3].copy_from_slice(&rows);
            }
            Field::IndirectMatrix(i) => {
                let m = material.indirect_matrices[i].scaled();
                self.indirect_matrix[2 * i] = [m[0][0], m[0][1], m[0][2], 0.0];
                self.indirect_matrix[2 * i + 1] = [m[1][0], m[1][1], m[1][2], 0.0];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gx::{Color, ColorS16};

    fn p() -> Path {
        Path::root()
    }

    #[test]
    fn triggers() {
        assert_eq!(trigger(&p()), Trigger::All);
        assert_eq!(trigger(&p().child("channels").index(1).child("material_color").child("g")),
            Trigger::Field(Field::MaterialColor(1)));
        assert_eq!(trigger(&p().child("channels").index(0).child("color_mode").child("lighting_enabled")),
            Trigger::Program);
        assert_eq!(trigger(&p().child("tev_color_previous")), Trigger::Field(Field::TevColor(3)));
        assert_eq!(trigger(&p().child("texture_matrices").index(4).child("scale").index(0)),
            Trigger::Field(Field::TextureMatrix(4)));
        assert_eq!(trigger(&p().child("tev_stages").index(2).child("color_mode").child("a")),
            Trigger::Program);
        assert_eq!(trigger(&p().child("alpha_test").child("reference0")), Trigger::Program);
        assert_eq!(trigger(&p().child("name")), Trigger::None);
        assert_eq!(trigger(&p().child("blend_mode").child("function")), Trigger::None);
        assert_eq!(trigger(&p().child("texture_indices").index(0)), Trigger::None);
    }

    #[test]
    fn block_contents() {
        let mut m = Material::default();
        m.channels[1].material_color = Color::new(255, 0, 0, 255);
        m.tev_colors[1] = ColorS16::new(-255, 510, 0, 255);
        m.kcolors[3] = Color::new(0, 0, 51, 0);
        let block = MaterialBlock::new(&m);
        assert_eq!(block.color[MATERIAL_COLOR + 1], [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(block.color[TEV_COLOR + 1], [-1.0, 2.0, 0.0, 1.0]);
        assert_eq!(block.color[KCOLOR + 3], [0.0, 0.0, 0.2, 0.0]);
        assert_eq!(block.texture_matrix[3], [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(block.indirect_matrix[1], [0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn update_one_field() {
        let mut m = Material::default();
        let mut block = MaterialBlock::new(&m);
        m.kcolors[0] = Color::new(0, 0, 0, 0);
        m.tev_colors[0] = ColorS16::new(0, 0, 0, 0);
        block.update(Field::KColor(0), &m);
        assert_eq!(block.color[KCOLOR], [0.0; 4]);
        // Not updated yet.
        assert_eq!(block.color[TEV_COLOR], [1.0; 4]);
    }
}
