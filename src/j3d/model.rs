//! Whole models (`bmd3`/`bdl4`) and material archives (`bmt3`).

use super::drw1::{self, MatrixDescriptor};
use super::evp1::{self, Skinning};
use super::file::{self, FileType, Subversion};
use super::inf1::{self, NodeKind, SceneGraph};
use super::jnt1::{self, Joint};
use super::mat3;
use super::material::Material;
use super::mdl3;
use super::shp1::{self, Shape};
use super::tex1;
use super::texture::Texture;
use super::vtx1::{self, VertexArrays};
use crate::binary::Out;
use crate::errors::{incompatible, Result};

#[derive(Clone, Debug, PartialEq)]
pub struct Model {
    pub file_type: FileType,
    pub subversion: Subversion,
    pub scene_graph: SceneGraph,
    pub vertex_arrays: VertexArrays,
    pub skinning: Skinning,
    pub matrix_descriptors: Vec<MatrixDescriptor>,
    pub joints: Vec<Joint>,
    pub shapes: Vec<Shape>,
    pub materials: Vec<Material>,
    pub textures: Vec<Texture>,
}

impl Model {
    pub fn unpack(buf: &[u8]) -> Result<Model> {
        let c = file::open(buf)?;
        if !c.file_type.is_model() {
            bail!(incompatible(format!("a {:?} file is not a model", c.file_type)));
        }

        let scene_graph = inf1::unpack(c.expect(0, b"INF1")?)?;
        let vertex_arrays = vtx1::unpack(c.expect(1, b"VTX1")?)?;
        let skinning = evp1::unpack(c.expect(2, b"EVP1")?)?;
        let matrix_descriptors = drw1::unpack(c.expect(3, b"DRW1")?)?;
        let joints = jnt1::unpack(c.expect(4, b"JNT1")?)?;
        let shapes = shp1::unpack(c.expect(5, b"SHP1")?)?;
        let materials = mat3::unpack(c.expect(6, b"MAT3")?)?;
        let texture_index = if c.file_type == FileType::Bdl4 {
            // MDL3 is rebuilt from the materials on save; only check it.
            let (names, packets) = mdl3::unpack(c.expect(7, b"MDL3")?)?;
            if packets.len() != materials.len() {
                warn!("MDL3 has {} packets for {} materials", packets.len(), materials.len());
            } else if names.iter().zip(&materials).any(|(n, m)| n != &m.name) {
                warn!("MDL3 material names disagree with MAT3");
            }
            8
        } else {
            7
        };
        let textures = tex1::unpack(c.expect(texture_index, b"TEX1")?)?;

        let model = Model {
            file_type: c.file_type,
            subversion: c.subversion,
            scene_graph,
            vertex_arrays,
            skinning,
            matrix_descriptors,
            joints,
            shapes,
            materials,
            textures,
        };
        model.check_references()?;
        Ok(model)
    }

    /// Writes the model as `self.file_type`.
    pub fn pack(&self) -> Result<Vec<u8>> {
        self.pack_as(self.file_type)
    }

    /// Writes the model as the given model file type. Only `bdl4` carries
    /// the MDL3 section.
    pub fn pack_as(&self, file_type: FileType) -> Result<Vec<u8>> {
        if !file_type.is_model() {
            bail!(incompatible(format!("can't save a model as {:?}", file_type)));
        }

        let mut out = Out::new();
        file::begin(&mut out);
        inf1::pack(&mut out, &self.scene_graph, self.packet_count(), self.vertex_arrays.position_count())?;
        vtx1::pack(&mut out, &self.vertex_arrays)?;
        evp1::pack(&mut out, &self.skinning)?;
        drw1::pack(&mut out, &self.matrix_descriptors)?;
        jnt1::pack(&mut out, &self.joints)?;
        shp1::pack(&mut out, &self.shapes)?;
        mat3::pack(&mut out, &self.materials)?;
        if file_type == FileType::Bdl4 {
            mdl3::pack(&mut out, &self.materials, &self.textures)?;
        }
        tex1::pack(&mut out, &self.textures)?;
        file::finish(&mut out, file_type, self.subversion)?;
        Ok(out.into_inner())
    }

    /// Total number of batches; INF1 records it.
    pub fn packet_count(&self) -> usize {
        self.shapes.iter().map(|s| s.batches.len()).sum()
    }

    /// Checks that every index into another table is in range.
    pub fn check_references(&self) -> Result<()> {
        let mut bad = None;
        self.scene_graph.walk(|node, _| {
            let limit = match node.kind {
                NodeKind::Joint => self.joints.len(),
                NodeKind::Material => self.materials.len(),
                NodeKind::Shape => self.shapes.len(),
            };
            if node.index as usize >= limit && bad.is_none() {
                bad = Some(format!("scene graph {:?} node {} out of range ({})", node.kind, node.index, limit));
            }
        });
        if let Some(reason) = bad {
            bail!(incompatible(reason));
        }

        for d in &self.matrix_descriptors {
            let (index, limit) = match *d {
                MatrixDescriptor::Joint(i) => (i, self.joints.len()),
                MatrixDescriptor::InfluenceGroup(i) => (i, self.skinning.influence_groups.len()),
            };
            if index as usize >= limit {
                bail!(incompatible(format!("matrix descriptor {:?} out of range ({})", d, limit)));
            }
        }

        for m in &self.materials {
            for i in m.texture_indices.iter().filter_map(|&i| i) {
                if i as usize >= self.textures.len() {
                    bail!(incompatible(format!(
                        "material {:?} uses texture {} of {}", m.name, i, self.textures.len(),
                    )));
                }
            }
        }
        Ok(())
    }
}

/// A `bmt3` file: materials and the textures they use, to be swapped
/// into a model.
#[derive(Clone, Debug, PartialEq)]
pub struct MaterialArchive {
    pub subversion: Subversion,
    pub materials: Vec<Material>,
    pub textures: Vec<Texture>,
}

impl MaterialArchive {
    pub fn unpack(buf: &[u8]) -> Result<MaterialArchive> {
        let c = file::open(buf)?;
        if c.file_type != FileType::Bmt3 {
            bail!(incompatible(format!("a {:?} file is not a material archive", c.file_type)));
        }
        let materials = mat3::unpack(c.expect(0, b"MAT3")?)?;
        let textures = tex1::unpack(c.expect(1, b"TEX1")?)?;
        Ok(MaterialArchive { subversion: c.subversion, materials, textures })
    }

    pub fn pack(&self) -> Result<Vec<u8>> {
        let mut out = Out::new();
        file::begin(&mut out);
        mat3::pack(&mut out, &self.materials)?;
        tex1::pack(&mut out, &self.textures)?;
        file::finish(&mut out, FileType::Bmt3, self.subversion)?;
        Ok(out.into_inner())
    }

    /// Replaces the model's materials and textures with the archive's.
    /// The material count has to match.
    pub fn apply(&self, model: &mut Model) -> Result<()> {
        if self.materials.len() != model.materials.len() {
            bail!(incompatible(format!(
                "archive has {} materials, model has {}",
                self.materials.len(), model.materials.len(),
            )));
        }
        model.materials = self.materials.clone();
        model.textures = self.textures.clone();
        model.check_references()
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::gx::*;
    use crate::j3d::inf1::SceneNode;
    use crate::j3d::mat3::tests::sample_material;
    use crate::j3d::shp1::{AttributeDescriptor, Batch, Primitive, ShapeTransformation};
    use crate::j3d::texture::tests::sample;
    use crate::j3d::texture::Images;
    use crate::j3d::vtx1::{VertexArray, VertexFormat};
    use smallvec::smallvec;
    use std::rc::Rc;

    /// A quad on one joint, one material with two textures.
    pub fn sample_model() -> Model {
        let mut joint = SceneNode::new(NodeKind::Joint, 0);
        let mut material = SceneNode::new(NodeKind::Material, 0);
        material.children.push(SceneNode::new(NodeKind::Shape, 0));
        joint.children.push(material);

        let positions: Vec<f32> = vec![
            0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0,
            0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
        ];
        let data = positions.iter().flat_map(|x| x.to_be_bytes().to_vec()).collect();

        let images = Rc::new(Images(vec![vec![0; 64]]));
        Model {
            file_type: FileType::Bmd3,
            subversion: Subversion::Svr3,
            scene_graph: SceneGraph { unknown0: 0, roots: vec![joint] },
            vertex_arrays: VertexArrays {
                arrays: vec![VertexArray {
                    format: VertexFormat {
                        attribute: Attribute::Position,
                        component_count: 1,
                        component_type: 4,
                        scale_exponent: 0,
                    },
                    data,
                }],
            },
            skinning: Skinning::default(),
            matrix_descriptors: vec![MatrixDescriptor::Joint(0)],
            joints: vec![Joint { name: "root".into(), ..Joint::default() }],
            shapes: vec![Shape {
                transformation_type: ShapeTransformation::SingleMatrix,
                attribute_descriptors: Rc::new(vec![AttributeDescriptor {
                    attribute: Attribute::Position,
                    input_type: InputType::Index8,
                }]),
                batches: vec![Batch {
                    use_matrix_index: 0xFFFF,
                    matrix_table: vec![0],
                    primitives: vec![Primitive {
                        primitive_type: PrimitiveType::TriangleStrip,
                        vertices: vec![smallvec![0], smallvec![1], smallvec![2], smallvec![3]],
                    }],
                }],
                bounding_radius: 1.5,
                min: [0.0; 3],
                max: [1.0, 1.0, 0.0],
            }],
            materials: vec![sample_material("quad")],
            textures: vec![
                sample("a", TextureFormat::I8, None, images.clone()),
                sample("b", TextureFormat::I8, None, images),
            ],
        }
    }

    #[test]
    fn round_trip() {
        let model = sample_model();
        let buf = model.pack().unwrap();
        assert_eq!(&buf[..8], b"J3D2bmd3");
        assert_eq!(buf.len() % 32, 0);
        let read = Model::unpack(&buf).unwrap();
        assert_eq!(read, model);
        assert_eq!(read.pack().unwrap(), buf);
    }

    #[test]
    fn save_as_bdl() {
        let model = sample_model();
        let bmd = model.pack().unwrap();
        let bdl = model.pack_as(FileType::Bdl4).unwrap();
        assert_eq!(&bdl[4..8], b"bdl4");
        assert_eq!(&bdl[12..16], &9u32.to_be_bytes());
        assert!(bdl.len() > bmd.len());

        let read = Model::unpack(&bdl).unwrap();
        assert_eq!(read.file_type, FileType::Bdl4);
        assert_eq!(Model { file_type: FileType::Bmd3, ..read }, model);
    }

    #[test]
    fn bad_texture_reference() {
        let mut model = sample_model();
        model.textures.pop();
        assert!(model.check_references().is_err());
    }

    #[test]
    fn material_archive() {
        let model = sample_model();
        let archive = MaterialArchive {
            subversion: Subversion::Svr3,
            materials: model.materials.clone(),
            textures: model.textures.clone(),
        };
        let buf = archive.pack().unwrap();
        assert_eq!(&buf[..8], b"J3D2bmt3");
        let read = MaterialArchive::unpack(&buf).unwrap();
        assert_eq!(read, archive);

        let mut other = sample_model();
        other.materials[0].dither = false;
        read.apply(&mut other).unwrap();
        assert_eq!(other, model);
        assert!(Model::unpack(&buf).is_err());
    }
}
