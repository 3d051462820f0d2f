//! Turning shapes into indexed triangle lists for the GPU.

use crate::errors::Result;
use crate::gx::{Attribute, PrimitiveType};
use crate::j3d::shp1::{Shape, ShapeTransformation, Vertex};
use crate::j3d::vtx1::VertexArrays;
use std::collections::HashMap;

/// One interleaved vertex. Attributes the shape doesn't have are left at
/// their defaults; the shader only declares the ones a material reads.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GpuVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub binormal: [f32; 3],
    pub tangent: [f32; 3],
    pub color0: [f32; 4],
    pub color1: [f32; 4],
    pub texcoord0: [f32; 2],
    pub texcoord1: [f32; 2],
    pub texcoord2: [f32; 2],
    pub texcoord3: [f32; 2],
    pub texcoord4: [f32; 2],
    pub texcoord5: [f32; 2],
    pub texcoord6: [f32; 2],
    pub texcoord7: [f32; 2],
    /// Matrix descriptor (DRW1 entry) this vertex is transformed by.
    pub matrix_index: u32,
}

implement_vertex!(GpuVertex,
    position, normal, binormal, tangent, color0, color1,
    texcoord0, texcoord1, texcoord2, texcoord3,
    texcoord4, texcoord5, texcoord6, texcoord7,
    matrix_index,
);

impl Default for GpuVertex {
    fn default() -> GpuVertex {
        GpuVertex {
            position: [0.0; 3],
            normal: [0.0, 1.0, 0.0],
            binormal: [0.0; 3],
            tangent: [0.0; 3],
            color0: [1.0; 4],
            color1: [1.0; 4],
            texcoord0: [0.0; 2],
            texcoord1: [0.0; 2],
            texcoord2: [0.0; 2],
            texcoord3: [0.0; 2],
            texcoord4: [0.0; 2],
            texcoord5: [0.0; 2],
            texcoord6: [0.0; 2],
            texcoord7: [0.0; 2],
            matrix_index: 0,
        }
    }
}

impl GpuVertex {
    fn texcoord_mut(&mut self, i: usize) -> &mut [f32; 2] {
        match i {
            0 => &mut self.texcoord0,
            1 => &mut self.texcoord1,
            2 => &mut self.texcoord2,
            3 => &mut self.texcoord3,
            4 => &mut self.texcoord4,
            5 => &mut self.texcoord5,
            6 => &mut self.texcoord6,
            _ => &mut self.texcoord7,
        }
    }
}

pub struct Mesh {
    pub vertices: Vec<GpuVertex>,
    pub indices: Vec<u32>,
    /// Matrix descriptor for single-matrix shapes.
    pub matrix_index: u32,
}

pub fn triangle_count(primitive_type: PrimitiveType, vertex_count: usize) -> usize {
    match primitive_type {
        PrimitiveType::Triangles => vertex_count / 3,
        PrimitiveType::TriangleStrip | PrimitiveType::TriangleFan => vertex_count.saturating_sub(2),
        PrimitiveType::Quads => vertex_count / 4 * 2,
        PrimitiveType::Lines | PrimitiveType::LineStrip | PrimitiveType::Points => 0,
    }
}

/// Appends the triangles of a primitive whose vertices were given ids
/// `ids`. Strips alternate winding, fans pivot on the first vertex, and
/// quads split as (0,1,2) + (1,3,2).
fn push_triangles(indices: &mut Vec<u32>, primitive_type: PrimitiveType, ids: &[u32]) {
    match primitive_type {
        PrimitiveType::Triangles => {
            for t in ids.chunks_exact(3) {
                indices.extend_from_slice(t);
            }
        }
        PrimitiveType::TriangleStrip => {
            for i in 0..ids.len().saturating_sub(2) {
                if i % 2 == 0 {
                    indices.extend_from_slice(&[ids[i], ids[i + 1], ids[i + 2]]);
                } else {
                    indices.extend_from_slice(&[ids[i + 1], ids[i], ids[i + 2]]);
                }
            }
        }
        PrimitiveType::TriangleFan => {
            for i in 0..ids.len().saturating_sub(2) {
                indices.extend_from_slice(&[ids[0], ids[i + 1], ids[i + 2]]);
            }
        }
        PrimitiveType::Quads => {
            for q in ids.chunks_exact(4) {
                indices.extend_from_slice(&[q[0], q[1], q[2], q[1], q[3], q[2]]);
            }
        }
        PrimitiveType::Lines | PrimitiveType::LineStrip | PrimitiveType::Points => (),
    }
}

fn element(arrays: &VertexArrays, attribute: Attribute, index: u16) -> Result<smallvec::SmallVec<[f32; 9]>> {
    let array = arrays.get(attribute)
        .ok_or_else(|| format!("shape uses {:?}, but there is no such vertex array", attribute))?;
    array.element(index as usize)
        .ok_or_else(|| format!("{:?} index {} out of range ({})", attribute, index, array.len()).into())
}

fn decode_vertex(
    shape: &Shape,
    arrays: &VertexArrays,
    vertex: &Vertex,
    matrix_table: &[u16; 10],
) -> Result<GpuVertex> {
    let mut v = GpuVertex::default();
    v.matrix_index = matrix_table[0] as u32;
    for (d, &value) in shape.attribute_descriptors.iter().zip(vertex.iter()) {
        let a = d.attribute;
        match a {
            Attribute::PositionMatrixIndex => {
                let slot = (value / 3) as usize;
                let descriptor = *matrix_table.get(slot)
                    .ok_or_else(|| format!("matrix slot {} out of range", slot))?;
                if descriptor == 0xFFFF {
                    bail!("vertex uses unset matrix slot {}", slot);
                }
                v.matrix_index = descriptor as u32;
            }
            Attribute::Position => {
                let e = element(arrays, a, value)?;
                v.position = [e[0], e[1], e.get(2).cloned().unwrap_or(0.0)];
            }
            Attribute::Normal => {
                let e = element(arrays, a, value)?;
                v.normal = [e[0], e[1], e[2]];
            }
            Attribute::NormalBinormalTangent => {
                let e = element(arrays, a, value)?;
                v.normal = [e[0], e[1], e[2]];
                v.binormal = [e[3], e[4], e[5]];
                v.tangent = [e[6], e[7], e[8]];
            }
            Attribute::Color0 | Attribute::Color1 => {
                let e = element(arrays, a, value)?;
                let c = [e[0], e[1], e[2], e.get(3).cloned().unwrap_or(1.0)];
                if a == Attribute::Color0 { v.color0 = c } else { v.color1 = c }
            }
            _ if a.raw() >= Attribute::TexCoord0.raw() && a.raw() <= Attribute::TexCoord7.raw() => {
                let e = element(arrays, a, value)?;
                let i = (a.raw() - Attribute::TexCoord0.raw()) as usize;
                *v.texcoord_mut(i) = [e[0], e.get(1).cloned().unwrap_or(0.0)];
            }
            // Texture matrix indices and padding attributes.
            _ => (),
        }
    }
    Ok(v)
}

/// Builds the vertex and index buffers for one shape. Identical vertices
/// (same attribute indices under the same matrix) are stored once.
pub fn build_mesh(shape: &Shape, arrays: &VertexArrays) -> Result<Mesh> {
    let mut vertices = vec![];
    let mut indices = vec![];
    let mut ids: HashMap<(u32, &Vertex), u32> = HashMap::new();
    let mut matrix_table = [0xFFFFu16; 10];
    let mut first_matrix = None;

    let triangles: usize = shape.batches.iter()
        .flat_map(|b| &b.primitives)
        .map(|p| triangle_count(p.primitive_type, p.vertices.len()))
        .sum();
    indices.reserve(3 * triangles);

    for batch in &shape.batches {
        for (slot, &entry) in batch.matrix_table.iter().enumerate().take(10) {
            if entry != 0xFFFF {
                matrix_table[slot] = entry;
            }
        }
        if first_matrix.is_none() {
            first_matrix = Some(matrix_table[0]);
        }

        for primitive in &batch.primitives {
            let mut primitive_ids = Vec::with_capacity(primitive.vertices.len());
            for vertex in &primitive.vertices {
                let v = decode_vertex(shape, arrays, vertex, &matrix_table)?;
                let next_id = vertices.len() as u32;
                let id = *ids.entry((v.matrix_index, vertex)).or_insert(next_id);
                if id == next_id {
                    vertices.push(v);
                }
                primitive_ids.push(id);
            }
            push_triangles(&mut indices, primitive.primitive_type, &primitive_ids);
        }
    }

    let matrix_index = match (shape.transformation_type, first_matrix) {
        (ShapeTransformation::MultiMatrix, _) | (_, None) => 0,
        (_, Some(m)) => if m == 0xFFFF { 0 } else { m as u32 },
    };
    trace!("mesh: {} vertices, {} triangles", vertices.len(), indices.len() / 3);
    Ok(Mesh { vertices, indices, matrix_index })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gx::InputType;
    use crate::j3d::model::tests::sample_model;
    use crate::j3d::shp1::{AttributeDescriptor, Batch, Primitive};
    use smallvec::smallvec;
    use std::rc::Rc;

    fn ids(n: u32) -> Vec<u32> {
        (0..n).collect()
    }

    #[test]
    fn counts() {
        assert_eq!(triangle_count(PrimitiveType::Triangles, 9), 3);
        assert_eq!(triangle_count(PrimitiveType::TriangleStrip, 5), 3);
        assert_eq!(triangle_count(PrimitiveType::TriangleFan, 2), 0);
        assert_eq!(triangle_count(PrimitiveType::Quads, 8), 4);
        assert_eq!(triangle_count(PrimitiveType::Lines, 8), 0);
    }

    #[test]
    fn winding() {
        let mut out = vec![];
        push_triangles(&mut out, PrimitiveType::Quads, &ids(4));
        assert_eq!(out, [0, 1, 2, 1, 3, 2]);

        out.clear();
        push_triangles(&mut out, PrimitiveType::TriangleStrip, &ids(5));
        assert_eq!(out, [0, 1, 2, 2, 1, 3, 2, 3, 4]);

        out.clear();
        push_triangles(&mut out, PrimitiveType::TriangleFan, &ids(5));
        assert_eq!(out, [0, 1, 2, 0, 2, 3, 0, 3, 4]);
    }

    #[test]
    fn dedup_and_positions() {
        let mut model = sample_model();
        // Same strip again as a triangle list reusing the same vertices.
        model.shapes[0].batches[0].primitives.push(Primitive {
            primitive_type: PrimitiveType::Triangles,
            vertices: vec![smallvec![0], smallvec![1], smallvec![2]],
        });
        let mesh = build_mesh(&model.shapes[0], &model.vertex_arrays).unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices.len(), 3 * 3);
        assert_eq!(mesh.vertices[3].position, [1.0, 1.0, 0.0]);
        assert_eq!(mesh.matrix_index, 0);
    }

    #[test]
    fn matrix_slots_carry_over() {
        let mut model = sample_model();
        let shape = &mut model.shapes[0];
        shape.transformation_type = ShapeTransformation::MultiMatrix;
        shape.attribute_descriptors = Rc::new(vec![
            AttributeDescriptor { attribute: Attribute::PositionMatrixIndex, input_type: InputType::Direct },
            AttributeDescriptor { attribute: Attribute::Position, input_type: InputType::Index8 },
        ]);
        let tri = |m: u16| Primitive {
            primitive_type: PrimitiveType::Triangles,
            vertices: vec![smallvec![m, 0], smallvec![m, 1], smallvec![m, 2]],
        };
        shape.batches = vec![
            Batch { use_matrix_index: 0xFFFF, matrix_table: vec![4, 7], primitives: vec![tri(3)] },
            Batch { use_matrix_index: 0xFFFF, matrix_table: vec![0xFFFF, 9], primitives: vec![tri(0), tri(3)] },
        ];
        let mesh = build_mesh(shape, &model.vertex_arrays).unwrap();
        let matrices: Vec<u32> = mesh.indices.iter().map(|&i| mesh.vertices[i as usize].matrix_index).collect();
        assert_eq!(matrices, [7, 7, 7, 4, 4, 4, 9, 9, 9]);
        // The first and last triangles differ only in matrix.
        assert_eq!(mesh.vertices.len(), 9);
    }

    #[test]
    fn bad_index() {
        let mut model = sample_model();
        model.shapes[0].batches[0].primitives[0].vertices[0] = smallvec![200];
        assert!(build_mesh(&model.shapes[0], &model.vertex_arrays).is_err());
    }
}
