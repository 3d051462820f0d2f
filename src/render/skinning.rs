//! The matrix table: one 3x4 matrix per matrix descriptor, computed from
//! the joint hierarchy and uploaded as a float texture the vertex shader
//! reads with `texelFetch`.

use cgmath::{Deg, Matrix4, SquareMatrix, Vector3, Zero};
use crate::errors::{format_error, Result};
use crate::j3d::drw1::MatrixDescriptor;
use crate::j3d::evp1::{Matrix3x4, Skinning};
use crate::j3d::inf1::{NodeKind, SceneGraph, SceneNode};
use crate::j3d::jnt1::Joint;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

/// Joint hierarchy; node `i` is joint `i`, edges run parent to child.
pub fn joint_hierarchy(scene_graph: &SceneGraph, joint_count: usize) -> Result<DiGraph<u16, ()>> {
    let mut graph = DiGraph::with_capacity(joint_count, joint_count);
    for i in 0..joint_count {
        graph.add_node(i as u16);
    }

    fn visit(
        node: &SceneNode,
        parent: Option<u16>,
        graph: &mut DiGraph<u16, ()>,
        joint_count: usize,
    ) -> Result<()> {
        let mut parent = parent;
        if node.kind == NodeKind::Joint {
            if node.index as usize >= joint_count {
                bail!("scene graph references joint {}, model has {}", node.index, joint_count);
            }
            if let Some(p) = parent {
                graph.update_edge(NodeIndex::new(p as usize), NodeIndex::new(node.index as usize), ());
            }
            parent = Some(node.index);
        }
        for child in &node.children {
            visit(child, parent, graph, joint_count)?;
        }
        Ok(())
    }

    for root in &scene_graph.roots {
        visit(root, None, &mut graph, joint_count)?;
    }
    Ok(graph)
}

/// Local transform of a joint: scale, then rotation X, Y, Z, then
/// translation.
pub fn local_matrix(joint: &Joint) -> Matrix4<f32> {
    let [sx, sy, sz] = joint.scale;
    let [rx, ry, rz] = joint.rotation;
    Matrix4::from_translation(Vector3::from(joint.translation))
        * Matrix4::from_angle_z(Deg(rz))
        * Matrix4::from_angle_y(Deg(ry))
        * Matrix4::from_angle_x(Deg(rx))
        * Matrix4::from_nonuniform_scale(sx, sy, sz)
}

pub fn world_matrices(hierarchy: &DiGraph<u16, ()>, joints: &[Joint]) -> Result<Vec<Matrix4<f32>>> {
    let order = toposort(hierarchy, None)
        .map_err(|cycle| format_error(0, format!("joint {} is its own ancestor", hierarchy[cycle.node_id()])))?;
    let mut world = vec![Matrix4::identity(); joints.len()];
    for node in order {
        let i = hierarchy[node] as usize;
        let local = match joints.get(i) {
            Some(joint) => local_matrix(joint),
            None => continue,
        };
        world[i] = match hierarchy.neighbors_directed(node, Direction::Incoming).next() {
            Some(parent) => world[hierarchy[parent] as usize] * local,
            None => local,
        };
    }
    Ok(world)
}

fn from_rows(m: &Matrix3x4) -> Matrix4<f32> {
    Matrix4::new(
        m[0][0], m[1][0], m[2][0], 0.0,
        m[0][1], m[1][1], m[2][1], 0.0,
        m[0][2], m[1][2], m[2][2], 0.0,
        m[0][3], m[1][3], m[2][3], 1.0,
    )
}

/// One matrix per descriptor. Joint descriptors use the joint's world
/// matrix; influence groups blend world * inverse-bind by weight.
pub fn descriptor_matrices(
    descriptors: &[MatrixDescriptor],
    skinning: &Skinning,
    world: &[Matrix4<f32>],
) -> Vec<Matrix4<f32>> {
    let joint_matrix = |j: u16| world.get(j as usize).cloned().unwrap_or_else(Matrix4::identity);
    descriptors.iter().map(|d| match *d {
        MatrixDescriptor::Joint(j) => joint_matrix(j),
        MatrixDescriptor::InfluenceGroup(g) => {
            let group = match skinning.influence_groups.get(g as usize) {
                Some(group) => group,
                None => return Matrix4::identity(),
            };
            let mut sum = Matrix4::zero();
            for influence in group {
                let inverse_bind = skinning.inverse_bind_matrices.get(influence.joint as usize)
                    .map(from_rows)
                    .unwrap_or_else(Matrix4::identity);
                sum = sum + joint_matrix(influence.joint) * inverse_bind * influence.weight;
            }
            sum
        }
    }).collect()
}

/// Texel data for the matrix table texture: three RGBA texels (the rows
/// of the 3x4 part) per matrix.
pub fn texel_rows(matrices: &[Matrix4<f32>]) -> Vec<(f32, f32, f32, f32)> {
    let mut rows = Vec::with_capacity(3 * matrices.len());
    for m in matrices {
        for r in 0..3 {
            rows.push((m.x[r], m.y[r], m.z[r], m.w[r]));
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::j3d::evp1::Influence;
    use cgmath::vec4;
    use smallvec::smallvec;

    fn chain() -> SceneGraph {
        let mut root = SceneNode::new(NodeKind::Joint, 0);
        let mut material = SceneNode::new(NodeKind::Material, 0);
        material.children.push(SceneNode::new(NodeKind::Joint, 1));
        root.children.push(material);
        SceneGraph { unknown0: 0, roots: vec![root] }
    }

    fn joint_at(t: [f32; 3]) -> Joint {
        Joint { translation: t, ..Joint::default() }
    }

    #[test]
    fn world_composes_parents() {
        let joints = vec![joint_at([1.0, 0.0, 0.0]), joint_at([0.0, 2.0, 0.0])];
        let h = joint_hierarchy(&chain(), 2).unwrap();
        assert_eq!(h.edge_count(), 1);
        let world = world_matrices(&h, &joints).unwrap();
        assert_eq!(world[1].w, vec4(1.0, 2.0, 0.0, 1.0));
    }

    #[test]
    fn bad_joint_reference() {
        assert!(joint_hierarchy(&chain(), 1).is_err());
    }

    #[test]
    fn influence_groups_blend() {
        let world = vec![
            Matrix4::from_translation(Vector3::new(2.0, 0.0, 0.0)),
            Matrix4::from_translation(Vector3::new(0.0, 4.0, 0.0)),
        ];
        let skinning = Skinning {
            influence_groups: vec![smallvec![
                Influence { joint: 0, weight: 0.5 },
                Influence { joint: 1, weight: 0.5 },
            ]],
            inverse_bind_matrices: vec![],
        };
        let descriptors = [MatrixDescriptor::Joint(1), MatrixDescriptor::InfluenceGroup(0)];
        let m = descriptor_matrices(&descriptors, &skinning, &world);
        assert_eq!(m[0], world[1]);
        assert_eq!(m[1].w, vec4(1.0, 2.0, 0.0, 1.0));
        assert_eq!(m[1].x, vec4(1.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn rows() {
        let m = Matrix4::from_translation(Vector3::new(5.0, 6.0, 7.0));
        let rows = texel_rows(&[m]);
        assert_eq!(rows, [(1.0, 0.0, 0.0, 5.0), (0.0, 1.0, 0.0, 6.0), (0.0, 0.0, 1.0, 7.0)]);
    }
}
