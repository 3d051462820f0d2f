//! INF1: the scene graph.
//!
//! Stored as a pre-order token stream. A node token is followed by
//! `BEGIN_CHILDREN ... END_CHILDREN` when it has children, and the whole
//! stream ends with `END_GRAPH`.

use super::{open_section, SectionWriter};
use crate::binary::{Cur, FixedSize, Out, Pack};
use crate::errors::Result;

const END_GRAPH: u16 = 0x00;
const BEGIN_CHILDREN: u16 = 0x01;
const END_CHILDREN: u16 = 0x02;
const JOINT: u16 = 0x10;
const MATERIAL: u16 = 0x11;
const SHAPE: u16 = 0x12;

record! {
    pub struct Header {
        tag: [u8; 4],
        section_size: u32,
        unknown0: u16,
        pad(2),
        packet_count: u32,
        vertex_position_count: u32,
        scene_graph_offset: u32,
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Joint,
    Material,
    Shape,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SceneNode {
    pub kind: NodeKind,
    pub index: u16,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn new(kind: NodeKind, index: u16) -> SceneNode {
        SceneNode { kind, index, children: vec![] }
    }

    /// Pre-order walk. The callback gets each node and its depth.
    pub fn walk<F: FnMut(&SceneNode, usize)>(&self, f: &mut F) {
        fn go<F: FnMut(&SceneNode, usize)>(node: &SceneNode, depth: usize, f: &mut F) {
            f(node, depth);
            for child in &node.children {
                go(child, depth + 1, f);
            }
        }
        go(self, 0, f)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SceneGraph {
    /// Scaling rule flags.
    pub unknown0: u16,
    pub roots: Vec<SceneNode>,
}

impl SceneGraph {
    pub fn walk<F: FnMut(&SceneNode, usize)>(&self, mut f: F) {
        for root in &self.roots {
            root.walk(&mut f);
        }
    }
}

/// Reads nodes until `END_CHILDREN` or `END_GRAPH`, returning which one
/// ended the list.
fn unpack_children(cur: &mut Cur, end: usize) -> Result<(Vec<SceneNode>, u16)> {
    let mut nodes: Vec<SceneNode> = vec![];
    loop {
        if cur.pos() >= end {
            return Err(cur.error("scene graph is missing END_GRAPH"));
        }
        let pos = cur.pos();
        let kind = cur.next::<u16>()?;
        let index = cur.next::<u16>()?;
        let kind = match kind {
            END_GRAPH | END_CHILDREN => return Ok((nodes, kind)),
            BEGIN_CHILDREN => {
                let (children, terminator) = unpack_children(cur, end)?;
                if terminator != END_CHILDREN {
                    return Err(cur.error_at(pos, "unbalanced BEGIN_CHILDREN"));
                }
                match nodes.last_mut() {
                    Some(parent) => parent.children.extend(children),
                    None => return Err(cur.error_at(pos, "BEGIN_CHILDREN without a parent")),
                }
                continue;
            }
            JOINT => NodeKind::Joint,
            MATERIAL => NodeKind::Material,
            SHAPE => NodeKind::Shape,
            x => return Err(cur.error_at(pos, format!("invalid scene graph node {:#x}", x))),
        };
        nodes.push(SceneNode::new(kind, index));
    }
}

pub fn pack_children(out: &mut Out, nodes: &[SceneNode]) -> Result<()> {
    for node in nodes {
        let kind = match node.kind {
            NodeKind::Joint => JOINT,
            NodeKind::Material => MATERIAL,
            NodeKind::Shape => SHAPE,
        };
        kind.pack(out)?;
        node.index.pack(out)?;
        if !node.children.is_empty() {
            BEGIN_CHILDREN.pack(out)?;
            0u16.pack(out)?;
            pack_children(out, &node.children)?;
            END_CHILDREN.pack(out)?;
            0u16.pack(out)?;
        }
    }
    Ok(())
}

pub fn unpack(cur: Cur) -> Result<SceneGraph> {
    let size = open_section(cur, b"INF1")?;
    let header: Header = cur.peek()?;

    let mut c = cur + header.scene_graph_offset;
    let (roots, terminator) = unpack_children(&mut c, cur.pos() + size)?;
    if terminator != END_GRAPH {
        return Err(c.error("unbalanced END_CHILDREN"));
    }

    Ok(SceneGraph { unknown0: header.unknown0, roots })
}

/// `packet_count` and `vertex_position_count` are summary counts taken
/// from the shapes and vertex arrays.
pub fn pack(
    out: &mut Out,
    graph: &SceneGraph,
    packet_count: usize,
    vertex_position_count: usize,
) -> Result<()> {
    let w = SectionWriter::begin(out, Header::SIZE);
    let scene_graph_offset = w.offset(out)?;
    pack_children(out, &graph.roots)?;
    END_GRAPH.pack(out)?;
    0u16.pack(out)?;
    let section_size = w.end(out)?;

    w.write_header(out, &Header {
        tag: *b"INF1",
        section_size,
        unknown0: graph.unknown0,
        packet_count: packet_count as u32,
        vertex_position_count: vertex_position_count as u32,
        scene_graph_offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SceneGraph {
        let mut joint = SceneNode::new(NodeKind::Joint, 0);
        let mut mat = SceneNode::new(NodeKind::Material, 0);
        mat.children.push(SceneNode::new(NodeKind::Shape, 0));
        mat.children.push(SceneNode::new(NodeKind::Shape, 1));
        joint.children.push(mat);
        let mut child_joint = SceneNode::new(NodeKind::Joint, 1);
        let mut mat1 = SceneNode::new(NodeKind::Material, 1);
        mat1.children.push(SceneNode::new(NodeKind::Shape, 2));
        child_joint.children.push(mat1);
        joint.children.push(child_joint);
        SceneGraph { unknown0: 1, roots: vec![joint] }
    }

    #[test]
    fn children_round_trip() {
        let graph = sample();
        let mut out = Out::new();
        pack_children(&mut out, &graph.roots).unwrap();
        END_GRAPH.pack(&mut out).unwrap();
        0u16.pack(&mut out).unwrap();
        let buf = out.into_inner();
        // joint, begin, material, begin, shape, shape, end, joint, ...
        assert_eq!(&buf[..8], &[0, 0x10, 0, 0, 0, 1, 0, 0]);
        let (roots, terminator) = unpack_children(&mut Cur::new(&buf), buf.len()).unwrap();
        assert_eq!(terminator, END_GRAPH);
        assert_eq!(roots, graph.roots);
    }

    #[test]
    fn section_round_trip() {
        let graph = sample();
        let mut out = Out::new();
        pack(&mut out, &graph, 3, 100).unwrap();
        let buf = out.into_inner();
        assert_eq!(buf.len() % 32, 0);
        assert_eq!(&buf[4..8], &(buf.len() as u32).to_be_bytes());
        assert_eq!(unpack(Cur::new(&buf)).unwrap(), graph);
    }

    #[test]
    fn walk_is_preorder() {
        let mut seen = vec![];
        sample().walk(|node, depth| seen.push((node.kind, node.index, depth)));
        assert_eq!(seen[0], (NodeKind::Joint, 0, 0));
        assert_eq!(seen[2], (NodeKind::Shape, 0, 2));
        assert_eq!(seen[4], (NodeKind::Joint, 1, 1));
    }

    #[test]
    fn missing_end_is_an_error() {
        let buf = [0, 0x10, 0, 0];
        assert!(unpack_children(&mut Cur::new(&buf), buf.len()).is_err());
    }
}
