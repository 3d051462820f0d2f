//! Drawing a model with programs synthesized from its materials.
//!
//! The `Renderer` owns every GPU resource for one document. It listens to
//! the document for edits and brings its caches up to date at the start
//! of each draw.

pub mod cache;
pub mod mesh;
pub mod shader;
pub mod skinning;
pub mod state;
pub mod uniforms;

use self::cache::{MaterialCache, MaterialWatcher, ModelWatcher, TextureCache, TextureWatcher};
use self::mesh::{build_mesh, GpuVertex};
use self::uniforms::{MatrixBlock, MaterialBlock};
use crate::errors::{gl_error, Result};
use crate::j3d::animation::bind::AnimatedState;
use crate::j3d::inf1::{NodeKind, SceneGraph};
use crate::j3d::jnt1::Joint;
use crate::j3d::model::Model;
use crate::j3d::shp1::ShapeTransformation;
use crate::scene::{Document, Path};
use cgmath::Matrix4;
use glium::index::PrimitiveType;
use glium::texture::{ClientFormat, MipmapsOption, RawImage2d, Texture2d, UncompressedFloatFormat};
use glium::uniforms::{MagnifySamplerFilter, MinifySamplerFilter, Sampler, UniformBuffer};
use glium::{Frame, IndexBuffer, Surface, VertexBuffer};
use petgraph::graph::DiGraph;
use std::borrow::Cow;
use std::rc::Rc;

pub type Display = glium::Display<glium::glutin::surface::WindowSurface>;

/// A shape and the material it's drawn with.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DrawItem {
    pub material: usize,
    pub shape: usize,
}

/// Walks the scene graph in order. A shape is drawn with the material
/// of its nearest material ancestor; shapes with none aren't drawn.
pub fn draw_list(scene_graph: &SceneGraph) -> Vec<DrawItem> {
    let mut items = vec![];
    // Material set at each depth along the current branch.
    let mut stack: Vec<Option<usize>> = vec![];
    scene_graph.walk(|node, depth| {
        stack.truncate(depth);
        let current = stack.iter().rev().find_map(|m| *m);
        match node.kind {
            NodeKind::Material => {
                stack.push(Some(node.index as usize));
                return;
            }
            NodeKind::Shape => match current {
                Some(material) => items.push(DrawItem { material, shape: node.index as usize }),
                None => warn!("shape {} has no material", node.index),
            },
            NodeKind::Joint => (),
        }
        stack.push(None);
    });
    items
}

struct ShapeBuffers {
    vertices: VertexBuffer<GpuVertex>,
    indices: IndexBuffer<u32>,
    matrix_index: u32,
    transformation: ShapeTransformation,
}

pub struct Renderer {
    material_watcher: Rc<MaterialWatcher>,
    texture_watcher: Rc<TextureWatcher>,
    model_watcher: Rc<ModelWatcher>,

    /// `None` for materials whose uniform buffer couldn't be made.
    materials: Vec<Option<MaterialCache>>,
    textures: Vec<TextureCache>,
    shapes: Vec<Option<ShapeBuffers>>,
    draw_list: Vec<DrawItem>,
    hierarchy: DiGraph<u16, ()>,

    matrix_block: UniformBuffer<MatrixBlock>,
    /// Three RGBA32F texels per matrix descriptor.
    matrix_table: Texture2d,
    /// Bound to texture slots with no texture.
    white_texture: Texture2d,
    /// Whether the material blocks currently hold animated values.
    animated: bool,
}

fn identity() -> [[f32; 4]; 4] {
    [[1.0, 0.0, 0.0, 0.0], [0.0, 1.0, 0.0, 0.0], [0.0, 0.0, 1.0, 0.0], [0.0, 0.0, 0.0, 1.0]]
}

impl Renderer {
    pub fn new(display: &Display, document: &Document) -> Result<Renderer> {
        let material_watcher = Rc::new(MaterialWatcher::default());
        let texture_watcher = Rc::new(TextureWatcher::default());
        let model_watcher = Rc::new(ModelWatcher::default());
        let listeners = document.listeners();
        listeners.register(&material_watcher, Path::root().child("materials").any());
        listeners.register(&texture_watcher, Path::root().child("textures").any());
        listeners.register(&model_watcher, Path::root());

        let white_image = RawImage2d::from_raw_rgba(vec![255, 255, 255, 255u8], (1, 1));
        let white_texture = Texture2d::new(display, white_image).map_err(gl_error)?;
        let matrix_block = UniformBuffer::new(display, MatrixBlock {
            projection: identity(),
            view: identity(),
        }).map_err(gl_error)?;
        let matrix_table = matrix_texture(display, &[Matrix4::from_scale(1.0)])?;

        let mut renderer = Renderer {
            material_watcher,
            texture_watcher,
            model_watcher,
            materials: vec![],
            textures: vec![],
            shapes: vec![],
            draw_list: vec![],
            hierarchy: DiGraph::new(),
            matrix_block,
            matrix_table,
            white_texture,
            animated: false,
        };
        renderer.load(display, document.model())?;
        Ok(renderer)
    }

    /// Rebuilds everything for `model`.
    fn load(&mut self, display: &Display, model: &Model) -> Result<()> {
        // Anything queued refers to the old model.
        self.material_watcher.take();
        self.texture_watcher.take();
        self.model_watcher.take();

        self.hierarchy = skinning::joint_hierarchy(&model.scene_graph, model.joints.len())?;
        self.draw_list = draw_list(&model.scene_graph);

        self.materials = model.materials.iter()
            .map(|material| match MaterialCache::new(display, material) {
                Ok(cache) => Some(cache),
                Err(e) => {
                    error!("material {:?}: {}", material.name, e);
                    None
                }
            })
            .collect();
        self.textures = model.textures.iter().map(|_| TextureCache::new()).collect();

        self.shapes = model.shapes.iter().enumerate()
            .map(|(i, shape)| match shape_buffers(display, model, i) {
                Ok(buffers) => Some(buffers),
                Err(e) => {
                    error!("shape {}: {}", i, e);
                    None
                }
            })
            .collect();
        self.animated = false;

        info!("renderer: {} materials, {} textures, {} shapes, {} draws",
            self.materials.len(), self.textures.len(), self.shapes.len(), self.draw_list.len());
        Ok(())
    }

    /// Applies the edits the watchers collected since the last draw.
    fn sync(&mut self, display: &Display, model: &Model) -> Result<()> {
        if self.model_watcher.take() {
            debug!("renderer: reloading model");
            return self.load(display, model);
        }
        for (m, dirty) in self.material_watcher.take() {
            if let (Some(Some(cache)), Some(material)) = (self.materials.get_mut(m), model.materials.get(m)) {
                cache.invalidate(&dirty, material);
            }
        }
        for (t, dirty) in self.texture_watcher.take() {
            if let Some(cache) = self.textures.get_mut(t) {
                cache.invalidate(dirty);
            }
        }
        Ok(())
    }

    fn update_matrix_table(&mut self, display: &Display, model: &Model, joints: &[Joint]) -> Result<()> {
        let world = skinning::world_matrices(&self.hierarchy, joints)?;
        let mut matrices = skinning::descriptor_matrices(&model.matrix_descriptors, &model.skinning, &world);
        if matrices.is_empty() {
            matrices.push(Matrix4::from_scale(1.0));
        }
        if self.matrix_table.height() as usize == matrices.len() {
            let rect = glium::Rect { left: 0, bottom: 0, width: 3, height: matrices.len() as u32 };
            self.matrix_table.write(rect, matrix_image(&matrices));
        } else {
            self.matrix_table = matrix_texture(display, &matrices)?;
        }
        Ok(())
    }

    /// Draws `model`, posed by `state` if an animation is playing.
    pub fn draw(
        &mut self,
        display: &Display,
        target: &mut Frame,
        model: &Model,
        state: Option<&AnimatedState>,
        projection: Matrix4<f32>,
        view: Matrix4<f32>,
    ) -> Result<()> {
        self.sync(display, model)?;

        let (joints, materials) = match state {
            Some(state) => (&state.joints[..], &state.materials[..]),
            None => (&model.joints[..], &model.materials[..]),
        };
        self.update_matrix_table(display, model, joints)?;
        self.matrix_block.write(&MatrixBlock { projection: projection.into(), view: view.into() });

        if state.is_some() || self.animated {
            for (cache, material) in self.materials.iter_mut().zip(materials) {
                if let Some(cache) = cache {
                    cache.set_block(MaterialBlock::new(material));
                }
            }
            self.animated = state.is_some();
        }

        let visible = |shape: usize| state.map_or(true, |s| s.shape_visibility.get(shape).cloned().unwrap_or(true));

        // Build whatever the draws below need first, so the draw loop
        // only borrows the caches immutably.
        for item in &self.draw_list {
            if !visible(item.shape) {
                continue;
            }
            let (material, buffers) = match (materials.get(item.material), self.shapes.get(item.shape)) {
                (Some(material), Some(Some(buffers))) => (material, buffers),
                _ => continue,
            };
            if let Some(Some(cache)) = self.materials.get_mut(item.material) {
                cache.prepare(display, material, buffers.transformation);
            }
            for t in material.texture_indices.iter().flatten() {
                if let (Some(cache), Some(texture)) = (self.textures.get_mut(*t as usize), model.textures.get(*t as usize)) {
                    cache.prepare(display, texture);
                }
            }
        }

        for item in &self.draw_list {
            if !visible(item.shape) {
                continue;
            }
            let (material, buffers, cache) = match (
                materials.get(item.material),
                self.shapes.get(item.shape),
                self.materials.get(item.material),
            ) {
                (Some(material), Some(Some(buffers)), Some(Some(cache))) => (material, buffers, cache),
                _ => continue,
            };
            let program = match cache.program(buffers.transformation) {
                Some(program) => program,
                None => continue,
            };
            let params = match state::draw_parameters(material) {
                Some(params) => params,
                None => continue,
            };

            let white = &self.white_texture;
            let textures = &self.textures;
            let sampler = |slot: usize| {
                let bound = material.texture_indices[slot]
                    .and_then(|t| textures.get(t as usize))
                    .and_then(|cache| cache.get());
                match bound {
                    Some((texture, behavior)) => Sampler(texture, behavior),
                    None => Sampler::new(white),
                }
            };
            let matrix_table = Sampler::new(&self.matrix_table)
                .minify_filter(MinifySamplerFilter::Nearest)
                .magnify_filter(MagnifySamplerFilter::Nearest);

            let uniforms = uniform! {
                MatrixBlock: &self.matrix_block,
                MaterialBlock: cache.buffer(),
                matrix_table: matrix_table,
                matrix_index: buffers.matrix_index,
                texture0: sampler(0),
                texture1: sampler(1),
                texture2: sampler(2),
                texture3: sampler(3),
                texture4: sampler(4),
                texture5: sampler(5),
                texture6: sampler(6),
                texture7: sampler(7),
            };
            if let Err(e) = target.draw(&buffers.vertices, &buffers.indices, program, &uniforms, &params) {
                error!("drawing shape {} with material {:?}: {:?}", item.shape, material.name, e);
            }
        }
        Ok(())
    }
}

fn shape_buffers(display: &Display, model: &Model, i: usize) -> Result<ShapeBuffers> {
    let shape = &model.shapes[i];
    let mesh = build_mesh(shape, &model.vertex_arrays)?;
    let vertices = VertexBuffer::new(display, &mesh.vertices).map_err(gl_error)?;
    let indices = IndexBuffer::new(display, PrimitiveType::TrianglesList, &mesh.indices).map_err(gl_error)?;
    Ok(ShapeBuffers {
        vertices,
        indices,
        matrix_index: mesh.matrix_index,
        transformation: shape.transformation_type,
    })
}

fn matrix_image(matrices: &[Matrix4<f32>]) -> RawImage2d<'static, (f32, f32, f32, f32)> {
    RawImage2d {
        data: Cow::Owned(skinning::texel_rows(matrices)),
        width: 3,
        height: matrices.len() as u32,
        format: ClientFormat::F32F32F32F32,
    }
}

fn matrix_texture(display: &Display, matrices: &[Matrix4<f32>]) -> Result<Texture2d> {
    Texture2d::with_format(
        display,
        matrix_image(matrices),
        UncompressedFloatFormat::F32F32F32F32,
        MipmapsOption::NoMipmap,
    ).map_err(gl_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::j3d::inf1::SceneNode;
    use crate::j3d::model::tests::sample_model;

    #[test]
    fn sample_draw_list() {
        let model = sample_model();
        assert_eq!(draw_list(&model.scene_graph), vec![DrawItem { material: 0, shape: 0 }]);
    }

    #[test]
    fn material_scope() {
        // joint
        //   material 1
        //     shape 0
        //     joint
        //       shape 1
        //   shape 2      (no material)
        //   material 0
        //     shape 3
        let mut joint = SceneNode::new(NodeKind::Joint, 0);
        let mut m1 = SceneNode::new(NodeKind::Material, 1);
        m1.children.push(SceneNode::new(NodeKind::Shape, 0));
        let mut inner = SceneNode::new(NodeKind::Joint, 1);
        inner.children.push(SceneNode::new(NodeKind::Shape, 1));
        m1.children.push(inner);
        joint.children.push(m1);
        joint.children.push(SceneNode::new(NodeKind::Shape, 2));
        let mut m0 = SceneNode::new(NodeKind::Material, 0);
        m0.children.push(SceneNode::new(NodeKind::Shape, 3));
        joint.children.push(m0);
        let graph = SceneGraph { unknown0: 0, roots: vec![joint] };

        assert_eq!(draw_list(&graph), vec![
            DrawItem { material: 1, shape: 0 },
            DrawItem { material: 1, shape: 1 },
            DrawItem { material: 0, shape: 3 },
        ]);
    }
}
