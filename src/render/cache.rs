//! GPU resources derived from materials and textures, and the listeners
//! that tell them when they're stale.
//!
//! The listeners only record what changed. The renderer drains them
//! before drawing and rebuilds what they name; programs and textures are
//! built lazily on the draw that first needs them.

use super::shader;
use super::state::sampler_behavior;
use super::uniforms::{trigger, Field, MaterialBlock, Trigger};
use super::Display;
use crate::errors::{gl_error, ErrorKind, Result};
use crate::j3d::material::Material;
use crate::j3d::shp1::ShapeTransformation;
use crate::j3d::texture::Texture;
use crate::scene::path::Fragment;
use crate::scene::{Event, EventKind, Listener};
use glium::program::ProgramCreationInput;
use glium::texture::{MipmapsOption, RawImage2d, Texture2d};
use glium::uniforms::{SamplerBehavior, UniformBuffer};
use glium::Program;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, HashSet};

/// What edits to one material invalidated.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MaterialDirty {
    pub fields: HashSet<Field>,
    pub programs: bool,
}

/// Listens at `.materials[*]`.
#[derive(Default)]
pub struct MaterialWatcher {
    dirty: RefCell<BTreeMap<usize, MaterialDirty>>,
}

impl MaterialWatcher {
    pub fn take(&self) -> BTreeMap<usize, MaterialDirty> {
        std::mem::take(&mut *self.dirty.borrow_mut())
    }
}

impl Listener for MaterialWatcher {
    fn receive(&self, event: &Event) {
        let m = match event.path.fragments().first() {
            Some(&Fragment::Key(m)) => m,
            _ => return,
        };
        let mut dirty = self.dirty.borrow_mut();
        let entry = dirty.entry(m).or_insert_with(MaterialDirty::default);
        match trigger(&event.path.tail(1)) {
            Trigger::None => (),
            Trigger::Field(field) => {
                entry.fields.insert(field);
            }
            Trigger::Program => entry.programs = true,
            Trigger::All => {
                entry.fields.extend(Field::all());
                entry.programs = true;
            }
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TextureDirty {
    pub sampler: bool,
    pub image: bool,
}

/// Listens at `.textures[*]`.
#[derive(Default)]
pub struct TextureWatcher {
    dirty: RefCell<BTreeMap<usize, TextureDirty>>,
}

impl TextureWatcher {
    pub fn take(&self) -> BTreeMap<usize, TextureDirty> {
        std::mem::take(&mut *self.dirty.borrow_mut())
    }
}

impl Listener for TextureWatcher {
    fn receive(&self, event: &Event) {
        use self::Fragment::{Attr, Key};
        let mut dirty = self.dirty.borrow_mut();
        match event.path.fragments() {
            [Key(t)] => {
                *dirty.entry(*t).or_default() = TextureDirty { sampler: true, image: true };
            }
            [Key(t), Attr(name), ..] => {
                let entry = dirty.entry(*t).or_default();
                match *name {
                    "name" => (),
                    "wrap_s" | "wrap_t" | "use_mipmapping" | "edge_lod" | "bias_clamp" |
                    "max_anisotropy" | "minification_filter" | "magnification_filter" |
                    "minimum_lod" | "maximum_lod" | "lod_bias" => entry.sampler = true,
                    _ => entry.image = true,
                }
            }
            _ => (),
        }
    }
}

/// Listens at the root for changes too coarse for the other watchers:
/// a replaced model, or textures inserted or removed.
#[derive(Default)]
pub struct ModelWatcher {
    reload: Cell<bool>,
}

impl ModelWatcher {
    pub fn take(&self) -> bool {
        self.reload.replace(false)
    }
}

impl Listener for ModelWatcher {
    fn receive(&self, event: &Event) {
        let coarse = match event.kind {
            EventKind::ValueChanged => event.path.is_empty(),
            EventKind::ItemInserted(_) | EventKind::ItemRemoved(_) => true,
        };
        if coarse {
            self.reload.set(true);
        }
    }
}

/// Program table key. Billboards are drawn as single matrix shapes.
fn program_key(transformation: ShapeTransformation) -> ShapeTransformation {
    match transformation {
        ShapeTransformation::MultiMatrix => ShapeTransformation::MultiMatrix,
        _ => ShapeTransformation::SingleMatrix,
    }
}

pub struct MaterialCache {
    block: MaterialBlock,
    buffer: UniformBuffer<MaterialBlock>,
    block_dirty: bool,
    /// `None` for programs that failed to build, so they aren't retried
    /// every frame.
    programs: HashMap<ShapeTransformation, Option<Program>>,
}

impl MaterialCache {
    pub fn new(display: &Display, material: &Material) -> Result<MaterialCache> {
        let block = MaterialBlock::new(material);
        let buffer = UniformBuffer::new(display, block).map_err(gl_error)?;
        Ok(MaterialCache { block, buffer, block_dirty: false, programs: HashMap::new() })
    }

    pub fn invalidate(&mut self, dirty: &MaterialDirty, material: &Material) {
        for &field in &dirty.fields {
            self.block.update(field, material);
            self.block_dirty = true;
        }
        if dirty.programs {
            debug!("material {:?}: dropping {} programs", material.name, self.programs.len());
            self.programs.clear();
        }
    }

    /// Replaces the whole block, eg. with an animated frame's values.
    pub fn set_block(&mut self, block: MaterialBlock) {
        if block != self.block {
            self.block = block;
            self.block_dirty = true;
        }
    }

    /// Builds the program for `transformation` if needed.
    pub fn prepare(&mut self, display: &Display, material: &Material, transformation: ShapeTransformation) {
        if self.block_dirty {
            self.buffer.write(&self.block);
            self.block_dirty = false;
        }
        self.programs.entry(program_key(transformation)).or_insert_with(|| {
            match build_program(display, material, transformation) {
                Ok(program) => Some(program),
                Err(e) => {
                    error!("material {:?}: {}", material.name, e);
                    if let ErrorKind::Shader(_, ref source) = *e.kind() {
                        debug!("shader source:\n{}", source);
                    }
                    None
                }
            }
        });
    }

    pub fn program(&self, transformation: ShapeTransformation) -> Option<&Program> {
        self.programs.get(&program_key(transformation)).and_then(|p| p.as_ref())
    }

    pub fn buffer(&self) -> &UniformBuffer<MaterialBlock> {
        &self.buffer
    }
}

fn build_program(display: &Display, material: &Material, transformation: ShapeTransformation) -> Result<Program> {
    let source = shader::synthesize(material, program_key(transformation))?;
    let input = ProgramCreationInput::SourceCode {
        vertex_shader: &source.vertex,
        fragment_shader: &source.fragment,
        geometry_shader: None,
        tessellation_control_shader: None,
        tessellation_evaluation_shader: None,
        transform_feedback_varyings: None,
        outputs_srgb: true,
        uses_point_size: false,
    };
    Program::new(display, input).map_err(|e| {
        let source = format!("{}\n{}", source.vertex, source.fragment);
        ErrorKind::Shader(e.to_string(), source).into()
    })
}

/// Lazily built sampler and texture object for one texture.
#[derive(Default)]
pub struct TextureCache {
    sampler: Option<SamplerBehavior>,
    texture: Option<Texture2d>,
    failed: bool,
}

impl TextureCache {
    pub fn new() -> TextureCache {
        TextureCache::default()
    }

    pub fn invalidate(&mut self, dirty: TextureDirty) {
        if dirty.sampler {
            self.sampler = None;
        }
        if dirty.image {
            self.texture = None;
            self.failed = false;
        }
    }

    pub fn prepare(&mut self, display: &Display, texture: &Texture) {
        if self.sampler.is_none() {
            self.sampler = Some(sampler_behavior(texture));
        }
        if self.texture.is_none() && !self.failed {
            match upload(display, texture) {
                Ok(t) => self.texture = Some(t),
                Err(e) => {
                    error!("texture {:?}: {}", texture.name, e);
                    self.failed = true;
                }
            }
        }
    }

    pub fn get(&self) -> Option<(&Texture2d, SamplerBehavior)> {
        match (&self.texture, self.sampler) {
            (Some(t), Some(s)) => Some((t, s)),
            _ => None,
        }
    }
}

fn upload(display: &Display, texture: &Texture) -> Result<Texture2d> {
    let levels = if texture.use_mipmapping { texture.level_count().max(1) } else { 1 };
    let image = |level: usize| -> Result<RawImage2d<'static, u8>> {
        let rgba = texture.decode_level(level)?;
        let (w, h) = texture.level_size(level);
        Ok(RawImage2d::from_raw_rgba(rgba.0, (w as u32, h as u32)))
    };

    let mipmaps = if levels > 1 {
        MipmapsOption::EmptyMipmapsMax(levels as u32 - 1)
    } else {
        MipmapsOption::NoMipmap
    };
    let gl_texture = Texture2d::with_mipmaps(display, image(0)?, mipmaps).map_err(gl_error)?;
    for level in 1..levels {
        let mipmap = match gl_texture.mipmap(level as u32) {
            Some(mipmap) => mipmap,
            None => break,
        };
        let (w, h) = texture.level_size(level);
        let rect = glium::Rect { left: 0, bottom: 0, width: w as u32, height: h as u32 };
        mipmap.write(rect, image(level)?);
    }
    debug!("uploaded texture {:?} ({} levels)", texture.name, levels);
    Ok(gl_texture)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::j3d::model::tests::sample_model;
    use crate::scene::{Document, Path, Value};
    use std::rc::Rc;

    #[test]
    fn material_watcher_collects_triggers() {
        let mut doc = Document::new(sample_model());
        let watcher = Rc::new(MaterialWatcher::default());
        doc.listeners().register(&watcher, Path::root().child("materials").any());

        let m = Path::root().child("materials").index(0);
        doc.set(&m.clone().child("kcolors").index(2).child("r"), &Value::Int(7)).unwrap();
        doc.set(&m.clone().child("tev_stage_count"), &Value::Int(1)).unwrap();
        doc.set(&m.clone().child("name"), &Value::Str("other".into())).unwrap();

        let dirty = watcher.take();
        let d = &dirty[&0];
        assert!(d.fields.contains(&Field::KColor(2)));
        assert_eq!(d.fields.len(), 1);
        assert!(d.programs);
        assert!(watcher.take().is_empty());
    }

    #[test]
    fn texture_watcher_splits_sampler_and_image() {
        let mut doc = Document::new(sample_model());
        let watcher = Rc::new(TextureWatcher::default());
        doc.listeners().register(&watcher, Path::root().child("textures").any());

        let t = Path::root().child("textures").index(1);
        doc.set(&t.clone().child("wrap_s"), &Value::Enum("Mirror")).unwrap();
        assert_eq!(watcher.take()[&1], TextureDirty { sampler: true, image: false });
        doc.set(&t.clone().child("width"), &Value::Int(16)).unwrap();
        assert_eq!(watcher.take()[&1], TextureDirty { sampler: false, image: true });
    }

    #[test]
    fn model_watcher_wants_reload() {
        let mut doc = Document::new(sample_model());
        let watcher = Rc::new(ModelWatcher::default());
        doc.listeners().register(&watcher, Path::root());

        doc.set(&Path::root().child("materials").index(0).child("dither"), &Value::Bool(false)).unwrap();
        assert!(!watcher.take());
        doc.remove_texture(0).unwrap();
        assert!(watcher.take());
        let model = doc.model().clone();
        doc.replace(model);
        assert!(watcher.take());
        assert!(!watcher.take());
    }
}
