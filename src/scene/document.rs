//! The edited model plus its change notification.

use super::event::{Event, EventKind, Listeners};
use super::path::Path;
use super::reflect::Value;
use crate::errors::Result;
use crate::j3d::model::Model;
use crate::j3d::texture::Texture;

pub struct Document {
    model: Model,
    listeners: Listeners,
}

impl Document {
    pub fn new(model: Model) -> Document {
        Document { model, listeners: Listeners::new() }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn listeners(&self) -> &Listeners {
        &self.listeners
    }

    pub fn get(&self, path: &Path) -> Result<Value> {
        path.get_value(&self.model)
    }

    /// Assigns the value at `path` and returns the old one. Listeners
    /// hear about it after the assignment, and only if the value changed.
    pub fn set(&mut self, path: &Path, value: &Value) -> Result<Value> {
        let old = path.set_value(&mut self.model, value)?;
        if old != *value {
            debug!("{} = {:?} (was {:?})", path, value, old);
            self.listeners.emit(&Event::value_changed(path.clone()));
        }
        Ok(old)
    }

    /// Replaces the whole model, eg. after applying a material archive.
    pub fn replace(&mut self, model: Model) {
        self.model = model;
        self.listeners.emit(&Event::value_changed(Path::root()));
    }

    /// Inserts a texture at `index`. Material references to later
    /// textures are shifted so they keep pointing at the same texture.
    pub fn insert_texture(&mut self, index: usize, texture: Texture) -> Result<()> {
        if index > self.model.textures.len() {
            bail!("texture index {} out of range ({})", index, self.model.textures.len());
        }
        check!(self.model.textures.len() < 0xFFFF)?;
        self.model.textures.insert(index, texture);
        self.listeners.emit(&Event {
            kind: EventKind::ItemInserted(index),
            path: Path::root().child("textures"),
        });
        self.relabel_texture_references(|i| {
            if i as usize >= index { Some(Some(i + 1)) } else { None }
        });
        Ok(())
    }

    /// Removes the texture at `index`. References to it are cleared;
    /// references to later textures are shifted down.
    pub fn remove_texture(&mut self, index: usize) -> Result<Texture> {
        if index >= self.model.textures.len() {
            bail!("texture index {} out of range ({})", index, self.model.textures.len());
        }
        let texture = self.model.textures.remove(index);
        self.listeners.emit(&Event {
            kind: EventKind::ItemRemoved(index),
            path: Path::root().child("textures"),
        });
        self.relabel_texture_references(|i| {
            let i = i as usize;
            if i == index { Some(None) }
            else if i > index { Some(Some(i as u16 - 1)) }
            else { None }
        });
        Ok(texture)
    }

    /// Applies `f` to every texture reference; `Some(new)` replaces it.
    fn relabel_texture_references<F>(&mut self, f: F)
    where F: Fn(u16) -> Option<Option<u16>>
    {
        let mut changed = vec![];
        for (m, material) in self.model.materials.iter_mut().enumerate() {
            for (slot, reference) in material.texture_indices.iter_mut().enumerate() {
                if let Some(new) = reference.and_then(&f) {
                    *reference = new;
                    changed.push((m, slot));
                }
            }
        }
        for (m, slot) in changed {
            let path = Path::root().child("materials").index(m).child("texture_indices").index(slot);
            self.listeners.emit(&Event::value_changed(path));
        }
    }
}

/// A named set of attribute paths below a base path, used to present a
/// record through flat names.
pub struct View {
    base: Path,
    attributes: Vec<(&'static str, Path)>,
}

macro_rules! attributes {
    ($($name:expr => $path:expr,)*) => {
        vec![$(($name, $path),)*]
    };
}

impl View {
    pub fn material(index: usize) -> View {
        let p = Path::root;
        View {
            base: Path::root().child("materials").index(index),
            attributes: attributes! {
                "name" => p().child("name"),
                "cull_mode" => p().child("cull_mode"),
                "channel_count" => p().child("channel_count"),
                "tev_stage_count" => p().child("tev_stage_count"),
                "texture0" => p().child("texture_indices").index(0),
                "alpha_function0" => p().child("alpha_test").child("function0"),
                "alpha_reference0" => p().child("alpha_test").child("reference0"),
                "alpha_operator" => p().child("alpha_test").child("operator"),
                "alpha_function1" => p().child("alpha_test").child("function1"),
                "alpha_reference1" => p().child("alpha_test").child("reference1"),
                "blend_function" => p().child("blend_mode").child("function"),
                "depth_test" => p().child("depth_mode").child("enable"),
                "depth_function" => p().child("depth_mode").child("function"),
                "depth_write" => p().child("depth_mode").child("update_enable"),
                "early_depth_test" => p().child("depth_test_early"),
                "dither" => p().child("dither"),
            },
        }
    }

    pub fn texture(index: usize) -> View {
        let p = Path::root;
        View {
            base: Path::root().child("textures").index(index),
            attributes: attributes! {
                "name" => p().child("name"),
                "wrap_s" => p().child("wrap_s"),
                "wrap_t" => p().child("wrap_t"),
                "minification_filter" => p().child("minification_filter"),
                "magnification_filter" => p().child("magnification_filter"),
                "minimum_lod" => p().child("minimum_lod"),
                "maximum_lod" => p().child("maximum_lod"),
                "lod_bias" => p().child("lod_bias"),
            },
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.attributes.iter().map(|&(name, _)| name)
    }

    /// Full path of the named attribute.
    pub fn path(&self, name: &str) -> Result<Path> {
        match self.attributes.iter().find(|&&(n, _)| n == name) {
            Some(&(_, ref path)) => Ok(self.base.clone() + path),
            None => bail!("no attribute {:?} at {}", name, self.base),
        }
    }

    pub fn get(&self, document: &Document, name: &str) -> Result<Value> {
        document.get(&self.path(name)?)
    }

    pub fn set(&self, document: &mut Document, name: &str, value: &Value) -> Result<Value> {
        document.set(&self.path(name)?, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::j3d::model::tests::sample_model;
    use crate::scene::event::tests::Recorder;
    use std::rc::Rc;

    #[test]
    fn set_notifies_after_assignment() {
        let mut doc = Document::new(sample_model());
        let recorder = Rc::new(Recorder::default());
        doc.listeners().register(&recorder, Path::root().child("materials").any());

        let view = View::material(0);
        let old = view.set(&mut doc, "dither", &Value::Bool(false)).unwrap();
        assert_eq!(old, Value::Bool(true));
        assert_eq!(view.get(&doc, "dither").unwrap(), Value::Bool(false));
        // Same value again: no event.
        view.set(&mut doc, "dither", &Value::Bool(false)).unwrap();

        let events = recorder.events.borrow();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].path, Path::root().index(0).child("dither"));
    }

    #[test]
    fn texture_insert_remove_relabels() {
        let mut doc = Document::new(sample_model());
        assert_eq!(doc.model().materials[0].texture_indices[0], Some(1));
        let recorder = Rc::new(Recorder::default());
        doc.listeners().register(&recorder, Path::root());

        let extra = doc.model().textures[0].clone();
        doc.insert_texture(0, extra).unwrap();
        assert_eq!(doc.model().textures.len(), 3);
        assert_eq!(doc.model().materials[0].texture_indices[0], Some(2));
        {
            let events = recorder.events.borrow();
            assert_eq!(events[0].kind, EventKind::ItemInserted(0));
            assert_eq!(events[1].path.to_string(), ".materials[0].texture_indices[0]");
        }

        doc.remove_texture(0).unwrap();
        assert_eq!(doc.model().materials[0].texture_indices[0], Some(1));
        doc.remove_texture(1).unwrap();
        assert_eq!(doc.model().materials[0].texture_indices[0], None);
        assert!(doc.remove_texture(5).is_err());
        doc.model().check_references().unwrap();
    }

    #[test]
    fn unknown_view_attribute() {
        let doc = Document::new(sample_model());
        assert!(View::texture(0).get(&doc, "colour").is_err());
        assert_eq!(View::texture(1).get(&doc, "name").unwrap(), Value::Str("b".into()));
        assert!(View::material(0).names().any(|n| n == "dither"));
    }
}
