//! The editing session: the open document, its undo history, the
//! selection, and the animations found next to the model.
//!
//! Everything here runs on the main thread between frames. Fallible
//! operations leave the document as it was when they fail.

use crate::errors::{incompatible, Result, ResultExt};
use crate::export;
use crate::j3d::animation::bind::{AnimatedState, Binding};
use crate::j3d::animation::Animation;
use crate::j3d::file::{self, FileType};
use crate::j3d::model::{MaterialArchive, Model};
use crate::j3d::texture::{pack_bti, unpack_bti};
use crate::scene::{Document, Path as ValuePath, UndoStack, Value, View};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Animation playback rate, in frames per second.
pub const FRAME_RATE: f32 = 30.0;

/// An animation file bound to the open model.
pub struct LoadedAnimation {
    pub path: PathBuf,
    pub binding: Binding,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    pub material: Option<usize>,
    pub texture: Option<usize>,
}

pub struct Editor {
    document: Document,
    undo: UndoStack,
    /// Where the model was loaded from or last saved to.
    path: PathBuf,
    /// Undo depth at the last save; `None` once that state can't be
    /// reached by undoing.
    saved_at: Option<usize>,
    pub selection: Selection,

    animations: Vec<LoadedAnimation>,
    current_animation: Option<usize>,
    frame: f32,
    pub playing: bool,
    state: AnimatedState,
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).chain_err(|| format!("couldn't read {}", path.display()))
}

/// Writes `buf` to `path` through a temporary file, so a failed write
/// never leaves a truncated file behind.
fn write_file(path: &Path, buf: &[u8]) -> Result<()> {
    let file_name = path.file_name()
        .ok_or_else(|| format!("{} is not a file name", path.display()))?;
    let mut tmp_name = std::ffi::OsString::from(".");
    tmp_name.push(file_name);
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let res = fs::write(&tmp, buf).and_then(|()| fs::rename(&tmp, path));
    if let Err(e) = res {
        let _ = fs::remove_file(&tmp);
        return Err(e).chain_err(|| format!("couldn't write {}", path.display()));
    }
    Ok(())
}

impl Editor {
    /// Opens a model file (`.bmd` or `.bdl`).
    pub fn open(path: &Path) -> Result<Editor> {
        let buf = read_file(path)?;
        let model = Model::unpack(&buf)
            .chain_err(|| format!("couldn't load {}", path.display()))?;
        info!("opened {} ({:?}, {} materials, {} textures)",
            path.display(), model.file_type, model.materials.len(), model.textures.len());
        Ok(Editor::with_model(model, path.to_path_buf()))
    }

    pub fn with_model(model: Model, path: PathBuf) -> Editor {
        let state = AnimatedState::new(&model);
        Editor {
            document: Document::new(model),
            undo: UndoStack::new(),
            path,
            saved_at: Some(0),
            selection: Selection::default(),
            animations: vec![],
            current_animation: None,
            frame: 0.0,
            playing: true,
            state,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn model(&self) -> &Model {
        self.document.model()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The model's name for display: its file name.
    pub fn name(&self) -> String {
        self.path.file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "untitled".to_string())
    }

    pub fn is_modified(&self) -> bool {
        self.saved_at != Some(self.undo.len())
    }

    /// Saves to the file the model came from.
    pub fn save(&mut self) -> Result<()> {
        let path = self.path.clone();
        self.save_as(&path)
    }

    /// Saves the model to `path`. The extension picks the file type, so
    /// saving as `.bdl` adds the MDL3 section; other extensions keep the
    /// type the model was loaded as.
    pub fn save_as(&mut self, path: &Path) -> Result<()> {
        self.undo.close();
        let model = self.document.model();
        let file_type = match FileType::from_path(path) {
            Some(ft) if ft.is_model() => ft,
            Some(ft) => bail!(incompatible(format!("can't save a model as {:?}", ft))),
            None => model.file_type,
        };
        model.check_references()?;
        let buf = model.pack_as(file_type)?;
        write_file(path, &buf)?;
        info!("saved {} as {:?} ({} bytes)", path.display(), file_type, buf.len());
        self.path = path.to_path_buf();
        self.saved_at = Some(self.undo.len());
        Ok(())
    }

    /// Sets the value at `path`, recording it for undo.
    pub fn commit(&mut self, path: ValuePath, value: Value, label: &str) -> Result<()> {
        let before = self.undo.len();
        let could_redo = self.undo.can_redo();
        self.undo.commit(&mut self.document, path, value, label)?;
        let redo_dropped = could_redo && !self.undo.can_redo();
        if redo_dropped && self.saved_at.map_or(false, |i| i > before) {
            // The saved state was in the discarded redo history.
            self.saved_at = None;
        }
        Ok(())
    }

    /// Ends the current command, eg. when a slider is released.
    pub fn close_command(&mut self) {
        self.undo.close();
    }

    pub fn undo(&mut self) -> Result<bool> {
        if let Some(label) = self.undo.undo_label() {
            debug!("undo {:?}", label);
        }
        self.undo.undo(&mut self.document)
    }

    pub fn redo(&mut self) -> Result<bool> {
        self.undo.redo(&mut self.document)
    }

    pub fn undo_label(&self) -> Option<&str> {
        self.undo.undo_label()
    }

    /// Commits a named attribute of the selected material.
    pub fn set_material_attribute(&mut self, name: &str, value: Value) -> Result<()> {
        let m = self.selection.material.ok_or("no material selected")?;
        let path = View::material(m).path(name)?;
        let material = self.model().materials.get(m).ok_or_else(|| format!("no material {}", m))?;
        let label = format!("{} of {}", name, material.name);
        self.commit(path, value, &label)
    }

    pub fn material_attribute(&self, name: &str) -> Result<Value> {
        let m = self.selection.material.ok_or("no material selected")?;
        View::material(m).get(&self.document, name)
    }

    /// Commits a named attribute of the selected texture.
    pub fn set_texture_attribute(&mut self, name: &str, value: Value) -> Result<()> {
        let t = self.selection.texture.ok_or("no texture selected")?;
        let path = View::texture(t).path(name)?;
        let texture = self.model().textures.get(t).ok_or_else(|| format!("no texture {}", t))?;
        let label = format!("{} of {}", name, texture.name);
        self.commit(path, value, &label)
    }

    /// Selects the next material (or the first), wrapping to none.
    pub fn select_next_material(&mut self) {
        let count = self.model().materials.len();
        self.selection.material = match self.selection.material {
            None if count > 0 => Some(0),
            Some(m) if m + 1 < count => Some(m + 1),
            _ => None,
        };
    }

    pub fn select_prev_material(&mut self) {
        let count = self.model().materials.len();
        self.selection.material = match self.selection.material {
            None if count > 0 => Some(count - 1),
            Some(m) if m > 0 => Some(m - 1),
            _ => None,
        };
    }

    /// Replaces the materials and textures with those of a `.bmt` file.
    /// This can't be undone, so the undo history is dropped.
    pub fn apply_material_archive(&mut self, path: &Path) -> Result<()> {
        let archive = MaterialArchive::unpack(&read_file(path)?)
            .chain_err(|| format!("couldn't load {}", path.display()))?;
        let mut model = self.model().clone();
        archive.apply(&mut model)?;
        self.replace_model(model);
        info!("applied material archive {}", path.display());
        Ok(())
    }

    /// Saves the materials and textures as a `.bmt` file.
    pub fn save_material_archive(&self, path: &Path) -> Result<()> {
        let model = self.model();
        let archive = MaterialArchive {
            subversion: model.subversion,
            materials: model.materials.clone(),
            textures: model.textures.clone(),
        };
        write_file(path, &archive.pack()?)
    }

    fn replace_model(&mut self, model: Model) {
        self.document.replace(model);
        self.undo = UndoStack::new();
        self.saved_at = None;
        self.selection = Selection::default();
        self.rebind_animations();
    }

    /// Appends a texture from a `.bti` file. Returns its index.
    pub fn import_texture(&mut self, path: &Path) -> Result<usize> {
        let name = path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let texture = unpack_bti(&read_file(path)?, name)
            .chain_err(|| format!("couldn't load {}", path.display()))?;
        let index = self.model().textures.len();
        self.document.insert_texture(index, texture)?;
        self.saved_at = None;
        Ok(index)
    }

    /// Removes a texture. Materials that used it are left without one.
    pub fn remove_texture(&mut self, index: usize) -> Result<()> {
        self.document.remove_texture(index)?;
        self.saved_at = None;
        if self.selection.texture == Some(index) {
            self.selection.texture = None;
        }
        self.rebind_animations();
        Ok(())
    }

    /// Writes a texture as a `.bti` file.
    pub fn export_texture(&self, index: usize, path: &Path) -> Result<()> {
        let texture = self.model().textures.get(index)
            .ok_or_else(|| format!("no texture {}", index))?;
        write_file(path, &pack_bti(texture)?)
    }

    /// Writes a texture's first level as a PNG.
    pub fn export_texture_png(&self, index: usize, path: &Path) -> Result<()> {
        let texture = self.model().textures.get(index)
            .ok_or_else(|| format!("no texture {}", index))?;
        export::export_texture(texture, 0, path)
    }

    /// Writes every texture as a PNG into `dir`.
    pub fn export_textures_png(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        export::export_textures(&self.model().textures, dir)
    }

    /// Loads an animation file and binds it to the model. Returns its
    /// index in the animation list.
    pub fn load_animation(&mut self, path: &Path) -> Result<usize> {
        let animation = Animation::unpack(&read_file(path)?)
            .chain_err(|| format!("couldn't load {}", path.display()))?;
        let binding = Binding::new(Rc::new(animation), self.model())
            .chain_err(|| format!("can't use {} with this model", path.display()))?;
        self.animations.push(LoadedAnimation { path: path.to_path_buf(), binding });
        Ok(self.animations.len() - 1)
    }

    /// Loads the animation files in the model's directory that fit the
    /// model. Returns how many were loaded.
    pub fn scan_animations(&mut self) -> Result<usize> {
        let dir = match self.path.parent() {
            Some(dir) if dir.as_os_str().is_empty() => Path::new("."),
            Some(dir) => dir,
            None => return Ok(0),
        };
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| FileType::from_path(p).map_or(false, |ft| ft.is_animation()))
            .collect();
        paths.sort();

        let mut count = 0;
        for path in paths {
            if self.animations.iter().any(|a| a.path == path) {
                continue;
            }
            match self.load_animation(&path) {
                Ok(_) => count += 1,
                Err(e) => info!("skipping {}: {}", path.display(), e),
            }
        }
        debug!("found {} animations next to {}", count, self.path.display());
        Ok(count)
    }

    /// Re-checks every animation against the edited model, dropping the
    /// ones that no longer fit.
    fn rebind_animations(&mut self) {
        let model = self.document.model();
        let current_path = self.current_animation.map(|i| self.animations[i].path.clone());
        let animations = std::mem::replace(&mut self.animations, vec![]);
        for a in animations {
            match Binding::new(a.binding.animation.clone(), model) {
                Ok(binding) => self.animations.push(LoadedAnimation { path: a.path, binding }),
                Err(e) => warn!("dropping animation {}: {}", a.path.display(), e),
            }
        }
        self.current_animation = current_path
            .and_then(|p| self.animations.iter().position(|a| a.path == p));
    }

    pub fn animations(&self) -> &[LoadedAnimation] {
        &self.animations
    }

    pub fn current_animation(&self) -> Option<&LoadedAnimation> {
        self.current_animation.map(|i| &self.animations[i])
    }

    /// Cycles none → first → ... → last → none.
    pub fn next_animation(&mut self) {
        let n = self.animations.len();
        self.current_animation = match self.current_animation {
            None if n > 0 => Some(0),
            Some(i) if i + 1 < n => Some(i + 1),
            _ => None,
        };
        self.frame = 0.0;
    }

    /// Selects an animation by index, or none.
    pub fn select_animation(&mut self, index: Option<usize>) {
        self.current_animation = index.filter(|&i| i < self.animations.len());
        self.frame = 0.0;
    }

    pub fn prev_animation(&mut self) {
        let n = self.animations.len();
        self.current_animation = match self.current_animation {
            None if n > 0 => Some(n - 1),
            Some(i) if i > 0 => Some(i - 1),
            _ => None,
        };
        self.frame = 0.0;
    }

    pub fn frame(&self) -> f32 {
        self.frame
    }

    /// Advances playback by `dt` seconds.
    pub fn advance(&mut self, dt: f32) {
        if self.playing && self.current_animation.is_some() {
            self.frame += dt * FRAME_RATE;
        }
    }

    /// Steps one frame forward or back, for single-stepping.
    pub fn step(&mut self, frames: f32) {
        self.frame = (self.frame + frames).max(0.0);
    }

    /// The model, and its pose at the current frame when an animation
    /// is selected.
    pub fn pose(&mut self) -> (&Model, Option<&AnimatedState>) {
        let posed = match self.current_animation {
            Some(i) => {
                self.state.reset(self.document.model());
                self.animations[i].binding.apply(self.frame, &mut self.state);
                true
            }
            None => false,
        };
        (self.document.model(), if posed { Some(&self.state) } else { None })
    }
}

/// The file type stored in a J3D file's header.
pub fn sniff_file_type(buf: &[u8]) -> Result<FileType> {
    Ok(file::open(buf)?.file_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::j3d::animation::ank1;
    use crate::j3d::model::tests::sample_model;

    /// A fresh scratch directory under the system temp dir.
    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("j3dview-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn dither() -> ValuePath {
        ValuePath::root().child("materials").index(0).child("dither")
    }

    #[test]
    fn save_and_reopen() {
        let dir = scratch("save");
        let path = dir.join("quad.bmd");
        let mut editor = Editor::with_model(sample_model(), path.clone());
        editor.commit(dither(), Value::Bool(false), "dither").unwrap();
        assert!(editor.is_modified());
        editor.save().unwrap();
        assert!(!editor.is_modified());
        assert!(!dir.join(".quad.bmd.tmp").exists());

        let reopened = Editor::open(&path).unwrap();
        assert!(!reopened.model().materials[0].dither);
        assert_eq!(reopened.model(), editor.model());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn save_as_bdl_switches_file_type() {
        let dir = scratch("bdl");
        let mut editor = Editor::with_model(sample_model(), dir.join("quad.bmd"));
        let bdl = dir.join("quad.bdl");
        editor.save_as(&bdl).unwrap();
        assert_eq!(editor.path(), bdl.as_path());

        let buf = fs::read(&bdl).unwrap();
        assert_eq!(sniff_file_type(&buf).unwrap(), FileType::Bdl4);
        assert_eq!(&buf[12..16], &9u32.to_be_bytes());
        let model = Model::unpack(&buf).unwrap();
        assert_eq!(model.materials, editor.model().materials);

        assert!(editor.save_as(&dir.join("quad.bck")).is_err());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn undo_redo_and_modified() {
        let mut editor = Editor::with_model(sample_model(), PathBuf::from("quad.bmd"));
        editor.commit(dither(), Value::Bool(false), "dither").unwrap();
        editor.close_command();
        assert_eq!(editor.undo_label(), Some("dither"));
        assert!(editor.undo().unwrap());
        assert!(editor.model().materials[0].dither);
        assert!(!editor.is_modified());
        assert!(editor.redo().unwrap());
        assert!(!editor.model().materials[0].dither);
        assert!(editor.is_modified());
        assert!(!editor.redo().unwrap());
    }

    #[test]
    fn material_attributes_need_a_selection() {
        let mut editor = Editor::with_model(sample_model(), PathBuf::from("quad.bmd"));
        assert!(editor.set_material_attribute("dither", Value::Bool(false)).is_err());
        editor.select_next_material();
        assert_eq!(editor.selection.material, Some(0));
        editor.set_material_attribute("cull_mode", Value::Enum("All")).unwrap();
        assert_eq!(editor.material_attribute("cull_mode").unwrap(), Value::Enum("All"));
        assert_eq!(editor.undo_label(), Some("cull_mode of quad"));
        editor.select_next_material();
        assert_eq!(editor.selection.material, None);
        editor.select_prev_material();
        assert_eq!(editor.selection.material, Some(0));
    }

    #[test]
    fn texture_import_and_export() {
        let dir = scratch("bti");
        let mut editor = Editor::with_model(sample_model(), dir.join("quad.bmd"));
        let bti = dir.join("a.bti");
        editor.export_texture(0, &bti).unwrap();
        let index = editor.import_texture(&bti).unwrap();
        assert_eq!(index, editor.model().textures.len() - 1);
        assert_eq!(editor.model().textures[index].name, "a");
        assert_eq!(editor.model().textures[index].images, editor.model().textures[0].images);
        assert!(editor.is_modified());

        editor.remove_texture(index).unwrap();
        assert!(editor.remove_texture(99).is_err());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn material_archive() {
        let dir = scratch("bmt");
        let mut editor = Editor::with_model(sample_model(), dir.join("quad.bmd"));
        let bmt = dir.join("quad.bmt");
        editor.save_material_archive(&bmt).unwrap();

        editor.commit(dither(), Value::Bool(false), "dither").unwrap();
        editor.apply_material_archive(&bmt).unwrap();
        assert!(editor.model().materials[0].dither);
        assert_eq!(editor.undo_label(), None);
        assert!(editor.is_modified());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn animations_next_to_the_model() {
        let dir = scratch("anim");
        let path = dir.join("quad.bmd");
        fs::write(&path, sample_model().pack().unwrap()).unwrap();

        let sample = ank1::tests::sample();
        let fits = ank1::JointAnimation { joints: vec![sample.joints[1].clone()], ..sample.clone() };
        fs::write(dir.join("spin.bck"), Animation::Joint(fits).pack().unwrap()).unwrap();
        // Two joints; the model has one.
        fs::write(dir.join("wrong.bck"), Animation::Joint(sample).pack().unwrap()).unwrap();
        fs::write(dir.join("notes.txt"), b"hello").unwrap();

        let mut editor = Editor::open(&path).unwrap();
        assert_eq!(editor.scan_animations().unwrap(), 1);
        assert_eq!(editor.scan_animations().unwrap(), 0);
        assert!(editor.pose().1.is_none());

        editor.next_animation();
        assert_eq!(editor.current_animation().unwrap().path, dir.join("spin.bck"));
        editor.advance(0.5);
        assert_eq!(editor.frame(), 15.0);
        let state = editor.pose().1.unwrap();
        assert_eq!(state.joints[0].translation[2], 5.0);

        editor.next_animation();
        assert!(editor.current_animation().is_none());
        fs::remove_dir_all(&dir).unwrap();
    }
}
