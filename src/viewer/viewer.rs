use cgmath::{vec2, vec3, InnerSpace, Vector3};
use crate::editor::Editor;
use crate::errors::Result;
use crate::gx::CullMode;
use crate::j3d::file::FileType;
use crate::render::{Display, Renderer};
use crate::scene::Value;
use crate::settings::Settings;
use glium::winit::keyboard::{KeyCode, ModifiersState};
use glium::{Frame, Surface};
use std::fmt::Write;
use std::path::{Path, PathBuf};
use super::eye::Eye;
use super::fps::FpsCounter;
use super::speed::SpeedLevel;
use super::BG_COLOR;

pub static CONTROL_HELP: &'static str =
    concat!(
        "--------\n",
        "Controls\n",
        "--------\n",
        "  WASD         Forward/Left/Back/Right\n",
        "  EQ           Up/Down\n",
        "  +-           Increase/Decrease Speed\n",
        "  L.Mouse      Free Look\n",
        "  OP           Prev/Next Animation\n",
        "  K            Play/Pause Animation\n",
        "  ,.           Step Animation Back/Forward\n",
        "  Tab          Select Next Material          (+Shift for previous)\n",
        "  Esc          Clear Selection\n",
        "  C            Cycle Cull Mode               (Selected material)\n",
        "  B            Toggle Depth Test             (Selected material)\n",
        "  V            Toggle Dither                 (Selected material)\n",
        "  Ctrl+Z       Undo\n",
        "  Ctrl+Y       Redo                          (or Ctrl+Shift+Z)\n",
        "  Ctrl+S       Save\n",
        "  X            Export Textures as PNG\n",
        "  Space        Print Info\n",
        "  Drop a file on the window to open a model, load an animation,\n",
        "  apply a material archive (.bmt), or import a texture (.bti).\n",
    );

/// An open model and the GPU objects drawing it.
struct Open {
    editor: Editor,
    renderer: Renderer,
}

pub struct Viewer {
    settings: Settings,
    open: Option<Open>,
    eye: Eye,
    fps_counter: FpsCounter,
    /// Direction of motion (for the WASD controls).
    move_vector: Vector3<f32>,
    speed: SpeedLevel,
}

impl Viewer {
    pub fn new(display: &Display, editor: Option<Editor>, settings: Settings) -> Viewer {
        let mut viewer = Viewer {
            settings,
            open: None,
            eye: Eye::default(),
            fps_counter: FpsCounter::new(),
            move_vector: vec3(0.0, 0.0, 0.0),
            speed: SpeedLevel::default(),
        };
        if let Some(editor) = editor {
            if let Err(e) = viewer.show(display, editor) {
                error!("{}", e);
            }
        }
        viewer
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn set_window_size(&mut self, width: u32, height: u32) {
        self.settings.window_width = width;
        self.settings.window_height = height;
        self.eye.aspect_ratio = width as f32 / height as f32;
    }

    /// Whether the open model has unsaved changes.
    pub fn is_modified(&self) -> bool {
        self.open.as_ref().map_or(false, |open| open.editor.is_modified())
    }

    fn show(&mut self, display: &Display, mut editor: Editor) -> Result<()> {
        if let Err(e) = editor.scan_animations() {
            warn!("couldn't look for animations: {}", e);
        }
        let renderer = Renderer::new(display, editor.document())?;
        let aspect_ratio = self.eye.aspect_ratio;
        self.eye = Eye::framing(&editor.model().shapes, self.settings.fov_y);
        self.eye.aspect_ratio = aspect_ratio;
        self.open = Some(Open { editor, renderer });
        Ok(())
    }

    /// Handles a file dropped on the window.
    pub fn drop_file(&mut self, display: &Display, path: PathBuf) {
        if let Err(e) = self.try_drop_file(display, &path) {
            error!("{}", e);
        }
    }

    fn try_drop_file(&mut self, display: &Display, path: &Path) -> Result<()> {
        let is_bti = path.extension().map_or(false, |ext| ext.eq_ignore_ascii_case("bti"));
        let file_type = FileType::from_path(path);
        match file_type {
            Some(ft) if ft.is_model() => {
                if self.is_modified() {
                    warn!("discarding unsaved changes");
                }
                self.show(display, Editor::open(path)?)?;
                return Ok(());
            }
            _ => (),
        }

        let editor = match self.open {
            Some(ref mut open) => &mut open.editor,
            None => bail!("open a model first"),
        };
        match file_type {
            Some(ft) if ft.is_animation() => {
                let index = editor.load_animation(path)?;
                editor.select_animation(Some(index));
                info!("playing {}", path.display());
            }
            Some(FileType::Bmt3) => {
                editor.apply_material_archive(path)?;
                info!("applied {}", path.display());
            }
            _ if is_bti => {
                let index = editor.import_texture(path)?;
                info!("imported {} as texture {}", path.display(), index);
            }
            _ => bail!("don't know what to do with {}", path.display()),
        }
        Ok(())
    }

    /// Update state with the delta-time since last update. Called once before
    /// each frame.
    pub fn update(&mut self, dt: f64) {
        self.fps_counter.update(dt);

        let mag = self.move_vector.magnitude();
        if mag != 0.0 {
            let speed = self.settings.movement_speed * self.speed.factor();
            let dv = speed * (self.move_vector / mag);
            self.eye.move_by((dt as f32) * dv)
        }

        if let Some(ref mut open) = self.open {
            // Don't jump ahead if we lagged.
            open.editor.advance(dt.min(0.25) as f32);
        }
    }

    pub fn draw(&mut self, display: &Display, frame: &mut Frame) {
        frame.clear_color_srgb_and_depth(BG_COLOR, 1.0);

        let projection = self.eye.projection(&self.settings);
        let view = self.eye.model_view();
        if let Some(Open { ref mut editor, ref mut renderer }) = self.open {
            let (model, state) = editor.pose();
            if let Err(e) = renderer.draw(display, frame, model, state, projection, view) {
                error!("draw failed: {}", e);
            }
        }
    }

    /// Handle key press/release events.
    pub fn key(&mut self, code: KeyCode, pressed: bool, modifiers: ModifiersState) {
        use self::KeyCode as Key;

        // Use WASD controls to update the move_vector.
        static MOVE_KEYS: [(Key, Key, usize); 3] = [
            // Key to move forward, key to move backward, affected XYZ component
            (Key::KeyW, Key::KeyS, 0),
            (Key::KeyD, Key::KeyA, 1),
            (Key::KeyE, Key::KeyQ, 2),
        ];
        if !modifiers.control_key() {
            for &(pos_key, neg_key, component) in &MOVE_KEYS {
                if code == pos_key {
                    self.move_vector[component] = if pressed { 1.0 } else { 0.0 };
                    return;
                }
                if code == neg_key {
                    self.move_vector[component] = if pressed { -1.0 } else { 0.0 };
                    return;
                }
            }
        }

        if !pressed {
            return;
        }

        if let Err(e) = self.command(code, modifiers) {
            error!("{}", e);
        }
    }

    fn command(&mut self, code: KeyCode, modifiers: ModifiersState) -> Result<()> {
        use self::KeyCode as Key;

        match code {
            Key::Equal => {
                self.speed.speed_up();
                return Ok(());
            }
            Key::Minus => {
                self.speed.speed_down();
                return Ok(());
            }
            Key::Space => {
                self.print_info();
                return Ok(());
            }
            _ => (),
        }

        let editor = match self.open {
            Some(ref mut open) => &mut open.editor,
            None => return Ok(()),
        };

        if modifiers.control_key() {
            match code {
                Key::KeyZ if modifiers.shift_key() => { editor.redo()?; }
                Key::KeyZ => { editor.undo()?; }
                Key::KeyY => { editor.redo()?; }
                Key::KeyS => editor.save()?,
                _ => (),
            }
            return Ok(());
        }

        match code {
            Key::KeyP => editor.next_animation(),
            Key::KeyO => editor.prev_animation(),
            Key::KeyK => editor.playing = !editor.playing,
            Key::Period => {
                editor.playing = false;
                editor.step(1.0);
            }
            Key::Comma => {
                editor.playing = false;
                editor.step(-1.0);
            }
            Key::Tab => {
                if modifiers.shift_key() {
                    editor.select_prev_material();
                } else {
                    editor.select_next_material();
                }
                if let Some(m) = editor.selection.material {
                    info!("selected material {}: {}", m, editor.model().materials[m].name);
                }
            }
            Key::Escape => editor.selection = Default::default(),
            Key::KeyC => {
                let next = match editor.material_attribute("cull_mode")? {
                    Value::Enum("None") => CullMode::Front,
                    Value::Enum("Front") => CullMode::Back,
                    Value::Enum("Back") => CullMode::All,
                    _ => CullMode::None,
                };
                editor.set_material_attribute("cull_mode", Value::Enum(next.name()))?;
                editor.close_command();
            }
            Key::KeyB => toggle(editor, "depth_test")?,
            Key::KeyV => toggle(editor, "dither")?,
            Key::KeyX => {
                let dir = texture_dir(editor.path());
                let written = editor.export_textures_png(&dir)?;
                info!("exported {} textures to {}", written.len(), dir.display());
            }
            _ => (),
        }
        Ok(())
    }

    /// Mouse motion while the left button is held.
    pub fn mouse_drag(&mut self, delta: (f64, f64)) {
        let (dx, dy) = delta;
        let speed = self.settings.rotation_speed;
        self.eye.free_look(vec2(dx as f32, dy as f32) * speed);
    }

    /// Called when the window loses focus.
    pub fn blur(&mut self) {
        // Stop moving
        self.move_vector = vec3(0.0, 0.0, 0.0);
    }

    pub fn title(&self, s: &mut String) {
        let open = match self.open {
            Some(ref open) => open,
            None => {
                s.push_str("j3dview");
                return;
            }
        };
        let editor = &open.editor;
        let _ = write!(s, "{}", editor.name());
        if editor.is_modified() {
            s.push('*');
        }
        if let Some(m) = editor.selection.material {
            if let Some(material) = editor.model().materials.get(m) {
                let _ = write!(s, " - {}", material.name);
            }
        }
        if let Some(animation) = editor.current_animation() {
            let name = animation.path.file_name().map(|s| s.to_string_lossy());
            let _ = write!(s, " - {} [{:.0}]", name.unwrap_or_default(), editor.frame());
        }
        let _ = write!(s, " - {:.1}fps ({:.0}ms) - j3dview",
            self.fps_counter.fps(), self.fps_counter.worst_frame_ms());
    }

    pub fn print_info(&self) {
        let open = match self.open {
            Some(ref open) => open,
            None => return,
        };
        let editor = &open.editor;
        let model = editor.model();
        println!("{}", editor.path().display());
        println!("  type: {:?}", model.file_type);
        println!("  joints: {}", model.joints.len());
        println!("  shapes: {}", model.shapes.len());
        println!("  materials: {}", model.materials.len());
        for (i, material) in model.materials.iter().enumerate() {
            println!("    {:3} {}", i, material.name);
        }
        println!("  textures: {}", model.textures.len());
        for (i, texture) in model.textures.iter().enumerate() {
            let (w, h) = texture.level_size(0);
            println!("    {:3} {} ({}x{} {:?})", i, texture.name, w, h, texture.image_format);
        }
        println!("  animations: {}", editor.animations().len());
        for animation in editor.animations() {
            println!("    {}", animation.path.display());
        }
        if let Some(label) = editor.undo_label() {
            println!("  last edit: {}", label);
        }
        println!("  eye: {:?}", self.eye.position);
        println!();
    }
}

fn toggle(editor: &mut Editor, attribute: &str) -> Result<()> {
    let value = match editor.material_attribute(attribute)? {
        Value::Bool(b) => Value::Bool(!b),
        v => bail!("{} is {:?}, not a flag", attribute, v),
    };
    editor.set_material_attribute(attribute, value)?;
    editor.close_command();
    Ok(())
}

/// `dir/model.bmd` exports to `dir/model_textures`.
fn texture_dir(model_path: &Path) -> PathBuf {
    let stem = model_path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "model".to_string());
    model_path.with_file_name(format!("{}_textures", stem))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texture_dir_is_next_to_the_model() {
        assert_eq!(texture_dir(Path::new("a/b/link.bdl")), PathBuf::from("a/b/link_textures"));
    }
}
