mod eye;
mod fps;
mod main_loop;
mod speed;
mod viewer;

use crate::editor::Editor;
use crate::errors::Result;
use crate::settings::Settings;

pub use self::viewer::CONTROL_HELP;

/// Seconds between updates of the FPS shown in the title.
const FPS_INTERVAL: f64 = 2.0;
/// Linear RGBA the frame is cleared to.
const BG_COLOR: (f32, f32, f32, f32) = (0.3, 0.3, 0.3, 1.0);

/// Opens the viewer window and runs until it is closed. The window
/// starts empty when `editor` is `None`; files can be dropped on it.
pub fn main(editor: Option<Editor>, settings: Settings) -> Result<()> {
    main_loop::main_loop(editor, settings)
}
