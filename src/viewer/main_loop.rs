use glium::winit;
use winit::dpi::PhysicalSize;
use winit::keyboard::ModifiersState;
use super::viewer::Viewer;
use crate::editor::Editor;
use crate::errors::{gl_error, Result};
use crate::settings::Settings;

pub fn main_loop(editor: Option<Editor>, settings: Settings) -> Result<()> {
    let event_loop = winit::event_loop::EventLoop::builder()
        .build()
        .map_err(gl_error)?;
    let (window, display) = glium::backend::glutin::SimpleWindowBuilder::new()
        .with_title("j3dview")
        .with_inner_size(settings.window_width, settings.window_height)
        // glium 0.36 SimpleWindowBuilder has no with_vsync; glutin default swap interval (1) applies
        .build(&event_loop);

    let mut viewer = Viewer::new(&display, editor, settings);

    struct State {
        mouse_grabbed: bool,
        modifiers: ModifiersState,
        win_title: String,
        cur_time: u64,
        last_time: u64,
    }

    let mut state = State {
        mouse_grabbed: false,
        modifiers: Default::default(),
        win_title: String::with_capacity(512),
        cur_time: time::precise_time_ns(),
        last_time: time::precise_time_ns(),
    };

    let res = event_loop.run(move |ev, window_target| {
        use winit::event::Event as Ev;
        use winit::event::WindowEvent as WEv;
        use winit::event::DeviceEvent as DEv;

        match ev {
            Ev::WindowEvent { event, .. } => match event {
                WEv::RedrawRequested => {
                    state.last_time = state.cur_time;
                    state.cur_time = time::precise_time_ns();
                    let dt_in_ns = state.cur_time.wrapping_sub(state.last_time);
                    let dt = dt_in_ns as f64 / 1_000_000_000.0;

                    viewer.update(dt);

                    let PhysicalSize { width, height } = window.inner_size();
                    if width > 0 && height > 0 {
                        viewer.set_window_size(width, height);
                    }

                    let mut frame = display.draw();
                    viewer.draw(&display, &mut frame);
                    if let Err(e) = frame.finish() {
                        error!("swapping buffers: {:?}", e);
                    }

                    state.win_title.clear();
                    viewer.title(&mut state.win_title);
                    window.set_title(&state.win_title);
                }
                WEv::Resized(size) => {
                    display.resize(size.into());
                }
                WEv::CloseRequested => {
                    if viewer.is_modified() {
                        warn!("closing with unsaved changes");
                    }
                    viewer.settings().save();
                    window_target.exit();
                }
                WEv::DroppedFile(path) => {
                    viewer.drop_file(&display, path);
                }
                WEv::KeyboardInput { event: e, .. } => {
                    if let winit::keyboard::PhysicalKey::Code(code) = e.physical_key {
                        // Held keys are tracked by press and release.
                        if !e.repeat {
                            viewer.key(
                                code,
                                e.state == winit::event::ElementState::Pressed,
                                state.modifiers,
                            );
                        }
                    }
                }
                WEv::ModifiersChanged(m) => {
                    state.modifiers = m.state();
                }
                WEv::MouseInput { state: mouse_state, button, .. } => {
                    use winit::event::ElementState as Es;
                    use winit::event::MouseButton as MB;

                    match (mouse_state, button) {
                        (Es::Pressed, MB::Left) => {
                            state.mouse_grabbed = true;
                            let _ = window.set_cursor_grab(winit::window::CursorGrabMode::Locked);
                            window.set_cursor_visible(false);
                        }
                        (Es::Released, MB::Left) => {
                            state.mouse_grabbed = false;
                            let _ = window.set_cursor_grab(winit::window::CursorGrabMode::None);
                            window.set_cursor_visible(true);
                        }
                        _ => (),
                    }
                }
                WEv::Focused(false) => {
                    viewer.blur();

                    // Release the mouse
                    state.mouse_grabbed = false;
                    let _ = window.set_cursor_grab(winit::window::CursorGrabMode::None);
                    window.set_cursor_visible(true);
                }
                _ => ()
            },
            Ev::DeviceEvent { event, .. } => match event {
                DEv::MouseMotion { delta } => {
                    // delta is in an "unspecified coordinate system" but
                    // appears to be pixels
                    if state.mouse_grabbed {
                        viewer.mouse_drag(delta);
                    }
                }
                _ => (),
            },
            Ev::AboutToWait => {
                window.request_redraw();
            },
            _ => (),
        }
    });
    res.map_err(gl_error)
}
