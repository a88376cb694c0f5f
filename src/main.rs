// Orbit – A bouncy ball rendering demo
// Copyright (C) 2023  Neil Roberts
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.


use std::process::ExitCode;
use std::rc::Rc;
use std::time::Duration;
use crossbeam::channel::{self, Sender};
use nalgebra::Vector3;
use rand::Rng;
use sdl2::event::{Event, WindowEvent};
use sdl2::keyboard::Keycode;
use orbit::Engine;
use orbit::gpu::Gpu;
use orbit::logging;
use orbit::renderer::Display;
use orbit::size::Size;

const WINDOW_SIZE: Size = Size { width: 800, height: 600 };
const N_ORBITS: usize = 5;

enum HostEvent {
    Resized(Size),
    Quit,
}

struct Context {
    _gl_context: sdl2::video::GLContext,
    window: sdl2::video::Window,
    _video_subsystem: sdl2::VideoSubsystem,
    event_pump: sdl2::EventPump,
    _sdl: sdl2::Sdl,
}

/// Draws into an SDL window. SDL is initialised on the render thread
/// the first time a context is needed and the window events are pumped
/// from there after every frame.
struct SdlDisplay {
    context: Option<Context>,
    size: Size,
    events: Sender<HostEvent>,
}

// The SDL objects are only created once the display has moved to the
// render thread and never leave it.
unsafe impl Send for SdlDisplay {}

impl SdlDisplay {
    fn new(events: Sender<HostEvent>) -> SdlDisplay {
        SdlDisplay {
            context: None,
            size: WINDOW_SIZE,
            events,
        }
    }

    fn pump_events(&mut self) {
        let Some(context) = self.context.as_mut()
        else {
            return;
        };

        for event in context.event_pump.poll_iter() {
            let host_event = match event {
                Event::Quit {..} |
                Event::KeyDown { keycode: Some(Keycode::Escape), .. } => {
                    HostEvent::Quit
                },
                Event::Window {
                    win_event: WindowEvent::SizeChanged(width, height),
                    ..
                } => {
                    HostEvent::Resized(Size::new(width, height))
                },
                _ => continue,
            };

            // The main thread might already be gone
            let _ = self.events.send(host_event);
        }
    }
}

impl Display for SdlDisplay {
    type Window = Size;

    fn set_window(&mut self, window: Option<Size>) -> Result<(), String> {
        let Some(context) = self.context.as_mut()
        else {
            if let Some(size) = window {
                self.size = size;
            }
            return Ok(());
        };

        match window {
            Some(size) => {
                context.window.set_size(size.width as u32, size.height as u32)
                    .map_err(|e| e.to_string())?;
                context.window.show();
                self.size = size;
            },
            None => context.window.hide(),
        }

        Ok(())
    }

    fn create_context(&mut self) -> Result<Rc<dyn Gpu>, String> {
        let sdl = sdl2::init()?;

        let event_pump = sdl.event_pump()?;

        let video_subsystem = sdl.video()?;

        let gl_attr = video_subsystem.gl_attr();

        gl_attr.set_red_size(8);
        gl_attr.set_green_size(8);
        gl_attr.set_blue_size(8);
        gl_attr.set_alpha_size(0);
        gl_attr.set_depth_size(0);
        gl_attr.set_double_buffer(true);
        gl_attr.set_context_major_version(3);
        gl_attr.set_context_minor_version(0);
        gl_attr.set_context_profile(sdl2::video::GLProfile::GLES);

        let window = video_subsystem.window(
            "Orbit",
            self.size.width as u32,
            self.size.height as u32,
        )
            .opengl()
            .resizable()
            .build()
            .map_err(|e| e.to_string())?;

        let gl_context = window.gl_create_context()?;

        window.gl_make_current(&gl_context)?;

        // Pacing is done by the renderer
        if let Err(e) = video_subsystem.gl_set_swap_interval(0) {
            log::warn!("Failed to disable vsync: {}", e);
        }

        let gl = unsafe {
            glow::Context::from_loader_function(|name| {
                video_subsystem.gl_get_proc_address(name) as *const _
            })
        };

        self.context = Some(Context {
            _gl_context: gl_context,
            window,
            _video_subsystem: video_subsystem,
            event_pump,
            _sdl: sdl,
        });

        Ok(Rc::new(gl))
    }

    fn swap_buffers(&mut self) -> Result<(), String> {
        let Some(context) = self.context.as_ref()
        else {
            return Err("no window to swap".to_string());
        };

        context.window.gl_swap_window();

        self.pump_events();

        Ok(())
    }
}

fn load_settings(engine: &Engine<SdlDisplay>, path: &str) -> Result<(), String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("{}: {}", path, e))?;

    engine.settings.apply_json(&text)
        .map_err(|e| format!("{}: {}", path, e))
}

fn add_orbits(engine: &Engine<SdlDisplay>) {
    let mut rng = rand::thread_rng();

    for i in 0..N_ORBITS {
        engine.add_orbit(|orbit| {
            orbit.set_phase(i as f32 / N_ORBITS as f32);
            orbit.set_period(Duration::from_millis(rng.gen_range(2500..6000)));
            orbit.set_colorize(Vector3::new(
                rng.gen_range(0.4..=1.0),
                rng.gen_range(0.4..=1.0),
                rng.gen_range(0.4..=1.0),
            ));
            orbit.set_layer(i as i32);
        });
    }
}

pub fn main() -> ExitCode {
    logging::init_logging();

    let (event_sender, event_receiver) = channel::unbounded();

    let engine = match Engine::new(SdlDisplay::new(event_sender)) {
        Ok(engine) => engine,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        },
    };

    if let Some(path) = std::env::args().nth(1) {
        if let Err(e) = load_settings(&engine, &path) {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    }

    add_orbits(&engine);

    engine.renderer.set_background_color(Vector3::new(0.05, 0.05, 0.15));
    engine.renderer.set_window(WINDOW_SIZE, WINDOW_SIZE);
    engine.renderer.start();

    for event in event_receiver.iter() {
        match event {
            HostEvent::Resized(size) => {
                engine.renderer.set_viewport(0, 0, size.width, size.height);
            },
            HostEvent::Quit => break,
        }
    }

    ExitCode::SUCCESS
}
