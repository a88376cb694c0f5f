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

//! Entry points called from `com.prefabulated.bouncyball.OrbitActivity`
//! and an EGL implementation of [`Display`].

use std::rc::Rc;
use std::sync::OnceLock;
use jni::JNIEnv;
use jni::objects::{JObject, JString};
use jni::sys::{jboolean, jfloat, jint, JNI_FALSE};
use khronos_egl as egl;
use ndk::native_window::NativeWindow;
use crate::Engine;
use crate::gpu::Gpu;
use crate::logging;
use crate::renderer::Display;
use crate::size::Size;

// EGL_OPENGL_ES3_BIT_KHR
const OPENGL_ES3_BIT: egl::Int = 0x0040;

struct EglState {
    display: egl::Display,
    config: egl::Config,
    context: egl::Context,
}

pub struct EglDisplay {
    egl: egl::Instance<egl::Static>,
    state: Option<EglState>,
    window: Option<NativeWindow>,
    surface: Option<egl::Surface>,
}

// The EGL handles are created and used only on the render thread. The
// display is moved there before any of them exist.
unsafe impl Send for EglDisplay {}

impl EglDisplay {
    pub fn new() -> EglDisplay {
        EglDisplay {
            egl: egl::Instance::new(egl::Static),
            state: None,
            window: None,
            surface: None,
        }
    }

    fn destroy_surface(&mut self) {
        let (Some(state), Some(surface)) = (self.state.as_ref(), self.surface.take())
        else {
            return;
        };

        if let Err(e) = self.egl.make_current(
            state.display,
            None,
            None,
            Some(state.context),
        ) {
            log::warn!("Failed to release surface: {}", e);
        }

        if let Err(e) = self.egl.destroy_surface(state.display, surface) {
            log::warn!("Failed to destroy surface: {}", e);
        }
    }

    fn create_surface(&mut self) -> Result<(), String> {
        let (Some(state), Some(window)) = (self.state.as_ref(), self.window.as_ref())
        else {
            return Ok(());
        };

        let surface = unsafe {
            self.egl.create_window_surface(
                state.display,
                state.config,
                window.ptr().as_ptr() as egl::NativeWindowType,
                None,
            )
        }.map_err(|e| format!("eglCreateWindowSurface: {}", e))?;

        self.egl.make_current(
            state.display,
            Some(surface),
            Some(surface),
            Some(state.context),
        ).map_err(|e| format!("eglMakeCurrent: {}", e))?;

        // Pacing is done by the renderer
        if let Err(e) = self.egl.swap_interval(state.display, 0) {
            log::warn!("eglSwapInterval: {}", e);
        }

        self.surface = Some(surface);

        Ok(())
    }
}

impl Display for EglDisplay {
    type Window = NativeWindow;

    fn set_window(&mut self, window: Option<NativeWindow>) -> Result<(), String> {
        self.destroy_surface();
        self.window = window;
        self.create_surface()
    }

    fn create_context(&mut self) -> Result<Rc<dyn Gpu>, String> {
        let display = unsafe { self.egl.get_display(egl::DEFAULT_DISPLAY) }
            .ok_or_else(|| "eglGetDisplay failed".to_string())?;

        self.egl.initialize(display)
            .map_err(|e| format!("eglInitialize: {}", e))?;

        let config_attributes = [
            egl::RED_SIZE, 8,
            egl::GREEN_SIZE, 8,
            egl::BLUE_SIZE, 8,
            egl::RENDERABLE_TYPE, OPENGL_ES3_BIT,
            egl::SURFACE_TYPE, egl::WINDOW_BIT,
            egl::NONE,
        ];

        let config = self.egl.choose_first_config(display, &config_attributes)
            .map_err(|e| format!("eglChooseConfig: {}", e))?
            .ok_or_else(|| "No suitable EGL config".to_string())?;

        let context_attributes = [egl::CONTEXT_CLIENT_VERSION, 3, egl::NONE];

        let context = self.egl.create_context(
            display,
            config,
            None,
            &context_attributes,
        ).map_err(|e| format!("eglCreateContext: {}", e))?;

        self.state = Some(EglState { display, config, context });

        self.create_surface()?;

        let gl = unsafe {
            glow::Context::from_loader_function(|name| {
                self.egl.get_proc_address(name)
                    .map_or(std::ptr::null(), |f| f as *const _)
            })
        };

        Ok(Rc::new(gl))
    }

    fn swap_buffers(&mut self) -> Result<(), String> {
        let (Some(state), Some(surface)) = (self.state.as_ref(), self.surface)
        else {
            return Err("no surface to swap".to_string());
        };

        self.egl.swap_buffers(state.display, surface)
            .map_err(|e| format!("eglSwapBuffers: {}", e))
    }
}

impl Drop for EglDisplay {
    fn drop(&mut self) {
        self.destroy_surface();

        if let Some(state) = self.state.take() {
            let _ = self.egl.make_current(state.display, None, None, None);
            let _ = self.egl.destroy_context(state.display, state.context);
            let _ = self.egl.terminate(state.display);
        }
    }
}

static ENGINE: OnceLock<Engine<EglDisplay>> = OnceLock::new();

fn engine() -> Option<&'static Engine<EglDisplay>> {
    let engine = ENGINE.get();

    if engine.is_none() {
        log::error!("nInit hasn’t been called");
    }

    engine
}

fn to_string(env: &mut JNIEnv, string: &JString) -> Option<String> {
    match env.get_string(string) {
        Ok(s) => Some(s.into()),
        Err(e) => {
            log::error!("Failed to read Java string: {}", e);
            None
        },
    }
}

#[no_mangle]
pub extern "system" fn Java_com_prefabulated_bouncyball_OrbitActivity_nInit(
    _env: JNIEnv,
    _activity: JObject,
) {
    logging::init_logging();

    if ENGINE.get().is_some() {
        return;
    }

    match Engine::new(EglDisplay::new()) {
        Ok(engine) => {
            engine.add_orbit(|_| ());
            let _ = ENGINE.set(engine);
        },
        Err(e) => log::error!("Failed to create the engine: {}", e),
    }
}

#[no_mangle]
pub extern "system" fn Java_com_prefabulated_bouncyball_OrbitActivity_nSetSurface(
    env: JNIEnv,
    _activity: JObject,
    surface: JObject,
    width: jint,
    height: jint,
) {
    let Some(engine) = engine()
    else {
        return;
    };

    let window = unsafe {
        NativeWindow::from_surface(env.get_raw(), surface.as_raw())
    };

    match window {
        Some(window) => engine.renderer.set_window(window, Size::new(width, height)),
        None => log::error!("Failed to get a native window from the surface"),
    }
}

#[no_mangle]
pub extern "system" fn Java_com_prefabulated_bouncyball_OrbitActivity_nClearSurface(
    _env: JNIEnv,
    _activity: JObject,
) {
    if let Some(engine) = engine() {
        engine.renderer.clear_window();
    }
}

#[no_mangle]
pub extern "system" fn Java_com_prefabulated_bouncyball_OrbitActivity_nStart(
    _env: JNIEnv,
    _activity: JObject,
) {
    log::info!("start");

    if let Some(engine) = engine() {
        engine.renderer.start();
    }
}

#[no_mangle]
pub extern "system" fn Java_com_prefabulated_bouncyball_OrbitActivity_nStop(
    _env: JNIEnv,
    _activity: JObject,
) {
    log::info!("stop");

    if let Some(engine) = engine() {
        engine.renderer.stop();
    }
}

#[no_mangle]
pub extern "system" fn Java_com_prefabulated_bouncyball_OrbitActivity_nSetPreference(
    mut env: JNIEnv,
    _activity: JObject,
    key: JString,
    value: JString,
) {
    let Some(engine) = engine()
    else {
        return;
    };

    let (Some(key), Some(value)) = (to_string(&mut env, &key), to_string(&mut env, &value))
    else {
        return;
    };

    engine.settings.set_preference(&key, &value);
}

#[no_mangle]
pub extern "system" fn Java_com_prefabulated_bouncyball_OrbitActivity_nSetAutoSwapInterval(
    _env: JNIEnv,
    _activity: JObject,
    enabled: jboolean,
) {
    if let Some(engine) = engine() {
        engine.renderer.set_auto_swap_interval(enabled != JNI_FALSE);
    }
}

#[no_mangle]
pub extern "system" fn Java_com_prefabulated_bouncyball_OrbitActivity_nGetAverageFps(
    _env: JNIEnv,
    _activity: JObject,
) -> jfloat {
    engine().map(|engine| engine.renderer.average_fps()).unwrap_or(0.0)
}

#[no_mangle]
pub extern "system" fn Java_com_prefabulated_bouncyball_OrbitActivity_nSetWorkload(
    _env: JNIEnv,
    _activity: JObject,
    load: jint,
) {
    if let Some(engine) = engine() {
        engine.renderer.set_workload(load);
    }
}

#[no_mangle]
pub extern "system" fn Java_com_prefabulated_bouncyball_OrbitActivity_nGetSwappyStats(
    _env: JNIEnv,
    _activity: JObject,
    stat: jint,
    bin: jint,
) -> jint {
    engine().map(|engine| engine.renderer.frame_stat(stat, bin)).unwrap_or(0)
}
