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

//! A small OpenGL ES sprite engine and the bouncy ball orbit demo
//! built on it.

pub mod array_object;
pub mod circle;
pub mod frame_pacer;
pub mod gpu;
pub mod line;
pub mod logging;
pub mod orbit;
pub mod paint_data;
pub mod render_queue;
pub mod renderer;
pub mod resource_manager;
pub mod settings;
pub mod shaders;
pub mod shape;
pub mod shape_manager;
pub mod size;
pub mod sprite;
pub mod texture;

#[cfg(target_os = "android")]
mod android;

#[cfg(test)]
mod test_gpu;

use std::sync::Arc;
use orbit::Orbit;
use render_queue::RenderQueue;
use renderer::{Display, Renderer};
use resource_manager::ResourceManager;
use settings::Settings;
use shape::share;
use shape_manager::ShapeManager;

pub const BALL_TEXTURE: &str = "ball.png";

/// Everything the application needs, created once per process.
pub struct Engine<D: Display> {
    pub resources: ResourceManager,
    pub shapes: Arc<ShapeManager>,
    pub settings: Arc<Settings>,
    pub renderer: Renderer<D>,
}

impl<D: Display> Engine<D> {
    pub fn new(display: D) -> Result<Engine<D>, String> {
        let shapes = Arc::new(ShapeManager::new());
        let settings = Arc::new(Settings::new());

        let renderer = Renderer::new(
            display,
            Arc::clone(&shapes),
            Arc::clone(&settings),
        )?;

        let resources = ResourceManager::new(renderer.queue());

        Ok(Engine { resources, shapes, settings, renderer })
    }

    pub fn queue(&self) -> RenderQueue {
        self.renderer.queue()
    }

    /// Adds a ball orbiting the middle of the screen. The ball texture
    /// is shared between every orbit.
    pub fn add_orbit(&self, configure: impl FnOnce(&mut Orbit)) -> i32 {
        let texture = self.resources.load_texture_from_memory(
            orbit::BALL_SHEET,
            true, // alpha
            true, // smooth
            BALL_TEXTURE,
        );

        let mut orbit = Orbit::new(self.queue(), texture);
        configure(&mut orbit);

        self.shapes.add(share(orbit))
    }
}

impl<D: Display> Drop for Engine<D> {
    fn drop(&mut self) {
        // Let the render thread free the GPU resources before it quits
        self.shapes.release_all();
        self.resources.release_all_textures();
    }
}
