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

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use parking_lot::Mutex;
use crate::render_queue::RenderQueue;
use crate::texture::Texture;

struct Entry {
    texture: Arc<Texture>,
    ref_count: u32,
}

/// Named textures shared between shapes. Each name carries an explicit
/// reference count on top of the `Arc` so that the registry knows when
/// to let go of its own reference.
pub struct ResourceManager {
    queue: RenderQueue,
    textures: Mutex<HashMap<String, Entry>>,
}

impl ResourceManager {
    pub fn new(queue: RenderQueue) -> ResourceManager {
        ResourceManager {
            queue,
            textures: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the texture already registered as `name` with its count
    /// bumped, or registers the one made by `create` with a count of 1.
    fn load_or_attach(
        &self,
        name: &str,
        create: impl FnOnce() -> Arc<Texture>,
    ) -> Arc<Texture> {
        if let Some(texture) = self.attach_existing(name) {
            log::debug!("Texture “{}” is already loaded, attaching", name);
            return texture;
        }

        // Decode outside of the lock
        let texture = create();

        let mut textures = self.textures.lock();

        // Someone else might have loaded it in the meantime
        if let Some(entry) = textures.get_mut(name) {
            entry.ref_count += 1;
            return Arc::clone(&entry.texture);
        }

        textures.insert(
            name.to_string(),
            Entry { texture: Arc::clone(&texture), ref_count: 1 },
        );

        texture
    }

    fn attach_existing(&self, name: &str) -> Option<Arc<Texture>> {
        let mut textures = self.textures.lock();
        let entry = textures.get_mut(name)?;

        entry.ref_count += 1;

        Some(Arc::clone(&entry.texture))
    }

    /// Loads `path` under `name`, or attaches to the texture already
    /// loaded under that name, in which case the file isn’t read.
    pub fn load_texture_from_file<P: AsRef<Path>>(
        &self,
        path: P,
        alpha: bool,
        smooth: bool,
        name: &str,
    ) -> Arc<Texture> {
        self.load_or_attach(name, || {
            Texture::from_file(self.queue.clone(), path, alpha, smooth)
        })
    }

    pub fn load_texture_from_memory(
        &self,
        bytes: &[u8],
        alpha: bool,
        smooth: bool,
        name: &str,
    ) -> Arc<Texture> {
        self.load_or_attach(name, || {
            Texture::from_memory(self.queue.clone(), bytes, alpha, smooth)
        })
    }

    pub fn is_texture_loaded(&self, name: &str) -> bool {
        self.textures.lock().contains_key(name)
    }

    pub fn attach_texture(&self, name: &str) -> Option<Arc<Texture>> {
        let texture = self.attach_existing(name);

        if texture.is_none() {
            log::warn!("Can’t attach unknown texture “{}”", name);
        }

        texture
    }

    pub fn release_texture(&self, name: &str) {
        let mut textures = self.textures.lock();

        let Some(entry) = textures.get_mut(name)
        else {
            log::warn!("Can’t release unknown texture “{}”", name);
            return;
        };

        entry.ref_count -= 1;

        if entry.ref_count == 0 {
            textures.remove(name);
        }
    }

    pub fn texture(&self, name: &str) -> Option<Arc<Texture>> {
        self.textures.lock().get(name).map(|e| Arc::clone(&e.texture))
    }

    pub fn ref_count(&self, name: &str) -> Option<u32> {
        self.textures.lock().get(name).map(|e| e.ref_count)
    }

    pub fn release_all_textures(&self) {
        // Drop the textures after releasing the lock
        let textures = std::mem::take(&mut *self.textures.lock());
        drop(textures);
    }
}
