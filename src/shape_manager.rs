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

use std::collections::BTreeMap;
use parking_lot::Mutex;
use crate::paint_data::PaintData;
use crate::shape::SharedShape;

struct Registry {
    shapes: BTreeMap<i32, SharedShape>,
    next_id: i32,
}

/// All of the shapes that the renderer draws, keyed by an id that is
/// handed out sequentially and never reused.
pub struct ShapeManager {
    registry: Mutex<Registry>,
}

impl ShapeManager {
    pub fn new() -> ShapeManager {
        ShapeManager {
            registry: Mutex::new(Registry {
                shapes: BTreeMap::new(),
                next_id: 0,
            }),
        }
    }

    pub fn add(&self, shape: SharedShape) -> i32 {
        let mut registry = self.registry.lock();

        let id = registry.next_id;
        registry.next_id += 1;
        registry.shapes.insert(id, shape);

        id
    }

    pub fn get(&self, id: i32) -> Option<SharedShape> {
        self.registry.lock().shapes.get(&id).cloned()
    }

    pub fn remove(&self, id: i32) -> Option<SharedShape> {
        self.registry.lock().shapes.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.registry.lock().shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.lock().shapes.is_empty()
    }

    /// A snapshot of the shapes in id order so that they can be drawn
    /// without holding the lock.
    pub fn shape_list(&self) -> Vec<(i32, SharedShape)> {
        self.registry.lock().shapes.iter()
            .map(|(&id, shape)| (id, SharedShape::clone(shape)))
            .collect()
    }

    /// Compiles the programs for every kind of shape. Returns false if
    /// any of them failed.
    pub fn init_programs(&self, paint_data: &PaintData) -> bool {
        // Try both even if the first fails
        paint_data.shaders.init_sprite_programs()
            & paint_data.shaders.init_line_program()
    }

    pub fn release_all(&self) {
        let shapes = std::mem::take(&mut self.registry.lock().shapes);
        drop(shapes);
    }
}

impl Default for ShapeManager {
    fn default() -> ShapeManager {
        ShapeManager::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::{Vector2, Vector4};
    use crate::line::Line;
    use crate::render_queue::RenderQueue;
    use crate::shape::share;
    use crate::test_gpu::{self, Call};

    fn test_line(queue: &RenderQueue) -> SharedShape {
        share(Line::new(
            queue.clone(),
            Vector2::zeros(),
            Vector2::new(1.0, 1.0),
            Vector4::new(1.0, 1.0, 1.0, 1.0),
        ))
    }

    #[test]
    fn ids_never_reused() {
        let (queue, _receiver) = RenderQueue::new();
        let manager = ShapeManager::new();

        let a = manager.add(test_line(&queue));
        let b = manager.add(test_line(&queue));
        assert_eq!(a, 0);
        assert!(b > a);

        assert!(manager.remove(b).is_some());
        assert!(manager.get(b).is_none());
        assert!(manager.remove(b).is_none());

        let c = manager.add(test_line(&queue));
        assert!(c > b);

        assert!(manager.get(a).is_some());
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn snapshot() {
        let (queue, _receiver) = RenderQueue::new();
        let manager = ShapeManager::new();

        for _ in 0..3 {
            manager.add(test_line(&queue));
        }

        manager.remove(1);

        let list = manager.shape_list();

        assert_eq!(
            list.iter().map(|(id, _)| *id).collect::<Vec<_>>(),
            vec![0, 2],
        );

        // The snapshot is independent of the registry
        manager.release_all();
        assert!(manager.is_empty());
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn init_programs() {
        let manager = ShapeManager::new();
        let (paint_data, gpu) = test_gpu::paint_data();

        assert!(manager.init_programs(&paint_data));

        assert_eq!(
            gpu.log().count(|c| matches!(c, Call::CreateProgram(_))),
            5,
        );
    }

    #[test]
    fn init_programs_failure() {
        let manager = ShapeManager::new();
        let (paint_data, gpu) = test_gpu::paint_data();

        gpu.break_shaders_containing("frag_color");

        assert!(!manager.init_programs(&paint_data));

        // The sprite programs were still built
        assert!(paint_data.shaders.init_sprite_programs());
    }
}
