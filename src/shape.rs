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

use std::sync::Arc;
use nalgebra::Matrix4;
use parking_lot::Mutex;
use crate::paint_data::PaintData;

/// Something the renderer can draw. Shapes are shared between the
/// application threads and the render thread, but `draw` is only ever
/// called on the render thread.
pub trait Shape: Send {
    fn draw(
        &mut self,
        paint_data: &PaintData,
        projection: &Matrix4<f32>,
        model: &Matrix4<f32>,
    );

    /// Shapes on lower layers are drawn first.
    fn layer(&self) -> i32 {
        0
    }

    /// Orders shapes within a layer.
    fn depth(&self) -> f32 {
        0.0
    }
}

pub type SharedShape = Arc<Mutex<dyn Shape>>;

pub fn share<S: Shape + 'static>(shape: S) -> SharedShape {
    Arc::new(Mutex::new(shape))
}

/// Sorts a snapshot of shapes into drawing order: ascending layer, then
/// depth, then id.
pub fn sort_for_drawing(shapes: &mut Vec<(i32, SharedShape)>) {
    let mut keyed = shapes.drain(..)
        .map(|entry| {
            let shape = entry.1.lock();
            let key = (shape.layer(), shape.depth());
            drop(shape);
            (key, entry)
        })
        .collect::<Vec<_>>();

    keyed.sort_by(|(a_key, a), (b_key, b)| {
        a_key.0.cmp(&b_key.0)
            .then(a_key.1.total_cmp(&b_key.1))
            .then(a.0.cmp(&b.0))
    });

    shapes.extend(keyed.into_iter().map(|(_, entry)| entry));
}
