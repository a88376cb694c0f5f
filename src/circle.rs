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

use std::f32::consts::TAU;
use nalgebra::{Matrix4, Vector2, Vector3, Vector4};
use crate::array_object::ArrayObject;
use crate::paint_data::PaintData;
use crate::render_queue::RenderQueue;
use crate::shape::Shape;

const N_SEGMENTS: usize = 32;
// The centre plus the first rim point again to close the fan
const N_VERTICES: usize = N_SEGMENTS + 2;

/// A unit circle as a triangle fan around the origin.
fn fan_vertices() -> Vec<f32> {
    let mut vertices = Vec::with_capacity(N_VERTICES * 2);

    vertices.extend_from_slice(&[0.0, 0.0]);

    for i in 0..=N_SEGMENTS {
        let angle = (i % N_SEGMENTS) as f32 * TAU / N_SEGMENTS as f32;
        vertices.push(angle.cos());
        vertices.push(angle.sin());
    }

    vertices
}

/// A filled circle of a single colour. The geometry is a unit circle
/// that is moved and scaled by the model matrix, so changing the centre
/// or radius never touches the vertex buffer.
pub struct Circle {
    queue: RenderQueue,
    center: Vector2<f32>,
    radius: f32,
    color: Vector4<f32>,
    layer: i32,
    depth: f32,
    visible: bool,
    array_object: Option<ArrayObject>,
}

impl Circle {
    pub fn new(
        queue: RenderQueue,
        center: Vector2<f32>,
        radius: f32,
        color: Vector4<f32>,
    ) -> Circle {
        Circle {
            queue,
            center,
            radius,
            color,
            layer: 0,
            depth: 0.0,
            visible: false,
            array_object: None,
        }
    }

    pub fn is_prepared(&self) -> bool {
        self.array_object.is_some()
    }

    pub fn center(&self) -> Vector2<f32> {
        self.center
    }

    pub fn set_center(&mut self, center: Vector2<f32>) {
        self.center = center;
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn set_radius(&mut self, radius: f32) {
        self.radius = radius;
    }

    pub fn color(&self) -> Vector4<f32> {
        self.color
    }

    pub fn set_color(&mut self, color: Vector4<f32>) {
        self.color = color;
    }

    pub fn set_layer(&mut self, layer: i32) {
        self.layer = layer;
    }

    pub fn set_depth(&mut self, depth: f32) {
        self.depth = depth;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn show(&mut self) {
        self.visible = true;
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    fn model_matrix(&self, model: &Matrix4<f32>) -> Matrix4<f32> {
        model
            * Matrix4::new_translation(&Vector3::new(
                self.center.x,
                self.center.y,
                0.0,
            ))
            * Matrix4::new_nonuniform_scaling(&Vector3::new(
                self.radius,
                self.radius,
                1.0,
            ))
    }
}

impl Shape for Circle {
    fn draw(
        &mut self,
        paint_data: &PaintData,
        projection: &Matrix4<f32>,
        model: &Matrix4<f32>,
    ) {
        if !self.visible {
            return;
        }

        let gpu = &*paint_data.gpu;

        if self.array_object.is_none() {
            match ArrayObject::new(gpu, &fan_vertices(), 2) {
                Ok(array_object) => self.array_object = Some(array_object),
                Err(e) => {
                    log::warn!("Failed to prepare circle: {}", e);
                    return;
                },
            }
        }

        let Some(array_object) = self.array_object.as_ref()
        else {
            return;
        };

        // Same flat colour program as lines
        let Some(program) = paint_data.shaders.line_program()
        else {
            return;
        };

        gpu.use_program(Some(program.program.id()));

        gpu.uniform_matrix_4_f32_slice(
            program.model.as_ref(),
            false, // transpose
            self.model_matrix(model).as_slice(),
        );
        gpu.uniform_matrix_4_f32_slice(
            program.projection.as_ref(),
            false, // transpose
            projection.as_slice(),
        );
        gpu.uniform_4_f32(
            program.color.as_ref(),
            self.color.x,
            self.color.y,
            self.color.z,
            self.color.w,
        );

        array_object.bind(gpu);
        gpu.draw_arrays(glow::TRIANGLE_FAN, 0, N_VERTICES as i32);
        ArrayObject::unbind(gpu);
    }

    fn layer(&self) -> i32 {
        self.layer
    }

    fn depth(&self) -> f32 {
        self.depth
    }
}

impl Drop for Circle {
    fn drop(&mut self) {
        if let Some(array_object) = self.array_object.take() {
            self.queue.run(move |paint_data| {
                array_object.delete(&*paint_data.gpu);
            });
        }
    }
}
