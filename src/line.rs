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

use nalgebra::{Matrix4, Vector2, Vector4};
use crate::array_object::ArrayObject;
use crate::paint_data::PaintData;
use crate::render_queue::RenderQueue;
use crate::shape::Shape;

pub struct Line {
    queue: RenderQueue,
    begin: Vector2<f32>,
    end: Vector2<f32>,
    color: Vector4<f32>,
    line_width: f32,
    layer: i32,
    depth: f32,
    visible: bool,
    array_object: Option<ArrayObject>,
    // The end points have moved since they were uploaded
    dirty: bool,
}

impl Line {
    pub fn new(
        queue: RenderQueue,
        begin: Vector2<f32>,
        end: Vector2<f32>,
        color: Vector4<f32>,
    ) -> Line {
        Line {
            queue,
            begin,
            end,
            color,
            line_width: 1.0,
            layer: 0,
            depth: 0.0,
            visible: true,
            array_object: None,
            dirty: false,
        }
    }

    fn vertices(&self) -> [f32; 4] {
        [self.begin.x, self.begin.y, self.end.x, self.end.y]
    }

    fn prepare(&mut self, paint_data: &PaintData) -> Result<(), String> {
        let gpu = &*paint_data.gpu;

        match self.array_object.as_ref() {
            Some(array_object) => {
                if self.dirty && array_object.upload(gpu, &self.vertices()) {
                    return Err("GL error while updating line".to_string());
                }
            },
            None => {
                self.array_object = Some(ArrayObject::new(
                    gpu,
                    &self.vertices(),
                    2, // components
                )?);
            },
        }

        self.dirty = false;

        Ok(())
    }

    pub fn is_prepared(&self) -> bool {
        self.array_object.is_some()
    }

    pub fn begin(&self) -> Vector2<f32> {
        self.begin
    }

    pub fn set_begin(&mut self, begin: Vector2<f32>) {
        self.begin = begin;
        self.dirty = true;
    }

    pub fn end(&self) -> Vector2<f32> {
        self.end
    }

    pub fn set_end(&mut self, end: Vector2<f32>) {
        self.end = end;
        self.dirty = true;
    }

    pub fn color(&self) -> Vector4<f32> {
        self.color
    }

    pub fn set_color(&mut self, color: Vector4<f32>) {
        self.color = color;
    }

    pub fn line_width(&self) -> f32 {
        self.line_width
    }

    pub fn set_line_width(&mut self, line_width: f32) {
        self.line_width = line_width;
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
}

impl Shape for Line {
    fn draw(
        &mut self,
        paint_data: &PaintData,
        projection: &Matrix4<f32>,
        model: &Matrix4<f32>,
    ) {
        if !self.visible {
            return;
        }

        if let Err(e) = self.prepare(paint_data) {
            log::warn!("Failed to prepare line: {}", e);
            return;
        }

        let Some(array_object) = self.array_object.as_ref()
        else {
            return;
        };

        let Some(program) = paint_data.shaders.line_program()
        else {
            return;
        };

        let gpu = &*paint_data.gpu;

        gpu.use_program(Some(program.program.id()));

        gpu.uniform_matrix_4_f32_slice(
            program.model.as_ref(),
            false, // transpose
            model.as_slice(),
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

        gpu.line_width(self.line_width);

        array_object.bind(gpu);
        gpu.draw_arrays(glow::LINES, 0, 2);
        ArrayObject::unbind(gpu);
    }

    fn layer(&self) -> i32 {
        self.layer
    }

    fn depth(&self) -> f32 {
        self.depth
    }
}

impl Drop for Line {
    fn drop(&mut self) {
        if let Some(array_object) = self.array_object.take() {
            self.queue.run(move |paint_data| {
                array_object.delete(&*paint_data.gpu);
            });
        }
    }
}
