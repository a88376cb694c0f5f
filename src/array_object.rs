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

use crate::gpu::{Gpu, check_gl_error};
use crate::shaders::POSITION_ATTRIB;

/// A vertex array with a single float vertex buffer bound to the
/// position attribute. The handles are plain ids so that the object
/// can be owned by a shape on any thread, but it must only be used
/// and deleted on the render thread.
#[derive(Debug)]
pub struct ArrayObject {
    vertex_array: glow::VertexArray,
    buffer: glow::Buffer,
    components: i32,
}

impl ArrayObject {
    pub fn new(
        gpu: &dyn Gpu,
        vertices: &[f32],
        components: i32,
    ) -> Result<ArrayObject, String> {
        let vertex_array = gpu.create_vertex_array()?;

        let buffer = match gpu.create_buffer() {
            Ok(buffer) => buffer,
            Err(e) => {
                gpu.delete_vertex_array(vertex_array);
                return Err(e);
            },
        };

        let array_object = ArrayObject { vertex_array, buffer, components };

        let mut error = check_gl_error(gpu, "glGenBuffers");

        error |= array_object.upload(gpu, vertices);

        gpu.bind_vertex_array(Some(vertex_array));
        error |= check_gl_error(gpu, "glBindVertexArray");
        gpu.bind_buffer(glow::ARRAY_BUFFER, Some(buffer));
        error |= check_gl_error(gpu, "glBindBuffer");
        gpu.vertex_attrib_pointer_f32(
            POSITION_ATTRIB,
            components,
            glow::FLOAT,
            false, // normalized
            components * std::mem::size_of::<f32>() as i32,
            0, // offset
        );
        error |= check_gl_error(gpu, "glVertexAttribPointer");
        gpu.bind_buffer(glow::ARRAY_BUFFER, None);
        error |= check_gl_error(gpu, "glBindBuffer");
        gpu.bind_vertex_array(None);
        error |= check_gl_error(gpu, "glBindVertexArray");

        if error {
            array_object.delete(gpu);
            Err("GL error while creating the vertex array".to_string())
        } else {
            Ok(array_object)
        }
    }

    /// Replaces the contents of the vertex buffer. Returns true if a GL
    /// error occurred.
    pub fn upload(&self, gpu: &dyn Gpu, vertices: &[f32]) -> bool {
        debug_assert_eq!(vertices.len() % self.components as usize, 0);

        gpu.bind_buffer(glow::ARRAY_BUFFER, Some(self.buffer));
        let mut error = check_gl_error(gpu, "glBindBuffer");
        gpu.buffer_data_u8_slice(
            glow::ARRAY_BUFFER,
            bytemuck::cast_slice(vertices),
            glow::STATIC_DRAW,
        );
        error |= check_gl_error(gpu, "glBufferData");
        gpu.bind_buffer(glow::ARRAY_BUFFER, None);

        error
    }

    pub fn bind(&self, gpu: &dyn Gpu) {
        gpu.bind_vertex_array(Some(self.vertex_array));
        gpu.enable_vertex_attrib_array(POSITION_ATTRIB);
    }

    pub fn unbind(gpu: &dyn Gpu) {
        gpu.bind_vertex_array(None);
        gpu.disable_vertex_attrib_array(POSITION_ATTRIB);
    }

    pub fn delete(self, gpu: &dyn Gpu) {
        gpu.delete_buffer(self.buffer);
        gpu.delete_vertex_array(self.vertex_array);
    }
}
