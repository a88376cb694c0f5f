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

//! The subset of OpenGL ES that the engine uses.
//!
//! Every GPU call goes through [`Gpu`] so that the renderer only ever
//! needs a `Rc<dyn Gpu>`. The real implementation forwards to
//! [`glow::Context`]. The methods are safe to call as long as the
//! context is current on the calling thread, which the render thread
//! guarantees.

use glow::HasContext;

pub trait Gpu {
    fn create_texture(&self) -> Result<glow::Texture, String>;
    fn delete_texture(&self, texture: glow::Texture);
    fn bind_texture(&self, target: u32, texture: Option<glow::Texture>);
    fn active_texture(&self, unit: u32);
    fn tex_parameter_i32(&self, target: u32, parameter: u32, value: i32);
    #[allow(clippy::too_many_arguments)]
    fn tex_image_2d(
        &self,
        target: u32,
        level: i32,
        internal_format: i32,
        width: i32,
        height: i32,
        format: u32,
        ty: u32,
        pixels: Option<&[u8]>,
    );
    fn pixel_store_i32(&self, parameter: u32, value: i32);

    fn create_vertex_array(&self) -> Result<glow::VertexArray, String>;
    fn delete_vertex_array(&self, vertex_array: glow::VertexArray);
    fn bind_vertex_array(&self, vertex_array: Option<glow::VertexArray>);
    fn create_buffer(&self) -> Result<glow::Buffer, String>;
    fn delete_buffer(&self, buffer: glow::Buffer);
    fn bind_buffer(&self, target: u32, buffer: Option<glow::Buffer>);
    fn buffer_data_u8_slice(&self, target: u32, data: &[u8], usage: u32);
    fn vertex_attrib_pointer_f32(
        &self,
        index: u32,
        size: i32,
        data_type: u32,
        normalized: bool,
        stride: i32,
        offset: i32,
    );
    fn enable_vertex_attrib_array(&self, index: u32);
    fn disable_vertex_attrib_array(&self, index: u32);

    fn create_shader(&self, shader_type: u32) -> Result<glow::Shader, String>;
    fn shader_source(&self, shader: glow::Shader, source: &str);
    fn compile_shader(&self, shader: glow::Shader);
    fn get_shader_compile_status(&self, shader: glow::Shader) -> bool;
    fn get_shader_info_log(&self, shader: glow::Shader) -> String;
    fn delete_shader(&self, shader: glow::Shader);
    fn create_program(&self) -> Result<glow::Program, String>;
    fn attach_shader(&self, program: glow::Program, shader: glow::Shader);
    fn link_program(&self, program: glow::Program);
    fn get_program_link_status(&self, program: glow::Program) -> bool;
    fn get_program_info_log(&self, program: glow::Program) -> String;
    fn delete_program(&self, program: glow::Program);
    fn use_program(&self, program: Option<glow::Program>);
    fn get_uniform_location(
        &self,
        program: glow::Program,
        name: &str,
    ) -> Option<glow::UniformLocation>;

    fn uniform_1_i32(&self, location: Option<&glow::UniformLocation>, x: i32);
    fn uniform_1_f32(&self, location: Option<&glow::UniformLocation>, x: f32);
    fn uniform_3_f32(
        &self,
        location: Option<&glow::UniformLocation>,
        x: f32,
        y: f32,
        z: f32,
    );
    fn uniform_4_f32(
        &self,
        location: Option<&glow::UniformLocation>,
        x: f32,
        y: f32,
        z: f32,
        w: f32,
    );
    fn uniform_matrix_4_f32_slice(
        &self,
        location: Option<&glow::UniformLocation>,
        transpose: bool,
        v: &[f32],
    );

    fn line_width(&self, width: f32);
    fn draw_arrays(&self, mode: u32, first: i32, count: i32);
    fn viewport(&self, x: i32, y: i32, width: i32, height: i32);
    fn clear_color(&self, red: f32, green: f32, blue: f32, alpha: f32);
    fn clear(&self, mask: u32);
    fn enable(&self, parameter: u32);
    fn blend_func(&self, src: u32, dst: u32);
    fn get_error(&self) -> u32;
}

/// Drains the GL error queue, logging each error against `op`.
/// Returns true if there was at least one error.
pub fn check_gl_error(gpu: &dyn Gpu, op: &str) -> bool {
    let mut is_error = false;

    loop {
        let error = gpu.get_error();

        if error == glow::NO_ERROR {
            break;
        }

        log::info!("after {}() glError (0x{:x})", op, error);
        is_error = true;
    }

    is_error
}

impl Gpu for glow::Context {
    fn create_texture(&self) -> Result<glow::Texture, String> {
        unsafe { HasContext::create_texture(self) }
    }

    fn delete_texture(&self, texture: glow::Texture) {
        unsafe { HasContext::delete_texture(self, texture) }
    }

    fn bind_texture(&self, target: u32, texture: Option<glow::Texture>) {
        unsafe { HasContext::bind_texture(self, target, texture) }
    }

    fn active_texture(&self, unit: u32) {
        unsafe { HasContext::active_texture(self, unit) }
    }

    fn tex_parameter_i32(&self, target: u32, parameter: u32, value: i32) {
        unsafe { HasContext::tex_parameter_i32(self, target, parameter, value) }
    }

    fn tex_image_2d(
        &self,
        target: u32,
        level: i32,
        internal_format: i32,
        width: i32,
        height: i32,
        format: u32,
        ty: u32,
        pixels: Option<&[u8]>,
    ) {
        unsafe {
            HasContext::tex_image_2d(
                self,
                target,
                level,
                internal_format,
                width,
                height,
                0, // border
                format,
                ty,
                pixels,
            )
        }
    }

    fn pixel_store_i32(&self, parameter: u32, value: i32) {
        unsafe { HasContext::pixel_store_i32(self, parameter, value) }
    }

    fn create_vertex_array(&self) -> Result<glow::VertexArray, String> {
        unsafe { HasContext::create_vertex_array(self) }
    }

    fn delete_vertex_array(&self, vertex_array: glow::VertexArray) {
        unsafe { HasContext::delete_vertex_array(self, vertex_array) }
    }

    fn bind_vertex_array(&self, vertex_array: Option<glow::VertexArray>) {
        unsafe { HasContext::bind_vertex_array(self, vertex_array) }
    }

    fn create_buffer(&self) -> Result<glow::Buffer, String> {
        unsafe { HasContext::create_buffer(self) }
    }

    fn delete_buffer(&self, buffer: glow::Buffer) {
        unsafe { HasContext::delete_buffer(self, buffer) }
    }

    fn bind_buffer(&self, target: u32, buffer: Option<glow::Buffer>) {
        unsafe { HasContext::bind_buffer(self, target, buffer) }
    }

    fn buffer_data_u8_slice(&self, target: u32, data: &[u8], usage: u32) {
        unsafe { HasContext::buffer_data_u8_slice(self, target, data, usage) }
    }

    fn vertex_attrib_pointer_f32(
        &self,
        index: u32,
        size: i32,
        data_type: u32,
        normalized: bool,
        stride: i32,
        offset: i32,
    ) {
        unsafe {
            HasContext::vertex_attrib_pointer_f32(
                self,
                index,
                size,
                data_type,
                normalized,
                stride,
                offset,
            )
        }
    }

    fn enable_vertex_attrib_array(&self, index: u32) {
        unsafe { HasContext::enable_vertex_attrib_array(self, index) }
    }

    fn disable_vertex_attrib_array(&self, index: u32) {
        unsafe { HasContext::disable_vertex_attrib_array(self, index) }
    }

    fn create_shader(&self, shader_type: u32) -> Result<glow::Shader, String> {
        unsafe { HasContext::create_shader(self, shader_type) }
    }

    fn shader_source(&self, shader: glow::Shader, source: &str) {
        unsafe { HasContext::shader_source(self, shader, source) }
    }

    fn compile_shader(&self, shader: glow::Shader) {
        unsafe { HasContext::compile_shader(self, shader) }
    }

    fn get_shader_compile_status(&self, shader: glow::Shader) -> bool {
        unsafe { HasContext::get_shader_compile_status(self, shader) }
    }

    fn get_shader_info_log(&self, shader: glow::Shader) -> String {
        unsafe { HasContext::get_shader_info_log(self, shader) }
    }

    fn delete_shader(&self, shader: glow::Shader) {
        unsafe { HasContext::delete_shader(self, shader) }
    }

    fn create_program(&self) -> Result<glow::Program, String> {
        unsafe { HasContext::create_program(self) }
    }

    fn attach_shader(&self, program: glow::Program, shader: glow::Shader) {
        unsafe { HasContext::attach_shader(self, program, shader) }
    }

    fn link_program(&self, program: glow::Program) {
        unsafe { HasContext::link_program(self, program) }
    }

    fn get_program_link_status(&self, program: glow::Program) -> bool {
        unsafe { HasContext::get_program_link_status(self, program) }
    }

    fn get_program_info_log(&self, program: glow::Program) -> String {
        unsafe { HasContext::get_program_info_log(self, program) }
    }

    fn delete_program(&self, program: glow::Program) {
        unsafe { HasContext::delete_program(self, program) }
    }

    fn use_program(&self, program: Option<glow::Program>) {
        unsafe { HasContext::use_program(self, program) }
    }

    fn get_uniform_location(
        &self,
        program: glow::Program,
        name: &str,
    ) -> Option<glow::UniformLocation> {
        unsafe { HasContext::get_uniform_location(self, program, name) }
    }

    fn uniform_1_i32(&self, location: Option<&glow::UniformLocation>, x: i32) {
        unsafe { HasContext::uniform_1_i32(self, location, x) }
    }

    fn uniform_1_f32(&self, location: Option<&glow::UniformLocation>, x: f32) {
        unsafe { HasContext::uniform_1_f32(self, location, x) }
    }

    fn uniform_3_f32(
        &self,
        location: Option<&glow::UniformLocation>,
        x: f32,
        y: f32,
        z: f32,
    ) {
        unsafe { HasContext::uniform_3_f32(self, location, x, y, z) }
    }

    fn uniform_4_f32(
        &self,
        location: Option<&glow::UniformLocation>,
        x: f32,
        y: f32,
        z: f32,
        w: f32,
    ) {
        unsafe { HasContext::uniform_4_f32(self, location, x, y, z, w) }
    }

    fn uniform_matrix_4_f32_slice(
        &self,
        location: Option<&glow::UniformLocation>,
        transpose: bool,
        v: &[f32],
    ) {
        unsafe {
            HasContext::uniform_matrix_4_f32_slice(self, location, transpose, v)
        }
    }

    fn line_width(&self, width: f32) {
        unsafe { HasContext::line_width(self, width) }
    }

    fn draw_arrays(&self, mode: u32, first: i32, count: i32) {
        unsafe { HasContext::draw_arrays(self, mode, first, count) }
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        unsafe { HasContext::viewport(self, x, y, width, height) }
    }

    fn clear_color(&self, red: f32, green: f32, blue: f32, alpha: f32) {
        unsafe { HasContext::clear_color(self, red, green, blue, alpha) }
    }

    fn clear(&self, mask: u32) {
        unsafe { HasContext::clear(self, mask) }
    }

    fn enable(&self, parameter: u32) {
        unsafe { HasContext::enable(self, parameter) }
    }

    fn blend_func(&self, src: u32, dst: u32) {
        unsafe { HasContext::blend_func(self, src, dst) }
    }

    fn get_error(&self) -> u32 {
        unsafe { HasContext::get_error(self) }
    }
}
