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

//! A [`Gpu`] that records every call instead of talking to a driver.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::num::NonZeroU32;
use std::rc::Rc;
use std::sync::Arc;
use parking_lot::Mutex;
use crate::gpu::Gpu;
use crate::paint_data::PaintData;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateTexture(u32),
    DeleteTexture(u32),
    BindTexture(Option<u32>),
    ActiveTexture(u32),
    TexParameter(u32, i32),
    TexImage2D {
        internal_format: i32,
        width: i32,
        height: i32,
        format: u32,
        n_bytes: usize,
    },
    PixelStore(u32, i32),
    CreateVertexArray(u32),
    DeleteVertexArray(u32),
    BindVertexArray(Option<u32>),
    CreateBuffer(u32),
    DeleteBuffer(u32),
    BindBuffer(u32, Option<u32>),
    BufferData(Vec<f32>),
    VertexAttribPointer { index: u32, size: i32, stride: i32 },
    EnableVertexAttribArray(u32),
    DisableVertexAttribArray(u32),
    CreateShader(u32),
    DeleteShader(u32),
    CreateProgram(u32),
    DeleteProgram(u32),
    UseProgram(Option<u32>),
    Uniform1i(String, i32),
    Uniform1f(String, f32),
    Uniform3f(String, [f32; 3]),
    Uniform4f(String, [f32; 4]),
    UniformMatrix4(String, [f32; 16]),
    LineWidth(f32),
    DrawArrays { mode: u32, first: i32, count: i32 },
    Viewport(i32, i32, i32, i32),
    ClearColor([f32; 4]),
    Clear(u32),
    Enable(u32),
    BlendFunc(u32, u32),
}

/// Calls shared between the thread owning the [`TestGpu`] and the test.
#[derive(Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl CallLog {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| predicate(c)).count()
    }

    pub fn contains(&self, call: &Call) -> bool {
        self.calls.lock().iter().any(|c| c == call)
    }

    fn push(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

pub struct TestGpu {
    log: CallLog,
    next_id: Cell<u32>,
    errors: RefCell<VecDeque<u32>>,
    // Any shader whose source contains this string fails to compile
    broken_shader_marker: RefCell<Option<String>>,
    shader_sources: RefCell<Vec<(u32, String)>>,
    // Maps uniform location ids back to their names
    uniform_names: RefCell<Vec<String>>,
}

fn nonzero(id: u32) -> NonZeroU32 {
    NonZeroU32::new(id).expect("handles start at 1")
}

impl TestGpu {
    pub fn new() -> TestGpu {
        TestGpu::with_log(CallLog::default())
    }

    pub fn with_log(log: CallLog) -> TestGpu {
        TestGpu {
            log,
            next_id: Cell::new(1),
            errors: RefCell::new(VecDeque::new()),
            broken_shader_marker: RefCell::new(None),
            shader_sources: RefCell::new(Vec::new()),
            uniform_names: RefCell::new(Vec::new()),
        }
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    pub fn push_error(&self, error: u32) {
        self.errors.borrow_mut().push_back(error);
    }

    pub fn break_shaders_containing(&self, marker: &str) {
        self.broken_shader_marker.replace(Some(marker.to_string()));
    }

    fn next_id(&self) -> u32 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    fn uniform_name(&self, location: Option<&glow::UniformLocation>) -> String {
        match location {
            Some(location) => self.uniform_names.borrow()
                .get(location.0 as usize)
                .cloned()
                .unwrap_or_default(),
            None => "<none>".to_string(),
        }
    }
}

/// Creates paint data around a fresh [`TestGpu`]. The GPU is returned
/// too so that tests can inject errors and inspect the calls.
pub fn paint_data() -> (Rc<PaintData>, Rc<TestGpu>) {
    let gpu = Rc::new(TestGpu::new());
    let paint_data = PaintData::new(Rc::clone(&gpu) as Rc<dyn Gpu>);

    (Rc::new(paint_data), gpu)
}

/// Encodes a small RGBA image as PNG, useful as a texture source.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([x as u8, y as u8, 128, 255])
    });

    let mut bytes = Vec::new();

    image::DynamicImage::ImageRgba8(image).write_to(
        &mut std::io::Cursor::new(&mut bytes),
        image::ImageFormat::Png,
    ).expect("encoding to memory can’t fail");

    bytes
}

impl Gpu for TestGpu {
    fn create_texture(&self) -> Result<glow::Texture, String> {
        let id = self.next_id();
        self.log.push(Call::CreateTexture(id));
        Ok(glow::NativeTexture(nonzero(id)))
    }

    fn delete_texture(&self, texture: glow::Texture) {
        self.log.push(Call::DeleteTexture(texture.0.get()));
    }

    fn bind_texture(&self, _target: u32, texture: Option<glow::Texture>) {
        self.log.push(Call::BindTexture(texture.map(|t| t.0.get())));
    }

    fn active_texture(&self, unit: u32) {
        self.log.push(Call::ActiveTexture(unit));
    }

    fn tex_parameter_i32(&self, _target: u32, parameter: u32, value: i32) {
        self.log.push(Call::TexParameter(parameter, value));
    }

    fn tex_image_2d(
        &self,
        _target: u32,
        _level: i32,
        internal_format: i32,
        width: i32,
        height: i32,
        format: u32,
        _ty: u32,
        pixels: Option<&[u8]>,
    ) {
        self.log.push(Call::TexImage2D {
            internal_format,
            width,
            height,
            format,
            n_bytes: pixels.map(|p| p.len()).unwrap_or(0),
        });
    }

    fn pixel_store_i32(&self, parameter: u32, value: i32) {
        self.log.push(Call::PixelStore(parameter, value));
    }

    fn create_vertex_array(&self) -> Result<glow::VertexArray, String> {
        let id = self.next_id();
        self.log.push(Call::CreateVertexArray(id));
        Ok(glow::NativeVertexArray(nonzero(id)))
    }

    fn delete_vertex_array(&self, vertex_array: glow::VertexArray) {
        self.log.push(Call::DeleteVertexArray(vertex_array.0.get()));
    }

    fn bind_vertex_array(&self, vertex_array: Option<glow::VertexArray>) {
        self.log.push(Call::BindVertexArray(vertex_array.map(|v| v.0.get())));
    }

    fn create_buffer(&self) -> Result<glow::Buffer, String> {
        let id = self.next_id();
        self.log.push(Call::CreateBuffer(id));
        Ok(glow::NativeBuffer(nonzero(id)))
    }

    fn delete_buffer(&self, buffer: glow::Buffer) {
        self.log.push(Call::DeleteBuffer(buffer.0.get()));
    }

    fn bind_buffer(&self, target: u32, buffer: Option<glow::Buffer>) {
        self.log.push(Call::BindBuffer(target, buffer.map(|b| b.0.get())));
    }

    fn buffer_data_u8_slice(&self, _target: u32, data: &[u8], _usage: u32) {
        let floats = data.chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        self.log.push(Call::BufferData(floats));
    }

    fn vertex_attrib_pointer_f32(
        &self,
        index: u32,
        size: i32,
        _data_type: u32,
        _normalized: bool,
        stride: i32,
        _offset: i32,
    ) {
        self.log.push(Call::VertexAttribPointer { index, size, stride });
    }

    fn enable_vertex_attrib_array(&self, index: u32) {
        self.log.push(Call::EnableVertexAttribArray(index));
    }

    fn disable_vertex_attrib_array(&self, index: u32) {
        self.log.push(Call::DisableVertexAttribArray(index));
    }

    fn create_shader(&self, _shader_type: u32) -> Result<glow::Shader, String> {
        let id = self.next_id();
        self.log.push(Call::CreateShader(id));
        Ok(glow::NativeShader(nonzero(id)))
    }

    fn shader_source(&self, shader: glow::Shader, source: &str) {
        self.shader_sources.borrow_mut().push((shader.0.get(), source.to_string()));
    }

    fn compile_shader(&self, _shader: glow::Shader) {
    }

    fn get_shader_compile_status(&self, shader: glow::Shader) -> bool {
        let marker = self.broken_shader_marker.borrow();

        let Some(marker) = marker.as_ref()
        else {
            return true;
        };

        !self.shader_sources.borrow().iter().any(|(id, source)| {
            *id == shader.0.get() && source.contains(marker.as_str())
        })
    }

    fn get_shader_info_log(&self, _shader: glow::Shader) -> String {
        "0:1: syntax error".to_string()
    }

    fn delete_shader(&self, shader: glow::Shader) {
        self.log.push(Call::DeleteShader(shader.0.get()));
    }

    fn create_program(&self) -> Result<glow::Program, String> {
        let id = self.next_id();
        self.log.push(Call::CreateProgram(id));
        Ok(glow::NativeProgram(nonzero(id)))
    }

    fn attach_shader(&self, _program: glow::Program, _shader: glow::Shader) {
    }

    fn link_program(&self, _program: glow::Program) {
    }

    fn get_program_link_status(&self, _program: glow::Program) -> bool {
        true
    }

    fn get_program_info_log(&self, _program: glow::Program) -> String {
        String::new()
    }

    fn delete_program(&self, program: glow::Program) {
        self.log.push(Call::DeleteProgram(program.0.get()));
    }

    fn use_program(&self, program: Option<glow::Program>) {
        self.log.push(Call::UseProgram(program.map(|p| p.0.get())));
    }

    fn get_uniform_location(
        &self,
        _program: glow::Program,
        name: &str,
    ) -> Option<glow::UniformLocation> {
        let mut names = self.uniform_names.borrow_mut();
        names.push(name.to_string());
        Some(glow::NativeUniformLocation(names.len() as u32 - 1))
    }

    fn uniform_1_i32(&self, location: Option<&glow::UniformLocation>, x: i32) {
        self.log.push(Call::Uniform1i(self.uniform_name(location), x));
    }

    fn uniform_1_f32(&self, location: Option<&glow::UniformLocation>, x: f32) {
        self.log.push(Call::Uniform1f(self.uniform_name(location), x));
    }

    fn uniform_3_f32(
        &self,
        location: Option<&glow::UniformLocation>,
        x: f32,
        y: f32,
        z: f32,
    ) {
        self.log.push(Call::Uniform3f(self.uniform_name(location), [x, y, z]));
    }

    fn uniform_4_f32(
        &self,
        location: Option<&glow::UniformLocation>,
        x: f32,
        y: f32,
        z: f32,
        w: f32,
    ) {
        self.log.push(Call::Uniform4f(
            self.uniform_name(location),
            [x, y, z, w],
        ));
    }

    fn uniform_matrix_4_f32_slice(
        &self,
        location: Option<&glow::UniformLocation>,
        _transpose: bool,
        v: &[f32],
    ) {
        let mut matrix = [0.0; 16];
        matrix.copy_from_slice(&v[0..16]);
        self.log.push(Call::UniformMatrix4(self.uniform_name(location), matrix));
    }

    fn line_width(&self, width: f32) {
        self.log.push(Call::LineWidth(width));
    }

    fn draw_arrays(&self, mode: u32, first: i32, count: i32) {
        self.log.push(Call::DrawArrays { mode, first, count });
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        self.log.push(Call::Viewport(x, y, width, height));
    }

    fn clear_color(&self, red: f32, green: f32, blue: f32, alpha: f32) {
        self.log.push(Call::ClearColor([red, green, blue, alpha]));
    }

    fn clear(&self, mask: u32) {
        self.log.push(Call::Clear(mask));
    }

    fn enable(&self, parameter: u32) {
        self.log.push(Call::Enable(parameter));
    }

    fn blend_func(&self, src: u32, dst: u32) {
        self.log.push(Call::BlendFunc(src, dst));
    }

    fn get_error(&self) -> u32 {
        self.errors.borrow_mut().pop_front().unwrap_or(glow::NO_ERROR)
    }
}
