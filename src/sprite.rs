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
use nalgebra::{Matrix4, Vector2, Vector3};
use crate::array_object::ArrayObject;
use crate::paint_data::PaintData;
use crate::render_queue::RenderQueue;
use crate::shaders::{self, SpriteProgramKind};
use crate::shape::Shape;
use crate::texture::Texture;

const N_VERTICES: i32 = 6;
// x, y, s, t
const VERTEX_COMPONENTS: i32 = 4;

/// Texture coordinates of one cell of a sprite sheet.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct UvRect {
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
}

/// Works out the texture coordinates of the cell at `col`, `row` in a
/// texture divided into a `cols` × `rows` grid. Each edge is pulled in
/// by half a texel so that linear filtering never samples the
/// neighbouring cell.
pub fn grid_uv_rect(
    texture_width: u32,
    texture_height: u32,
    cols: u32,
    rows: u32,
    col: u32,
    row: u32,
) -> UvRect {
    if texture_width == 0 || texture_height == 0 || cols == 0 || rows == 0 {
        return UvRect::default();
    }

    // A grid finer than the texture still gets one texel per cell
    let cell_width = (texture_width / cols).max(1);
    let cell_height = (texture_height / rows).max(1);

    let cell_left = (cell_width * col).min(texture_width - cell_width);
    let cell_right = cell_left + cell_width;
    let cell_bottom = (cell_height * row).min(texture_height - cell_height);
    let cell_top = cell_bottom + cell_height;

    let width = texture_width as f32;
    let height = texture_height as f32;

    UvRect {
        left: (cell_left as f32 + 0.5) / width,
        right: (cell_right as f32 - 0.5) / width,
        bottom: (cell_bottom as f32 + 0.5) / height,
        top: (cell_top as f32 - 0.5) / height,
    }
}

fn quad_vertices(uv: &UvRect) -> [f32; (N_VERTICES * VERTEX_COMPONENTS) as usize] {
    [
        -0.5, 0.5, uv.left, uv.top,
        0.5, -0.5, uv.right, uv.bottom,
        -0.5, -0.5, uv.left, uv.bottom,
        -0.5, 0.5, uv.left, uv.top,
        0.5, 0.5, uv.right, uv.top,
        0.5, -0.5, uv.right, uv.bottom,
    ]
}

/// A textured quad centred on its position. The texture can be split
/// into a grid of frames of which one is shown at a time.
pub struct Sprite {
    queue: RenderQueue,
    texture: Option<Arc<Texture>>,
    position: Vector2<f32>,
    size: Vector2<f32>,
    rotation: f32,
    opacity: f32,
    colorize: Vector3<f32>,
    layer: i32,
    depth: f32,
    visible: bool,
    grid_cols: u32,
    grid_rows: u32,
    grid_col: u32,
    grid_row: u32,
    array_object: Option<ArrayObject>,
    // The geometry needs rebuilding before the next draw
    dirty: bool,
}

impl Sprite {
    pub fn new(
        queue: RenderQueue,
        texture: Option<Arc<Texture>>,
        grid_cols: u32,
        grid_rows: u32,
    ) -> Sprite {
        let sprite = Sprite {
            queue,
            texture,
            position: Vector2::zeros(),
            size: Vector2::new(1.0, 1.0),
            rotation: 0.0,
            opacity: 1.0,
            colorize: Vector3::new(1.0, 1.0, 1.0),
            layer: 0,
            depth: 0.0,
            visible: false,
            grid_cols: grid_cols.max(1),
            grid_rows: grid_rows.max(1),
            grid_col: 0,
            grid_row: 0,
            array_object: None,
            dirty: false,
        };

        sprite.check_grid();

        sprite
    }

    fn check_grid(&self) {
        let Some(texture) = self.texture.as_ref()
        else {
            return;
        };

        if !texture.is_loaded() {
            return;
        }

        if texture.width() < self.grid_cols || texture.height() < self.grid_rows {
            log::warn!(
                "{}×{} texture is too small for a {}×{} grid",
                texture.width(),
                texture.height(),
                self.grid_cols,
                self.grid_rows,
            );
        }
    }

    pub fn uv_rect(&self) -> UvRect {
        let Some(texture) = self.texture.as_ref()
        else {
            return UvRect::default();
        };

        grid_uv_rect(
            texture.width(),
            texture.height(),
            self.grid_cols,
            self.grid_rows,
            self.grid_col,
            self.grid_row,
        )
    }

    fn prepare(&mut self, paint_data: &PaintData) -> Result<(), String> {
        let vertices = quad_vertices(&self.uv_rect());

        let array_object = ArrayObject::new(
            &*paint_data.gpu,
            &vertices,
            VERTEX_COMPONENTS,
        )?;

        self.array_object = Some(array_object);

        Ok(())
    }

    fn release_buffers(&mut self, paint_data: &PaintData) {
        if let Some(array_object) = self.array_object.take() {
            array_object.delete(&*paint_data.gpu);
        }
    }

    fn model_matrix(&self, model: &Matrix4<f32>) -> Matrix4<f32> {
        model
            * Matrix4::new_translation(&Vector3::new(
                self.position.x,
                self.position.y,
                0.0,
            ))
            * Matrix4::new_rotation(Vector3::new(0.0, 0.0, self.rotation))
            * Matrix4::new_nonuniform_scaling(&Vector3::new(
                self.size.x,
                self.size.y,
                1.0,
            ))
    }

    pub fn is_prepared(&self) -> bool {
        self.array_object.is_some()
    }

    pub fn texture(&self) -> Option<&Arc<Texture>> {
        self.texture.as_ref()
    }

    pub fn set_texture(&mut self, texture: Option<Arc<Texture>>) {
        self.texture = texture;
        self.check_grid();
        // The texture coordinates depend on its size
        self.dirty = true;
    }

    pub fn position(&self) -> Vector2<f32> {
        self.position
    }

    pub fn set_position(&mut self, position: Vector2<f32>) {
        self.position = position;
    }

    pub fn size(&self) -> Vector2<f32> {
        self.size
    }

    pub fn set_size(&mut self, size: Vector2<f32>) {
        self.size = size;
    }

    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    pub fn set_rotation(&mut self, rotation: f32) {
        self.rotation = rotation;
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = opacity.clamp(0.0, 1.0);
    }

    pub fn colorize(&self) -> Vector3<f32> {
        self.colorize
    }

    pub fn set_colorize(&mut self, colorize: Vector3<f32>) {
        self.colorize = colorize;
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

    pub fn grid_cols(&self) -> u32 {
        self.grid_cols
    }

    pub fn grid_rows(&self) -> u32 {
        self.grid_rows
    }

    pub fn grid_col(&self) -> u32 {
        self.grid_col
    }

    pub fn grid_row(&self) -> u32 {
        self.grid_row
    }

    /// Selects the sprite sheet frame to show. The geometry is only
    /// rebuilt at the next draw.
    pub fn set_grid_index(&mut self, col: u32, row: u32) {
        if col >= self.grid_cols || row >= self.grid_rows {
            log::warn!(
                "Grid index ({}, {}) is out of range for a {}×{} sprite",
                col,
                row,
                self.grid_cols,
                self.grid_rows,
            );
            return;
        }

        if col == self.grid_col && row == self.grid_row {
            return;
        }

        self.grid_col = col;
        self.grid_row = row;
        self.dirty = true;
    }
}

impl Shape for Sprite {
    fn draw(
        &mut self,
        paint_data: &PaintData,
        projection: &Matrix4<f32>,
        model: &Matrix4<f32>,
    ) {
        if !self.visible {
            return;
        }

        if self.dirty {
            self.release_buffers(paint_data);
            self.dirty = false;
        }

        if self.array_object.is_none() {
            if let Err(e) = self.prepare(paint_data) {
                log::warn!("Failed to prepare sprite: {}", e);
                return;
            }
        }

        let Some(array_object) = self.array_object.as_ref()
        else {
            return;
        };

        let gpu = &*paint_data.gpu;

        if let Some(texture) = self.texture.as_ref() {
            gpu.active_texture(glow::TEXTURE0);

            if !texture.bind(paint_data) {
                log::debug!("Skipping sprite with an unusable texture");
                return;
            }
        }

        let kind = SpriteProgramKind::select(self.opacity, &self.colorize);

        let Some(program) = paint_data.shaders.sprite_program(kind)
        else {
            log::warn!("No {:?} sprite program available", kind);
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

        if !shaders::is_opaque(self.opacity) {
            gpu.uniform_1_f32(program.opaque.as_ref(), self.opacity);
        }

        if !shaders::is_white(&self.colorize) {
            gpu.uniform_3_f32(
                program.colorize.as_ref(),
                self.colorize.x,
                self.colorize.y,
                self.colorize.z,
            );
        }

        array_object.bind(gpu);

        gpu.draw_arrays(glow::TRIANGLES, 0, N_VERTICES);

        ArrayObject::unbind(gpu);
    }

    fn layer(&self) -> i32 {
        self.layer
    }

    fn depth(&self) -> f32 {
        self.depth
    }
}

impl Drop for Sprite {
    fn drop(&mut self) {
        if let Some(array_object) = self.array_object.take() {
            self.queue.run(move |paint_data| {
                array_object.delete(&*paint_data.gpu);
            });
        }
    }
}
