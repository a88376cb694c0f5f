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

use std::path::{Path, PathBuf};
use std::sync::Arc;
use parking_lot::Mutex;
use crate::gpu::{Gpu, check_gl_error};
use crate::paint_data::PaintData;
use crate::render_queue::RenderQueue;

#[derive(Debug, thiserror::Error)]
pub enum TextureError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("image has no pixels")]
    Empty,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wrap {
    ClampToEdge,
    Repeat,
    MirroredRepeat,
}

impl Wrap {
    fn gl(self) -> i32 {
        (match self {
            Wrap::ClampToEdge => glow::CLAMP_TO_EDGE,
            Wrap::Repeat => glow::REPEAT,
            Wrap::MirroredRepeat => glow::MIRRORED_REPEAT,
        }) as i32
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Filter {
    Nearest,
    Linear,
}

impl Filter {
    fn gl(self) -> i32 {
        (match self {
            Filter::Nearest => glow::NEAREST,
            Filter::Linear => glow::LINEAR,
        }) as i32
    }
}

#[derive(Clone, Copy, Debug)]
struct Parameters {
    wrap_s: Wrap,
    wrap_t: Wrap,
    filter_min: Filter,
    filter_mag: Filter,
}

struct Image {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

struct State {
    id: Option<glow::Texture>,
    // Decoded pixels waiting to be uploaded
    pixels: Option<Vec<u8>>,
}

/// A single GPU texture image. The pixels are decoded on whichever
/// thread creates the texture and uploaded later on the render thread.
/// The GL texture is deleted when the last reference is dropped.
pub struct Texture {
    queue: RenderQueue,
    width: u32,
    height: u32,
    alpha: bool,
    smooth: bool,
    loaded: bool,
    parameters: Mutex<Parameters>,
    state: Mutex<State>,
}

fn decode(bytes: &[u8], alpha: bool) -> Result<Image, TextureError> {
    let image = image::load_from_memory(bytes)?;

    let (width, height) = (image.width(), image.height());

    if width == 0 || height == 0 {
        return Err(TextureError::Empty);
    }

    let pixels = if alpha {
        image.into_rgba8().into_raw()
    } else {
        image.into_rgb8().into_raw()
    };

    Ok(Image { width, height, pixels })
}

fn read_file(path: &Path) -> Result<Vec<u8>, TextureError> {
    std::fs::read(path).map_err(|source| TextureError::Io {
        path: path.to_owned(),
        source,
    })
}

impl Texture {
    pub fn from_file<P: AsRef<Path>>(
        queue: RenderQueue,
        path: P,
        alpha: bool,
        smooth: bool,
    ) -> Arc<Texture> {
        let path = path.as_ref();

        let image = read_file(path).and_then(|bytes| decode(&bytes, alpha));

        if let Err(ref e) = image {
            log::error!("Failed to load {}: {}", path.display(), e);
        }

        Texture::with_image(queue, image.ok(), alpha, smooth)
    }

    pub fn from_memory(
        queue: RenderQueue,
        bytes: &[u8],
        alpha: bool,
        smooth: bool,
    ) -> Arc<Texture> {
        let image = decode(bytes, alpha);

        if let Err(ref e) = image {
            log::error!("Failed to load image from memory: {}", e);
        }

        Texture::with_image(queue, image.ok(), alpha, smooth)
    }

    fn with_image(
        queue: RenderQueue,
        image: Option<Image>,
        alpha: bool,
        smooth: bool,
    ) -> Arc<Texture> {
        let filter = if smooth { Filter::Linear } else { Filter::Nearest };

        let (width, height, pixels) = match image {
            Some(Image { width, height, pixels }) => {
                (width, height, Some(pixels))
            },
            None => (0, 0, None),
        };

        let texture = Arc::new(Texture {
            queue,
            width,
            height,
            alpha,
            smooth,
            loaded: pixels.is_some(),
            parameters: Mutex::new(Parameters {
                wrap_s: Wrap::ClampToEdge,
                wrap_t: Wrap::ClampToEdge,
                filter_min: filter,
                filter_mag: filter,
            }),
            state: Mutex::new(State { id: None, pixels }),
        });

        if texture.loaded {
            let pending = Arc::clone(&texture);
            texture.queue.run(move |paint_data| {
                pending.prepare(paint_data);
            });
        }

        texture
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn has_alpha(&self) -> bool {
        self.alpha
    }

    pub fn is_smooth(&self) -> bool {
        self.smooth
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_prepared(&self) -> bool {
        self.state.lock().id.is_some()
    }

    pub fn id(&self) -> Option<glow::Texture> {
        self.state.lock().id
    }

    pub fn wrap_s(&self) -> Wrap {
        self.parameters.lock().wrap_s
    }

    pub fn set_wrap_s(&self, wrap: Wrap) {
        self.parameters.lock().wrap_s = wrap;
    }

    pub fn wrap_t(&self) -> Wrap {
        self.parameters.lock().wrap_t
    }

    pub fn set_wrap_t(&self, wrap: Wrap) {
        self.parameters.lock().wrap_t = wrap;
    }

    pub fn filter_min(&self) -> Filter {
        self.parameters.lock().filter_min
    }

    pub fn set_filter_min(&self, filter: Filter) {
        self.parameters.lock().filter_min = filter;
    }

    pub fn filter_mag(&self) -> Filter {
        self.parameters.lock().filter_mag
    }

    pub fn set_filter_mag(&self, filter: Filter) {
        self.parameters.lock().filter_mag = filter;
    }

    fn format(&self) -> u32 {
        if self.alpha {
            glow::RGBA
        } else {
            glow::RGB
        }
    }

    fn apply_parameters(&self, gpu: &dyn Gpu) {
        let parameters = *self.parameters.lock();

        gpu.tex_parameter_i32(
            glow::TEXTURE_2D,
            glow::TEXTURE_WRAP_S,
            parameters.wrap_s.gl(),
        );
        gpu.tex_parameter_i32(
            glow::TEXTURE_2D,
            glow::TEXTURE_WRAP_T,
            parameters.wrap_t.gl(),
        );
        gpu.tex_parameter_i32(
            glow::TEXTURE_2D,
            glow::TEXTURE_MIN_FILTER,
            parameters.filter_min.gl(),
        );
        gpu.tex_parameter_i32(
            glow::TEXTURE_2D,
            glow::TEXTURE_MAG_FILTER,
            parameters.filter_mag.gl(),
        );
    }

    /// Uploads the decoded pixels if that hasn’t happened yet. Must be
    /// called on the render thread. Returns whether the texture is
    /// ready to bind. The pixels are released whether or not the
    /// upload worked.
    pub fn prepare(&self, paint_data: &PaintData) -> bool {
        let mut state = self.state.lock();

        if state.id.is_some() {
            return true;
        }

        if !self.loaded {
            return false;
        }

        let Some(pixels) = state.pixels.take()
        else {
            return false;
        };

        let gpu = &*paint_data.gpu;

        let id = match gpu.create_texture() {
            Ok(id) => id,
            Err(e) => {
                log::warn!("Failed to create texture: {}", e);
                return false;
            },
        };

        let mut error = check_gl_error(gpu, "glGenTextures");

        gpu.bind_texture(glow::TEXTURE_2D, Some(id));
        error |= check_gl_error(gpu, "glBindTexture");

        // RGB rows aren’t necessarily a multiple of four bytes
        gpu.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);

        gpu.tex_image_2d(
            glow::TEXTURE_2D,
            0, // level
            self.format() as i32,
            self.width as i32,
            self.height as i32,
            self.format(),
            glow::UNSIGNED_BYTE,
            Some(&pixels),
        );
        error |= check_gl_error(gpu, "glTexImage2D");

        self.apply_parameters(gpu);
        error |= check_gl_error(gpu, "glTexParameteri");

        gpu.bind_texture(glow::TEXTURE_2D, None);
        error |= check_gl_error(gpu, "glBindTexture");

        if error {
            log::warn!("Failed to prepare texture");
            gpu.delete_texture(id);
            false
        } else {
            state.id = Some(id);
            true
        }
    }

    /// Binds the texture to the active unit, uploading it first if
    /// needed. The wrap and filter modes are set again every time
    /// because nothing else tracks them.
    pub fn bind(&self, paint_data: &PaintData) -> bool {
        if !self.prepare(paint_data) {
            return false;
        }

        let Some(id) = self.id()
        else {
            return false;
        };

        let gpu = &*paint_data.gpu;

        gpu.bind_texture(glow::TEXTURE_2D, Some(id));
        self.apply_parameters(gpu);

        true
    }

    /// Schedules deletion of the GL texture. Calling it again or on a
    /// texture that was never uploaded does nothing.
    pub fn cleanup(&self) {
        if let Some(id) = self.state.lock().id.take() {
            self.queue.run(move |paint_data| {
                paint_data.gpu.delete_texture(id);
            });
        }
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        self.cleanup();
    }
}
