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

use std::rc::Rc;
use std::cell::OnceCell;
use nalgebra::Vector3;
use crate::gpu::{Gpu, check_gl_error};

pub const POSITION_ATTRIB: u32 = 0;

const SPRITE_VERTEX_SHADER: &str = "\
#version 300 es

// xy is the position and zw is the texture coordinate
layout(location = 0) in vec4 vertex;
out vec2 tex_coord;

uniform mat4 model;
uniform mat4 projection;

void main()
{
    tex_coord = vertex.zw;
    gl_Position = projection * model * vec4(vertex.xy, 0.0, 1.0);
}
";

const SPRITE_FRAGMENT_OPAQUE: &str = "\
#version 300 es
precision mediump float;

in vec2 tex_coord;
out vec4 color;

uniform sampler2D image;

void main()
{
    color = texture(image, tex_coord);
}
";

const SPRITE_FRAGMENT_TRANSPARENT: &str = "\
#version 300 es
precision mediump float;

in vec2 tex_coord;
out vec4 color;

uniform sampler2D image;
uniform float opaque;

void main()
{
    color = texture(image, tex_coord);
    color.a *= opaque;
}
";

const SPRITE_FRAGMENT_OPAQUE_COLORIZE: &str = "\
#version 300 es
precision mediump float;

in vec2 tex_coord;
out vec4 color;

uniform sampler2D image;
uniform vec3 colorize;

void main()
{
    color = texture(image, tex_coord);
    color = vec4(color.rgb * colorize, color.a);
}
";

const SPRITE_FRAGMENT_TRANSPARENT_COLORIZE: &str = "\
#version 300 es
precision mediump float;

in vec2 tex_coord;
out vec4 color;

uniform sampler2D image;
uniform float opaque;
uniform vec3 colorize;

void main()
{
    color = texture(image, tex_coord);
    color = vec4(color.rgb * colorize, color.a * opaque);
}
";

const LINE_VERTEX_SHADER: &str = "\
#version 300 es

layout(location = 0) in vec2 position;

uniform mat4 model;
uniform mat4 projection;

void main()
{
    gl_Position = projection * model * vec4(position, 0.0, 1.0);
}
";

const LINE_FRAGMENT_SHADER: &str = "\
#version 300 es
precision mediump float;

out vec4 frag_color;

uniform vec4 color;

void main()
{
    frag_color = color;
}
";

pub struct Shader {
    id: glow::Shader,
    gpu: Rc<dyn Gpu>,
}

impl Shader {
    pub fn new(
        gpu: Rc<dyn Gpu>,
        shader_type: u32,
        source: &str,
    ) -> Result<Shader, String> {
        let id = gpu.create_shader(shader_type)?;

        gpu.shader_source(id, source);

        let shader = Shader { id, gpu };

        shader.compile()?;

        Ok(shader)
    }

    fn compile(&self) -> Result<(), String> {
        self.gpu.compile_shader(self.id);

        if self.gpu.get_shader_compile_status(self.id) {
            Ok(())
        } else {
            let mut log = self.gpu.get_shader_info_log(self.id);

            if log.len() > 0 {
                log.push_str("\n\n");
            }

            log.push_str("Shader failed to compile");

            Err(log)
        }
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        self.gpu.delete_shader(self.id);
    }
}

pub struct Program {
    id: glow::Program,
    gpu: Rc<dyn Gpu>,
}

impl Program {
    pub fn new(
        gpu: Rc<dyn Gpu>,
        shaders: &[Shader],
    ) -> Result<Program, String> {
        let id = gpu.create_program()?;

        for shader in shaders.iter() {
            gpu.attach_shader(id, shader.id);
        }

        let program = Program { id, gpu };

        program.link()?;

        if let Some(location) = program.gpu.get_uniform_location(
            program.id,
            "image",
        ) {
            program.gpu.use_program(Some(program.id));
            program.gpu.uniform_1_i32(Some(&location), 0);
        }

        Ok(program)
    }

    pub fn id(&self) -> glow::Program {
        self.id
    }

    pub fn uniform(&self, name: &str) -> Option<glow::UniformLocation> {
        let location = self.gpu.get_uniform_location(self.id, name);

        check_gl_error(&*self.gpu, "glGetUniformLocation");

        if location.is_none() {
            log::warn!("Missing “{}” uniform", name);
        }

        location
    }

    fn link(&self) -> Result<(), String> {
        self.gpu.link_program(self.id);

        if self.gpu.get_program_link_status(self.id) {
            Ok(())
        } else {
            let mut log = self.gpu.get_program_info_log(self.id);

            if log.len() > 0 {
                log.push_str("\n\n");
            }

            log.push_str("Program failed to link");

            Err(log)
        }
    }
}

impl Drop for Program {
    fn drop(&mut self) {
        self.gpu.delete_program(self.id);
    }
}

fn create_program(
    gpu: &Rc<dyn Gpu>,
    vertex_source: &str,
    fragment_source: &str,
) -> Result<Program, String> {
    let shaders = [
        Shader::new(Rc::clone(gpu), glow::VERTEX_SHADER, vertex_source)?,
        Shader::new(Rc::clone(gpu), glow::FRAGMENT_SHADER, fragment_source)?,
    ];

    Program::new(Rc::clone(gpu), &shaders)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpriteProgramKind {
    Opaque,
    OpaqueColorize,
    Transparent,
    TransparentColorize,
}

pub const N_SPRITE_PROGRAMS: usize = 4;

impl SpriteProgramKind {
    pub const ALL: [SpriteProgramKind; N_SPRITE_PROGRAMS] = [
        SpriteProgramKind::Opaque,
        SpriteProgramKind::OpaqueColorize,
        SpriteProgramKind::Transparent,
        SpriteProgramKind::TransparentColorize,
    ];

    pub fn select(opacity: f32, colorize: &Vector3<f32>) -> SpriteProgramKind {
        match (is_opaque(opacity), is_white(colorize)) {
            (true, true) => SpriteProgramKind::Opaque,
            (true, false) => SpriteProgramKind::OpaqueColorize,
            (false, true) => SpriteProgramKind::Transparent,
            (false, false) => SpriteProgramKind::TransparentColorize,
        }
    }

    pub fn uses_opacity(self) -> bool {
        matches!(
            self,
            SpriteProgramKind::Transparent
                | SpriteProgramKind::TransparentColorize
        )
    }

    pub fn uses_colorize(self) -> bool {
        matches!(
            self,
            SpriteProgramKind::OpaqueColorize
                | SpriteProgramKind::TransparentColorize
        )
    }

    fn fragment_source(self) -> &'static str {
        match self {
            SpriteProgramKind::Opaque => SPRITE_FRAGMENT_OPAQUE,
            SpriteProgramKind::OpaqueColorize => SPRITE_FRAGMENT_OPAQUE_COLORIZE,
            SpriteProgramKind::Transparent => SPRITE_FRAGMENT_TRANSPARENT,
            SpriteProgramKind::TransparentColorize => {
                SPRITE_FRAGMENT_TRANSPARENT_COLORIZE
            },
        }
    }
}

pub fn is_opaque(opacity: f32) -> bool {
    opacity == 1.0
}

pub fn is_white(color: &Vector3<f32>) -> bool {
    color.x == 1.0 && color.y == 1.0 && color.z == 1.0
}

pub struct SpriteProgram {
    pub program: Program,
    pub model: Option<glow::UniformLocation>,
    pub projection: Option<glow::UniformLocation>,
    pub opaque: Option<glow::UniformLocation>,
    pub colorize: Option<glow::UniformLocation>,
}

impl SpriteProgram {
    fn new(
        gpu: &Rc<dyn Gpu>,
        kind: SpriteProgramKind,
    ) -> Result<SpriteProgram, String> {
        let program = create_program(
            gpu,
            SPRITE_VERTEX_SHADER,
            kind.fragment_source(),
        )?;

        let model = program.uniform("model");
        let projection = program.uniform("projection");
        let opaque = if kind.uses_opacity() {
            program.uniform("opaque")
        } else {
            None
        };
        let colorize = if kind.uses_colorize() {
            program.uniform("colorize")
        } else {
            None
        };

        Ok(SpriteProgram {
            program,
            model,
            projection,
            opaque,
            colorize,
        })
    }
}

pub struct LineProgram {
    pub program: Program,
    pub model: Option<glow::UniformLocation>,
    pub projection: Option<glow::UniformLocation>,
    pub color: Option<glow::UniformLocation>,
}

impl LineProgram {
    fn new(gpu: &Rc<dyn Gpu>) -> Result<LineProgram, String> {
        let program = create_program(
            gpu,
            LINE_VERTEX_SHADER,
            LINE_FRAGMENT_SHADER,
        )?;

        let model = program.uniform("model");
        let projection = program.uniform("projection");
        let color = program.uniform("color");

        Ok(LineProgram { program, model, projection, color })
    }
}

/// The programs for every kind of shape. Each set is compiled the
/// first time it is needed and then kept for the lifetime of the GL
/// context. A program that fails to build leaves its slot empty but
/// doesn’t prevent the others from being stored.
pub struct Shaders {
    gpu: Rc<dyn Gpu>,
    sprite: OnceCell<[Option<SpriteProgram>; N_SPRITE_PROGRAMS]>,
    line: OnceCell<Option<LineProgram>>,
}

impl Shaders {
    pub fn new(gpu: Rc<dyn Gpu>) -> Shaders {
        Shaders {
            gpu,
            sprite: OnceCell::new(),
            line: OnceCell::new(),
        }
    }

    fn sprite_programs(&self) -> &[Option<SpriteProgram>; N_SPRITE_PROGRAMS] {
        self.sprite.get_or_init(|| {
            SpriteProgramKind::ALL.map(|kind| {
                match SpriteProgram::new(&self.gpu, kind) {
                    Ok(program) => Some(program),
                    Err(e) => {
                        log::error!(
                            "Failed to create {:?} sprite program: {}",
                            kind,
                            e,
                        );
                        check_gl_error(&*self.gpu, "createProgram");
                        None
                    },
                }
            })
        })
    }

    /// Returns true if all of the sprite programs are usable.
    pub fn init_sprite_programs(&self) -> bool {
        self.sprite_programs().iter().all(Option::is_some)
    }

    pub fn sprite_program(
        &self,
        kind: SpriteProgramKind,
    ) -> Option<&SpriteProgram> {
        self.sprite_programs()[kind as usize].as_ref()
    }

    pub fn init_line_program(&self) -> bool {
        self.line_program().is_some()
    }

    pub fn line_program(&self) -> Option<&LineProgram> {
        self.line.get_or_init(|| {
            match LineProgram::new(&self.gpu) {
                Ok(program) => Some(program),
                Err(e) => {
                    log::error!("Failed to create line program: {}", e);
                    check_gl_error(&*self.gpu, "createProgram");
                    None
                },
            }
        }).as_ref()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_gpu::{TestGpu, Call};

    #[test]
    fn program_selection() {
        let white = Vector3::new(1.0, 1.0, 1.0);
        let red = Vector3::new(1.0, 0.0, 0.0);

        assert_eq!(
            SpriteProgramKind::select(1.0, &white),
            SpriteProgramKind::Opaque,
        );
        assert_eq!(
            SpriteProgramKind::select(1.0, &red),
            SpriteProgramKind::OpaqueColorize,
        );
        assert_eq!(
            SpriteProgramKind::select(0.5, &white),
            SpriteProgramKind::Transparent,
        );
        assert_eq!(
            SpriteProgramKind::select(0.5, &red),
            SpriteProgramKind::TransparentColorize,
        );
        // Any channel differing from white counts as a tint
        assert_eq!(
            SpriteProgramKind::select(1.0, &Vector3::new(1.0, 1.0, 0.99)),
            SpriteProgramKind::OpaqueColorize,
        );
    }

    #[test]
    fn uniform_usage() {
        assert!(!SpriteProgramKind::Opaque.uses_opacity());
        assert!(!SpriteProgramKind::Opaque.uses_colorize());
        assert!(SpriteProgramKind::Transparent.uses_opacity());
        assert!(!SpriteProgramKind::Transparent.uses_colorize());
        assert!(!SpriteProgramKind::OpaqueColorize.uses_opacity());
        assert!(SpriteProgramKind::OpaqueColorize.uses_colorize());
        assert!(SpriteProgramKind::TransparentColorize.uses_opacity());
        assert!(SpriteProgramKind::TransparentColorize.uses_colorize());
    }

    #[test]
    fn all_programs() {
        let gpu = Rc::new(TestGpu::new());
        let log = gpu.log();
        let shaders = Shaders::new(gpu);

        assert!(shaders.init_sprite_programs());
        assert!(shaders.init_line_program());

        assert_eq!(
            log.count(|c| matches!(c, Call::CreateProgram(_))),
            N_SPRITE_PROGRAMS + 1,
        );

        // Initialising again doesn’t compile anything new
        assert!(shaders.init_sprite_programs());
        assert_eq!(
            log.count(|c| matches!(c, Call::CreateProgram(_))),
            N_SPRITE_PROGRAMS + 1,
        );

        // The intermediate shaders are released once linked
        assert_eq!(
            log.count(|c| matches!(c, Call::DeleteShader(_))),
            (N_SPRITE_PROGRAMS + 1) * 2,
        );
    }

    #[test]
    fn partial_failure() {
        let gpu = Rc::new(TestGpu::new());
        gpu.break_shaders_containing("uniform vec3 colorize");
        let shaders = Shaders::new(gpu);

        assert!(!shaders.init_sprite_programs());

        assert!(shaders.sprite_program(SpriteProgramKind::Opaque).is_some());
        assert!(
            shaders.sprite_program(SpriteProgramKind::Transparent).is_some()
        );
        assert!(
            shaders.sprite_program(SpriteProgramKind::OpaqueColorize).is_none()
        );
        assert!(
            shaders.sprite_program(
                SpriteProgramKind::TransparentColorize
            ).is_none()
        );

        // The line program is unaffected
        assert!(shaders.init_line_program());
    }

    #[test]
    fn compile_error_message() {
        let gpu = Rc::new(TestGpu::new());
        gpu.break_shaders_containing("#version");

        let error = Shader::new(
            gpu as Rc<dyn Gpu>,
            glow::VERTEX_SHADER,
            LINE_VERTEX_SHADER,
        ).err().unwrap();

        assert_eq!(error, "0:1: syntax error\n\nShader failed to compile");
    }
}
