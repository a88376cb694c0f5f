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

//! Draws the sprite sheet for the orbiting ball. Each frame shows the
//! ball rolled a little further so that stepping through the columns
//! animates it.

use cairo;
use std::f64::consts::PI;
use std::process::ExitCode;

const BALL_SIZE: u32 = 64;
const N_FRAMES: u32 = 8;
const TEXTURE_WIDTH: u32 = BALL_SIZE * N_FRAMES;
const TEXTURE_HEIGHT: u32 = BALL_SIZE;
// Leave a gap around the ball so that filtering doesn’t clip it
const BALL_RADIUS: f64 = BALL_SIZE as f64 / 2.0 - 1.0;

fn add_color_stop(gradient: &cairo::Gradient, offset: f64, color: [f64; 3]) {
    gradient.add_color_stop_rgb(offset, color[0], color[1], color[2]);
}

fn ball_path(cr: &cairo::Context) {
    cr.arc(
        BALL_SIZE as f64 / 2.0,
        BALL_SIZE as f64 / 2.0,
        BALL_RADIUS,
        0.0,
        2.0 * PI,
    );
}

fn draw_ball_background(cr: &cairo::Context) -> Result<(), cairo::Error> {
    ball_path(cr);

    let gradient = cairo::RadialGradient::new(
        BALL_SIZE as f64 * 0.4,
        BALL_SIZE as f64 * 0.4,
        0.0,
        BALL_SIZE as f64 / 2.0,
        BALL_SIZE as f64 / 2.0,
        BALL_RADIUS,
    );

    add_color_stop(&gradient, 0.0, [0.95, 0.35, 0.3]);
    add_color_stop(&gradient, 0.7, [0.614, 0.177, 0.196]);
    add_color_stop(&gradient, 1.0, [0.357, 0.087, 0.101]);

    cr.set_source(&gradient)?;
    cr.fill()?;

    Ok(())
}

fn draw_stripe(cr: &cairo::Context, frame: u32) -> Result<(), cairo::Error> {
    cr.save()?;

    ball_path(cr);
    cr.clip();

    // The stripe moves across the ball as it rolls
    let offset = (frame as f64 / N_FRAMES as f64 * 2.0 - 1.0) * BALL_RADIUS;

    cr.translate(BALL_SIZE as f64 / 2.0 + offset, 0.0);
    cr.rectangle(
        -BALL_SIZE as f64 * 0.08,
        0.0,
        BALL_SIZE as f64 * 0.16,
        BALL_SIZE as f64,
    );
    cr.set_source_rgba(1.0, 1.0, 1.0, 0.85);
    cr.fill()?;

    cr.restore()?;

    Ok(())
}

fn draw_frames(cr: &cairo::Context) -> Result<(), cairo::Error> {
    for frame in 0..N_FRAMES {
        cr.save()?;
        cr.translate((frame * BALL_SIZE) as f64, 0.0);

        draw_ball_background(cr)?;
        draw_stripe(cr, frame)?;

        cr.restore()?;
    }

    Ok(())
}

fn generate_image() -> Result<cairo::ImageSurface, cairo::Error> {
    let surface = cairo::ImageSurface::create(
        cairo::Format::ARgb32,
        TEXTURE_WIDTH as i32,
        TEXTURE_HEIGHT as i32,
    )?;

    let cr = cairo::Context::new(&surface)?;

    cr.save()?;
    cr.set_source_rgba(0.0, 0.0, 0.0, 0.0);
    cr.set_operator(cairo::Operator::Source);
    cr.paint()?;
    cr.restore()?;

    draw_frames(&cr)?;

    surface.flush();

    Ok(surface)
}

fn write_surface<S: AsRef<cairo::Surface>, P: AsRef<std::path::Path>>(
    surface: S,
    filename: P,
) -> Result<(), String> {
    let mut file = match std::fs::File::create(filename) {
        Ok(f) => f,
        Err(e) => return Err(e.to_string()),
    };

    match surface.as_ref().write_to_png(&mut file) {
        Ok(_) => Ok(()),
        Err(e) => Err(e.to_string()),
    }
}

pub fn main() -> ExitCode {
    let mut args = std::env::args_os();

    if args.len() != 2 {
        eprintln!(
            "usage: create-ball-sheet <filename>"
        );
        return ExitCode::FAILURE;
    }

    let Some(output_filename) = args.nth(1)
    else {
        return ExitCode::FAILURE;
    };

    let surface = match generate_image() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        },
    };

    if let Err(e) = write_surface(&surface, &output_filename) {
        eprintln!("{}: {}", output_filename.to_string_lossy(), e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
