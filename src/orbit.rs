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

//! The demo scene: a ball rolling around the centre of the screen on a
//! tether.

use std::f32::consts::TAU;
use std::sync::Arc;
use std::time::{Duration, Instant};
use nalgebra::{Matrix4, Point3, Vector2, Vector3, Vector4};
use crate::circle::Circle;
use crate::line::Line;
use crate::paint_data::PaintData;
use crate::render_queue::RenderQueue;
use crate::shape::Shape;
use crate::sprite::Sprite;
use crate::texture::Texture;

pub static BALL_SHEET: &[u8] = include_bytes!("../data/ball.png");
pub const BALL_SHEET_FRAMES: u32 = 8;

const DEFAULT_PERIOD: Duration = Duration::from_secs(4);
const FRAME_DURATION: Duration = Duration::from_millis(60);
// Fraction of the smallest half-axis of the view
const ORBIT_RADIUS: f32 = 0.6;
const BALL_SIZE: f32 = 0.25;
const HUB_SIZE: f32 = 0.03;

/// Where a ball `elapsed` into an orbit of `period` should be.
pub fn orbit_position(
    center: Vector2<f32>,
    radius: f32,
    elapsed: Duration,
    period: Duration,
) -> Vector2<f32> {
    let turns = elapsed.as_secs_f32() / period.as_secs_f32().max(f32::EPSILON);
    let angle = turns.fract() * TAU;

    center + Vector2::new(angle.cos(), angle.sin()) * radius
}

pub struct Orbit {
    ball: Sprite,
    tether: Line,
    hub: Circle,
    start: Instant,
    period: Duration,
    phase: f32,
    layer: i32,
}

impl Orbit {
    pub fn new(queue: RenderQueue, ball_sheet: Arc<Texture>) -> Orbit {
        let mut ball = Sprite::new(
            queue.clone(),
            Some(ball_sheet),
            BALL_SHEET_FRAMES,
            1,
        );
        ball.set_layer(1);
        ball.show();

        let mut hub = Circle::new(
            queue.clone(),
            Vector2::zeros(),
            0.0,
            Vector4::new(0.8, 0.8, 0.8, 1.0),
        );
        hub.show();

        let tether = Line::new(
            queue,
            Vector2::zeros(),
            Vector2::zeros(),
            Vector4::new(0.8, 0.8, 0.8, 1.0),
        );

        Orbit {
            ball,
            tether,
            hub,
            start: Instant::now(),
            period: DEFAULT_PERIOD,
            phase: 0.0,
            layer: 0,
        }
    }

    pub fn set_period(&mut self, period: Duration) {
        self.period = period;
    }

    /// Offsets the orbit by a fraction of a turn.
    pub fn set_phase(&mut self, phase: f32) {
        self.phase = phase;
    }

    pub fn set_colorize(&mut self, colorize: Vector3<f32>) {
        self.ball.set_colorize(colorize);
    }

    pub fn set_layer(&mut self, layer: i32) {
        self.layer = layer;
    }

    fn update(&mut self, projection: &Matrix4<f32>, elapsed: Duration) {
        let Some(inverse) = projection.try_inverse()
        else {
            return;
        };

        // Work out the visible area from the projection
        let center = inverse.transform_point(&Point3::origin());
        let corner = inverse.transform_point(&Point3::new(1.0, 1.0, 0.0));
        let half_extent = (corner.x - center.x).abs()
            .min((corner.y - center.y).abs());

        let center = Vector2::new(center.x, center.y);
        let radius = half_extent * ORBIT_RADIUS;
        let elapsed = elapsed + self.period.mul_f32(self.phase.rem_euclid(1.0));

        let position = orbit_position(center, radius, elapsed, self.period);

        let ball_size = half_extent * BALL_SIZE;
        self.ball.set_position(position);
        self.ball.set_size(Vector2::new(ball_size, ball_size));
        self.ball.set_rotation(
            (position.y - center.y).atan2(position.x - center.x),
        );

        let frame = (elapsed.as_millis() / FRAME_DURATION.as_millis())
            % BALL_SHEET_FRAMES as u128;
        self.ball.set_grid_index(frame as u32, 0);

        self.hub.set_center(center);
        self.hub.set_radius(half_extent * HUB_SIZE);

        self.tether.set_begin(center);
        self.tether.set_end(position);
    }
}

impl Shape for Orbit {
    fn draw(
        &mut self,
        paint_data: &PaintData,
        projection: &Matrix4<f32>,
        model: &Matrix4<f32>,
    ) {
        self.update(projection, self.start.elapsed());

        self.tether.draw(paint_data, projection, model);
        self.hub.draw(paint_data, projection, model);
        self.ball.draw(paint_data, projection, model);
    }

    fn layer(&self) -> i32 {
        self.layer
    }
}
