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

//! Paces buffer swaps to the swap interval and keeps statistics about
//! how well that worked.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

pub const MAX_FRAME_BUCKETS: usize = 6;

// Number of frame intervals averaged for the FPS counter
const N_FPS_SAMPLES: usize = 60;
// Consecutive late frames before the swap interval is lengthened
const LATE_FRAMES_TO_GROW: u32 = 10;
// Consecutive frames with a spare refresh period before it is shortened
const SLACK_FRAMES_TO_SHRINK: u32 = 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStat {
    Idle,
    Late,
    Offset,
    Latency,
}

impl FrameStat {
    pub fn from_index(index: i32) -> Option<FrameStat> {
        match index {
            0 => Some(FrameStat::Idle),
            1 => Some(FrameStat::Late),
            2 => Some(FrameStat::Offset),
            3 => Some(FrameStat::Latency),
            _ => None,
        }
    }
}

/// What happened to one frame, measured in refresh periods.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameSample {
    /// Time spent waiting before the swap
    pub idle: u32,
    /// How far the present missed its deadline
    pub late: u32,
    /// Time since the previous present
    pub offset: u32,
    /// Time from the start of the frame to the present
    pub latency: u32,
}

#[derive(Clone, Debug, Default)]
pub struct FrameStats {
    idle: [u64; MAX_FRAME_BUCKETS],
    late: [u64; MAX_FRAME_BUCKETS],
    offset: [u64; MAX_FRAME_BUCKETS],
    latency: [u64; MAX_FRAME_BUCKETS],
    total_frames: u64,
}

fn bucket(periods: u32) -> usize {
    (periods as usize).min(MAX_FRAME_BUCKETS - 1)
}

impl FrameStats {
    pub fn record(&mut self, sample: &FrameSample) {
        self.idle[bucket(sample.idle)] += 1;
        self.late[bucket(sample.late)] += 1;
        self.offset[bucket(sample.offset)] += 1;
        self.latency[bucket(sample.latency)] += 1;
        self.total_frames += 1;
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn count(&self, stat: FrameStat, bin: usize) -> u64 {
        let bins = match stat {
            FrameStat::Idle => &self.idle,
            FrameStat::Late => &self.late,
            FrameStat::Offset => &self.offset,
            FrameStat::Latency => &self.latency,
        };

        bins.get(bin).copied().unwrap_or(0)
    }

    /// The percentage of frames that landed in `bin` of statistic
    /// number `stat`, rounded to the nearest integer. Any stat number
    /// past the last one returns the total number of frames instead.
    pub fn percentage(&self, stat: i32, bin: i32) -> i32 {
        if self.total_frames == 0 {
            return 0;
        }

        if stat >= 4 {
            return self.total_frames.min(i32::MAX as u64) as i32;
        }

        let (Some(stat), Ok(bin)) = (FrameStat::from_index(stat), usize::try_from(bin))
        else {
            return 0;
        };

        let count = self.count(stat, bin);

        (count as f64 * 100.0 / self.total_frames as f64).round() as i32
    }
}

fn periods(duration: Duration, refresh_period: Duration) -> u32 {
    let refresh_ns = refresh_period.as_nanos().max(1);

    ((duration.as_nanos() + refresh_ns / 2) / refresh_ns)
        .min(u32::MAX as u128) as u32
}

/// Blocks until `deadline`, either by sleeping or by spinning to keep
/// the CPU clocked up. Returns how long it waited.
pub fn wait_until(deadline: Instant, spin: bool) -> Duration {
    let start = Instant::now();

    if spin {
        while Instant::now() < deadline {
            std::hint::spin_loop();
        }
    } else if let Some(remaining) = deadline.checked_duration_since(start) {
        std::thread::sleep(remaining);
    }

    start.elapsed()
}

pub struct FramePacer {
    auto_swap_interval: bool,
    refresh_period: Duration,
    // The interval from the settings
    configured_interval: Duration,
    // The interval actually in use, which may have been lengthened
    swap_interval: Duration,
    late_frames: u32,
    slack_frames: u32,
    last_present: Option<Instant>,
    intervals: VecDeque<Duration>,
}

impl FramePacer {
    pub fn new(refresh_period: Duration, swap_interval: Duration) -> FramePacer {
        FramePacer {
            auto_swap_interval: true,
            refresh_period,
            configured_interval: swap_interval,
            swap_interval,
            late_frames: 0,
            slack_frames: 0,
            last_present: None,
            intervals: VecDeque::with_capacity(N_FPS_SAMPLES),
        }
    }

    pub fn configure(&mut self, refresh_period: Duration, swap_interval: Duration) {
        self.refresh_period = refresh_period;

        if swap_interval != self.configured_interval {
            self.configured_interval = swap_interval;
            self.swap_interval = swap_interval;
            self.late_frames = 0;
            self.slack_frames = 0;
        } else if self.swap_interval < swap_interval {
            self.swap_interval = swap_interval;
        }
    }

    pub fn set_auto_swap_interval(&mut self, enabled: bool) {
        self.auto_swap_interval = enabled;

        if !enabled {
            self.swap_interval = self.configured_interval;
        }

        self.late_frames = 0;
        self.slack_frames = 0;
    }

    pub fn swap_interval(&self) -> Duration {
        self.swap_interval
    }

    /// When the next frame should be presented, if there has been a
    /// previous one.
    pub fn deadline(&self) -> Option<Instant> {
        self.last_present.map(|last| last + self.swap_interval)
    }

    /// Records that a frame started at `frame_start` was presented at
    /// `present` after waiting for `idle`.
    pub fn record_present(
        &mut self,
        frame_start: Instant,
        present: Instant,
        idle: Duration,
    ) -> FrameSample {
        let late = self.deadline()
            .map(|deadline| present.saturating_duration_since(deadline))
            .unwrap_or(Duration::ZERO);
        let offset = self.last_present
            .map(|last| present.saturating_duration_since(last));

        let sample = FrameSample {
            idle: periods(idle, self.refresh_period),
            late: periods(late, self.refresh_period),
            offset: periods(offset.unwrap_or(Duration::ZERO), self.refresh_period),
            latency: periods(
                present.saturating_duration_since(frame_start),
                self.refresh_period,
            ),
        };

        if let Some(offset) = offset {
            if self.intervals.len() >= N_FPS_SAMPLES {
                self.intervals.pop_front();
            }
            self.intervals.push_back(offset);
        }

        if self.auto_swap_interval {
            self.adjust_swap_interval(&sample);
        }

        self.last_present = Some(present);

        sample
    }

    fn adjust_swap_interval(&mut self, sample: &FrameSample) {
        if sample.late >= 1 {
            self.slack_frames = 0;
            self.late_frames += 1;

            if self.late_frames >= LATE_FRAMES_TO_GROW {
                self.late_frames = 0;
                self.swap_interval += self.refresh_period;
                log::info!(
                    "Swap interval changed to {:.2}ms",
                    self.swap_interval.as_secs_f64() * 1000.0,
                );
            }
        } else if sample.idle >= 1 {
            self.late_frames = 0;
            self.slack_frames += 1;

            if self.slack_frames >= SLACK_FRAMES_TO_SHRINK {
                self.slack_frames = 0;

                let shorter = self.swap_interval
                    .saturating_sub(self.refresh_period)
                    .max(self.configured_interval);

                if shorter != self.swap_interval {
                    self.swap_interval = shorter;
                    log::info!(
                        "Swap interval changed to {:.2}ms",
                        self.swap_interval.as_secs_f64() * 1000.0,
                    );
                }
            }
        } else {
            self.late_frames = 0;
            self.slack_frames = 0;
        }
    }

    pub fn average_fps(&self) -> f32 {
        let total = self.intervals.iter().sum::<Duration>();

        if self.intervals.is_empty() || total.is_zero() {
            return 0.0;
        }

        (self.intervals.len() as f64 / total.as_secs_f64()) as f32
    }
}
