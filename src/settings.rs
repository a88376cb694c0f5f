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

use std::time::Duration;
use parking_lot::Mutex;

pub const DEFAULT_REFRESH_PERIOD: Duration = Duration::from_nanos(16_666_667);

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    #[error("settings must be a JSON object")]
    NotAnObject,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Preferences {
    refresh_period: Duration,
    swap_interval: Duration,
    hot_pocket: bool,
}

/// Preferences that tune the frame pacing. They can be changed from
/// any thread and are read by the render thread every frame.
pub struct Settings {
    preferences: Mutex<Preferences>,
}

fn parse_refresh_period(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok()
        .filter(|&ns| ns > 0)
        .map(Duration::from_nanos)
}

fn parse_swap_interval(value: &str) -> Option<Duration> {
    value.trim().parse::<f64>().ok()
        .filter(|ms| ms.is_finite() && *ms >= 0.0)
        .map(|ms| Duration::from_nanos((ms * 1_000_000.0).round() as u64))
}

impl Settings {
    pub fn new() -> Settings {
        Settings {
            preferences: Mutex::new(Preferences {
                refresh_period: DEFAULT_REFRESH_PERIOD,
                swap_interval: DEFAULT_REFRESH_PERIOD,
                hot_pocket: false,
            }),
        }
    }

    /// Sets a preference from its string form. Returns false if the
    /// key is unknown or the value can’t be parsed, in which case
    /// nothing changes.
    pub fn set_preference(&self, key: &str, value: &str) -> bool {
        let mut preferences = self.preferences.lock();

        match key {
            "refresh_period" => {
                let Some(period) = parse_refresh_period(value)
                else {
                    log::warn!("Invalid refresh period “{}”", value);
                    return false;
                };
                preferences.refresh_period = period;
            },
            "swap_interval" => {
                let Some(interval) = parse_swap_interval(value)
                else {
                    log::warn!("Invalid swap interval “{}”", value);
                    return false;
                };
                preferences.swap_interval = interval;
            },
            "hot_pocket" => {
                preferences.hot_pocket = value == "true";
            },
            _ => {
                log::info!("Can’t set unknown preference “{}”", key);
                return false;
            },
        }

        log::info!("Set {} to {}", key, value);

        true
    }

    /// Applies every member of a flat JSON object as a preference.
    /// Numbers and booleans are converted to the same string form that
    /// the preference screen sends.
    pub fn apply_json(&self, text: &str) -> Result<(), SettingsError> {
        let value = serde_json::from_str::<serde_json::Value>(text)?;

        let serde_json::Value::Object(object) = value
        else {
            return Err(SettingsError::NotAnObject);
        };

        for (key, value) in object.iter() {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };

            self.set_preference(key, &value);
        }

        Ok(())
    }

    pub fn refresh_period(&self) -> Duration {
        self.preferences.lock().refresh_period
    }

    pub fn swap_interval(&self) -> Duration {
        self.preferences.lock().swap_interval
    }

    pub fn hot_pocket(&self) -> bool {
        self.preferences.lock().hot_pocket
    }
}

impl Default for Settings {
    fn default() -> Settings {
        Settings::new()
    }
}
