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

use std::sync::Once;

static INIT: Once = Once::new();

/// Installs the global logger. Later calls do nothing.
///
/// On Android the messages go to logcat under the “Orbit” tag.
/// Elsewhere `RUST_LOG` is honoured with a default level of `info`.
pub fn init_logging() {
    INIT.call_once(|| {
        install();
        log::debug!("logging initialized");
    });
}

#[cfg(target_os = "android")]
fn install() {
    android_logger::init_once(
        android_logger::Config::default()
            .with_max_level(log::LevelFilter::Info)
            .with_tag("Orbit"),
    );
}

#[cfg(not(target_os = "android"))]
fn install() {
    let mut builder = env_logger::Builder::new();

    if let Ok(filter) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filter);
    } else {
        builder.filter_level(log::LevelFilter::Info);
    }

    // Something else may have got there first, such as a test harness
    if let Err(e) = builder.try_init() {
        eprintln!("Failed to initialise logging: {}", e);
    }
}
