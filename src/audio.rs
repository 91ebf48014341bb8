// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Output device discovery and streaming.

use crate::engine::EngineError;

pub mod cpal;

pub use self::cpal::{Device, Output, OutputConfig};

/// Lists output-capable devices across all available hosts.
pub fn list_devices() -> Result<Vec<Device>, EngineError> {
    Device::list()
}

/// Gets the device with the given name, or the default output device when no
/// name is given.
pub fn get_device(name: Option<&str>) -> Result<Device, EngineError> {
    Device::get(name)
}
