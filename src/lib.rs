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

//! A pad-based sample triggering engine for live performance.
//!
//! A fixed set of pads is bound to decoded audio buffers. Pads can be
//! triggered, stopped, looped, trimmed, gain-adjusted, and tempo-synced to a
//! master BPM while a real-time output callback continuously mixes every
//! live voice into the audio device.

pub mod audio;
pub mod buffer;
pub mod config;
pub mod controller;
pub mod engine;
#[cfg(test)]
pub mod testutil;
