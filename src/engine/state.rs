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

//! The single shared mutable resource: live voices plus global parameters.
//!
//! Both execution contexts touch this under one lock held only across
//! bounded critical sections; the parameter bridge mutates fields, the
//! real-time mixer advances voices and rebuilds level snapshots.

use std::collections::HashMap;

use crate::buffer::BufferStore;
use crate::engine::levels::LevelSnapshot;
use crate::engine::voice::Voice;

/// Default master tempo in beats per minute.
pub const DEFAULT_MASTER_BPM: f32 = 120.0;

/// Default master gain, applied multiplicatively at mix time.
pub const DEFAULT_MASTER_GAIN: f32 = 1.0;

/// Engine state shared between the command context and the audio callback.
/// At most one live voice per pad: retriggering replaces, never stacks.
pub struct EngineState {
    /// Loaded buffers by pad.
    pub(crate) bank: BufferStore,
    /// Live voices by pad.
    pub(crate) voices: HashMap<String, Voice>,
    /// Global master tempo for sync-enabled voices.
    pub(crate) master_bpm: f32,
    /// Global output gain.
    pub(crate) master_gain: f32,
    /// The output device's sample rate.
    pub(crate) device_sample_rate: u32,
    /// Latest level snapshots, rebuilt by the mixer each cycle.
    pub(crate) levels: HashMap<String, LevelSnapshot>,
}

impl EngineState {
    /// Creates an empty state for the given device sample rate.
    pub fn new(device_sample_rate: u32) -> Self {
        Self {
            bank: BufferStore::new(),
            voices: HashMap::new(),
            master_bpm: DEFAULT_MASTER_BPM,
            master_gain: DEFAULT_MASTER_GAIN,
            device_sample_rate,
            levels: HashMap::new(),
        }
    }

    /// The number of live voices.
    pub fn active_voice_count(&self) -> usize {
        self.voices.len()
    }

    /// The pads with a live voice, sorted for stable output.
    pub fn active_pads(&self) -> Vec<String> {
        let mut pads: Vec<String> = self.voices.keys().cloned().collect();
        pads.sort();
        pads
    }
}

impl std::fmt::Debug for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineState")
            .field("bank", &self.bank)
            .field("active_voices", &self.voices.len())
            .field("master_bpm", &self.master_bpm)
            .field("master_gain", &self.master_gain)
            .field("device_sample_rate", &self.device_sample_rate)
            .finish()
    }
}
