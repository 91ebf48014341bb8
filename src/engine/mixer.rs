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

//! The real-time mix routine, independent of any audio backend.
//!
//! Invoked once per fixed-size output block from the device callback (and
//! directly from tests). Advances every live voice, sums their contributions
//! into the interleaved output buffer, rebuilds level snapshots, and prunes
//! finished voices. No allocation in steady state, no I/O, no error paths.

use crate::engine::state::EngineState;

/// Renders one interleaved output block into `out`. Voices are summed with no
/// hard limiting; clipping is the hardware's concern.
pub fn render_block(state: &mut EngineState, out: &mut [f32], out_channels: usize) {
    debug_assert!(out_channels >= 1);
    out.fill(0.0);

    let master_bpm = state.master_bpm;
    let master_gain = state.master_gain;

    // Reset the per-pad metering for this cycle. Snapshot windows keep their
    // capacity across cycles, so steady-state rendering does not allocate.
    let voices = &mut state.voices;
    let levels = &mut state.levels;
    levels.retain(|pad, _| voices.contains_key(pad));
    for snapshot in levels.values_mut() {
        snapshot.reset();
    }

    for frame in out.chunks_mut(out_channels) {
        let mut left = 0.0f32;
        let mut right = 0.0f32;

        for (pad, voice) in voices.iter_mut() {
            let Some(rendered) = voice.process_frame(master_bpm) else {
                continue;
            };
            left += rendered.left;
            right += rendered.right;

            if let Some(snapshot) = levels.get_mut(pad) {
                snapshot.observe(rendered.visual);
            } else {
                let mut snapshot = crate::engine::levels::LevelSnapshot::default();
                snapshot.observe(rendered.visual);
                levels.insert(pad.clone(), snapshot);
            }
        }

        if out_channels == 1 {
            frame[0] = (left + right) * 0.5 * master_gain;
        } else {
            frame[0] = left * master_gain;
            frame[1] = right * master_gain;
        }
    }

    voices.retain(|_, voice| !voice.is_finished());
}
