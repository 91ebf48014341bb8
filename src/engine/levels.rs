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

//! Per-pad level metering snapshots.
//!
//! Rebuilt by the mixer each callback from its own output and consumed by
//! external polling. Never authoritative for playback logic.

use std::collections::HashMap;

use serde::Serialize;

/// Maximum number of recent samples kept per pad per callback cycle.
pub const LEVEL_WINDOW: usize = 128;

/// The most recent peak and sample window for one pad.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LevelSnapshot {
    /// Peak absolute pre-gain sample observed during the last cycle.
    pub peak: f32,
    /// Up to `LEVEL_WINDOW` recent pre-gain samples.
    pub samples: Vec<f32>,
}

impl LevelSnapshot {
    /// Resets the snapshot at the start of a callback cycle, keeping the
    /// allocated sample window for reuse.
    pub(crate) fn reset(&mut self) {
        self.peak = 0.0;
        self.samples.clear();
    }

    /// Records one pre-gain sample.
    pub(crate) fn observe(&mut self, sample: f32) {
        self.peak = self.peak.max(sample.abs());
        if self.samples.len() < LEVEL_WINDOW {
            self.samples.push(sample);
        }
    }
}

/// The polling response: latest snapshots plus the live pad set. "Finished"
/// is inferred by the caller from a pad leaving `active_pads`.
#[derive(Debug, Clone, Serialize)]
pub struct LevelsResponse {
    /// Latest level snapshots by pad.
    pub levels: HashMap<String, LevelSnapshot>,
    /// Pads with a live voice.
    pub active_pads: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_tracks_peak_and_window() {
        let mut snapshot = LevelSnapshot::default();
        snapshot.observe(0.25);
        snapshot.observe(-0.75);
        snapshot.observe(0.5);

        assert_eq!(snapshot.peak, 0.75);
        assert_eq!(snapshot.samples, vec![0.25, -0.75, 0.5]);
    }

    #[test]
    fn test_window_is_bounded() {
        let mut snapshot = LevelSnapshot::default();
        for i in 0..(LEVEL_WINDOW * 2) {
            snapshot.observe(i as f32 / 1000.0);
        }
        assert_eq!(snapshot.samples.len(), LEVEL_WINDOW);
    }

    #[test]
    fn test_reset_keeps_capacity() {
        let mut snapshot = LevelSnapshot::default();
        for _ in 0..LEVEL_WINDOW {
            snapshot.observe(0.5);
        }
        let capacity = snapshot.samples.capacity();
        snapshot.reset();

        assert_eq!(snapshot.peak, 0.0);
        assert!(snapshot.samples.is_empty());
        assert_eq!(snapshot.samples.capacity(), capacity);
    }
}
