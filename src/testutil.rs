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

/// Audio test utilities for generating test signals and validating results.
pub mod audio_test_utils {
    use std::f32::consts::PI;

    /// Generates a mono sine wave.
    pub fn sine_wave(frequency: f32, sample_rate: u32, duration_seconds: f32) -> Vec<f32> {
        let sample_count = (sample_rate as f32 * duration_seconds) as usize;
        (0..sample_count)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                (2.0 * PI * frequency * t).sin()
            })
            .collect()
    }

    /// Generates a constant-valued mono signal.
    pub fn constant_signal(value: f32, sample_rate: u32, duration_seconds: f32) -> Vec<f32> {
        let sample_count = (sample_rate as f32 * duration_seconds) as usize;
        vec![value; sample_count]
    }

    /// Generates a mono click track: short decaying bursts at the given tempo.
    pub fn click_track(bpm: f32, sample_rate: u32, duration_seconds: f32) -> Vec<f32> {
        let sample_count = (sample_rate as f32 * duration_seconds) as usize;
        let beat_interval = 60.0 / bpm * sample_rate as f32;
        let click_len = (sample_rate as f32 * 0.01) as usize;

        let mut samples = vec![0.0f32; sample_count];
        let mut beat = 0.0f32;
        while (beat as usize) < sample_count {
            let start = beat as usize;
            for i in 0..click_len.min(sample_count - start) {
                let decay = 1.0 - i as f32 / click_len as f32;
                samples[start + i] = decay * (2.0 * PI * 1000.0 * i as f32 / sample_rate as f32).sin();
            }
            beat += beat_interval;
        }
        samples
    }

    /// Calculates the RMS of a signal.
    pub fn calculate_rms(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }

        let sum_squares: f32 = samples.iter().map(|&x| x * x).sum();
        (sum_squares / samples.len() as f32).sqrt()
    }

    /// Returns the largest absolute sample-to-sample step in a signal. Useful
    /// for asserting that loop wraps and envelope ramps are click-free.
    pub fn max_discontinuity(samples: &[f32]) -> f32 {
        samples
            .windows(2)
            .map(|w| (w[1] - w[0]).abs())
            .fold(0.0, f32::max)
    }
}
