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

//! Best-effort tempo estimation from raw PCM.
//!
//! Autocorrelates an onset-energy envelope and reports the strongest
//! periodicity in the 60-180 BPM range. Returns `None` when the signal is
//! too short or has no usable onsets; callers fall back to a default tempo.

use tracing::debug;

/// Hop size in samples for the onset-energy envelope.
const HOP_SIZE: usize = 256;

/// Analysis is limited to the first 60 seconds of audio. Longer intros than
/// that are not worth the extra decode-time latency.
const MAX_ANALYSIS_SECONDS: u32 = 60;

/// Search range for the reported tempo.
const MIN_BPM: f64 = 60.0;
const MAX_BPM: f64 = 180.0;

/// Estimates the tempo of a mono PCM signal in beats per minute.
pub fn estimate_bpm(samples: &[f32], sample_rate: u32) -> Option<f32> {
    if sample_rate == 0 || samples.len() < sample_rate as usize {
        return None;
    }

    let limit = (sample_rate * MAX_ANALYSIS_SECONDS) as usize;
    let samples = &samples[..samples.len().min(limit)];

    // Onset envelope: positive energy flux between consecutive hops.
    let energies: Vec<f64> = samples
        .chunks(HOP_SIZE)
        .map(|hop| hop.iter().map(|s| (*s as f64) * (*s as f64)).sum::<f64>())
        .collect();
    let flux: Vec<f64> = energies
        .windows(2)
        .map(|w| (w[1] - w[0]).max(0.0))
        .collect();

    if flux.iter().sum::<f64>() < 1e-9 {
        return None;
    }

    let hop_rate = sample_rate as f64 / HOP_SIZE as f64;
    let min_lag = ((60.0 / MAX_BPM) * hop_rate).floor() as usize;
    let max_lag = ((60.0 / MIN_BPM) * hop_rate).ceil() as usize;
    if flux.len() <= max_lag * 2 {
        return None;
    }

    // Normalized autocorrelation of the onset envelope over the lag range.
    let mut best_score = 0.0f64;
    let mut scores = vec![0.0f64; max_lag + 1];
    for lag in min_lag..=max_lag {
        let n = flux.len() - lag;
        let score = (0..n).map(|i| flux[i] * flux[i + lag]).sum::<f64>() / n as f64;
        scores[lag] = score;
        if score > best_score {
            best_score = score;
        }
    }

    if best_score <= 0.0 {
        return None;
    }

    // Prefer the shortest competitive lag so an N-beat periodicity does not
    // win over the beat itself.
    let best_lag = (min_lag..=max_lag).find(|&lag| scores[lag] >= 0.85 * best_score)?;

    let bpm = (60.0 * hop_rate / best_lag as f64) as f32;
    debug!(bpm, best_lag, "Estimated tempo");
    Some(bpm)
}
