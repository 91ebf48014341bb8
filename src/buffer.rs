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

//! Decoded sample ownership.
//!
//! This module provides:
//! - `PadBuffer`: immutable decoded PCM plus cached duration, waveform peaks,
//!   and resolved tempo, shared between the store and in-flight voices
//! - `BufferStore`: the pad-keyed collection of loaded buffers
//! - file decoding (`decode`) and tempo estimation (`tempo`) collaborators

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::engine::error::EngineError;

pub mod decode;
pub mod tempo;

/// Number of peak points in the cached visualization waveform.
pub const WAVEFORM_POINTS: usize = 400;

/// Tempo used when neither the caller nor the estimator can supply one.
pub const DEFAULT_BPM: f32 = 120.0;

/// A decoded sample bound to a pad. Immutable after creation; shared
/// read-only between the store and every voice playing it, and freed when the
/// last holder drops.
pub struct PadBuffer {
    /// Interleaved f32 PCM, normalized to one or two channels.
    data: Vec<f32>,
    /// Sample rate of the PCM data.
    sample_rate: u32,
    /// Channel count after normalization (1 or 2).
    channels: u16,
    /// Cached duration in seconds.
    duration: f32,
    /// Resolved tempo in beats per minute.
    bpm: f32,
    /// Block-max-abs peak sequence for visualization.
    waveform: Vec<f32>,
}

impl PadBuffer {
    /// Builds a buffer from raw decoded PCM.
    ///
    /// Channels are normalized (mono stays mono, anything wider folds to
    /// stereo), the visualization waveform is precomputed, and the tempo is
    /// resolved: a caller-supplied BPM wins, otherwise the estimator runs on
    /// a mono mixdown and the result snaps to a near integer the way loop
    /// packs are usually labeled.
    pub fn from_pcm(
        pcm: Vec<f32>,
        sample_rate: u32,
        channels: u16,
        known_bpm: Option<f32>,
    ) -> Result<PadBuffer, EngineError> {
        if pcm.is_empty() {
            return Err(EngineError::DecodeUnavailable("empty PCM data".to_string()));
        }
        if channels == 0 {
            return Err(EngineError::DecodeUnavailable("0 channels".to_string()));
        }
        if sample_rate == 0 {
            return Err(EngineError::DecodeUnavailable("0 sample rate".to_string()));
        }

        let (data, out_channels) = normalize_channels(pcm, channels);
        let frames = data.len() / out_channels as usize;
        let duration = frames as f32 / sample_rate as f32;
        let waveform = peak_waveform(&data, out_channels);

        let bpm = match known_bpm {
            Some(bpm) if bpm > 0.0 => {
                debug!(bpm, "Using cached tempo");
                bpm
            }
            _ => {
                let mono = mono_mixdown(&data, out_channels);
                match tempo::estimate_bpm(&mono, sample_rate) {
                    Some(estimated) => snap_bpm(estimated),
                    None => DEFAULT_BPM,
                }
            }
        };

        Ok(PadBuffer {
            data,
            sample_rate,
            channels: out_channels,
            duration,
            bpm,
            waveform,
        })
    }

    /// The interleaved sample data.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// The sample rate of the data.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The normalized channel count (1 or 2).
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// The number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.data.len() / self.channels as usize
    }

    /// The duration in seconds.
    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// The resolved tempo in beats per minute.
    pub fn bpm(&self) -> f32 {
        self.bpm
    }

    /// The cached visualization waveform.
    pub fn waveform(&self) -> &[f32] {
        &self.waveform
    }

    /// Returns the memory size of the PCM data in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }
}

impl std::fmt::Debug for PadBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PadBuffer")
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("duration", &self.duration)
            .field("bpm", &self.bpm)
            .field("memory_kb", &(self.memory_size() / 1024))
            .finish()
    }
}

/// Normalizes an interleaved PCM stream to mono or stereo. Surround content
/// folds to stereo by averaging even channels left and odd channels right.
fn normalize_channels(pcm: Vec<f32>, channels: u16) -> (Vec<f32>, u16) {
    match channels {
        1 | 2 => (pcm, channels),
        n => {
            let n = n as usize;
            let frames = pcm.len() / n;
            let mut out = Vec::with_capacity(frames * 2);
            for frame in pcm.chunks_exact(n) {
                let (mut left, mut right) = (0.0f32, 0.0f32);
                let (mut left_n, mut right_n) = (0u32, 0u32);
                for (ch, sample) in frame.iter().enumerate() {
                    if ch % 2 == 0 {
                        left += sample;
                        left_n += 1;
                    } else {
                        right += sample;
                        right_n += 1;
                    }
                }
                out.push(left / left_n.max(1) as f32);
                out.push(right / right_n.max(1) as f32);
            }
            (out, 2)
        }
    }
}

/// Mixes interleaved PCM down to mono for tempo analysis.
fn mono_mixdown(data: &[f32], channels: u16) -> Vec<f32> {
    if channels == 1 {
        return data.to_vec();
    }
    data.chunks_exact(channels as usize)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Computes a fixed-length peak sequence by block-max-abs downsampling.
/// Buffers shorter than `WAVEFORM_POINTS` frames produce one point per frame.
fn peak_waveform(data: &[f32], channels: u16) -> Vec<f32> {
    let channels = channels as usize;
    let frames = data.len() / channels;
    let step = (frames / WAVEFORM_POINTS).max(1);

    let mut waveform = Vec::with_capacity(WAVEFORM_POINTS);
    for i in 0..WAVEFORM_POINTS {
        let start = i * step;
        if start >= frames {
            break;
        }
        let end = (start + step).min(frames);

        let mut peak = 0.0f32;
        for sample in &data[start * channels..end * channels] {
            peak = peak.max(sample.abs());
        }
        waveform.push(peak);
    }
    waveform
}

/// Snaps a tempo estimate to a whole number of beats per minute when it is
/// within 0.1 BPM. Many loops are labeled with exact integer tempos.
fn snap_bpm(bpm: f32) -> f32 {
    if (bpm - bpm.round()).abs() < 0.1 {
        bpm.round()
    } else {
        bpm
    }
}

/// The pad-keyed collection of loaded buffers. Read-only after load; buffers
/// removed from the store stay alive while any voice still references them.
#[derive(Default)]
pub struct BufferStore {
    bank: HashMap<String, Arc<PadBuffer>>,
}

impl BufferStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a buffer from raw PCM and binds it to a pad, replacing any
    /// previous binding wholesale.
    pub fn load(
        &mut self,
        pad: &str,
        pcm: Vec<f32>,
        sample_rate: u32,
        channels: u16,
        known_bpm: Option<f32>,
    ) -> Result<Arc<PadBuffer>, EngineError> {
        let buffer = Arc::new(PadBuffer::from_pcm(pcm, sample_rate, channels, known_bpm)?);
        self.insert(pad, Arc::clone(&buffer));
        Ok(buffer)
    }

    /// Binds an already-built buffer to a pad.
    pub fn insert(&mut self, pad: &str, buffer: Arc<PadBuffer>) {
        info!(
            pad,
            duration = buffer.duration(),
            bpm = buffer.bpm(),
            memory_kb = buffer.memory_size() / 1024,
            "Sample loaded"
        );
        self.bank.insert(pad.to_string(), buffer);
    }

    /// Gets the buffer bound to a pad.
    pub fn get(&self, pad: &str) -> Option<&Arc<PadBuffer>> {
        self.bank.get(pad)
    }

    /// Drops the store's reference for a pad. In-flight voices keep playing
    /// from their own references; the data is freed when the last one drops.
    pub fn unload(&mut self, pad: &str) -> bool {
        self.bank.remove(pad).is_some()
    }

    /// The number of loaded pads.
    pub fn len(&self) -> usize {
        self.bank.len()
    }

    /// Whether the store has no loaded pads.
    pub fn is_empty(&self) -> bool {
        self.bank.is_empty()
    }

    /// Returns the total memory used by loaded buffers.
    pub fn total_memory_usage(&self) -> usize {
        self.bank.values().map(|b| b.memory_size()).sum()
    }
}

impl std::fmt::Debug for BufferStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferStore")
            .field("loaded_pads", &self.bank.len())
            .field("total_memory_kb", &(self.total_memory_usage() / 1024))
            .finish()
    }
}
