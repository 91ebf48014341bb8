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

//! The pad engine and its command bridge.
//!
//! This module provides:
//! - `Engine`: the command-side handle, sharing `EngineState` with the audio
//!   callback behind a mutex
//! - `PlayParams`: validated per-trigger playback parameters
//! - the mixer, voice, state, levels and error collaborators
//!
//! Commands arriving here never touch the device directly; they mutate shared
//! state under short critical sections and the callback picks the changes up
//! on its next cycle. Expensive work (decoding, tempo analysis) always runs
//! before the lock is taken.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::buffer::{decode, PadBuffer};

pub mod error;
pub mod levels;
pub mod mixer;
pub mod state;
pub mod voice;

pub use error::EngineError;
pub use levels::{LevelSnapshot, LevelsResponse};
pub use state::EngineState;
pub use voice::Voice;

/// Playback parameters for one trigger of a pad.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayParams {
    /// Linear gain, `0.0` to `1.5`.
    pub volume: f32,
    /// Attack time in seconds.
    pub attack: f32,
    /// Release time in seconds.
    pub release: f32,
    /// Whether the voice loops over its trim window.
    pub looping: bool,
    /// Start of the playback window in seconds.
    pub trim_in: f32,
    /// End of the playback window in seconds. `None` plays to the end.
    pub trim_out: Option<f32>,
    /// Whether playback rate follows the master tempo.
    pub sync: bool,
    /// The sample's own tempo, used as the sync reference.
    pub sample_bpm: f32,
}

impl Default for PlayParams {
    fn default() -> Self {
        PlayParams {
            volume: 1.0,
            attack: 0.0,
            release: 0.0,
            looping: false,
            trim_in: 0.0,
            trim_out: None,
            sync: false,
            sample_bpm: crate::buffer::DEFAULT_BPM,
        }
    }
}

impl PlayParams {
    /// Validates parameter ranges. Rejected triggers leave playback untouched.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.volume.is_finite() || !(0.0..=1.5).contains(&self.volume) {
            return Err(EngineError::InvalidParameter(format!(
                "volume {} out of range [0.0, 1.5]",
                self.volume
            )));
        }
        if !self.attack.is_finite() || self.attack < 0.0 {
            return Err(EngineError::InvalidParameter(format!(
                "attack {} must be non-negative",
                self.attack
            )));
        }
        if !self.release.is_finite() || self.release < 0.0 {
            return Err(EngineError::InvalidParameter(format!(
                "release {} must be non-negative",
                self.release
            )));
        }
        if !self.trim_in.is_finite() || self.trim_in < 0.0 {
            return Err(EngineError::InvalidParameter(format!(
                "trim_in {} must be non-negative",
                self.trim_in
            )));
        }
        if let Some(trim_out) = self.trim_out {
            if !trim_out.is_finite() || trim_out <= self.trim_in {
                return Err(EngineError::InvalidParameter(format!(
                    "trim_out {} must be greater than trim_in {}",
                    trim_out, self.trim_in
                )));
            }
        }
        if self.sync && (!self.sample_bpm.is_finite() || self.sample_bpm <= 0.0) {
            return Err(EngineError::InvalidParameter(format!(
                "sample_bpm {} must be positive when sync is enabled",
                self.sample_bpm
            )));
        }
        Ok(())
    }
}

/// Metadata returned from a successful load.
#[derive(Debug, Clone, Serialize)]
pub struct LoadResult {
    /// Sample duration in seconds.
    pub duration: f32,
    /// Resolved tempo in beats per minute.
    pub bpm: f32,
    /// Block-peak visualization waveform.
    pub waveform: Vec<f32>,
}

/// The command-side handle to the shared engine state.
pub struct Engine {
    state: Arc<Mutex<EngineState>>,
}

impl Engine {
    /// Creates an engine for an output device running at the given rate.
    pub fn new(device_sample_rate: u32) -> Engine {
        Engine {
            state: Arc::new(Mutex::new(EngineState::new(device_sample_rate))),
        }
    }

    /// The shared state handle, for wiring up the audio callback.
    pub fn shared_state(&self) -> Arc<Mutex<EngineState>> {
        Arc::clone(&self.state)
    }

    /// Decodes a file and binds it to a pad. Decoding and analysis run before
    /// the lock is taken so playback never stalls on I/O.
    pub fn load_file(
        &self,
        pad: &str,
        path: &Path,
        known_bpm: Option<f32>,
    ) -> Result<LoadResult, EngineError> {
        let decoded = decode::decode_file(path)?;
        self.load(
            pad,
            decoded.pcm,
            decoded.sample_rate,
            decoded.channels,
            known_bpm,
        )
    }

    /// Builds a buffer from raw PCM and binds it to a pad, replacing any
    /// previous binding. A voice playing the old buffer keeps its reference
    /// and plays on unaffected.
    pub fn load(
        &self,
        pad: &str,
        pcm: Vec<f32>,
        sample_rate: u32,
        channels: u16,
        known_bpm: Option<f32>,
    ) -> Result<LoadResult, EngineError> {
        let buffer = Arc::new(PadBuffer::from_pcm(pcm, sample_rate, channels, known_bpm)?);
        let result = LoadResult {
            duration: buffer.duration(),
            bpm: buffer.bpm(),
            waveform: buffer.waveform().to_vec(),
        };

        let mut state = self.state.lock();
        state.bank.insert(pad, buffer);
        Ok(result)
    }

    /// Triggers a pad. An existing voice on the same pad is replaced outright,
    /// never stacked.
    pub fn play(&self, pad: &str, params: &PlayParams) -> Result<(), EngineError> {
        params.validate()?;

        let mut state = self.state.lock();
        let Some(buffer) = state.bank.get(pad) else {
            return Err(EngineError::PadNotLoaded(pad.to_string()));
        };
        let voice = Voice::new(Arc::clone(buffer), params, state.device_sample_rate);
        state.voices.insert(pad.to_string(), voice);

        info!(
            pad,
            volume = params.volume,
            looping = params.looping,
            sync = params.sync,
            "Pad triggered"
        );
        Ok(())
    }

    /// Applies new parameters to a pad's live voice without retriggering.
    /// A pad with no live voice is left alone.
    pub fn update_params(&self, pad: &str, params: &PlayParams) -> Result<(), EngineError> {
        params.validate()?;

        let mut state = self.state.lock();
        if let Some(voice) = state.voices.get_mut(pad) {
            voice.update(params);
            debug!(pad, "Voice parameters updated");
        }
        Ok(())
    }

    /// Begins the release fade on a pad's live voice. An explicit release
    /// duration overrides the voice's configured fade; stopping an idle pad
    /// is a no-op.
    pub fn stop(&self, pad: &str, release: Option<f32>) -> Result<(), EngineError> {
        if let Some(release) = release {
            if !release.is_finite() || release < 0.0 {
                return Err(EngineError::InvalidParameter(format!(
                    "release {} must be non-negative",
                    release
                )));
            }
        }

        let mut state = self.state.lock();
        let master_bpm = state.master_bpm;
        let device_rate = state.device_sample_rate as f64;
        if let Some(voice) = state.voices.get_mut(pad) {
            let remaining = voice.remaining_device_samples(master_bpm);
            let custom = release.map(|secs| (secs as f64 * device_rate) as u64);
            voice.begin_release(custom, remaining);
            info!(pad, "Pad released");
        }
        Ok(())
    }

    /// Begins the release fade on every live voice.
    pub fn stop_all(&self) {
        let mut state = self.state.lock();
        let master_bpm = state.master_bpm;
        for voice in state.voices.values_mut() {
            let remaining = voice.remaining_device_samples(master_bpm);
            voice.begin_release(None, remaining);
        }
        info!("All pads released");
    }

    /// Removes every voice immediately with no fade.
    pub fn silence_all(&self) {
        let mut state = self.state.lock();
        state.voices.clear();
        state.levels.clear();
        info!("All voices silenced");
    }

    /// Drops the stored buffer for a pad. A live voice on that pad keeps its
    /// own reference and plays to completion.
    pub fn unload(&self, pad: &str) -> bool {
        let mut state = self.state.lock();
        let removed = state.bank.unload(pad);
        if removed {
            info!(pad, "Sample unloaded");
        }
        removed
    }

    /// Sets the master tempo. Sync-enabled voices pick the new rate up on the
    /// next render cycle.
    pub fn set_master_bpm(&self, bpm: f32) -> Result<(), EngineError> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(EngineError::InvalidParameter(format!(
                "master bpm {} must be positive",
                bpm
            )));
        }
        self.state.lock().master_bpm = bpm;
        info!(bpm, "Master tempo set");
        Ok(())
    }

    /// Sets the master output gain.
    pub fn set_master_gain(&self, gain: f32) -> Result<(), EngineError> {
        if !gain.is_finite() || gain < 0.0 {
            return Err(EngineError::InvalidParameter(format!(
                "master gain {} must be non-negative",
                gain
            )));
        }
        self.state.lock().master_gain = gain;
        info!(gain, "Master gain set");
        Ok(())
    }

    /// Snapshots the latest per-pad levels and the live pad set.
    pub fn query_levels(&self) -> LevelsResponse {
        let state = self.state.lock();
        LevelsResponse {
            levels: state.levels.clone(),
            active_pads: state.active_pads(),
        }
    }

    /// The cached visualization waveform for a loaded pad.
    pub fn pad_waveform(&self, pad: &str) -> Option<Vec<f32>> {
        self.state
            .lock()
            .bank
            .get(pad)
            .map(|buffer| buffer.waveform().to_vec())
    }

    /// The pads with a live voice, sorted.
    pub fn active_pads(&self) -> Vec<String> {
        self.state.lock().active_pads()
    }

    /// The current master tempo.
    pub fn master_bpm(&self) -> f32 {
        self.state.lock().master_bpm
    }

    /// The current master gain.
    pub fn master_gain(&self) -> f32 {
        self.state.lock().master_gain
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Engine").field("state", &*state).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::voice::EnvelopePhase;

    const SR: u32 = 44100;

    fn loaded_engine() -> Engine {
        let engine = Engine::new(SR);
        engine
            .load("Q", vec![0.5; SR as usize], SR, 1, Some(100.0))
            .unwrap();
        engine
    }

    #[test]
    fn test_play_requires_loaded_pad() {
        let engine = Engine::new(SR);
        let err = engine.play("Q", &PlayParams::default()).unwrap_err();
        assert!(matches!(err, EngineError::PadNotLoaded(_)));
    }

    #[test]
    fn test_load_reports_metadata() {
        let engine = Engine::new(SR);
        let result = engine
            .load("Q", vec![0.5; SR as usize], SR, 1, Some(93.0))
            .unwrap();
        assert!((result.duration - 1.0).abs() < 1e-6);
        assert_eq!(result.bpm, 93.0);
        assert_eq!(result.waveform.len(), crate::buffer::WAVEFORM_POINTS);
    }

    #[test]
    fn test_retrigger_replaces_voice() {
        let engine = loaded_engine();
        engine.play("Q", &PlayParams::default()).unwrap();
        engine.play("Q", &PlayParams::default()).unwrap();

        let state = engine.shared_state();
        assert_eq!(state.lock().active_voice_count(), 1);
    }

    #[test]
    fn test_stop_idle_pad_is_noop() {
        let engine = loaded_engine();
        assert!(engine.stop("Q", None).is_ok());
        assert!(engine.stop("nonexistent", None).is_ok());
    }

    #[test]
    fn test_update_idle_pad_is_noop() {
        let engine = loaded_engine();
        assert!(engine.update_params("Q", &PlayParams::default()).is_ok());
        assert!(engine.active_pads().is_empty());
    }

    #[test]
    fn test_stop_moves_voice_to_release() {
        let engine = loaded_engine();
        let mut params = PlayParams::default();
        params.release = 0.2;
        engine.play("Q", &params).unwrap();
        engine.stop("Q", None).unwrap();

        let state = engine.shared_state();
        let state = state.lock();
        let voice = state.voices.get("Q").unwrap();
        assert_eq!(voice.phase(), EnvelopePhase::Releasing);
    }

    #[test]
    fn test_stop_with_explicit_release_overrides() {
        let engine = loaded_engine();
        engine.play("Q", &PlayParams::default()).unwrap();
        engine.stop("Q", Some(0.5)).unwrap();

        let state = engine.shared_state();
        let state = state.lock();
        let voice = state.voices.get("Q").unwrap();
        assert_eq!(voice.release_samples(), (SR as f64 * 0.5) as u64);
    }

    #[test]
    fn test_silence_all_clears_immediately() {
        let engine = loaded_engine();
        engine.play("Q", &PlayParams::default()).unwrap();
        engine.silence_all();
        assert!(engine.active_pads().is_empty());
    }

    #[test]
    fn test_unload_keeps_live_voice() {
        let engine = loaded_engine();
        engine.play("Q", &PlayParams::default()).unwrap();
        assert!(engine.unload("Q"));

        assert_eq!(engine.active_pads(), vec!["Q".to_string()]);
        // Retriggering after unload fails; the stored binding is gone.
        let err = engine.play("Q", &PlayParams::default()).unwrap_err();
        assert!(matches!(err, EngineError::PadNotLoaded(_)));
    }

    #[test]
    fn test_validation_rejects_bad_params() {
        let engine = loaded_engine();

        let mut params = PlayParams::default();
        params.volume = 2.0;
        assert!(engine.play("Q", &params).is_err());

        let mut params = PlayParams::default();
        params.trim_in = 1.0;
        params.trim_out = Some(0.5);
        assert!(engine.play("Q", &params).is_err());

        let mut params = PlayParams::default();
        params.sync = true;
        params.sample_bpm = 0.0;
        assert!(engine.play("Q", &params).is_err());

        let mut params = PlayParams::default();
        params.attack = -0.5;
        assert!(engine.play("Q", &params).is_err());

        assert!(engine.active_pads().is_empty());
    }

    #[test]
    fn test_master_controls_validate() {
        let engine = Engine::new(SR);
        assert!(engine.set_master_bpm(0.0).is_err());
        assert!(engine.set_master_bpm(f32::NAN).is_err());
        assert!(engine.set_master_gain(-1.0).is_err());
        assert!(engine.set_master_bpm(93.0).is_ok());
        assert!(engine.set_master_gain(0.8).is_ok());
        assert_eq!(engine.master_bpm(), 93.0);
        assert_eq!(engine.master_gain(), 0.8);
    }

    #[test]
    fn test_stop_rejects_negative_release() {
        let engine = loaded_engine();
        engine.play("Q", &PlayParams::default()).unwrap();
        assert!(engine.stop("Q", Some(-1.0)).is_err());
    }

    #[test]
    fn test_query_levels_reports_active_pads() {
        let engine = loaded_engine();
        engine.play("Q", &PlayParams::default()).unwrap();

        let response = engine.query_levels();
        assert_eq!(response.active_pads, vec!["Q".to_string()]);
    }

    #[test]
    fn test_pad_waveform() {
        let engine = loaded_engine();
        assert!(engine.pad_waveform("Q").is_some());
        assert!(engine.pad_waveform("W").is_none());
    }
}
