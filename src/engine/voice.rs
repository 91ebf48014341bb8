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

//! A single playback instance of a pad's buffer.
//!
//! Voices track a fractional source position for playback-rate conversion and
//! run an attack/sustain/release gain envelope. All per-frame processing here
//! is plain arithmetic; nothing allocates or blocks.

use std::sync::Arc;

use crate::buffer::PadBuffer;
use crate::engine::PlayParams;

/// Seconds over which a retargeted gain slews to its new value. Keeps live
/// volume automation free of step discontinuities.
const GAIN_SLEW_SECONDS: f32 = 0.005;

/// The envelope state of a voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopePhase {
    /// Gain ramps linearly from zero to the target.
    Attack,
    /// Gain holds at the target.
    Sustain,
    /// Gain ramps linearly to zero, after which the voice is removed.
    Releasing,
}

/// One frame of rendered voice output.
pub struct FrameOut {
    /// Left output sample, post-gain.
    pub left: f32,
    /// Right output sample, post-gain.
    pub right: f32,
    /// Pre-gain sample for level metering.
    pub visual: f32,
}

/// An active (or fading) playback instance.
pub struct Voice {
    /// Shared reference to the decoded sample.
    buffer: Arc<PadBuffer>,
    /// Fractional playback position in source frames.
    position: f64,
    /// Source sample rate over device sample rate. Tempo sync scales this
    /// further at render time.
    base_rate: f64,
    looping: bool,
    /// Trim window in source frames, `trim_in < trim_out <= frames`.
    trim_in: f64,
    trim_out: f64,
    /// Target gain from the play/update command.
    target_gain: f32,
    /// Gain actually applied, slewed toward the target.
    applied_gain: f32,
    /// Per-sample slew step, in gain units.
    slew_step: f32,
    /// Envelope durations in device samples.
    attack_samples: u64,
    release_samples: u64,
    phase: EnvelopePhase,
    /// Device samples spent in attack/sustain so far.
    env_pos: u64,
    /// Device samples spent releasing so far.
    release_pos: u64,
    /// Envelope gain captured when the release began.
    release_from: f32,
    sync: bool,
    sample_bpm: f32,
    device_sample_rate: u32,
    finished: bool,
}

impl Voice {
    /// Creates a voice starting in `Attack` at the trim-in point.
    pub fn new(buffer: Arc<PadBuffer>, params: &PlayParams, device_sample_rate: u32) -> Voice {
        let file_rate = buffer.sample_rate() as f64;
        let frames = buffer.frames() as f64;

        let trim_in = (params.trim_in as f64 * file_rate).min(frames);
        let trim_out = params
            .trim_out
            .map(|t| (t as f64 * file_rate).min(frames))
            .unwrap_or(frames)
            .max(trim_in);

        let device_rate = device_sample_rate as f64;
        Voice {
            position: trim_in,
            base_rate: file_rate / device_rate,
            looping: params.looping,
            trim_in,
            trim_out,
            target_gain: params.volume,
            applied_gain: params.volume,
            slew_step: 1.0 / (GAIN_SLEW_SECONDS * device_sample_rate as f32),
            attack_samples: (params.attack as f64 * device_rate) as u64,
            release_samples: (params.release as f64 * device_rate) as u64,
            phase: EnvelopePhase::Attack,
            env_pos: 0,
            release_pos: 0,
            release_from: 1.0,
            sync: params.sync,
            sample_bpm: params.sample_bpm,
            device_sample_rate,
            finished: false,
            buffer,
        }
    }

    /// Applies new parameters in place without resetting the playback
    /// position or envelope phase.
    pub fn update(&mut self, params: &PlayParams) {
        let file_rate = self.buffer.sample_rate() as f64;
        let frames = self.buffer.frames() as f64;
        let device_rate = self.device_sample_rate as f64;

        self.target_gain = params.volume;
        self.looping = params.looping;
        self.trim_in = (params.trim_in as f64 * file_rate).min(frames);
        self.trim_out = params
            .trim_out
            .map(|t| (t as f64 * file_rate).min(frames))
            .unwrap_or(frames)
            .max(self.trim_in);
        self.sync = params.sync;
        self.sample_bpm = params.sample_bpm;
        self.attack_samples = (params.attack as f64 * device_rate) as u64;
        if self.phase != EnvelopePhase::Releasing {
            self.release_samples = (params.release as f64 * device_rate) as u64;
        }
    }

    /// The playback rate for the current cycle. Tempo sync scales the base
    /// rate by master over sample tempo; disabling sync returns to native
    /// rate without rescaling the in-flight position.
    pub fn effective_rate(&self, master_bpm: f32) -> f64 {
        if self.sync && self.sample_bpm > 0.0 && master_bpm > 0.0 {
            self.base_rate * (master_bpm as f64 / self.sample_bpm as f64)
        } else {
            self.base_rate
        }
    }

    /// Device samples until the current playback iteration ends (trim-out for
    /// a one-shot, the wrap point for a loop), at the current effective rate.
    pub fn remaining_device_samples(&self, master_bpm: f32) -> f64 {
        let rate = self.effective_rate(master_bpm);
        if rate <= 0.0 {
            return 0.0;
        }
        ((self.trim_out - self.position) / rate).max(0.0)
    }

    /// The current envelope gain in `[0, 1]`.
    pub fn envelope_gain(&self) -> f32 {
        match self.phase {
            EnvelopePhase::Attack => {
                if self.attack_samples == 0 {
                    1.0
                } else {
                    (self.env_pos as f32 / self.attack_samples as f32).min(1.0)
                }
            }
            EnvelopePhase::Sustain => 1.0,
            EnvelopePhase::Releasing => {
                if self.release_samples == 0 {
                    0.0
                } else {
                    let progress = self.release_pos as f32 / self.release_samples as f32;
                    self.release_from * (1.0 - progress.min(1.0))
                }
            }
        }
    }

    /// Transitions to `Releasing`.
    ///
    /// A caller-supplied release duration overrides the engine's computation
    /// entirely. Otherwise the configured release is clamped symmetrically to
    /// the elapsed attack time when the attack was interrupted, and to the
    /// remaining iteration time so the fade never bleeds past a boundary.
    pub fn begin_release(&mut self, custom_release_samples: Option<u64>, remaining: f64) {
        if self.phase == EnvelopePhase::Releasing {
            return;
        }

        self.release_from = self.envelope_gain();
        match custom_release_samples {
            Some(samples) => self.release_samples = samples,
            None => {
                if self.env_pos < self.attack_samples {
                    self.release_samples = self.release_samples.min(self.env_pos);
                }
                self.release_samples = self.release_samples.min(remaining.ceil() as u64);
            }
        }
        self.release_pos = 0;
        self.phase = EnvelopePhase::Releasing;
    }

    /// Renders one device frame: interpolated read, gain, envelope and
    /// position advancement. Returns `None` once the voice no longer
    /// contributes and should be pruned.
    pub fn process_frame(&mut self, master_bpm: f32) -> Option<FrameOut> {
        if self.finished {
            return None;
        }

        // A one-shot begins its natural release so the fade reaches zero
        // exactly at trim-out.
        if self.phase != EnvelopePhase::Releasing && !self.looping {
            let remaining = self.remaining_device_samples(master_bpm);
            if remaining <= self.release_samples as f64 {
                self.begin_release(None, remaining);
            }
        }

        let env = self.envelope_gain();
        let Some((left_raw, right_raw)) = self.sample_at(self.position) else {
            // Dangling read past the end of the data: skip this voice's
            // contribution and schedule removal.
            self.finished = true;
            return None;
        };

        // Slew the applied gain toward the target.
        let delta = self.target_gain - self.applied_gain;
        if delta.abs() <= self.slew_step {
            self.applied_gain = self.target_gain;
        } else {
            self.applied_gain += self.slew_step * delta.signum();
        }

        let gain = env * self.applied_gain;
        let out = FrameOut {
            left: left_raw * gain,
            right: right_raw * gain,
            visual: 0.5 * (left_raw + right_raw),
        };

        // Advance the envelope. Release completion takes precedence over the
        // loop-wrap handling below when both land in the same cycle.
        match self.phase {
            EnvelopePhase::Releasing => {
                self.release_pos += 1;
                if self.release_pos >= self.release_samples {
                    self.finished = true;
                }
            }
            EnvelopePhase::Attack => {
                self.env_pos += 1;
                if self.env_pos >= self.attack_samples {
                    self.phase = EnvelopePhase::Sustain;
                }
            }
            EnvelopePhase::Sustain => self.env_pos += 1,
        }

        self.position += self.effective_rate(master_bpm);
        if !self.finished {
            if self.looping {
                // Wrap by subtracting the slice length, preserving the
                // fractional offset so the wrap is click-free.
                let slice = self.trim_out - self.trim_in;
                if slice > 0.0 {
                    while self.position >= self.trim_out {
                        self.position -= slice;
                    }
                } else {
                    self.finished = true;
                }
            } else if self.position >= self.trim_out {
                self.finished = true;
            }
        }

        Some(out)
    }

    /// Linear interpolation between the two frames bracketing the fractional
    /// position. Mono buffers feed both outputs.
    fn sample_at(&self, position: f64) -> Option<(f32, f32)> {
        let frames = self.buffer.frames();
        let index = position.floor() as usize;
        if position < 0.0 || index >= frames {
            return None;
        }
        let frac = (position - index as f64) as f32;
        let data = self.buffer.data();

        match self.buffer.channels() {
            1 => {
                let s0 = data[index];
                let s1 = if index + 1 < frames { data[index + 1] } else { 0.0 };
                let s = s0 + frac * (s1 - s0);
                Some((s, s))
            }
            _ => {
                let base = index * 2;
                let (l0, r0) = (data[base], data[base + 1]);
                let (l1, r1) = if index + 1 < frames {
                    (data[base + 2], data[base + 3])
                } else {
                    (l0, r0)
                };
                Some((l0 + frac * (l1 - l0), r0 + frac * (r1 - r0)))
            }
        }
    }

    /// Whether the voice has completed and should be pruned.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// The current envelope phase.
    pub fn phase(&self) -> EnvelopePhase {
        self.phase
    }

    /// The fractional playback position in source frames.
    pub fn position(&self) -> f64 {
        self.position
    }

    /// The effective release duration in device samples.
    pub fn release_samples(&self) -> u64 {
        self.release_samples
    }
}

impl std::fmt::Debug for Voice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Voice")
            .field("position", &self.position)
            .field("phase", &self.phase)
            .field("looping", &self.looping)
            .field("sync", &self.sync)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PlayParams;

    const SR: u32 = 44100;

    fn test_buffer(seconds: f32) -> Arc<PadBuffer> {
        let pcm = vec![0.5f32; (SR as f32 * seconds) as usize];
        Arc::new(PadBuffer::from_pcm(pcm, SR, 1, Some(100.0)).unwrap())
    }

    fn params() -> PlayParams {
        PlayParams {
            volume: 1.0,
            attack: 0.0,
            release: 0.0,
            looping: false,
            trim_in: 0.0,
            trim_out: None,
            sync: false,
            sample_bpm: 100.0,
        }
    }

    fn run_frames(voice: &mut Voice, frames: usize, master_bpm: f32) {
        for _ in 0..frames {
            voice.process_frame(master_bpm);
        }
    }

    #[test]
    fn test_attack_ramp() {
        let mut p = params();
        p.attack = 0.1;
        let mut voice = Voice::new(test_buffer(2.0), &p, SR);

        assert_eq!(voice.phase(), EnvelopePhase::Attack);
        assert_eq!(voice.envelope_gain(), 0.0);

        // Halfway through a 0.1s attack the gain is 0.5.
        run_frames(&mut voice, (SR / 20) as usize, 120.0);
        assert_eq!(voice.phase(), EnvelopePhase::Attack);
        assert!((voice.envelope_gain() - 0.5).abs() < 0.01);

        run_frames(&mut voice, (SR / 20) as usize, 120.0);
        assert_eq!(voice.phase(), EnvelopePhase::Sustain);
        assert_eq!(voice.envelope_gain(), 1.0);
    }

    #[test]
    fn test_symmetric_release_clamp() {
        let mut p = params();
        p.attack = 0.1;
        p.release = 0.5;
        let mut voice = Voice::new(test_buffer(2.0), &p, SR);

        // Stop halfway through the attack: the release mirrors the elapsed
        // attack time, not the configured half second.
        let elapsed = (SR / 20) as u64;
        run_frames(&mut voice, elapsed as usize, 120.0);
        let remaining = voice.remaining_device_samples(120.0);
        voice.begin_release(None, remaining);

        assert_eq!(voice.phase(), EnvelopePhase::Releasing);
        assert_eq!(voice.release_samples(), elapsed);
        assert!((voice.envelope_gain() - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_custom_release_overrides_clamps() {
        let mut p = params();
        p.attack = 0.1;
        p.release = 0.5;
        let mut voice = Voice::new(test_buffer(2.0), &p, SR);

        run_frames(&mut voice, (SR / 20) as usize, 120.0);
        let remaining = voice.remaining_device_samples(120.0);
        voice.begin_release(Some(1234), remaining);
        assert_eq!(voice.release_samples(), 1234);
    }

    #[test]
    fn test_boundary_release_clamp() {
        let mut p = params();
        p.release = 0.5;
        p.trim_out = Some(1.0);
        p.looping = true;
        let mut voice = Voice::new(test_buffer(2.0), &p, SR);

        // Stop with 0.2s left before the wrap point: the fade is clamped to
        // the remainder so it never bleeds past the boundary.
        run_frames(&mut voice, (SR as f64 * 0.8) as usize, 120.0);
        let remaining = voice.remaining_device_samples(120.0);
        voice.begin_release(None, remaining);

        let expected = (SR as f64 * 0.2) as u64;
        assert!(
            voice.release_samples().abs_diff(expected) <= 1,
            "release {} vs expected {}",
            voice.release_samples(),
            expected
        );
    }

    #[test]
    fn test_one_shot_natural_release_ends_at_trim_out() {
        let mut p = params();
        p.release = 0.5;
        p.trim_out = Some(1.0);
        let mut voice = Voice::new(test_buffer(2.0), &p, SR);

        // At 0.5s remaining the natural fade begins unprompted.
        run_frames(&mut voice, (SR / 2) as usize + 2, 120.0);
        assert_eq!(voice.phase(), EnvelopePhase::Releasing);

        // It reaches zero and removes the voice right at the boundary.
        run_frames(&mut voice, (SR / 2) as usize + 2, 120.0);
        assert!(voice.is_finished());
    }

    #[test]
    fn test_release_completion_removes_voice() {
        let mut p = params();
        p.release = 0.01;
        let mut voice = Voice::new(test_buffer(2.0), &p, SR);

        run_frames(&mut voice, 100, 120.0);
        let remaining = voice.remaining_device_samples(120.0);
        voice.begin_release(None, remaining);

        // 0.01s of release, then the voice is gone. Attack was zero, so the
        // symmetric clamp does not apply.
        let release_frames = voice.release_samples() as usize;
        assert_eq!(release_frames, 441);
        run_frames(&mut voice, release_frames, 120.0);
        assert!(voice.is_finished());
        assert!(voice.process_frame(120.0).is_none());
    }

    #[test]
    fn test_sync_halves_rate() {
        let mut p = params();
        p.sync = true;
        p.sample_bpm = 120.0;
        let voice = Voice::new(test_buffer(2.0), &p, SR);

        assert!((voice.effective_rate(60.0) - 0.5).abs() < 1e-9);
        assert!((voice.effective_rate(120.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_sync_doubles_perceived_duration() {
        let mut p = params();
        p.sync = true;
        p.sample_bpm = 120.0;
        p.trim_out = Some(1.0);
        let voice = Voice::new(test_buffer(2.0), &p, SR);

        let native = voice.remaining_device_samples(120.0);
        let halved = voice.remaining_device_samples(60.0);
        assert!((halved / native - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_loop_wrap_preserves_fraction() {
        let mut p = params();
        p.looping = true;
        p.trim_out = Some(1.0);
        let mut voice = Voice::new(test_buffer(2.0), &p, SR);

        // 2.5 seconds of playback at native rate: exactly 2.5 iterations.
        run_frames(&mut voice, (SR as f64 * 2.5) as usize, 120.0);
        assert!(!voice.is_finished());
        let expected = SR as f64 * 0.5;
        assert!(
            (voice.position() - expected).abs() < 1.0,
            "position {} vs expected {}",
            voice.position(),
            expected
        );
    }

    #[test]
    fn test_position_never_negative_or_past_trim_out() {
        let mut p = params();
        p.looping = true;
        p.trim_in = 0.25;
        p.trim_out = Some(0.5);
        let mut voice = Voice::new(test_buffer(2.0), &p, SR);

        let trim_out_frames = SR as f64 * 0.5;
        for _ in 0..(SR as usize) {
            voice.process_frame(120.0);
            assert!(voice.position() >= 0.0);
            assert!(voice.position() < trim_out_frames);
        }
    }

    #[test]
    fn test_one_shot_finishes_at_trim_out() {
        let mut p = params();
        p.trim_out = Some(0.5);
        let mut voice = Voice::new(test_buffer(2.0), &p, SR);

        run_frames(&mut voice, (SR / 2) as usize + 2, 120.0);
        assert!(voice.is_finished());
    }

    #[test]
    fn test_update_preserves_position_and_phase() {
        let mut p = params();
        p.attack = 0.1;
        let mut voice = Voice::new(test_buffer(2.0), &p, SR);
        run_frames(&mut voice, 1000, 120.0);

        let position = voice.position();
        let mut update = params();
        update.volume = 0.5;
        update.looping = true;
        voice.update(&update);

        assert_eq!(voice.position(), position);
        assert_eq!(voice.phase(), EnvelopePhase::Attack);
    }

    #[test]
    fn test_gain_slew_is_gradual() {
        let mut voice = Voice::new(test_buffer(2.0), &params(), SR);
        run_frames(&mut voice, 100, 120.0);

        let mut update = params();
        update.volume = 0.0;
        voice.update(&update);

        // The first frame after the update is still near the old gain.
        let out = voice.process_frame(120.0).unwrap();
        assert!(out.left > 0.45, "gain stepped instead of slewing");

        // After the slew window the new target applies.
        run_frames(&mut voice, 500, 120.0);
        let out = voice.process_frame(120.0).unwrap();
        assert_eq!(out.left, 0.0);
    }

    #[test]
    fn test_stereo_interpolation() {
        let mut pcm = Vec::new();
        for i in 0..1000 {
            pcm.push(i as f32 / 1000.0); // left ramp
            pcm.push(-(i as f32) / 1000.0); // right ramp
        }
        let buffer = Arc::new(PadBuffer::from_pcm(pcm, SR, 2, Some(100.0)).unwrap());
        let mut voice = Voice::new(buffer, &params(), SR);

        let out = voice.process_frame(120.0).unwrap();
        assert_eq!(out.left, 0.0);
        let out = voice.process_frame(120.0).unwrap();
        assert!((out.left - 0.001).abs() < 1e-6);
        assert!((out.right + 0.001).abs() < 1e-6);
    }

    #[test]
    fn test_dangling_position_is_skipped() {
        let mut p = params();
        p.trim_in = 10.0; // past the end of a 2s buffer, clamped to the end
        let mut voice = Voice::new(test_buffer(2.0), &p, SR);

        assert!(voice.process_frame(120.0).is_none());
        assert!(voice.is_finished());
    }
}
