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

use std::collections::HashMap;

use serde::Deserialize;

use crate::engine::PlayParams;

use super::error::ConfigError;

/// A YAML representation of a pad bank: the samples to preload and the
/// session-wide defaults to apply before the first trigger.
#[derive(Deserialize, Clone)]
pub struct Bank {
    /// The output device to use. When unset, the default device is used.
    device: Option<String>,

    /// The master tempo in beats per minute (default: 120).
    master_bpm: Option<f32>,

    /// The master output gain (default: 1.0).
    master_gain: Option<f32>,

    /// The pads to preload, keyed by pad name.
    #[serde(default)]
    pads: HashMap<String, PadDefinition>,
}

/// A YAML representation of one pad: the sample file and its default
/// playback parameters.
#[derive(Deserialize, Clone)]
pub struct PadDefinition {
    /// Path to the sample file, relative to the bank file.
    file: String,

    /// The sample's tempo. When unset, the tempo is estimated at load time.
    bpm: Option<f32>,

    /// Default trigger gain.
    volume: Option<f32>,

    /// Default attack time in seconds.
    attack: Option<f32>,

    /// Default release time in seconds.
    release: Option<f32>,

    /// Whether the pad loops by default.
    #[serde(rename = "loop")]
    looping: Option<bool>,

    /// Default start of the playback window in seconds.
    trim_in: Option<f32>,

    /// Default end of the playback window in seconds.
    trim_out: Option<f32>,

    /// Whether the pad follows the master tempo by default.
    sync: Option<bool>,
}

impl Bank {
    /// Parses a bank from YAML.
    pub fn parse(yaml: &str) -> Result<Bank, ConfigError> {
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Returns the configured output device, if any.
    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    /// Returns the master tempo (default: 120).
    pub fn master_bpm(&self) -> f32 {
        self.master_bpm.unwrap_or(crate::buffer::DEFAULT_BPM)
    }

    /// Returns the master gain (default: 1.0).
    pub fn master_gain(&self) -> f32 {
        self.master_gain.unwrap_or(1.0)
    }

    /// Returns the pad definitions keyed by pad name.
    pub fn pads(&self) -> &HashMap<String, PadDefinition> {
        &self.pads
    }
}

impl PadDefinition {
    /// Returns the sample file path, relative to the bank file.
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Returns the declared tempo, if any.
    pub fn bpm(&self) -> Option<f32> {
        self.bpm
    }

    /// Builds the default playback parameters for this pad. The sample tempo
    /// is filled in by the caller once the sample has been loaded.
    pub fn play_params(&self) -> PlayParams {
        let defaults = PlayParams::default();
        PlayParams {
            volume: self.volume.unwrap_or(defaults.volume),
            attack: self.attack.unwrap_or(defaults.attack),
            release: self.release.unwrap_or(defaults.release),
            looping: self.looping.unwrap_or(defaults.looping),
            trim_in: self.trim_in.unwrap_or(defaults.trim_in),
            trim_out: self.trim_out,
            sync: self.sync.unwrap_or(defaults.sync),
            sample_bpm: self.bpm.unwrap_or(defaults.sample_bpm),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_bank() {
        let bank = Bank::parse(
            r#"
device: "Scarlett 2i2"
master_bpm: 93
master_gain: 0.8
pads:
  Q:
    file: samples/kick.wav
    bpm: 120
    volume: 0.9
    attack: 0.01
    release: 0.25
    loop: true
    trim_in: 0.5
    trim_out: 2.5
    sync: true
  W:
    file: samples/snare.flac
"#,
        )
        .unwrap();

        assert_eq!(bank.device(), Some("Scarlett 2i2"));
        assert_eq!(bank.master_bpm(), 93.0);
        assert_eq!(bank.master_gain(), 0.8);
        assert_eq!(bank.pads().len(), 2);

        let pad = &bank.pads()["Q"];
        assert_eq!(pad.file(), "samples/kick.wav");
        assert_eq!(pad.bpm(), Some(120.0));

        let params = pad.play_params();
        assert_eq!(params.volume, 0.9);
        assert_eq!(params.attack, 0.01);
        assert_eq!(params.release, 0.25);
        assert!(params.looping);
        assert_eq!(params.trim_in, 0.5);
        assert_eq!(params.trim_out, Some(2.5));
        assert!(params.sync);
        assert_eq!(params.sample_bpm, 120.0);
    }

    #[test]
    fn test_defaults_apply() {
        let bank = Bank::parse(
            r#"
pads:
  Q:
    file: samples/kick.wav
"#,
        )
        .unwrap();

        assert_eq!(bank.device(), None);
        assert_eq!(bank.master_bpm(), 120.0);
        assert_eq!(bank.master_gain(), 1.0);

        let params = bank.pads()["Q"].play_params();
        assert_eq!(params, PlayParams::default());
    }

    #[test]
    fn test_empty_bank() {
        let bank = Bank::parse("{}").unwrap();
        assert!(bank.pads().is_empty());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(Bank::parse(
            r#"
pads:
  Q:
    volume: 0.5
"#,
        )
        .is_err());
    }
}
