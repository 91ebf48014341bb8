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

use crate::buffer::decode::DecodeError;

/// Typed errors for the engine command surface. None of these ever propagate
/// into the audio callback; they are rejected at the command boundary with
/// prior state unchanged.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The given audio could not be decoded into usable PCM. The pad remains
    /// unloaded.
    #[error("No usable audio: {0}")]
    DecodeUnavailable(String),

    /// A command parameter failed boundary validation.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A play command referenced a pad with no loaded sample.
    #[error("Pad {0} has no sample loaded")]
    PadNotLoaded(String),

    /// An output device could not be found, configured, or started.
    #[error("Audio device error: {0}")]
    Device(String),
}

impl From<DecodeError> for EngineError {
    fn from(err: DecodeError) -> Self {
        EngineError::DecodeUnavailable(err.to_string())
    }
}
