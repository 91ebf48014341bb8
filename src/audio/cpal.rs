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

//! The cpal output backend.
//!
//! The device callback locks the shared engine state and renders each block
//! in place. Critical sections on the command side are short, so the callback
//! never waits long enough to underrun at practical buffer sizes.

use std::fmt;
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use tracing::{error, info};

use crate::engine::{mixer, EngineError, EngineState};

/// A small wrapper around a cpal::Device with the extra data that makes
/// listing and selection convenient.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The maximum number of output channels the device supports.
    max_channels: u16,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

/// The negotiated output configuration, resolved before the engine is built
/// so the engine can adopt the device's sample rate.
pub struct OutputConfig {
    /// The device sample rate.
    pub sample_rate: u32,
    /// The device channel count.
    pub channels: u16,
    sample_format: cpal::SampleFormat,
    config: cpal::StreamConfig,
}

/// A running output stream. Playback stops when this is dropped.
pub struct Output {
    _stream: cpal::Stream,
}

impl Device {
    /// Lists output-capable cpal devices, sorted by name.
    pub fn list() -> Result<Vec<Device>, EngineError> {
        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host = cpal::host_from_id(host_id)
                .map_err(|e| EngineError::Device(e.to_string()))?;
            let host_devices = match host.devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let Ok(output_configs) = device.supported_output_configs() else {
                    continue;
                };
                let max_channels = output_configs
                    .map(|config| config.channels())
                    .max()
                    .unwrap_or(0);

                if max_channels > 0 {
                    devices.push(Device {
                        name: device
                            .name()
                            .map_err(|e| EngineError::Device(e.to_string()))?,
                        max_channels,
                        host_id,
                        device,
                    });
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Gets the device with the given name. With no name, the default host's
    /// default output device is used.
    pub fn get(name: Option<&str>) -> Result<Device, EngineError> {
        match name {
            Some(name) => Device::list()?
                .into_iter()
                .find(|device| device.name.trim() == name)
                .ok_or_else(|| {
                    EngineError::Device(format!("no device found with name {}", name))
                }),
            None => {
                let host = cpal::default_host();
                let device = host.default_output_device().ok_or_else(|| {
                    EngineError::Device("no default output device".to_string())
                })?;
                let max_channels = device
                    .supported_output_configs()
                    .map_err(|e| EngineError::Device(e.to_string()))?
                    .map(|config| config.channels())
                    .max()
                    .unwrap_or(0);
                Ok(Device {
                    name: device
                        .name()
                        .map_err(|e| EngineError::Device(e.to_string()))?,
                    max_channels,
                    host_id: host.id(),
                    device,
                })
            }
        }
    }

    /// The name of the device.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolves the device's default output configuration.
    pub fn output_config(&self) -> Result<OutputConfig, EngineError> {
        let supported = self
            .device
            .default_output_config()
            .map_err(|e| EngineError::Device(e.to_string()))?;

        Ok(OutputConfig {
            sample_rate: supported.sample_rate(),
            channels: supported.channels(),
            sample_format: supported.sample_format(),
            config: supported.config(),
        })
    }

    /// Builds and starts the output stream. Every callback locks the shared
    /// state and renders one block through the mixer.
    pub fn start(
        &self,
        output_config: &OutputConfig,
        state: Arc<Mutex<EngineState>>,
    ) -> Result<Output, EngineError> {
        let channels = output_config.channels as usize;
        let config = output_config.config.clone();

        let stream = match output_config.sample_format {
            cpal::SampleFormat::F32 => {
                let state = Arc::clone(&state);
                self.device
                    .build_output_stream(
                        &config,
                        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                            let mut state = state.lock();
                            mixer::render_block(&mut state, data, channels);
                        },
                        |err| error!(err = err.to_string(), "Output stream error"),
                        None,
                    )
                    .map_err(|e| EngineError::Device(e.to_string()))?
            }
            cpal::SampleFormat::I16 => self.converting_stream::<i16>(&config, channels, state)?,
            cpal::SampleFormat::U16 => self.converting_stream::<u16>(&config, channels, state)?,
            cpal::SampleFormat::I32 => self.converting_stream::<i32>(&config, channels, state)?,
            other => {
                return Err(EngineError::Device(format!(
                    "unsupported sample format {}",
                    other
                )));
            }
        };

        stream
            .play()
            .map_err(|e| EngineError::Device(e.to_string()))?;
        info!(
            device = self.name,
            sample_rate = output_config.sample_rate,
            channels = output_config.channels,
            "Output stream started"
        );

        Ok(Output { _stream: stream })
    }

    /// Builds a stream for an integer output format, rendering to a reused
    /// f32 scratch buffer and converting per sample.
    fn converting_stream<T>(
        &self,
        config: &cpal::StreamConfig,
        channels: usize,
        state: Arc<Mutex<EngineState>>,
    ) -> Result<cpal::Stream, EngineError>
    where
        T: cpal::SizedSample + cpal::FromSample<f32>,
    {
        let mut scratch: Vec<f32> = Vec::new();
        self.device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    scratch.resize(data.len(), 0.0);
                    {
                        let mut state = state.lock();
                        mixer::render_block(&mut state, &mut scratch, channels);
                    }
                    for (dst, &src) in data.iter_mut().zip(scratch.iter()) {
                        *dst = T::from_sample(src);
                    }
                },
                |err| error!(err = err.to_string(), "Output stream error"),
                None,
            )
            .map_err(|e| EngineError::Device(e.to_string()))
    }
}
