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

//! The line-oriented control surface.
//!
//! Commands arrive one per line on stdin, get parsed into `Command` values
//! and dispatched against the engine. Per-pad parameter defaults persist
//! across triggers, so `play Q vol=0.5` followed by `play Q` keeps the
//! halved volume.

use std::collections::HashMap;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use tracing::{error, info};

use crate::engine::{Engine, PlayParams};

/// Controller commands that trigger behavior in the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Decodes a file and binds it to a pad, with an optional declared tempo.
    Load {
        pad: String,
        path: PathBuf,
        bpm: Option<f32>,
    },

    /// Triggers a pad with the pad's defaults plus any overrides.
    Play {
        pad: String,
        overrides: Vec<(String, String)>,
    },

    /// Applies parameter overrides to a pad's live voice without retriggering.
    Update {
        pad: String,
        overrides: Vec<(String, String)>,
    },

    /// Releases a pad, with an optional explicit release time in seconds.
    Stop { pad: String, release: Option<f32> },

    /// Releases every live pad.
    StopAll,

    /// Sets the master tempo.
    Bpm(f32),

    /// Sets the master gain.
    Gain(f32),

    /// Prints the latest level snapshots as JSON.
    Levels,

    /// Exits the controller loop.
    Quit,
}

/// Parses one command line. Empty lines are `None`.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let mut words = line.split_whitespace();
    let Some(keyword) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match keyword {
        "load" => match args.as_slice() {
            [pad, path] => Command::Load {
                pad: pad.to_string(),
                path: PathBuf::from(path),
                bpm: None,
            },
            [pad, path, bpm] => Command::Load {
                pad: pad.to_string(),
                path: PathBuf::from(path),
                bpm: Some(parse_number(bpm, "bpm")?),
            },
            _ => return Err("usage: load <pad> <path> [bpm]".to_string()),
        },
        "play" | "update" => {
            let Some((pad, rest)) = args.split_first() else {
                return Err(format!("usage: {} <pad> [key=value ...]", keyword));
            };
            let overrides = rest
                .iter()
                .map(|arg| {
                    arg.split_once('=')
                        .map(|(key, value)| (key.to_string(), value.to_string()))
                        .ok_or_else(|| format!("expected key=value, got {}", arg))
                })
                .collect::<Result<Vec<_>, String>>()?;
            if keyword == "play" {
                Command::Play {
                    pad: pad.to_string(),
                    overrides,
                }
            } else {
                Command::Update {
                    pad: pad.to_string(),
                    overrides,
                }
            }
        }
        "stop" => match args.as_slice() {
            [pad] => Command::Stop {
                pad: pad.to_string(),
                release: None,
            },
            [pad, release] => Command::Stop {
                pad: pad.to_string(),
                release: Some(parse_number(release, "release")?),
            },
            _ => return Err("usage: stop <pad> [release]".to_string()),
        },
        "stopall" => Command::StopAll,
        "bpm" => match args.as_slice() {
            [bpm] => Command::Bpm(parse_number(bpm, "bpm")?),
            _ => return Err("usage: bpm <value>".to_string()),
        },
        "gain" => match args.as_slice() {
            [gain] => Command::Gain(parse_number(gain, "gain")?),
            _ => return Err("usage: gain <value>".to_string()),
        },
        "levels" => Command::Levels,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("unknown command: {}", other)),
    };
    Ok(Some(command))
}

fn parse_number(value: &str, name: &str) -> Result<f32, String> {
    value
        .parse::<f32>()
        .map_err(|_| format!("invalid {}: {}", name, value))
}

/// Applies key=value overrides on top of a pad's stored parameters.
fn apply_overrides(
    params: &mut PlayParams,
    overrides: &[(String, String)],
) -> Result<(), String> {
    for (key, value) in overrides {
        match key.as_str() {
            "vol" | "volume" => params.volume = parse_number(value, "volume")?,
            "attack" => params.attack = parse_number(value, "attack")?,
            "release" => params.release = parse_number(value, "release")?,
            "loop" => params.looping = parse_flag(value)?,
            "trim_in" => params.trim_in = parse_number(value, "trim_in")?,
            "trim_out" => params.trim_out = Some(parse_number(value, "trim_out")?),
            "sync" => params.sync = parse_flag(value)?,
            "bpm" => params.sample_bpm = parse_number(value, "bpm")?,
            other => return Err(format!("unknown parameter: {}", other)),
        }
    }
    Ok(())
}

fn parse_flag(value: &str) -> Result<bool, String> {
    match value {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        other => Err(format!("invalid flag: {}", other)),
    }
}

/// Drives the engine from stdin commands.
pub struct Controller {
    engine: Arc<Engine>,
    /// Stored per-pad parameters; overrides merge into these.
    defaults: HashMap<String, PlayParams>,
}

impl Controller {
    /// Creates a controller with preloaded per-pad defaults.
    pub fn new(engine: Arc<Engine>, defaults: HashMap<String, PlayParams>) -> Controller {
        Controller { engine, defaults }
    }

    /// Records the sample tempo for a pad's defaults, used by load handling
    /// and bank preloading.
    pub fn set_sample_bpm(&mut self, pad: &str, bpm: f32) {
        self.defaults.entry(pad.to_string()).or_default().sample_bpm = bpm;
    }

    /// Runs the controller loop until `quit` or end of input. Lines are read
    /// on a separate thread so the loop itself never blocks on stdin.
    pub fn run(&mut self) {
        let (line_tx, line_rx) = crossbeam_channel::unbounded::<String>();
        thread::spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                if line_tx.send(line).is_err() {
                    break;
                }
            }
        });

        info!("Controller started");
        while let Ok(line) = line_rx.recv() {
            match parse_command(&line) {
                Ok(Some(Command::Quit)) => break,
                Ok(Some(command)) => {
                    if let Err(e) = self.dispatch(command) {
                        error!(err = e, "Command failed");
                    }
                }
                Ok(None) => {}
                Err(e) => error!(err = e, "Command failed"),
            }
        }
        info!("Controller closing");
    }

    /// Dispatches one parsed command against the engine.
    fn dispatch(&mut self, command: Command) -> Result<(), String> {
        match command {
            Command::Load { pad, path, bpm } => {
                let result = self
                    .engine
                    .load_file(&pad, &path, bpm)
                    .map_err(|e| e.to_string())?;
                self.set_sample_bpm(&pad, result.bpm);
                println!(
                    "loaded {}: {:.2}s, {} bpm",
                    pad, result.duration, result.bpm
                );
            }
            Command::Play { pad, overrides } => {
                let mut params = self.defaults.get(&pad).cloned().unwrap_or_default();
                apply_overrides(&mut params, &overrides)?;
                self.engine.play(&pad, &params).map_err(|e| e.to_string())?;
                self.defaults.insert(pad, params);
            }
            Command::Update { pad, overrides } => {
                let mut params = self.defaults.get(&pad).cloned().unwrap_or_default();
                apply_overrides(&mut params, &overrides)?;
                self.engine
                    .update_params(&pad, &params)
                    .map_err(|e| e.to_string())?;
                self.defaults.insert(pad, params);
            }
            Command::Stop { pad, release } => {
                self.engine.stop(&pad, release).map_err(|e| e.to_string())?;
            }
            Command::StopAll => self.engine.stop_all(),
            Command::Bpm(bpm) => {
                self.engine.set_master_bpm(bpm).map_err(|e| e.to_string())?;
            }
            Command::Gain(gain) => {
                self.engine
                    .set_master_gain(gain)
                    .map_err(|e| e.to_string())?;
            }
            Command::Levels => {
                let response = self.engine.query_levels();
                let json = serde_json::to_string(&response).map_err(|e| e.to_string())?;
                println!("{}", json);
            }
            Command::Quit => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_load() {
        assert_eq!(
            parse_command("load Q samples/kick.wav").unwrap(),
            Some(Command::Load {
                pad: "Q".to_string(),
                path: PathBuf::from("samples/kick.wav"),
                bpm: None,
            })
        );
        assert_eq!(
            parse_command("load Q samples/kick.wav 93.5").unwrap(),
            Some(Command::Load {
                pad: "Q".to_string(),
                path: PathBuf::from("samples/kick.wav"),
                bpm: Some(93.5),
            })
        );
        assert!(parse_command("load Q").is_err());
    }

    #[test]
    fn test_parse_play_with_overrides() {
        assert_eq!(
            parse_command("play Q vol=0.5 loop=on").unwrap(),
            Some(Command::Play {
                pad: "Q".to_string(),
                overrides: vec![
                    ("vol".to_string(), "0.5".to_string()),
                    ("loop".to_string(), "on".to_string()),
                ],
            })
        );
        assert!(parse_command("play Q vol").is_err());
        assert!(parse_command("play").is_err());
    }

    #[test]
    fn test_parse_stop() {
        assert_eq!(
            parse_command("stop Q").unwrap(),
            Some(Command::Stop {
                pad: "Q".to_string(),
                release: None,
            })
        );
        assert_eq!(
            parse_command("stop Q 0.5").unwrap(),
            Some(Command::Stop {
                pad: "Q".to_string(),
                release: Some(0.5),
            })
        );
        assert!(parse_command("stop Q abc").is_err());
    }

    #[test]
    fn test_parse_globals() {
        assert_eq!(parse_command("stopall").unwrap(), Some(Command::StopAll));
        assert_eq!(parse_command("bpm 93").unwrap(), Some(Command::Bpm(93.0)));
        assert_eq!(parse_command("gain 0.8").unwrap(), Some(Command::Gain(0.8)));
        assert_eq!(parse_command("levels").unwrap(), Some(Command::Levels));
        assert_eq!(parse_command("quit").unwrap(), Some(Command::Quit));
        assert_eq!(parse_command("exit").unwrap(), Some(Command::Quit));
    }

    #[test]
    fn test_parse_empty_and_unknown() {
        assert_eq!(parse_command("").unwrap(), None);
        assert_eq!(parse_command("   ").unwrap(), None);
        assert!(parse_command("explode").is_err());
    }

    #[test]
    fn test_apply_overrides() {
        let mut params = PlayParams::default();
        apply_overrides(
            &mut params,
            &[
                ("vol".to_string(), "0.5".to_string()),
                ("attack".to_string(), "0.1".to_string()),
                ("loop".to_string(), "on".to_string()),
                ("trim_out".to_string(), "2.5".to_string()),
                ("sync".to_string(), "true".to_string()),
                ("bpm".to_string(), "93".to_string()),
            ],
        )
        .unwrap();

        assert_eq!(params.volume, 0.5);
        assert_eq!(params.attack, 0.1);
        assert!(params.looping);
        assert_eq!(params.trim_out, Some(2.5));
        assert!(params.sync);
        assert_eq!(params.sample_bpm, 93.0);
    }

    #[test]
    fn test_apply_overrides_rejects_unknown_key() {
        let mut params = PlayParams::default();
        assert!(apply_overrides(
            &mut params,
            &[("reverb".to_string(), "0.5".to_string())]
        )
        .is_err());
    }

    #[test]
    fn test_overrides_persist_across_triggers() {
        let engine = Arc::new(Engine::new(44100));
        engine
            .load("Q", vec![0.5; 44100], 44100, 1, Some(120.0))
            .unwrap();
        let mut controller = Controller::new(Arc::clone(&engine), HashMap::new());

        controller
            .dispatch(Command::Play {
                pad: "Q".to_string(),
                overrides: vec![("vol".to_string(), "0.5".to_string())],
            })
            .unwrap();
        controller
            .dispatch(Command::Play {
                pad: "Q".to_string(),
                overrides: vec![],
            })
            .unwrap();

        assert_eq!(controller.defaults["Q"].volume, 0.5);
    }
}
