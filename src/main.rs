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
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{crate_version, Parser, Subcommand};
use tracing::warn;

use padtrack::audio;
use padtrack::config;
use padtrack::controller::Controller;
use padtrack::engine::{Engine, PlayParams};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A pad-based sample triggering engine."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Starts the engine with the given pad bank.
    Start {
        /// The path to the bank definition.
        bank_path: String,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Start { bank_path } => {
            let bank_path = PathBuf::from(bank_path);
            let bank = config::parse_bank(&bank_path)?;
            let bank_dir = bank_path.parent().unwrap_or(&bank_path).to_path_buf();

            let device = audio::get_device(bank.device())?;
            let output_config = device.output_config()?;
            let engine = Arc::new(Engine::new(output_config.sample_rate));
            engine.set_master_bpm(bank.master_bpm())?;
            engine.set_master_gain(bank.master_gain())?;

            // Preload the bank. A pad that fails to load is skipped so one
            // bad file does not take down the session.
            let mut defaults: HashMap<String, PlayParams> = HashMap::new();
            for (pad, definition) in bank.pads() {
                let path = bank_dir.join(definition.file());
                match engine.load_file(pad, &path, definition.bpm()) {
                    Ok(result) => {
                        let mut params = definition.play_params();
                        params.sample_bpm = result.bpm;
                        defaults.insert(pad.clone(), params);
                    }
                    Err(e) => {
                        warn!(
                            pad = pad.as_str(),
                            file = path.display().to_string(),
                            err = e.to_string(),
                            "Unable to load pad"
                        );
                    }
                }
            }

            let output = device.start(&output_config, engine.shared_state())?;
            Controller::new(engine, defaults).run();
            drop(output);
        }
    }

    Ok(())
}
