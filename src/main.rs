// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
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
mod capture;
mod config;
mod detector;
mod engine;
mod envelope;
mod gate;
mod midi;
mod sampler;
#[cfg(test)]
mod testutil;
mod velocity;

use clap::{crate_version, Parser, Subcommand};
use config::Midi;
use midly::num::u7;
use std::error::Error;
use std::path::PathBuf;

const SYSTEMD_SERVICE: &str = r#"
[Unit]
Description=analog drum trigger

[Service]
Type=simple
Restart=on-failure
EnvironmentFile=-/etc/default/mtrigger
ExecStart=/usr/local/bin/mtrigger run "$MTRIGGER_CONFIG"

[Install]
WantedBy=multi-user.target
Alias=mtrigger.service
"#;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "An analog drum trigger."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio capture devices.
    Devices {},
    /// Lists the available MIDI output devices.
    MidiDevices {},
    /// Sends a single note on through a MIDI device to check the plumbing.
    Hit {
        /// The MIDI device name to send through.
        device_name: String,
        /// The 1-indexed MIDI channel to send on.
        #[arg(short, long)]
        channel: Option<u8>,
        /// The note to send.
        #[arg(short, long)]
        note: Option<u8>,
        /// The velocity to send the note at.
        #[arg(short, long, default_value_t = 127)]
        velocity: u8,
    },
    /// Grabs one full burst from the capture device and dumps it.
    Capture {
        /// The path to the trigger config.
        config_path: String,
    },
    /// Run will start the drum trigger.
    Run {
        /// The path to the trigger config.
        config_path: String,
    },
    /// Prints a systemd service definition to stdout.
    Systemd {},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = sampler::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::MidiDevices {} => {
            let devices = midi::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Hit {
            device_name,
            channel,
            note,
            velocity,
        } => {
            let device = midi::get_device(Some(Midi::new(&device_name, channel, note)))?;
            let velocity = u7::try_from(velocity).ok_or("velocity must be 0-127")?;

            device.send_note_on(velocity)?;
            println!("Sent note on to {}.", device);
        }
        Commands::Capture { config_path } => {
            let (mut capture, analyzer) = config::init_capture(&PathBuf::from(config_path))?;

            println!("Capturing one burst...");
            let buffer = capture.capture_full();
            let samples = buffer.samples();

            for (i, sample) in samples.iter().enumerate() {
                print!("{:<3} ", sample);
                if i % 10 == 9 {
                    println!();
                }
            }
            if samples.len() % 10 != 0 {
                println!();
            }

            let analysis = analyzer.analyze(samples);
            println!(
                "Captured {} samples: average={:.1} peak={} loudness={:.1}",
                samples.len(),
                analysis.average,
                analysis.peak,
                analysis.loudness
            );
        }
        Commands::Run { config_path } => {
            config::init_engine(&PathBuf::from(config_path))?.join().await?;
        }
        Commands::Systemd {} => {
            println!("{}", SYSTEMD_SERVICE)
        }
    }

    Ok(())
}
