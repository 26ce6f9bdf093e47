// Copyright (C) 2024 Michael Wilson <mike@mdwn.dev>
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
use std::{error::Error, fmt, sync::Mutex};

use midir::{MidiOutput, MidiOutputConnection, MidiOutputPort};
use midly::{live::LiveEvent, num::u4, num::u7};
use tracing::debug;

use crate::config;

pub struct Device {
    name: String,
    output_port: Option<MidiOutputPort>,
    /// Held open for the lifetime of the device so that each hit doesn't pay
    /// for a fresh connection.
    connection: Mutex<Option<MidiOutputConnection>>,
    channel: u4,
    note: u7,
}

impl super::Device for Device {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn send_note_on(&self, velocity: u7) -> Result<(), Box<dyn Error>> {
        let mut connection = self.connection.lock().expect("unable to get lock");
        let connection = match connection.as_mut() {
            Some(connection) => connection,
            None => return Err("MIDI device is not connected".into()),
        };

        let event = LiveEvent::Midi {
            channel: self.channel,
            message: midly::MidiMessage::NoteOn {
                key: self.note,
                vel: velocity,
            },
        };

        debug!(
            device = self.name,
            velocity = velocity.as_int(),
            "Sending note on."
        );

        let mut buf: Vec<u8> = Vec::with_capacity(8);
        event.write(&mut buf)?;
        connection.send(&buf)?;

        Ok(())
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Output)", self.name)
    }
}

/// Lists midir devices and produces the Device trait.
pub fn list() -> Result<Vec<Box<dyn super::Device>>, Box<dyn Error>> {
    Ok(list_midir_devices()?
        .into_iter()
        .map(|device| {
            let device: Box<dyn super::Device> = Box::new(device);
            device
        })
        .collect())
}

/// Lists midir output devices.
fn list_midir_devices() -> Result<Vec<Device>, Box<dyn Error>> {
    let output = MidiOutput::new("mtrigger output listing")?;

    let mut devices: Vec<Device> = Vec::new();
    for port in output.ports() {
        devices.push(Device {
            name: output.port_name(&port)?,
            output_port: Some(port),
            connection: Mutex::new(None),
            channel: u4::from(0),
            note: u7::from(0),
        });
    }

    devices.sort_by_key(|device| device.name.clone());
    Ok(devices)
}

/// Gets the given midir device and connects to it.
pub fn get(config: &config::Midi) -> Result<Device, Box<dyn Error>> {
    let name = config.device();
    let mut matches = list_midir_devices()?
        .into_iter()
        .filter(|device| device.name.contains(name))
        .collect::<Vec<Device>>();

    if matches.is_empty() {
        return Err(format!("no device found with name {}", name).into());
    }
    if matches.len() > 1 {
        return Err(format!(
            "found too many devices that match ({}), use a less ambiguous device name",
            matches
                .iter()
                .map(|device| device.name.clone())
                .collect::<Vec<String>>()
                .join(", ")
        )
        .into());
    }

    // We've verified that there's only one element in the vector, so this should be safe.
    let mut device = matches.swap_remove(0);
    device.channel = config.channel()?;
    device.note = config.note()?;

    let output_port = match device.output_port.as_ref() {
        Some(output_port) => output_port,
        None => return Err(format!("device {} has no output port", device.name).into()),
    };
    let output = MidiOutput::new("mtrigger output")?;
    *device.connection.lock().expect("unable to get lock") =
        Some(output.connect(output_port, "mtrigger")?);

    Ok(device)
}
