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
use std::error::Error;

use midly::num::{u4, u7};
use serde::Deserialize;

const DEFAULT_CHANNEL: u8 = 10;
const DEFAULT_NOTE: u8 = 38;

/// A YAML representation of the MIDI configuration.
#[derive(Deserialize, Clone)]
pub struct Midi {
    /// The MIDI device.
    device: String,

    /// The 1-indexed MIDI channel to emit notes on (default: 10, the
    /// General MIDI percussion channel).
    channel: Option<u8>,

    /// The note to emit (default: 38, acoustic snare).
    note: Option<u8>,
}

impl Midi {
    /// New will create a new MIDI configuration.
    pub fn new(device: &str, channel: Option<u8>, note: Option<u8>) -> Midi {
        Midi {
            device: device.to_string(),
            channel,
            note,
        }
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Returns the channel to emit notes on.
    pub fn channel(&self) -> Result<u4, Box<dyn Error>> {
        parse_channel(self.channel.unwrap_or(DEFAULT_CHANNEL))
    }

    /// Returns the note to emit.
    pub fn note(&self) -> Result<u7, Box<dyn Error>> {
        parse_u7(self.note.unwrap_or(DEFAULT_NOTE))
    }
}

/// Parses a channel. Channels are expressed as 1-16, but really are 0-15.
fn parse_channel(channel: u8) -> Result<u4, Box<dyn Error>> {
    match u4::try_from(channel - 1) {
        Some(val) => Ok(val),
        None => Err(format!("error parsing channel: {} is invalid", channel).into()),
    }
}

/// Parses a raw u7 value.
fn parse_u7(raw: u8) -> Result<u7, Box<dyn Error>> {
    match u7::try_from(raw) {
        Some(val) => Ok(val),
        None => Err(format!("error parsing u7 value: {} is invalid", raw).into()),
    }
}
