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
use std::{
    error::Error,
    fmt,
    sync::{Arc, Mutex},
};

use midly::num::{u4, u7};
use tracing::debug;

/// A mock device. Doesn't actually send anything; records what it was asked
/// to send.
#[derive(Clone)]
pub struct Device {
    name: String,
    channel: u4,
    note: u7,
    sent: Arc<Mutex<Vec<u8>>>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str, channel: u4, note: u7) -> Device {
        Device {
            name: name.to_string(),
            channel,
            note,
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The velocities sent so far, in order.
    #[cfg(test)]
    pub fn sent(&self) -> Vec<u8> {
        self.sent.lock().expect("unable to get lock").clone()
    }
}

impl super::Device for Device {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn send_note_on(&self, velocity: u7) -> Result<(), Box<dyn Error>> {
        debug!(
            device = self.name,
            channel = self.channel.as_int(),
            note = self.note.as_int(),
            velocity = velocity.as_int(),
            "Mock note on."
        );

        self.sent
            .lock()
            .expect("unable to get lock")
            .push(velocity.as_int());
        Ok(())
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name,)
    }
}
