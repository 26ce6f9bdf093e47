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
use std::{
    error::Error,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use crossbeam_channel::Sender;

/// A mock source. Produces no samples on its own; tests feed it.
#[derive(Clone)]
pub struct Source {
    name: String,
    started: Arc<AtomicBool>,
    fifo: Arc<Mutex<Option<Sender<u8>>>>,
    tap: Arc<Mutex<Option<Sender<u8>>>>,
}

impl Source {
    /// Gets the given mock source.
    pub fn get(name: &str) -> Source {
        Source {
            name: name.to_string(),
            started: Arc::new(AtomicBool::new(false)),
            fifo: Arc::new(Mutex::new(None)),
            tap: Arc::new(Mutex::new(None)),
        }
    }

    /// Returns true if the source has been started.
    #[cfg(test)]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Relaxed)
    }

    /// Feeds samples into the FIFO as if the device produced them.
    #[cfg(test)]
    pub fn feed(&self, samples: &[u8]) {
        let fifo = self.fifo.lock().expect("Error getting lock");
        if let Some(fifo) = fifo.as_ref() {
            for sample in samples {
                let _ = fifo.try_send(*sample);
            }
        }
    }

    /// Feeds samples into the detector tap.
    #[cfg(test)]
    pub fn feed_tap(&self, samples: &[u8]) {
        let tap = self.tap.lock().expect("Error getting lock");
        if let Some(tap) = tap.as_ref() {
            for sample in samples {
                let _ = tap.try_send(*sample);
            }
        }
    }
}

impl crate::sampler::Source for Source {
    fn start(&self, fifo: Sender<u8>, tap: Option<Sender<u8>>) -> Result<(), Box<dyn Error>> {
        *self.fifo.lock().expect("Error getting lock") = Some(fifo);
        *self.tap.lock().expect("Error getting lock") = tap;
        self.started.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn stop(&self) {
        self.started.store(false, Ordering::Relaxed);

        // Dropping the senders disconnects downstream consumers.
        *self.fifo.lock().expect("Error getting lock") = None;
        *self.tap.lock().expect("Error getting lock") = None;
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<Source>, Box<dyn Error>> {
        Ok(Arc::new(self.clone()))
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name,)
    }
}
