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
    sync::{Arc, Mutex},
};

use tokio::sync::mpsc::Sender;

use crate::detector::Edge;

/// A mock detector. Reports no edges on its own; tests push them.
#[derive(Clone)]
pub struct Detector {
    name: String,
    sender: Arc<Mutex<Option<Sender<Edge>>>>,
}

impl Detector {
    /// Gets the given mock detector.
    pub fn get(name: &str) -> Detector {
        Detector {
            name: name.to_string(),
            sender: Arc::new(Mutex::new(None)),
        }
    }

    /// Pushes an edge to whoever is watching.
    #[cfg(test)]
    pub fn edge(&self, edge: Edge) {
        let sender = self.sender.lock().expect("Error getting lock");
        if let Some(sender) = sender.as_ref() {
            let _ = sender.try_send(edge);
        }
    }

    /// Returns true if something is watching for edges.
    #[cfg(test)]
    pub fn is_watching(&self) -> bool {
        self.sender.lock().expect("Error getting lock").is_some()
    }
}

impl crate::detector::Detector for Detector {
    fn watch_edges(&self, sender: Sender<Edge>) -> Result<(), Box<dyn Error>> {
        *self.sender.lock().expect("Error getting lock") = Some(sender);
        Ok(())
    }

    fn stop_watch_edges(&self) {
        // Dropping the sender closes the edge stream.
        *self.sender.lock().expect("Error getting lock") = None;
    }
}

impl fmt::Display for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name,)
    }
}
