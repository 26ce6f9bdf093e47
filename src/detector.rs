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
use std::{error::Error, fmt, time::Instant};

use tokio::sync::mpsc::Sender;

pub mod comparator;
pub mod manual;
pub mod mock;

/// A threshold crossing observed on the trigger line. A single event can
/// carry both directions when the detector saw the line change twice before
/// it could report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Edge {
    /// The line crossed upward.
    pub rising: bool,
    /// The line crossed downward.
    pub falling: bool,
    /// When the crossing was observed.
    pub at: Instant,
}

impl Edge {
    /// An edge for a single rising crossing.
    pub fn rising(at: Instant) -> Edge {
        Edge {
            rising: true,
            falling: false,
            at,
        }
    }

    /// An edge for a single falling crossing.
    pub fn falling(at: Instant) -> Edge {
        Edge {
            rising: false,
            falling: true,
            at,
        }
    }
}

/// Watches the trigger line and reports threshold crossings.
pub trait Detector: fmt::Display + std::marker::Send + std::marker::Sync {
    /// Watches the line for edges and sends them to the given sender.
    fn watch_edges(&self, sender: Sender<Edge>) -> Result<(), Box<dyn Error>>;

    /// Stops watching edges.
    fn stop_watch_edges(&self);
}
