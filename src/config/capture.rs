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
use std::{error::Error, str::FromStr, time::Duration};

use duration_string::DurationString;
use serde::Deserialize;

use crate::gate::Polarity;

const DEFAULT_DEPTH: usize = 8192;
const DEFAULT_LOCKOUT: Duration = Duration::from_millis(30);

/// A YAML representation of the burst capture configuration.
#[derive(Deserialize, Clone, Default)]
pub struct Capture {
    /// The number of samples in one burst (default: 8192).
    depth: Option<usize>,

    /// How long the gate stays shut after a strike closes it (default: 30ms).
    lockout: Option<String>,

    /// Which edge polarity opens the sampling window, "rising" or "falling"
    /// (default: rising).
    open_on: Option<String>,
}

impl Capture {
    /// Returns the burst depth.
    pub fn depth(&self) -> usize {
        self.depth.unwrap_or(DEFAULT_DEPTH).max(1)
    }

    /// Returns the strike lockout.
    pub fn lockout(&self) -> Result<Duration, Box<dyn Error>> {
        match &self.lockout {
            Some(lockout) => Ok(DurationString::from_string(lockout.clone())?.into()),
            None => Ok(DEFAULT_LOCKOUT),
        }
    }

    /// Returns the polarity that opens the sampling window.
    pub fn open_on(&self) -> Result<Polarity, Box<dyn Error>> {
        match self.open_on.as_deref() {
            Some(polarity) => Polarity::from_str(polarity),
            None => Ok(Polarity::Rising),
        }
    }
}
