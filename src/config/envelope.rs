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
use std::{error::Error, time::Duration};

use duration_string::DurationString;
use serde::Deserialize;

const DEFAULT_STRIKE_ON: u8 = 48;
const DEFAULT_STRIKE_OFF: u8 = 16;
const DEFAULT_LOCKOUT: Duration = Duration::from_millis(30);

/// A YAML representation of the continuous envelope follower configuration.
#[derive(Deserialize, Clone, Default)]
pub struct Envelope {
    /// The envelope level that starts a strike (default: 48).
    strike_on: Option<u8>,

    /// The envelope level that ends a strike and emits the hit (default: 16).
    /// The envelope decays by a sixteenth per sample, so it stalls at 15 and
    /// anything below that never fires.
    strike_off: Option<u8>,

    /// Where the baseline tracker starts (default: 0).
    initial_baseline: Option<u8>,

    /// How long to ignore strike transitions after a hit (default: 30ms).
    lockout: Option<String>,
}

impl Envelope {
    /// Returns the (strike_on, strike_off) thresholds.
    pub fn thresholds(&self) -> Result<(u8, u8), Box<dyn Error>> {
        let strike_on = self.strike_on.unwrap_or(DEFAULT_STRIKE_ON);
        let strike_off = self.strike_off.unwrap_or(DEFAULT_STRIKE_OFF);
        if strike_on <= strike_off {
            return Err(format!(
                "strike on threshold ({}) must be above the strike off threshold ({})",
                strike_on, strike_off
            )
            .into());
        }
        Ok((strike_on, strike_off))
    }

    /// Returns the initial baseline for the follower.
    pub fn initial_baseline(&self) -> u8 {
        self.initial_baseline.unwrap_or(0)
    }

    /// Returns the hit lockout.
    pub fn lockout(&self) -> Result<Duration, Box<dyn Error>> {
        match &self.lockout {
            Some(lockout) => Ok(DurationString::from_string(lockout.clone())?.into()),
            None => Ok(DEFAULT_LOCKOUT),
        }
    }
}
