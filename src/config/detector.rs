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
use std::{error::Error, sync::Arc, time::Duration};

use crossbeam_channel::Receiver;
use duration_string::DurationString;
use serde::Deserialize;

use crate::detector;

const DEFAULT_HIGH_THRESHOLD: u8 = 32;
const DEFAULT_LOW_THRESHOLD: u8 = 8;
const DEFAULT_HOLD: Duration = Duration::from_millis(150);

/// Allows users to specify various edge detectors.
#[derive(Deserialize, Clone)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Detector {
    Comparator(ComparatorDetector),
    Manual(ManualDetector),
}

impl Detector {
    /// Whether this detector needs a tap off the sample stream.
    pub fn needs_tap(&self) -> bool {
        matches!(self, Detector::Comparator(_))
    }

    /// Builds the edge detector described by this configuration. Comparator
    /// detectors run off a tap of the sample stream, so one must be supplied
    /// for them.
    pub fn build(
        &self,
        tap: Option<Receiver<u8>>,
    ) -> Result<Arc<dyn detector::Detector>, Box<dyn Error>> {
        match self {
            Detector::Comparator(comparator) => {
                let tap = match tap {
                    Some(tap) => tap,
                    None => return Err("comparator detectors require a sample tap".into()),
                };
                let (high, low) = comparator.thresholds()?;
                Ok(Arc::new(detector::comparator::Detector::new(
                    high, low, tap,
                )))
            }
            Detector::Manual(manual) => {
                Ok(Arc::new(detector::manual::Detector::new(manual.hold()?)))
            }
        }
    }
}

impl Default for Detector {
    fn default() -> Detector {
        Detector::Comparator(ComparatorDetector {
            high: None,
            low: None,
        })
    }
}

/// The configuration for the hysteresis comparator detector.
#[derive(Deserialize, Clone)]
pub struct ComparatorDetector {
    /// Samples at or above this level open the window (default: 32).
    high: Option<u8>,

    /// Samples at or below this level close it again (default: 8).
    low: Option<u8>,
}

impl ComparatorDetector {
    /// Returns the (high, low) hysteresis thresholds.
    pub fn thresholds(&self) -> Result<(u8, u8), Box<dyn Error>> {
        let high = self.high.unwrap_or(DEFAULT_HIGH_THRESHOLD);
        let low = self.low.unwrap_or(DEFAULT_LOW_THRESHOLD);
        if high <= low {
            return Err(format!(
                "high threshold ({}) must be above the low threshold ({})",
                high, low
            )
            .into());
        }
        Ok((high, low))
    }
}

/// The configuration for the manual stdin detector.
#[derive(Deserialize, Clone)]
pub struct ManualDetector {
    /// How long a simulated strike holds the window open (default: 150ms).
    hold: Option<String>,
}

impl ManualDetector {
    /// Returns the hold duration.
    pub fn hold(&self) -> Result<Duration, Box<dyn Error>> {
        match &self.hold {
            Some(hold) => Ok(DurationString::from_string(hold.clone())?.into()),
            None => Ok(DEFAULT_HOLD),
        }
    }
}
