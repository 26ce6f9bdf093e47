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

/// A fast-attack, slow-decay envelope follower over the live sample stream.
/// Drives the continuous trigger mode, where no external edge detector gates
/// the capture.
pub struct Follower {
    /// Running idle level, a 1/16-weighted low-pass of the input.
    baseline: u8,
    /// Smoothed absolute deviation from the baseline.
    envelope: u8,
    /// Held maximum of the envelope; reset explicitly between hits.
    peak: u8,
}

impl Follower {
    /// Creates a new follower with the given initial baseline.
    pub fn new(initial_baseline: u8) -> Follower {
        Follower {
            baseline: initial_baseline,
            envelope: 0,
            peak: 0,
        }
    }

    /// Feeds one sample through the follower and returns the held peak.
    ///
    /// The baseline tracks slow drift without reacting to hits; the envelope
    /// attacks instantly and decays by roughly 1/16 per sample, so a brief
    /// spike stays visible for several samples. The decay shift truncates,
    /// which leaves a resting envelope of up to 15 after activity; hit
    /// thresholds must sit above that.
    pub fn process(&mut self, sample: u8) -> u8 {
        self.baseline = ((u16::from(self.baseline) * 15 + u16::from(sample)) >> 4) as u8;

        let level = if sample > self.baseline {
            sample - self.baseline
        } else {
            self.baseline - sample
        };

        if level > self.envelope {
            self.envelope = level;
        } else {
            self.envelope -= self.envelope >> 4;
        }

        if self.envelope > self.peak {
            self.peak = self.envelope;
        }

        self.peak
    }

    /// The current envelope value.
    pub fn envelope(&self) -> u8 {
        self.envelope
    }

    /// The held peak since the last reset.
    pub fn peak(&self) -> u8 {
        self.peak
    }

    /// Clears the held peak. The baseline and envelope are left alone.
    pub fn reset_peak(&mut self) {
        self.peak = 0;
    }

    #[cfg(test)]
    fn baseline(&self) -> u8 {
        self.baseline
    }
}

/// Maps a held peak onto a MIDI velocity: at most 120 becomes the floor of 5,
/// at least 200 becomes 127, with a truncating linear segment in between.
pub fn map_peak(peak: u8) -> u8 {
    if peak <= 120 {
        return 5;
    }
    if peak >= 200 {
        return 127;
    }

    ((u16::from(peak) - 120) * 127 / 120) as u8
}
