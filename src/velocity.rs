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
use midly::num::u7;

/// Samples at or below this value are treated as noise and excluded from
/// both the average and the peak search.
const NOISE_CEILING: u8 = 1;

/// Velocities at or below this value are suppressed rather than sent.
const SUPPRESSION_CEILING: u8 = 2;

const DEFAULT_SILENCE_FLOOR: f32 = 20.0;
const DEFAULT_CLAMP_CEILING: f32 = 110.0;

/// Maps a blended loudness value onto a MIDI velocity in [1, 127].
#[derive(Clone, Copy, Debug)]
pub struct Curve {
    /// Loudness at or below the floor maps to 1.
    silence_floor: f32,
    /// Loudness at or above the ceiling maps to 127.
    clamp_ceiling: f32,
}

impl Default for Curve {
    fn default() -> Curve {
        Curve {
            silence_floor: DEFAULT_SILENCE_FLOOR,
            clamp_ceiling: DEFAULT_CLAMP_CEILING,
        }
    }
}

impl Curve {
    /// Creates a new curve. The floor must sit below the ceiling; that is
    /// validated by the configuration layer.
    pub fn new(silence_floor: f32, clamp_ceiling: f32) -> Curve {
        Curve {
            silence_floor,
            clamp_ceiling,
        }
    }

    /// Applies the curve to a loudness value. The segment between the floor
    /// and the ceiling rises at 116 velocity steps per 100 loudness units and
    /// truncates toward zero.
    pub fn apply(&self, loudness: f32) -> u8 {
        if loudness <= self.silence_floor {
            return 1;
        }
        if loudness >= self.clamp_ceiling {
            return 127;
        }

        (1.0 + (loudness - self.silence_floor) * 116.0 / 100.0).min(127.0) as u8
    }
}

/// The intermediate measurements of a captured burst.
#[derive(Clone, Copy, Debug)]
pub struct Analysis {
    /// The average of the qualifying samples, or 0 if none qualified.
    pub average: f32,
    /// The largest qualifying sample, or 0 if none qualified.
    pub peak: u8,
    /// The blended loudness the velocity is derived from.
    pub loudness: f32,
    /// How many samples qualified (exceeded the noise ceiling).
    pub count: usize,
}

/// Reduces a captured sample burst to a MIDI velocity. Stateless.
#[derive(Clone, Copy, Debug)]
pub struct Analyzer {
    curve: Curve,
}

impl Analyzer {
    /// Creates a new analyzer with the given velocity curve.
    pub fn new(curve: Curve) -> Analyzer {
        Analyzer { curve }
    }

    /// Measures a burst: average and peak over the qualifying samples, then
    /// a blend where the peak dominates and the average contributes a smaller
    /// correction for sustained strikes. Safe to call with an empty slice.
    pub fn analyze(&self, samples: &[u8]) -> Analysis {
        let mut sum: u32 = 0;
        let mut count: usize = 0;
        let mut peak: u8 = 0;

        for &sample in samples {
            if sample <= NOISE_CEILING {
                continue;
            }
            if sample > peak {
                peak = sample;
            }
            sum += u32::from(sample);
            count += 1;
        }

        let average = if count > 0 {
            sum as f32 / count as f32
        } else {
            0.0
        };
        let loudness = (average * 0.2 + f32::from(peak)) / 2.0;

        Analysis {
            average,
            peak,
            loudness,
            count,
        }
    }

    /// Classifies a burst, returning the velocity to send or None when the
    /// hit should be suppressed as noise.
    pub fn classify(&self, samples: &[u8]) -> Option<u7> {
        let analysis = self.analyze(samples);
        let velocity = self.curve.apply(analysis.loudness);
        if velocity <= SUPPRESSION_CEILING {
            return None;
        }

        Some(u7::from(velocity))
    }
}
