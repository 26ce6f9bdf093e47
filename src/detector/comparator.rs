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
        Arc,
    },
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use tokio::sync::mpsc::Sender;
use tracing::{info, span, Level};

use crate::detector::Edge;

/// How long the watcher waits on the tap before rechecking the stop flag.
const RECV_TICK: Duration = Duration::from_millis(100);

/// A software comparator over the sample stream. Reports a rising edge when
/// the signal reaches the high threshold and a falling edge when it drops
/// back to the low threshold. The gap between the two thresholds is the
/// hysteresis that keeps a wavering signal from chattering.
pub struct Detector {
    /// Crossing this threshold upward reports a rising edge.
    high: u8,
    /// Crossing this threshold downward reports a falling edge.
    low: u8,
    /// The tap carrying a copy of the rectified sample stream.
    tap: Receiver<u8>,
    /// Set to stop the watcher.
    stop: Arc<AtomicBool>,
}

impl Detector {
    pub fn new(high: u8, low: u8, tap: Receiver<u8>) -> Detector {
        Detector {
            high,
            low,
            tap,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl crate::detector::Detector for Detector {
    fn watch_edges(&self, sender: Sender<Edge>) -> Result<(), Box<dyn Error>> {
        let span = span!(Level::INFO, "watch edges (comparator)");
        let _enter = span.enter();

        info!(
            high = self.high,
            low = self.low,
            "Watching for threshold crossings."
        );

        let high = self.high;
        let low = self.low;
        let tap = self.tap.clone();
        let stop = self.stop.clone();
        tokio::task::spawn_blocking(move || {
            let mut above = false;
            loop {
                if stop.load(Ordering::Relaxed) {
                    return;
                }
                let sample = match tap.recv_timeout(RECV_TICK) {
                    Ok(sample) => sample,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => return,
                };

                if !above && sample >= high {
                    above = true;
                    if sender.blocking_send(Edge::rising(Instant::now())).is_err() {
                        return;
                    }
                } else if above && sample <= low {
                    above = false;
                    if sender.blocking_send(Edge::falling(Instant::now())).is_err() {
                        return;
                    }
                }
            }
        });

        Ok(())
    }

    fn stop_watch_edges(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

impl fmt::Display for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "comparator (high={}, low={})", self.high, self.low)
    }
}
