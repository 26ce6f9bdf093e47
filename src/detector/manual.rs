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
    fmt, io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use tokio::sync::mpsc::Sender;
use tracing::{error, info, span, Level};

use crate::detector::Edge;

/// A detector driven from the terminal. Each line of input simulates one
/// strike: a rising edge, a hold, then a falling edge. Useful for exercising
/// the full pipeline without a signal source.
pub struct Detector {
    /// How long the simulated strike stays high.
    hold: Duration,
    /// Set to stop reading input.
    stop: Arc<AtomicBool>,
}

impl Detector {
    pub fn new(hold: Duration) -> Detector {
        Detector {
            hold,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Reads one line and simulates a strike. Returns false once the input
    /// is exhausted.
    fn monitor_io<R, W>(
        sender: &Sender<Edge>,
        mut reader: R,
        mut writer: W,
        hold: Duration,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(writer, "Enter to strike (EOF stops): ")?;
        writer.flush()?;
        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            return Ok(false);
        }

        sender
            .blocking_send(Edge::rising(Instant::now()))
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        thread::sleep(hold);
        sender
            .blocking_send(Edge::falling(Instant::now()))
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

        Ok(true)
    }
}

impl crate::detector::Detector for Detector {
    fn watch_edges(&self, sender: Sender<Edge>) -> Result<(), Box<dyn Error>> {
        let hold = self.hold;
        let stop = self.stop.clone();
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "manual detector");
            let _enter = span.enter();

            info!("Manual detector started.");

            loop {
                if stop.load(Ordering::Relaxed) {
                    return;
                }
                match Self::monitor_io(&sender, io::stdin().lock(), io::stdout(), hold) {
                    Ok(true) => continue,
                    Ok(false) => {
                        info!("Manual detector input closed.");
                        return;
                    }
                    Err(e) => {
                        error!(err = e.to_string(), "Error reading manual input.");
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
        write!(f, "manual (hold={:?})", self.hold)
    }
}

#[cfg(test)]
mod test {
    use std::io::{self, BufReader, BufWriter};
    use std::time::Duration;

    use tokio::sync::mpsc;

    use crate::detector::Edge;

    use super::Detector;

    fn get_edges(input: &str) -> Result<(bool, Vec<Edge>), io::Error> {
        let (sender, mut receiver) = mpsc::channel::<Edge>(2);

        let reader_bytes = input.as_bytes();
        let reader = BufReader::new(reader_bytes);

        let writer_bytes: Vec<u8> = vec![0; 255];
        let writer = BufWriter::new(writer_bytes);
        let more = Detector::monitor_io(&sender, reader, writer, Duration::from_millis(1))?;

        // Force the sender to close.
        drop(sender);
        let mut edges = Vec::new();
        while let Some(edge) = receiver.blocking_recv() {
            edges.push(edge);
        }
        Ok((more, edges))
    }

    #[test]
    fn test_line_simulates_strike() -> Result<(), io::Error> {
        let (more, edges) = get_edges("\n")?;
        assert!(more);
        assert_eq!(2, edges.len());
        assert!(edges[0].rising);
        assert!(edges[1].falling);
        assert!(edges[1].at >= edges[0].at);
        Ok(())
    }

    #[test]
    fn test_eof_stops() -> Result<(), io::Error> {
        let (more, edges) = get_edges("")?;
        assert!(!more);
        assert!(edges.is_empty());
        Ok(())
    }
}
