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
use crossbeam_channel::Receiver;

use crate::sampler::transfer::Transfer;

/// One captured burst. Only the first `samples_written` entries hold data from
/// the most recent capture; the rest of the backing storage is stale.
#[derive(Clone, Debug)]
pub struct Buffer {
    data: Vec<u8>,
    samples_written: usize,
}

impl Buffer {
    fn empty(depth: usize) -> Buffer {
        Buffer {
            data: vec![0; depth],
            samples_written: 0,
        }
    }

    /// The valid portion of the capture.
    pub fn samples(&self) -> &[u8] {
        &self.data[..self.samples_written]
    }

    /// How many samples the last capture actually wrote.
    pub fn samples_written(&self) -> usize {
        self.samples_written
    }

    /// The fixed size of the backing storage.
    pub fn depth(&self) -> usize {
        self.data.len()
    }
}

/// Runs fixed-depth burst captures against the sample FIFO. At most one
/// capture is in flight at a time; arming again simply supersedes the
/// previous capture.
pub struct Engine {
    transfer: Transfer,
    fifo: Receiver<u8>,
    depth: usize,
    in_flight: bool,
    buffer: Buffer,
}

impl Engine {
    pub fn new(depth: usize, fifo: Receiver<u8>) -> Engine {
        Engine {
            transfer: Transfer::new(depth, fifo.clone()),
            fifo,
            depth,
            in_flight: false,
            buffer: Buffer::empty(depth),
        }
    }

    /// Starts a capture. Anything already sitting in the FIFO is flushed
    /// first so the burst aligns to the moment of arming rather than to
    /// whenever the source last went quiet.
    pub fn arm(&mut self) {
        self.transfer.abort();
        self.drain();
        self.transfer.set_destination(false);
        self.transfer.set_length(self.depth, true);
        self.in_flight = true;
    }

    /// Stops the in-flight capture and commits however much of the buffer
    /// was filled. Returns the number of samples written, or 0 if no capture
    /// was in flight.
    pub fn abort_and_measure(&mut self) -> usize {
        if !self.in_flight {
            return 0;
        }
        self.in_flight = false;

        // Read progress before stopping; aborting first would let the count
        // change out from under us.
        let remaining = self.transfer.remaining_count();
        self.transfer.abort();

        let samples_written = self.depth - remaining;
        self.buffer = Buffer {
            data: self.transfer.destination(),
            samples_written,
        };
        samples_written
    }

    /// Discards everything currently queued in the FIFO.
    pub fn drain(&mut self) {
        while self.fifo.try_recv().is_ok() {}
    }

    /// Runs one full-depth capture to completion and returns it. Used by the
    /// diagnostic dump path, where we want a whole buffer rather than an
    /// edge-aligned burst.
    pub fn capture_full(&mut self) -> Buffer {
        self.transfer.abort();
        self.in_flight = false;
        self.drain();
        self.transfer.set_destination(false);
        self.transfer.set_length(self.depth, true);
        self.transfer.wait_until_finished();

        // Normally the wait only returns once the buffer is full, but if the
        // source died mid-capture we commit the partial fill instead.
        let remaining = self.transfer.remaining_count();
        self.buffer = Buffer {
            data: self.transfer.destination(),
            samples_written: self.depth - remaining,
        };
        self.buffer.clone()
    }

    /// The most recently committed capture.
    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    #[cfg(test)]
    pub(crate) fn remaining(&self) -> usize {
        self.transfer.remaining_count()
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    use crossbeam_channel::bounded;

    use super::Engine;
    use crate::testutil::eventually;

    #[test]
    fn arm_fills_and_measures() -> Result<(), Box<dyn Error>> {
        let (fifo_tx, fifo_rx) = bounded::<u8>(1024);
        let mut engine = Engine::new(16, fifo_rx);

        engine.arm();
        for sample in 0..10 {
            fifo_tx.send(sample)?;
        }
        eventually(|| engine.remaining() == 6, "samples were never consumed");

        assert_eq!(10, engine.abort_and_measure());
        let buffer = engine.buffer();
        assert_eq!(10, buffer.samples_written());
        assert_eq!(16, buffer.depth());
        assert_eq!(
            vec![0u8, 1, 2, 3, 4, 5, 6, 7, 8, 9],
            buffer.samples().to_vec()
        );
        Ok(())
    }

    #[test]
    fn measure_without_arm_returns_zero() {
        let (_fifo_tx, fifo_rx) = bounded::<u8>(1024);
        let mut engine = Engine::new(16, fifo_rx);

        assert_eq!(0, engine.abort_and_measure());
        assert_eq!(0, engine.buffer().samples_written());
        assert!(engine.buffer().samples().is_empty());
    }

    #[test]
    fn immediate_measure_commits_empty_buffer() {
        let (_fifo_tx, fifo_rx) = bounded::<u8>(1024);
        let mut engine = Engine::new(16, fifo_rx);

        engine.arm();
        assert_eq!(0, engine.abort_and_measure());
        assert!(engine.buffer().samples().is_empty());
    }

    #[test]
    fn second_measure_returns_zero() -> Result<(), Box<dyn Error>> {
        let (fifo_tx, fifo_rx) = bounded::<u8>(1024);
        let mut engine = Engine::new(16, fifo_rx);

        engine.arm();
        for sample in [10, 20, 30, 40] {
            fifo_tx.send(sample)?;
        }
        eventually(|| engine.remaining() == 12, "samples were never consumed");

        assert_eq!(4, engine.abort_and_measure());
        assert_eq!(0, engine.abort_and_measure());
        // The first measurement is still committed.
        assert_eq!(vec![10u8, 20, 30, 40], engine.buffer().samples().to_vec());
        Ok(())
    }

    #[test]
    fn rearming_supersedes_previous_capture() -> Result<(), Box<dyn Error>> {
        let (fifo_tx, fifo_rx) = bounded::<u8>(1024);
        let mut engine = Engine::new(16, fifo_rx);

        engine.arm();
        for sample in [1, 2, 3] {
            fifo_tx.send(sample)?;
        }
        eventually(|| engine.remaining() == 13, "samples were never consumed");

        engine.arm();
        for sample in [50, 60, 70, 80, 90] {
            fifo_tx.send(sample)?;
        }
        eventually(|| engine.remaining() == 11, "samples were never consumed");

        assert_eq!(5, engine.abort_and_measure());
        assert_eq!(
            vec![50u8, 60, 70, 80, 90],
            engine.buffer().samples().to_vec()
        );
        Ok(())
    }

    #[test]
    fn arm_flushes_stale_fifo() -> Result<(), Box<dyn Error>> {
        let (fifo_tx, fifo_rx) = bounded::<u8>(1024);
        let mut engine = Engine::new(16, fifo_rx);

        // Junk that arrived before arming must not end up in the capture.
        for junk in [99, 98, 97, 96, 95, 94, 93] {
            fifo_tx.send(junk)?;
        }

        engine.arm();
        for sample in [7, 8] {
            fifo_tx.send(sample)?;
        }
        eventually(|| engine.remaining() == 14, "samples were never consumed");

        assert_eq!(2, engine.abort_and_measure());
        assert_eq!(vec![7u8, 8], engine.buffer().samples().to_vec());
        Ok(())
    }

    #[test]
    fn drain_discards_queued_samples() -> Result<(), Box<dyn Error>> {
        let (fifo_tx, fifo_rx) = bounded::<u8>(1024);
        let probe = fifo_rx.clone();
        let mut engine = Engine::new(16, fifo_rx);

        for sample in [1, 2, 3, 4, 5] {
            fifo_tx.send(sample)?;
        }
        engine.drain();

        assert!(probe.is_empty());
        Ok(())
    }

    #[test]
    fn capture_full_fills_the_whole_buffer() {
        let (fifo_tx, fifo_rx) = bounded::<u8>(1024);
        let mut engine = Engine::new(8, fifo_rx);

        let stop = AtomicBool::new(false);
        thread::scope(|s| {
            s.spawn(|| {
                while !stop.load(Ordering::SeqCst) {
                    let _ = fifo_tx.try_send(7);
                    thread::sleep(Duration::from_millis(1));
                }
            });

            let buffer = engine.capture_full();
            stop.store(true, Ordering::SeqCst);

            assert_eq!(8, buffer.samples_written());
            assert_eq!(vec![7u8; 8], buffer.samples().to_vec());
        });
    }

    #[test]
    fn capture_full_returns_when_the_source_dies() {
        let (fifo_tx, fifo_rx) = bounded::<u8>(1024);
        let mut engine = Engine::new(8, fifo_rx);

        thread::scope(|s| {
            s.spawn(move || {
                let _ = fifo_tx.send(3);
                let _ = fifo_tx.send(4);
                // Dropping the sender disconnects the FIFO mid-capture.
            });

            let buffer = engine.capture_full();
            assert!(buffer.samples_written() <= 8);
            for sample in buffer.samples() {
                assert!(*sample == 3 || *sample == 4);
            }
        });
    }
}
