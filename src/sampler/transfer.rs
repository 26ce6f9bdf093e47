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
    sync::{Arc, Condvar, Mutex},
    thread,
    time::Duration,
};

use crossbeam_channel::{Receiver, RecvTimeoutError};

use super::priority;

/// How long the worker waits on the FIFO before rechecking its arm state.
const RECV_TICK: Duration = Duration::from_millis(20);

/// Moves samples from the acquisition FIFO into a destination buffer in the
/// background, so the engine loop never touches the FIFO in its hot path.
///
/// The primitives mirror a hardware transfer channel: the destination and
/// length are set up, the transfer started, and it can be aborted or queried
/// for its remaining count at any time. While no transfer is started the
/// worker parks and leaves the FIFO alone, so queued samples back up there
/// exactly as they would in a peripheral FIFO.
pub struct Transfer {
    shared: Arc<Shared>,
    worker: Option<thread::JoinHandle<()>>,
}

struct Shared {
    state: Mutex<State>,
    /// Wakes the worker when a transfer starts or the transfer shuts down.
    wake: Condvar,
    /// Notified when a transfer completes or is aborted.
    done: Condvar,
}

struct State {
    data: Vec<u8>,
    write_pos: usize,
    remaining: usize,
    armed: bool,
    shutdown: bool,
}

impl Transfer {
    /// Creates a transfer with a destination of the given depth, consuming
    /// from the given FIFO. The worker starts parked.
    pub fn new(depth: usize, fifo: Receiver<u8>) -> Transfer {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                data: vec![0; depth],
                write_pos: 0,
                remaining: 0,
                armed: false,
                shutdown: false,
            }),
            wake: Condvar::new(),
            done: Condvar::new(),
        });

        let worker = {
            let shared = shared.clone();
            thread::spawn(move || Transfer::run(shared, fifo))
        };

        Transfer {
            shared,
            worker: Some(worker),
        }
    }

    /// Resets the destination write position to the start of the buffer,
    /// optionally starting the transfer.
    pub fn set_destination(&self, start: bool) {
        let mut state = self.shared.state.lock().expect("Error getting lock");
        state.write_pos = 0;
        if start {
            state.armed = true;
            self.shared.wake.notify_all();
        }
    }

    /// Sets the number of samples to move, optionally starting the transfer.
    pub fn set_length(&self, n: usize, start: bool) {
        let mut state = self.shared.state.lock().expect("Error getting lock");
        state.remaining = n;
        if start {
            state.armed = true;
            self.shared.wake.notify_all();
        }
    }

    /// Stops the transfer. The remaining count is left frozen where the
    /// worker got to; callers measuring progress must read it before
    /// aborting.
    pub fn abort(&self) {
        let mut state = self.shared.state.lock().expect("Error getting lock");
        state.armed = false;
        self.shared.done.notify_all();
    }

    /// The number of samples the current transfer has yet to move.
    pub fn remaining_count(&self) -> usize {
        self.shared
            .state
            .lock()
            .expect("Error getting lock")
            .remaining
    }

    /// Blocks until the transfer completes or is aborted. Only used by the
    /// diagnostic full capture, never by the engine loop.
    pub fn wait_until_finished(&self) {
        let state = self.shared.state.lock().expect("Error getting lock");
        let _unused = self
            .shared
            .done
            .wait_while(state, |state| state.armed)
            .expect("Error getting lock");
    }

    /// A copy of the destination buffer.
    pub fn destination(&self) -> Vec<u8> {
        self.shared
            .state
            .lock()
            .expect("Error getting lock")
            .data
            .clone()
    }

    fn run(shared: Arc<Shared>, fifo: Receiver<u8>) {
        let mut priority_set = false;
        priority::configure_sample_thread_priority(
            priority::sample_thread_priority(),
            priority::rt_sampling_enabled(),
            &mut priority_set,
        );

        loop {
            {
                let state = shared.state.lock().expect("Error getting lock");
                let mut state = shared
                    .wake
                    .wait_while(state, |state| !state.armed && !state.shutdown)
                    .expect("Error getting lock");
                if state.shutdown {
                    return;
                }
                if state.remaining == 0 {
                    state.armed = false;
                    shared.done.notify_all();
                    continue;
                }
            }

            // The FIFO wait happens outside the lock so aborts and count
            // reads stay cheap.
            let sample = match fifo.recv_timeout(RECV_TICK) {
                Ok(sample) => sample,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    // The source is gone; release any waiter before exiting.
                    let mut state = shared.state.lock().expect("Error getting lock");
                    state.armed = false;
                    shared.done.notify_all();
                    return;
                }
            };

            let mut state = shared.state.lock().expect("Error getting lock");
            if !state.armed {
                // Aborted while the sample was in flight; drop it, like a
                // conversion landing after the channel stopped.
                continue;
            }
            let pos = state.write_pos;
            state.data[pos] = sample;
            state.write_pos += 1;
            state.remaining -= 1;
            if state.remaining == 0 {
                state.armed = false;
                shared.done.notify_all();
            }
        }
    }
}

impl Drop for Transfer {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock().expect("Error getting lock");
            state.shutdown = true;
        }
        self.shared.wake.notify_all();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod test {
    use std::{error::Error, thread, time::Duration};

    use crossbeam_channel::bounded;

    use crate::testutil::eventually;

    use super::Transfer;

    #[test]
    fn test_transfer_moves_samples() -> Result<(), Box<dyn Error>> {
        let (fifo_tx, fifo_rx) = bounded(1024);
        let transfer = Transfer::new(16, fifo_rx);

        transfer.set_destination(false);
        transfer.set_length(16, true);
        for i in 0..16u8 {
            fifo_tx.send(i)?;
        }

        transfer.wait_until_finished();
        assert_eq!(0, transfer.remaining_count());
        assert_eq!((0..16).collect::<Vec<u8>>(), transfer.destination());
        Ok(())
    }

    #[test]
    fn test_parked_worker_leaves_fifo_alone() -> Result<(), Box<dyn Error>> {
        let (fifo_tx, fifo_rx) = bounded(1024);
        let probe = fifo_rx.clone();
        let transfer = Transfer::new(16, fifo_rx);

        fifo_tx.send(42)?;
        thread::sleep(Duration::from_millis(50));
        assert_eq!(1, probe.len());

        transfer.set_destination(false);
        transfer.set_length(16, true);
        eventually(
            || transfer.remaining_count() == 15,
            "queued sample was never moved",
        );
        assert_eq!(42, transfer.destination()[0]);
        Ok(())
    }

    #[test]
    fn test_abort_freezes_progress() -> Result<(), Box<dyn Error>> {
        let (fifo_tx, fifo_rx) = bounded(1024);
        let transfer = Transfer::new(16, fifo_rx);

        transfer.set_destination(false);
        transfer.set_length(16, true);
        for i in 10..14u8 {
            fifo_tx.send(i)?;
        }
        eventually(
            || transfer.remaining_count() == 12,
            "samples were never moved",
        );

        transfer.abort();
        for i in 14..18u8 {
            fifo_tx.send(i)?;
        }
        thread::sleep(Duration::from_millis(50));

        assert_eq!(12, transfer.remaining_count());
        assert_eq!(vec![10, 11, 12, 13], transfer.destination()[..4].to_vec());
        Ok(())
    }

    #[test]
    fn test_wait_until_finished_returns_on_abort() {
        let (_fifo_tx, fifo_rx) = bounded::<u8>(1024);
        let transfer = Transfer::new(16, fifo_rx);

        transfer.set_destination(false);
        transfer.set_length(16, true);

        thread::scope(|scope| {
            scope.spawn(|| {
                thread::sleep(Duration::from_millis(50));
                transfer.abort();
            });
            transfer.wait_until_finished();
        });
        assert_eq!(16, transfer.remaining_count());
    }

    #[test]
    fn test_restart_overwrites_destination() -> Result<(), Box<dyn Error>> {
        let (fifo_tx, fifo_rx) = bounded(1024);
        let transfer = Transfer::new(4, fifo_rx);

        transfer.set_destination(false);
        transfer.set_length(4, true);
        for _ in 0..4 {
            fifo_tx.send(9)?;
        }
        transfer.wait_until_finished();
        assert_eq!(vec![9, 9, 9, 9], transfer.destination());

        transfer.set_destination(false);
        transfer.set_length(4, true);
        for _ in 0..4 {
            fifo_tx.send(3)?;
        }
        transfer.wait_until_finished();
        assert_eq!(vec![3, 3, 3, 3], transfer.destination());
        Ok(())
    }
}
