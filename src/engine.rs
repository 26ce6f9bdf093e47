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
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use midly::num::u7;
use tokio::{
    sync::mpsc,
    task::{JoinError, JoinHandle},
    time::MissedTickBehavior,
};
use tracing::{debug, error, info, span, Instrument, Level};

use crate::capture;
use crate::detector::Detector;
use crate::envelope::{map_peak, Follower};
use crate::gate::{Action, Gate};
use crate::midi;
use crate::sampler::priority::{
    configure_sample_thread_priority, rt_sampling_enabled, sample_thread_priority,
};
use crate::velocity::Analyzer;

/// How often the burst loop polls the gate so that the lockout expires even
/// when no edges arrive.
const GATE_POLL_TICK: Duration = Duration::from_millis(5);

/// The amount of time the continuous loop will wait for a sample before
/// rechecking for shutdown.
const RECV_TICK: Duration = Duration::from_millis(100);

/// How the engine turns the sample stream into hits.
pub enum Strategy {
    /// Edge gated burst capture. The detector opens and closes the sampling
    /// window and each closed window is analyzed as one hit.
    Burst {
        detector: Arc<dyn Detector>,
        gate: Gate,
        capture: capture::Engine,
        analyzer: Analyzer,
    },
    /// Continuous envelope following. Every sample feeds the envelope
    /// follower and a hit is cut when the envelope decays back down.
    Continuous {
        fifo: Receiver<u8>,
        envelope: Follower,
        strike_on: u8,
        strike_off: u8,
        lockout: Duration,
    },
}

/// The engine turns strikes into MIDI notes.
pub struct Engine {
    handle: JoinHandle<()>,
    hits: Arc<AtomicU64>,
}

impl Engine {
    /// Creates a new engine running the given strategy against the given
    /// MIDI device.
    pub fn new(
        midi_device: Arc<dyn midi::Device>,
        strategy: Strategy,
        heartbeat: Duration,
    ) -> Result<Engine, Box<dyn Error>> {
        let hits = Arc::new(AtomicU64::new(0));

        tokio::spawn(Engine::report_status(
            midi_device.name(),
            hits.clone(),
            heartbeat,
        ));

        let handle = match strategy {
            Strategy::Burst {
                detector,
                gate,
                capture,
                analyzer,
            } => {
                let hits = hits.clone();
                tokio::spawn(
                    async move {
                        Engine::trigger_bursts(
                            midi_device, detector, gate, capture, analyzer, hits,
                        )
                        .await
                    }
                    .instrument(span!(Level::INFO, "trigger")),
                )
            }
            Strategy::Continuous {
                fifo,
                envelope,
                strike_on,
                strike_off,
                lockout,
            } => {
                let hits = hits.clone();
                tokio::spawn(async move {
                    let follower = tokio::task::spawn_blocking(move || {
                        Engine::follow_envelope(
                            midi_device,
                            fifo,
                            envelope,
                            strike_on,
                            strike_off,
                            lockout,
                            hits,
                        )
                    });
                    if let Err(e) = follower.await {
                        error!(err = e.to_string(), "Error waiting for envelope follower.");
                    }
                })
            }
        };

        Ok(Engine { handle, hits })
    }

    /// Join will wait until the engine is finished.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        (&mut self.handle).await
    }

    /// The number of hits emitted so far.
    #[cfg(test)]
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Periodically reports that the engine is running and how many hits it
    /// has emitted.
    async fn report_status(device: String, hits: Arc<AtomicU64>, heartbeat: Duration) {
        loop {
            tokio::time::sleep(heartbeat).await;
            info!(
                device = device,
                hits = hits.load(Ordering::Relaxed),
                "Trigger running."
            );
        }
    }

    /// Runs the edge gated burst loop.
    async fn trigger_bursts(
        midi_device: Arc<dyn midi::Device>,
        detector: Arc<dyn Detector>,
        mut gate: Gate,
        mut capture: capture::Engine,
        analyzer: Analyzer,
        hits: Arc<AtomicU64>,
    ) {
        let (edges_tx, mut edges_rx) = mpsc::channel(16);
        if let Err(e) = detector.watch_edges(edges_tx) {
            error!(err = e.as_ref(), "Unable to watch for edges.");
            return;
        }

        info!(detector = detector.to_string(), "Burst trigger started.");

        let mut tick = tokio::time::interval(GATE_POLL_TICK);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                edge = edges_rx.recv() => {
                    let edge = match edge {
                        Some(edge) => edge,
                        None => {
                            info!("Edge stream closed, trigger stopping.");
                            detector.stop_watch_edges();
                            return;
                        }
                    };

                    debug!(edge = format!("{:?}", edge), "Received edge.");
                    for action in gate.handle(&edge) {
                        match action {
                            Action::Arm => {
                                debug!("Sampling window open.");
                                capture.arm();
                            }
                            Action::Measure => {
                                let written = capture.abort_and_measure();
                                match analyzer.classify(capture.buffer().samples()) {
                                    Some(velocity) => {
                                        hits.fetch_add(1, Ordering::Relaxed);
                                        info!(
                                            samples = written,
                                            velocity = velocity.as_int(),
                                            "Hit."
                                        );
                                        if let Err(e) = midi_device.send_note_on(velocity) {
                                            error!(err = e.as_ref(), "Error sending note on.");
                                        }
                                    }
                                    None => debug!(samples = written, "Hit suppressed."),
                                }
                            }
                        }
                    }
                }
                _ = tick.tick() => {
                    gate.poll(Instant::now());
                }
            }
        }
    }

    /// Runs the continuous envelope following loop. Blocks until the sample
    /// stream disconnects.
    fn follow_envelope(
        midi_device: Arc<dyn midi::Device>,
        fifo: Receiver<u8>,
        mut envelope: Follower,
        strike_on: u8,
        strike_off: u8,
        lockout: Duration,
        hits: Arc<AtomicU64>,
    ) {
        let span = span!(Level::INFO, "envelope follower");
        let _enter = span.enter();

        info!(
            strike_on = strike_on,
            strike_off = strike_off,
            "Continuous trigger started."
        );

        let priority = sample_thread_priority();
        let rt_sampling = rt_sampling_enabled();
        let mut priority_set = false;

        let mut striking = false;
        let mut locked_out_since: Option<Instant> = None;

        loop {
            let sample = match fifo.recv_timeout(RECV_TICK) {
                Ok(sample) => sample,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    info!("Sample stream closed, trigger stopping.");
                    return;
                }
            };
            configure_sample_thread_priority(priority, rt_sampling, &mut priority_set);

            // The follower keeps tracking during the lockout, the strike
            // state machine just doesn't act on it.
            envelope.process(sample);

            if let Some(since) = locked_out_since {
                if since.elapsed() > lockout {
                    locked_out_since = None;
                } else {
                    continue;
                }
            }

            if !striking && envelope.envelope() >= strike_on {
                striking = true;
                debug!(envelope = envelope.envelope(), "Strike onset.");
            } else if striking && envelope.envelope() <= strike_off {
                striking = false;
                locked_out_since = Some(Instant::now());

                let peak = envelope.peak();
                envelope.reset_peak();

                let velocity = map_peak(peak);
                hits.fetch_add(1, Ordering::Relaxed);
                info!(peak = peak, velocity = velocity, "Hit.");
                if let Err(e) = midi_device.send_note_on(u7::from(velocity)) {
                    error!(err = e.as_ref(), "Error sending note on.");
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use crossbeam_channel::bounded;
    use midly::num::{u4, u7};

    use super::{Engine, Strategy};
    use crate::capture;
    use crate::detector::{test, Detector, Edge};
    use crate::envelope::Follower;
    use crate::gate::{Gate, Polarity};
    use crate::midi;
    use crate::sampler::FIFO_DEPTH;
    use crate::testutil::eventually;
    use crate::velocity::{Analyzer, Curve};

    #[tokio::test(flavor = "multi_thread")]
    async fn test_burst_cycle_emits_hit() -> Result<(), Box<dyn Error>> {
        let (fifo_tx, fifo_rx) = bounded(FIFO_DEPTH);
        let probe = fifo_rx.clone();

        let mock_detector = test::Detector::get("mock-edges");
        let midi_device = Arc::new(midi::test::Device::get(
            "mock-midi",
            u4::from(9),
            u7::from(38),
        ));

        let mut engine = Engine::new(
            midi_device.clone(),
            Strategy::Burst {
                detector: Arc::new(mock_detector.clone()),
                gate: Gate::new(Polarity::Rising, Duration::from_millis(30)),
                capture: capture::Engine::new(4096, fifo_rx),
                analyzer: Analyzer::new(Curve::default()),
            },
            Duration::from_secs(60),
        )?;

        eventually(
            || mock_detector.is_watching(),
            "Detector was never watched",
        );

        // Noise from before the strike. Opening the window must flush it.
        for _ in 0..16 {
            fifo_tx.send(1)?;
        }

        mock_detector.edge(Edge::rising(Instant::now()));
        eventually(|| probe.is_empty(), "Stale samples were never flushed");

        for _ in 0..40 {
            fifo_tx.send(50)?;
        }
        eventually(|| probe.is_empty(), "Burst samples were never consumed");

        mock_detector.edge(Edge::falling(Instant::now()));
        eventually(|| midi_device.sent() == vec![12], "Hit was never sent");
        assert_eq!(1, engine.hits());

        mock_detector.stop_watch_edges();
        assert!(engine.join().await.is_ok(), "Error waiting for engine");

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_empty_window_is_suppressed() -> Result<(), Box<dyn Error>> {
        let (fifo_tx, fifo_rx) = bounded(FIFO_DEPTH);
        let probe = fifo_rx.clone();

        let mock_detector = test::Detector::get("mock-edges");
        let midi_device = Arc::new(midi::test::Device::get(
            "mock-midi",
            u4::from(9),
            u7::from(38),
        ));

        let engine = Engine::new(
            midi_device.clone(),
            Strategy::Burst {
                detector: Arc::new(mock_detector.clone()),
                gate: Gate::new(Polarity::Rising, Duration::from_millis(30)),
                capture: capture::Engine::new(4096, fifo_rx),
                analyzer: Analyzer::new(Curve::default()),
            },
            Duration::from_secs(60),
        )?;

        eventually(
            || mock_detector.is_watching(),
            "Detector was never watched",
        );

        // A window that closes with no samples in it.
        mock_detector.edge(Edge::rising(Instant::now()));
        mock_detector.edge(Edge::falling(Instant::now()));

        // Wait out the lockout and run a real cycle. The second window's
        // note being the only one sent shows the empty window made no sound.
        tokio::time::sleep(Duration::from_millis(40)).await;

        fifo_tx.send(1)?;
        mock_detector.edge(Edge::rising(Instant::now()));
        eventually(|| probe.is_empty(), "Stale sample was never flushed");

        for _ in 0..40 {
            fifo_tx.send(50)?;
        }
        eventually(|| probe.is_empty(), "Burst samples were never consumed");

        mock_detector.edge(Edge::falling(Instant::now()));
        eventually(|| midi_device.sent() == vec![12], "Hit was never sent");
        assert_eq!(1, engine.hits());

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_continuous_envelope_emits_hits() -> Result<(), Box<dyn Error>> {
        let (fifo_tx, fifo_rx) = bounded(FIFO_DEPTH);

        let midi_device = Arc::new(midi::test::Device::get(
            "mock-midi",
            u4::from(9),
            u7::from(38),
        ));

        let mut engine = Engine::new(
            midi_device.clone(),
            Strategy::Continuous {
                fifo: fifo_rx,
                envelope: Follower::new(0),
                strike_on: 48,
                strike_off: 16,
                lockout: Duration::from_millis(30),
            },
            Duration::from_secs(60),
        )?;

        // One impulse and enough silence for the envelope to decay.
        fifo_tx.send(200)?;
        for _ in 0..100 {
            fifo_tx.send(0)?;
        }
        eventually(|| midi_device.sent() == vec![71], "Hit was never sent");

        // A second strike after the lockout has expired. The baseline absorbs
        // a sliver of the impulse, so the peak lands at 179 rather than 190.
        tokio::time::sleep(Duration::from_millis(40)).await;
        fifo_tx.send(190)?;
        for _ in 0..100 {
            fifo_tx.send(0)?;
        }
        eventually(
            || midi_device.sent() == vec![71, 62],
            "Second hit was never sent",
        );
        assert_eq!(2, engine.hits());

        drop(fifo_tx);
        assert!(engine.join().await.is_ok(), "Error waiting for engine");

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_continuous_lockout_suppresses_retrigger() -> Result<(), Box<dyn Error>> {
        let (fifo_tx, fifo_rx) = bounded(FIFO_DEPTH);
        let probe = fifo_rx.clone();

        let midi_device = Arc::new(midi::test::Device::get(
            "mock-midi",
            u4::from(9),
            u7::from(38),
        ));

        let engine = Engine::new(
            midi_device.clone(),
            Strategy::Continuous {
                fifo: fifo_rx,
                envelope: Follower::new(0),
                strike_on: 48,
                strike_off: 16,
                lockout: Duration::from_secs(10),
            },
            Duration::from_secs(60),
        )?;

        fifo_tx.send(200)?;
        for _ in 0..100 {
            fifo_tx.send(0)?;
        }
        eventually(|| midi_device.sent() == vec![71], "Hit was never sent");

        // A second strike well inside the lockout makes no sound.
        fifo_tx.send(190)?;
        for _ in 0..100 {
            fifo_tx.send(0)?;
        }
        eventually(|| probe.is_empty(), "Second strike was never consumed");
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(vec![71], midi_device.sent());
        assert_eq!(1, engine.hits());

        Ok(())
    }
}
