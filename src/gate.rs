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
use std::{error::Error, str::FromStr, time::Duration, time::Instant};

use crate::detector::Edge;

/// Whether the sampling window is open.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Idle,
    Capturing,
}

/// Which edge direction opens the sampling window. The other direction
/// closes it. An inverted trigger line (e.g. pulled up at rest) opens on
/// falling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Polarity {
    Rising,
    Falling,
}

impl FromStr for Polarity {
    type Err = Box<dyn Error>;

    fn from_str(s: &str) -> Result<Polarity, Self::Err> {
        match s.to_lowercase().as_str() {
            "rising" => Ok(Polarity::Rising),
            "falling" => Ok(Polarity::Falling),
            _ => Err(format!("unrecognized polarity {}", s).into()),
        }
    }
}

/// What the engine should do with the capture in response to an edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// Start a fresh capture.
    Arm,
    /// Stop the capture and measure what was written.
    Measure,
}

/// The edge-triggered state machine that opens and closes the sampling
/// window. After each close a lockout window absorbs trigger bounce and the
/// tail of the analog decay, so one physical hit produces one capture.
///
/// The gate has a single writer (the engine loop) and holds no locks.
pub struct Gate {
    state: State,
    open_on: Polarity,
    lockout: Duration,
    locked_out_since: Option<Instant>,
}

impl Gate {
    /// Creates a new gate in the idle state.
    pub fn new(open_on: Polarity, lockout: Duration) -> Gate {
        Gate {
            state: State::Idle,
            open_on,
            lockout,
            locked_out_since: None,
        }
    }

    /// Handles one edge event, returning the actions to run in order.
    ///
    /// The closing direction is applied before the opening one, so a single
    /// event carrying both transitions ends the window rather than
    /// restarting it; the lockout started by the close then rejects the
    /// opening half.
    pub fn handle(&mut self, edge: &Edge) -> Vec<Action> {
        let mut actions = Vec::with_capacity(2);
        let (opens, closes) = match self.open_on {
            Polarity::Rising => (edge.rising, edge.falling),
            Polarity::Falling => (edge.falling, edge.rising),
        };

        if closes && self.state == State::Capturing {
            self.state = State::Idle;
            self.locked_out_since = Some(edge.at);
            actions.push(Action::Measure);
        }

        if opens && self.state == State::Idle && !self.locked_out(edge.at) {
            self.state = State::Capturing;
            actions.push(Action::Arm);
        }

        actions
    }

    /// Clears the lockout window once its duration has elapsed. Polled by
    /// the engine, so the lockout also expires when no edges arrive.
    pub fn poll(&mut self, now: Instant) {
        if let Some(since) = self.locked_out_since {
            if now.saturating_duration_since(since) > self.lockout {
                self.locked_out_since = None;
            }
        }
    }

    /// The current gate state.
    pub fn state(&self) -> State {
        self.state
    }

    fn locked_out(&self, at: Instant) -> bool {
        match self.locked_out_since {
            Some(since) => at.saturating_duration_since(since) <= self.lockout,
            None => false,
        }
    }
}
