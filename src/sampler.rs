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
use std::{error::Error, fmt, sync::Arc};

use crossbeam_channel::Sender;

use crate::config;

pub mod cpal;
pub mod mock;
pub mod priority;
pub mod transfer;

/// The capacity of the sample FIFO between the device callback and whoever
/// consumes samples. Deep enough to absorb scheduling hiccups without the
/// callback ever blocking.
pub const FIFO_DEPTH: usize = 65536;

/// A source of rectified trigger samples.
pub trait Source: fmt::Display + std::marker::Send + std::marker::Sync {
    /// Starts the sample stream. Each rectified sample is pushed into the
    /// FIFO. When a tap is given, samples are mirrored into it as well so
    /// that the edge detector can observe the stream.
    fn start(&self, fifo: Sender<u8>, tap: Option<Sender<u8>>) -> Result<(), Box<dyn Error>>;

    /// Stops the sample stream.
    fn stop(&self);

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<mock::Source>, Box<dyn Error>>;
}

/// Lists devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Source>>, Box<dyn Error>> {
    cpal::Source::list()
}

/// Gets a source with the given name.
pub fn get_device(config: Option<config::Audio>) -> Result<Arc<dyn Source>, Box<dyn Error>> {
    let config = match config {
        Some(config) => config,
        None => return Err("there must be an audio device specified".into()),
    };

    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Source::get(device)));
    };

    Ok(Arc::new(cpal::Source::get(config)?))
}
