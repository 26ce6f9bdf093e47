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
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::Sender;
use tracing::{error, info, span, warn, Level};

use crate::config;
use crate::sampler::priority::{
    configure_sample_thread_priority, rt_sampling_enabled, sample_thread_priority,
};
use crate::sampler::Source as SamplerSource;

/// How many overruns go by between log lines. Overruns come in bursts when
/// the consumer stalls, so logging each one would flood the output.
const OVERRUN_LOG_INTERVAL: u64 = 65536;

/// A small wrapper around a cpal::Device. Holds the capture configuration
/// and the thread that keeps the input stream alive.
pub struct Source {
    /// The name of the device.
    name: String,
    /// The maximum number of input channels the device supports.
    max_channels: u16,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
    /// Audio configuration for the capture stream.
    audio_config: config::Audio,
    /// Set to stop the stream thread.
    stop: Arc<AtomicBool>,
    /// Handle to the stream thread (keeps the stream alive).
    stream_thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

/// Rectifies one f32 sample into the 8-bit trigger range.
fn rectify_f32(sample: f32) -> u8 {
    (sample.abs() * 255.0).min(255.0) as u8
}

/// Rectifies one i16 sample into the 8-bit trigger range.
fn rectify_i16(sample: i16) -> u8 {
    (sample.unsigned_abs() >> 7).min(255) as u8
}

/// Pushes rectified samples into the FIFO and the detector tap without ever
/// blocking the device callback.
struct Pusher {
    fifo: Sender<u8>,
    tap: Option<Sender<u8>>,
    overruns: u64,
}

impl Pusher {
    fn push(&mut self, sample: u8) {
        if self.fifo.try_send(sample).is_err() {
            self.overruns += 1;
            if self.overruns % OVERRUN_LOG_INTERVAL == 1 {
                warn!(overruns = self.overruns, "Sample FIFO overrun.");
            }
        }
        if let Some(tap) = &self.tap {
            let _ = tap.try_send(sample);
        }
    }
}

impl Source {
    /// Lists cpal sources and produces the Source trait.
    pub fn list() -> Result<Vec<Box<dyn SamplerSource>>, Box<dyn Error>> {
        Ok(Source::list_cpal_sources()?
            .into_iter()
            .map(|source| {
                let source: Box<dyn SamplerSource> = Box::new(source);
                source
            })
            .collect())
    }

    /// Lists cpal devices that have input channels.
    fn list_cpal_sources() -> Result<Vec<Source>, Box<dyn Error>> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut sources: Vec<Source> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let mut max_channels = 0;

                let input_configs = device.supported_input_configs();
                if let Err(_e) = input_configs {
                    continue;
                }

                for input_config in device.supported_input_configs()? {
                    if max_channels < input_config.channels() {
                        max_channels = input_config.channels();
                    }
                }

                if max_channels > 0 {
                    sources.push(Source {
                        name: device.name()?,
                        max_channels,
                        host_id,
                        device,
                        audio_config: config::Audio::new("default"),
                        stop: Arc::new(AtomicBool::new(false)),
                        stream_thread: Mutex::new(None),
                    })
                }
            }
        }

        sources.sort_by_key(|source| source.name.to_string());
        Ok(sources)
    }

    /// Gets the given cpal source.
    pub fn get(config: config::Audio) -> Result<Source, Box<dyn Error>> {
        let name = config.device();
        match Source::list_cpal_sources()?
            .into_iter()
            .find(|source| source.name.trim() == name)
        {
            Some(mut source) => {
                source.audio_config = config;
                Ok(source)
            }
            None => Err(format!("no device found with name {}", name).into()),
        }
    }
}

impl SamplerSource for Source {
    /// Opens the input stream and pushes rectified samples from the
    /// configured channel until stopped.
    fn start(&self, fifo: Sender<u8>, tap: Option<Sender<u8>>) -> Result<(), Box<dyn Error>> {
        let span = span!(Level::INFO, "sample stream (cpal)");
        let _enter = span.enter();

        let device = self.device.clone();
        let default_config = device.default_input_config()?;
        let sample_format = default_config.sample_format();
        let channels = default_config.channels();
        if channels == 0 {
            return Err("device reports no input channels".into());
        }

        // The trigger channel is 1-indexed in the config.
        let channel = usize::from(self.audio_config.channel().saturating_sub(1))
            .min(usize::from(channels) - 1);

        let config = cpal::StreamConfig {
            channels,
            sample_rate: self.audio_config.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };

        info!(
            device = self.name,
            channel = self.audio_config.channel(),
            sample_rate = self.audio_config.sample_rate(),
            "Starting sample stream."
        );

        let mut pusher = Pusher {
            fifo,
            tap,
            overruns: 0,
        };
        let stop = self.stop.clone();

        // The stream is created inside the thread: cpal streams aren't Send,
        // and something has to keep the stream alive after start() returns.
        let stream_thread = thread::spawn(move || {
            let priority = sample_thread_priority();
            let rt_sampling = rt_sampling_enabled();
            let mut priority_set = false;

            let step = usize::from(channels);
            let stream_result = match sample_format {
                cpal::SampleFormat::F32 => device.build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        configure_sample_thread_priority(priority, rt_sampling, &mut priority_set);
                        for frame in data.chunks(step) {
                            pusher.push(rectify_f32(frame[channel]));
                        }
                    },
                    |err| error!("CPAL input stream error: {}", err),
                    None,
                ),
                cpal::SampleFormat::I16 => device.build_input_stream(
                    &config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        configure_sample_thread_priority(priority, rt_sampling, &mut priority_set);
                        for frame in data.chunks(step) {
                            pusher.push(rectify_i16(frame[channel]));
                        }
                    },
                    |err| error!("CPAL input stream error: {}", err),
                    None,
                ),
                other => {
                    error!(
                        format = format!("{:?}", other),
                        "Unsupported input sample format"
                    );
                    return;
                }
            };

            match stream_result {
                Ok(stream) => {
                    if let Err(e) = stream.play() {
                        error!("Failed to start CPAL stream: {}", e);
                        return;
                    }
                    info!("CPAL input stream started successfully");

                    // Keep the stream alive until stopped.
                    while !stop.load(Ordering::Relaxed) {
                        thread::sleep(Duration::from_millis(100));
                    }
                }
                Err(e) => {
                    error!("Failed to create CPAL stream: {}", e);
                }
            }
        });

        *self.stream_thread.lock().expect("Error getting lock") = Some(stream_thread);

        Ok(())
    }

    fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);

        let handle = self.stream_thread.lock().expect("Error getting lock").take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<super::mock::Source>, Box<dyn Error>> {
        Err("not a mock".into())
    }
}

#[cfg(test)]
mod test {
    use super::{rectify_f32, rectify_i16};

    #[test]
    fn rectify_f32_scales_and_clamps() {
        assert_eq!(0, rectify_f32(0.0));
        assert_eq!(127, rectify_f32(0.5));
        assert_eq!(127, rectify_f32(-0.5));
        assert_eq!(255, rectify_f32(1.0));
        assert_eq!(255, rectify_f32(1.5));
        assert_eq!(255, rectify_f32(-2.0));
    }

    #[test]
    fn rectify_i16_scales_and_clamps() {
        assert_eq!(0, rectify_i16(0));
        assert_eq!(128, rectify_i16(16384));
        assert_eq!(128, rectify_i16(-16384));
        assert_eq!(255, rectify_i16(i16::MAX));
        assert_eq!(255, rectify_i16(i16::MIN));
    }
}
