// Copyright (C) 2024 Michael Wilson <mike@mdwn.dev>
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
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use duration_string::DurationString;
use serde::Deserialize;

use crate::gate::Gate;
use crate::velocity::Analyzer;

mod analysis;
mod audio;
mod capture;
mod detector;
mod envelope;
mod error;
mod midi;

pub use self::audio::Audio;
pub use self::error::ConfigError;
pub use self::midi::Midi;

const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(10);

/// The trigger modes.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Burst,
    Continuous,
}

/// The configuration for the drum trigger.
#[derive(Deserialize)]
pub struct Trigger {
    /// The trigger mode to run in (default: burst).
    mode: Option<Mode>,

    /// The audio capture configuration.
    audio: Audio,

    /// The MIDI output configuration.
    midi: Midi,

    /// The edge detector, used in burst mode.
    detector: Option<detector::Detector>,

    /// The burst capture configuration.
    capture: Option<capture::Capture>,

    /// The velocity analysis configuration.
    analysis: Option<analysis::Analysis>,

    /// The envelope follower configuration, used in continuous mode.
    envelope: Option<envelope::Envelope>,

    /// How often to log a status heartbeat (default: 10s).
    heartbeat: Option<String>,
}

impl Trigger {
    /// Loads the trigger configuration from the given YAML file.
    pub fn load(path: &PathBuf) -> Result<Trigger, ConfigError> {
        Ok(serde_yml::from_str(&fs::read_to_string(path)?)?)
    }

    /// Returns the trigger mode (default: burst).
    pub fn mode(&self) -> Mode {
        self.mode.unwrap_or(Mode::Burst)
    }

    /// Returns the heartbeat interval (default: 10s).
    pub fn heartbeat(&self) -> Result<Duration, Box<dyn Error>> {
        match &self.heartbeat {
            Some(heartbeat) => Ok(DurationString::from_string(heartbeat.clone())?.into()),
            None => Ok(DEFAULT_HEARTBEAT),
        }
    }
}

/// Initializes the trigger engine from the given config file and returns it.
/// The engine can be waited on until it exits. Realistically, the engine is
/// not expected to exit.
pub fn init_engine(path: &PathBuf) -> Result<crate::engine::Engine, Box<dyn Error>> {
    let trigger = Trigger::load(path)?;
    let midi_device = crate::midi::get_device(Some(trigger.midi.clone()))?;
    let source = crate::sampler::get_device(Some(trigger.audio.clone()))?;

    let (fifo_tx, fifo_rx) = crossbeam_channel::bounded(crate::sampler::FIFO_DEPTH);

    let strategy = match trigger.mode() {
        Mode::Burst => {
            let detector_config = trigger.detector.clone().unwrap_or_default();
            let capture_config = trigger.capture.clone().unwrap_or_default();
            let analysis_config = trigger.analysis.clone().unwrap_or_default();

            let (tap_tx, tap_rx) = if detector_config.needs_tap() {
                let (tap_tx, tap_rx) = crossbeam_channel::bounded(crate::sampler::FIFO_DEPTH);
                (Some(tap_tx), Some(tap_rx))
            } else {
                (None, None)
            };
            source.start(fifo_tx, tap_tx)?;

            crate::engine::Strategy::Burst {
                detector: detector_config.build(tap_rx)?,
                gate: Gate::new(capture_config.open_on()?, capture_config.lockout()?),
                capture: crate::capture::Engine::new(capture_config.depth(), fifo_rx),
                analyzer: Analyzer::new(analysis_config.curve()?),
            }
        }
        Mode::Continuous => {
            let envelope_config = trigger.envelope.clone().unwrap_or_default();
            let (strike_on, strike_off) = envelope_config.thresholds()?;

            source.start(fifo_tx, None)?;

            crate::engine::Strategy::Continuous {
                fifo: fifo_rx,
                envelope: crate::envelope::Follower::new(envelope_config.initial_baseline()),
                strike_on,
                strike_off,
                lockout: envelope_config.lockout()?,
            }
        }
    };

    crate::engine::Engine::new(midi_device, strategy, trigger.heartbeat()?)
}

/// Initializes a one-shot capture from the given config file. Returns the
/// capture engine along with the analyzer so that callers can report on what
/// they grab.
pub fn init_capture(path: &PathBuf) -> Result<(crate::capture::Engine, Analyzer), Box<dyn Error>> {
    let trigger = Trigger::load(path)?;
    let capture_config = trigger.capture.clone().unwrap_or_default();
    let analysis_config = trigger.analysis.clone().unwrap_or_default();

    let source = crate::sampler::get_device(Some(trigger.audio.clone()))?;
    let (fifo_tx, fifo_rx) = crossbeam_channel::bounded(crate::sampler::FIFO_DEPTH);
    source.start(fifo_tx, None)?;

    Ok((
        crate::capture::Engine::new(capture_config.depth(), fifo_rx),
        Analyzer::new(analysis_config.curve()?),
    ))
}

#[cfg(test)]
mod test {
    use std::error::Error;
    use std::time::Duration;

    use super::{Mode, Trigger};

    fn write_config(yaml: &str) -> Result<(tempfile::TempDir, std::path::PathBuf), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("trigger.yaml");
        std::fs::write(&path, yaml)?;
        Ok((dir, path))
    }

    #[test]
    fn minimal_config_uses_defaults() -> Result<(), Box<dyn Error>> {
        let (_dir, path) = write_config(
            r#"
            audio:
              device: mock-in
            midi:
              device: mock-out
        "#,
        )?;
        let trigger = Trigger::load(&path)?;

        assert_eq!(Mode::Burst, trigger.mode());
        assert_eq!(Duration::from_secs(10), trigger.heartbeat()?);
        assert_eq!("mock-in", trigger.audio.device());
        assert_eq!(9, trigger.midi.channel()?.as_int());
        assert!(trigger.detector.is_none());
        Ok(())
    }

    #[test]
    fn full_config() -> Result<(), Box<dyn Error>> {
        let (_dir, path) = write_config(
            r#"
            mode: continuous
            audio:
              device: mock-in
              sample_rate: 48000
              channel: 2
            midi:
              device: mock-out
              channel: 10
              note: 40
            envelope:
              strike_on: 64
              strike_off: 24
            heartbeat: 30s
        "#,
        )?;
        let trigger = Trigger::load(&path)?;

        assert_eq!(Mode::Continuous, trigger.mode());
        assert_eq!(Duration::from_secs(30), trigger.heartbeat()?);
        assert_eq!(48000, trigger.audio.sample_rate());
        assert_eq!(2, trigger.audio.channel());
        assert_eq!(40, trigger.midi.note()?.as_int());
        assert_eq!(
            (64, 24),
            trigger.envelope.clone().unwrap_or_default().thresholds()?
        );
        Ok(())
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let path = std::path::PathBuf::from("/definitely/not/here.yaml");
        assert!(matches!(
            Trigger::load(&path),
            Err(super::ConfigError::Load(_))
        ));
    }

    #[test]
    fn bad_yaml_is_a_parse_error() -> Result<(), Box<dyn Error>> {
        let (_dir, path) = write_config("audio: [")?;
        assert!(matches!(
            Trigger::load(&path),
            Err(super::ConfigError::Parse(_))
        ));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn init_engine_wires_up_burst_mode() -> Result<(), Box<dyn Error>> {
        let (_dir, path) = write_config(
            r#"
            audio:
              device: mock-in
            midi:
              device: mock-out
            detector:
              kind: comparator
        "#,
        )?;

        // The mock source is dropped inside init, which disconnects the
        // sample stream and lets the engine wind all the way down.
        let mut engine = super::init_engine(&path)?;
        let joined = tokio::time::timeout(Duration::from_secs(5), engine.join()).await;
        assert!(joined.is_ok(), "Engine never wound down");
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn init_engine_wires_up_continuous_mode() -> Result<(), Box<dyn Error>> {
        let (_dir, path) = write_config(
            r#"
            mode: continuous
            audio:
              device: mock-in
            midi:
              device: mock-out
        "#,
        )?;

        let mut engine = super::init_engine(&path)?;
        let joined = tokio::time::timeout(Duration::from_secs(5), engine.join()).await;
        assert!(joined.is_ok(), "Engine never wound down");
        Ok(())
    }
}
