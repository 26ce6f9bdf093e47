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
use serde::Deserialize;

const DEFAULT_CHANNEL: u16 = 1;

/// A YAML representation of the audio capture configuration.
#[derive(Deserialize, Clone)]
pub struct Audio {
    /// The audio device.
    device: String,

    /// Target sample rate in Hz (default: 44100)
    sample_rate: Option<u32>,

    /// The 1-indexed input channel the piezo is wired to (default: 1)
    channel: Option<u16>,
}

impl Audio {
    /// New will create a new Audio configuration.
    pub fn new(device: &str) -> Audio {
        Audio {
            device: device.to_string(),
            sample_rate: None,
            channel: None,
        }
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Returns the target sample rate (default: 44100)
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(44100)
    }

    /// Returns the 1-indexed input channel to capture (default: 1)
    pub fn channel(&self) -> u16 {
        self.channel.unwrap_or(DEFAULT_CHANNEL).max(1)
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;

    use config::{Config, File, FileFormat};

    #[test]
    fn defaults() -> Result<(), Box<dyn Error>> {
        let audio: super::Audio = Config::builder()
            .add_source(File::from_str("device: mock-in", FileFormat::Yaml))
            .build()?
            .try_deserialize()?;

        assert_eq!("mock-in", audio.device());
        assert_eq!(44100, audio.sample_rate());
        assert_eq!(1, audio.channel());
        Ok(())
    }

    #[test]
    fn channel_zero_is_clamped() {
        let audio: super::Audio = serde_yml::from_str(
            r#"
            device: mock-in
            sample_rate: 48000
            channel: 0
        "#,
        )
        .unwrap();

        assert_eq!(48000, audio.sample_rate());
        assert_eq!(1, audio.channel());
    }
}
