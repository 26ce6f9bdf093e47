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
use std::error::Error;

use serde::Deserialize;

use crate::velocity::Curve;

/// A YAML representation of the velocity analysis configuration.
#[derive(Deserialize, Clone, Default)]
pub struct Analysis {
    /// Loudness at or below this maps to the quietest velocity (default: 20).
    silence_floor: Option<f32>,

    /// Loudness at or above this maps to full velocity (default: 110).
    clamp_ceiling: Option<f32>,
}

impl Analysis {
    /// Returns the velocity curve described by this configuration.
    pub fn curve(&self) -> Result<Curve, Box<dyn Error>> {
        let silence_floor = self.silence_floor.unwrap_or(20.0);
        let clamp_ceiling = self.clamp_ceiling.unwrap_or(110.0);
        if silence_floor >= clamp_ceiling {
            return Err(format!(
                "silence floor ({}) must be below the clamp ceiling ({})",
                silence_floor, clamp_ceiling
            )
            .into());
        }
        Ok(Curve::new(silence_floor, clamp_ceiling))
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;

    use config::{Config, File, FileFormat};

    #[test]
    fn custom_curve() -> Result<(), Box<dyn Error>> {
        let analysis: super::Analysis = Config::builder()
            .add_source(File::from_str(
                r#"
                silence_floor: 10
                clamp_ceiling: 200
            "#,
                FileFormat::Yaml,
            ))
            .build()?
            .try_deserialize()?;

        let curve = analysis.curve()?;
        assert_eq!(1, curve.apply(10.0));
        assert_eq!(127, curve.apply(200.0));
        Ok(())
    }

    #[test]
    fn rejects_inverted_curve() {
        let analysis: super::Analysis = serde_yml::from_str(
            r#"
            silence_floor: 110
            clamp_ceiling: 20
        "#,
        )
        .unwrap();

        assert!(analysis.curve().is_err());
    }
}
