use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How many wells a pipette addresses in one movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelMode {
    /// One well per movement.
    Single,
    /// A full 8-well column per movement, addressed by its row-A well.
    Multi,
}

/// Pipette mount on the gantry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mount {
    Left,
    Right,
}

impl fmt::Display for Mount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mount::Left => write!(f, "left"),
            Mount::Right => write!(f, "right"),
        }
    }
}

/// Capabilities of a pipette, read from its vendor load name
/// (`p<capacity>_<single|multi>_gen<n>`).
#[derive(Debug, Clone, PartialEq)]
pub struct PipetteModel {
    pub load_name: String,
    /// Maximum volume in µL.
    pub max_volume: f64,
    pub channels: ChannelMode,
}

impl PipetteModel {
    pub fn from_load_name(load_name: &str) -> Result<Self, ConfigError> {
        let unknown = || ConfigError::UnknownPipette(load_name.to_string());
        let mut parts = load_name.split('_');

        let max_volume = parts
            .next()
            .and_then(|p| p.strip_prefix('p'))
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| *v > 0.0)
            .ok_or_else(unknown)?;
        let channels = match parts.next() {
            Some("single") => ChannelMode::Single,
            Some("multi") => ChannelMode::Multi,
            _ => return Err(unknown()),
        };
        match parts.next() {
            Some(generation) if generation.starts_with("gen") => {}
            _ => return Err(unknown()),
        }

        Ok(PipetteModel {
            load_name: load_name.to_string(),
            max_volume,
            channels,
        })
    }
}

/// A pipette loaded on a mount.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipette {
    pub mount: Mount,
    pub model: PipetteModel,
}

impl Pipette {
    pub fn max_volume(&self) -> f64 {
        self.model.max_volume
    }

    pub fn channels(&self) -> ChannelMode {
        self.model.channels
    }

    /// Half of the liquid already in the well, capped at the pipette capacity.
    pub fn mixing_volume(&self, cumulative_volume: f64) -> f64 {
        (cumulative_volume / 2.0).min(self.max_volume())
    }

    /// Split a volume into equal chunks that each fit in the tip.
    pub fn chunks(&self, volume: f64) -> Vec<f64> {
        if volume <= self.max_volume() {
            return vec![volume];
        }
        let count = (volume / self.max_volume()).ceil() as usize;
        vec![volume / count as f64; count]
    }
}

/// Pick the pipette for a reactant from the volumes it will move.
///
/// Zero volumes are ignored. The smallest pipette able to hold the smallest
/// volume wins; if none can, the largest pipette is used.
pub fn choose_pipette<'a>(volumes: &[f64], pipettes: &'a [Pipette]) -> Result<&'a Pipette, ConfigError> {
    let first = pipettes.first().ok_or(ConfigError::NoPipettes)?;
    let smallest = volumes
        .iter()
        .copied()
        .filter(|v| *v != 0.0)
        .min_by(f64::total_cmp);
    let Some(smallest) = smallest else {
        log::warn!(
            "no non-zero volumes to size a pipette for, using {} pipette",
            first.mount
        );
        return Ok(first);
    };

    let by_capacity = |a: &&Pipette, b: &&Pipette| a.max_volume().total_cmp(&b.max_volume());
    let chosen = pipettes
        .iter()
        .filter(|p| p.max_volume() >= smallest)
        .min_by(by_capacity)
        .or_else(|| pipettes.iter().max_by(by_capacity))
        .unwrap_or(first);
    log::debug!(
        "smallest volume {smallest} µL → {} on {} mount",
        chosen.model.load_name,
        chosen.mount
    );
    Ok(chosen)
}
