//! Protocol parameters.
//!
//! Parameters arrive as a flat JSON object. [`Parameters`] gives fail-fast
//! access by key for code that builds key names at runtime; each workflow
//! also deserializes its own typed struct up front, so a missing key stops
//! the run before the first command is issued.

use std::path::Path;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::data::derived::PlateBase;
use crate::error::{ConfigError, Result};
use crate::hardware::Slot;
use crate::pipette::{Mount, Pipette, PipetteModel};

// ---------------------------------------------------------------------------
// Dynamic access
// ---------------------------------------------------------------------------

/// The raw parameter object.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Parameters {
    values: Map<String, Value>,
}

impl Parameters {
    pub fn from_json(text: &str) -> std::result::Result<Self, ConfigError> {
        match serde_json::from_str::<Value>(text)? {
            Value::Object(values) => Ok(Parameters { values }),
            _ => Err(ConfigError::NotAnObject),
        }
    }

    /// Read and parse a parameter file.
    pub fn load_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading parameter file {}", path.display()))?;
        let params =
            Self::from_json(&text).with_context(|| format!("parsing {}", path.display()))?;
        log::info!("loaded {} parameters from {}", params.values.len(), path.display());
        Ok(params)
    }

    pub fn get(&self, key: &str) -> std::result::Result<&Value, ConfigError> {
        self.values
            .get(key)
            .ok_or_else(|| ConfigError::MissingKey(key.to_string()))
    }

    pub fn str(&self, key: &str) -> std::result::Result<&str, ConfigError> {
        self.get(key)?
            .as_str()
            .ok_or_else(|| invalid(key, "expected a string"))
    }

    pub fn f64(&self, key: &str) -> std::result::Result<f64, ConfigError> {
        self.get(key)?
            .as_f64()
            .ok_or_else(|| invalid(key, "expected a number"))
    }

    pub fn slot(&self, key: &str) -> std::result::Result<Slot, ConfigError> {
        Slot::deserialize(self.get(key)?).map_err(|e| invalid(key, &e.to_string()))
    }

    /// Deserialize the whole object into a typed parameter struct.
    pub fn typed<T: DeserializeOwned>(&self) -> std::result::Result<T, ConfigError> {
        Ok(serde_json::from_value(Value::Object(self.values.clone()))?)
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Shared typed sections
// ---------------------------------------------------------------------------

/// A pipette plus the tip racks that feed it.
#[derive(Debug, Clone, PartialEq)]
pub struct PipetteSetup {
    pub mount: Mount,
    pub load_name: String,
    pub tiprack_name: String,
    pub tiprack_slots: Vec<Slot>,
}

impl PipetteSetup {
    pub fn pipette(&self) -> std::result::Result<Pipette, ConfigError> {
        Ok(Pipette {
            mount: self.mount,
            model: PipetteModel::from_load_name(&self.load_name)?,
        })
    }
}

/// Workflows driving a pipette on each mount.
#[derive(Debug, Clone, Deserialize)]
pub struct DualPipetteParams {
    pub right_pipette_name: String,
    pub right_pipette_tiprack_name: String,
    #[serde(alias = "right_pipette_tiprack_slots")]
    pub right_pipette_tiprack_slot: Vec<Slot>,
    pub left_pipette_name: String,
    pub left_pipette_tiprack_name: String,
    #[serde(alias = "left_pipette_tiprack_slots")]
    pub left_pipette_tiprack_slot: Vec<Slot>,
}

impl DualPipetteParams {
    /// Right first, so it wins ties when choosing by volume.
    pub fn setups(&self) -> Vec<PipetteSetup> {
        vec![
            PipetteSetup {
                mount: Mount::Right,
                load_name: self.right_pipette_name.clone(),
                tiprack_name: self.right_pipette_tiprack_name.clone(),
                tiprack_slots: self.right_pipette_tiprack_slot.clone(),
            },
            PipetteSetup {
                mount: Mount::Left,
                load_name: self.left_pipette_name.clone(),
                tiprack_name: self.left_pipette_tiprack_name.clone(),
                tiprack_slots: self.left_pipette_tiprack_slot.clone(),
            },
        ]
    }
}

/// Workflows driving a single pipette.
#[derive(Debug, Clone, Deserialize)]
pub struct SinglePipetteParams {
    pub pipette_name: String,
    pub pipette_mount: Mount,
    #[serde(alias = "pipette_tiprack_name")]
    pub tiprack_name: String,
    #[serde(alias = "pipette_tiprack_slots", alias = "tiprack_slot")]
    pub tiprack_slots: Vec<Slot>,
}

impl SinglePipetteParams {
    pub fn setup(&self) -> PipetteSetup {
        PipetteSetup {
            mount: self.pipette_mount,
            load_name: self.pipette_name.clone(),
            tiprack_name: self.tiprack_name.clone(),
            tiprack_slots: self.tiprack_slots.clone(),
        }
    }
}

/// Agar plate measurements used for height calculations.
#[derive(Debug, Clone, Deserialize)]
pub struct AgarPlateParams {
    pub agar_plate_name: String,
    #[serde(alias = "agar_plate_slot")]
    pub agar_plate_slots: Vec<Slot>,
    #[serde(alias = "plate_weight_without_agar")]
    pub empty_agar_plate_weight: f64,
    /// g/mm³
    pub agar_density: f64,
    /// Either the base area in mm² ...
    #[serde(default)]
    pub agar_plate_area: Option<f64>,
    /// ... or a shape with its dimensions.
    #[serde(default)]
    pub agar_plate_shape: Option<String>,
    #[serde(default)]
    pub agar_plate_dimensions: Option<Vec<f64>>,
}

impl AgarPlateParams {
    pub fn plate_base(&self) -> Result<PlateBase> {
        if let Some(area) = self.agar_plate_area {
            return Ok(PlateBase::Area(area));
        }
        let shape = self
            .agar_plate_shape
            .as_deref()
            .ok_or_else(|| ConfigError::MissingKey("agar_plate_area".to_string()))?;
        let dimensions = self
            .agar_plate_dimensions
            .as_deref()
            .ok_or_else(|| ConfigError::MissingKey("agar_plate_dimensions".to_string()))?;
        Ok(PlateBase::from_shape(shape, dimensions)?)
    }
}
