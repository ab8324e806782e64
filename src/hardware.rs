//! The boundary to the robot.
//!
//! Workflows never talk to the vendor API directly. They emit [`Command`]s
//! through a [`Driver`]; a real deployment forwards them to the robot, while
//! [`DryRun`] records them for inspection and tests.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DriverError;
use crate::pipette::Mount;

/// Deck position of a piece of labware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawSlot", into = "RawSlot")]
pub enum Slot {
    /// Numbered deck slot, 1 to 11.
    Deck(u8),
    /// On top of the thermocycler module.
    Thermocycler,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawSlot {
    Number(u8),
    Name(String),
}

impl TryFrom<RawSlot> for Slot {
    type Error = String;

    fn try_from(raw: RawSlot) -> Result<Self, Self::Error> {
        match raw {
            RawSlot::Number(n @ 1..=11) => Ok(Slot::Deck(n)),
            RawSlot::Number(n) => Err(format!("deck slot {n} is outside 1..=11")),
            RawSlot::Name(name) if name == "thermocycler" => Ok(Slot::Thermocycler),
            RawSlot::Name(name) => name
                .parse::<u8>()
                .map_err(|_| format!("'{name}' is not a deck slot or 'thermocycler'"))
                .and_then(|n| Slot::try_from(RawSlot::Number(n))),
        }
    }
}

impl From<Slot> for RawSlot {
    fn from(slot: Slot) -> Self {
        match slot {
            Slot::Deck(n) => RawSlot::Number(n),
            Slot::Thermocycler => RawSlot::Name("thermocycler".to_string()),
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Deck(n) => write!(f, "{n}"),
            Slot::Thermocycler => write!(f, "thermocycler"),
        }
    }
}

/// Run-local handle of loaded labware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LabwareHandle(pub usize);

/// Where in a well the tip goes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Position {
    /// The driver's default clearance.
    Default,
    /// `z` mm above the well bottom.
    Bottom { z: f64 },
    /// `z` mm above the well bottom, shifted by `x`/`y` mm from the centre.
    BottomOffset { x: f64, y: f64, z: f64 },
}

/// A well on a loaded piece of labware.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WellRef {
    pub labware: LabwareHandle,
    pub well: String,
    pub position: Position,
}

impl WellRef {
    pub fn new(labware: LabwareHandle, well: impl Into<String>) -> Self {
        WellRef {
            labware,
            well: well.into(),
            position: Position::Default,
        }
    }

    pub fn bottom(mut self, z: f64) -> Self {
        self.position = Position::Bottom { z };
        self
    }

    pub fn bottom_offset(mut self, x: f64, y: f64, z: f64) -> Self {
        self.position = Position::BottomOffset { x, y, z };
        self
    }
}

/// One instruction for the robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    LoadLabware {
        labware: LabwareHandle,
        load_name: String,
        slot: Slot,
        label: Option<String>,
    },
    LoadThermocycler,
    LoadPipette {
        mount: Mount,
        load_name: String,
        tip_racks: Vec<LabwareHandle>,
    },
    PickUpTip {
        mount: Mount,
    },
    DropTip {
        mount: Mount,
    },
    Aspirate {
        mount: Mount,
        volume: f64,
        at: WellRef,
        rate: f64,
    },
    Dispense {
        mount: Mount,
        volume: f64,
        at: WellRef,
        rate: f64,
    },
    /// Mix in place. Without `volume` the pipette uses its capacity; without
    /// `at` it mixes wherever the tip currently is.
    Mix {
        mount: Mount,
        repetitions: u32,
        volume: Option<f64>,
        at: Option<WellRef>,
        rate: f64,
    },
    BlowOut {
        mount: Mount,
        at: WellRef,
    },
    MoveTo {
        mount: Mount,
        at: WellRef,
    },
    SetBlockTemperature {
        celsius: f64,
        hold_seconds: Option<f64>,
    },
    SetLidTemperature {
        celsius: f64,
    },
    OpenLid,
    CloseLid,
    DeactivateLid,
    DeactivateBlock,
    /// Operator checkpoint; the driver blocks until the operator resumes.
    Pause {
        message: String,
    },
    Delay {
        seconds: f64,
    },
    Comment {
        message: String,
    },
    SetRailLights {
        on: bool,
    },
}

/// Executes commands on (or on behalf of) the robot.
pub trait Driver {
    /// Execute one command. Any error aborts the run.
    fn issue(&mut self, command: &Command) -> Result<(), DriverError>;
}

/// Records every command instead of moving anything.
#[derive(Debug, Default)]
pub struct DryRun {
    pub commands: Vec<Command>,
}

impl DryRun {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands as newline-separated JSON objects.
    pub fn to_json_lines(&self) -> Result<String, serde_json::Error> {
        let mut out = String::new();
        for command in &self.commands {
            out.push_str(&serde_json::to_string(command)?);
            out.push('\n');
        }
        Ok(out)
    }
}

impl Driver for DryRun {
    fn issue(&mut self, command: &Command) -> Result<(), DriverError> {
        log::debug!("{command:?}");
        if let Command::Pause { message } = command {
            log::info!("operator pause: {message}");
        }
        self.commands.push(command.clone());
        Ok(())
    }
}
