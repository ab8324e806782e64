//! Wet-lab workflows.
//!
//! Each workflow is a straight-line pass in two halves. The plan half reads
//! typed parameters and the design table into transfer steps, per-row heights
//! and deck claims. The issue half loads labware and pipettes and then emits
//! one block of commands per reactant. Anything the design table can get
//! wrong fails in the plan half, before the first command is issued.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{Parameters, PipetteSetup};
use crate::data::model::{ExperimentRow, ExperimentTable};
use crate::error::{ConfigError, Result};
use crate::hardware::{Driver, Slot};
use crate::pipette::Pipette;
use crate::state::{DeckPlan, RunState};

pub mod induction;
pub mod sampling;
pub mod spotting;
pub mod transfer;
pub mod transformation;

/// The workflows this crate knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolKind {
    /// Heat-shock transformation of competent cells.
    Transformation,
    /// Spotting transformed cells onto agar.
    Spotting,
    /// Sampling colonies from agar into media.
    Sampling,
    /// Protein expression induction.
    Induction,
    /// Plain plate-to-plate transfer.
    Transfer,
}

impl ProtocolKind {
    /// Columns the design table must provide.
    pub fn required_columns(self) -> &'static [&'static str] {
        match self {
            ProtocolKind::Transformation => transformation::COLUMNS,
            ProtocolKind::Spotting => spotting::COLUMNS,
            ProtocolKind::Sampling => sampling::COLUMNS,
            ProtocolKind::Induction => induction::COLUMNS,
            ProtocolKind::Transfer => transfer::COLUMNS,
        }
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProtocolKind::Transformation => "transformation",
            ProtocolKind::Spotting => "spotting",
            ProtocolKind::Sampling => "sampling",
            ProtocolKind::Induction => "induction",
            ProtocolKind::Transfer => "transfer",
        };
        write!(f, "{name}")
    }
}

/// Run a workflow against a driver. Returns the number of commands issued.
pub fn run(
    kind: ProtocolKind,
    params: &Parameters,
    table: &ExperimentTable,
    driver: &mut dyn Driver,
) -> Result<usize> {
    log::info!("running {kind} protocol over {} design rows", table.len());
    let mut state = RunState::new(driver);
    match kind {
        ProtocolKind::Transformation => transformation::run(&mut state, &params.typed()?, table)?,
        ProtocolKind::Spotting => spotting::run(&mut state, &params.typed()?, table)?,
        ProtocolKind::Sampling => sampling::run(&mut state, &params.typed()?, table)?,
        ProtocolKind::Induction => induction::run(&mut state, &params.typed()?, table)?,
        ProtocolKind::Transfer => transfer::run(&mut state, &params.typed()?, table)?,
    }
    log::info!("{kind} protocol finished after {} commands", state.issued());
    Ok(state.issued())
}

/// Deck slot named by an integer location column of a design row.
pub(crate) fn row_slot(row: &ExperimentRow, column: &str) -> Result<Slot> {
    let location = row.integer(column)?;
    match u8::try_from(location) {
        Ok(n @ 1..=11) => Ok(Slot::Deck(n)),
        _ => Err(ConfigError::UnknownSlot(location.to_string()).into()),
    }
}

/// Resolve each pipette and claim its tip racks without issuing anything.
pub(crate) fn plan_pipettes(deck: &mut DeckPlan, setups: &[PipetteSetup]) -> Result<Vec<Pipette>> {
    deck.tip_racks(setups)?;
    let mut pipettes = Vec::with_capacity(setups.len());
    for setup in setups {
        pipettes.push(setup.pipette()?);
    }
    Ok(pipettes)
}

/// Load tip racks and pipettes, in setup order.
pub(crate) fn load_pipettes(state: &mut RunState<'_>, setups: &[PipetteSetup]) -> Result<()> {
    for setup in setups {
        state.load_pipette(setup)?;
    }
    Ok(())
}
