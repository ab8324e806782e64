//! Plain transfer of one reactant between two plates, fresh tip per well.

use serde::Deserialize;

use crate::config::DualPipetteParams;
use crate::data::filter::{plan_transfers, TransferColumns};
use crate::data::model::ExperimentTable;
use crate::error::Result;
use crate::hardware::{Slot, WellRef};
use crate::pipette::choose_pipette;
use crate::protocols::{load_pipettes, plan_pipettes};
use crate::state::{DeckPlan, RunState};

pub const COLUMNS: &[&str] = &[
    "source_id",
    "source_well",
    "source_volume",
    "destination_id",
    "destination_well",
    "destination_volume",
];

const SOURCE: TransferColumns<'static> = TransferColumns {
    source: "source_well",
    destination: "destination_well",
    volume: "source_volume",
};

#[derive(Debug, Clone, Deserialize)]
pub struct TransferParams {
    #[serde(flatten)]
    pub pipettes: DualPipetteParams,
    pub source_plate_name: String,
    pub source_plate_slot: Slot,
    pub destination_plate_name: String,
    pub destination_plate_slot: Slot,
}

pub fn run(state: &mut RunState<'_>, params: &TransferParams, table: &ExperimentTable) -> Result<()> {
    table.require_columns(COLUMNS)?;

    let setups = params.pipettes.setups();
    let mut deck = DeckPlan::new();
    let pipettes = plan_pipettes(&mut deck, &setups)?;
    let pipette = choose_pipette(&table.numbers(SOURCE.volume)?, &pipettes)?;
    deck.shared(&params.source_plate_name, params.source_plate_slot)?;
    deck.shared(&params.destination_plate_name, params.destination_plate_slot)?;
    let steps = plan_transfers(table, pipette.channels(), SOURCE)?;

    load_pipettes(state, &setups)?;
    let source_plate = state.load_or_reuse(&params.source_plate_name, params.source_plate_slot)?;
    let destination_plate =
        state.load_or_reuse(&params.destination_plate_name, params.destination_plate_slot)?;

    log::info!("transferring {} wells", steps.len());
    for step in &steps {
        let source = WellRef::new(source_plate, &step.source);
        let destination = WellRef::new(destination_plate, &step.destination);
        state.pick_up_tip(pipette)?;
        state.transfer(pipette, step.volume, &source, &destination)?;
        state.drop_tip(pipette)?;
    }
    Ok(())
}
