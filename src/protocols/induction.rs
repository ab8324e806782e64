//! Protein expression induction: blanks and cultures are laid out on a
//! reader plate, a t0 reading is taken, then inducer is added.

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
    "id",
    "blank_well",
    "blank_volume",
    "culture_well",
    "culture_volume",
    "inducer_well",
    "inducer_volume",
    "destination_well",
];

const BLANK: TransferColumns<'static> = TransferColumns {
    source: "blank_well",
    destination: "destination_well",
    volume: "blank_volume",
};
const CULTURE: TransferColumns<'static> = TransferColumns {
    source: "culture_well",
    destination: "destination_well",
    volume: "culture_volume",
};
const INDUCER: TransferColumns<'static> = TransferColumns {
    source: "inducer_well",
    destination: "destination_well",
    volume: "inducer_volume",
};

#[derive(Debug, Clone, Deserialize)]
pub struct InductionParams {
    #[serde(flatten)]
    pub pipettes: DualPipetteParams,
    pub blank_plate_name: String,
    pub blank_plate_slot: Slot,
    pub culture_plate_name: String,
    pub culture_plate_slot: Slot,
    pub inducer_plate_name: String,
    pub inducer_plate_slot: Slot,
    pub destination_plate_name: String,
    pub destination_plate_slot: Slot,
}

pub fn run(state: &mut RunState<'_>, params: &InductionParams, table: &ExperimentTable) -> Result<()> {
    table.require_columns(COLUMNS)?;

    let setups = params.pipettes.setups();
    let mut deck = DeckPlan::new();
    let pipettes = plan_pipettes(&mut deck, &setups)?;
    let blank_pipette = choose_pipette(&table.numbers(BLANK.volume)?, &pipettes)?;
    let culture_pipette = choose_pipette(&table.numbers(CULTURE.volume)?, &pipettes)?;
    let inducer_pipette = choose_pipette(&table.numbers(INDUCER.volume)?, &pipettes)?;
    // several reactants often share one deep-well plate
    deck.shared(&params.blank_plate_name, params.blank_plate_slot)?;
    deck.shared(&params.culture_plate_name, params.culture_plate_slot)?;
    deck.shared(&params.inducer_plate_name, params.inducer_plate_slot)?;
    deck.shared(&params.destination_plate_name, params.destination_plate_slot)?;

    let blank_steps = plan_transfers(table, blank_pipette.channels(), BLANK)?;
    let culture_steps = plan_transfers(table, culture_pipette.channels(), CULTURE)?;
    let inducer_steps = plan_transfers(table, inducer_pipette.channels(), INDUCER)?;

    load_pipettes(state, &setups)?;
    let blank_plate = state.load_or_reuse(&params.blank_plate_name, params.blank_plate_slot)?;
    let culture_plate = state.load_or_reuse(&params.culture_plate_name, params.culture_plate_slot)?;
    let inducer_plate = state.load_or_reuse(&params.inducer_plate_name, params.inducer_plate_slot)?;
    let destination_plate =
        state.load_or_reuse(&params.destination_plate_name, params.destination_plate_slot)?;

    // ---- blanks, one tip ----
    log::info!("transferring {} blanks", blank_steps.len());
    if !blank_steps.is_empty() {
        state.pick_up_tip(blank_pipette)?;
        for step in &blank_steps {
            let source = WellRef::new(blank_plate, &step.source);
            let destination = WellRef::new(destination_plate, &step.destination);
            state.transfer(blank_pipette, step.volume, &source, &destination)?;
        }
        state.drop_tip(blank_pipette)?;
    }

    // ---- cultures, one tip, resuspended before every draw ----
    log::info!("distributing {} cultures", culture_steps.len());
    let culture_mix = culture_pipette.max_volume() / 2.0;
    if !culture_steps.is_empty() {
        state.pick_up_tip(culture_pipette)?;
        for step in &culture_steps {
            let source = WellRef::new(culture_plate, &step.source);
            let destination = WellRef::new(destination_plate, &step.destination);
            state.mix(culture_pipette, 2, Some(culture_mix), Some(source.clone()), 1.0)?;
            state.transfer(culture_pipette, step.volume, &source, &destination)?;
        }
        state.drop_tip(culture_pipette)?;
    }

    state.pause("Take t0 measurement")?;

    // ---- inducer, fresh tip per well ----
    log::info!("inducing {} wells", inducer_steps.len());
    let inducer_mix = inducer_pipette.max_volume() / 2.0;
    for step in &inducer_steps {
        let source = WellRef::new(inducer_plate, &step.source);
        let destination = WellRef::new(destination_plate, &step.destination);
        state.pick_up_tip(inducer_pipette)?;
        state.mix(inducer_pipette, 1, Some(inducer_mix), Some(source.clone()), 1.0)?;
        state.transfer(inducer_pipette, step.volume, &source, &destination)?;
        state.mix(inducer_pipette, 3, Some(inducer_mix), Some(destination), 1.0)?;
        state.drop_tip(inducer_pipette)?;
    }
    Ok(())
}
