//! Heat-shock transformation: competent cells and DNA are combined on a
//! (usually thermocycler-mounted) plate, heat-shocked, then topped up with
//! recovery medium and incubated.

use std::collections::BTreeSet;

use serde::Deserialize;

use crate::config::DualPipetteParams;
use crate::data::filter::{plan_transfers, TransferColumns};
use crate::data::model::ExperimentTable;
use crate::error::Result;
use crate::hardware::{Command, Slot, WellRef};
use crate::pipette::choose_pipette;
use crate::protocols::{load_pipettes, plan_pipettes};
use crate::state::{DeckPlan, RunState};

pub const COLUMNS: &[&str] = &[
    "dna_id",
    "dna_well",
    "dna_volume",
    "cells_id",
    "cells_well",
    "cells_volume",
    "media_id",
    "media_well",
    "media_volume",
    "destination_well",
];

const CELLS: TransferColumns<'static> = TransferColumns {
    source: "cells_well",
    destination: "destination_well",
    volume: "cells_volume",
};
const DNA: TransferColumns<'static> = TransferColumns {
    source: "dna_well",
    destination: "destination_well",
    volume: "dna_volume",
};
const MEDIA: TransferColumns<'static> = TransferColumns {
    source: "media_well",
    destination: "destination_well",
    volume: "media_volume",
};

/// DNA is drawn from just above the bottom of its well.
const DNA_ASPIRATE_CLEARANCE: f64 = 0.5;

fn thermocycler() -> Slot {
    Slot::Thermocycler
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransformationParams {
    #[serde(flatten)]
    pub pipettes: DualPipetteParams,
    pub dna_plate_name: String,
    pub dna_plate_slot: Slot,
    pub cells_plate_name: String,
    pub cells_plate_slot: Slot,
    pub media_plate_name: String,
    pub media_plate_slot: Slot,
    #[serde(alias = "transformation_plate_name")]
    pub destination_plate_name: String,
    #[serde(default = "thermocycler", alias = "transformation_plate_slot")]
    pub destination_plate_slot: Slot,
    /// °C
    #[serde(alias = "init_temp")]
    pub pre_shock_incubation_temp: f64,
    /// minutes
    #[serde(alias = "init_time")]
    pub pre_shock_incubation_time: f64,
    #[serde(alias = "heat_temp")]
    pub heat_shock_temp: f64,
    /// seconds
    #[serde(alias = "heat_time")]
    pub heat_shock_time: f64,
    #[serde(alias = "cool_temp")]
    pub post_shock_incubation_temp: f64,
    /// minutes
    #[serde(alias = "cool_time")]
    pub post_shock_incubation_time: f64,
    pub inc_temp: f64,
    /// minutes
    pub inc_time: f64,
}

pub fn run(state: &mut RunState<'_>, params: &TransformationParams, table: &ExperimentTable) -> Result<()> {
    table.require_columns(COLUMNS)?;

    let setups = params.pipettes.setups();
    let mut deck = DeckPlan::new();
    let pipettes = plan_pipettes(&mut deck, &setups)?;
    let cells_pipette = choose_pipette(&table.numbers(CELLS.volume)?, &pipettes)?;
    let dna_pipette = choose_pipette(&table.numbers(DNA.volume)?, &pipettes)?;
    let media_pipette = choose_pipette(&table.numbers(MEDIA.volume)?, &pipettes)?;

    deck.shared(&params.cells_plate_name, params.cells_plate_slot)?;
    deck.shared(&params.dna_plate_name, params.dna_plate_slot)?;
    deck.shared(&params.media_plate_name, params.media_plate_slot)?;
    let on_thermocycler = params.destination_plate_slot == Slot::Thermocycler;
    if on_thermocycler {
        deck.exclusive(&params.destination_plate_name, Slot::Thermocycler)?;
    } else {
        deck.shared(&params.destination_plate_name, params.destination_plate_slot)?;
    }

    let cells_steps = plan_transfers(table, cells_pipette.channels(), CELLS)?;
    let dna_steps = plan_transfers(table, dna_pipette.channels(), DNA)?;
    let mut dna_mixes = Vec::with_capacity(dna_steps.len());
    for step in &dna_steps {
        let in_well = step.volume + step.row.number(CELLS.volume)?;
        dna_mixes.push(dna_pipette.mixing_volume(in_well));
    }
    let media_steps = plan_transfers(table, media_pipette.channels(), MEDIA)?;
    let mut media_mixes = Vec::with_capacity(media_steps.len());
    for step in &media_steps {
        let in_well = step.volume + step.row.number(CELLS.volume)? + step.row.number(DNA.volume)?;
        media_mixes.push(media_pipette.mixing_volume(in_well));
    }

    load_pipettes(state, &setups)?;
    let cells_plate = state.load_or_reuse(&params.cells_plate_name, params.cells_plate_slot)?;
    let dna_plate = state.load_or_reuse(&params.dna_plate_name, params.dna_plate_slot)?;
    let media_plate = state.load_or_reuse(&params.media_plate_name, params.media_plate_slot)?;

    state.issue(Command::SetRailLights { on: true })?;

    let destination_plate = if on_thermocycler {
        let plate = state.load_labware(&params.destination_plate_name, Slot::Thermocycler, None)?;
        state.issue(Command::SetBlockTemperature {
            celsius: params.pre_shock_incubation_temp,
            hold_seconds: None,
        })?;
        state.issue(Command::OpenLid)?;
        state.pause("Put plate into the thermocycler module and click 'resume'.")?;
        plate
    } else {
        state.load_or_reuse(&params.destination_plate_name, params.destination_plate_slot)?
    };

    // ---- competent cells: one tip, each source well resuspended once ----
    log::info!("adding competent cells to {} wells", cells_steps.len());
    if !cells_steps.is_empty() {
        state.pick_up_tip(cells_pipette)?;
        let mut mixed = BTreeSet::new();
        for step in &cells_steps {
            let source = WellRef::new(cells_plate, &step.source);
            if mixed.insert(step.source.clone()) {
                state.mix(cells_pipette, 1, Some(cells_pipette.max_volume()), Some(source.clone()), 1.0)?;
            }
            let destination = WellRef::new(destination_plate, &step.destination);
            state.transfer(cells_pipette, step.volume, &source, &destination)?;
        }
        state.drop_tip(cells_pipette)?;
    }

    // ---- DNA: fresh tip per well, mixed into the cells ----
    log::info!("adding DNA to {} wells", dna_steps.len());
    for (step, mixing_volume) in dna_steps.iter().zip(&dna_mixes) {
        let source = WellRef::new(dna_plate, &step.source).bottom(DNA_ASPIRATE_CLEARANCE);
        let destination = WellRef::new(destination_plate, &step.destination);

        state.pick_up_tip(dna_pipette)?;
        state.transfer(dna_pipette, step.volume, &source, &destination)?;
        state.mix(dna_pipette, 2, Some(*mixing_volume), Some(destination.clone()), 1.0)?;
        state.blow_out(dna_pipette, destination.clone())?;
        // touch the bottom so blow-out droplets leave the tip
        state.move_to(dna_pipette, destination.bottom(0.0))?;
        state.drop_tip(dna_pipette)?;
    }

    // ---- heat shock ----
    if on_thermocycler {
        state.issue(Command::CloseLid)?;
        state.issue(Command::SetBlockTemperature {
            celsius: params.pre_shock_incubation_temp,
            hold_seconds: Some(params.pre_shock_incubation_time * 60.0),
        })?;
        state.comment("Starting heat-shock transformation.")?;
        state.issue(Command::SetBlockTemperature {
            celsius: params.heat_shock_temp,
            hold_seconds: Some(params.heat_shock_time),
        })?;
        state.issue(Command::SetBlockTemperature {
            celsius: params.post_shock_incubation_temp,
            hold_seconds: Some(params.post_shock_incubation_time * 60.0),
        })?;
        state.issue(Command::OpenLid)?;
    } else {
        state.pause("Put plate into an external thermocycler for heat-shock transformation and return.")?;
    }

    // ---- recovery medium: fresh tip per well, pipette-mixed ----
    log::info!("adding recovery medium to {} wells", media_steps.len());
    for (step, &mixing_volume) in media_steps.iter().zip(&media_mixes) {
        let source = WellRef::new(media_plate, &step.source);
        let destination = WellRef::new(destination_plate, &step.destination);

        state.pick_up_tip(media_pipette)?;
        state.transfer(media_pipette, step.volume, &source, &destination)?;
        for _ in 0..3 {
            state.aspirate(media_pipette, mixing_volume, destination.clone(), 1.0)?;
            state.dispense(media_pipette, mixing_volume, destination.clone(), 1.0)?;
        }
        state.blow_out(media_pipette, destination.clone())?;
        state.move_to(media_pipette, destination.bottom(0.0))?;
        state.drop_tip(media_pipette)?;
    }

    // ---- recovery incubation ----
    if on_thermocycler {
        state.issue(Command::CloseLid)?;
        state.issue(Command::SetLidTemperature {
            celsius: params.inc_temp,
        })?;
        state.issue(Command::SetBlockTemperature {
            celsius: params.inc_temp,
            hold_seconds: Some(params.inc_time * 60.0),
        })?;
        state.issue(Command::DeactivateLid)?;
        state.issue(Command::DeactivateBlock)?;
    } else {
        state.comment("Put plate into an external thermocycler for incubation.")?;
    }
    state.issue(Command::SetRailLights { on: false })?;
    Ok(())
}
