//! Agar plate spotting: transformed cells are resuspended and spotted just
//! above the agar surface, whose height is derived from each plate's weight.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::config::{AgarPlateParams, SinglePipetteParams};
use crate::data::derived::agar_height;
use crate::data::filter::{plan_transfers, TransferColumns, TransferStep};
use crate::data::model::{ExperimentRow, ExperimentTable};
use crate::error::{ConfigError, Result};
use crate::hardware::{Command, LabwareHandle, Slot, WellRef};
use crate::protocols::{load_pipettes, plan_pipettes, row_slot};
use crate::state::{DeckPlan, RunState};

pub const COLUMNS: &[&str] = &[
    "id",
    "agar_plate_location",
    "source_well",
    "destination_well",
    "spotting_volume",
    "agar_plate_weight",
];

const SPOTS: TransferColumns<'static> = TransferColumns {
    source: "source_well",
    destination: "destination_well",
    volume: "spotting_volume",
};

/// Seconds to wait after each spot so the droplet settles.
const SETTLE_SECONDS: f64 = 5.0;

#[derive(Debug, Clone, Deserialize)]
pub struct SpottingParams {
    #[serde(flatten)]
    pub pipette: SinglePipetteParams,
    #[serde(flatten)]
    pub agar: AgarPlateParams,
    #[serde(alias = "transformation_plate_name")]
    pub source_plate_name: String,
    #[serde(alias = "transformation_plate_slot")]
    pub source_plate_slot: Slot,
    /// Extra µL aspirated on top of the spotting volume.
    #[serde(alias = "dead_volume")]
    pub additional_volume: f64,
    /// mm above (or, if negative, below) the agar surface to dispense at.
    pub spotting_height: f64,
}

/// Claim every configured agar plate slot for the agar plate alone.
pub(crate) fn claim_agar_plates(deck: &mut DeckPlan, agar: &AgarPlateParams) -> Result<()> {
    for slot in &agar.agar_plate_slots {
        deck.exclusive(&agar.agar_plate_name, *slot)?;
    }
    Ok(())
}

/// Agar plate slot named by a design row; it must be one of the configured
/// plate slots.
pub(crate) fn agar_slot(agar: &AgarPlateParams, row: &ExperimentRow) -> Result<Slot> {
    let slot = row_slot(row, "agar_plate_location")?;
    if agar.agar_plate_slots.contains(&slot) {
        Ok(slot)
    } else {
        Err(ConfigError::UnknownSlot(slot.to_string()).into())
    }
}

/// Load one agar plate per configured slot, labelled in slot order.
pub(crate) fn load_agar_plates(
    state: &mut RunState<'_>,
    agar: &AgarPlateParams,
) -> Result<BTreeMap<Slot, LabwareHandle>> {
    let mut plates = BTreeMap::new();
    for (i, slot) in agar.agar_plate_slots.iter().enumerate() {
        let label = format!("Agar Plate {}", i + 1);
        let plate = state.load_labware(&agar.agar_plate_name, *slot, Some(label))?;
        plates.insert(*slot, plate);
    }
    Ok(plates)
}

pub(crate) fn agar_plate_for(plates: &BTreeMap<Slot, LabwareHandle>, slot: Slot) -> Result<LabwareHandle> {
    plates
        .get(&slot)
        .copied()
        .ok_or_else(|| ConfigError::UnknownSlot(slot.to_string()).into())
}

/// A planned spot: where it goes and how high above the plate bottom.
struct Spot {
    step: TransferStep,
    slot: Slot,
    height: f64,
}

pub fn run(state: &mut RunState<'_>, params: &SpottingParams, table: &ExperimentTable) -> Result<()> {
    table.require_columns(COLUMNS)?;
    let area = params.agar.plate_base()?.area();

    let setups = [params.pipette.setup()];
    let mut deck = DeckPlan::new();
    let pipettes = plan_pipettes(&mut deck, &setups)?;
    let pipette = &pipettes[0];
    claim_agar_plates(&mut deck, &params.agar)?;
    let on_thermocycler = params.source_plate_slot == Slot::Thermocycler;
    if on_thermocycler {
        deck.exclusive(&params.source_plate_name, Slot::Thermocycler)?;
    } else {
        deck.shared(&params.source_plate_name, params.source_plate_slot)?;
    }

    let mut spots = Vec::new();
    for step in plan_transfers(table, pipette.channels(), SPOTS)? {
        let slot = agar_slot(&params.agar, &step.row)?;
        let height = agar_height(
            step.row.number("agar_plate_weight")?,
            params.agar.empty_agar_plate_weight,
            area,
            params.agar.agar_density,
            params.spotting_height,
        )?;
        spots.push(Spot { step, slot, height });
    }

    load_pipettes(state, &setups)?;
    let agar_plates = load_agar_plates(state, &params.agar)?;
    let source_plate = if on_thermocycler {
        let plate = state.load_labware(&params.source_plate_name, Slot::Thermocycler, None)?;
        state.issue(Command::OpenLid)?;
        plate
    } else {
        state.load_or_reuse(&params.source_plate_name, params.source_plate_slot)?
    };

    log::info!("spotting {} wells", spots.len());
    for Spot { step, slot, height } in &spots {
        let plate = agar_plate_for(&agar_plates, *slot)?;
        log::debug!("spot {} → {} at {height:.3} mm", step.source, step.destination);

        let source = WellRef::new(source_plate, &step.source);
        state.pick_up_tip(pipette)?;
        // resuspend the transformed cells
        state.mix(pipette, 3, Some(pipette.max_volume()), Some(source.clone()), 2.0)?;
        state.aspirate(pipette, step.volume + params.additional_volume, source, 2.0)?;
        state.dispense(
            pipette,
            step.volume,
            WellRef::new(plate, &step.destination).bottom(*height),
            4.0,
        )?;
        state.issue(Command::Delay {
            seconds: SETTLE_SECONDS,
        })?;
        state.drop_tip(pipette)?;
    }
    Ok(())
}
