//! Colony sampling: media is laid out on a culture plate, then each colony is
//! touched (pierced once or swept in a spiral) just below the agar surface and
//! inoculated into its culture well.

use serde::Deserialize;

use crate::config::{AgarPlateParams, DualPipetteParams};
use crate::data::derived::{agar_height, spiral_offsets};
use crate::data::filter::{drop_placeholders, normalize, plan_transfers, TransferColumns};
use crate::data::model::ExperimentTable;
use crate::error::{ConfigError, Result};
use crate::hardware::{Slot, WellRef};
use crate::pipette::choose_pipette;
use crate::protocols::spotting::{agar_plate_for, agar_slot, claim_agar_plates, load_agar_plates};
use crate::protocols::{load_pipettes, plan_pipettes};
use crate::state::{DeckPlan, RunState};

pub const COLUMNS: &[&str] = &[
    "id",
    "agar_plate_location",
    "agar_plate_weight",
    "media_source_well",
    "sampling_source_well",
    "media_volume",
    "destination_well",
];

const MEDIA: TransferColumns<'static> = TransferColumns {
    source: "media_source_well",
    destination: "destination_well",
    volume: "media_volume",
};

const SAMPLING_SOURCE: &str = "sampling_source_well";
const SAMPLING_DESTINATION: &str = "destination_well";

/// Sampling moves no liquid, so the sampling pipette is sized for a nominal
/// small volume.
const SAMPLING_NOMINAL_VOLUME: f64 = 10.0;
const SPIRAL_POINTS: usize = 25;
const SPIRAL_ROTATIONS: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplingMethod {
    /// Sweep an Archimedean spiral over the colony.
    Spiral,
    /// Stab the colony once at its centre.
    Pierce,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SamplingParams {
    #[serde(flatten)]
    pub pipettes: DualPipetteParams,
    #[serde(flatten)]
    pub agar: AgarPlateParams,
    pub media_plate_name: String,
    pub media_plate_slot: Slot,
    pub culture_plate_name: String,
    pub culture_plate_slot: Slot,
    pub sampling_method: SamplingMethod,
    /// Outer radius of the spiral, mm.
    #[serde(default)]
    pub spot_radius: Option<f64>,
    /// How far below the agar surface the tip goes, mm.
    #[serde(default)]
    pub agar_stab_depth: f64,
}

/// A planned colony pick: which agar plate, which colony well, how deep, and
/// which culture well it inoculates.
struct Colony {
    slot: Slot,
    source: String,
    destination: String,
    depth: f64,
}

pub fn run(state: &mut RunState<'_>, params: &SamplingParams, table: &ExperimentTable) -> Result<()> {
    table.require_columns(COLUMNS)?;
    let area = params.agar.plate_base()?.area();
    let offsets = match params.sampling_method {
        SamplingMethod::Spiral => {
            let radius = params
                .spot_radius
                .ok_or_else(|| ConfigError::MissingKey("spot_radius".to_string()))?;
            spiral_offsets(radius, SPIRAL_POINTS, SPIRAL_ROTATIONS)
        }
        SamplingMethod::Pierce => Vec::new(),
    };

    let setups = params.pipettes.setups();
    let mut deck = DeckPlan::new();
    let pipettes = plan_pipettes(&mut deck, &setups)?;
    let media_pipette = choose_pipette(&table.numbers(MEDIA.volume)?, &pipettes)?;
    let sampling_pipette = choose_pipette(&[SAMPLING_NOMINAL_VOLUME], &pipettes)?;
    claim_agar_plates(&mut deck, &params.agar)?;
    deck.shared(&params.media_plate_name, params.media_plate_slot)?;
    deck.shared(&params.culture_plate_name, params.culture_plate_slot)?;

    let media_steps = plan_transfers(table, media_pipette.channels(), MEDIA)?;
    let normalized = normalize(
        table,
        sampling_pipette.channels(),
        &[SAMPLING_SOURCE],
        SAMPLING_DESTINATION,
    )?;
    let mut colonies = Vec::new();
    for row in &drop_placeholders(&normalized, &[SAMPLING_SOURCE]).rows {
        let slot = agar_slot(&params.agar, row)?;
        let surface = agar_height(
            row.number("agar_plate_weight")?,
            params.agar.empty_agar_plate_weight,
            area,
            params.agar.agar_density,
            0.0,
        )?;
        colonies.push(Colony {
            slot,
            source: row.text(SAMPLING_SOURCE)?,
            destination: row.text(SAMPLING_DESTINATION)?,
            depth: surface - params.agar_stab_depth,
        });
    }

    load_pipettes(state, &setups)?;
    let agar_plates = load_agar_plates(state, &params.agar)?;
    let media_plate = state.load_or_reuse(&params.media_plate_name, params.media_plate_slot)?;
    let culture_plate = state.load_or_reuse(&params.culture_plate_name, params.culture_plate_slot)?;

    // ---- media into the culture plate, one tip ----
    log::info!("filling {} culture wells with media", media_steps.len());
    if !media_steps.is_empty() {
        state.pick_up_tip(media_pipette)?;
        for step in &media_steps {
            let source = WellRef::new(media_plate, &step.source);
            let destination = WellRef::new(culture_plate, &step.destination);
            state.transfer(media_pipette, step.volume, &source, &destination)?;
        }
        state.drop_tip(media_pipette)?;
    }

    // ---- colony sampling ----
    log::info!(
        "sampling {} colonies ({:?})",
        colonies.len(),
        params.sampling_method
    );
    for colony in &colonies {
        let plate = agar_plate_for(&agar_plates, colony.slot)?;
        let pick = WellRef::new(plate, &colony.source);

        state.pick_up_tip(sampling_pipette)?;
        match params.sampling_method {
            SamplingMethod::Spiral => {
                for &(x, y) in &offsets {
                    state.move_to(sampling_pipette, pick.clone().bottom_offset(x, y, colony.depth))?;
                }
            }
            SamplingMethod::Pierce => state.move_to(sampling_pipette, pick.bottom(colony.depth))?,
        }
        let culture = WellRef::new(culture_plate, &colony.destination);
        state.move_to(sampling_pipette, culture.bottom(0.0))?;
        // inoculate
        state.mix(sampling_pipette, 3, None, None, 4.0)?;
        state.drop_tip(sampling_pipette)?;
    }
    Ok(())
}
