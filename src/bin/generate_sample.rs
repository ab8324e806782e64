use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::json;

/// One line of the transformation design table.
#[derive(Serialize)]
struct TransformationRow {
    dna_id: String,
    dna_well: String,
    dna_volume: f64,
    cells_id: &'static str,
    cells_well: &'static str,
    cells_volume: f64,
    media_id: &'static str,
    media_well: &'static str,
    media_volume: f64,
    destination_well: String,
}

const PLASMIDS: [&str; 8] = [
    "pUC19", "pET28a", "pET21b", "pGEX-4T1", "pBAD33", "pACYC184", "pSB1C3", "water",
];

fn main() -> Result<()> {
    env_logger::init();

    // One column of a 96-well plate, A1 to H1
    let rows: Vec<TransformationRow> = PLASMIDS
        .iter()
        .zip('A'..='H')
        .map(|(plasmid, row)| TransformationRow {
            dna_id: plasmid.to_string(),
            dna_well: format!("{row}1"),
            dna_volume: 2.0,
            cells_id: "BL21(DE3)",
            cells_well: "A1",
            cells_volume: 20.0,
            media_id: "SOC",
            media_well: "A1",
            media_volume: 100.0,
            destination_well: format!("{row}1"),
        })
        .collect();

    let csv_path = "sample_transformation.csv";
    let mut writer = csv::Writer::from_path(csv_path).with_context(|| format!("creating {csv_path}"))?;
    for row in &rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    let params = json!({
        "right_pipette_name": "p20_multi_gen2",
        "right_pipette_tiprack_name": "opentrons_96_tiprack_20ul",
        "right_pipette_tiprack_slot": [9],
        "left_pipette_name": "p300_single_gen2",
        "left_pipette_tiprack_name": "opentrons_96_tiprack_300ul",
        "left_pipette_tiprack_slot": [6],
        "dna_plate_name": "biorad_96_wellplate_200ul_pcr",
        "dna_plate_slot": 1,
        "cells_plate_name": "biorad_96_wellplate_200ul_pcr",
        "cells_plate_slot": 2,
        "media_plate_name": "nest_12_reservoir_15ml",
        "media_plate_slot": 3,
        "transformation_plate_name": "biorad_96_wellplate_200ul_pcr",
        "transformation_plate_slot": "thermocycler",
        "pre_shock_incubation_temp": 4,
        "pre_shock_incubation_time": 20,
        "heat_shock_temp": 42,
        "heat_shock_time": 45,
        "post_shock_incubation_temp": 4,
        "post_shock_incubation_time": 5,
        "inc_temp": 37,
        "inc_time": 60
    });
    let json_path = "sample_transformation.json";
    std::fs::write(json_path, serde_json::to_string_pretty(&params)?)
        .with_context(|| format!("writing {json_path}"))?;

    println!("Wrote {} design rows to {csv_path} and parameters to {json_path}", rows.len());
    Ok(())
}
