//! Labware layout tables.
//!
//! For every workflow a flat `(id, location, labware, well_name, volume)`
//! table can be derived from the design table and the parameters. It lists
//! what has to be in which well before the run starts, and what ends up in
//! the destination wells afterwards.

use std::collections::BTreeMap;
use std::io;

use serde::{Deserialize, Serialize};

use crate::config::Parameters;
use crate::data::model::ExperimentTable;
use crate::error::{ParseError, Result};
use crate::protocols::{row_slot, ProtocolKind};

/// One line of the labware table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabwareRecord {
    pub id: String,
    pub location: String,
    pub labware: String,
    pub well_name: String,
    pub volume: f64,
}

/// Where a reactant lives: its columns in the design table and its plate.
struct Reactant<'a> {
    id: &'a str,
    well: &'a str,
    volume: &'a str,
    location: String,
    labware: String,
}

// ---------------------------------------------------------------------------
// Entry-point
// ---------------------------------------------------------------------------

/// Derive the labware table for a workflow.
pub fn records(kind: ProtocolKind, params: &Parameters, table: &ExperimentTable) -> Result<Vec<LabwareRecord>> {
    table.require_columns(kind.required_columns())?;
    let records = match kind {
        ProtocolKind::Transformation => transformation(params, table)?,
        ProtocolKind::Spotting => spotting(params, table)?,
        ProtocolKind::Sampling => sampling(params, table)?,
        ProtocolKind::Induction => induction(params, table)?,
        ProtocolKind::Transfer => transfer(params, table)?,
    };
    log::info!("derived {} labware rows for {kind}", records.len());
    Ok(records)
}

/// Write records as CSV with a header line.
pub fn write_csv<W: io::Write>(records: &[LabwareRecord], writer: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for record in records {
        writer.serialize(record).map_err(ParseError::from)?;
    }
    writer.flush().map_err(csv::Error::from).map_err(ParseError::from)?;
    Ok(())
}

pub fn to_csv_string(records: &[LabwareRecord]) -> Result<String> {
    let mut buffer = Vec::new();
    write_csv(records, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

// ---------------------------------------------------------------------------
// Per-workflow layouts
// ---------------------------------------------------------------------------

fn reactant<'a>(params: &Parameters, name: &str, id: &'a str, well: &'a str, volume: &'a str) -> Result<Reactant<'a>> {
    Ok(Reactant {
        id,
        well,
        volume,
        location: params.slot(&format!("{name}_plate_slot"))?.to_string(),
        labware: params.str(&format!("{name}_plate_name"))?.to_string(),
    })
}

/// Source wells grouped by well name: volumes summed, first id kept.
/// Wells left as placeholders are not part of the layout.
fn grouped_sources(table: &ExperimentTable, reactant: &Reactant<'_>) -> Result<Vec<LabwareRecord>> {
    let mut wells: BTreeMap<String, (String, f64)> = BTreeMap::new();
    for row in &table.rows {
        if row.is_placeholder(reactant.well) {
            continue;
        }
        let volume = row.number(reactant.volume)?;
        let entry = wells
            .entry(row.text(reactant.well)?)
            .or_insert((row.text(reactant.id)?, 0.0));
        entry.1 += volume;
    }
    Ok(wells
        .into_iter()
        .map(|(well_name, (id, volume))| LabwareRecord {
            id,
            location: reactant.location.clone(),
            labware: reactant.labware.clone(),
            well_name,
            volume,
        })
        .collect())
}

/// Destination-plate name and slot, accepting the older `transformation_plate_*` keys.
fn destination_plate(params: &Parameters, default_slot: Option<&str>) -> Result<(String, String)> {
    let name = params
        .str("destination_plate_name")
        .or_else(|_| params.str("transformation_plate_name"))?;
    let slot = match params.slot("destination_plate_slot") {
        Ok(slot) => slot.to_string(),
        Err(err) => match (params.slot("transformation_plate_slot"), default_slot) {
            (Ok(slot), _) => slot.to_string(),
            (Err(_), Some(default)) => default.to_string(),
            (Err(_), None) => return Err(err.into()),
        },
    };
    Ok((name.to_string(), slot))
}

fn transformation(params: &Parameters, table: &ExperimentTable) -> Result<Vec<LabwareRecord>> {
    let reactants = [
        reactant(params, "dna", "dna_id", "dna_well", "dna_volume")?,
        reactant(params, "cells", "cells_id", "cells_well", "cells_volume")?,
        reactant(params, "media", "media_id", "media_well", "media_volume")?,
    ];
    let mut records = Vec::new();
    for r in &reactants {
        records.extend(grouped_sources(table, r)?);
    }

    let (labware, location) = destination_plate(params, Some("thermocycler"))?;
    for row in &table.rows {
        let mut volume = 0.0;
        for r in &reactants {
            volume += row.number(r.volume)?;
        }
        records.push(LabwareRecord {
            id: format!("{}/{}/{}", row.text("dna_id")?, row.text("cells_id")?, row.text("media_id")?),
            location: location.clone(),
            labware: labware.clone(),
            well_name: row.text("destination_well")?,
            volume,
        });
    }
    Ok(records)
}

fn spotting(params: &Parameters, table: &ExperimentTable) -> Result<Vec<LabwareRecord>> {
    let source_name = params
        .str("source_plate_name")
        .or_else(|_| params.str("transformation_plate_name"))?;
    let source_slot = params
        .slot("source_plate_slot")
        .or_else(|_| params.slot("transformation_plate_slot"))?;
    let agar_name = params.str("agar_plate_name")?;

    let mut records = Vec::with_capacity(table.len() * 2);
    for row in &table.rows {
        records.push(LabwareRecord {
            id: row.text("id")?,
            location: source_slot.to_string(),
            labware: source_name.to_string(),
            well_name: row.text("source_well")?,
            volume: row.number("spotting_volume")?,
        });
    }
    for row in &table.rows {
        records.push(LabwareRecord {
            id: row.text("id")?,
            location: row_slot(row, "agar_plate_location")?.to_string(),
            labware: agar_name.to_string(),
            well_name: row.text("destination_well")?,
            volume: row.number("spotting_volume")?,
        });
    }
    Ok(records)
}

fn sampling(params: &Parameters, table: &ExperimentTable) -> Result<Vec<LabwareRecord>> {
    let agar_name = params.str("agar_plate_name")?;
    let media = reactant(params, "media", "id", "media_source_well", "media_volume")?;

    let mut records = Vec::with_capacity(table.len() * 2);
    for row in &table.rows {
        if row.is_placeholder("sampling_source_well") {
            continue;
        }
        records.push(LabwareRecord {
            id: row.text("id")?,
            location: row_slot(row, "agar_plate_location")?.to_string(),
            labware: agar_name.to_string(),
            well_name: row.text("sampling_source_well")?,
            volume: 0.0,
        });
    }
    for row in &table.rows {
        if row.is_placeholder(media.well) {
            continue;
        }
        records.push(LabwareRecord {
            id: row.text(media.id)?,
            location: media.location.clone(),
            labware: media.labware.clone(),
            well_name: row.text(media.well)?,
            volume: row.number(media.volume)?,
        });
    }
    Ok(records)
}

fn induction(params: &Parameters, table: &ExperimentTable) -> Result<Vec<LabwareRecord>> {
    let reactants = [
        reactant(params, "blank", "id", "blank_well", "blank_volume")?,
        reactant(params, "culture", "id", "culture_well", "culture_volume")?,
        reactant(params, "inducer", "id", "inducer_well", "inducer_volume")?,
    ];
    let mut records = Vec::new();
    for r in &reactants {
        records.extend(grouped_sources(table, r)?);
    }

    let (labware, location) = destination_plate(params, None)?;
    for row in &table.rows {
        let mut volume = 0.0;
        for r in &reactants {
            volume += row.number(r.volume)?;
        }
        records.push(LabwareRecord {
            id: row.text("id")?,
            location: location.clone(),
            labware: labware.clone(),
            well_name: row.text("destination_well")?,
            volume,
        });
    }
    Ok(records)
}

fn transfer(params: &Parameters, table: &ExperimentTable) -> Result<Vec<LabwareRecord>> {
    let source = reactant(params, "source", "source_id", "source_well", "source_volume")?;
    let mut records = grouped_sources(table, &source)?;

    let (labware, location) = destination_plate(params, None)?;
    for row in &table.rows {
        records.push(LabwareRecord {
            id: row.text("destination_id")?,
            location: location.clone(),
            labware: labware.clone(),
            well_name: row.text("destination_well")?,
            volume: row.number("destination_volume")?,
        });
    }
    Ok(records)
}
