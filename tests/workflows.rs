//! Whole workflows driven through the dry-run driver.

use assert_approx_eq::assert_approx_eq;

use rusty_pipette::config::Parameters;
use rusty_pipette::data::filter::normalize;
use rusty_pipette::data::loader::parse_csv;
use rusty_pipette::error::{ConfigError, DomainError, DriverError, Error, ParseError};
use rusty_pipette::hardware::{Command, Driver, DryRun, Position, Slot};
use rusty_pipette::pipette::{ChannelMode, Mount};
use rusty_pipette::protocols::{self, ProtocolKind};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

const TRANSFORMATION_CSV: &str = "\
dna_id,dna_well,dna_volume,cells_id,cells_well,cells_volume,media_id,media_well,media_volume,destination_well
pUC19,A1,2,BL21,A1,20,SOC,A1,100,A1
pET28a,B1,2,BL21,A1,20,SOC,A1,100,B1
pET21b,C1,2,BL21,A1,20,SOC,A1,100,C1
pGEX,D1,2,BL21,A1,20,SOC,A1,100,D1
pBAD33,E1,2,BL21,A1,20,SOC,A1,100,E1
pACYC,F1,2,BL21,A1,20,SOC,A1,100,F1
pSB1C3,G1,2,BL21,A1,20,SOC,A1,100,G1
water,H1,2,BL21,A1,20,SOC,A1,100,H1
";

const TRANSFORMATION_JSON: &str = r#"{
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
}"#;

const DUAL_SINGLE_PIPETTES: &str = r#"
    "right_pipette_name": "p20_single_gen2",
    "right_pipette_tiprack_name": "opentrons_96_tiprack_20ul",
    "right_pipette_tiprack_slot": [9],
    "left_pipette_name": "p300_single_gen2",
    "left_pipette_tiprack_name": "opentrons_96_tiprack_300ul",
    "left_pipette_tiprack_slot": [6, 10]"#;

const AGAR_PLATES: &str = r#"
    "agar_plate_name": "nunc_omnitray",
    "agar_plate_slots": [1, 2],
    "plate_weight_without_agar": 38.92,
    "agar_density": 0.00095,
    "agar_plate_area": 10926.9"#;

fn run(kind: ProtocolKind, json: &str, csv: &str) -> (Result<usize, Error>, Vec<Command>) {
    let params = Parameters::from_json(json).unwrap();
    let table = parse_csv(csv).unwrap();
    let mut driver = DryRun::new();
    let result = protocols::run(kind, &params, &table, &mut driver);
    (result, driver.commands)
}

fn count(commands: &[Command], pred: impl Fn(&Command) -> bool) -> usize {
    commands.iter().filter(|c| pred(c)).count()
}

fn pick_ups(commands: &[Command], on: Mount) -> usize {
    count(commands, |c| matches!(c, Command::PickUpTip { mount } if *mount == on))
}

fn dispensed_wells(commands: &[Command], on: Mount) -> Vec<String> {
    commands
        .iter()
        .filter_map(|c| match c {
            Command::Dispense { mount, at, .. } if *mount == on => Some(at.well.clone()),
            _ => None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Transformation
// ---------------------------------------------------------------------------

#[test]
fn eight_row_column_collapses_to_a1_for_a_multichannel() {
    let table = parse_csv(TRANSFORMATION_CSV).unwrap();
    let normalized = normalize(&table, ChannelMode::Multi, &["dna_well"], "destination_well").unwrap();
    assert_eq!(normalized.len(), 1);
    assert_eq!(normalized.rows[0].text("dna_well").unwrap(), "A1");
    assert_eq!(normalized.rows[0].text("destination_well").unwrap(), "A1");
}

#[test]
fn transformation_on_the_thermocycler() {
    let (result, commands) = run(ProtocolKind::Transformation, TRANSFORMATION_JSON, TRANSFORMATION_CSV);
    assert_eq!(result.unwrap(), commands.len());

    // tip racks, then the pipette they feed
    assert!(matches!(&commands[0], Command::LoadLabware { slot: Slot::Deck(9), .. }));
    assert!(matches!(&commands[1], Command::LoadPipette { mount: Mount::Right, .. }));
    assert_eq!(count(&commands, |c| matches!(c, Command::LoadThermocycler)), 1);

    // cells and DNA go through the 8-channel once each; media per well on the p300
    assert_eq!(pick_ups(&commands, Mount::Right), 2);
    assert_eq!(dispensed_wells(&commands, Mount::Right), vec!["A1", "A1"]);
    assert_eq!(pick_ups(&commands, Mount::Left), 8);
    assert_eq!(
        dispensed_wells(&commands, Mount::Left)
            .iter()
            .filter(|w| w.as_str() == "H1")
            .count(),
        // one transfer plus three manual mixing dispenses
        4
    );

    let holds: Vec<(f64, Option<f64>)> = commands
        .iter()
        .filter_map(|c| match c {
            Command::SetBlockTemperature { celsius, hold_seconds } => Some((*celsius, *hold_seconds)),
            _ => None,
        })
        .collect();
    assert_eq!(
        holds,
        vec![
            (4.0, None),
            (4.0, Some(1200.0)),
            (42.0, Some(45.0)),
            (4.0, Some(300.0)),
            (37.0, Some(3600.0)),
        ]
    );
    assert!(matches!(commands.last(), Some(Command::SetRailLights { on: false })));
}

#[test]
fn dna_mixing_uses_half_the_liquid_in_the_well() {
    let (result, commands) = run(ProtocolKind::Transformation, TRANSFORMATION_JSON, TRANSFORMATION_CSV);
    result.unwrap();
    let dna_mix = commands.iter().find_map(|c| match c {
        Command::Mix {
            mount: Mount::Right,
            repetitions: 2,
            volume,
            ..
        } => *volume,
        _ => None,
    });
    assert_eq!(dna_mix, Some(11.0));
}

#[test]
fn off_deck_heat_shock_pauses_for_the_operator() {
    let json = TRANSFORMATION_JSON.replace(r#""transformation_plate_slot": "thermocycler""#, r#""transformation_plate_slot": 7"#);
    let (result, commands) = run(ProtocolKind::Transformation, &json, TRANSFORMATION_CSV);
    result.unwrap();
    assert_eq!(count(&commands, |c| matches!(c, Command::LoadThermocycler)), 0);
    assert_eq!(count(&commands, |c| matches!(c, Command::SetBlockTemperature { .. })), 0);
    assert!(commands.iter().any(|c| matches!(c, Command::Pause { message } if message.contains("external thermocycler"))));
}

#[test]
fn malformed_dna_well_fails_before_cells_are_dispensed() {
    let csv = TRANSFORMATION_CSV.replace("pUC19,A1,2,", "pUC19,X,2,");
    let (result, commands) = run(ProtocolKind::Transformation, TRANSFORMATION_JSON, &csv);
    match result {
        Err(Error::Parse(ParseError::InvalidWell(well))) => assert_eq!(well, "X"),
        other => panic!("unexpected {other:?}"),
    }
    assert!(commands.is_empty());
}

#[test]
fn upfront_validation_rejects_a_missing_parameter_before_any_command() {
    let json = TRANSFORMATION_JSON.replace(r#""heat_shock_temp": 42,"#, "");
    let (result, commands) = run(ProtocolKind::Transformation, &json, TRANSFORMATION_CSV);
    assert!(matches!(result, Err(Error::Config(ConfigError::Json(_)))));
    assert!(commands.is_empty());
}

#[test]
fn missing_column_is_rejected_before_any_command() {
    let csv = "dna_well,dna_volume\nA1,2\n";
    let (result, commands) = run(ProtocolKind::Transformation, TRANSFORMATION_JSON, csv);
    match result {
        Err(Error::Parse(ParseError::MissingColumn(column))) => assert_eq!(column, "dna_id"),
        other => panic!("unexpected {other:?}"),
    }
    assert!(commands.is_empty());
}

// ---------------------------------------------------------------------------
// Spotting
// ---------------------------------------------------------------------------

fn spotting_json() -> String {
    format!(
        r#"{{
        "pipette_name": "p20_single_gen2",
        "pipette_mount": "right",
        "tiprack_name": "opentrons_96_tiprack_20ul",
        "tiprack_slots": [9],
        {AGAR_PLATES},
        "transformation_plate_name": "biorad_96_wellplate_200ul_pcr",
        "transformation_plate_slot": "thermocycler",
        "dead_volume": 1,
        "spotting_height": 1
    }}"#
    )
}

const SPOTTING_CSV: &str = "\
id,agar_plate_location,source_well,destination_well,spotting_volume,agar_plate_weight
pUC19,1,A1,A1,5,76.32
pET28a,2,B1,A1,5,76.32
empty,1,NA,B1,0,76.32
";

#[test]
fn spotting_dispenses_just_above_the_agar() {
    let (result, commands) = run(ProtocolKind::Spotting, &spotting_json(), SPOTTING_CSV);
    result.unwrap();

    let labels: Vec<&str> = commands
        .iter()
        .filter_map(|c| match c {
            Command::LoadLabware { label: Some(label), .. } => Some(label.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(labels, vec!["Agar Plate 1", "Agar Plate 2"]);
    assert_eq!(count(&commands, |c| matches!(c, Command::LoadThermocycler)), 1);
    assert_eq!(count(&commands, |c| matches!(c, Command::OpenLid)), 1);

    let dispenses: Vec<(f64, f64)> = commands
        .iter()
        .filter_map(|c| match c {
            Command::Dispense {
                volume,
                at,
                rate,
                ..
            } => match at.position {
                Position::Bottom { z } => Some((*volume, z)),
                _ => panic!("spot dispensed without a height at rate {rate}"),
            },
            _ => None,
        })
        .collect();
    assert_eq!(dispenses.len(), 2);
    for (volume, z) in dispenses {
        assert_approx_eq!(volume, 5.0);
        assert_approx_eq!(z, 4.60289, 1e-4);
    }
    let aspirated = commands.iter().find_map(|c| match c {
        Command::Aspirate { volume, .. } => Some(*volume),
        _ => None,
    });
    assert_eq!(aspirated, Some(6.0));
    assert_eq!(count(&commands, |c| matches!(c, Command::Delay { seconds } if *seconds == 5.0)), 2);
}

#[test]
fn spotting_onto_an_unconfigured_slot_is_an_error() {
    let csv = SPOTTING_CSV.replace("pET28a,2,", "pET28a,3,");
    let (result, commands) = run(ProtocolKind::Spotting, &spotting_json(), &csv);
    match result {
        Err(Error::Config(ConfigError::UnknownSlot(slot))) => assert_eq!(slot, "3"),
        other => panic!("unexpected {other:?}"),
    }
    assert!(commands.is_empty());
}

#[test]
fn bad_plate_weight_on_a_later_row_fails_before_any_command() {
    let csv = SPOTTING_CSV.replace("pET28a,2,B1,A1,5,76.32", "pET28a,2,B1,A1,5,heavy");
    let (result, commands) = run(ProtocolKind::Spotting, &spotting_json(), &csv);
    match result {
        Err(Error::Parse(ParseError::NotANumber { column, value, .. })) => {
            assert_eq!(column, "agar_plate_weight");
            assert_eq!(value, "heavy");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(commands.is_empty());

    // lighter than the empty plate
    let csv = SPOTTING_CSV.replace("pET28a,2,B1,A1,5,76.32", "pET28a,2,B1,A1,5,10.0");
    let (result, commands) = run(ProtocolKind::Spotting, &spotting_json(), &csv);
    assert!(matches!(result, Err(Error::Domain(DomainError::NegativeMaterial { .. }))));
    assert!(commands.is_empty());
}

#[test]
fn tip_rack_and_agar_plate_in_one_slot_are_rejected() {
    let json = spotting_json().replace(r#""tiprack_slots": [9]"#, r#""tiprack_slots": [1]"#);
    let (result, commands) = run(ProtocolKind::Spotting, &json, SPOTTING_CSV);
    match result {
        Err(Error::Config(ConfigError::SlotOccupied { slot, occupant, requested })) => {
            assert_eq!(slot, "1");
            assert_eq!(occupant, "opentrons_96_tiprack_20ul");
            assert_eq!(requested, "nunc_omnitray");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(commands.is_empty());
}

// ---------------------------------------------------------------------------
// Sampling
// ---------------------------------------------------------------------------

fn sampling_json(method: &str) -> String {
    format!(
        r#"{{
        {DUAL_SINGLE_PIPETTES},
        {AGAR_PLATES},
        "media_plate_name": "nest_12_reservoir_15ml",
        "media_plate_slot": 3,
        "culture_plate_name": "nest_96_wellplate_2ml_deep",
        "culture_plate_slot": 5,
        "sampling_method": "{method}",
        "spot_radius": 1.5,
        "agar_stab_depth": 1
    }}"#
    )
}

const SAMPLING_CSV: &str = "\
id,agar_plate_location,agar_plate_weight,media_source_well,sampling_source_well,media_volume,destination_well
c1,1,76.32,A1,A1,150,A1
c2,2,76.32,A1,B3,150,B1
blank,1,76.32,A1,NA,150,C1
";

#[test]
fn spiral_sampling_sweeps_each_colony() {
    let (result, commands) = run(ProtocolKind::Sampling, &sampling_json("spiral"), SAMPLING_CSV);
    result.unwrap();

    // media on the p300 with one tip, sampling on the p20 per colony
    assert_eq!(pick_ups(&commands, Mount::Left), 1);
    assert_eq!(dispensed_wells(&commands, Mount::Left), vec!["A1", "B1", "C1"]);
    assert_eq!(pick_ups(&commands, Mount::Right), 2);

    let moves = count(&commands, |c| matches!(c, Command::MoveTo { mount: Mount::Right, .. }));
    assert_eq!(moves, 2 * (25 + 1));
    let depths: Vec<f64> = commands
        .iter()
        .filter_map(|c| match c {
            Command::MoveTo { at, .. } => match at.position {
                Position::BottomOffset { z, .. } => Some(z),
                _ => None,
            },
            _ => None,
        })
        .collect();
    assert_eq!(depths.len(), 50);
    assert!(depths.iter().all(|z| (z - 2.60289).abs() < 1e-4));
}

#[test]
fn pierce_sampling_moves_once_per_colony() {
    let (result, commands) = run(ProtocolKind::Sampling, &sampling_json("pierce"), SAMPLING_CSV);
    result.unwrap();
    let moves = count(&commands, |c| matches!(c, Command::MoveTo { mount: Mount::Right, .. }));
    assert_eq!(moves, 2 * 2);
    assert_eq!(
        count(&commands, |c| matches!(c, Command::Mix { repetitions: 3, rate, .. } if *rate == 4.0)),
        2
    );
}

#[test]
fn sampling_validates_every_colony_before_filling_media() {
    let csv = SAMPLING_CSV.replace("c2,2,76.32", "c2,2,heavy");
    let (result, commands) = run(ProtocolKind::Sampling, &sampling_json("spiral"), &csv);
    assert!(matches!(result, Err(Error::Parse(ParseError::NotANumber { .. }))));
    assert!(commands.is_empty());

    let csv = SAMPLING_CSV.replace("c2,2,76.32", "c2,7,76.32");
    let (result, commands) = run(ProtocolKind::Sampling, &sampling_json("pierce"), &csv);
    assert!(matches!(result, Err(Error::Config(ConfigError::UnknownSlot(_)))));
    assert!(commands.is_empty());
}

#[test]
fn unknown_sampling_method_is_rejected_upfront() {
    let (result, commands) = run(ProtocolKind::Sampling, &sampling_json("scrape"), SAMPLING_CSV);
    assert!(matches!(result, Err(Error::Config(ConfigError::Json(_)))));
    assert!(commands.is_empty());
}

// ---------------------------------------------------------------------------
// Induction and transfer
// ---------------------------------------------------------------------------

#[test]
fn induction_uses_the_blank_pipette_for_blanks() {
    let json = format!(
        r#"{{
        {DUAL_SINGLE_PIPETTES},
        "blank_plate_name": "nest_96_wellplate_2ml_deep",
        "blank_plate_slot": 2,
        "culture_plate_name": "nest_96_wellplate_2ml_deep",
        "culture_plate_slot": 2,
        "inducer_plate_name": "biorad_96_wellplate_200ul_pcr",
        "inducer_plate_slot": 4,
        "destination_plate_name": "corning_96_wellplate_360ul_flat",
        "destination_plate_slot": 5
    }}"#
    );
    let csv = "\
id,blank_well,blank_volume,culture_well,culture_volume,inducer_well,inducer_volume,destination_well
c1,NA,0,B1,180,A1,2,A1
c2,NA,0,B2,180,A1,2,B1
blank,A1,200,NA,0,NA,0,C1
";
    let (result, commands) = run(ProtocolKind::Induction, &json, csv);
    result.unwrap();

    // blank and culture share a plate, loaded once
    let plates = count(&commands, |c| matches!(c, Command::LoadLabware { slot: Slot::Deck(2), .. }));
    assert_eq!(plates, 1);

    // blanks (200 µL) and cultures (180 µL) on the p300, inducer (2 µL) on the p20
    assert_eq!(dispensed_wells(&commands, Mount::Left), vec!["C1", "A1", "B1"]);
    assert_eq!(dispensed_wells(&commands, Mount::Right), vec!["A1", "B1"]);
    assert_eq!(pick_ups(&commands, Mount::Left), 2);
    assert_eq!(pick_ups(&commands, Mount::Right), 2);

    let pause = commands
        .iter()
        .position(|c| matches!(c, Command::Pause { message } if message == "Take t0 measurement"))
        .unwrap();
    let first_inducer = commands
        .iter()
        .position(|c| matches!(c, Command::PickUpTip { mount: Mount::Right }))
        .unwrap();
    assert!(pause < first_inducer);
}

#[test]
fn transfer_uses_a_fresh_tip_and_splits_large_volumes() {
    let json = format!(
        r#"{{
        {DUAL_SINGLE_PIPETTES},
        "source_plate_name": "nest_96_wellplate_2ml_deep",
        "source_plate_slot": 1,
        "destination_plate_name": "nest_96_wellplate_2ml_deep",
        "destination_plate_slot": 2
    }}"#
    );
    let csv = "\
source_id,source_well,source_volume,destination_id,destination_well,destination_volume
s1,A1,500,d1,A1,500
s2,B1,100,d2,B1,100
s3,NA,0,d3,C1,0
";
    let (result, commands) = run(ProtocolKind::Transfer, &json, csv);
    result.unwrap();
    assert_eq!(pick_ups(&commands, Mount::Left), 2);

    let volumes: Vec<f64> = commands
        .iter()
        .filter_map(|c| match c {
            Command::Aspirate { volume, .. } => Some(*volume),
            _ => None,
        })
        .collect();
    assert_eq!(volumes, vec![250.0, 250.0, 100.0]);
}

// ---------------------------------------------------------------------------
// Driver failures
// ---------------------------------------------------------------------------

/// Accepts a fixed number of commands, then refuses everything.
struct Flaky {
    remaining: usize,
}

impl Driver for Flaky {
    fn issue(&mut self, command: &Command) -> Result<(), DriverError> {
        if self.remaining == 0 {
            return Err(DriverError::Rejected(format!("{command:?}")));
        }
        self.remaining -= 1;
        Ok(())
    }
}

#[test]
fn a_rejected_command_aborts_the_run() {
    let params = Parameters::from_json(TRANSFORMATION_JSON).unwrap();
    let table = parse_csv(TRANSFORMATION_CSV).unwrap();
    let mut driver = Flaky { remaining: 3 };
    let result = protocols::run(ProtocolKind::Transformation, &params, &table, &mut driver);
    assert!(matches!(result, Err(Error::Driver(DriverError::Rejected(_)))));
}
