use std::collections::BTreeMap;

use crate::config::PipetteSetup;
use crate::error::{ConfigError, Result};
use crate::hardware::{Command, Driver, LabwareHandle, Slot, WellRef};
use crate::pipette::Pipette;

// ---------------------------------------------------------------------------
// Run state
// ---------------------------------------------------------------------------

/// Everything a single protocol run owns, independent of the driver behind it.
pub struct RunState<'d> {
    driver: &'d mut dyn Driver,

    /// Labware loaded per slot, with its load name. Written once per slot,
    /// read many times.
    loaded: BTreeMap<Slot, (LabwareHandle, String)>,

    /// Next labware handle to hand out.
    next_handle: usize,

    /// Whether the thermocycler module is on the deck.
    thermocycler: bool,

    /// Number of commands issued so far.
    issued: usize,
}

impl<'d> RunState<'d> {
    pub fn new(driver: &'d mut dyn Driver) -> Self {
        Self {
            driver,
            loaded: BTreeMap::new(),
            next_handle: 0,
            thermocycler: false,
            issued: 0,
        }
    }

    pub fn issue(&mut self, command: Command) -> Result<()> {
        self.driver.issue(&command)?;
        self.issued += 1;
        Ok(())
    }

    pub fn issued(&self) -> usize {
        self.issued
    }

    /// Labware currently loaded in `slot`, if any.
    pub fn labware_at(&self, slot: Slot) -> Option<LabwareHandle> {
        self.loaded.get(&slot).map(|(labware, _)| *labware)
    }

    /// Load the thermocycler module once; later calls are no-ops.
    pub fn load_thermocycler(&mut self) -> Result<()> {
        if !self.thermocycler {
            self.issue(Command::LoadThermocycler)?;
            self.thermocycler = true;
        }
        Ok(())
    }

    /// Load labware into an empty slot. The thermocycler slot loads the
    /// module first.
    pub fn load_labware(&mut self, load_name: &str, slot: Slot, label: Option<String>) -> Result<LabwareHandle> {
        if let Some((_, occupant)) = self.loaded.get(&slot) {
            return Err(occupied(slot, occupant, load_name).into());
        }
        if slot == Slot::Thermocycler {
            self.load_thermocycler()?;
        }
        let labware = LabwareHandle(self.next_handle);
        self.next_handle += 1;
        self.issue(Command::LoadLabware {
            labware,
            load_name: load_name.to_string(),
            slot,
            label,
        })?;
        self.loaded.insert(slot, (labware, load_name.to_string()));
        Ok(labware)
    }

    /// Reuse the labware already in `slot`, or load it if the slot is empty.
    /// A slot holding different labware is an error.
    pub fn load_or_reuse(&mut self, load_name: &str, slot: Slot) -> Result<LabwareHandle> {
        match self.loaded.get(&slot) {
            Some((labware, occupant)) if occupant == load_name => {
                log::debug!("reusing labware {labware:?} in slot {slot} for {load_name}");
                Ok(*labware)
            }
            Some((_, occupant)) => Err(occupied(slot, occupant, load_name).into()),
            None => self.load_labware(load_name, slot, None),
        }
    }

    /// Load the tip racks and then the pipette itself.
    pub fn load_pipette(&mut self, setup: &PipetteSetup) -> Result<Pipette> {
        let pipette = setup.pipette()?;
        let mut tip_racks = Vec::with_capacity(setup.tiprack_slots.len());
        for slot in &setup.tiprack_slots {
            tip_racks.push(self.load_labware(&setup.tiprack_name, *slot, None)?);
        }
        self.issue(Command::LoadPipette {
            mount: pipette.mount,
            load_name: setup.load_name.clone(),
            tip_racks,
        })?;
        log::info!(
            "loaded {} on {} mount ({:?}, {} µL)",
            setup.load_name,
            pipette.mount,
            pipette.channels(),
            pipette.max_volume()
        );
        Ok(pipette)
    }

    // -- liquid handling helpers --

    pub fn pick_up_tip(&mut self, pipette: &Pipette) -> Result<()> {
        self.issue(Command::PickUpTip {
            mount: pipette.mount,
        })
    }

    pub fn drop_tip(&mut self, pipette: &Pipette) -> Result<()> {
        self.issue(Command::DropTip {
            mount: pipette.mount,
        })
    }

    pub fn aspirate(&mut self, pipette: &Pipette, volume: f64, at: WellRef, rate: f64) -> Result<()> {
        self.issue(Command::Aspirate {
            mount: pipette.mount,
            volume,
            at,
            rate,
        })
    }

    pub fn dispense(&mut self, pipette: &Pipette, volume: f64, at: WellRef, rate: f64) -> Result<()> {
        self.issue(Command::Dispense {
            mount: pipette.mount,
            volume,
            at,
            rate,
        })
    }

    pub fn mix(&mut self, pipette: &Pipette, repetitions: u32, volume: Option<f64>, at: Option<WellRef>, rate: f64) -> Result<()> {
        self.issue(Command::Mix {
            mount: pipette.mount,
            repetitions,
            volume,
            at,
            rate,
        })
    }

    pub fn blow_out(&mut self, pipette: &Pipette, at: WellRef) -> Result<()> {
        self.issue(Command::BlowOut {
            mount: pipette.mount,
            at,
        })
    }

    pub fn move_to(&mut self, pipette: &Pipette, at: WellRef) -> Result<()> {
        self.issue(Command::MoveTo {
            mount: pipette.mount,
            at,
        })
    }

    /// Move `volume` from `source` to `destination`, in as many trips as the
    /// tip needs. Tip handling is left to the caller.
    pub fn transfer(&mut self, pipette: &Pipette, volume: f64, source: &WellRef, destination: &WellRef) -> Result<()> {
        for chunk in pipette.chunks(volume) {
            self.aspirate(pipette, chunk, source.clone(), 1.0)?;
            self.dispense(pipette, chunk, destination.clone(), 1.0)?;
        }
        Ok(())
    }

    pub fn pause(&mut self, message: &str) -> Result<()> {
        self.issue(Command::Pause {
            message: message.to_string(),
        })
    }

    pub fn comment(&mut self, message: &str) -> Result<()> {
        self.issue(Command::Comment {
            message: message.to_string(),
        })
    }
}

fn occupied(slot: Slot, occupant: &str, requested: &str) -> ConfigError {
    ConfigError::SlotOccupied {
        slot: slot.to_string(),
        occupant: occupant.to_string(),
        requested: requested.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Deck plan
// ---------------------------------------------------------------------------

/// Slot claims of a run, checked before anything is loaded.
///
/// An exclusive claim (tip racks, agar plates, thermocycler plates) owns its
/// slot outright. Shared claims may name the same slot as long as they name
/// the same labware, mirroring [`RunState::load_or_reuse`].
#[derive(Debug, Default)]
pub struct DeckPlan {
    claims: BTreeMap<Slot, (String, bool)>,
}

impl DeckPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exclusive(&mut self, load_name: &str, slot: Slot) -> std::result::Result<(), ConfigError> {
        self.claim(load_name, slot, false)
    }

    pub fn shared(&mut self, load_name: &str, slot: Slot) -> std::result::Result<(), ConfigError> {
        self.claim(load_name, slot, true)
    }

    /// Every tip rack of every pipette.
    pub fn tip_racks(&mut self, setups: &[PipetteSetup]) -> std::result::Result<(), ConfigError> {
        for setup in setups {
            for slot in &setup.tiprack_slots {
                self.exclusive(&setup.tiprack_name, *slot)?;
            }
        }
        Ok(())
    }

    fn claim(&mut self, load_name: &str, slot: Slot, shared: bool) -> std::result::Result<(), ConfigError> {
        match self.claims.get(&slot) {
            Some((occupant, true)) if shared && occupant == load_name => Ok(()),
            Some((occupant, _)) => Err(occupied(slot, occupant, load_name)),
            None => {
                self.claims.insert(slot, (load_name.to_string(), shared));
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::DryRun;

    #[test]
    fn load_or_reuse_loads_each_slot_once() {
        let mut driver = DryRun::new();
        let mut state = RunState::new(&mut driver);
        let first = state.load_or_reuse("deep_well", Slot::Deck(3)).unwrap();
        let again = state.load_or_reuse("deep_well", Slot::Deck(3)).unwrap();
        let other = state.load_or_reuse("pcr_plate", Slot::Deck(2)).unwrap();
        assert_eq!(first, again);
        assert_ne!(first, other);
        assert_eq!(state.issued(), 2);
        drop(state);

        let loads = driver
            .commands
            .iter()
            .filter(|c| matches!(c, Command::LoadLabware { .. }))
            .count();
        assert_eq!(loads, 2);
    }

    #[test]
    fn occupied_slots_are_never_overwritten() {
        let mut driver = DryRun::new();
        let mut state = RunState::new(&mut driver);
        let tips = state.load_labware("tiprack_20", Slot::Deck(1), None).unwrap();

        for result in [
            state.load_labware("agar", Slot::Deck(1), None),
            state.load_labware("tiprack_20", Slot::Deck(1), None),
            state.load_or_reuse("agar", Slot::Deck(1)),
        ] {
            match result {
                Err(crate::error::Error::Config(ConfigError::SlotOccupied { slot, occupant, .. })) => {
                    assert_eq!(slot, "1");
                    assert_eq!(occupant, "tiprack_20");
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(state.labware_at(Slot::Deck(1)), Some(tips));
        assert_eq!(state.issued(), 1);
    }

    #[test]
    fn deck_plan_allows_only_same_labware_to_share() {
        let mut deck = DeckPlan::new();
        deck.shared("deep_well", Slot::Deck(2)).unwrap();
        deck.shared("deep_well", Slot::Deck(2)).unwrap();
        assert!(matches!(
            deck.shared("pcr", Slot::Deck(2)),
            Err(ConfigError::SlotOccupied { .. })
        ));
        assert!(deck.exclusive("deep_well", Slot::Deck(2)).is_err());

        deck.exclusive("agar", Slot::Deck(1)).unwrap();
        assert!(deck.exclusive("agar", Slot::Deck(1)).is_err());
        assert!(deck.shared("agar", Slot::Deck(1)).is_err());

        let setup = PipetteSetup {
            mount: crate::pipette::Mount::Right,
            load_name: "p20_single_gen2".into(),
            tiprack_name: "tiprack_20".into(),
            tiprack_slots: vec![Slot::Deck(9), Slot::Deck(1)],
        };
        assert!(deck.tip_racks(&[setup]).is_err());
    }

    #[test]
    fn thermocycler_labware_loads_the_module_once() {
        let mut driver = DryRun::new();
        let mut state = RunState::new(&mut driver);
        state.load_labware("pcr", Slot::Thermocycler, None).unwrap();
        state.load_thermocycler().unwrap();
        drop(state);
        assert_eq!(driver.commands[0], Command::LoadThermocycler);
        assert_eq!(
            driver
                .commands
                .iter()
                .filter(|c| **c == Command::LoadThermocycler)
                .count(),
            1
        );
    }

    #[test]
    fn load_pipette_loads_tip_racks_first() {
        let mut driver = DryRun::new();
        let mut state = RunState::new(&mut driver);
        let setup = PipetteSetup {
            mount: crate::pipette::Mount::Left,
            load_name: "p300_single_gen2".into(),
            tiprack_name: "tiprack_300".into(),
            tiprack_slots: vec![Slot::Deck(6), Slot::Deck(9)],
        };
        let pipette = state.load_pipette(&setup).unwrap();
        assert_eq!(pipette.max_volume(), 300.0);
        drop(state);
        match &driver.commands[2] {
            Command::LoadPipette { tip_racks, .. } => {
                assert_eq!(tip_racks, &vec![LabwareHandle(0), LabwareHandle(1)])
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn transfer_splits_oversized_volumes() {
        let mut driver = DryRun::new();
        let mut state = RunState::new(&mut driver);
        let setup = PipetteSetup {
            mount: crate::pipette::Mount::Left,
            load_name: "p300_single_gen2".into(),
            tiprack_name: "tiprack_300".into(),
            tiprack_slots: vec![],
        };
        let pipette = state.load_pipette(&setup).unwrap();
        let source = WellRef::new(LabwareHandle(0), "A1");
        let destination = WellRef::new(LabwareHandle(1), "B1");
        state.transfer(&pipette, 600.0, &source, &destination).unwrap();
        drop(state);
        let aspirates: Vec<f64> = driver
            .commands
            .iter()
            .filter_map(|c| match c {
                Command::Aspirate { volume, .. } => Some(*volume),
                _ => None,
            })
            .collect();
        assert_eq!(aspirates, vec![300.0, 300.0]);
    }
}
