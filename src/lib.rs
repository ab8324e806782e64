//! Rusty Pipette – turns liquid-handling experiment designs into robot
//! commands.
//!
//! A design is a CSV table (one row per planned transfer) plus a flat JSON
//! parameter object describing plates, slots and pipettes. Each workflow in
//! [`protocols`] reads both and emits [`hardware::Command`]s through a
//! [`hardware::Driver`].

pub mod compiler;
pub mod config;
pub mod data;
pub mod error;
pub mod hardware;
pub mod labware;
pub mod pipette;
pub mod protocols;
pub mod state;
