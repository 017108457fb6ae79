//! Hardware-independent control core for soltherm
//!
//! This crate contains all platform-agnostic logic for a solar/battery powered
//! temperature and humidity sensor node: the wakeup/transmit/shutdown cycle
//! controller, the Oregon Scientific v2.1/v3.0 frame encoder, the moving
//! average smoother and the capability traits the core uses to talk to the
//! radio, sensor, display, ADC and timer peripherals.
//!
//! It is `#![no_std]` so it compiles on both embedded targets and desktop
//! hosts (for tests). The platform crate owns the real drivers, implements the
//! [`hal`] traits and forwards hardware interrupts as [`controller::Event`]s.

#![no_std]

#[cfg(test)]
extern crate std;

pub mod config;
pub mod controller;
pub mod hal;
pub mod measurement;
pub mod oregon;

pub use config::NodeConfig;
pub use controller::{CycleController, Event, RadioState};
pub use measurement::MovingAverage;
pub use oregon::OregonEncoder;
