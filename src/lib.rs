// src/lib.rs

//! # Multirotor Flight Control Core
//!
//! A `no_std`, no-alloc flight-control core for multirotors. It turns pilot
//! stick input and vehicle orientation into normalized motor commands using
//! a bank of PIDFS controllers (proportional, integral, derivative,
//! feed-forward and setpoint slew):
//!
//! - rate mode, where the sticks command body rates;
//! - angle mode, where the sticks command roll and pitch angles and the
//!   vehicle self-levels, cascading angle PIDs into the rate PIDs;
//! - yaw spin recovery, which overrides the pilot until a spin has stopped.
//!
//! The AHRS, motor mixer, radio controller, blackbox and preferences are
//! external collaborators reached through the traits in [`interfaces`].
//!
//! ```
//! use multirotor_flight_core::interfaces::*;
//! use multirotor_flight_core::{Controls, FlightController, FlightControllerConfig};
//! use nalgebra::UnitQuaternion;
//!
//! struct Level;
//! impl Ahrs for Level {
//!     fn orientation(&self) -> UnitQuaternion<f32> {
//!         UnitQuaternion::identity()
//!     }
//!     fn ahrs_data(&self) -> AhrsData {
//!         AhrsData::default()
//!     }
//!     fn sensor_fusion_filter_is_initializing(&self) -> bool {
//!         false
//!     }
//! }
//!
//! #[derive(Default)]
//! struct Mixer {
//!     on: bool,
//!     commands: MotorCommands,
//! }
//! impl MotorMixer for Mixer {
//!     fn motors_switch_on(&mut self) {
//!         self.on = true;
//!     }
//!     fn motors_switch_off(&mut self) {
//!         self.on = false;
//!     }
//!     fn motors_is_on(&self) -> bool {
//!         self.on
//!     }
//!     fn output_to_motors(&mut self, commands: &MotorCommands, _delta_t: f32, _tick_count: u32) {
//!         self.commands = *commands;
//!     }
//!     fn motor_count(&self) -> usize {
//!         4
//!     }
//!     fn motor_output(&self, _motor_index: usize) -> f32 {
//!         0.0
//!     }
//!     fn motor_rpm(&self, _motor_index: usize) -> i32 {
//!         0
//!     }
//! }
//!
//! struct Radio;
//! impl RadioController for Radio {
//!     fn failsafe_phase(&self) -> FailsafePhase {
//!         FailsafePhase::Idle
//!     }
//! }
//!
//! let config = FlightControllerConfig::new();
//! let mut fc = FlightController::new(config, Level, Mixer::default(), Radio);
//! fc.motors_switch_on();
//!
//! fc.update_setpoints(&Controls {
//!     tick_count: 1,
//!     throttle_stick: 0.4,
//!     roll_stick_dps: 90.0,
//!     ..Controls::default()
//! });
//! fc.loop_step(config.task_interval_s(), 1);
//!
//! assert_eq!(0.4, fc.mixer().commands.speed);
//! assert!(fc.mixer().commands.roll > 0.0);
//! ```

#![no_std]
#![deny(missing_docs)]

#[cfg(test)]
extern crate std;

#[macro_use]
mod fmt;

pub mod attitude;
pub mod command;
pub mod config;
pub mod controller;
pub mod error;
pub mod filter;
pub mod interfaces;
pub mod pid;
pub mod task;
pub mod telemetry;
pub mod vehicle;

#[doc(inline)]
pub use config::*;
#[doc(inline)]
pub use controller::*;
#[doc(inline)]
pub use error::*;
#[doc(inline)]
pub use filter::*;
#[doc(inline)]
pub use pid::*;
#[doc(inline)]
pub use task::*;
#[doc(inline)]
pub use telemetry::*;
#[doc(inline)]
pub use vehicle::*;

#[cfg(test)]
mod test_utils;
