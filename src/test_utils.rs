// src/test_utils.rs

//! This module contains utilities for testing.

use crate::interfaces::{
    Ahrs, AhrsData, Blackbox, FailsafePhase, MotorCommands, MotorMixer, Preferences,
    RadioController,
};
use crate::{ControlMode, Controls, FlightController, FlightControllerConfig, PidGains};
use nalgebra::UnitQuaternion;
use std::string::{String, ToString};
use std::vec::Vec;

/// A constant defining the tolerance within which floating-point values
/// are considered close enough to be equal.
pub const TEST_TOLERANCE: f32 = 1e-5;

/// Checks if two floating point numbers are close enough to be considered
/// equal.
///
/// # Arguments
/// * `target` - The target value.
/// * `value` - The value to compare against the target.
///
/// # Returns
/// `true` if the absolute difference between `target` and `value` is less than
/// `TEST_TOLERANCE`, otherwise `false`.
pub fn value_close(target: f32, value: f32) -> bool {
    close(target, value, TEST_TOLERANCE)
}

/// Checks if two floating point numbers are within `tolerance` of each other.
pub fn close(target: f32, value: f32, tolerance: f32) -> bool {
    libm::fabsf(target - value) < tolerance
}

/// AHRS returning whatever the test puts in it.
#[derive(Debug, Clone, Copy)]
pub struct MockAhrs {
    pub orientation: UnitQuaternion<f32>,
    pub data: AhrsData,
    pub initializing: bool,
    pub updates_outputs: bool,
}

impl Default for MockAhrs {
    fn default() -> Self {
        Self {
            orientation: UnitQuaternion::identity(),
            data: AhrsData::default(),
            initializing: false,
            updates_outputs: false,
        }
    }
}

impl Ahrs for MockAhrs {
    fn orientation(&self) -> UnitQuaternion<f32> {
        self.orientation
    }

    fn ahrs_data(&self) -> AhrsData {
        self.data
    }

    fn sensor_fusion_filter_is_initializing(&self) -> bool {
        self.initializing
    }

    fn configured_to_update_outputs(&self) -> bool {
        self.updates_outputs
    }
}

/// Four motor mixer recording the last command bundle.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockMixer {
    pub on: bool,
    pub last_commands: Option<MotorCommands>,
    pub outputs: [f32; 4],
    pub rpms: [i32; 4],
}

impl MotorMixer for MockMixer {
    fn motors_switch_on(&mut self) {
        self.on = true;
    }

    fn motors_switch_off(&mut self) {
        self.on = false;
    }

    fn motors_is_on(&self) -> bool {
        self.on
    }

    fn output_to_motors(&mut self, commands: &MotorCommands, _delta_t: f32, _tick_count: u32) {
        self.last_commands = Some(*commands);
    }

    fn motor_count(&self) -> usize {
        self.outputs.len()
    }

    fn motor_output(&self, motor_index: usize) -> f32 {
        self.outputs[motor_index]
    }

    fn motor_rpm(&self, motor_index: usize) -> i32 {
        self.rpms[motor_index]
    }
}

/// Radio controller in a settable failsafe phase.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockRadio {
    pub phase: FailsafePhase,
}

impl RadioController for MockRadio {
    fn failsafe_phase(&self) -> FailsafePhase {
        self.phase
    }
}

/// Blackbox counting closed logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockBlackbox {
    pub end_log_count: usize,
}

impl Blackbox for MockBlackbox {
    fn end_log(&mut self) {
        self.end_log_count += 1;
    }
}

/// Preferences recording every stored gain set.
#[derive(Debug, Clone, Default)]
pub struct MockPreferences {
    pub saved: Vec<(String, PidGains<f32>)>,
}

impl Preferences for MockPreferences {
    fn put_pid(&mut self, name: &str, gains: &PidGains<f32>) {
        self.saved.push((name.to_string(), *gains));
    }
}

pub type TestFlightController = FlightController<MockAhrs, MockMixer, MockRadio, MockBlackbox>;

/// Disarmed controller with default configuration and mock collaborators.
pub fn test_flight_controller() -> TestFlightController {
    FlightController::with_blackbox(
        FlightControllerConfig::new(),
        MockAhrs::default(),
        MockMixer::default(),
        MockRadio::default(),
        Some(MockBlackbox::default()),
    )
}

/// Armed controller out of ground mode, in rate mode at half throttle with
/// centred sticks.
pub fn airborne_flight_controller() -> TestFlightController {
    let mut fc = test_flight_controller();
    fc.motors_switch_on();
    let threshold = FlightControllerConfig::new().take_off_tick_threshold;
    for tick_count in [1, threshold + 2] {
        fc.update_setpoints(&Controls {
            tick_count,
            throttle_stick: 0.5,
            control_mode: ControlMode::Rate,
            ..Controls::default()
        });
    }
    assert!(!fc.ground_mode());
    fc
}
