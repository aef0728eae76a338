// src/interfaces.rs

//! Narrow interfaces to the collaborators of the flight controller.
//!
//! The core owns no I/O. Orientation and rates come from the AHRS, failsafe
//! state from the radio controller, and outputs go to the motor mixer. The
//! blackbox and preferences collaborators are told about disarming and about
//! saved gains respectively.

use crate::PidGains;
use nalgebra::{UnitQuaternion, Vector3};

/// Rate and acceleration data from the AHRS, in the ENU convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AhrsData {
    /// Angular rate in radians per second.
    pub gyro_rps: Vector3<f32>,
    /// Acceleration in g.
    pub acc: Vector3<f32>,
}

impl Default for AhrsData {
    fn default() -> Self {
        Self {
            gyro_rps: Vector3::zeros(),
            acc: Vector3::zeros(),
        }
    }
}

/// Attitude and heading reference system.
pub trait Ahrs {
    /// Current orientation estimate, ENU convention.
    fn orientation(&self) -> UnitQuaternion<f32>;

    /// Current rate and acceleration data, ENU convention.
    fn ahrs_data(&self) -> AhrsData;

    /// Whether sensor fusion is still converging after start-up.
    fn sensor_fusion_filter_is_initializing(&self) -> bool;

    /// Whether the AHRS task runs the control law itself after each update.
    fn configured_to_update_outputs(&self) -> bool {
        false
    }
}

/// Failsafe phase reported by the radio controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FailsafePhase {
    /// Receiver signal is healthy.
    #[default]
    Idle,
    /// Receiver signal has been lost.
    RxLossDetected,
    /// Failsafe landing in progress.
    Landing,
    /// Failsafe landing completed.
    Landed,
    /// Signal is back and being monitored before control is returned.
    RxLossMonitoring,
    /// Signal has recovered.
    RxLossRecovered,
}

/// Radio controller, the source of failsafe state.
pub trait RadioController {
    /// Current failsafe phase.
    fn failsafe_phase(&self) -> FailsafePhase;
}

/// Normalized command bundle passed to the motor mixer once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotorCommands {
    /// Thrust in `[0, 1]`.
    pub speed: f32,
    /// Roll command, nominally in `[-1, 1]`.
    pub roll: f32,
    /// Pitch command, nominally in `[-1, 1]`.
    pub pitch: f32,
    /// Yaw command, nominally in `[-1, 1]`.
    pub yaw: f32,
}

/// Motor mixer and motor output stage.
pub trait MotorMixer {
    /// Switches the motors on.
    fn motors_switch_on(&mut self);

    /// Switches the motors off.
    fn motors_switch_off(&mut self);

    /// Whether the motors are on.
    fn motors_is_on(&self) -> bool;

    /// Mixes and outputs one command bundle.
    fn output_to_motors(&mut self, commands: &MotorCommands, delta_t: f32, tick_count: u32);

    /// Number of motors driven by the mixer.
    fn motor_count(&self) -> usize;

    /// Last output power of a motor, in `[0, 1]`.
    fn motor_output(&self, motor_index: usize) -> f32;

    /// Last measured RPM of a motor, zero when not available.
    fn motor_rpm(&self, motor_index: usize) -> i32;
}

/// Flight data recorder.
pub trait Blackbox {
    /// Closes the current log segment.
    fn end_log(&mut self);
}

/// Sentinel marking a gain as not set in persistent storage.
pub const PIDS_NOT_SET: f32 = f32::MAX;

/// Persistent parameter storage.
pub trait Preferences {
    /// Stores the gains of one axis under its name.
    fn put_pid(&mut self, name: &str, gains: &PidGains<f32>);
}
