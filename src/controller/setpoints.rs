// src/controller/setpoints.rs

//! Setpoint translation from receiver input.
//!
//! Runs in the receiver context, much less often than the control tick.

use super::{ControlMode, Controls, FlightController, PidIndex};
use crate::attitude::{DEGREES_TO_RADIANS, RADIANS_TO_DEGREES};
use crate::interfaces::{Ahrs, Blackbox, FailsafePhase, MotorMixer, RadioController};
use crate::AngleModeStrategy;
use libm::{asinf, sinf};

impl<A, M, R, B> FlightController<A, M, R, B>
where
    A: Ahrs,
    M: MotorMixer,
    R: RadioController,
    B: Blackbox,
{
    /// Uses new receiver values to update the PID setpoints, using the NED
    /// coordinate convention.
    ///
    /// - Roll stick right gives right side down, positive NED roll, so the
    ///   roll sign is unchanged.
    /// - Pitch stick forward gives nose down, negative NED pitch, so the
    ///   pitch sign is negated.
    /// - Yaw stick right gives nose right, positive NED yaw, so the yaw sign
    ///   is unchanged.
    pub fn update_setpoints(&mut self, controls: &Controls) {
        self.detect_crash_or_spin(controls.tick_count);

        self.set_control_mode(controls.control_mode);

        self.throttle_stick = controls.throttle_stick;
        self.thrust_output = self.throttle_stick;
        self.tpa = throttle_pid_attenuation(
            self.throttle_stick,
            self.tpa_breakpoint,
            self.tpa_multiplier,
        );

        self.roll_stick_dps = controls.roll_stick_dps;
        self.roll_stick_degrees = controls.roll_stick_degrees;
        self.roll_stick_sin_angle = sinf(self.roll_stick_degrees * DEGREES_TO_RADIANS);
        self.pitch_stick_dps = -controls.pitch_stick_dps;
        self.pitch_stick_degrees = -controls.pitch_stick_degrees;
        self.pitch_stick_sin_angle = sinf(self.pitch_stick_degrees * DEGREES_TO_RADIANS);
        self.yaw_stick_dps = controls.yaw_stick_dps;

        self.pids[PidIndex::RollRate as usize].set_setpoint(self.roll_stick_dps);
        self.pids[PidIndex::PitchRate as usize].set_setpoint(self.pitch_stick_dps);
        self.pids[PidIndex::YawRate as usize].set_setpoint(self.yaw_stick_dps);
        self.apply_angle_setpoints();

        // In ground mode the integrators stay off, so there is no windup before take-off.
        if self.ground_mode {
            self.update_take_off(controls.tick_count);
        }

        self.update_use_angle_mode();
    }

    /// Switches the angle mode strategy and re-expresses the angle setpoints
    /// in the new space.
    ///
    /// On a change, both angle PIDs are reset with their most recent
    /// measurement re-expressed in the new space, so the next tick does not
    /// differentiate or integrate across units.
    pub fn set_angle_mode_strategy(&mut self, strategy: AngleModeStrategy) {
        if strategy == self.angle_mode_strategy {
            return;
        }
        self.angle_mode_strategy = strategy;
        self.apply_angle_setpoints();

        let (roll, pitch) = match strategy {
            AngleModeStrategy::AngleSpace => {
                self.roll_angle_degrees_raw = asinf(self.roll_sin_angle) * RADIANS_TO_DEGREES;
                self.pitch_angle_degrees_raw = asinf(self.pitch_sin_angle) * RADIANS_TO_DEGREES;
                (self.roll_angle_degrees_raw, self.pitch_angle_degrees_raw)
            }
            AngleModeStrategy::QuaternionSpace => (self.roll_sin_angle, self.pitch_sin_angle),
        };
        self.pids[PidIndex::RollAngle as usize].reset(roll);
        self.pids[PidIndex::PitchAngle as usize].reset(pitch);
        debug!("angle mode strategy changed");
    }

    /// Crash and yaw spin detection hook.
    ///
    /// Detection is not implemented. Use
    /// [`enter_yaw_spin_recovery`](Self::enter_yaw_spin_recovery) to trigger
    /// recovery from an external detector.
    pub fn detect_crash_or_spin(&mut self, _tick_count: u32) {}

    fn apply_angle_setpoints(&mut self) {
        let (roll, pitch) = match self.angle_mode_strategy {
            AngleModeStrategy::AngleSpace => (self.roll_stick_degrees, self.pitch_stick_degrees),
            AngleModeStrategy::QuaternionSpace => {
                (self.roll_stick_sin_angle, self.pitch_stick_sin_angle)
            }
        };
        self.pids[PidIndex::RollAngle as usize].set_setpoint(roll);
        self.pids[PidIndex::PitchAngle as usize].set_setpoint(pitch);
    }

    /// Leaves ground mode once the throttle has been above the take-off
    /// threshold for more than the take-off tick threshold.
    fn update_take_off(&mut self, tick_count: u32) {
        if self.throttle_stick < self.take_off_throttle_threshold {
            self.take_off_count_start = None;
            return;
        }
        let count_start = *self.take_off_count_start.get_or_insert(tick_count);
        if tick_count.wrapping_sub(count_start) > self.take_off_tick_threshold {
            self.ground_mode = false;
            self.switch_pid_integration_on();
            info!("take-off detected at tick {}", tick_count);
        }
    }

    /// Caches whether angle mode is in effect, so the control tick does not
    /// have to evaluate the condition.
    ///
    /// Angle mode is used in angle control mode or during failsafe, but never
    /// in ground mode, so the vehicle does not try to self-level on the ground.
    pub(super) fn update_use_angle_mode(&mut self) {
        self.use_angle_mode = (self.control_mode == ControlMode::Angle
            || self.radio.failsafe_phase() != FailsafePhase::Idle)
            && !self.ground_mode;
    }
}

/// Throttle PID attenuation.
///
/// One at or below the breakpoint, falling linearly with the multiplier above
/// it, never below zero.
pub fn throttle_pid_attenuation(throttle: f32, breakpoint: f32, multiplier: f32) -> f32 {
    (1.0 - multiplier * (throttle - breakpoint).max(0.0)).clamp(0.0, 1.0)
}
