// src/controller/outputs.rs

//! The control law, run once per control tick.

use super::{AngleAxis, FlightController, PidIndex};
use crate::attitude::{
    pitch_degrees_ned, pitch_rate_ned_dps, roll_degrees_ned, roll_rate_ned_dps, sin_pitch_ned,
    sin_roll_ned, yaw_rate_ned_dps,
};
use crate::interfaces::{
    Ahrs, Blackbox, FailsafePhase, MotorCommands, MotorMixer, RadioController,
};
use crate::AngleModeStrategy;
use libm::{fabsf, sqrtf};
use nalgebra::{UnitQuaternion, Vector3};

/// Thrust commanded while the receiver signal is lost.
pub const FAILSAFE_THRUST: f32 = 0.25;

/// Thrust used during yaw spin recovery. Half thrust leaves the most room
/// for yaw before the motor outputs clip.
pub const YAW_SPIN_RECOVERY_THRUST: f32 = 0.5;

const ROLL_RATE: usize = PidIndex::RollRate as usize;
const PITCH_RATE: usize = PidIndex::PitchRate as usize;
const YAW_RATE: usize = PidIndex::YawRate as usize;
const ROLL_ANGLE: usize = PidIndex::RollAngle as usize;
const PITCH_ANGLE: usize = PidIndex::PitchAngle as usize;

impl<A, M, R, B> FlightController<A, M, R, B>
where
    A: Ahrs,
    M: MotorMixer,
    R: RadioController,
    B: Blackbox,
{
    /// One control task step: runs the control law, unless the AHRS runs it
    /// after its own update, then outputs to the motors.
    pub fn loop_step(&mut self, delta_t: f32, tick_count: u32) {
        if !self.ahrs.configured_to_update_outputs() {
            self.update_outputs_using_pids(delta_t);
        }
        self.output_to_motors(delta_t, tick_count);
    }

    /// Runs the control law on the current AHRS orientation and rates.
    pub fn update_outputs_using_pids(&mut self, delta_t: f32) {
        let orientation_enu = self.ahrs.orientation();
        let data_enu = self.ahrs.ahrs_data();

        self.update_outputs(&data_enu.gyro_rps, &data_enu.acc, &orientation_enu, delta_t);
    }

    /// Runs the control law on the given ENU rates and orientation.
    ///
    /// Called either from [`update_outputs_using_pids`](Self::update_outputs_using_pids)
    /// or directly by an AHRS task that runs the control law after each of
    /// its updates, at 1 to 8 kHz.
    pub fn update_outputs(
        &mut self,
        gyro_enu_rps: &Vector3<f32>,
        _acc_enu: &Vector3<f32>,
        orientation_enu: &UnitQuaternion<f32>,
        delta_t: f32,
    ) {
        if self.yaw_spin_recovery {
            self.recover_from_yaw_spin(gyro_enu_rps, delta_t);
            return;
        }

        if self.use_angle_mode {
            self.update_rate_setpoints_from_angles(orientation_enu, delta_t);
        }

        // The D-term input is the derivative of a noisy value, so it is filtered.
        let roll_rate_dps = roll_rate_ned_dps(gyro_enu_rps);
        let roll_rate_delta_dps = self
            .dterm_filters
            .roll
            .filter(roll_rate_dps - self.pids[ROLL_RATE].previous_measurement());
        self.outputs[ROLL_RATE] =
            self.pids[ROLL_RATE].update_delta(roll_rate_dps, roll_rate_delta_dps * self.tpa, delta_t);

        let pitch_rate_dps = pitch_rate_ned_dps(gyro_enu_rps);
        let pitch_rate_delta_dps = self
            .dterm_filters
            .pitch
            .filter(pitch_rate_dps - self.pids[PITCH_RATE].previous_measurement());
        self.outputs[PITCH_RATE] = self.pids[PITCH_RATE].update_delta(
            pitch_rate_dps,
            pitch_rate_delta_dps * self.tpa,
            delta_t,
        );

        // Yaw has no D-term, so no filtering.
        let yaw_rate_dps = yaw_rate_ned_dps(gyro_enu_rps);
        self.outputs[YAW_RATE] = self.pids[YAW_RATE].update(yaw_rate_dps, delta_t);
    }

    /// Passes the command bundle for this tick to the motor mixer.
    ///
    /// On receiver loss the control law is overridden with a fixed low
    /// thrust and no rotation.
    pub fn output_to_motors(&mut self, delta_t: f32, tick_count: u32) {
        let commands = if self.radio.failsafe_phase() == FailsafePhase::RxLossDetected {
            MotorCommands {
                speed: FAILSAFE_THRUST,
                roll: 0.0,
                pitch: 0.0,
                yaw: 0.0,
            }
        } else {
            MotorCommands {
                speed: self.thrust_output,
                roll: self.outputs[ROLL_RATE] / self.roll_rate_at_max_power_dps,
                pitch: self.outputs[PITCH_RATE] / self.pitch_rate_at_max_power_dps,
                yaw: self.outputs[YAW_RATE] / self.yaw_rate_at_max_power_dps,
            }
        };
        self.mixer_throttle = commands.speed;
        self.mixer.output_to_motors(&commands, delta_t, tick_count);
    }

    /// Yaw spin recovery: bring the yaw rate down first, and only correct
    /// roll and pitch once the spin has partially stopped.
    fn recover_from_yaw_spin(&mut self, gyro_enu_rps: &Vector3<f32>, delta_t: f32) {
        let yaw_rate_dps = yaw_rate_ned_dps(gyro_enu_rps);
        if fabsf(yaw_rate_dps) <= self.yaw_spin_recovered_dps {
            self.yaw_spin_recovery = false;
            self.switch_pid_integration_on();
            info!("yaw spin recovered");
            return;
        }

        self.thrust_output = YAW_SPIN_RECOVERY_THRUST;
        self.pids[YAW_RATE].set_setpoint(0.0);
        self.outputs[YAW_RATE] = self.pids[YAW_RATE].update(yaw_rate_dps, delta_t);

        if fabsf(yaw_rate_dps) > self.yaw_spin_partially_recovered_dps {
            // Still spinning fast, leave roll and pitch alone.
            self.outputs[ROLL_RATE] = 0.0;
            self.outputs[PITCH_RATE] = 0.0;
        } else {
            self.pids[ROLL_RATE].set_setpoint(0.0);
            self.outputs[ROLL_RATE] =
                self.pids[ROLL_RATE].update(roll_rate_ned_dps(gyro_enu_rps), delta_t);

            self.pids[PITCH_RATE].set_setpoint(0.0);
            self.outputs[PITCH_RATE] =
                self.pids[PITCH_RATE].update(pitch_rate_ned_dps(gyro_enu_rps), delta_t);
        }
    }

    /// Angle mode: the angle PIDs provide the setpoints of the roll and pitch
    /// rate PIDs.
    ///
    /// Only one of roll and pitch is evaluated per tick, alternating, which
    /// halves the cost of extracting angles from the orientation.
    fn update_rate_setpoints_from_angles(
        &mut self,
        orientation_enu: &UnitQuaternion<f32>,
        delta_t: f32,
    ) {
        let yaw_rate_setpoint_dps = self.yaw_stick_dps;

        match self.angle_mode_calculate {
            AngleAxis::Roll => {
                self.angle_mode_calculate = AngleAxis::Pitch;
                self.roll_sin_angle = sin_roll_ned(orientation_enu);
                let measurement = match self.angle_mode_strategy {
                    AngleModeStrategy::AngleSpace => {
                        self.roll_angle_degrees_raw = roll_degrees_ned(orientation_enu);
                        self.roll_angle_degrees_raw
                    }
                    AngleModeStrategy::QuaternionSpace => self.roll_sin_angle,
                };
                self.outputs[ROLL_ANGLE] =
                    self.pids[ROLL_ANGLE].update(measurement, delta_t) * self.max_roll_rate_dps;
                // coordinated turn: part of the yaw rate shows up as roll rate
                self.roll_rate_setpoint_dps =
                    self.outputs[ROLL_ANGLE] - yaw_rate_setpoint_dps * self.roll_sin_angle;
            }
            AngleAxis::Pitch => {
                self.angle_mode_calculate = AngleAxis::Roll;
                self.pitch_sin_angle = sin_pitch_ned(orientation_enu);
                let measurement = match self.angle_mode_strategy {
                    AngleModeStrategy::AngleSpace => {
                        self.pitch_angle_degrees_raw = pitch_degrees_ned(orientation_enu);
                        self.pitch_angle_degrees_raw
                    }
                    AngleModeStrategy::QuaternionSpace => self.pitch_sin_angle,
                };
                self.outputs[PITCH_ANGLE] =
                    self.pids[PITCH_ANGLE].update(measurement, delta_t) * self.max_pitch_rate_dps;
                self.pitch_rate_setpoint_dps =
                    self.outputs[PITCH_ANGLE] + yaw_rate_setpoint_dps * self.pitch_sin_angle;
            }
        }

        self.pids[ROLL_RATE].set_setpoint(self.roll_rate_setpoint_dps);
        self.pids[PITCH_RATE].set_setpoint(self.pitch_rate_setpoint_dps);

        // max(cos(roll), cos(pitch)), both cosines are positive in angle mode
        let roll_sin_angle_2 = self.roll_sin_angle * self.roll_sin_angle;
        let pitch_sin_angle_2 = self.pitch_sin_angle * self.pitch_sin_angle;
        let yaw_rate_setpoint_attenuation = sqrtf(1.0 - roll_sin_angle_2.min(pitch_sin_angle_2));
        self.pids[YAW_RATE].set_setpoint(yaw_rate_setpoint_dps * yaw_rate_setpoint_attenuation);
    }
}
