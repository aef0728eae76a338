// src/controller.rs

//! # Multirotor Flight Controller
//!
//! The control-law engine of a multirotor. It owns the PID bank and the
//! D-term filter bank, turns receiver input into setpoints, runs the
//! rate / angle cascade once per control tick, and hands a normalized command
//! bundle to the motor mixer.
//!
//! ## Execution contexts
//!
//! - [`FlightController::update_setpoints`] runs whenever new receiver data
//!   arrives, typically every 5 to 40 ms.
//! - [`FlightController::update_outputs_using_pids`] and
//!   [`FlightController::output_to_motors`] run once per control tick, at
//!   1 to 8 kHz.
//! - Lifecycle transitions (arming, control mode, filters, gains) are rare.
//!   Callers outside the control context marshal them through the
//!   [`command`](crate::command) queue so the control tick never sees a half
//!   applied transition.
//! - Telemetry for other contexts is published into a
//!   [`SharedTelemetry`](crate::SharedTelemetry) cell without locking.

mod lifecycle;
mod outputs;
mod setpoints;

pub use outputs::{FAILSAFE_THRUST, YAW_SPIN_RECOVERY_THRUST};
pub use setpoints::throttle_pid_attenuation;

use crate::interfaces::{Ahrs, Blackbox, MotorMixer, RadioController};
use crate::{
    AngleModeStrategy, ControlError, DTermFilterBank, FiltersConfig, FlightControllerConfig,
    PidAxis, PidError, PidGains,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of PIDs in the bank.
pub const PID_COUNT: usize = 5;

/// Index of a PID in the bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum PidIndex {
    /// Roll rate, degrees per second.
    RollRate = 0,
    /// Pitch rate, degrees per second.
    PitchRate = 1,
    /// Yaw rate, degrees per second.
    YawRate = 2,
    /// Roll angle, degrees or sine of the angle.
    RollAngle = 3,
    /// Pitch angle, degrees or sine of the angle.
    PitchAngle = 4,
}

impl PidIndex {
    /// All indices in bank order.
    pub const ALL: [PidIndex; PID_COUNT] = [
        PidIndex::RollRate,
        PidIndex::PitchRate,
        PidIndex::YawRate,
        PidIndex::RollAngle,
        PidIndex::PitchAngle,
    ];

    /// Name of the PID, also its key in persistent storage.
    pub fn name(self) -> &'static str {
        match self {
            PidIndex::RollRate => "ROLL_RATE",
            PidIndex::PitchRate => "PITCH_RATE",
            PidIndex::YawRate => "YAW_RATE",
            PidIndex::RollAngle => "ROLL_ANGLE",
            PidIndex::PitchAngle => "PITCH_ANGLE",
        }
    }
}

impl TryFrom<u8> for PidIndex {
    type Error = ControlError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        PidIndex::ALL
            .get(usize::from(value))
            .copied()
            .ok_or(ControlError::InvalidPidIndex(value))
    }
}

/// Control mode requested by the pilot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum ControlMode {
    /// Sticks command body rates.
    #[default]
    Rate = 0,
    /// Sticks command roll and pitch angles, the vehicle self-levels.
    Angle = 1,
}

impl TryFrom<u8> for ControlMode {
    type Error = ControlError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ControlMode::Rate),
            1 => Ok(ControlMode::Angle),
            _ => Err(ControlError::InvalidControlMode(value)),
        }
    }
}

/// Which angle angle mode evaluates on the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AngleAxis {
    /// Roll is due next.
    Roll,
    /// Pitch is due next.
    Pitch,
}

/// One receiver input event.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Controls {
    /// Monotonically increasing tick counter.
    pub tick_count: u32,
    /// Throttle stick in `[0, 1]`.
    pub throttle_stick: f32,
    /// Roll stick as a rate, right positive.
    pub roll_stick_dps: f32,
    /// Pitch stick as a rate, forward positive.
    pub pitch_stick_dps: f32,
    /// Yaw stick as a rate, right positive.
    pub yaw_stick_dps: f32,
    /// Roll stick as an angle, right positive.
    pub roll_stick_degrees: f32,
    /// Pitch stick as an angle, forward positive.
    pub pitch_stick_degrees: f32,
    /// Requested control mode.
    pub control_mode: ControlMode,
}

/// Blackbox placeholder for controllers running without a flight recorder.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBlackbox;

impl Blackbox for NoBlackbox {
    fn end_log(&mut self) {}
}

/// Multirotor flight controller.
pub struct FlightController<A, M, R, B = NoBlackbox>
where
    A: Ahrs,
    M: MotorMixer,
    R: RadioController,
    B: Blackbox,
{
    ahrs: A,
    mixer: M,
    radio: R,
    blackbox: Option<B>,

    pids: [PidAxis<f32>; PID_COUNT],
    scale_factors: [PidGains<f32>; PID_COUNT],
    filters: FiltersConfig,
    dterm_filters: DTermFilterBank,
    task_interval_us: u32,

    control_mode: ControlMode,
    angle_mode_strategy: AngleModeStrategy,
    ground_mode: bool,
    use_angle_mode: bool,
    yaw_spin_recovery: bool,
    angle_mode_calculate: AngleAxis,

    take_off_count_start: Option<u32>,
    take_off_throttle_threshold: f32,
    take_off_tick_threshold: u32,

    tpa: f32,
    tpa_breakpoint: f32,
    tpa_multiplier: f32,

    max_roll_rate_dps: f32,
    max_pitch_rate_dps: f32,
    roll_rate_at_max_power_dps: f32,
    pitch_rate_at_max_power_dps: f32,
    yaw_rate_at_max_power_dps: f32,
    yaw_spin_recovered_dps: f32,
    yaw_spin_partially_recovered_dps: f32,

    // receiver derived
    throttle_stick: f32,
    roll_stick_dps: f32,
    pitch_stick_dps: f32,
    yaw_stick_dps: f32,
    roll_stick_degrees: f32,
    pitch_stick_degrees: f32,
    roll_stick_sin_angle: f32,
    pitch_stick_sin_angle: f32,

    // angle mode intermediates
    roll_sin_angle: f32,
    pitch_sin_angle: f32,
    roll_angle_degrees_raw: f32,
    pitch_angle_degrees_raw: f32,
    roll_rate_setpoint_dps: f32,
    pitch_rate_setpoint_dps: f32,

    outputs: [f32; PID_COUNT],
    thrust_output: f32,
    mixer_throttle: f32,
}

impl<A, M, R> FlightController<A, M, R, NoBlackbox>
where
    A: Ahrs,
    M: MotorMixer,
    R: RadioController,
{
    /// Creates a controller without a flight recorder.
    pub fn new(config: FlightControllerConfig, ahrs: A, mixer: M, radio: R) -> Self {
        Self::with_blackbox(config, ahrs, mixer, radio, None)
    }
}

impl<A, M, R, B> FlightController<A, M, R, B>
where
    A: Ahrs,
    M: MotorMixer,
    R: RadioController,
    B: Blackbox,
{
    /// Creates a controller using the provided configuration.
    ///
    /// The controller starts disarmed-safe: in ground mode, rate mode, with
    /// integration switched off on every axis.
    pub fn with_blackbox(
        config: FlightControllerConfig,
        ahrs: A,
        mixer: M,
        radio: R,
        blackbox: Option<B>,
    ) -> Self {
        let pids = core::array::from_fn(|index| {
            let mut pid = PidAxis::with_gains(config.pids[index]);
            pid.switch_integration_off();
            pid
        });
        let mut dterm_filters = DTermFilterBank::new(0.0, config.task_interval_s());
        dterm_filters.configure(&config.filters, config.task_interval_s());

        FlightController {
            ahrs,
            mixer,
            radio,
            blackbox,
            pids,
            scale_factors: config.scale_factors,
            filters: config.filters,
            dterm_filters,
            task_interval_us: config.task_interval_us,
            control_mode: ControlMode::Rate,
            angle_mode_strategy: config.angle_mode_strategy,
            ground_mode: true,
            use_angle_mode: false,
            yaw_spin_recovery: false,
            angle_mode_calculate: AngleAxis::Roll,
            take_off_count_start: None,
            take_off_throttle_threshold: config.take_off_throttle_threshold,
            take_off_tick_threshold: config.take_off_tick_threshold,
            tpa: 1.0,
            tpa_breakpoint: config.tpa_breakpoint,
            tpa_multiplier: config.tpa_multiplier,
            max_roll_rate_dps: config.max_roll_rate_dps,
            max_pitch_rate_dps: config.max_pitch_rate_dps,
            roll_rate_at_max_power_dps: config.roll_rate_at_max_power_dps,
            pitch_rate_at_max_power_dps: config.pitch_rate_at_max_power_dps,
            yaw_rate_at_max_power_dps: config.yaw_rate_at_max_power_dps,
            yaw_spin_recovered_dps: config.yaw_spin_recovered_dps,
            yaw_spin_partially_recovered_dps: config.yaw_spin_partially_recovered_dps,
            throttle_stick: 0.0,
            roll_stick_dps: 0.0,
            pitch_stick_dps: 0.0,
            yaw_stick_dps: 0.0,
            roll_stick_degrees: 0.0,
            pitch_stick_degrees: 0.0,
            roll_stick_sin_angle: 0.0,
            pitch_stick_sin_angle: 0.0,
            roll_sin_angle: 0.0,
            pitch_sin_angle: 0.0,
            roll_angle_degrees_raw: 0.0,
            pitch_angle_degrees_raw: 0.0,
            roll_rate_setpoint_dps: 0.0,
            pitch_rate_setpoint_dps: 0.0,
            outputs: [0.0; PID_COUNT],
            thrust_output: 0.0,
            mixer_throttle: 0.0,
        }
    }

    /// The AHRS collaborator.
    pub fn ahrs(&self) -> &A {
        &self.ahrs
    }

    /// The AHRS collaborator, mutably.
    pub fn ahrs_mut(&mut self) -> &mut A {
        &mut self.ahrs
    }

    /// The motor mixer collaborator.
    pub fn mixer(&self) -> &M {
        &self.mixer
    }

    /// The motor mixer collaborator, mutably.
    pub fn mixer_mut(&mut self) -> &mut M {
        &mut self.mixer
    }

    /// The radio controller collaborator.
    pub fn radio(&self) -> &R {
        &self.radio
    }

    /// The radio controller collaborator, mutably.
    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    /// The flight recorder, if any.
    pub fn blackbox(&self) -> Option<&B> {
        self.blackbox.as_ref()
    }

    /// One PID of the bank.
    pub fn pid(&self, index: PidIndex) -> &PidAxis<f32> {
        &self.pids[index as usize]
    }

    /// Name of a PID, also its key in persistent storage.
    pub fn pid_name(&self, index: PidIndex) -> &'static str {
        index.name()
    }

    /// Gains of a PID.
    pub fn pid_constants(&self, index: PidIndex) -> PidGains<f32> {
        self.pids[index as usize].gains()
    }

    /// Per-term error of a PID's most recent update.
    pub fn pid_error(&self, index: PidIndex) -> PidError<f32> {
        self.pids[index as usize].error()
    }

    /// Setpoint of a PID.
    pub fn pid_setpoint(&self, index: PidIndex) -> f32 {
        self.pids[index as usize].setpoint()
    }

    /// Gains of a PID in the compressed 16 bit representation.
    pub fn pid_msp(&self, index: PidIndex) -> PidGains<u16> {
        self.pids[index as usize]
            .gains()
            .to_msp(&self.scale_factors[index as usize])
    }

    /// Output of a PID from the most recent tick.
    pub fn output(&self, index: PidIndex) -> f32 {
        self.outputs[index as usize]
    }

    /// All PID outputs from the most recent tick.
    pub fn outputs(&self) -> &[f32; PID_COUNT] {
        &self.outputs
    }

    /// Current control mode.
    pub fn control_mode(&self) -> ControlMode {
        self.control_mode
    }

    /// Current angle mode strategy.
    pub fn angle_mode_strategy(&self) -> AngleModeStrategy {
        self.angle_mode_strategy
    }

    /// Whether the vehicle is treated as being on the ground.
    pub fn ground_mode(&self) -> bool {
        self.ground_mode
    }

    /// Whether the angle PIDs feed the rate PIDs.
    pub fn use_angle_mode(&self) -> bool {
        self.use_angle_mode
    }

    /// Whether yaw spin recovery overrides the control law.
    pub fn yaw_spin_recovery(&self) -> bool {
        self.yaw_spin_recovery
    }

    /// Which angle is computed on the next angle mode tick.
    pub fn angle_mode_calculate(&self) -> AngleAxis {
        self.angle_mode_calculate
    }

    /// Tick at which the throttle first exceeded the take-off threshold,
    /// `None` when it is below.
    pub fn take_off_count_start(&self) -> Option<u32> {
        self.take_off_count_start
    }

    /// Throttle PID attenuation factor applied to the D-term.
    pub fn tpa(&self) -> f32 {
        self.tpa
    }

    /// Roll angle in degrees from the most recent angle space roll tick.
    pub fn roll_angle_degrees_raw(&self) -> f32 {
        self.roll_angle_degrees_raw
    }

    /// Pitch angle in degrees from the most recent angle space pitch tick.
    pub fn pitch_angle_degrees_raw(&self) -> f32 {
        self.pitch_angle_degrees_raw
    }

    /// Thrust passed to the mixer when not in failsafe.
    pub fn thrust_output(&self) -> f32 {
        self.thrust_output
    }

    /// Thrust most recently passed to the mixer.
    pub fn mixer_throttle(&self) -> f32 {
        self.mixer_throttle
    }

    /// Current D-term filter configuration.
    pub fn filters(&self) -> FiltersConfig {
        self.filters
    }

    /// The D-term filter bank.
    pub fn dterm_filters(&self) -> &DTermFilterBank {
        &self.dterm_filters
    }

    /// Whether the motors are on.
    pub fn motors_is_on(&self) -> bool {
        self.mixer.motors_is_on()
    }

    /// Arming flags are not implemented, every flag reads as set.
    pub fn is_arming_flag_set(&self, _arming_flag: u8) -> bool {
        true
    }

    /// Flight mode flags are not implemented, every flag reads as set.
    pub fn is_flight_mode_flag_set(&self, _flight_mode_flag: u8) -> bool {
        true
    }

    /// RC modes are not implemented, every mode reads as active.
    pub fn is_rc_mode_active(&self, _rc_mode: u8) -> bool {
        true
    }

    /// Output stage timing is not measured, always zero.
    pub fn output_power_time_us(&self) -> u32 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn test_pid_index_try_from() {
        assert_eq!(Ok(PidIndex::RollRate), PidIndex::try_from(0));
        assert_eq!(Ok(PidIndex::PitchAngle), PidIndex::try_from(4));
        assert_eq!(Err(ControlError::InvalidPidIndex(5)), PidIndex::try_from(5));
    }

    #[test]
    fn test_pid_names() {
        let names = PidIndex::ALL.map(PidIndex::name);
        assert_eq!(
            ["ROLL_RATE", "PITCH_RATE", "YAW_RATE", "ROLL_ANGLE", "PITCH_ANGLE"],
            names
        );
    }

    #[test]
    fn test_control_mode_try_from() {
        assert_eq!(Ok(ControlMode::Angle), ControlMode::try_from(1));
        assert_eq!(
            Err(ControlError::InvalidControlMode(2)),
            ControlMode::try_from(2)
        );
    }

    /// A new controller starts on the ground with integration off.
    #[test]
    fn test_new_controller_state() {
        let fc = test_flight_controller();
        assert!(fc.ground_mode());
        assert!(!fc.use_angle_mode());
        assert!(!fc.yaw_spin_recovery());
        assert!(!fc.motors_is_on());
        assert_eq!(ControlMode::Rate, fc.control_mode());
        assert_eq!(AngleAxis::Roll, fc.angle_mode_calculate());
        for index in PidIndex::ALL {
            assert!(!fc.pid(index).integration_enabled());
            assert_eq!(
                FlightControllerConfig::new().pids[index as usize],
                fc.pid_constants(index)
            );
        }
        assert!(value_close(1.0, fc.tpa()));
        assert!(!fc.dterm_filters().roll.is_passthrough());
    }

    #[test]
    fn test_pid_msp_uses_scale_factors() {
        let fc = test_flight_controller();
        assert_eq!(80, fc.pid_msp(PidIndex::RollRate).kp);
        assert_eq!(100, fc.pid_msp(PidIndex::RollAngle).kp);
    }

    /// Unimplemented flag queries are permissive.
    #[test]
    fn test_stubbed_extension_points() {
        let fc = test_flight_controller();
        assert!(fc.is_arming_flag_set(3));
        assert!(fc.is_flight_mode_flag_set(1));
        assert!(fc.is_rc_mode_active(0));
        assert_eq!(0, fc.output_power_time_us());
    }
}
