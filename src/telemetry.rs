// src/telemetry.rs

//! # Telemetry Snapshot
//!
//! The control context publishes a telemetry snapshot once per tick. Other
//! contexts (backchannel, screen, logging) read it without locking and
//! without ever stalling the control tick.
//!
//! Every field is an individual relaxed atomic. A reader always sees each
//! field's value from some completed tick, but fields of one snapshot may
//! come from different ticks. Telemetry tolerates that; nothing that steers
//! the vehicle may be read from here.

use crate::interfaces::{Ahrs, Blackbox, MotorMixer, RadioController};
use crate::{FlightController, PidError, PidIndex, PID_COUNT};
use core::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of motors reported in telemetry.
pub const TELEMETRY_MOTOR_COUNT: usize = 4;

/// Telemetry of one motor.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MotorTelemetry {
    /// Output power in `[0, 1]`.
    pub power: f32,
    /// Measured RPM, zero when not available.
    pub rpm: i32,
}

/// Telemetry snapshot of the flight controller.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TelemetryData {
    /// Whether the motors were on.
    pub motors_on: bool,
    /// Per-motor power and RPM.
    pub motors: [MotorTelemetry; TELEMETRY_MOTOR_COUNT],
    /// Per-term PID errors, indexed by [`PidIndex`]. All zero while the
    /// motors are off.
    pub pid_errors: [PidError<f32>; PID_COUNT],
}

/// `f32` stored in an [`AtomicU32`] with relaxed ordering.
#[derive(Debug)]
pub struct RelaxedF32(AtomicU32);

impl RelaxedF32 {
    /// A cell holding `0.0`.
    pub const fn zero() -> Self {
        // 0.0f32 has an all zero bit pattern
        Self(AtomicU32::new(0))
    }

    /// Stores a value.
    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    /// Loads the value.
    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }
}

#[derive(Debug)]
struct SharedMotor {
    power: RelaxedF32,
    rpm: AtomicI32,
}

impl SharedMotor {
    const fn new() -> Self {
        Self {
            power: RelaxedF32::zero(),
            rpm: AtomicI32::new(0),
        }
    }
}

#[derive(Debug)]
struct SharedPidError {
    p: RelaxedF32,
    i: RelaxedF32,
    d: RelaxedF32,
    f: RelaxedF32,
    s: RelaxedF32,
}

impl SharedPidError {
    const fn new() -> Self {
        Self {
            p: RelaxedF32::zero(),
            i: RelaxedF32::zero(),
            d: RelaxedF32::zero(),
            f: RelaxedF32::zero(),
            s: RelaxedF32::zero(),
        }
    }

    fn store(&self, error: &PidError<f32>) {
        self.p.store(error.p);
        self.i.store(error.i);
        self.d.store(error.d);
        self.f.store(error.f);
        self.s.store(error.s);
    }

    fn load(&self) -> PidError<f32> {
        PidError {
            p: self.p.load(),
            i: self.i.load(),
            d: self.d.load(),
            f: self.f.load(),
            s: self.s.load(),
        }
    }
}

/// Lock-free telemetry cell shared between the control context and readers.
///
/// Can be placed in a `static`:
///
/// ```
/// use multirotor_flight_core::SharedTelemetry;
///
/// static TELEMETRY: SharedTelemetry = SharedTelemetry::new();
///
/// let snapshot = TELEMETRY.snapshot();
/// assert!(!snapshot.motors_on);
/// ```
#[derive(Debug)]
pub struct SharedTelemetry {
    motors_on: AtomicBool,
    motors: [SharedMotor; TELEMETRY_MOTOR_COUNT],
    pid_errors: [SharedPidError; PID_COUNT],
}

impl SharedTelemetry {
    /// Creates a cell holding an all zero snapshot with the motors off.
    pub const fn new() -> Self {
        Self {
            motors_on: AtomicBool::new(false),
            motors: [
                SharedMotor::new(),
                SharedMotor::new(),
                SharedMotor::new(),
                SharedMotor::new(),
            ],
            pid_errors: [
                SharedPidError::new(),
                SharedPidError::new(),
                SharedPidError::new(),
                SharedPidError::new(),
                SharedPidError::new(),
            ],
        }
    }

    /// Publishes a snapshot. Only the control context publishes.
    pub fn publish(&self, data: &TelemetryData) {
        for (shared, motor) in self.motors.iter().zip(data.motors.iter()) {
            shared.power.store(motor.power);
            shared.rpm.store(motor.rpm, Ordering::Relaxed);
        }
        for (shared, error) in self.pid_errors.iter().zip(data.pid_errors.iter()) {
            shared.store(error);
        }
        self.motors_on.store(data.motors_on, Ordering::Relaxed);
    }

    /// Reads the latest snapshot.
    ///
    /// PID errors read as zero whenever the motors read as off, whatever
    /// tick the individual error fields come from.
    pub fn snapshot(&self) -> TelemetryData {
        let motors_on = self.motors_on.load(Ordering::Relaxed);
        let motors = core::array::from_fn(|index| MotorTelemetry {
            power: self.motors[index].power.load(),
            rpm: self.motors[index].rpm.load(Ordering::Relaxed),
        });
        let pid_errors = if motors_on {
            core::array::from_fn(|index| self.pid_errors[index].load())
        } else {
            [PidError::default(); PID_COUNT]
        };

        TelemetryData {
            motors_on,
            motors,
            pid_errors,
        }
    }
}

impl Default for SharedTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl<A, M, R, B> FlightController<A, M, R, B>
where
    A: Ahrs,
    M: MotorMixer,
    R: RadioController,
    B: Blackbox,
{
    /// Current telemetry. PID errors are zero while the motors are off.
    pub fn telemetry_data(&self) -> TelemetryData {
        let motors_on = self.mixer().motors_is_on();
        let motor_count = self.mixer().motor_count().min(TELEMETRY_MOTOR_COUNT);
        let motors = core::array::from_fn(|index| {
            if index < motor_count {
                MotorTelemetry {
                    power: self.mixer().motor_output(index),
                    rpm: self.mixer().motor_rpm(index),
                }
            } else {
                MotorTelemetry::default()
            }
        });
        let pid_errors = if motors_on {
            PidIndex::ALL.map(|index| self.pid_error(index))
        } else {
            [PidError::default(); PID_COUNT]
        };

        TelemetryData {
            motors_on,
            motors,
            pid_errors,
        }
    }

    /// Publishes the current telemetry into a shared cell.
    pub fn publish_telemetry(&self, telemetry: &SharedTelemetry) {
        telemetry.publish(&self.telemetry_data());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use nalgebra::Vector3;

    #[test]
    fn test_relaxed_f32() {
        let cell = RelaxedF32::zero();
        assert_eq!(0.0, cell.load());
        cell.store(-12.5);
        assert_eq!(-12.5, cell.load());
    }

    /// Disarmed telemetry carries no PID errors.
    #[test]
    fn test_telemetry_zeroed_when_motors_off() {
        let mut fc = airborne_flight_controller();
        fc.ahrs_mut().data.gyro_rps = Vector3::new(0.5, 0.5, 0.5);
        fc.update_outputs_using_pids(0.001);
        assert!(fc.telemetry_data().pid_errors[0].p != 0.0);

        fc.motors_switch_off();
        let data = fc.telemetry_data();
        assert!(!data.motors_on);
        assert_eq!([PidError::default(); PID_COUNT], data.pid_errors);
    }

    /// Motor power and RPM come from the mixer.
    #[test]
    fn test_telemetry_motors() {
        let mut fc = airborne_flight_controller();
        fc.mixer_mut().outputs = [0.1, 0.2, 0.3, 0.4];
        fc.mixer_mut().rpms = [1000, 2000, 3000, 4000];
        let data = fc.telemetry_data();
        assert!(data.motors_on);
        assert_eq!(
            MotorTelemetry {
                power: 0.3,
                rpm: 3000
            },
            data.motors[2]
        );
    }

    /// Published data reads back from the shared cell.
    #[test]
    fn test_publish_and_snapshot() {
        let telemetry = SharedTelemetry::new();
        let mut fc = airborne_flight_controller();
        fc.ahrs_mut().data.gyro_rps = Vector3::new(0.5, -0.5, 0.5);
        fc.update_outputs_using_pids(0.001);
        fc.publish_telemetry(&telemetry);

        assert_eq!(fc.telemetry_data(), telemetry.snapshot());
    }

    /// A snapshot reading the motors off never reports stale errors.
    #[test]
    fn test_snapshot_zeroes_errors_when_motors_off() {
        let telemetry = SharedTelemetry::new();
        let mut data = TelemetryData {
            motors_on: true,
            ..TelemetryData::default()
        };
        data.pid_errors[PidIndex::YawRate as usize].p = 3.0;
        telemetry.publish(&data);
        assert!(value_close(
            3.0,
            telemetry.snapshot().pid_errors[PidIndex::YawRate as usize].p
        ));

        telemetry.motors_on.store(false, Ordering::Relaxed);
        assert_eq!(
            [PidError::default(); PID_COUNT],
            telemetry.snapshot().pid_errors
        );
    }

    /// Readers on other threads see whole field values while the control
    /// context publishes.
    #[test]
    fn test_concurrent_snapshot() {
        use std::sync::Arc;

        let telemetry = Arc::new(SharedTelemetry::new());
        let writer = {
            let telemetry = Arc::clone(&telemetry);
            std::thread::spawn(move || {
                for k in 1..=1000 {
                    let mut data = TelemetryData {
                        motors_on: true,
                        ..TelemetryData::default()
                    };
                    data.motors[0].power = k as f32;
                    telemetry.publish(&data);
                }
            })
        };
        for _ in 0..1000 {
            let power = telemetry.snapshot().motors[0].power;
            assert!(power == libm::truncf(power) && (0.0..=1000.0).contains(&power));
        }
        assert!(writer.join().is_ok());
        assert_eq!(1000.0, telemetry.snapshot().motors[0].power);
    }
}
