// src/pid/axis.rs

//! # Axis PID Control Module
//!
//! This module provides a compute function, control data structure and the
//! per-axis controller wrapped around a `piddiy` PID. Each axis runs a PIDFS
//! law:
//!
//! - `P = kp * error`
//! - `I = ki * ∫error`, accumulated only while integration is switched on
//! - `D = -kd * Δmeasurement / dt`, derivative on measurement, with the delta
//!   optionally supplied (already filtered and attenuated) by the caller
//! - `F = kf * setpoint`, feed-forward
//! - `S = ks * Δsetpoint / dt`, setpoint slew
//!
//! No clamping or saturation happens here; that is the motor mixer's job.

use crate::Number;
use num_traits::{FromPrimitive, ToPrimitive};
use piddiy::PidController;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Control data for the axis PID compute callback.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AxisControlData<T> {
    /// The current measurement of the controlled quantity.
    pub measurement: T,
    /// Change of the measurement since the previous update.
    pub measurement_delta: T,
    /// The time delta since the last computation.
    pub dt: T,
    /// Whether the integral term may accumulate on this update.
    pub integrate: bool,
}

/// Axis PID compute callback.
///
/// Returns `(error, integral, derivative)`. A frozen integrator keeps its
/// previous value. A zero `dt` yields a zero derivative.
pub fn compute_axis<T: Number>(
    pid: &mut PidController<T, AxisControlData<T>>,
    data: AxisControlData<T>,
) -> (T, T, T) {
    let error = pid.set_point - data.measurement;
    let integral = if data.integrate {
        pid.integral + error * data.dt
    } else {
        pid.integral
    };
    let derivative = if data.dt == T::zero() {
        T::zero()
    } else {
        -data.measurement_delta / data.dt
    };

    (error, integral, derivative)
}

/// Gain set of one PID axis.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PidGains<T> {
    /// Proportional gain.
    pub kp: T,
    /// Integral gain.
    pub ki: T,
    /// Derivative gain.
    pub kd: T,
    /// Feed-forward gain.
    pub kf: T,
    /// Setpoint slew gain.
    pub ks: T,
}

impl<T: Number + ToPrimitive> PidGains<T> {
    /// Compresses the gains into the 16 bit representation used by external
    /// tools, dividing each gain by its scale factor and rounding to the
    /// nearest integer. Values outside the `u16` range saturate.
    pub fn to_msp(&self, scale: &PidGains<T>) -> PidGains<u16> {
        PidGains {
            kp: gain_to_msp(self.kp, scale.kp),
            ki: gain_to_msp(self.ki, scale.ki),
            kd: gain_to_msp(self.kd, scale.kd),
            kf: gain_to_msp(self.kf, scale.kf),
            ks: gain_to_msp(self.ks, scale.ks),
        }
    }
}

fn gain_to_msp<T: Number + ToPrimitive>(gain: T, scale: T) -> u16 {
    if scale == T::zero() {
        return 0;
    }
    let half = T::one() / (T::one() + T::one());
    let value = gain / scale + half;
    match value.to_u16() {
        Some(value) => value,
        None if value > T::zero() => u16::MAX,
        None => 0,
    }
}

/// Expands a 16 bit external gain value using its scale factor.
pub fn gain_from_msp<T: Number + FromPrimitive>(value: u16, scale: T) -> T {
    T::from_u16(value).map_or(T::zero(), |value| value * scale)
}

/// Individual contributions of each term to the most recent PID output.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PidError<T> {
    /// Proportional contribution.
    pub p: T,
    /// Integral contribution.
    pub i: T,
    /// Derivative contribution.
    pub d: T,
    /// Feed-forward contribution.
    pub f: T,
    /// Setpoint slew contribution.
    pub s: T,
}

/// One axis of the PID bank.
pub struct PidAxis<T: Number> {
    pid: PidController<T, AxisControlData<T>>,
    gains: PidGains<T>,
    previous_measurement: T,
    previous_setpoint: T,
    integration_enabled: bool,
    error: PidError<T>,
}

impl<T: Number> PidAxis<T> {
    /// Creates a new axis controller with the given gains.
    /// Integration starts switched on.
    pub fn with_gains(gains: PidGains<T>) -> Self {
        let mut pid = PidController::new();
        pid.compute_fn(compute_axis).set_point(T::zero());

        let mut axis = PidAxis {
            pid,
            gains,
            previous_measurement: T::zero(),
            previous_setpoint: T::zero(),
            integration_enabled: true,
            error: PidError {
                p: T::zero(),
                i: T::zero(),
                d: T::zero(),
                f: T::zero(),
                s: T::zero(),
            },
        };
        axis.set_gains(gains);
        axis
    }

    /// Creates a new axis controller with unit proportional gain and all
    /// other gains zero.
    pub fn new() -> Self {
        Self::with_gains(PidGains {
            kp: T::one(),
            ki: T::zero(),
            kd: T::zero(),
            kf: T::zero(),
            ks: T::zero(),
        })
    }

    /// Replaces the gain set.
    pub fn set_gains(&mut self, gains: PidGains<T>) {
        self.gains = gains;
        self.pid.kp(gains.kp).ki(gains.ki).kd(gains.kd);
    }

    /// Current gain set.
    pub fn gains(&self) -> PidGains<T> {
        self.gains
    }

    /// Sets the proportional gain.
    pub fn set_p(&mut self, kp: T) {
        self.set_gains(PidGains { kp, ..self.gains });
    }

    /// Sets the integral gain.
    pub fn set_i(&mut self, ki: T) {
        self.set_gains(PidGains { ki, ..self.gains });
    }

    /// Sets the derivative gain.
    pub fn set_d(&mut self, kd: T) {
        self.set_gains(PidGains { kd, ..self.gains });
    }

    /// Sets the feed-forward gain.
    pub fn set_f(&mut self, kf: T) {
        self.set_gains(PidGains { kf, ..self.gains });
    }

    /// Sets the setpoint slew gain.
    pub fn set_s(&mut self, ks: T) {
        self.set_gains(PidGains { ks, ..self.gains });
    }

    /// Sets the setpoint used from the next update onwards.
    pub fn set_setpoint(&mut self, set_point: T) {
        self.pid.set_point(set_point);
    }

    /// Current setpoint.
    pub fn setpoint(&self) -> T {
        self.pid.set_point
    }

    /// Measurement passed to the most recent update.
    pub fn previous_measurement(&self) -> T {
        self.previous_measurement
    }

    /// Clears the integrator. Does not change whether integration is on.
    pub fn reset_integral(&mut self) {
        self.pid.reset_integral();
        self.error.i = T::zero();
    }

    /// Clears the integrator and the update history, taking `measurement` as
    /// the previous measurement and the current setpoint as the previous
    /// setpoint. The next update then has no derivative or slew kick.
    pub fn reset(&mut self, measurement: T) {
        self.reset_integral();
        self.previous_measurement = measurement;
        self.previous_setpoint = self.pid.set_point;
        self.error = PidError {
            p: T::zero(),
            i: T::zero(),
            d: T::zero(),
            f: T::zero(),
            s: T::zero(),
        };
    }

    /// Current integrator value (before the integral gain is applied).
    pub fn integral(&self) -> T {
        self.pid.integral
    }

    /// Switches integration on or off. Switching off freezes the integrator.
    pub fn enable_integration(&mut self, enabled: bool) {
        self.integration_enabled = enabled;
    }

    /// Switches integration on.
    pub fn switch_integration_on(&mut self) {
        self.enable_integration(true);
    }

    /// Switches integration off, freezing the integrator.
    pub fn switch_integration_off(&mut self) {
        self.enable_integration(false);
    }

    /// Whether the integrator accumulates on update.
    pub fn integration_enabled(&self) -> bool {
        self.integration_enabled
    }

    /// Per-term contributions to the most recent output.
    pub fn error(&self) -> PidError<T> {
        self.error
    }

    /// Runs one update, deriving the measurement delta from the previous
    /// measurement.
    pub fn update(&mut self, measurement: T, dt: T) -> T {
        let measurement_delta = measurement - self.previous_measurement;
        self.update_delta(measurement, measurement_delta, dt)
    }

    /// Runs one update with an externally supplied measurement delta, so the
    /// derivative can be filtered and attenuated before it is combined.
    pub fn update_delta(&mut self, measurement: T, measurement_delta: T, dt: T) -> T {
        let data = AxisControlData {
            measurement,
            measurement_delta,
            dt,
            integrate: self.integration_enabled,
        };
        let pid_output = self.pid.compute(data);

        let set_point = self.pid.set_point;
        let p = self.gains.kp * self.pid.error;
        let i = self.gains.ki * self.pid.integral;
        let f = self.gains.kf * set_point;
        let s = if dt == T::zero() {
            T::zero()
        } else {
            self.gains.ks * (set_point - self.previous_setpoint) / dt
        };
        self.error = PidError {
            p,
            i,
            d: pid_output - p - i,
            f,
            s,
        };

        self.previous_measurement = measurement;
        self.previous_setpoint = set_point;

        pid_output + f + s
    }
}

impl<T: Number> Default for PidAxis<T> {
    fn default() -> Self {
        Self::new()
    }
}
