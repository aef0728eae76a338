// src/attitude.rs

//! Conversions from the AHRS's ENU (East-North-Up) convention to the NED
//! (North-East-Down) convention used by the control law.
//!
//! The body axes in ENU are x right, y forward and z up. NED roll is the
//! rotation about the forward axis, NED pitch the rotation about the right
//! axis (nose up positive), and NED yaw is the negated rotation about up.

use libm::{asinf, atan2f};
use nalgebra::{UnitQuaternion, Vector3};

/// Degrees to radians.
pub const DEGREES_TO_RADIANS: f32 = core::f32::consts::PI / 180.0;

/// Radians to degrees.
pub const RADIANS_TO_DEGREES: f32 = 180.0 / core::f32::consts::PI;

/// NED roll rate in degrees per second.
pub fn roll_rate_ned_dps(gyro_enu_rps: &Vector3<f32>) -> f32 {
    gyro_enu_rps.y * RADIANS_TO_DEGREES
}

/// NED pitch rate in degrees per second.
pub fn pitch_rate_ned_dps(gyro_enu_rps: &Vector3<f32>) -> f32 {
    gyro_enu_rps.x * RADIANS_TO_DEGREES
}

/// NED yaw rate in degrees per second.
pub fn yaw_rate_ned_dps(gyro_enu_rps: &Vector3<f32>) -> f32 {
    -gyro_enu_rps.z * RADIANS_TO_DEGREES
}

/// Sine of the NED roll angle.
pub fn sin_roll_ned(orientation_enu: &UnitQuaternion<f32>) -> f32 {
    let q = orientation_enu.quaternion();
    (2.0 * (q.w * q.j - q.i * q.k)).clamp(-1.0, 1.0)
}

/// Sine of the NED pitch angle.
pub fn sin_pitch_ned(orientation_enu: &UnitQuaternion<f32>) -> f32 {
    let q = orientation_enu.quaternion();
    (2.0 * (q.w * q.i + q.j * q.k)).clamp(-1.0, 1.0)
}

/// NED roll angle in degrees, in `[-90, 90]`.
pub fn roll_degrees_ned(orientation_enu: &UnitQuaternion<f32>) -> f32 {
    asinf(sin_roll_ned(orientation_enu)) * RADIANS_TO_DEGREES
}

/// NED pitch angle in degrees, in `[-180, 180]`.
pub fn pitch_degrees_ned(orientation_enu: &UnitQuaternion<f32>) -> f32 {
    let q = orientation_enu.quaternion();
    atan2f(
        2.0 * (q.w * q.i + q.j * q.k),
        1.0 - 2.0 * (q.i * q.i + q.j * q.j),
    ) * RADIANS_TO_DEGREES
}
