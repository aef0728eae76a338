// src/error.rs

//! Error type for the typed parts of the public API.
//!
//! The control loop itself never fails. Errors only arise where an external
//! caller hands the core raw values (axis indices, mode numbers, filter type
//! codes) or where a command cannot be marshaled onto the control context.

use thiserror::Error;

/// Errors reported to callers outside the control context.
#[derive(Error, Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum ControlError {
    /// The PID index does not name one of the five control axes.
    #[error("invalid PID index {0}")]
    InvalidPidIndex(u8),

    /// The control mode number is not a known control mode.
    #[error("invalid control mode {0}")]
    InvalidControlMode(u8),

    /// The filter type code is not a known filter type.
    #[error("invalid filter type {0}")]
    InvalidFilterType(u8),

    /// The command queue towards the control context is full.
    #[error("command queue is full")]
    CommandQueueFull,
}
