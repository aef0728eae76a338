// src/pid.rs

//! # PID Control Module
//!
//! This module provides the compute function, control data and per-axis
//! controller used by every axis of the flight controller's PID bank.

pub mod axis;
pub use axis::*;
