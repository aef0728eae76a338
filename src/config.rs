// src/config.rs

//! Flight controller configuration.
//!
//! Default values are a reasonable starting point for a 5 inch quadcopter.
//! They should be replaced by values tuned for the hardware.

use crate::{FiltersConfig, PidGains, PID_COUNT};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Strategy used by angle mode to turn the orientation into a rate setpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AngleModeStrategy {
    /// Run the angle PIDs on roll and pitch angles in degrees.
    #[default]
    AngleSpace,
    /// Run the angle PIDs on the sines of the roll and pitch angles,
    /// avoiding the inverse trigonometric functions.
    QuaternionSpace,
}

/// Configuration for the flight controller.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FlightControllerConfig {
    /// Control task interval in microseconds, used for the D-term filter
    /// sample interval.
    pub task_interval_us: u32,
    /// Initial gains, indexed by [`PidIndex`](crate::PidIndex).
    pub pids: [PidGains<f32>; PID_COUNT],
    /// Scale factors of the compressed 16 bit gain representation, indexed
    /// by [`PidIndex`](crate::PidIndex).
    pub scale_factors: [PidGains<f32>; PID_COUNT],
    /// D-term filter configuration.
    pub filters: FiltersConfig,
    /// Throttle above which the D-term is attenuated.
    pub tpa_breakpoint: f32,
    /// Attenuation per unit of throttle above the breakpoint.
    pub tpa_multiplier: f32,
    /// Throttle that must be exceeded to leave ground mode.
    pub take_off_throttle_threshold: f32,
    /// Number of ticks the take-off throttle must be held to leave ground mode.
    pub take_off_tick_threshold: u32,
    /// Roll rate commanded by the roll angle PID at full output.
    pub max_roll_rate_dps: f32,
    /// Pitch rate commanded by the pitch angle PID at full output.
    pub max_pitch_rate_dps: f32,
    /// Roll rate output that maps to a full scale roll command.
    pub roll_rate_at_max_power_dps: f32,
    /// Pitch rate output that maps to a full scale pitch command.
    pub pitch_rate_at_max_power_dps: f32,
    /// Yaw rate output that maps to a full scale yaw command.
    pub yaw_rate_at_max_power_dps: f32,
    /// Yaw rate below which yaw spin recovery ends.
    pub yaw_spin_recovered_dps: f32,
    /// Yaw rate below which roll and pitch recovery starts.
    pub yaw_spin_partially_recovered_dps: f32,
    /// Angle mode evaluation strategy.
    pub angle_mode_strategy: AngleModeStrategy,
}

const DEFAULT_PIDS: [PidGains<f32>; PID_COUNT] = [
    // roll rate
    PidGains {
        kp: 0.8,
        ki: 0.5,
        kd: 0.012,
        kf: 0.0,
        ks: 0.0,
    },
    // pitch rate
    PidGains {
        kp: 0.8,
        ki: 0.5,
        kd: 0.012,
        kf: 0.0,
        ks: 0.0,
    },
    // yaw rate, no derivative
    PidGains {
        kp: 1.2,
        ki: 0.8,
        kd: 0.0,
        kf: 0.0,
        ks: 0.0,
    },
    // roll angle
    PidGains {
        kp: 0.02,
        ki: 0.0,
        kd: 0.0,
        kf: 0.0,
        ks: 0.0,
    },
    // pitch angle
    PidGains {
        kp: 0.02,
        ki: 0.0,
        kd: 0.0,
        kf: 0.0,
        ks: 0.0,
    },
];

const RATE_SCALE_FACTORS: PidGains<f32> = PidGains {
    kp: 0.01,
    ki: 0.01,
    kd: 0.0002,
    kf: 0.01,
    ks: 0.01,
};

const ANGLE_SCALE_FACTORS: PidGains<f32> = PidGains {
    kp: 0.0002,
    ki: 0.0002,
    kd: 0.0002,
    kf: 0.0002,
    ks: 0.0002,
};

impl FlightControllerConfig {
    /// Creates a configuration with default values for all parameters.
    ///
    /// Example Usage
    /// ```
    /// use multirotor_flight_core::{AngleModeStrategy, FlightControllerConfig, PidIndex};
    ///
    /// let mut config = FlightControllerConfig::new();
    ///
    /// // 4 kHz control loop
    /// config.task_interval_us = 250;
    ///
    /// // Softer roll response
    /// config.pids[PidIndex::RollRate as usize].kp = 0.6;
    ///
    /// // Cheaper angle mode
    /// config.angle_mode_strategy = AngleModeStrategy::QuaternionSpace;
    /// config.pids[PidIndex::RollAngle as usize].kp = 1.2;
    /// config.pids[PidIndex::PitchAngle as usize].kp = 1.2;
    /// ```
    pub fn new() -> Self {
        Self {
            task_interval_us: 1000,
            pids: DEFAULT_PIDS,
            scale_factors: [
                RATE_SCALE_FACTORS,
                RATE_SCALE_FACTORS,
                RATE_SCALE_FACTORS,
                ANGLE_SCALE_FACTORS,
                ANGLE_SCALE_FACTORS,
            ],
            filters: FiltersConfig::new(),
            tpa_breakpoint: 0.6,
            tpa_multiplier: 0.75,
            take_off_throttle_threshold: 0.2,
            take_off_tick_threshold: 1000,
            max_roll_rate_dps: 500.0,
            max_pitch_rate_dps: 500.0,
            roll_rate_at_max_power_dps: 1000.0,
            pitch_rate_at_max_power_dps: 1000.0,
            yaw_rate_at_max_power_dps: 1000.0,
            yaw_spin_recovered_dps: 400.0,
            yaw_spin_partially_recovered_dps: 600.0,
            angle_mode_strategy: AngleModeStrategy::AngleSpace,
        }
    }

    /// Control task interval in seconds.
    pub fn task_interval_s(&self) -> f32 {
        self.task_interval_us as f32 * 0.000_001
    }
}

impl Default for FlightControllerConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use crate::PidIndex;

    #[test]
    fn test_config_defaults() {
        let config = FlightControllerConfig::default();
        assert!(value_close(0.001, config.task_interval_s()));
        assert!(value_close(
            0.0,
            config.pids[PidIndex::YawRate as usize].kd
        ));
        assert!(config.yaw_spin_recovered_dps < config.yaw_spin_partially_recovered_dps);
        assert_eq!(AngleModeStrategy::AngleSpace, config.angle_mode_strategy);
    }
}
