// src/filter.rs

//! # D-Term Filter Bank
//!
//! Single-pole (PT1) low-pass filters smoothing the derivative input of the
//! roll and pitch rate PIDs. The derivative of a noisy gyro signal is itself
//! very noisy, so it is filtered before it reaches the PID.
//!
//! Every reconfiguration resets the filter memory. A cutoff of zero selects
//! passthrough, in which case the filter returns its input unchanged.

use crate::ControlError;
use core::f32::consts::PI;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Cutoff used for the D-term filters until a filter configuration arrives.
pub const DEFAULT_DTERM_CUTOFF_HZ: u16 = 100;

/// Low-pass filter type requested for the D-term.
///
/// All low-pass types are currently realised as a PT1 filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum FilterType {
    /// First order low-pass.
    Pt1 = 0,
    /// Second order low-pass.
    Pt2 = 1,
    /// Third order low-pass.
    Pt3 = 2,
    /// Biquad low-pass.
    Biquad = 3,
}

impl TryFrom<u8> for FilterType {
    type Error = ControlError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(FilterType::Pt1),
            1 => Ok(FilterType::Pt2),
            2 => Ok(FilterType::Pt3),
            3 => Ok(FilterType::Biquad),
            _ => Err(ControlError::InvalidFilterType(value)),
        }
    }
}

/// D-term filter configuration as delivered by external configuration.
///
/// The type is kept as its raw code so that an unknown code can be mapped to
/// passthrough instead of being rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FiltersConfig {
    /// Raw [`FilterType`] code of the first D-term low-pass filter.
    pub dterm_lpf1_type: u8,
    /// Cutoff frequency of the first D-term low-pass filter, zero for passthrough.
    pub dterm_lpf1_hz: u16,
}

impl FiltersConfig {
    /// PT1 filter at the default cutoff.
    pub fn new() -> Self {
        Self {
            dterm_lpf1_type: FilterType::Pt1 as u8,
            dterm_lpf1_hz: DEFAULT_DTERM_CUTOFF_HZ,
        }
    }
}

impl Default for FiltersConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Single-pole low-pass filter with a passthrough mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pt1Filter {
    cutoff_hz: f32,
    k: f32,
    state: f32,
    passthrough: bool,
}

impl Pt1Filter {
    /// Creates a passthrough filter.
    pub fn new() -> Self {
        Self {
            cutoff_hz: 0.0,
            k: 1.0,
            state: 0.0,
            passthrough: true,
        }
    }

    /// Creates a low-pass filter for the given cutoff and sample interval.
    pub fn with_cutoff(cutoff_hz: f32, sample_interval_s: f32) -> Self {
        let mut filter = Self::new();
        filter.configure(cutoff_hz, sample_interval_s);
        filter
    }

    /// Reconfigures the filter and resets its memory.
    ///
    /// A non-positive cutoff or sample interval selects passthrough.
    pub fn configure(&mut self, cutoff_hz: f32, sample_interval_s: f32) {
        self.reset();
        if cutoff_hz <= 0.0 || sample_interval_s <= 0.0 {
            self.set_to_passthrough();
            return;
        }
        // k = dt / (RC + dt), RC = 1 / (2 * pi * fc)
        let rc = 1.0 / (2.0 * PI * cutoff_hz);
        self.cutoff_hz = cutoff_hz;
        self.k = sample_interval_s / (rc + sample_interval_s);
        self.passthrough = false;
    }

    /// Switches the filter to passthrough and clears its memory.
    pub fn set_to_passthrough(&mut self) {
        self.cutoff_hz = 0.0;
        self.k = 1.0;
        self.state = 0.0;
        self.passthrough = true;
    }

    /// Clears the filter memory, keeping the coefficients.
    pub fn reset(&mut self) {
        self.state = 0.0;
    }

    /// Filters one sample.
    pub fn filter(&mut self, input: f32) -> f32 {
        if self.passthrough {
            return input;
        }
        self.state += self.k * (input - self.state);
        self.state
    }

    /// Whether the filter passes its input through unchanged.
    pub fn is_passthrough(&self) -> bool {
        self.passthrough
    }

    /// Configured cutoff, zero in passthrough.
    pub fn cutoff_hz(&self) -> f32 {
        self.cutoff_hz
    }

    /// Filter gain, one in passthrough.
    pub fn gain(&self) -> f32 {
        self.k
    }
}

impl Default for Pt1Filter {
    fn default() -> Self {
        Self::new()
    }
}

/// D-term filters for the roll and pitch rate axes.
///
/// Yaw has no derivative term and therefore no filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DTermFilterBank {
    /// Roll rate D-term filter.
    pub roll: Pt1Filter,
    /// Pitch rate D-term filter.
    pub pitch: Pt1Filter,
}

impl DTermFilterBank {
    /// Creates the bank with both filters at `cutoff_hz`.
    pub fn new(cutoff_hz: f32, sample_interval_s: f32) -> Self {
        Self {
            roll: Pt1Filter::with_cutoff(cutoff_hz, sample_interval_s),
            pitch: Pt1Filter::with_cutoff(cutoff_hz, sample_interval_s),
        }
    }

    /// Applies a filter configuration to both filters.
    ///
    /// Unknown filter types fall back to passthrough so the loop never runs
    /// with stale coefficients.
    pub fn configure(&mut self, filters: &FiltersConfig, sample_interval_s: f32) {
        if filters.dterm_lpf1_hz == 0 {
            self.set_to_passthrough();
            return;
        }
        match FilterType::try_from(filters.dterm_lpf1_type) {
            Ok(_) => {
                let cutoff_hz = f32::from(filters.dterm_lpf1_hz);
                self.roll.configure(cutoff_hz, sample_interval_s);
                self.pitch.configure(cutoff_hz, sample_interval_s);
            }
            Err(_err) => {
                warn!("unknown D-term filter type {}, using passthrough", filters.dterm_lpf1_type);
                self.set_to_passthrough();
            }
        }
    }

    /// Switches both filters to passthrough.
    pub fn set_to_passthrough(&mut self) {
        self.roll.set_to_passthrough();
        self.pitch.set_to_passthrough();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    /// A zero cutoff gives an identity filter with no latency.
    #[test]
    fn test_pt1_zero_cutoff_is_identity() {
        let mut filter = Pt1Filter::with_cutoff(0.0, 0.001);
        assert!(filter.is_passthrough());
        for x in [0.0, 1.0, -3.5, 1.0e6, -1.0e-7, f32::MAX, f32::MIN_POSITIVE] {
            assert_eq!(x, filter.filter(x));
        }
    }

    /// Test the filter converges on a step and lags behind it.
    #[test]
    fn test_pt1_step_response() {
        let mut filter = Pt1Filter::with_cutoff(100.0, 0.001);
        assert!(!filter.is_passthrough());
        let first = filter.filter(1.0);
        assert!(0.0 < first && first < 1.0, "First sample should lag.");
        assert!(value_close(filter.gain(), first));

        let mut output = first;
        for _ in 0..200 {
            output = filter.filter(1.0);
        }
        assert!(value_close(1.0, output), "Filter should converge on the step.");
    }

    /// Test the gain follows k = dt / (RC + dt).
    #[test]
    fn test_pt1_gain() {
        let filter = Pt1Filter::with_cutoff(100.0, 0.001);
        let rc = 1.0 / (2.0 * PI * 100.0);
        assert!(value_close(0.001 / (rc + 0.001), filter.gain()));
        assert!(value_close(100.0, filter.cutoff_hz()));
    }

    /// Reconfiguration always clears the filter memory.
    #[test]
    fn test_pt1_reconfigure_resets_state() {
        let mut filter = Pt1Filter::with_cutoff(50.0, 0.001);
        for _ in 0..100 {
            let _ = filter.filter(10.0);
        }
        filter.configure(50.0, 0.001);
        let first = filter.filter(0.0);
        assert!(value_close(0.0, first), "Old state should not bleed through.");

        filter.configure(0.0, 0.001);
        assert_eq!(2.5, filter.filter(2.5));
        filter.configure(50.0, 0.001);
        assert!(filter.filter(1.0) < 1.0, "Coefficients must be recomputed.");
    }

    /// Reset clears the memory but keeps the cutoff and gain.
    #[test]
    fn test_pt1_reset_keeps_coefficients() {
        let mut filter = Pt1Filter::with_cutoff(100.0, 0.001);
        let gain = filter.gain();
        for _ in 0..50 {
            let _ = filter.filter(4.0);
        }

        filter.reset();
        assert!(!filter.is_passthrough());
        assert!(value_close(100.0, filter.cutoff_hz()));
        assert!(value_close(gain, filter.gain()));
        assert!(value_close(gain, filter.filter(1.0)), "Filtering restarts from zero.");
    }

    /// Unknown filter types select passthrough on the bank.
    #[test]
    fn test_bank_unknown_type_passthrough() {
        let mut bank = DTermFilterBank::new(100.0, 0.001);
        bank.configure(
            &FiltersConfig {
                dterm_lpf1_type: 42,
                dterm_lpf1_hz: 80,
            },
            0.001,
        );
        assert!(bank.roll.is_passthrough());
        assert!(bank.pitch.is_passthrough());
    }

    /// All known types give a PT1 at the requested cutoff; zero cutoff is passthrough.
    #[test]
    fn test_bank_configure() {
        let mut bank = DTermFilterBank::new(0.0, 0.001);
        for filter_type in [
            FilterType::Pt1,
            FilterType::Pt2,
            FilterType::Pt3,
            FilterType::Biquad,
        ] {
            bank.configure(
                &FiltersConfig {
                    dterm_lpf1_type: filter_type as u8,
                    dterm_lpf1_hz: 80,
                },
                0.001,
            );
            assert!(value_close(80.0, bank.roll.cutoff_hz()));
            assert!(value_close(80.0, bank.pitch.cutoff_hz()));
        }

        bank.configure(
            &FiltersConfig {
                dterm_lpf1_type: FilterType::Pt1 as u8,
                dterm_lpf1_hz: 0,
            },
            0.001,
        );
        assert!(bank.roll.is_passthrough());
        assert!(bank.pitch.is_passthrough());
    }

    #[test]
    fn test_filter_type_try_from() {
        assert_eq!(Ok(FilterType::Biquad), FilterType::try_from(3));
        assert_eq!(
            Err(ControlError::InvalidFilterType(9)),
            FilterType::try_from(9)
        );
    }
}
