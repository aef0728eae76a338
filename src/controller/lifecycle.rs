// src/controller/lifecycle.rs

//! Arming, control mode, filter and gain changes.
//!
//! These run outside the control tick. Callers in other execution contexts
//! send them through the [`command`](crate::command) queue instead of calling
//! them directly.

use super::{ControlMode, FlightController, PidIndex};
use crate::interfaces::{Ahrs, Blackbox, MotorMixer, RadioController};
use crate::{gain_from_msp, FiltersConfig, PidGains};

impl<A, M, R, B> FlightController<A, M, R, B>
where
    A: Ahrs,
    M: MotorMixer,
    R: RadioController,
    B: Blackbox,
{
    /// Arms the motors.
    ///
    /// Refused while the AHRS sensor fusion is still initializing, since the
    /// orientation estimate cannot be trusted yet.
    pub fn motors_switch_on(&mut self) {
        if self.ahrs.sensor_fusion_filter_is_initializing() {
            warn!("motors not switched on, sensor fusion initializing");
            return;
        }
        self.mixer.motors_switch_on();
        // reset the PID integral values when the motors are switched on
        self.switch_pid_integration_on();
        info!("motors switched on");
    }

    /// Disarms the motors and returns to ground mode.
    pub fn motors_switch_off(&mut self) {
        self.mixer.motors_switch_off();
        self.take_off_count_start = None;
        self.ground_mode = true;
        self.switch_pid_integration_off();
        if let Some(blackbox) = self.blackbox.as_mut() {
            blackbox.end_log();
        }
        self.update_use_angle_mode();
        info!("motors switched off");
    }

    /// Arms when disarmed, disarms when armed.
    pub fn motors_toggle_on_off(&mut self) {
        if self.mixer.motors_is_on() {
            self.motors_switch_off();
        } else {
            self.motors_switch_on();
        }
    }

    /// Changes the control mode.
    ///
    /// A change resets every integrator so no windup carries across modes.
    /// Setting the current mode again has no effect.
    pub fn set_control_mode(&mut self, control_mode: ControlMode) {
        if control_mode == self.control_mode {
            return;
        }
        self.control_mode = control_mode;
        self.reset_pid_integrals();
        self.update_use_angle_mode();
        info!("control mode {}", control_mode as u8);
    }

    /// Applies a new D-term filter configuration at the control task rate.
    pub fn set_filters(&mut self, filters: FiltersConfig) {
        self.filters = filters;
        let sample_interval_s = self.task_interval_us as f32 * 0.000_001;
        self.dterm_filters.configure(&filters, sample_interval_s);
    }

    /// Replaces the gains of one PID.
    ///
    /// Integration on that PID is switched off, it comes back on with the
    /// next arming or take-off.
    pub fn set_pid_constants(&mut self, index: PidIndex, gains: PidGains<f32>) {
        let pid = &mut self.pids[index as usize];
        pid.set_gains(gains);
        pid.switch_integration_off();
    }

    /// Sets the proportional gain from its 16 bit representation.
    pub fn set_pid_p_msp(&mut self, index: PidIndex, value: u16) {
        let kp = gain_from_msp(value, self.scale_factors[index as usize].kp);
        self.pids[index as usize].set_p(kp);
    }

    /// Sets the integral gain from its 16 bit representation.
    pub fn set_pid_i_msp(&mut self, index: PidIndex, value: u16) {
        let ki = gain_from_msp(value, self.scale_factors[index as usize].ki);
        self.pids[index as usize].set_i(ki);
    }

    /// Sets the derivative gain from its 16 bit representation.
    pub fn set_pid_d_msp(&mut self, index: PidIndex, value: u16) {
        let kd = gain_from_msp(value, self.scale_factors[index as usize].kd);
        self.pids[index as usize].set_d(kd);
    }

    /// Sets the feed-forward gain from its 16 bit representation.
    pub fn set_pid_f_msp(&mut self, index: PidIndex, value: u16) {
        let kf = gain_from_msp(value, self.scale_factors[index as usize].kf);
        self.pids[index as usize].set_f(kf);
    }

    /// Sets the setpoint slew gain from its 16 bit representation.
    pub fn set_pid_s_msp(&mut self, index: PidIndex, value: u16) {
        let ks = gain_from_msp(value, self.scale_factors[index as usize].ks);
        self.pids[index as usize].set_s(ks);
    }

    /// Switches integration on for every PID.
    pub fn switch_pid_integration_on(&mut self) {
        self.pids.iter_mut().for_each(|pid| pid.switch_integration_on());
    }

    /// Switches integration off for every PID, freezing the integrators.
    pub fn switch_pid_integration_off(&mut self) {
        self.pids
            .iter_mut()
            .for_each(|pid| pid.switch_integration_off());
    }

    /// Clears every integrator.
    pub fn reset_pid_integrals(&mut self) {
        self.pids.iter_mut().for_each(|pid| pid.reset_integral());
    }

    /// Hands control to yaw spin recovery until the yaw rate drops below the
    /// recovered threshold. Integration stays off during recovery.
    pub fn enter_yaw_spin_recovery(&mut self) {
        self.yaw_spin_recovery = true;
        self.switch_pid_integration_off();
        info!("yaw spin recovery");
    }
}
