// src/command.rs

//! # Commands
//!
//! Lifecycle transitions and receiver input delivered from outside the
//! control context, and the backchannel command surface.
//!
//! The control tick must never observe a half-applied transition. A command
//! context therefore does not touch the controller: it pushes a [`Command`]
//! into a single-producer single-consumer [`CommandQueue`], and the control
//! context applies everything pending at the start of its next tick.
//!
//! ```
//! use multirotor_flight_core::command::{Command, CommandQueue, CommandSender};
//! use multirotor_flight_core::ControlMode;
//!
//! let mut queue: CommandQueue<8> = CommandQueue::new();
//! let (producer, mut consumer) = queue.split();
//! let mut sender = CommandSender::new(producer);
//!
//! sender.send(Command::SetControlMode(ControlMode::Angle)).unwrap();
//! assert_eq!(
//!     Some(Command::SetControlMode(ControlMode::Angle)),
//!     consumer.dequeue()
//! );
//! ```

use crate::interfaces::{
    Ahrs, Blackbox, MotorMixer, Preferences, RadioController, PIDS_NOT_SET,
};
use crate::{
    ControlError, ControlMode, Controls, FiltersConfig, FlightController, PidGains, PidIndex,
};
use heapless::spsc::{Consumer, Producer, Queue};

/// Lifecycle transition or receiver input applied by the control context.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// New receiver values from the receiver context, applied with
    /// [`FlightController::update_setpoints`].
    UpdateSetpoints(Controls),
    /// Arm the motors.
    MotorsSwitchOn,
    /// Disarm the motors.
    MotorsSwitchOff,
    /// Arm when disarmed, disarm when armed.
    MotorsToggleOnOff,
    /// Change the control mode.
    SetControlMode(ControlMode),
    /// Reconfigure the D-term filters.
    SetFilters(FiltersConfig),
    /// Replace the gains of one PID.
    SetPidConstants(PidIndex, PidGains<f32>),
    /// Start yaw spin recovery.
    EnterYawSpinRecovery,
}

/// Queue carrying commands from one command context to the control context.
///
/// Holds at most `N - 1` commands.
pub type CommandQueue<const N: usize> = Queue<Command, N>;

/// Command context end of a [`CommandQueue`].
pub struct CommandSender<'a, const N: usize> {
    producer: Producer<'a, Command, N>,
}

impl<'a, const N: usize> CommandSender<'a, N> {
    /// Wraps the producer half of a split queue.
    pub fn new(producer: Producer<'a, Command, N>) -> Self {
        Self { producer }
    }

    /// Queues a command for the next control tick.
    pub fn send(&mut self, command: Command) -> Result<(), ControlError> {
        self.producer.enqueue(command).map_err(|_command| {
            warn!("command queue full, command dropped");
            ControlError::CommandQueueFull
        })
    }

    /// Whether another command fits in the queue.
    pub fn ready(&self) -> bool {
        self.producer.ready()
    }
}

/// Control command received over the backchannel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlCommand {
    /// Disarm the motors.
    MotorsSwitchOff,
    /// Arm the motors.
    MotorsSwitchOn,
    /// Reset, accepted but currently has no effect.
    Reset,
    /// Change the control mode, given as its raw code.
    SetMode(u8),
    /// Select a PID profile, not supported.
    SetPidProfile(u8),
    /// Select a rates profile, not supported.
    SetRatesProfile(u8),
}

impl ControlCommand {
    /// The lifecycle transition this command requests, if any.
    pub fn to_command(self) -> Result<Option<Command>, ControlError> {
        match self {
            ControlCommand::MotorsSwitchOff => Ok(Some(Command::MotorsSwitchOff)),
            ControlCommand::MotorsSwitchOn => Ok(Some(Command::MotorsSwitchOn)),
            ControlCommand::Reset => Ok(None),
            ControlCommand::SetMode(mode) => {
                Ok(Some(Command::SetControlMode(ControlMode::try_from(mode)?)))
            }
            ControlCommand::SetPidProfile(_) | ControlCommand::SetRatesProfile(_) => Ok(None),
        }
    }

    fn is_supported(self) -> bool {
        !matches!(
            self,
            ControlCommand::SetPidProfile(_) | ControlCommand::SetRatesProfile(_)
        )
    }
}

/// What a [`SetPidCommand`] does with its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SetPidType {
    /// Set the proportional gain from its 16 bit representation.
    SetP,
    /// Set the integral gain from its 16 bit representation.
    SetI,
    /// Set the derivative gain from its 16 bit representation.
    SetD,
    /// Set the feed-forward gain from its 16 bit representation.
    SetF,
    /// Save the gains of the axis.
    SaveP,
    /// Save the gains of the axis.
    SaveI,
    /// Save the gains of the axis.
    SaveD,
    /// Save the gains of the axis.
    SaveF,
    /// Mark the saved gains of the axis as not set.
    ResetPid,
}

/// Gain command received over the backchannel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SetPidCommand {
    /// Raw [`PidIndex`] code.
    pub pid_index: u8,
    /// Requested operation.
    pub set_type: SetPidType,
    /// Gain in its 16 bit representation, for the set operations.
    pub value: u16,
}

impl<A, M, R, B> FlightController<A, M, R, B>
where
    A: Ahrs,
    M: MotorMixer,
    R: RadioController,
    B: Blackbox,
{
    /// Applies one lifecycle transition.
    pub fn apply_command(&mut self, command: Command) {
        match command {
            Command::UpdateSetpoints(controls) => self.update_setpoints(&controls),
            Command::MotorsSwitchOn => self.motors_switch_on(),
            Command::MotorsSwitchOff => self.motors_switch_off(),
            Command::MotorsToggleOnOff => self.motors_toggle_on_off(),
            Command::SetControlMode(control_mode) => self.set_control_mode(control_mode),
            Command::SetFilters(filters) => self.set_filters(filters),
            Command::SetPidConstants(index, gains) => self.set_pid_constants(index, gains),
            Command::EnterYawSpinRecovery => self.enter_yaw_spin_recovery(),
        }
    }

    /// Applies every queued command, in order. Returns the number applied.
    pub fn apply_pending_commands<const N: usize>(
        &mut self,
        consumer: &mut Consumer<'_, Command, N>,
    ) -> usize {
        let mut count = 0;
        while let Some(command) = consumer.dequeue() {
            self.apply_command(command);
            count += 1;
        }
        count
    }

    /// Handles a backchannel control command in the control context.
    ///
    /// Returns whether the command was accepted.
    pub fn control_command(&mut self, command: ControlCommand) -> bool {
        match command.to_command() {
            Ok(Some(command)) => {
                self.apply_command(command);
                true
            }
            Ok(None) => command.is_supported(),
            Err(_err) => {
                warn!("rejected control command");
                false
            }
        }
    }

    /// Handles a backchannel gain command.
    ///
    /// Any save operation stores all gains of the axis under the axis name.
    /// Returns `false`, changing nothing, for an invalid PID index.
    pub fn set_pid_command<P: Preferences>(
        &mut self,
        command: &SetPidCommand,
        preferences: &mut P,
    ) -> bool {
        let index = match PidIndex::try_from(command.pid_index) {
            Ok(index) => index,
            Err(_err) => {
                warn!("invalid PID index {}", command.pid_index);
                return false;
            }
        };

        match command.set_type {
            SetPidType::SetP => self.set_pid_p_msp(index, command.value),
            SetPidType::SetI => self.set_pid_i_msp(index, command.value),
            SetPidType::SetD => self.set_pid_d_msp(index, command.value),
            SetPidType::SetF => self.set_pid_f_msp(index, command.value),
            SetPidType::SaveP | SetPidType::SaveI | SetPidType::SaveD | SetPidType::SaveF => {
                preferences.put_pid(index.name(), &self.pid_constants(index));
            }
            SetPidType::ResetPid => {
                let not_set = PidGains {
                    kp: PIDS_NOT_SET,
                    ki: PIDS_NOT_SET,
                    kd: PIDS_NOT_SET,
                    kf: PIDS_NOT_SET,
                    ks: PIDS_NOT_SET,
                };
                preferences.put_pid(index.name(), &not_set);
            }
        }
        true
    }
}
