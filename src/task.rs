// src/task.rs

//! The control task: owns the flight controller in the control context.

use crate::command::Command;
use crate::interfaces::{Ahrs, Blackbox, MotorMixer, RadioController};
use crate::{FlightController, SharedTelemetry};
use heapless::spsc::Consumer;

/// Control context owner of a [`FlightController`].
///
/// Each tick drains the queued commands, receiver input included, runs one
/// control step and publishes telemetry for the other contexts.
pub struct ControlTask<'a, A, M, R, B, const N: usize>
where
    A: Ahrs,
    M: MotorMixer,
    R: RadioController,
    B: Blackbox,
{
    flight_controller: FlightController<A, M, R, B>,
    commands: Consumer<'a, Command, N>,
    telemetry: &'a SharedTelemetry,
}

impl<'a, A, M, R, B, const N: usize> ControlTask<'a, A, M, R, B, N>
where
    A: Ahrs,
    M: MotorMixer,
    R: RadioController,
    B: Blackbox,
{
    /// Creates the task around a controller, the consumer half of its
    /// command queue and the telemetry cell it publishes to.
    pub fn new(
        flight_controller: FlightController<A, M, R, B>,
        commands: Consumer<'a, Command, N>,
        telemetry: &'a SharedTelemetry,
    ) -> Self {
        Self {
            flight_controller,
            commands,
            telemetry,
        }
    }

    /// Runs one control tick.
    pub fn loop_tick(&mut self, delta_t: f32, tick_count: u32) {
        let applied = self
            .flight_controller
            .apply_pending_commands(&mut self.commands);
        if applied > 0 {
            debug!("applied {} commands", applied);
        }
        self.flight_controller.loop_step(delta_t, tick_count);
        self.flight_controller.publish_telemetry(self.telemetry);
    }

    /// The owned controller.
    pub fn flight_controller(&self) -> &FlightController<A, M, R, B> {
        &self.flight_controller
    }

    /// The owned controller, mutably. A receiver running in the control
    /// context can update the setpoints through here instead of queueing
    /// [`Command::UpdateSetpoints`].
    pub fn flight_controller_mut(&mut self) -> &mut FlightController<A, M, R, B> {
        &mut self.flight_controller
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandQueue, CommandSender};
    use crate::test_utils::*;
    use crate::{ControlMode, Controls, PidError, PidIndex, PID_COUNT};
    use nalgebra::Vector3;

    /// Commands take effect on the next tick and telemetry follows each tick.
    #[test]
    fn test_loop_tick() {
        let telemetry = SharedTelemetry::new();
        let mut queue: CommandQueue<4> = CommandQueue::new();
        let (producer, consumer) = queue.split();
        let mut sender = CommandSender::new(producer);
        let mut task = ControlTask::new(test_flight_controller(), consumer, &telemetry);

        task.flight_controller_mut().ahrs_mut().data.gyro_rps = Vector3::new(0.1, 0.2, 0.3);
        task.loop_tick(0.001, 1);
        assert!(!telemetry.snapshot().motors_on);
        assert_eq!(
            [PidError::default(); PID_COUNT],
            telemetry.snapshot().pid_errors
        );

        assert!(sender.send(Command::MotorsSwitchOn).is_ok());
        assert!(!task.flight_controller().motors_is_on());
        task.loop_tick(0.001, 2);
        assert!(task.flight_controller().motors_is_on());

        let snapshot = telemetry.snapshot();
        assert!(snapshot.motors_on);
        assert_eq!(
            task.flight_controller().pid_error(PidIndex::RollRate),
            snapshot.pid_errors[PidIndex::RollRate as usize]
        );
        assert!(task.flight_controller().mixer().last_commands.is_some());
    }

    /// Receiver input from another context reaches the setpoints on the next
    /// tick, in queue order with the lifecycle commands.
    #[test]
    fn test_loop_tick_receiver_input() {
        let telemetry = SharedTelemetry::new();
        let mut queue: CommandQueue<4> = CommandQueue::new();
        let (producer, consumer) = queue.split();
        let mut sender = CommandSender::new(producer);
        let mut task = ControlTask::new(airborne_flight_controller(), consumer, &telemetry);

        let controls = Controls {
            tick_count: 10_000,
            throttle_stick: 0.6,
            roll_stick_dps: 100.0,
            pitch_stick_dps: 50.0,
            yaw_stick_dps: -30.0,
            control_mode: ControlMode::Rate,
            ..Controls::default()
        };
        assert!(sender.send(Command::UpdateSetpoints(controls)).is_ok());
        assert_eq!(0.0, task.flight_controller().pid_setpoint(PidIndex::RollRate));

        task.loop_tick(0.001, 10_000);
        let fc = task.flight_controller();
        assert!(value_close(100.0, fc.pid_setpoint(PidIndex::RollRate)));
        assert!(value_close(-50.0, fc.pid_setpoint(PidIndex::PitchRate)));
        assert!(value_close(-30.0, fc.pid_setpoint(PidIndex::YawRate)));
        assert!(value_close(0.6, fc.mixer_throttle()));

        assert!(sender
            .send(Command::UpdateSetpoints(Controls {
                control_mode: ControlMode::Angle,
                ..controls
            }))
            .is_ok());
        assert!(sender.send(Command::MotorsSwitchOff).is_ok());
        task.loop_tick(0.001, 10_001);
        let fc = task.flight_controller();
        assert_eq!(ControlMode::Angle, fc.control_mode());
        assert!(!fc.motors_is_on());
        assert!(!fc.use_angle_mode(), "Disarm after the input leaves ground mode on.");
    }

    /// Disarming through the queue, then the full flight again.
    #[test]
    fn test_loop_tick_disarm() {
        let telemetry = SharedTelemetry::new();
        let mut queue: CommandQueue<4> = CommandQueue::new();
        let (producer, consumer) = queue.split();
        let mut sender = CommandSender::new(producer);
        let mut task = ControlTask::new(airborne_flight_controller(), consumer, &telemetry);

        task.flight_controller_mut().update_setpoints(&Controls {
            tick_count: 10_000,
            throttle_stick: 0.5,
            control_mode: ControlMode::Angle,
            ..Controls::default()
        });
        assert!(task.flight_controller().use_angle_mode());

        assert!(sender.send(Command::MotorsSwitchOff).is_ok());
        task.loop_tick(0.001, 10_001);
        let fc = task.flight_controller();
        assert!(!fc.motors_is_on());
        assert!(fc.ground_mode());
        assert!(!fc.use_angle_mode());
        assert_eq!(1, fc.blackbox().map_or(0, |blackbox| blackbox.end_log_count));
        assert!(!telemetry.snapshot().motors_on);
    }
}
