// src/vehicle.rs

//! A module specifying the shared interface of PID-based vehicle controllers,
//! so that task loops, backchannels and screens can drive a controller
//! without knowing its vehicle type.

use crate::interfaces::{Ahrs, Blackbox, MotorMixer, RadioController};
use crate::{Controls, FlightController, PidIndex, TelemetryData, PID_COUNT};
use piddiy::Number as PiddiyNumber;

/// Custom trait to encapsulate base number requirements.
pub trait Number: PiddiyNumber {}

impl<T: PiddiyNumber> Number for T {}

/// A PID-based vehicle controller.
pub trait VehicleController {
    /// Receiver input event.
    type Controls;
    /// Telemetry snapshot.
    type Telemetry;

    /// Updates the setpoints from new receiver input.
    fn update_setpoints(&mut self, controls: &Self::Controls);

    /// Runs the control law for one tick.
    fn update_outputs_using_pids(&mut self, delta_t: f32);

    /// Runs one control task step, control law and output.
    fn loop_step(&mut self, delta_t: f32, tick_count: u32);

    /// Current telemetry.
    fn telemetry_data(&self) -> Self::Telemetry;

    /// Number of PIDs.
    fn pid_count(&self) -> usize;

    /// Name of the PID at `index`, `None` when out of range.
    fn pid_name(&self, index: usize) -> Option<&'static str>;
}

impl<A, M, R, B> VehicleController for FlightController<A, M, R, B>
where
    A: Ahrs,
    M: MotorMixer,
    R: RadioController,
    B: Blackbox,
{
    type Controls = Controls;
    type Telemetry = TelemetryData;

    fn update_setpoints(&mut self, controls: &Controls) {
        FlightController::update_setpoints(self, controls);
    }

    fn update_outputs_using_pids(&mut self, delta_t: f32) {
        FlightController::update_outputs_using_pids(self, delta_t);
    }

    fn loop_step(&mut self, delta_t: f32, tick_count: u32) {
        FlightController::loop_step(self, delta_t, tick_count);
    }

    fn telemetry_data(&self) -> TelemetryData {
        FlightController::telemetry_data(self)
    }

    fn pid_count(&self) -> usize {
        PID_COUNT
    }

    fn pid_name(&self, index: usize) -> Option<&'static str> {
        PidIndex::ALL.get(index).map(|index| index.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    fn names<V: VehicleController>(vehicle: &V) -> [Option<&'static str>; 6] {
        core::array::from_fn(|index| vehicle.pid_name(index))
    }

    /// A controller driven only through the trait.
    fn fly<V: VehicleController<Controls = Controls>>(vehicle: &mut V) {
        for tick in 0..10 {
            vehicle.update_setpoints(&Controls {
                tick_count: tick,
                throttle_stick: 0.3,
                roll_stick_dps: 50.0,
                ..Controls::default()
            });
            vehicle.loop_step(0.001, tick);
        }
    }

    #[test]
    fn test_vehicle_controller() {
        let mut fc = test_flight_controller();
        assert_eq!(5, VehicleController::pid_count(&fc));
        assert_eq!(
            [
                Some("ROLL_RATE"),
                Some("PITCH_RATE"),
                Some("YAW_RATE"),
                Some("ROLL_ANGLE"),
                Some("PITCH_ANGLE"),
                None
            ],
            names(&fc)
        );

        fc.motors_switch_on();
        fly(&mut fc);
        assert!(fc.output(PidIndex::RollRate) > 0.0);
        assert!(VehicleController::telemetry_data(&fc).motors_on);
    }
}
